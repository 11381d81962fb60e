//! Step coordinator.
//!
//! The academy owns the trainer connection and advances every registered
//! listener through the phases of one environment step, always in the same
//! order: pre-step, increment, send state, decide, act.

use std::cell::{Cell, RefCell};
use std::error::Error;
use std::fmt;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use crate::agents::EpisodeIdCounter;
use crate::communicator::{
    Communicator, CommunicatorEvent, CommunicatorInitParameters, RpcCommunicator, Transport,
};
use crate::config::AcademyConfig;

pub const ACADEMY_NAME: &str = "Academy";
/// Version of the trainer protocol spoken by this crate.
pub const COMMUNICATION_VERSION: &str = "1.0.0";
pub const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Receives the academy's step phases. Every method defaults to doing nothing.
pub trait AcademyObserver {
    fn on_environment_reset(&mut self) {}
    fn on_force_reset(&mut self) {}
    fn on_pre_step(&mut self, _academy_step: u64) {}
    fn on_increment_step(&mut self) {}
    fn on_send_state(&mut self) {}
    fn on_decide_action(&mut self) {}
    fn on_act(&mut self) {}
    fn on_communicator_disconnected(&mut self) {}
    fn on_destroy(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcademyError {
    Recursion { operation: &'static str },
    Disposed,
}

impl fmt::Display for AcademyError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcademyError::Recursion { operation } => write!(
                formatter,
                "{} called recursively. Do not call it from an academy listener",
                operation
            ),
            AcademyError::Disposed => write!(formatter, "Academy has been disposed"),
        }
    }
}

impl Error for AcademyError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Initialized,
    Disposed,
}

/// Guards a method against being re-entered while it runs.
struct RecursionChecker<'a> {
    running: &'a Cell<bool>,
}

impl<'a> RecursionChecker<'a> {
    fn start(running: &'a Cell<bool>, operation: &'static str) -> Result<Self, AcademyError> {
        if running.replace(true) {
            error!("{} called recursively", operation);
            return Err(AcademyError::Recursion { operation });
        }
        Ok(RecursionChecker { running })
    }
}

impl Drop for RecursionChecker<'_> {
    fn drop(&mut self) {
        self.running.set(false);
    }
}

pub struct Academy {
    port: u16,
    lifecycle: Cell<Lifecycle>,
    communicator: RefCell<Option<Rc<RefCell<dyn Communicator>>>>,
    event_sender: Sender<CommunicatorEvent>,
    events: Receiver<CommunicatorEvent>,
    listeners: RefCell<Vec<Rc<RefCell<dyn AcademyObserver>>>>,
    episode_id_counter: EpisodeIdCounter,
    step_count: Cell<u64>,
    total_step_count: Cell<u64>,
    episode_count: Cell<u64>,
    had_first_reset: Cell<bool>,
    reset_requested: Cell<bool>,
    quit_requested: Cell<bool>,
    is_training: Cell<bool>,
    seed: Cell<i32>,
    num_areas: Cell<i32>,
    stepping: Cell<bool>,
}

impl Academy {
    pub fn new(config: &AcademyConfig) -> Self {
        let (event_sender, events) = mpsc::channel();
        Academy {
            port: config.port,
            lifecycle: Cell::new(Lifecycle::Uninitialized),
            communicator: RefCell::new(None),
            event_sender,
            events,
            listeners: RefCell::new(Vec::new()),
            episode_id_counter: EpisodeIdCounter::new(),
            step_count: Cell::new(0),
            total_step_count: Cell::new(0),
            episode_count: Cell::new(0),
            had_first_reset: Cell::new(false),
            reset_requested: Cell::new(false),
            quit_requested: Cell::new(false),
            is_training: Cell::new(false),
            seed: Cell::new(0),
            num_areas: Cell::new(1),
            stepping: Cell::new(false),
        }
    }

    /// Connects to the trainer through `transport`. Without a transport, or
    /// when the handshake fails, the academy runs agents on their heuristics.
    #[tracing::instrument(level = "debug", skip(self, transport))]
    pub fn initialize(&self, transport: Option<Box<dyn Transport>>) {
        if self.lifecycle.get() != Lifecycle::Uninitialized {
            warn!("Academy is already initialized");
            return;
        }
        self.lifecycle.set(Lifecycle::Initialized);

        let Some(transport) = transport else {
            info!("No trainer connection, running heuristics");
            return;
        };

        let mut communicator = RpcCommunicator::new(transport, self.event_sender.clone());
        let parameters = CommunicatorInitParameters {
            port: self.port,
            name: ACADEMY_NAME.to_string(),
            package_version: PACKAGE_VERSION.to_string(),
            communication_version: COMMUNICATION_VERSION.to_string(),
        };
        match communicator.initialize(&parameters) {
            Ok(rl_parameters) => {
                self.seed.set(rl_parameters.seed);
                self.num_areas.set(rl_parameters.num_areas);
                *self.communicator.borrow_mut() = Some(Rc::new(RefCell::new(communicator)));
            }
            Err(e) => {
                warn!(
                    "Couldn't connect to trainer on port {} using API version {}: {}. Will perform inference instead.",
                    self.port, COMMUNICATION_VERSION, e
                );
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle.get() == Lifecycle::Initialized
    }

    pub fn is_communicator_on(&self) -> bool {
        self.communicator
            .borrow()
            .as_ref()
            .is_some_and(|communicator| communicator.borrow().is_open())
    }

    /// The trainer connection, shared with the remote policies.
    pub fn communicator(&self) -> Option<Rc<RefCell<dyn Communicator>>> {
        self.communicator.borrow().clone()
    }

    pub fn episode_id_counter(&self) -> EpisodeIdCounter {
        self.episode_id_counter.clone()
    }

    pub fn step_count(&self) -> u64 {
        self.step_count.get()
    }

    pub fn total_step_count(&self) -> u64 {
        self.total_step_count.get()
    }

    pub fn episode_count(&self) -> u64 {
        self.episode_count.get()
    }

    pub fn is_training(&self) -> bool {
        self.is_training.get()
    }

    pub fn num_areas(&self) -> i32 {
        self.num_areas.get()
    }

    pub fn is_quit_requested(&self) -> bool {
        self.quit_requested.get()
    }

    /// Random generator seeded by the trainer, or with 0 when running alone.
    pub fn seeded_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed.get() as u64)
    }

    pub fn add_listener(&self, listener: Rc<RefCell<dyn AcademyObserver>>) {
        self.listeners.borrow_mut().push(listener);
    }

    pub fn remove_listener(&self, listener: &Rc<RefCell<dyn AcademyObserver>>) {
        self.listeners
            .borrow_mut()
            .retain(|registered| !Rc::ptr_eq(registered, listener));
    }

    fn broadcast(&self, phase: impl Fn(&mut dyn AcademyObserver)) {
        let listeners = self.listeners.borrow().clone();
        for listener in listeners {
            match listener.try_borrow_mut() {
                Ok(mut listener) => phase(&mut *listener),
                Err(_) => warn!("Skipping a listener that is busy"),
            }
        }
    }

    fn drain_events(&self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                CommunicatorEvent::RlInputReceived { is_training } => self.is_training.set(is_training),
                CommunicatorEvent::Reset => {
                    debug!("Trainer requested a reset");
                    self.reset_requested.set(true);
                }
                CommunicatorEvent::Quit => {
                    info!("Trainer requested to quit");
                    if let Some(communicator) = self.communicator.take() {
                        communicator.borrow_mut().dispose();
                    }
                    self.quit_requested.set(true);
                    self.broadcast(|listener| listener.on_communicator_disconnected());
                }
                CommunicatorEvent::Disconnected => {
                    warn!("Lost connection to the trainer, falling back to heuristics");
                    self.communicator.take();
                    self.broadcast(|listener| listener.on_communicator_disconnected());
                }
            }
        }
    }

    /// Starts a new episode for the whole environment.
    pub fn environment_reset(&self) {
        self.step_count.set(0);
        self.episode_count.set(self.episode_count.get() + 1);
        debug!("Environment reset, episode {}", self.episode_count.get());
        self.broadcast(|listener| listener.on_environment_reset());
    }

    pub fn forced_full_reset(&self) {
        self.environment_reset();
        self.broadcast(|listener| listener.on_force_reset());
        self.had_first_reset.set(true);
    }

    /// Advances the environment by one step.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn environment_step(&self) -> Result<(), AcademyError> {
        let _checker = RecursionChecker::start(&self.stepping, "environment_step")?;

        match self.lifecycle.get() {
            Lifecycle::Disposed => return Err(AcademyError::Disposed),
            Lifecycle::Uninitialized => self.initialize(None),
            Lifecycle::Initialized => {}
        }

        self.drain_events();
        let reset_requested = self.reset_requested.replace(false);
        if !self.had_first_reset.get() || reset_requested {
            self.forced_full_reset();
        }

        let step_count = self.step_count.get();
        self.broadcast(|listener| listener.on_pre_step(step_count));

        self.step_count.set(step_count + 1);
        self.total_step_count.set(self.total_step_count.get() + 1);

        self.broadcast(|listener| listener.on_increment_step());
        self.broadcast(|listener| listener.on_send_state());
        self.broadcast(|listener| listener.on_decide_action());
        self.broadcast(|listener| listener.on_act());

        self.drain_events();
        Ok(())
    }

    /// Shuts down the trainer connection and releases every listener.
    pub fn dispose(&self) {
        if self.lifecycle.get() == Lifecycle::Disposed {
            return;
        }
        self.broadcast(|listener| listener.on_destroy());
        if let Some(communicator) = self.communicator.take() {
            communicator.borrow_mut().dispose();
        }
        self.listeners.borrow_mut().clear();
        self.lifecycle.set(Lifecycle::Disposed);
        info!("Academy disposed after {} steps", self.total_step_count.get());
    }
}
