use std::cell::RefCell;
use std::rc::Rc;

use dotenv::dotenv;
use lockstep::actuators::{
    ActionBuffers, ActionReceiver, ActionSpec, DiscreteActionMask, HeuristicProvider,
    VectorActuator,
};
use lockstep::agents::{Agent, DecisionRequester};
use lockstep::communicator::replay::ReplayFile;
use lockstep::communicator::{GrpcTransport, RecordingTransport, Transport};
use lockstep::policies::BehaviorParameters;
use lockstep::sensors::{ObservationSpec, ObservationWriter, Sensor};
use lockstep::{Academy, AcademyConfig};
use rand::Rng;
use rand::rngs::StdRng;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const TRACK_HALF_LENGTH: i32 = 10;
const MAX_EPISODE_STEPS: u32 = 200;

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lockstep=debug,info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Setting default subscriber failed: {}", e);
    }
}

/// A walker on a line that has to reach a goal.
struct Track {
    position: i32,
    goal: i32,
    rng: StdRng,
}

impl Track {
    fn restart(&mut self) {
        self.position = 0;
        self.goal = loop {
            let goal = self.rng.random_range(-TRACK_HALF_LENGTH..=TRACK_HALF_LENGTH);
            if goal != 0 {
                break goal;
            }
        };
    }

    fn reached_goal(&self) -> bool {
        self.position == self.goal
    }
}

impl ActionReceiver for Track {
    // 0 moves left, 1 stays, 2 moves right
    fn on_action_received(&mut self, actions: &ActionBuffers) {
        let movement = actions.discrete_actions.get(0) - 1;
        self.position = (self.position + movement).clamp(-TRACK_HALF_LENGTH, TRACK_HALF_LENGTH);
    }

    fn write_discrete_action_mask(&mut self, action_mask: &mut dyn DiscreteActionMask) {
        if self.position == -TRACK_HALF_LENGTH {
            action_mask.set_action_enabled(0, 0, false);
        }
        if self.position == TRACK_HALF_LENGTH {
            action_mask.set_action_enabled(0, 2, false);
        }
    }
}

impl HeuristicProvider for Track {
    fn heuristic(&mut self, actions_out: &ActionBuffers) {
        let movement = if self.rng.random_bool(0.1) {
            self.rng.random_range(-1..=1)
        } else {
            (self.goal - self.position).signum()
        };
        actions_out.discrete_actions.set(0, movement + 1);
    }
}

struct TrackSensor {
    track: Rc<RefCell<Track>>,
}

impl Sensor for TrackSensor {
    fn observation_spec(&self) -> ObservationSpec {
        ObservationSpec::vector(2)
    }

    fn write(&mut self, writer: &mut ObservationWriter) -> usize {
        let track = self.track.borrow();
        let scale = TRACK_HALF_LENGTH as f32;
        writer.add_list(&[track.position as f32 / scale, track.goal as f32 / scale], 0);
        2
    }

    fn name(&self) -> &str {
        "Track"
    }
}

fn connect(config: &AcademyConfig) -> Option<Box<dyn Transport>> {
    let transport = match GrpcTransport::connect(&config.host, config.port) {
        Ok(transport) => transport,
        Err(e) => {
            warn!("No trainer at {}:{}: {}", config.host, config.port, e);
            return None;
        }
    };

    let Some(folder) = &config.replays_folder else {
        return Some(Box::new(transport));
    };
    match ReplayFile::create(folder, "lockstep") {
        Ok(replay_file) => {
            info!("Recording exchanges to {}", replay_file.path().display());
            Some(Box::new(RecordingTransport::new(transport, replay_file)))
        }
        Err(e) => {
            warn!("Cannot create replay file in {}: {}", folder, e);
            Some(Box::new(transport))
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging();

    let config = AcademyConfig::from_env()?;
    let academy = Rc::new(Academy::new(&config));
    academy.initialize(connect(&config));

    let track = Rc::new(RefCell::new(Track {
        position: 0,
        goal: 1,
        rng: academy.seeded_rng(),
    }));
    let actuator = VectorActuator::new(
        track.clone(),
        Some(track.clone()),
        ActionSpec::make_discrete(vec![3]),
        "Walk",
    );
    let sensor = TrackSensor {
        track: Rc::clone(&track),
    };
    let parameters = BehaviorParameters {
        max_step: MAX_EPISODE_STEPS,
        ..BehaviorParameters::new("Walker")
    };
    let agent = Agent::new(
        &academy,
        parameters,
        vec![Box::new(actuator)],
        vec![Box::new(sensor)],
        Some(DecisionRequester::new(1, 0, false)),
    )?;
    let episode_track = Rc::clone(&track);
    agent
        .borrow_mut()
        .set_episode_begin_handler(move |_| episode_track.borrow_mut().restart());

    info!(
        "Running {} agent",
        if agent.borrow().is_policy_remote() { "remote" } else { "heuristic" }
    );

    while !academy.is_quit_requested() {
        if config
            .max_steps
            .is_some_and(|max_steps| academy.total_step_count() >= max_steps)
        {
            break;
        }
        academy.environment_step()?;

        let reached_goal = track.borrow().reached_goal();
        let mut agent = agent.borrow_mut();
        if reached_goal {
            agent.add_reward(1.0);
            agent.end_episode();
        } else {
            agent.add_reward(-0.01);
        }
    }

    info!(
        "Completed {} episodes in {} steps",
        agent.borrow().completed_episodes(),
        academy.total_step_count()
    );
    academy.dispose();
    Ok(())
}
