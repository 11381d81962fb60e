use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, warn};

use super::{AgentInfo, DecisionRequester, EpisodeIdCounter};
use crate::academy::{Academy, AcademyObserver};
use crate::actuators::{ActionBuffers, ActionSpec, Actuator, ActuatorError, ActuatorManager};
use crate::communicator::Communicator;
use crate::policies::{BehaviorParameters, Policy};
use crate::sensors::Sensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    DoneCalled,
    MaxStepReached,
    Disabled,
}

type EpisodeBeginHandler = Box<dyn FnMut(i32)>;

/// An actor in the environment, driven by the academy's step phases.
///
/// Observations come from the attached sensors and actions are routed to the
/// attached actuators. Whether a trainer or a heuristic picks the actions
/// depends on the behavior parameters and on the academy's connection.
pub struct Agent {
    behavior_parameters: BehaviorParameters,
    action_spec: ActionSpec,
    actuator_manager: Rc<RefCell<ActuatorManager>>,
    sensors: Vec<Box<dyn Sensor>>,
    policy: Option<Box<dyn Policy>>,
    communicator: Option<Rc<RefCell<dyn Communicator>>>,
    episode_id_counter: EpisodeIdCounter,
    decision_requester: Option<DecisionRequester>,
    on_episode_begin: Option<EpisodeBeginHandler>,
    info: AgentInfo,
    episode_id: i32,
    group_id: i32,
    step_count: u32,
    completed_episodes: u32,
    reward: f32,
    group_reward: f32,
    cumulative_reward: f32,
    request_decision: bool,
    request_action: bool,
}

impl Agent {
    /// Builds the agent and registers it with `academy`.
    pub fn new(
        academy: &Academy,
        behavior_parameters: BehaviorParameters,
        actuators: Vec<Box<dyn Actuator>>,
        mut sensors: Vec<Box<dyn Sensor>>,
        decision_requester: Option<DecisionRequester>,
    ) -> Result<Rc<RefCell<Agent>>, ActuatorError> {
        let mut manager = ActuatorManager::with_capacity(actuators.len());
        for actuator in actuators {
            manager.add(actuator)?;
        }
        manager.ready_actuators_for_execution();
        let action_spec = manager.combined_action_spec().clone();
        let actuator_manager = Rc::new(RefCell::new(manager));

        sensors.sort_by(|a, b| a.name().cmp(b.name()));

        let communicator = academy.communicator();
        let policy = behavior_parameters.generate_policy(
            &action_spec,
            Rc::clone(&actuator_manager),
            communicator.clone(),
        );
        let episode_id_counter = academy.episode_id_counter();
        let episode_id = episode_id_counter.next_episode_id();

        debug!(
            "Agent for behavior {} starts episode {}",
            behavior_parameters.behavior_name, episode_id
        );

        let agent = Rc::new(RefCell::new(Agent {
            info: AgentInfo {
                stored_actions: ActionBuffers::from_spec(&action_spec),
                ..Default::default()
            },
            behavior_parameters,
            action_spec,
            actuator_manager,
            sensors,
            policy: Some(policy),
            communicator,
            episode_id_counter,
            decision_requester,
            on_episode_begin: None,
            episode_id,
            group_id: 0,
            step_count: 0,
            completed_episodes: 0,
            reward: 0.0,
            group_reward: 0.0,
            cumulative_reward: 0.0,
            request_decision: false,
            request_action: false,
        }));
        academy.add_listener(agent.clone());
        Ok(agent)
    }

    /// Called with the episode id whenever a new episode begins.
    pub fn set_episode_begin_handler(&mut self, handler: impl FnMut(i32) + 'static) {
        self.on_episode_begin = Some(Box::new(handler));
    }

    pub fn behavior_parameters(&self) -> &BehaviorParameters {
        &self.behavior_parameters
    }

    pub fn action_spec(&self) -> &ActionSpec {
        &self.action_spec
    }

    pub fn episode_id(&self) -> i32 {
        self.episode_id
    }

    pub fn group_id(&self) -> i32 {
        self.group_id
    }

    pub fn set_group_id(&mut self, group_id: i32) {
        self.group_id = group_id;
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn completed_episodes(&self) -> u32 {
        self.completed_episodes
    }

    pub fn info(&self) -> &AgentInfo {
        &self.info
    }

    pub fn stored_actions(&self) -> ActionBuffers {
        self.actuator_manager.borrow().stored_actions().clone()
    }

    pub fn is_policy_remote(&self) -> bool {
        self.policy.as_ref().is_some_and(|policy| policy.is_remote())
    }

    pub fn reward(&self) -> f32 {
        self.reward
    }

    /// Replaces the reward collected since the last decision.
    pub fn set_reward(&mut self, reward: f32) {
        self.cumulative_reward += reward - self.reward;
        self.reward = reward;
    }

    pub fn add_reward(&mut self, increment: f32) {
        self.reward += increment;
        self.cumulative_reward += increment;
    }

    pub fn set_group_reward(&mut self, reward: f32) {
        self.group_reward = reward;
    }

    pub fn add_group_reward(&mut self, increment: f32) {
        self.group_reward += increment;
    }

    /// Sum of the rewards of the current episode.
    pub fn cumulative_reward(&self) -> f32 {
        self.cumulative_reward
    }

    pub fn request_decision(&mut self) {
        self.request_decision = true;
        self.request_action();
    }

    pub fn request_action(&mut self) {
        self.request_action = true;
    }

    pub fn end_episode(&mut self) {
        self.end_episode_and_reset(DoneReason::DoneCalled);
    }

    /// Ends the episode without a terminal state, e.g. on a time limit.
    pub fn episode_interrupted(&mut self) {
        self.end_episode_and_reset(DoneReason::MaxStepReached);
    }

    /// Ends the episode for good. No new episode begins.
    pub fn disable(&mut self) {
        self.notify_agent_done(DoneReason::Disabled);
        self.policy = None;
    }

    pub fn reload_policy(&mut self) {
        let policy = self.behavior_parameters.generate_policy(
            &self.action_spec,
            Rc::clone(&self.actuator_manager),
            self.communicator.clone(),
        );
        self.policy = Some(policy);
    }

    fn end_episode_and_reset(&mut self, reason: DoneReason) {
        self.notify_agent_done(reason);
        self.agent_reset();
    }

    /// Sends the final observation of the episode. Has no effect when the
    /// episode already ended.
    pub fn notify_agent_done(&mut self, reason: DoneReason) {
        if self.info.done {
            return;
        }
        self.info.episode_id = self.episode_id;
        self.info.reward = self.reward;
        self.info.group_reward = self.group_reward;
        self.info.done = true;
        self.info.max_step_reached = reason == DoneReason::MaxStepReached;
        self.info.group_id = self.group_id;

        self.update_sensors();
        if let Some(policy) = self.policy.as_mut() {
            policy.request_decision(&self.info, &mut self.sensors);
        }
        for sensor in self.sensors.iter_mut() {
            sensor.reset();
        }

        if reason != DoneReason::Disabled {
            self.completed_episodes += 1;
        }
        debug!(
            "Episode {} ended ({:?}) with cumulative reward {}",
            self.episode_id, reason, self.cumulative_reward
        );

        self.reward = 0.0;
        self.group_reward = 0.0;
        self.cumulative_reward = 0.0;
        self.request_action = false;
        self.request_decision = false;
        self.info.clear_actions();
        self.episode_id = self.episode_id_counter.next_episode_id();
    }

    fn agent_reset(&mut self) {
        self.actuator_manager.borrow_mut().reset_data();
        self.step_count = 0;
        if let Some(handler) = self.on_episode_begin.as_mut() {
            handler(self.episode_id);
        }
    }

    fn update_sensors(&mut self) {
        for sensor in self.sensors.iter_mut() {
            sensor.update();
        }
    }

    fn send_info_to_policy(&mut self) {
        if self.policy.is_none() {
            return;
        }

        if self.info.done {
            self.info.clear_actions();
        } else {
            let stored_actions = self.actuator_manager.borrow().stored_actions().clone();
            self.info.copy_actions(&stored_actions);
        }

        self.update_sensors();
        self.info.discrete_action_masks = self
            .actuator_manager
            .borrow_mut()
            .write_action_mask()
            .mask()
            .to_vec();

        self.info.reward = self.reward;
        self.info.group_reward = self.group_reward;
        self.info.done = false;
        self.info.max_step_reached = false;
        self.info.episode_id = self.episode_id;
        self.info.group_id = self.group_id;

        if let Some(policy) = self.policy.as_mut() {
            policy.request_decision(&self.info, &mut self.sensors);
        }
    }
}

impl AcademyObserver for Agent {
    fn on_pre_step(&mut self, academy_step: u64) {
        let Some(requester) = self.decision_requester else {
            return;
        };
        if requester.should_request_decision(academy_step) {
            self.request_decision();
        }
        if requester.should_request_action(academy_step) {
            self.request_action();
        }
    }

    fn on_increment_step(&mut self) {
        self.step_count += 1;
    }

    fn on_send_state(&mut self) {
        if self.request_decision {
            self.send_info_to_policy();
            self.reward = 0.0;
            self.group_reward = 0.0;
            self.request_decision = false;
        }
    }

    fn on_decide_action(&mut self) {
        let actions = match self.policy.as_mut() {
            Some(policy) => policy.decide_action(),
            None => ActionBuffers::empty(),
        };
        self.info.copy_actions(&actions);
        if let Err(e) = self.actuator_manager.borrow_mut().update_actions(&actions) {
            warn!("Agent {} dropped its actions: {}", self.episode_id, e);
        }
    }

    fn on_act(&mut self) {
        if self.request_action && self.policy.is_some() {
            self.request_action = false;
            self.actuator_manager.borrow_mut().execute_actions();
        }

        let max_step = self.behavior_parameters.max_step;
        if max_step > 0 && self.step_count >= max_step {
            self.end_episode_and_reset(DoneReason::MaxStepReached);
        }
    }

    fn on_force_reset(&mut self) {
        self.agent_reset();
    }

    fn on_communicator_disconnected(&mut self) {
        if self.communicator.take().is_some() {
            debug!("Agent {} falls back to its heuristic", self.episode_id);
            if self.policy.is_some() {
                self.reload_policy();
            }
        }
    }

    fn on_destroy(&mut self) {
        self.policy = None;
        self.communicator = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuators::DiscreteActionMask;
    use crate::config::AcademyConfig;
    use crate::policies::BehaviorType;
    use crate::sensors::{ObservationSpec, ObservationWriter};
    use std::cell::Cell;

    #[derive(Default)]
    struct Record {
        received: Vec<Vec<i32>>,
        resets: usize,
    }

    struct ScriptedActuator {
        spec: ActionSpec,
        record: Rc<RefCell<Record>>,
        next: i32,
        mask_first_action: bool,
    }

    impl Actuator for ScriptedActuator {
        fn action_spec(&self) -> &ActionSpec {
            &self.spec
        }

        fn name(&self) -> &str {
            "Scripted"
        }

        fn reset_data(&mut self) {
            self.record.borrow_mut().resets += 1;
        }

        fn heuristic(&mut self, actions_out: &ActionBuffers) {
            actions_out.discrete_actions.set(0, self.next);
            self.next += 1;
        }

        fn on_action_received(&mut self, actions: &ActionBuffers) {
            self.record
                .borrow_mut()
                .received
                .push(actions.discrete_actions.to_vec());
        }

        fn write_discrete_action_mask(&mut self, mask: &mut dyn DiscreteActionMask) {
            if self.mask_first_action {
                mask.set_action_enabled(0, 0, false);
            }
        }
    }

    struct CountingSensor {
        updates: Rc<Cell<usize>>,
        resets: Rc<Cell<usize>>,
    }

    impl Sensor for CountingSensor {
        fn observation_spec(&self) -> ObservationSpec {
            ObservationSpec::vector(1)
        }

        fn write(&mut self, writer: &mut ObservationWriter) -> usize {
            writer.set(0, self.updates.get() as f32);
            1
        }

        fn update(&mut self) {
            self.updates.set(self.updates.get() + 1);
        }

        fn reset(&mut self) {
            self.resets.set(self.resets.get() + 1);
        }

        fn name(&self) -> &str {
            "Counting"
        }
    }

    struct Fixture {
        academy: Rc<Academy>,
        agent: Rc<RefCell<Agent>>,
        record: Rc<RefCell<Record>>,
        sensor_updates: Rc<Cell<usize>>,
        sensor_resets: Rc<Cell<usize>>,
    }

    fn fixture(max_step: u32, requester: Option<DecisionRequester>, mask_first_action: bool) -> Fixture {
        let academy = Rc::new(Academy::new(&AcademyConfig::default()));
        academy.initialize(None);
        let record = Rc::new(RefCell::new(Record::default()));
        let sensor_updates = Rc::new(Cell::new(0));
        let sensor_resets = Rc::new(Cell::new(0));
        let parameters = BehaviorParameters {
            max_step,
            behavior_type: BehaviorType::HeuristicOnly,
            ..BehaviorParameters::new("Walker")
        };
        let actuator = ScriptedActuator {
            spec: ActionSpec::make_discrete(vec![8]),
            record: Rc::clone(&record),
            next: 1,
            mask_first_action,
        };
        let sensor = CountingSensor {
            updates: Rc::clone(&sensor_updates),
            resets: Rc::clone(&sensor_resets),
        };
        let agent = Agent::new(
            &academy,
            parameters,
            vec![Box::new(actuator)],
            vec![Box::new(sensor)],
            requester,
        )
        .unwrap();
        Fixture {
            academy,
            agent,
            record,
            sensor_updates,
            sensor_resets,
        }
    }

    #[test]
    fn test_decision_every_step_executes_heuristic_actions() {
        let f = fixture(0, Some(DecisionRequester::new(1, 0, false)), false);

        for _ in 0..3 {
            f.academy.environment_step().unwrap();
        }

        assert_eq!(f.record.borrow().received, vec![vec![1], vec![2], vec![3]]);
        assert_eq!(f.agent.borrow().step_count(), 3);
        assert_eq!(f.sensor_updates.get(), 3);
    }

    #[test]
    fn test_actions_repeat_between_decisions() {
        let f = fixture(0, Some(DecisionRequester::new(2, 0, true)), false);

        for _ in 0..4 {
            f.academy.environment_step().unwrap();
        }

        assert_eq!(f.record.borrow().received, vec![vec![1], vec![1], vec![2], vec![2]]);
    }

    #[test]
    fn test_without_requests_nothing_is_executed() {
        let f = fixture(0, None, false);

        f.academy.environment_step().unwrap();

        assert!(f.record.borrow().received.is_empty());
        assert_eq!(f.agent.borrow().step_count(), 1);
    }

    #[test]
    fn test_manual_request_decision() {
        let f = fixture(0, None, false);

        f.agent.borrow_mut().request_decision();
        f.academy.environment_step().unwrap();
        f.academy.environment_step().unwrap();

        assert_eq!(f.record.borrow().received, vec![vec![1]]);
    }

    #[test]
    fn test_max_step_ends_and_restarts_episode() {
        let f = fixture(2, Some(DecisionRequester::new(1, 0, false)), false);
        let first_episode = f.agent.borrow().episode_id();
        let begun = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&begun);
        f.agent
            .borrow_mut()
            .set_episode_begin_handler(move |id| log.borrow_mut().push(id));

        f.academy.environment_step().unwrap();
        f.academy.environment_step().unwrap();

        let agent = f.agent.borrow();
        assert_eq!(agent.completed_episodes(), 1);
        assert_eq!(agent.step_count(), 0);
        assert_ne!(agent.episode_id(), first_episode);
        assert!(agent.info().done);
        assert!(agent.info().max_step_reached);
        assert_eq!(*begun.borrow(), vec![first_episode, agent.episode_id()]);
        assert_eq!(f.sensor_resets.get(), 1);
    }

    #[test]
    fn test_notify_done_only_once_per_episode() {
        let f = fixture(0, None, false);
        let mut agent = f.agent.borrow_mut();

        agent.notify_agent_done(DoneReason::DoneCalled);
        agent.notify_agent_done(DoneReason::DoneCalled);

        assert_eq!(agent.completed_episodes(), 1);
        assert_eq!(f.sensor_resets.get(), 1);
    }

    #[test]
    fn test_disabled_episode_is_not_counted() {
        let f = fixture(0, Some(DecisionRequester::new(1, 0, false)), false);

        f.agent.borrow_mut().disable();
        f.academy.environment_step().unwrap();

        assert_eq!(f.agent.borrow().completed_episodes(), 0);
        assert!(f.record.borrow().received.is_empty());
    }

    #[test]
    fn test_rewards_accumulate_until_episode_end() {
        let f = fixture(0, None, false);
        let mut agent = f.agent.borrow_mut();

        agent.add_reward(1.0);
        agent.set_reward(0.25);
        agent.add_reward(0.5);
        assert_eq!(agent.reward(), 0.75);
        assert_eq!(agent.cumulative_reward(), 0.75);

        agent.end_episode();
        assert_eq!(agent.reward(), 0.0);
        assert_eq!(agent.cumulative_reward(), 0.0);
        assert_eq!(agent.info().reward, 0.75);
    }

    #[test]
    fn test_decision_resets_step_reward() {
        let f = fixture(0, Some(DecisionRequester::new(1, 0, false)), false);

        f.agent.borrow_mut().add_reward(2.0);
        f.academy.environment_step().unwrap();

        let agent = f.agent.borrow();
        assert_eq!(agent.reward(), 0.0);
        assert_eq!(agent.cumulative_reward(), 2.0);
        assert_eq!(agent.info().reward, 2.0);
    }

    #[test]
    fn test_action_mask_is_written_into_info() {
        let f = fixture(0, Some(DecisionRequester::new(1, 0, false)), true);

        f.academy.environment_step().unwrap();

        let agent = f.agent.borrow();
        let mask = &agent.info().discrete_action_masks;
        assert_eq!(mask.len(), 8);
        assert!(mask[0]);
        assert!(!mask[1]);
    }

    #[test]
    fn test_forced_reset_resets_actuators_and_steps() {
        let f = fixture(0, None, false);

        f.academy.environment_step().unwrap();
        f.academy.environment_step().unwrap();
        assert_eq!(f.agent.borrow().step_count(), 2);
        let resets_before = f.record.borrow().resets;

        f.academy.forced_full_reset();

        assert_eq!(f.agent.borrow().step_count(), 0);
        assert_eq!(f.record.borrow().resets, resets_before + 1);
    }

    #[test]
    fn test_episode_ids_are_unique_across_agents() {
        let f = fixture(0, None, false);
        let other = Agent::new(
            &f.academy,
            BehaviorParameters::new("Walker"),
            Vec::new(),
            Vec::new(),
            None,
        )
        .unwrap();

        let first = f.agent.borrow().episode_id();
        let second = other.borrow().episode_id();
        f.agent.borrow_mut().end_episode();

        assert_ne!(first, second);
        assert!(f.agent.borrow().episode_id() > second);
    }
}
