use std::cell::RefCell;
use std::rc::Rc;

use super::Policy;
use crate::actuators::{ActionBuffers, ActionSpec, ActuatorManager};
use crate::agents::AgentInfo;
use crate::sensors::Sensor;

/// Asks the agent's actuators for hand-written actions.
pub struct HeuristicPolicy {
    actuator_manager: Rc<RefCell<ActuatorManager>>,
    action_buffers: ActionBuffers,
    done: bool,
    decision_requested: bool,
}

impl HeuristicPolicy {
    pub fn new(actuator_manager: Rc<RefCell<ActuatorManager>>, action_spec: &ActionSpec) -> Self {
        HeuristicPolicy {
            actuator_manager,
            action_buffers: ActionBuffers::from_spec(action_spec),
            done: false,
            decision_requested: false,
        }
    }
}

impl Policy for HeuristicPolicy {
    fn request_decision(&mut self, info: &AgentInfo, sensors: &mut [Box<dyn Sensor>]) {
        for sensor in sensors.iter_mut() {
            sensor.update();
        }
        self.done = info.done;
        self.decision_requested = true;
    }

    fn decide_action(&mut self) -> ActionBuffers {
        if !self.done && self.decision_requested {
            self.action_buffers.clear();
            self.actuator_manager
                .borrow_mut()
                .apply_heuristic(&self.action_buffers);
        }
        self.decision_requested = false;
        self.action_buffers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuators::Actuator;

    struct ConstantActuator {
        spec: ActionSpec,
        value: i32,
    }

    impl Actuator for ConstantActuator {
        fn action_spec(&self) -> &ActionSpec {
            &self.spec
        }

        fn name(&self) -> &str {
            "Constant"
        }

        fn heuristic(&mut self, actions_out: &ActionBuffers) {
            actions_out.discrete_actions.set(0, self.value);
        }

        fn on_action_received(&mut self, _actions: &ActionBuffers) {}
    }

    fn policy() -> HeuristicPolicy {
        let spec = ActionSpec::make_discrete(vec![4]);
        let mut manager = ActuatorManager::new();
        manager
            .add(Box::new(ConstantActuator {
                spec: spec.clone(),
                value: 3,
            }))
            .unwrap();
        HeuristicPolicy::new(Rc::new(RefCell::new(manager)), &spec)
    }

    #[test]
    fn test_heuristic_runs_only_when_requested() {
        let mut policy = policy();

        assert_eq!(policy.decide_action().discrete_actions.to_vec(), vec![0]);

        policy.request_decision(&AgentInfo::default(), &mut []);
        assert_eq!(policy.decide_action().discrete_actions.to_vec(), vec![3]);
    }

    #[test]
    fn test_done_agent_gets_no_new_actions() {
        let mut policy = policy();
        let info = AgentInfo {
            done: true,
            ..Default::default()
        };

        policy.request_decision(&info, &mut []);

        assert_eq!(policy.decide_action().discrete_actions.to_vec(), vec![0]);
    }
}
