use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use super::{HeuristicPolicy, Policy, RemotePolicy};
use crate::actuators::{ActionSpec, ActuatorManager};
use crate::communicator::Communicator;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BehaviorType {
    /// Remote when a trainer is connected, heuristic otherwise.
    #[default]
    Default,
    HeuristicOnly,
}

/// How the agents sharing a behavior are driven.
#[derive(Debug, Clone)]
pub struct BehaviorParameters {
    pub behavior_name: String,
    pub team_id: i32,
    pub behavior_type: BehaviorType,
    /// Steps before an episode ends on its own. `0` disables the limit.
    pub max_step: u32,
}

impl Default for BehaviorParameters {
    fn default() -> Self {
        BehaviorParameters {
            behavior_name: "My Behavior".to_string(),
            team_id: 0,
            behavior_type: BehaviorType::Default,
            max_step: 0,
        }
    }
}

impl BehaviorParameters {
    pub fn new(behavior_name: &str) -> Self {
        BehaviorParameters {
            behavior_name: behavior_name.to_string(),
            ..Default::default()
        }
    }

    /// Name the trainer uses to group agents, e.g. `Walker?team=0`.
    pub fn fully_qualified_behavior_name(&self) -> String {
        format!("{}?team={}", self.behavior_name, self.team_id)
    }

    pub fn is_in_heuristic_mode(&self) -> bool {
        self.behavior_type == BehaviorType::HeuristicOnly
    }

    pub fn generate_policy(
        &self,
        action_spec: &ActionSpec,
        actuator_manager: Rc<RefCell<ActuatorManager>>,
        communicator: Option<Rc<RefCell<dyn Communicator>>>,
    ) -> Box<dyn Policy> {
        match (self.behavior_type, communicator) {
            (BehaviorType::Default, Some(communicator)) if communicator.borrow().is_open() => {
                debug!("Behavior {} uses the remote policy", self.behavior_name);
                Box::new(RemotePolicy::new(
                    communicator,
                    action_spec,
                    &self.fully_qualified_behavior_name(),
                ))
            }
            _ => {
                debug!("Behavior {} uses the heuristic policy", self.behavior_name);
                Box::new(HeuristicPolicy::new(actuator_manager, action_spec))
            }
        }
    }
}
