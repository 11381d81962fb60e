pub mod behavior_parameters;
pub mod heuristic_policy;
pub mod remote_policy;

pub use behavior_parameters::{BehaviorParameters, BehaviorType};
pub use heuristic_policy::HeuristicPolicy;
pub use remote_policy::RemotePolicy;

use crate::actuators::ActionBuffers;
use crate::agents::AgentInfo;
use crate::sensors::Sensor;

/// Turns agent observations into actions.
pub trait Policy {
    /// Registers the agent's latest state. Actions are only produced by `decide_action`.
    fn request_decision(&mut self, info: &AgentInfo, sensors: &mut [Box<dyn Sensor>]);

    fn decide_action(&mut self) -> ActionBuffers;

    /// `true` when actions come from a trainer.
    fn is_remote(&self) -> bool {
        false
    }
}
