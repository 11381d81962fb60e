pub mod action_mask;
pub mod action_segment;
pub mod action_spec;
pub mod actuator_manager;
pub mod vector_actuator;

use std::error::Error;
use std::fmt;

pub use action_mask::{ActuatorDiscreteActionMask, DiscreteActionMask};
pub use action_segment::{ActionBuffers, ActionSegment, ActionValue};
pub use action_spec::ActionSpec;
pub use actuator_manager::ActuatorManager;
pub use vector_actuator::{ActionReceiver, HeuristicProvider, VectorActuator};

/// Something that turns action values into effects on the simulation.
pub trait Actuator {
    fn action_spec(&self) -> &ActionSpec;

    /// Used to sort actuators, so it must be unique within an agent.
    fn name(&self) -> &str;

    /// Called at the end of an episode.
    fn reset_data(&mut self) {}

    /// Fills `actions_out` when no trainer is driving the agent.
    fn heuristic(&mut self, _actions_out: &ActionBuffers) {}

    fn on_action_received(&mut self, actions: &ActionBuffers);

    fn write_discrete_action_mask(&mut self, _action_mask: &mut dyn DiscreteActionMask) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorError {
    AlreadyReady { operation: &'static str },
    IndexOutOfRange { index: usize, len: usize },
    MixedActionSpace { num_continuous_actions: usize, num_discrete_branches: usize },
    SizeMismatch { kind: &'static str, expected: usize, actual: usize },
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActuatorError::AlreadyReady { operation } => write!(
                formatter,
                "Cannot {} the actuator manager after its buffers have been initialized",
                operation
            ),
            ActuatorError::IndexOutOfRange { index, len } => {
                write!(formatter, "Actuator index {} out of range ({} actuators)", index, len)
            }
            ActuatorError::MixedActionSpace { num_continuous_actions, num_discrete_branches } => {
                write!(
                    formatter,
                    "Mixed action space ({} continuous actions, {} discrete branches)",
                    num_continuous_actions, num_discrete_branches
                )
            }
            ActuatorError::SizeMismatch { kind, expected, actual } => write!(
                formatter,
                "{} action buffer has {} values, expected {}",
                kind, actual, expected
            ),
        }
    }
}

impl Error for ActuatorError {}
