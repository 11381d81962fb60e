pub mod grpc_client;
pub mod objects;
pub mod replay;
pub mod rpc_communicator;
pub mod transport;
pub mod version;

use std::error::Error;
use std::fmt;

use crate::actuators::{ActionBuffers, ActionSpec};
use crate::agents::AgentInfo;
use crate::sensors::Sensor;

pub use grpc_client::GrpcTransport;
pub use replay::RecordingTransport;
pub use rpc_communicator::RpcCommunicator;
pub use transport::{Transport, TransportError};

/// Parameters sent to the trainer during the handshake.
#[derive(Debug, Clone)]
pub struct CommunicatorInitParameters {
    pub port: u16,
    pub name: String,
    pub package_version: String,
    pub communication_version: String,
}

/// Parameters received from the trainer during the handshake.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RlInitParameters {
    pub seed: i32,
    pub num_areas: i32,
    pub trainer_package_version: String,
    pub trainer_communication_version: String,
}

/// Notifications raised while talking to the trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicatorEvent {
    Reset,
    Quit,
    /// The transport failed and the channel was closed.
    Disconnected,
    RlInputReceived { is_training: bool },
}

/// Batches agent observations into one exchange per step and hands back actions.
pub trait Communicator {
    fn initialize(
        &mut self,
        parameters: &CommunicatorInitParameters,
    ) -> Result<RlInitParameters, CommunicatorError>;

    /// Registers a behavior. Its action spec is sent with the next batch containing its agents.
    fn subscribe_brain(&mut self, behavior_name: &str, action_spec: &ActionSpec);

    fn put_observations(
        &mut self,
        behavior_name: &str,
        info: &AgentInfo,
        sensors: &mut [Box<dyn Sensor>],
    );

    /// Exchanges the pending batch. Does nothing when no observation was put since the last call.
    fn decide_batch(&mut self);

    /// Last actions received for the agent, empty when none arrived.
    fn get_actions(&self, behavior_name: &str, episode_id: i32) -> ActionBuffers;

    fn is_open(&self) -> bool;

    fn dispose(&mut self);
}

#[derive(Debug)]
pub enum CommunicatorError {
    Closed,
    Transport(TransportError),
    BadStatus { status: i32 },
    MissingInitializationInput,
    IncompatibleVersion { local: String, trainer: String },
}

impl fmt::Display for CommunicatorError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommunicatorError::Closed => write!(formatter, "Communicator channel is closed"),
            CommunicatorError::Transport(error) => write!(formatter, "Transport error: {}", error),
            CommunicatorError::BadStatus { status } => {
                write!(formatter, "Trainer answered with status {}", status)
            }
            CommunicatorError::MissingInitializationInput => {
                write!(formatter, "Trainer did not send initialization parameters")
            }
            CommunicatorError::IncompatibleVersion { local, trainer } => write!(
                formatter,
                "Communication version {} is not compatible with trainer version {}",
                local, trainer
            ),
        }
    }
}

impl Error for CommunicatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CommunicatorError::Transport(error) => Some(error),
            _ => None,
        }
    }
}

impl From<TransportError> for CommunicatorError {
    fn from(error: TransportError) -> Self {
        CommunicatorError::Transport(error)
    }
}
