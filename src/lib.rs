pub mod academy;
pub mod actuators;
pub mod agents;
pub mod communicator;
pub mod config;
pub mod policies;
pub mod sensors;

pub use academy::{Academy, AcademyError, AcademyObserver};
pub use agents::Agent;
pub use config::AcademyConfig;
