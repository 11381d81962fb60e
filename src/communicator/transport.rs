use std::error::Error;
use std::fmt;
use std::io;

use super::objects::UnrealMessageProto;

/// One blocking request/response round trip with the trainer.
pub trait Transport {
    fn exchange(&mut self, message: UnrealMessageProto) -> Result<UnrealMessageProto, TransportError>;
}

#[derive(Debug)]
pub enum TransportError {
    Connect(String),
    Rpc(tonic::Status),
    Io(io::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportError::Connect(reason) => write!(formatter, "Connection failed: {}", reason),
            TransportError::Rpc(status) => write!(
                formatter,
                "Exchange failed ({:?}): {}",
                status.code(),
                status.message()
            ),
            TransportError::Io(error) => write!(formatter, "I/O error: {}", error),
        }
    }
}

impl Error for TransportError {}

impl From<tonic::Status> for TransportError {
    fn from(status: tonic::Status) -> Self {
        TransportError::Rpc(status)
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        TransportError::Io(error)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, message: UnrealMessageProto) -> Result<UnrealMessageProto, TransportError> {
        (**self).exchange(message)
    }
}
