use prost::{Message, bytes::BytesMut};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use time::{OffsetDateTime, format_description};
use tracing::{info, warn};

use super::objects::UnrealMessageProto;
use super::transport::{Transport, TransportError};

/// Length-delimited log of every message exchanged with the trainer.
pub struct ReplayFile {
    file: File,
    path: PathBuf,
}

impl ReplayFile {
    pub fn create(replays_folder: &str, name: &str) -> io::Result<Self> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let description = format_description::parse("[year][month][day]-[hour][minute][second]")
            .map_err(io::Error::other)?;
        let date_time_str = now.format(&description).map_err(io::Error::other)?;

        let path = Path::new(replays_folder).join(format!("{} - {}.lockstep", name, date_time_str));

        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        info!("Recording exchanges to {}", path.display());
        Ok(ReplayFile { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, request: &UnrealMessageProto, response: &UnrealMessageProto) -> io::Result<()> {
        self.write_delimited_message(request)?;
        self.write_delimited_message(response)?;
        Ok(())
    }

    fn write_delimited_message<T: Message>(&mut self, message: &T) -> io::Result<()> {
        let mut buf = Vec::new();
        message.encode(&mut buf)?;

        let mut varint_buf = BytesMut::new();
        prost::encode_length_delimiter(buf.len(), &mut varint_buf)?;

        self.file.write_all(&varint_buf)?;
        self.file.write_all(&buf)?;
        self.file.flush()?;
        Ok(())
    }

    /// Reads back every message of a replay, alternating request and response.
    pub fn read_all(path: &Path) -> io::Result<Vec<UnrealMessageProto>> {
        let mut bytes = Vec::new();
        File::open(path)?.read_to_end(&mut bytes)?;

        let mut remaining = bytes.as_slice();
        let mut messages = Vec::new();
        while !remaining.is_empty() {
            let message = UnrealMessageProto::decode_length_delimited(&mut remaining)
                .map_err(io::Error::other)?;
            messages.push(message);
        }
        Ok(messages)
    }
}

/// Wraps a transport and records every exchange to a [`ReplayFile`].
pub struct RecordingTransport<T> {
    inner: T,
    replay_file: Option<ReplayFile>,
}

impl<T: Transport> RecordingTransport<T> {
    pub fn new(inner: T, replay_file: ReplayFile) -> Self {
        RecordingTransport {
            inner,
            replay_file: Some(replay_file),
        }
    }

    pub fn replay_path(&self) -> Option<&Path> {
        self.replay_file.as_ref().map(ReplayFile::path)
    }
}

impl<T: Transport> Transport for RecordingTransport<T> {
    fn exchange(&mut self, message: UnrealMessageProto) -> Result<UnrealMessageProto, TransportError> {
        let request = self.replay_file.as_ref().map(|_| message.clone());
        let response = self.inner.exchange(message)?;

        let write_result = match (&mut self.replay_file, &request) {
            (Some(replay_file), Some(request)) => replay_file.append(request, &response),
            _ => Ok(()),
        };
        if let Err(error) = write_result {
            warn!("Stopped recording exchanges: {}", error);
            self.replay_file = None;
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communicator::objects::{HeaderProto, STATUS_OK};

    struct EchoTransport;

    impl Transport for EchoTransport {
        fn exchange(&mut self, message: UnrealMessageProto) -> Result<UnrealMessageProto, TransportError> {
            Ok(message)
        }
    }

    #[test]
    fn test_recording_writes_request_and_response() {
        let folder = std::env::temp_dir().join(format!("lockstep-replay-{}", std::process::id()));
        let replay_file = ReplayFile::create(folder.to_str().unwrap(), "test").unwrap();
        let mut transport = RecordingTransport::new(EchoTransport, replay_file);
        let path = transport.replay_path().unwrap().to_path_buf();

        let message = UnrealMessageProto {
            header: Some(HeaderProto {
                status: STATUS_OK,
                message: String::new(),
            }),
            unreal_output: None,
            unreal_input: None,
        };
        transport.exchange(message.clone()).unwrap();

        let recorded = ReplayFile::read_all(&path).unwrap();
        assert_eq!(recorded, vec![message.clone(), message]);

        std::fs::remove_dir_all(folder).ok();
    }
}
