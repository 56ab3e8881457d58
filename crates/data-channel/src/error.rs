//! Error types for a transfer session.

use std::net::SocketAddr;
use std::path::PathBuf;

use netloader_protocol::ProtocolError;
use netloader_transfer::TransferError;

/// Errors that abort a transfer session. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum NetLoadError {
    #[error(
        "{} doesn't appear to be a valid .uze file (starts with {:?}); use --force to send it anyways",
        .path.display(),
        String::from_utf8_lossy(.found)
    )]
    Validation { path: PathBuf, found: Vec<u8> },

    #[error("could not connect to {addr}")]
    Connection {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("data mismatch\nExpected: {expected}\nUzebox replied: {received}")]
    HandshakeMismatch { expected: String, received: String },

    #[error(
        "data mismatch in chunk {index}\nExpected: {}\nUzebox replied: {}",
        hex::encode(.expected),
        hex::encode(.received)
    )]
    ChunkMismatch {
        index: u64,
        expected: Vec<u8>,
        received: Vec<u8>,
    },

    #[error(
        "Uzebox didn't reply to DONE signal\nUzebox replied: {:?}",
        String::from_utf8_lossy(.received)
    )]
    Completion { received: Vec<u8> },

    #[error("image error: {0}")]
    Transfer(#[from] TransferError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<ProtocolError> for NetLoadError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => Self::Io(e),
            other => Self::Protocol(other.to_string()),
        }
    }
}
