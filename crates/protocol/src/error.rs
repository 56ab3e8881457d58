//! Error types for the wire protocol.

/// Errors produced while decoding protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("empty chunk count")]
    EmptyCount,

    #[error("chunk count is not a decimal number: {0:?}")]
    InvalidCount(String),
}
