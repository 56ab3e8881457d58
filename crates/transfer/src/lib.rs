//! Game image access for NetLoader: `.uze` header parsing, fixed-size chunk
//! reads and progress tracking.

mod chunked;
mod header;
mod progress;
mod types;

pub use chunked::{ChunkReader, calculate_file_checksum, checksum_bytes};
pub use header::{UZE_MARKER, UzeHeader};
pub use progress::{SpeedCalculator, TransferProgress};
pub use types::Chunk;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image ended at byte {offset}, expected {expected} bytes")]
    UnexpectedEof { offset: u64, expected: u64 },
}
