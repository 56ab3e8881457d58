use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use netloader_protocol::CHUNK_SIZE;
use sha2::{Digest, Sha256};

use crate::TransferError;
use crate::header::UzeHeader;
use crate::types::Chunk;

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn checksum_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
pub fn calculate_file_checksum(path: &Path) -> Result<String, TransferError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads an image sequentially in fixed-size chunks.
pub struct ChunkReader {
    file: File,
    chunk_size: usize,
    offset: u64,
    index: u64,
    file_size: u64,
}

impl ChunkReader {
    /// Opens `path` for chunked reading.
    ///
    /// If `chunk_size` is 0, [`CHUNK_SIZE`] (128 bytes) is used.
    pub fn new(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        Self::from_file(File::open(path)?, chunk_size)
    }

    fn from_file(mut file: File, chunk_size: usize) -> Result<Self, TransferError> {
        let file_size = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        let chunk_size = if chunk_size == 0 {
            CHUNK_SIZE
        } else {
            chunk_size
        };
        Ok(Self {
            file,
            chunk_size,
            offset: 0,
            index: 0,
            file_size,
        })
    }

    /// Reads the header and rewinds, leaving the reader at offset 0.
    pub fn read_header(&mut self) -> Result<UzeHeader, TransferError> {
        let header = UzeHeader::read_from(&mut self.file)?;
        self.offset = 0;
        self.index = 0;
        Ok(header)
    }

    /// Reads the next chunk. Returns `None` once the whole image was read.
    ///
    /// Fails if the file turns out shorter than its size at open time.
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        let remaining = self.remaining();
        if remaining == 0 {
            return Ok(None);
        }

        let read_size = remaining.min(self.chunk_size as u64);
        let mut data = Vec::with_capacity(read_size as usize);
        (&mut self.file).take(read_size).read_to_end(&mut data)?;
        if data.is_empty() {
            return Err(TransferError::UnexpectedEof {
                offset: self.offset,
                expected: self.file_size,
            });
        }

        let chunk = Chunk {
            index: self.index,
            offset: self.offset,
            data,
        };
        self.offset += chunk.data.len() as u64;
        self.index += 1;
        Ok(Some(chunk))
    }

    /// Number of chunks the image splits into.
    pub fn total_chunks(&self) -> u64 {
        netloader_protocol::wire::total_chunks(self.file_size, self.chunk_size)
    }

    /// Current byte offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes remaining to read.
    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.offset)
    }
}
