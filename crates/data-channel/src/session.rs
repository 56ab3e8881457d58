//! Transfer session: size handshake, chunk echo loop and completion.
//!
//! A session owns the image file from validation until it is dropped. The
//! stream is borrowed for the run; [`DeviceClient`](crate::DeviceClient)
//! owns it and decides when to close it.

use std::path::Path;
use std::time::{Duration, Instant};

use netloader_protocol::wire::{
    digit_count, encode_chunk_count, read_exact_or_eof, write_chunk, write_chunk_count,
    write_done,
};
use netloader_protocol::{CHUNK_SIZE, DONE_SIGNAL, POST_HANDSHAKE_DELAY};
use netloader_transfer::{
    ChunkReader, SpeedCalculator, TransferError, TransferProgress, UzeHeader,
    calculate_file_checksum,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use crate::error::NetLoadError;

/// Lifecycle of a transfer session.
///
/// `Validated → Connected → SizeAgreed → Sending(i) ⇄ Verifying(i) →
/// Completed`. Any failure moves the session to `Aborted`, which is terminal.
///
/// There is no idle state: a session only exists once its image has passed
/// validation in [`TransferSession::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Validated,
    Connected,
    SizeAgreed,
    Sending(u64),
    Verifying(u64),
    Completed,
    Aborted,
}

/// Per-run session options.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Send the file even if it lacks the `.uze` marker.
    pub force: bool,
    /// Pause between the size handshake and the first chunk.
    pub post_handshake_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            force: false,
            post_handshake_delay: POST_HANDSHAKE_DELAY,
        }
    }
}

/// Callback invoked after each verified chunk.
pub type ProgressCallback = Box<dyn FnMut(TransferProgress) + Send>;

/// Summary of a completed transfer.
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub total_chunks: u64,
    pub bytes_sent: u64,
    pub elapsed: Duration,
    /// SHA-256 of the image, hex encoded.
    pub checksum: String,
}

impl TransferReport {
    /// Average throughput over the whole session.
    pub fn bytes_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes_sent as f64 / secs
    }
}

/// A single transfer of one image to one device.
pub struct TransferSession {
    reader: ChunkReader,
    header: UzeHeader,
    options: SessionOptions,
    state: SessionState,
    total_chunks: u64,
    current_chunk: u64,
    bytes_sent: u64,
    checksum: String,
    on_progress: Option<ProgressCallback>,
}

impl TransferSession {
    /// Opens and validates the image.
    ///
    /// Fails with [`NetLoadError::Validation`] if the file does not start
    /// with the `.uze` marker and `options.force` is not set. Nothing touches
    /// the network here.
    pub fn open(path: &Path, options: SessionOptions) -> Result<Self, NetLoadError> {
        let mut reader = ChunkReader::new(path, CHUNK_SIZE)?;
        let header = reader.read_header()?;

        if !header.has_valid_marker() {
            if !options.force {
                return Err(NetLoadError::Validation {
                    path: path.to_path_buf(),
                    found: header.marker,
                });
            }
            info!(path = %path.display(), "no .uze marker, sending anyway (forced)");
        }

        let checksum = calculate_file_checksum(path)?;
        let total_chunks = reader.total_chunks();

        debug!(
            path = %path.display(),
            name = %header.name,
            file_size = reader.file_size(),
            total_chunks,
            "image validated"
        );

        Ok(Self {
            reader,
            header,
            options,
            state: SessionState::Validated,
            total_chunks,
            current_chunk: 0,
            bytes_sent: 0,
            checksum,
            on_progress: None,
        })
    }

    /// Registers a progress callback, replacing any previous one.
    pub fn on_progress(&mut self, callback: ProgressCallback) {
        self.on_progress = Some(callback);
    }

    /// Records that the device connection is up.
    pub(crate) fn connected(&mut self) -> Result<(), NetLoadError> {
        if self.state != SessionState::Validated {
            return Err(NetLoadError::Protocol(format!(
                "session cannot connect from state {:?}",
                self.state
            )));
        }
        self.state = SessionState::Connected;
        Ok(())
    }

    pub(crate) fn abort(&mut self) {
        self.state = SessionState::Aborted;
    }

    /// Runs the handshake, chunk loop and completion over `stream`.
    ///
    /// The session must be `Connected`, so it runs at most once; any error
    /// leaves it `Aborted`.
    pub(crate) async fn run<S>(&mut self, stream: &mut S) -> Result<TransferReport, NetLoadError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if self.state != SessionState::Connected {
            return Err(NetLoadError::Protocol(format!(
                "session cannot run from state {:?}",
                self.state
            )));
        }

        let started = Instant::now();
        let result = self.drive(stream).await;
        match &result {
            Ok(()) => self.state = SessionState::Completed,
            Err(e) => {
                debug!(state = ?self.state, chunk = self.current_chunk, error = %e, "transfer aborted");
                self.abort();
            }
        }
        result?;

        let report = TransferReport {
            total_chunks: self.total_chunks,
            bytes_sent: self.bytes_sent,
            elapsed: started.elapsed(),
            checksum: self.checksum.clone(),
        };
        debug!(
            total_chunks = report.total_chunks,
            bytes = report.bytes_sent,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "transfer complete"
        );
        Ok(report)
    }

    async fn drive<S>(&mut self, stream: &mut S) -> Result<(), NetLoadError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.size_handshake(stream).await?;

        if !self.options.post_handshake_delay.is_zero() {
            tokio::time::sleep(self.options.post_handshake_delay).await;
        }

        self.send_chunks(stream).await?;
        self.complete(stream).await
    }

    async fn size_handshake<S>(&mut self, stream: &mut S) -> Result<(), NetLoadError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let expected = encode_chunk_count(self.total_chunks);
        debug!(count = %expected, "sending size data");
        write_chunk_count(stream, self.total_chunks).await?;

        debug!("waiting for reply");
        let reply = read_exact_or_eof(stream, digit_count(self.total_chunks)).await?;
        let received = String::from_utf8_lossy(&reply).into_owned();
        if received != expected {
            return Err(NetLoadError::HandshakeMismatch { expected, received });
        }

        self.state = SessionState::SizeAgreed;
        Ok(())
    }

    async fn send_chunks<S>(&mut self, stream: &mut S) -> Result<(), NetLoadError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let total_bytes = self.reader.file_size();
        let mut speed = SpeedCalculator::default();

        while self.current_chunk < self.total_chunks {
            let chunk = self
                .reader
                .next_chunk()?
                .ok_or(TransferError::UnexpectedEof {
                    offset: self.reader.offset(),
                    expected: total_bytes,
                })?;

            self.state = SessionState::Sending(chunk.index);
            debug!(
                chunk = chunk.index,
                total = self.total_chunks,
                size = chunk.data.len(),
                data = %hex::encode(&chunk.data),
                "sending chunk"
            );
            write_chunk(stream, &chunk.data).await?;

            self.state = SessionState::Verifying(chunk.index);
            let echo = read_exact_or_eof(stream, chunk.data.len()).await?;
            if echo != chunk.data {
                return Err(NetLoadError::ChunkMismatch {
                    index: chunk.index,
                    expected: chunk.data,
                    received: echo,
                });
            }

            self.current_chunk += 1;
            self.bytes_sent += chunk.data.len() as u64;
            speed.add_sample(chunk.data.len() as u64);

            let progress = TransferProgress {
                current_chunk: self.current_chunk,
                total_chunks: self.total_chunks,
                bytes_sent: self.bytes_sent,
                total_bytes,
            };
            debug!(
                chunk = chunk.index,
                percent = progress.percent(),
                eta_ms = speed
                    .eta(total_bytes - self.bytes_sent)
                    .map(|d| d.as_millis() as u64),
                "chunk verified"
            );
            if let Some(cb) = self.on_progress.as_mut() {
                cb(progress);
            }
        }
        Ok(())
    }

    async fn complete<S>(&mut self, stream: &mut S) -> Result<(), NetLoadError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        debug!("sending DONE");
        write_done(stream).await?;

        let reply = read_exact_or_eof(stream, DONE_SIGNAL.len()).await?;
        if reply != DONE_SIGNAL {
            return Err(NetLoadError::Completion { received: reply });
        }
        Ok(())
    }

    /// Parsed `.uze` header (fields are empty for forced non-`.uze` files).
    pub fn header(&self) -> &UzeHeader {
        &self.header
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn file_size(&self) -> u64 {
        self.reader.file_size()
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Chunks sent and verified so far.
    pub fn current_chunk(&self) -> u64 {
        self.current_chunk
    }
}
