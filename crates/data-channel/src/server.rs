//! Device emulator (Uzebox side).
//!
//! Stands in for the ESP8266 + NetLoader firmware on a desktop: binds a
//! TCP port, accepts a single connection, echoes the chunk count and every
//! chunk back, answers `DONE`, and writes the received image to disk.

use std::net::SocketAddr;
use std::path::PathBuf;

use netloader_protocol::wire::{encode_chunk_count, read_chunk_count, read_exact_or_eof};
use netloader_protocol::{CHUNK_SIZE, DONE_SIGNAL};
use netloader_transfer::{UzeHeader, checksum_bytes};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::NetLoadError;

/// Deliberate misbehaviour for exercising client error paths.
#[derive(Debug, Clone, Default)]
pub struct EmulatorFaults {
    /// Acknowledge a chunk count one higher than received (wrapping at `u64::MAX`).
    pub bad_count_ack: bool,
    /// Flip the first byte of this chunk's echo.
    pub corrupt_chunk: Option<u64>,
    /// Answer the completion signal with something other than `DONE`.
    pub bad_done: bool,
}

/// What the emulator received in one session.
#[derive(Debug, Clone)]
pub struct ReceivedImage {
    pub total_chunks: u64,
    pub size: u64,
    pub header: UzeHeader,
    /// SHA-256 of the received image, hex encoded.
    pub checksum: String,
    pub output: PathBuf,
}

/// Single-connection device emulator.
pub struct DeviceEmulator {
    output: PathBuf,
    faults: EmulatorFaults,
}

impl DeviceEmulator {
    pub fn new(output: PathBuf, faults: EmulatorFaults) -> Self {
        Self { output, faults }
    }

    /// Binds the listener.
    pub async fn listen(&self, bind: SocketAddr) -> Result<TcpListener, NetLoadError> {
        let listener = TcpListener::bind(bind).await?;
        info!(addr = %listener.local_addr()?, "device emulator listening");
        Ok(listener)
    }

    /// Accepts a single connection and receives one image over it.
    pub async fn accept_and_receive(
        &self,
        listener: TcpListener,
    ) -> Result<ReceivedImage, NetLoadError> {
        let (mut stream, addr) = listener.accept().await?;
        info!(%addr, "client connected");

        // Only one connection per session.
        drop(listener);

        stream.set_nodelay(true)?;
        self.receive(&mut stream).await
    }

    /// Runs the device side of the protocol over `stream`.
    ///
    /// Every chunk but the last is exactly [`CHUNK_SIZE`] bytes. The last
    /// one has no length on the wire, so it is whatever the next read
    /// returns; the client sends it in one write and waits for its echo.
    pub async fn receive<S>(&self, stream: &mut S) -> Result<ReceivedImage, NetLoadError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let total_chunks = read_chunk_count(stream).await?;
        let ack = if self.faults.bad_count_ack {
            encode_chunk_count(total_chunks.wrapping_add(1))
        } else {
            encode_chunk_count(total_chunks)
        };
        stream.write_all(ack.as_bytes()).await?;
        stream.flush().await?;
        info!(total_chunks, "size handshake done");

        let mut image = Vec::new();
        for index in 0..total_chunks {
            let mut chunk = if index + 1 < total_chunks {
                let data = read_exact_or_eof(stream, CHUNK_SIZE).await?;
                if data.len() < CHUNK_SIZE {
                    return Err(NetLoadError::Protocol(format!(
                        "connection closed in chunk {index} after {} bytes",
                        data.len()
                    )));
                }
                data
            } else {
                let mut buf = vec![0u8; CHUNK_SIZE];
                let n = stream.read(&mut buf).await?;
                if n == 0 {
                    return Err(NetLoadError::Protocol(format!(
                        "connection closed before final chunk {index}"
                    )));
                }
                buf.truncate(n);
                buf
            };

            image.extend_from_slice(&chunk);
            if self.faults.corrupt_chunk == Some(index) {
                warn!(chunk = index, "corrupting echo");
                chunk[0] ^= 0xFF;
            }
            stream.write_all(&chunk).await?;
            stream.flush().await?;
            debug!(chunk = index, size = chunk.len(), "chunk echoed");
        }

        let done = read_exact_or_eof(stream, DONE_SIGNAL.len()).await?;
        if done != DONE_SIGNAL {
            return Err(NetLoadError::Protocol(format!(
                "expected DONE, got {:?}",
                String::from_utf8_lossy(&done)
            )));
        }
        let reply: &[u8] = if self.faults.bad_done { b"NOPE" } else { DONE_SIGNAL };
        stream.write_all(reply).await?;
        stream.flush().await?;

        tokio::fs::write(&self.output, &image).await?;

        let header = UzeHeader::parse(&image);
        let received = ReceivedImage {
            total_chunks,
            size: image.len() as u64,
            checksum: checksum_bytes(&image),
            output: self.output.clone(),
            header,
        };
        info!(
            name = %received.header.name,
            author = %received.header.author,
            year = received.header.year,
            size = received.size,
            checksum = %received.checksum,
            path = %received.output.display(),
            "image received"
        );
        Ok(received)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emulator(dir: &std::path::Path, faults: EmulatorFaults) -> DeviceEmulator {
        DeviceEmulator::new(dir.join("NETLOAD.BIN"), faults)
    }

    #[tokio::test]
    async fn receives_and_echoes() {
        let dir = tempfile::tempdir().unwrap();
        let emu = emulator(dir.path(), EmulatorFaults::default());
        let (mut client, mut device) = tokio::io::duplex(4096);

        let handle = tokio::spawn(async move { emu.receive(&mut device).await });

        client.write_all(b"2").await.unwrap();
        assert_eq!(read_exact_or_eof(&mut client, 1).await.unwrap(), b"2");

        let first = vec![0xAAu8; CHUNK_SIZE];
        client.write_all(&first).await.unwrap();
        assert_eq!(read_exact_or_eof(&mut client, CHUNK_SIZE).await.unwrap(), first);

        client.write_all(b"tail").await.unwrap();
        assert_eq!(read_exact_or_eof(&mut client, 4).await.unwrap(), b"tail");

        client.write_all(b"DONE").await.unwrap();
        assert_eq!(read_exact_or_eof(&mut client, 4).await.unwrap(), b"DONE");

        let received = handle.await.unwrap().unwrap();
        assert_eq!(received.total_chunks, 2);
        assert_eq!(received.size, CHUNK_SIZE as u64 + 4);

        let written = std::fs::read(dir.path().join("NETLOAD.BIN")).unwrap();
        assert_eq!(&written[..CHUNK_SIZE], &first[..]);
        assert_eq!(&written[CHUNK_SIZE..], b"tail");
    }

    #[tokio::test]
    async fn corrupt_chunk_fault_flips_first_byte() {
        let dir = tempfile::tempdir().unwrap();
        let faults = EmulatorFaults {
            corrupt_chunk: Some(0),
            ..EmulatorFaults::default()
        };
        let emu = emulator(dir.path(), faults);
        let (mut client, mut device) = tokio::io::duplex(4096);
        let handle = tokio::spawn(async move { emu.receive(&mut device).await });

        client.write_all(b"1").await.unwrap();
        read_exact_or_eof(&mut client, 1).await.unwrap();
        client.write_all(b"\x01\x02").await.unwrap();
        assert_eq!(read_exact_or_eof(&mut client, 2).await.unwrap(), b"\xFE\x02");

        drop(client);
        assert!(handle.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn bad_count_ack_at_largest_count() {
        let dir = tempfile::tempdir().unwrap();
        let faults = EmulatorFaults {
            bad_count_ack: true,
            ..EmulatorFaults::default()
        };
        let emu = emulator(dir.path(), faults);
        let (mut client, mut device) = tokio::io::duplex(4096);
        let handle = tokio::spawn(async move { emu.receive(&mut device).await });

        client.write_all(u64::MAX.to_string().as_bytes()).await.unwrap();
        assert_eq!(read_exact_or_eof(&mut client, 1).await.unwrap(), b"0");

        drop(client);
        assert!(handle.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn garbage_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let emu = emulator(dir.path(), EmulatorFaults::default());
        let (mut client, mut device) = tokio::io::duplex(4096);
        let handle = tokio::spawn(async move { emu.receive(&mut device).await });

        client.write_all(b"abc").await.unwrap();
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, NetLoadError::Protocol(_)));
    }

    #[tokio::test]
    async fn missing_done_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let emu = emulator(dir.path(), EmulatorFaults::default());
        let (mut client, mut device) = tokio::io::duplex(4096);
        let handle = tokio::spawn(async move { emu.receive(&mut device).await });

        client.write_all(b"0").await.unwrap();
        read_exact_or_eof(&mut client, 1).await.unwrap();
        client.write_all(b"STOP").await.unwrap();

        let err = handle.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("expected DONE"));
        assert!(!dir.path().join("NETLOAD.BIN").exists());
    }
}
