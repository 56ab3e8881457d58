//! TCP client (desktop side).
//!
//! Connects to the device's TCP server and drives a [`TransferSession`]
//! over the connection.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::NetLoadError;
use crate::session::{TransferReport, TransferSession};

/// Opens a TCP connection, giving up after `timeout`.
///
/// Timeouts and refusals both surface as [`NetLoadError::Connection`].
pub async fn connect(addr: SocketAddr, timeout: Duration) -> Result<TcpStream, NetLoadError> {
    let stream = within_timeout(addr, timeout, TcpStream::connect(addr)).await?;

    // Chunks are tiny and every write waits for its echo.
    stream.set_nodelay(true)?;
    debug!(%addr, "connected to device");
    Ok(stream)
}

async fn within_timeout<T, F>(
    addr: SocketAddr,
    timeout: Duration,
    attempt: F,
) -> Result<T, NetLoadError>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(NetLoadError::Connection { addr, source }),
        Err(_) => Err(NetLoadError::Connection {
            addr,
            source: io::Error::new(
                io::ErrorKind::TimedOut,
                format!("timed out after {}s", timeout.as_secs_f32()),
            ),
        }),
    }
}

/// TCP client that pushes one image to the device.
pub struct DeviceClient;

impl DeviceClient {
    /// Connects to `addr` and runs an already validated session.
    ///
    /// The socket is closed before returning, on success and on failure.
    /// The session keeps its final state for the caller to inspect; a
    /// failed connect leaves it `Aborted`.
    pub async fn connect_and_send(
        session: &mut TransferSession,
        addr: SocketAddr,
        connect_timeout: Duration,
    ) -> Result<TransferReport, NetLoadError> {
        let mut stream = match connect(addr, connect_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                session.abort();
                return Err(e);
            }
        };
        session.connected()?;

        let result = session.run(&mut stream).await;

        if result.is_ok() {
            // Best effort: the device may already have dropped the link.
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "socket shutdown failed");
            }
        }
        drop(stream);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::server::{DeviceEmulator, EmulatorFaults};
    use crate::session::{SessionOptions, SessionState};
    use tokio::net::TcpListener;

    fn fast() -> SessionOptions {
        SessionOptions {
            force: false,
            post_handshake_delay: Duration::ZERO,
        }
    }

    /// Validates `path`, then connects and sends it, the way the CLI does.
    async fn send_file(path: &Path, addr: SocketAddr) -> Result<TransferReport, NetLoadError> {
        let mut session = TransferSession::open(path, fast())?;
        DeviceClient::connect_and_send(&mut session, addr, Duration::from_secs(5)).await
    }

    fn uze_image(len: usize, name: &str) -> Vec<u8> {
        let mut data: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
        data[..6].copy_from_slice(b"UZEBOX");
        data[12..14].copy_from_slice(&2024u16.to_le_bytes());
        let name_field = &mut data[14..45];
        name_field.fill(0);
        name_field[..name.len()].copy_from_slice(name.as_bytes());
        data
    }

    /// Integration test: client -> emulator full pipeline over loopback.
    #[tokio::test]
    async fn client_emulator_integration() {
        let dir = tempfile::tempdir().unwrap();
        let data = uze_image(1000, "Megatris");
        let src = dir.path().join("megatris.uze");
        std::fs::write(&src, &data).unwrap();
        let out = dir.path().join("NETLOAD.BIN");

        let emulator = DeviceEmulator::new(out.clone(), EmulatorFaults::default());
        let listener = emulator.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let device = tokio::spawn(async move { emulator.accept_and_receive(listener).await });

        let report = send_file(&src, addr).await.unwrap();
        let received = device.await.unwrap().unwrap();

        assert_eq!(report.total_chunks, 8);
        assert_eq!(report.bytes_sent, 1000);
        assert_eq!(received.total_chunks, 8);
        assert_eq!(received.size, 1000);
        assert_eq!(received.header.name, "Megatris");
        assert_eq!(received.header.year, 2024);
        assert_eq!(received.checksum, report.checksum);
        assert_eq!(std::fs::read(&out).unwrap(), data);
    }

    #[tokio::test]
    async fn emulator_corruption_aborts_client() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("game.uze");
        std::fs::write(&src, uze_image(500, "Corrupt")).unwrap();

        let faults = EmulatorFaults {
            corrupt_chunk: Some(2),
            ..EmulatorFaults::default()
        };
        let emulator = DeviceEmulator::new(dir.path().join("out.bin"), faults);
        let listener = emulator.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = tokio::spawn(async move { emulator.accept_and_receive(listener).await });

        let err = send_file(&src, addr).await.unwrap_err();
        assert!(matches!(err, NetLoadError::ChunkMismatch { index: 2, .. }));

        // The device sees the link drop instead of chunk 3.
        assert!(device.await.unwrap().is_err());
        assert!(!dir.path().join("out.bin").exists());
    }

    #[tokio::test]
    async fn emulator_bad_count_ack_aborts_client() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("game.uze");
        std::fs::write(&src, uze_image(300, "Ack")).unwrap();

        let faults = EmulatorFaults {
            bad_count_ack: true,
            ..EmulatorFaults::default()
        };
        let emulator = DeviceEmulator::new(dir.path().join("out.bin"), faults);
        let listener = emulator.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = tokio::spawn(async move { emulator.accept_and_receive(listener).await });

        let err = send_file(&src, addr).await.unwrap_err();
        assert!(matches!(err, NetLoadError::HandshakeMismatch { .. }));
        assert!(device.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn emulator_bad_done_fails_completion() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("game.uze");
        std::fs::write(&src, uze_image(300, "Done")).unwrap();

        let faults = EmulatorFaults {
            bad_done: true,
            ..EmulatorFaults::default()
        };
        let emulator = DeviceEmulator::new(dir.path().join("out.bin"), faults);
        let listener = emulator.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = tokio::spawn(async move { emulator.accept_and_receive(listener).await });

        let err = send_file(&src, addr).await.unwrap_err();
        assert!(matches!(err, NetLoadError::Completion { .. }));
        device.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn invalid_image_never_connects() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        std::fs::write(&src, b"definitely not a game image").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let err = send_file(&src, addr).await.unwrap_err();
        assert!(matches!(err, NetLoadError::Validation { .. }));

        let accepted =
            tokio::time::timeout(Duration::from_millis(200), listener.accept()).await;
        assert!(accepted.is_err(), "no connection should have been made");
    }

    #[tokio::test]
    async fn refused_connection_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = connect(addr, Duration::from_secs(5)).await.unwrap_err();
        match err {
            NetLoadError::Connection { addr: a, .. } => assert_eq!(a, addr),
            other => panic!("expected Connection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_connection_aborts_session() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("game.uze");
        std::fs::write(&src, uze_image(300, "Refused")).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut session = TransferSession::open(&src, fast()).unwrap();
        let err = DeviceClient::connect_and_send(&mut session, addr, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, NetLoadError::Connection { .. }));
        assert_eq!(session.state(), SessionState::Aborted);
        assert_eq!(session.current_chunk(), 0);
    }

    #[tokio::test]
    async fn sent_session_is_completed() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("game.uze");
        std::fs::write(&src, uze_image(300, "Complete")).unwrap();

        let emulator = DeviceEmulator::new(dir.path().join("out.bin"), EmulatorFaults::default());
        let listener = emulator.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let device = tokio::spawn(async move { emulator.accept_and_receive(listener).await });

        let mut session = TransferSession::open(&src, fast()).unwrap();
        assert_eq!(session.state(), SessionState::Validated);
        DeviceClient::connect_and_send(&mut session, addr, Duration::from_secs(5))
            .await
            .unwrap();
        device.await.unwrap().unwrap();

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.current_chunk(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_connect_times_out() {
        let addr: SocketAddr = "192.168.4.1:333".parse().unwrap();
        let timeout = Duration::from_secs(10);

        let started = tokio::time::Instant::now();
        let err = within_timeout(addr, timeout, std::future::pending::<io::Result<()>>())
            .await
            .unwrap_err();
        assert!(started.elapsed() >= timeout);

        match err {
            NetLoadError::Connection { addr: a, source } => {
                assert_eq!(a, addr);
                assert_eq!(source.kind(), io::ErrorKind::TimedOut);
                assert!(source.to_string().contains("timed out after 10s"));
            }
            other => panic!("expected Connection, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn connect_error_within_timeout_keeps_its_kind() {
        let addr: SocketAddr = "192.168.4.1:333".parse().unwrap();
        let refused = async { Err::<(), _>(io::Error::from(io::ErrorKind::ConnectionRefused)) };

        let err = within_timeout(addr, Duration::from_secs(10), refused).await.unwrap_err();
        match err {
            NetLoadError::Connection { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::ConnectionRefused);
            }
            other => panic!("expected Connection, got {other:?}"),
        }
    }
}
