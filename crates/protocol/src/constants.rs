use std::net::Ipv4Addr;
use std::time::Duration;

/// Bytes per chunk. Fixed by the device firmware's receive buffer.
pub const CHUNK_SIZE: usize = 128;

/// Completion signal sent by the client and echoed by the device.
pub const DONE_SIGNAL: &[u8; 4] = b"DONE";

/// Default address of the ESP8266 soft access point.
pub const DEFAULT_DEVICE_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

/// Default TCP port of the ESP8266 AT-firmware server.
pub const DEFAULT_DEVICE_PORT: u16 = 333;

/// Timeout for the TCP connection attempt.
///
/// This is the only timeout in the protocol: once connected, reads and
/// writes block until the peer answers or closes.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after the size handshake before the first chunk is sent.
///
/// The device switches from count parsing to chunk buffering between the
/// two phases and drops bytes that arrive too early.
pub const POST_HANDSHAKE_DELAY: Duration = Duration::from_millis(150);

/// Largest chunk-count string the device side accepts (`u64::MAX` digits).
pub const MAX_COUNT_DIGITS: usize = 20;
