//! Wire protocol for pushing a game image to a Uzebox over WiFi.
//!
//! The device (an ESP8266 in AT-command server mode) is the TCP server; the
//! desktop tool connects as client. See [`wire`] for the byte layout.

pub mod constants;
pub mod error;
pub mod wire;

pub use constants::{
    CHUNK_SIZE, CONNECT_TIMEOUT, DEFAULT_DEVICE_ADDR, DEFAULT_DEVICE_PORT, DONE_SIGNAL,
    POST_HANDSHAKE_DELAY,
};
pub use error::ProtocolError;
