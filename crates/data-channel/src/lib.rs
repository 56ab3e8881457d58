//! TCP data channel for pushing a game image to a Uzebox.
//!
//! The device runs the TCP server; the desktop connects, agrees on the
//! chunk count, streams 128-byte chunks that the device echoes back, and
//! finishes with a `DONE` exchange. Any deviation aborts the transfer.
//!
//! # Wire format
//!
//! See [`netloader_protocol::wire`] for the byte layout.

pub mod client;
pub mod error;
pub mod server;
pub mod session;

pub use client::DeviceClient;
pub use error::NetLoadError;
pub use server::{DeviceEmulator, EmulatorFaults, ReceivedImage};
pub use session::{
    ProgressCallback, SessionOptions, SessionState, TransferReport, TransferSession,
};

pub use netloader_transfer::TransferProgress;
