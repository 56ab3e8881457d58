//! Device emulator entry point.
//!
//! Accepts one NetLoader transfer, writes the image to disk and exits,
//! the way the firmware hands over to the bootloader after `DONE`.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use netloader_data_channel::{DeviceEmulator, EmulatorFaults};
use netloader_protocol::DEFAULT_DEVICE_PORT;
use tracing_subscriber::EnvFilter;

/// Desktop stand-in for the Uzebox NetLoader firmware.
#[derive(Debug, Parser)]
#[command(name = "netloader-device-sim", version)]
struct Args {
    /// Address to listen on
    #[arg(long = "bind", default_value_t = default_bind())]
    bind: SocketAddr,

    /// Where to write the received image
    #[arg(short = 'o', long = "output", default_value = "NETLOAD.BIN")]
    output: PathBuf,

    /// Flip the first byte of this chunk's echo
    #[arg(long = "corrupt-chunk", value_name = "INDEX")]
    corrupt_chunk: Option<u64>,

    /// Acknowledge the wrong chunk count
    #[arg(long = "bad-count-ack")]
    bad_count_ack: bool,

    /// Answer DONE with something else
    #[arg(long = "bad-done")]
    bad_done: bool,

    /// Log every chunk
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_DEVICE_PORT))
}

impl Args {
    fn faults(&self) -> EmulatorFaults {
        EmulatorFaults {
            bad_count_ack: self.bad_count_ack,
            corrupt_chunk: self.corrupt_chunk,
            bad_done: self.bad_done,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // -v wins over RUST_LOG.
    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting NetLoader device emulator"
    );

    let emulator = DeviceEmulator::new(args.output.clone(), args.faults());
    let listener = emulator.listen(args.bind).await?;
    let received = emulator.accept_and_receive(listener).await?;

    tracing::info!(
        chunks = received.total_chunks,
        bytes = received.size,
        "emulator shut down cleanly"
    );
    Ok(())
}
