//! Transfer orchestration for the CLI.

use netloader_data_channel::{DeviceClient, SessionOptions, TransferProgress, TransferSession};
use tracing::{debug, info};

use crate::cli::Cli;
use crate::config::Config;

/// Validates the image, sends it, and prints the outcome.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let options = SessionOptions {
        force: cli.force,
        post_handshake_delay: config.post_handshake_delay(),
    };

    // Validation happens before any network activity.
    let mut session = TransferSession::open(&cli.input, options)?;
    let addr = cli.device_addr(&config);

    let header = session.header();
    println!("Sending {}", header.display_name());
    if !header.author.is_empty() {
        debug!(author = %header.author, year = header.year, "game info");
    }
    debug!(file_size = session.file_size(), "file size");
    debug!(chunks = session.total_chunks(), "chunks");

    // Milestones at info, shown with -v or RUST_LOG=info; per-chunk detail
    // is logged at debug level.
    let mut last_decile = 0;
    session.on_progress(Box::new(move |progress: TransferProgress| {
        let decile = progress.percent() / 10;
        if decile > last_decile {
            last_decile = decile;
            info!(
                percent = progress.percent(),
                chunk = progress.current_chunk,
                total = progress.total_chunks,
                "progress"
            );
        }
    }));

    let report =
        match DeviceClient::connect_and_send(&mut session, addr, config.connect_timeout()).await {
            Ok(report) => report,
            Err(e) => {
                debug!(
                    state = ?session.state(),
                    verified = session.current_chunk(),
                    total = session.total_chunks(),
                    "transfer stopped"
                );
                return Err(e.into());
            }
        };

    info!(
        bytes = report.bytes_sent,
        chunks = report.total_chunks,
        elapsed_ms = report.elapsed.as_millis() as u64,
        bytes_per_sec = report.bytes_per_second() as u64,
        sha256 = %report.checksum,
        "image sent"
    );
    println!("Done!");
    Ok(())
}
