//! Command-line arguments.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;

/// Send a .uze file to a Uzebox over WiFi.
#[derive(Debug, Parser)]
#[command(name = "netloader", version, about = "Send a .uze file to a Uzebox over wifi")]
pub struct Cli {
    /// File to be sent to the Uzebox
    #[arg(short = 'i', long = "input", value_name = "PATH")]
    pub input: PathBuf,

    /// Enable verbose output while sending a file
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Force the file to be sent, even if it isn't a valid .uze file
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Device address (overrides the config file)
    #[arg(long = "host")]
    pub host: Option<IpAddr>,

    /// Device TCP port (overrides the config file)
    #[arg(long = "port")]
    pub port: Option<u16>,

    /// Configuration file (defaults to the per-user config location)
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Log filter directives. `-v` wins over `RUST_LOG`; without either
    /// only warnings and errors are logged.
    pub fn log_directives(&self, rust_log: Option<String>) -> String {
        if self.verbose {
            return "debug".to_string();
        }
        rust_log
            .filter(|directives| !directives.trim().is_empty())
            .unwrap_or_else(|| "warn".to_string())
    }

    /// Resolves the device address: flags first, then the config file.
    pub fn device_addr(&self, config: &Config) -> SocketAddr {
        SocketAddr::new(
            self.host.unwrap_or(config.device_addr),
            self.port.unwrap_or(config.device_port),
        )
    }
}
