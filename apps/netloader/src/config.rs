//! NetLoader configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/netloader/netloader.toml`
//! - Windows: `%APPDATA%/netloader/netloader.toml`
//!
//! The file is optional; every field has a default.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use netloader_protocol::{
    CONNECT_TIMEOUT, DEFAULT_DEVICE_ADDR, DEFAULT_DEVICE_PORT, POST_HANDSHAKE_DELAY,
};
use serde::{Deserialize, Serialize};

/// NetLoader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address of the device's TCP server.
    #[serde(default = "default_device_addr")]
    pub device_addr: IpAddr,

    /// Port of the device's TCP server.
    #[serde(default = "default_device_port")]
    pub device_port: u16,

    /// Seconds to wait for the TCP connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Milliseconds to pause between the size handshake and the first chunk.
    #[serde(default = "default_post_handshake_delay_ms")]
    pub post_handshake_delay_ms: u64,
}

fn default_device_addr() -> IpAddr {
    IpAddr::V4(DEFAULT_DEVICE_ADDR)
}

fn default_device_port() -> u16 {
    DEFAULT_DEVICE_PORT
}

fn default_connect_timeout_secs() -> u64 {
    CONNECT_TIMEOUT.as_secs()
}

fn default_post_handshake_delay_ms() -> u64 {
    POST_HANDSHAKE_DELAY.as_millis() as u64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_addr: default_device_addr(),
            device_port: default_device_port(),
            connect_timeout_secs: default_connect_timeout_secs(),
            post_handshake_delay_ms: default_post_handshake_delay_ms(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = config_path();
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration read");
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn post_handshake_delay(&self) -> Duration {
        Duration::from_millis(self.post_handshake_delay_ms)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("netloader").join("netloader.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("netloader")
            .join("netloader.toml")
    }
}
