//! Service configuration: a TOML file with per-section defaults, then
//! environment overrides for the deployment-specific options.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [server]
//! port = 3000
//!
//! [slicer]
//! executable = "/usr/local/bin/bambu-studio"
//! profile_dir = "slicing-profiles"
//! work_dir = "/tmp/meshprint"
//!
//! [printer]
//! ip = "192.168.1.42"
//! serial = "01S00C123400001"
//! access_code = "12345678"
//! ```
//!
//! Recognized environment overrides: `MESHPRINT_PORT`,
//! `MESHPRINT_SLICER_BIN`, `MESHPRINT_PRINTER_IP`,
//! `MESHPRINT_PRINTER_SERIAL`, `MESHPRINT_PRINTER_ACCESS_CODE`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Top-level configuration for the web server, slicer, and printer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub slicer: SlicerConfig,
    #[serde(default)]
    pub printer: PrinterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// External slicer invocation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlicerConfig {
    /// Slicer CLI executable.
    #[serde(default = "default_slicer_executable")]
    pub executable: PathBuf,
    /// Directory holding the fixed `filament.json` / `process.json` /
    /// `machine.json` profiles.
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,
    /// Root for per-job upload and output directories.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Wall-clock bound on one slicer run, in seconds.
    #[serde(default = "default_slice_timeout")]
    pub timeout_secs: u64,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            executable: default_slicer_executable(),
            profile_dir: default_profile_dir(),
            work_dir: default_work_dir(),
            timeout_secs: default_slice_timeout(),
        }
    }
}

/// Target printer identity and credentials (LAN mode).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrinterConfig {
    /// Printer IP address or hostname.
    #[serde(default)]
    pub ip: String,
    /// Printer serial number; scopes the command topic.
    #[serde(default)]
    pub serial: String,
    /// LAN access code, used for both the FTPS and MQTT channels.
    #[serde(default)]
    pub access_code: String,
    /// Bound on MQTT connection establishment, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Accept the printer's self-signed certificate on the file-transfer
    /// channel. Bambu-class printers ship self-signed certs; on a trusted
    /// LAN this is an intentional trust relaxation. Set to `false` to
    /// require a verifiable certificate.
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            ip: String::new(),
            serial: String::new(),
            access_code: String::new(),
            connect_timeout_secs: default_connect_timeout(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_slicer_executable() -> PathBuf {
    PathBuf::from("bambu-studio")
}

fn default_profile_dir() -> PathBuf {
    PathBuf::from("slicing-profiles")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("/tmp/meshprint")
}

fn default_slice_timeout() -> u64 {
    120
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_accept_invalid_certs() -> bool {
    true
}

/// Load configuration from an optional TOML file, then apply environment
/// overrides. With no file, starts from defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut config: Config = match path {
        Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

impl Config {
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MESHPRINT_PORT")
            && let Ok(port) = v.parse()
        {
            self.server.port = port;
        }
        if let Ok(v) = std::env::var("MESHPRINT_SLICER_BIN") {
            self.slicer.executable = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MESHPRINT_PRINTER_IP") {
            self.printer.ip = v;
        }
        if let Ok(v) = std::env::var("MESHPRINT_PRINTER_SERIAL") {
            self.printer.serial = v;
        }
        if let Ok(v) = std::env::var("MESHPRINT_PRINTER_ACCESS_CODE") {
            self.printer.access_code = v;
        }
    }
}
