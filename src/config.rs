use crate::error::{DemuxError, Result};
use std::env;
use std::fs;
use std::path::Path;

/// Default cap for a single reassembled PES packet (4 MiB).
pub const DEFAULT_MAX_PES_SIZE: usize = 4 * 1024 * 1024;

const CONFIG_PATHS: [&str; 2] = ["./tsdemux.toml", "./tsdemux_config.toml"];

/// Runtime knobs for [`TransportDemuxer`](crate::format::ts::TransportDemuxer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemuxerConfig {
    /// Check the CRC32 trailing every PAT/PMT section and drop sections that fail.
    pub verify_crc: bool,
    /// Upper bound for one PES packet. Larger packets are dropped.
    pub max_pes_size: usize,
    /// Report packets on PIDs no program claims at `warn` instead of `debug`.
    pub log_unhandled_pids: bool,
}

impl Default for DemuxerConfig {
    fn default() -> Self {
        Self {
            verify_crc: false,
            max_pes_size: DEFAULT_MAX_PES_SIZE,
            log_unhandled_pids: false,
        }
    }
}

impl DemuxerConfig {
    /// Defaults, overridden by the first config file found, overridden by
    /// environment variables.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        for path in &CONFIG_PATHS {
            if Path::new(path).exists() {
                config.apply_file(path)?;
                break;
            }
        }
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overridden by `TSDEMUX_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overridden by a `key = value` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::default();
        config.apply_file(path)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(value) = env::var("TSDEMUX_VERIFY_CRC") {
            self.set("verify_crc", &value)?;
        }
        if let Ok(value) = env::var("TSDEMUX_MAX_PES_SIZE") {
            self.set("max_pes_size", &value)?;
        }
        if let Ok(value) = env::var("TSDEMUX_LOG_UNHANDLED_PIDS") {
            self.set("log_unhandled_pids", &value)?;
        }
        Ok(())
    }

    fn apply_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let content = fs::read_to_string(path)?;
        self.apply_str(&content)
    }

    fn apply_str(&mut self, content: &str) -> Result<()> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(DemuxError::Config(format!("malformed line: {}", line)));
            };
            let value = value.trim().trim_matches('"').trim_matches('\'');
            self.set(key.trim(), value)?;
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "verify_crc" => self.verify_crc = parse_bool(key, value)?,
            "max_pes_size" => self.max_pes_size = value.trim().parse()?,
            "log_unhandled_pids" => self.log_unhandled_pids = parse_bool(key, value)?,
            _ => log::warn!("ignoring unknown config key {}", key),
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DemuxError::Config(format!(
            "{} expects a boolean, got {:?}",
            key, other
        ))),
    }
}
