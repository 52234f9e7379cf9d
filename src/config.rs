use crate::error::{Result, TsPesError};
use crate::format::ts::types::PID_MAX;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PID: u16 = 136;
pub const DEFAULT_MAX_PACKETS: usize = 10_000;
pub const DEFAULT_INPUT: &str = "example_new.ts";
pub const DEFAULT_OUTPUT: &str = "PID136.mp2";

const CONFIG_PATHS: [&str; 2] = ["./tspes_config.toml", "./config.toml"];

/// Settings for a single-PID extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// PID to reassemble; every other PID is ignored
    pub pid: u16,
    /// Stop after this many transport packets; `None` reads to end of stream
    pub max_packets: Option<usize>,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            pid: DEFAULT_PID,
            max_packets: Some(DEFAULT_MAX_PACKETS),
            input_path: PathBuf::from(DEFAULT_INPUT),
            output_path: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

impl ExtractorConfig {
    pub fn new(pid: u16) -> Self {
        Self {
            pid,
            ..Default::default()
        }
    }

    pub fn with_max_packets(mut self, max_packets: Option<usize>) -> Self {
        self.max_packets = max_packets;
        self
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Loads defaults, then the first config file found, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        for path in &CONFIG_PATHS {
            if let Ok(content) = fs::read_to_string(path) {
                log::debug!("Loading extractor config from {}", path);
                config.apply_file(&content)?;
                break;
            }
        }

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `key = value` lines; unknown keys and comments are ignored.
    pub fn apply_file(&mut self, content: &str) -> Result<()> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if !value.is_empty() {
                    self.set(key.trim(), value)?;
                }
            }
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        for (var, key) in [
            ("TSPES_PID", "pid"),
            ("TSPES_MAX_PACKETS", "max_packets"),
            ("TSPES_INPUT", "input"),
            ("TSPES_OUTPUT", "output"),
        ] {
            if let Ok(value) = env::var(var) {
                self.set(key, value.trim())?;
            }
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "pid" => self.pid = parse_pid(value)?,
            "max_packets" => {
                let max: usize = value.parse()?;
                self.max_packets = if max == 0 { None } else { Some(max) };
            }
            "input" => self.input_path = PathBuf::from(value),
            "output" => self.output_path = PathBuf::from(value),
            _ => log::debug!("Ignoring unknown config key {}", key),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pid > PID_MAX {
            return Err(TsPesError::Config(format!(
                "PID {} out of range 0..={}",
                self.pid, PID_MAX
            )));
        }
        Ok(())
    }
}

/// Accepts decimal or `0x`-prefixed hexadecimal PIDs.
fn parse_pid(value: &str) -> Result<u16> {
    let pid = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16)?,
        None => value.parse()?,
    };
    if pid > PID_MAX {
        return Err(TsPesError::Config(format!("PID {} out of range", pid)));
    }
    Ok(pid)
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        fs::write(path, CONFIG_TEMPLATE)?;
    }
    Ok(())
}

pub const CONFIG_TEMPLATE: &str = r#"# tspes configuration
# Copy this file to 'tspes_config.toml' and adjust the values.

# PID of the elementary stream to extract (decimal or 0x-prefixed hex)
pid = 136

# Stop after this many transport packets (0 = read the whole input)
max_packets = 10000

input = "example_new.ts"
output = "PID136.mp2"
"#;
