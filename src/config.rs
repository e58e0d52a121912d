//! Configuration management for routershell

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{ShellError, ShellResult};

/// Default location of the shell configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/routershell/routershell.toml";

/// Main routershell configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellConfig {
    /// File system locations
    #[serde(default)]
    pub paths: ConfigPaths,
    /// Default settings
    #[serde(default)]
    pub defaults: DefaultSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPaths {
    /// Log directory, created at startup
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Configuration store file
    #[serde(default = "default_store_file")]
    pub store_file: PathBuf,
    /// Written by `copy running-config startup-config`, replayed at startup
    #[serde(default = "default_startup_config")]
    pub startup_config: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultSettings {
    /// Hostname seeded into an empty store
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// Timeout for plain OS commands (seconds)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Timeout for streamed OS commands such as ping (seconds)
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,
    /// Echo requests sent by `ping`
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
    /// Lines kept in the interactive history
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/tmp/log")
}

fn default_store_file() -> PathBuf {
    PathBuf::from("/var/lib/routershell/router-db.json")
}

fn default_startup_config() -> PathBuf {
    PathBuf::from("/var/lib/routershell/startup-config.cfg")
}

fn default_hostname() -> String {
    "Router".to_string()
}

fn default_command_timeout() -> u64 {
    30
}

fn default_stream_timeout() -> u64 {
    120
}

fn default_ping_count() -> u32 {
    4
}

fn default_history_size() -> usize {
    200
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            store_file: default_store_file(),
            startup_config: default_startup_config(),
        }
    }
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            command_timeout_secs: default_command_timeout(),
            stream_timeout_secs: default_stream_timeout(),
            ping_count: default_ping_count(),
            history_size: default_history_size(),
        }
    }
}

impl ShellConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> ShellResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ShellError::Config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ShellError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> ShellResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> ShellResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ShellError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| ShellError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Ensure the log directory and the parents of the store and startup config exist
    pub fn ensure_directories(&self) -> ShellResult<()> {
        let mut dirs = vec![self.paths.log_dir.as_path()];
        for file in [&self.paths.store_file, &self.paths.startup_config] {
            if let Some(parent) = file.parent() {
                if !parent.as_os_str().is_empty() {
                    dirs.push(parent);
                }
            }
        }

        for dir in dirs {
            std::fs::create_dir_all(dir)
                .map_err(|e| ShellError::Config(format!("Failed to create directory {:?}: {}", dir, e)))?;
        }
        Ok(())
    }

    pub fn log_file(&self) -> PathBuf {
        self.paths.log_dir.join("routershell.log")
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.command_timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.defaults.stream_timeout_secs)
    }
}
