//! Error types for routershell

use std::io;
use thiserror::Error;

use crate::cli::mode::PrivilegeError;
use crate::cli::resolver::ResolveError;
use crate::cli::tree::RegistryError;

#[derive(Debug, Error)]
pub enum ShellError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// OS command returned non-zero or could not be spawned
    #[error("{}", command_failed(.cmd, .code, .stderr))]
    CommandFailed {
        cmd: String,
        code: Option<i32>,
        stderr: String,
    },
    /// Operator pressed Ctrl-C while the command ran
    #[error("Command '{0}' interrupted")]
    Interrupted(String),
    /// OS command did not finish in time
    #[error("Command '{cmd}' timed out after {secs}s")]
    Timeout { cmd: String, secs: u64 },
    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Referenced object does not exist
    #[error("Not found: {0}")]
    NotFound(String),
    /// Object already exists
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// Configuration store failure
    #[error("Store error: {0}")]
    Store(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Mode does not allow the action
    #[error(transparent)]
    Privilege(#[from] PrivilegeError),
    /// Malformed command registration
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Input line did not resolve to a command
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Command resolved but its arguments are missing or malformed
    #[error("Usage: {0}")]
    Usage(String),
    /// Not supported
    #[error("Not supported: {0}")]
    NotSupported(String),
}

fn command_failed(cmd: &str, code: &Option<i32>, stderr: &str) -> String {
    let stderr = stderr.trim();
    match code {
        Some(code) => format!("Command '{}' failed with code {}: {}", cmd, code, stderr),
        None => format!("Command '{}' failed: {}", cmd, stderr),
    }
}

impl From<serde_json::Error> for ShellError {
    fn from(error: serde_json::Error) -> Self {
        ShellError::Parse(error.to_string())
    }
}

impl From<toml::de::Error> for ShellError {
    fn from(error: toml::de::Error) -> Self {
        ShellError::Config(error.to_string())
    }
}

pub type ShellResult<T> = Result<T, ShellError>;
