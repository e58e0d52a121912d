//! Execution modes and prompt rendering

use crate::cli::session::Flow;
use crate::store::{ConfigStore, StoreExt};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Privilege level of a session, ordered `User < Privileged < Config`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExecMode {
    #[default]
    User,
    Privileged,
    Config,
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMode::User => write!(f, "user"),
            ExecMode::Privileged => write!(f, "privileged"),
            ExecMode::Config => write!(f, "config"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrivilegeError {
    #[error("Does not have necessary configure privileges")]
    ConfigureDenied,
    #[error("Command requires {0} mode")]
    Requires(ExecMode),
}

/// State behind the prompt of one mode level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub hostname: String,
    pub mode: ExecMode,
    pub submode_label: Option<String>,
    pub prompt: String,
}

/// `host>`, `host#` or `host(config[-label])#`
pub fn format_prompt(hostname: &str, mode: ExecMode, label: Option<&str>) -> String {
    match (mode, label) {
        (ExecMode::User, _) => format!("{}>", hostname),
        (ExecMode::Privileged, _) => format!("{}#", hostname),
        (ExecMode::Config, None) => format!("{}(config)#", hostname),
        (ExecMode::Config, Some(label)) => format!("{}(config-{})#", hostname, label),
    }
}

/// Owns the [`PromptContext`] of one level of the mode stack
#[derive(Debug, Clone)]
pub struct ModeController {
    context: PromptContext,
}

impl ModeController {
    pub fn new(hostname: &str, mode: ExecMode) -> Self {
        Self {
            context: PromptContext {
                hostname: hostname.to_string(),
                mode,
                submode_label: None,
                prompt: format_prompt(hostname, mode, None),
            },
        }
    }

    pub fn context(&self) -> &PromptContext {
        &self.context
    }

    pub fn mode(&self) -> ExecMode {
        self.context.mode
    }

    pub fn allows(&self, required: ExecMode) -> bool {
        self.context.mode >= required
    }

    pub fn check(&self, required: ExecMode) -> Result<(), PrivilegeError> {
        if self.allows(required) {
            Ok(())
        } else {
            Err(PrivilegeError::Requires(required))
        }
    }

    /// Switch this level to `mode`. Config needs at least Privileged already held.
    pub fn enter(&mut self, mode: ExecMode, submode_label: Option<&str>) -> Result<(), PrivilegeError> {
        match mode {
            ExecMode::Config if self.context.mode < ExecMode::Privileged => {
                warn!("Refused configure from {} mode", self.context.mode);
                return Err(PrivilegeError::ConfigureDenied);
            }
            ExecMode::Privileged if self.context.mode == ExecMode::User => {
                // No authentication backend; escalation always succeeds
                info!("Privileged mode granted");
            }
            _ => {}
        }

        self.context.mode = mode;
        self.context.submode_label = submode_label.map(str::to_string);
        self.context.prompt = self.prompt_string();
        Ok(())
    }

    /// A controller for a nested level, leaving this one untouched
    pub fn child(&self, mode: ExecMode, submode_label: Option<&str>) -> Result<ModeController, PrivilegeError> {
        let mut child = self.clone();
        child.enter(mode, submode_label)?;
        Ok(child)
    }

    /// Render the prompt, picking up hostname changes made through the store
    pub fn render_prompt(&mut self, store: &dyn ConfigStore) -> String {
        match store.hostname() {
            Ok(Some(hostname)) if hostname != self.context.hostname => {
                self.context.hostname = hostname;
                self.context.prompt = self.prompt_string();
            }
            Ok(_) => {}
            Err(e) => warn!("Hostname lookup failed, keeping '{}': {}", self.context.hostname, e),
        }
        self.context.prompt.clone()
    }

    /// Leave this level
    pub fn exit(&self) -> Flow {
        Flow::Pop
    }

    fn prompt_string(&self) -> String {
        format_prompt(
            &self.context.hostname,
            self.context.mode,
            self.context.submode_label.as_deref(),
        )
    }
}
