//! librouter - Cisco-IOS style command shell for Linux routers
//!
//! The library provides:
//! - A command engine: word-trie registry, `?` help, `no` negation and nested modes
//! - Command sets for exec, global config, interface, bridge, VLAN and DHCP pool modes
//! - OS controllers that turn configuration intents into `ip`/`bridge`/`iptables` calls
//! - A JSON-backed configuration store holding the router's persistent state
//!
//! Every OS call goes through a [`CommandRunner`], so the whole shell can run dry.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod net;
pub mod runner;
pub mod store;
pub mod validation;

// Re-export commonly used types
pub use cli::{
    EditorSource, ExecMode, Flow, Frame, LineSource, ModeFrame, ObjectKind, Outcome,
    ScriptSource, Shell, ShellContext,
};
pub use commands::ExecCommands;
pub use config::{ShellConfig, DEFAULT_CONFIG_PATH};
pub use error::{ShellError, ShellResult};
pub use runner::{CommandOutput, CommandRunner, DryRunRunner, OsCommand, SystemRunner};
pub use store::{ConfigStore, JsonStore, StoreExt};
