//! Command sets, one per mode
//!
//! Each set implements [`CommandSet`](crate::cli::CommandSet): it declares its commands and
//! carries whatever state its handlers need (the interface name of an interface sub-mode, for
//! example). Every set also gets the [`global`] commands.

pub mod bridge;
pub mod config;
pub mod dhcp;
pub mod exec;
pub mod global;
pub mod interface;
pub mod show;
pub mod vlan;

pub use bridge::BridgeCommands;
pub use config::ConfigCommands;
pub use dhcp::DhcpPoolCommands;
pub use exec::ExecCommands;
pub use interface::InterfaceCommands;
pub use vlan::VlanCommands;

use crate::cli::session::ShellContext;
use crate::error::{ShellError, ShellResult};
use crate::store::{InterfaceRecord, Record, StoreExt};
use tracing::warn;

/// Names of the interfaces known to the store, for registration-time word lists
pub(crate) fn interface_names(ctx: &ShellContext) -> Vec<String> {
    names::<InterfaceRecord>(ctx)
}

/// Keys of one store table; a failing store yields no words rather than no mode
pub(crate) fn names<R: Record>(ctx: &ShellContext) -> Vec<String> {
    match ctx.store.keys(R::TABLE) {
        Ok(keys) => keys,
        Err(e) => {
            warn!("Could not list {}: {}", R::TABLE, e);
            Vec::new()
        }
    }
}

/// Fetch a record that must exist
pub(crate) fn require<R: Record>(ctx: &ShellContext, key: &str) -> ShellResult<R> {
    ctx.store
        .fetch::<R>(key)?
        .ok_or_else(|| ShellError::NotFound(format!("{} {}", R::TABLE, key)))
}

pub(crate) fn usage(text: &str) -> ShellError {
    ShellError::Usage(text.to_string())
}
