//! OS network controllers
//!
//! Each controller borrows the session's [`CommandRunner`] and turns one domain intent
//! (bring a link up, add an address, add a NAT rule) into argv-style invocations.

pub mod arp;
pub mod bridge;
pub mod dhcp;
pub mod interface;
pub mod nat;
pub mod route;

pub use arp::ArpController;
pub use bridge::BridgeController;
pub use dhcp::DhcpClientController;
pub use interface::{InterfaceController, LinkInfo};
pub use nat::NatController;
pub use route::RouteController;

use crate::error::ShellResult;
use crate::runner::{CommandRunner, OsCommand};

/// `sysctl -w key=value`
pub(crate) fn sysctl(runner: &dyn CommandRunner, key: &str, value: &str) -> ShellResult<()> {
    runner.check(&OsCommand::new("sysctl").args(["-w".to_string(), format!("{}={}", key, value)]))?;
    Ok(())
}

pub(crate) fn flag(enable: bool) -> &'static str {
    if enable { "1" } else { "0" }
}
