//! DHCP client control

use crate::error::ShellResult;
use crate::runner::{CommandRunner, OsCommand};
use crate::validation;
use tracing::info;

pub struct DhcpClientController<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> DhcpClientController<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Request a lease; dhclient backgrounds itself once bound
    pub fn start(&self, interface: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        info!("Starting DHCP client on {}", interface);
        self.runner.check(&OsCommand::new("dhclient").arg(interface))?;
        Ok(())
    }

    /// Release the lease and stop the client
    pub fn release(&self, interface: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        info!("Releasing DHCP lease on {}", interface);
        self.runner.check(&OsCommand::new("dhclient").args(["-r", interface]))?;
        Ok(())
    }
}
