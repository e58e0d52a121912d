//! Linux bridge management

use crate::error::ShellResult;
use crate::runner::{CommandRunner, OsCommand};
use crate::validation;
use tracing::info;

pub struct BridgeController<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> BridgeController<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    pub fn create(&self, bridge: &str) -> ShellResult<()> {
        validation::validate_interface_name(bridge)?;
        info!("Creating bridge {}", bridge);
        self.runner.check(&OsCommand::ip(["link", "add", "name", bridge, "type", "bridge"]))?;
        Ok(())
    }

    pub fn destroy(&self, bridge: &str) -> ShellResult<()> {
        validation::validate_interface_name(bridge)?;
        info!("Destroying bridge {}", bridge);
        self.runner.check(&OsCommand::ip(["link", "delete", "dev", bridge, "type", "bridge"]))?;
        Ok(())
    }

    pub fn set_state(&self, bridge: &str, up: bool) -> ShellResult<()> {
        validation::validate_interface_name(bridge)?;
        let state = if up { "up" } else { "down" };
        self.runner.check(&OsCommand::ip(["link", "set", "dev", bridge, state]))?;
        Ok(())
    }

    pub fn set_stp(&self, bridge: &str, enable: bool) -> ShellResult<()> {
        validation::validate_interface_name(bridge)?;
        self.runner.check(&OsCommand::ip([
            "link", "set", "dev", bridge, "type", "bridge", "stp_state", super::flag(enable),
        ]))?;
        Ok(())
    }

    /// Detailed kernel view of every bridge
    pub fn show(&self) -> ShellResult<String> {
        Ok(self.runner.check(&OsCommand::ip(["-d", "link", "show", "type", "bridge"]))?.stdout)
    }
}
