//! Routing table management

use crate::error::ShellResult;
use crate::runner::{CommandRunner, OsCommand};
use crate::validation;

pub struct RouteController<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> RouteController<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Add or replace a static route
    pub fn add(&self, destination: &str, next_hop: &str, metric: Option<u32>) -> ShellResult<()> {
        self.runner.check(&self.route_cmd("replace", destination, next_hop, metric)?)?;
        Ok(())
    }

    pub fn delete(&self, destination: &str, next_hop: &str, metric: Option<u32>) -> ShellResult<()> {
        self.runner.check(&self.route_cmd("del", destination, next_hop, metric)?)?;
        Ok(())
    }

    pub fn show(&self) -> ShellResult<String> {
        Ok(self.runner.check(&OsCommand::ip(["route", "show"]))?.stdout)
    }

    fn route_cmd(&self, verb: &str, destination: &str, next_hop: &str, metric: Option<u32>) -> ShellResult<OsCommand> {
        validation::validate_cidr(destination)?;
        validation::validate_ip_address(next_hop)?;

        let mut cmd = OsCommand::ip(["route", verb, destination, "via", next_hop]);
        if let Some(metric) = metric {
            cmd = cmd.arg("metric").arg(metric.to_string());
        }
        Ok(cmd)
    }
}
