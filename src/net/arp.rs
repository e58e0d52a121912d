//! Global ARP settings and neighbour cache

use crate::error::ShellResult;
use crate::runner::{CommandRunner, OsCommand};
use crate::validation;

pub struct ArpController<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> ArpController<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Seconds before a stale neighbour entry may be collected
    pub fn set_timeout(&self, secs: u32) -> ShellResult<()> {
        super::sysctl(self.runner, "net.ipv4.neigh.default.gc_stale_time", &secs.to_string())
    }

    pub fn set_proxy(&self, enable: bool) -> ShellResult<()> {
        super::sysctl(self.runner, "net.ipv4.conf.all.proxy_arp", super::flag(enable))
    }

    pub fn set_drop_gratuitous(&self, enable: bool) -> ShellResult<()> {
        super::sysctl(self.runner, "net.ipv4.conf.all.drop_gratuitous_arp", super::flag(enable))
    }

    /// Flush the neighbour cache, optionally for one interface only
    pub fn flush(&self, interface: Option<&str>) -> ShellResult<()> {
        let cmd = match interface {
            Some(interface) => {
                validation::validate_interface_name(interface)?;
                OsCommand::ip(["neigh", "flush", "dev", interface])
            }
            None => OsCommand::ip(["neigh", "flush", "all"]),
        };
        self.runner.check(&cmd)?;
        Ok(())
    }

    pub fn show(&self) -> ShellResult<String> {
        Ok(self.runner.check(&OsCommand::ip(["neigh", "show"]))?.stdout)
    }
}
