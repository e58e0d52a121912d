//! NAT rules via iptables
//!
//! Outside interfaces masquerade in POSTROUTING, inside interfaces are allowed to forward.
//! Rules are probed with `-C` first so applying or removing twice is harmless.

use crate::error::ShellResult;
use crate::runner::{CommandRunner, OsCommand};
use crate::store::NatDirection;
use crate::validation;
use tracing::debug;

pub struct NatController<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> NatController<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    pub fn apply(&self, interface: &str, direction: NatDirection) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        if self.present(interface, direction)? {
            debug!("NAT {} rule for {} already present", direction, interface);
            return Ok(());
        }
        self.runner.check(&rule(interface, direction, "-A"))?;
        Ok(())
    }

    pub fn remove(&self, interface: &str, direction: NatDirection) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        if !self.present(interface, direction)? {
            return Ok(());
        }
        self.runner.check(&rule(interface, direction, "-D"))?;
        Ok(())
    }

    pub fn show(&self) -> ShellResult<String> {
        Ok(self
            .runner
            .check(&OsCommand::new("iptables").args(["-t", "nat", "-L", "-n", "-v"]))?
            .stdout)
    }

    fn present(&self, interface: &str, direction: NatDirection) -> ShellResult<bool> {
        Ok(self.runner.run(&rule(interface, direction, "-C"))?.success())
    }
}

fn rule(interface: &str, direction: NatDirection, op: &str) -> OsCommand {
    match direction {
        NatDirection::Outside => OsCommand::new("iptables")
            .args(["-t", "nat", op, "POSTROUTING", "-o", interface, "-j", "MASQUERADE"]),
        NatDirection::Inside => {
            OsCommand::new("iptables").args([op, "FORWARD", "-i", interface, "-j", "ACCEPT"])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, DryRunRunner};

    #[test]
    fn test_apply_skips_existing_rule() {
        // -C succeeds: rule already there
        let runner = DryRunRunner::new();
        let log = runner.log();
        NatController::new(&runner).apply("eth1", NatDirection::Outside).unwrap();
        assert_eq!(
            log.lines(),
            vec!["iptables -t nat -C POSTROUTING -o eth1 -j MASQUERADE"]
        );
    }

    #[test]
    fn test_apply_and_remove() {
        let runner = DryRunRunner::new()
            .respond("iptables -C", CommandOutput::failed(1, "Bad rule"));
        let log = runner.log();
        let ctl = NatController::new(&runner);

        ctl.apply("eth0", NatDirection::Inside).unwrap();
        ctl.remove("eth0", NatDirection::Inside).unwrap();

        assert_eq!(
            log.lines(),
            vec![
                "iptables -C FORWARD -i eth0 -j ACCEPT",
                "iptables -A FORWARD -i eth0 -j ACCEPT",
                "iptables -C FORWARD -i eth0 -j ACCEPT",
            ]
        );
    }
}
