//! User and privileged exec commands (`Router>` / `Router#`)

use crate::cli::resolver::Invocation;
use crate::cli::session::{Flow, Frame, ShellContext, SubMode};
use crate::cli::tree::{CommandSet, CommandSpec};
use crate::cli::ExecMode;
use crate::commands::config::ConfigCommands;
use crate::commands::{interface_names, show, usage};
use crate::error::{ShellError, ShellResult};
use crate::net::{ArpController, InterfaceController};
use crate::runner::OsCommand;
use crate::store::{InterfaceRecord, StoreExt};
use crate::validation;
use tracing::{info, warn};

/// Root command set of a session
#[derive(Debug, Default)]
pub struct ExecCommands;

impl ExecCommands {
    pub fn new() -> Self {
        Self
    }

    fn enable(&mut self, _: &mut ShellContext, _: &Invocation) -> ShellResult<Flow> {
        Ok(Flow::SetMode(ExecMode::Privileged))
    }

    fn disable(&mut self, _: &mut ShellContext, _: &Invocation) -> ShellResult<Flow> {
        Ok(Flow::SetMode(ExecMode::User))
    }

    fn configure(&mut self, ctx: &mut ShellContext, _: &Invocation) -> ShellResult<Flow> {
        let frame = Frame::boxed(ConfigCommands::new(), ctx)?;
        Ok(Flow::Push(SubMode::new(None, frame)))
    }

    fn ping(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let family = if inv.token_path.first().map(String::as_str) == Some("ping6") { "-6" } else { "-4" };
        let target = inv.operand(0).ok_or_else(|| usage("ping <destination>"))?;
        validation::validate_hostname(target)?;

        let cmd = OsCommand::new("ping")
            .arg(family)
            .arg("-c")
            .arg(ctx.config.defaults.ping_count.to_string())
            .arg(target);
        ctx.stream(&cmd)?;
        Ok(Flow::Continue)
    }

    fn traceroute(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let target = inv.operand(0).ok_or_else(|| usage("traceroute <destination>"))?;
        validation::validate_hostname(target)?;
        ctx.stream(&OsCommand::new("traceroute").arg(target))?;
        Ok(Flow::Continue)
    }

    /// `clear arp [<ifname>]`
    fn clear(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        match inv.operands().as_slice() {
            ["arp"] => ArpController::new(ctx.runner.as_ref()).flush(None)?,
            ["arp", ifname] => {
                validation::validate_interface_name(ifname)?;
                ArpController::new(ctx.runner.as_ref()).flush(Some(*ifname))?;
            }
            _ => return Err(usage("clear arp [<ifname>]")),
        }
        Ok(Flow::Continue)
    }

    /// Remove every address from an interface, in the OS and in the store
    fn flush(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let ifname = inv.operand(0).ok_or_else(|| usage("flush <ifname>"))?;
        validation::validate_interface_name(ifname)?;
        InterfaceController::new(ctx.runner.as_ref()).flush_addrs(ifname)?;

        if let Some(mut record) = ctx.store.fetch::<InterfaceRecord>(ifname)? {
            if !record.addresses.is_empty() {
                record.addresses.clear();
                ctx.store.update(&record)?;
            }
        }
        info!("Flushed addresses of {}", ifname);
        Ok(Flow::Continue)
    }

    /// `copy running-config startup-config` saves, `copy startup-config running-config` replays
    fn copy(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let path = ctx.config.paths.startup_config.clone();

        match inv.operands().as_slice() {
            ["running-config", "startup-config"] => {
                let mut content = show::running_config(ctx)?.join("\n");
                content.push('\n');
                std::fs::write(&path, content)
                    .map_err(|e| ShellError::Store(format!("Failed to write {:?}: {}", path, e)))?;

                info!("Saved running configuration to {:?}", path);
                ctx.say("[OK]");
                Ok(Flow::Continue)
            }
            ["startup-config", "running-config"] => {
                if !path.exists() {
                    return Err(ShellError::NotFound(format!("Startup configuration {:?}", path)));
                }
                Ok(Flow::Replay(path))
            }
            _ => Err(usage("copy running-config startup-config | copy startup-config running-config")),
        }
    }

    /// `reboot [--force]`, also reached as `reload`
    fn reboot(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let force = inv.operands().contains(&"--force");
        if !force && !ctx.confirm("Are you sure you want to reboot? (yes/no): ") {
            ctx.say("Reboot canceled.");
            return Ok(Flow::Continue);
        }

        warn!("System reboot requested (force: {})", force);
        ctx.runner.check(&OsCommand::new("systemctl").arg("reboot"))?;
        Ok(Flow::Quit)
    }
}

impl CommandSet for ExecCommands {
    fn name(&self) -> String {
        "exec".to_string()
    }

    fn commands(&self, ctx: &ShellContext) -> ShellResult<Vec<CommandSpec<Self>>> {
        Ok(vec![
            CommandSpec::new("enable", Self::enable).help("Enter privileged mode"),
            CommandSpec::new("disable", Self::disable)
                .privileged()
                .help("Return to user mode"),
            CommandSpec::new("configure", Self::configure)
                .help("Enter configuration mode")
                .nested(&["terminal"])
                .help("Configure from the terminal"),
            show::command::<Self>(),
            CommandSpec::new("ping", Self::ping)
                .help("Send echo requests")
                .nested(&["<destination>"]),
            CommandSpec::new("ping6", Self::ping)
                .help("Send IPv6 echo requests")
                .nested(&["<destination>"]),
            CommandSpec::new("traceroute", Self::traceroute)
                .help("Trace the route to a host")
                .nested(&["<destination>"]),
            CommandSpec::new("clear", Self::clear)
                .privileged()
                .help("Reset runtime state")
                .nested(&["arp"])
                .help("Flush the neighbor table")
                .append(interface_names(ctx)),
            CommandSpec::new("flush", Self::flush)
                .privileged()
                .help("Remove all addresses from an interface")
                .extend(interface_names(ctx)),
            CommandSpec::new("copy", Self::copy)
                .privileged()
                .help("Copy configuration")
                .nested(&["running-config", "startup-config"])
                .help("Save the running configuration for the next start")
                .nested(&["startup-config", "running-config"])
                .help("Apply the saved startup configuration"),
            CommandSpec::new("reload", Self::reboot)
                .privileged()
                .help("Restart the system"),
            CommandSpec::new("reboot", Self::reboot)
                .privileged()
                .help("Restart the system")
                .nested(&["--force"])
                .help("Skip the confirmation"),
        ])
    }
}
