//! Bridge configuration mode (`Router(config-<bridge>)#`)

use crate::cli::resolver::Invocation;
use crate::cli::session::{Flow, ShellContext};
use crate::cli::tree::{CommandSet, CommandSpec};
use crate::commands::{require, usage};
use crate::error::ShellResult;
use crate::net::BridgeController;
use crate::store::{BridgeRecord, StoreExt};
use crate::validation;

const PROTOCOLS: [&str; 3] = ["ieee_802_1d", "ieee_802_1s", "ieee_802_1w"];

#[derive(Debug, Clone)]
pub struct BridgeCommands {
    name: String,
}

impl BridgeCommands {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }

    fn record(&self, ctx: &ShellContext) -> ShellResult<BridgeRecord> {
        require::<BridgeRecord>(ctx, &self.name)
    }

    fn shutdown(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        BridgeController::new(ctx.runner.as_ref()).set_state(&self.name, inv.negate)?;
        let mut record = self.record(ctx)?;
        record.shutdown = !inv.negate;
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    fn stp(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        BridgeController::new(ctx.runner.as_ref()).set_stp(&self.name, !inv.negate)?;
        let mut record = self.record(ctx)?;
        record.stp = !inv.negate;
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    /// Spanning tree flavour; kept in the store only
    fn protocol(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;
        record.protocol = match (inv.operand(0), inv.negate) {
            (_, true) => None,
            (Some(protocol), false) if PROTOCOLS.contains(&protocol) => Some(protocol.to_string()),
            _ => return Err(usage("protocol ieee_802_1d|ieee_802_1s|ieee_802_1w")),
        };
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    fn description(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;
        record.description = match inv.negate {
            true => None,
            false if inv.operands().is_empty() => return Err(usage("description <text>")),
            false => Some(validation::sanitize_config_value(&inv.text_from(0))?),
        };
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }
}

impl CommandSet for BridgeCommands {
    fn name(&self) -> String {
        format!("bridge {}", self.name)
    }

    fn commands(&self, _ctx: &ShellContext) -> ShellResult<Vec<CommandSpec<Self>>> {
        Ok(vec![
            CommandSpec::new("shutdown", Self::shutdown)
                .negatable()
                .help("Disable the bridge"),
            CommandSpec::new("stp", Self::stp)
                .negatable()
                .help("Enable spanning tree"),
            CommandSpec::new("protocol", Self::protocol)
                .negatable()
                .help("Spanning tree protocol")
                .extend(PROTOCOLS),
            CommandSpec::new("description", Self::description)
                .negatable()
                .help("Bridge description")
                .nested(&["<text>"]),
        ])
    }
}
