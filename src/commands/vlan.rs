//! VLAN configuration mode (`Router(config-vlan<id>)#`)

use crate::cli::resolver::Invocation;
use crate::cli::session::{Flow, ShellContext};
use crate::cli::tree::{CommandSet, CommandSpec};
use crate::commands::{require, usage};
use crate::error::ShellResult;
use crate::store::{StoreExt, VlanRecord};
use crate::validation;

#[derive(Debug, Clone)]
pub struct VlanCommands {
    key: String,
}

impl VlanCommands {
    /// `key` is the stored VLAN key as returned by the launcher
    pub fn new(key: &str) -> Self {
        Self { key: key.to_string() }
    }

    fn update(&self, ctx: &mut ShellContext, edit: impl FnOnce(&mut VlanRecord)) -> ShellResult<Flow> {
        let mut record = require::<VlanRecord>(ctx, &self.key)?;
        edit(&mut record);
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    fn set_name(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let name = if inv.negate {
            None
        } else {
            let name = inv.operand(0).ok_or_else(|| usage("name <vlan-name>"))?;
            validation::validate_object_name(name)?;
            Some(name.to_string())
        };
        self.update(ctx, |vlan| vlan.name = name)
    }

    fn description(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let description = if inv.negate {
            None
        } else {
            let text = inv.text_from(0);
            if text.is_empty() {
                return Err(usage("description <text>"));
            }
            Some(validation::sanitize_config_value(&text)?)
        };
        self.update(ctx, |vlan| vlan.description = description)
    }
}

impl CommandSet for VlanCommands {
    fn name(&self) -> String {
        format!("vlan {}", self.key)
    }

    fn commands(&self, _ctx: &ShellContext) -> ShellResult<Vec<CommandSpec<Self>>> {
        Ok(vec![
            CommandSpec::new("name", Self::set_name)
                .negatable()
                .help("VLAN name")
                .nested(&["<vlan-name>"]),
            CommandSpec::new("description", Self::description)
                .negatable()
                .help("VLAN description")
                .nested(&["<text>"]),
        ])
    }
}
