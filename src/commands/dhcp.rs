//! DHCP server pool mode (`Router(config-dhcp-<pool>)#`)
//!
//! Pools live in the store only; the DHCP server reads them from there.

use crate::cli::resolver::Invocation;
use crate::cli::session::{Flow, ShellContext};
use crate::cli::tree::{CommandSet, CommandSpec};
use crate::commands::{require, usage};
use crate::error::{ShellError, ShellResult};
use crate::store::{DhcpPoolRecord, DhcpRange, DhcpReservation, StoreExt};
use crate::validation;
use std::net::{IpAddr, Ipv4Addr};

const MODES: [&str; 3] = ["dhcpv4", "dhcpv6", "dhcpv6-slaac"];

#[derive(Debug, Clone)]
pub struct DhcpPoolCommands {
    pool: String,
}

impl DhcpPoolCommands {
    pub fn new(pool: &str) -> Self {
        Self { pool: pool.to_string() }
    }

    fn record(&self, ctx: &ShellContext) -> ShellResult<DhcpPoolRecord> {
        require::<DhcpPoolRecord>(ctx, &self.pool)
    }

    fn subnet(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;
        record.subnet = if inv.negate {
            None
        } else {
            let cidr = inv.operand(0).ok_or_else(|| usage("subnet <a.b.c.d/n>"))?;
            validation::validate_cidr(cidr)?;
            Some(cidr.to_string())
        };
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    /// `pool <start> <end> <subnet>`; `no pool` alone drops every range
    fn pool(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;

        match (inv.operands().as_slice(), inv.negate) {
            ([], true) => record.ranges.clear(),
            ([start, end, subnet], negate) => {
                let range = DhcpRange {
                    start: start.to_string(),
                    end: end.to_string(),
                    subnet: subnet.to_string(),
                };
                if negate {
                    record.ranges.retain(|r| *r != range);
                } else {
                    check_range(&range)?;
                    if !record.ranges.contains(&range) {
                        record.ranges.push(range);
                    }
                }
            }
            _ => return Err(usage("pool <start-ip> <end-ip> <a.b.c.d/n>")),
        }

        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    /// `reservations hw-address <mac> ip-address <ip>`
    fn reservations(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;

        match (inv.operands().as_slice(), inv.negate) {
            (["hw-address", mac, ..], true) => {
                let mac = validation::validate_mac_address(mac)?;
                record.reservations.retain(|r| r.mac != mac);
            }
            (["hw-address", mac, "ip-address", address], false) => {
                let mac = validation::validate_mac_address(mac)?;
                validation::validate_ip_address(address)?;
                if let Some(taken) = record.reservations.iter().find(|r| r.address == *address && r.mac != mac) {
                    return Err(ShellError::AlreadyExists(format!(
                        "{} is reserved for {}",
                        address, taken.mac
                    )));
                }
                record.reservations.retain(|r| r.mac != mac);
                record.reservations.push(DhcpReservation { mac, address: address.to_string() });
            }
            _ => return Err(usage("reservations hw-address <mac> ip-address <ip>")),
        }

        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    /// `option <name> <value…>`; `no option <name>`
    fn option(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;
        let name = inv.operand(0).ok_or_else(|| usage("option <name> <value>"))?;
        validation::validate_object_name(name)?;

        if inv.negate {
            record.options.remove(name);
        } else {
            let value = inv.text_from(1);
            if value.is_empty() {
                return Err(usage("option <name> <value>"));
            }
            record
                .options
                .insert(name.to_string(), validation::sanitize_config_value(&value)?);
        }

        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    fn mode(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mode = match inv.operand(0) {
            Some(mode) if MODES.contains(&mode) => mode,
            _ => return Err(usage("mode dhcpv4|dhcpv6|dhcpv6-slaac")),
        };

        let mut record = self.record(ctx)?;
        record.mode = Some(mode.to_string());
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }
}

/// Both ends are IPv4 inside `subnet` and in order
fn check_range(range: &DhcpRange) -> ShellResult<()> {
    let start = u32::from(validation::validate_ipv4_address(&range.start)?);
    let end = u32::from(validation::validate_ipv4_address(&range.end)?);
    let (network, prefix) = match validation::validate_cidr(&range.subnet)? {
        (IpAddr::V4(network), prefix) => (network, prefix),
        (IpAddr::V6(_), _) => {
            return Err(ShellError::InvalidParameter(format!("{} is not an IPv4 subnet", range.subnet)))
        }
    };

    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - u32::from(prefix)) };
    let network = u32::from(network) & mask;
    let inside = |addr: u32| addr & mask == network;

    if !inside(start) || !inside(end) {
        return Err(ShellError::InvalidParameter(format!(
            "Range {} - {} is outside {}",
            range.start, range.end, range.subnet
        )));
    }
    if start > end {
        return Err(ShellError::InvalidParameter(format!(
            "Range start {} is after end {}",
            Ipv4Addr::from(start),
            Ipv4Addr::from(end)
        )));
    }
    Ok(())
}

impl CommandSet for DhcpPoolCommands {
    fn name(&self) -> String {
        format!("dhcp pool {}", self.pool)
    }

    fn commands(&self, _ctx: &ShellContext) -> ShellResult<Vec<CommandSpec<Self>>> {
        Ok(vec![
            CommandSpec::new("subnet", Self::subnet)
                .negatable()
                .help("Pool subnet")
                .nested(&["<cidr>"]),
            CommandSpec::new("pool", Self::pool)
                .negatable()
                .help("Address range")
                .nested(&["<start>", "<end>", "<cidr>"]),
            CommandSpec::new("reservations", Self::reservations)
                .negatable()
                .help("Fixed address for one client")
                .nested(&["hw-address", "<mac>", "ip-address", "<ip>"]),
            CommandSpec::new("option", Self::option)
                .negatable()
                .help("DHCP option")
                .nested(&["<name>", "<value>"]),
            CommandSpec::new("mode", Self::mode)
                .help("Address assignment mode")
                .extend(MODES),
        ])
    }
}
