//! Interface configuration mode (`Router(config-<ifname>)#`)
//!
//! Every handler sets a target state: the OS is told the desired value and the stored
//! record is overwritten with it, so repeating a command (or its `no` form) changes nothing.

use crate::cli::resolver::Invocation;
use crate::cli::session::{Flow, ShellContext};
use crate::cli::tree::{CommandSet, CommandSpec};
use crate::commands::{names, require, usage};
use crate::error::{ShellError, ShellResult};
use crate::net::{DhcpClientController, InterfaceController, NatController};
use crate::store::{
    BridgeRecord, DhcpPoolRecord, InetAddress, InterfaceRecord, NatBinding, NatDirection, NatPoolRecord,
    StaticArp, StoreExt, VlanRecord,
};
use crate::validation;
use tracing::{debug, info};

const DEFAULT_MTU: u32 = 1500;

const SPEEDS: [&str; 6] = ["10", "100", "1000", "2500", "10000", "auto"];
const DUPLEX: [&str; 3] = ["auto", "half", "full"];

/// Commands scoped to one interface
#[derive(Debug, Clone)]
pub struct InterfaceCommands {
    name: String,
}

impl InterfaceCommands {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }

    fn record(&self, ctx: &ShellContext) -> ShellResult<InterfaceRecord> {
        require::<InterfaceRecord>(ctx, &self.name)
    }

    fn description(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;
        record.description = if inv.negate {
            None
        } else {
            let text = inv.text_from(0);
            if text.is_empty() {
                return Err(usage("description <text>"));
            }
            Some(validation::sanitize_config_value(&text)?)
        };
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    /// `mac address <mac>`, `mac auto`; `no mac` restores the burned-in address
    fn mac(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;
        let links = InterfaceController::new(ctx.runner.as_ref());

        match (inv.operands().as_slice(), inv.negate) {
            (["address", mac], false) => {
                let mac = validation::validate_mac_address(mac)?;
                links.set_mac(&self.name, &mac)?;
                record.mac = Some(mac);
            }
            (["auto"], false) | (_, true) => {
                let permanent = links.permanent_mac(&self.name)?;
                links.set_mac(&self.name, &permanent)?;
                record.mac = None;
            }
            _ => return Err(usage("mac address <xx:xx:xx:xx:xx:xx> | mac auto")),
        }

        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    fn ip(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;
        let name = self.name.as_str();
        let links = InterfaceController::new(ctx.runner.as_ref());
        let negate = inv.negate;

        match inv.operands().as_slice() {
            ["address"] if negate => {
                links.flush_addrs(name)?;
                record.addresses.clear();
            }
            ["address", cidr, rest @ ..] => {
                let secondary = match rest {
                    [] => false,
                    ["secondary"] => true,
                    _ => return Err(usage("ip address <a.b.c.d/n> [secondary]")),
                };
                validation::validate_cidr(cidr)?;

                if negate {
                    if record.addresses.iter().any(|a| a.cidr == *cidr) {
                        links.del_ip(name, cidr)?;
                        record.addresses.retain(|a| a.cidr != *cidr);
                    }
                } else {
                    // A new primary replaces the old one
                    if !secondary {
                        let old: Vec<String> = record
                            .addresses
                            .iter()
                            .filter(|a| !a.secondary && a.cidr != *cidr)
                            .map(|a| a.cidr.clone())
                            .collect();
                        for cidr in &old {
                            links.del_ip(name, cidr)?;
                        }
                        record.addresses.retain(|a| !old.contains(&a.cidr));
                    }
                    links.set_ip(name, cidr)?;
                    record.addresses.retain(|a| a.cidr != *cidr);
                    record.addresses.push(InetAddress { cidr: cidr.to_string(), secondary });
                }
            }
            ["proxy-arp"] => {
                links.set_proxy_arp(name, !negate)?;
                record.proxy_arp = !negate;
            }
            ["drop-gratuitous-arp"] => {
                links.set_drop_gratuitous_arp(name, !negate)?;
                record.drop_gratuitous_arp = !negate;
            }
            ["static-arp", address, ..] if negate => {
                if record.static_arp.iter().any(|e| e.address == *address) {
                    links.del_static_arp(name, address)?;
                    record.static_arp.retain(|e| e.address != *address);
                }
            }
            ["static-arp", address, mac, "arpa"] => {
                validation::validate_ip_address(address)?;
                let mac = validation::validate_mac_address(mac)?;
                links.set_static_arp(name, address, &mac)?;
                record.static_arp.retain(|e| e.address != *address);
                record.static_arp.push(StaticArp { address: address.to_string(), mac });
            }
            ["nat", ..] if negate => {
                if let Some(binding) = record.nat.take() {
                    NatController::new(ctx.runner.as_ref()).remove(name, binding.direction)?;
                }
            }
            ["nat", direction, "pool", pool] => {
                let direction = NatDirection::parse(direction)
                    .ok_or_else(|| usage("ip nat inside|outside pool <pool-name>"))?;
                if !ctx.store.exists::<NatPoolRecord>(pool)? {
                    return Err(ShellError::NotFound(format!("NAT pool {}", pool)));
                }

                let nat = NatController::new(ctx.runner.as_ref());
                if let Some(previous) = record.nat.as_ref().filter(|b| b.direction != direction) {
                    nat.remove(name, previous.direction)?;
                }
                nat.apply(name, direction)?;
                record.nat = Some(NatBinding { direction, pool: pool.to_string() });
            }
            ["dhcp-client"] => {
                let dhcp = DhcpClientController::new(ctx.runner.as_ref());
                if negate {
                    dhcp.release(name)?;
                } else {
                    dhcp.start(name)?;
                }
                record.dhcp_client = !negate;
            }
            ["dhcp-server", ..] if negate => record.dhcp_server_pool = None,
            ["dhcp-server", "pool-name", pool] => {
                if !ctx.store.exists::<DhcpPoolRecord>(pool)? {
                    return Err(ShellError::NotFound(format!("DHCP pool {}", pool)));
                }
                record.dhcp_server_pool = Some(pool.to_string());
            }
            _ => return Err(usage("ip ?")),
        }

        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    fn duplex(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let duplex = match inv.operand(0) {
            Some(duplex) if DUPLEX.contains(&duplex) => duplex,
            _ => return Err(usage("duplex auto|half|full")),
        };

        InterfaceController::new(ctx.runner.as_ref()).set_duplex(&self.name, duplex)?;
        let mut record = self.record(ctx)?;
        record.duplex = (duplex != "auto").then(|| duplex.to_string());
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    fn speed(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let speed = match inv.operand(0) {
            Some(speed) if SPEEDS.contains(&speed) => speed,
            _ => return Err(usage("speed 10|100|1000|2500|10000|auto")),
        };

        InterfaceController::new(ctx.runner.as_ref()).set_speed(&self.name, speed)?;
        let mut record = self.record(ctx)?;
        record.speed = (speed != "auto").then(|| speed.to_string());
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    fn mtu(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mtu = if inv.negate {
            None
        } else {
            let value = inv.operand(0).ok_or_else(|| usage("mtu <bytes>"))?;
            let mtu: u32 = value
                .parse()
                .map_err(|_| ShellError::InvalidParameter(format!("Invalid MTU: {}", value)))?;
            validation::validate_mtu(mtu)?;
            Some(mtu)
        };

        InterfaceController::new(ctx.runner.as_ref()).set_mtu(&self.name, mtu.unwrap_or(DEFAULT_MTU))?;
        let mut record = self.record(ctx)?;
        record.mtu = mtu;
        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    /// `[no] bridge group <bridge>`
    fn bridge_group(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;
        let links = InterfaceController::new(ctx.runner.as_ref());

        match (inv.operands().as_slice(), inv.negate) {
            (["group", ..], true) => {
                if record.bridge_group.take().is_some() {
                    links.set_master(&self.name, None)?;
                }
            }
            (["group", bridge], false) => {
                if !ctx.store.exists::<BridgeRecord>(bridge)? {
                    return Err(ShellError::NotFound(format!("Bridge {}", bridge)));
                }
                links.set_master(&self.name, Some(*bridge))?;
                record.bridge_group = Some(bridge.to_string());
                info!("{} joined bridge {}", self.name, bridge);
            }
            _ => return Err(usage("bridge group <bridge-name>")),
        }

        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }

    fn shutdown(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let links = InterfaceController::new(ctx.runner.as_ref());
        if inv.negate {
            links.up(&self.name)?;
        } else {
            links.down(&self.name)?;
        }

        let mut record = self.record(ctx)?;
        record.shutdown = !inv.negate;
        ctx.store.update(&record)?;
        debug!("{} administratively {}", self.name, if inv.negate { "up" } else { "down" });
        Ok(Flow::Continue)
    }

    /// `[no] switchport access-vlan <id>`
    fn switchport(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = self.record(ctx)?;
        let links = InterfaceController::new(ctx.runner.as_ref());

        match (inv.operands().as_slice(), inv.negate) {
            (["access-vlan", ..], true) => {
                if let Some(vid) = record.access_vlan.take() {
                    links.set_access_vlan(&self.name, vid, false)?;
                }
            }
            (["access-vlan", id], false) => {
                let vid = validation::validate_vlan_id(id)?;
                if !ctx.store.exists::<VlanRecord>(&VlanRecord::key_for(vid))? {
                    return Err(ShellError::NotFound(format!("VLAN {}", vid)));
                }
                if let Some(previous) = record.access_vlan.filter(|previous| *previous != vid) {
                    links.set_access_vlan(&self.name, previous, false)?;
                }
                links.set_access_vlan(&self.name, vid, true)?;
                record.access_vlan = Some(vid);
            }
            _ => return Err(usage("switchport access-vlan <vlan-id>")),
        }

        ctx.store.update(&record)?;
        Ok(Flow::Continue)
    }
}

impl CommandSet for InterfaceCommands {
    fn name(&self) -> String {
        format!("interface {}", self.name)
    }

    fn commands(&self, ctx: &ShellContext) -> ShellResult<Vec<CommandSpec<Self>>> {
        Ok(vec![
            CommandSpec::new("description", Self::description)
                .negatable()
                .help("Interface description")
                .nested(&["<text>"]),
            CommandSpec::new("mac", Self::mac)
                .negatable()
                .help("Hardware address")
                .nested(&["address", "<mac>"])
                .help("Set the hardware address")
                .nested(&["auto"])
                .help("Restore the burned-in address"),
            CommandSpec::new("ip", Self::ip)
                .negatable()
                .help("Interface IP settings")
                .nested(&["address", "<cidr>", "secondary"])
                .help("Interface address")
                .nested(&["proxy-arp"])
                .help("Answer ARP for other hosts")
                .nested(&["drop-gratuitous-arp"])
                .help("Ignore gratuitous ARP")
                .nested(&["static-arp", "<ip>", "<mac>", "arpa"])
                .help("Permanent ARP entry")
                .nested(&["nat", "inside", "pool", "<pool>"])
                .help("NAT")
                .nested(&["nat", "outside", "pool", "<pool>"])
                .nested(&["dhcp-client"])
                .help("Obtain an address over DHCP")
                .nested(&["dhcp-server", "pool-name"])
                .help("Serve a DHCP pool on this interface")
                .append(names::<DhcpPoolRecord>(ctx)),
            CommandSpec::new("duplex", Self::duplex)
                .help("Duplex mode")
                .extend(DUPLEX),
            CommandSpec::new("speed", Self::speed)
                .help("Link speed in Mbit/s")
                .extend(SPEEDS),
            CommandSpec::new("mtu", Self::mtu)
                .negatable()
                .help("Maximum transmission unit")
                .nested(&["<bytes>"]),
            CommandSpec::new("bridge", Self::bridge_group)
                .negatable()
                .help("Bridge membership")
                .nested(&["group"])
                .help("Join a bridge")
                .append(names::<BridgeRecord>(ctx)),
            CommandSpec::new("shutdown", Self::shutdown)
                .negatable()
                .help("Disable the interface"),
            CommandSpec::new("switchport", Self::switchport)
                .negatable()
                .help("Bridge port settings")
                .nested(&["access-vlan", "<vlan-id>"])
                .help("Untagged access VLAN"),
        ])
    }
}
