//! Global configuration mode (`Router(config)#`)

use crate::cli::launcher::{launch, ObjectKind};
use crate::cli::resolver::Invocation;
use crate::cli::session::{Flow, ShellContext};
use crate::cli::tree::{CommandSet, CommandSpec};
use crate::commands::{interface_names, names, show, usage};
use crate::commands::{BridgeCommands, DhcpPoolCommands, InterfaceCommands, VlanCommands};
use crate::error::{ShellError, ShellResult};
use crate::net::{ArpController, BridgeController, InterfaceController, RouteController};
use crate::runner::OsCommand;
use crate::store::{
    ArpRecord, BridgeRecord, DhcpPoolRecord, InterfaceRecord, NatPoolRecord, Record, RouteRecord,
    StoreExt, SystemRecord, VlanRecord,
};
use crate::validation;
use tracing::{debug, info, warn};

/// Kernel default for `net.ipv4.neigh.default.gc_stale_time`
const DEFAULT_ARP_TIMEOUT: u32 = 60;

#[derive(Debug, Default)]
pub struct ConfigCommands;

impl ConfigCommands {
    pub fn new() -> Self {
        Self
    }

    fn hostname(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let hostname = inv.operand(0).ok_or_else(|| usage("hostname <name>"))?;
        validation::validate_hostname(hostname)?;

        ctx.runner.check(&OsCommand::new("hostnamectl").args(["set-hostname", hostname]))?;
        ctx.store.set_hostname(hostname)?;
        info!("Hostname set to {}", hostname);
        Ok(Flow::Continue)
    }

    /// `banner motd <text…>`
    fn banner(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        if inv.operand(0) != Some("motd") {
            return Err(usage("banner motd <text>"));
        }

        let mut system = ctx.store.fetch::<SystemRecord>("system")?.unwrap_or_default();
        if system.hostname.is_empty() {
            system.hostname = ctx.config.defaults.hostname.clone();
        }
        system.banner_motd = if inv.negate {
            None
        } else {
            let text = inv.text_from(1);
            if text.is_empty() {
                return Err(usage("banner motd <text>"));
            }
            Some(validation::sanitize_config_value(&text)?)
        };
        ctx.store.upsert(&system)?;
        Ok(Flow::Continue)
    }

    fn interface(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let ifname = inv.operand(0).ok_or_else(|| usage("interface <ifname>"))?;
        launch(ObjectKind::Ethernet, ifname, ctx, InterfaceCommands::new)
    }

    /// `[no] interface loopback <id>`
    fn loopback(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let id = inv.operand(0).ok_or_else(|| usage("interface loopback <id>"))?;
        if !inv.negate {
            return launch(ObjectKind::Loopback, id, ctx, InterfaceCommands::new);
        }

        let name = ObjectKind::Loopback.object_name(id)?;
        if ctx.store.exists::<InterfaceRecord>(&name)? {
            InterfaceController::new(ctx.runner.as_ref()).delete(&name)?;
            ctx.store.remove::<InterfaceRecord>(&name)?;
            info!("Deleted loopback {}", name);
        }
        Ok(Flow::Continue)
    }

    /// `[no] bridge <name>`
    fn bridge(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let name = inv.operand(0).ok_or_else(|| usage("bridge <name>"))?;
        if !inv.negate {
            return launch(ObjectKind::Bridge, name, ctx, BridgeCommands::new);
        }

        validation::validate_interface_name(name)?;
        if !ctx.store.exists::<BridgeRecord>(name)? {
            debug!("Bridge {} not configured", name);
            return Ok(Flow::Continue);
        }

        BridgeController::new(ctx.runner.as_ref()).destroy(name)?;
        for mut member in ctx.store.list::<InterfaceRecord>()? {
            if member.bridge_group.as_deref() == Some(name) {
                member.bridge_group = None;
                ctx.store.update(&member)?;
            }
        }
        ctx.store.remove::<BridgeRecord>(name)?;
        info!("Destroyed bridge {}", name);
        Ok(Flow::Continue)
    }

    /// `[no] vlan <id>`
    fn vlan(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let id = inv.operand(0).ok_or_else(|| usage("vlan <id>"))?;
        if !inv.negate {
            return launch(ObjectKind::Vlan, id, ctx, VlanCommands::new);
        }

        let vid = validation::validate_vlan_id(id)?;
        for mut port in ctx.store.list::<InterfaceRecord>()? {
            if port.access_vlan == Some(vid) {
                warn!("Interface {} loses access VLAN {}", port.name, vid);
                port.access_vlan = None;
                ctx.store.update(&port)?;
            }
        }
        ctx.store.remove::<VlanRecord>(&VlanRecord::key_for(vid))?;
        Ok(Flow::Continue)
    }

    /// `[no] dhcp <pool>`
    fn dhcp(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let pool = inv.operand(0).ok_or_else(|| usage("dhcp <pool-name>"))?;
        if !inv.negate {
            return launch(ObjectKind::DhcpPool, pool, ctx, DhcpPoolCommands::new);
        }

        for mut served in ctx.store.list::<InterfaceRecord>()? {
            if served.dhcp_server_pool.as_deref() == Some(pool) {
                served.dhcp_server_pool = None;
                ctx.store.update(&served)?;
            }
        }
        if ctx.store.remove::<DhcpPoolRecord>(pool)? {
            info!("Deleted DHCP pool {}", pool);
        }
        Ok(Flow::Continue)
    }

    /// `[no] arp timeout <secs> | proxy | drop-gratuitous`
    fn arp(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let mut record = ctx.store.fetch::<ArpRecord>("global")?.unwrap_or_default();
        let arp = ArpController::new(ctx.runner.as_ref());

        match (inv.operands().as_slice(), inv.negate) {
            (["timeout", secs], false) => {
                let secs: u32 = secs
                    .parse()
                    .map_err(|_| ShellError::InvalidParameter(format!("Invalid ARP timeout: {}", secs)))?;
                arp.set_timeout(secs)?;
                record.timeout = Some(secs);
            }
            (["timeout", ..], true) => {
                arp.set_timeout(DEFAULT_ARP_TIMEOUT)?;
                record.timeout = None;
            }
            (["proxy"], negate) => {
                arp.set_proxy(!negate)?;
                record.proxy = !negate;
            }
            (["drop-gratuitous"], negate) => {
                arp.set_drop_gratuitous(!negate)?;
                record.drop_gratuitous = !negate;
            }
            _ => return Err(usage("arp timeout <seconds> | proxy | drop-gratuitous")),
        }

        ctx.store.upsert(&record)?;
        Ok(Flow::Continue)
    }

    /// `[no] ip route <cidr> <next-hop> [<metric>]` and `[no] ip nat pool <name>`
    fn ip(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        match inv.operands().as_slice() {
            ["route", destination, next_hop, rest @ ..] if rest.len() <= 1 => {
                let metric = match rest.first() {
                    Some(metric) => Some(metric.parse::<u32>().map_err(|_| {
                        ShellError::InvalidParameter(format!("Invalid metric: {}", metric))
                    })?),
                    None => None,
                };
                let route = RouteRecord {
                    destination: destination.to_string(),
                    next_hop: next_hop.to_string(),
                    metric,
                };

                let routes = RouteController::new(ctx.runner.as_ref());
                if inv.negate {
                    if ctx.store.exists::<RouteRecord>(&route.key())? {
                        routes.delete(destination, next_hop, metric)?;
                        ctx.store.remove::<RouteRecord>(&route.key())?;
                    }
                } else {
                    routes.add(destination, next_hop, metric)?;
                    ctx.store.upsert(&route)?;
                }
            }
            ["nat", "pool", pool] => {
                validation::validate_object_name(pool)?;
                if inv.negate {
                    let in_use = ctx
                        .store
                        .list::<InterfaceRecord>()?
                        .into_iter()
                        .any(|i| i.nat.as_ref().map(|n| n.pool.as_str()) == Some(*pool));
                    if in_use {
                        return Err(ShellError::InvalidParameter(format!(
                            "NAT pool {} is still bound to an interface",
                            pool
                        )));
                    }
                    ctx.store.remove::<NatPoolRecord>(pool)?;
                } else {
                    ctx.store.upsert(&NatPoolRecord { name: pool.to_string() })?;
                }
            }
            _ => return Err(usage("ip route <cidr> <next-hop> [<metric>] | ip nat pool <name>")),
        }
        Ok(Flow::Continue)
    }

    /// `[no] rename if <old> if-alias <new>`; the negated form renames back
    fn rename(&mut self, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
        let (from, to) = match inv.operands().as_slice() {
            ["if", old, "if-alias", new] if inv.negate => (new.to_string(), old.to_string()),
            ["if", old, "if-alias", new] => (old.to_string(), new.to_string()),
            _ => return Err(usage("rename if <ifname> if-alias <new-name>")),
        };

        let mut record = crate::commands::require::<InterfaceRecord>(ctx, &from)?;
        if ctx.store.exists::<InterfaceRecord>(&to)? {
            return Err(ShellError::AlreadyExists(format!("Interface {}", to)));
        }

        InterfaceController::new(ctx.runner.as_ref()).rename(&from, &to)?;
        ctx.store.remove::<InterfaceRecord>(&from)?;
        record.name = to.clone();
        ctx.store.insert(&record)?;
        info!("Renamed interface {} to {}", from, to);
        Ok(Flow::Continue)
    }
}

impl CommandSet for ConfigCommands {
    fn name(&self) -> String {
        "config".to_string()
    }

    fn commands(&self, ctx: &ShellContext) -> ShellResult<Vec<CommandSpec<Self>>> {
        let interfaces = interface_names(ctx);

        Ok(vec![
            CommandSpec::new("hostname", Self::hostname)
                .help("Set the system hostname")
                .nested(&["<name>"]),
            CommandSpec::new("banner", Self::banner)
                .negatable()
                .help("Login banner")
                .nested(&["motd", "<text>"])
                .help("Message of the day"),
            CommandSpec::new("interface", Self::interface)
                .help("Configure an interface")
                .nested(&["<ifname>"])
                .extend(interfaces.clone()),
            CommandSpec::new("interface loopback", Self::loopback)
                .negatable()
                .help("Loopback interface")
                .nested(&["<id>"]),
            CommandSpec::new("bridge", Self::bridge)
                .negatable()
                .help("Configure a bridge")
                .nested(&["<name>"])
                .extend(names::<BridgeRecord>(ctx)),
            CommandSpec::new("vlan", Self::vlan)
                .negatable()
                .help("Configure a VLAN")
                .nested(&["<id>"]),
            CommandSpec::new("arp", Self::arp)
                .negatable()
                .help("Global ARP settings")
                .nested(&["timeout", "<seconds>"])
                .help("Stale entry timeout")
                .nested(&["proxy"])
                .help("Answer ARP on behalf of other hosts")
                .nested(&["drop-gratuitous"])
                .help("Ignore gratuitous ARP"),
            CommandSpec::new("dhcp", Self::dhcp)
                .negatable()
                .help("Configure a DHCP server pool")
                .nested(&["<pool-name>"])
                .extend(names::<DhcpPoolRecord>(ctx)),
            CommandSpec::new("ip", Self::ip)
                .negatable()
                .help("Global IP settings")
                .nested(&["route", "<destination>", "<next-hop>", "<metric>"])
                .help("Static route")
                .nested(&["nat", "pool", "<name>"])
                .help("NAT pool"),
            CommandSpec::new("rename", Self::rename)
                .negatable()
                .help("Rename an interface")
                .nested(&["if"])
                .append(interfaces),
            show::command::<Self>(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::testing::context;
    use crate::cli::{ExecMode, Frame, ModeFrame};
    use crate::store::{InterfaceKind, NatBinding, NatDirection};

    fn dispatch(frame: &mut Box<dyn ModeFrame>, ctx: &mut ShellContext, line: &str) -> ShellResult<Flow> {
        frame.dispatch(line, ExecMode::Config, ctx)
    }

    fn frame(ctx: &ShellContext) -> Box<dyn ModeFrame> {
        Frame::boxed(ConfigCommands::new(), ctx).unwrap()
    }

    fn pushed_label(flow: Flow) -> Option<String> {
        match flow {
            Flow::Push(sub) => sub.label,
            other => panic!("expected a push, got {:?}", other),
        }
    }

    #[test]
    fn test_hostname_updates_store() {
        let (mut ctx, log, _out) = context();
        let mut frame = frame(&ctx);
        dispatch(&mut frame, &mut ctx, "hostname edge-1").unwrap();

        assert_eq!(ctx.store.hostname().unwrap().as_deref(), Some("edge-1"));
        assert_eq!(log.lines(), vec!["hostnamectl set-hostname edge-1"]);
        assert!(dispatch(&mut frame, &mut ctx, "hostname bad_name!").is_err());
    }

    #[test]
    fn test_banner_set_and_clear() {
        let (mut ctx, _log, _out) = context();
        let mut frame = frame(&ctx);
        dispatch(&mut frame, &mut ctx, "banner motd Authorized access only").unwrap();
        let system: SystemRecord = ctx.store.fetch("system").unwrap().unwrap();
        assert_eq!(system.banner_motd.as_deref(), Some("Authorized access only"));
        assert_eq!(system.hostname, "gw1");

        dispatch(&mut frame, &mut ctx, "no banner motd").unwrap();
        let system: SystemRecord = ctx.store.fetch("system").unwrap().unwrap();
        assert_eq!(system.banner_motd, None);
    }

    #[test]
    fn test_interface_enters_submode() {
        let (mut ctx, _log, _out) = context();
        let mut frame = frame(&ctx);
        let flow = dispatch(&mut frame, &mut ctx, "interface eth1").unwrap();
        assert_eq!(pushed_label(flow).as_deref(), Some("eth1"));

        let err = dispatch(&mut frame, &mut ctx, "interface eth9").err().unwrap();
        assert!(matches!(err, ShellError::NotFound(_)));
    }

    #[test]
    fn test_loopback_create_and_delete() {
        let (mut ctx, log, _out) = context();
        let mut frame = frame(&ctx);

        let flow = dispatch(&mut frame, &mut ctx, "interface loopback 1").unwrap();
        assert_eq!(pushed_label(flow).as_deref(), Some("loopback1"));
        assert!(ctx.store.exists::<InterfaceRecord>("loopback1").unwrap());

        log.clear();
        dispatch(&mut frame, &mut ctx, "no interface loopback 1").unwrap();
        assert_eq!(log.lines(), vec!["ip link delete dev loopback1"]);
        assert!(!ctx.store.exists::<InterfaceRecord>("loopback1").unwrap());

        // Already gone
        log.clear();
        dispatch(&mut frame, &mut ctx, "no interface loopback 1").unwrap();
        assert!(log.lines().is_empty());
    }

    #[test]
    fn test_no_interface_is_not_negatable() {
        let (mut ctx, _log, _out) = context();
        let mut frame = frame(&ctx);
        let err = dispatch(&mut frame, &mut ctx, "no interface eth0").err().unwrap();
        assert_eq!(err.to_string(), "No negate option for `interface`");
    }

    #[test]
    fn test_bridge_removal_releases_members() {
        let (mut ctx, log, _out) = context();
        let mut frame = frame(&ctx);
        dispatch(&mut frame, &mut ctx, "bridge br0").unwrap();

        let mut eth1: InterfaceRecord = ctx.store.fetch("eth1").unwrap().unwrap();
        eth1.bridge_group = Some("br0".into());
        ctx.store.update(&eth1).unwrap();

        log.clear();
        dispatch(&mut frame, &mut ctx, "no bridge br0").unwrap();
        assert_eq!(log.lines(), vec!["ip link delete dev br0 type bridge"]);
        let eth1: InterfaceRecord = ctx.store.fetch("eth1").unwrap().unwrap();
        assert_eq!(eth1.bridge_group, None);
        assert!(!ctx.store.exists::<BridgeRecord>("br0").unwrap());
    }

    #[test]
    fn test_vlan_and_dhcp_pool_labels() {
        let (mut ctx, log, _out) = context();
        let mut frame = frame(&ctx);

        let flow = dispatch(&mut frame, &mut ctx, "vlan 20").unwrap();
        assert_eq!(pushed_label(flow).as_deref(), Some("vlan20"));
        let flow = dispatch(&mut frame, &mut ctx, "dhcp lan-pool").unwrap();
        assert_eq!(pushed_label(flow).as_deref(), Some("dhcp-lan-pool"));
        assert!(log.lines().is_empty());

        dispatch(&mut frame, &mut ctx, "no vlan 20").unwrap();
        dispatch(&mut frame, &mut ctx, "no dhcp lan-pool").unwrap();
        assert!(ctx.store.list::<VlanRecord>().unwrap().is_empty());
        assert!(ctx.store.list::<DhcpPoolRecord>().unwrap().is_empty());
    }

    #[test]
    fn test_arp_settings() {
        let (mut ctx, log, _out) = context();
        let mut frame = frame(&ctx);
        dispatch(&mut frame, &mut ctx, "arp timeout 120").unwrap();
        dispatch(&mut frame, &mut ctx, "arp proxy").unwrap();
        dispatch(&mut frame, &mut ctx, "no arp proxy").unwrap();

        let arp: ArpRecord = ctx.store.fetch("global").unwrap().unwrap();
        assert_eq!(arp.timeout, Some(120));
        assert!(!arp.proxy);
        assert_eq!(
            log.lines(),
            vec![
                "sysctl -w net.ipv4.neigh.default.gc_stale_time=120",
                "sysctl -w net.ipv4.conf.all.proxy_arp=1",
                "sysctl -w net.ipv4.conf.all.proxy_arp=0",
            ]
        );
        assert!(dispatch(&mut frame, &mut ctx, "arp timeout soon").is_err());
    }

    #[test]
    fn test_static_route() {
        let (mut ctx, log, _out) = context();
        let mut frame = frame(&ctx);
        dispatch(&mut frame, &mut ctx, "ip route 10.20.0.0/16 192.168.1.254 5").unwrap();
        assert_eq!(log.lines(), vec!["ip route replace 10.20.0.0/16 via 192.168.1.254 metric 5"]);

        let routes = ctx.store.list::<RouteRecord>().unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].metric, Some(5));

        dispatch(&mut frame, &mut ctx, "no ip route 10.20.0.0/16 192.168.1.254 5").unwrap();
        assert!(ctx.store.list::<RouteRecord>().unwrap().is_empty());
        assert!(dispatch(&mut frame, &mut ctx, "ip route 10.20.0.0/16").is_err());
    }

    #[test]
    fn test_nat_pool_in_use_is_kept() {
        let (mut ctx, _log, _out) = context();
        let mut frame = frame(&ctx);
        dispatch(&mut frame, &mut ctx, "ip nat pool wan").unwrap();

        let mut eth0: InterfaceRecord = ctx.store.fetch("eth0").unwrap().unwrap();
        eth0.nat = Some(NatBinding { direction: NatDirection::Outside, pool: "wan".into() });
        ctx.store.update(&eth0).unwrap();

        assert!(dispatch(&mut frame, &mut ctx, "no ip nat pool wan").is_err());
        assert!(ctx.store.exists::<NatPoolRecord>("wan").unwrap());
    }

    #[test]
    fn test_rename_interface() {
        let (mut ctx, log, _out) = context();
        let mut frame = frame(&ctx);
        dispatch(&mut frame, &mut ctx, "rename if eth1 if-alias lan0").unwrap();

        assert_eq!(
            log.lines(),
            vec![
                "ip link set dev eth1 down",
                "ip link set dev eth1 name lan0",
                "ip link set dev lan0 up",
            ]
        );
        let lan0: InterfaceRecord = ctx.store.fetch("lan0").unwrap().unwrap();
        assert_eq!(lan0.kind, InterfaceKind::Ethernet);
        assert!(!ctx.store.exists::<InterfaceRecord>("eth1").unwrap());

        dispatch(&mut frame, &mut ctx, "no rename if eth1 if-alias lan0").unwrap();
        assert!(ctx.store.exists::<InterfaceRecord>("eth1").unwrap());
    }
}
