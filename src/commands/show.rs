//! `show` commands, shared by the exec and config modes

use crate::cli::resolver::Invocation;
use crate::cli::session::{Flow, ShellContext};
use crate::cli::tree::CommandSpec;
use crate::commands::usage;
use crate::error::ShellResult;
use crate::net::{ArpController, BridgeController, NatController, RouteController};
use crate::runner::OsCommand;
use crate::store::{
    ArpRecord, BridgeRecord, DhcpPoolRecord, InterfaceRecord, NatPoolRecord, Record, RouteRecord,
    StoreExt, SystemRecord, VlanRecord,
};

const DNSMASQ_LEASES: &str = "/var/lib/misc/dnsmasq.leases";

/// The `show` command with every report it offers
pub fn command<S>() -> CommandSpec<S> {
    CommandSpec::new("show", show::<S>)
        .help("Show running system information")
        .nested(&["arp"])
        .help("Neighbor table")
        .nested(&["bridge"])
        .help("Bridges")
        .nested(&["interfaces"])
        .help("Interface configuration")
        .append(["brief", "statistic"])
        .nested(&["dhcp-client"])
        .help("DHCP client interfaces")
        .append(["log"])
        .nested(&["dhcp-server"])
        .help("DHCP server")
        .append(["leases", "lease-log", "server-log", "status"])
        .nested(&["hardware"])
        .help("Hardware inventory")
        .append(["cpu", "network"])
        .nested(&["route"])
        .help("Kernel routing table")
        .nested(&["running-config"])
        .help("Current configuration")
        .nested(&["nat"])
        .help("NAT rules")
        .nested(&["nat-db"])
        .help("Stored NAT pools")
        .nested(&["vlan"])
        .help("VLANs")
        .nested(&["vlan-db"])
        .help("Stored VLANs")
        .nested(&["if-db"])
        .help("Stored interfaces")
}

fn show<S>(_: &mut S, ctx: &mut ShellContext, inv: &Invocation) -> ShellResult<Flow> {
    match inv.operands().as_slice() {
        ["arp"] => {
            let table = ArpController::new(ctx.runner.as_ref()).show()?;
            ctx.print_block(&table);
        }
        ["bridge"] => show_bridges(ctx)?,
        ["interfaces"] => show_interfaces(ctx)?,
        ["interfaces", "brief"] => show_interfaces_brief(ctx)?,
        ["interfaces", "statistic"] => run_and_print(ctx, OsCommand::ip(["-s", "link", "show"]))?,
        ["dhcp-client"] => show_dhcp_clients(ctx)?,
        ["dhcp-client", "log"] => run_and_print(
            ctx,
            OsCommand::new("journalctl").args(["--no-pager", "-t", "dhclient"]),
        )?,
        ["dhcp-server"] => show_dhcp_pools(ctx)?,
        ["dhcp-server", "leases"] => run_and_print(ctx, OsCommand::new("cat").arg(DNSMASQ_LEASES))?,
        ["dhcp-server", "lease-log"] => run_and_print(
            ctx,
            OsCommand::new("journalctl").args(["--no-pager", "-u", "dnsmasq", "-g", "DHCPACK"]),
        )?,
        ["dhcp-server", "server-log"] => run_and_print(
            ctx,
            OsCommand::new("journalctl").args(["--no-pager", "-u", "dnsmasq"]),
        )?,
        ["dhcp-server", "status"] => run_and_print(
            ctx,
            OsCommand::new("systemctl").args(["status", "--no-pager", "dnsmasq"]),
        )?,
        ["hardware", class @ ("cpu" | "network")] => {
            run_and_print(ctx, OsCommand::new("lshw").args(["-class", *class]))?
        }
        ["route"] => {
            let table = RouteController::new(ctx.runner.as_ref()).show()?;
            ctx.print_block(&table);
        }
        ["running-config"] => {
            for line in running_config(ctx)? {
                ctx.say(line);
            }
        }
        ["nat"] => {
            let rules = NatController::new(ctx.runner.as_ref()).show()?;
            ctx.print_block(&rules);
        }
        ["nat-db"] => dump_table::<NatPoolRecord>(ctx)?,
        ["vlan"] => show_vlans(ctx)?,
        ["vlan-db"] => dump_table::<VlanRecord>(ctx)?,
        ["if-db"] => dump_table::<InterfaceRecord>(ctx)?,
        _ => return Err(usage("show ?")),
    }
    Ok(Flow::Continue)
}

fn run_and_print(ctx: &mut ShellContext, cmd: OsCommand) -> ShellResult<()> {
    let output = ctx.runner.check(&cmd)?;
    ctx.print_block(&output.stdout);
    Ok(())
}

fn dump_table<R: Record>(ctx: &mut ShellContext) -> ShellResult<()> {
    let rows = ctx.store.table_json(R::TABLE)?;
    let text = serde_json::to_string_pretty(&rows)?;
    ctx.print_block(&text);
    Ok(())
}

fn admin_state(shutdown: bool) -> &'static str {
    if shutdown { "down" } else { "up" }
}

fn show_bridges(ctx: &mut ShellContext) -> ShellResult<()> {
    let bridges = ctx.store.list::<BridgeRecord>()?;
    let interfaces = ctx.store.list::<InterfaceRecord>()?;

    ctx.say(format!("{:<16}{:<8}{:<8}{:<10}{}", "Bridge", "State", "STP", "Protocol", "Members"));
    for bridge in &bridges {
        let members: Vec<&str> = interfaces
            .iter()
            .filter(|i| i.bridge_group.as_deref() == Some(bridge.name.as_str()))
            .map(|i| i.name.as_str())
            .collect();
        ctx.say(format!(
            "{:<16}{:<8}{:<8}{:<10}{}",
            bridge.name,
            admin_state(bridge.shutdown),
            if bridge.stp { "on" } else { "off" },
            bridge.protocol.as_deref().unwrap_or("-"),
            members.join(",")
        ));
    }

    let kernel = BridgeController::new(ctx.runner.as_ref()).show()?;
    if !kernel.trim().is_empty() {
        ctx.say("");
        ctx.print_block(&kernel);
    }
    Ok(())
}

fn show_interfaces(ctx: &mut ShellContext) -> ShellResult<()> {
    for record in ctx.store.list::<InterfaceRecord>()? {
        ctx.say(format!("{} ({}) is administratively {}", record.name, record.kind, admin_state(record.shutdown)));
        if let Some(description) = &record.description {
            ctx.say(format!("  Description: {}", description));
        }
        if let Some(mac) = &record.mac {
            ctx.say(format!("  Hardware address: {}", mac));
        }
        for address in &record.addresses {
            let suffix = if address.secondary { " secondary" } else { "" };
            ctx.say(format!("  Internet address: {}{}", address.cidr, suffix));
        }
        if let Some(mtu) = record.mtu {
            ctx.say(format!("  MTU {} bytes", mtu));
        }
        if record.speed.is_some() || record.duplex.is_some() {
            ctx.say(format!(
                "  Speed {}, duplex {}",
                record.speed.as_deref().unwrap_or("auto"),
                record.duplex.as_deref().unwrap_or("auto")
            ));
        }
        if let Some(bridge) = &record.bridge_group {
            ctx.say(format!("  Bridge group: {}", bridge));
        }
        if let Some(vlan) = record.access_vlan {
            ctx.say(format!("  Access VLAN: {}", vlan));
        }
        if let Some(nat) = &record.nat {
            ctx.say(format!("  NAT {} pool {}", nat.direction, nat.pool));
        }
    }
    Ok(())
}

fn show_interfaces_brief(ctx: &mut ShellContext) -> ShellResult<()> {
    ctx.say(format!("{:<16}{:<10}{:<20}{:<8}{}", "Interface", "Type", "IP-Address", "Status", "Description"));
    for record in ctx.store.list::<InterfaceRecord>()? {
        let address = record
            .addresses
            .iter()
            .find(|a| !a.secondary)
            .map(|a| a.cidr.as_str())
            .unwrap_or(if record.dhcp_client { "dhcp" } else { "unassigned" });
        ctx.say(format!(
            "{:<16}{:<10}{:<20}{:<8}{}",
            record.name,
            record.kind.to_string(),
            address,
            admin_state(record.shutdown),
            record.description.as_deref().unwrap_or("")
        ));
    }
    Ok(())
}

fn show_dhcp_clients(ctx: &mut ShellContext) -> ShellResult<()> {
    let clients: Vec<String> = ctx
        .store
        .list::<InterfaceRecord>()?
        .into_iter()
        .filter(|i| i.dhcp_client)
        .map(|i| i.name)
        .collect();

    if clients.is_empty() {
        ctx.say("No interfaces use a DHCP client");
    }
    for name in clients {
        ctx.say(format!("{:<16}dhcp-client", name));
    }
    Ok(())
}

fn show_dhcp_pools(ctx: &mut ShellContext) -> ShellResult<()> {
    let interfaces = ctx.store.list::<InterfaceRecord>()?;
    for pool in ctx.store.list::<DhcpPoolRecord>()? {
        let served: Vec<&str> = interfaces
            .iter()
            .filter(|i| i.dhcp_server_pool.as_deref() == Some(pool.name.as_str()))
            .map(|i| i.name.as_str())
            .collect();
        ctx.say(format!(
            "Pool {} subnet {} mode {} interfaces {}",
            pool.name,
            pool.subnet.as_deref().unwrap_or("-"),
            pool.mode.as_deref().unwrap_or("dhcpv4"),
            if served.is_empty() { "-".to_string() } else { served.join(",") }
        ));
        for range in &pool.ranges {
            ctx.say(format!("  range {} - {} ({})", range.start, range.end, range.subnet));
        }
        for reservation in &pool.reservations {
            ctx.say(format!("  reservation {} -> {}", reservation.mac, reservation.address));
        }
    }
    Ok(())
}

fn show_vlans(ctx: &mut ShellContext) -> ShellResult<()> {
    let interfaces = ctx.store.list::<InterfaceRecord>()?;
    ctx.say(format!("{:<6}{:<20}{:<24}{}", "VLAN", "Name", "Description", "Ports"));
    for vlan in ctx.store.list::<VlanRecord>()? {
        let ports: Vec<&str> = interfaces
            .iter()
            .filter(|i| i.access_vlan == Some(vlan.id))
            .map(|i| i.name.as_str())
            .collect();
        ctx.say(format!(
            "{:<6}{:<20}{:<24}{}",
            vlan.id,
            vlan.name.as_deref().unwrap_or(""),
            vlan.description.as_deref().unwrap_or(""),
            ports.join(",")
        ));
    }
    Ok(())
}

/// Render the store as the command script that would recreate it
pub fn running_config(ctx: &ShellContext) -> ShellResult<Vec<String>> {
    let store = ctx.store.as_ref();
    let mut lines = vec![
        String::new(),
        "; RouterShell Configuration".to_string(),
        String::new(),
        "enable".to_string(),
        "configure terminal".to_string(),
        String::new(),
    ];

    let system = store.fetch::<SystemRecord>("system")?.unwrap_or_default();
    lines.push(format!("hostname {}", system.hostname));
    lines.push(String::new());
    if let Some(banner) = &system.banner_motd {
        lines.push(format!("banner motd {}", banner));
        lines.push(String::new());
    }

    if let Some(arp) = store.fetch::<ArpRecord>("global")? {
        let mut arp_lines = Vec::new();
        if let Some(timeout) = arp.timeout {
            arp_lines.push(format!("arp timeout {}", timeout));
        }
        if arp.proxy {
            arp_lines.push("arp proxy".to_string());
        }
        if arp.drop_gratuitous {
            arp_lines.push("arp drop-gratuitous".to_string());
        }
        if !arp_lines.is_empty() {
            lines.extend(arp_lines);
            lines.push(String::new());
        }
    }

    for bridge in store.list::<BridgeRecord>()? {
        lines.push(format!("bridge {}", bridge.name));
        if let Some(description) = &bridge.description {
            lines.push(format!(" description {}", description));
        }
        if let Some(protocol) = &bridge.protocol {
            lines.push(format!(" protocol {}", protocol));
        }
        if bridge.stp {
            lines.push(" stp".to_string());
        }
        lines.push(if bridge.shutdown { " shutdown" } else { " no shutdown" }.to_string());
        lines.push("end".to_string());
        lines.push(String::new());
    }

    for vlan in store.list::<VlanRecord>()? {
        lines.push(format!("vlan {}", vlan.id));
        if let Some(name) = &vlan.name {
            lines.push(format!(" name {}", name));
        }
        if let Some(description) = &vlan.description {
            lines.push(format!(" description {}", description));
        }
        lines.push("end".to_string());
        lines.push(String::new());
    }

    let pools = store.list::<NatPoolRecord>()?;
    if !pools.is_empty() {
        lines.extend(pools.iter().map(|pool| format!("ip nat pool {}", pool.name)));
        lines.push(String::new());
    }

    let routes = store.list::<RouteRecord>()?;
    if !routes.is_empty() {
        for route in &routes {
            let mut line = format!("ip route {} {}", route.destination, route.next_hop);
            if let Some(metric) = route.metric {
                line.push_str(&format!(" {}", metric));
            }
            lines.push(line);
        }
        lines.push(String::new());
    }

    for pool in store.list::<DhcpPoolRecord>()? {
        lines.push(format!("dhcp {}", pool.name));
        if let Some(subnet) = &pool.subnet {
            lines.push(format!(" subnet {}", subnet));
        }
        for range in &pool.ranges {
            lines.push(format!(" pool {} {} {}", range.start, range.end, range.subnet));
        }
        for reservation in &pool.reservations {
            lines.push(format!(
                " reservations hw-address {} ip-address {}",
                reservation.mac, reservation.address
            ));
        }
        for (name, value) in &pool.options {
            lines.push(format!(" option {} {}", name, value));
        }
        if let Some(mode) = &pool.mode {
            lines.push(format!(" mode {}", mode));
        }
        lines.push("end".to_string());
        lines.push(String::new());
    }

    for record in store.list::<InterfaceRecord>()? {
        lines.extend(interface_lines(&record));
        lines.push(String::new());
    }

    lines.push("end".to_string());
    Ok(lines)
}

fn interface_lines(record: &InterfaceRecord) -> Vec<String> {
    let mut lines = vec![match record.name.strip_prefix("loopback") {
        Some(id) if record.kind == crate::store::InterfaceKind::Loopback => format!("interface loopback {}", id),
        _ => format!("interface {}", record.name),
    }];

    if let Some(description) = &record.description {
        lines.push(format!(" description {}", description));
    }
    if let Some(mac) = &record.mac {
        lines.push(format!(" mac address {}", mac));
    }
    for address in &record.addresses {
        let suffix = if address.secondary { " secondary" } else { "" };
        lines.push(format!(" ip address {}{}", address.cidr, suffix));
    }
    if record.dhcp_client {
        lines.push(" ip dhcp-client".to_string());
    }
    if let Some(pool) = &record.dhcp_server_pool {
        lines.push(format!(" ip dhcp-server pool-name {}", pool));
    }
    if record.proxy_arp {
        lines.push(" ip proxy-arp".to_string());
    }
    if record.drop_gratuitous_arp {
        lines.push(" ip drop-gratuitous-arp".to_string());
    }
    for entry in &record.static_arp {
        lines.push(format!(" ip static-arp {} {} arpa", entry.address, entry.mac));
    }
    if let Some(nat) = &record.nat {
        lines.push(format!(" ip nat {} pool {}", nat.direction, nat.pool));
    }
    if let Some(speed) = &record.speed {
        lines.push(format!(" speed {}", speed));
    }
    if let Some(duplex) = &record.duplex {
        lines.push(format!(" duplex {}", duplex));
    }
    if let Some(mtu) = record.mtu {
        lines.push(format!(" mtu {}", mtu));
    }
    if let Some(bridge) = &record.bridge_group {
        lines.push(format!(" bridge group {}", bridge));
    }
    if let Some(vlan) = record.access_vlan {
        lines.push(format!(" switchport access-vlan {}", vlan));
    }
    lines.push(if record.shutdown { " shutdown" } else { " no shutdown" }.to_string());
    lines.push("end".to_string());
    lines
}
