//! Network interface control
//!
//! Link, address and neighbour management using the ip and ethtool commands

use crate::error::{ShellError, ShellResult};
use crate::runner::{CommandRunner, OsCommand};
use crate::validation;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One entry of `ip -json -d link show`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub name: String,
    pub link_type: String,
    pub info_kind: Option<String>,
    pub mac_address: Option<String>,
    pub mtu: Option<u32>,
    pub state: Option<String>,
}

/// Interface controller
pub struct InterfaceController<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> InterfaceController<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// List all links known to the kernel
    pub fn list(&self) -> ShellResult<Vec<LinkInfo>> {
        let output = self.runner.check(&OsCommand::ip(["-json", "-d", "link", "show"]))?;
        parse_links(&output.stdout)
    }

    /// Whether the kernel knows `interface`
    pub fn exists(&self, interface: &str) -> ShellResult<bool> {
        validation::validate_interface_name(interface)?;
        let output = self.runner.run(&OsCommand::ip(["link", "show", "dev", interface]))?;
        Ok(output.success())
    }

    /// Bring interface up
    pub fn up(&self, interface: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        self.run_ip(&["link", "set", "dev", interface, "up"])
    }

    /// Bring interface down
    pub fn down(&self, interface: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        self.run_ip(&["link", "set", "dev", interface, "down"])
    }

    /// Set an address; setting one that is already present is not an error
    pub fn set_ip(&self, interface: &str, cidr: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        validation::validate_cidr(cidr)?;
        self.run_ip(&["addr", "replace", cidr, "dev", interface])
    }

    /// Delete IP address
    pub fn del_ip(&self, interface: &str, cidr: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        validation::validate_cidr(cidr)?;
        self.run_ip(&["addr", "del", cidr, "dev", interface])
    }

    /// Flush all IP addresses
    pub fn flush_addrs(&self, interface: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        self.run_ip(&["addr", "flush", "dev", interface])
    }

    /// Set MAC address
    pub fn set_mac(&self, interface: &str, mac: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        let mac = validation::validate_mac_address(mac)?;

        // Must bring interface down first
        self.down(interface)?;
        self.run_ip(&["link", "set", "dev", interface, "address", &mac])?;
        self.up(interface)
    }

    /// Burned-in address as reported by `ethtool -P`
    pub fn permanent_mac(&self, interface: &str) -> ShellResult<String> {
        validation::validate_interface_name(interface)?;
        let output = self.runner.check(&OsCommand::new("ethtool").args(["-P", interface]))?;

        output
            .stdout
            .trim()
            .rsplit(' ')
            .next()
            .filter(|mac| validation::validate_mac_address(mac).is_ok())
            .map(str::to_string)
            .ok_or_else(|| ShellError::Parse(format!("No permanent address for {}", interface)))
    }

    /// Set MTU
    pub fn set_mtu(&self, interface: &str, mtu: u32) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        validation::validate_mtu(mtu)?;

        let mtu_str = mtu.to_string();
        self.run_ip(&["link", "set", "dev", interface, "mtu", &mtu_str])
    }

    /// `speed` is a value in Mb/s or `auto`
    pub fn set_speed(&self, interface: &str, speed: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        let cmd = match speed {
            "auto" => OsCommand::new("ethtool").args(["-s", interface, "autoneg", "on"]),
            _ => {
                let mbps: u32 = speed.parse().map_err(|_| {
                    ShellError::InvalidParameter(format!("Invalid speed: {}", speed))
                })?;
                OsCommand::new("ethtool")
                    .args(["-s", interface, "speed"])
                    .arg(mbps.to_string())
                    .args(["autoneg", "off"])
            }
        };
        self.runner.check(&cmd)?;
        Ok(())
    }

    pub fn set_duplex(&self, interface: &str, duplex: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        let cmd = match duplex {
            "auto" => OsCommand::new("ethtool").args(["-s", interface, "autoneg", "on"]),
            "half" | "full" => OsCommand::new("ethtool").args(["-s", interface, "duplex", duplex]),
            _ => {
                return Err(ShellError::InvalidParameter(format!("Invalid duplex: {}", duplex)));
            }
        };
        self.runner.check(&cmd)?;
        Ok(())
    }

    /// Rename interface
    pub fn rename(&self, old_name: &str, new_name: &str) -> ShellResult<()> {
        validation::validate_interface_name(old_name)?;
        validation::validate_interface_name(new_name)?;

        // Must be down to rename
        self.down(old_name)?;
        self.run_ip(&["link", "set", "dev", old_name, "name", new_name])?;
        self.up(new_name)
    }

    /// Create a loopback as a dummy link, left down
    pub fn create_loopback(&self, interface: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        self.run_ip(&["link", "add", "name", interface, "type", "dummy"])
    }

    /// Delete a virtual interface (bridge, dummy, vlan)
    pub fn delete(&self, interface: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        self.run_ip(&["link", "delete", "dev", interface])
    }

    /// Enslave to a bridge, or release from it with `None`
    pub fn set_master(&self, interface: &str, bridge: Option<&str>) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        match bridge {
            Some(bridge) => {
                validation::validate_interface_name(bridge)?;
                self.run_ip(&["link", "set", "dev", interface, "master", bridge])
            }
            None => self.run_ip(&["link", "set", "dev", interface, "nomaster"]),
        }
    }

    /// Untagged access VLAN on a bridge port
    pub fn set_access_vlan(&self, interface: &str, vid: u16, enable: bool) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        let vid = vid.to_string();
        let cmd = if enable {
            OsCommand::new("bridge").args(["vlan", "add", "vid", vid.as_str(), "dev", interface, "pvid", "untagged"])
        } else {
            OsCommand::new("bridge").args(["vlan", "del", "vid", vid.as_str(), "dev", interface])
        };
        self.runner.check(&cmd)?;
        Ok(())
    }

    /// Permanent neighbour entry
    pub fn set_static_arp(&self, interface: &str, address: &str, mac: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        validation::validate_ipv4_address(address)?;
        let mac = validation::validate_mac_address(mac)?;
        self.run_ip(&["neigh", "replace", address, "lladdr", &mac, "dev", interface, "nud", "permanent"])
    }

    pub fn del_static_arp(&self, interface: &str, address: &str) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        validation::validate_ipv4_address(address)?;
        self.run_ip(&["neigh", "del", address, "dev", interface])
    }

    pub fn set_proxy_arp(&self, interface: &str, enable: bool) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        super::sysctl(
            self.runner,
            &format!("net.ipv4.conf.{}.proxy_arp", interface),
            super::flag(enable),
        )
    }

    pub fn set_drop_gratuitous_arp(&self, interface: &str, enable: bool) -> ShellResult<()> {
        validation::validate_interface_name(interface)?;
        super::sysctl(
            self.runner,
            &format!("net.ipv4.conf.{}.drop_gratuitous_arp", interface),
            super::flag(enable),
        )
    }

    // === Helper functions ===

    fn run_ip(&self, args: &[&str]) -> ShellResult<()> {
        self.runner.check(&OsCommand::ip(args.iter().copied()))?;
        Ok(())
    }
}

/// Parse the JSON array printed by `ip -json -d link show`
pub fn parse_links(json_str: &str) -> ShellResult<Vec<LinkInfo>> {
    if json_str.trim().is_empty() {
        return Ok(Vec::new());
    }

    let json: serde_json::Value = serde_json::from_str(json_str)?;
    let mut links = Vec::new();

    if let Some(arr) = json.as_array() {
        for iface in arr {
            let Some(name) = iface.get("ifname").and_then(|v| v.as_str()) else {
                continue;
            };
            links.push(LinkInfo {
                name: name.to_string(),
                link_type: iface
                    .get("link_type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                info_kind: iface
                    .get("linkinfo")
                    .and_then(|v| v.get("info_kind"))
                    .and_then(|v| v.as_str())
                    .map(String::from),
                mac_address: iface.get("address").and_then(|v| v.as_str()).map(String::from),
                mtu: iface.get("mtu").and_then(|v| v.as_u64()).map(|v| v as u32),
                state: iface.get("operstate").and_then(|v| v.as_str()).map(String::from),
            });
        }
    }

    debug!("Parsed {} links", links.len());
    Ok(links)
}
