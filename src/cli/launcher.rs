//! Sub-mode launcher
//!
//! Entering an object scoped mode first makes sure the object exists. What happens when
//! it does not is decided per object type:
//!
//! | Object type        | Missing on entry                     |
//! |--------------------|--------------------------------------|
//! | Loopback interface | create in OS and store               |
//! | Ethernet interface | adopt from the OS if present, else reject |
//! | Bridge             | create in OS and store               |
//! | DHCP pool          | create in store only                 |
//! | VLAN               | create in store only                 |

use crate::cli::session::{Flow, Frame, ShellContext, SubMode};
use crate::cli::tree::CommandSet;
use crate::error::{ShellError, ShellResult};
use crate::net::{BridgeController, InterfaceController};
use crate::store::{
    BridgeRecord, ConfigStore, DhcpPoolRecord, InterfaceKind, InterfaceRecord, StoreExt, VlanRecord,
};
use crate::validation;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Loopback,
    Ethernet,
    Bridge,
    DhcpPool,
    Vlan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    CreateInOsAndStore,
    Reject,
    CreateInStore,
}

pub const POLICY_TABLE: [(ObjectKind, MissingPolicy); 5] = [
    (ObjectKind::Loopback, MissingPolicy::CreateInOsAndStore),
    (ObjectKind::Ethernet, MissingPolicy::Reject),
    (ObjectKind::Bridge, MissingPolicy::CreateInOsAndStore),
    (ObjectKind::DhcpPool, MissingPolicy::CreateInStore),
    (ObjectKind::Vlan, MissingPolicy::CreateInStore),
];

impl ObjectKind {
    pub fn missing_policy(self) -> MissingPolicy {
        POLICY_TABLE
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, policy)| *policy)
            .unwrap_or(MissingPolicy::Reject)
    }

    /// Name of the object as stored, e.g. `loopback0` for loopback `0`
    pub fn object_name(self, id: &str) -> ShellResult<String> {
        match self {
            ObjectKind::Loopback => {
                let id: u32 = id.parse().map_err(|_| {
                    ShellError::InvalidParameter(format!("Invalid loopback id: {}", id))
                })?;
                let name = format!("loopback{}", id);
                validation::validate_interface_name(&name)?;
                Ok(name)
            }
            ObjectKind::Ethernet | ObjectKind::Bridge => {
                validation::validate_interface_name(id)?;
                Ok(id.to_string())
            }
            ObjectKind::DhcpPool => {
                validation::validate_object_name(id)?;
                Ok(id.to_string())
            }
            ObjectKind::Vlan => Ok(VlanRecord::key_for(validation::validate_vlan_id(id)?)),
        }
    }

    /// Prompt label: `Router(config-<label>)#`
    pub fn label(self, name: &str) -> String {
        match self {
            ObjectKind::DhcpPool => format!("dhcp-{}", name),
            ObjectKind::Vlan => format!("vlan{}", name.trim_start_matches('0')),
            _ => name.to_string(),
        }
    }

    fn exists(self, name: &str, store: &dyn ConfigStore) -> ShellResult<bool> {
        match self {
            ObjectKind::Loopback | ObjectKind::Ethernet => store.exists::<InterfaceRecord>(name),
            ObjectKind::Bridge => store.exists::<BridgeRecord>(name),
            ObjectKind::DhcpPool => store.exists::<DhcpPoolRecord>(name),
            ObjectKind::Vlan => store.exists::<VlanRecord>(name),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Loopback => "Loopback interface",
            ObjectKind::Ethernet => "Interface",
            ObjectKind::Bridge => "Bridge",
            ObjectKind::DhcpPool => "DHCP pool",
            ObjectKind::Vlan => "VLAN",
        };
        write!(f, "{}", name)
    }
}

/// Make sure the object behind `id` exists, applying the missing-object policy.
/// Returns the stored object name.
pub fn ensure_object(kind: ObjectKind, id: &str, ctx: &mut ShellContext) -> ShellResult<String> {
    let name = kind.object_name(id)?;
    if kind.exists(&name, ctx.store.as_ref())? {
        return Ok(name);
    }

    match kind.missing_policy() {
        MissingPolicy::Reject => {
            if adopt_interface(&name, ctx)? {
                return Ok(name);
            }
            warn!("{} {} does not exist", kind, name);
            Err(ShellError::NotFound(format!("{} {} does not exist", kind, name)))
        }
        MissingPolicy::CreateInOsAndStore => {
            let runner = ctx.runner.as_ref();
            let bridges = BridgeController::new(runner);
            let links = InterfaceController::new(runner);

            // Once the link exists, any later failure removes it again
            let finished = match kind {
                ObjectKind::Bridge => {
                    bridges.create(&name)?;
                    bridges
                        .set_state(&name, true)
                        .and_then(|()| ctx.store.insert(&BridgeRecord::new(&name)))
                }
                _ => {
                    links.create_loopback(&name)?;
                    links
                        .up(&name)
                        .and_then(|()| ctx.store.insert(&InterfaceRecord::new(&name, InterfaceKind::Loopback)))
                }
            };

            if let Err(e) = finished {
                warn!("Creating {} {} failed, removing the link: {}", kind, name, e);
                let removed = match kind {
                    ObjectKind::Bridge => bridges.destroy(&name),
                    _ => links.delete(&name),
                };
                if let Err(undo) = removed {
                    warn!("Could not remove {}: {}", name, undo);
                }
                return Err(e);
            }

            info!("Created {} {}", kind, name);
            Ok(name)
        }
        MissingPolicy::CreateInStore => {
            match kind {
                ObjectKind::Vlan => ctx.store.insert(&VlanRecord {
                    id: validation::validate_vlan_id(id)?,
                    name: None,
                    description: None,
                })?,
                _ => ctx.store.insert(&DhcpPoolRecord::new(&name))?,
            }
            info!("Created {} {}", kind, name);
            Ok(name)
        }
    }
}

/// Register an interface the kernel has but the store does not know yet
fn adopt_interface(name: &str, ctx: &mut ShellContext) -> ShellResult<bool> {
    let links = InterfaceController::new(ctx.runner.as_ref()).list()?;
    let Some(link) = links.into_iter().find(|link| link.name == name) else {
        return Ok(false);
    };

    let kind = InterfaceKind::from_link(&link.link_type, link.info_kind.as_deref());
    ctx.store.insert(&InterfaceRecord::new(name, kind))?;
    info!("Adopted {} interface {} from the OS", kind, name);
    Ok(true)
}

/// Register every OS interface missing from the store. Returns how many were added.
pub fn discover_interfaces(ctx: &mut ShellContext) -> ShellResult<usize> {
    let links = InterfaceController::new(ctx.runner.as_ref()).list()?;
    let mut added = 0;

    for link in links {
        if ctx.store.exists::<InterfaceRecord>(&link.name)? {
            continue;
        }
        let kind = InterfaceKind::from_link(&link.link_type, link.info_kind.as_deref());
        ctx.store.insert(&InterfaceRecord::new(&link.name, kind))?;
        added += 1;
    }

    info!("Interface discovery added {} interfaces", added);
    Ok(added)
}

/// Enter the configuration mode of one object, built by `factory` from its stored name
pub fn launch<S, F>(kind: ObjectKind, id: &str, ctx: &mut ShellContext, factory: F) -> ShellResult<Flow>
where
    S: CommandSet,
    F: FnOnce(&str) -> S,
{
    let name = ensure_object(kind, id, ctx)?;
    let frame = Frame::boxed(factory(&name), ctx)?;
    Ok(Flow::Push(SubMode::new(Some(kind.label(&name)), frame)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::testing::{context, context_with};
    use crate::runner::{CommandOutput, DryRunRunner};

    const LINKS: &str = r#"[
        {"ifname":"eth0","link_type":"ether"},
        {"ifname":"eth2","link_type":"ether"},
        {"ifname":"br9","link_type":"ether","linkinfo":{"info_kind":"bridge"}}
    ]"#;

    #[test]
    fn test_policy_table() {
        assert_eq!(ObjectKind::Loopback.missing_policy(), MissingPolicy::CreateInOsAndStore);
        assert_eq!(ObjectKind::Ethernet.missing_policy(), MissingPolicy::Reject);
        assert_eq!(ObjectKind::Bridge.missing_policy(), MissingPolicy::CreateInOsAndStore);
        assert_eq!(ObjectKind::DhcpPool.missing_policy(), MissingPolicy::CreateInStore);
        assert_eq!(ObjectKind::Vlan.missing_policy(), MissingPolicy::CreateInStore);
    }

    #[test]
    fn test_loopback_created_in_os_and_store() {
        let (mut ctx, log, _out) = context();
        let name = ensure_object(ObjectKind::Loopback, "0", &mut ctx).unwrap();

        assert_eq!(name, "loopback0");
        assert_eq!(
            log.lines(),
            vec!["ip link add name loopback0 type dummy", "ip link set dev loopback0 up"]
        );
        let record: InterfaceRecord = ctx.store.fetch("loopback0").unwrap().unwrap();
        assert_eq!(record.kind, InterfaceKind::Loopback);

        // Second entry finds it
        log.clear();
        ensure_object(ObjectKind::Loopback, "0", &mut ctx).unwrap();
        assert!(log.lines().is_empty());
    }

    #[test]
    fn test_missing_ethernet_is_rejected() {
        let runner = DryRunRunner::new().respond("ip -json -d link show", CommandOutput::ok(LINKS));
        let (mut ctx, _log, _out) = context_with(runner);

        let err = ensure_object(ObjectKind::Ethernet, "eth7", &mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "Not found: Interface eth7 does not exist");
        assert!(!ctx.store.exists::<InterfaceRecord>("eth7").unwrap());
    }

    #[test]
    fn test_ethernet_known_to_os_is_adopted() {
        let runner = DryRunRunner::new().respond("ip -json -d link show", CommandOutput::ok(LINKS));
        let (mut ctx, _log, _out) = context_with(runner);

        ensure_object(ObjectKind::Ethernet, "eth2", &mut ctx).unwrap();
        let record: InterfaceRecord = ctx.store.fetch("eth2").unwrap().unwrap();
        assert_eq!(record.kind, InterfaceKind::Ethernet);
    }

    #[test]
    fn test_bridge_created_in_os_and_store() {
        let (mut ctx, log, _out) = context();
        ensure_object(ObjectKind::Bridge, "br0", &mut ctx).unwrap();
        assert_eq!(
            log.lines(),
            vec!["ip link add name br0 type bridge", "ip link set dev br0 up"]
        );
        assert!(ctx.store.exists::<BridgeRecord>("br0").unwrap());
    }

    #[test]
    fn test_bridge_os_failure_leaves_store_clean() {
        let runner = DryRunRunner::new()
            .respond("ip link add", CommandOutput::failed(2, "RTNETLINK answers: Operation not permitted"));
        let (mut ctx, _log, _out) = context_with(runner);

        assert!(ensure_object(ObjectKind::Bridge, "br0", &mut ctx).is_err());
        assert!(!ctx.store.exists::<BridgeRecord>("br0").unwrap());
    }

    #[test]
    fn test_bridge_removed_when_bring_up_fails() {
        let runner = DryRunRunner::new()
            .respond("ip link set dev br0 up", CommandOutput::failed(2, "RTNETLINK answers: No buffer space available"));
        let (mut ctx, log, _out) = context_with(runner);

        assert!(ensure_object(ObjectKind::Bridge, "br0", &mut ctx).is_err());
        assert_eq!(
            log.lines(),
            vec![
                "ip link add name br0 type bridge",
                "ip link set dev br0 up",
                "ip link delete dev br0 type bridge",
            ]
        );
        assert!(!ctx.store.exists::<BridgeRecord>("br0").unwrap());

        // Nothing is left half-made, so a retry starts from scratch
        log.clear();
        assert!(ensure_object(ObjectKind::Bridge, "br0", &mut ctx).is_err());
        assert_eq!(log.lines().first().map(String::as_str), Some("ip link add name br0 type bridge"));
    }

    #[test]
    fn test_loopback_removed_when_bring_up_fails() {
        let runner = DryRunRunner::new()
            .respond("ip link set dev loopback3 up", CommandOutput::failed(1, "Operation not permitted"));
        let (mut ctx, log, _out) = context_with(runner);

        assert!(ensure_object(ObjectKind::Loopback, "3", &mut ctx).is_err());
        assert_eq!(log.lines().last().map(String::as_str), Some("ip link delete dev loopback3"));
        assert!(!ctx.store.exists::<InterfaceRecord>("loopback3").unwrap());
    }

    #[test]
    fn test_pool_and_vlan_created_in_store_only() {
        let (mut ctx, log, _out) = context();
        ensure_object(ObjectKind::DhcpPool, "lan", &mut ctx).unwrap();
        let key = ensure_object(ObjectKind::Vlan, "10", &mut ctx).unwrap();

        assert!(log.lines().is_empty());
        assert!(ctx.store.exists::<DhcpPoolRecord>("lan").unwrap());
        assert_eq!(key, "0010");
        assert_eq!(ObjectKind::Vlan.label(&key), "vlan10");
        assert_eq!(ObjectKind::DhcpPool.label("lan"), "dhcp-lan");
    }

    #[test]
    fn test_invalid_ids() {
        let (mut ctx, _log, _out) = context();
        assert!(ensure_object(ObjectKind::Loopback, "x", &mut ctx).is_err());
        assert!(ensure_object(ObjectKind::Vlan, "5000", &mut ctx).is_err());
        assert!(ensure_object(ObjectKind::DhcpPool, "bad;pool", &mut ctx).is_err());
    }

    #[test]
    fn test_discover_interfaces() {
        let runner = DryRunRunner::new().respond("ip -json -d link show", CommandOutput::ok(LINKS));
        let (mut ctx, _log, _out) = context_with(runner);

        assert_eq!(discover_interfaces(&mut ctx).unwrap(), 2);
        let br9: InterfaceRecord = ctx.store.fetch("br9").unwrap().unwrap();
        assert_eq!(br9.kind, InterfaceKind::Bridge);
        assert_eq!(discover_interfaces(&mut ctx).unwrap(), 0);
    }
}
