//! Configuration store
//!
//! Persists interfaces, bridges, VLANs, NAT pools, DHCP pools, routes and system settings as
//! JSON documents grouped in tables and keyed by name. The trait is deliberately small and
//! object safe; typed access goes through [`StoreExt`].

use crate::error::{ShellError, ShellResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How [`ConfigStore::put`] treats an existing key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Fail with `AlreadyExists` when the key is present
    Insert,
    /// Fail with `NotFound` when the key is absent
    Update,
    Upsert,
}

#[cfg_attr(test, mockall::automock)]
pub trait ConfigStore {
    fn get(&self, table: &str, key: &str) -> ShellResult<Option<Value>>;
    fn put(&mut self, table: &str, key: &str, value: Value, mode: PutMode) -> ShellResult<()>;
    /// Returns whether the key existed
    fn delete(&mut self, table: &str, key: &str) -> ShellResult<bool>;
    /// Sorted keys of a table; an unknown table is empty
    fn keys(&self, table: &str) -> ShellResult<Vec<String>>;
}

/// A typed row of a store table
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: &'static str;
    fn key(&self) -> String;
}

/// Typed helpers over any [`ConfigStore`]
pub trait StoreExt {
    fn fetch<R: Record>(&self, key: &str) -> ShellResult<Option<R>>;
    fn exists<R: Record>(&self, key: &str) -> ShellResult<bool>;
    fn list<R: Record>(&self) -> ShellResult<Vec<R>>;
    fn insert<R: Record>(&mut self, record: &R) -> ShellResult<()>;
    fn update<R: Record>(&mut self, record: &R) -> ShellResult<()>;
    fn upsert<R: Record>(&mut self, record: &R) -> ShellResult<()>;
    fn remove<R: Record>(&mut self, key: &str) -> ShellResult<bool>;
    fn hostname(&self) -> ShellResult<Option<String>>;
    fn set_hostname(&mut self, hostname: &str) -> ShellResult<()>;
    /// Dump a table as a JSON array, used by the `show *-db` commands
    fn table_json(&self, table: &str) -> ShellResult<Value>;
}

impl<S: ConfigStore + ?Sized> StoreExt for S {
    fn fetch<R: Record>(&self, key: &str) -> ShellResult<Option<R>> {
        match self.get(R::TABLE, key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn exists<R: Record>(&self, key: &str) -> ShellResult<bool> {
        Ok(self.get(R::TABLE, key)?.is_some())
    }

    fn list<R: Record>(&self) -> ShellResult<Vec<R>> {
        let mut records = Vec::new();
        for key in self.keys(R::TABLE)? {
            if let Some(record) = self.fetch::<R>(&key)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn insert<R: Record>(&mut self, record: &R) -> ShellResult<()> {
        self.put(R::TABLE, &record.key(), serde_json::to_value(record)?, PutMode::Insert)
    }

    fn update<R: Record>(&mut self, record: &R) -> ShellResult<()> {
        self.put(R::TABLE, &record.key(), serde_json::to_value(record)?, PutMode::Update)
    }

    fn upsert<R: Record>(&mut self, record: &R) -> ShellResult<()> {
        self.put(R::TABLE, &record.key(), serde_json::to_value(record)?, PutMode::Upsert)
    }

    fn remove<R: Record>(&mut self, key: &str) -> ShellResult<bool> {
        self.delete(R::TABLE, key)
    }

    fn hostname(&self) -> ShellResult<Option<String>> {
        Ok(self.fetch::<SystemRecord>(SYSTEM_KEY)?.map(|s| s.hostname))
    }

    fn set_hostname(&mut self, hostname: &str) -> ShellResult<()> {
        let mut system = self.fetch::<SystemRecord>(SYSTEM_KEY)?.unwrap_or_default();
        system.hostname = hostname.to_string();
        self.upsert(&system)
    }

    fn table_json(&self, table: &str) -> ShellResult<Value> {
        let mut rows = Vec::new();
        for key in self.keys(table)? {
            if let Some(value) = self.get(table, &key)? {
                rows.push(value);
            }
        }
        Ok(Value::Array(rows))
    }
}

// === Records ===

const SYSTEM_KEY: &str = "system";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemRecord {
    pub hostname: String,
    #[serde(default)]
    pub banner_motd: Option<String>,
}

impl Record for SystemRecord {
    const TABLE: &'static str = "system";
    fn key(&self) -> String {
        SYSTEM_KEY.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Ethernet,
    Loopback,
    Bridge,
    Vlan,
    Wireless,
    Unknown,
}

impl InterfaceKind {
    /// Map the `link_type`/`linkinfo.info_kind` reported by `ip -json link`
    pub fn from_link(link_type: &str, info_kind: Option<&str>) -> Self {
        match (link_type, info_kind) {
            ("loopback", _) | (_, Some("dummy")) => InterfaceKind::Loopback,
            (_, Some("bridge")) => InterfaceKind::Bridge,
            (_, Some("vlan")) => InterfaceKind::Vlan,
            ("ether", None) => InterfaceKind::Ethernet,
            ("ieee802.11", _) => InterfaceKind::Wireless,
            ("ether", Some(_)) => InterfaceKind::Unknown,
            _ => InterfaceKind::Unknown,
        }
    }
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterfaceKind::Ethernet => "ethernet",
            InterfaceKind::Loopback => "loopback",
            InterfaceKind::Bridge => "bridge",
            InterfaceKind::Vlan => "vlan",
            InterfaceKind::Wireless => "wireless",
            InterfaceKind::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InetAddress {
    pub cidr: String,
    #[serde(default)]
    pub secondary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticArp {
    pub address: String,
    pub mac: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NatDirection {
    Inside,
    Outside,
}

impl NatDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inside" => Some(NatDirection::Inside),
            "outside" => Some(NatDirection::Outside),
            _ => None,
        }
    }
}

impl fmt::Display for NatDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NatDirection::Inside => write!(f, "inside"),
            NatDirection::Outside => write!(f, "outside"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatBinding {
    pub direction: NatDirection,
    pub pool: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub name: String,
    pub kind: InterfaceKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub shutdown: bool,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub addresses: Vec<InetAddress>,
    #[serde(default)]
    pub proxy_arp: bool,
    #[serde(default)]
    pub drop_gratuitous_arp: bool,
    #[serde(default)]
    pub static_arp: Vec<StaticArp>,
    #[serde(default)]
    pub speed: Option<String>,
    #[serde(default)]
    pub duplex: Option<String>,
    #[serde(default)]
    pub mtu: Option<u32>,
    #[serde(default)]
    pub bridge_group: Option<String>,
    #[serde(default)]
    pub access_vlan: Option<u16>,
    #[serde(default)]
    pub nat: Option<NatBinding>,
    #[serde(default)]
    pub dhcp_client: bool,
    #[serde(default)]
    pub dhcp_server_pool: Option<String>,
}

impl InterfaceRecord {
    pub fn new(name: &str, kind: InterfaceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: None,
            shutdown: false,
            mac: None,
            addresses: Vec::new(),
            proxy_arp: false,
            drop_gratuitous_arp: false,
            static_arp: Vec::new(),
            speed: None,
            duplex: None,
            mtu: None,
            bridge_group: None,
            access_vlan: None,
            nat: None,
            dhcp_client: false,
            dhcp_server_pool: None,
        }
    }
}

impl Record for InterfaceRecord {
    const TABLE: &'static str = "interfaces";
    fn key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeRecord {
    pub name: String,
    #[serde(default)]
    pub shutdown: bool,
    #[serde(default)]
    pub stp: bool,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl BridgeRecord {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shutdown: false,
            stp: false,
            protocol: None,
            description: None,
        }
    }
}

impl Record for BridgeRecord {
    const TABLE: &'static str = "bridges";
    fn key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanRecord {
    pub id: u16,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Record for VlanRecord {
    const TABLE: &'static str = "vlans";
    fn key(&self) -> String {
        // Zero padded so the store's key order is numeric order
        format!("{:04}", self.id)
    }
}

impl VlanRecord {
    pub fn key_for(id: u16) -> String {
        format!("{:04}", id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatPoolRecord {
    pub name: String,
}

impl Record for NatPoolRecord {
    const TABLE: &'static str = "nat_pools";
    fn key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpRange {
    pub start: String,
    pub end: String,
    pub subnet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpReservation {
    pub mac: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpPoolRecord {
    pub name: String,
    #[serde(default)]
    pub subnet: Option<String>,
    #[serde(default)]
    pub ranges: Vec<DhcpRange>,
    #[serde(default)]
    pub reservations: Vec<DhcpReservation>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub mode: Option<String>,
}

impl DhcpPoolRecord {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subnet: None,
            ranges: Vec::new(),
            reservations: Vec::new(),
            options: BTreeMap::new(),
            mode: None,
        }
    }
}

impl Record for DhcpPoolRecord {
    const TABLE: &'static str = "dhcp_pools";
    fn key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub destination: String,
    pub next_hop: String,
    #[serde(default)]
    pub metric: Option<u32>,
}

impl Record for RouteRecord {
    const TABLE: &'static str = "routes";
    fn key(&self) -> String {
        format!("{} {}", self.destination, self.next_hop)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpRecord {
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub proxy: bool,
    #[serde(default)]
    pub drop_gratuitous: bool,
}

impl Default for ArpRecord {
    fn default() -> Self {
        Self {
            timeout: None,
            proxy: false,
            drop_gratuitous: false,
        }
    }
}

impl Record for ArpRecord {
    const TABLE: &'static str = "arp";
    fn key(&self) -> String {
        "global".to_string()
    }
}

// === JSON file store ===

type Tables = BTreeMap<String, BTreeMap<String, Value>>;

/// Tables held in memory and, when opened from a path, rewritten to disk after each change
#[derive(Debug, Default)]
pub struct JsonStore {
    tables: Tables,
    path: Option<PathBuf>,
}

impl JsonStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or start) a store backed by `path`
    pub fn open<P: AsRef<Path>>(path: P) -> ShellResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| ShellError::Store(format!("Failed to read {:?}: {}", path, e)))?;
            if content.trim().is_empty() {
                Tables::new()
            } else {
                serde_json::from_str(&content)
                    .map_err(|e| ShellError::Store(format!("Corrupt store {:?}: {}", path, e)))?
            }
        } else {
            Tables::new()
        };

        debug!("Opened store {:?} ({} tables)", path, tables.len());
        Ok(Self {
            tables,
            path: Some(path),
        })
    }

    fn persist(&self) -> ShellResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(&self.tables)?;
        std::fs::write(path, content).map_err(|e| {
            warn!("Failed to persist store to {:?}: {}", path, e);
            ShellError::Store(format!("Failed to write {:?}: {}", path, e))
        })
    }

    /// Put a row back the way it was before a write that failed to persist
    fn restore(&mut self, table: &str, key: &str, previous: Option<Value>) {
        let rows = self.tables.entry(table.to_string()).or_default();
        match previous {
            Some(value) => {
                rows.insert(key.to_string(), value);
            }
            None => {
                rows.remove(key);
                if rows.is_empty() {
                    self.tables.remove(table);
                }
            }
        }
    }
}

impl ConfigStore for JsonStore {
    fn get(&self, table: &str, key: &str) -> ShellResult<Option<Value>> {
        Ok(self.tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    fn put(&mut self, table: &str, key: &str, value: Value, mode: PutMode) -> ShellResult<()> {
        let rows = self.tables.entry(table.to_string()).or_default();
        let present = rows.contains_key(key);

        match mode {
            PutMode::Insert if present => {
                return Err(ShellError::AlreadyExists(format!("{} '{}'", table, key)));
            }
            PutMode::Update if !present => {
                return Err(ShellError::NotFound(format!("{} '{}'", table, key)));
            }
            _ => {}
        }

        let previous = rows.insert(key.to_string(), value);
        if let Err(e) = self.persist() {
            self.restore(table, key, previous);
            return Err(e);
        }
        Ok(())
    }

    fn delete(&mut self, table: &str, key: &str) -> ShellResult<bool> {
        let Some(previous) = self.tables.get_mut(table).and_then(|rows| rows.remove(key)) else {
            return Ok(false);
        };

        if let Err(e) = self.persist() {
            self.restore(table, key, Some(previous));
            return Err(e);
        }
        Ok(true)
    }

    fn keys(&self, table: &str) -> ShellResult<Vec<String>> {
        Ok(self
            .tables
            .get(table)
            .map(|rows| rows.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_duplicate_is_rejected() {
        let mut store = JsonStore::in_memory();
        store.insert(&BridgeRecord::new("br0")).unwrap();

        let err = store.insert(&BridgeRecord::new("br0")).unwrap_err();
        assert!(matches!(err, ShellError::AlreadyExists(_)));
    }

    #[test]
    fn test_update_missing_is_rejected() {
        let mut store = JsonStore::in_memory();
        let err = store.update(&BridgeRecord::new("br9")).unwrap_err();
        assert!(matches!(err, ShellError::NotFound(_)));
    }

    #[test]
    fn test_typed_roundtrip_and_listing() {
        let mut store = JsonStore::in_memory();
        let mut eth0 = InterfaceRecord::new("eth0", InterfaceKind::Ethernet);
        eth0.addresses.push(InetAddress { cidr: "10.0.0.1/24".into(), secondary: false });
        store.insert(&eth0).unwrap();
        store.insert(&InterfaceRecord::new("eth1", InterfaceKind::Ethernet)).unwrap();

        let fetched: InterfaceRecord = store.fetch("eth0").unwrap().unwrap();
        assert_eq!(fetched, eth0);

        let names: Vec<String> = store.list::<InterfaceRecord>().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["eth0", "eth1"]);

        assert!(store.remove::<InterfaceRecord>("eth1").unwrap());
        assert!(!store.remove::<InterfaceRecord>("eth1").unwrap());
    }

    #[test]
    fn test_vlans_list_in_numeric_order() {
        let mut store = JsonStore::in_memory();
        for id in [100, 20, 3] {
            store.insert(&VlanRecord { id, name: None, description: None }).unwrap();
        }
        let ids: Vec<u16> = store.list::<VlanRecord>().unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![3, 20, 100]);
    }

    #[test]
    fn test_hostname_helpers() {
        let mut store = JsonStore::in_memory();
        assert_eq!(store.hostname().unwrap(), None);

        store.set_hostname("gw1").unwrap();
        assert_eq!(store.hostname().unwrap().as_deref(), Some("gw1"));
    }

    #[test]
    fn test_file_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("router-db.json");

        {
            let mut store = JsonStore::open(&path).unwrap();
            store.insert(&DhcpPoolRecord::new("pool1")).unwrap();
            store.set_hostname("edge").unwrap();
        }

        let store = JsonStore::open(&path).unwrap();
        assert!(store.exists::<DhcpPoolRecord>("pool1").unwrap());
        assert_eq!(store.hostname().unwrap().as_deref(), Some("edge"));
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonStore::open(dir.path().join("missing").join("router-db.json")).unwrap();

        let err = store.insert(&BridgeRecord::new("br0")).unwrap_err();
        assert!(matches!(err, ShellError::Store(_)));
        assert!(!store.exists::<BridgeRecord>("br0").unwrap());
        assert!(store.keys(BridgeRecord::TABLE).unwrap().is_empty());
    }

    #[test]
    fn test_failed_update_and_delete_keep_old_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("router-db.json");
        let mut store = JsonStore::open(&path).unwrap();
        store.set_hostname("gw1").unwrap();
        store.insert(&DhcpPoolRecord::new("pool1")).unwrap();

        // A directory in place of the file makes every later write fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.set_hostname("edge").is_err());
        assert_eq!(store.hostname().unwrap().as_deref(), Some("gw1"));

        assert!(store.remove::<DhcpPoolRecord>("pool1").is_err());
        assert!(store.exists::<DhcpPoolRecord>("pool1").unwrap());
    }

    #[test]
    fn test_corrupt_file_is_a_store_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("router-db.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(JsonStore::open(&path), Err(ShellError::Store(_))));
    }

    #[test]
    fn test_interface_kind_from_link() {
        assert_eq!(InterfaceKind::from_link("loopback", None), InterfaceKind::Loopback);
        assert_eq!(InterfaceKind::from_link("ether", None), InterfaceKind::Ethernet);
        assert_eq!(InterfaceKind::from_link("ether", Some("bridge")), InterfaceKind::Bridge);
        assert_eq!(InterfaceKind::from_link("ether", Some("vlan")), InterfaceKind::Vlan);
        assert_eq!(InterfaceKind::from_link("ether", Some("dummy")), InterfaceKind::Loopback);
    }
}
