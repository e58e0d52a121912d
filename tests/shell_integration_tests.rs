//! Integration tests for the routershell binary
//!
//! Every test runs in `--dry-run` batch mode against a throwaway store and log directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Temporary config, store and log directory for one test
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = format!(
            "[paths]\nlog_dir = {:?}\nstore_file = {:?}\nstartup_config = {:?}\n\n[defaults]\nhostname = \"gw1\"\n",
            dir.path().join("log").display().to_string(),
            dir.path().join("state").join("router-db.json").display().to_string(),
            dir.path().join("state").join("startup-config.cfg").display().to_string(),
        );
        fs::write(dir.path().join("routershell.toml"), config).unwrap();
        Self { dir }
    }

    fn store_file(&self) -> PathBuf {
        self.dir.path().join("state").join("router-db.json")
    }

    fn startup_config(&self) -> PathBuf {
        self.dir.path().join("state").join("startup-config.cfg")
    }

    fn log_file(&self) -> PathBuf {
        self.dir.path().join("log").join("routershell.log")
    }

    fn script(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, lines.join("\n") + "\n").unwrap();
        path
    }

    fn shell(&self) -> Command {
        let mut cmd = Command::cargo_bin("routershell").unwrap();
        cmd.arg("--dry-run")
            .arg("--config")
            .arg(self.dir.path().join("routershell.toml"));
        cmd
    }
}

#[test]
fn test_help_flag() {
    Command::cargo_bin("routershell")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cisco-IOS style"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_stdin_batch_session() {
    let sandbox = Sandbox::new();

    sandbox
        .shell()
        .write_stdin("enable\nconfigure terminal\nhostname edge\nend\nshow running-config\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("gw1>enable"))
        .stdout(predicate::str::contains("gw1(config)#hostname edge"))
        .stdout(predicate::str::contains("[dry-run] hostnamectl set-hostname edge"))
        .stdout(predicate::str::contains("edge#show running-config"))
        .stdout(predicate::str::contains("; RouterShell Configuration"));

    assert!(sandbox.store_file().exists());
    assert!(sandbox.log_file().exists());
}

#[test]
fn test_script_configures_loopback() {
    let sandbox = Sandbox::new();
    let script = sandbox.script(
        "site.cfg",
        &[
            "! lab router",
            "enable",
            "configure",
            "interface loopback 1",
            "ip address 10.255.0.1/32",
            "no shutdown",
            "end",
            "show if-db",
        ],
    );

    sandbox
        .shell()
        .arg("--script")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("gw1(config-loopback1)#ip address 10.255.0.1/32"))
        .stdout(predicate::str::contains("[dry-run] ip addr replace 10.255.0.1/32 dev loopback1"))
        .stdout(predicate::str::contains("[dry-run] ip link set dev loopback1 up"));

    let store = fs::read_to_string(sandbox.store_file()).unwrap();
    assert!(store.contains("10.255.0.1/32"));
}

#[test]
fn test_store_survives_restart() {
    let sandbox = Sandbox::new();

    sandbox
        .shell()
        .write_stdin("enable\nconfigure\nvlan 10\nname users\nend\n")
        .assert()
        .success();

    sandbox
        .shell()
        .write_stdin("show vlan-db\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("users"));
}

#[test]
fn test_startup_config_replayed_on_next_start() {
    let sandbox = Sandbox::new();

    sandbox
        .shell()
        .write_stdin("enable\nconfigure\nhostname edge\nend\ncopy running-config startup-config\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK]"));
    let saved = fs::read_to_string(sandbox.startup_config()).unwrap();
    assert!(saved.contains("hostname edge"));

    // A fresh store is seeded with gw1, then the replay renames it
    fs::remove_file(sandbox.store_file()).unwrap();
    sandbox
        .shell()
        .write_stdin("version\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run] hostnamectl set-hostname edge"))
        .stdout(predicate::str::contains("edge>version"));

    fs::remove_file(sandbox.store_file()).unwrap();
    sandbox
        .shell()
        .arg("--no-startup-config")
        .write_stdin("version\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("gw1>version"));
}

#[test]
fn test_unknown_interface_is_rejected() {
    let sandbox = Sandbox::new();

    sandbox
        .shell()
        .write_stdin("enable\nconfigure\ninterface eth7\nhostname edge\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("% Not found: Interface eth7 does not exist"))
        .stdout(predicate::str::contains("gw1(config)#hostname edge"));
}

#[test]
fn test_errors_do_not_end_session() {
    let sandbox = Sandbox::new();

    sandbox
        .shell()
        .write_stdin("bogus\nconfigure\nenable\nversion\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("% Command 'bogus' not recognized."))
        .stdout(predicate::str::contains("% Does not have necessary configure privileges"))
        .stdout(predicate::str::contains("RouterShell v"));
}

#[test]
fn test_hostname_flag_seeds_empty_store() {
    let sandbox = Sandbox::new();

    sandbox
        .shell()
        .arg("--hostname")
        .arg("core1")
        .write_stdin("version\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("core1>version"));
}

#[test]
fn test_missing_script_fails() {
    let sandbox = Sandbox::new();

    sandbox
        .shell()
        .arg("--script")
        .arg(sandbox.dir.path().join("absent.cfg"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open script"));
}
