//! Fixtures shared by the engine and command set tests

use crate::cli::session::ShellContext;
use crate::config::ShellConfig;
use crate::runner::{CommandLog, DryRunRunner};
use crate::store::{InterfaceKind, InterfaceRecord, JsonStore, StoreExt};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// Console output collected in memory
#[derive(Debug, Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).to_string()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory store with hostname `gw1` and ethernet ports `eth0` and `eth1`, a dry-run
/// runner and captured output
pub fn context() -> (ShellContext, CommandLog, Capture) {
    context_with(DryRunRunner::new())
}

pub fn context_with(runner: DryRunRunner) -> (ShellContext, CommandLog, Capture) {
    let mut store = JsonStore::in_memory();
    store.set_hostname("gw1").unwrap();
    for name in ["eth0", "eth1"] {
        store.insert(&InterfaceRecord::new(name, InterfaceKind::Ethernet)).unwrap();
    }

    let log = runner.log();
    let out = Capture::default();
    let ctx = ShellContext::new(ShellConfig::default(), Box::new(runner), Box::new(store))
        .with_output(Box::new(out.clone()));
    (ctx, log, out)
}
