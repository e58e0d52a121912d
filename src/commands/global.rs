//! Commands available in every mode

use crate::cli::resolver::Invocation;
use crate::cli::session::{Flow, ShellContext};
use crate::cli::tree::CommandSpec;
use crate::error::ShellResult;
use std::io::Write;

/// Shared commands, registered ahead of each command set's own
pub fn commands<S>() -> Vec<CommandSpec<S>> {
    vec![
        CommandSpec::new("end", end::<S>).help("Leave the current mode"),
        CommandSpec::new("exit", end::<S>).help("Leave the current mode"),
        CommandSpec::new("cls", cls::<S>).help("Clear the screen"),
        CommandSpec::new("clock", clock::<S>).help("Show the system clock"),
        CommandSpec::new("version", version::<S>).help("Show the shell version"),
        CommandSpec::new("help", help::<S>).help("List the commands of this mode"),
    ]
}

pub fn end<S>(_: &mut S, _: &mut ShellContext, _: &Invocation) -> ShellResult<Flow> {
    Ok(Flow::Pop)
}

fn cls<S>(_: &mut S, ctx: &mut ShellContext, _: &Invocation) -> ShellResult<Flow> {
    write!(ctx.out, "\x1b[2J\x1b[H")?;
    ctx.out.flush()?;
    Ok(Flow::Continue)
}

fn clock<S>(_: &mut S, ctx: &mut ShellContext, _: &Invocation) -> ShellResult<Flow> {
    let now = chrono::Local::now();
    ctx.say(now.format("%H:%M:%S%.3f %Z %a %b %e %Y"));
    Ok(Flow::Continue)
}

fn version<S>(_: &mut S, ctx: &mut ShellContext, _: &Invocation) -> ShellResult<Flow> {
    ctx.say(format!("RouterShell v{}", env!("CARGO_PKG_VERSION")));
    Ok(Flow::Continue)
}

fn help<S>(_: &mut S, _: &mut ShellContext, _: &Invocation) -> ShellResult<Flow> {
    Ok(Flow::Help)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::testing::context;

    struct Stub;

    #[test]
    fn test_version_and_clock() {
        let (mut ctx, log, out) = context();
        version(&mut Stub, &mut ctx, &Invocation::default()).unwrap();
        assert!(out.text().starts_with("RouterShell v"));

        out.clear();
        clock(&mut Stub, &mut ctx, &Invocation::default()).unwrap();
        assert!(!out.text().trim().is_empty());
        assert!(log.lines().is_empty());
    }

    #[test]
    fn test_end_and_help_flow() {
        let (mut ctx, _log, _out) = context();
        assert!(matches!(end(&mut Stub, &mut ctx, &Invocation::default()).unwrap(), Flow::Pop));
        assert!(matches!(help(&mut Stub, &mut ctx, &Invocation::default()).unwrap(), Flow::Help));
    }
}
