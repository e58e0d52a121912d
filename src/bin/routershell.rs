//! RouterShell - Cisco-IOS style shell for Linux routers
//!
//! # Usage
//!
//! ```bash
//! # Interactive session (root needed to change the network)
//! sudo routershell
//!
//! # Run a script without touching the system
//! routershell --dry-run --script site.cfg
//!
//! # Batch mode from a pipe
//! printf 'enable\nshow vlan\n' | routershell --dry-run
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use librouter::cli::launcher::discover_interfaces;
use librouter::{
    CommandRunner, DryRunRunner, EditorSource, ExecCommands, ExecMode, Frame, JsonStore, LineSource,
    ScriptSource, Shell, ShellConfig, ShellContext, StoreExt, SystemRunner, DEFAULT_CONFIG_PATH,
};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Cisco-IOS style shell for configuring Linux networking
#[derive(Parser, Debug)]
#[command(name = "routershell")]
#[command(version)]
#[command(about = "Cisco-IOS style shell for configuring Linux networking", long_about = None)]
struct Args {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Configuration store file (overrides `paths.store_file`)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print OS commands instead of running them
    #[arg(long)]
    dry_run: bool,

    /// Read commands from a file (batch mode)
    #[arg(long)]
    script: Option<PathBuf>,

    /// Hostname to seed into an empty store
    #[arg(long)]
    hostname: Option<String>,

    /// Skip replaying the saved startup configuration
    #[arg(long)]
    no_startup_config: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if !cfg!(target_os = "linux") {
        bail!("routershell only runs on Linux");
    }

    let mut config = ShellConfig::load_or_default(&args.config)?;
    if let Some(store) = &args.store {
        config.paths.store_file = store.clone();
    }
    config.ensure_directories()?;
    init_logging(&args, &config)?;

    info!("Starting routershell v{}", env!("CARGO_PKG_VERSION"));

    let uid = unsafe { libc::getuid() };
    if uid != 0 && !args.dry_run {
        warn!("Not running as root; most configuration commands will fail");
        eprintln!("Warning: not running as root, configuration changes will likely fail");
    }

    let mut store = JsonStore::open(&config.paths.store_file)
        .with_context(|| format!("Failed to open store {:?}", config.paths.store_file))?;
    if store.hostname()?.is_none() {
        let hostname = args.hostname.clone().unwrap_or_else(|| config.defaults.hostname.clone());
        librouter::validation::validate_hostname(&hostname)?;
        store.set_hostname(&hostname)?;
        info!("Seeded hostname {}", hostname);
    }

    let runner: Box<dyn CommandRunner> = if args.dry_run {
        Box::new(DryRunRunner::new().echoing())
    } else {
        Box::new(SystemRunner::new(config.command_timeout(), config.stream_timeout())?)
    };

    let batch = args.script.is_some() || !atty::is(atty::Stream::Stdin);
    let history_size = config.defaults.history_size;
    let startup_config = config.paths.startup_config.clone();

    let mut ctx = ShellContext::new(config, runner, Box::new(store));
    if !batch {
        ctx = ctx.with_confirm(ask);
    }
    if let Err(e) = discover_interfaces(&mut ctx) {
        warn!("Interface discovery failed: {}", e);
    }

    let root = Frame::boxed(ExecCommands::new(), &ctx)?;
    let mut shell = Shell::new(ctx, root, ExecMode::User);
    if !args.no_startup_config {
        replay_startup_config(&mut shell, &startup_config)?;
    }

    let mut source: Box<dyn LineSource> = match (&args.script, batch) {
        (Some(path), _) => {
            let file = File::open(path).with_context(|| format!("Failed to open script {:?}", path))?;
            Box::new(ScriptSource::new(BufReader::new(file)).echoing())
        }
        (None, true) => Box::new(ScriptSource::new(io::stdin().lock()).echoing()),
        (None, false) => Box::new(EditorSource::new(shell.completions(), history_size)?),
    };

    shell.run(source.as_mut())?;
    Ok(())
}

fn replay_startup_config(shell: &mut Shell, path: &Path) -> Result<()> {
    if !path.exists() {
        info!("No startup configuration at {:?}", path);
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("Failed to open startup configuration {:?}", path))?;
    let lines = shell.replay(&mut ScriptSource::new(BufReader::new(file)))?;
    info!("Replayed {} lines from {:?}", lines, path);
    Ok(())
}

/// Yes/no question on the terminal
fn ask(question: &str) -> bool {
    print!("{}", question);
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match io::stdin().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn init_logging(args: &Args, config: &ShellConfig) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            EnvFilter::new(format!("routershell={},librouter={}", log_level, log_level))
        });

    let path = config.log_file();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {:?}", path))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(false)
        .init();

    Ok(())
}
