//! OS command runner
//!
//! Every interaction with `ip`, `ethtool`, `iptables`, `sysctl`, `lshw` and friends goes
//! through [`CommandRunner`], so the shell engine can be driven against a recording
//! runner in tests and in `--dry-run` mode.

use crate::error::{ShellError, ShellResult};
use std::cell::RefCell;
use std::fmt;
use std::process::Stdio;
use std::rc::Rc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// A program plus its argument vector. Never passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl OsCommand {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `ip <args…>`
    pub fn ip<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new("ip").args(args)
    }
}

impl fmt::Display for OsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Executes OS commands on behalf of command handlers
pub trait CommandRunner {
    /// Run to completion and capture output. A non-zero exit is not an error here.
    fn run(&self, cmd: &OsCommand) -> ShellResult<CommandOutput>;

    /// Run to completion, handing each stdout line to `on_line` as it arrives
    fn stream(&self, cmd: &OsCommand, on_line: &mut dyn FnMut(&str)) -> ShellResult<CommandOutput>;

    /// Run and turn a non-zero exit into [`ShellError::CommandFailed`]
    fn check(&self, cmd: &OsCommand) -> ShellResult<CommandOutput> {
        let output = self.run(cmd)?;
        if !output.success() {
            return Err(ShellError::CommandFailed {
                cmd: cmd.to_string(),
                code: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}

/// Runs commands for real, each bounded by a timeout
pub struct SystemRunner {
    runtime: tokio::runtime::Runtime,
    timeout: Duration,
    stream_timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration, stream_timeout: Duration) -> ShellResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            runtime,
            timeout,
            stream_timeout,
        })
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &OsCommand) -> ShellResult<CommandOutput> {
        debug!("run: {}", cmd);

        let output = self.runtime.block_on(async {
            let child = Command::new(&cmd.program)
                .args(&cmd.args)
                .kill_on_drop(true)
                .output();
            tokio::time::timeout(self.timeout, child).await
        });

        match output {
            Err(_) => {
                warn!("'{}' exceeded {:?}, killed", cmd, self.timeout);
                Err(ShellError::Timeout {
                    cmd: cmd.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) => Err(ShellError::CommandFailed {
                cmd: cmd.to_string(),
                code: None,
                stderr: e.to_string(),
            }),
            Ok(Ok(output)) => Ok(CommandOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
        }
    }

    fn stream(&self, cmd: &OsCommand, on_line: &mut dyn FnMut(&str)) -> ShellResult<CommandOutput> {
        debug!("stream: {}", cmd);

        let spawn_failed = |e: std::io::Error| ShellError::CommandFailed {
            cmd: cmd.to_string(),
            code: None,
            stderr: e.to_string(),
        };

        self.runtime.block_on(async {
            let mut child = Command::new(&cmd.program)
                .args(&cmd.args)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(spawn_failed)?;

            let stdout = child.stdout.take();
            let stderr = child.stderr.take();

            let read_out = async {
                let mut collected = String::new();
                if let Some(stdout) = stdout {
                    let mut lines = BufReader::new(stdout).lines();
                    while let Some(line) = lines.next_line().await? {
                        on_line(&line);
                        collected.push_str(&line);
                        collected.push('\n');
                    }
                }
                Ok::<String, std::io::Error>(collected)
            };

            let read_err = async {
                let mut collected = String::new();
                if let Some(mut stderr) = stderr {
                    stderr.read_to_string(&mut collected).await?;
                }
                Ok::<String, std::io::Error>(collected)
            };

            let work = async {
                let (stdout, stderr) = tokio::try_join!(read_out, read_err)?;
                let status = child.wait().await?;
                Ok::<_, std::io::Error>((status, stdout, stderr))
            };

            // Ctrl-C stops the child, not the shell
            let interrupt = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            };

            let finished = tokio::select! {
                result = tokio::time::timeout(self.stream_timeout, work) => Some(result),
                _ = interrupt => None,
            };

            let Some(finished) = finished else {
                info!("'{}' interrupted", cmd);
                if let Err(e) = child.start_kill() {
                    debug!("kill after interrupt: {}", e);
                }
                child.wait().await.ok();
                return Err(ShellError::Interrupted(cmd.to_string()));
            };

            match finished {
                Err(_) => {
                    warn!("'{}' exceeded {:?}, killed", cmd, self.stream_timeout);
                    Err(ShellError::Timeout {
                        cmd: cmd.to_string(),
                        secs: self.stream_timeout.as_secs(),
                    })
                }
                Ok(Err(e)) => Err(spawn_failed(e)),
                Ok(Ok((status, stdout, stderr))) => Ok(CommandOutput {
                    exit_code: status.code(),
                    stdout,
                    stderr,
                }),
            }
        })
    }
}

/// Shared view of the commands a [`DryRunRunner`] has seen
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Rc<RefCell<Vec<OsCommand>>>);

impl CommandLog {
    pub fn commands(&self) -> Vec<OsCommand> {
        self.0.borrow().clone()
    }

    /// Rendered command lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().iter().map(ToString::to_string).collect()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    fn push(&self, cmd: &OsCommand) {
        self.0.borrow_mut().push(cmd.clone());
    }
}

/// Records commands instead of executing them
///
/// Canned responses are matched by prefix of the rendered command line; anything
/// without a response succeeds with empty output.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    log: CommandLog,
    responses: Vec<(String, CommandOutput)>,
    echo: bool,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print each command on stdout as it is "executed"
    pub fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn respond(mut self, prefix: &str, output: CommandOutput) -> Self {
        self.responses.push((prefix.to_string(), output));
        self
    }

    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    fn answer(&self, cmd: &OsCommand) -> CommandOutput {
        let line = cmd.to_string();
        self.responses
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""))
    }
}

impl CommandRunner for DryRunRunner {
    fn run(&self, cmd: &OsCommand) -> ShellResult<CommandOutput> {
        info!("dry-run: {}", cmd);
        if self.echo {
            println!("[dry-run] {}", cmd);
        }
        self.log.push(cmd);
        Ok(self.answer(cmd))
    }

    fn stream(&self, cmd: &OsCommand, on_line: &mut dyn FnMut(&str)) -> ShellResult<CommandOutput> {
        let output = self.run(cmd)?;
        for line in output.stdout.lines() {
            on_line(line);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_command_display() {
        let cmd = OsCommand::ip(["link", "set", "dev", "eth0", "up"]);
        assert_eq!(cmd.to_string(), "ip link set dev eth0 up");
        assert_eq!(cmd.args.len(), 5);
    }

    #[test]
    fn test_dry_run_records_and_answers() {
        let runner = DryRunRunner::new()
            .respond("ip route show", CommandOutput::ok("default via 10.0.0.1 dev eth0\n"))
            .respond("ip link set dev eth9", CommandOutput::failed(1, "Cannot find device"));
        let log = runner.log();

        let out = runner.run(&OsCommand::ip(["route", "show"])).unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("default via"));

        let err = runner.check(&OsCommand::ip(["link", "set", "dev", "eth9", "up"])).unwrap_err();
        assert!(matches!(err, ShellError::CommandFailed { code: Some(1), .. }));

        assert_eq!(
            log.lines(),
            vec!["ip route show".to_string(), "ip link set dev eth9 up".to_string()]
        );
    }

    #[test]
    fn test_dry_run_stream_splits_lines() {
        let runner = DryRunRunner::new()
            .respond("ping", CommandOutput::ok("64 bytes from 10.0.0.1\n64 bytes from 10.0.0.1\n"));

        let mut seen = Vec::new();
        runner
            .stream(&OsCommand::new("ping").args(["-c", "2", "10.0.0.1"]), &mut |l| seen.push(l.to_string()))
            .unwrap();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_system_runner_captures_exit_code() {
        let runner = SystemRunner::new(Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        let out = runner.run(&OsCommand::new("sh").args(["-c", "echo hi; exit 3"])).unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "hi");
    }

    #[test]
    fn test_system_runner_times_out() {
        let runner = SystemRunner::new(Duration::from_millis(200), Duration::from_millis(200)).unwrap();
        let err = runner.run(&OsCommand::new("sleep").arg("5")).unwrap_err();
        assert!(matches!(err, ShellError::Timeout { .. }));

        let err = runner
            .stream(&OsCommand::new("sleep").arg("5"), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, ShellError::Timeout { .. }));
    }

    #[test]
    fn test_system_runner_missing_program() {
        let runner = SystemRunner::new(Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        let err = runner.run(&OsCommand::new("definitely-not-a-real-binary-xyz")).unwrap_err();
        assert!(matches!(err, ShellError::CommandFailed { code: None, .. }));
    }

    #[test]
    fn test_system_runner_stream_stops_on_ctrl_c() {
        let runner = SystemRunner::new(Duration::from_secs(5), Duration::from_secs(10)).unwrap();

        let sender = std::thread::spawn(|| {
            std::thread::sleep(Duration::from_millis(500));
            unsafe {
                libc::kill(libc::getpid(), libc::SIGINT);
            }
        });

        let started = std::time::Instant::now();
        let err = runner
            .stream(&OsCommand::new("sleep").arg("5"), &mut |_| {})
            .unwrap_err();
        sender.join().unwrap();

        assert!(matches!(err, ShellError::Interrupted(_)));
        assert_eq!(err.to_string(), "Command 'sleep 5' interrupted");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
