//! Modal read-eval loop
//!
//! The shell keeps a stack of levels, each a [`ModeController`] paired with the frame
//! (command set plus its registry) active at that level. Handlers steer the stack by
//! returning a [`Flow`].

use crate::cli::mode::{ExecMode, ModeController, PromptContext};
use crate::cli::resolver::{self, format_help, HelpEntry, Request};
use crate::cli::tree::{register, CommandSet, Registry, WordTree};
use crate::config::ShellConfig;
use crate::error::{ShellError, ShellResult};
use crate::runner::{CommandOutput, CommandRunner, OsCommand};
use crate::store::{ConfigStore, StoreExt};
use std::cell::RefCell;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

/// What the loop does after a handler returns
pub enum Flow {
    Continue,
    /// Switch the current level to another mode (`enable`, `disable`)
    SetMode(ExecMode),
    /// Enter a nested configuration level
    Push(SubMode),
    /// Leave the current level; leaving the outermost one ends the session
    Pop,
    /// List the commands of the current level
    Help,
    /// Run the lines of a saved configuration file
    Replay(PathBuf),
    Quit,
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Continue => write!(f, "Continue"),
            Flow::SetMode(mode) => write!(f, "SetMode({})", mode),
            Flow::Push(sub) => write!(f, "Push({:?})", sub.label),
            Flow::Pop => write!(f, "Pop"),
            Flow::Help => write!(f, "Help"),
            Flow::Replay(path) => write!(f, "Replay({:?})", path),
            Flow::Quit => write!(f, "Quit"),
        }
    }
}

/// A configuration level waiting to be pushed
pub struct SubMode {
    pub label: Option<String>,
    pub frame: Box<dyn ModeFrame>,
}

impl SubMode {
    pub fn new(label: Option<String>, frame: Box<dyn ModeFrame>) -> Self {
        Self { label, frame }
    }
}

/// Everything a handler may touch
pub struct ShellContext {
    pub config: ShellConfig,
    pub runner: Box<dyn CommandRunner>,
    pub store: Box<dyn ConfigStore>,
    pub out: Box<dyn Write>,
    confirm: Box<dyn FnMut(&str) -> bool>,
}

impl ShellContext {
    /// Output goes to stdout; confirmations are declined until [`ShellContext::with_confirm`]
    pub fn new(config: ShellConfig, runner: Box<dyn CommandRunner>, store: Box<dyn ConfigStore>) -> Self {
        Self {
            config,
            runner,
            store,
            out: Box::new(io::stdout()),
            confirm: Box::new(|_| false),
        }
    }

    pub fn with_output(mut self, out: Box<dyn Write>) -> Self {
        self.out = out;
        self
    }

    pub fn with_confirm(mut self, confirm: impl FnMut(&str) -> bool + 'static) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    /// Write one line of console output
    pub fn say(&mut self, text: impl fmt::Display) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            warn!("Console write failed: {}", e);
        }
    }

    /// Write command output as-is, line by line
    pub fn print_block(&mut self, text: &str) {
        for line in text.lines() {
            self.say(line);
        }
    }

    /// Run `cmd`, printing its stdout as it arrives
    pub fn stream(&mut self, cmd: &OsCommand) -> ShellResult<CommandOutput> {
        let ShellContext { runner, out, .. } = self;
        runner.stream(cmd, &mut |line| {
            if let Err(e) = writeln!(out, "{}", line) {
                warn!("Console write failed: {}", e);
            }
        })
    }

    /// Ask the operator a yes/no question
    pub fn confirm(&mut self, question: &str) -> bool {
        (self.confirm)(question)
    }
}

/// One level's command set behind a type-erased interface
pub trait ModeFrame {
    fn name(&self) -> String;

    fn words(&self) -> WordTree;

    fn help(&self, mode: ExecMode) -> Vec<HelpEntry>;

    /// Resolve and run one line
    fn dispatch(&mut self, line: &str, mode: ExecMode, ctx: &mut ShellContext) -> ShellResult<Flow>;
}

/// A command set together with the registry built from it
pub struct Frame<S: CommandSet> {
    set: S,
    registry: Registry<S>,
}

impl<S: CommandSet> Frame<S> {
    pub fn new(set: S, ctx: &ShellContext) -> ShellResult<Self> {
        let registry = register(&set, ctx)?;
        Ok(Self { set, registry })
    }

    pub fn boxed(set: S, ctx: &ShellContext) -> ShellResult<Box<dyn ModeFrame>> {
        Ok(Box::new(Self::new(set, ctx)?))
    }

    pub fn set(&self) -> &S {
        &self.set
    }
}

impl<S: CommandSet> ModeFrame for Frame<S> {
    fn name(&self) -> String {
        self.set.name()
    }

    fn words(&self) -> WordTree {
        self.registry.words()
    }

    fn help(&self, mode: ExecMode) -> Vec<HelpEntry> {
        resolver::help(self.registry.root(), &[], "", mode).unwrap_or_default()
    }

    fn dispatch(&mut self, line: &str, mode: ExecMode, ctx: &mut ShellContext) -> ShellResult<Flow> {
        match resolver::interpret(line, self.registry.root(), mode)? {
            Request::Skip => Ok(Flow::Continue),
            Request::Help(entries) => {
                for entry in format_help(&entries) {
                    ctx.say(entry);
                }
                Ok(Flow::Continue)
            }
            Request::Dispatch(resolved) => {
                if mode < resolved.min_mode {
                    return Err(crate::cli::mode::PrivilegeError::Requires(resolved.min_mode).into());
                }
                debug!("{}: dispatching {}", self.set.name(), resolved.command);
                (resolved.handler)(&mut self.set, ctx, &resolved.invocation)
            }
        }
    }
}

/// Result of feeding the shell one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Quit,
}

struct Level {
    controller: ModeController,
    frame: Box<dyn ModeFrame>,
    words: WordTree,
}

pub struct Shell {
    ctx: ShellContext,
    levels: Vec<Level>,
    words: Rc<RefCell<WordTree>>,
}

impl Shell {
    pub fn new(ctx: ShellContext, root: Box<dyn ModeFrame>, mode: ExecMode) -> Self {
        let hostname = match ctx.store.hostname() {
            Ok(Some(hostname)) => hostname,
            _ => ctx.config.defaults.hostname.clone(),
        };

        let words = root.words();
        let level = Level {
            controller: ModeController::new(&hostname, mode),
            frame: root,
            words: words.clone(),
        };

        Self {
            ctx,
            levels: vec![level],
            words: Rc::new(RefCell::new(words.with_mode(mode))),
        }
    }

    /// Publish the innermost level's words, filtered to its mode
    fn publish_words(&self) {
        if let Some(level) = self.levels.last() {
            *self.words.borrow_mut() = level.words.clone().with_mode(level.controller.mode());
        }
    }

    pub fn context(&self) -> &ShellContext {
        &self.ctx
    }

    /// Prompt state of the innermost level
    pub fn prompt_context(&self) -> Option<&PromptContext> {
        self.levels.last().map(|level| level.controller.context())
    }

    pub fn mode(&self) -> Option<ExecMode> {
        self.levels.last().map(|level| level.controller.mode())
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Completion words of the innermost level, kept current across pushes and pops
    pub fn completions(&self) -> Rc<RefCell<WordTree>> {
        Rc::clone(&self.words)
    }

    pub fn prompt(&mut self) -> String {
        let Shell { ctx, levels, .. } = self;
        match levels.last_mut() {
            Some(level) => level.controller.render_prompt(ctx.store.as_ref()),
            None => String::new(),
        }
    }

    /// Run one line of input
    pub fn execute(&mut self, line: &str) -> Outcome {
        let Some(level) = self.levels.last_mut() else {
            return Outcome::Quit;
        };
        let mode = level.controller.mode();

        match level.frame.dispatch(line, mode, &mut self.ctx) {
            Ok(flow) => self.apply(flow),
            Err(e) => {
                match &e {
                    ShellError::Resolve(_) | ShellError::Privilege(_) | ShellError::Usage(_) => {
                        warn!("'{}': {}", line.trim(), e)
                    }
                    _ => error!("'{}': {}", line.trim(), e),
                }
                self.ctx.say(format!("% {}", e));
                Outcome::Continue
            }
        }
    }

    /// Ctrl-C at the prompt
    pub fn interrupt(&mut self) {
        self.ctx.say("% Use 'end' or 'exit' to leave the current mode");
    }

    /// Ctrl-D at the prompt
    pub fn end_of_input(&mut self) -> Outcome {
        self.pop()
    }

    pub fn run(&mut self, source: &mut dyn LineSource) -> ShellResult<()> {
        loop {
            let prompt = self.prompt();
            let outcome = match source.read_line(&prompt)? {
                ReadLine::Line(line) => {
                    if source.echo() {
                        self.ctx.say(format!("{}{}", prompt, line));
                    }
                    self.execute(&line)
                }
                ReadLine::Interrupted => {
                    self.interrupt();
                    Outcome::Continue
                }
                ReadLine::Eof => self.end_of_input(),
            };

            if outcome == Outcome::Quit {
                info!("Session ended");
                self.ctx.out.flush()?;
                return Ok(());
            }
        }
    }

    /// Run every line of `source` without echo, then return to the root level in the
    /// mode the session had before. Returns the number of lines read.
    pub fn replay(&mut self, source: &mut dyn LineSource) -> ShellResult<usize> {
        let mode = self.mode();
        let mut count = 0;

        loop {
            match source.read_line("")? {
                ReadLine::Line(line) => {
                    count += 1;
                    if self.execute(&line) == Outcome::Quit {
                        break;
                    }
                }
                ReadLine::Interrupted => continue,
                ReadLine::Eof => break,
            }
        }

        self.levels.truncate(1);
        if let (Some(mode), Some(level)) = (mode, self.levels.last_mut()) {
            if let Err(e) = level.controller.enter(mode, None) {
                warn!("Could not restore {} after replay: {}", mode, e);
            }
        }
        self.publish_words();
        Ok(count)
    }

    fn apply(&mut self, flow: Flow) -> Outcome {
        match flow {
            Flow::Continue => Outcome::Continue,
            Flow::Quit => Outcome::Quit,
            Flow::Pop => self.pop(),
            Flow::Push(sub) => self.push(sub),
            Flow::Help => {
                let Some(level) = self.levels.last() else {
                    return Outcome::Quit;
                };
                let lines = format_help(&level.frame.help(level.controller.mode()));
                for line in lines {
                    self.ctx.say(line);
                }
                Outcome::Continue
            }
            Flow::Replay(path) => {
                match File::open(&path) {
                    Ok(file) => match self.replay(&mut ScriptSource::new(BufReader::new(file))) {
                        Ok(lines) => info!("Replayed {} lines from {:?}", lines, path),
                        Err(e) => self.ctx.say(format!("% {}", e)),
                    },
                    Err(e) => self.ctx.say(format!("% Failed to open {:?}: {}", path, e)),
                }
                Outcome::Continue
            }
            Flow::SetMode(mode) => {
                let Some(level) = self.levels.last_mut() else {
                    return Outcome::Quit;
                };
                match level.controller.enter(mode, None) {
                    Ok(()) => info!("Mode changed to {}", mode),
                    Err(e) => self.ctx.say(format!("% {}", e)),
                }
                self.publish_words();
                Outcome::Continue
            }
        }
    }

    fn push(&mut self, sub: SubMode) -> Outcome {
        let Some(parent) = self.levels.last() else {
            return Outcome::Quit;
        };

        match parent.controller.child(ExecMode::Config, sub.label.as_deref()) {
            Ok(controller) => {
                info!("Entering {} ({})", sub.frame.name(), controller.context().prompt);
                let words = sub.frame.words();
                self.levels.push(Level {
                    controller,
                    frame: sub.frame,
                    words,
                });
                self.publish_words();
            }
            Err(e) => {
                warn!("Refused to enter {}: {}", sub.frame.name(), e);
                self.ctx.say(format!("% {}", e));
            }
        }
        Outcome::Continue
    }

    fn pop(&mut self) -> Outcome {
        if self.levels.len() <= 1 {
            return Outcome::Quit;
        }

        if let Some(level) = self.levels.pop() {
            info!("Leaving {}", level.frame.name());
        }
        self.publish_words();
        Outcome::Continue
    }
}

/// One read from the operator or a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    Line(String),
    Interrupted,
    Eof,
}

pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> ShellResult<ReadLine>;

    /// Whether the shell should print the prompt and line back, as batch mode does
    fn echo(&self) -> bool {
        false
    }
}

/// Lines from a script file or piped stdin
pub struct ScriptSource<R> {
    reader: R,
    echo: bool,
}

impl<R: BufRead> ScriptSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, echo: false }
    }

    pub fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }
}

impl<R: BufRead> LineSource for ScriptSource<R> {
    fn read_line(&mut self, _prompt: &str) -> ShellResult<ReadLine> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(ReadLine::Eof);
        }
        Ok(ReadLine::Line(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn echo(&self) -> bool {
        self.echo
    }
}
