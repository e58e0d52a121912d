//! Command registry
//!
//! A command set declares its commands as [`CommandSpec`]s; [`Registry::build`] turns them
//! into a token trie. Each spec has a base token path bound to a handler plus any number
//! of annotations that add further reachable paths:
//!
//! - `nested(tokens)` adds `base + tokens`
//! - `extend(values)` after `nested` adds `base + tokens[..n-1] + value` for each value
//!   (alternatives to the last nested token); without `nested` it adds `base + value`
//! - `append(values)` after `nested` adds `base + tokens + value` for each value
//!
//! Tokens written as `<name>` are placeholders matching any single input word. A literal
//! child always wins over the placeholder at the same position.
//!
//! Dynamic lists (existing bridges, pools, interfaces) are computed by the command set when
//! it builds its specs, so they are a snapshot taken when the mode is entered.

use crate::cli::mode::ExecMode;
use crate::cli::resolver::Invocation;
use crate::cli::session::{Flow, ShellContext};
use crate::commands::global;
use crate::error::ShellResult;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Function bound to a command path
pub type Handler<S> = fn(&mut S, &mut ShellContext, &Invocation) -> ShellResult<Flow>;

/// A malformed registration, reported when the mode's registry is built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Command registration with an empty base")]
    EmptyBase,
    #[error("Command '{0}' starts with a placeholder")]
    PlaceholderFirst(String),
    #[error("Command '{0}' uses the reserved word 'no'")]
    ReservedWord(String),
    #[error("Command '{0}': append needs nested tokens to append to")]
    AppendWithoutNested(String),
    #[error("Command '{0}': extend and append cannot share one annotation")]
    ExtendAndAppend(String),
    #[error("Command '{0}' is registered twice")]
    Duplicate(String),
}

pub fn is_placeholder(token: &str) -> bool {
    token.len() > 2 && token.starts_with('<') && token.ends_with('>')
}

/// Handler plus dispatch metadata stored on a trie node
pub struct Binding<S> {
    pub handler: Handler<S>,
    /// Base words joined with spaces, e.g. `interface loopback`
    pub command: String,
    pub base_len: usize,
    pub negatable: bool,
    pub min_mode: ExecMode,
    owner: bool,
}

impl<S> Clone for Binding<S> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler,
            command: self.command.clone(),
            base_len: self.base_len,
            negatable: self.negatable,
            min_mode: self.min_mode,
            owner: self.owner,
        }
    }
}

/// One token of the command trie
pub struct CommandNode<S> {
    token: String,
    children: BTreeMap<String, CommandNode<S>>,
    placeholder: Option<Box<CommandNode<S>>>,
    binding: Option<Binding<S>>,
    help: Option<String>,
}

impl<S> CommandNode<S> {
    fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            children: BTreeMap::new(),
            placeholder: None,
            binding: None,
            help: None,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn help(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn binding(&self) -> Option<&Binding<S>> {
        self.binding.as_ref()
    }

    /// A handler may fire here
    pub fn is_terminal(&self) -> bool {
        self.binding.is_some()
    }

    pub fn is_placeholder(&self) -> bool {
        is_placeholder(&self.token)
    }

    /// Follow one input word: exact literal first, then the placeholder
    pub fn step(&self, word: &str) -> Option<&CommandNode<S>> {
        self.children
            .get(word)
            .or(self.placeholder.as_deref())
    }

    /// Literal children in order, then the placeholder
    pub fn children(&self) -> impl Iterator<Item = &CommandNode<S>> {
        self.children.values().chain(self.placeholder.as_deref())
    }

    fn entry(&mut self, token: &str) -> &mut CommandNode<S> {
        if is_placeholder(token) {
            self.placeholder
                .get_or_insert_with(|| Box::new(CommandNode::new(token)))
                .as_mut()
        } else {
            self.children
                .entry(token.to_string())
                .or_insert_with(|| CommandNode::new(token))
        }
    }

    fn words(&self) -> WordTree {
        WordTree {
            words: self
                .children
                .iter()
                .map(|(token, child)| (token.clone(), child.words()))
                .collect(),
            placeholder: self.placeholder.as_ref().map(|p| Box::new(p.words())),
            min_mode: self.binding.as_ref().map_or(ExecMode::User, |b| b.min_mode),
            mode: ExecMode::User,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Annotation {
    nested: Vec<String>,
    extend: Vec<String>,
    append: Vec<String>,
    help: Option<String>,
}

/// Declaration of one command for [`Registry::build`]
pub struct CommandSpec<S> {
    base: Vec<String>,
    handler: Handler<S>,
    help: Option<String>,
    negatable: bool,
    min_mode: ExecMode,
    annotations: Vec<Annotation>,
}

impl<S> CommandSpec<S> {
    /// `base` is one or more space separated words
    pub fn new(base: &str, handler: Handler<S>) -> Self {
        Self {
            base: base.split_whitespace().map(str::to_string).collect(),
            handler,
            help: None,
            negatable: false,
            min_mode: ExecMode::User,
            annotations: Vec::new(),
        }
    }

    /// Help for the most recent annotation, or for the base when there is none yet
    pub fn help(mut self, text: &str) -> Self {
        match self.annotations.last_mut() {
            Some(annotation) => annotation.help = Some(text.to_string()),
            None => self.help = Some(text.to_string()),
        }
        self
    }

    /// Start a new annotation with a fixed token sequence
    pub fn nested(mut self, tokens: &[&str]) -> Self {
        self.annotations.push(Annotation {
            nested: tokens.iter().map(|t| t.to_string()).collect(),
            ..Annotation::default()
        });
        self
    }

    pub fn extend<I, T>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let values = values.into_iter().map(Into::into);
        match self.annotations.last_mut() {
            Some(annotation) => annotation.extend.extend(values),
            None => self.annotations.push(Annotation {
                extend: values.collect(),
                ..Annotation::default()
            }),
        }
        self
    }

    pub fn append<I, T>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let values = values.into_iter().map(Into::into);
        match self.annotations.last_mut() {
            Some(annotation) => annotation.append.extend(values),
            None => self.annotations.push(Annotation {
                append: values.collect(),
                ..Annotation::default()
            }),
        }
        self
    }

    /// Allow `no <command>`
    pub fn negatable(mut self) -> Self {
        self.negatable = true;
        self
    }

    pub fn privileged(self) -> Self {
        self.min_mode(ExecMode::Privileged)
    }

    pub fn min_mode(mut self, mode: ExecMode) -> Self {
        self.min_mode = mode;
        self
    }

    fn command(&self) -> String {
        self.base.join(" ")
    }

    fn validate(&self) -> Result<(), RegistryError> {
        let Some(first) = self.base.first() else {
            return Err(RegistryError::EmptyBase);
        };
        if is_placeholder(first) {
            return Err(RegistryError::PlaceholderFirst(self.command()));
        }
        if first == crate::cli::negate::NEGATE_TOKEN {
            return Err(RegistryError::ReservedWord(self.command()));
        }
        Ok(())
    }

    /// Every path this spec makes reachable beyond its base, with its help text
    fn expanded_paths(&self) -> Result<Vec<(Vec<String>, Option<String>)>, RegistryError> {
        let mut paths = Vec::new();

        for annotation in &self.annotations {
            if !annotation.extend.is_empty() && !annotation.append.is_empty() {
                return Err(RegistryError::ExtendAndAppend(self.command()));
            }
            if !annotation.append.is_empty() && annotation.nested.is_empty() {
                return Err(RegistryError::AppendWithoutNested(self.command()));
            }

            let nested: Vec<String> = self.base.iter().chain(&annotation.nested).cloned().collect();
            if !annotation.nested.is_empty() {
                paths.push((nested.clone(), annotation.help.clone()));
            }

            // Alternatives to the last nested token, or children of the base
            let stem = &nested[..nested.len() - annotation.nested.len().min(1)];
            for value in &annotation.extend {
                let mut path = stem.to_vec();
                path.push(value.clone());
                paths.push((path, None));
            }

            for value in &annotation.append {
                let mut path = nested.clone();
                path.push(value.clone());
                paths.push((path, None));
            }
        }

        Ok(paths)
    }
}

/// The command trie of one mode
pub struct Registry<S> {
    root: CommandNode<S>,
}

impl<S> Registry<S> {
    pub fn build(specs: Vec<CommandSpec<S>>) -> Result<Self, RegistryError> {
        let mut root = CommandNode::new("");

        for spec in specs {
            spec.validate()?;

            let binding = Binding {
                handler: spec.handler,
                command: spec.command(),
                base_len: spec.base.len(),
                negatable: spec.negatable,
                min_mode: spec.min_mode,
                owner: true,
            };

            for (path, help) in spec.expanded_paths()? {
                insert(&mut root, &path, Binding { owner: false, ..binding.clone() }, help)?;
            }
            insert(&mut root, &spec.base, binding, spec.help.clone())?;
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &CommandNode<S> {
        &self.root
    }

    /// Word-only copy of the trie for line completion
    pub fn words(&self) -> WordTree {
        self.root.words()
    }
}

/// Bind `path`. The spec whose base ends at a node owns it; paths reached through another
/// spec's annotations never replace an owner.
fn insert<S>(
    root: &mut CommandNode<S>,
    path: &[String],
    binding: Binding<S>,
    help: Option<String>,
) -> Result<(), RegistryError> {
    let mut node = root;
    for token in path {
        node = node.entry(token);
    }

    match &node.binding {
        Some(existing) if existing.owner && binding.owner => {
            return Err(RegistryError::Duplicate(path.join(" ")));
        }
        Some(existing) if existing.owner || !binding.owner => {}
        _ => node.binding = Some(binding),
    }

    if node.help.is_none() {
        node.help = help;
    }
    Ok(())
}

/// A set of commands making up one mode
pub trait CommandSet: Sized + 'static {
    /// Name used in logs
    fn name(&self) -> String;

    fn commands(&self, ctx: &ShellContext) -> ShellResult<Vec<CommandSpec<Self>>>;
}

/// Build the registry for `set`, including the commands every mode shares
pub fn register<S: CommandSet>(set: &S, ctx: &ShellContext) -> ShellResult<Registry<S>> {
    let mut specs = global::commands::<S>();
    specs.extend(set.commands(ctx)?);
    let count = specs.len();

    let registry = Registry::build(specs)?;
    debug!("Registered {} commands for {}", count, set.name());
    Ok(registry)
}

/// Handler-free snapshot of a trie, consulted on every completion keystroke
///
/// Words whose command needs a higher mode than the session's are never offered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordTree {
    words: BTreeMap<String, WordTree>,
    placeholder: Option<Box<WordTree>>,
    min_mode: ExecMode,
    /// Session mode, only read at the root
    mode: ExecMode,
}

impl WordTree {
    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    /// Words that may follow `typed`, starting with `partial`
    pub fn complete(&self, typed: &[&str], partial: &str) -> Vec<String> {
        let mode = self.mode;
        let typed = match typed.split_first() {
            Some((first, rest)) if *first == crate::cli::negate::NEGATE_TOKEN => rest,
            _ => typed,
        };

        let mut node = self;
        for word in typed {
            match node.words.get(*word).or(node.placeholder.as_deref()) {
                Some(next) if next.min_mode <= mode => node = next,
                _ => return Vec::new(),
            }
        }

        let mut matches: Vec<String> = node
            .words
            .iter()
            .filter(|(w, child)| w.starts_with(partial) && child.min_mode <= mode)
            .map(|(w, _)| w.clone())
            .collect();

        if typed.is_empty() && crate::cli::negate::NEGATE_TOKEN.starts_with(partial) && !partial.is_empty() {
            matches.push(crate::cli::negate::NEGATE_TOKEN.to_string());
            matches.sort();
        }
        matches
    }
}
