//! Command line resolver
//!
//! Splits a line on whitespace and walks the trie greedily: every word that matches a
//! child (literal before placeholder) is consumed, and the deepest node passed that has a
//! handler wins. Words after that node become the handler's remaining arguments.

use crate::cli::mode::ExecMode;
use crate::cli::negate::{self, NEGATE_TOKEN};
use crate::cli::tree::{Binding, CommandNode, Handler};
use thiserror::Error;
use tracing::debug;

/// One resolved line, handed to the handler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Words that matched trie nodes
    pub token_path: Vec<String>,
    /// Words after the deepest bound node
    pub remaining_args: Vec<String>,
    pub negate: bool,
    /// Number of leading `token_path` words that name the command itself
    pub base_len: usize,
}

impl Invocation {
    /// Everything typed after the command's base words
    pub fn operands(&self) -> Vec<&str> {
        self.token_path
            .iter()
            .skip(self.base_len)
            .chain(&self.remaining_args)
            .map(String::as_str)
            .collect()
    }

    pub fn operand(&self, index: usize) -> Option<&str> {
        self.operands().get(index).copied()
    }

    /// Operands from `index` on, joined with single spaces
    pub fn text_from(&self, index: usize) -> String {
        self.operands().get(index..).map(|words| words.join(" ")).unwrap_or_default()
    }

    /// The line as typed, without `no`
    pub fn line(&self) -> String {
        self.token_path
            .iter()
            .chain(&self.remaining_args)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A line bound to its handler
pub struct Resolved<S> {
    pub invocation: Invocation,
    pub handler: Handler<S>,
    pub command: String,
    pub negatable: bool,
    pub min_mode: ExecMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Empty command")]
    Empty,
    #[error("Command '{0}' not recognized.")]
    NotRecognized(String),
    #[error("Incomplete command '{0}'")]
    Incomplete(String),
    #[error("No negate option for `{0}`")]
    NoNegateOption(String),
}

/// Entry of a `?` listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelpEntry {
    pub word: String,
    pub help: Option<String>,
}

/// What a raw input line asks for, before touching the trie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Blank line, or a `!` or `;` comment
    Skip,
    /// `?` listing for the node at `path`, restricted to words starting with `partial`
    Help { path: Vec<String>, partial: String },
    Command(Vec<String>),
}

/// What the frame should do with a line
pub enum Request<S> {
    Skip,
    Help(Vec<HelpEntry>),
    Dispatch(Resolved<S>),
}

pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

pub fn parse_line(raw: &str) -> LineKind {
    let line = raw.trim();
    if line.is_empty() || line.starts_with(['!', ';']) {
        return LineKind::Skip;
    }
    if line.starts_with('?') {
        return LineKind::Help { path: Vec::new(), partial: String::new() };
    }

    let mut tokens = tokenize(line);
    match tokens.last().and_then(|last| last.strip_suffix('?')).map(str::to_string) {
        Some(partial) => {
            tokens.pop();
            LineKind::Help { path: tokens, partial }
        }
        None => LineKind::Command(tokens),
    }
}

/// Classify and resolve one line in `mode`
pub fn interpret<S>(raw: &str, root: &CommandNode<S>, mode: ExecMode) -> Result<Request<S>, ResolveError> {
    match parse_line(raw) {
        LineKind::Skip => Ok(Request::Skip),
        LineKind::Help { path, partial } => Ok(Request::Help(help(root, &path, &partial, mode)?)),
        LineKind::Command(_) => Ok(Request::Dispatch(resolve(raw, root)?)),
    }
}

/// Resolve `raw_line` against `root`; a leading `no` goes through the negation handler
pub fn resolve<S>(raw_line: &str, root: &CommandNode<S>) -> Result<Resolved<S>, ResolveError> {
    let tokens = tokenize(raw_line);
    match tokens.split_first() {
        None => Err(ResolveError::Empty),
        Some((first, rest)) if first == NEGATE_TOKEN => negate::negate(rest, root),
        Some(_) => match_tokens(&tokens, root, false),
    }
}

/// Greedy longest match of `tokens` below `root`
pub fn match_tokens<S>(tokens: &[String], root: &CommandNode<S>, negate: bool) -> Result<Resolved<S>, ResolveError> {
    let first = tokens.first().ok_or(ResolveError::Empty)?;

    let mut node = root;
    let mut best: Option<(usize, &Binding<S>)> = None;
    for (depth, token) in tokens.iter().enumerate() {
        let Some(next) = node.step(token) else {
            break;
        };
        node = next;
        if let Some(binding) = next.binding() {
            best = Some((depth + 1, binding));
        }
    }

    let Some((consumed, binding)) = best else {
        return Err(match root.step(first) {
            Some(_) => ResolveError::Incomplete(tokens.join(" ")),
            None => ResolveError::NotRecognized(first.clone()),
        });
    };

    let invocation = Invocation {
        token_path: tokens[..consumed].to_vec(),
        remaining_args: tokens[consumed..].to_vec(),
        negate,
        base_len: binding.base_len,
    };
    debug!(
        "Resolved '{}' -> {} (path {:?}, args {:?}, negate {})",
        tokens.join(" "),
        binding.command,
        invocation.token_path,
        invocation.remaining_args,
        negate
    );

    Ok(Resolved {
        invocation,
        handler: binding.handler,
        command: binding.command.clone(),
        negatable: binding.negatable,
        min_mode: binding.min_mode,
    })
}

/// Words reachable after `path`, as shown for `?`
pub fn help<S>(root: &CommandNode<S>, path: &[String], partial: &str, mode: ExecMode) -> Result<Vec<HelpEntry>, ResolveError> {
    let (negated, path) = match path.split_first() {
        Some((first, rest)) if first == NEGATE_TOKEN => (true, rest),
        _ => (false, path),
    };

    let mut node = root;
    for word in path {
        node = node
            .step(word)
            .ok_or_else(|| ResolveError::NotRecognized(word.clone()))?;
    }

    let at_root = path.is_empty();
    let mut entries: Vec<HelpEntry> = node
        .children()
        .filter(|child| child.token().starts_with(partial))
        .filter(|child| child.binding().map_or(true, |binding| binding.min_mode <= mode))
        .filter(|child| !(at_root && negated) || negatable_below(child))
        .map(|child| HelpEntry {
            word: child.token().to_string(),
            help: child.help().map(str::to_string),
        })
        .collect();

    if at_root && !negated && NEGATE_TOKEN.starts_with(partial) {
        entries.push(HelpEntry {
            word: NEGATE_TOKEN.to_string(),
            help: Some("Negate a command or set its defaults".to_string()),
        });
        entries.sort_by(|a, b| a.word.cmp(&b.word));
    }

    if !at_root && partial.is_empty() && node.is_terminal() {
        entries.push(HelpEntry { word: "<cr>".to_string(), help: None });
    }

    Ok(entries)
}

fn negatable_below<S>(node: &CommandNode<S>) -> bool {
    node.binding().map_or(false, |binding| binding.negatable) || node.children().any(negatable_below)
}

/// Two-column listing of help entries
pub fn format_help(entries: &[HelpEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!("  {:<24}{}", entry.word, entry.help.as_deref().unwrap_or(""))
                .trim_end()
                .to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::session::{Flow, ShellContext};
    use crate::cli::tree::{CommandSpec, Registry};
    use crate::error::ShellResult;

    struct Stub;

    fn noop(_: &mut Stub, _: &mut ShellContext, _: &Invocation) -> ShellResult<Flow> {
        Ok(Flow::Continue)
    }

    fn registry() -> Registry<Stub> {
        Registry::build(vec![
            CommandSpec::new("a", noop).nested(&["b", "c"]),
            CommandSpec::new("interface", noop).nested(&["<ifname>"]).help("Select an interface"),
            CommandSpec::new("interface loopback", noop).nested(&["<id>"]).negatable(),
            CommandSpec::new("ip", noop)
                .nested(&["address", "<cidr>", "secondary"])
                .nested(&["proxy-arp"])
                .negatable(),
            CommandSpec::new("description", noop).nested(&["<text>"]).negatable(),
            CommandSpec::new("version", noop).help("Show version"),
            CommandSpec::new("reboot", noop).privileged().help("Reboot the system"),
            CommandSpec::new("show", noop).extend(["arp", "route"]),
        ])
        .unwrap()
    }

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_longest_prefix_takes_rest_as_args() {
        let registry = registry();
        let resolved = resolve("a b c d e", registry.root()).unwrap();

        assert_eq!(resolved.command, "a");
        assert_eq!(resolved.invocation.token_path, words(&["a", "b", "c"]));
        assert_eq!(resolved.invocation.remaining_args, words(&["d", "e"]));
        assert_eq!(resolved.invocation.operands(), vec!["b", "c", "d", "e"]);
        assert!(!resolved.invocation.negate);
    }

    #[test]
    fn test_partial_nested_path_backtracks_to_bound_node() {
        let registry = registry();
        let resolved = resolve("a b x", registry.root()).unwrap();
        assert_eq!(resolved.invocation.token_path, words(&["a"]));
        assert_eq!(resolved.invocation.remaining_args, words(&["b", "x"]));
    }

    #[test]
    fn test_exact_token_beats_placeholder() {
        let registry = registry();

        let resolved = resolve("interface loopback 0", registry.root()).unwrap();
        assert_eq!(resolved.command, "interface loopback");
        assert_eq!(resolved.invocation.operands(), vec!["0"]);

        let resolved = resolve("interface eth0", registry.root()).unwrap();
        assert_eq!(resolved.command, "interface");
        assert_eq!(resolved.invocation.operands(), vec!["eth0"]);
    }

    #[test]
    fn test_placeholder_text_is_an_operand() {
        let registry = registry();
        let resolved = resolve("description uplink to core", registry.root()).unwrap();
        assert_eq!(resolved.invocation.text_from(0), "uplink to core");
        assert_eq!(resolved.invocation.line(), "description uplink to core");
    }

    #[test]
    fn test_not_recognized() {
        let registry = registry();
        let err = resolve("bogus token", registry.root()).err().unwrap();
        assert_eq!(err, ResolveError::NotRecognized("bogus".into()));
        assert_eq!(err.to_string(), "Command 'bogus' not recognized.");

        // The trie is unchanged and still resolves
        assert_eq!(resolve("version", registry.root()).unwrap().command, "version");
    }

    #[test]
    fn test_empty_and_comment_lines() {
        assert_eq!(parse_line("   "), LineKind::Skip);
        assert_eq!(parse_line("! interface eth0"), LineKind::Skip);
        assert_eq!(parse_line("; RouterShell Configuration"), LineKind::Skip);
        assert!(matches!(resolve("", registry().root()), Err(ResolveError::Empty)));
    }

    #[test]
    fn test_question_mark_is_never_a_token() {
        assert_eq!(parse_line("?"), LineKind::Help { path: vec![], partial: String::new() });
        assert_eq!(parse_line("?foo"), LineKind::Help { path: vec![], partial: String::new() });
        assert_eq!(
            parse_line("ip ?"),
            LineKind::Help { path: words(&["ip"]), partial: String::new() }
        );
        assert_eq!(
            parse_line("show ro?"),
            LineKind::Help { path: words(&["show"]), partial: "ro".into() }
        );
    }

    #[test]
    fn test_root_help_respects_mode() {
        let registry = registry();
        let user: Vec<String> = help(registry.root(), &[], "", ExecMode::User)
            .unwrap()
            .into_iter()
            .map(|e| e.word)
            .collect();
        assert!(user.contains(&"version".to_string()));
        assert!(user.contains(&"no".to_string()));
        assert!(!user.contains(&"reboot".to_string()));

        let privileged = help(registry.root(), &[], "re", ExecMode::Privileged).unwrap();
        assert_eq!(
            privileged,
            vec![HelpEntry { word: "reboot".into(), help: Some("Reboot the system".into()) }]
        );
    }

    #[test]
    fn test_context_help() {
        let registry = registry();
        let entries = help(registry.root(), &words(&["ip"]), "", ExecMode::Config).unwrap();
        let listed: Vec<&str> = entries.iter().map(|e| e.word.as_str()).collect();
        assert_eq!(listed, vec!["address", "proxy-arp", "<cr>"]);

        let negatable = help(registry.root(), &words(&["no"]), "", ExecMode::Config).unwrap();
        let listed: Vec<&str> = negatable.iter().map(|e| e.word.as_str()).collect();
        assert_eq!(listed, vec!["description", "interface", "ip"]);

        assert!(help(registry.root(), &words(&["bogus"]), "", ExecMode::Config).is_err());
    }

    #[test]
    fn test_interpret_dispatches() {
        let registry = registry();
        assert!(matches!(interpret("! note", registry.root(), ExecMode::User), Ok(Request::Skip)));
        assert!(matches!(interpret("?", registry.root(), ExecMode::User), Ok(Request::Help(_))));
        match interpret("no ip proxy-arp", registry.root(), ExecMode::Config) {
            Ok(Request::Dispatch(resolved)) => {
                assert!(resolved.invocation.negate);
                assert_eq!(resolved.invocation.operands(), vec!["proxy-arp"]);
            }
            _ => panic!("expected dispatch"),
        }
    }

    #[test]
    fn test_format_help() {
        let lines = format_help(&[
            HelpEntry { word: "end".into(), help: Some("Leave the current mode".into()) },
            HelpEntry { word: "<cr>".into(), help: None },
        ]);
        assert_eq!(lines[0], format!("  {:<24}Leave the current mode", "end"));
        assert_eq!(lines[1], "  <cr>");
    }
}
