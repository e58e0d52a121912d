//! Interactive line editing with tab completion

use crate::cli::session::{LineSource, ReadLine};
use crate::cli::tree::WordTree;
use crate::error::{ShellError, ShellResult};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;

/// Completes against the word tree of whichever level is current
pub struct ShellHelper {
    words: Rc<RefCell<WordTree>>,
}

impl ShellHelper {
    pub fn new(words: Rc<RefCell<WordTree>>) -> Self {
        Self { words }
    }

    /// Start offset of the word under the cursor and its candidates
    pub fn candidates(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let line = line.get(..pos).unwrap_or(line);
        let start = line
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let typed: Vec<&str> = line[..start].split_whitespace().collect();

        let candidates = self
            .words
            .borrow()
            .complete(&typed, &line[start..])
            .into_iter()
            .map(|word| format!("{} ", word))
            .collect();
        (start, candidates)
    }
}

impl Completer for ShellHelper {
    type Candidate = String;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<String>)> {
        Ok(self.candidates(line, pos))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

/// Terminal input through rustyline, with in-memory history
pub struct EditorSource {
    editor: Editor<ShellHelper, DefaultHistory>,
}

impl EditorSource {
    pub fn new(words: Rc<RefCell<WordTree>>, history_size: usize) -> ShellResult<Self> {
        let config = Config::builder()
            .max_history_size(history_size)
            .map_err(readline_error)?
            .auto_add_history(true)
            .completion_type(CompletionType::List)
            .build();

        let mut editor = Editor::with_config(config).map_err(readline_error)?;
        editor.set_helper(Some(ShellHelper::new(words)));
        Ok(Self { editor })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> ShellResult<ReadLine> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadLine::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadLine::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadLine::Eof),
            Err(e) => Err(readline_error(e)),
        }
    }
}

fn readline_error(e: ReadlineError) -> ShellError {
    ShellError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::session::{Flow, ShellContext};
    use crate::cli::resolver::Invocation;
    use crate::cli::tree::{CommandSpec, Registry};

    struct Stub;

    fn noop(_: &mut Stub, _: &mut ShellContext, _: &Invocation) -> ShellResult<Flow> {
        Ok(Flow::Continue)
    }

    #[test]
    fn test_candidates_for_cursor_word() {
        let registry = Registry::build(vec![
            CommandSpec::new("show", noop).extend(["interfaces", "ip-route"]),
            CommandSpec::new("shutdown", noop),
        ])
        .unwrap();
        let helper = ShellHelper::new(Rc::new(RefCell::new(registry.words())));

        assert_eq!(helper.candidates("sh", 2), (0, vec!["show ".to_string(), "shutdown ".to_string()]));
        assert_eq!(helper.candidates("show i", 6), (5, vec!["interfaces ".to_string(), "ip-route ".to_string()]));
        assert_eq!(helper.candidates("show in", 7).1, vec!["interfaces ".to_string()]);
        assert_eq!(helper.candidates("show ", 5).1.len(), 2);
    }

    #[test]
    fn test_candidates_after_multibyte_whitespace() {
        let registry = Registry::build(vec![
            CommandSpec::new("show", noop).extend(["interfaces", "ip-route"]),
        ])
        .unwrap();
        let helper = ShellHelper::new(Rc::new(RefCell::new(registry.words())));

        let line = "show\u{a0}in";
        assert_eq!(helper.candidates(line, line.len()), (6, vec!["interfaces ".to_string()]));
        assert_eq!(helper.candidates("show\u{3000}", 7), (7, vec!["interfaces ".to_string(), "ip-route ".to_string()]));
    }
}
