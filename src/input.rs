//! Line input collaborators
//!
//! The read side of the interaction loop is a collaborator so tests can
//! drive sessions from a script. The default implementation wraps
//! rustyline with a helper that feeds the completion merger.

use std::io::Write;
use std::path::PathBuf;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter as RlHighlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};

use crate::common::{paths, Result};
use crate::complete::{SharedMerger, FILLER};
use crate::render::color::strip_escapes;

/// One read attempt's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C
    Interrupted,
    /// Ctrl-D / end of script
    Eof,
}

/// Read side of the interaction loop
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome>;

    /// Hook the session's completion merger into tab completion
    fn install_completer(&mut self, merger: SharedMerger);

    fn remove_completer(&mut self);
}

/// Word boundary characters for completion
const WORD_BREAKS: &str = " \t\n\"\\'`@$><=;|&{([,+-*/%~^!?";

/// Rustyline helper bridging to the completion merger
pub struct ShellHelper {
    merger: Option<SharedMerger>,
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let Some(merger) = &self.merger else {
            return Ok((0, Vec::new()));
        };
        let start = line[..pos]
            .rfind(|c| WORD_BREAKS.contains(c))
            .map(|i| i + 1)
            .unwrap_or(0);
        let text = &line[start..pos];

        let mut merger = merger.borrow_mut();
        let mut candidates = Vec::new();
        let mut attempt = 0;
        while let Some(candidate) = merger.complete(text, attempt) {
            attempt += 1;
            if candidate == FILLER {
                continue;
            }
            candidates.push(Pair {
                display: candidate.clone(),
                replacement: strip_escapes(&candidate),
            });
        }
        Ok((start, candidates))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl RlHighlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}

/// Interactive reader with history and tab completion
pub struct RustylineReader {
    editor: Editor<ShellHelper, DefaultHistory>,
    history_path: Option<PathBuf>,
}

impl RustylineReader {
    pub fn new() -> Result<Self> {
        let config = Config::builder()
            .auto_add_history(true)
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .build();
        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(ShellHelper { merger: None }));

        let history_path = paths::ensure_history_dir().ok().flatten();
        if let Some(path) = &history_path {
            let _ = editor.load_history(path);
        }
        Ok(Self {
            editor,
            history_path,
        })
    }
}

impl LineSource for RustylineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(rustyline::error::ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(rustyline::error::ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(e.into()),
        }
    }

    fn install_completer(&mut self, merger: SharedMerger) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.merger = Some(merger);
        }
    }

    fn remove_completer(&mut self) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.merger = None;
        }
    }
}

impl Drop for RustylineReader {
    fn drop(&mut self) {
        if let Some(path) = &self.history_path {
            let _ = self.editor.save_history(path);
        }
    }
}

/// Bare stdin reader used by the plain fallback debugger
pub struct StdinReader;

impl LineSource for StdinReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        let mut stdout = std::io::stdout();
        stdout.write_all(prompt.as_bytes())?;
        stdout.flush()?;
        let mut line = String::new();
        let n = std::io::stdin().read_line(&mut line)?;
        if n == 0 {
            return Ok(ReadOutcome::Eof);
        }
        Ok(ReadOutcome::Line(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn install_completer(&mut self, _merger: SharedMerger) {}

    fn remove_completer(&mut self) {}
}
