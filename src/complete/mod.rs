//! Dual-source tab completion
//!
//! Two independent completion providers feed one ranked candidate list: a
//! "rich" completer (namespace-aware, possibly colorized) and a "basic" one
//! (command names and plain expressions). The merge de-duplicates against
//! the escape-stripped rich results, reconciles dotted attribute paths, and
//! hides underscore-prefixed names until the same query is repeated.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

use crate::frames::{EvalOutcome, FrameRef};
use crate::render::color::strip_escapes;

/// Shared handle to a session's merger, installed into the line source
pub type SharedMerger = Rc<RefCell<CompletionMerger>>;

/// Placeholder a rich completer may emit when it has nothing real to offer
pub const FILLER: &str = "\t";

/// Safety bound on how many candidates one source may produce
const MAX_CANDIDATES: usize = 1000;

/// One completion provider
///
/// Called repeatedly with increasing `attempt` until it returns `Ok(None)`.
/// Errors are reported as warnings and count as "no candidates".
pub trait CompletionSource {
    fn complete(&mut self, text: &str, attempt: usize) -> Result<Option<String>, String>;
}

fn drain(
    source: &mut dyn CompletionSource,
    text: &str,
    warnings: &RefCell<Vec<String>>,
) -> Vec<String> {
    let mut out = Vec::new();
    for attempt in 0..MAX_CANDIDATES {
        match source.complete(text, attempt) {
            Ok(Some(candidate)) => out.push(candidate),
            Ok(None) => break,
            Err(e) => {
                warnings
                    .borrow_mut()
                    .push(format!("error during completion: {}", e));
                return Vec::new();
            }
        }
    }
    out
}

/// Longest common prefix of all candidates
pub fn common_prefix(candidates: &[String]) -> String {
    let Some(first) = candidates.first() else {
        return String::new();
    };
    let mut prefix = first.clone();
    for candidate in &candidates[1..] {
        while !candidate.starts_with(prefix.as_str()) {
            prefix.pop();
            if prefix.is_empty() {
                return prefix;
            }
        }
    }
    prefix
}

/// Merges the two completion sources for one interaction
pub struct CompletionMerger {
    rich: Box<dyn CompletionSource>,
    basic: Box<dyn CompletionSource>,
    /// Rich candidates carry ANSI escapes that must be stripped for
    /// comparison
    rich_colorized: bool,
    cached: Vec<String>,
    /// (last query text, escalation counter) for underscore revelation
    last_state: (Option<String>, u32),
    /// Set while candidate collection runs; suppresses session teardown
    /// triggered by completion-time evaluation side effects
    completing: Rc<Cell<bool>>,
    warnings: Rc<RefCell<Vec<String>>>,
}

impl CompletionMerger {
    pub fn new(
        rich: Box<dyn CompletionSource>,
        basic: Box<dyn CompletionSource>,
        rich_colorized: bool,
        completing: Rc<Cell<bool>>,
        warnings: Rc<RefCell<Vec<String>>>,
    ) -> Self {
        Self {
            rich,
            basic,
            rich_colorized,
            cached: Vec::new(),
            last_state: (None, 0),
            completing,
            warnings,
        }
    }

    /// One completion request
    ///
    /// `attempt` 0 recomputes the candidate list for `text`; higher attempts
    /// index into the cached list. Out of range means "no more candidates".
    pub fn complete(&mut self, text: &str, attempt: usize) -> Option<String> {
        if attempt == 0 {
            self.rebuild(text);
        }
        self.cached.get(attempt).cloned()
    }

    fn rebuild(&mut self, text: &str) {
        self.completing.set(true);
        let mut completions = drain(&mut *self.rich, text, &self.warnings);

        let clean_rich: HashSet<String> = if self.rich_colorized {
            completions.iter().map(|c| strip_escapes(c)).collect()
        } else {
            completions.iter().cloned().collect()
        };

        let mut basic: Vec<String> = drain(&mut *self.basic, text, &self.warnings)
            .into_iter()
            .filter(|c| !clean_rich.contains(c))
            .collect();

        // A lone filler placeholder loses to real basic results.
        if completions.len() == 1 && completions[0] == FILLER && !basic.is_empty() {
            completions.clear();
        }

        if !basic.is_empty() {
            let basic_prefix = common_prefix(&basic);
            if text.contains('.') && !basic_prefix.is_empty() && basic.len() > 1 {
                // Basic expression completion repeats the dotted prefix the
                // typed text already implies; strip it.
                if let Some(dot) = text.rfind('.') {
                    let prefix = &text[..=dot];
                    basic = basic
                        .into_iter()
                        .map(|c| {
                            c.strip_prefix(prefix)
                                .map(str::to_string)
                                .unwrap_or(c)
                        })
                        .collect();
                }
            }
            if completions.len() == 1 && completions[0].contains('.') && !basic_prefix.is_empty()
            {
                // Ambiguous attribute vs. module completion: the rich side
                // already collapsed to one dotted result.
                basic.clear();
            }
            for candidate in basic {
                if !clean_rich.contains(&candidate) {
                    completions.push(candidate);
                }
            }
        }

        self.cached = completions;
        self.filter_underscores(text);
        self.completing.set(false);
    }

    /// Hide `_`/`__` names, progressively revealing them when the same text
    /// is requested again: third request shows single-underscore names, the
    /// fourth shows dunders too. A trailing underscore in the text itself
    /// opts in immediately.
    fn filter_underscores(&mut self, text: &str) {
        if self.last_state.0.as_deref() == Some(text) {
            self.last_state.1 = self.last_state.1.saturating_add(1);
        } else {
            self.last_state = (Some(text.to_string()), 0);
        }

        let escalation = match self.last_state.1 {
            0 | 1 => 0,
            2 => 1,
            _ => 2,
        };
        let from_text = if text.ends_with("__") {
            2
        } else if text.ends_with('_') {
            1
        } else {
            0
        };

        match escalation.max(from_text) {
            2 => {}
            1 => self
                .cached
                .retain(|c| !strip_escapes(c).starts_with("__")),
            _ => self.cached.retain(|c| !strip_escapes(c).starts_with('_')),
        }
    }

    /// Warnings accumulated since the last drain
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.borrow_mut())
    }
}

/// Default rich completer: names and attribute paths from the current
/// frame's bindings.
pub struct NamespaceCompleter {
    frame: FrameRef,
    candidates: Vec<String>,
}

impl NamespaceCompleter {
    pub fn new(frame: FrameRef) -> Self {
        Self {
            frame,
            candidates: Vec::new(),
        }
    }
}

impl CompletionSource for NamespaceCompleter {
    fn complete(&mut self, text: &str, attempt: usize) -> Result<Option<String>, String> {
        if attempt == 0 {
            self.candidates = complete_expression(&self.frame, text, &[]);
        }
        Ok(self.candidates.get(attempt).cloned())
    }
}

/// Default basic completer: command names plus plain expression completion
pub struct CommandCompleter {
    frame: FrameRef,
    commands: Vec<String>,
    candidates: Vec<String>,
}

impl CommandCompleter {
    pub fn new(frame: FrameRef, commands: Vec<String>) -> Self {
        Self {
            frame,
            commands,
            candidates: Vec::new(),
        }
    }
}

impl CompletionSource for CommandCompleter {
    fn complete(&mut self, text: &str, attempt: usize) -> Result<Option<String>, String> {
        if attempt == 0 {
            self.candidates = complete_expression(&self.frame, text, &self.commands);
        }
        Ok(self.candidates.get(attempt).cloned())
    }
}

/// Complete `text` against a frame's bindings, returning full dotted paths
/// for attribute access, optionally mixing in command names.
fn complete_expression(frame: &FrameRef, text: &str, commands: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(dot) = text.rfind('.') {
        let root = &text[..dot];
        let partial = &text[dot + 1..];
        if let EvalOutcome::Value(value) = frame.eval(root) {
            for attr in value.attr_names() {
                if attr.starts_with(partial) {
                    out.push(format!("{}.{}", root, attr));
                }
            }
        }
        return out;
    }
    for name in commands {
        if name.starts_with(text) {
            out.push(name.clone());
        }
    }
    for name in crate::frames::all_bindings(&**frame) {
        if name.starts_with(text) && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::color::sgr;
    use crate::testing::{value, TestFrame, TestValue};

    struct ListSource {
        items: Vec<String>,
        calls: Rc<Cell<usize>>,
    }

    impl ListSource {
        fn new(items: &[&str]) -> Box<Self> {
            Box::new(Self {
                items: items.iter().map(|s| s.to_string()).collect(),
                calls: Rc::new(Cell::new(0)),
            })
        }
    }

    impl CompletionSource for ListSource {
        fn complete(&mut self, _text: &str, attempt: usize) -> Result<Option<String>, String> {
            if attempt == 0 {
                self.calls.set(self.calls.get() + 1);
            }
            Ok(self.items.get(attempt).cloned())
        }
    }

    struct FailingSource;

    impl CompletionSource for FailingSource {
        fn complete(&mut self, _text: &str, _attempt: usize) -> Result<Option<String>, String> {
            Err("boom".to_string())
        }
    }

    fn merger(rich: Box<dyn CompletionSource>, basic: Box<dyn CompletionSource>) -> CompletionMerger {
        CompletionMerger::new(
            rich,
            basic,
            false,
            Rc::new(Cell::new(false)),
            Rc::new(RefCell::new(Vec::new())),
        )
    }

    fn all(m: &mut CompletionMerger, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut attempt = 0;
        while let Some(c) = m.complete(text, attempt) {
            out.push(c);
            attempt += 1;
        }
        out
    }

    #[test]
    fn test_merge_appends_unseen_basic() {
        let mut m = merger(ListSource::new(&["alpha", "beta"]), ListSource::new(&["beta", "gamma"]));
        assert_eq!(all(&mut m, "x"), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_filler_discarded_when_basic_has_results() {
        let mut m = merger(ListSource::new(&[FILLER]), ListSource::new(&["step"]));
        assert_eq!(all(&mut m, "s"), vec!["step"]);
    }

    #[test]
    fn test_filler_kept_without_basic_results() {
        let mut m = merger(ListSource::new(&[FILLER]), ListSource::new(&[]));
        assert_eq!(all(&mut m, "s"), vec![FILLER]);
    }

    #[test]
    fn test_colorized_rich_deduplicates_basic() {
        let colored = sgr("33;01", "foo");
        let rich = ListSource::new(&[colored.as_str()]);
        let mut m = CompletionMerger::new(
            rich,
            ListSource::new(&["foo", "bar"]),
            true,
            Rc::new(Cell::new(false)),
            Rc::new(RefCell::new(Vec::new())),
        );
        let result = all(&mut m, "x");
        assert_eq!(result.len(), 2);
        assert_eq!(strip_escapes(&result[0]), "foo");
        assert_eq!(result[1], "bar");
    }

    #[test]
    fn test_dotted_prefix_stripped_from_basic() {
        let mut m = merger(
            ListSource::new(&[]),
            ListSource::new(&["obj.attr1", "obj.attr2"]),
        );
        assert_eq!(all(&mut m, "obj.at"), vec!["attr1", "attr2"]);
    }

    #[test]
    fn test_single_dotted_rich_discards_basic() {
        let mut m = merger(
            ListSource::new(&["obj.attr"]),
            ListSource::new(&["obj.attr1", "obj.attr2"]),
        );
        assert_eq!(all(&mut m, "obj.a"), vec!["obj.attr"]);
    }

    #[test]
    fn test_underscore_escalation() {
        let mut m = merger(
            ListSource::new(&["foo", "_bar", "__baz"]),
            ListSource::new(&[]),
        );
        assert_eq!(all(&mut m, "x"), vec!["foo"]);
        assert_eq!(all(&mut m, "x"), vec!["foo"]);
        assert_eq!(all(&mut m, "x"), vec!["foo", "_bar"]);
        assert_eq!(all(&mut m, "x"), vec!["foo", "_bar", "__baz"]);
    }

    #[test]
    fn test_underscore_escalation_resets_on_new_text() {
        let mut m = merger(
            ListSource::new(&["foo", "_bar", "__baz"]),
            ListSource::new(&[]),
        );
        all(&mut m, "x");
        all(&mut m, "x");
        all(&mut m, "x");
        // Different text starts over with underscores hidden.
        assert_eq!(all(&mut m, "y"), vec!["foo"]);
    }

    #[test]
    fn test_trailing_underscore_reveals_immediately() {
        let mut m = merger(
            ListSource::new(&["_bar", "__baz"]),
            ListSource::new(&[]),
        );
        assert_eq!(all(&mut m, "_"), vec!["_bar"]);
        let mut m2 = merger(
            ListSource::new(&["_bar", "__baz"]),
            ListSource::new(&[]),
        );
        assert_eq!(all(&mut m2, "__"), vec!["_bar", "__baz"]);
    }

    #[test]
    fn test_out_of_range_does_not_recompute() {
        let rich = ListSource::new(&["only"]);
        let calls = rich.calls.clone();
        let mut m = merger(rich, ListSource::new(&[]));
        assert_eq!(m.complete("x", 0), Some("only".to_string()));
        assert_eq!(m.complete("x", 5), None);
        assert_eq!(m.complete("x", 6), None);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failing_source_reports_warning() {
        let mut m = merger(Box::new(FailingSource), ListSource::new(&["ok"]));
        assert_eq!(all(&mut m, "x"), vec!["ok"]);
        let warnings = m.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("error during completion"));
    }

    #[test]
    fn test_completing_flag_set_during_rebuild() {
        struct FlagProbe {
            flag: Rc<Cell<bool>>,
            seen: Rc<Cell<bool>>,
        }
        impl CompletionSource for FlagProbe {
            fn complete(&mut self, _t: &str, _a: usize) -> Result<Option<String>, String> {
                self.seen.set(self.flag.get());
                Ok(None)
            }
        }
        let flag = Rc::new(Cell::new(false));
        let seen = Rc::new(Cell::new(false));
        let mut m = CompletionMerger::new(
            Box::new(FlagProbe {
                flag: flag.clone(),
                seen: seen.clone(),
            }),
            ListSource::new(&[]),
            false,
            flag.clone(),
            Rc::new(RefCell::new(Vec::new())),
        );
        m.complete("x", 0);
        assert!(seen.get());
        assert!(!flag.get());
    }

    #[test]
    fn test_namespace_completer_dotted() {
        let frame = TestFrame::named("f")
            .with_local(
                "conn",
                TestValue::new("<Conn>")
                    .with_attrs(&["send", "close", "_socket"])
                    .into_ref(),
            )
            .into_ref();
        let mut source = NamespaceCompleter::new(frame);
        let mut out = Vec::new();
        let mut attempt = 0;
        while let Ok(Some(c)) = source.complete("conn.s", attempt) {
            out.push(c);
            attempt += 1;
        }
        assert_eq!(out, vec!["conn.send"]);
    }

    #[test]
    fn test_command_completer_mixes_commands_and_names() {
        let frame = TestFrame::named("f")
            .with_local("stream", value("1"))
            .into_ref();
        let mut source =
            CommandCompleter::new(frame, vec!["step".to_string(), "sticky".to_string()]);
        let mut out = Vec::new();
        let mut attempt = 0;
        while let Ok(Some(c)) = source.complete("st", attempt) {
            out.push(c);
            attempt += 1;
        }
        assert_eq!(out, vec!["step", "sticky", "stream"]);
    }
}
