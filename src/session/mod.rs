//! Interactive session core
//!
//! One [`Session`] is one live debugging context: the visible stack, the
//! selected frame, sticky-mode state, display watches and the completion
//! machinery, driven by a read-eval loop over a line source. Sessions are
//! constructed through the [`registry::SessionRegistry`], which owns the
//! reuse protocol.

pub mod commands;
pub mod display;
pub mod parse;
pub mod plain;
pub mod registry;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::common::{Config, Result};
use crate::complete::{
    CommandCompleter, CompletionMerger, CompletionSource, NamespaceCompleter, SharedMerger,
};
use crate::frames::visibility::{default_predicates, HidePredicate, VisibilityFilter};
use crate::frames::{
    EvalError, EvalOutcome, ExceptionSummary, Frame, FrameId, FrameRef, SourceChunk, StackEntry,
    ValueRef,
};
use crate::input::{LineSource, ReadOutcome, RustylineReader, StdinReader};
use crate::render::color::{sgr, visible_len};
use crate::render::listing::{render_lines, ListingRequest, ListingStyle};
use crate::render::sticky::{format_exc_for_sticky, StickyState};
use crate::render::{terminal_size, Highlighter};
use crate::tracer::{Resume, StopEvent, StopKind, TracerRef};

use commands::{resolve_command, CmdOutcome};
use display::{DisplayList, Watched};
use parse::{parse_line, ParseContext};
use registry::{Acquired, SessionRegistry};

/// Shared handle to a session
pub type SessionRef = Rc<RefCell<Session>>;

/// Any text sink accepting writes; must support flush
pub type OutputSink = Rc<RefCell<dyn Write>>;

/// Default output sink
pub fn stdout_sink() -> OutputSink {
    Rc::new(RefCell::new(std::io::stdout()))
}

/// Builds the rich completion source for a frame
///
/// The default is a plain namespace completer; embedders inject richer
/// (possibly colorized) ones here.
pub trait CompleterFactory {
    fn for_frame(&self, frame: &FrameRef) -> Box<dyn CompletionSource>;

    /// Whether produced candidates carry ANSI escapes
    fn colorized(&self) -> bool {
        false
    }
}

/// Construction request handed to [`SessionRegistry::acquire`]
///
/// Replaces runtime subclassing: all variability is carried as values.
#[derive(Default)]
pub struct SessionBuilder {
    pub config: Option<Config>,
    /// Reuse domain; the global session is only reused for a matching
    /// profile (or when registered with an explicit force)
    pub profile: Option<String>,
    pub output: Option<OutputSink>,
    pub reader: Option<Rc<RefCell<dyn LineSource>>>,
    pub highlighter: Option<Box<dyn Highlighter>>,
    pub tracer: Option<TracerRef>,
    pub rich_completer: Option<Box<dyn CompleterFactory>>,
    /// Override the reuse-the-global-session policy
    pub use_global: Option<bool>,
    /// Override whether the new session registers as the global one
    pub set_global: Option<bool>,
    /// (filename, line) of the code that requested the break
    pub origin: Option<(String, u32)>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn output(mut self, output: OutputSink) -> Self {
        self.output = Some(output);
        self
    }

    pub fn reader(mut self, reader: Rc<RefCell<dyn LineSource>>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn highlighter(mut self, highlighter: Box<dyn Highlighter>) -> Self {
        self.highlighter = Some(highlighter);
        self
    }

    pub fn tracer(mut self, tracer: TracerRef) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn rich_completer(mut self, factory: Box<dyn CompleterFactory>) -> Self {
        self.rich_completer = Some(factory);
        self
    }

    pub fn use_global(mut self, use_global: bool) -> Self {
        self.use_global = Some(use_global);
        self
    }

    pub fn set_global(mut self, set_global: bool) -> Self {
        self.set_global = Some(set_global);
        self
    }

    pub fn origin(mut self, filename: impl Into<String>, line: u32) -> Self {
        self.origin = Some((filename.into(), line));
        self
    }

    pub(crate) fn profile_name(&self) -> String {
        self.profile.clone().unwrap_or_else(|| "default".to_string())
    }
}

/// Ensure the configured prompt carries the `++` tag, inserting it before
/// trailing punctuation when missing.
fn normalize_prompt(value: &str) -> String {
    if value.contains("++") {
        return value.to_string();
    }
    let last_word = value
        .char_indices()
        .filter(|(_, c)| c.is_alphanumeric() || *c == '_')
        .next_back();
    match last_word {
        Some((i, c)) => {
            let split = i + c.len_utf8();
            format!("{}++{}", &value[..split], &value[split..])
        }
        None => value.to_string(),
    }
}

/// Sets a shared flag for a scope, clearing it on every exit path
struct FlagGuard(Rc<Cell<bool>>);

impl FlagGuard {
    fn set(flag: Rc<Cell<bool>>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for FlagGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct SessionParseCtx<'a> {
    frame: &'a dyn Frame,
}

impl ParseContext for SessionParseCtx<'_> {
    fn is_command(&self, name: &str) -> bool {
        resolve_command(name).is_some()
    }

    fn has_binding(&self, name: &str) -> bool {
        self.frame.has_binding(name)
    }
}

/// One live interactive debugging context
pub struct Session {
    pub(crate) config: Config,
    profile: String,
    out: OutputSink,
    prompt: String,
    pub(crate) reader: Rc<RefCell<dyn LineSource>>,
    highlighter: Option<Box<dyn Highlighter>>,
    rich_factory: Option<Box<dyn CompleterFactory>>,
    tracer: Option<TracerRef>,
    pub(crate) registry: SessionRegistry,

    // Shared with the registry slot so reuse decisions don't borrow us.
    in_interaction: Rc<Cell<bool>>,
    started: Rc<Cell<bool>>,
    pub(crate) disabled: Rc<Cell<bool>>,
    reuse_alias: Rc<RefCell<Option<String>>>,

    predicates: Vec<HidePredicate>,
    fullstack: Vec<StackEntry>,
    pub(crate) stack: Vec<StackEntry>,
    pub(crate) hidden: Vec<StackEntry>,
    pub(crate) curindex: usize,
    pub(crate) show_hidden_frames: bool,
    entry_frame: Option<FrameId>,
    raise_lines: HashMap<FrameId, u32>,
    post_exc: Option<ExceptionSummary>,

    pub(crate) sticky: StickyState,
    pub(crate) displays: DisplayList,
    merger: Option<SharedMerger>,
    completion_warnings: Rc<RefCell<Vec<String>>>,
    pub(crate) history: Vec<String>,
    start_filename: Option<String>,
    start_lineno: Option<u32>,
    lastcmd: String,
    pub(crate) list_lineno: Option<u32>,
}

impl Session {
    pub(crate) fn from_builder(mut builder: SessionBuilder, registry: SessionRegistry) -> Self {
        let config = builder
            .config
            .take()
            .unwrap_or_else(|| Config::load().unwrap_or_default());
        let reader = builder.reader.take().unwrap_or_else(|| {
            match RustylineReader::new() {
                Ok(reader) => Rc::new(RefCell::new(reader)) as Rc<RefCell<dyn LineSource>>,
                Err(e) => {
                    tracing::warn!(error = %e, "line editor unavailable; using bare stdin");
                    Rc::new(RefCell::new(StdinReader))
                }
            }
        });
        let prompt = normalize_prompt(&config.prompt);
        let predicates = default_predicates(&config.skip_patterns);
        let sticky = StickyState::new(config.sticky_by_default);
        let (start_filename, start_lineno) = match builder.origin.take() {
            Some((f, l)) => (Some(f), Some(l)),
            None => (None, None),
        };

        Self {
            profile: builder.profile_name(),
            out: builder.output.take().unwrap_or_else(stdout_sink),
            prompt,
            reader,
            highlighter: builder.highlighter.take(),
            rich_factory: builder.rich_completer.take(),
            tracer: builder.tracer.take(),
            registry,
            in_interaction: Rc::new(Cell::new(false)),
            started: Rc::new(Cell::new(false)),
            disabled: Rc::new(Cell::new(false)),
            reuse_alias: Rc::new(RefCell::new(None)),
            predicates,
            fullstack: Vec::new(),
            stack: Vec::new(),
            hidden: Vec::new(),
            curindex: 0,
            show_hidden_frames: false,
            entry_frame: None,
            raise_lines: HashMap::new(),
            post_exc: None,
            sticky,
            displays: DisplayList::default(),
            merger: None,
            completion_warnings: Rc::new(RefCell::new(Vec::new())),
            history: Vec::new(),
            start_filename,
            start_lineno,
            lastcmd: String::new(),
            list_lineno: None,
            config,
        }
    }

    /// Cells the registry keeps beside the session handle
    pub(crate) fn slot_fields(
        &self,
    ) -> (
        Rc<Cell<bool>>,
        Rc<Cell<bool>>,
        Rc<Cell<bool>>,
        String,
        Rc<RefCell<Option<String>>>,
    ) {
        (
            self.in_interaction.clone(),
            self.started.clone(),
            self.disabled.clone(),
            self.profile.clone(),
            self.reuse_alias.clone(),
        )
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, value: &str) {
        self.prompt = normalize_prompt(value);
    }

    pub fn profile_name(&self) -> &str {
        &self.profile
    }

    pub fn is_sticky(&self) -> bool {
        self.sticky.enabled
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// (filename, line) of the break request that created this session
    pub fn origin(&self) -> Option<(String, u32)> {
        self.start_filename
            .clone()
            .zip(self.start_lineno)
    }

    pub fn attach_tracer(&mut self, tracer: TracerRef) {
        self.tracer = Some(tracer);
    }

    pub(crate) fn tracer(&self) -> Option<TracerRef> {
        self.tracer.clone()
    }

    pub(crate) fn set_output(&mut self, out: OutputSink) {
        self.out = out;
    }

    pub(crate) fn set_reuse_alias(&self, alias: Option<String>) {
        *self.reuse_alias.borrow_mut() = alias;
    }

    pub(crate) fn out(&self) -> std::cell::RefMut<'_, dyn Write> {
        self.out.borrow_mut()
    }

    pub(crate) fn output_sink(&self) -> OutputSink {
        self.out.clone()
    }

    pub(crate) fn current_entry(&self) -> StackEntry {
        self.stack[self.curindex].clone()
    }

    pub(crate) fn current_frame(&self) -> FrameRef {
        self.stack[self.curindex].frame.clone()
    }

    // === Messages and errors ===

    /// Print, or queue while sticky mode owns the screen
    pub(crate) fn message(&mut self, msg: &str) -> Result<()> {
        if self.sticky.enabled {
            self.sticky.queue_message(msg);
            return Ok(());
        }
        writeln!(self.out(), "{}", msg)?;
        Ok(())
    }

    /// User-facing error line; never fatal
    pub(crate) fn report_error(&mut self, msg: &str) -> Result<()> {
        writeln!(self.out(), "*** {}", msg)?;
        Ok(())
    }

    /// Error line plus an optional pruned traceback dump
    pub(crate) fn report_eval_error(&mut self, err: &EvalError) -> Result<()> {
        self.report_error(&err.summary)?;
        if !self.config.show_traceback_on_error {
            return Ok(());
        }
        let limit = self
            .config
            .show_traceback_on_error_limit
            .unwrap_or(usize::MAX);
        let mut out = self.out.borrow_mut();
        for frame in err
            .traceback
            .iter()
            .filter(|t| !t.internal)
            .take(limit)
        {
            writeln!(out, "{}", frame.text)?;
        }
        Ok(())
    }

    // === Evaluation helpers ===

    /// Evaluate, reporting failures on the output stream
    pub(crate) fn eval_reported(&mut self, expr: &str) -> Result<Option<ValueRef>> {
        match self.current_frame().eval(expr) {
            EvalOutcome::Value(v) => Ok(Some(v)),
            EvalOutcome::Nothing => Ok(None),
            EvalOutcome::Undefined => {
                self.report_error(&format!("NameError: name '{}' is not defined", expr))?;
                Ok(None)
            }
            EvalOutcome::Error(e) => {
                self.report_eval_error(&e)?;
                Ok(None)
            }
        }
    }

    /// Evaluate without reporting anything
    pub(crate) fn eval_quiet(&self, expr: &str) -> Option<ValueRef> {
        match self.current_frame().eval(expr) {
            EvalOutcome::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Expression/statement fallthrough for lines that are not commands
    pub(crate) fn default_eval(&mut self, line: &str) -> Result<()> {
        self.history.push(line.to_string());
        let expr = line.strip_prefix('!').unwrap_or(line);
        match self.current_frame().eval(expr) {
            EvalOutcome::Value(v) => {
                let repr = v.repr();
                writeln!(self.out(), "{}", repr)?;
            }
            EvalOutcome::Nothing => {}
            EvalOutcome::Undefined => {
                self.report_error(&format!("NameError: name '{}' is not defined", expr))?;
            }
            EvalOutcome::Error(e) => self.report_eval_error(&e)?,
        }
        Ok(())
    }

    // === Stack bookkeeping ===

    fn setup(&mut self, stop: &StopEvent) {
        self.fullstack = stop.stack.clone();
        self.post_exc = stop.exception.clone();
        self.raise_lines = stop.raise_lines.iter().copied().collect();
        if stop.kind == StopKind::Entry {
            let idx = stop.index.unwrap_or(stop.stack.len().saturating_sub(1));
            if let Some(entry) = stop.stack.get(idx) {
                self.entry_frame = Some(entry.id());
                self.start_filename = Some(entry.frame.location().filename);
                self.start_lineno = Some(entry.line);
            }
        }
        let vs = {
            let filter = VisibilityFilter {
                enabled: self.config.enable_hidden_frames,
                show_hidden: self.show_hidden_frames,
                entry_frame: self.entry_frame,
                predicates: &self.predicates,
            };
            filter.compute(&self.fullstack, stop.index)
        };
        self.stack = vs.visible;
        self.hidden = vs.hidden;
        self.curindex = vs.index;
        self.list_lineno = None;
    }

    /// Recompute the visible stack after a visibility toggle, keeping the
    /// selected frame when it is still present.
    pub(crate) fn refresh_stack(&mut self) -> Result<()> {
        let current = self.stack.get(self.curindex).map(StackEntry::id);
        let vs = {
            let filter = VisibilityFilter {
                enabled: self.config.enable_hidden_frames,
                show_hidden: self.show_hidden_frames,
                entry_frame: self.entry_frame,
                predicates: &self.predicates,
            };
            filter.compute(&self.fullstack, None)
        };
        tracing::debug!(
            visible = vs.visible.len(),
            hidden = vs.hidden.len(),
            "stack recomputed"
        );
        self.stack = vs.visible;
        self.hidden = vs.hidden;
        match self
            .stack
            .iter()
            .position(|e| Some(e.id()) == current)
        {
            Some(i) => self.curindex = i,
            None => {
                self.curindex = self.stack.len().saturating_sub(1);
                self.reinstall_merger();
            }
        }
        self.print_current_stack_entry()
    }

    pub(crate) fn select_frame(&mut self, index: usize) -> Result<()> {
        debug_assert!(index < self.stack.len());
        self.curindex = index;
        self.list_lineno = None;
        self.reinstall_merger();
        self.print_current_stack_entry()
    }

    fn forget(&mut self) {
        self.fullstack.clear();
        self.stack.clear();
        self.hidden.clear();
        self.curindex = 0;
        self.raise_lines.clear();
        self.post_exc = None;
        self.list_lineno = None;
    }

    // === Stack entry formatting ===

    fn format_source(&self, src: &str) -> String {
        if !self.config.highlight {
            return src.to_string();
        }
        match &self.highlighter {
            Some(h) => h.highlight(src),
            None => src.to_string(),
        }
    }

    /// `file(line)function[->retval]`, optionally followed by the source
    /// line behind `lprefix`
    pub(crate) fn format_stack_entry(
        &self,
        entry: &StackEntry,
        lprefix: Option<&str>,
    ) -> String {
        let loc = entry.frame.location();
        let (filename, lineno) = if self.config.highlight {
            (
                sgr(&self.config.filename_color, &loc.filename),
                sgr(&self.config.line_number_color, &entry.line.to_string()),
            )
        } else {
            (loc.filename.clone(), entry.line.to_string())
        };
        let mut text = format!("{}({}){}", filename, lineno, loc.function);
        if let Some(rv) = entry.frame.return_value() {
            text.push_str("->");
            text.push_str(&rv.repr());
        }
        if let Some(lprefix) = lprefix {
            if let Some(src) = self.source_line_at(entry) {
                text.push_str(lprefix);
                text.push_str(self.format_source(&src).trim());
            }
        }
        text
    }

    /// Source of a frame, decoding raw host bytes with the configured
    /// encodings when the host has no decoded form.
    pub(crate) fn source_chunk(&self, frame: &dyn Frame) -> Option<SourceChunk> {
        if let Some(chunk) = frame.source() {
            return Some(chunk);
        }
        let (first_line, bytes) = frame.source_bytes()?;
        let text = crate::frames::decode_source(&bytes, &self.config.encodings);
        Some(SourceChunk {
            first_line,
            lines: text.lines().map(str::to_string).collect(),
        })
    }

    fn source_line_at(&self, entry: &StackEntry) -> Option<String> {
        let chunk = self.source_chunk(&*entry.frame)?;
        let idx = entry.line.checked_sub(chunk.first_line)? as usize;
        chunk.lines.get(idx).cloned()
    }

    /// Stack entry with the index/selection prefix
    ///
    /// `frame_index: None` formats the selected frame for a prompt header;
    /// `Some(i)` formats row `i` of a stack trace.
    pub(crate) fn formatted_stack_entry(
        &self,
        entry: &StackEntry,
        frame_index: Option<usize>,
    ) -> String {
        let current = self
            .stack
            .get(self.curindex)
            .is_some_and(|e| e.id() == entry.id());
        let marker = if current { "> " } else { "  " };
        let width = self.stack.len().max(1).to_string().len();
        match frame_index {
            None => format!(
                "[{:>w$}] {}{}",
                self.curindex,
                marker,
                self.format_stack_entry(entry, Some("\n-> ")),
                w = width
            ),
            Some(i) => {
                let lprefix = format!("\n     {}", " ".repeat(width));
                format!(
                    "{}[{:>w$}] {}",
                    marker,
                    i,
                    self.format_stack_entry(entry, Some(&lprefix)),
                    w = width
                )
            }
        }
    }

    pub(crate) fn print_stack_entry_current(&mut self) -> Result<()> {
        let entry = self.current_entry();
        let text = self.formatted_stack_entry(&entry, None);
        writeln!(self.out(), "{}", text)?;
        Ok(())
    }

    pub(crate) fn print_hidden_frames_count(&mut self) -> Result<()> {
        let n = self.hidden.len();
        if n > 0 && self.config.show_hidden_frames_count {
            writeln!(
                self.out(),
                "   {} frame{} hidden (try 'help hidden_frames')",
                n,
                if n > 1 { "s" } else { "" }
            )?;
        }
        Ok(())
    }

    pub(crate) fn print_current_stack_entry(&mut self) -> Result<()> {
        if self.sticky.enabled {
            self.print_if_sticky()
        } else {
            self.print_stack_entry_current()
        }
    }

    // === Sticky rendering ===

    pub(crate) fn print_if_sticky(&mut self) -> Result<()> {
        if !self.sticky.enabled || self.stack.is_empty() {
            return Ok(());
        }
        {
            let mut out = self.out.borrow_mut();
            self.sticky.handle_cls(&mut *out)?;
        }
        let (width, height) = terminal_size();
        let entry = self.current_entry();
        let frame = entry.frame.clone();
        let mut header = self.formatted_stack_entry_no_source(&entry);

        let mut top_lines: Vec<String> = Vec::new();
        for msg in self.sticky.take_messages() {
            if msg == "--Return--"
                && (frame.return_value().is_some() || frame.exception().is_some())
            {
                // The footer renders returns and exceptions itself.
                continue;
            }
            if msg.starts_with("--") && msg.ends_with("--") {
                header.push_str(", ");
                header.push_str(&msg);
            } else {
                top_lines.push(msg);
            }
        }
        if self.config.show_hidden_frames_count {
            let n = self.hidden.len();
            if n > 0 {
                header.push_str(&format!(
                    ", {} frame{} hidden",
                    n,
                    if n > 1 { "s" } else { "" }
                ));
            }
        }
        top_lines.push(header);

        let sticky_range = self.sticky.ranges.get(&frame.id()).copied();

        let mut after_lines: Vec<String> = Vec::new();
        if let Some(exc) = frame.exception().or_else(|| self.post_exc.clone()) {
            after_lines.push(format_exc_for_sticky(
                &exc,
                width,
                self.config.highlight,
                &self.config.line_number_color,
            ));
        } else if let Some(rv) = frame.return_value() {
            let mut s = format!(" return {}", rv.repr());
            if self.config.highlight {
                s = sgr(&self.config.line_number_color, &s);
            }
            after_lines.push(s);
        }

        let mut top_extra = 0usize;
        {
            let mut out = self.out.borrow_mut();
            for line in &top_lines {
                writeln!(out, "{}", line)?;
                top_extra += visible_len(line).saturating_sub(1) / width.max(1) + 2;
            }
            writeln!(out)?;
        }

        // Budget: the prompt, the location block on top, and a blank line
        // after the prompt so command output lands visibly.
        let max_lines =
            (height as i64 - top_extra as i64 - after_lines.len() as i64 - 2).max(0) as usize;
        self.print_long_list(sticky_range, Some(max_lines))?;

        {
            let mut out = self.out.borrow_mut();
            for line in &after_lines {
                writeln!(out, "{}", line)?;
            }
        }
        self.sticky.request_cls();
        Ok(())
    }

    fn formatted_stack_entry_no_source(&self, entry: &StackEntry) -> String {
        let width = self.stack.len().max(1).to_string().len();
        format!(
            "[{:>w$}] > {}",
            self.curindex,
            self.format_stack_entry(entry, None),
            w = width
        )
    }

    /// Full-function listing, optionally restricted to a line range
    pub(crate) fn print_long_list(
        &mut self,
        linerange: Option<(u32, u32)>,
        max_lines: Option<usize>,
    ) -> Result<()> {
        let entry = self.current_entry();
        let Some(chunk) = self.source_chunk(&*entry.frame) else {
            writeln!(self.out(), "** Error: could not get source for this frame **")?;
            return Ok(());
        };
        let mut lines = chunk.lines;
        let mut first = chunk.first_line;
        if let Some((start, end)) = linerange {
            let start = start.max(first);
            let end = end.min(first + lines.len() as u32);
            if start < end {
                lines = lines[(start - first) as usize..(end - first) as usize].to_vec();
                first = start;
            }
        }
        let req = ListingRequest {
            lines,
            first_line: first,
            current_line: entry.line,
            exc_line: self.raise_lines.get(&entry.id()).copied(),
            print_markers: true,
            max_lines,
        };
        self.write_listing(&req)
    }

    pub(crate) fn write_listing(&mut self, req: &ListingRequest) -> Result<()> {
        let (width, _) = terminal_size();
        let rows = {
            let style = ListingStyle {
                highlight: self.config.highlight,
                line_number_color: &self.config.line_number_color,
                current_line_color: Some(&self.config.current_line_color),
                truncate_long_lines: self.config.truncate_long_lines,
                width,
            };
            let highlighter: Option<&dyn Highlighter> = if self.config.highlight {
                self.highlighter.as_deref()
            } else {
                None
            };
            render_lines(req, &style, highlighter)
        };
        let mut out = self.out.borrow_mut();
        for row in rows {
            writeln!(out, "{}", row)?;
        }
        Ok(())
    }

    // === Completion wiring ===

    fn build_merger(&self) -> CompletionMerger {
        let frame = self.current_frame();
        let (rich, colorized): (Box<dyn CompletionSource>, bool) = match &self.rich_factory {
            Some(factory) => (factory.for_frame(&frame), factory.colorized()),
            None => (Box::new(NamespaceCompleter::new(frame.clone())), false),
        };
        let basic = Box::new(CommandCompleter::new(frame, commands::command_names()));
        CompletionMerger::new(
            rich,
            basic,
            colorized,
            self.registry.completing_flag(),
            self.completion_warnings.clone(),
        )
    }

    /// Completion reads the selected frame's bindings; rebuild the merger
    /// after a frame transition so tab completion follows the selection.
    fn reinstall_merger(&mut self) {
        if self.merger.is_none() {
            return;
        }
        let merger = Rc::new(RefCell::new(self.build_merger()));
        self.merger = Some(merger.clone());
        self.reader.clone().borrow_mut().install_completer(merger);
    }

    fn drain_completion_warnings(&mut self) -> Result<()> {
        let warnings = std::mem::take(&mut *self.completion_warnings.borrow_mut());
        for warning in warnings {
            self.report_error(&warning)?;
        }
        Ok(())
    }

    // === Interaction loop ===

    /// Things done once per prompt round: sticky repaint and display
    /// watches.
    fn preloop(&mut self) -> Result<()> {
        self.print_if_sticky()?;

        let frame_id = self.current_entry().id();
        if self.displays.is_empty(frame_id) {
            return Ok(());
        }
        let snapshot: Vec<(String, Watched)> = self.displays.entries_mut(frame_id).clone();
        for (expr, old) in snapshot {
            let new = match self.current_frame().eval(&expr) {
                EvalOutcome::Value(v) => Watched::Value(v),
                EvalOutcome::Undefined => Watched::Undefined,
                EvalOutcome::Nothing => Watched::Undefined,
                EvalOutcome::Error(_) => continue,
            };
            if old.changed_to(&new) {
                writeln!(self.out(), "{}: {} --> {}", expr, old.repr(), new.repr())?;
                self.displays.add(frame_id, &expr, new);
            }
        }
        Ok(())
    }

    fn postcmd_stay(&mut self) -> Result<()> {
        self.drain_completion_warnings()?;
        if self.sticky.enabled {
            let messages = self.sticky.take_messages();
            let mut out = self.out.borrow_mut();
            for msg in messages {
                writeln!(out, "{}", msg)?;
            }
        }
        Ok(())
    }

    fn postcmd_leave(&mut self) -> Result<()> {
        self.drain_completion_warnings()?;
        if self.sticky.enabled {
            let mut out = self.out.borrow_mut();
            self.sticky.handle_cls(&mut *out)?;
        }
        Ok(())
    }

    /// Run one debug stop: print context, loop over input, return the
    /// resume directive. Hooks are installed before the loop and torn down
    /// on every exit path.
    pub fn interaction(this: &SessionRef, stop: StopEvent) -> Result<Resume> {
        if this.borrow().disabled.get() {
            return Ok(Resume::Continue);
        }
        if stop.stack.is_empty() {
            return Ok(Resume::Continue);
        }

        let flag = this.borrow().in_interaction.clone();
        let _guard = FlagGuard::set(flag);
        this.borrow().started.set(true);

        {
            let mut s = this.borrow_mut();
            if matches!(stop.kind, StopKind::Breakpoint | StopKind::PostMortem) {
                // Clearing now would destroy output printed by the break.
                s.sticky.skip_next_cls();
            }
            s.setup(&stop);
            match stop.kind {
                StopKind::Return => s.message("--Return--")?,
                StopKind::Call => s.message("--Call--")?,
                StopKind::Exception | StopKind::PostMortem => {
                    if !s.sticky.enabled {
                        if let Some(exc) = s.post_exc.clone() {
                            let line = if exc.message.is_empty() {
                                exc.type_name
                            } else {
                                format!("{}: {}", exc.type_name, exc.message)
                            };
                            s.message(&line)?;
                        }
                    }
                }
                _ => {}
            }
        }

        let result = Self::run_loop(this);

        {
            let mut s = this.borrow_mut();
            s.reader.clone().borrow_mut().remove_completer();
            s.merger = None;
            if !s.registry.is_completing() {
                s.forget();
            }
        }
        result
    }

    fn run_loop(this: &SessionRef) -> Result<Resume> {
        {
            let mut s = this.borrow_mut();
            let merger = Rc::new(RefCell::new(s.build_merger()));
            s.merger = Some(merger.clone());
            s.reader.clone().borrow_mut().install_completer(merger);
            if !s.sticky.enabled {
                s.print_stack_entry_current()?;
                s.print_hidden_frames_count()?;
            }
            s.preloop()?;
        }

        let reader = this.borrow().reader.clone();
        loop {
            let prompt = this.borrow().prompt.clone();
            let outcome = reader.borrow_mut().read_line(&prompt)?;
            match outcome {
                ReadOutcome::Interrupted => {
                    let mut s = this.borrow_mut();
                    writeln!(s.out(), "--KeyboardInterrupt--")?;
                }
                ReadOutcome::Eof => {
                    let mut s = this.borrow_mut();
                    writeln!(s.out())?;
                    s.sticky.skip_next_cls();
                    return Ok(Resume::Quit);
                }
                ReadOutcome::Line(raw) => {
                    let line = if raw.trim().is_empty() {
                        let last = this.borrow().lastcmd.clone();
                        if last.is_empty() {
                            continue;
                        }
                        last
                    } else {
                        raw
                    };
                    let outcome = this.borrow_mut().onecmd(&line)?;
                    match outcome {
                        CmdOutcome::Stay => this.borrow_mut().postcmd_stay()?,
                        CmdOutcome::Resume(resume) => {
                            this.borrow_mut().postcmd_leave()?;
                            return Ok(resume);
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn parse(&self, raw: &str) -> parse::ParsedLine {
        let frame = self.current_frame();
        parse_line(
            raw,
            &SessionParseCtx {
                frame: &*frame,
            },
        )
    }
}

/// Enter an interactive session for a break request
///
/// This is the programmatic "start a session at this point" entry. The
/// registry decides whether to reuse the global session, build a new one,
/// or degrade to the plain fallback.
pub fn break_here(
    registry: &SessionRegistry,
    mut builder: SessionBuilder,
    stop: StopEvent,
) -> Result<Resume> {
    // Break requests fired by completion-time evaluation are ignored.
    if registry.is_completing() {
        return Ok(Resume::Continue);
    }
    if !registry.is_enabled() {
        return Ok(Resume::Continue);
    }
    if builder.origin.is_none() {
        let idx = stop.index.unwrap_or(stop.stack.len().saturating_sub(1));
        if let Some(entry) = stop.stack.get(idx) {
            builder.origin = Some((entry.frame.location().filename, entry.line));
        }
    }
    match registry.acquire(builder) {
        Acquired::Enhanced(session) => Session::interaction(&session, stop),
        Acquired::Plain(mut plain) => plain.interaction(stop),
    }
}

/// Enter a post-mortem session for an already-raised error
pub fn post_mortem(
    registry: &SessionRegistry,
    builder: SessionBuilder,
    exception: ExceptionSummary,
    stack: Vec<StackEntry>,
    raise_lines: Vec<(FrameId, u32)>,
) -> Result<Resume> {
    let mut stop = StopEvent::new(stack, StopKind::PostMortem);
    stop.exception = Some(exception);
    stop.raise_lines = raise_lines;
    match registry.acquire(builder) {
        Acquired::Enhanced(session) => Session::interaction(&session, stop),
        Acquired::Plain(mut plain) => plain.interaction(stop),
    }
}

/// Post-mortem entry that prints the traceback before the prompt, for use
/// from error handlers.
pub fn post_mortem_with_traceback(
    registry: &SessionRegistry,
    builder: SessionBuilder,
    exception: ExceptionSummary,
    stack: Vec<StackEntry>,
    raise_lines: Vec<(FrameId, u32)>,
) -> Result<Resume> {
    {
        let out = builder
            .output
            .clone()
            .unwrap_or_else(stdout_sink);
        let mut out = out.borrow_mut();
        writeln!(out, "Traceback (most recent call last):")?;
        let lines: HashMap<FrameId, u32> = raise_lines.iter().copied().collect();
        for entry in &stack {
            let loc = entry.frame.location();
            let line = lines.get(&entry.id()).copied().unwrap_or(entry.line);
            writeln!(out, "  File \"{}\", line {}, in {}", loc.filename, line, loc.function)?;
        }
        if exception.message.is_empty() {
            writeln!(out, "{}", exception.type_name)?;
        } else {
            writeln!(out, "{}: {}", exception.type_name, exception.message)?;
        }
    }
    post_mortem(registry, builder, exception, stack, raise_lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_gets_plus_plus() {
        assert_eq!(normalize_prompt("(Dsh) "), "(Dsh++) ");
        assert_eq!(normalize_prompt("dbg> "), "dbg++> ");
        assert_eq!(normalize_prompt("(Dsh++) "), "(Dsh++) ");
        assert_eq!(normalize_prompt(">>> "), ">>> ");
    }
}
