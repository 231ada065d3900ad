//! In-crate test support
//!
//! Scripted stand-ins for the host runtime collaborators: frames, values,
//! a tracer and a line source. Unit tests and the integration scenarios in
//! `tests/` drive whole interactions through these without a real execution
//! engine.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::complete::SharedMerger;
use crate::frames::{
    CodeLocation, EvalError, EvalOutcome, ExceptionSummary, Frame, FrameId, FrameRef,
    ObjectPosition, SourceChunk, StackEntry, Value, ValueRef,
};
use crate::input::{LineSource, ReadOutcome};
use crate::tracer::{Resume, StopEvent, Tracer};
use crate::Result;

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_VALUE_ID: AtomicU64 = AtomicU64::new(1);

/// Scripted value with an explicit identity
pub struct TestValue {
    repr: String,
    type_name: String,
    identity: usize,
    truthy: bool,
    attrs: Vec<String>,
    doc: Option<String>,
    signature: Option<String>,
    position: Option<ObjectPosition>,
    len: Option<usize>,
}

impl TestValue {
    pub fn new(repr: &str) -> Self {
        let type_name = if repr.chars().all(|c| c.is_ascii_digit()) {
            "int"
        } else if repr.starts_with('"') || repr.starts_with('\'') {
            "str"
        } else {
            "object"
        };
        Self {
            repr: repr.to_string(),
            type_name: type_name.to_string(),
            identity: NEXT_VALUE_ID.fetch_add(1, Ordering::Relaxed) as usize,
            truthy: !matches!(repr, "false" | "False" | "0" | ""),
            attrs: Vec::new(),
            doc: None,
            signature: None,
            position: None,
            len: None,
        }
    }

    pub fn with_attrs(mut self, attrs: &[&str]) -> Self {
        self.attrs = attrs.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn with_signature(mut self, sig: &str) -> Self {
        self.signature = Some(sig.to_string());
        self
    }

    pub fn with_len(mut self, len: usize) -> Self {
        self.len = Some(len);
        self
    }

    pub fn with_position(mut self, filename: &str, first_line: u32, lines: &[&str]) -> Self {
        self.position = Some(ObjectPosition {
            filename: filename.to_string(),
            first_line,
            lines: Some(lines.iter().map(|s| s.to_string()).collect()),
        });
        self
    }

    pub fn falsy(mut self) -> Self {
        self.truthy = false;
        self
    }

    pub fn into_ref(self) -> ValueRef {
        Rc::new(self)
    }
}

/// Shorthand for a plain scripted value handle
pub fn value(repr: &str) -> ValueRef {
    TestValue::new(repr).into_ref()
}

impl Value for TestValue {
    fn repr(&self) -> String {
        self.repr.clone()
    }

    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn identity(&self) -> usize {
        self.identity
    }

    fn value_eq(&self, other: &dyn Value) -> bool {
        self.repr == other.repr()
    }

    fn truthy(&self) -> bool {
        self.truthy
    }

    fn len(&self) -> Option<usize> {
        self.len
    }

    fn doc(&self) -> Option<String> {
        self.doc.clone()
    }

    fn signature(&self) -> Option<String> {
        self.signature.clone()
    }

    fn position(&self) -> Option<ObjectPosition> {
        self.position.clone()
    }

    fn attr_names(&self) -> Vec<String> {
        self.attrs.clone()
    }
}

type EvalHook = Box<dyn Fn(&str) -> Option<EvalOutcome>>;

/// Scripted frame backed by plain maps
pub struct TestFrame {
    id: FrameId,
    filename: String,
    function: String,
    module: Option<String>,
    first_line: u32,
    line: Cell<u32>,
    source: RefCell<Option<SourceChunk>>,
    source_bytes: RefCell<Option<(u32, Vec<u8>)>>,
    locals: RefCell<BTreeMap<String, ValueRef>>,
    globals: RefCell<BTreeMap<String, ValueRef>>,
    hidden_marker: bool,
    ret: RefCell<Option<ValueRef>>,
    exc: RefCell<Option<ExceptionSummary>>,
    eval_hook: Option<EvalHook>,
}

impl TestFrame {
    pub fn named(function: &str) -> Self {
        Self {
            id: FrameId(NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed)),
            filename: "app.rs".to_string(),
            function: function.to_string(),
            module: None,
            first_line: 1,
            line: Cell::new(3),
            source: RefCell::new(Some(SourceChunk {
                first_line: 1,
                lines: vec![
                    format!("fn {}() {{", function),
                    "    let x = 1;".to_string(),
                    "    let y = x + 1;".to_string(),
                    "    work(y);".to_string(),
                    "}".to_string(),
                ],
            })),
            source_bytes: RefCell::new(None),
            locals: RefCell::new(BTreeMap::new()),
            globals: RefCell::new(BTreeMap::new()),
            hidden_marker: false,
            ret: RefCell::new(None),
            exc: RefCell::new(None),
            eval_hook: None,
        }
    }

    pub fn in_file(mut self, filename: &str) -> Self {
        self.filename = filename.to_string();
        self
    }

    pub fn with_module(mut self, module: &str) -> Self {
        self.module = Some(module.to_string());
        self
    }

    pub fn marked_hidden(mut self) -> Self {
        self.hidden_marker = true;
        self
    }

    pub fn at_line(self, line: u32) -> Self {
        self.line.set(line);
        self
    }

    pub fn with_source(self, first_line: u32, lines: &[&str]) -> Self {
        *self.source.borrow_mut() = Some(SourceChunk {
            first_line,
            lines: lines.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn without_source(self) -> Self {
        *self.source.borrow_mut() = None;
        self
    }

    /// Hand out raw bytes instead of decoded source lines
    pub fn with_source_bytes(self, first_line: u32, bytes: &[u8]) -> Self {
        *self.source.borrow_mut() = None;
        *self.source_bytes.borrow_mut() = Some((first_line, bytes.to_vec()));
        self
    }

    pub fn with_local(self, name: &str, value: ValueRef) -> Self {
        self.locals.borrow_mut().insert(name.to_string(), value);
        self
    }

    /// Rebind a local on a live frame (simulates the program mutating it)
    pub fn set_local(&self, name: &str, value: ValueRef) {
        self.locals.borrow_mut().insert(name.to_string(), value);
    }

    pub fn with_local_flag(self, name: &str) -> Self {
        self.with_local(name, value("true"))
    }

    pub fn with_global(self, name: &str, value: ValueRef) -> Self {
        self.globals.borrow_mut().insert(name.to_string(), value);
        self
    }

    pub fn with_global_flag(self, name: &str) -> Self {
        self.with_global(name, value("true"))
    }

    pub fn returning(self, value: ValueRef) -> Self {
        *self.ret.borrow_mut() = Some(value);
        self
    }

    pub fn with_exception(self, type_name: &str, message: &str) -> Self {
        *self.exc.borrow_mut() = Some(ExceptionSummary {
            type_name: type_name.to_string(),
            message: message.to_string(),
        });
        self
    }

    pub fn with_eval_hook(mut self, hook: impl Fn(&str) -> Option<EvalOutcome> + 'static) -> Self {
        self.eval_hook = Some(Box::new(hook));
        self
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn into_ref(self) -> FrameRef {
        Rc::new(self)
    }

    /// Wrap into a stack entry at the frame's current line
    pub fn entry(self) -> StackEntry {
        let line = self.line.get();
        StackEntry::new(Rc::new(self), line)
    }
}

impl Frame for TestFrame {
    fn id(&self) -> FrameId {
        self.id
    }

    fn location(&self) -> CodeLocation {
        CodeLocation {
            filename: self.filename.clone(),
            function: self.function.clone(),
            first_line: self.first_line,
        }
    }

    fn source(&self) -> Option<SourceChunk> {
        self.source.borrow().clone()
    }

    fn source_bytes(&self) -> Option<(u32, Vec<u8>)> {
        self.source_bytes.borrow().clone()
    }

    fn module_name(&self) -> Option<String> {
        self.module.clone()
    }

    fn get_local(&self, name: &str) -> Option<ValueRef> {
        self.locals.borrow().get(name).cloned()
    }

    fn get_global(&self, name: &str) -> Option<ValueRef> {
        self.globals.borrow().get(name).cloned()
    }

    fn local_names(&self) -> Vec<String> {
        self.locals.borrow().keys().cloned().collect()
    }

    fn global_names(&self) -> Vec<String> {
        self.globals.borrow().keys().cloned().collect()
    }

    fn eval(&self, expr: &str) -> EvalOutcome {
        if let Some(hook) = &self.eval_hook {
            if let Some(outcome) = hook(expr) {
                return outcome;
            }
        }
        let expr = expr.trim();
        if let Some(v) = self.get_local(expr).or_else(|| self.get_global(expr)) {
            return EvalOutcome::Value(v);
        }
        if expr.chars().all(|c| c.is_alphanumeric() || c == '_') && !expr.is_empty() {
            return EvalOutcome::Error(EvalError::new(format!(
                "NameError: name '{}' is not defined",
                expr
            )));
        }
        EvalOutcome::Error(EvalError::new(format!("SyntaxError: {}", expr)))
    }

    fn hide_marked(&self) -> bool {
        self.hidden_marker
    }

    fn return_value(&self) -> Option<ValueRef> {
        self.ret.borrow().clone()
    }

    fn exception(&self) -> Option<ExceptionSummary> {
        self.exc.borrow().clone()
    }
}

/// Cloneable in-memory output sink
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Line source fed from a fixed script
///
/// Two special line forms drive non-text events: a line starting with a
/// tab requests tab-completion of the text after the tab (candidates are
/// recorded in `completions`), and `"\x03"` simulates Ctrl-C.
pub struct ScriptedReader {
    lines: VecDeque<String>,
    completer: Option<SharedMerger>,
    pub prompts: Vec<String>,
    pub completions: Vec<Vec<String>>,
}

impl ScriptedReader {
    pub fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|s| s.to_string()).collect(),
            completer: None,
            prompts: Vec::new(),
            completions: Vec::new(),
        }
    }

    pub fn push(&mut self, line: &str) {
        self.lines.push_back(line.to_string());
    }

    pub fn completer(&self) -> Option<SharedMerger> {
        self.completer.clone()
    }

    fn drive_completion(&mut self, text: &str) {
        let mut collected = Vec::new();
        if let Some(merger) = &self.completer {
            let mut merger = merger.borrow_mut();
            let mut attempt = 0;
            while let Some(candidate) = merger.complete(text, attempt) {
                collected.push(candidate);
                attempt += 1;
            }
        }
        self.completions.push(collected);
    }
}

impl LineSource for ScriptedReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome> {
        self.prompts.push(prompt.to_string());
        while let Some(line) = self.lines.pop_front() {
            if line == "\x03" {
                return Ok(ReadOutcome::Interrupted);
            }
            if let Some(text) = line.strip_prefix('\t') {
                let text = text.to_string();
                self.drive_completion(&text);
                continue;
            }
            return Ok(ReadOutcome::Line(line));
        }
        Ok(ReadOutcome::Eof)
    }

    fn install_completer(&mut self, merger: SharedMerger) {
        self.completer = Some(merger);
    }

    fn remove_completer(&mut self) {
        self.completer = None;
    }
}

/// Tracer stand-in recording the calls the session makes
pub struct ScriptedTracer {
    pub stack: Vec<StackEntry>,
    pub suspended: Cell<bool>,
    pub step_armed: Cell<bool>,
    /// Stop delivered to the nested session when `run_traced` is called
    pub debug_stop: RefCell<Option<StopEvent>>,
    pub traced_exprs: RefCell<Vec<String>>,
}

impl ScriptedTracer {
    pub fn new(stack: Vec<StackEntry>) -> Self {
        Self {
            stack,
            suspended: Cell::new(false),
            step_armed: Cell::new(false),
            debug_stop: RefCell::new(None),
            traced_exprs: RefCell::new(Vec::new()),
        }
    }
}

impl Tracer for ScriptedTracer {
    fn current_stack(&self) -> Vec<StackEntry> {
        self.stack.clone()
    }

    fn suspend(&mut self) {
        self.suspended.set(true);
    }

    fn arm_step(&mut self) {
        self.step_armed.set(true);
    }

    fn run_traced(
        &mut self,
        expr: &str,
        _frame: &FrameRef,
        on_stop: &mut dyn FnMut(StopEvent) -> Resume,
    ) -> std::result::Result<(), String> {
        self.traced_exprs.borrow_mut().push(expr.to_string());
        match self.debug_stop.borrow_mut().take() {
            Some(stop) => {
                on_stop(stop);
                Ok(())
            }
            None => Err("nothing to trace".to_string()),
        }
    }
}
