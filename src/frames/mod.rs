//! Call stack model
//!
//! Frames are opaque, externally-owned handles into the host runtime's live
//! call stack. The shell never owns or copies frame state; it only reads
//! code locations, bindings and parent links, and compares identity.

pub mod visibility;

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a live frame owned by the host runtime
pub type FrameRef = Rc<dyn Frame>;

/// Shared handle to a host runtime value
pub type ValueRef = Rc<dyn Value>;

/// Stable identity of a live frame
///
/// Two handles refer to the same frame iff their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Static location of a frame's code object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLocation {
    /// Source file as reported by the host
    pub filename: String,
    /// Function name; `<module>` for top-level code
    pub function: String,
    /// First line of the enclosing function/module
    pub first_line: u32,
}

/// A function's (or module's) source as the host hands it out
#[derive(Debug, Clone)]
pub struct SourceChunk {
    /// Line number of `lines[0]` in the file
    pub first_line: u32,
    pub lines: Vec<String>,
}

/// One entry of a stack snapshot: a frame plus its resolved line
#[derive(Clone)]
pub struct StackEntry {
    pub frame: FrameRef,
    pub line: u32,
}

impl StackEntry {
    pub fn new(frame: FrameRef, line: u32) -> Self {
        Self { frame, line }
    }

    pub fn id(&self) -> FrameId {
        self.frame.id()
    }
}

impl fmt::Debug for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let loc = self.frame.location();
        write!(f, "{}:{} in {}", loc.filename, self.line, loc.function)
    }
}

/// One-line summary of an exception attached to a frame or a post-mortem
#[derive(Debug, Clone)]
pub struct ExceptionSummary {
    pub type_name: String,
    pub message: String,
}

/// A single displayed traceback frame of an evaluation error
#[derive(Debug, Clone)]
pub struct TracebackLine {
    /// Pre-formatted "File ..., line N, in f" style text
    pub text: String,
    /// True for debugger-internal frames; pruned from displayed dumps
    pub internal: bool,
}

/// Evaluation error detail, as reported by the host evaluator
#[derive(Debug, Clone)]
pub struct EvalError {
    /// One-line summary ("TypeError: ...")
    pub summary: String,
    pub traceback: Vec<TracebackLine>,
}

impl EvalError {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            traceback: Vec::new(),
        }
    }
}

/// Explicit result of evaluating an expression in a frame's context
#[derive(Clone)]
pub enum EvalOutcome {
    /// Expression produced a value
    Value(ValueRef),
    /// Statement executed without producing a value
    Nothing,
    /// Name is not bound in the frame (display watches render `<undefined>`)
    Undefined,
    /// Evaluation raised
    Error(EvalError),
}

/// Position of an arbitrary object's definition, for inspect/source/edit
#[derive(Debug, Clone)]
pub struct ObjectPosition {
    pub filename: String,
    pub first_line: u32,
    pub lines: Option<Vec<String>>,
}

/// Abstract capability over one live stack frame
///
/// Implementations are provided by the host runtime integration. The shell
/// assumes nothing about lifetime beyond the current stop, and never mutates
/// frame state.
pub trait Frame {
    fn id(&self) -> FrameId;

    fn location(&self) -> CodeLocation;

    /// Full source of the enclosing function or module
    fn source(&self) -> Option<SourceChunk>;

    /// Raw source bytes, for hosts that hand out undecoded file contents.
    /// Consulted when [`Frame::source`] is `None`; decoded with the
    /// configured encodings.
    fn source_bytes(&self) -> Option<(u32, Vec<u8>)> {
        None
    }

    /// Dotted module name, if known (matched against skip patterns)
    fn module_name(&self) -> Option<String> {
        None
    }

    fn get_local(&self, name: &str) -> Option<ValueRef>;

    fn get_global(&self, name: &str) -> Option<ValueRef>;

    fn local_names(&self) -> Vec<String>;

    fn global_names(&self) -> Vec<String>;

    /// Evaluate an expression or statement with this frame's bindings
    fn eval(&self, expr: &str) -> EvalOutcome;

    /// Caller frame, if any
    fn parent(&self) -> Option<FrameRef> {
        None
    }

    /// Code-object marker set by the host's hide decorator
    fn hide_marked(&self) -> bool {
        false
    }

    /// Value being returned from this frame, when stopped at a return event
    fn return_value(&self) -> Option<ValueRef> {
        None
    }

    /// Exception captured in this frame (post-mortem, exception events)
    fn exception(&self) -> Option<ExceptionSummary> {
        None
    }

    /// True if the named binding exists in locals or globals
    fn has_binding(&self, name: &str) -> bool {
        self.get_local(name).is_some() || self.get_global(name).is_some()
    }
}

/// Abstract capability over one host runtime value
pub trait Value {
    /// Developer-oriented representation
    fn repr(&self) -> String;

    fn type_name(&self) -> String;

    /// Host object identity; used for the display-watch short-circuit
    fn identity(&self) -> usize;

    /// Host-defined equality; only consulted between identical handles
    fn value_eq(&self, other: &dyn Value) -> bool;

    /// Host truthiness (hide predicates read `__tracebackhide__` this way)
    fn truthy(&self) -> bool {
        true
    }

    /// Pretty-printed representation bounded to `width` columns
    fn pretty(&self, _width: usize) -> String {
        self.repr()
    }

    /// User-oriented string form (inspect's "String Form" row)
    fn str_form(&self) -> String {
        self.repr()
    }

    fn len(&self) -> Option<usize> {
        None
    }

    fn doc(&self) -> Option<String> {
        None
    }

    /// Call signature, for callables
    fn signature(&self) -> Option<String> {
        None
    }

    /// Where the object is defined, if the host can tell
    fn position(&self) -> Option<ObjectPosition> {
        None
    }

    /// Attribute names, for dotted completion
    fn attr_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Merged view of a frame's bindings, globals shadowed by locals
pub fn all_bindings(frame: &dyn Frame) -> Vec<String> {
    let mut names: BTreeMap<String, ()> = BTreeMap::new();
    for name in frame.global_names() {
        names.insert(name, ());
    }
    for name in frame.local_names() {
        names.insert(name, ());
    }
    names.into_keys().collect()
}

/// Decode host-supplied source bytes, trying the configured encodings in
/// order and falling back to a lossy utf-8 decode.
pub fn decode_source(bytes: &[u8], encodings: &[String]) -> String {
    for encoding in encodings {
        match encoding.as_str() {
            "utf-8" | "utf8" => {
                if let Ok(s) = std::str::from_utf8(bytes) {
                    return s.to_string();
                }
            }
            "latin-1" | "latin1" | "iso-8859-1" => {
                return bytes.iter().map(|&b| b as char).collect();
            }
            _ => {}
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_source_utf8_first() {
        let encodings = vec!["utf-8".to_string(), "latin-1".to_string()];
        assert_eq!(decode_source("héllo".as_bytes(), &encodings), "héllo");
    }

    #[test]
    fn test_decode_source_latin1_fallback() {
        let encodings = vec!["utf-8".to_string(), "latin-1".to_string()];
        // 0xE9 is not valid utf-8 on its own; latin-1 maps it to é
        assert_eq!(decode_source(&[0x68, 0xE9], &encodings), "hé");
    }

    #[test]
    fn test_decode_source_lossy_last_resort() {
        let encodings = vec!["utf-8".to_string()];
        let decoded = decode_source(&[0x68, 0xE9], &encodings);
        assert!(decoded.starts_with('h'));
    }
}
