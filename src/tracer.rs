//! Execution engine interface
//!
//! The step/continue/breakpoint machinery lives in the host runtime. The
//! shell consumes it through this boundary: the host stops execution and
//! calls into the session with a [`StopEvent`]; the session answers with a
//! [`Resume`] directive the host then honors.

use std::cell::RefCell;
use std::rc::Rc;

use crate::frames::{ExceptionSummary, FrameRef, StackEntry};

/// Shared handle to the host's tracer
pub type TracerRef = Rc<RefCell<dyn Tracer>>;

/// Why execution stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopKind {
    /// First stop after a programmatic break request
    Entry,
    /// Completed a step
    Step,
    /// Breakpoint hit
    Breakpoint,
    /// Stopped at a function call boundary
    Call,
    /// Stopped at a function return
    Return,
    /// Stopped on a raised exception
    Exception,
    /// Inspecting an already-raised error
    PostMortem,
}

/// One debug stop delivered by the host tracer
pub struct StopEvent {
    /// Live stack snapshot, outermost frame first
    pub stack: Vec<StackEntry>,
    /// Index of the frame to select; `None` selects the innermost
    pub index: Option<usize>,
    pub kind: StopKind,
    /// Exception being inspected, with the line it raised at per frame
    pub exception: Option<ExceptionSummary>,
    /// Per-frame raise lines of the traceback, innermost last
    pub raise_lines: Vec<(crate::frames::FrameId, u32)>,
}

impl StopEvent {
    pub fn new(stack: Vec<StackEntry>, kind: StopKind) -> Self {
        Self {
            stack,
            index: None,
            kind,
            exception: None,
            raise_lines: Vec::new(),
        }
    }
}

/// Directive returned to the host when an interaction ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Stop at the next line, entering calls
    Step,
    /// Stop at the next line in the current frame
    Next,
    /// Stop when the current frame returns
    StepOut,
    /// Run until the next breakpoint
    Continue,
    /// Tear the program down
    Quit,
}

/// Host execution engine boundary
pub trait Tracer {
    /// Snapshot of the live call stack, outermost frame first
    fn current_stack(&self) -> Vec<StackEntry>;

    /// Detach the low-level trace callback without discarding breakpoints.
    /// Called when an existing session is reused for a new break request.
    fn suspend(&mut self);

    /// Re-arm single stepping for the next continue. Called on the reuse
    /// path so the reused session stops right after the break request.
    fn arm_step(&mut self) {}

    /// Run `expr` in `frame`'s context under the trace hook, reporting every
    /// stop to `on_stop` (the nested-session protocol behind `debug`).
    fn run_traced(
        &mut self,
        _expr: &str,
        _frame: &FrameRef,
        _on_stop: &mut dyn FnMut(StopEvent) -> Resume,
    ) -> std::result::Result<(), String> {
        Err("recursive debugging is not supported by this tracer".to_string())
    }
}
