//! Plain fallback debugger
//!
//! When enhanced-session construction re-enters itself (a breakpoint fires
//! inside the construction path), the registry degrades to this bare
//! line debugger instead of recursing. It knows stepping, navigation and
//! printing; nothing else.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use crate::frames::{EvalOutcome, StackEntry};
use crate::input::{LineSource, ReadOutcome, StdinReader};
use crate::tracer::{Resume, StopEvent};
use crate::Result;

use super::{OutputSink, SessionBuilder};

/// Minimal, non-enhanced interactive debugger
pub struct PlainSession {
    out: OutputSink,
    reader: Rc<RefCell<dyn LineSource>>,
}

impl PlainSession {
    pub(crate) fn from_builder(builder: &mut SessionBuilder) -> Self {
        Self {
            out: builder
                .output
                .take()
                .unwrap_or_else(super::stdout_sink),
            reader: builder
                .reader
                .clone()
                .unwrap_or_else(|| Rc::new(RefCell::new(StdinReader))),
        }
    }

    fn entry_text(entry: &StackEntry) -> String {
        let loc = entry.frame.location();
        format!("{}({}){}", loc.filename, entry.line, loc.function)
    }

    /// Run one read-eval loop over the given stop
    pub fn interaction(&mut self, stop: StopEvent) -> Result<Resume> {
        let stack = stop.stack;
        if stack.is_empty() {
            return Ok(Resume::Continue);
        }
        let curindex = stop.index.unwrap_or(stack.len() - 1).min(stack.len() - 1);

        {
            let mut out = self.out.borrow_mut();
            writeln!(out, "debug-shell: using plain debugger for recursive break request.")?;
            writeln!(out, "> {}", Self::entry_text(&stack[curindex]))?;
        }

        loop {
            let outcome = self.reader.borrow_mut().read_line("(dbg) ")?;
            let line = match outcome {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted => {
                    writeln!(self.out.borrow_mut(), "--KeyboardInterrupt--")?;
                    continue;
                }
                ReadOutcome::Eof => return Ok(Resume::Quit),
            };
            let line = line.trim();
            let (cmd, arg) = match line.split_once(' ') {
                Some((c, a)) => (c, a.trim()),
                None => (line, ""),
            };
            match cmd {
                "" => {}
                "s" | "step" => return Ok(Resume::Step),
                "n" | "next" => return Ok(Resume::Next),
                "r" | "return" => return Ok(Resume::StepOut),
                "c" | "cont" | "continue" => return Ok(Resume::Continue),
                "q" | "quit" => return Ok(Resume::Quit),
                "w" | "where" => {
                    let mut out = self.out.borrow_mut();
                    for (i, entry) in stack.iter().enumerate() {
                        let marker = if i == curindex { "> " } else { "  " };
                        writeln!(out, "{}{}", marker, Self::entry_text(entry))?;
                    }
                }
                "p" if !arg.is_empty() => {
                    self.eval_and_print(&stack[curindex], arg)?;
                }
                _ => {
                    self.eval_and_print(&stack[curindex], line)?;
                }
            }
        }
    }

    fn eval_and_print(&mut self, entry: &StackEntry, expr: &str) -> Result<()> {
        let mut out = self.out.borrow_mut();
        match entry.frame.eval(expr) {
            EvalOutcome::Value(v) => writeln!(out, "{}", v.repr())?,
            EvalOutcome::Nothing => {}
            EvalOutcome::Undefined => {
                writeln!(out, "*** NameError: name '{}' is not defined", expr)?
            }
            EvalOutcome::Error(e) => writeln!(out, "*** {}", e.summary)?,
        }
        Ok(())
    }
}
