//! Sticky mode state
//!
//! Sticky mode repaints a fixed-position source view on every stop. The
//! state here tracks when a screen clear is owed, when one must be skipped
//! to preserve just-printed output, per-frame line-range overrides, and the
//! queue of status messages folded into the next repaint.

use std::collections::HashMap;
use std::io::Write;

use crate::common::Result;
use crate::frames::{ExceptionSummary, FrameId};

use super::color::sgr;
use super::CLEARSCREEN;

/// Sticky rendering state for one session
pub struct StickyState {
    pub enabled: bool,
    /// True until the first sticky render happens
    pub first_time: bool,
    /// Per-frame (start, end) line-range overrides, end exclusive
    pub ranges: HashMap<FrameId, (u32, u32)>,
    /// Messages queued while sticky; folded into the next repaint
    pub messages: Vec<String>,
    need_cls: bool,
    skip_cls: bool,
}

impl StickyState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            first_time: enabled,
            ranges: HashMap::new(),
            messages: Vec::new(),
            need_cls: false,
            skip_cls: false,
        }
    }

    /// Arm a clear for the next repaint
    pub fn request_cls(&mut self) {
        self.need_cls = true;
    }

    /// Suppress the next clear once (breakpoint hits, continue/quit output)
    pub fn skip_next_cls(&mut self) {
        self.skip_cls = true;
    }

    /// Emit the clear sequence if one is owed and not skipped
    pub fn handle_cls(&mut self, out: &mut dyn Write) -> Result<()> {
        if self.first_time {
            // Sticky-by-default sessions owe a clear on their first paint.
            self.first_time = false;
            self.need_cls = true;
        }
        if self.skip_cls {
            self.skip_cls = false;
            return Ok(());
        }
        if !self.need_cls {
            return Ok(());
        }
        out.write_all(CLEARSCREEN.as_bytes())?;
        out.flush()?;
        self.need_cls = false;
        Ok(())
    }

    pub fn queue_message(&mut self, msg: impl Into<String>) {
        self.messages.push(msg.into());
    }

    pub fn take_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }
}

/// Format an exception for the sticky footer: one line, bounded to the
/// terminal width, raw newlines escaped.
pub fn format_exc_for_sticky(
    exc: &ExceptionSummary,
    width: usize,
    highlight: bool,
    color: &str,
) -> String {
    let mut s = exc.type_name.clone();
    if !exc.message.is_empty() {
        s.push_str(": ");
        s.push_str(&exc.message);
    }
    s = s.replace('\r', "\\r").replace('\n', "\\n");
    if s.chars().count() > width {
        s = s.chars().take(width.saturating_sub(1)).collect();
        s.push('…');
    }
    if highlight {
        s = sgr(color, &s);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_consumes_one_clear() {
        let mut sticky = StickyState::new(true);
        sticky.request_cls();
        sticky.skip_next_cls();

        let mut out: Vec<u8> = Vec::new();
        sticky.handle_cls(&mut out).unwrap();
        assert!(out.is_empty());

        // The owed clear is still pending after the skipped one.
        sticky.handle_cls(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), CLEARSCREEN);
    }

    #[test]
    fn test_clear_emitted_once() {
        let mut sticky = StickyState::new(true);
        sticky.request_cls();
        let mut out: Vec<u8> = Vec::new();
        sticky.handle_cls(&mut out).unwrap();
        sticky.handle_cls(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), CLEARSCREEN);
    }

    #[test]
    fn test_sticky_by_default_clears_on_first_paint() {
        let mut sticky = StickyState::new(true);
        let mut out: Vec<u8> = Vec::new();
        sticky.handle_cls(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), CLEARSCREEN);

        let mut off = StickyState::new(false);
        let mut out: Vec<u8> = Vec::new();
        off.handle_cls(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_exc_formatting_escapes_and_truncates() {
        let exc = ExceptionSummary {
            type_name: "ValueError".to_string(),
            message: "bad\nthing happened over and over and over".to_string(),
        };
        let s = format_exc_for_sticky(&exc, 24, false, "36");
        assert!(s.contains("\\n"));
        assert!(!s.contains('\n'));
        assert_eq!(s.chars().count(), 24);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn test_exc_formatting_short_untouched() {
        let exc = ExceptionSummary {
            type_name: "KeyError".to_string(),
            message: "'x'".to_string(),
        };
        assert_eq!(format_exc_for_sticky(&exc, 80, false, "36"), "KeyError: 'x'");
    }
}
