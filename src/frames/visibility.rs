//! Hidden-frame filtering
//!
//! Partitions a raw stack snapshot into visible and hidden frames according
//! to a set of hide predicates, keeping two invariants: a non-empty stack
//! never filters down to nothing, and the selected frame survives
//! recomputation whenever it is still present.

use super::{Frame, FrameId, StackEntry};

/// One way a frame can ask to be hidden
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HidePredicate {
    /// Code object carries the host's hide marker (decorator-equivalent)
    HideMarked,
    /// `__tracebackhide__` bound truthy in the frame's locals
    TracebackHideLocal,
    /// `__tracebackhide__` bound truthy in the frame's globals
    TracebackHideGlobal,
    /// `__unittest` bound in the frame's globals
    UnitTestMarker,
    /// Module name contains the given pattern
    SkipPattern(String),
}

impl HidePredicate {
    fn hides(&self, frame: &dyn Frame) -> bool {
        match self {
            Self::HideMarked => frame.hide_marked(),
            Self::TracebackHideLocal => frame
                .get_local("__tracebackhide__")
                .is_some_and(|v| v.truthy()),
            Self::TracebackHideGlobal => frame
                .get_global("__tracebackhide__")
                .is_some_and(|v| v.truthy()),
            Self::UnitTestMarker => frame
                .get_global("__unittest")
                .is_some_and(|v| v.truthy()),
            Self::SkipPattern(pattern) => frame
                .module_name()
                .is_some_and(|name| name.contains(pattern.as_str())),
        }
    }
}

/// The standard predicate set, extended with configured skip patterns
pub fn default_predicates(skip_patterns: &[String]) -> Vec<HidePredicate> {
    let mut predicates = vec![
        HidePredicate::HideMarked,
        HidePredicate::TracebackHideLocal,
        HidePredicate::TracebackHideGlobal,
        HidePredicate::UnitTestMarker,
    ];
    for pattern in skip_patterns {
        predicates.push(HidePredicate::SkipPattern(pattern.clone()));
    }
    predicates
}

/// Result of one visibility computation
pub struct VisibleStack {
    /// Frames to show, original order preserved
    pub visible: Vec<StackEntry>,
    /// Frames filtered out, original order preserved
    pub hidden: Vec<StackEntry>,
    /// Position of the selected frame within `visible`
    pub index: usize,
}

/// Visibility computation parameters for one stop
pub struct VisibilityFilter<'a> {
    pub enabled: bool,
    pub show_hidden: bool,
    /// Frame that triggered the session; never hidden by non-marker
    /// predicates even when other predicates would hide it
    pub entry_frame: Option<FrameId>,
    pub predicates: &'a [HidePredicate],
}

impl VisibilityFilter<'_> {
    fn is_hidden(&self, frame: &dyn Frame) -> bool {
        if !self.enabled {
            return false;
        }
        // The hide marker applies even to the entry frame.
        if self
            .predicates
            .iter()
            .any(|p| *p == HidePredicate::HideMarked && p.hides(frame))
        {
            return true;
        }
        if self.entry_frame == Some(frame.id()) {
            return false;
        }
        self.predicates
            .iter()
            .filter(|p| **p != HidePredicate::HideMarked)
            .any(|p| p.hides(frame))
    }

    /// Partition `full` into visible and hidden frames
    ///
    /// `index` selects the current frame in `full`; `None` selects the last.
    /// The returned index points at the same frame (by identity) inside the
    /// visible list when present, else at the last visible frame.
    pub fn compute(&self, full: &[StackEntry], index: Option<usize>) -> VisibleStack {
        if full.is_empty() {
            return VisibleStack {
                visible: Vec::new(),
                hidden: Vec::new(),
                index: 0,
            };
        }
        let idx = index.unwrap_or(full.len() - 1).min(full.len() - 1);
        let current = full[idx].id();

        if self.show_hidden {
            return VisibleStack {
                visible: full.to_vec(),
                hidden: Vec::new(),
                index: idx,
            };
        }

        // Keep original stack positions so a re-surfaced frame lands back in
        // order, not at the end.
        let mut visible: Vec<(usize, StackEntry)> = Vec::new();
        let mut hidden: Vec<(usize, StackEntry)> = Vec::new();
        for (pos, entry) in full.iter().enumerate() {
            if self.is_hidden(&*entry.frame) {
                hidden.push((pos, entry.clone()));
            } else {
                visible.push((pos, entry.clone()));
            }
        }

        // A stack must never be fully hidden, and the selected frame is
        // re-surfaced via the same last-hidden-unhide rule.
        let current_is_hidden = hidden.iter().any(|(_, e)| e.id() == current);
        if visible.is_empty() || current_is_hidden {
            if let Some((pos, entry)) = hidden.pop() {
                let at = visible.partition_point(|(p, _)| *p < pos);
                visible.insert(at, (pos, entry));
            }
        }

        let index = visible
            .iter()
            .position(|(_, e)| e.id() == current)
            .unwrap_or(visible.len().saturating_sub(1));

        VisibleStack {
            visible: visible.into_iter().map(|(_, e)| e).collect(),
            hidden: hidden.into_iter().map(|(_, e)| e).collect(),
            index,
        }
    }
}
