//! Display watch list
//!
//! Expressions registered with `display` are re-evaluated once per stop and
//! reported when their value changes. Change detection checks identity
//! first so host equality hooks with side effects don't run on every loop.

use std::collections::HashMap;

use crate::frames::{FrameId, ValueRef};

/// Last observed value of a watched expression
#[derive(Clone)]
pub enum Watched {
    /// Name was not bound when last evaluated
    Undefined,
    Value(ValueRef),
}

impl Watched {
    pub fn repr(&self) -> String {
        match self {
            Self::Undefined => "<undefined>".to_string(),
            Self::Value(v) => v.repr(),
        }
    }

    /// Identity-or-equality short-circuit: a handle to the same host object
    /// only reports a change when its own equality denies it.
    pub fn changed_to(&self, new: &Watched) -> bool {
        match (self, new) {
            (Self::Undefined, Self::Undefined) => false,
            (Self::Value(old), Self::Value(new)) => {
                old.identity() != new.identity() || !old.value_eq(&**new)
            }
            _ => true,
        }
    }
}

/// Watched expressions per frame, insertion-ordered
#[derive(Default)]
pub struct DisplayList {
    map: HashMap<FrameId, Vec<(String, Watched)>>,
}

impl DisplayList {
    pub fn add(&mut self, frame: FrameId, expr: &str, value: Watched) {
        let entries = self.map.entry(frame).or_default();
        if let Some(existing) = entries.iter_mut().find(|(e, _)| e == expr) {
            existing.1 = value;
        } else {
            entries.push((expr.to_string(), value));
        }
    }

    /// Remove a watch; false when the expression was not registered
    pub fn remove(&mut self, frame: FrameId, expr: &str) -> bool {
        let Some(entries) = self.map.get_mut(&frame) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(e, _)| e != expr);
        entries.len() != before
    }

    pub fn entries_mut(&mut self, frame: FrameId) -> &mut Vec<(String, Watched)> {
        self.map.entry(frame).or_default()
    }

    pub fn is_empty(&self, frame: FrameId) -> bool {
        self.map.get(&frame).map_or(true, Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::value;

    #[test]
    fn test_identical_value_does_not_change() {
        let v = value("42");
        let old = Watched::Value(v.clone());
        let new = Watched::Value(v);
        assert!(!old.changed_to(&new));
    }

    #[test]
    fn test_distinct_handle_changes_even_when_equal() {
        // Two distinct host objects report a change regardless of equality;
        // equality is never consulted across identities.
        let old = Watched::Value(value("42"));
        let new = Watched::Value(value("42"));
        assert!(old.changed_to(&new));
    }

    #[test]
    fn test_undefined_transitions() {
        let undefined = Watched::Undefined;
        let defined = Watched::Value(value("1"));
        assert!(!undefined.changed_to(&Watched::Undefined));
        assert!(undefined.changed_to(&defined));
        assert!(defined.changed_to(&Watched::Undefined));
    }

    #[test]
    fn test_add_replaces_existing_expression() {
        let mut list = DisplayList::default();
        let frame = FrameId(1);
        list.add(frame, "x", Watched::Undefined);
        list.add(frame, "x", Watched::Value(value("7")));
        assert_eq!(list.entries_mut(frame).len(), 1);
        assert_eq!(list.entries_mut(frame)[0].1.repr(), "7");
    }

    #[test]
    fn test_remove_reports_membership() {
        let mut list = DisplayList::default();
        let frame = FrameId(1);
        list.add(frame, "x", Watched::Undefined);
        assert!(list.remove(frame, "x"));
        assert!(!list.remove(frame, "x"));
    }
}
