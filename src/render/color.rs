//! ANSI escape handling
//!
//! Color configuration is raw SGR codes (e.g. `"33;01"`), applied and
//! stripped here. Width math must ignore escapes, so "visible length"
//! helpers live here too.

use std::sync::OnceLock;

use regex::Regex;

/// Matches runs of SGR escape sequences
pub fn escapes_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\x1b\[[0-9;]*m)+").unwrap())
}

/// Wrap `s` in the given SGR code, resetting afterwards
pub fn sgr(code: &str, s: &str) -> String {
    format!("\x1b[{}m{}\x1b[00m", code, s)
}

/// Set `code` over the whole line, adding it to escape sequences already
/// present so embedded colors keep the background/attributes.
pub fn set_sgr_over(line: &str, code: &str) -> String {
    static INNER: OnceLock<Regex> = OnceLock::new();
    let inner = INNER.get_or_init(|| Regex::new(r"(\x1b\[[0-9;]*)m").unwrap());
    let patched = inner.replace_all(line, |caps: &regex::Captures<'_>| {
        format!("{};{}m", &caps[1], code)
    });
    format!("\x1b[{}m{}\x1b[00m", code, patched)
}

/// Remove all SGR escapes
pub fn strip_escapes(s: &str) -> String {
    escapes_re().replace_all(s, "").into_owned()
}

/// Character count with escapes ignored
pub fn visible_len(s: &str) -> usize {
    strip_escapes(s).chars().count()
}

/// Truncate to a visible length, preserving escapes before the cut and the
/// trailing reset sequence when one ends the original string.
pub fn truncate_visible(s: &str, max: usize) -> String {
    if visible_len(s) <= max {
        return s.to_string();
    }

    let re = escapes_re();
    let mut out = String::new();
    let mut visible = 0;
    let mut pos = 0;
    for m in re.find_iter(s) {
        for ch in s[pos..m.start()].chars() {
            if visible == max {
                break;
            }
            out.push(ch);
            visible += 1;
        }
        out.push_str(m.as_str());
        pos = m.end();
        if visible >= max {
            break;
        }
    }
    if visible < max {
        for ch in s[pos..].chars() {
            if visible == max {
                break;
            }
            out.push(ch);
            visible += 1;
        }
    }

    if let Some(m) = re.find_iter(s).last() {
        if m.end() == s.len() && !out.ends_with(m.as_str()) {
            out.push_str(m.as_str());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_and_visible_len() {
        let colored = sgr("33;01", "hello");
        assert_eq!(strip_escapes(&colored), "hello");
        assert_eq!(visible_len(&colored), 5);
    }

    #[test]
    fn test_truncate_plain() {
        assert_eq!(truncate_visible("abcdef", 3), "abc");
        assert_eq!(truncate_visible("ab", 3), "ab");
    }

    #[test]
    fn test_truncate_keeps_escapes_and_reset() {
        let s = format!("{}tail", sgr("36", "head"));
        let cut = truncate_visible(&s, 4);
        assert_eq!(strip_escapes(&cut), "head");
        assert!(cut.contains("\x1b[36m"));
        let s2 = sgr("36", "abcdef");
        let cut2 = truncate_visible(&s2, 3);
        assert!(cut2.ends_with("\x1b[00m"));
        assert_eq!(strip_escapes(&cut2), "abc");
    }

    #[test]
    fn test_set_sgr_over_patches_inner_escapes() {
        let line = format!("a {} b", sgr("33", "x"));
        let barred = set_sgr_over(&line, "39;49;7");
        assert!(barred.starts_with("\x1b[39;49;7m"));
        assert!(barred.contains("\x1b[33;39;49;7m"));
        assert!(barred.ends_with("\x1b[00m"));
    }
}
