//! Command-line disambiguation
//!
//! Classifies an input line as a command or an expression, given the
//! current frame's bindings and the registered command names. The smart
//! rule prefers the expression interpretation when a command name shadows a
//! variable and the line carries no separating syntax, so typing `r` with a
//! local `r` prints the variable instead of resuming execution.

use std::sync::OnceLock;

use regex::Regex;

/// Lookups the parser needs from the session
pub trait ParseContext {
    /// Is `name` a registered command or alias
    fn is_command(&self, name: &str) -> bool;
    /// Is `name` bound in the current frame's locals or globals
    fn has_binding(&self, name: &str) -> bool;
}

/// Result of disambiguating one input line
///
/// An empty `command` means the whole line is an expression or statement to
/// evaluate. Keeping it a plain string (never an absent marker) is what the
/// completion machinery expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub command: String,
    pub arg: String,
    /// The line as typed (with the `!!` prefix preserved)
    pub line: String,
    /// Repeat count extracted from a `<N><cmd>` prefix
    pub count: Option<usize>,
}

impl ParsedLine {
    fn expression(line: &str) -> Self {
        Self {
            command: String::new(),
            arg: String::new(),
            line: line.to_string(),
            count: None,
        }
    }

    pub fn is_expression(&self) -> bool {
        self.command.is_empty()
    }
}

fn glued_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)(\w+)$").unwrap())
}

/// Baseline tokenization: leading identifier characters form the candidate
/// command, the rest is the argument.
fn baseline(raw: &str) -> ParsedLine {
    let line = raw.trim();
    if line.is_empty() {
        return ParsedLine::expression("");
    }
    if let Some(rest) = line.strip_prefix('?') {
        let rewritten = format!("help {}", rest.trim());
        return baseline(rewritten.trim());
    }
    if line.starts_with('!') {
        return ParsedLine::expression(line);
    }
    let split = line
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    if split == 0 {
        return ParsedLine::expression(line);
    }
    ParsedLine {
        command: line[..split].to_string(),
        arg: line[split..].trim().to_string(),
        line: line.to_string(),
        count: None,
    }
}

/// Disambiguate one input line (ordered rules, first match wins)
pub fn parse_line(raw: &str, ctx: &dyn ParseContext) -> ParsedLine {
    // 1. `!!` forces literal command parsing.
    if let Some(rest) = raw.trim_start().strip_prefix("!!") {
        let mut parsed = baseline(rest);
        parsed.line = format!("!!{}", parsed.line);
        return parsed;
    }

    let trimmed = raw.trim();

    // 2. Trailing `?`/`??` means inspect (or help for bare command names).
    if trimmed.ends_with('?') && !trimmed.starts_with('!') {
        let arg = trimmed.split('?').next().unwrap_or("").trim().to_string();
        let command = if trimmed.ends_with("??") {
            "inspect_with_source"
        } else if arg.is_empty() || (ctx.is_command(&arg) && !ctx.has_binding(&arg)) {
            "help"
        } else {
            "inspect"
        };
        return ParsedLine {
            command: command.to_string(),
            arg,
            line: trimmed.to_string(),
            count: None,
        };
    }

    // 3. Baseline tokenization.
    let mut parsed = baseline(raw);
    if parsed.command.is_empty() {
        return parsed;
    }

    // 4. A single-letter movement/read alias directly followed by a quoted
    //    literal is an expression (`b"x"` is a string, not a breakpoint).
    if matches!(parsed.command.as_str(), "b" | "f" | "r" | "u") {
        let after = &parsed.line[1..];
        let quoted = |s: &str| s.starts_with('\'') || s.starts_with('"');
        if quoted(after) || quoted(&parsed.arg) {
            return ParsedLine::expression(trimmed);
        }
    }

    // 5. `<N><cmd>` shorthand: digits glued to a known command become a
    //    repeat count carried on the argument.
    let candidate = parsed.command.clone();
    if let Some(caps) = glued_count_re().captures(&candidate) {
        let word = caps[2].to_string();
        if ctx.is_command(&word) {
            if let Ok(count) = caps[1].parse::<usize>() {
                parsed.count = Some(count);
                parsed.command = word;
            }
        }
    }

    // 6. Smart command mode: a command name that is also a variable, with
    //    no separating syntax, reads as the variable. Assignments always
    //    read as statements, and `list(`/`next(` as builtin calls.
    if ctx.is_command(&parsed.command) {
        let reconstructed = format!("{}{}", parsed.command, parsed.arg);
        if (ctx.has_binding(&parsed.command) && reconstructed == raw)
            || parsed.arg.starts_with('=')
        {
            return ParsedLine::expression(trimmed);
        }
        if parsed.arg.starts_with('(') && matches!(parsed.command.as_str(), "list" | "next") {
            return ParsedLine::expression(trimmed);
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Ctx {
        commands: HashSet<String>,
        bindings: HashSet<String>,
    }

    impl Ctx {
        fn new(commands: &[&str], bindings: &[&str]) -> Self {
            Self {
                commands: commands.iter().map(|s| s.to_string()).collect(),
                bindings: bindings.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl ParseContext for Ctx {
        fn is_command(&self, name: &str) -> bool {
            self.commands.contains(name)
        }

        fn has_binding(&self, name: &str) -> bool {
            self.bindings.contains(name)
        }
    }

    fn default_ctx() -> Ctx {
        Ctx::new(
            &["r", "b", "u", "f", "pp", "p", "list", "next", "help", "step"],
            &[],
        )
    }

    #[test]
    fn test_plain_command() {
        let parsed = parse_line("step", &default_ctx());
        assert_eq!(parsed.command, "step");
        assert_eq!(parsed.arg, "");
    }

    #[test]
    fn test_command_with_argument() {
        let parsed = parse_line("p x + 1", &default_ctx());
        assert_eq!(parsed.command, "p");
        assert_eq!(parsed.arg, "x + 1");
    }

    #[test]
    fn test_shadowed_command_reads_as_variable() {
        let ctx = Ctx::new(&["r", "pp"], &["r"]);
        let parsed = parse_line("r", &ctx);
        assert!(parsed.is_expression());
        assert_eq!(parsed.line, "r");
    }

    #[test]
    fn test_unshadowed_single_letter_stays_command() {
        let parsed = parse_line("r", &default_ctx());
        assert_eq!(parsed.command, "r");
    }

    #[test]
    fn test_trailing_space_escapes_smart_mode() {
        // "r " reconstructs to "r", which differs from the raw line, so the
        // command interpretation wins even with a shadowing variable.
        let ctx = Ctx::new(&["r"], &["r"]);
        let parsed = parse_line("r ", &ctx);
        assert_eq!(parsed.command, "r");
    }

    #[test]
    fn test_double_bang_forces_command() {
        let ctx = Ctx::new(&["r"], &["r"]);
        let parsed = parse_line("!!r", &ctx);
        assert_eq!(parsed.command, "r");
        assert_eq!(parsed.line, "!!r");
    }

    #[test]
    fn test_glued_count() {
        let parsed = parse_line("10pp x", &default_ctx());
        assert_eq!(parsed.command, "pp");
        assert_eq!(parsed.arg, "x");
        assert_eq!(parsed.count, Some(10));
    }

    #[test]
    fn test_pure_number_is_not_a_count() {
        let parsed = parse_line("123", &default_ctx());
        assert_eq!(parsed.command, "123");
        assert_eq!(parsed.count, None);
    }

    #[test]
    fn test_quoted_literal_after_alias() {
        let parsed = parse_line("b\"x\"", &default_ctx());
        assert!(parsed.is_expression());
        let parsed = parse_line("b 'x'", &default_ctx());
        assert!(parsed.is_expression());
    }

    #[test]
    fn test_alias_with_plain_argument_stays_command() {
        let parsed = parse_line("f 2", &default_ctx());
        assert_eq!(parsed.command, "f");
        assert_eq!(parsed.arg, "2");
    }

    #[test]
    fn test_inspect_suffix() {
        let ctx = Ctx::new(&["list"], &["x"]);
        let parsed = parse_line("x?", &ctx);
        assert_eq!(parsed.command, "inspect");
        assert_eq!(parsed.arg, "x");
        let parsed = parse_line("x??", &ctx);
        assert_eq!(parsed.command, "inspect_with_source");
        assert_eq!(parsed.arg, "x");
    }

    #[test]
    fn test_command_name_with_question_mark_is_help() {
        let parsed = parse_line("list?", &default_ctx());
        assert_eq!(parsed.command, "help");
        assert_eq!(parsed.arg, "list");
    }

    #[test]
    fn test_shadowed_name_with_question_mark_inspects() {
        let ctx = Ctx::new(&["list"], &["list"]);
        let parsed = parse_line("list?", &ctx);
        assert_eq!(parsed.command, "inspect");
    }

    #[test]
    fn test_bare_question_mark_is_help() {
        let parsed = parse_line("?", &default_ctx());
        assert_eq!(parsed.command, "help");
        assert_eq!(parsed.arg, "");
    }

    #[test]
    fn test_question_prefix_is_help() {
        let parsed = parse_line("?list", &default_ctx());
        assert_eq!(parsed.command, "help");
        assert_eq!(parsed.arg, "list");
    }

    #[test]
    fn test_bang_prefix_is_statement() {
        let parsed = parse_line("!step", &default_ctx());
        assert!(parsed.is_expression());
        assert_eq!(parsed.line, "!step");
    }

    #[test]
    fn test_assignment_is_statement() {
        let parsed = parse_line("next = 5", &default_ctx());
        assert!(parsed.is_expression());
    }

    #[test]
    fn test_builtin_call_heuristic() {
        assert!(parse_line("list(x)", &default_ctx()).is_expression());
        assert!(parse_line("next(it)", &default_ctx()).is_expression());
        // Other commands with parenthesized arguments stay commands.
        let parsed = parse_line("p (x)", &default_ctx());
        assert_eq!(parsed.command, "p");
    }

    #[test]
    fn test_non_identifier_start_is_expression() {
        assert!(parse_line("(x, y)", &default_ctx()).is_expression());
        assert!(parse_line("[1]", &default_ctx()).is_expression());
    }
}
