//! Command dispatch and handlers
//!
//! Thin handlers over the session state. Anything a user can get wrong
//! (bad numbers, out-of-range frames, unknown names) is reported with a
//! `***` line and the loop continues.

use std::io::Write;

use colored::Colorize;

use crate::frames::{EvalOutcome, ObjectPosition, ValueRef};
use crate::render::color::visible_len;
use crate::render::listing::ListingRequest;
use crate::render::terminal_size;
use crate::tracer::Resume;
use crate::Result;

use super::display::Watched;
use super::registry::Acquired;
use super::{Session, SessionBuilder};

/// What a command told the loop to do
pub(crate) enum CmdOutcome {
    Stay,
    Resume(Resume),
}

/// Canonical command names with their aliases
const COMMANDS: &[(&str, &[&str])] = &[
    ("help", &["h"]),
    ("step", &["s"]),
    ("next", &["n"]),
    ("return", &["r"]),
    ("continue", &["c", "cont"]),
    ("quit", &["q", "exit"]),
    ("up", &["u"]),
    ("down", &["d"]),
    ("top", &[]),
    ("bottom", &[]),
    ("frame", &["f"]),
    ("where", &["w", "bt"]),
    ("p", &[]),
    ("pp", &[]),
    ("list", &["l"]),
    ("longlist", &["ll"]),
    ("sticky", &[]),
    ("display", &[]),
    ("undisplay", &[]),
    ("inspect", &[]),
    ("inspect_with_source", &[]),
    ("source", &[]),
    ("edit", &["ed"]),
    ("debug", &[]),
    ("hf_unhide", &[]),
    ("hf_hide", &[]),
    ("hf_list", &[]),
];

/// All registered command names and aliases
pub(crate) fn command_names() -> Vec<String> {
    let mut names = Vec::new();
    for (canonical, aliases) in COMMANDS {
        names.push(canonical.to_string());
        for alias in *aliases {
            names.push(alias.to_string());
        }
    }
    names.sort();
    names
}

/// Resolve a name or alias to its canonical command
pub(crate) fn resolve_command(name: &str) -> Option<&'static str> {
    for (canonical, aliases) in COMMANDS {
        if *canonical == name || aliases.contains(&name) {
            return Some(canonical);
        }
    }
    None
}

const HELP: &[(&str, &str)] = &[
    ("help", "h(elp) [command]\nShow this list, or help for one command."),
    ("step", "s(tep)\nExecute the current line, stopping at the first possible occasion."),
    ("next", "n(ext)\nContinue until the next line in the current frame."),
    ("return", "r(eturn)\nContinue until the current frame returns."),
    ("continue", "c(ont(inue))\nContinue execution until the next break."),
    ("quit", "q(uit) | exit\nStop the debugged program."),
    ("up", "u(p) [count]\nMove up the stack, to an older frame."),
    ("down", "d(own) [count]\nMove down the stack, to a newer frame."),
    ("top", "top\nGo to the oldest frame."),
    ("bottom", "bottom\nGo to the newest frame."),
    (
        "frame",
        "f(rame) [index]\nGo to the given frame. The first frame is 0, a negative index counts\nfrom the end (-1 is the newest). Without argument, show the current frame.",
    ),
    ("where", "w(here) | bt\nPrint the visible stack, newest frame last."),
    ("p", "p expression\nPrint the value of the expression."),
    (
        "pp",
        "[width]pp expression\nPretty-print the value of the expression, bounded to the terminal width\nor to the given width prefix.",
    ),
    ("list", "l(ist) [first[, last]]\nList source around the current line; repeat to continue."),
    (
        "longlist",
        "longlist | ll\nList the whole current function. The current line is marked with '->',\nthe line that raised with '>>'.",
    ),
    (
        "sticky",
        "sticky [start end]\nToggle sticky mode: clear the screen and repaint the current function\non every stop. With a range, only those lines are shown for this frame.",
    ),
    (
        "display",
        "display expression\nRe-evaluate the expression at every stop in this frame and report when\nits value changes. Mind side effects.",
    ),
    ("undisplay", "undisplay expression\nRemove the expression from the display list."),
    ("inspect", "expression?\nShow type, value, length, definition and docstring."),
    ("inspect_with_source", "expression??\nLike `expression?`, plus the source when available."),
    ("source", "source expression\nPrint the source of the given object."),
    ("edit", "edit [expression|file:line]\nOpen the editor at the current (or given) position."),
    ("debug", "debug expression\nEnter a nested session stepping through the expression."),
    ("hf_unhide", "hf_unhide\nTreat hidden frames as normal ones."),
    ("hf_hide", "hf_hide\nHide hidden frames again."),
    ("hf_list", "hf_list\nList the frames currently hidden."),
];

const HIDDEN_FRAMES_HELP: &str = "\
Some frames might be marked as \"hidden\": by default, hidden frames are not
shown in the stack trace, and cannot be reached using ``up`` and ``down``.
You can use ``hf_unhide`` to ignore the hidden status (i.e., to treat hidden
frames as normal ones), and ``hf_hide`` to hide them again.  ``hf_list``
prints a list of hidden frames.

Frames can be marked as hidden in the following ways:

- by carrying the host runtime's hide marker on their code object

- by having ``__tracebackhide__`` bound truthy in the locals or the globals
  of the function (this is used by test frameworks)

- by having ``__unittest`` in the globals of the function

- by matching one of the configured ``skip_patterns``

Note that the frame that requested the break is never hidden, except for
when it carries the hide marker.";

impl Session {
    pub(crate) fn onecmd(&mut self, raw: &str) -> Result<CmdOutcome> {
        let parsed = self.parse(raw);
        if parsed.is_expression() {
            if parsed.line.is_empty() {
                return Ok(CmdOutcome::Stay);
            }
            self.lastcmd = raw.to_string();
            self.default_eval(&parsed.line)?;
            return Ok(CmdOutcome::Stay);
        }
        let Some(canonical) = resolve_command(&parsed.command) else {
            // Unknown command word: the whole line is an expression.
            self.lastcmd = raw.to_string();
            self.default_eval(&parsed.line)?;
            return Ok(CmdOutcome::Stay);
        };
        self.lastcmd = raw.to_string();
        let arg = parsed.arg.as_str();
        match canonical {
            "help" => self.do_help(arg)?,
            "step" => return Ok(CmdOutcome::Resume(Resume::Step)),
            "next" => return Ok(CmdOutcome::Resume(Resume::Next)),
            "return" => return Ok(CmdOutcome::Resume(Resume::StepOut)),
            "continue" => return self.do_continue(arg),
            "quit" => {
                self.sticky.skip_next_cls();
                return Ok(CmdOutcome::Resume(Resume::Quit));
            }
            "up" => self.do_up(arg)?,
            "down" => self.do_down(arg)?,
            "top" => self.do_top()?,
            "bottom" => self.do_bottom()?,
            "frame" => self.do_frame(arg)?,
            "where" => self.do_where()?,
            "p" => self.do_p(arg)?,
            "pp" => self.do_pp(arg, parsed.count)?,
            "list" => self.do_list(arg)?,
            "longlist" => self.print_long_list(None, None)?,
            "sticky" => self.do_sticky(arg)?,
            "display" => self.do_display(arg)?,
            "undisplay" => self.do_undisplay(arg)?,
            "inspect" => self.do_inspect(arg, false)?,
            "inspect_with_source" => self.do_inspect(arg, true)?,
            "source" => self.do_source(arg)?,
            "edit" => self.do_edit(arg)?,
            "debug" => self.do_debug(arg)?,
            "hf_unhide" => {
                self.show_hidden_frames = true;
                self.refresh_stack()?;
            }
            "hf_hide" => {
                self.show_hidden_frames = false;
                self.refresh_stack()?;
            }
            "hf_list" => self.do_hf_list()?,
            _ => unreachable!("command table out of sync"),
        }
        Ok(CmdOutcome::Stay)
    }

    fn do_help(&mut self, arg: &str) -> Result<()> {
        if arg.is_empty() {
            let names: Vec<&str> = COMMANDS.iter().map(|(c, _)| *c).collect();
            let mut out = self.out.borrow_mut();
            writeln!(out, "Documented commands (type help <topic>):")?;
            writeln!(out, "========================================")?;
            for chunk in names.chunks(6) {
                writeln!(out, "{}", chunk.join("  "))?;
            }
            writeln!(out)?;
            writeln!(out, "Miscellaneous help topics:")?;
            writeln!(out, "hidden_frames")?;
            return Ok(());
        }
        if arg == "hidden_frames" {
            writeln!(self.out(), "{}", HIDDEN_FRAMES_HELP)?;
            return Ok(());
        }
        let canonical = resolve_command(arg);
        let text = canonical.and_then(|c| {
            HELP.iter()
                .find(|(name, _)| *name == c)
                .map(|(_, text)| *text)
        });
        match text {
            Some(text) => writeln!(self.out(), "{}", text)?,
            None => writeln!(self.out(), "*** No help for '{}'", arg)?,
        }
        Ok(())
    }

    fn do_continue(&mut self, arg: &str) -> Result<CmdOutcome> {
        if !arg.is_empty() {
            self.report_error(&format!(
                "continue takes no argument here, got \"{}\" (breakpoints belong to the host)",
                arg
            ))?;
            return Ok(CmdOutcome::Stay);
        }
        self.sticky.skip_next_cls();
        Ok(CmdOutcome::Resume(Resume::Continue))
    }

    fn parse_count(&mut self, arg: &str) -> Result<Option<usize>> {
        if arg.is_empty() {
            return Ok(Some(1));
        }
        match arg.parse::<usize>() {
            Ok(n) => Ok(Some(n)),
            Err(_) => {
                writeln!(self.out(), "*** Expected a number, got \"{}\"", arg)?;
                Ok(None)
            }
        }
    }

    fn do_up(&mut self, arg: &str) -> Result<()> {
        let Some(n) = self.parse_count(arg)? else {
            return Ok(());
        };
        if self.curindex < n {
            writeln!(self.out(), "*** Oldest frame")?;
            return Ok(());
        }
        self.select_frame(self.curindex - n)
    }

    fn do_down(&mut self, arg: &str) -> Result<()> {
        let Some(n) = self.parse_count(arg)? else {
            return Ok(());
        };
        if self.curindex + n >= self.stack.len() {
            writeln!(self.out(), "*** Newest frame")?;
            return Ok(());
        }
        self.select_frame(self.curindex + n)
    }

    fn do_top(&mut self) -> Result<()> {
        if self.curindex == 0 {
            return self.report_error("Oldest frame");
        }
        self.select_frame(0)
    }

    fn do_bottom(&mut self) -> Result<()> {
        if self.curindex + 1 == self.stack.len() {
            return self.report_error("Newest frame");
        }
        self.select_frame(self.stack.len() - 1)
    }

    fn do_frame(&mut self, arg: &str) -> Result<()> {
        if arg.is_empty() {
            // Just show the frame, without sticky handling.
            return self.print_stack_entry_current();
        }
        let index: i64 = match arg.parse() {
            Ok(i) => i,
            Err(_) => {
                writeln!(self.out(), "*** Expected a number, got \"{}\"", arg)?;
                return Ok(());
            }
        };
        let len = self.stack.len() as i64;
        if index.abs() >= len {
            writeln!(self.out(), "*** Out of range")?;
            return Ok(());
        }
        let resolved = if index >= 0 { index } else { len + index };
        self.select_frame(resolved as usize)
    }

    fn do_where(&mut self) -> Result<()> {
        let rows: Vec<String> = self
            .stack
            .iter()
            .enumerate()
            .map(|(i, entry)| self.formatted_stack_entry(entry, Some(i)))
            .collect();
        let mut out = self.out.borrow_mut();
        for row in rows {
            writeln!(out, "{}", row)?;
        }
        Ok(())
    }

    fn do_hf_list(&mut self) -> Result<()> {
        let rows: Vec<String> = self
            .hidden
            .iter()
            .map(|entry| self.format_stack_entry(entry, Some("\n     ")))
            .collect();
        let mut out = self.out.borrow_mut();
        for row in rows {
            writeln!(out, "{}", row)?;
        }
        Ok(())
    }

    fn do_list(&mut self, arg: &str) -> Result<()> {
        let entry = self.current_entry();
        let Some(chunk) = self.source_chunk(&*entry.frame) else {
            writeln!(self.out(), "** Error: could not get source for this frame **")?;
            return Ok(());
        };
        let first = chunk.first_line;
        let last = first + chunk.lines.len().saturating_sub(1) as u32;
        let around = |line: u32| line.saturating_sub(5).max(first);

        let (start, explicit_end) = if arg.is_empty() {
            (self.list_lineno.unwrap_or_else(|| around(entry.line)), None)
        } else if arg == "." {
            (around(entry.line), None)
        } else if let Some((a, b)) = arg.split_once(',') {
            match (a.trim().parse::<u32>(), b.trim().parse::<u32>()) {
                (Ok(a), Ok(b)) => (a.max(first), Some(b)),
                _ => {
                    writeln!(self.out(), "*** Error in argument: {}", arg)?;
                    return Ok(());
                }
            }
        } else {
            match arg.trim().parse::<u32>() {
                Ok(n) => (around(n), None),
                Err(_) => {
                    writeln!(self.out(), "*** Error in argument: {}", arg)?;
                    return Ok(());
                }
            }
        };

        if start > last {
            writeln!(self.out(), "[EOF]")?;
            return Ok(());
        }
        let end = explicit_end.unwrap_or(start + 10).min(last).max(start);
        let lines =
            chunk.lines[(start - first) as usize..=(end - first) as usize].to_vec();
        let req = ListingRequest {
            lines,
            first_line: start,
            current_line: entry.line,
            exc_line: self.raise_lines.get(&entry.id()).copied(),
            print_markers: true,
            max_lines: None,
        };
        self.write_listing(&req)?;
        self.list_lineno = Some(end + 1);
        Ok(())
    }

    fn do_sticky(&mut self, arg: &str) -> Result<()> {
        let was_sticky = self.sticky.enabled;
        if !arg.is_empty() {
            let parts: Vec<&str> = arg.split_whitespace().collect();
            let range = if parts.len() == 2 {
                parts[0]
                    .parse::<u32>()
                    .ok()
                    .zip(parts[1].parse::<u32>().ok())
            } else {
                None
            };
            let Some((start, end)) = range else {
                writeln!(self.out(), "** Error when parsing argument: {} **", arg)?;
                return Ok(());
            };
            self.sticky.enabled = true;
            let frame_id = self.current_entry().id();
            self.sticky.ranges.insert(frame_id, (start, end + 1));
        } else {
            self.sticky.enabled = !self.sticky.enabled;
        }
        if !was_sticky && self.sticky.enabled {
            self.sticky.request_cls();
        }
        self.print_if_sticky()
    }

    fn do_display(&mut self, arg: &str) -> Result<()> {
        if arg.is_empty() {
            return self.report_error("display requires an expression");
        }
        let watched = match self.current_frame().eval(arg) {
            EvalOutcome::Value(v) => Watched::Value(v),
            EvalOutcome::Undefined | EvalOutcome::Nothing => Watched::Undefined,
            EvalOutcome::Error(e) => {
                self.report_eval_error(&e)?;
                return Ok(());
            }
        };
        let frame_id = self.current_entry().id();
        self.displays.add(frame_id, arg, watched);
        Ok(())
    }

    fn do_undisplay(&mut self, arg: &str) -> Result<()> {
        let frame_id = self.current_entry().id();
        if !self.displays.remove(frame_id, arg) {
            writeln!(self.out(), "** {} not in the display list **", arg)?;
        }
        Ok(())
    }

    pub(crate) fn do_p(&mut self, arg: &str) -> Result<()> {
        if let Some(value) = self.eval_reported(arg)? {
            let repr = value.repr();
            self.message(&repr)?;
        }
        Ok(())
    }

    pub(crate) fn do_pp(&mut self, arg: &str, width: Option<usize>) -> Result<()> {
        let Some(value) = self.eval_reported(arg)? else {
            return Ok(());
        };
        let width = width.unwrap_or_else(|| terminal_size().0);
        let pretty = value.pretty(width);
        self.message(&pretty)?;
        Ok(())
    }

    fn do_inspect(&mut self, arg: &str, with_source: bool) -> Result<()> {
        let Some(value) = self.eval_quiet(arg) else {
            return Ok(());
        };
        let rows = inspect_rows(arg, &value);
        {
            let mut out = self.out.borrow_mut();
            for (key, text) in rows {
                let formatted_key = format!("{}:", key).as_str().red().to_string();
                let pad = 28usize.saturating_sub(visible_len(&formatted_key));
                let mut value_text = String::new();
                let mut lines = text.lines();
                if let Some(head) = lines.next() {
                    value_text.push_str(head);
                }
                for line in lines {
                    value_text.push('\n');
                    value_text.push_str(&" ".repeat(16));
                    value_text.push_str(line);
                }
                writeln!(out, "{}{} {}", formatted_key, " ".repeat(pad), value_text)?;
            }
        }

        if with_source {
            let header = "Source:".red().to_string();
            match value.position().and_then(|p| p.lines.map(|l| (p.first_line, l))) {
                None => writeln!(self.out(), "{} -", header)?,
                Some((first_line, lines)) => {
                    writeln!(self.out(), "{}", header)?;
                    let req = ListingRequest {
                        lines,
                        first_line,
                        current_line: 0,
                        exc_line: None,
                        print_markers: false,
                        max_lines: None,
                    };
                    self.write_listing(&req)?;
                }
            }
        }
        Ok(())
    }

    fn do_source(&mut self, arg: &str) -> Result<()> {
        let value = match self.current_frame().eval(arg) {
            EvalOutcome::Value(v) => v,
            EvalOutcome::Nothing | EvalOutcome::Undefined => {
                self.report_error(&format!("failed to eval: {}", arg))?;
                return Ok(());
            }
            EvalOutcome::Error(e) => {
                self.report_error(&format!("failed to eval: {}", e.summary))?;
                return Ok(());
            }
        };
        let Some(ObjectPosition {
            first_line,
            lines: Some(lines),
            ..
        }) = value.position()
        else {
            self.report_error("could not get source for this object")?;
            return Ok(());
        };
        let req = ListingRequest {
            lines,
            first_line,
            current_line: 0,
            exc_line: None,
            print_markers: false,
            max_lines: None,
        };
        self.write_listing(&req)
    }

    fn do_edit(&mut self, arg: &str) -> Result<()> {
        let position = if arg.is_empty() {
            let entry = self.current_entry();
            Some((entry.frame.location().filename, entry.line))
        } else {
            self.position_for_arg(arg)
        };
        let Some((filename, lineno)) = position else {
            return self.report_error("could not parse filename/lineno");
        };
        match self.editor_command(&filename, lineno) {
            Ok(cmd) => {
                if let Err(e) = open_editor(&cmd) {
                    self.report_error(&e.to_string())?;
                }
            }
            Err(e) => self.report_error(&e.to_string())?,
        }
        Ok(())
    }

    fn position_for_arg(&self, arg: &str) -> Option<(String, u32)> {
        if let Some(value) = self.eval_quiet(arg) {
            if let Some(pos) = value.position() {
                return Some((pos.filename, pos.first_line));
            }
        }
        if let Some((file, line)) = arg.rsplit_once(':') {
            if let Ok(line) = line.parse::<u32>() {
                return Some((file.to_string(), line));
            }
        }
        Some((arg.to_string(), 1))
    }

    fn editor_command(&self, filename: &str, lineno: u32) -> Result<String> {
        let editor = self
            .config
            .editor
            .clone()
            .or_else(|| std::env::var("EDITOR").ok().filter(|e| !e.is_empty()))
            .or_else(|| which::which("vim").ok().map(|p| p.display().to_string()))
            .or_else(|| which::which("vi").ok().map(|p| p.display().to_string()))
            .ok_or(crate::Error::EditorNotFound)?;
        Ok(format_edit_command(&editor, filename, lineno))
    }

    /// Enter a nested session stepping through `arg`. The nested session
    /// temporarily becomes the global one, so breakpoints inside the traced
    /// expression land in it.
    fn do_debug(&mut self, arg: &str) -> Result<()> {
        if arg.is_empty() {
            return self.report_error("debug requires an expression");
        }
        let Some(tracer) = self.tracer() else {
            return self.report_error("recursive debugging requires an attached tracer");
        };
        let frame = self.current_frame();

        let prev_global = self.registry.take_global_slot();
        let builder = SessionBuilder::new()
            .config(self.config.clone())
            .profile(self.profile_name().to_string())
            .output(self.output_sink())
            .reader(self.reader.clone())
            .use_global(false)
            .set_global(true)
            .tracer(tracer.clone());
        let nested = match self.registry.acquire(builder) {
            Acquired::Enhanced(session) => session,
            Acquired::Plain(_) => {
                self.registry.swap_global(prev_global);
                return self.report_error("could not construct nested session");
            }
        };
        {
            let mut n = nested.borrow_mut();
            let prompt = format!("({}) ", self.prompt().trim());
            n.set_prompt(&prompt);
            n.set_reuse_alias(Some(self.profile_name().to_string()));
        }

        self.message("ENTERING RECURSIVE DEBUGGER")?;
        if self.sticky.enabled {
            let messages = self.sticky.take_messages();
            let mut out = self.out.borrow_mut();
            for msg in messages {
                writeln!(out, "{}", msg)?;
            }
        }

        let run_result = tracer.borrow_mut().run_traced(arg, &frame, &mut |stop| {
            Session::interaction(&nested, stop).unwrap_or(Resume::Quit)
        });
        self.registry.swap_global(prev_global);
        if let Err(e) = run_result {
            self.report_error(&e)?;
        }
        self.message("LEAVING RECURSIVE DEBUGGER")?;

        // The nested loop tore down the shared reader's completer; put ours
        // back for the rest of this interaction.
        if let Some(merger) = self.merger.clone() {
            self.reader.clone().borrow_mut().install_completer(merger);
        }
        Ok(())
    }
}

/// Expand an editor command template
///
/// Recognizes `{filename}`/`{lineno}` and `%s`/`%d` (with `%%` escaping);
/// anything else gets the classic `editor +lineno filename` form.
pub(crate) fn format_edit_command(editor: &str, filename: &str, lineno: u32) -> String {
    let quoted = shlex::try_quote(filename)
        .map(|q| q.into_owned())
        .unwrap_or_else(|_| filename.to_string());
    if editor.contains("{filename}") {
        return editor
            .replace("{filename}", &quoted)
            .replace("{lineno}", &lineno.to_string());
    }
    if editor.contains("%s") {
        return editor
            .replace("%%", "%")
            .replace("%s", &quoted)
            .replace("%d", &lineno.to_string());
    }
    format!("{} +{} {}", editor, lineno, quoted)
}

/// Launch the editor through the shell and wait for it to finish
fn open_editor(cmd: &str) -> Result<()> {
    #[cfg(unix)]
    let status = std::process::Command::new("sh").arg("-c").arg(cmd).status();
    #[cfg(windows)]
    let status = std::process::Command::new("cmd").args(["/C", cmd]).status();
    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(crate::Error::Editor(format!(
            "editor exited with {}",
            status
        ))),
        Err(e) => Err(crate::Error::Editor(e.to_string())),
    }
}

fn inspect_rows(arg: &str, value: &ValueRef) -> Vec<(&'static str, String)> {
    let mut rows: Vec<(&'static str, String)> = Vec::new();
    rows.push(("Type", value.type_name()));
    rows.push(("String Form", value.str_form().trim().to_string()));
    if let Some(len) = value.len() {
        rows.push(("Length", len.to_string()));
    }
    if let Some(pos) = value.position() {
        rows.push(("File", format!("{}:{}", pos.filename, pos.first_line)));
    }
    if let Some(sig) = value.signature() {
        rows.push(("Definition", format!("{}{}", arg, sig)));
    }
    if let Some(doc) = value.doc() {
        if !doc.is_empty() {
            rows.push(("Docstring", doc));
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_aliases() {
        assert_eq!(resolve_command("ll"), Some("longlist"));
        assert_eq!(resolve_command("bt"), Some("where"));
        assert_eq!(resolve_command("r"), Some("return"));
        assert_eq!(resolve_command("nosuch"), None);
    }

    #[test]
    fn test_command_names_contains_aliases() {
        let names = command_names();
        assert!(names.iter().any(|n| n == "sticky"));
        assert!(names.iter().any(|n| n == "u"));
        assert!(names.iter().any(|n| n == "hf_list"));
    }

    #[test]
    fn test_edit_command_templates() {
        assert_eq!(
            format_edit_command("emacsclient {filename} -l {lineno}", "a.rs", 7),
            "emacsclient a.rs -l 7"
        );
        assert_eq!(
            format_edit_command("vim +%d %s", "my file.rs", 3),
            "vim +3 'my file.rs'"
        );
        assert_eq!(format_edit_command("nano", "a.rs", 12), "nano +12 a.rs");
    }

    #[test]
    fn test_edit_command_escapes_percent() {
        assert_eq!(
            format_edit_command("ed %% %s", "a.rs", 1),
            "ed % a.rs"
        );
    }
}
