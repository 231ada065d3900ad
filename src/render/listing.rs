//! Source listing with a bounded line window
//!
//! Shared between `longlist` and the sticky view: the same truncation
//! policy decides which lines survive when the source does not fit the
//! budget, keeping decorator/lambda headers and placing the current-line
//! marker inside the first two thirds of the window.

use super::color::{set_sgr_over, sgr, truncate_visible, visible_len};
use super::Highlighter;

/// Style knobs shared by every listing
pub struct ListingStyle<'a> {
    pub highlight: bool,
    pub line_number_color: &'a str,
    /// SGR code for the current-line bar; `None` disables the bar
    pub current_line_color: Option<&'a str>,
    pub truncate_long_lines: bool,
    pub width: usize,
}

/// One listing request
pub struct ListingRequest {
    /// Source lines without trailing newlines
    pub lines: Vec<String>,
    /// Line number of `lines[0]`
    pub first_line: u32,
    pub current_line: u32,
    /// Line the exception raised at, when different from current
    pub exc_line: Option<u32>,
    /// Annotate `->`/`>>` markers (off for plain `source` output)
    pub print_markers: bool,
    /// Visible line budget; `None` means unbounded
    pub max_lines: Option<usize>,
}

/// Smallest window ever shown, regardless of the requested budget
const MIN_WINDOW: usize = 6;

fn format_line(
    lineno: u32,
    marker: &str,
    line: &str,
    lineno_width: usize,
    style: &ListingStyle<'_>,
) -> String {
    let mut num = format!("{:>width$}", lineno, width = lineno_width);
    if style.highlight {
        num = sgr(style.line_number_color, &num);
    }
    format!("{}  {:>2} {}", num, marker, line)
}

/// Header lines worth keeping at the top of a cut listing: decorators and
/// lambda definitions. The enclosing function name is already in the stack
/// entry above the listing.
fn is_header_line(line: &str) -> bool {
    let plain = super::color::strip_escapes(line);
    let trimmed = plain.trim_start();
    if trimmed.starts_with('@') {
        return true;
    }
    let bytes = plain.as_bytes();
    let mut search = 0;
    while let Some(found) = plain[search..].find("lambda") {
        let start = search + found;
        let end = start + "lambda".len();
        let prev_ok = start == 0
            || !(bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_');
        let next_ok = plain[end..]
            .chars()
            .next()
            .is_some_and(|c| c == ':' || c.is_whitespace());
        if prev_ok && next_ok {
            return true;
        }
        search = end;
    }
    false
}

/// Select which lines survive the budget
///
/// Returns (line number, text) pairs; ellipsis rows carry `None`.
fn cut_lines<'a>(
    lines: &'a [String],
    first_line: u32,
    max_lines: Option<usize>,
    current_line: u32,
    exc_line: Option<u32>,
) -> Vec<(Option<u32>, &'a str)> {
    let budget = max_lines.unwrap_or(lines.len()).max(MIN_WINDOW);
    let mut out: Vec<(Option<u32>, &str)> = Vec::new();

    if lines.len() <= budget {
        for (i, line) in lines.iter().enumerate() {
            out.push((Some(first_line + i as u32), line));
        }
        return out;
    }

    let mut cutoff = (lines.len() - budget) as i64;

    let mut keep_head = 0;
    while keep_head < lines.len() && is_header_line(&lines[keep_head]) {
        keep_head += 1;
    }

    if keep_head > 3 {
        out.push((Some(first_line), &lines[0]));
        out.push((None, "..."));
        out.push((Some(first_line + keep_head as u32 - 1), &lines[keep_head - 1]));
        cutoff -= keep_head as i64 - 3;
    } else {
        for (i, line) in lines.iter().enumerate().take(keep_head) {
            out.push((Some(first_line + i as u32), line));
        }
    }
    cutoff = cutoff.max(0);

    // Marker offset from the first body line (the cut region starts after
    // the kept header).
    let last_marker =
        current_line.max(exc_line.unwrap_or(0)) as i64 - first_line as i64 - keep_head as i64;

    // Place the marker line within the first two thirds of the body window
    // (what remains of the budget once the header rows are paid for).
    let head_rows = keep_head.min(3) as i64;
    let budget = (budget as i64 - head_rows).max(1);
    let mut cut_before = cutoff.min((last_marker - budget + budget / 3 * 2).max(0));
    let mut cut_after = cutoff - cut_before;

    // Account for the '...' rows at each cut that removes anything.
    if cut_after > 0 {
        cut_after += 1;
    }
    if cut_before > 0 {
        cut_before += 1;
    }

    for (i, line) in lines.iter().enumerate().skip(keep_head) {
        if cut_before > 0 {
            cut_before -= 1;
            if cut_before == 0 {
                out.push((None, "..."));
            }
            continue;
        }
        if cut_after > 0 && i >= lines.len() - cut_after as usize {
            out.push((None, "..."));
            break;
        }
        out.push((Some(first_line + i as u32), line));
    }

    out
}

/// Render a listing to display rows
pub fn render_lines(
    req: &ListingRequest,
    style: &ListingStyle<'_>,
    highlighter: Option<&dyn Highlighter>,
) -> Vec<String> {
    let mut lines: Vec<String> = req
        .lines
        .iter()
        .map(|l| l.replace('\t', "    "))
        .collect();

    if let Some(h) = highlighter {
        let src = lines.join("\n");
        lines = h.highlight(&src).lines().map(str::to_string).collect();
    }

    if style.truncate_long_lines {
        let maxlength = style.width.saturating_sub(9).max(16);
        lines = lines
            .iter()
            .map(|l| truncate_visible(l, maxlength))
            .collect();
    }

    let lineno_width = (req.first_line as usize + lines.len()).to_string().len();
    let mut out = Vec::new();

    if req.print_markers {
        let bar = if style.highlight {
            style.current_line_color
        } else {
            None
        };
        for (line_no, line) in cut_lines(
            &lines,
            req.first_line,
            req.max_lines,
            req.current_line,
            req.exc_line,
        ) {
            let Some(n) = line_no else {
                out.push(line.to_string());
                continue;
            };
            let marker = if n == req.current_line {
                "->"
            } else if Some(n) == req.exc_line {
                ">>"
            } else {
                ""
            };
            let mut formatted = format_line(n, marker, line, lineno_width, style);
            if marker == "->" {
                if let Some(code) = bar {
                    let pad = style.width.saturating_sub(visible_len(&formatted));
                    formatted.push_str(&" ".repeat(pad));
                    formatted = set_sgr_over(&formatted, code);
                }
            }
            out.push(formatted);
        }
    } else {
        for (i, line) in lines.iter().enumerate() {
            out.push(format_line(
                req.first_line + i as u32,
                "",
                line,
                lineno_width,
                style,
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_style() -> ListingStyle<'static> {
        ListingStyle {
            highlight: false,
            line_number_color: "36;01",
            current_line_color: None,
            truncate_long_lines: false,
            width: 80,
        }
    }

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {}", i + 1)).collect()
    }

    fn request(lines: Vec<String>, current: u32, max_lines: Option<usize>) -> ListingRequest {
        ListingRequest {
            lines,
            first_line: 1,
            current_line: current,
            exc_line: None,
            print_markers: true,
            max_lines,
        }
    }

    #[test]
    fn test_small_source_is_uncut() {
        // Budgets below the minimum window are clamped; four lines fit.
        let rows = render_lines(&request(numbered(4), 2, Some(2)), &plain_style(), None);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| !r.contains("...")));
        assert!(rows[1].contains("->"));
    }

    #[test]
    fn test_cut_source_keeps_minimum_window() {
        let rows = render_lines(&request(numbered(12), 5, Some(2)), &plain_style(), None);
        assert!(rows.len() >= MIN_WINDOW);
        assert!(rows.iter().any(|r| r.trim() == "..."));
        assert!(rows.iter().any(|r| r.contains("->")));
    }

    #[test]
    fn test_single_ellipsis_per_cut_side() {
        let rows = render_lines(&request(numbered(30), 15, Some(10)), &plain_style(), None);
        let ellipses = rows.iter().filter(|r| r.trim() == "...").count();
        assert!(ellipses >= 1 && ellipses <= 2);
    }

    #[test]
    fn test_marker_lands_in_first_two_thirds() {
        let rows = render_lines(&request(numbered(60), 50, Some(12)), &plain_style(), None);
        let marker_row = rows.iter().position(|r| r.contains("->")).unwrap();
        assert!(marker_row <= rows.len() * 2 / 3);
    }

    #[test]
    fn test_exception_marker() {
        let mut req = request(numbered(8), 3, None);
        req.exc_line = Some(6);
        let rows = render_lines(&req, &plain_style(), None);
        assert!(rows[2].contains("->"));
        assert!(rows[5].contains(">>"));
    }

    #[test]
    fn test_long_decorator_header_collapses() {
        let mut lines: Vec<String> = (0..5).map(|i| format!("@decorator_{}", i)).collect();
        lines.extend(numbered(20));
        let req = ListingRequest {
            lines,
            first_line: 10,
            current_line: 20,
            exc_line: None,
            print_markers: true,
            max_lines: Some(8),
        };
        let rows = render_lines(&req, &plain_style(), None);
        // First decorator, ellipsis, last decorator.
        assert!(rows[0].contains("@decorator_0"));
        assert_eq!(rows[1].trim(), "...");
        assert!(rows[2].contains("@decorator_4"));
    }

    #[test]
    fn test_short_decorator_header_shown_verbatim() {
        let mut lines: Vec<String> = (0..2).map(|i| format!("@decorator_{}", i)).collect();
        lines.extend(numbered(20));
        let req = ListingRequest {
            lines,
            first_line: 1,
            current_line: 10,
            exc_line: None,
            print_markers: true,
            max_lines: Some(8),
        };
        let rows = render_lines(&req, &plain_style(), None);
        assert!(rows[0].contains("@decorator_0"));
        assert!(rows[1].contains("@decorator_1"));
    }

    #[test]
    fn test_marker_survives_a_kept_header() {
        let mut lines: Vec<String> = (0..5).map(|i| format!("@decorator_{}", i)).collect();
        lines.extend(numbered(20));
        let req = ListingRequest {
            lines,
            first_line: 10,
            current_line: 20,
            exc_line: None,
            print_markers: true,
            max_lines: Some(8),
        };
        let rows = render_lines(&req, &plain_style(), None);
        assert!(rows.iter().any(|r| r.contains("->")), "rows: {rows:#?}");
    }

    #[test]
    fn test_lambda_counts_as_header() {
        assert!(is_header_line("f = lambda x: x"));
        assert!(!is_header_line("not_a_lambdax thing"));
        assert!(!is_header_line("mylambda = 3"));
    }

    #[test]
    fn test_unmarked_listing_numbers_sequentially() {
        let mut req = request(numbered(3), 2, None);
        req.print_markers = false;
        req.first_line = 7;
        let rows = render_lines(&req, &plain_style(), None);
        assert!(rows[0].starts_with(" 7"));
        assert!(rows[2].starts_with(" 9"));
        assert!(rows.iter().all(|r| !r.contains("->")));
    }

    #[test]
    fn test_truncation_respects_width() {
        let style = ListingStyle {
            truncate_long_lines: true,
            width: 30,
            ..plain_style()
        };
        let long = "x".repeat(100);
        let rows = render_lines(&request(vec![long], 1, None), &style, None);
        assert!(visible_len(&rows[0]) <= 30);
    }
}
