//! Terminal rendering: colors, source listings, sticky mode
//!
//! Syntax highlighting itself is a host capability; absence degrades to
//! plain text.

pub mod color;
pub mod listing;
pub mod sticky;

/// Clear screen and move the cursor home
pub const CLEARSCREEN: &str = "\x1b[2J\x1b[1;1H";

/// Optional source highlighting capability
pub trait Highlighter {
    /// Render source text, typically with ANSI escapes
    fn highlight(&self, src: &str) -> String;
}

/// Terminal size as (width, height), with an (80, 24) fallback
pub fn terminal_size() -> (usize, usize) {
    if let Ok((w, h)) = crossterm::terminal::size() {
        if w != 0 && h != 0 {
            return (w as usize, h as usize);
        }
    }
    let from_env = |name: &str| {
        std::env::var(name)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n != 0)
    };
    (
        from_env("COLUMNS").unwrap_or(80),
        from_env("LINES").unwrap_or(24),
    )
}
