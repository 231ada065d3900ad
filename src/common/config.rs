//! Configuration file handling

use serde::Deserialize;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
///
/// Every field has a default so a missing or partial config file works.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prompt text; a `++` is enforced on assignment (see Session::set_prompt)
    pub prompt: String,

    /// Colorize stack entries, line numbers and the current-line bar
    pub highlight: bool,

    /// Enter sticky mode on the first stop
    pub sticky_by_default: bool,

    /// Encodings tried, in order, when decoding host-supplied source bytes
    pub encodings: Vec<String>,

    /// Editor command template; autodetected from $EDITOR when unset.
    /// Recognizes `{filename}`/`{lineno}` or `%s`/`%d` placeholders.
    pub editor: Option<String>,

    /// Truncate source lines to the terminal width
    pub truncate_long_lines: bool,

    /// Honor hide predicates at all
    pub enable_hidden_frames: bool,

    /// Append "N frames hidden" to the displayed context
    pub show_hidden_frames_count: bool,

    /// SGR code for line numbers
    pub line_number_color: String,

    /// SGR code for filenames in stack entries
    pub filename_color: String,

    /// SGR code for the current-line bar in sticky mode
    pub current_line_color: String,

    /// Dump a pruned evaluation traceback after `***` error lines
    pub show_traceback_on_error: bool,

    /// Frame-count limit for the evaluation traceback dump
    pub show_traceback_on_error_limit: Option<usize>,

    /// Module-name patterns whose frames are hidden (substring match)
    pub skip_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prompt: "(Dsh++) ".to_string(),
            highlight: true,
            sticky_by_default: false,
            encodings: vec!["utf-8".to_string(), "latin-1".to_string()],
            editor: None,
            truncate_long_lines: true,
            enable_hidden_frames: true,
            show_hidden_frames_count: true,
            line_number_color: "36;01".to_string(),
            filename_color: "33;01".to_string(),
            current_line_color: "39;49;7".to_string(),
            show_traceback_on_error: true,
            show_traceback_on_error_limit: None,
            skip_patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if the file doesn't exist. Environment
    /// overrides are applied in both cases.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| super::Error::file_read(&path.display().to_string(), e))?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Apply environment variable overrides
    ///
    /// `DEBUG_SHELL_COLORS=0|1` forces highlighting off or on.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("DEBUG_SHELL_COLORS") {
            self.highlight = val.trim() != "0";
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.prompt.contains("++"));
        assert!(config.enable_hidden_frames);
        assert_eq!(config.encodings, vec!["utf-8", "latin-1"]);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("sticky_by_default = true").unwrap();
        assert!(config.sticky_by_default);
        assert!(config.truncate_long_lines);
        assert_eq!(config.prompt, "(Dsh++) ");
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let config: Config = toml::from_str("no_such_option = 1\nhighlight = false").unwrap();
        assert!(!config.highlight);
    }

    #[test]
    fn test_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "prompt = \"(debug++) \"\nskip_patterns = [\"bootstrap\"]\n",
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.prompt, "(debug++) ");
        assert_eq!(config.skip_patterns, vec!["bootstrap"]);
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "highlight = maybe").unwrap();
        assert!(Config::from_file(&path).is_err());
    }
}
