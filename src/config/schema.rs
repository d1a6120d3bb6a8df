//! Typed configuration schema
//!
//! Every configuration source is first read into a `toml::Table`. This module
//! turns such tables into typed values: [`PartialConfig`] checks the key set
//! and value types of a single source, [`Config`] is the fully resolved engine
//! configuration with range validation.

use serde::{Deserialize, Serialize};
use toml::{Table, Value};

// Serde default functions
fn default_width() -> usize {
    80
}
fn default_tab_width() -> usize {
    8
}
fn default_max_blank_lines() -> usize {
    2
}
fn default_true() -> bool {
    true
}
fn default_comment_prefix() -> String {
    ";".to_string()
}

/// Resolved configuration for the formatting engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Maximum line width used when wrapping comments (default: 80)
    #[serde(default = "default_width")]
    pub width: usize,

    /// Columns per tab stop when expanding leading tabs (default: 8)
    #[serde(default = "default_tab_width")]
    pub tab_width: usize,

    /// Expand tabs in leading whitespace (default: true)
    #[serde(default = "default_true", rename = "expand-tabs?")]
    pub expand_tabs: bool,

    /// Remove trailing whitespace (default: true)
    #[serde(default = "default_true", rename = "trim-trailing?")]
    pub trim_trailing: bool,

    /// Longest allowed run of blank lines (default: 2)
    #[serde(default = "default_max_blank_lines")]
    pub max_blank_lines: usize,

    /// End non-empty output with exactly one newline (default: true)
    #[serde(default = "default_true", rename = "final-newline?")]
    pub final_newline: bool,

    /// Reject input with unbalanced brackets (default: true)
    #[serde(default = "default_true", rename = "check-balance?")]
    pub check_balance: bool,

    /// Wrap comment-only lines longer than `width` (default: false)
    #[serde(default, rename = "wrap-comments?")]
    pub wrap_comments: bool,

    /// Line comment marker (default: ";")
    #[serde(default = "default_comment_prefix")]
    pub comment_prefix: String,

    /// Named style last applied, informational once expanded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            width: default_width(),
            tab_width: default_tab_width(),
            expand_tabs: true,
            trim_trailing: true,
            max_blank_lines: default_max_blank_lines(),
            final_newline: true,
            check_balance: true,
            wrap_comments: false,
            comment_prefix: default_comment_prefix(),
            style: None,
        }
    }
}

/// Nested `:cache` operational options
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheOptions {
    pub directory: Option<String>,
    pub location: Option<String>,
}

/// Nested `:url` operational options
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct UrlOptions {
    pub cache_dir: Option<String>,
    pub cache_secs: Option<u64>,
}

/// Shape check for a single configuration source
///
/// All fields are `Option<T>` so a source only has to mention the keys it
/// sets. Unknown keys and mistyped values are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialConfig {
    pub width: Option<usize>,
    pub tab_width: Option<usize>,
    #[serde(rename = "expand-tabs?")]
    pub expand_tabs: Option<bool>,
    #[serde(rename = "trim-trailing?")]
    pub trim_trailing: Option<bool>,
    pub max_blank_lines: Option<usize>,
    #[serde(rename = "final-newline?")]
    pub final_newline: Option<bool>,
    #[serde(rename = "check-balance?")]
    pub check_balance: Option<bool>,
    #[serde(rename = "wrap-comments?")]
    pub wrap_comments: Option<bool>,
    pub comment_prefix: Option<String>,
    pub style: Option<String>,

    // Operational options
    pub cache: Option<CacheOptions>,
    #[serde(rename = "cwd-rc?")]
    pub cwd_rc: Option<bool>,
    #[serde(rename = "search-config?")]
    pub search_config: Option<bool>,
    #[serde(rename = "parallel?")]
    pub parallel: Option<bool>,
    pub jobs: Option<usize>,
    pub url: Option<UrlOptions>,
}

impl PartialConfig {
    /// Check the keys and value types of a source table
    pub fn from_table(table: &Table) -> Result<Self, String> {
        Value::Table(table.clone())
            .try_into::<PartialConfig>()
            .map_err(|e| e.to_string().trim().to_string())
    }
}

/// Built-in named styles
const STYLES: &[&str] = &["standard", "compact", "wide"];

/// Look up the option map of a named style
#[must_use]
pub fn style_table(name: &str) -> Option<Table> {
    let mut table = Table::new();
    match name {
        "standard" => {}
        "compact" => {
            table.insert("max-blank-lines".to_string(), Value::Integer(1));
        }
        "wide" => {
            table.insert("width".to_string(), Value::Integer(120));
        }
        _ => return None,
    }
    Some(table)
}

/// Names of the built-in styles, for diagnostics
#[must_use]
pub fn style_names() -> &'static [&'static str] {
    STYLES
}

impl Config {
    /// Minimum reasonable width
    const MIN_WIDTH: usize = 20;
    /// Maximum reasonable width
    const MAX_WIDTH: usize = 1000;
    /// Maximum tab width
    const MAX_TAB_WIDTH: usize = 16;
    /// Maximum run of blank lines
    const MAX_BLANK_LINES: usize = 100;

    /// Validate configuration values are within reasonable bounds
    ///
    /// Returns an error message if validation fails, None if valid.
    #[must_use]
    pub fn validate(&self) -> Option<String> {
        if self.width < Self::MIN_WIDTH {
            return Some(format!(
                "width {} is below minimum of {}",
                self.width,
                Self::MIN_WIDTH
            ));
        }
        if self.width > Self::MAX_WIDTH {
            return Some(format!(
                "width {} exceeds maximum of {}",
                self.width,
                Self::MAX_WIDTH
            ));
        }
        if self.tab_width == 0 || self.tab_width > Self::MAX_TAB_WIDTH {
            return Some(format!(
                "tab-width {} must be between 1 and {}",
                self.tab_width,
                Self::MAX_TAB_WIDTH
            ));
        }
        if self.max_blank_lines > Self::MAX_BLANK_LINES {
            return Some(format!(
                "max-blank-lines {} exceeds maximum of {}",
                self.max_blank_lines,
                Self::MAX_BLANK_LINES
            ));
        }
        if self.comment_prefix.trim().is_empty() {
            return Some("comment-prefix must not be blank".to_string());
        }
        None
    }

    /// Build the engine configuration from a merged settings table
    ///
    /// Keys outside the engine's concern (operational options) are ignored.
    pub fn from_table(table: &Table) -> Result<Self, String> {
        let engine: Table = table
            .iter()
            .filter(|(k, _)| !super::OP_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let config: Config = Value::Table(engine)
            .try_into()
            .map_err(|e: toml::de::Error| e.to_string().trim().to_string())?;
        match config.validate() {
            Some(error) => Err(error),
            None => Ok(config),
        }
    }

    /// The default configuration as a table
    #[must_use]
    pub fn default_table() -> Table {
        match Value::try_from(Config::default()) {
            Ok(Value::Table(table)) => table,
            _ => Table::new(),
        }
    }
}
