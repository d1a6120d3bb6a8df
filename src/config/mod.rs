//! Configuration management for tidyfmt.
//!
//! Configuration is a value, never a process-wide object. [`Settings`] holds
//! the merged option map plus the provenance of every top-level key, and each
//! change returns a new `Settings`. [`OpOptions`] is the subset of keys that
//! govern how the tool runs rather than how text is formatted.
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - `~/.tidyfmtrc` (or `~/.tidyfmt.toml`)
//! - the nearest `.tidyfmtrc` above the working directory (`:search-config?`)
//!   or the one in it (`:cwd-rc?`)
//! - the `TIDYFMT_OPTIONS` environment variable
//! - options given on the command line

pub mod explain;
pub mod loader;
pub mod remote;
pub mod schema;

use std::collections::BTreeMap;
use std::path::PathBuf;

use toml::{Table, Value};

use crate::error::ConfigError;

pub use explain::explain_report;
pub use loader::RcConfig;
pub use remote::{RemoteLoader, UrlLoader};
pub use schema::{style_table, Config, PartialConfig};

/// Keys that make up the operational options
pub const OP_KEYS: &[&str] = &[
    "cache",
    "cwd-rc?",
    "search-config?",
    "parallel?",
    "jobs",
    "url",
];

/// Provenance label for options given as program arguments
pub const COMMAND_LINE: &str = "command line";

/// Merge `overlay` into `base`
///
/// Last write wins per key, nested tables are merged recursively.
pub fn deep_merge(base: &mut Table, overlay: &Table) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Operational options: a map over the closed key set [`OP_KEYS`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpOptions {
    table: Table,
}

impl OpOptions {
    /// Default cache directory name, relative to the cache location
    const CACHE_DIRECTORY: &'static str = ".tidyfmt";
    /// Default URL cache directory, relative to the cache directory
    const URL_CACHE_DIR: &'static str = "urlcache";
    /// Default lifetime of a cached URL body
    const URL_CACHE_SECS: u64 = 300;

    /// Keep only the operational keys of `table`
    #[must_use]
    pub fn extract(table: &Table) -> Self {
        let table = table
            .iter()
            .filter(|(k, _)| OP_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        OpOptions { table }
    }

    /// Merge `other` on top of these options
    #[must_use]
    pub fn merge(&self, other: &OpOptions) -> Self {
        let mut table = self.table.clone();
        deep_merge(&mut table, &other.table);
        OpOptions { table }
    }

    #[must_use]
    pub fn as_table(&self) -> &Table {
        &self.table
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The defaults, as they appear in a full settings table
    #[must_use]
    pub fn default_table() -> Table {
        let mut cache = Table::new();
        cache.insert(
            "directory".to_string(),
            Value::String(Self::CACHE_DIRECTORY.to_string()),
        );
        cache.insert("location".to_string(), Value::String("HOME".to_string()));
        let mut url = Table::new();
        url.insert(
            "cache-dir".to_string(),
            Value::String(Self::URL_CACHE_DIR.to_string()),
        );
        url.insert(
            "cache-secs".to_string(),
            Value::Integer(i64::try_from(Self::URL_CACHE_SECS).unwrap_or(i64::MAX)),
        );

        let mut table = Table::new();
        table.insert("cache".to_string(), Value::Table(cache));
        table.insert("cwd-rc?".to_string(), Value::Boolean(false));
        table.insert("search-config?".to_string(), Value::Boolean(false));
        table.insert("parallel?".to_string(), Value::Boolean(true));
        table.insert("jobs".to_string(), Value::Integer(0));
        table.insert("url".to_string(), Value::Table(url));
        table
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.table
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    fn nested(&self, key: &str, field: &str) -> Option<&Value> {
        self.table.get(key)?.as_table()?.get(field)
    }

    /// Look for `.tidyfmtrc` in the working directory
    #[must_use]
    pub fn cwd_rc(&self) -> bool {
        self.flag("cwd-rc?", false)
    }

    /// Search the working directory and its parents for `.tidyfmtrc`
    #[must_use]
    pub fn search_config(&self) -> bool {
        self.flag("search-config?", false)
    }

    /// Format multiple files on a worker pool
    #[must_use]
    pub fn parallel(&self) -> bool {
        self.flag("parallel?", true)
    }

    /// Worker count; 0 means one per CPU
    #[must_use]
    pub fn jobs(&self) -> usize {
        self.table
            .get("jobs")
            .and_then(Value::as_integer)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0)
    }

    /// Directory holding cached URL bodies
    ///
    /// `:cache :location` names an environment variable holding the base
    /// directory; `HOME` falls back to the platform home directory.
    #[must_use]
    pub fn url_cache_path(&self) -> Option<PathBuf> {
        let location = self
            .nested("cache", "location")
            .and_then(Value::as_str)
            .unwrap_or("HOME");
        let base = std::env::var_os(location)
            .map(PathBuf::from)
            .or_else(|| (location == "HOME").then(dirs::home_dir).flatten())?;
        let directory = self
            .nested("cache", "directory")
            .and_then(Value::as_str)
            .unwrap_or(Self::CACHE_DIRECTORY);
        let cache_dir = self
            .nested("url", "cache-dir")
            .and_then(Value::as_str)
            .unwrap_or(Self::URL_CACHE_DIR);
        Some(base.join(directory).join(cache_dir))
    }

    /// Seconds a cached URL body stays fresh
    #[must_use]
    pub fn url_cache_secs(&self) -> u64 {
        self.nested("url", "cache-secs")
            .and_then(Value::as_integer)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(Self::URL_CACHE_SECS)
    }
}

/// Merged configuration with provenance
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    table: Table,
    set_by: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Settings {
    /// Built-in defaults for every key
    #[must_use]
    pub fn defaults() -> Self {
        let mut table = Config::default_table();
        deep_merge(&mut table, &OpOptions::default_table());
        Settings {
            table,
            set_by: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn as_table(&self) -> &Table {
        &self.table
    }

    /// Source that last set `key`, or `None` for a default value
    #[must_use]
    pub fn set_by(&self, key: &str) -> Option<&str> {
        self.set_by.get(key).map(String::as_str)
    }

    /// Operational options contained in these settings
    #[must_use]
    pub fn op_options(&self) -> OpOptions {
        OpOptions::extract(&self.table)
    }

    /// Typed engine configuration
    pub fn config(&self) -> Result<Config, ConfigError> {
        Config::from_table(&self.table).map_err(|e| ConfigError::Validation(vec![e]))
    }

    /// Apply one configuration map on top of these settings
    ///
    /// A `:style` key is expanded before the other keys of the same map. The
    /// result is validated as a whole; on error `self` is left as it was.
    pub fn apply(&self, map: &Table, source: &str) -> Result<Settings, ConfigError> {
        let fail = |detail: String| ConfigError::Apply {
            source_label: source.to_string(),
            detail,
        };

        PartialConfig::from_table(map).map_err(fail)?;

        let mut next = self.clone();
        if let Some(name) = map.get("style").and_then(Value::as_str) {
            let style = style_table(name).ok_or_else(|| {
                fail(format!(
                    "unknown style '{name}', expected one of: {}",
                    schema::style_names().join(", ")
                ))
            })?;
            let label = format!("{source} (style {name})");
            for key in style.keys() {
                next.set_by.insert(key.clone(), label.clone());
            }
            deep_merge(&mut next.table, &style);
        }

        deep_merge(&mut next.table, map);
        for key in map.keys() {
            next.set_by.insert(key.clone(), source.to_string());
        }

        Config::from_table(&next.table).map_err(fail)?;
        Ok(next)
    }

    /// Defaults with a named style applied
    pub fn with_style(name: &str, source: &str) -> Result<Settings, ConfigError> {
        let mut map = Table::new();
        map.insert("style".to_string(), Value::String(name.to_string()));
        Settings::defaults().apply(&map, source)
    }
}

/// The configuration merge interface used by the option pipeline
///
/// Implementations must not keep configuration state of their own between
/// calls: everything they produce is returned to the caller.
pub trait ConfigMerge {
    /// Read every configured source and merge it with the command-line
    /// operational options
    ///
    /// Returns the merged settings and the merged operational options, or all
    /// of the problems found.
    fn validate_and_merge(&self, op: &OpOptions) -> Result<(Settings, OpOptions), ConfigError>;

    /// Apply a single map on top of `settings`
    ///
    /// Command-line operational options keep precedence over the applied map.
    fn apply(
        &self,
        settings: Settings,
        map: &Table,
        source: &str,
        op: &OpOptions,
    ) -> Result<Settings, ConfigError> {
        let settings = settings.apply(map, source)?;
        if op.is_empty() {
            Ok(settings)
        } else {
            settings.apply(op.as_table(), COMMAND_LINE)
        }
    }

    /// Report the effective configuration and where it came from
    fn explain(&self, settings: &Settings) -> String {
        explain_report(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_map;

    #[test]
    fn test_deep_merge_nested() {
        let mut base = read_map(r#"{:cache {:directory "a" :location "HOME"} :jobs 1}"#).unwrap();
        let overlay = read_map(r#"{:cache {:directory "b"} :jobs 2}"#).unwrap();
        deep_merge(&mut base, &overlay);
        let cache = base.get("cache").and_then(Value::as_table).unwrap();
        assert_eq!(cache.get("directory").and_then(Value::as_str), Some("b"));
        assert_eq!(cache.get("location").and_then(Value::as_str), Some("HOME"));
        assert_eq!(base.get("jobs"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_deep_merge_scalar_replaces_table() {
        let mut base = read_map("{:url {:cache-secs 5}}").unwrap();
        let overlay = read_map("{:url 3}").unwrap();
        deep_merge(&mut base, &overlay);
        assert_eq!(base.get("url"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_op_options_extract_closed_set() {
        let op = OpOptions::extract(&read_map("{:width 90 :parallel? false :jobs 3}").unwrap());
        assert!(!op.as_table().contains_key("width"));
        assert!(!op.parallel());
        assert_eq!(op.jobs(), 3);
    }

    #[test]
    fn test_op_options_defaults_when_absent() {
        let op = OpOptions::default();
        assert!(op.parallel());
        assert!(!op.search_config());
        assert!(!op.cwd_rc());
        assert_eq!(op.jobs(), 0);
        assert_eq!(op.url_cache_secs(), 300);
    }

    #[test]
    fn test_op_options_merge_is_deep() {
        let a = OpOptions::extract(&read_map("{:url {:cache-secs 10 :cache-dir \"u\"}}").unwrap());
        let b = OpOptions::extract(&read_map("{:url {:cache-secs 20}}").unwrap());
        let merged = a.merge(&b);
        assert_eq!(merged.url_cache_secs(), 20);
        let url = merged.as_table().get("url").and_then(Value::as_table).unwrap();
        assert_eq!(url.get("cache-dir").and_then(Value::as_str), Some("u"));
    }

    #[test]
    fn test_url_cache_path_uses_location_variable() {
        let op = OpOptions::extract(
            &read_map(r#"{:cache {:location "TIDYFMT_TEST_NO_SUCH_VAR"}}"#).unwrap(),
        );
        assert!(op.url_cache_path().is_none());
    }

    #[test]
    fn test_settings_defaults_cover_all_keys() {
        let settings = Settings::defaults();
        for key in OP_KEYS {
            assert!(settings.as_table().contains_key(*key), "missing {key}");
        }
        assert_eq!(settings.config().unwrap(), Config::default());
        assert_eq!(settings.set_by("width"), None);
    }

    #[test]
    fn test_settings_apply_records_source() {
        let settings = Settings::defaults()
            .apply(&read_map("{:width 100}").unwrap(), COMMAND_LINE)
            .unwrap();
        assert_eq!(settings.config().unwrap().width, 100);
        assert_eq!(settings.set_by("width"), Some(COMMAND_LINE));
        assert_eq!(settings.set_by("tab-width"), None);
    }

    #[test]
    fn test_settings_apply_expands_style_first() {
        let settings = Settings::defaults()
            .apply(&read_map("{:style :wide :width 100}").unwrap(), "rc")
            .unwrap();
        assert_eq!(settings.config().unwrap().width, 100);

        let settings = Settings::defaults()
            .apply(&read_map("{:style :compact}").unwrap(), "rc")
            .unwrap();
        assert_eq!(settings.config().unwrap().max_blank_lines, 1);
        assert_eq!(settings.set_by("max-blank-lines"), Some("rc (style compact)"));
    }

    #[test]
    fn test_settings_apply_unknown_style() {
        let err = Settings::defaults()
            .apply(&read_map("{:style :fancy}").unwrap(), "rc")
            .unwrap_err();
        assert!(err.to_string().contains("unknown style 'fancy'"));
    }

    #[test]
    fn test_settings_apply_rejects_out_of_range() {
        let err = Settings::defaults()
            .apply(&read_map("{:width 5}").unwrap(), COMMAND_LINE)
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("command line"), "{text}");
        assert!(text.contains("width 5"), "{text}");
    }

    #[test]
    fn test_with_style_standard_is_default_config() {
        let settings = Settings::with_style("standard", "-s").unwrap();
        assert_eq!(settings.config().unwrap().width, 80);
        assert_eq!(settings.set_by("style"), Some("-s"));
    }

    struct NoSources;

    impl ConfigMerge for NoSources {
        fn validate_and_merge(
            &self,
            op: &OpOptions,
        ) -> Result<(Settings, OpOptions), ConfigError> {
            Ok((Settings::defaults(), op.clone()))
        }
    }

    #[test]
    fn test_apply_keeps_command_line_op_options() {
        let op = OpOptions::extract(&read_map("{:parallel? false}").unwrap());
        let settings = NoSources
            .apply(
                Settings::defaults(),
                &read_map("{:parallel? true :width 90}").unwrap(),
                "https://example/config.edn",
                &op,
            )
            .unwrap();
        assert!(!settings.op_options().parallel());
        assert_eq!(settings.config().unwrap().width, 90);
    }
}
