//! rc file discovery and the default [`ConfigMerge`] implementation

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ConfigMerge, OpOptions, Settings, COMMAND_LINE};
use crate::error::ConfigError;
use crate::reader::read_map;

/// rc file names, in order of preference
const RC_FILE_NAMES: &[&str] = &[".tidyfmtrc", ".tidyfmt.toml"];

/// Environment variable holding an options map
pub const OPTIONS_ENV: &str = "TIDYFMT_OPTIONS";

/// Parse the contents of a configuration file
///
/// Contents starting with `{` are an options map, anything else is TOML.
pub fn parse_config_text(text: &str) -> Result<toml::Table, String> {
    if text.trim_start().starts_with('{') {
        read_map(text).map_err(|e| e.to_string())
    } else {
        toml::from_str::<toml::Table>(text)
            .map_err(|e| e.to_string().trim().to_string())
    }
}

/// Read and parse a configuration file
pub fn read_config_file(path: &Path) -> Result<toml::Table, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    parse_config_text(&text).map_err(|detail| ConfigError::Read {
        path: path.to_path_buf(),
        detail,
    })
}

/// First rc file present in `dir`
fn rc_file_in(dir: &Path) -> Option<PathBuf> {
    RC_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Configuration sourced from rc files and the environment
#[derive(Debug, Clone)]
pub struct RcConfig {
    home: Option<PathBuf>,
    cwd: PathBuf,
    env_options: Option<String>,
}

impl RcConfig {
    /// Explicit home, working directory and environment options
    #[must_use]
    pub fn new(home: Option<PathBuf>, cwd: PathBuf, env_options: Option<String>) -> Self {
        Self {
            home,
            cwd,
            env_options,
        }
    }

    /// The real home directory, working directory and environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(
            dirs::home_dir(),
            std::env::current_dir().unwrap_or_default(),
            std::env::var(OPTIONS_ENV).ok(),
        )
    }

    /// rc file selected by the working-directory operational options
    ///
    /// With `:search-config?` the nearest rc file at or above the working
    /// directory wins, stopping short of the home directory whose rc file has
    /// already been read. Otherwise `:cwd-rc?` selects the one in the working
    /// directory.
    fn local_rc_file(&self, op: &OpOptions) -> Option<PathBuf> {
        if op.search_config() {
            self.cwd
                .ancestors()
                .take_while(|dir| self.home.as_deref() != Some(*dir))
                .find_map(rc_file_in)
        } else if op.cwd_rc() {
            if self.home.as_deref() == Some(self.cwd.as_path()) {
                None
            } else {
                rc_file_in(&self.cwd)
            }
        } else {
            None
        }
    }

    /// Apply the file at `path`, recording any problem in `errors`
    fn apply_file(settings: Settings, path: &Path, errors: &mut Vec<String>) -> Settings {
        debug!(path = %path.display(), "reading configuration file");
        let label = path.display().to_string();
        match read_config_file(path).and_then(|map| settings.apply(&map, &label)) {
            Ok(next) => next,
            Err(e) => {
                errors.push(e.to_string());
                settings
            }
        }
    }
}

impl ConfigMerge for RcConfig {
    fn validate_and_merge(&self, op: &OpOptions) -> Result<(Settings, OpOptions), ConfigError> {
        let mut errors = Vec::new();
        let mut settings = Settings::defaults();

        if let Some(path) = self.home.as_deref().and_then(rc_file_in) {
            settings = Self::apply_file(settings, &path, &mut errors);
        }

        // Working-directory lookup is steered by the home rc file and the
        // command line together.
        let steering = settings.op_options().merge(op);
        if let Some(path) = self.local_rc_file(&steering) {
            settings = Self::apply_file(settings, &path, &mut errors);
        }

        if let Some(text) = self.env_options.as_deref().filter(|t| !t.trim().is_empty()) {
            debug!(variable = OPTIONS_ENV, "reading configuration from environment");
            match read_map(text) {
                Ok(map) => match settings.apply(&map, OPTIONS_ENV) {
                    Ok(next) => settings = next,
                    Err(e) => errors.push(e.to_string()),
                },
                Err(e) => errors.push(format!("Unable to read {OPTIONS_ENV}: {e}")),
            }
        }

        if !op.is_empty() {
            match settings.apply(op.as_table(), COMMAND_LINE) {
                Ok(next) => settings = next,
                Err(e) => errors.push(e.to_string()),
            }
        }

        if errors.is_empty() {
            let merged = settings.op_options();
            Ok((settings, merged))
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}
