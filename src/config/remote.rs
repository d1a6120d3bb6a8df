//! Remote configuration loading for `--url` and `--url-only`

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use regex::Regex;
use tracing::{debug, warn};

use super::loader::parse_config_text;
use super::OpOptions;
use crate::error::LoadError;

/// Characters not allowed in cache file names
static UNSAFE_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Timeout for a single configuration fetch
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches a configuration map from a URL
pub trait RemoteLoader {
    fn load(&self, op: &OpOptions, url: &str) -> Result<toml::Table, LoadError>;
}

/// Loader for `file://`, `http://` and `https://` URLs
///
/// HTTP bodies are cached on disk for `:url :cache-secs` seconds. A stale
/// cache entry is used when the server cannot be reached.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlLoader;

impl UrlLoader {
    fn fail(url: &str, detail: impl Into<String>) -> LoadError {
        LoadError {
            url: url.to_string(),
            detail: detail.into(),
        }
    }

    fn fetch(url: &str) -> Result<String, LoadError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| Self::fail(url, e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .map_err(|e| Self::fail(url, e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::fail(url, format!("server responded with {status}")));
        }
        response.text().map_err(|e| Self::fail(url, e.to_string()))
    }

    /// Fetch `url`, going through the cache in `cache_dir` when there is one
    fn fetch_cached(
        cache_dir: Option<&Path>,
        max_age: Duration,
        url: &str,
    ) -> Result<String, LoadError> {
        let cache_file = cache_dir.map(|dir| cache_file_for(dir, url));

        if let Some(path) = &cache_file {
            if is_fresh(path, max_age) {
                if let Ok(body) = std::fs::read_to_string(path) {
                    debug!(url, path = %path.display(), "using cached configuration");
                    return Ok(body);
                }
            }
        }

        match Self::fetch(url) {
            Ok(body) => {
                if let Some(path) = &cache_file {
                    if let Err(e) = store(path, &body) {
                        warn!(path = %path.display(), "unable to cache configuration: {e}");
                    }
                }
                Ok(body)
            }
            Err(e) => match cache_file.as_deref().map(std::fs::read_to_string) {
                Some(Ok(body)) => {
                    warn!(url, "{e}; using stale cached copy");
                    Ok(body)
                }
                _ => Err(e),
            },
        }
    }
}

impl RemoteLoader for UrlLoader {
    fn load(&self, op: &OpOptions, url: &str) -> Result<toml::Table, LoadError> {
        debug!(url, "loading remote configuration");
        let body = if let Some(path) = url.strip_prefix("file://") {
            std::fs::read_to_string(path).map_err(|e| Self::fail(url, e.to_string()))?
        } else if url.starts_with("http://") || url.starts_with("https://") {
            let cache_dir = op.url_cache_path();
            let max_age = Duration::from_secs(op.url_cache_secs());
            Self::fetch_cached(cache_dir.as_deref(), max_age, url)?
        } else {
            return Err(Self::fail(
                url,
                "only file://, http:// and https:// URLs are supported",
            ));
        };

        if url_path(url).ends_with(".toml") {
            toml::from_str::<toml::Table>(&body)
                .map_err(|e| Self::fail(url, e.to_string().trim().to_string()))
        } else {
            parse_config_text(&body).map_err(|e| Self::fail(url, e))
        }
    }
}

/// The URL without query string or fragment
fn url_path(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn cache_file_for(dir: &Path, url: &str) -> PathBuf {
    dir.join(UNSAFE_CHARS_RE.replace_all(url, "_").as_ref())
}

fn is_fresh(path: &Path, max_age: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age <= max_age)
}

fn store(path: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)
}
