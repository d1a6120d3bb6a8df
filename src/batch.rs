//! File batch orchestrator for `--write`
//!
//! Each file is read, formatted and written back independently. A file is
//! only replaced once formatting has succeeded, and the replacement goes
//! through a temporary sibling that is renamed over the target, so a failure
//! at any step leaves the file exactly as it was.

use std::io::Write;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rayon::ThreadPool;
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};

use crate::config::OpOptions;
use crate::engine::Formatter;
use crate::error::FileError;

/// Result of formatting one file
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    /// 0 on success, 1 on failure
    pub exit_code: i32,
    /// Whether the file was rewritten
    pub changed: bool,
    pub diagnostic: Option<String>,
}

impl FileOutcome {
    fn from_result(path: &Path, result: Result<bool, FileError>) -> Self {
        match result {
            Ok(changed) => FileOutcome {
                path: path.to_path_buf(),
                exit_code: 0,
                changed,
                diagnostic: None,
            },
            Err(e) => FileOutcome {
                path: path.to_path_buf(),
                exit_code: 1,
                changed: false,
                diagnostic: Some(e.to_string()),
            },
        }
    }
}

/// Aggregate over a batch
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchResult {
    /// 1 if any file failed, else 0
    pub exit_code: i32,
    /// Files processed successfully, changed or not
    pub formatted: usize,
    /// Files rewritten on disk
    pub changed: usize,
    pub failed: usize,
    /// One line per failed file, in input order
    pub diagnostics: Vec<String>,
}

impl BatchResult {
    fn collect(outcomes: Vec<FileOutcome>) -> Self {
        let mut result = BatchResult::default();
        for outcome in outcomes {
            result.exit_code = result.exit_code.max(outcome.exit_code);
            if outcome.exit_code == 0 {
                result.formatted += 1;
                if outcome.changed {
                    result.changed += 1;
                }
            } else {
                result.failed += 1;
            }
            result.diagnostics.extend(outcome.diagnostic);
        }
        result
    }
}

/// Build the worker pool for a batch, if the batch should run in parallel
///
/// Returns `None` when `:parallel?` is off or there is at most one file. A
/// pool that cannot be built degrades to sequential processing.
#[must_use]
pub fn build_pool(op: &OpOptions, file_count: usize) -> Option<ThreadPool> {
    if !op.parallel() || file_count < 2 {
        return None;
    }
    // num_threads(0) lets rayon pick one thread per CPU
    match rayon::ThreadPoolBuilder::new()
        .num_threads(op.jobs())
        .thread_name(|i| format!("tidyfmt-worker-{i}"))
        .build()
    {
        Ok(pool) => {
            debug!(threads = pool.current_num_threads(), "built worker pool");
            Some(pool)
        }
        Err(e) => {
            warn!("failed to build worker pool, formatting sequentially: {e}");
            None
        }
    }
}

/// Format one file in place
///
/// Returns whether the file changed. Unchanged files are not rewritten.
pub fn format_file<F: Formatter + ?Sized>(path: &Path, engine: &F) -> Result<bool, FileError> {
    format_file_staged(path, engine, None)
}

/// [`format_file`], staging the replacement in `staging` instead of beside
/// the target
fn format_file_staged<F: Formatter + ?Sized>(
    path: &Path,
    engine: &F,
    staging: Option<&Path>,
) -> Result<bool, FileError> {
    let contents = std::fs::read_to_string(path).map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let formatted = engine
        .format(&contents, &path.display().to_string())
        .map_err(|source| FileError::Format {
            path: path.to_path_buf(),
            source,
        })?;

    if formatted == contents {
        trace!(path = %path.display(), "already formatted");
        return Ok(false);
    }

    replace_contents(path, &formatted, staging).map_err(|source| FileError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "rewrote file");
    Ok(true)
}

/// Write `contents` to a temporary file and rename it over `path`
///
/// Symlinks are followed, so the file they point at is replaced and the
/// link itself stays in place. The temporary file lives next to the
/// resolved target unless `staging` names another directory.
fn replace_contents(path: &Path, contents: &str, staging: Option<&Path>) -> std::io::Result<()> {
    let target = std::fs::canonicalize(path)?;
    let dir = match (staging, target.parent()) {
        (Some(dir), _) | (None, Some(dir)) => dir,
        (None, None) => Path::new("."),
    };
    let permissions = std::fs::metadata(&target)?.permissions();

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    std::fs::set_permissions(tmp.path(), permissions)?;
    // The temporary file is removed on drop if persisting fails
    tmp.persist(&target).map_err(|e| e.error)?;
    Ok(())
}

/// Format every file in `files`
///
/// Runs on `pool` when given, otherwise on the calling thread. Outcomes are
/// reported in input order regardless of completion order, and a failing
/// file never stops the others.
pub fn format_files<F: Formatter + ?Sized>(
    files: &[PathBuf],
    engine: &F,
    pool: Option<&ThreadPool>,
) -> BatchResult {
    let outcomes: Vec<FileOutcome> = match pool {
        Some(pool) => pool.install(|| {
            files
                .par_iter()
                .map(|path| FileOutcome::from_result(path, format_file(path, engine)))
                .collect()
        }),
        None => files
            .iter()
            .map(|path| FileOutcome::from_result(path, format_file(path, engine)))
            .collect(),
    };

    let result = BatchResult::collect(outcomes);
    debug!(
        formatted = result.formatted,
        changed = result.changed,
        failed = result.failed,
        "batch finished"
    );
    result
}
