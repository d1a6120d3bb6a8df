//! tidyfmt - Configurable text formatter
//!
//! The command-line driver: resolves what to do and with which configuration
//! from the argument vector, then formats standard input or rewrites files.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod reader;

use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Context as _;
use tracing::debug;

// Re-export commonly used types
pub use batch::{format_files, BatchResult};
pub use cli::{build_cli, classify, ClassifiedArgs, Switch};
pub use config::{Config, ConfigMerge, OpOptions, RcConfig, RemoteLoader, Settings, UrlLoader};
pub use engine::{Formatter, TextFormatter};
pub use error::Result;
pub use output::{Exit, Output};
pub use pipeline::{resolve, Disposition};

/// Source name used in diagnostics for standard input
const STDIN_SOURCE: &str = "stdin";

/// Run one invocation
///
/// `args` excludes the program name. Everything the invocation prints goes
/// through `output`; the returned [`Exit`] carries the exit code and any
/// worker pool that must be shut down.
pub fn run<I, T, R, O, E>(
    args: I,
    stdin: R,
    output: &mut Output<O, E>,
    merge: &dyn ConfigMerge,
    remote: &dyn RemoteLoader,
) -> Exit
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    R: Read,
    O: Write,
    E: Write,
{
    match execute(args, stdin, output, merge, remote) {
        Ok(exit) => exit,
        Err(e) => {
            // Nothing more can be reported if stderr itself is gone
            let _ = output.diagnostic(&format!("{e:#}"));
            Exit::new(1)
        }
    }
}

fn execute<I, T, R, O, E>(
    args: I,
    mut stdin: R,
    output: &mut Output<O, E>,
    merge: &dyn ConfigMerge,
    remote: &dyn RemoteLoader,
) -> Result<Exit>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
    R: Read,
    O: Write,
    E: Write,
{
    let args = classify(args);
    debug!(?args, "classified arguments");

    let disposition = resolve(&pipeline::Context {
        args: &args,
        merge,
        remote,
    });
    if let Some(message) = &disposition.message {
        output.message(disposition.exit_code, message)?;
        return Ok(Exit::new(disposition.exit_code));
    }
    if !disposition.proceeds() {
        return Ok(Exit::new(disposition.exit_code));
    }

    let config = match disposition.settings.config() {
        Ok(config) => config,
        Err(e) => {
            output.diagnostic(&e.to_string())?;
            return Ok(Exit::new(1));
        }
    };
    let engine = TextFormatter::new(config).context("Unable to build the formatting engine")?;

    if args.switch == Some(Switch::Write) {
        let files: Vec<PathBuf> = args.files().iter().map(PathBuf::from).collect();
        let pool = batch::build_pool(&disposition.op_options, files.len());
        let result = format_files(&files, &engine, pool.as_ref());
        for line in &result.diagnostics {
            output.diagnostic(line)?;
        }
        return Ok(Exit::new(result.exit_code).with_pool(pool));
    }

    let mut text = String::new();
    stdin
        .read_to_string(&mut text)
        .context("Failed to read standard input")?;
    match engine.format(&text, STDIN_SOURCE) {
        Ok(formatted) => {
            output.text(&formatted)?;
            Ok(Exit::new(0))
        }
        Err(e) => {
            output.diagnostic(&e.to_string())?;
            Ok(Exit::new(1))
        }
    }
}
