//! tidyfmt - Configurable text formatter

#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::io;
use std::process::ExitCode;

use tidyfmt::{Output, RcConfig, UrlLoader};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `TIDYFMT_LOG=debug`
const LOG_ENV: &str = "TIDYFMT_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("off"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let args = std::env::args_os().skip(1);
    let merge = RcConfig::from_env();
    let mut output = Output::new(io::stdout(), io::stderr());

    let exit = tidyfmt::run(args, io::stdin(), &mut output, &merge, &UrlLoader);

    // Streams are flushed after every write; this catches anything left over
    let _ = output.flush();
    exit.finish()
}
