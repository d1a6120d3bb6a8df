//! Option resolution pipeline
//!
//! Resolution is a fixed list of stage functions over an owned
//! [`PipelineState`]. Each stage either leaves the state `Incomplete` for the
//! next one or completes it with an exit code and an optional message. Once
//! complete, no further stage runs.

pub mod stages;

use tracing::debug;

use crate::cli::ClassifiedArgs;
use crate::config::{ConfigMerge, OpOptions, RemoteLoader, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Incomplete,
    Complete,
}

/// State threaded through the stages
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub status: Status,
    pub exit_code: i32,
    pub message: Option<String>,
    pub op_options: OpOptions,
    pub settings: Settings,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            status: Status::Incomplete,
            exit_code: 0,
            message: None,
            op_options: OpOptions::default(),
            settings: Settings::defaults(),
        }
    }
}

impl PipelineState {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }

    /// Complete with exit 0 and no message
    #[must_use]
    pub fn succeed(self) -> Self {
        self.complete(0, None)
    }

    /// Complete with exit 0 and `text` for standard output
    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.complete(0, Some(text.into()))
    }

    /// Complete with exit 1 and a diagnostic
    #[must_use]
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.complete(1, Some(message.into()))
    }

    fn complete(self, exit_code: i32, message: Option<String>) -> Self {
        Self {
            status: Status::Complete,
            exit_code,
            message,
            ..self
        }
    }

    #[must_use]
    pub fn with_op_options(self, op_options: OpOptions) -> Self {
        Self { op_options, ..self }
    }

    /// Install `settings` and the operational options they contain
    #[must_use]
    pub fn with_settings(self, settings: Settings) -> Self {
        Self {
            op_options: settings.op_options(),
            settings,
            ..self
        }
    }
}

/// Read-only inputs shared by every stage
pub struct Context<'a> {
    pub args: &'a ClassifiedArgs,
    pub merge: &'a dyn ConfigMerge,
    pub remote: &'a dyn RemoteLoader,
}

/// One resolution step
pub type Stage = fn(PipelineState, &Context<'_>) -> PipelineState;

/// The stages, in order
pub const STAGES: &[(&str, Stage)] = &[
    ("unrecognized-switch", stages::check_unrecognized),
    ("arity", stages::check_arity),
    ("version-help", stages::version_or_help),
    ("inline-options", stages::inline_op_options),
    ("resolve-config", stages::resolve_config),
    ("explain", stages::explain),
    ("url", stages::load_url),
    ("default-standard", stages::default_or_standard),
    ("command-line-config", stages::command_line_config),
];

/// Run `stages` over `state`, stopping at the first that completes it
#[must_use]
pub fn run_stages(
    mut state: PipelineState,
    ctx: &Context<'_>,
    stages: &[(&str, Stage)],
) -> PipelineState {
    for &(name, stage) in stages {
        if state.is_complete() {
            break;
        }
        debug!(stage = name, "running stage");
        state = stage(state, ctx);
        if state.is_complete() {
            debug!(stage = name, exit_code = state.exit_code, "pipeline complete");
        }
    }
    state
}

/// Final result of option resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Disposition {
    pub exit_code: i32,
    /// Text to print before exiting; formatting does not run when present
    pub message: Option<String>,
    pub op_options: OpOptions,
    pub settings: Settings,
}

impl Disposition {
    /// Whether formatting should run with the resolved configuration
    #[must_use]
    pub fn proceeds(&self) -> bool {
        self.exit_code == 0 && self.message.is_none()
    }
}

impl From<PipelineState> for Disposition {
    fn from(state: PipelineState) -> Self {
        Disposition {
            exit_code: state.exit_code,
            message: state.message,
            op_options: state.op_options,
            settings: state.settings,
        }
    }
}

/// Resolve what to do and with what configuration
///
/// A state still incomplete after the last stage counts as success.
#[must_use]
pub fn resolve(ctx: &Context<'_>) -> Disposition {
    run_stages(PipelineState::default(), ctx, STAGES).into()
}
