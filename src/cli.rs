//! Command-line interface for tidyfmt.
//!
//! The argument grammar is positional: an optional options map, then at most
//! one switch with its arguments. [`classify`] splits an argument vector along
//! those lines once; the option pipeline validates the result. The clap
//! [`Command`] built by [`build_cli`] documents the same surface and renders
//! the help text.

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};

use clap::{Arg, ArgAction, Command};

/// Switches selecting an operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    Version,
    Help,
    Explain,
    Default,
    Standard,
    Url,
    UrlOnly,
    Write,
    /// A `-`-prefixed token that matches no table entry
    Unrecognized,
}

/// Number of arguments a switch takes after itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    One,
    Any,
}

/// One row of the switch table
struct SwitchSpec {
    switch: Switch,
    short: Option<char>,
    long: &'static str,
    arity: Arity,
    help: &'static str,
}

/// The switch table
const SWITCHES: &[SwitchSpec] = &[
    SwitchSpec {
        switch: Switch::Default,
        short: Some('d'),
        long: "default",
        arity: Arity::None,
        help: "Accept no configuration input",
    },
    SwitchSpec {
        switch: Switch::Standard,
        short: Some('s'),
        long: "standard",
        arity: Arity::None,
        help: "Accept no configuration input, use the standard style",
    },
    SwitchSpec {
        switch: Switch::Url,
        short: Some('u'),
        long: "url",
        arity: Arity::One,
        help: "Load options from URL on top of all other configuration",
    },
    SwitchSpec {
        switch: Switch::UrlOnly,
        short: None,
        long: "url-only",
        arity: Arity::One,
        help: "Load options only from URL, ignore all other configuration",
    },
    SwitchSpec {
        switch: Switch::Help,
        short: Some('h'),
        long: "help",
        arity: Arity::None,
        help: "Output this help text",
    },
    SwitchSpec {
        switch: Switch::Version,
        short: Some('v'),
        long: "version",
        arity: Arity::None,
        help: "Output the version",
    },
    SwitchSpec {
        switch: Switch::Explain,
        short: Some('e'),
        long: "explain",
        arity: Arity::None,
        help: "Output the configuration, showing where non-default values came from",
    },
    SwitchSpec {
        switch: Switch::Write,
        short: Some('w'),
        long: "write",
        arity: Arity::Any,
        help: "Format each FILE and write the result back to it",
    },
];

const USAGE: &str = "tidyfmt [OPTIONS-MAP] <input >output
       tidyfmt <SWITCH> <input >output
       tidyfmt [OPTIONS-MAP] -w FILE...";

const AFTER_HELP: &str = "At most one switch may be given. Only -w/--write may follow an options map.

Configuration is read from ~/.tidyfmtrc, then .tidyfmtrc near the working
directory (with {:search-config? true} or {:cwd-rc? true}), then the
TIDYFMT_OPTIONS environment variable, then the command line.";

impl SwitchSpec {
    fn matches(&self, token: &str) -> bool {
        if let Some(long) = token.strip_prefix("--") {
            return long == self.long;
        }
        match (token.strip_prefix('-'), self.short) {
            (Some(rest), Some(short)) => {
                let mut chars = rest.chars();
                chars.next() == Some(short) && chars.next().is_none()
            }
            _ => false,
        }
    }
}

impl Switch {
    fn spec(self) -> Option<&'static SwitchSpec> {
        SWITCHES.iter().find(|spec| spec.switch == self)
    }

    /// Classify a `-`-prefixed token
    #[must_use]
    pub fn from_token(token: &str) -> Switch {
        SWITCHES
            .iter()
            .find(|spec| spec.matches(token))
            .map_or(Switch::Unrecognized, |spec| spec.switch)
    }

    /// Arguments this switch takes after itself
    #[must_use]
    pub fn arity(self) -> Arity {
        self.spec().map_or(Arity::None, |spec| spec.arity)
    }

    /// Long form, e.g. `--url-only`
    #[must_use]
    pub fn name(self) -> String {
        self.spec()
            .map_or_else(|| "unrecognized".to_string(), |spec| format!("--{}", spec.long))
    }
}

/// Whether `token` is a switch candidate
#[must_use]
pub fn is_switch_token(token: &OsStr) -> bool {
    token.as_encoded_bytes().starts_with(b"-")
}

/// An argument vector split into its parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedArgs {
    /// Leading non-switch token, normally an options map
    pub inline_config: Option<String>,
    /// Switch decided from `switch_token`
    pub switch: Option<Switch>,
    /// The switch exactly as given
    pub switch_token: Option<String>,
    /// Tokens after the switch, or after the configuration token when there
    /// is no switch. Kept as given so file names need not be UTF-8.
    pub trailing: Vec<OsString>,
}

impl ClassifiedArgs {
    /// The URL given to `--url` or `--url-only`
    #[must_use]
    pub fn switch_arg(&self) -> Option<Cow<'_, str>> {
        match self.switch {
            Some(Switch::Url | Switch::UrlOnly) => {
                self.trailing.first().map(|arg| arg.to_string_lossy())
            }
            _ => None,
        }
    }

    /// Files given to `--write`
    #[must_use]
    pub fn files(&self) -> &[OsString] {
        match self.switch {
            Some(Switch::Write) => &self.trailing,
            _ => &[],
        }
    }

    /// The configuration token, if it is non-blank
    #[must_use]
    pub fn config_text(&self) -> Option<&str> {
        self.inline_config
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// Split an argument vector (program name excluded)
///
/// Total over all inputs: malformed vectors are classified, not rejected.
/// The configuration token and the switch are read lossily; trailing tokens
/// are kept verbatim.
pub fn classify<I, T>(args: I) -> ClassifiedArgs
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let tokens: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let mut rest = tokens.as_slice();

    let inline_config = match rest.split_first() {
        Some((first, tail)) if !is_switch_token(first) => {
            rest = tail;
            Some(first.to_string_lossy().into_owned())
        }
        _ => None,
    };

    let (switch, switch_token) = match rest.split_first() {
        Some((token, tail)) if is_switch_token(token) => {
            rest = tail;
            let token = token.to_string_lossy().into_owned();
            (Some(Switch::from_token(&token)), Some(token))
        }
        _ => (None, None),
    };

    ClassifiedArgs {
        inline_config,
        switch,
        switch_token,
        trailing: rest.to_vec(),
    }
}

/// Build the clap Command describing the CLI surface
#[must_use]
pub fn build_cli() -> Command {
    let mut cmd = Command::new("tidyfmt")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Format text from stdin to stdout, or files in place")
        .override_usage(USAGE)
        .after_help(AFTER_HELP)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .arg(
            Arg::new("options-map")
                .value_name("OPTIONS-MAP")
                .help("Options map, e.g. '{:width 100}'")
                .required(false),
        );

    for spec in SWITCHES {
        let mut arg = Arg::new(spec.long).long(spec.long).help(spec.help);
        if let Some(short) = spec.short {
            arg = arg.short(short);
        }
        arg = match spec.arity {
            Arity::None => arg.action(ArgAction::SetTrue),
            Arity::One => arg.value_name("URL").num_args(1),
            Arity::Any => arg.value_name("FILE").num_args(0..),
        };
        cmd = cmd.arg(arg);
    }
    cmd
}

/// Full help text, also appended to usage errors
#[must_use]
pub fn help_text() -> String {
    build_cli().render_help().to_string().trim_end().to_string()
}

/// Version line
#[must_use]
pub fn version_text() -> String {
    build_cli().render_version().trim_end().to_string()
}
