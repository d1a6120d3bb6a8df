//! The resolution stages
//!
//! Every stage inspects the classified arguments and either passes the state
//! on unchanged, updates it and passes it on, or completes it.

use std::fmt::Display;

use toml::Table;

use super::{Context, PipelineState};
use crate::cli::{help_text, version_text, Arity, Switch};
use crate::config::{OpOptions, Settings, COMMAND_LINE};
use crate::error::{OptionParseError, UsageError};
use crate::reader::read_map;

/// Diagnostic followed by the usage text
fn with_usage(err: impl Display) -> String {
    format!("{err}\n\n{}", help_text())
}

fn count_phrase(n: usize) -> String {
    if n == 1 {
        "1 additional argument".to_string()
    } else {
        format!("{n} additional arguments")
    }
}

/// The configuration token read as a map
fn inline_map(ctx: &Context<'_>) -> Option<Result<Table, OptionParseError>> {
    let text = ctx.args.config_text()?;
    Some(read_map(text).map_err(|e| OptionParseError {
        detail: e.to_string(),
        text: text.to_string(),
    }))
}

/// Operational options given on the command line
fn command_line_op(ctx: &Context<'_>) -> OpOptions {
    match inline_map(ctx) {
        Some(Ok(map)) => OpOptions::extract(&map),
        _ => OpOptions::default(),
    }
}

/// Stage 1: reject switches missing from the switch table
pub fn check_unrecognized(state: PipelineState, ctx: &Context<'_>) -> PipelineState {
    if ctx.args.switch != Some(Switch::Unrecognized) {
        return state;
    }
    let token = ctx.args.switch_token.clone().unwrap_or_default();
    state.fail(with_usage(UsageError::UnrecognizedSwitch(token)))
}

/// Stage 2: check argument counts against the switch table
pub fn check_arity(state: PipelineState, ctx: &Context<'_>) -> PipelineState {
    let args = ctx.args;
    let found = args.trailing.len();

    let Some((switch, token)) = args.switch.zip(args.switch_token.as_deref()) else {
        if args.inline_config.is_some() && found > 0 {
            return state.fail(with_usage(UsageError::ExtraAfterConfig(count_phrase(found))));
        }
        return state;
    };

    if args.config_text().is_some() && switch != Switch::Write {
        return state.fail(with_usage(UsageError::SwitchAfterMap(token.to_string())));
    }

    let expected = match switch.arity() {
        Arity::None => 0,
        Arity::One => 1,
        Arity::Any => return state,
    };
    if found == expected {
        return state;
    }
    let expected = if expected == 0 {
        "no additional arguments".to_string()
    } else {
        count_phrase(expected)
    };
    state.fail(with_usage(UsageError::SwitchArity {
        switch: token.to_string(),
        expected,
        found: count_phrase(found),
    }))
}

/// Stage 3: `--version` and `--help`
pub fn version_or_help(state: PipelineState, ctx: &Context<'_>) -> PipelineState {
    match ctx.args.switch {
        Some(Switch::Version) => state.reply(version_text()),
        Some(Switch::Help) => state.reply(help_text()),
        _ => state,
    }
}

/// Stage 4: pick the operational options out of the options map
pub fn inline_op_options(state: PipelineState, ctx: &Context<'_>) -> PipelineState {
    match inline_map(ctx) {
        None => state,
        Some(Ok(map)) => {
            let op = state.op_options.merge(&OpOptions::extract(&map));
            state.with_op_options(op)
        }
        Some(Err(e)) => state.fail(with_usage(e)),
    }
}

/// Stage 5: read and merge every configuration source
///
/// Skipped by the switches that ignore local configuration.
pub fn resolve_config(state: PipelineState, ctx: &Context<'_>) -> PipelineState {
    if matches!(
        ctx.args.switch,
        Some(Switch::Default | Switch::Standard | Switch::UrlOnly)
    ) {
        return state;
    }
    match ctx.merge.validate_and_merge(&state.op_options) {
        Ok((settings, op)) => state.with_settings(settings).with_op_options(op),
        Err(e) => state.fail(e.to_string()),
    }
}

/// Stage 6: `--explain`
pub fn explain(state: PipelineState, ctx: &Context<'_>) -> PipelineState {
    if ctx.args.switch != Some(Switch::Explain) {
        return state;
    }
    let op = command_line_op(ctx);
    match ctx.merge.apply(
        state.settings.clone(),
        op.as_table(),
        COMMAND_LINE,
        &OpOptions::default(),
    ) {
        Ok(settings) => {
            let report = ctx.merge.explain(&settings);
            state.with_settings(settings).reply(report)
        }
        Err(e) => state.fail(e.to_string()),
    }
}

/// Stage 7: `--url` and `--url-only`
pub fn load_url(state: PipelineState, ctx: &Context<'_>) -> PipelineState {
    let base = match ctx.args.switch {
        Some(Switch::Url) => state.settings.clone(),
        Some(Switch::UrlOnly) => Settings::defaults(),
        _ => return state,
    };
    let Some(url) = ctx.args.switch_arg() else {
        return state;
    };

    let loaded = ctx
        .remote
        .load(&state.op_options, &url)
        .map_err(|e| e.to_string())
        .and_then(|map| {
            ctx.merge
                .apply(base, &map, &url, &command_line_op(ctx))
                .map_err(|e| e.to_string())
        });
    match loaded {
        Ok(settings) => state.with_settings(settings).succeed(),
        Err(message) => state.fail(message),
    }
}

/// Stage 8: `--default` and `--standard`
pub fn default_or_standard(state: PipelineState, ctx: &Context<'_>) -> PipelineState {
    match ctx.args.switch {
        Some(Switch::Default) => state.with_settings(Settings::defaults()).succeed(),
        Some(Switch::Standard) => {
            let source = ctx
                .args
                .switch_token
                .clone()
                .unwrap_or_else(|| Switch::Standard.name());
            match Settings::with_style("standard", &source) {
                Ok(settings) => state.with_settings(settings).succeed(),
                Err(e) => state.fail(e.to_string()),
            }
        }
        _ => state,
    }
}

/// Stage 9: apply the options map as configuration
pub fn command_line_config(state: PipelineState, ctx: &Context<'_>) -> PipelineState {
    let map = match inline_map(ctx) {
        None => return state,
        Some(Ok(map)) => map,
        Some(Err(e)) => return state.fail(with_usage(e)),
    };
    match ctx.merge.apply(
        state.settings.clone(),
        &map,
        COMMAND_LINE,
        &OpOptions::default(),
    ) {
        Ok(settings) => state.with_settings(settings).succeed(),
        Err(e) => state.fail(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::classify;
    use crate::config::{ConfigMerge, RemoteLoader};
    use crate::error::{ConfigError, LoadError};
    use crate::pipeline::{resolve, Disposition};

    const HOME_RC: &str = "~/.tidyfmtrc";

    /// Sets `:width 90` from a pretend home rc file, or fails
    struct FakeMerge {
        fail: bool,
    }

    impl ConfigMerge for FakeMerge {
        fn validate_and_merge(
            &self,
            op: &OpOptions,
        ) -> Result<(Settings, OpOptions), ConfigError> {
            if self.fail {
                return Err(ConfigError::Validation(vec!["bad rc file".to_string()]));
            }
            let mut settings = Settings::defaults().apply(&read_map("{:width 90}").unwrap(), HOME_RC)?;
            if !op.is_empty() {
                settings = settings.apply(op.as_table(), COMMAND_LINE)?;
            }
            let merged = settings.op_options();
            Ok((settings, merged))
        }
    }

    /// Serves a fixed map for every URL, or fails
    struct FakeRemote(Option<&'static str>);

    impl RemoteLoader for FakeRemote {
        fn load(&self, _op: &OpOptions, url: &str) -> Result<Table, LoadError> {
            match self.0 {
                Some(text) => Ok(read_map(text).unwrap()),
                None => Err(LoadError {
                    url: url.to_string(),
                    detail: "connection refused".to_string(),
                }),
            }
        }
    }

    fn run(args: &[&str], fail_merge: bool, remote: Option<&'static str>) -> Disposition {
        let args = classify(args.iter().copied());
        let merge = FakeMerge { fail: fail_merge };
        let remote = FakeRemote(remote);
        resolve(&Context {
            args: &args,
            merge: &merge,
            remote: &remote,
        })
    }

    fn resolve_args(args: &[&str]) -> Disposition {
        run(args, false, None)
    }

    fn message(d: &Disposition) -> &str {
        d.message.as_deref().unwrap_or_default()
    }

    #[test]
    fn test_unrecognized_switch() {
        let d = resolve_args(&["--bogus"]);
        assert_eq!(d.exit_code, 1);
        assert!(message(&d).starts_with("Unrecognized switch: '--bogus'"));
        assert!(message(&d).contains("Usage:"));
    }

    #[test]
    fn test_unrecognized_wins_over_arity() {
        let d = resolve_args(&["-x", "a", "b"]);
        assert!(message(&d).starts_with("Unrecognized switch: '-x'"));
    }

    #[test]
    fn test_arity_one_too_many() {
        let d = resolve_args(&["-v", "extra"]);
        assert_eq!(d.exit_code, 1);
        assert!(message(&d).starts_with(
            "Switch '-v' takes no additional arguments, found 1 additional argument"
        ));
    }

    #[test]
    fn test_arity_url_counts() {
        let d = resolve_args(&["--url"]);
        assert!(message(&d).starts_with(
            "Switch '--url' takes 1 additional argument, found 0 additional arguments"
        ));
        let d = resolve_args(&["--url-only", "a", "b"]);
        assert!(message(&d).contains("found 2 additional arguments"));
    }

    #[test]
    fn test_switch_after_map() {
        let d = resolve_args(&["{:width 100}", "-e"]);
        assert_eq!(d.exit_code, 1);
        assert!(message(&d).starts_with("Switch '-e' cannot follow an options map"));
    }

    #[test]
    fn test_extra_after_map() {
        let d = resolve_args(&["{:width 100}", "a.txt"]);
        assert_eq!(d.exit_code, 1);
        assert!(message(&d).contains("found 1 additional argument"));
    }

    #[test]
    fn test_version_and_help() {
        let short = resolve_args(&["-v"]);
        let long = resolve_args(&["--version"]);
        assert_eq!(short, long);
        assert_eq!(short.exit_code, 0);
        assert_eq!(short.message, Some(version_text()));

        let help = resolve_args(&["--help"]);
        assert_eq!(help.exit_code, 0);
        assert_eq!(help.message, Some(help_text()));
    }

    #[test]
    fn test_version_skips_configuration() {
        let d = run(&["-v"], true, None);
        assert_eq!(d.exit_code, 0);
    }

    #[test]
    fn test_unreadable_inline_map() {
        let d = resolve_args(&["{:width"]);
        assert_eq!(d.exit_code, 1);
        assert!(message(&d).starts_with("Failed to read configuration from command line"));
        assert!(message(&d).contains("'{:width'"));
        assert!(message(&d).contains("Usage:"));

        let d = resolve_args(&["width"]);
        assert_eq!(d.exit_code, 1);
    }

    #[test]
    fn test_blank_inline_token_is_ignored() {
        let d = resolve_args(&["  "]);
        assert!(d.proceeds());
    }

    #[test]
    fn test_configuration_errors_fail() {
        let d = run(&[], true, None);
        assert_eq!(d.exit_code, 1);
        assert_eq!(message(&d), "bad rc file");
    }

    #[test]
    fn test_no_arguments_uses_ambient_configuration() {
        let d = resolve_args(&[]);
        assert!(d.proceeds());
        assert_eq!(d.settings.config().unwrap().width, 90);
    }

    #[test]
    fn test_explain_reports_sources() {
        let d = resolve_args(&["-e"]);
        assert_eq!(d.exit_code, 0);
        assert!(message(&d).contains(":width {:value 90, :set-by \"~/.tidyfmtrc\"}"));
    }

    #[test]
    fn test_url_loads_on_top() {
        let d = run(&["--url", "https://example/c.edn"], false, Some("{:tab-width 4}"));
        assert!(d.proceeds());
        let config = d.settings.config().unwrap();
        assert_eq!(config.width, 90);
        assert_eq!(config.tab_width, 4);
        assert_eq!(d.settings.set_by("tab-width"), Some("https://example/c.edn"));
    }

    #[test]
    fn test_url_only_ignores_local_configuration() {
        let d = run(
            &["--url-only", "https://example/c.edn"],
            true,
            Some("{:tab-width 4 :parallel? false}"),
        );
        assert!(d.proceeds());
        let config = d.settings.config().unwrap();
        assert_eq!(config.width, 80);
        assert_eq!(config.tab_width, 4);
        assert!(!d.op_options.parallel());
    }

    #[test]
    fn test_url_failure() {
        let d = run(&["-u", "https://example/c.edn"], false, None);
        assert_eq!(d.exit_code, 1);
        assert!(message(&d).contains("connection refused"));
    }

    #[test]
    fn test_url_invalid_remote_config() {
        let d = run(&["-u", "https://example/c.edn"], false, Some("{:width 2}"));
        assert_eq!(d.exit_code, 1);
        assert!(message(&d).contains("https://example/c.edn"));
    }

    #[test]
    fn test_default_and_standard_bypass_configuration() {
        let d = run(&["-d"], true, None);
        assert!(d.proceeds());
        assert_eq!(d.settings, Settings::defaults());

        let d = run(&["--standard"], true, None);
        assert!(d.proceeds());
        assert_eq!(d.settings.config().unwrap().width, 80);
        assert_eq!(d.settings.set_by("style"), Some("--standard"));
    }

    #[test]
    fn test_inline_map_applied() {
        let d = resolve_args(&["{:width 100 :parallel? false}"]);
        assert!(d.proceeds());
        assert_eq!(d.settings.config().unwrap().width, 100);
        assert_eq!(d.settings.set_by("width"), Some(COMMAND_LINE));
        assert!(!d.op_options.parallel());
    }

    #[test]
    fn test_inline_map_with_write() {
        let d = resolve_args(&["{:width 100}", "-w", "c.txt"]);
        assert!(d.proceeds());
        assert_eq!(d.settings.config().unwrap().width, 100);
    }

    #[test]
    fn test_inline_map_invalid_value() {
        let d = resolve_args(&["{:width 5}"]);
        assert_eq!(d.exit_code, 1);
        assert!(message(&d).contains(COMMAND_LINE));
    }

    #[test]
    fn test_write_without_files_proceeds() {
        let d = resolve_args(&["-w"]);
        assert!(d.proceeds());
    }
}
