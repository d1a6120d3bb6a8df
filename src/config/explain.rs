//! Explain report: the effective configuration and where it came from

use std::fmt::Write as _;

use toml::{Table, Value};

use super::Settings;

/// Render `settings` as an options map, one top-level key per line
///
/// Keys set by anything other than the built-in defaults are shown as
/// `{:value V, :set-by "SOURCE"}`.
#[must_use]
pub fn explain_report(settings: &Settings) -> String {
    let mut out = format!(
        ";; {} {} effective configuration\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    let table = settings.as_table();
    if table.is_empty() {
        out.push_str("{}");
        return out;
    }

    let last = table.len() - 1;
    for (i, (key, value)) in table.iter().enumerate() {
        out.push_str(if i == 0 { "{" } else { " " });
        let _ = write!(out, ":{key} ");
        match settings.set_by(key) {
            Some(source) => {
                out.push_str("{:value ");
                render_value(&mut out, value);
                out.push_str(", :set-by ");
                render_string(&mut out, source);
                out.push('}');
            }
            None => render_value(&mut out, value),
        }
        out.push_str(if i == last { "}" } else { ",\n" });
    }
    out
}

/// Write `value` in options map syntax
pub fn render_value(out: &mut String, value: &Value) {
    match value {
        Value::String(s) => render_string(out, s),
        Value::Integer(n) => {
            let _ = write!(out, "{n}");
        }
        Value::Float(f) => {
            let _ = write!(out, "{f:?}");
        }
        Value::Boolean(b) => {
            let _ = write!(out, "{b}");
        }
        Value::Datetime(d) => render_string(out, &d.to_string()),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                render_value(out, item);
            }
            out.push(']');
        }
        Value::Table(table) => render_table(out, table),
    }
}

fn render_table(out: &mut String, table: &Table) {
    out.push('{');
    for (i, (key, value)) in table.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, ":{key} ");
        render_value(out, value);
    }
    out.push('}');
}

fn render_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}
