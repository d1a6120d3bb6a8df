//! Formatting engine
//!
//! The driver only needs [`Formatter`]: text in, text out, or an error. The
//! bundled [`TextFormatter`] is a line-oriented tidier for bracketed source
//! text:
//!
//! 1. reject unbalanced `()`, `[]`, `{}` outside strings and comments
//! 2. normalise line endings to `\n`
//! 3. expand tabs in leading whitespace
//! 4. trim trailing whitespace
//! 5. wrap long comment-only lines at word boundaries
//! 6. collapse runs of blank lines
//! 7. end the text with a single newline
//!
//! Every step is idempotent, so formatting formatted text is a no-op.

use regex::Regex;

use crate::config::Config;
use crate::error::FormatError;

/// A formatting engine
///
/// Implementations must be usable from several threads at once.
pub trait Formatter: Sync {
    /// Format `text`; `source` names the input in diagnostics
    fn format(&self, text: &str, source: &str) -> Result<String, FormatError>;
}

/// Reference engine driven by [`Config`]
#[derive(Debug, Clone)]
pub struct TextFormatter {
    config: Config,
    /// Matches a comment-only line: indentation, marker, content
    comment_re: Regex,
}

impl TextFormatter {
    pub fn new(config: Config) -> Result<Self, regex::Error> {
        let prefix = regex::escape(&config.comment_prefix);
        let comment_re = Regex::new(&format!(r"^([ \t]*)((?:{prefix})+)[ \t]*(.*)$"))?;
        Ok(Self { config, comment_re })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check bracket balance, ignoring strings and comments
    fn check_balance(&self, text: &str, source: &str) -> Result<(), FormatError> {
        let fail = |detail: String| FormatError {
            source_name: source.to_string(),
            detail,
        };
        let prefix = self.config.comment_prefix.as_str();
        let mut stack: Vec<(char, usize, usize)> = Vec::new();
        let mut string_start: Option<(usize, usize)> = None;
        let mut in_comment = false;
        let mut escaped = false;
        let mut line = 1;
        let mut column = 0;

        for (i, c) in text.char_indices() {
            if c == '\n' {
                line += 1;
                column = 0;
                in_comment = false;
                escaped = false;
                continue;
            }
            column += 1;

            if in_comment {
                continue;
            }
            if escaped {
                escaped = false;
                continue;
            }
            if c == '\\' {
                escaped = true;
                continue;
            }
            if string_start.is_some() {
                if c == '"' {
                    string_start = None;
                }
                continue;
            }
            if text[i..].starts_with(prefix) {
                in_comment = true;
                continue;
            }

            match c {
                '"' => string_start = Some((line, column)),
                '(' | '[' | '{' => stack.push((c, line, column)),
                ')' | ']' | '}' => {
                    let open = matching_open(c);
                    match stack.pop() {
                        Some((o, _, _)) if o == open => {}
                        Some((o, l, col)) => {
                            return Err(fail(format!(
                                "Mismatched '{c}' at line {line}, column {column}, \
                                 expected '{}' to close '{o}' from line {l}, column {col}",
                                matching_close(o)
                            )));
                        }
                        None => {
                            return Err(fail(format!(
                                "Unmatched '{c}' at line {line}, column {column}"
                            )));
                        }
                    }
                }
                _ => {}
            }
        }

        if let Some((l, col)) = string_start {
            return Err(fail(format!(
                "Unterminated string starting at line {l}, column {col}"
            )));
        }
        if let Some((o, l, col)) = stack.pop() {
            return Err(fail(format!("Unclosed '{o}' from line {l}, column {col}")));
        }
        Ok(())
    }

    /// Replace tabs in the leading whitespace with spaces up to the next stop
    fn expand_leading_tabs(&self, line: &str) -> String {
        let tab_width = self.config.tab_width;
        let split = line
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(line.len());
        let (lead, rest) = line.split_at(split);
        if !lead.contains('\t') {
            return line.to_string();
        }
        let mut width = 0;
        for c in lead.chars() {
            if c == '\t' {
                width += tab_width - width % tab_width;
            } else {
                width += 1;
            }
        }
        format!("{}{rest}", " ".repeat(width))
    }

    /// Wrap a comment-only line longer than the configured width
    fn wrap_comment(&self, line: &str) -> Vec<String> {
        let width = self.config.width;
        if line.chars().count() <= width {
            return vec![line.to_string()];
        }
        let Some(caps) = self.comment_re.captures(line) else {
            return vec![line.to_string()];
        };
        let lead = format!("{}{} ", &caps[1], &caps[2]);
        let lead_width = lead.chars().count();

        let mut lines = Vec::new();
        let mut current = lead.clone();
        let mut current_width = lead_width;
        for word in caps[3].split_whitespace() {
            let word_width = word.chars().count();
            if current_width > lead_width && current_width + 1 + word_width > width {
                lines.push(std::mem::replace(&mut current, lead.clone()));
                current_width = lead_width;
            }
            if current_width > lead_width {
                current.push(' ');
                current_width += 1;
            }
            current.push_str(word);
            current_width += word_width;
        }
        if current_width > lead_width {
            lines.push(current);
        }
        if lines.is_empty() {
            lines.push(line.to_string());
        }
        lines
    }
}

fn matching_open(close: char) -> char {
    match close {
        ')' => '(',
        ']' => '[',
        _ => '{',
    }
}

fn matching_close(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

impl Formatter for TextFormatter {
    fn format(&self, text: &str, source: &str) -> Result<String, FormatError> {
        let config = &self.config;
        if config.check_balance {
            self.check_balance(text, source)?;
        }

        let text = text.replace("\r\n", "\n");
        let ends_with_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(&text);

        let mut lines: Vec<String> = Vec::new();
        let mut blank_run = 0;
        if !body.is_empty() || ends_with_newline {
            for raw in body.split('\n') {
                let mut line = if config.expand_tabs {
                    self.expand_leading_tabs(raw)
                } else {
                    raw.to_string()
                };
                if config.trim_trailing {
                    line.truncate(line.trim_end_matches([' ', '\t']).len());
                }

                if line.trim().is_empty() {
                    // Leading blank lines are dropped entirely
                    if !lines.is_empty() && blank_run < config.max_blank_lines {
                        lines.push(line);
                    }
                    blank_run += 1;
                    continue;
                }
                blank_run = 0;

                if config.wrap_comments {
                    lines.extend(self.wrap_comment(&line));
                } else {
                    lines.push(line);
                }
            }
        }

        if config.final_newline {
            while lines.last().is_some_and(|l| l.trim().is_empty()) {
                lines.pop();
            }
            if lines.is_empty() {
                return Ok(String::new());
            }
            let mut out = lines.join("\n");
            out.push('\n');
            return Ok(out);
        }

        let mut out = lines.join("\n");
        if ends_with_newline && !out.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }
}
