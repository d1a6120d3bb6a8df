//! Reader for the options map syntax
//!
//! Options given on the command line, in `TIDYFMT_OPTIONS`, in map-style rc
//! files and in remote `.edn` files share one syntax:
//!
//! ```text
//! {:width 100, :cache {:directory ".fmt"}, :style :compact} ; comment
//! ```
//!
//! Keywords lose their leading colon. Commas are whitespace. The result is a
//! `toml::Table` so every configuration source ends up in the same shape.

use std::iter::Peekable;
use std::str::CharIndices;

use toml::{Table, Value};

use crate::error::ReadError;

/// Read a single top-level map from `text`
///
/// Anything other than whitespace or comments after the closing brace is an
/// error.
pub fn read_map(text: &str) -> Result<Table, ReadError> {
    let mut reader = Reader::new(text);
    reader.skip_whitespace();
    match reader.peek() {
        Some('{') => {}
        Some(c) => return Err(reader.error(format!("expected a map but found '{c}'"))),
        None => return Err(reader.error("expected a map but found nothing")),
    }
    let map = reader.read_map()?;
    reader.skip_whitespace();
    if let Some(c) = reader.peek() {
        return Err(reader.error(format!("unexpected '{c}' after the map")));
    }
    Ok(map)
}

/// Cursor over the input text
struct Reader<'a> {
    text: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().peekable(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.text.len(), |&(i, _)| i)
    }

    fn bump(&mut self) -> Option<char> {
        self.chars.next().map(|(_, c)| c)
    }

    fn error(&mut self, message: impl Into<String>) -> ReadError {
        ReadError {
            message: message.into(),
            offset: self.offset(),
        }
    }

    /// Skip whitespace, commas and `;` comments
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.bump();
            } else if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_map(&mut self) -> Result<Table, ReadError> {
        self.bump(); // '{'
        let mut map = Table::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("unterminated map")),
                Some('}') => {
                    self.bump();
                    return Ok(map);
                }
                Some(_) => {}
            }

            let key_offset = self.offset();
            let key = match self.read_value()? {
                Value::String(key) => key,
                other => {
                    return Err(ReadError {
                        message: format!("map keys must be keywords or strings, found {other}"),
                        offset: key_offset,
                    })
                }
            };

            self.skip_whitespace();
            if matches!(self.peek(), None | Some('}')) {
                return Err(self.error(format!("missing value for key :{key}")));
            }
            let value = self.read_value()?;
            if map.insert(key.clone(), value).is_some() {
                return Err(ReadError {
                    message: format!("duplicate key :{key}"),
                    offset: key_offset,
                });
            }
        }
    }

    fn read_vector(&mut self) -> Result<Value, ReadError> {
        self.bump(); // '['
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error("unterminated vector")),
                Some(']') => {
                    self.bump();
                    return Ok(Value::Array(items));
                }
                Some(_) => items.push(self.read_value()?),
            }
        }
    }

    fn read_value(&mut self) -> Result<Value, ReadError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('{') => self.read_map().map(Value::Table),
            Some('[') => self.read_vector(),
            Some('"') => self.read_string().map(Value::String),
            Some(':') => {
                self.bump();
                let name = self.read_token();
                if name.is_empty() {
                    Err(self.error("empty keyword"))
                } else {
                    Ok(Value::String(name))
                }
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.read_number(),
            Some(c) if is_token_char(c) => {
                let start = self.offset();
                let token = self.read_token();
                match token.as_str() {
                    "true" => Ok(Value::Boolean(true)),
                    "false" => Ok(Value::Boolean(false)),
                    "nil" => Err(ReadError {
                        message: "nil is not a supported value".to_string(),
                        offset: start,
                    }),
                    _ => Err(ReadError {
                        message: format!("unexpected symbol '{token}'"),
                        offset: start,
                    }),
                }
            }
            Some(c) => Err(self.error(format!("unexpected '{c}'"))),
        }
    }

    fn read_token(&mut self) -> String {
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if !is_token_char(c) {
                break;
            }
            token.push(c);
            self.bump();
        }
        token
    }

    fn read_string(&mut self) -> Result<String, ReadError> {
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some(c) => return Err(self.error(format!("unknown escape '\\{c}'"))),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn read_number(&mut self) -> Result<Value, ReadError> {
        let start = self.offset();
        let token = self.read_token();
        if let Ok(n) = token.parse::<i64>() {
            return Ok(Value::Integer(n));
        }
        if let Ok(f) = token.parse::<f64>() {
            if f.is_finite() {
                return Ok(Value::Float(f));
            }
        }
        Err(ReadError {
            message: format!("invalid number '{token}'"),
            offset: start,
        })
    }
}

fn is_token_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ',' | ';' | '{' | '}' | '[' | ']' | '"' | '(' | ')')
}
