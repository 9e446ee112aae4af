//! Structured Decoder - multi-document YAML streams
//!
//! Stage 1 parses one document with the permissive YAML grammar (tags,
//! arbitrary keys). Stage 2 normalizes that tree into the canonical
//! [`Value`], rejecting anything the canonical model cannot hold.

use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::trace;

use crate::value::{Mapping, Number, Value};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecodeError {
    #[error("Syntax error: {message}")]
    Syntax { message: String },

    #[error("Mapping key must be a string, found {key}")]
    NonStringKey { key: String },

    #[error("Expected a single document, found {found}")]
    MultipleDocuments { found: usize },
}

/// Forward-only stream of documents from one input text.
pub struct DocumentStream<'a> {
    documents: serde_yaml::Deserializer<'a>,
    /// Per parsed document, whether its own section held anything but
    /// blanks, comments and markers.
    content: VecDeque<bool>,
    decoded: usize,
    finished: bool,
}

impl<'a> DocumentStream<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            documents: serde_yaml::Deserializer::from_str(text),
            content: scan_sections(text),
            decoded: 0,
            finished: false,
        }
    }

    /// Number of documents handed out so far.
    pub fn decoded(&self) -> usize {
        self.decoded
    }

    /// Decode the next document. `Ok(None)` is end of stream.
    ///
    /// Once an error has been returned the stream is exhausted.
    pub fn decode_next(&mut self) -> Result<Option<Value>, DecodeError> {
        if self.finished {
            return Ok(None);
        }

        let raw = loop {
            let Some(document) = self.documents.next() else {
                self.finished = true;
                return Ok(None);
            };
            let has_content = self.content.pop_front().unwrap_or(false);

            let raw = match YamlValue::deserialize(document) {
                Ok(raw) => raw,
                Err(e) => {
                    self.finished = true;
                    return Err(DecodeError::Syntax { message: e.to_string() });
                }
            };

            // A section holding only comments and markers is not a document.
            // An explicit `null` or `~` is content and stays.
            if raw.is_null() && !has_content {
                trace!("skipping empty document section");
                continue;
            }
            break raw;
        };

        let value = normalize(raw).map_err(|e| {
            self.finished = true;
            e
        })?;
        self.decoded += 1;
        Ok(Some(value))
    }
}

impl<'a> Iterator for DocumentStream<'a> {
    type Item = Result<Value, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode_next().transpose()
    }
}

/// Decode text that must hold at most one document.
///
/// Returns `Ok(None)` when the text holds no document at all.
pub fn decode_single(text: &str) -> Result<Option<Value>, DecodeError> {
    let mut stream = DocumentStream::new(text);
    let first = stream.decode_next()?;
    if first.is_some() && stream.decode_next()?.is_some() {
        let found = 2 + stream.by_ref().count();
        return Err(DecodeError::MultipleDocuments { found });
    }
    Ok(first)
}

/// Convert a permissive YAML tree into the canonical model.
pub fn normalize(raw: YamlValue) -> Result<Value, DecodeError> {
    let value = match raw {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(b),
        YamlValue::Number(n) => Value::Number(normalize_number(&n)),
        YamlValue::String(s) => Value::String(s),
        YamlValue::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(normalize)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        YamlValue::Mapping(entries) => {
            let mut mapping = Mapping::new();
            for (key, value) in entries {
                let key = match strip_tags(key) {
                    YamlValue::String(s) => s,
                    other => {
                        return Err(DecodeError::NonStringKey {
                            key: describe_key(&other),
                        })
                    }
                };
                mapping.insert(key, normalize(value)?);
            }
            Value::Mapping(mapping)
        }
        YamlValue::Tagged(tagged) => normalize(tagged.value)?,
    };
    Ok(value)
}

impl TryFrom<YamlValue> for Value {
    type Error = DecodeError;

    fn try_from(raw: YamlValue) -> Result<Self, Self::Error> {
        normalize(raw)
    }
}

fn normalize_number(n: &serde_yaml::Number) -> Number {
    if let Some(i) = n.as_i64() {
        Number::Integer(i)
    } else if let Some(u) = n.as_u64() {
        Number::Unsigned(u)
    } else {
        Number::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn strip_tags(mut value: YamlValue) -> YamlValue {
    while let YamlValue::Tagged(tagged) = value {
        value = tagged.value;
    }
    value
}

fn describe_key(key: &YamlValue) -> String {
    match serde_yaml::to_string(key) {
        Ok(text) => text.trim_end().to_string(),
        Err(_) => format!("{:?}", key),
    }
}

/// Split `text` at document markers and record, for each document the YAML
/// parser will report, whether that section holds any content.
///
/// Markers only count at column 0. Text after `---` on the marker line is
/// content of the new document.
fn scan_sections(text: &str) -> VecDeque<bool> {
    let mut sections = VecDeque::new();
    let mut open: Option<bool> = None;

    for line in text.lines() {
        if let Some(rest) = marker_rest(line, "---") {
            sections.extend(open.take());
            open = Some(!is_blank_or_comment(rest));
        } else if marker_rest(line, "...").is_some() {
            sections.extend(open.take());
        } else if is_blank_or_comment(line) || (open.is_none() && line.starts_with('%')) {
            continue;
        } else {
            open = Some(true);
        }
    }
    sections.extend(open);
    sections
}

/// The text after `marker` when `line` starts with it as a whole token.
fn marker_rest<'l>(line: &'l str, marker: &str) -> Option<&'l str> {
    let rest = line.strip_prefix(marker)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}

fn is_blank_or_comment(rest: &str) -> bool {
    let rest = rest.trim();
    rest.is_empty() || rest.starts_with('#')
}
