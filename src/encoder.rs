//! Output Encoder - JSON or YAML text

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::request::ConfigurationError;
use crate::value::{Number, Value};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    #[error("Value cannot be encoded: {reason}")]
    Unencodable { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            other => Err(ConfigurationError::InvalidFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// Serialize a rendered value. JSON is compact with sorted keys.
pub fn encode(value: &Value, format: OutputFormat) -> Result<String, EncodeError> {
    match format {
        OutputFormat::Json => {
            let json = to_json(value)?;
            serde_json::to_string(&json).map_err(|e| EncodeError::Unencodable {
                reason: e.to_string(),
            })
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(&to_yaml(value)).map_err(|e| EncodeError::Unencodable {
                reason: e.to_string(),
            })
        }
    }
}

pub(crate) fn to_json(value: &Value) -> Result<serde_json::Value, EncodeError> {
    let json = match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(Number::Integer(i)) => serde_json::Value::from(*i),
        Value::Number(Number::Unsigned(u)) => serde_json::Value::from(*u),
        Value::Number(n) if !n.is_finite() => {
            return Err(EncodeError::Unencodable {
                reason: format!("{} is not representable in JSON", n),
            })
        }
        Value::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| EncodeError::Unencodable {
                reason: format!("{} is not representable in JSON", f),
            })?,
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Sequence(items) => serde_json::Value::Array(
            items.iter().map(to_json).collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Mapping(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                map.insert(k.clone(), to_json(v)?);
            }
            serde_json::Value::Object(map)
        }
    };
    Ok(json)
}

fn to_yaml(value: &Value) -> serde_yaml::Value {
    use serde_yaml::Value as Y;

    match value {
        Value::Null => Y::Null,
        Value::Bool(b) => Y::Bool(*b),
        Value::Number(Number::Integer(i)) => Y::Number((*i).into()),
        Value::Number(Number::Unsigned(u)) => Y::Number((*u).into()),
        Value::Number(Number::Float(f)) => Y::Number((*f).into()),
        Value::String(s) => Y::String(s.clone()),
        Value::Sequence(items) => Y::Sequence(items.iter().map(to_yaml).collect()),
        Value::Mapping(entries) => {
            let mut mapping = serde_yaml::Mapping::new();
            for (k, v) in entries {
                mapping.insert(Y::String(k.clone()), to_yaml(v));
            }
            Y::Mapping(mapping)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode_single;

    fn sample() -> Value {
        Value::from_pairs([
            ("null", Value::Null),
            ("flag", Value::Bool(true)),
            ("int", Value::from(-42i64)),
            ("big", Value::from(u64::MAX)),
            ("float", Value::from(2.5)),
            ("whole_float", Value::from(3.0)),
            ("numeric_string", Value::from("123")),
            ("bool_string", Value::from("true")),
            (
                "nested",
                Value::Sequence(vec![
                    Value::from_pairs([("k", Value::from("v"))]),
                    Value::Sequence(vec![]),
                ]),
            ),
        ])
    }

    #[test]
    fn test_json_is_compact_and_sorted() {
        let v = Value::from_pairs([("z", Value::from(1i64)), ("a", Value::from("x"))]);
        assert_eq!(encode(&v, OutputFormat::Json).unwrap(), r#"{"a":"x","z":1}"#);
    }

    #[test]
    fn test_round_trip_both_formats() {
        for format in [OutputFormat::Json, OutputFormat::Yaml] {
            let text = encode(&sample(), format).unwrap();
            assert_eq!(decode_single(&text).unwrap(), Some(sample()), "format {format}");
        }
    }

    #[test]
    fn test_yaml_output() {
        let v = Value::from_pairs([("foo", Value::from("hello"))]);
        assert_eq!(encode(&v, OutputFormat::Yaml).unwrap(), "foo: hello\n");
    }

    #[test]
    fn test_non_finite_rejected_in_json_only() {
        let v = Value::Sequence(vec![Value::from(f64::NAN)]);
        assert!(matches!(
            encode(&v, OutputFormat::Json),
            Err(EncodeError::Unencodable { .. })
        ));
        assert!(encode(&Value::from(f64::INFINITY), OutputFormat::Yaml).is_ok());
    }

    #[test]
    fn test_format_selector() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yaml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!(
            "xml".parse::<OutputFormat>(),
            Err(ConfigurationError::InvalidFormat("xml".into()))
        );
        assert!("JSON".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Json);
    }
}
