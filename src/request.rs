//! Render Requests - caller-level configuration
//!
//! A request names the template text, the output format and at most one
//! context source. Misuse is reported as [`ConfigurationError`] before any
//! rendering starts.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::encoder::OutputFormat;
use crate::value::{Mapping, Value};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Invalid output format '{0}', expected json or yaml")]
    InvalidFormat(String),

    #[error("context and yaml_context are mutually exclusive")]
    ConflictingContext,

    #[error("Template must contain exactly one document, found {found}")]
    DocumentCountMismatch { found: usize },

    #[error("Failed to load request {path}: {reason}")]
    Load { path: String, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RenderRequest {
    /// Template text, one or more YAML/JSON documents.
    pub template: String,
    #[serde(default)]
    pub format: OutputFormat,
    /// Base variables.
    #[serde(default)]
    pub context: Mapping,
    /// Variables as YAML text, for when types matter.
    #[serde(default)]
    pub yaml_context: Option<String>,
}

impl RenderRequest {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(name.into(), value.into());
        self
    }

    pub fn with_yaml_context(mut self, text: impl Into<String>) -> Self {
        self.yaml_context = Some(text.into());
        self
    }

    /// YAML context text, if present and not blank.
    pub fn secondary_text(&self) -> Option<&str> {
        self.yaml_context.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.context.is_empty() && self.secondary_text().is_some() {
            return Err(ConfigurationError::ConflictingContext);
        }
        Ok(())
    }

    /// Load a request file. `.json` files are read as JSON, anything else
    /// as YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let load_err = |reason: String| ConfigurationError::Load {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let request: RenderRequest = if path.extension().map_or(false, |e| e == "json") {
            serde_json::from_str(&content).map_err(|e| load_err(e.to_string()))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| load_err(e.to_string()))?
        };

        request.validate()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request: RenderRequest = serde_json::from_str(r#"{"template": "a: 1"}"#).unwrap();
        assert_eq!(request.format, OutputFormat::Json);
        assert!(request.context.is_empty());
        assert_eq!(request.secondary_text(), None);
    }

    #[test]
    fn test_conflicting_context() {
        let request = RenderRequest::new("a: 1")
            .with_var("a", 1i64)
            .with_yaml_context("a: 2");
        assert_eq!(request.validate(), Err(ConfigurationError::ConflictingContext));

        let blank = RenderRequest::new("a: 1").with_var("a", 1i64).with_yaml_context("  ");
        assert!(blank.validate().is_ok());
    }

    #[test]
    fn test_invalid_format_rejected_on_parse() {
        let parsed = serde_yaml::from_str::<RenderRequest>("template: x\nformat: xml\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_typed_context_from_yaml() {
        let request: RenderRequest =
            serde_yaml::from_str("template: x\nformat: yaml\ncontext:\n  n: 3\n  s: three\n").unwrap();
        assert_eq!(request.format, OutputFormat::Yaml);
        assert_eq!(request.context.get("n"), Some(&Value::from(3i64)));
        assert_eq!(request.context.get("s"), Some(&Value::from("three")));
    }
}
