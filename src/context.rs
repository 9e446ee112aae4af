//! Render Context - variables plus helper functions
//!
//! Precedence, lowest first: built-in helpers, base context, secondary
//! (YAML) context.

use base64::Engine;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::decoder::{decode_single, DecodeError};
use crate::evaluator::EvalError;
use crate::value::{Mapping, Value};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContextError {
    #[error("Invalid secondary context: {0}")]
    InvalidSecondaryFormat(String),
}

impl From<DecodeError> for ContextError {
    fn from(e: DecodeError) -> Self {
        ContextError::InvalidSecondaryFormat(e.to_string())
    }
}

/// A callable exposed to templates under a fixed name.
pub trait HelperFunction: Send + Sync {
    fn name(&self) -> &'static str;
    fn arity(&self) -> usize;
    fn call(&self, args: &[Value]) -> Result<Value, EvalError>;
}

/// `base64encode(s)` - standard alphabet, padded.
pub struct Base64Encode;

impl HelperFunction for Base64Encode {
    fn name(&self) -> &'static str {
        "base64encode"
    }

    fn arity(&self) -> usize {
        1
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        match args {
            [Value::String(s)] => Ok(Value::String(
                base64::engine::general_purpose::STANDARD.encode(s.as_bytes()),
            )),
            [other] => Err(EvalError::TypeMismatch(format!(
                "{} expects a string, got {}",
                self.name(),
                other.kind()
            ))),
            _ => Err(EvalError::ArityMismatch {
                name: self.name().to_string(),
                expected: self.arity(),
                found: args.len(),
            }),
        }
    }
}

/// Helper table handed to each context build. No process-wide state.
#[derive(Clone)]
pub struct HelperRegistry {
    helpers: HashMap<&'static str, Arc<dyn HelperFunction>>,
}

impl HelperRegistry {
    /// Registry with the built-in helpers.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(Base64Encode));
        registry
    }

    pub fn empty() -> Self {
        Self {
            helpers: HashMap::new(),
        }
    }

    /// Add a helper, replacing any helper of the same name.
    pub fn register(&mut self, helper: Arc<dyn HelperFunction>) {
        self.helpers.insert(helper.name(), helper);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn HelperFunction>> {
        self.helpers.get(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.helpers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub enum ContextEntry {
    Value(Value),
    Helper(Arc<dyn HelperFunction>),
}

impl fmt::Debug for ContextEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextEntry::Value(v) => f.debug_tuple("Value").field(v).finish(),
            ContextEntry::Helper(h) => write!(f, "Helper({}/{})", h.name(), h.arity()),
        }
    }
}

/// Flat name lookup used during evaluation. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    entries: HashMap<String, ContextEntry>,
}

impl RenderContext {
    pub fn get(&self, name: &str) -> Option<&ContextEntry> {
        self.entries.get(name)
    }

    /// The plain value bound to `name`, if it is not a helper.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.entries.get(name) {
            Some(ContextEntry::Value(v)) => Some(v),
            _ => None,
        }
    }

    /// Plain value entries, helpers left out.
    pub fn values(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().filter_map(|(name, entry)| match entry {
            ContextEntry::Value(v) => Some((name.as_str(), v)),
            ContextEntry::Helper(_) => None,
        })
    }

    pub fn helper(&self, name: &str) -> Option<&Arc<dyn HelperFunction>> {
        match self.entries.get(name) {
            Some(ContextEntry::Helper(h)) => Some(h),
            _ => None,
        }
    }

    /// Invoke the helper bound to `name`, checking arity first.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        match self.entries.get(name) {
            Some(ContextEntry::Helper(helper)) => {
                if args.len() != helper.arity() {
                    return Err(EvalError::ArityMismatch {
                        name: name.to_string(),
                        expected: helper.arity(),
                        found: args.len(),
                    });
                }
                helper.call(args)
            }
            Some(ContextEntry::Value(_)) => Err(EvalError::NotCallable(name.to_string())),
            None => Err(EvalError::UndefinedVariable(name.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Merges helpers, a base mapping and optional YAML text into one context.
pub struct ContextBuilder<'h> {
    helpers: &'h HelperRegistry,
}

impl<'h> ContextBuilder<'h> {
    pub fn new(helpers: &'h HelperRegistry) -> Self {
        Self { helpers }
    }

    /// Build the context. Blank `secondary_text` counts as absent.
    ///
    /// Callers are expected not to populate both `base` and
    /// `secondary_text`; if they do, secondary keys win.
    pub fn build(
        &self,
        base: &Mapping,
        secondary_text: Option<&str>,
    ) -> Result<RenderContext, ContextError> {
        let mut entries: HashMap<String, ContextEntry> = self
            .helpers
            .helpers
            .iter()
            .map(|(name, helper)| (name.to_string(), ContextEntry::Helper(Arc::clone(helper))))
            .collect();

        for (key, value) in base {
            entries.insert(key.clone(), ContextEntry::Value(value.clone()));
        }

        if let Some(text) = secondary_text.filter(|t| !t.trim().is_empty()) {
            let secondary = parse_secondary(text)?;
            debug!(keys = secondary.len(), "merging secondary context");
            for (key, value) in secondary {
                entries.insert(key, ContextEntry::Value(value));
            }
        }

        Ok(RenderContext { entries })
    }
}

fn parse_secondary(text: &str) -> Result<Mapping, ContextError> {
    match decode_single(text)? {
        None | Some(Value::Null) => Ok(Mapping::new()),
        Some(Value::Mapping(m)) => Ok(m),
        Some(other) => Err(ContextError::InvalidSecondaryFormat(format!(
            "expected a mapping, got {}",
            other.kind()
        ))),
    }
}
