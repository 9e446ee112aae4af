//! JSON-e Evaluator - the default template language
//!
//! Bridges the canonical model to the `json-e` crate through
//! `serde_json::Value`. Operators (`$map`, `$eval`, `$if`, `each(x)` ...),
//! `${...}` interpolation and the `$${` escape all come from json-e.
//!
//! Helpers are Rust functions and have no JSON form, so they are not passed
//! to json-e. Templates that call helpers render with
//! [`Interpolator`](crate::evaluator::Interpolator).

use tracing::trace;

use crate::context::RenderContext;
use crate::encoder::to_json;
use crate::evaluator::{EvalError, TemplateEvaluator};
use crate::value::{Mapping, Number, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonE;

impl TemplateEvaluator for JsonE {
    fn evaluate(&self, document: &Value, context: &RenderContext) -> Result<Value, EvalError> {
        let template = bridge(document)?;

        let mut bindings = serde_json::Map::new();
        for (name, value) in context.values() {
            bindings.insert(name.to_string(), bridge(value)?);
        }
        trace!(entries = bindings.len(), "json-e context");

        let rendered = json_e::render(&template, &serde_json::Value::Object(bindings))
            .map_err(|e| EvalError::Template(e.to_string()))?;
        Ok(from_json(rendered))
    }
}

fn bridge(value: &Value) -> Result<serde_json::Value, EvalError> {
    to_json(value).map_err(|e| EvalError::TypeMismatch(e.to_string()))
}

/// json-e numbers are doubles. Whole results come back as integers.
fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(number(&n)),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Sequence(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(entries) => Value::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect::<Mapping>(),
        ),
    }
}

fn number(n: &serde_json::Number) -> Number {
    if let Some(i) = n.as_i64() {
        return Number::Integer(i);
    }
    if let Some(u) = n.as_u64() {
        return Number::Unsigned(u);
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Number::Integer(f as i64),
        Some(f) => Number::Float(f),
        None => Number::Float(f64::NAN),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextBuilder, HelperRegistry};
    use crate::decoder::decode_single;

    fn context(yaml: &str) -> RenderContext {
        ContextBuilder::new(&HelperRegistry::new())
            .build(&Mapping::new(), Some(yaml))
            .unwrap()
    }

    fn render(template: &str, ctx: &RenderContext) -> Result<Value, EvalError> {
        let document = decode_single(template).unwrap().unwrap();
        JsonE.evaluate(&document, ctx)
    }

    fn yaml(text: &str) -> Value {
        decode_single(text).unwrap().unwrap()
    }

    #[test]
    fn test_interpolation() {
        let ctx = context("something: hello");
        assert_eq!(render("foo: ${something}", &ctx).unwrap(), yaml("foo: hello"));
    }

    #[test]
    fn test_map_and_eval_operators() {
        let ctx = context("a: 1");
        let out = render("baz: {$map: [123, 456], each(x): {$eval: 'x + a'}}", &ctx).unwrap();
        assert_eq!(out, yaml("baz: [124, 457]"));
    }

    #[test]
    fn test_escape_and_map() {
        let ctx = context("unused: 0");
        let out = render("baz: {$map: [hey, whoa], each(x): '$${base64encode(${x})}'}", &ctx).unwrap();
        assert_eq!(
            out,
            yaml("baz: ['${base64encode(hey)}', '${base64encode(whoa)}']")
        );
    }

    #[test]
    fn test_eval_keeps_types() {
        let ctx = context("n: 3\nflag: true\nratio: 0.5");
        let out = render("n: {$eval: n}\nflag: {$eval: flag}\nratio: {$eval: ratio}", &ctx).unwrap();
        assert_eq!(out, yaml("n: 3\nflag: true\nratio: 0.5"));
    }

    #[test]
    fn test_helpers_are_not_bridged() {
        let ctx = context("x: hey");
        assert!(matches!(
            render("v: ${base64encode(x)}", &ctx),
            Err(EvalError::Template(_))
        ));
    }

    #[test]
    fn test_undefined_variable() {
        let err = render("b: ${missing}", &context("a: 1")).unwrap_err();
        assert!(matches!(err, EvalError::Template(ref m) if m.contains("missing")));
    }

    #[test]
    fn test_whole_doubles_become_integers() {
        assert_eq!(number(&serde_json::Number::from_f64(124.0).unwrap()), Number::Integer(124));
        assert_eq!(number(&serde_json::Number::from_f64(1.5).unwrap()), Number::Float(1.5));
    }
}
