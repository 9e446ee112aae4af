//! Template Evaluator - the expansion boundary
//!
//! The pipeline only knows [`TemplateEvaluator`]. The default is json-e
//! ([`JsonE`](crate::jsone::JsonE)). [`Interpolator`] is a small adapter that
//! expands `${...}` inside strings and mapping keys and can call helpers.

use thiserror::Error;

use crate::context::{ContextEntry, RenderContext};
use crate::value::{Mapping, Number, Value};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("{name} expects {expected} argument(s), got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("{0} is not a function")]
    NotCallable(String),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Helper failed: {0}")]
    Helper(String),

    #[error("json-e: {0}")]
    Template(String),
}

/// Expands one canonical document against a context.
pub trait TemplateEvaluator: Send + Sync {
    fn evaluate(&self, document: &Value, context: &RenderContext) -> Result<Value, EvalError>;
}

impl<E: TemplateEvaluator + ?Sized> TemplateEvaluator for Box<E> {
    fn evaluate(&self, document: &Value, context: &RenderContext) -> Result<Value, EvalError> {
        (**self).evaluate(document, context)
    }
}

/// String interpolation: `${name}`, `${a.b.c}`, `${helper(arg, 'lit', 3)}`.
///
/// `$${` produces a literal `${`. Sequences and mappings cannot be spliced
/// into text. Keys starting with a single `$` are json-e operators, which
/// this adapter does not implement, so they are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpolator;

impl TemplateEvaluator for Interpolator {
    fn evaluate(&self, document: &Value, context: &RenderContext) -> Result<Value, EvalError> {
        match document {
            Value::String(s) => Ok(Value::String(interpolate(s, context)?)),
            Value::Sequence(items) => items
                .iter()
                .map(|item| self.evaluate(item, context))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
            Value::Mapping(entries) => {
                let mut out = Mapping::new();
                for (key, value) in entries {
                    if key.starts_with('$') && !key.starts_with("$$") {
                        return Err(EvalError::Syntax(format!("unsupported operator {:?}", key)));
                    }
                    let rendered = interpolate(key, context)?;
                    if out.contains_key(&rendered) {
                        return Err(EvalError::TypeMismatch(format!(
                            "{:?} renders to duplicate key {:?}",
                            key, rendered
                        )));
                    }
                    out.insert(rendered, self.evaluate(value, context)?);
                }
                Ok(Value::Mapping(out))
            }
            scalar => Ok(scalar.clone()),
        }
    }
}

fn interpolate(text: &str, context: &RenderContext) -> Result<String, EvalError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find("${") {
        if rest[..pos].ends_with('$') {
            out.push_str(&rest[..pos - 1]);
            out.push_str("${");
            rest = &rest[pos + 2..];
            continue;
        }

        out.push_str(&rest[..pos]);
        let body = &rest[pos + 2..];
        let end = find_closing(body)
            .ok_or_else(|| EvalError::Syntax(format!("unterminated interpolation in {:?}", text)))?;

        let expr = ExprParser::parse(&body[..end])?;
        match eval(&expr, context)? {
            v @ (Value::Sequence(_) | Value::Mapping(_)) => {
                return Err(EvalError::TypeMismatch(format!(
                    "cannot interpolate a {} into {:?}",
                    v.kind(),
                    text
                )))
            }
            v => out.push_str(&v.to_string()),
        }
        rest = &body[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Byte offset of the `}` closing an interpolation, skipping quoted text.
fn find_closing(body: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '}') => return Some(i),
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Call(String, Vec<Expr>),
}

fn eval(expr: &Expr, context: &RenderContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Path(segments) => {
            let (head, tail) = segments
                .split_first()
                .ok_or_else(|| EvalError::Syntax("empty path".into()))?;
            let mut current = match context.get(head) {
                Some(ContextEntry::Value(v)) => v,
                Some(ContextEntry::Helper(_)) => {
                    return Err(EvalError::TypeMismatch(format!(
                        "{} is a function, not a value",
                        head
                    )))
                }
                None => return Err(EvalError::UndefinedVariable(head.clone())),
            };
            for segment in tail {
                current = current
                    .get(segment)
                    .ok_or_else(|| EvalError::UndefinedVariable(segments.join(".")))?;
            }
            Ok(current.clone())
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|a| eval(a, context))
                .collect::<Result<Vec<_>, _>>()?;
            context.call(name, &args)
        }
    }
}

struct ExprParser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> ExprParser<'s> {
    fn parse(src: &'s str) -> Result<Expr, EvalError> {
        let mut parser = Self { src, pos: 0 };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos != src.len() {
            return Err(EvalError::Syntax(format!(
                "unexpected {:?} in {:?}",
                &src[parser.pos..],
                src
            )));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'s str {
        let start = self.pos;
        while self.peek().map_or(false, &pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn expr(&mut self) -> Result<Expr, EvalError> {
        self.skip_ws();
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                let text = self.take_while(|c| c != q);
                if self.bump() != Some(q) {
                    return Err(EvalError::Syntax(format!("unterminated string in {:?}", self.src)));
                }
                Ok(Expr::Literal(Value::String(text.to_string())))
            }
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(c) if is_ident_start(c) => self.path_or_call(),
            _ => Err(EvalError::Syntax(format!("expected an expression in {:?}", self.src))),
        }
    }

    fn number(&mut self) -> Result<Expr, EvalError> {
        let text = self.take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Expr::Literal(Value::Number(Number::Integer(i))));
        }
        text.parse::<f64>()
            .map(|f| Expr::Literal(Value::Number(Number::Float(f))))
            .map_err(|_| EvalError::Syntax(format!("invalid number {:?}", text)))
    }

    fn path_or_call(&mut self) -> Result<Expr, EvalError> {
        let mut segments = vec![self.take_while(is_ident_char).to_string()];
        while self.peek() == Some('.') {
            self.bump();
            let segment = self.take_while(is_ident_char);
            if segment.is_empty() {
                return Err(EvalError::Syntax(format!("empty path segment in {:?}", self.src)));
            }
            segments.push(segment.to_string());
        }

        self.skip_ws();
        if self.peek() == Some('(') {
            self.bump();
            if segments.len() != 1 {
                return Err(EvalError::NotCallable(segments.join(".")));
            }
            let args = self.args()?;
            return Ok(Expr::Call(segments.remove(0), args));
        }

        if segments.len() == 1 {
            match segments[0].as_str() {
                "true" => return Ok(Expr::Literal(Value::Bool(true))),
                "false" => return Ok(Expr::Literal(Value::Bool(false))),
                "null" => return Ok(Expr::Literal(Value::Null)),
                _ => {}
            }
        }
        Ok(Expr::Path(segments))
    }

    fn args(&mut self) -> Result<Vec<Expr>, EvalError> {
        let mut args = vec![];
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(')') => return Ok(args),
                _ => return Err(EvalError::Syntax(format!("expected ',' or ')' in {:?}", self.src))),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
