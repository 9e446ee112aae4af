//! Render Pipeline - decode, evaluate, encode, per document
//!
//! Fail-fast: the first error aborts the whole render and no partial
//! output is returned.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::context::{ContextBuilder, ContextError, HelperRegistry, RenderContext};
use crate::decoder::{DecodeError, DocumentStream};
use crate::encoder::{encode, EncodeError, OutputFormat};
use crate::evaluator::{EvalError, TemplateEvaluator};
use crate::hashing::{fingerprint_document, fingerprint_documents};
use crate::jsone::JsonE;
use crate::request::{ConfigurationError, RenderRequest};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Decode error in document {index}: {source}")]
    Decode { index: usize, source: DecodeError },

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Template error in document {index}: {source}")]
    Eval { index: usize, source: EvalError },

    #[error("Encode error in document {index}: {source}")]
    Encode { index: usize, source: EncodeError },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Output of single-document mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedTemplate {
    pub rendered: String,
    pub id: String,
}

/// Output of multi-document mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedTemplates {
    pub rendered: Vec<String>,
    pub id: String,
}

/// The render pipeline - one evaluator, one helper table, any number of
/// independent render calls.
pub struct RenderPipeline<E = JsonE> {
    evaluator: E,
    helpers: HelperRegistry,
}

impl<E: TemplateEvaluator> RenderPipeline<E> {
    pub fn new(evaluator: E) -> Self {
        Self::with_helpers(evaluator, HelperRegistry::new())
    }

    pub fn with_helpers(evaluator: E, helpers: HelperRegistry) -> Self {
        Self { evaluator, helpers }
    }

    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    /// Validate the request and merge its context sources.
    pub fn build_context(&self, request: &RenderRequest) -> Result<RenderContext, PipelineError> {
        request.validate()?;
        let context = ContextBuilder::new(&self.helpers)
            .build(&request.context, request.secondary_text())?;
        Ok(context)
    }

    /// Render every document of `template`, in order.
    ///
    /// Zero documents is a valid, empty result.
    pub fn render_documents(
        &self,
        template: &str,
        format: OutputFormat,
        context: &RenderContext,
    ) -> Result<Vec<String>, PipelineError> {
        let mut stream = DocumentStream::new(template);
        let mut rendered = vec![];

        loop {
            let index = rendered.len();
            let document = match stream.decode_next() {
                Ok(Some(document)) => document,
                Ok(None) => break,
                Err(source) => return Err(PipelineError::Decode { index, source }),
            };
            debug!(index, kind = document.kind(), "decoded document");

            let result = self
                .evaluator
                .evaluate(&document, context)
                .map_err(|source| PipelineError::Eval { index, source })?;
            debug!(index, "evaluated document");

            let text = encode(&result, format)
                .map_err(|source| PipelineError::Encode { index, source })?;
            debug!(index, %format, bytes = text.len(), "encoded document");

            rendered.push(text);
        }

        info!(documents = rendered.len(), %format, "render complete");
        Ok(rendered)
    }

    /// Build the context for `request` and render all of its documents.
    pub fn render_request(&self, request: &RenderRequest) -> Result<Vec<String>, PipelineError> {
        let context = self.build_context(request)?;
        self.render_documents(&request.template, request.format, &context)
    }

    /// Single-document mode. Anything other than exactly one document,
    /// including none, is a configuration error.
    pub fn render_template(&self, request: &RenderRequest) -> Result<RenderedTemplate, PipelineError> {
        let mut rendered = self.render_request(request)?;
        if rendered.len() != 1 {
            return Err(ConfigurationError::DocumentCountMismatch {
                found: rendered.len(),
            }
            .into());
        }

        let rendered = rendered.remove(0);
        let id = fingerprint_document(&rendered);
        Ok(RenderedTemplate { rendered, id })
    }

    /// Multi-document mode. An empty template renders to an empty list.
    pub fn render_templates(&self, request: &RenderRequest) -> Result<RenderedTemplates, PipelineError> {
        let rendered = self.render_request(request)?;
        let id = fingerprint_documents(&rendered);
        Ok(RenderedTemplates { rendered, id })
    }
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new(JsonE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and returns documents untouched.
    #[derive(Default)]
    struct Passthrough {
        calls: AtomicUsize,
    }

    impl TemplateEvaluator for Passthrough {
        fn evaluate(&self, document: &Value, _: &RenderContext) -> Result<Value, EvalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(document.clone())
        }
    }

    struct Failing;

    impl TemplateEvaluator for Failing {
        fn evaluate(&self, _: &Value, _: &RenderContext) -> Result<Value, EvalError> {
            Err(EvalError::Helper("boom".into()))
        }
    }

    #[test]
    fn test_documents_in_order() {
        let pipeline = RenderPipeline::new(Passthrough::default());
        let out = pipeline
            .render_documents("a: 1\n---\nb: 2\n---\nc: 3\n", OutputFormat::Json, &RenderContext::default())
            .unwrap();
        assert_eq!(out, vec![r#"{"a":1}"#, r#"{"b":2}"#, r#"{"c":3}"#]);
        assert_eq!(pipeline.evaluator.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_empty_template_is_empty_output() {
        let pipeline = RenderPipeline::new(Passthrough::default());
        let out = pipeline
            .render_documents("# nothing\n", OutputFormat::Yaml, &RenderContext::default())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_eval_error_propagated_verbatim() {
        let pipeline = RenderPipeline::new(Failing);
        let err = pipeline
            .render_documents("a: 1", OutputFormat::Json, &RenderContext::default())
            .unwrap_err();
        match err {
            PipelineError::Eval { index, source } => {
                assert_eq!(index, 0);
                assert_eq!(source, EvalError::Helper("boom".into()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_failure_stops_before_later_documents() {
        let pipeline = RenderPipeline::new(Passthrough::default());
        let err = pipeline
            .render_documents("a: 1\n---\n1: x\n---\nc: 3\n", OutputFormat::Json, &RenderContext::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Decode { index: 1, source: DecodeError::NonStringKey { .. } }
        ));
        assert_eq!(pipeline.evaluator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_encode_failure_has_index() {
        let pipeline = RenderPipeline::new(Passthrough::default());
        let err = pipeline
            .render_documents("ok: 1\n---\nbad: .nan\n", OutputFormat::Json, &RenderContext::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Encode { index: 1, .. }));
    }

    #[test]
    fn test_conflicting_context_rejected_before_render() {
        let pipeline = RenderPipeline::new(Passthrough::default());
        let request = RenderRequest::new("a: 1").with_var("x", "1").with_yaml_context("x: 2");
        assert!(matches!(
            pipeline.render_templates(&request),
            Err(PipelineError::Configuration(ConfigurationError::ConflictingContext))
        ));
        assert_eq!(pipeline.evaluator.calls.load(Ordering::SeqCst), 0);
    }
}
