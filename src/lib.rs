//! Rendermill Core - Multi-Document Template Rendering
//!
//! Text in, text out:
//! 1. Split the template into documents (YAML stream, JSON is fine too)
//! 2. Normalize each into the canonical value model
//! 3. Expand it against one merged context
//! 4. Encode as JSON or YAML
//! 5. Fingerprint the result

pub mod value;
pub mod decoder;
pub mod context;
pub mod evaluator;
pub mod jsone;
pub mod encoder;
pub mod hashing;
pub mod request;
pub mod pipeline;

pub use value::{Mapping, Number, Value};
pub use decoder::{decode_single, DecodeError, DocumentStream};
pub use context::{Base64Encode, ContextBuilder, ContextEntry, ContextError, HelperFunction, HelperRegistry, RenderContext};
pub use evaluator::{EvalError, Interpolator, TemplateEvaluator};
pub use jsone::JsonE;
pub use encoder::{encode, EncodeError, OutputFormat};
pub use hashing::{fingerprint_document, fingerprint_documents, sha256_hex};
pub use request::{ConfigurationError, RenderRequest};
pub use pipeline::{PipelineError, RenderPipeline, RenderedTemplate, RenderedTemplates};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
