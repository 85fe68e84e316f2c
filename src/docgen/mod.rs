//! Document generation - business logic for producing signed cancellation
//! documents from structured case data.
//!
//! The pipeline is: `template` fills a letter body, `signature` decodes the
//! client's electronic signature, and `pdf` / `word` render the filled text
//! into downloadable binary documents.

pub mod common;
pub mod fonts;
pub mod pdf;
pub mod signature;
pub mod template;
pub mod validation;
pub mod word;

pub use pdf::{PdfRenderer, PdfRenderRequest, DocumentInfo};
pub use signature::{DecodedSignature, SignatureRejected, MIN_SIGNATURE_BYTES};
pub use template::{DocumentContent, SIGNATURE_PLACEHOLDER_LINE};
pub use validation::{validate_request, ValidationError, ValidationErrors};
pub use word::WordRenderer;

use thiserror::Error;

/// Product name stamped on letterheads, footers and PDF metadata.
pub const PRODUCT_NAME: &str = "Resilia";

/// Errors that can occur while rendering a single document.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("failed to load PDF font: {0}")]
    Font(String),
    #[error("failed to serialize PDF output: {0}")]
    PdfWrite(String),
    #[error("failed to post-process PDF document: {0}")]
    PdfDocument(#[source] lopdf::Error),
    #[error("no documents supplied for merging")]
    EmptyMerge,
    #[error("failed to pack Word document: {0}")]
    DocxPack(String),
}

/// Result of a successful document render: a named binary blob with its
/// declared content type, so the packaging layer never guesses from bytes.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub extension: &'static str,
}
