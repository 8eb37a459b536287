use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while building, numbering, rendering or signing a document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FacturaError {
    /// One or more required fields are missing or invalid.
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// Builder encountered invalid or missing configuration.
    #[error("builder error: {0}")]
    Builder(String),

    /// The authorized numbering range has no numbers left.
    #[error("numbering range {prefix} exhausted (upper bound {upper})")]
    NumberRangeExhausted { prefix: String, upper: u64 },

    /// The signing provider could not locate the signer's certificate.
    #[error("certificate not found: {0}")]
    CertificateNotFound(String),

    /// The signing provider failed to produce a signature.
    #[error("signing provider error: {0}")]
    SigningProvider(String),

    /// The signing provider did not answer within the configured timeout.
    #[error("signing call timed out after {0:?}")]
    SigningTimeout(Duration),

    /// A pending signing call was cancelled before it completed.
    #[error("signing cancelled")]
    Cancelled,

    /// The document already carries a signature.
    #[error("document is already signed")]
    AlreadySigned,

    /// The digest handed to the embedder is not the digest of the canonical form.
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// XML rendering or canonicalization failure.
    #[error("XML error: {0}")]
    Xml(String),
}

impl FacturaError {
    /// Shorthand for a single-field validation failure.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![ValidationError::new(field, message)])
    }

    /// True for failures that only affect one document of a batch.
    ///
    /// Signing failures are collected into the batch report; everything else
    /// points at an input or programming defect and stops the run.
    pub fn is_document_local(&self) -> bool {
        matches!(
            self,
            Self::CertificateNotFound(_)
                | Self::SigningProvider(_)
                | Self::SigningTimeout(_)
                | Self::Cancelled
        )
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "customer.legal_name").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
