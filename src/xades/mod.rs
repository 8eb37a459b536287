//! XAdES-EPES enveloped signatures.
//!
//! The signing key lives behind a [`SigningProvider`]. This module digests
//! the canonical document, asks the provider for a signature over the
//! canonical bytes, embeds the `ds:Signature` block into the first
//! `ext:UBLExtension` and produces the final serialization.
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use dian_fe::core::*;
//! use dian_fe::xades::{self, SigningProvider};
//!
//! fn deliver(doc: InvoiceDocument, config: &IssuerConfig, keystore: &dyn SigningProvider) {
//!     let finalized = xades::sign_document(doc, config, keystore, Utc::now()).unwrap();
//!     xades::verify_enveloped_digest(finalized.xml()).unwrap();
//! }
//! ```

mod pipeline;
mod provider;
mod signature;
mod verify;

pub use pipeline::{
    DigestedDocument, FinalizedDocument, PendingSignature, SignedDocument, sign_document,
};
pub use provider::SigningProvider;
pub use signature::{
    SIGNATURE_ID, SIGNATURE_VALUE_ID, SIGNED_PROPERTIES_ID, SignatureBlock, embed_signature,
};
pub use verify::{EmbeddedSignature, read_signature, verify_enveloped_digest};
