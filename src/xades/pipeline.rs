//! Signing lifecycle of a document.
//!
//! Each stage is its own type, so stages cannot be skipped or repeated:
//!
//! ```text
//! InvoiceDocument ─prepare─▶ DigestedDocument ─request_signature─▶ PendingSignature
//!     ─complete / sign_with─▶ SignedDocument ─finalize─▶ FinalizedDocument
//! ```
//!
//! The digest is computed once, in [`DigestedDocument::prepare`], and carried
//! unchanged into the signature block. Nothing downstream re-renders the
//! unsigned tree.

use chrono::{DateTime, Utc};

use super::provider::SigningProvider;
use super::signature::{SignatureBlock, embed_signature};
use crate::core::{FacturaError, FiscalIdentifier, InvoiceDocument, IssuerConfig, SignaturePolicy};
use crate::ubl::{CanonicalForm, Element, build_document_tree, render_canonical};

const XML_DECLARATION: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// A document whose canonical form and digest have been computed.
#[derive(Debug, Clone)]
pub struct DigestedDocument {
    document: InvoiceDocument,
    fiscal_identifier: FiscalIdentifier,
    tree: Element,
    canonical: CanonicalForm,
    policy: Option<SignaturePolicy>,
}

impl DigestedDocument {
    /// Render, canonicalize and digest a document that carries its fiscal identifier.
    pub fn prepare(document: InvoiceDocument, config: &IssuerConfig) -> Result<Self, FacturaError> {
        let tree = build_document_tree(&document, config)?;
        let canonical = render_canonical(&tree)?;
        let fiscal_identifier = document
            .fiscal_identifier()
            .cloned()
            .ok_or_else(|| FacturaError::invalid("fiscal_identifier", "missing"))?;

        tracing::debug!(
            number = %document.number(),
            digest = %canonical.digest_hex(),
            bytes = canonical.bytes().len(),
            "document digested"
        );
        Ok(Self {
            document,
            fiscal_identifier,
            tree,
            canonical,
            policy: config.signature_policy.clone(),
        })
    }

    pub fn document(&self) -> &InvoiceDocument {
        &self.document
    }

    pub fn canonical(&self) -> &CanonicalForm {
        &self.canonical
    }

    pub fn digest(&self) -> &[u8; 32] {
        self.canonical.digest()
    }

    /// Hand the canonical bytes over for signing.
    pub fn request_signature(self) -> PendingSignature {
        tracing::debug!(number = %self.document.number(), "signature requested");
        PendingSignature { digested: self }
    }
}

/// A document waiting for the signing provider's answer.
#[derive(Debug, Clone)]
pub struct PendingSignature {
    digested: DigestedDocument,
}

impl PendingSignature {
    /// Bytes the provider must sign: the canonical pre-signature document.
    pub fn payload(&self) -> &[u8] {
        self.digested.canonical.bytes()
    }

    pub fn digest(&self) -> &[u8; 32] {
        self.digested.digest()
    }

    pub fn document(&self) -> &InvoiceDocument {
        &self.digested.document
    }

    /// Embed a signature obtained out of band.
    pub fn complete(
        self,
        signature_value: Vec<u8>,
        certificate: Vec<u8>,
        signing_time: DateTime<Utc>,
    ) -> Result<SignedDocument, FacturaError> {
        let DigestedDocument {
            document,
            fiscal_identifier,
            mut tree,
            canonical,
            policy,
        } = self.digested;

        let block = SignatureBlock::new(
            *canonical.digest(),
            signature_value,
            certificate,
            signing_time,
        )
        .with_policy(policy);
        embed_signature(&mut tree, &block, &fiscal_identifier.value)?;

        tracing::info!(
            number = %document.number(),
            fiscal_id = %fiscal_identifier,
            "signature embedded"
        );
        Ok(SignedDocument {
            document,
            fiscal_identifier,
            tree,
            signature: block,
        })
    }

    /// Ask `provider` for the certificate and a signature over [`payload`](Self::payload).
    pub fn sign_with<P: SigningProvider + ?Sized>(
        self,
        provider: &P,
        signing_time: DateTime<Utc>,
    ) -> Result<SignedDocument, FacturaError> {
        let certificate = provider.certificate()?;
        let signature = provider.sign(self.payload())?;
        self.complete(signature, certificate, signing_time)
    }
}

/// A document with its signature embedded. It can no longer be modified.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    document: InvoiceDocument,
    fiscal_identifier: FiscalIdentifier,
    tree: Element,
    signature: SignatureBlock,
}

impl SignedDocument {
    pub fn document(&self) -> &InvoiceDocument {
        &self.document
    }

    pub fn signature(&self) -> &SignatureBlock {
        &self.signature
    }

    pub fn tree(&self) -> &Element {
        &self.tree
    }

    /// Produce the final canonical serialization.
    pub fn finalize(self) -> Result<FinalizedDocument, FacturaError> {
        let canonical = render_canonical(&self.tree)?;
        let mut xml = Vec::with_capacity(XML_DECLARATION.len() + canonical.bytes().len());
        xml.extend_from_slice(XML_DECLARATION);
        xml.extend_from_slice(canonical.bytes());

        tracing::info!(
            number = %self.document.number(),
            bytes = xml.len(),
            "document finalized"
        );
        Ok(FinalizedDocument {
            document: self.document,
            fiscal_identifier: self.fiscal_identifier,
            signature: self.signature,
            xml,
        })
    }
}

/// The signed document as delivered to the authority.
#[derive(Debug, Clone)]
pub struct FinalizedDocument {
    document: InvoiceDocument,
    fiscal_identifier: FiscalIdentifier,
    signature: SignatureBlock,
    xml: Vec<u8>,
}

impl FinalizedDocument {
    pub fn document(&self) -> &InvoiceDocument {
        &self.document
    }

    pub fn fiscal_identifier(&self) -> &FiscalIdentifier {
        &self.fiscal_identifier
    }

    pub fn signature(&self) -> &SignatureBlock {
        &self.signature
    }

    /// UTF-8 XML: declaration followed by the canonical signed document.
    pub fn xml(&self) -> &[u8] {
        &self.xml
    }

    pub fn xml_string(&self) -> Result<String, FacturaError> {
        String::from_utf8(self.xml.clone())
            .map_err(|e| FacturaError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn into_xml(self) -> Vec<u8> {
        self.xml
    }
}

/// Run the whole lifecycle synchronously with one provider.
///
/// Computes the fiscal identifier if the document does not carry one yet.
pub fn sign_document<P: SigningProvider + ?Sized>(
    document: InvoiceDocument,
    config: &IssuerConfig,
    provider: &P,
    signing_time: DateTime<Utc>,
) -> Result<FinalizedDocument, FacturaError> {
    let document = match document.fiscal_identifier() {
        Some(_) => document,
        None => crate::fiscal::assign_fiscal_identifier(document, config)?,
    };
    DigestedDocument::prepare(document, config)?
        .request_signature()
        .sign_with(provider, signing_time)?
        .finalize()
}
