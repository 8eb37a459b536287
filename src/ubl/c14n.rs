//! Inclusive canonical XML 1.0 (without comments) and the SHA-256 digest.
//!
//! Canonicalization removes the serialization choices that do not change the
//! document's information content: the XML declaration, attribute order and
//! quoting, empty-element syntax, redundant namespace declarations, character
//! references and line endings. Two documents that differ only in those
//! choices produce byte-identical output.
//!
//! Text nodes are data in C14N, including whitespace between elements, so
//! re-indenting a document does change its canonical form.
//!
//! Parsing and canonicalization are done by libxml2. The parser runs without
//! recovery, so input that is not well-formed is rejected.

use libxml::parser::{Parser, ParserOptions};
use libxml::tree::{Document, c14n};
use libxml::xpath;
use sha2::{Digest, Sha256};

use super::ns;
use super::tree::Element;
use super::writer::render_compact;
use crate::core::FacturaError;

/// Canonical bytes of a document and their SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalForm {
    bytes: Vec<u8>,
    digest: [u8; 32],
}

impl CanonicalForm {
    /// Canonicalize `xml` and digest the result.
    pub fn of(xml: &[u8]) -> Result<Self, FacturaError> {
        Ok(Self::from_canonical(canonicalize(xml)?))
    }

    /// Wrap bytes that are already canonical.
    pub fn from_canonical(bytes: Vec<u8>) -> Self {
        let digest: [u8; 32] = Sha256::digest(&bytes).into();
        Self { bytes, digest }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Render `root` compactly and canonicalize it.
pub fn render_canonical(root: &Element) -> Result<CanonicalForm, FacturaError> {
    CanonicalForm::of(&render_compact(root)?)
}

/// Canonical form of a whole document.
pub fn canonicalize(xml: &[u8]) -> Result<Vec<u8>, FacturaError> {
    canonical_bytes(&parse(xml)?)
}

/// Canonical form with every `ds:Signature` subtree removed, as the
/// enveloped-signature transform requires.
pub fn canonicalize_enveloped(xml: &[u8]) -> Result<Vec<u8>, FacturaError> {
    let doc = parse(xml)?;
    remove_signatures(&doc)?;
    canonical_bytes(&doc)
}

fn c14n_err(msg: impl std::fmt::Display) -> FacturaError {
    FacturaError::Xml(format!("canonicalization failed: {msg}"))
}

fn parse(xml: &[u8]) -> Result<Document, FacturaError> {
    let options = ParserOptions {
        recover: false,
        no_net: true,
        ..ParserOptions::default()
    };
    Parser::default()
        .parse_string_with_options(xml, options)
        .map_err(|e| c14n_err(format!("{e:?}")))
}

fn canonical_bytes(doc: &Document) -> Result<Vec<u8>, FacturaError> {
    let options = c14n::CanonicalizationOptions {
        mode: c14n::CanonicalizationMode::Canonical1_0,
        inclusive_ns_prefixes: vec![],
        with_comments: false,
    };
    doc.canonicalize(options, None)
        .map(String::into_bytes)
        .map_err(|e| c14n_err(format!("{e:?}")))
}

fn remove_signatures(doc: &Document) -> Result<(), FacturaError> {
    let ctx = xpath::Context::new(doc).map_err(|e| c14n_err(format!("XPath context: {e:?}")))?;
    ctx.register_namespace("ds", ns::DS)
        .map_err(|e| c14n_err(format!("XPath context: {e:?}")))?;
    let nodes = ctx
        .evaluate("//ds:Signature[not(ancestor::ds:Signature)]")
        .map_err(|e| c14n_err(format!("XPath: {e:?}")))?
        .get_nodes_as_vec();
    for mut node in nodes {
        node.unlink();
    }
    Ok(())
}
