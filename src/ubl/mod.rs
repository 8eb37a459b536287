//! UBL 2.1 document generation and canonicalization.
//!
//! Documents are assembled as an [`Element`] tree whose element names come
//! from the closed [`Tag`] list, so every element carries the namespace the
//! schema expects. The tree is then rendered compactly and canonicalized
//! (inclusive C14N 1.0) to obtain the bytes that get digested and signed.
//!
//! # Example
//!
//! ```no_run
//! use dian_fe::core::*;
//! use dian_fe::{fiscal, ubl};
//!
//! let config: IssuerConfig = todo!();
//! let document: InvoiceDocument = todo!(); // build via InvoiceBuilder
//! let document = fiscal::assign_fiscal_identifier(document, &config).unwrap();
//! let xml = ubl::to_ubl_xml(&document, &config).unwrap();
//! ```

mod c14n;
mod document;
mod tree;
mod writer;

pub use c14n::{CanonicalForm, canonicalize, canonicalize_enveloped, render_canonical};
pub use document::{
    build_document_tree, check_root_order, ensure_signature_slot, signature_slot_mut,
    to_ubl_xml,
};
pub use tree::{Element, Node, Ns, Tag};
pub use writer::{XmlWriter, render_compact, render_pretty};

/// `cbc:UBLVersionID`.
pub const UBL_VERSION: &str = "UBL 2.1";

/// `cbc:CustomizationID` for standard operations.
pub const CUSTOMIZATION_ID: &str = "10";

/// `cbc:ProfileID`.
pub const PROFILE_ID: &str = "DIAN 2.1";

/// NIT of the authority, emitted as authorization provider.
pub const AUTHORITY_NIT: &str = "800197268";

/// Check digit of [`AUTHORITY_NIT`].
pub const AUTHORITY_CHECK_DIGIT: &str = "4";

/// Namespace URIs.
pub mod ns {
    pub const INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    pub const CREDIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2";
    pub const DEBIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:DebitNote-2";
    pub const CAC: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
    pub const EXT: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
    pub const STS: &str = "dian:gov:co:facturaelectronica:Structures-2-1";
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
    pub const XADES: &str = "http://uri.etsi.org/01903/v1.3.2#";
    pub const XADES141: &str = "http://uri.etsi.org/01903/v1.4.1#";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
}

/// Algorithm identifiers referenced from the signature block.
pub mod algorithm {
    /// Inclusive canonical XML 1.0, without comments.
    pub const C14N: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}
