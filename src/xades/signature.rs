use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::core::{FacturaError, SignaturePolicy};
use crate::ubl::{Element, Tag, algorithm, ensure_signature_slot, signature_slot_mut};

/// `Id` of the `ds:Signature` element.
pub const SIGNATURE_ID: &str = "xmldsig-signature";
/// `Id` of the `ds:SignatureValue` element.
pub const SIGNATURE_VALUE_ID: &str = "xmldsig-signature-value";
/// `Id` of the `xades:SignedProperties` element.
pub const SIGNED_PROPERTIES_ID: &str = "xmldsig-signed-properties";

/// Everything embedded into the document by the enveloped signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlock {
    pub canonicalization_method: &'static str,
    pub signature_method: &'static str,
    pub digest_method: &'static str,
    /// SHA-256 of the canonical pre-signature document.
    pub digest: [u8; 32],
    pub signature_value: Vec<u8>,
    /// DER-encoded signer certificate.
    pub certificate: Vec<u8>,
    pub signing_time: DateTime<Utc>,
    pub policy: Option<SignaturePolicy>,
}

impl SignatureBlock {
    pub fn new(
        digest: [u8; 32],
        signature_value: Vec<u8>,
        certificate: Vec<u8>,
        signing_time: DateTime<Utc>,
    ) -> Self {
        Self {
            canonicalization_method: algorithm::C14N,
            signature_method: algorithm::RSA_SHA256,
            digest_method: algorithm::SHA256,
            digest,
            signature_value,
            certificate,
            signing_time,
            policy: None,
        }
    }

    pub fn with_policy(mut self, policy: Option<SignaturePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn digest_base64(&self) -> String {
        Base64::encode_string(&self.digest)
    }

    pub fn signature_base64(&self) -> String {
        Base64::encode_string(&self.signature_value)
    }

    pub fn certificate_base64(&self) -> String {
        Base64::encode_string(&self.certificate)
    }

    /// `xades:SigningTime` value, UTC with second precision.
    pub fn signing_time_string(&self) -> String {
        self.signing_time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// The `ds:Signature` subtree.
    ///
    /// `reference_id` distinguishes the reference of this document, usually
    /// its fiscal identifier.
    pub fn to_element(&self, reference_id: &str) -> Element {
        let signed_info = Element::new(Tag::SignedInfo)
            .child(
                Element::new(Tag::CanonicalizationMethod)
                    .attr("Algorithm", self.canonicalization_method),
            )
            .child(Element::new(Tag::SignatureMethod).attr("Algorithm", self.signature_method))
            .child(
                Element::new(Tag::Reference)
                    .attr("Id", format!("xmldsig-ref-{reference_id}"))
                    .attr("URI", "")
                    .child(
                        Element::new(Tag::Transforms).child(
                            Element::new(Tag::Transform)
                                .attr("Algorithm", algorithm::ENVELOPED_SIGNATURE),
                        ),
                    )
                    .child(Element::new(Tag::DigestMethod).attr("Algorithm", self.digest_method))
                    .child(Element::leaf(Tag::DigestValue, self.digest_base64())),
            );

        Element::new(Tag::Signature)
            .attr("Id", SIGNATURE_ID)
            .child(signed_info)
            .child(
                Element::leaf(Tag::SignatureValue, self.signature_base64())
                    .attr("Id", SIGNATURE_VALUE_ID),
            )
            .child(
                Element::new(Tag::KeyInfo).child(
                    Element::new(Tag::X509Data)
                        .child(Element::leaf(Tag::X509Certificate, self.certificate_base64())),
                ),
            )
            .child(Element::new(Tag::Object).child(self.qualifying_properties()))
    }

    fn qualifying_properties(&self) -> Element {
        let cert_digest = Base64::encode_string(&Sha256::digest(&self.certificate));
        let signing_certificate = Element::new(Tag::SigningCertificate).child(
            Element::new(Tag::Cert).child(
                Element::new(Tag::CertDigest)
                    .child(Element::new(Tag::DigestMethod).attr("Algorithm", self.digest_method))
                    .child(Element::leaf(Tag::DigestValue, cert_digest)),
            ),
        );

        let policy = self.policy.as_ref().map(|p| {
            Element::new(Tag::SignaturePolicyIdentifier).child(
                Element::new(Tag::SignaturePolicyId)
                    .child(
                        Element::new(Tag::SigPolicyId)
                            .child(Element::leaf(Tag::Identifier, &p.identifier)),
                    )
                    .child(
                        Element::new(Tag::SigPolicyHash)
                            .child(
                                Element::new(Tag::DigestMethod)
                                    .attr("Algorithm", self.digest_method),
                            )
                            .child(Element::leaf(Tag::DigestValue, &p.digest)),
                    ),
            )
        });

        Element::new(Tag::QualifyingProperties)
            .attr("Target", format!("#{SIGNATURE_ID}"))
            .child(
                Element::new(Tag::SignedProperties)
                    .attr("Id", SIGNED_PROPERTIES_ID)
                    .child(
                        Element::new(Tag::SignedSignatureProperties)
                            .child(Element::leaf(Tag::SigningTime, self.signing_time_string()))
                            .child(signing_certificate)
                            .child_opt(policy),
                    ),
            )
    }
}

/// Insert the signature subtree into the signature slot of `root`.
///
/// The slot is the first `ext:UBLExtension`; it is created when missing.
/// A tree that already contains a `ds:Signature` is rejected.
pub fn embed_signature(
    root: &mut Element,
    block: &SignatureBlock,
    reference_id: &str,
) -> Result<(), FacturaError> {
    if root.descendant(Tag::Signature).is_some() {
        return Err(FacturaError::AlreadySigned);
    }
    ensure_signature_slot(root);
    let slot = signature_slot_mut(root)
        .ok_or_else(|| FacturaError::Xml("signature slot missing after insertion".into()))?;
    slot.push(block.to_element(reference_id));
    Ok(())
}
