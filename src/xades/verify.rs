use base64ct::{Base64, Encoding};
use quick_xml::Reader;
use quick_xml::events::Event;
use sha2::{Digest, Sha256};

use crate::core::FacturaError;
use crate::ubl::canonicalize_enveloped;

/// Values read back from an embedded `ds:Signature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedSignature {
    pub digest: Vec<u8>,
    pub signature_value: Vec<u8>,
    pub certificate: Vec<u8>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Digest,
    SignatureValue,
    Certificate,
}

fn local_name(qname: &[u8]) -> &[u8] {
    match qname.iter().position(|b| *b == b':') {
        Some(i) => &qname[i + 1..],
        None => qname,
    }
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>, FacturaError> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    Base64::decode_vec(&compact)
        .map_err(|e| FacturaError::Xml(format!("invalid base64 in {field}: {e}")))
}

/// Extract digest, signature value and certificate from a signed document.
///
/// The digest is the one of the `ds:Reference` with an empty `URI`.
pub fn read_signature(xml: &[u8]) -> Result<EmbeddedSignature, FacturaError> {
    let text = std::str::from_utf8(xml).map_err(|e| FacturaError::Xml(e.to_string()))?;
    let mut reader = Reader::from_str(text);

    let mut in_reference = false;
    let mut current: Option<Field> = None;
    let mut digest = None;
    let mut signature_value = None;
    let mut certificate = None;

    loop {
        match reader
            .read_event()
            .map_err(|e| FacturaError::Xml(format!("XML parse error: {e}")))?
        {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"Reference" => {
                    in_reference = e
                        .try_get_attribute("URI")
                        .map_err(|e| FacturaError::Xml(e.to_string()))?
                        .is_some_and(|a| a.value.is_empty());
                }
                b"DigestValue" if in_reference && digest.is_none() => {
                    current = Some(Field::Digest)
                }
                b"SignatureValue" => current = Some(Field::SignatureValue),
                b"X509Certificate" => current = Some(Field::Certificate),
                _ => {}
            },
            Event::End(e) => {
                if local_name(e.name().as_ref()) == b"Reference" {
                    in_reference = false;
                }
                current = None;
            }
            Event::Text(e) => {
                let value = e
                    .unescape()
                    .map_err(|e| FacturaError::Xml(format!("XML parse error: {e}")))?;
                match current {
                    Some(Field::Digest) => digest = Some(decode("DigestValue", &value)?),
                    Some(Field::SignatureValue) => {
                        signature_value = Some(decode("SignatureValue", &value)?)
                    }
                    Some(Field::Certificate) => {
                        certificate = Some(decode("X509Certificate", &value)?)
                    }
                    None => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match (digest, signature_value, certificate) {
        (Some(digest), Some(signature_value), Some(certificate)) => Ok(EmbeddedSignature {
            digest,
            signature_value,
            certificate,
        }),
        _ => Err(FacturaError::Xml("document carries no enveloped signature".into())),
    }
}

/// Check the embedded digest against the document with its signature removed.
///
/// Needs no key material: confirms the signed content was not altered after
/// digesting. Verifying the signature value itself is the job of whoever
/// holds the certificate's public key.
pub fn verify_enveloped_digest(xml: &[u8]) -> Result<EmbeddedSignature, FacturaError> {
    let embedded = read_signature(xml)?;
    let canonical = canonicalize_enveloped(xml)?;
    let actual = Sha256::digest(&canonical);
    if embedded.digest.as_slice() != actual.as_slice() {
        return Err(FacturaError::DigestMismatch {
            expected: Base64::encode_string(&embedded.digest),
            actual: Base64::encode_string(&actual),
        });
    }
    tracing::debug!("enveloped digest verified");
    Ok(embedded)
}
