use std::sync::Arc;

use crate::core::FacturaError;

/// Holder of the signing key, usually an out-of-process or networked keystore.
///
/// The crate never sees key material: it hands over the canonical document
/// bytes and embeds whatever signature and certificate come back. Calls may
/// block; the batch signer runs them on the blocking thread pool.
///
/// Implementations report a missing key or certificate as
/// [`FacturaError::CertificateNotFound`] and every other failure as
/// [`FacturaError::SigningProvider`].
pub trait SigningProvider: Send + Sync {
    /// RSA-SHA256 signature over `canonical`.
    fn sign(&self, canonical: &[u8]) -> Result<Vec<u8>, FacturaError>;

    /// DER-encoded signer certificate.
    fn certificate(&self) -> Result<Vec<u8>, FacturaError>;
}

impl<P: SigningProvider + ?Sized> SigningProvider for Arc<P> {
    fn sign(&self, canonical: &[u8]) -> Result<Vec<u8>, FacturaError> {
        (**self).sign(canonical)
    }

    fn certificate(&self) -> Result<Vec<u8>, FacturaError> {
        (**self).certificate()
    }
}

impl<P: SigningProvider + ?Sized> SigningProvider for &P {
    fn sign(&self, canonical: &[u8]) -> Result<Vec<u8>, FacturaError> {
        (**self).sign(canonical)
    }

    fn certificate(&self) -> Result<Vec<u8>, FacturaError> {
        (**self).certificate()
    }
}
