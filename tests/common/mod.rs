#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use dian_fe::core::*;
use rust_decimal_macros::dec;
use sha2::{Digest, Sha256};

pub const TECHNICAL_KEY: &str = "fc8eac422eba16e22ffd8c6f94b3f40a6e38162c";
pub const SOFTWARE_ID: &str = "efb494db-8d4a-4114-aa35-618269a07312";
pub const SOFTWARE_PIN: &str = "12026";

pub const GOLDEN_CUFE: &str = "f1c293c12b5dd3fb376395ab1d6bd5def859d97e0e7cad42ce62f0b254a453314e0a25bd36a8cd0a98e39712098dc120";

/// Route library events to the test output. `RUST_LOG=dian_fe=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn issued_at() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-01-15T10:30:00-05:00").unwrap()
}

pub fn signing_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 15, 31, 0).unwrap()
}

pub fn issuer() -> Party {
    PartyBuilder::new("35696051", "FLOR MARIA PINEDA CASAMA")
        .check_digit("1")
        .tax_regime("48")
        .responsibility("R-99-PN")
        .address("CL 10 # 5-20", "Medellín", "Antioquia", "05001")
        .contact(Some("6041234567".into()), Some("facturacion@example.co".into()))
        .build()
}

pub fn customer() -> Party {
    PartyBuilder::new("222222222222", "Consumidor Final")
        .id_type(IdentificationType::CitizenId)
        .build()
}

pub fn numbering() -> NumberingConfig {
    NumberingConfig {
        prefix: "SETP".into(),
        authorization: "18760000001".into(),
        from: 990000000,
        to: 995000000,
    }
}

pub fn config() -> IssuerConfig {
    IssuerConfig::new(issuer(), Environment::Test, TECHNICAL_KEY, numbering())
}

pub fn config_with_software() -> IssuerConfig {
    config().with_software(SOFTWARE_ID, SOFTWARE_PIN)
}

/// Two units at 2500 COP with 19% IVA: 5000 + 950 = 5950.
pub fn sample_invoice(sequence: u64) -> InvoiceDocument {
    InvoiceBuilder::for_issuer(&config(), DocumentNumber::new("SETP", sequence), issued_at())
        .customer(customer())
        .add_line(
            LineItemBuilder::new("P001", "Arroz Diana 500g", dec!(2), dec!(2500))
                .tax(TaxRate::General)
                .build(),
        )
        .build()
        .unwrap()
}

pub fn multi_line_invoice(sequence: u64) -> InvoiceDocument {
    InvoiceBuilder::for_issuer(&config(), DocumentNumber::new("SETP", sequence), issued_at())
        .customer(customer())
        .note("Pago de contado")
        .add_line(
            LineItemBuilder::new("P001", "Arroz Diana 500g", dec!(2), dec!(2500))
                .gtin("7702001030149")
                .build(),
        )
        .add_line(
            LineItemBuilder::new("P002", "Leche entera 1L", dec!(3), dec!(3900))
                .unit("LTR")
                .tax(TaxRate::Reduced)
                .build(),
        )
        .add_line(
            LineItemBuilder::new("P003", "Huevos AA x30", dec!(1), dec!(15000))
                .tax(TaxRate::Zero)
                .build(),
        )
        .build()
        .unwrap()
}

/// Signing provider that derives its signature from the payload.
///
/// `sign` returns `b"sig:" + SHA-256(payload)`, so tests can recompute the
/// expected signature value.
#[derive(Debug, Default)]
pub struct FakeProvider {
    pub certificate: Vec<u8>,
    pub missing_certificate: bool,
    /// Fail `sign` for payloads containing this text (e.g. a document number).
    pub fail_on: Option<String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            certificate: b"-----FAKE CERTIFICATE-----".to_vec(),
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_on = Some(marker.into());
        self
    }

    pub fn without_certificate(mut self) -> Self {
        self.missing_certificate = true;
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn expected_signature(payload: &[u8]) -> Vec<u8> {
        let mut sig = b"sig:".to_vec();
        sig.extend_from_slice(&Sha256::digest(payload));
        sig
    }
}

impl dian_fe::xades::SigningProvider for FakeProvider {
    fn sign(&self, canonical: &[u8]) -> Result<Vec<u8>, FacturaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if let Some(marker) = &self.fail_on {
            if canonical
                .windows(marker.len())
                .any(|w| w == marker.as_bytes())
            {
                return Err(FacturaError::SigningProvider(format!(
                    "keystore rejected {marker}"
                )));
            }
        }
        Ok(Self::expected_signature(canonical))
    }

    fn certificate(&self) -> Result<Vec<u8>, FacturaError> {
        if self.missing_certificate {
            return Err(FacturaError::CertificateNotFound(
                "CN=FLOR MARIA PINEDA CASAMA".into(),
            ));
        }
        Ok(self.certificate.clone())
    }
}
