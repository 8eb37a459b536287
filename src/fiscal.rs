//! Fiscal identifier (CUFE / CUDE) calculation.
//!
//! The identifier is the SHA-384 digest of a fixed sequence of document
//! fields concatenated without separators:
//!
//! ```text
//! number + issue date/time + subtotal
//!   + code1 + tax1 + code2 + tax2 + code3 + tax3
//!   + total + issuer id + customer id + secret + environment
//! ```
//!
//! Every amount is written with exactly two decimals and a dot separator.
//! Unused tax slots keep their position with a zero amount; dropping a slot
//! yields a different, non-interoperable identifier.

use rust_decimal::Decimal;
use sha2::{Digest, Sha384};

use crate::core::{
    DocumentType, Environment, FacturaError, FiscalIdentifier, InvoiceDocument,
    IssuerConfig, round_amount,
};

/// IVA: value added tax.
pub const TAX_IVA: &str = "01";
/// ICA: municipal industry and commerce tax.
pub const TAX_ICA: &str = "03";
/// INC: national consumption tax.
pub const TAX_INC: &str = "04";

/// One (tax code, tax amount) position of the formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxSlot {
    pub code: &'static str,
    pub amount: Decimal,
}

impl TaxSlot {
    pub fn new(code: &'static str, amount: Decimal) -> Self {
        Self { code, amount }
    }

    pub fn unused(code: &'static str) -> Self {
        Self::new(code, Decimal::ZERO)
    }
}

/// The ordered fields the fiscal identifier is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiscalInput {
    pub number: String,
    /// `YYYY-MM-DDTHH:MM:SS±hh:mm`.
    pub issued_at: String,
    pub subtotal: Decimal,
    /// IVA, INC and ICA slots, in that order.
    pub taxes: [TaxSlot; 3],
    pub total: Decimal,
    pub issuer_id: String,
    pub customer_id: String,
    /// Technical key (CUFE) or software PIN (CUDE).
    pub secret: String,
    pub environment: Environment,
}

impl FiscalInput {
    /// Collect the formula fields from a built document.
    pub fn from_document(document: &InvoiceDocument, config: &IssuerConfig) -> Self {
        let totals = document.totals();
        let secret = match (document.document_type(), &config.software) {
            (DocumentType::CreditNote | DocumentType::DebitNote, Some(software)) => {
                software.pin.clone()
            }
            _ => config.technical_key.clone(),
        };

        Self {
            number: document.number().to_string(),
            issued_at: format!("{}T{}", document.issue_date(), document.issue_time()),
            subtotal: totals.subtotal,
            taxes: [
                TaxSlot::new(TAX_IVA, totals.tax),
                TaxSlot::unused(TAX_INC),
                TaxSlot::unused(TAX_ICA),
            ],
            total: totals.total,
            issuer_id: document.issuer().identifier.clone(),
            customer_id: document.customer().identifier.clone(),
            secret,
            environment: config.environment,
        }
    }

    /// The exact string that gets hashed.
    pub fn concatenated(&self) -> String {
        let mut s = String::with_capacity(256);
        s.push_str(&self.number);
        s.push_str(&self.issued_at);
        s.push_str(&format_amount(self.subtotal));
        for slot in &self.taxes {
            s.push_str(slot.code);
            s.push_str(&format_amount(slot.amount));
        }
        s.push_str(&format_amount(self.total));
        s.push_str(&self.issuer_id);
        s.push_str(&self.customer_id);
        s.push_str(&self.secret);
        s.push_str(self.environment.code());
        s
    }

    /// Lowercase hex SHA-384 of [`concatenated`](Self::concatenated).
    pub fn digest(&self) -> String {
        sha384_hex(&self.concatenated())
    }
}

/// Compute the CUFE (invoices) or CUDE (notes) of a document.
///
/// Pure: depends only on the document content and the configuration.
pub fn compute_fiscal_identifier(
    document: &InvoiceDocument,
    config: &IssuerConfig,
) -> FiscalIdentifier {
    let scheme = document.document_type().fiscal_scheme();
    let value = FiscalInput::from_document(document, config).digest();
    tracing::debug!(
        number = %document.number(),
        scheme = scheme.name(),
        "fiscal identifier computed"
    );
    FiscalIdentifier { value, scheme }
}

fn check_issuer(document: &InvoiceDocument, config: &IssuerConfig) -> Result<(), FacturaError> {
    if document.issuer().identifier != config.issuer.identifier {
        return Err(FacturaError::invalid(
            "issuer.identifier",
            format!(
                "document issuer {} does not match configured issuer {}",
                document.issuer().identifier,
                config.issuer.identifier
            ),
        ));
    }
    Ok(())
}

/// Validate the document, compute its fiscal identifier and attach it.
pub fn assign_fiscal_identifier(
    document: InvoiceDocument,
    config: &IssuerConfig,
) -> Result<InvoiceDocument, FacturaError> {
    check_issuer(&document, config)?;
    document.validate()?;
    let identifier = compute_fiscal_identifier(&document, config);
    document.with_fiscal_identifier(identifier)
}

/// Check that the identifier a document carries is the one its content yields.
///
/// Documents read back from storage may carry any string; nothing is
/// rendered or signed under an identifier that does not match.
pub fn verify_fiscal_identifier<'a>(
    document: &'a InvoiceDocument,
    config: &IssuerConfig,
) -> Result<&'a FiscalIdentifier, FacturaError> {
    let attached = document.fiscal_identifier().ok_or_else(|| {
        FacturaError::invalid(
            "fiscal_identifier",
            "fiscal identifier must be computed before rendering",
        )
    })?;
    check_issuer(document, config)?;
    if !is_well_formed(&attached.value) {
        return Err(FacturaError::invalid(
            "fiscal_identifier",
            "must be 96 lowercase hexadecimal characters",
        ));
    }
    let expected = compute_fiscal_identifier(document, config);
    if *attached != expected {
        return Err(FacturaError::invalid(
            "fiscal_identifier",
            format!("{} does not match the document content", attached.scheme.name()),
        ));
    }
    Ok(attached)
}

/// Software security code: SHA-384 of software ID followed by the PIN.
pub fn software_security_code(software_id: &str, pin: &str) -> String {
    sha384_hex(&format!("{software_id}{pin}"))
}

pub fn sha384_hex(data: &str) -> String {
    hex::encode(Sha384::digest(data.as_bytes()))
}

/// Two decimals, dot separator, no thousands separator; halves round away from zero.
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", round_amount(amount))
}

/// True if `value` looks like a fiscal identifier (96 lowercase hex chars).
pub fn is_well_formed(value: &str) -> bool {
    value.len() == 96 && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input() -> FiscalInput {
        FiscalInput {
            number: "SETP990000000".into(),
            issued_at: "2024-01-15T10:30:00-05:00".into(),
            subtotal: dec!(5000),
            taxes: [
                TaxSlot::new(TAX_IVA, dec!(950)),
                TaxSlot::unused(TAX_INC),
                TaxSlot::unused(TAX_ICA),
            ],
            total: dec!(5950),
            issuer_id: "35696051".into(),
            customer_id: "222222222222".into(),
            secret: "fc8eac422eba16e22ffd8c6f94b3f40a6e38162c".into(),
            environment: Environment::Test,
        }
    }

    #[test]
    fn concatenation_order() {
        assert_eq!(
            input().concatenated(),
            "SETP9900000002024-01-15T10:30:00-05:005000.0001950.00040.00030.005950.00\
             35696051222222222222fc8eac422eba16e22ffd8c6f94b3f40a6e38162c2"
        );
    }

    #[test]
    fn golden_cufe() {
        assert_eq!(
            input().digest(),
            "f1c293c12b5dd3fb376395ab1d6bd5def859d97e0e7cad42ce62f0b254a453314e0a25bd36a8cd0a98e39712098dc120"
        );
    }

    #[test]
    fn one_cent_changes_the_identifier() {
        let mut changed = input();
        changed.total = dec!(5950.01);
        assert_eq!(
            changed.digest(),
            "ff952b8928c619193139bf6b62e5b503ab12e8c157f0df292b2ca33147c0117389b86526664e9e921d8ed73dc253e4d6"
        );
    }

    #[test]
    fn security_code() {
        assert_eq!(
            software_security_code("efb494db-8d4a-4114-aa35-618269a07312", "12026"),
            "67c71698f91fa3819d24e732a3324c9c65df4029fcf7093280f72c37d0edd09f877dca31fa24e3d43f3d3d0caf8e07a6"
        );
    }

    #[test]
    fn amount_formatting() {
        assert_eq!(format_amount(dec!(5000)), "5000.00");
        assert_eq!(format_amount(dec!(950.0000)), "950.00");
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(1234567.5)), "1234567.50");
        assert_eq!(format_amount(dec!(10.005)), "10.01");
        assert_eq!(format_amount(dec!(10.004)), "10.00");
    }

    fn assigned() -> (InvoiceDocument, IssuerConfig) {
        use crate::core::*;
        let issuer = PartyBuilder::new("35696051", "FLOR MARIA PINEDA CASAMA")
            .check_digit("1")
            .build();
        let config = IssuerConfig::new(
            issuer.clone(),
            Environment::Test,
            "fc8eac422eba16e22ffd8c6f94b3f40a6e38162c",
            NumberingConfig {
                prefix: "SETP".into(),
                authorization: "18760000001".into(),
                from: 990000000,
                to: 995000000,
            },
        );
        let issued_at = chrono::DateTime::parse_from_rfc3339("2024-01-15T10:30:00-05:00").unwrap();
        let doc = InvoiceBuilder::new(DocumentNumber::new("SETP", 990000000), issued_at)
            .issuer(issuer)
            .customer(
                PartyBuilder::new("222222222222", "Consumidor Final")
                    .id_type(IdentificationType::CitizenId)
                    .build(),
            )
            .add_line(LineItemBuilder::new("P001", "Arroz", dec!(2), dec!(2500)).build())
            .build()
            .unwrap();
        (assign_fiscal_identifier(doc, &config).unwrap(), config)
    }

    #[test]
    fn attached_identifier_is_verified() {
        let (doc, config) = assigned();
        assert_eq!(verify_fiscal_identifier(&doc, &config).unwrap().value, input().digest());

        let mut forged = doc.clone();
        forged.fiscal_identifier = Some(FiscalIdentifier {
            value: "0".repeat(96),
            scheme: crate::core::FiscalScheme::Cufe,
        });
        assert!(matches!(
            verify_fiscal_identifier(&forged, &config),
            Err(FacturaError::Validation(_))
        ));

        let mut garbage = doc;
        garbage.fiscal_identifier.as_mut().unwrap().value = "not-a-digest".into();
        assert!(verify_fiscal_identifier(&garbage, &config).is_err());
    }

    #[test]
    fn scheme_must_match_document_type() {
        let (doc, _) = assigned();
        let cude = FiscalIdentifier {
            value: input().digest(),
            scheme: crate::core::FiscalScheme::Cude,
        };
        assert!(doc.with_fiscal_identifier(cude).is_err());
    }

    #[test]
    fn well_formed_check() {
        assert!(is_well_formed(&input().digest()));
        assert!(!is_well_formed("ABC"));
        assert!(!is_well_formed(&input().digest().to_uppercase()));
    }
}
