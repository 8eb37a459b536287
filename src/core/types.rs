use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// An electronic fiscal document: invoice, credit note or debit note.
///
/// Built through [`InvoiceBuilder`](super::InvoiceBuilder), which computes the
/// totals and validates the required fields. The only field filled in later
/// is the fiscal identifier; signing moves the document into the
/// `xades` pipeline and never mutates it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDocument {
    pub(crate) number: DocumentNumber,
    pub(crate) document_type: DocumentType,
    pub(crate) issued_at: DateTime<FixedOffset>,
    pub(crate) issuer: Party,
    pub(crate) customer: Party,
    pub(crate) lines: Vec<InvoiceLineItem>,
    pub(crate) totals: Totals,
    pub(crate) notes: Vec<String>,
    pub(crate) billing_reference: Option<BillingReference>,
    pub(crate) fiscal_identifier: Option<FiscalIdentifier>,
}

impl InvoiceDocument {
    pub fn number(&self) -> &DocumentNumber {
        &self.number
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn issued_at(&self) -> DateTime<FixedOffset> {
        self.issued_at
    }

    pub fn issuer(&self) -> &Party {
        &self.issuer
    }

    pub fn customer(&self) -> &Party {
        &self.customer
    }

    pub fn lines(&self) -> &[InvoiceLineItem] {
        &self.lines
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn billing_reference(&self) -> Option<&BillingReference> {
        self.billing_reference.as_ref()
    }

    pub fn fiscal_identifier(&self) -> Option<&FiscalIdentifier> {
        self.fiscal_identifier.as_ref()
    }

    /// `IssueDate` as rendered in the document, e.g. `2024-01-15`.
    pub fn issue_date(&self) -> String {
        self.issued_at.format("%Y-%m-%d").to_string()
    }

    /// `IssueTime` with explicit UTC offset, e.g. `10:30:00-05:00`.
    pub fn issue_time(&self) -> String {
        self.issued_at.format("%H:%M:%S%:z").to_string()
    }

    /// Attach the fiscal identifier computed for this document.
    ///
    /// The scheme must match the document type (CUFE for invoices, CUDE for notes).
    /// Only [`crate::fiscal::assign_fiscal_identifier`] attaches identifiers.
    pub(crate) fn with_fiscal_identifier(
        mut self,
        identifier: FiscalIdentifier,
    ) -> Result<Self, super::FacturaError> {
        if identifier.scheme != self.document_type.fiscal_scheme() {
            return Err(super::FacturaError::invalid(
                "fiscal_identifier",
                format!(
                    "{} does not apply to document type {}",
                    identifier.scheme.name(),
                    self.document_type.code()
                ),
            ));
        }
        self.fiscal_identifier = Some(identifier);
        Ok(self)
    }
}

/// Document number: authorized prefix followed by the sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentNumber {
    pub prefix: String,
    pub sequence: u64,
}

impl DocumentNumber {
    pub fn new(prefix: impl Into<String>, sequence: u64) -> Self {
        Self {
            prefix: prefix.into(),
            sequence,
        }
    }
}

impl std::fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.prefix, self.sequence)
    }
}

/// Issuer (facturador) or customer (adquiriente). Both render identically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    /// Tax identifier (NIT or personal ID) without check digit.
    pub identifier: String,
    /// Verification digit (DV) of the NIT.
    pub check_digit: String,
    /// Kind of identification document.
    pub id_type: IdentificationType,
    /// Legal name (razón social).
    pub legal_name: String,
    pub person_type: PersonType,
    /// Tax regime code (e.g. "48" responsible for IVA, "49" not responsible).
    pub tax_regime: String,
    /// Fiscal responsibility codes (e.g. "O-13", "O-15", "R-99-PN").
    pub responsibilities: Vec<String>,
    pub address: Address,
    pub contact: Option<Contact>,
}

/// Physical address of a party.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    /// Street address line.
    pub line: String,
    pub city: String,
    /// Department (first-level subdivision).
    pub department: String,
    /// DANE municipality code, e.g. "05001".
    pub municipality_code: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    pub telephone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersonType {
    Natural,
    Juridical,
}

impl PersonType {
    /// `cbc:AdditionalAccountID` code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Juridical => "1",
            Self::Natural => "2",
        }
    }
}

/// Identification document types accepted for parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentificationType {
    /// 31: NIT.
    Nit,
    /// 13: Cédula de ciudadanía.
    CitizenId,
    /// 22: Cédula de extranjería.
    ForeignerId,
    /// 11: Registro civil / tarjeta de identidad.
    IdentityCard,
}

impl IdentificationType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Nit => "31",
            Self::CitizenId => "13",
            Self::ForeignerId => "22",
            Self::IdentityCard => "11",
        }
    }
}

/// IVA rates published by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaxRate {
    /// 0%: exempt or excluded goods.
    Zero,
    /// 5%: reduced rate.
    Reduced,
    /// 19%: general rate.
    General,
}

impl TaxRate {
    /// Rate as a fraction, e.g. `0.19`.
    pub fn fraction(&self) -> Decimal {
        match self {
            Self::Zero => dec!(0.00),
            Self::Reduced => dec!(0.05),
            Self::General => dec!(0.19),
        }
    }

    /// Rate as a percentage, e.g. `19.00`.
    pub fn percent(&self) -> Decimal {
        self.fraction() * dec!(100)
    }

    /// Look up a published rate from its fraction (`0.19` → `General`).
    pub fn from_fraction(fraction: Decimal) -> Option<Self> {
        [Self::Zero, Self::Reduced, Self::General]
            .into_iter()
            .find(|r| r.fraction() == fraction)
    }
}

/// A single line of the document.
///
/// Line amounts are rounded to cents, so the rendered lines add up to the
/// rendered document totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLineItem {
    pub(crate) code: String,
    pub(crate) description: String,
    pub(crate) quantity: Decimal,
    pub(crate) unit_price: Decimal,
    pub(crate) unit: String,
    pub(crate) gtin: Option<String>,
    pub(crate) tax_rate: TaxRate,
}

impl InvoiceLineItem {
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// Unit of measure code (e.g. "EA", "KGM").
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Global trade item number, if the product has one.
    pub fn gtin(&self) -> Option<&str> {
        self.gtin.as_deref()
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    /// quantity × unit price, rounded to cents.
    ///
    /// # Panics
    ///
    /// On decimal overflow. Lines of a built document never overflow; use
    /// [`checked_subtotal`](Self::checked_subtotal) for unvalidated lines.
    pub fn subtotal(&self) -> Decimal {
        round_amount(self.quantity * self.unit_price)
    }

    /// subtotal × tax rate, rounded to cents.
    pub fn tax(&self) -> Decimal {
        round_amount(self.subtotal() * self.tax_rate.fraction())
    }

    /// subtotal + tax.
    pub fn total(&self) -> Decimal {
        self.subtotal() + self.tax()
    }

    /// [`subtotal`](Self::subtotal), or `None` if the product overflows.
    pub fn checked_subtotal(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price).map(round_amount)
    }

    /// [`total`](Self::total), or `None` if any step overflows.
    pub fn checked_total(&self) -> Option<Decimal> {
        let subtotal = self.checked_subtotal()?;
        let tax = subtotal.checked_mul(self.tax_rate.fraction()).map(round_amount)?;
        subtotal.checked_add(tax)
    }
}

/// Round a monetary amount to cents, half away from zero.
pub fn round_amount(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Document-level totals: sums of the per-line amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of line subtotals (pre-tax).
    pub subtotal: Decimal,
    /// Sum of line taxes.
    pub tax: Decimal,
    /// Sum of line totals.
    pub total: Decimal,
    /// Taxable base and tax per rate, ordered by rate.
    pub tax_breakdown: Vec<TaxBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub rate: TaxRate,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
}

/// Document types and their type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    /// 01: Factura electrónica de venta.
    Invoice,
    /// 91: Nota crédito.
    CreditNote,
    /// 92: Nota débito.
    DebitNote,
}

impl DocumentType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invoice => "01",
            Self::CreditNote => "91",
            Self::DebitNote => "92",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Invoice),
            "91" => Some(Self::CreditNote),
            "92" => Some(Self::DebitNote),
            _ => None,
        }
    }

    /// Invoices are identified by a CUFE, notes by a CUDE.
    pub fn fiscal_scheme(&self) -> FiscalScheme {
        match self {
            Self::Invoice => FiscalScheme::Cufe,
            Self::CreditNote | Self::DebitNote => FiscalScheme::Cude,
        }
    }
}

/// Reference from a credit or debit note to the invoice it adjusts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingReference {
    pub number: String,
    pub fiscal_identifier: FiscalIdentifier,
    pub issue_date: NaiveDate,
}

/// Content-derived fiscal fingerprint (CUFE or CUDE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalIdentifier {
    /// 96 lowercase hex characters (SHA-384).
    pub value: String,
    pub scheme: FiscalScheme,
}

impl std::fmt::Display for FiscalIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FiscalScheme {
    Cufe,
    Cude,
}

impl FiscalScheme {
    /// Value of the `schemeName` attribute on `cbc:UUID`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cufe => "CUFE-SHA384",
            Self::Cude => "CUDE-SHA384",
        }
    }
}
