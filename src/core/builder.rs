use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use super::config::IssuerConfig;
use super::error::FacturaError;
use super::types::*;
use super::validation;

/// Builder for constructing valid documents.
///
/// ```
/// use chrono::DateTime;
/// use dian_fe::core::*;
/// use rust_decimal_macros::dec;
///
/// let issued_at = DateTime::parse_from_rfc3339("2024-01-15T10:30:00-05:00").unwrap();
/// let document = InvoiceBuilder::new(DocumentNumber::new("SETP", 990000000), issued_at)
///     .issuer(PartyBuilder::new("35696051", "FLOR MARIA PINEDA CASAMA").check_digit("1").build())
///     .customer(PartyBuilder::new("222222222222", "Consumidor Final").check_digit("7").build())
///     .add_line(LineItemBuilder::new("P001", "Arroz Diana 500g", dec!(2), dec!(2500))
///         .tax(TaxRate::General)
///         .build())
///     .build()
///     .unwrap();
///
/// assert_eq!(document.totals().total, dec!(5950));
/// ```
pub struct InvoiceBuilder {
    number: DocumentNumber,
    document_type: DocumentType,
    issued_at: DateTime<FixedOffset>,
    issuer: Option<Party>,
    customer: Option<Party>,
    lines: Vec<InvoiceLineItem>,
    notes: Vec<String>,
    billing_reference: Option<BillingReference>,
}

impl InvoiceBuilder {
    pub fn new(number: DocumentNumber, issued_at: DateTime<FixedOffset>) -> Self {
        Self {
            number,
            document_type: DocumentType::Invoice,
            issued_at,
            issuer: None,
            customer: None,
            lines: Vec::new(),
            notes: Vec::new(),
            billing_reference: None,
        }
    }

    /// Start a document with the configured issuer already set.
    pub fn for_issuer(
        config: &IssuerConfig,
        number: DocumentNumber,
        issued_at: DateTime<FixedOffset>,
    ) -> Self {
        Self::new(number, issued_at).issuer(config.issuer.clone())
    }

    pub fn document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = document_type;
        self
    }

    pub fn issuer(mut self, party: Party) -> Self {
        self.issuer = Some(party);
        self
    }

    pub fn customer(mut self, party: Party) -> Self {
        self.customer = Some(party);
        self
    }

    pub fn add_line(mut self, line: InvoiceLineItem) -> Self {
        self.lines.push(line);
        self
    }

    pub fn lines(mut self, lines: impl IntoIterator<Item = InvoiceLineItem>) -> Self {
        self.lines.extend(lines);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Invoice adjusted by a credit or debit note.
    pub fn billing_reference(mut self, reference: BillingReference) -> Self {
        self.billing_reference = Some(reference);
        self
    }

    /// Build the document, calculating totals and running validation.
    /// Returns all validation errors (not just the first).
    pub fn build(self) -> Result<InvoiceDocument, FacturaError> {
        let issuer = self
            .issuer
            .ok_or_else(|| FacturaError::Builder("issuer is required".into()))?;
        let customer = self
            .customer
            .ok_or_else(|| FacturaError::Builder("customer is required".into()))?;

        // Input limits to prevent abuse
        if self.lines.len() > 10_000 {
            return Err(FacturaError::Builder(
                "document cannot have more than 10,000 line items".into(),
            ));
        }
        if self.notes.len() > 100 {
            return Err(FacturaError::Builder(
                "document cannot have more than 100 notes".into(),
            ));
        }

        let errors = validation::validate_document(
            &self.number,
            self.document_type,
            &issuer,
            &customer,
            &self.lines,
            self.billing_reference.as_ref(),
        );
        if !errors.is_empty() {
            return Err(FacturaError::Validation(errors));
        }

        let totals = validation::calculate_totals(&self.lines)?;

        Ok(InvoiceDocument {
            number: self.number,
            document_type: self.document_type,
            issued_at: self.issued_at,
            issuer,
            customer,
            lines: self.lines,
            totals,
            notes: self.notes,
            billing_reference: self.billing_reference,
            fiscal_identifier: None,
        })
    }
}

/// Builder for Party (issuer/customer).
pub struct PartyBuilder {
    identifier: String,
    check_digit: String,
    id_type: IdentificationType,
    legal_name: String,
    person_type: PersonType,
    tax_regime: String,
    responsibilities: Vec<String>,
    address: Address,
    contact: Option<Contact>,
}

impl PartyBuilder {
    pub fn new(identifier: impl Into<String>, legal_name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            check_digit: String::new(),
            id_type: IdentificationType::Nit,
            legal_name: legal_name.into(),
            person_type: PersonType::Natural,
            tax_regime: "49".to_string(),
            responsibilities: Vec::new(),
            address: Address {
                country_code: "CO".to_string(),
                ..Address::default()
            },
            contact: None,
        }
    }

    pub fn check_digit(mut self, dv: impl Into<String>) -> Self {
        self.check_digit = dv.into();
        self
    }

    pub fn id_type(mut self, id_type: IdentificationType) -> Self {
        self.id_type = id_type;
        self
    }

    pub fn person_type(mut self, person_type: PersonType) -> Self {
        self.person_type = person_type;
        self
    }

    pub fn tax_regime(mut self, code: impl Into<String>) -> Self {
        self.tax_regime = code.into();
        self
    }

    pub fn responsibility(mut self, code: impl Into<String>) -> Self {
        self.responsibilities.push(code.into());
        self
    }

    pub fn address(
        mut self,
        line: impl Into<String>,
        city: impl Into<String>,
        department: impl Into<String>,
        municipality_code: impl Into<String>,
    ) -> Self {
        self.address.line = line.into();
        self.address.city = city.into();
        self.address.department = department.into();
        self.address.municipality_code = municipality_code.into();
        self
    }

    pub fn country(mut self, code: impl Into<String>) -> Self {
        self.address.country_code = code.into();
        self
    }

    pub fn contact(mut self, telephone: Option<String>, email: Option<String>) -> Self {
        self.contact = Some(Contact { telephone, email });
        self
    }

    /// Parties without explicit responsibilities are registered as "O-13".
    pub fn build(self) -> Party {
        let responsibilities = if self.responsibilities.is_empty() {
            vec!["O-13".to_string()]
        } else {
            self.responsibilities
        };
        Party {
            identifier: self.identifier,
            check_digit: self.check_digit,
            id_type: self.id_type,
            legal_name: self.legal_name,
            person_type: self.person_type,
            tax_regime: self.tax_regime,
            responsibilities,
            address: self.address,
            contact: self.contact,
        }
    }
}

/// Builder for InvoiceLineItem.
pub struct LineItemBuilder {
    code: String,
    description: String,
    quantity: Decimal,
    unit_price: Decimal,
    unit: String,
    gtin: Option<String>,
    tax_rate: TaxRate,
}

impl LineItemBuilder {
    pub fn new(
        code: impl Into<String>,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            quantity,
            unit_price,
            unit: "EA".to_string(),
            gtin: None,
            tax_rate: TaxRate::General,
        }
    }

    pub fn unit(mut self, code: impl Into<String>) -> Self {
        self.unit = code.into();
        self
    }

    pub fn gtin(mut self, gtin: impl Into<String>) -> Self {
        self.gtin = Some(gtin.into());
        self
    }

    pub fn tax(mut self, rate: TaxRate) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn build(self) -> InvoiceLineItem {
        InvoiceLineItem {
            code: self.code,
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            unit: self.unit,
            gtin: self.gtin,
            tax_rate: self.tax_rate,
        }
    }
}
