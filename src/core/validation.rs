use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::error::{FacturaError, ValidationError};
use super::types::*;
use super::units::is_known_unit_code;

/// Sum the per-line amounts into document totals.
///
/// Line amounts are already rounded to cents, so the sums are exact and
/// `total == subtotal + tax` holds for every document. Amounts too large
/// for a decimal are reported instead of overflowing.
pub fn calculate_totals(lines: &[InvoiceLineItem]) -> Result<Totals, FacturaError> {
    let overflow = || FacturaError::invalid("lines", "amounts exceed the representable range");

    let mut subtotal = Decimal::ZERO;
    let mut tax = Decimal::ZERO;
    let mut groups: BTreeMap<TaxRate, (Decimal, Decimal)> = BTreeMap::new();
    for line in lines {
        let line_subtotal = line.checked_subtotal().ok_or_else(overflow)?;
        let line_tax = line
            .checked_total()
            .and_then(|total| total.checked_sub(line_subtotal))
            .ok_or_else(overflow)?;

        subtotal = subtotal.checked_add(line_subtotal).ok_or_else(overflow)?;
        tax = tax.checked_add(line_tax).ok_or_else(overflow)?;
        let entry = groups
            .entry(line.tax_rate)
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 = entry.0.checked_add(line_subtotal).ok_or_else(overflow)?;
        entry.1 = entry.1.checked_add(line_tax).ok_or_else(overflow)?;
    }
    let total = subtotal.checked_add(tax).ok_or_else(overflow)?;

    let tax_breakdown = groups
        .into_iter()
        .map(|(rate, (taxable_amount, tax_amount))| TaxBreakdown {
            rate,
            taxable_amount,
            tax_amount,
        })
        .collect();

    Ok(Totals {
        subtotal,
        tax,
        total,
        tax_breakdown,
    })
}

impl InvoiceDocument {
    /// Re-run validation on a document that did not come from
    /// [`InvoiceBuilder`](super::InvoiceBuilder), e.g. one deserialized from
    /// storage. Stored totals must match the line items.
    pub fn validate(&self) -> Result<(), FacturaError> {
        let errors = validate_document(
            &self.number,
            self.document_type,
            &self.issuer,
            &self.customer,
            &self.lines,
            self.billing_reference.as_ref(),
        );
        if !errors.is_empty() {
            return Err(FacturaError::Validation(errors));
        }
        if calculate_totals(&self.lines)? != self.totals {
            return Err(FacturaError::invalid(
                "totals",
                "totals do not match the line items",
            ));
        }
        Ok(())
    }
}

/// Check every required field of a document before anything is rendered.
/// Returns all validation errors found (not just the first).
pub(crate) fn validate_document(
    number: &DocumentNumber,
    document_type: DocumentType,
    issuer: &Party,
    customer: &Party,
    lines: &[InvoiceLineItem],
    billing_reference: Option<&BillingReference>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if number.prefix.len() > 4 {
        errors.push(ValidationError::new(
            "number.prefix",
            "prefix cannot exceed 4 characters",
        ));
    }

    validate_party(issuer, "issuer", &mut errors);
    validate_party(customer, "customer", &mut errors);

    if lines.is_empty() {
        errors.push(ValidationError::new(
            "lines",
            "at least one line item is required",
        ));
    }
    for (i, line) in lines.iter().enumerate() {
        validate_line(line, i, &mut errors);
    }

    match (document_type, billing_reference) {
        (DocumentType::Invoice, Some(_)) => errors.push(ValidationError::new(
            "billing_reference",
            "invoices cannot reference another invoice",
        )),
        (DocumentType::CreditNote | DocumentType::DebitNote, None) => {
            errors.push(ValidationError::new(
                "billing_reference",
                "credit and debit notes must reference the adjusted invoice",
            ))
        }
        (_, Some(reference)) if reference.number.trim().is_empty() => errors.push(
            ValidationError::new("billing_reference.number", "must not be empty"),
        ),
        _ => {}
    }

    errors
}

pub(crate) fn validate_party(party: &Party, prefix: &str, errors: &mut Vec<ValidationError>) {
    if party.identifier.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.identifier"),
            "tax identifier must not be empty",
        ));
    } else if !party.identifier.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push(ValidationError::new(
            format!("{prefix}.identifier"),
            "tax identifier must not contain separators",
        ));
    }
    if party.id_type == IdentificationType::Nit {
        if party.check_digit.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("{prefix}.check_digit"),
                "NIT requires a check digit",
            ));
        } else if let Some(expected) = nit_check_digit(&party.identifier) {
            if party.check_digit.trim() != expected.to_string() {
                errors.push(ValidationError::new(
                    format!("{prefix}.check_digit"),
                    format!("check digit of NIT {} is {expected}", party.identifier),
                ));
            }
        } else if !party.identifier.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("{prefix}.identifier"),
                "NIT must be 1 to 15 digits",
            ));
        }
    }
    if party.legal_name.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.legal_name"),
            "legal name must not be empty",
        ));
    }
    if party.address.country_code.len() != 2 {
        errors.push(ValidationError::new(
            format!("{prefix}.address.country_code"),
            "country code must be 2 characters (ISO 3166-1 alpha-2)",
        ));
    }
}

fn validate_line(line: &InvoiceLineItem, idx: usize, errors: &mut Vec<ValidationError>) {
    let prefix = format!("lines[{idx}]");

    if line.code.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.code"),
            "item code must not be empty",
        ));
    }
    if line.description.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{prefix}.description"),
            "description must not be empty",
        ));
    }
    if line.quantity <= Decimal::ZERO {
        errors.push(ValidationError::new(
            format!("{prefix}.quantity"),
            "quantity must be greater than zero",
        ));
    }
    if line.unit_price < Decimal::ZERO {
        errors.push(ValidationError::new(
            format!("{prefix}.unit_price"),
            "unit price must not be negative",
        ));
    }
    if line.checked_total().is_none() {
        errors.push(ValidationError::new(
            format!("{prefix}.amount"),
            "quantity × unit price exceeds the representable range",
        ));
    }
    if !is_known_unit_code(&line.unit) {
        errors.push(ValidationError::new(
            format!("{prefix}.unit"),
            format!("unknown unit of measure code '{}'", line.unit),
        ));
    }
    if let Some(gtin) = &line.gtin {
        if !is_valid_gtin(gtin) {
            errors.push(ValidationError::new(
                format!("{prefix}.gtin"),
                format!("'{gtin}' is not a valid GTIN"),
            ));
        }
    }
}

const NIT_WEIGHTS: [u32; 15] = [3, 7, 13, 17, 19, 23, 29, 37, 41, 43, 47, 53, 59, 67, 71];

/// Verification digit (DV) of a NIT: weighted mod-11 over the digits,
/// rightmost digit first. `None` if `nit` is not 1 to 15 ASCII digits.
pub fn nit_check_digit(nit: &str) -> Option<u32> {
    if nit.is_empty() || nit.len() > NIT_WEIGHTS.len() || !nit.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let sum: u32 = nit
        .bytes()
        .rev()
        .zip(NIT_WEIGHTS)
        .map(|(b, w)| u32::from(b - b'0') * w)
        .sum();
    match sum % 11 {
        r @ (0 | 1) => Some(r),
        r => Some(11 - r),
    }
}

/// GTIN-8/12/13/14 with a valid mod-10 check digit.
pub fn is_valid_gtin(gtin: &str) -> bool {
    if !matches!(gtin.len(), 8 | 12 | 13 | 14) || !gtin.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = gtin.bytes().map(|b| u32::from(b - b'0')).collect();
    let (body, check) = digits.split_at(digits.len() - 1);
    let sum: u32 = body
        .iter()
        .rev()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
        .sum();
    (10 - sum % 10) % 10 == check[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: Decimal, price: Decimal, rate: TaxRate) -> InvoiceLineItem {
        InvoiceLineItem {
            code: "P001".into(),
            description: "Arroz Diana 500g".into(),
            quantity,
            unit_price: price,
            unit: "EA".into(),
            gtin: None,
            tax_rate: rate,
        }
    }

    #[test]
    fn totals_group_by_rate() {
        let lines = vec![
            line(dec!(2), dec!(2500), TaxRate::General),
            line(dec!(1), dec!(8900), TaxRate::General),
            line(dec!(3), dec!(3200), TaxRate::Reduced),
        ];
        let totals = calculate_totals(&lines).unwrap();

        assert_eq!(totals.subtotal, dec!(23500));
        assert_eq!(totals.tax, dec!(3121));
        assert_eq!(totals.total, dec!(26621));
        assert_eq!(totals.tax_breakdown.len(), 2);
        assert_eq!(totals.tax_breakdown[0].rate, TaxRate::Reduced);
        assert_eq!(totals.tax_breakdown[0].tax_amount, dec!(480));
        assert_eq!(totals.tax_breakdown[1].taxable_amount, dec!(13900));
    }

    #[test]
    fn line_amounts_round_to_cents_before_summing() {
        let lines = vec![line(dec!(1), dec!(0.005), TaxRate::Zero); 3];
        let totals = calculate_totals(&lines).unwrap();
        assert_eq!(lines[0].subtotal(), dec!(0.01));
        assert_eq!(totals.subtotal, dec!(0.03));
        assert_eq!(totals.total, dec!(0.03));
    }

    #[test]
    fn overflowing_amounts_are_reported() {
        let big = line(Decimal::MAX, dec!(2), TaxRate::General);
        assert!(big.checked_subtotal().is_none());
        assert!(matches!(
            calculate_totals(&[big.clone()]),
            Err(FacturaError::Validation(_))
        ));

        let mut errors = Vec::new();
        validate_line(&big, 0, &mut errors);
        assert!(errors.iter().any(|e| e.field == "lines[0].amount"));

        let half = line(Decimal::MAX / dec!(2), dec!(1), TaxRate::Zero);
        assert!(calculate_totals(&[half.clone(), half.clone(), half]).is_err());
    }

    #[test]
    fn nit_verification_digit() {
        assert_eq!(nit_check_digit("800197268"), Some(4));
        assert_eq!(nit_check_digit("900123456"), Some(8));
        assert_eq!(nit_check_digit("35696051"), Some(1));
        assert_eq!(nit_check_digit("222222222222"), Some(7));
        assert_eq!(nit_check_digit("9001234X"), None);
        assert_eq!(nit_check_digit("1234567890123456"), None);
    }

    #[test]
    fn gtin_check_digit() {
        assert!(is_valid_gtin("7702001030149"));
        assert!(is_valid_gtin("4006381333931"));
        assert!(!is_valid_gtin("4006381333932"));
        assert!(!is_valid_gtin("12345"));
        assert!(!is_valid_gtin("40063813339AB"));
    }
}
