use rust_decimal::Decimal;

use super::tree::{Element, Ns, Tag};
use super::writer::render_compact;
use super::{AUTHORITY_CHECK_DIGIT, AUTHORITY_NIT, CUSTOMIZATION_ID, PROFILE_ID, UBL_VERSION};
use crate::core::*;
use crate::fiscal::{TAX_IVA, format_amount, software_security_code, verify_fiscal_identifier};

/// Children of the document root in schema order.
///
/// Covers all three document types; each type uses a subset.
const ROOT_SEQUENCE: &[Tag] = &[
    Tag::UblExtensions,
    Tag::UblVersionId,
    Tag::CustomizationId,
    Tag::ProfileId,
    Tag::ProfileExecutionId,
    Tag::Id,
    Tag::Uuid,
    Tag::IssueDate,
    Tag::IssueTime,
    Tag::InvoiceTypeCode,
    Tag::CreditNoteTypeCode,
    Tag::Note,
    Tag::DocumentCurrencyCode,
    Tag::LineCountNumeric,
    Tag::BillingReference,
    Tag::AccountingSupplierParty,
    Tag::AccountingCustomerParty,
    Tag::TaxTotal,
    Tag::LegalMonetaryTotal,
    Tag::RequestedMonetaryTotal,
    Tag::InvoiceLine,
    Tag::CreditNoteLine,
    Tag::DebitNoteLine,
];

/// Element names that differ between invoices, credit notes and debit notes.
struct Layout {
    root: Tag,
    root_ns: Ns,
    type_code: Option<Tag>,
    monetary_total: Tag,
    line: Tag,
    quantity: Tag,
}

impl Layout {
    fn for_type(document_type: DocumentType) -> Self {
        match document_type {
            DocumentType::Invoice => Self {
                root: Tag::Invoice,
                root_ns: Ns::Invoice,
                type_code: Some(Tag::InvoiceTypeCode),
                monetary_total: Tag::LegalMonetaryTotal,
                line: Tag::InvoiceLine,
                quantity: Tag::InvoicedQuantity,
            },
            DocumentType::CreditNote => Self {
                root: Tag::CreditNote,
                root_ns: Ns::CreditNote,
                type_code: Some(Tag::CreditNoteTypeCode),
                monetary_total: Tag::LegalMonetaryTotal,
                line: Tag::CreditNoteLine,
                quantity: Tag::CreditedQuantity,
            },
            DocumentType::DebitNote => Self {
                root: Tag::DebitNote,
                root_ns: Ns::DebitNote,
                type_code: None,
                monetary_total: Tag::RequestedMonetaryTotal,
                line: Tag::DebitNoteLine,
                quantity: Tag::DebitedQuantity,
            },
        }
    }
}

/// Assemble the UBL tree of a document.
///
/// The document is validated again and must carry the fiscal identifier its
/// content yields, so deserialized documents get the same checks as built
/// ones. The result has
/// an empty signature slot as the first `ext:UBLExtension`, so the tree is
/// ready to be canonicalized and digested.
pub fn build_document_tree(
    document: &InvoiceDocument,
    config: &IssuerConfig,
) -> Result<Element, FacturaError> {
    document.validate()?;
    let fiscal_id = verify_fiscal_identifier(document, config)?;

    let layout = Layout::for_type(document.document_type());
    let currency = config.currency.as_str();
    let totals = document.totals();

    let mut root = Element::new(layout.root)
        .declare(layout.root_ns)
        .declare(Ns::Cac)
        .declare(Ns::Cbc)
        .declare(Ns::Ext)
        .declare(Ns::Sts)
        .declare(Ns::Ds)
        .declare(Ns::Xades)
        .declare(Ns::Xades141)
        .declare(Ns::Xsi);

    if let Some(software) = &config.software {
        root.push(Element::new(Tag::UblExtensions).child(
            Element::new(Tag::UblExtension).child(
                Element::new(Tag::ExtensionContent)
                    .child(dian_extensions(document, config, software)),
            ),
        ));
    }

    root = root
        .child(Element::leaf(Tag::UblVersionId, UBL_VERSION))
        .child(Element::leaf(Tag::CustomizationId, CUSTOMIZATION_ID))
        .child(Element::leaf(Tag::ProfileId, PROFILE_ID))
        .child(Element::leaf(
            Tag::ProfileExecutionId,
            config.environment.code(),
        ))
        .child(Element::leaf(Tag::Id, document.number().to_string()))
        .child(
            Element::leaf(Tag::Uuid, &fiscal_id.value)
                .attr("schemeID", config.environment.code())
                .attr("schemeName", fiscal_id.scheme.name()),
        )
        .child(Element::leaf(Tag::IssueDate, document.issue_date()))
        .child(Element::leaf(Tag::IssueTime, document.issue_time()))
        .child_opt(
            layout
                .type_code
                .map(|tag| Element::leaf(tag, document.document_type().code())),
        )
        .children_from(
            document
                .notes()
                .iter()
                .map(|n| Element::leaf(Tag::Note, n)),
        )
        .child(Element::leaf(Tag::DocumentCurrencyCode, currency))
        .child(Element::leaf(
            Tag::LineCountNumeric,
            document.lines().len().to_string(),
        ))
        .child_opt(document.billing_reference().map(billing_reference))
        .child(party(Tag::AccountingSupplierParty, document.issuer()))
        .child(party(Tag::AccountingCustomerParty, document.customer()));

    // Tax totals
    root.push(tax_total(
        totals.tax,
        totals
            .tax_breakdown
            .iter()
            .map(|b| (b.rate, b.taxable_amount, b.tax_amount)),
        currency,
    ));

    // Monetary totals
    root.push(
        Element::new(layout.monetary_total)
            .child(amount(Tag::LineExtensionAmount, totals.subtotal, currency))
            .child(amount(Tag::TaxExclusiveAmount, totals.subtotal, currency))
            .child(amount(Tag::TaxInclusiveAmount, totals.total, currency))
            .child(amount(Tag::PayableAmount, totals.total, currency)),
    );

    for (i, item) in document.lines().iter().enumerate() {
        root.push(line(i + 1, item, &layout, currency));
    }

    ensure_signature_slot(&mut root);
    check_root_order(&root)?;

    tracing::debug!(
        number = %document.number(),
        document_type = document.document_type().code(),
        lines = document.lines().len(),
        "document tree assembled"
    );
    Ok(root)
}

/// Render the unsigned document as compact XML.
pub fn to_ubl_xml(document: &InvoiceDocument, config: &IssuerConfig) -> Result<String, FacturaError> {
    let tree = build_document_tree(document, config)?;
    String::from_utf8(render_compact(&tree)?)
        .map_err(|e| FacturaError::Xml(format!("XML UTF-8 error: {e}")))
}

/// Verify the root children follow the schema sequence.
pub fn check_root_order(root: &Element) -> Result<(), FacturaError> {
    let mut last = 0;
    for child in root.elements() {
        let tag = child.tag();
        let pos = ROOT_SEQUENCE
            .iter()
            .position(|t| *t == tag)
            .ok_or_else(|| {
                FacturaError::Xml(format!(
                    "unexpected element <{}> under <{}>",
                    tag.qualified_name(),
                    root.tag().qualified_name()
                ))
            })?;
        if pos < last {
            return Err(FacturaError::Xml(format!(
                "element <{}> out of schema order",
                tag.qualified_name()
            )));
        }
        last = pos;
    }
    Ok(())
}

/// Make sure the first `ext:UBLExtension` under the root is a signature slot.
///
/// Creates the `ext:UBLExtensions` container if absent and prepends an empty
/// extension unless the first one is already empty or already holds a
/// signature. Existing extensions are kept after the slot.
pub fn ensure_signature_slot(root: &mut Element) {
    if root.find(Tag::UblExtensions).is_none() {
        root.insert(0, Element::new(Tag::UblExtensions));
    }
    let Some(container) = root.find_mut(Tag::UblExtensions) else {
        return;
    };
    let usable = container
        .find(Tag::UblExtension)
        .and_then(|ext| ext.find(Tag::ExtensionContent))
        .is_some_and(|content| {
            content.elements().next().is_none() || content.find(Tag::Signature).is_some()
        });
    if !usable {
        container.insert(
            0,
            Element::new(Tag::UblExtension).child(Element::new(Tag::ExtensionContent)),
        );
    }
}

/// The `ext:ExtensionContent` reserved for the signature, if present.
pub fn signature_slot_mut(root: &mut Element) -> Option<&mut Element> {
    root.find_mut(Tag::UblExtensions)?
        .find_mut(Tag::UblExtension)?
        .find_mut(Tag::ExtensionContent)
}

fn amount(tag: Tag, value: Decimal, currency: &str) -> Element {
    Element::leaf(tag, format_amount(value)).attr("currencyID", currency)
}

/// At least two decimals; extra precision is kept.
fn format_quantity(d: Decimal) -> String {
    let s = d.normalize().to_string();
    match s.find('.') {
        Some(dot) if s.len() - dot - 1 >= 2 => s,
        Some(dot) => format!("{s}{}", "0".repeat(2 - (s.len() - dot - 1))),
        None => format!("{s}.00"),
    }
}

fn dian_extensions(
    document: &InvoiceDocument,
    config: &IssuerConfig,
    software: &SoftwareCredentials,
) -> Element {
    let numbering = &config.numbering;
    let control = (document.document_type() == DocumentType::Invoice).then(|| {
        Element::new(Tag::InvoiceControl)
            .child(Element::leaf(
                Tag::InvoiceAuthorization,
                &numbering.authorization,
            ))
            .child(
                Element::new(Tag::AuthorizedInvoices)
                    .child(Element::leaf(Tag::Prefix, &numbering.prefix))
                    .child(Element::leaf(Tag::From, numbering.from.to_string()))
                    .child(Element::leaf(Tag::To, numbering.to.to_string())),
            )
    });

    let issuer = document.issuer();
    let mut provider_id = Element::leaf(Tag::ProviderId, &issuer.identifier)
        .attr("schemeAgencyID", "195");
    if !issuer.check_digit.is_empty() {
        provider_id = provider_id.attr("schemeID", &issuer.check_digit);
    }
    provider_id = provider_id.attr("schemeName", issuer.id_type.code());

    Element::new(Tag::DianExtensions)
        .child_opt(control)
        .child(
            Element::new(Tag::InvoiceSource).child(
                Element::leaf(Tag::IdentificationCode, "CO")
                    .attr("listAgencyID", "6")
                    .attr(
                        "listSchemeURI",
                        "urn:oasis:names:specification:ubl:codelist:gc:CountryIdentificationCode-2.1",
                    ),
            ),
        )
        .child(
            Element::new(Tag::SoftwareProvider)
                .child(provider_id)
                .child(
                    Element::leaf(Tag::SoftwareId, &software.software_id)
                        .attr("schemeAgencyID", "195"),
                ),
        )
        .child(
            Element::leaf(
                Tag::SoftwareSecurityCode,
                software_security_code(&software.software_id, &software.pin),
            )
            .attr("schemeAgencyID", "195"),
        )
        .child(
            Element::new(Tag::AuthorizationProvider).child(
                Element::leaf(Tag::AuthorizationProviderId, AUTHORITY_NIT)
                    .attr("schemeAgencyID", "195")
                    .attr("schemeID", AUTHORITY_CHECK_DIGIT)
                    .attr("schemeName", IdentificationType::Nit.code()),
            ),
        )
}

fn billing_reference(reference: &BillingReference) -> Element {
    Element::new(Tag::BillingReference).child(
        Element::new(Tag::InvoiceDocumentReference)
            .child(Element::leaf(Tag::Id, &reference.number))
            .child(
                Element::leaf(Tag::Uuid, &reference.fiscal_identifier.value)
                    .attr("schemeName", reference.fiscal_identifier.scheme.name()),
            )
            .child(Element::leaf(
                Tag::IssueDate,
                reference.issue_date.format("%Y-%m-%d").to_string(),
            )),
    )
}

/// Tax identifier with check digit and identification type attributes.
fn party_id(tag: Tag, party: &Party) -> Element {
    let mut e = Element::leaf(tag, &party.identifier);
    if !party.check_digit.is_empty() {
        e = e.attr("schemeID", &party.check_digit);
    }
    e.attr("schemeName", party.id_type.code())
}

fn party(wrapper: Tag, party: &Party) -> Element {
    let tax_scheme = Element::new(Tag::TaxScheme)
        .child(Element::leaf(Tag::Id, TAX_IVA))
        .child(Element::leaf(Tag::Name, "IVA"));

    let contact = party.contact.as_ref().and_then(|c| {
        if c.telephone.is_none() && c.email.is_none() {
            return None;
        }
        Some(
            Element::new(Tag::Contact)
                .child_opt(c.telephone.as_ref().map(|t| Element::leaf(Tag::Telephone, t)))
                .child_opt(c.email.as_ref().map(|m| Element::leaf(Tag::ElectronicMail, m))),
        )
    });

    Element::new(wrapper)
        .child(Element::leaf(
            Tag::AdditionalAccountId,
            party.person_type.code(),
        ))
        .child(
            Element::new(Tag::Party)
                .child(Element::new(Tag::PartyIdentification).child(party_id(Tag::Id, party)))
                .child(
                    Element::new(Tag::PartyName)
                        .child(Element::leaf(Tag::Name, &party.legal_name)),
                )
                .child_opt(
                    address(&party.address)
                        .map(|a| Element::new(Tag::PhysicalLocation).child(a)),
                )
                .child(
                    Element::new(Tag::PartyTaxScheme)
                        .child(Element::leaf(Tag::RegistrationName, &party.legal_name))
                        .child(party_id(Tag::CompanyId, party))
                        .child(
                            Element::leaf(Tag::TaxLevelCode, party.responsibilities.join(";"))
                                .attr("listName", &party.tax_regime),
                        )
                        .child(tax_scheme),
                )
                .child(
                    Element::new(Tag::PartyLegalEntity)
                        .child(Element::leaf(Tag::RegistrationName, &party.legal_name))
                        .child(party_id(Tag::CompanyId, party)),
                )
                .child_opt(contact),
        )
}

fn address(address: &Address) -> Option<Element> {
    if address.line.is_empty()
        && address.city.is_empty()
        && address.department.is_empty()
        && address.municipality_code.is_empty()
    {
        return None;
    }
    let non_empty = |tag: Tag, value: &str| (!value.is_empty()).then(|| Element::leaf(tag, value));
    Some(
        Element::new(Tag::Address)
            .child_opt(non_empty(Tag::Id, &address.municipality_code))
            .child_opt(non_empty(Tag::CityName, &address.city))
            .child_opt(non_empty(Tag::CountrySubentity, &address.department))
            .child_opt(non_empty(
                Tag::CountrySubentityCode,
                &address.municipality_code,
            ))
            .child_opt(
                non_empty(Tag::Line, &address.line)
                    .map(|l| Element::new(Tag::AddressLine).child(l)),
            )
            .child(
                Element::new(Tag::Country)
                    .child(Element::leaf(Tag::IdentificationCode, &address.country_code)),
            ),
    )
}

/// One `cac:TaxTotal` for IVA with a subtotal per rate.
fn tax_total(
    tax: Decimal,
    subtotals: impl Iterator<Item = (TaxRate, Decimal, Decimal)>,
    currency: &str,
) -> Element {
    Element::new(Tag::TaxTotal)
        .child(amount(Tag::TaxAmount, tax, currency))
        .children_from(subtotals.map(|(rate, taxable, tax)| {
            Element::new(Tag::TaxSubtotal)
                .child(amount(Tag::TaxableAmount, taxable, currency))
                .child(amount(Tag::TaxAmount, tax, currency))
                .child(
                    Element::new(Tag::TaxCategory)
                        .child(Element::leaf(Tag::Percent, format_amount(rate.percent())))
                        .child(
                            Element::new(Tag::TaxScheme)
                                .child(Element::leaf(Tag::Id, TAX_IVA))
                                .child(Element::leaf(Tag::Name, "IVA")),
                        ),
                )
        }))
}

fn line(sequence: usize, item: &InvoiceLineItem, layout: &Layout, currency: &str) -> Element {
    let standard_id = item.gtin().map(|gtin| {
        Element::new(Tag::StandardItemIdentification).child(
            Element::leaf(Tag::Id, gtin)
                .attr("schemeID", "010")
                .attr("schemeName", "GTIN"),
        )
    });

    Element::new(layout.line)
        .child(Element::leaf(Tag::Id, sequence.to_string()))
        .child(
            Element::leaf(layout.quantity, format_quantity(item.quantity()))
                .attr("unitCode", item.unit()),
        )
        .child(amount(Tag::LineExtensionAmount, item.subtotal(), currency))
        .child(tax_total(
            item.tax(),
            std::iter::once((item.tax_rate(), item.subtotal(), item.tax())),
            currency,
        ))
        .child(
            Element::new(Tag::Item)
                .child(Element::leaf(Tag::Description, item.description()))
                .child(
                    Element::new(Tag::SellersItemIdentification)
                        .child(Element::leaf(Tag::Id, item.code())),
                )
                .child_opt(standard_id),
        )
        .child(
            Element::new(Tag::Price)
                .child(amount(Tag::PriceAmount, item.unit_price(), currency))
                .child(Element::leaf(Tag::BaseQuantity, "1.00").attr("unitCode", item.unit())),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ubl::Node;
    use rust_decimal_macros::dec;

    #[test]
    fn quantity_formatting() {
        assert_eq!(format_quantity(dec!(2)), "2.00");
        assert_eq!(format_quantity(dec!(1.5)), "1.50");
        assert_eq!(format_quantity(dec!(0.125)), "0.125");
        assert_eq!(format_quantity(dec!(3.000)), "3.00");
    }

    #[test]
    fn signature_slot_is_created_first() {
        let mut root = Element::new(Tag::Invoice)
            .child(Element::leaf(Tag::UblVersionId, UBL_VERSION));
        ensure_signature_slot(&mut root);

        let first = root.elements().next().unwrap();
        assert_eq!(first.tag(), Tag::UblExtensions);
        assert!(signature_slot_mut(&mut root).unwrap().children().is_empty());
    }

    #[test]
    fn signature_slot_is_merged_into_existing_container() {
        let mut root = Element::new(Tag::Invoice).child(
            Element::new(Tag::UblExtensions).child(
                Element::new(Tag::UblExtension).child(
                    Element::new(Tag::ExtensionContent).child(Element::new(Tag::DianExtensions)),
                ),
            ),
        );
        ensure_signature_slot(&mut root);
        ensure_signature_slot(&mut root);

        let container = root.find(Tag::UblExtensions).unwrap();
        let extensions: Vec<_> = container.elements().collect();
        assert_eq!(extensions.len(), 2);
        let slot = extensions[0].find(Tag::ExtensionContent).unwrap();
        assert!(slot.children().is_empty());
        let dian = extensions[1].find(Tag::ExtensionContent).unwrap();
        assert!(dian.find(Tag::DianExtensions).is_some());
    }

    #[test]
    fn root_order_violation_is_detected() {
        let root = Element::new(Tag::Invoice)
            .child(Element::leaf(Tag::Id, "SETP1"))
            .child(Element::leaf(Tag::UblVersionId, UBL_VERSION));
        assert!(matches!(check_root_order(&root), Err(FacturaError::Xml(_))));

        let root = Element::new(Tag::Invoice)
            .child(Element::leaf(Tag::UblVersionId, UBL_VERSION))
            .child(Element::leaf(Tag::Note, "a"))
            .child(Element::leaf(Tag::Note, "b"))
            .child(Element::new(Tag::InvoiceLine))
            .child(Element::new(Tag::InvoiceLine));
        assert!(check_root_order(&root).is_ok());
    }

    #[test]
    fn element_outside_sequence_is_rejected() {
        let root = Element::new(Tag::Invoice).child(Element::new(Tag::Price));
        assert!(check_root_order(&root).is_err());
    }

    #[test]
    fn text_nodes_do_not_affect_order() {
        let mut root = Element::new(Tag::Invoice).text("\n");
        root.push(Element::leaf(Tag::UblVersionId, UBL_VERSION));
        assert!(matches!(root.children()[0], Node::Text(_)));
        assert!(check_root_order(&root).is_ok());
    }
}
