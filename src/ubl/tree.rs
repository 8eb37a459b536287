//! Namespace-qualified element tree.
//!
//! Every element is created from a [`Tag`], a closed list of the elements
//! this crate emits, each bound to exactly one [`Ns`]. A misspelt element or
//! a wrong prefix is a compile error instead of a schema rejection.

use super::ns;

/// Namespaces used by the generated documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ns {
    /// Default namespace of an `Invoice` root.
    Invoice,
    /// Default namespace of a `CreditNote` root.
    CreditNote,
    /// Default namespace of a `DebitNote` root.
    DebitNote,
    Cac,
    Cbc,
    Ext,
    Sts,
    Ds,
    Xades,
    Xades141,
    Xsi,
}

impl Ns {
    pub fn uri(self) -> &'static str {
        match self {
            Self::Invoice => ns::INVOICE,
            Self::CreditNote => ns::CREDIT_NOTE,
            Self::DebitNote => ns::DEBIT_NOTE,
            Self::Cac => ns::CAC,
            Self::Cbc => ns::CBC,
            Self::Ext => ns::EXT,
            Self::Sts => ns::STS,
            Self::Ds => ns::DS,
            Self::Xades => ns::XADES,
            Self::Xades141 => ns::XADES141,
            Self::Xsi => ns::XSI,
        }
    }

    /// Declared prefix; `None` for the document's default namespace.
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Invoice | Self::CreditNote | Self::DebitNote => None,
            Self::Cac => Some("cac"),
            Self::Cbc => Some("cbc"),
            Self::Ext => Some("ext"),
            Self::Sts => Some("sts"),
            Self::Ds => Some("ds"),
            Self::Xades => Some("xades"),
            Self::Xades141 => Some("xades141"),
            Self::Xsi => Some("xsi"),
        }
    }

    /// Namespace declaration attribute name, e.g. `xmlns:cbc`.
    pub fn declaration(self) -> String {
        match self.prefix() {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        }
    }
}

macro_rules! tags {
    ($($variant:ident => $ns:ident : $name:literal,)*) => {
        /// Every element name the document builder and the signature embedder emit.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Tag {
            $($variant,)*
        }

        impl Tag {
            pub fn ns(self) -> Ns {
                match self {
                    $(Self::$variant => Ns::$ns,)*
                }
            }

            pub fn local_name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }
    };
}

tags! {
    // Document roots
    Invoice => Invoice: "Invoice",
    CreditNote => CreditNote: "CreditNote",
    DebitNote => DebitNote: "DebitNote",

    // Extension components
    UblExtensions => Ext: "UBLExtensions",
    UblExtension => Ext: "UBLExtension",
    ExtensionContent => Ext: "ExtensionContent",

    // Authority structures
    DianExtensions => Sts: "DianExtensions",
    InvoiceControl => Sts: "InvoiceControl",
    InvoiceAuthorization => Sts: "InvoiceAuthorization",
    AuthorizedInvoices => Sts: "AuthorizedInvoices",
    Prefix => Sts: "Prefix",
    From => Sts: "From",
    To => Sts: "To",
    InvoiceSource => Sts: "InvoiceSource",
    SoftwareProvider => Sts: "SoftwareProvider",
    ProviderId => Sts: "ProviderID",
    SoftwareId => Sts: "SoftwareID",
    SoftwareSecurityCode => Sts: "SoftwareSecurityCode",
    AuthorizationProvider => Sts: "AuthorizationProvider",
    AuthorizationProviderId => Sts: "AuthorizationProviderID",

    // Basic components
    UblVersionId => Cbc: "UBLVersionID",
    CustomizationId => Cbc: "CustomizationID",
    ProfileId => Cbc: "ProfileID",
    ProfileExecutionId => Cbc: "ProfileExecutionID",
    Id => Cbc: "ID",
    Uuid => Cbc: "UUID",
    IssueDate => Cbc: "IssueDate",
    IssueTime => Cbc: "IssueTime",
    InvoiceTypeCode => Cbc: "InvoiceTypeCode",
    CreditNoteTypeCode => Cbc: "CreditNoteTypeCode",
    Note => Cbc: "Note",
    DocumentCurrencyCode => Cbc: "DocumentCurrencyCode",
    LineCountNumeric => Cbc: "LineCountNumeric",
    AdditionalAccountId => Cbc: "AdditionalAccountID",
    Name => Cbc: "Name",
    RegistrationName => Cbc: "RegistrationName",
    CompanyId => Cbc: "CompanyID",
    TaxLevelCode => Cbc: "TaxLevelCode",
    CityName => Cbc: "CityName",
    CountrySubentity => Cbc: "CountrySubentity",
    CountrySubentityCode => Cbc: "CountrySubentityCode",
    Line => Cbc: "Line",
    IdentificationCode => Cbc: "IdentificationCode",
    Telephone => Cbc: "Telephone",
    ElectronicMail => Cbc: "ElectronicMail",
    TaxAmount => Cbc: "TaxAmount",
    TaxableAmount => Cbc: "TaxableAmount",
    Percent => Cbc: "Percent",
    LineExtensionAmount => Cbc: "LineExtensionAmount",
    TaxExclusiveAmount => Cbc: "TaxExclusiveAmount",
    TaxInclusiveAmount => Cbc: "TaxInclusiveAmount",
    PayableAmount => Cbc: "PayableAmount",
    InvoicedQuantity => Cbc: "InvoicedQuantity",
    CreditedQuantity => Cbc: "CreditedQuantity",
    DebitedQuantity => Cbc: "DebitedQuantity",
    Description => Cbc: "Description",
    PriceAmount => Cbc: "PriceAmount",
    BaseQuantity => Cbc: "BaseQuantity",

    // Aggregate components
    BillingReference => Cac: "BillingReference",
    InvoiceDocumentReference => Cac: "InvoiceDocumentReference",
    AccountingSupplierParty => Cac: "AccountingSupplierParty",
    AccountingCustomerParty => Cac: "AccountingCustomerParty",
    Party => Cac: "Party",
    PartyIdentification => Cac: "PartyIdentification",
    PartyName => Cac: "PartyName",
    PhysicalLocation => Cac: "PhysicalLocation",
    Address => Cac: "Address",
    AddressLine => Cac: "AddressLine",
    Country => Cac: "Country",
    PartyTaxScheme => Cac: "PartyTaxScheme",
    TaxScheme => Cac: "TaxScheme",
    PartyLegalEntity => Cac: "PartyLegalEntity",
    Contact => Cac: "Contact",
    TaxTotal => Cac: "TaxTotal",
    TaxSubtotal => Cac: "TaxSubtotal",
    TaxCategory => Cac: "TaxCategory",
    LegalMonetaryTotal => Cac: "LegalMonetaryTotal",
    RequestedMonetaryTotal => Cac: "RequestedMonetaryTotal",
    InvoiceLine => Cac: "InvoiceLine",
    CreditNoteLine => Cac: "CreditNoteLine",
    DebitNoteLine => Cac: "DebitNoteLine",
    Item => Cac: "Item",
    SellersItemIdentification => Cac: "SellersItemIdentification",
    StandardItemIdentification => Cac: "StandardItemIdentification",
    Price => Cac: "Price",

    // XML signature
    Signature => Ds: "Signature",
    SignedInfo => Ds: "SignedInfo",
    CanonicalizationMethod => Ds: "CanonicalizationMethod",
    SignatureMethod => Ds: "SignatureMethod",
    Reference => Ds: "Reference",
    Transforms => Ds: "Transforms",
    Transform => Ds: "Transform",
    DigestMethod => Ds: "DigestMethod",
    DigestValue => Ds: "DigestValue",
    SignatureValue => Ds: "SignatureValue",
    KeyInfo => Ds: "KeyInfo",
    X509Data => Ds: "X509Data",
    X509Certificate => Ds: "X509Certificate",
    Object => Ds: "Object",

    // Qualifying properties
    QualifyingProperties => Xades: "QualifyingProperties",
    SignedProperties => Xades: "SignedProperties",
    SignedSignatureProperties => Xades: "SignedSignatureProperties",
    SigningTime => Xades: "SigningTime",
    SigningCertificate => Xades: "SigningCertificate",
    Cert => Xades: "Cert",
    CertDigest => Xades: "CertDigest",
    SignaturePolicyIdentifier => Xades: "SignaturePolicyIdentifier",
    SignaturePolicyId => Xades: "SignaturePolicyId",
    SigPolicyId => Xades: "SigPolicyId",
    Identifier => Xades: "Identifier",
    SigPolicyHash => Xades: "SigPolicyHash",
}

impl Tag {
    /// Name as written in the document, e.g. `cbc:ID` or `Invoice`.
    pub fn qualified_name(self) -> String {
        match self.ns().prefix() {
            Some(p) => format!("{p}:{}", self.local_name()),
            None => self.local_name().to_string(),
        }
    }
}

/// Child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with its namespace declarations, attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: Tag,
    declarations: Vec<Ns>,
    attributes: Vec<(&'static str, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            declarations: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element holding a single text node.
    pub fn leaf(tag: Tag, text: impl Into<String>) -> Self {
        Self::new(tag).text(text)
    }

    /// Declare a namespace on this element.
    pub fn declare(mut self, ns: Ns) -> Self {
        if !self.declarations.contains(&ns) {
            self.declarations.push(ns);
        }
        self
    }

    /// Add an unqualified attribute.
    pub fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attributes.push((name, value.into()));
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn children_from(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children
            .extend(children.into_iter().map(Node::Element));
        self
    }

    /// Add a child only when `child` is `Some`.
    pub fn child_opt(self, child: Option<Element>) -> Self {
        match child {
            Some(c) => self.child(c),
            None => self,
        }
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn insert(&mut self, index: usize, child: Element) {
        self.children.insert(index, Node::Element(child));
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn declarations(&self) -> &[Ns] {
        &self.declarations
    }

    pub fn attributes(&self) -> &[(&'static str, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child with the given tag.
    pub fn find(&self, tag: Tag) -> Option<&Element> {
        self.elements().find(|e| e.tag == tag)
    }

    pub fn find_mut(&mut self, tag: Tag) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.tag == tag)
    }

    /// First descendant (depth-first, including `self`) with the given tag.
    pub fn descendant(&self, tag: Tag) -> Option<&Element> {
        if self.tag == tag {
            return Some(self);
        }
        self.elements().find_map(|e| e.descendant(tag))
    }

    /// Concatenated text of the direct text children.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Namespaces used somewhere in this subtree without an in-scope declaration.
    pub fn undeclared_namespaces(&self) -> Vec<Ns> {
        let mut missing = Vec::new();
        self.collect_undeclared(&mut Vec::new(), &mut missing);
        missing
    }

    fn collect_undeclared(&self, in_scope: &mut Vec<Ns>, missing: &mut Vec<Ns>) {
        let pushed = self.declarations.len();
        in_scope.extend(self.declarations.iter().copied());
        let ns = self.tag.ns();
        if !in_scope.contains(&ns) && !missing.contains(&ns) {
            missing.push(ns);
        }
        for child in self.elements() {
            child.collect_undeclared(in_scope, missing);
        }
        in_scope.truncate(in_scope.len() - pushed);
    }
}
