use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

use super::tree::{Element, Node};
use crate::core::FacturaError;

fn xml_io(e: std::io::Error) -> FacturaError {
    FacturaError::Xml(format!("XML write error: {e}"))
}

/// Streams an [`Element`] tree through a quick-xml writer.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    /// Writer without any inter-element whitespace.
    pub fn compact() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    /// Indenting writer for human-readable previews.
    ///
    /// Indentation adds whitespace text nodes, so pretty output must never
    /// be fed into the signing pipeline.
    pub fn pretty() -> Self {
        Self {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
        }
    }

    pub fn declaration(&mut self) -> Result<&mut Self, FacturaError> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(self)
    }

    /// Write `element` and its whole subtree.
    ///
    /// Fails if the subtree uses a namespace that no enclosing element of
    /// the subtree declares.
    pub fn element(&mut self, element: &Element) -> Result<&mut Self, FacturaError> {
        let missing = element.undeclared_namespaces();
        if !missing.is_empty() {
            return Err(FacturaError::Xml(format!(
                "undeclared namespaces in <{}>: {:?}",
                element.tag().qualified_name(),
                missing
            )));
        }
        self.write_subtree(element)?;
        Ok(self)
    }

    fn write_subtree(&mut self, element: &Element) -> Result<(), FacturaError> {
        let name = element.tag().qualified_name();
        let mut start = BytesStart::new(name.as_str());
        for ns in element.declarations() {
            start.push_attribute((ns.declaration().as_str(), ns.uri()));
        }
        for (k, v) in element.attributes() {
            start.push_attribute((*k, v.as_str()));
        }
        self.writer.write_event(Event::Start(start)).map_err(xml_io)?;

        for child in element.children() {
            match child {
                Node::Element(e) => self.write_subtree(e)?,
                Node::Text(t) => self
                    .writer
                    .write_event(Event::Text(BytesText::new(t)))
                    .map_err(xml_io)?,
            }
        }

        self.writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(xml_io)?;
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }

    pub fn into_string(self) -> Result<String, FacturaError> {
        String::from_utf8(self.into_bytes())
            .map_err(|e| FacturaError::Xml(format!("XML UTF-8 error: {e}")))
    }
}

/// XML declaration plus the tree, without indentation.
pub fn render_compact(root: &Element) -> Result<Vec<u8>, FacturaError> {
    let mut w = XmlWriter::compact();
    w.declaration()?.element(root)?;
    Ok(w.into_bytes())
}

/// XML declaration plus the tree, indented by two spaces.
pub fn render_pretty(root: &Element) -> Result<String, FacturaError> {
    let mut w = XmlWriter::pretty();
    w.declaration()?.element(root)?;
    w.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ubl::{Ns, Tag};

    fn sample() -> Element {
        Element::new(Tag::Invoice)
            .declare(Ns::Invoice)
            .declare(Ns::Cbc)
            .child(Element::leaf(Tag::Id, "SETP990000000"))
            .child(Element::leaf(Tag::Note, "a < b & c").attr("languageID", "es"))
    }

    #[test]
    fn compact_rendering() {
        let xml = String::from_utf8(render_compact(&sample()).unwrap()).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <Invoice xmlns=\"urn:oasis:names:specification:ubl:schema:xsd:Invoice-2\" \
             xmlns:cbc=\"urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2\">\
             <cbc:ID>SETP990000000</cbc:ID>\
             <cbc:Note languageID=\"es\">a &lt; b &amp; c</cbc:Note></Invoice>"
        );
    }

    #[test]
    fn pretty_rendering_is_indented() {
        let xml = render_pretty(&sample()).unwrap();
        assert!(xml.contains("\n  <cbc:ID>SETP990000000</cbc:ID>"));
    }

    #[test]
    fn undeclared_namespace_is_rejected() {
        let tree = Element::new(Tag::Invoice)
            .declare(Ns::Invoice)
            .child(Element::leaf(Tag::Id, "1"));
        let err = render_compact(&tree).unwrap_err();
        assert!(matches!(err, FacturaError::Xml(msg) if msg.contains("Cbc")));
    }
}
