//! Minimal element tree for the XML-based formats.
//!
//! KML and GPX documents are small enough to hold in memory, and walking a
//! tree is far simpler than tracking reader state across events.

use anyhow::{Context, Result, bail};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Clone, Default)]
pub(crate) struct XmlElement {
    /// Local name, namespace prefix removed
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.with_context(|| format!("Malformed attribute on <{}>", name))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .with_context(|| format!("Malformed attribute value on <{}>", name))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            ..Default::default()
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child named `name`
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children named `name`
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first direct child named `name`, if not blank
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// All descendants named `name`, in document order
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut found = Vec::new();
        let mut pending: Vec<&XmlElement> = self.children.iter().rev().collect();
        while let Some(element) = pending.pop() {
            if element.name == name {
                found.push(element);
            }
            pending.extend(element.children.iter().rev());
        }
        found
    }
}

/// Deepest element nesting accepted in a document
pub(crate) const MAX_DEPTH: usize = 1024;

/// Parse a document into its root element.
pub(crate) fn parse_document(content: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("Malformed XML at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(start) => {
                if stack.len() >= MAX_DEPTH {
                    bail!("Elements nested deeper than {} levels", MAX_DEPTH);
                }
                stack.push(XmlElement::from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = XmlElement::from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().context("Unbalanced closing tag")?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let text = text.unescape().context("Malformed text content")?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        bail!("Unexpected end of document inside <{}>", open.name);
    }
    root.context("Document has no root element")
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => bail!("Document has more than one root element"),
        None => *root = Some(element),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_with_namespaces_and_cdata() {
        let doc = parse_document(
            r#"<?xml version="1.0"?>
            <kml:kml xmlns:kml="http://www.opengis.net/kml/2.2">
              <kml:Placemark id="a">
                <kml:name>Oak &amp; Ash</kml:name>
                <kml:description><![CDATA[<b>big</b>]]></kml:description>
              </kml:Placemark>
            </kml:kml>"#,
        )
        .unwrap();

        assert_eq!(doc.name, "kml");
        let placemark = doc.child("Placemark").unwrap();
        assert_eq!(placemark.attribute("id"), Some("a"));
        assert_eq!(placemark.child_text("name"), Some("Oak & Ash"));
        assert_eq!(placemark.child_text("description"), Some("<b>big</b>"));
    }

    #[test]
    fn test_descendants_in_document_order() {
        let doc = parse_document(
            "<Document><Folder><Placemark><name>a</name></Placemark>\
             <Folder><Placemark><name>b</name></Placemark></Folder></Folder>\
             <Placemark><name>c</name></Placemark></Document>",
        )
        .unwrap();
        let names: Vec<&str> = doc
            .descendants("Placemark")
            .iter()
            .filter_map(|p| p.child_text("name"))
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_descendants_of_deeply_nested_folders() {
        let depth = 500;
        let mut content = String::from("<Document>");
        for i in 0..depth {
            content.push_str(&format!("<Folder><Placemark><name>{}</name></Placemark>", i));
        }
        content.push_str(&"</Folder>".repeat(depth));
        content.push_str("</Document>");

        let doc = parse_document(&content).unwrap();
        let placemarks = doc.descendants("Placemark");
        assert_eq!(placemarks.len(), depth);
        assert_eq!(placemarks[0].child_text("name"), Some("0"));
        assert_eq!(placemarks[depth - 1].child_text("name"), Some("499"));
    }

    #[test]
    fn test_excessive_nesting_fails() {
        let depth = MAX_DEPTH + 1;
        let content = format!("{}{}", "<Folder>".repeat(depth), "</Folder>".repeat(depth));
        let err = parse_document(&content).unwrap_err();
        assert!(err.to_string().contains("nested deeper"));

        let content = format!(
            "{}{}",
            "<Folder>".repeat(MAX_DEPTH),
            "</Folder>".repeat(MAX_DEPTH)
        );
        assert!(parse_document(&content).is_ok());
    }

    #[test]
    fn test_unclosed_document_fails() {
        assert!(parse_document("<gpx><wpt lat=\"1\" lon=\"2\">").is_err());
        assert!(parse_document("").is_err());
    }
}
