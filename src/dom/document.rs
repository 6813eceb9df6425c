//! Markup documents as seen by the orphan scan.

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use log::debug;

use super::arena::ArenaDom;
use super::tree_sink::ArenaSink;
use super::xml::parse_xml;
use crate::error::{Error, Result};
use crate::util::decode_resource;

/// How a markup resource is queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupKind {
    /// `application/xhtml+xml` content documents.
    Xhtml,
    /// Any other XML-family resource (SVG, NCX, ...).
    Xml,
}

/// Decide whether a manifest item takes part in the scan.
///
/// XHTML content documents always do; other XML-family media types only
/// when `scan_all_xml` is set.
pub fn classify_media_type(media_type: &str, scan_all_xml: bool) -> Option<MarkupKind> {
    let media_type = media_type.trim().to_ascii_lowercase();
    if media_type == "application/xhtml+xml" {
        return Some(MarkupKind::Xhtml);
    }
    let is_xml_family = media_type == "application/xml"
        || media_type == "text/xml"
        || media_type.ends_with("+xml");
    (scan_all_xml && is_xml_family).then_some(MarkupKind::Xml)
}

/// A markup resource parsed in both modes.
#[derive(Debug)]
pub struct MarkupDocument {
    pub id: String,
    pub is_xhtml: bool,
    /// Lenient HTML parse; always present.
    pub html: ArenaDom,
    /// Strict XML parse; absent when the document is not well-formed.
    pub xml: Option<ArenaDom>,
}

impl MarkupDocument {
    /// Parse a resource's bytes.
    ///
    /// Fails only when there is nothing for even the lenient parser to read.
    pub fn parse(id: impl Into<String>, bytes: &[u8], kind: MarkupKind) -> Result<Self> {
        let id = id.into();
        let text = decode_resource(bytes);
        if text.trim().is_empty() {
            return Err(Error::Markup {
                id,
                reason: "document is empty".to_string(),
            });
        }

        let html = parse_document(ArenaSink::new(), ParseOpts::default())
            .from_utf8()
            .one(text.as_bytes())
            .into_dom();

        let xml = match parse_xml(&text) {
            Ok(dom) => Some(dom),
            Err(err) => {
                debug!("{id}: no XML surface ({err}), matching on the HTML parse only");
                None
            }
        };

        Ok(Self {
            id,
            is_xhtml: kind == MarkupKind::Xhtml,
            html,
            xml,
        })
    }

    /// Parse surfaces in query order: strict XML first, then lenient HTML.
    pub fn surfaces(&self) -> impl Iterator<Item = &ArenaDom> {
        self.xml.iter().chain(std::iter::once(&self.html))
    }
}
