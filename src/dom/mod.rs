//! Parsed markup: an arena DOM filled by html5ever (lenient) or quick-xml
//! (strict), matched through the `selectors` crate.

mod arena;
mod document;
mod element_ref;
mod tree_sink;
mod xml;

pub use arena::{ArenaDom, ArenaNode, ArenaNodeData, ArenaNodeId, Attribute};
pub use document::{MarkupDocument, MarkupKind, classify_media_type};
pub use element_ref::{BookSelectors, CssLocalName, CssNamespace, ElementRef, IdentStr, NonTSPseudoClass};
pub use xml::parse_xml;
