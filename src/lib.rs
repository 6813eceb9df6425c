//! # css-orphans
//!
//! Find CSS selectors that match nothing in an ebook's markup, let the user
//! review them, and rewrite the stylesheets without them.
//!
//! ## Quick Start
//!
//! ```
//! use css_orphans::{Decision, MemoryBook, OrphanRecord, ParseReport, Preferences, Reviewer, run};
//!
//! struct AcceptAll;
//!
//! impl Reviewer for AcceptAll {
//!     fn edit_preferences(&mut self, current: &Preferences) -> Decision<Preferences> {
//!         Decision::Proceed(current.clone())
//!     }
//!     fn confirm_parse_report(&mut self, _: &ParseReport) -> Decision<()> {
//!         Decision::Proceed(())
//!     }
//!     fn review(&mut self, orphans: &[OrphanRecord]) -> Decision<Vec<OrphanRecord>> {
//!         Decision::Proceed(orphans.to_vec())
//!     }
//! }
//!
//! let mut book = MemoryBook::new()
//!     .with_resource("css", "style.css", "p { margin: 0 } .unused { color: red }", "text/css")
//!     .with_resource(
//!         "c1",
//!         "c1.xhtml",
//!         r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><p>Hi</p></body></html>"#,
//!         "application/xhtml+xml",
//!     );
//!
//! let outcome = run(&mut book, &mut AcceptAll).unwrap();
//! assert_eq!(outcome.exit_code(), 0);
//! assert_eq!(book.text("css").unwrap(), "p {\n  margin: 0;\n}\n");
//! ```
//!
//! ## Pieces
//!
//! - [`stylesheet`]: parse, normalize and serialize CSS
//! - [`dom`]: markup documents with a strict XML and a lenient HTML parse
//! - [`orphans`]: selector rewriting, matching, collection and deletion
//! - [`plugin`]: the host-facing run with its review steps

pub mod book;
pub mod dom;
pub mod error;
pub mod orphans;
pub mod plugin;
pub mod prefs;
pub mod stylesheet;
pub mod util;

pub use book::{ManifestItem, MemoryBook, Resource};
pub use dom::{MarkupDocument, MarkupKind};
pub use error::{Error, Result};
pub use orphans::{OrphanRecord, apply_deletions, collect_orphans, selector_exists};
pub use plugin::{BookContainer, Decision, Outcome, ParseReport, Reviewer, run, run_with_status};
pub use prefs::Preferences;
pub use stylesheet::{ParsedStylesheet, Stylesheet, StylesheetError};
