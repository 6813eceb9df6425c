//! Finding and removing CSS selectors that match nothing in the book.
//!
//! The scan runs per stylesheet: namespaces are resolved once, each selector
//! is rewritten into a form the matcher understands, then tested against
//! every markup document until one matches. Selectors that never match
//! become [`OrphanRecord`]s, which [`apply_deletions`] later removes.

pub mod collect;
pub mod delete;
pub mod filter;
pub mod matcher;
pub mod namespaces;
pub mod rewrite;

pub use collect::{OrphanRecord, StyleRules, collect_orphans, matchable_selector, style_rules};
pub use delete::apply_deletions;
pub use filter::{NEVER_MATCH, ignore_selectors};
pub use matcher::{Query, QueryCache, QueryError, QueryMode, selector_exists};
pub use namespaces::resolve_namespaces;
pub use rewrite::{add_default_prefix, clean_generic_prefixes};
