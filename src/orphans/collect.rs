//! The orphan scan: every selector of every style rule against every document.

use std::fmt;
use std::iter::Enumerate;
use std::slice;

use log::{debug, warn};

use super::filter::ignore_selectors;
use super::matcher::QueryCache;
use super::namespaces::resolve_namespaces;
use super::rewrite::{add_default_prefix, clean_generic_prefixes};
use crate::dom::MarkupDocument;
use crate::stylesheet::{CssRule, RulePath, StyleRule, Stylesheet};
use crate::util::href_to_basename;

/// A selector no scanned document matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanRecord {
    pub stylesheet_id: String,
    pub stylesheet_href: String,
    /// Owning style rule.
    pub rule: RulePath,
    /// Selector text as parsed, before any rewriting.
    pub selector: String,
    /// Position in the rule's selector list when the scan ran.
    pub index: usize,
}

impl fmt::Display for OrphanRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({})",
            self.selector,
            href_to_basename(&self.stylesheet_href)
        )
    }
}

/// Style rules in document order, descending into `@media` blocks.
pub struct StyleRules<'a> {
    stack: Vec<(RulePath, Enumerate<slice::Iter<'a, CssRule>>)>,
}

impl<'a> Iterator for StyleRules<'a> {
    type Item = (RulePath, &'a StyleRule);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((parent, rules)) = self.stack.last_mut() {
            let Some((index, rule)) = rules.next() else {
                self.stack.pop();
                continue;
            };
            let path = parent.child(index);
            match rule {
                CssRule::Style(style) => return Some((path, style)),
                CssRule::Media(media) => self.stack.push((path, media.rules.iter().enumerate())),
                _ => {}
            }
        }
        None
    }
}

pub fn style_rules(rules: &[CssRule]) -> StyleRules<'_> {
    StyleRules {
        stack: vec![(RulePath::default(), rules.iter().enumerate())],
    }
}

/// The text handed to the matcher for one selector.
pub fn matchable_selector(selector: &str, default_prefix: &str) -> String {
    if default_prefix.is_empty() {
        clean_generic_prefixes(selector)
    } else {
        clean_generic_prefixes(&add_default_prefix(default_prefix, selector))
    }
}

/// Find the selectors of `sheet` that match nothing in `documents`.
///
/// Records come out in rule order, then selector order.
pub fn collect_orphans(
    stylesheet_id: &str,
    stylesheet_href: &str,
    sheet: &Stylesheet,
    documents: &[MarkupDocument],
) -> Vec<OrphanRecord> {
    let (namespaces, default_prefix) = resolve_namespaces(&sheet.namespaces());
    let mut cache = QueryCache::new(&namespaces);
    let mut orphans = Vec::new();

    for (rule, style) in style_rules(&sheet.rules) {
        for (index, selector) in style.selectors.iter().enumerate() {
            if ignore_selectors(selector) {
                debug!("{stylesheet_href}: keeping '{selector}', dynamic pseudo-class");
                continue;
            }

            let query = matchable_selector(selector, &default_prefix);
            let found = documents
                .iter()
                .any(|doc| document_matches(&mut cache, doc, &query));

            if !found {
                orphans.push(OrphanRecord {
                    stylesheet_id: stylesheet_id.to_string(),
                    stylesheet_href: stylesheet_href.to_string(),
                    rule: rule.clone(),
                    selector: selector.clone(),
                    index,
                });
            }
        }
    }

    debug!(
        "{stylesheet_href}: {} compiled queries, {} orphans",
        cache.len(),
        orphans.len()
    );
    orphans
}

// XML surface first, then HTML; the first hit wins
fn document_matches(cache: &mut QueryCache<'_>, doc: &MarkupDocument, query: &str) -> bool {
    doc.surfaces()
        .any(|dom| match cache.selector_exists(dom, query, doc.is_xhtml) {
            Ok(found) => found,
            Err(err) => {
                warn!("{}: {err}; assuming it matches", doc.id);
                true
            }
        })
}
