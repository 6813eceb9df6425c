//! Removal of approved orphan selectors from a parsed stylesheet.

use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use super::collect::OrphanRecord;
use crate::error::{Error, Result};
use crate::stylesheet::{RulePath, Stylesheet};

/// Drop every approved selector from its rule.
///
/// All records are checked against the live stylesheet before anything is
/// changed; a record whose rule or selector moved fails the whole call with
/// [`Error::StaleDeletion`] and leaves `sheet` as it was. Each rule's list is
/// rebuilt once, so record order is irrelevant. Returns the number of
/// selectors removed.
pub fn apply_deletions(sheet: &mut Stylesheet, approved: &[OrphanRecord]) -> Result<usize> {
    let mut by_rule: BTreeMap<&RulePath, BTreeMap<usize, &OrphanRecord>> = BTreeMap::new();
    for record in approved {
        by_rule
            .entry(&record.rule)
            .or_default()
            .insert(record.index, record);
    }

    for (path, records) in &by_rule {
        let rule = sheet.style_rule(path);
        for (&index, record) in records {
            let reason = match rule.map(|rule| rule.selectors.get(index)) {
                None => "rule no longer exists".to_string(),
                Some(None) => "selector index out of range".to_string(),
                Some(Some(text)) if *text == record.selector => continue,
                Some(Some(text)) => format!("expected '{}', found '{text}'", record.selector),
            };
            warn!("{}: stale deletion of '{}': {reason}", record.stylesheet_href, record.selector);
            return Err(Error::StaleDeletion {
                stylesheet: record.stylesheet_href.clone(),
                rule: (*path).clone(),
                index,
                reason,
            });
        }
    }

    let mut removed = 0;
    for (path, records) in by_rule {
        let drop: BTreeSet<usize> = records.into_keys().collect();
        if let Some(rule) = sheet.style_rule_mut(path) {
            let before = rule.selectors.len();
            rule.selectors = std::mem::take(&mut rule.selectors)
                .into_iter()
                .enumerate()
                .filter(|(index, _)| !drop.contains(index))
                .map(|(_, selector)| selector)
                .collect();
            removed += before - rule.selectors.len();
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::Preferences;

    fn record(rule: &[usize], index: usize, selector: &str) -> OrphanRecord {
        OrphanRecord {
            stylesheet_id: "css".to_string(),
            stylesheet_href: "style.css".to_string(),
            rule: RulePath(rule.to_vec()),
            selector: selector.to_string(),
            index,
        }
    }

    fn sheet(css: &str) -> Stylesheet {
        Stylesheet::parse(css).unwrap().sheet
    }

    #[test]
    fn test_removes_selectors_in_any_order() {
        let mut sheet = sheet("a, b, c, d, e { color: red }");
        let approved = [record(&[0], 3, "d"), record(&[0], 0, "a"), record(&[0], 2, "c")];

        assert_eq!(apply_deletions(&mut sheet, &approved).unwrap(), 3);
        assert_eq!(sheet.style_rule(&RulePath(vec![0])).unwrap().selectors, ["b", "e"]);
    }

    #[test]
    fn test_nested_rules_and_duplicates() {
        let mut sheet = sheet("a, b {} @media print { c, d {} }");
        let approved = [
            record(&[1, 0], 1, "d"),
            record(&[1, 0], 1, "d"),
            record(&[0], 0, "a"),
        ];

        assert_eq!(apply_deletions(&mut sheet, &approved).unwrap(), 2);
        assert_eq!(sheet.style_rule(&RulePath(vec![0])).unwrap().selectors, ["b"]);
        assert_eq!(sheet.style_rule(&RulePath(vec![1, 0])).unwrap().selectors, ["c"]);
    }

    #[test]
    fn test_last_selector_empties_the_rule() {
        let mut sheet = sheet(".unused-class {} p { margin: 0 }");
        apply_deletions(&mut sheet, &[record(&[0], 0, ".unused-class")]).unwrap();

        assert!(sheet.style_rule(&RulePath(vec![0])).unwrap().selectors.is_empty());
        assert_eq!(
            sheet.to_css(&Preferences::default()),
            "p {\n  margin: 0;\n}\n"
        );
    }

    #[test]
    fn test_stale_record_changes_nothing() {
        let mut sheet = sheet("a, b {}");
        let before = sheet.clone();
        let approved = [record(&[0], 0, "a"), record(&[0], 1, "x")];

        let err = apply_deletions(&mut sheet, &approved).unwrap_err();
        assert!(matches!(err, Error::StaleDeletion { index: 1, .. }));
        assert_eq!(sheet, before);
    }

    #[test]
    fn test_missing_rule_is_stale() {
        let mut sheet = sheet("a {}");
        assert!(apply_deletions(&mut sheet, &[record(&[4], 0, "a")]).is_err());
        assert!(apply_deletions(&mut sheet, &[record(&[0], 3, "a")]).is_err());
    }

    #[test]
    fn test_nothing_approved() {
        let mut sheet = sheet("a {}");
        assert_eq!(apply_deletions(&mut sheet, &[]).unwrap(), 0);
    }
}
