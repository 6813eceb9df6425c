//! Property tests for the scan and deletion building blocks.

use std::collections::BTreeSet;

use proptest::prelude::*;

use css_orphans::orphans::{NEVER_MATCH, ignore_selectors, resolve_namespaces, style_rules};
use css_orphans::stylesheet::{NamespaceMap, RulePath};
use css_orphans::{MarkupDocument, MarkupKind, OrphanRecord, Stylesheet, apply_deletions, collect_orphans};

const CHAPTER: &str = r#"<html xmlns="http://www.w3.org/1999/xhtml">
<body><p class="c0 c2"><span class="c4">x</span></p><div id="c1"/></body>
</html>"#;

fn class_list(count: usize) -> Vec<String> {
    (0..count).map(|i| format!(".c{i}")).collect()
}

proptest! {
    #[test]
    fn prop_static_selectors_are_never_ignored(
        selector in "[a-z][a-z0-9]{0,6}(( |\\.|#| > )[a-z][a-z0-9]{0,6}){0,4}"
    ) {
        prop_assert!(!ignore_selectors(&selector));
    }

    #[test]
    fn prop_dynamic_pseudo_class_anywhere_is_ignored(
        before in "[a-z.# >]{0,10}",
        which in 0..NEVER_MATCH.len(),
        after in "[a-z.# >()-]{0,10}",
    ) {
        let selector = format!("{before}{}{after}", NEVER_MATCH[which]);
        prop_assert!(ignore_selectors(&selector));
    }

    #[test]
    fn prop_placeholder_prefix_is_fresh(
        prefixes in prop::collection::btree_set("a{1,4}|[b-z]{1,3}", 0..6),
        has_default in any::<bool>(),
    ) {
        let mut namespaces: NamespaceMap = prefixes
            .iter()
            .map(|prefix| (prefix.clone(), format!("urn:{prefix}")))
            .collect();
        if has_default {
            namespaces.insert(String::new(), "urn:default".to_string());
        }

        let (resolved, placeholder) = resolve_namespaces(&namespaces);

        prop_assert!(!resolved.contains_key(""));
        if has_default {
            prop_assert!(!prefixes.contains(&placeholder));
            prop_assert!(placeholder.chars().all(|c| c == 'a'));
            prop_assert_eq!(resolved.get(&placeholder).map(String::as_str), Some("urn:default"));
            prop_assert_eq!(resolved.len(), prefixes.len() + 1);
        } else {
            prop_assert_eq!(placeholder, "");
            prop_assert_eq!(resolved, namespaces);
        }
    }

    #[test]
    fn prop_deletion_leaves_the_complement_in_order(
        count in 1usize..8,
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let selectors = class_list(count);
        let css = format!("{} {{ color: red }}", selectors.join(", "));
        let mut sheet = Stylesheet::parse(&css).unwrap().sheet;

        let drop: BTreeSet<usize> = picks.iter().map(|pick| pick.index(count)).collect();
        let approved: Vec<OrphanRecord> = picks
            .iter()
            .map(|pick| {
                let index = pick.index(count);
                OrphanRecord {
                    stylesheet_id: "css".to_string(),
                    stylesheet_href: "style.css".to_string(),
                    rule: RulePath(vec![0]),
                    selector: selectors[index].clone(),
                    index,
                }
            })
            .collect();

        let removed = apply_deletions(&mut sheet, &approved).unwrap();

        let expected: Vec<String> = selectors
            .iter()
            .enumerate()
            .filter(|(index, _)| !drop.contains(index))
            .map(|(_, selector)| selector.clone())
            .collect();
        prop_assert_eq!(removed, drop.len());
        prop_assert_eq!(&sheet.style_rule(&RulePath(vec![0])).unwrap().selectors, &expected);
    }

    #[test]
    fn prop_orphans_are_exactly_the_unmatched_classes(count in 1usize..8, nested in any::<bool>()) {
        let selectors = class_list(count);
        let rule = format!("{} {{ margin: 0 }}", selectors.join(", "));
        let css = if nested { format!("@media print {{ {rule} }}") } else { rule };
        let sheet = Stylesheet::parse(&css).unwrap().sheet;
        let docs = [MarkupDocument::parse("c1", CHAPTER.as_bytes(), MarkupKind::Xhtml).unwrap()];

        let orphans = collect_orphans("css", "style.css", &sheet, &docs);
        let again = collect_orphans("css", "style.css", &sheet, &docs);
        prop_assert_eq!(&orphans, &again);

        let used = [".c0", ".c2", ".c4"];
        let expected: Vec<&str> = selectors
            .iter()
            .map(String::as_str)
            .filter(|selector| !used.contains(selector))
            .collect();
        let found: Vec<&str> = orphans.iter().map(|o| o.selector.as_str()).collect();
        prop_assert_eq!(found, expected);

        let (path, _) = style_rules(&sheet.rules).next().unwrap();
        prop_assert!(orphans.iter().all(|o| o.rule == path));
    }
}
