//! Default-namespace handling for selector queries.
//!
//! The selector engine is compiled without a default namespace, so a CSS
//! default namespace is rebound to a synthetic prefix that the rewriter then
//! applies to every type selector.

use crate::stylesheet::NamespaceMap;

/// Rebind the default namespace (empty key) to a fresh prefix.
///
/// Returns the rewritten map and the prefix chosen, or `""` when there was
/// no default namespace. The placeholder is the first of `a`, `aa`, `aaa`, …
/// not already declared.
pub fn resolve_namespaces(namespaces: &NamespaceMap) -> (NamespaceMap, String) {
    let mut resolved = namespaces.clone();
    let Some(default_uri) = resolved.remove("") else {
        return (resolved, String::new());
    };

    let prefix = (1..)
        .map(|len| "a".repeat(len))
        .find(|candidate| !resolved.contains_key(candidate))
        .unwrap_or_default();
    resolved.insert(prefix.clone(), default_uri);
    (resolved, prefix)
}
