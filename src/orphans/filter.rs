//! Selectors that static markup can never rule out.

/// Dynamic pseudo-classes with no static-markup equivalent.
pub const NEVER_MATCH: [&str; 5] = [":hover", ":active", ":focus", ":target", ":visited"];

/// Whether the selector should be kept without looking at any document.
///
/// A plain substring test: it also fires when one of the names appears
/// inside an attribute value, which errs on the side of keeping.
pub fn ignore_selectors(selector: &str) -> bool {
    NEVER_MATCH
        .iter()
        .any(|pseudo_class| selector.contains(pseudo_class))
}
