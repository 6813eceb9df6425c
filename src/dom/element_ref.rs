//! selectors crate Element implementation for ArenaDom.
//!
//! This enables CSS selector matching against both parse surfaces.

use std::fmt;

use html5ever::{LocalName, Namespace, ns};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::context::MatchingContext;
use selectors::matching::ElementSelectorFlags;
use selectors::{OpaqueElement, SelectorImpl};

use super::arena::{ArenaDom, ArenaNodeData, ArenaNodeId};

/// Our selector implementation for the selectors crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSelectors;

/// Identifier string type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct IdentStr(pub String);

impl precomputed_hash::PrecomputedHash for IdentStr {
    fn precomputed_hash(&self) -> u32 {
        let mut h: u32 = 0;
        for byte in self.0.bytes() {
            h = h.wrapping_mul(31).wrapping_add(byte as u32);
        }
        h
    }
}

impl AsRef<str> for IdentStr {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for IdentStr {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl<'a> From<&'a str> for IdentStr {
    fn from(s: &'a str) -> Self {
        Self(s.to_string())
    }
}

impl cssparser::ToCss for IdentStr {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_identifier(&self.0, dest)
    }
}

/// Wrapper type for LocalName that implements ToCss.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CssLocalName(pub LocalName);

impl precomputed_hash::PrecomputedHash for CssLocalName {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

impl cssparser::ToCss for CssLocalName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(self.0.as_ref())
    }
}

impl From<String> for CssLocalName {
    fn from(s: String) -> Self {
        Self(LocalName::from(s))
    }
}

impl<'a> From<&'a str> for CssLocalName {
    fn from(s: &'a str) -> Self {
        Self(LocalName::from(s))
    }
}

impl AsRef<str> for CssLocalName {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

/// Wrapper type for Namespace that implements ToCss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CssNamespace(pub Namespace);

impl precomputed_hash::PrecomputedHash for CssNamespace {
    fn precomputed_hash(&self) -> u32 {
        self.0.precomputed_hash()
    }
}

impl cssparser::ToCss for CssNamespace {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        dest.write_str(self.0.as_ref())
    }
}

impl From<String> for CssNamespace {
    fn from(s: String) -> Self {
        Self(Namespace::from(s))
    }
}

impl<'a> From<&'a str> for CssNamespace {
    fn from(s: &'a str) -> Self {
        Self(Namespace::from(s))
    }
}

/// Pseudo-element type. Pseudo-elements are rejected at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PseudoElement {}

impl cssparser::ToCss for PseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

impl selectors::parser::PseudoElement for PseudoElement {
    type Impl = BookSelectors;

    fn accepts_state_pseudo_classes(&self) -> bool {
        false
    }

    fn valid_after_slotted(&self) -> bool {
        false
    }
}

/// Non-tree-structural pseudo-classes we can parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NonTSPseudoClass {
    /// `:lang(code)`, matched against the nearest inherited language.
    Lang(String),
    Link,
    AnyLink,
    Checked,
    Disabled,
    Enabled,
    // User-action and history states: never true in static markup
    Visited,
    Hover,
    Active,
    Focus,
    Target,
}

impl NonTSPseudoClass {
    /// Pseudo-classes that only make sense for HTML elements.
    pub fn is_html_only(&self) -> bool {
        matches!(
            self,
            Self::Link | Self::AnyLink | Self::Checked | Self::Disabled | Self::Enabled
        )
    }
}

impl selectors::parser::NonTSPseudoClass for NonTSPseudoClass {
    type Impl = BookSelectors;

    fn is_active_or_hover(&self) -> bool {
        matches!(self, Self::Hover | Self::Active)
    }

    fn is_user_action_state(&self) -> bool {
        matches!(self, Self::Hover | Self::Active | Self::Focus)
    }
}

impl cssparser::ToCss for NonTSPseudoClass {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        let name = match self {
            Self::Lang(lang) => {
                dest.write_str(":lang(")?;
                cssparser::serialize_identifier(lang, dest)?;
                return dest.write_str(")");
            }
            Self::Link => ":link",
            Self::AnyLink => ":any-link",
            Self::Checked => ":checked",
            Self::Disabled => ":disabled",
            Self::Enabled => ":enabled",
            Self::Visited => ":visited",
            Self::Hover => ":hover",
            Self::Active => ":active",
            Self::Focus => ":focus",
            Self::Target => ":target",
        };
        dest.write_str(name)
    }
}

impl SelectorImpl for BookSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = IdentStr;
    type Identifier = IdentStr;
    type LocalName = CssLocalName;
    type NamespaceUrl = CssNamespace;
    type NamespacePrefix = IdentStr;
    type BorrowedLocalName = CssLocalName;
    type BorrowedNamespaceUrl = CssNamespace;
    type NonTSPseudoClass = NonTSPseudoClass;
    type PseudoElement = PseudoElement;
}

/// Elements that take part in `:enabled`/`:disabled`.
const FORM_CONTROLS: &[&str] = &[
    "button", "input", "select", "textarea", "option", "optgroup", "fieldset",
];

/// Reference to an element in an ArenaDom for selector matching.
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    pub dom: &'a ArenaDom,
    pub id: ArenaNodeId,
}

impl<'a> ElementRef<'a> {
    pub fn new(dom: &'a ArenaDom, id: ArenaNodeId) -> Self {
        Self { dom, id }
    }

    fn is_html(&self) -> bool {
        self.dom.element_namespace(self.id) == Some(&ns!(html))
    }

    fn local_name_is(&self, names: &[&str]) -> bool {
        self.dom
            .element_name(self.id)
            .is_some_and(|n| names.contains(&n.as_ref()))
    }

    fn has_attr(&self, name: &str) -> bool {
        self.dom.get_attr(self.id, name).is_some()
    }

    /// `xml:lang` wins over `lang` on the same element.
    fn language(&self) -> Option<&'a str> {
        let Some(ArenaNodeData::Element { attrs, .. }) = self.dom.get(self.id).map(|n| &n.data)
        else {
            return None;
        };
        let named = |ns: &Namespace, local: &str| {
            attrs
                .iter()
                .find(|a| a.name.ns == *ns && a.name.local.as_ref() == local)
                .map(|a| a.value.as_str())
        };
        // the HTML parser keeps `xml:lang` as a plain attribute name
        named(&ns!(xml), "lang")
            .or_else(|| named(&ns!(), "xml:lang"))
            .or_else(|| named(&ns!(), "lang"))
    }

    /// Same test as `|=`: exact match or a `lang-` prefix, ignoring case.
    fn matches_lang(&self, lang: &str) -> bool {
        let mut current = Some(*self);
        while let Some(element) = current {
            if let Some(value) = element.language() {
                let value = format!("{}-", value.to_ascii_lowercase());
                return value.starts_with(&format!("{}-", lang.to_ascii_lowercase()));
            }
            current = selectors::Element::parent_element(&element);
        }
        false
    }

    fn is_form_control(&self) -> bool {
        self.is_html() && self.local_name_is(FORM_CONTROLS)
    }

    fn is_checked(&self) -> bool {
        if !self.is_html() {
            return false;
        }
        if self.local_name_is(&["option"]) {
            return self.has_attr("selected");
        }
        self.local_name_is(&["input"])
            && self.has_attr("checked")
            && self
                .dom
                .get_attr(self.id, "type")
                .is_some_and(|t| t.eq_ignore_ascii_case("checkbox") || t.eq_ignore_ascii_case("radio"))
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("id", &self.id)
            .field("name", &self.dom.element_name(self.id))
            .finish()
    }
}

impl selectors::Element for ElementRef<'_> {
    type Impl = BookSelectors;

    fn opaque(&self) -> OpaqueElement {
        match self.dom.get(self.id) {
            Some(node) => OpaqueElement::new(node),
            None => OpaqueElement::new(self),
        }
    }

    fn parent_element(&self) -> Option<Self> {
        let node = self.dom.get(self.id)?;
        self.dom
            .is_element(node.parent)
            .then(|| Self::new(self.dom, node.parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let mut current = self.dom.get(self.id)?.prev_sibling;
        while current.is_some() {
            if self.dom.is_element(current) {
                return Some(Self::new(self.dom, current));
            }
            current = self.dom.get(current)?.prev_sibling;
        }
        None
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let mut current = self.dom.get(self.id)?.next_sibling;
        while current.is_some() {
            if self.dom.is_element(current) {
                return Some(Self::new(self.dom, current));
            }
            current = self.dom.get(current)?.next_sibling;
        }
        None
    }

    fn first_element_child(&self) -> Option<Self> {
        self.dom
            .children(self.id)
            .find(|&child| self.dom.is_element(child))
            .map(|child| Self::new(self.dom, child))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        self.dom.is_html_document() && self.is_html()
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        self.dom
            .element_name(self.id)
            .is_some_and(|n| n == &name.0)
    }

    fn has_namespace(&self, ns: &CssNamespace) -> bool {
        self.dom
            .element_namespace(self.id)
            .is_some_and(|n| n == &ns.0)
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.dom.element_name(self.id) == other.dom.element_name(other.id)
            && self.dom.element_namespace(self.id) == other.dom.element_namespace(other.id)
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&CssNamespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&IdentStr>,
    ) -> bool {
        let Some(ArenaNodeData::Element { attrs, .. }) = self.dom.get(self.id).map(|n| &n.data)
        else {
            return false;
        };

        attrs.iter().any(|attr| {
            let ns_match = match ns {
                NamespaceConstraint::Any => true,
                NamespaceConstraint::Specific(ns) => attr.name.ns == ns.0,
            };
            ns_match && attr.name.local == local_name.0 && operation.eval_str(&attr.value)
        })
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        match pc {
            NonTSPseudoClass::Lang(lang) => self.matches_lang(lang),
            NonTSPseudoClass::Link | NonTSPseudoClass::AnyLink => self.is_link(),
            NonTSPseudoClass::Checked => self.is_checked(),
            NonTSPseudoClass::Disabled => self.is_form_control() && self.has_attr("disabled"),
            NonTSPseudoClass::Enabled => self.is_form_control() && !self.has_attr("disabled"),
            NonTSPseudoClass::Visited
            | NonTSPseudoClass::Hover
            | NonTSPseudoClass::Active
            | NonTSPseudoClass::Focus
            | NonTSPseudoClass::Target => false,
        }
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn is_link(&self) -> bool {
        self.is_html() && self.local_name_is(&["a", "area", "link"]) && self.has_attr("href")
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &IdentStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .element_id(self.id)
            .is_some_and(|elem_id| case_sensitivity.eq(elem_id.as_bytes(), id.0.as_bytes()))
    }

    fn has_class(&self, name: &IdentStr, case_sensitivity: CaseSensitivity) -> bool {
        self.dom
            .element_classes(self.id)
            .iter()
            .any(|c| case_sensitivity.eq(c.as_bytes(), name.0.as_bytes()))
    }

    fn imported_part(&self, _name: &IdentStr) -> Option<IdentStr> {
        None
    }

    fn is_part(&self, _name: &IdentStr) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.dom.children(self.id).all(|child| {
            match self.dom.get(child).map(|n| &n.data) {
                Some(ArenaNodeData::Element { .. }) => false,
                Some(ArenaNodeData::Text(t)) => t.is_empty(),
                _ => true,
            }
        })
    }

    fn is_root(&self) -> bool {
        self.dom
            .get(self.id)
            .and_then(|n| self.dom.get(n.parent))
            .is_some_and(|parent| matches!(parent.data, ArenaNodeData::Document))
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {
        // Invalidation flags only matter for live documents
    }

    fn add_element_unique_hashes(&self, _filter: &mut selectors::bloom::BloomFilter) -> bool {
        false
    }

    fn has_custom_state(&self, _name: &IdentStr) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use html5ever::driver::ParseOpts;
    use html5ever::parse_document;
    use html5ever::tendril::TendrilSink;
    use selectors::context::SelectorCaches;
    use selectors::parser::{ParseRelative, SelectorList, SelectorParseErrorKind};

    use super::*;
    use crate::dom::tree_sink::ArenaSink;

    struct TestParser;

    impl<'i> selectors::parser::Parser<'i> for TestParser {
        type Impl = BookSelectors;
        type Error = SelectorParseErrorKind<'i>;
    }

    fn parse_html(html: &str) -> ArenaDom {
        parse_document(ArenaSink::new(), ParseOpts::default())
            .from_utf8()
            .one(html.as_bytes())
            .into_dom()
    }

    fn matches(elem: ElementRef<'_>, selector: &str) -> bool {
        let mut input = cssparser::ParserInput::new(selector);
        let mut parser = cssparser::Parser::new(&mut input);
        let list = SelectorList::parse(&TestParser, &mut parser, ParseRelative::No).unwrap();

        let mut caches = SelectorCaches::default();
        let mut context = MatchingContext::new(
            selectors::matching::MatchingMode::Normal,
            None,
            &mut caches,
            selectors::context::QuirksMode::NoQuirks,
            selectors::matching::NeedsSelectorFlags::No,
            selectors::matching::MatchingForInvalidation::No,
        );
        list.slice()
            .iter()
            .any(|s| selectors::matching::matches_selector(s, 0, None, &elem, &mut context))
    }

    #[test]
    fn test_tag_class_and_id() {
        let dom = parse_html(r#"<div><p id="main" class="intro highlight">Hello</p></div>"#);
        let elem = ElementRef::new(&dom, dom.find_by_tag("p").unwrap());

        assert!(matches(elem, "p"));
        assert!(matches(elem, "P"));
        assert!(matches(elem, "p.intro.highlight"));
        assert!(matches(elem, "#main"));
        assert!(!matches(elem, ".missing"));
        assert!(!matches(elem, "div"));
    }

    #[test]
    fn test_combinators() {
        let dom = parse_html("<div><span><p>Nested</p></span><em>x</em></div>");
        let p = ElementRef::new(&dom, dom.find_by_tag("p").unwrap());
        let em = ElementRef::new(&dom, dom.find_by_tag("em").unwrap());

        assert!(matches(p, "div p"));
        assert!(matches(p, "span > p"));
        assert!(!matches(p, "div > p"));
        assert!(matches(em, "span + em"));
        assert!(matches(em, "span ~ em"));
    }

    #[test]
    fn test_structural_pseudo_classes() {
        let dom = parse_html("<ul><li>a</li><li></li></ul>");
        let items: Vec<_> = dom
            .elements()
            .filter(|&id| dom.element_name(id).is_some_and(|n| n.as_ref() == "li"))
            .collect();

        assert!(matches(ElementRef::new(&dom, items[0]), "li:first-child"));
        assert!(matches(ElementRef::new(&dom, items[1]), "li:nth-child(2)"));
        assert!(matches(ElementRef::new(&dom, items[1]), "li:empty"));
        assert!(!matches(ElementRef::new(&dom, items[0]), "li:empty"));

        let html = ElementRef::new(&dom, dom.find_by_tag("html").unwrap());
        assert!(matches(html, ":root"));
    }

    #[test]
    fn test_attribute_selectors() {
        let dom = parse_html(r#"<p lang="en-US" title="a b">x</p>"#);
        let p = ElementRef::new(&dom, dom.find_by_tag("p").unwrap());

        assert!(matches(p, "[lang|=en]"));
        assert!(matches(p, r#"[title~="b"]"#));
        assert!(!matches(p, "[dir]"));
    }
}
