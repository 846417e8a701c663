//! Candidate locators and locator specs.
//!
//! A [`Candidate`] is one way of describing "the element I mean". A
//! [`LocatorSpec`] is the ordered list of candidates for one logical target:
//! most specific first, most permissive (text based) last. The resolver walks
//! the list in order and the first candidate with an actionable match wins.
//!
//! # Design Philosophy
//!
//! - **Closed variants**: every way of describing an element is an enum case, so
//!   the fallthrough order is statically enumerable and testable without a page
//! - **Immutable**: candidates carry no live state; handles come from the resolver
//! - **Backend neutral**: [`Candidate::to_js`] compiles to a DOM query for real
//!   browsers, [`crate::mock::MockPage`] interprets the same variants in memory

use regex::Regex;
use std::fmt;

use crate::page::ElementRef;
use crate::result::{TenazError, TenazResult};

/// How a piece of text must match
#[derive(Debug, Clone)]
pub enum TextMatch {
    /// Whitespace-normalized equality, case-insensitive
    Exact(String),
    /// Case-insensitive substring
    Contains(String),
    /// Regular expression over whitespace-normalized text
    Pattern(Regex),
}

impl TextMatch {
    /// Exact (normalized, case-insensitive) match
    #[must_use]
    pub fn exact(text: impl Into<String>) -> Self {
        Self::Exact(text.into())
    }

    /// Substring match
    #[must_use]
    pub fn contains(text: impl Into<String>) -> Self {
        Self::Contains(text.into())
    }

    /// Regex match
    pub fn pattern(pattern: &str) -> TenazResult<Self> {
        Regex::new(pattern)
            .map(Self::Pattern)
            .map_err(|e| TenazError::InvalidLocator {
                message: format!("bad pattern {pattern:?}: {e}"),
            })
    }

    /// Check whether `text` satisfies this matcher
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let normalized = normalize_whitespace(text);
        match self {
            Self::Exact(expected) => {
                normalized.to_lowercase() == normalize_whitespace(expected).to_lowercase()
            }
            Self::Contains(needle) => normalized
                .to_lowercase()
                .contains(&normalize_whitespace(needle).to_lowercase()),
            Self::Pattern(re) => re.is_match(&normalized),
        }
    }

    /// Render as a JS matcher object understood by the injected query prelude
    #[must_use]
    pub fn to_js(&self) -> String {
        let (kind, value) = match self {
            Self::Exact(v) => ("exact", v.as_str()),
            Self::Contains(v) => ("contains", v.as_str()),
            Self::Pattern(re) => ("pattern", re.as_str()),
        };
        format!("{{kind:{},value:{}}}", js_string(kind), js_string(value))
    }
}

impl PartialEq for TextMatch {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) | (Self::Contains(a), Self::Contains(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Eq for TextMatch {}

impl fmt::Display for TextMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "={v:?}"),
            Self::Contains(v) => write!(f, "~{v:?}"),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Collapse runs of whitespace to single spaces and trim
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// One structural/textual description of a target element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// ARIA role (explicit or implicit) with an optional accessible-name matcher
    Role {
        /// Role name, e.g. "button", "checkbox", "option"
        role: String,
        /// Accessible name (aria-label, else text)
        name: Option<TextMatch>,
    },
    /// Element carrying a CSS class marker, optionally inside a container
    Marker {
        /// Class name without the leading dot
        class: String,
        /// Container the marker must be inside
        within: Option<Box<Candidate>>,
    },
    /// Innermost element whose text matches, optionally restricted to a tag
    Text {
        /// Tag restriction
        tag: Option<String>,
        /// Text matcher
        text: TextMatch,
    },
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// Target candidate evaluated inside every match of a container candidate
    Within {
        /// Container candidate
        container: Box<Candidate>,
        /// Target candidate
        target: Box<Candidate>,
    },
}

impl Candidate {
    /// Create a CSS candidate
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a role candidate without a name filter
    #[must_use]
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    /// Create a role candidate with an accessible-name filter
    #[must_use]
    pub fn role_named(role: impl Into<String>, name: TextMatch) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name),
        }
    }

    /// Create a class-marker candidate
    #[must_use]
    pub fn marker(class: impl Into<String>) -> Self {
        Self::Marker {
            class: class.into(),
            within: None,
        }
    }

    /// Create a class-marker candidate scoped to a container
    #[must_use]
    pub fn marker_within(class: impl Into<String>, container: Self) -> Self {
        Self::Marker {
            class: class.into(),
            within: Some(Box::new(container)),
        }
    }

    /// Create a text candidate matching any tag
    #[must_use]
    pub fn text(text: TextMatch) -> Self {
        Self::Text { tag: None, text }
    }

    /// Create a text candidate restricted to a tag
    #[must_use]
    pub fn tag_text(tag: impl Into<String>, text: TextMatch) -> Self {
        Self::Text {
            tag: Some(tag.into()),
            text,
        }
    }

    /// Create a test ID candidate
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create a structural candidate: `target` inside `container`
    #[must_use]
    pub fn within(container: Self, target: Self) -> Self {
        Self::Within {
            container: Box::new(container),
            target: Box::new(target),
        }
    }

    /// Compile to a JavaScript expression yielding an array of elements in
    /// document order. `scope` names a JS variable holding the root node.
    ///
    /// Relies on the `__tenaz` prelude installed by the browser backend.
    #[must_use]
    pub fn to_js(&self, scope: &str) -> String {
        match self {
            Self::Css(s) => format!("Array.from({scope}.querySelectorAll({}))", js_string(s)),
            Self::TestId(id) => format!(
                "Array.from({scope}.querySelectorAll({}))",
                js_string(&format!("[data-testid=\"{id}\"]"))
            ),
            Self::Role { role, name } => {
                let name_check = name.as_ref().map_or_else(
                    || "true".to_string(),
                    |m| format!("__tenaz.match(__tenaz.name(el), {})", m.to_js()),
                );
                format!(
                    "Array.from({scope}.querySelectorAll('*')).filter(el => __tenaz.role(el) === {} && {name_check})",
                    js_string(role)
                )
            }
            Self::Marker { class, within } => match within {
                None => format!(
                    "Array.from({scope}.getElementsByClassName({}))",
                    js_string(class)
                ),
                Some(container) => format!(
                    "__tenaz.uniq(({}).flatMap(w => Array.from(w.getElementsByClassName({}))))",
                    container.to_js(scope),
                    js_string(class)
                ),
            },
            Self::Text { tag, text } => format!(
                "__tenaz.innermost(Array.from({scope}.querySelectorAll({})).filter(el => __tenaz.match(__tenaz.text(el), {})))",
                js_string(tag.as_deref().unwrap_or("*")),
                text.to_js()
            ),
            Self::Within { container, target } => format!(
                "__tenaz.uniq(({}).flatMap(c => {}))",
                container.to_js(scope),
                target.to_js("c")
            ),
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css={s}"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role} name{name}"),
            Self::Marker {
                class,
                within: None,
            } => write!(f, "marker=.{class}"),
            Self::Marker {
                class,
                within: Some(c),
            } => write!(f, "marker=.{class} in ({c})"),
            Self::Text { tag: None, text } => write!(f, "text{text}"),
            Self::Text {
                tag: Some(tag),
                text,
            } => write!(f, "{tag} text{text}"),
            Self::TestId(id) => write!(f, "testid={id}"),
            Self::Within { container, target } => write!(f, "({target}) in ({container})"),
        }
    }
}

/// Ordered candidates for one logical target.
///
/// Invariant: never empty. The ordering encodes preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorSpec {
    target: String,
    candidates: Vec<Candidate>,
    scope: Option<ElementRef>,
}

impl LocatorSpec {
    /// Create a spec with its most preferred candidate
    #[must_use]
    pub fn new(target: impl Into<String>, first: Candidate) -> Self {
        Self {
            target: target.into(),
            candidates: vec![first],
            scope: None,
        }
    }

    /// Build from a candidate list
    ///
    /// # Errors
    ///
    /// Returns `InvalidLocator` if `candidates` is empty
    pub fn from_candidates(
        target: impl Into<String>,
        candidates: Vec<Candidate>,
    ) -> TenazResult<Self> {
        let target = target.into();
        if candidates.is_empty() {
            return Err(TenazError::InvalidLocator {
                message: format!("'{target}' has no candidates"),
            });
        }
        Ok(Self {
            target,
            candidates,
            scope: None,
        })
    }

    /// Append a less preferred fallback candidate
    #[must_use]
    pub fn or(mut self, candidate: Candidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    /// Restrict every candidate to descendants of `scope`
    #[must_use]
    pub fn scoped(mut self, scope: ElementRef) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Logical target description
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Candidates in preference order
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Scope root, if any
    #[must_use]
    pub const fn scope(&self) -> Option<&ElementRef> {
        self.scope.as_ref()
    }

    /// Render the candidate list for diagnostics
    #[must_use]
    pub fn describe_candidates(&self) -> String {
        self.candidates
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{i}] {c}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.target, self.describe_candidates())
    }
}

/// A live element found by a [`LocatorSpec`] at one point in time.
///
/// Not cached: callers re-resolve on every wait cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedElement {
    /// Element handle
    pub element: ElementRef,
    /// Index of the candidate that matched
    pub candidate_index: usize,
    /// Description of the matching candidate
    pub candidate: String,
    /// Resolution passes it took
    pub attempts: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod text_match_tests {
        use super::*;

        #[test]
        fn test_exact_normalizes_whitespace_and_case() {
            let m = TextMatch::exact("Select  All");
            assert!(m.matches("  select all\n"));
            assert!(!m.matches("Select All Plans"));
        }

        #[test]
        fn test_contains() {
            let m = TextMatch::contains("coupon");
            assert!(m.matches("Edit Coupon SAVE10"));
            assert!(!m.matches("Scheme"));
        }

        #[test]
        fn test_pattern() {
            let m = TextMatch::pattern(r"^Plan \d+$").unwrap();
            assert!(m.matches("Plan 12"));
            assert!(!m.matches("Plan twelve"));
        }

        #[test]
        fn test_bad_pattern_rejected() {
            let err = TextMatch::pattern("(unclosed").unwrap_err();
            assert!(matches!(err, TenazError::InvalidLocator { .. }));
        }

        #[test]
        fn test_equality_by_pattern_source() {
            assert_eq!(
                TextMatch::pattern("a+").unwrap(),
                TextMatch::pattern("a+").unwrap()
            );
            assert_ne!(TextMatch::exact("a"), TextMatch::contains("a"));
        }

        #[test]
        fn test_to_js_escapes() {
            let js = TextMatch::exact("say \"hi\"").to_js();
            assert!(js.contains(r#"\"hi\""#));
            assert!(js.contains("kind:\"exact\""));
        }
    }

    mod candidate_tests {
        use super::*;

        #[test]
        fn test_css_to_js() {
            let js = Candidate::css("button.primary").to_js("document");
            assert!(js.contains("querySelectorAll"));
            assert!(js.contains("button.primary"));
        }

        #[test]
        fn test_test_id_to_js() {
            let js = Candidate::test_id("score").to_js("document");
            assert!(js.contains("data-testid"));
            assert!(js.contains("score"));
        }

        #[test]
        fn test_role_to_js_includes_name_matcher() {
            let js = Candidate::role_named("checkbox", TextMatch::exact("Select All"))
                .to_js("document");
            assert!(js.contains("__tenaz.role(el) === \"checkbox\""));
            assert!(js.contains("Select All"));
        }

        #[test]
        fn test_within_rescopes_target() {
            let js = Candidate::within(Candidate::css(".panel"), Candidate::marker("option"))
                .to_js("document");
            assert!(js.contains("document.querySelectorAll(\".panel\")"));
            assert!(js.contains("c.getElementsByClassName(\"option\")"));
        }

        #[test]
        fn test_display() {
            assert_eq!(Candidate::css("td").to_string(), "css=td");
            assert_eq!(
                Candidate::marker_within("edit-icon", Candidate::css("tr")).to_string(),
                "marker=.edit-icon in (css=tr)"
            );
            assert_eq!(
                Candidate::tag_text("button", TextMatch::contains("Save")).to_string(),
                "button text~\"Save\""
            );
        }
    }

    mod locator_spec_tests {
        use super::*;

        #[test]
        fn test_spec_preserves_order() {
            let spec = LocatorSpec::new("save", Candidate::test_id("save"))
                .or(Candidate::role_named("button", TextMatch::exact("Save")))
                .or(Candidate::text(TextMatch::contains("Save")));
            assert_eq!(spec.candidates().len(), 3);
            assert!(matches!(spec.candidates()[0], Candidate::TestId(_)));
            assert!(matches!(spec.candidates()[2], Candidate::Text { .. }));
            assert_eq!(spec.target(), "save");
        }

        #[test]
        fn test_empty_spec_rejected() {
            let err = LocatorSpec::from_candidates("nothing", vec![]).unwrap_err();
            assert!(matches!(err, TenazError::InvalidLocator { .. }));
        }

        #[test]
        fn test_describe_candidates() {
            let spec = LocatorSpec::new("t", Candidate::css("a")).or(Candidate::css("b"));
            assert_eq!(spec.describe_candidates(), "[0] css=a; [1] css=b");
        }

        #[test]
        fn test_scoped() {
            let row = ElementRef::new("node-4", "tr");
            let spec = LocatorSpec::new("edit", Candidate::marker("edit")).scoped(row.clone());
            assert_eq!(spec.scope(), Some(&row));
        }
    }
}
