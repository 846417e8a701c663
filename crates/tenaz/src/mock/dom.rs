//! In-memory DOM arena with candidate matching.

use crate::locator::{normalize_whitespace, Candidate};
use crate::result::{TenazError, TenazResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::time::Instant;

/// Index of a node in a [`MockPage`](super::MockPage)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Element id used in [`ElementRef`](crate::page::ElementRef)s
    #[must_use]
    pub fn element_id(self) -> String {
        format!("node-{}", self.0)
    }

    /// Parse an element id produced by [`NodeId::element_id`]
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        id.strip_prefix("node-")?.parse().ok().map(Self)
    }
}

/// Builder for a mock element
#[derive(Debug, Clone)]
pub struct MockNode {
    pub(crate) tag: String,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) text: String,
    pub(crate) visible: bool,
    pub(crate) enabled: bool,
    pub(crate) checked: bool,
    pub(crate) selected: bool,
    pub(crate) value: String,
}

impl MockNode {
    /// New visible, enabled element
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            text: String::new(),
            visible: true,
            enabled: true,
            checked: false,
            selected: false,
            value: String::new(),
        }
    }

    /// Set the `id` attribute
    #[must_use]
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Add a class
    #[must_use]
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Not rendered
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Checked
    #[must_use]
    pub const fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    /// Selected
    #[must_use]
    pub const fn selected(mut self) -> Self {
        self.selected = true;
        self
    }

    /// Initial form value
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) data: MockNode,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) attached: bool,
    pub(crate) visible_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub(crate) struct Dom {
    nodes: Vec<Node>,
}

impl Dom {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: MockNode::new("body"),
                parent: None,
                children: Vec::new(),
                attached: true,
                visible_at: None,
            }],
        }
    }

    pub(crate) const fn root() -> NodeId {
        NodeId(0)
    }

    pub(crate) fn append(&mut self, parent: NodeId, data: MockNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
            attached: true,
            visible_at: None,
        });
        if let Some(p) = self.nodes.get_mut(parent.0) {
            p.children.push(id);
        }
        id
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub(crate) fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.get(id).and_then(|n| n.parent);
        while let Some(p) = cursor {
            out.push(p);
            cursor = self.get(p).and_then(|n| n.parent);
        }
        out
    }

    pub(crate) fn is_attached(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.attached)
            && self
                .ancestors(id)
                .iter()
                .all(|a| self.get(*a).is_some_and(|n| n.attached))
    }

    fn self_visible(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| {
            n.data.visible || n.visible_at.is_some_and(|at| Instant::now() >= at)
        })
    }

    pub(crate) fn is_visible(&self, id: NodeId) -> bool {
        self.is_attached(id)
            && self.self_visible(id)
            && self.ancestors(id).iter().all(|a| self.self_visible(*a))
    }

    /// Own text followed by descendant text, whitespace-normalized
    pub(crate) fn text(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        self.collect_text(id, &mut parts);
        normalize_whitespace(&parts.join(" "))
    }

    fn collect_text(&self, id: NodeId, parts: &mut Vec<String>) {
        if let Some(node) = self.get(id) {
            if !node.attached {
                return;
            }
            if !node.data.text.is_empty() {
                parts.push(node.data.text.clone());
            }
            for child in &node.children {
                self.collect_text(*child, parts);
            }
        }
    }

    /// Attached descendants of `scope` (excluding it) in document order
    pub(crate) fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Some(node) = self.get(scope) {
            for child in &node.children {
                self.preorder(*child, &mut out);
            }
        }
        out
    }

    fn preorder(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if let Some(node) = self.get(id) {
            if !node.attached {
                return;
            }
            out.push(id);
            for child in &node.children {
                self.preorder(*child, out);
            }
        }
    }

    pub(crate) fn document_position(&self) -> HashMap<NodeId, usize> {
        let mut order = vec![Self::root()];
        order.extend(self.descendants(Self::root()));
        order.into_iter().enumerate().map(|(i, n)| (n, i)).collect()
    }

    pub(crate) fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.get(id)?.parent?;
        let siblings = &self.get(parent)?.children;
        let pos = siblings.iter().position(|s| *s == id)?;
        siblings[pos + 1..]
            .iter()
            .copied()
            .find(|s| self.get(*s).is_some_and(|n| n.attached))
    }

    pub(crate) fn role(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else {
            return String::new();
        };
        if let Some(role) = node.data.attrs.get("role") {
            return role.clone();
        }
        let input_type = node.data.attrs.get("type").map(String::as_str);
        match (node.data.tag.as_str(), input_type) {
            ("button", _) | ("input", Some("button" | "submit")) => "button",
            ("a", _) => "link",
            ("input", Some("checkbox")) => "checkbox",
            ("input", Some("radio")) => "radio",
            ("input", _) | ("textarea", _) => "textbox",
            ("select", _) => "combobox",
            ("option", _) => "option",
            ("table", _) => "table",
            ("tr", _) => "row",
            ("td", _) => "cell",
            ("th", _) => "columnheader",
            ("h1" | "h2" | "h3" | "h4" | "h5" | "h6", _) => "heading",
            ("dialog", _) => "dialog",
            _ => "",
        }
        .to_string()
    }

    pub(crate) fn accessible_name(&self, id: NodeId) -> String {
        self.get(id)
            .and_then(|n| n.data.attrs.get("aria-label").cloned())
            .unwrap_or_else(|| self.text(id))
    }

    /// Matches of `candidate` under `scope`, in document order
    pub(crate) fn query(&self, candidate: &Candidate, scope: NodeId) -> TenazResult<Vec<NodeId>> {
        let pool = self.descendants(scope);
        let found = match candidate {
            Candidate::Css(selector) => {
                let groups = parse_selector(selector)?;
                pool.into_iter()
                    .filter(|id| groups.iter().any(|g| self.matches_complex(g, g.len() - 1, *id)))
                    .collect()
            }
            Candidate::TestId(test_id) => pool
                .into_iter()
                .filter(|id| self.attr(*id, "data-testid") == Some(test_id.as_str()))
                .collect(),
            Candidate::Role { role, name } => pool
                .into_iter()
                .filter(|id| {
                    self.role(*id) == *role
                        && name
                            .as_ref()
                            .is_none_or(|m| m.matches(&self.accessible_name(*id)))
                })
                .collect(),
            Candidate::Marker { class, within } => {
                let containers: Option<HashSet<NodeId>> = match within {
                    Some(c) => Some(self.query(c, scope)?.into_iter().collect()),
                    None => None,
                };
                pool.into_iter()
                    .filter(|id| self.has_class(*id, class))
                    .filter(|id| {
                        containers.as_ref().is_none_or(|set| {
                            self.ancestors(*id).iter().any(|a| set.contains(a))
                        })
                    })
                    .collect()
            }
            Candidate::Text { tag, text } => {
                let hits: Vec<NodeId> = pool
                    .into_iter()
                    .filter(|id| {
                        tag.as_ref()
                            .is_none_or(|t| self.get(*id).is_some_and(|n| n.data.tag == *t))
                    })
                    .filter(|id| text.matches(&self.text(*id)))
                    .collect();
                let set: HashSet<NodeId> = hits.iter().copied().collect();
                hits.into_iter()
                    .filter(|id| !self.descendants(*id).iter().any(|d| set.contains(d)))
                    .collect()
            }
            Candidate::Within { container, target } => {
                let mut seen = HashSet::new();
                let mut out = Vec::new();
                for c in self.query(container, scope)? {
                    for t in self.query(target, c)? {
                        if seen.insert(t) {
                            out.push(t);
                        }
                    }
                }
                let order = self.document_position();
                out.sort_by_key(|id| order.get(id).copied().unwrap_or(usize::MAX));
                out
            }
        };
        Ok(found)
    }

    pub(crate) fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id)
            .and_then(|n| n.data.attrs.get(name))
            .map(String::as_str)
    }

    fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.get(id)
            .is_some_and(|n| n.data.classes.iter().any(|c| c == class))
    }

    fn matches_compound(&self, compound: &Compound, id: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        if compound.tag.as_ref().is_some_and(|t| *t != node.data.tag) {
            return false;
        }
        if compound
            .id
            .as_ref()
            .is_some_and(|i| self.attr(id, "id") != Some(i.as_str()))
        {
            return false;
        }
        if !compound.classes.iter().all(|c| self.has_class(id, c)) {
            return false;
        }
        compound.attrs.iter().all(|a| {
            let actual = if a.name == "class" {
                Some(node.data.classes.join(" "))
            } else {
                self.attr(id, &a.name).map(str::to_string)
            };
            match (&a.op, actual) {
                (AttrOp::Exists, Some(_)) => true,
                (AttrOp::Equals(v), Some(actual)) => actual == *v,
                (AttrOp::Contains(v), Some(actual)) => actual.contains(v.as_str()),
                (_, None) => false,
            }
        })
    }

    fn matches_complex(&self, parts: &[(Combinator, Compound)], idx: usize, id: NodeId) -> bool {
        let (combinator, compound) = &parts[idx];
        if !self.matches_compound(compound, id) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match combinator {
            Combinator::Child => self
                .get(id)
                .and_then(|n| n.parent)
                .is_some_and(|p| self.matches_complex(parts, idx - 1, p)),
            Combinator::Descendant => self
                .ancestors(id)
                .into_iter()
                .any(|a| self.matches_complex(parts, idx - 1, a)),
        }
    }
}

// =============================================================================
// CSS SUBSET
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSel {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSel>,
}

type Complex = Vec<(Combinator, Compound)>;

fn invalid(selector: &str, why: &str) -> TenazError {
    TenazError::InvalidLocator {
        message: format!("unsupported selector {selector:?}: {why}"),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_selector(selector: &str) -> TenazResult<Vec<Complex>> {
    selector
        .split(',')
        .map(|group| parse_complex(group.trim(), selector))
        .collect()
}

fn parse_complex(group: &str, full: &str) -> TenazResult<Complex> {
    let chars: Vec<char> = group.chars().collect();
    let mut parts: Complex = Vec::new();
    let mut pending = Combinator::Descendant;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '>' {
            pending = Combinator::Child;
            i += 1;
            continue;
        }
        let (compound, next) = parse_compound(&chars, i, full)?;
        parts.push((pending, compound));
        pending = Combinator::Descendant;
        i = next;
    }
    if parts.is_empty() {
        return Err(invalid(full, "empty selector"));
    }
    Ok(parts)
}

fn read_ident(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_ident_char(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn parse_compound(chars: &[char], mut i: usize, full: &str) -> TenazResult<(Compound, usize)> {
    let mut compound = Compound::default();
    if chars[i] == '*' {
        i += 1;
    } else if is_ident_char(chars[i]) {
        let (tag, next) = read_ident(chars, i);
        compound.tag = Some(tag.to_lowercase());
        i = next;
    }
    while i < chars.len() {
        match chars[i] {
            '#' => {
                let (id, next) = read_ident(chars, i + 1);
                compound.id = Some(id);
                i = next;
            }
            '.' => {
                let (class, next) = read_ident(chars, i + 1);
                compound.classes.push(class);
                i = next;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| p + i)
                    .ok_or_else(|| invalid(full, "unclosed attribute selector"))?;
                let body: String = chars[i + 1..end].iter().collect();
                compound.attrs.push(parse_attr(&body));
                i = end + 1;
            }
            c if c.is_whitespace() || c == '>' => break,
            other => return Err(invalid(full, &format!("unexpected '{other}'"))),
        }
    }
    Ok((compound, i))
}

fn parse_attr(body: &str) -> AttrSel {
    let unquote = |v: &str| v.trim().trim_matches('"').trim_matches('\'').to_string();
    if let Some((name, value)) = body.split_once("*=") {
        AttrSel {
            name: name.trim().to_string(),
            op: AttrOp::Contains(unquote(value)),
        }
    } else if let Some((name, value)) = body.split_once('=') {
        AttrSel {
            name: name.trim().to_string(),
            op: AttrOp::Equals(unquote(value)),
        }
    } else {
        AttrSel {
            name: body.trim().to_string(),
            op: AttrOp::Exists,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::TextMatch;

    fn sample() -> (Dom, NodeId, NodeId, NodeId) {
        let mut dom = Dom::new();
        let table = dom.append(Dom::root(), MockNode::new("table").class("users"));
        let row = dom.append(table, MockNode::new("tr").attr("data-row", "1"));
        let cell = dom.append(row, MockNode::new("td").class("email").text("a@x.com"));
        (dom, table, row, cell)
    }

    #[test]
    fn test_node_id_roundtrip() {
        assert_eq!(NodeId::parse(&NodeId(12).element_id()), Some(NodeId(12)));
        assert_eq!(NodeId::parse("elem-1"), None);
    }

    #[test]
    fn test_css_descendant_and_child() {
        let (dom, _, _, cell) = sample();
        let q = |s: &str| dom.query(&Candidate::css(s), Dom::root()).unwrap();
        assert_eq!(q("table td"), vec![cell]);
        assert_eq!(q("tr > td.email"), vec![cell]);
        assert!(q("table > td").is_empty());
        assert_eq!(q("[data-row=\"1\"] td").len(), 1);
        assert_eq!(q("td[class*=mai]"), vec![cell]);
        assert_eq!(q("th, td").len(), 1);
    }

    #[test]
    fn test_css_rejects_pseudo_classes() {
        let (dom, ..) = sample();
        assert!(dom
            .query(&Candidate::css("td:first-child"), Dom::root())
            .is_err());
    }

    #[test]
    fn test_text_candidate_prefers_innermost() {
        let (dom, _, _, cell) = sample();
        let hits = dom
            .query(&Candidate::text(TextMatch::contains("a@x.com")), Dom::root())
            .unwrap();
        assert_eq!(hits, vec![cell]);
    }

    #[test]
    fn test_implicit_roles() {
        let (dom, table, row, cell) = sample();
        assert_eq!(dom.role(table), "table");
        assert_eq!(dom.role(row), "row");
        assert_eq!(dom.role(cell), "cell");
    }

    #[test]
    fn test_hidden_ancestor_hides_descendants() {
        let mut dom = Dom::new();
        let panel = dom.append(Dom::root(), MockNode::new("div").hidden());
        let option = dom.append(panel, MockNode::new("span"));
        assert!(!dom.is_visible(option));
        assert!(dom.is_attached(option));
    }

    #[test]
    fn test_detached_excluded_from_queries_and_text() {
        let (mut dom, _, row, cell) = sample();
        dom.get_mut(cell).unwrap().attached = false;
        assert!(dom.query(&Candidate::css("td"), Dom::root()).unwrap().is_empty());
        assert_eq!(dom.text(row), "");
        assert!(!dom.is_attached(cell));
    }

    #[test]
    fn test_next_sibling() {
        let mut dom = Dom::new();
        let label = dom.append(Dom::root(), MockNode::new("dt").text("Status"));
        let value = dom.append(Dom::root(), MockNode::new("dd").text("Active"));
        assert_eq!(dom.next_sibling(label), Some(value));
        assert_eq!(dom.next_sibling(value), None);
    }
}
