//! MockPage - in-memory [`RemotePage`] for unit and flow tests.

use super::dom::{Dom, MockNode, NodeId};
use crate::locator::Candidate;
use crate::page::{ClickMode, DomEvent, ElementRef, ElementState, RemotePage, Screenshot};
use crate::result::{TenazError, TenazResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Native interaction kinds that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockAction {
    /// `click`
    Click,
    /// `fill`
    Fill,
    /// `select_option`
    Select,
}

/// Side effect run after a successful click on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickEffect {
    /// Flip the checked flag of a node
    ToggleChecked(NodeId),
    /// Flip the selected flag of a node
    ToggleSelected(NodeId),
    /// Copy the clicked node's checked flag onto other nodes
    MirrorChecked(Vec<NodeId>),
    /// Make a node visible
    Show(NodeId),
    /// Make a node visible after a delay
    ShowAfter(NodeId, Duration),
    /// Hide a node
    Hide(NodeId),
    /// Remove a node from the document
    Detach(NodeId),
    /// Replace a node's own text
    SetText(NodeId, String),
}

#[derive(Debug)]
struct MockState {
    dom: Dom,
    url: String,
    history: Vec<String>,
    failures: HashMap<(NodeId, MockAction, ClickMode), u32>,
    blocked_events: Vec<NodeId>,
    click_effects: HashMap<NodeId, Vec<ClickEffect>>,
    key_effects: HashMap<String, Vec<ClickEffect>>,
    swallowed: HashMap<NodeId, u32>,
    screenshot: Option<Screenshot>,
}

/// In-memory page with a small DOM, CSS-subset queries and scriptable
/// failures.
///
/// Checkboxes and radios toggle on click the way a browser would. Anything
/// richer (panels opening, options mirroring a "select all") is scripted with
/// [`MockPage::on_click`].
#[derive(Debug)]
pub struct MockPage {
    state: Mutex<MockState>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    /// Empty page with a `<body>` root
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                dom: Dom::new(),
                url: "about:blank".to_string(),
                history: Vec::new(),
                failures: HashMap::new(),
                blocked_events: Vec::new(),
                click_effects: HashMap::new(),
                key_effects: HashMap::new(),
                swallowed: HashMap::new(),
                screenshot: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // BUILDING
    // =========================================================================

    /// Document root
    #[must_use]
    pub fn root(&self) -> NodeId {
        Dom::root()
    }

    /// Append `node` as last child of `parent`
    pub fn append(&self, parent: NodeId, node: MockNode) -> NodeId {
        self.lock().dom.append(parent, node)
    }

    /// Handle for a node, as the engine sees it
    #[must_use]
    pub fn element(&self, id: NodeId) -> ElementRef {
        let tag = self
            .lock()
            .dom
            .get(id)
            .map(|n| n.data.tag.clone())
            .unwrap_or_default();
        ElementRef::new(id.element_id(), tag)
    }

    /// Make a hidden node visible once `delay` has elapsed
    pub fn show_after(&self, id: NodeId, delay: Duration) {
        if let Some(node) = self.lock().dom.get_mut(id) {
            node.visible_at = Some(Instant::now() + delay);
        }
    }

    /// Show or hide a node
    pub fn set_visible(&self, id: NodeId, visible: bool) {
        if let Some(node) = self.lock().dom.get_mut(id) {
            node.data.visible = visible;
            node.visible_at = None;
        }
    }

    /// Remove a node from the document
    pub fn detach(&self, id: NodeId) {
        if let Some(node) = self.lock().dom.get_mut(id) {
            node.attached = false;
        }
    }

    /// Set a node's checked flag without recording an interaction
    pub fn set_checked_flag(&self, id: NodeId, checked: bool) {
        if let Some(node) = self.lock().dom.get_mut(id) {
            node.data.checked = checked;
        }
    }

    /// Set the page URL without recording a navigation
    pub fn set_url(&self, url: impl Into<String>) {
        self.lock().url = url.into();
    }

    /// Set the screenshot returned by [`RemotePage::screenshot`]
    pub fn set_screenshot(&self, screenshot: Screenshot) {
        self.lock().screenshot = Some(screenshot);
    }

    // =========================================================================
    // SCRIPTING
    // =========================================================================

    /// Make `action` in `mode` fail on `id` (every time)
    pub fn fail_on(&self, id: NodeId, action: MockAction, mode: ClickMode) {
        let _ = self.lock().failures.insert((id, action, mode), u32::MAX);
    }

    /// Make `action` fail on `id` in both native modes
    pub fn fail_native(&self, id: NodeId, action: MockAction) {
        self.fail_on(id, action, ClickMode::Standard);
        self.fail_on(id, action, ClickMode::Forced);
    }

    /// Make programmatic writes and dispatched events on `id` fail
    pub fn fail_programmatic(&self, id: NodeId) {
        self.lock().blocked_events.push(id);
    }

    /// Run `effect` after every successful click on `id`
    pub fn on_click(&self, id: NodeId, effect: ClickEffect) {
        self.lock().click_effects.entry(id).or_default().push(effect);
    }

    /// Run `effect` whenever `key` is pressed
    pub fn on_key(&self, key: impl Into<String>, effect: ClickEffect) {
        self.lock()
            .key_effects
            .entry(key.into())
            .or_default()
            .push(effect);
    }

    /// Accept the next `count` clicks on `id` without any effect
    pub fn swallow_clicks(&self, id: NodeId, count: u32) {
        let _ = self.lock().swallowed.insert(id, count);
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Recorded calls, e.g. `click:standard:node-3`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check if a call with this prefix was recorded
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().history.iter().any(|c| c.starts_with(prefix))
    }

    /// Clicks delivered to `id` by any mechanism, including failed attempts
    #[must_use]
    pub fn clicks_on(&self, id: NodeId) -> usize {
        let target = id.element_id();
        self.lock()
            .history
            .iter()
            .filter(|c| c.starts_with("click:") || c.starts_with("dispatch:click:"))
            .filter(|c| c.rsplit(':').next() == Some(target.as_str()))
            .count()
    }

    /// Checked flag of a node
    #[must_use]
    pub fn is_checked(&self, id: NodeId) -> bool {
        self.lock().dom.get(id).is_some_and(|n| n.data.checked)
    }

    /// Selected flag of a node
    #[must_use]
    pub fn is_selected(&self, id: NodeId) -> bool {
        self.lock().dom.get(id).is_some_and(|n| n.data.selected)
    }

    /// Form value of a node
    #[must_use]
    pub fn value_of(&self, id: NodeId) -> String {
        self.lock()
            .dom
            .get(id)
            .map(|n| n.data.value.clone())
            .unwrap_or_default()
    }

    /// Whether a node is currently visible
    #[must_use]
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.lock().dom.is_visible(id)
    }
}

// =============================================================================
// INTERACTION MODEL
// =============================================================================

impl MockState {
    fn node_id(&self, element: &ElementRef) -> TenazResult<NodeId> {
        NodeId::parse(&element.id)
            .filter(|id| self.dom.get(*id).is_some())
            .ok_or_else(|| TenazError::page(format!("unknown element {element}")))
    }

    fn attached(&self, element: &ElementRef) -> TenazResult<NodeId> {
        let id = self.node_id(element)?;
        if self.dom.is_attached(id) {
            Ok(id)
        } else {
            Err(TenazError::page(format!("{element} is detached")))
        }
    }

    fn check_native(
        &mut self,
        element: &ElementRef,
        action: MockAction,
        mode: ClickMode,
    ) -> TenazResult<NodeId> {
        let id = self.attached(element)?;
        if let Some(remaining) = self.failures.get_mut(&(id, action, mode)) {
            if *remaining > 0 {
                *remaining = remaining.saturating_sub(1);
                return Err(TenazError::page(format!(
                    "{action:?} ({mode}) on {element} intercepted"
                )));
            }
        }
        if mode == ClickMode::Standard {
            if !self.dom.is_visible(id) {
                return Err(TenazError::page(format!("{element} is not visible")));
            }
            if !self.dom.get(id).is_some_and(|n| n.data.enabled) {
                return Err(TenazError::page(format!("{element} is disabled")));
            }
        }
        Ok(id)
    }

    fn check_programmatic(&self, element: &ElementRef) -> TenazResult<NodeId> {
        let id = self.attached(element)?;
        if self.blocked_events.contains(&id) {
            return Err(TenazError::page(format!(
                "script execution on {element} rejected"
            )));
        }
        Ok(id)
    }

    fn activate(&mut self, id: NodeId) {
        if let Some(left) = self.swallowed.get_mut(&id) {
            if *left > 0 {
                *left -= 1;
                return;
            }
        }
        let input_type = self.dom.attr(id, "type").map(str::to_string);
        if let Some(node) = self.dom.get_mut(id) {
            if node.data.tag == "input" {
                match input_type.as_deref() {
                    Some("checkbox") => node.data.checked = !node.data.checked,
                    Some("radio") => node.data.checked = true,
                    _ => {}
                }
            }
        }
        let effects = self.click_effects.get(&id).cloned().unwrap_or_default();
        for effect in effects {
            self.apply(id, effect);
        }
    }

    fn apply(&mut self, source: NodeId, effect: ClickEffect) {
        match effect {
            ClickEffect::ToggleChecked(target) => {
                if let Some(n) = self.dom.get_mut(target) {
                    n.data.checked = !n.data.checked;
                }
            }
            ClickEffect::ToggleSelected(target) => {
                if let Some(n) = self.dom.get_mut(target) {
                    n.data.selected = !n.data.selected;
                }
            }
            ClickEffect::MirrorChecked(targets) => {
                let checked = self.dom.get(source).is_some_and(|n| n.data.checked);
                for target in targets {
                    if let Some(n) = self.dom.get_mut(target) {
                        n.data.checked = checked;
                    }
                }
            }
            ClickEffect::Show(target) => {
                if let Some(n) = self.dom.get_mut(target) {
                    n.data.visible = true;
                    n.visible_at = None;
                }
            }
            ClickEffect::ShowAfter(target, delay) => {
                if let Some(n) = self.dom.get_mut(target) {
                    n.visible_at = Some(Instant::now() + delay);
                }
            }
            ClickEffect::Hide(target) => {
                if let Some(n) = self.dom.get_mut(target) {
                    n.data.visible = false;
                    n.visible_at = None;
                }
            }
            ClickEffect::Detach(target) => {
                if let Some(n) = self.dom.get_mut(target) {
                    n.attached = false;
                }
            }
            ClickEffect::SetText(target, text) => {
                if let Some(n) = self.dom.get_mut(target) {
                    n.data.text = text;
                }
            }
        }
    }

    fn choose_option(&mut self, select: NodeId, wanted: &str) -> TenazResult<()> {
        let options: Vec<NodeId> = self
            .dom
            .descendants(select)
            .into_iter()
            .filter(|id| self.dom.get(*id).is_some_and(|n| n.data.tag == "option"))
            .collect();
        let chosen = options
            .iter()
            .copied()
            .find(|id| {
                self.dom.attr(*id, "value") == Some(wanted) || self.dom.text(*id) == wanted
            })
            .ok_or_else(|| TenazError::page(format!("no option {wanted:?}")))?;
        let value = self
            .dom
            .attr(chosen, "value")
            .map_or_else(|| self.dom.text(chosen), str::to_string);
        for option in options {
            if let Some(n) = self.dom.get_mut(option) {
                n.data.selected = option == chosen;
            }
        }
        if let Some(n) = self.dom.get_mut(select) {
            n.data.value = value;
        }
        Ok(())
    }
}

#[async_trait]
impl RemotePage for MockPage {
    async fn query_all(
        &self,
        candidate: &Candidate,
        scope: Option<&ElementRef>,
    ) -> TenazResult<Vec<ElementRef>> {
        let state = self.lock();
        let root = match scope {
            Some(el) => state.attached(el)?,
            None => Dom::root(),
        };
        let ids = state.dom.query(candidate, root)?;
        Ok(ids
            .into_iter()
            .map(|id| {
                let tag = state.dom.get(id).map(|n| n.data.tag.clone()).unwrap_or_default();
                ElementRef::new(id.element_id(), tag)
            })
            .collect())
    }

    async fn state(&self, element: &ElementRef) -> TenazResult<ElementState> {
        let state = self.lock();
        let id = state.node_id(element)?;
        if !state.dom.is_attached(id) {
            return Ok(ElementState::DETACHED);
        }
        let Some(node) = state.dom.get(id) else {
            return Ok(ElementState::DETACHED);
        };
        let aria = |name: &str| state.dom.attr(id, name) == Some("true");
        Ok(ElementState {
            attached: true,
            visible: state.dom.is_visible(id),
            enabled: node.data.enabled && !aria("aria-disabled"),
            checked: node.data.checked || aria("aria-checked"),
            selected: node.data.selected || aria("aria-selected"),
        })
    }

    async fn text(&self, element: &ElementRef) -> TenazResult<String> {
        let state = self.lock();
        let id = state.attached(element)?;
        Ok(state.dom.text(id))
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> TenazResult<Option<String>> {
        let state = self.lock();
        let id = state.attached(element)?;
        if name == "class" {
            return Ok(state.dom.get(id).map(|n| n.data.classes.join(" ")));
        }
        Ok(state.dom.attr(id, name).map(str::to_string))
    }

    async fn value(&self, element: &ElementRef) -> TenazResult<String> {
        let state = self.lock();
        let id = state.attached(element)?;
        Ok(state
            .dom
            .get(id)
            .map(|n| n.data.value.clone())
            .unwrap_or_default())
    }

    async fn parent(&self, element: &ElementRef) -> TenazResult<Option<ElementRef>> {
        let state = self.lock();
        let id = state.attached(element)?;
        Ok(state
            .dom
            .get(id)
            .and_then(|n| n.parent)
            .filter(|p| *p != Dom::root())
            .map(|p| {
                let tag = state.dom.get(p).map(|n| n.data.tag.clone()).unwrap_or_default();
                ElementRef::new(p.element_id(), tag)
            }))
    }

    async fn next_sibling(&self, element: &ElementRef) -> TenazResult<Option<ElementRef>> {
        let state = self.lock();
        let id = state.attached(element)?;
        Ok(state.dom.next_sibling(id).map(|s| {
            let tag = state.dom.get(s).map(|n| n.data.tag.clone()).unwrap_or_default();
            ElementRef::new(s.element_id(), tag)
        }))
    }

    async fn follows(&self, element: &ElementRef, reference: &ElementRef) -> TenazResult<bool> {
        let state = self.lock();
        let a = state.attached(element)?;
        let b = state.attached(reference)?;
        let order = state.dom.document_position();
        Ok(order.get(&a) > order.get(&b))
    }

    async fn click(&self, element: &ElementRef, mode: ClickMode) -> TenazResult<()> {
        let mut state = self.lock();
        state.history.push(format!("click:{mode}:{}", element.id));
        let id = state.check_native(element, MockAction::Click, mode)?;
        let enabled = state.dom.get(id).is_some_and(|n| n.data.enabled);
        if enabled {
            state.activate(id);
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, value: &str, mode: ClickMode) -> TenazResult<()> {
        let mut state = self.lock();
        state.history.push(format!("fill:{mode}:{}", element.id));
        let id = state.check_native(element, MockAction::Fill, mode)?;
        if let Some(n) = state.dom.get_mut(id) {
            n.data.value = value.to_string();
        }
        Ok(())
    }

    async fn select_option(
        &self,
        element: &ElementRef,
        value: &str,
        mode: ClickMode,
    ) -> TenazResult<()> {
        let mut state = self.lock();
        state.history.push(format!("select:{mode}:{}", element.id));
        let id = state.check_native(element, MockAction::Select, mode)?;
        state.choose_option(id, value)
    }

    async fn set_value(&self, element: &ElementRef, value: &str) -> TenazResult<()> {
        let mut state = self.lock();
        state.history.push(format!("set_value:{}", element.id));
        let id = state.check_programmatic(element)?;
        if state.dom.get(id).is_some_and(|n| n.data.tag == "select") {
            return state.choose_option(id, value);
        }
        if let Some(n) = state.dom.get_mut(id) {
            n.data.value = value.to_string();
        }
        Ok(())
    }

    async fn set_checked(&self, element: &ElementRef, checked: bool) -> TenazResult<()> {
        let mut state = self.lock();
        state.history.push(format!("set_checked:{}", element.id));
        let id = state.check_programmatic(element)?;
        if let Some(n) = state.dom.get_mut(id) {
            n.data.checked = checked;
        }
        Ok(())
    }

    async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> TenazResult<()> {
        let mut state = self.lock();
        state
            .history
            .push(format!("dispatch:{}:{}", event.as_str(), element.id));
        let id = state.check_programmatic(element)?;
        if event == DomEvent::Click {
            state.activate(id);
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> TenazResult<()> {
        let mut state = self.lock();
        state.history.push(format!("press_key:{key}"));
        let effects = state.key_effects.get(key).cloned().unwrap_or_default();
        for effect in effects {
            state.apply(Dom::root(), effect);
        }
        Ok(())
    }

    async fn navigate(&self, url: &str) -> TenazResult<()> {
        let mut state = self.lock();
        state.history.push(format!("navigate:{url}"));
        state.url = url.to_string();
        Ok(())
    }

    async fn current_url(&self) -> TenazResult<String> {
        Ok(self.lock().url.clone())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> TenazResult<()> {
        self.lock().history.push("network_idle".to_string());
        Ok(())
    }

    async fn screenshot(&self) -> TenazResult<Screenshot> {
        self.lock()
            .screenshot
            .clone()
            .ok_or_else(|| TenazError::page("No mock screenshot set"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn checkbox(page: &MockPage) -> NodeId {
        page.append(page.root(), MockNode::new("input").attr("type", "checkbox"))
    }

    mod click_tests {
        use super::*;

        #[tokio::test]
        async fn test_checkbox_toggles_on_click() {
            let page = MockPage::new();
            let cb = checkbox(&page);
            page.click(&page.element(cb), ClickMode::Standard).await.unwrap();
            assert!(page.is_checked(cb));
            page.click(&page.element(cb), ClickMode::Standard).await.unwrap();
            assert!(!page.is_checked(cb));
            assert_eq!(page.clicks_on(cb), 2);
        }

        #[tokio::test]
        async fn test_scripted_failure_is_mode_specific() {
            let page = MockPage::new();
            let cb = checkbox(&page);
            page.fail_on(cb, MockAction::Click, ClickMode::Standard);
            assert!(page.click(&page.element(cb), ClickMode::Standard).await.is_err());
            page.click(&page.element(cb), ClickMode::Forced).await.unwrap();
            assert!(page.is_checked(cb));
        }

        #[tokio::test]
        async fn test_standard_click_rejects_hidden_forced_does_not() {
            let page = MockPage::new();
            let btn = page.append(page.root(), MockNode::new("button").hidden());
            assert!(page.click(&page.element(btn), ClickMode::Standard).await.is_err());
            assert!(page.click(&page.element(btn), ClickMode::Forced).await.is_ok());
        }

        #[tokio::test]
        async fn test_swallowed_clicks_have_no_effect() {
            let page = MockPage::new();
            let cb = checkbox(&page);
            page.swallow_clicks(cb, 1);
            page.click(&page.element(cb), ClickMode::Standard).await.unwrap();
            assert!(!page.is_checked(cb));
            page.click(&page.element(cb), ClickMode::Standard).await.unwrap();
            assert!(page.is_checked(cb));
        }

        #[tokio::test]
        async fn test_click_effects() {
            let page = MockPage::new();
            let trigger = page.append(page.root(), MockNode::new("button"));
            let panel = page.append(page.root(), MockNode::new("div").hidden());
            page.on_click(trigger, ClickEffect::Show(panel));
            page.click(&page.element(trigger), ClickMode::Standard)
                .await
                .unwrap();
            assert!(page.is_visible(panel));
        }

        #[tokio::test]
        async fn test_mirror_checked() {
            let page = MockPage::new();
            let all = checkbox(&page);
            let a = checkbox(&page);
            let b = checkbox(&page);
            page.on_click(all, ClickEffect::MirrorChecked(vec![a, b]));
            page.click(&page.element(all), ClickMode::Standard).await.unwrap();
            assert!(page.is_checked(a) && page.is_checked(b));
        }
    }

    mod form_tests {
        use super::*;

        #[tokio::test]
        async fn test_fill_replaces_value() {
            let page = MockPage::new();
            let input = page.append(page.root(), MockNode::new("input").value("old"));
            page.fill(&page.element(input), "new", ClickMode::Standard)
                .await
                .unwrap();
            assert_eq!(page.value_of(input), "new");
        }

        #[tokio::test]
        async fn test_select_by_label_or_value() {
            let page = MockPage::new();
            let select = page.append(page.root(), MockNode::new("select"));
            page.append(select, MockNode::new("option").attr("value", "m").text("Monthly"));
            let yearly =
                page.append(select, MockNode::new("option").attr("value", "y").text("Yearly"));
            page.select_option(&page.element(select), "Yearly", ClickMode::Standard)
                .await
                .unwrap();
            assert_eq!(page.value_of(select), "y");
            assert!(page.is_selected(yearly));
            page.select_option(&page.element(select), "m", ClickMode::Standard)
                .await
                .unwrap();
            assert_eq!(page.value_of(select), "m");
            assert!(!page.is_selected(yearly));
        }

        #[tokio::test]
        async fn test_programmatic_block() {
            let page = MockPage::new();
            let input = page.append(page.root(), MockNode::new("input"));
            page.fail_programmatic(input);
            assert!(page.set_value(&page.element(input), "x").await.is_err());
            assert!(page.was_called("set_value:"));
        }
    }

    mod state_tests {
        use super::*;

        #[tokio::test]
        async fn test_detached_state() {
            let page = MockPage::new();
            let node = page.append(page.root(), MockNode::new("div"));
            let el = page.element(node);
            page.detach(node);
            assert_eq!(page.state(&el).await.unwrap(), ElementState::DETACHED);
            assert!(page.text(&el).await.is_err());
        }

        #[tokio::test]
        async fn test_aria_state() {
            let page = MockPage::new();
            let node = page.append(
                page.root(),
                MockNode::new("div")
                    .attr("aria-checked", "true")
                    .attr("aria-disabled", "true"),
            );
            let state = page.state(&page.element(node)).await.unwrap();
            assert!(state.checked);
            assert!(!state.enabled);
        }

        #[tokio::test]
        async fn test_parent_stops_at_root() {
            let page = MockPage::new();
            let outer = page.append(page.root(), MockNode::new("div"));
            let inner = page.append(outer, MockNode::new("span"));
            assert_eq!(
                page.parent(&page.element(inner)).await.unwrap(),
                Some(page.element(outer))
            );
            assert_eq!(page.parent(&page.element(outer)).await.unwrap(), None);
        }

        #[tokio::test]
        async fn test_follows() {
            let page = MockPage::new();
            let a = page.append(page.root(), MockNode::new("h2"));
            let b = page.append(page.root(), MockNode::new("table"));
            assert!(page.follows(&page.element(b), &page.element(a)).await.unwrap());
            assert!(!page.follows(&page.element(a), &page.element(b)).await.unwrap());
        }

        #[tokio::test]
        async fn test_navigation_history() {
            let page = MockPage::new();
            page.navigate("https://app.test/users").await.unwrap();
            assert_eq!(page.current_url().await.unwrap(), "https://app.test/users");
            assert!(page.was_called("navigate:https://app.test/users"));
            assert!(page.screenshot().await.is_err());
        }
    }
}
