//! Overlay/Panel Controller
//!
//! Drives transient floating panels (dropdown option lists, pickers) that
//! share one generic container shape across unrelated widgets.
//!
//! ```text
//!   Closed ──open──► Opening ──panel found──► Open ──confirm/cancel/close──► Closing ──► Closed
//!                      │  timeout: re-click trigger once                      │ timeout: re-issue once
//!                      ▼                                                      ▼
//!                 NotFound / Ambiguous                                  StateMismatch
//! ```
//!
//! A panel is claimed by content, not by shape: among the visible containers,
//! newly appeared ones are checked first (newest first) for the widget's
//! marker. A widget without a marker only claims a container that appeared
//! after its trigger was clicked, and only when exactly one did.

use crate::config::EngineConfig;
use crate::executor::{Action, Executor, Tier};
use crate::locator::{Candidate, LocatorSpec, TextMatch};
use crate::page::{ElementRef, RemotePage};
use crate::resolver::{self, Actionability};
use crate::result::{TenazError, TenazResult};
use crate::wait::{poll_for, wait_until, PollOptions, WaitCondition};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Description of one logical overlay widget
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayWidget {
    /// Widget name used in diagnostics
    pub name: String,
    /// Control that opens the panel
    pub trigger: LocatorSpec,
    /// Generic panel-like container shape
    pub container: Candidate,
    /// Content unique to this widget's panel, matched inside the container
    pub marker: Option<Candidate>,
    /// "Select all" control, matched inside the container
    pub select_all: Candidate,
    /// Individual options, matched inside the container
    pub option: Candidate,
    /// Accept control, matched inside the container
    pub confirm: Option<Candidate>,
    /// Cancel control, matched inside the container
    pub cancel: Option<Candidate>,
}

impl OverlayWidget {
    /// Widget with default select-all and option shapes
    #[must_use]
    pub fn new(name: impl Into<String>, trigger: LocatorSpec, container: Candidate) -> Self {
        Self {
            name: name.into(),
            trigger,
            container,
            marker: None,
            select_all: Candidate::role_named("checkbox", TextMatch::contains("select all")),
            option: Candidate::role("option"),
            confirm: None,
            cancel: None,
        }
    }

    /// Set the identifying marker
    #[must_use]
    pub fn with_marker(mut self, marker: Candidate) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Set the select-all control
    #[must_use]
    pub fn with_select_all(mut self, control: Candidate) -> Self {
        self.select_all = control;
        self
    }

    /// Set the option shape
    #[must_use]
    pub fn with_options(mut self, option: Candidate) -> Self {
        self.option = option;
        self
    }

    /// Set the accept control
    #[must_use]
    pub fn with_confirm(mut self, control: Candidate) -> Self {
        self.confirm = Some(control);
        self
    }

    /// Set the cancel control
    #[must_use]
    pub fn with_cancel(mut self, control: Candidate) -> Self {
        self.cancel = Some(control);
        self
    }

    fn describe_panel(&self) -> String {
        match &self.marker {
            Some(marker) => format!("{} containing {marker}", self.container),
            None => self.container.to_string(),
        }
    }
}

/// Lifecycle of one panel instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PanelState {
    /// Not shown
    Closed,
    /// Trigger clicked, waiting for the panel
    Opening,
    /// Panel claimed and usable
    Open,
    /// Close requested, waiting for the panel to go away
    Closing,
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        write!(f, "{s}")
    }
}

/// One opened panel instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayHandle {
    widget: String,
    trigger: ElementRef,
    container: ElementRef,
    state: PanelState,
    retried: bool,
}

impl OverlayHandle {
    /// Owning widget
    #[must_use]
    pub fn widget(&self) -> &str {
        &self.widget
    }

    /// Trigger element that opened the panel
    #[must_use]
    pub const fn trigger(&self) -> &ElementRef {
        &self.trigger
    }

    /// Claimed container element
    #[must_use]
    pub const fn container(&self) -> &ElementRef {
        &self.container
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> PanelState {
        self.state
    }

    /// Whether the panel is usable
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == PanelState::Open
    }

    /// Whether opening needed a second trigger click
    #[must_use]
    pub const fn needed_retry(&self) -> bool {
        self.retried
    }

    fn ensure_open(&self, operation: &str) -> TenazResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(TenazError::InvalidState {
                message: format!(
                    "cannot {operation} on '{}' panel: it is {}",
                    self.widget, self.state
                ),
            })
        }
    }
}

/// Outcome of [`OverlayController::select_all`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectAllReport {
    /// Whether the select-all control was clicked
    pub toggled: bool,
    /// Tier that delivered the toggle
    pub tier: Option<Tier>,
    /// Options in the panel
    pub options: usize,
    /// Options that had to be fixed one by one
    pub stragglers_fixed: usize,
}

/// One option inside an open panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayOption {
    /// Rendered label
    pub label: String,
    /// Checked or selected
    pub selected: bool,
    /// Option element
    pub element: ElementRef,
}

/// Controller for one overlay widget on one page
#[derive(Debug, Clone, Copy)]
pub struct OverlayController<'a, P: ?Sized> {
    page: &'a P,
    config: &'a EngineConfig,
    widget: &'a OverlayWidget,
}

impl<'a, P: RemotePage + ?Sized> OverlayController<'a, P> {
    /// Create a controller
    #[must_use]
    pub const fn new(page: &'a P, config: &'a EngineConfig, widget: &'a OverlayWidget) -> Self {
        Self {
            page,
            config,
            widget,
        }
    }

    fn executor(&self) -> Executor<'a, P> {
        Executor::new(self.page, self.config)
    }

    fn inside(&self, what: &str, candidate: &Candidate, handle: &OverlayHandle) -> LocatorSpec {
        LocatorSpec::new(format!("{} {what}", self.widget.name), candidate.clone())
            .scoped(handle.container.clone())
    }

    async fn visible_containers(&self) -> Vec<ElementRef> {
        let spec = LocatorSpec::new(self.widget.name.clone(), self.widget.container.clone());
        resolver::visible_matches(self.page, &spec).await
    }

    /// One claiming pass. `ambiguous` records whether this pass saw
    /// containers it could not attribute; only the last pass counts.
    async fn claim(&self, before: &HashSet<ElementRef>, ambiguous: &AtomicBool) -> Option<ElementRef> {
        let containers = self.visible_containers().await;
        let (mut fresh, stale): (Vec<ElementRef>, Vec<ElementRef>) =
            containers.into_iter().partition(|c| !before.contains(c));

        // without a marker only a container that appeared after the click is ours
        let Some(marker) = &self.widget.marker else {
            ambiguous.store(fresh.len() > 1, Ordering::SeqCst);
            return if fresh.len() == 1 { fresh.pop() } else { None };
        };

        for container in fresh.iter().rev().chain(stale.iter().rev()) {
            let spec = LocatorSpec::new(self.widget.name.clone(), marker.clone())
                .scoped(container.clone());
            if resolver::resolve_once(self.page, &spec, Actionability::Attached)
                .await
                .is_some()
            {
                ambiguous.store(false, Ordering::SeqCst);
                return Some(container.clone());
            }
        }
        ambiguous.store(!fresh.is_empty(), Ordering::SeqCst);
        None
    }

    async fn foreign_panels_open(&self, before: &HashSet<ElementRef>) -> bool {
        self.widget.marker.is_none()
            && self
                .visible_containers()
                .await
                .iter()
                .any(|c| before.contains(c))
    }

    // =========================================================================
    // OPEN
    // =========================================================================

    /// Click the trigger and claim this widget's panel
    pub async fn open(&self) -> TenazResult<OverlayHandle> {
        let before: HashSet<ElementRef> = self.visible_containers().await.into_iter().collect();
        let outcome = self
            .executor()
            .perform(&Action::Click, &self.widget.trigger, None)
            .await
            .into_result()?;
        let Some(trigger) = outcome.element else {
            return Err(TenazError::page("trigger click reported no element"));
        };
        let mut handle = OverlayHandle {
            widget: self.widget.name.clone(),
            trigger: trigger.clone(),
            container: trigger.clone(),
            state: PanelState::Opening,
            retried: false,
        };

        let options = self.config.overlay_open_options();
        let ambiguous = AtomicBool::new(false);
        let mut polled = poll_for(&options, || self.claim(&before, &ambiguous)).await;
        let mut attempts = polled.attempts;

        if polled.value.is_none() && !ambiguous.load(Ordering::SeqCst) {
            warn!(widget = %self.widget.name, "panel did not appear, re-clicking trigger");
            handle.retried = true;
            self.executor()
                .perform_on(&Action::Click, &trigger, self.widget.trigger.target(), None)
                .await
                .into_result()?;
            polled = poll_for(&options, || self.claim(&before, &ambiguous)).await;
            attempts += polled.attempts;
        }

        let foreign = polled.value.is_none() && self.foreign_panels_open(&before).await;
        match polled.value {
            Some(container) => {
                info!(widget = %self.widget.name, %container, "panel open");
                handle.container = container;
                handle.state = PanelState::Open;
                Ok(handle)
            }
            None if foreign || ambiguous.load(Ordering::SeqCst) => {
                warn!(widget = %self.widget.name, "could not decide which panel belongs to the widget");
                Err(TenazError::Ambiguous {
                    target: self.widget.name.clone(),
                    reason: format!(
                        "visible containers matching {} but none identifiable as {}",
                        self.widget.container,
                        self.widget.describe_panel()
                    ),
                })
            }
            None => Err(TenazError::NotFound {
                action: "open".to_string(),
                target: format!("{} panel", self.widget.name),
                candidates: self.widget.describe_panel(),
                attempts,
            }),
        }
    }

    // =========================================================================
    // OPTIONS
    // =========================================================================

    async fn option_elements(&self, handle: &OverlayHandle) -> TenazResult<Vec<ElementRef>> {
        self.page
            .query_all(&self.widget.option, Some(&handle.container))
            .await
    }

    /// Options in the open panel with their selection state
    pub async fn options(&self, handle: &OverlayHandle) -> TenazResult<Vec<OverlayOption>> {
        handle.ensure_open("read options")?;
        let mut out = Vec::new();
        for element in self.option_elements(handle).await? {
            let state = self.page.state(&element).await?;
            if !state.attached {
                continue;
            }
            out.push(OverlayOption {
                label: self.page.text(&element).await?,
                selected: state.is_on(),
                element,
            });
        }
        Ok(out)
    }

    async fn stragglers(&self, handle: &OverlayHandle, desired: bool) -> Option<Vec<ElementRef>> {
        let elements = self.option_elements(handle).await.ok()?;
        let mut out = Vec::new();
        for element in elements {
            let state = self.page.state(&element).await.ok()?;
            if state.attached && state.is_on() != desired {
                out.push(element);
            }
        }
        Some(out)
    }

    async fn converged(&self, handle: &OverlayHandle, desired: bool) -> bool {
        wait_until(&self.config.post_condition_options(), || async {
            self.stragglers(handle, desired)
                .await
                .is_some_and(|s| s.is_empty())
        })
        .await
    }

    /// Drive "select all" to `desired`, touching the control only when its
    /// state differs, then fix options that did not follow one by one
    pub async fn select_all(
        &self,
        handle: &OverlayHandle,
        desired: bool,
    ) -> TenazResult<SelectAllReport> {
        handle.ensure_open("select all")?;
        let spec = self.inside("select all", &self.widget.select_all, handle);
        let control = resolver::resolve(
            self.page,
            &spec,
            &self.config.action_options(),
            Actionability::Visible,
        )
        .await
        .into_result()?;

        let mut report = SelectAllReport {
            toggled: false,
            tier: Some(Tier::NoneNeeded),
            options: self.option_elements(handle).await?.len(),
            stragglers_fixed: 0,
        };

        let current = self.page.state(&control.element).await?.is_on();
        if current == desired {
            debug!(widget = %self.widget.name, desired, "select all already in desired state");
        } else {
            let outcome = self
                .executor()
                .perform_on(&Action::Click, &control.element, spec.target(), None)
                .await
                .into_result()?;
            report.toggled = true;
            report.tier = outcome.tier;
        }

        if self.converged(handle, desired).await {
            return Ok(report);
        }

        let stragglers = self.stragglers(handle, desired).await.unwrap_or_default();
        warn!(
            widget = %self.widget.name,
            count = stragglers.len(),
            "options did not follow select all, fixing individually"
        );
        for option in &stragglers {
            self.executor()
                .perform_on(&Action::Click, option, &format!("{} option", self.widget.name), None)
                .await
                .into_result()?;
        }
        report.stragglers_fixed = stragglers.len();

        if self.converged(handle, desired).await {
            Ok(report)
        } else {
            Err(TenazError::StateMismatch {
                action: "select_all".to_string(),
                target: self.widget.name.clone(),
                expected: format!("every option selected = {desired}"),
                timeout_ms: self.config.post_condition_timeout_ms,
                resolved: format!("panel {}", handle.container),
                candidates: self.widget.option.to_string(),
            })
        }
    }

    /// Select the options with these labels, leaving others untouched.
    /// Returns how many options were clicked.
    pub async fn select_options(&self, handle: &OverlayHandle, labels: &[&str]) -> TenazResult<usize> {
        handle.ensure_open("select options")?;
        let options = self.options(handle).await?;
        let mut clicked = 0;
        for label in labels {
            let wanted = TextMatch::exact(*label);
            let Some(option) = options.iter().find(|o| wanted.matches(&o.label)) else {
                return Err(TenazError::NotFound {
                    action: "select_option".to_string(),
                    target: format!("{} option {label:?}", self.widget.name),
                    candidates: self.widget.option.to_string(),
                    attempts: 1,
                });
            };
            if option.selected {
                continue;
            }
            self.executor()
                .perform_on(&Action::Click, &option.element, label, None)
                .await
                .into_result()?;
            clicked += 1;
            let page = self.page;
            let element = &option.element;
            let selected = wait_until(&self.config.post_condition_options(), || async move {
                page.state(element).await.is_ok_and(|s| s.is_on())
            })
            .await;
            if !selected {
                return Err(TenazError::StateMismatch {
                    action: "select_option".to_string(),
                    target: format!("{} option {label:?}", self.widget.name),
                    expected: "selected".to_string(),
                    timeout_ms: self.config.post_condition_timeout_ms,
                    resolved: format!("option {}", option.element),
                    candidates: self.widget.option.to_string(),
                });
            }
        }
        Ok(clicked)
    }

    // =========================================================================
    // CLOSE
    // =========================================================================

    async fn wait_closed(&self, handle: &OverlayHandle, options: &PollOptions) -> bool {
        wait_until(options, || {
            WaitCondition::Hidden.evaluate_element(self.page, &handle.container)
        })
        .await
    }

    async fn close_with(
        &self,
        handle: &mut OverlayHandle,
        what: &str,
        control: Option<&Candidate>,
    ) -> TenazResult<()> {
        handle.ensure_open(what)?;
        let element = match control {
            Some(candidate) => {
                let spec = self.inside(what, candidate, handle);
                Some(
                    resolver::resolve(
                        self.page,
                        &spec,
                        &self.config.action_options(),
                        Actionability::Visible,
                    )
                    .await
                    .into_result()?
                    .element,
                )
            }
            None => None,
        };

        handle.state = PanelState::Closing;
        let options = self.config.overlay_close_options();
        for attempt in 0..2 {
            let delivered = match &element {
                Some(el) => self
                    .executor()
                    .perform_on(&Action::Click, el, what, None)
                    .await
                    .into_result()
                    .map(|_| ()),
                None if attempt == 0 => self.page.press_key("Escape").await,
                None => self
                    .executor()
                    .perform_on(&Action::Click, &handle.trigger, what, None)
                    .await
                    .into_result()
                    .map(|_| ()),
            };
            if let Err(e) = delivered {
                handle.state = PanelState::Open;
                return Err(e);
            }
            if self.wait_closed(handle, &options).await {
                handle.state = PanelState::Closed;
                debug!(widget = %self.widget.name, via = what, "panel closed");
                return Ok(());
            }
            warn!(widget = %self.widget.name, via = what, "panel still open, re-issuing");
        }
        handle.state = PanelState::Open;
        Err(TenazError::StateMismatch {
            action: what.to_string(),
            target: self.widget.name.clone(),
            expected: "panel closed".to_string(),
            timeout_ms: options.timeout_ms,
            resolved: format!("panel {}", handle.container),
            candidates: self.widget.describe_panel(),
        })
    }

    /// Click the accept control and wait for the panel to close
    pub async fn confirm(&self, handle: &mut OverlayHandle) -> TenazResult<()> {
        match &self.widget.confirm {
            Some(control) => self.close_with(handle, "confirm", Some(control)).await,
            None => self.close(handle).await,
        }
    }

    /// Click the cancel control and wait for the panel to close
    pub async fn cancel(&self, handle: &mut OverlayHandle) -> TenazResult<()> {
        match &self.widget.cancel {
            Some(control) => self.close_with(handle, "cancel", Some(control)).await,
            None => self.close(handle).await,
        }
    }

    /// Dismiss with Escape, falling back to the trigger
    pub async fn close(&self, handle: &mut OverlayHandle) -> TenazResult<()> {
        self.close_with(handle, "close", None).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{ClickEffect, MockNode, MockPage, NodeId};

    struct Panel {
        trigger: NodeId,
        container: NodeId,
        all: NodeId,
        options: Vec<NodeId>,
        confirm: NodeId,
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_action_timeout(200)
            .with_post_condition_timeout(200)
            .with_overlay_timeouts(300, 300)
    }

    fn build_panel(page: &MockPage, trigger_id: &str, labels: &[&str], open: bool) -> Panel {
        let trigger = page.append(page.root(), MockNode::new("button").id(trigger_id));
        let mut node = MockNode::new("div").class("overlay-pane");
        if !open {
            node = node.hidden();
        }
        let container = page.append(page.root(), node);
        let all = page.append(
            container,
            MockNode::new("input").attr("type", "checkbox").class("all"),
        );
        let options: Vec<NodeId> = labels
            .iter()
            .map(|l| {
                let opt = page.append(container, MockNode::new("label").class("opt-row").text(*l));
                page.append(opt, MockNode::new("input").attr("type", "checkbox").class("opt"))
            })
            .collect();
        let confirm = page.append(container, MockNode::new("button").class("ok").text("Apply"));
        page.on_click(trigger, ClickEffect::Show(container));
        page.on_click(all, ClickEffect::MirrorChecked(options.clone()));
        page.on_click(confirm, ClickEffect::Hide(container));
        Panel {
            trigger,
            container,
            all,
            options,
            confirm,
        }
    }

    fn widget(trigger_id: &str, marker: Option<&str>) -> OverlayWidget {
        let mut w = OverlayWidget::new(
            trigger_id,
            LocatorSpec::new(trigger_id, Candidate::css(format!("#{trigger_id}"))),
            Candidate::marker("overlay-pane"),
        )
        .with_select_all(Candidate::css("input.all"))
        .with_options(Candidate::css("input.opt"))
        .with_confirm(Candidate::css("button.ok"));
        if let Some(text) = marker {
            w = w.with_marker(Candidate::text(TextMatch::exact(text)));
        }
        w
    }

    mod open_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_open_claims_marked_panel_among_two() {
            let page = MockPage::new();
            let regions = build_panel(&page, "regions", &["North", "South"], false);
            let plans = build_panel(&page, "plans", &["Gold", "Silver"], true);
            let cfg = config();
            let w = widget("regions", Some("North"));
            let handle = OverlayController::new(&page, &cfg, &w).open().await.unwrap();
            assert!(handle.is_open());
            assert_eq!(handle.container(), &page.element(regions.container));
            assert_ne!(handle.container(), &page.element(plans.container));
            assert!(!handle.needed_retry());
        }

        #[tokio::test(start_paused = true)]
        async fn test_open_without_marker_is_ambiguous_with_two_fresh_panels() {
            let page = MockPage::new();
            let a = build_panel(&page, "a", &["One"], false);
            let b = build_panel(&page, "b", &["Two"], false);
            page.on_click(a.trigger, ClickEffect::Show(b.container));
            let cfg = config();
            let w = widget("a", None);
            let err = OverlayController::new(&page, &cfg, &w).open().await.unwrap_err();
            assert!(matches!(err, TenazError::Ambiguous { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_marker_absent_from_fresh_panel_is_ambiguous() {
            let page = MockPage::new();
            build_panel(&page, "regions", &["North"], false);
            let cfg = config();
            let w = widget("regions", Some("Gold"));
            let err = OverlayController::new(&page, &cfg, &w).open().await.unwrap_err();
            assert!(matches!(err, TenazError::Ambiguous { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_first_click_swallowed_retries_once() {
            let page = MockPage::new();
            let p = build_panel(&page, "regions", &["North"], false);
            page.swallow_clicks(p.trigger, 1);
            let cfg = config();
            let w = widget("regions", Some("North"));
            let handle = OverlayController::new(&page, &cfg, &w).open().await.unwrap();
            assert!(handle.needed_retry());
            assert_eq!(page.clicks_on(p.trigger), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_never_appearing_panel_fails_after_retry() {
            let page = MockPage::new();
            let p = build_panel(&page, "regions", &["North"], false);
            page.swallow_clicks(p.trigger, 10);
            let cfg = config();
            let w = widget("regions", Some("North"));
            let err = OverlayController::new(&page, &cfg, &w).open().await.unwrap_err();
            match err {
                TenazError::NotFound { target, .. } => assert_eq!(target, "regions panel"),
                other => panic!("unexpected {other}"),
            }
            assert_eq!(page.clicks_on(p.trigger), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_unmarked_widget_never_claims_panel_open_before_click() {
            let page = MockPage::new();
            let plans = build_panel(&page, "plans", &["Gold"], true);
            let regions = build_panel(&page, "regions", &["North"], false);
            page.swallow_clicks(regions.trigger, 1);
            let cfg = config();
            let w = widget("regions", None);
            let ctl = OverlayController::new(&page, &cfg, &w);

            let handle = ctl.open().await.unwrap();
            assert!(handle.needed_retry());
            assert_eq!(page.clicks_on(regions.trigger), 2);
            assert_eq!(handle.container(), &page.element(regions.container));

            ctl.select_all(&handle, true).await.unwrap();
            assert!(regions.options.iter().all(|o| page.is_checked(*o)));
            assert!(plans.options.iter().all(|o| !page.is_checked(*o)));
            assert_eq!(page.clicks_on(plans.all), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_unmarked_widget_with_only_foreign_panel_is_ambiguous() {
            let page = MockPage::new();
            let plans = build_panel(&page, "plans", &["Gold"], true);
            let regions = build_panel(&page, "regions", &["North"], false);
            page.swallow_clicks(regions.trigger, 10);
            let cfg = config();
            let w = widget("regions", None);

            let err = OverlayController::new(&page, &cfg, &w).open().await.unwrap_err();
            assert!(matches!(err, TenazError::Ambiguous { .. }));
            assert_eq!(page.clicks_on(regions.trigger), 2);
            assert!(plans.options.iter().all(|o| !page.is_checked(*o)));
        }

        #[tokio::test(start_paused = true)]
        async fn test_transient_unidentified_panel_does_not_block_retry() {
            let page = MockPage::new();
            let regions = build_panel(&page, "regions", &["North"], false);
            let spinner =
                page.append(page.root(), MockNode::new("div").class("overlay-pane").hidden());
            page.swallow_clicks(regions.trigger, 1);
            let cfg = config();
            let w = widget("regions", Some("North"));
            let ctl = OverlayController::new(&page, &cfg, &w);

            let flicker = async {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                page.set_visible(spinner, true);
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                page.set_visible(spinner, false);
            };
            let (opened, ()) = tokio::join!(ctl.open(), flicker);

            let handle = opened.unwrap();
            assert!(handle.needed_retry());
            assert_eq!(page.clicks_on(regions.trigger), 2);
            assert_eq!(handle.container(), &page.element(regions.container));
        }
    }

    mod select_all_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_select_all_mutates_only_owning_panel() {
            let page = MockPage::new();
            let regions = build_panel(&page, "regions", &["North", "South"], false);
            let plans = build_panel(&page, "plans", &["Gold", "Silver"], true);
            let cfg = config();
            let w = widget("regions", Some("North"));
            let ctl = OverlayController::new(&page, &cfg, &w);
            let handle = ctl.open().await.unwrap();
            let report = ctl.select_all(&handle, true).await.unwrap();
            assert!(report.toggled);
            assert_eq!(report.options, 2);
            assert!(regions.options.iter().all(|o| page.is_checked(*o)));
            assert!(plans.options.iter().all(|o| !page.is_checked(*o)));
            assert_eq!(page.clicks_on(plans.all), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn test_already_selected_is_not_toggled() {
            let page = MockPage::new();
            let p = build_panel(&page, "regions", &["North", "South"], false);
            page.set_checked_flag(p.all, true);
            for o in &p.options {
                page.set_checked_flag(*o, true);
            }
            let cfg = config();
            let w = widget("regions", Some("North"));
            let ctl = OverlayController::new(&page, &cfg, &w);
            let handle = ctl.open().await.unwrap();
            let report = ctl.select_all(&handle, true).await.unwrap();
            assert!(!report.toggled);
            assert_eq!(report.tier, Some(Tier::NoneNeeded));
            assert_eq!(page.clicks_on(p.all), 0);
            assert!(page.is_checked(p.all));
        }

        #[tokio::test(start_paused = true)]
        async fn test_stragglers_fixed_individually() {
            let page = MockPage::new();
            let trigger = page.append(page.root(), MockNode::new("button").id("regions"));
            let container =
                page.append(page.root(), MockNode::new("div").class("overlay-pane").hidden());
            let all = page.append(
                container,
                MockNode::new("input").attr("type", "checkbox").class("all"),
            );
            let north = page.append(
                container,
                MockNode::new("input").attr("type", "checkbox").class("opt").attr("aria-label", "North"),
            );
            let south = page.append(
                container,
                MockNode::new("input").attr("type", "checkbox").class("opt"),
            );
            page.append(container, MockNode::new("span").text("North"));
            page.on_click(trigger, ClickEffect::Show(container));
            page.on_click(all, ClickEffect::MirrorChecked(vec![north]));
            let cfg = config();
            let w = widget("regions", Some("North"));
            let ctl = OverlayController::new(&page, &cfg, &w);
            let handle = ctl.open().await.unwrap();
            let report = ctl.select_all(&handle, true).await.unwrap();
            assert_eq!(report.stragglers_fixed, 1);
            assert!(page.is_checked(north) && page.is_checked(south));
            assert_eq!(page.clicks_on(all), 1);
            assert_eq!(page.clicks_on(south), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_deselect_all() {
            let page = MockPage::new();
            let p = build_panel(&page, "regions", &["North", "South"], false);
            page.set_checked_flag(p.all, true);
            for o in &p.options {
                page.set_checked_flag(*o, true);
            }
            let cfg = config();
            let w = widget("regions", Some("North"));
            let ctl = OverlayController::new(&page, &cfg, &w);
            let handle = ctl.open().await.unwrap();
            let report = ctl.select_all(&handle, false).await.unwrap();
            assert!(report.toggled);
            assert!(p.options.iter().all(|o| !page.is_checked(*o)));
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_confirm_closes_and_refuses_further_ops() {
            let page = MockPage::new();
            let p = build_panel(&page, "regions", &["North"], false);
            let cfg = config();
            let w = widget("regions", Some("North"));
            let ctl = OverlayController::new(&page, &cfg, &w);
            let mut handle = ctl.open().await.unwrap();
            ctl.confirm(&mut handle).await.unwrap();
            assert_eq!(handle.state(), PanelState::Closed);
            assert_eq!(page.clicks_on(p.confirm), 1);
            assert!(!page.is_visible(p.container));
            let err = ctl.select_all(&handle, true).await.unwrap_err();
            assert!(matches!(err, TenazError::InvalidState { .. }));
            assert!(ctl.confirm(&mut handle).await.is_err());
        }

        #[tokio::test(start_paused = true)]
        async fn test_close_with_escape() {
            let page = MockPage::new();
            let p = build_panel(&page, "regions", &["North"], false);
            page.on_key("Escape", ClickEffect::Hide(p.container));
            let cfg = config();
            let w = widget("regions", Some("North"));
            let ctl = OverlayController::new(&page, &cfg, &w);
            let mut handle = ctl.open().await.unwrap();
            ctl.cancel(&mut handle).await.unwrap();
            assert_eq!(handle.state(), PanelState::Closed);
            assert!(page.was_called("press_key:Escape"));
        }

        #[tokio::test(start_paused = true)]
        async fn test_close_falls_back_to_trigger() {
            let page = MockPage::new();
            let p = build_panel(&page, "regions", &["North"], false);
            let cfg = config();
            let w = widget("regions", Some("North"));
            let ctl = OverlayController::new(&page, &cfg, &w);
            let mut handle = ctl.open().await.unwrap();
            page.on_click(p.trigger, ClickEffect::Hide(p.container));
            ctl.close(&mut handle).await.unwrap();
            assert_eq!(handle.state(), PanelState::Closed);
            assert_eq!(page.clicks_on(p.trigger), 2);
        }

        #[tokio::test(start_paused = true)]
        async fn test_options_and_select_options() {
            let page = MockPage::new();
            let trigger = page.append(page.root(), MockNode::new("button").id("plans"));
            let container =
                page.append(page.root(), MockNode::new("div").class("overlay-pane").hidden());
            let gold = page.append(
                container,
                MockNode::new("input").attr("type", "checkbox").class("opt").text("Gold"),
            );
            page.append(
                container,
                MockNode::new("input").attr("type", "checkbox").class("opt").text("Silver"),
            );
            page.on_click(trigger, ClickEffect::Show(container));
            let cfg = config();
            let w = widget("plans", Some("Gold"));
            let ctl = OverlayController::new(&page, &cfg, &w);
            let handle = ctl.open().await.unwrap();
            let labels: Vec<String> = ctl
                .options(&handle)
                .await
                .unwrap()
                .into_iter()
                .map(|o| o.label)
                .collect();
            assert_eq!(labels, vec!["Gold", "Silver"]);
            assert_eq!(ctl.select_options(&handle, &["Gold"]).await.unwrap(), 1);
            assert!(page.is_checked(gold));
            assert_eq!(ctl.select_options(&handle, &["Gold"]).await.unwrap(), 0);
            assert!(ctl.select_options(&handle, &["Bronze"]).await.is_err());
        }
    }
}
