//! State Poller
//!
//! The single bounded-wait primitive. Every "wait until visible / checked /
//! value equals X" in the crate goes through [`poll_for`] or [`wait_until`];
//! nothing else sleeps.
//!
//! Semantics:
//!
//! - The condition is evaluated immediately, then once per poll interval
//! - A timeout of zero means "check once, no retries, no sleep"
//! - Waiting never fails: the caller gets the final value and decides
//!
//! Time comes from `tokio::time`, so tests can pause the clock.

use crate::locator::{LocatorSpec, TextMatch};
use crate::page::{ElementRef, RemotePage};
use crate::resolver::{self, Actionability};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

// =============================================================================
// POLL OPTIONS
// =============================================================================

/// Timeout and interval for one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Timeout in milliseconds (0 = check once)
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_RESOLVE_TIMEOUT_MS,
            crate::config::DEFAULT_POLL_INTERVAL_MS,
        )
    }
}

impl PollOptions {
    /// Create poll options
    #[must_use]
    pub const fn new(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self {
            timeout_ms,
            poll_interval_ms,
        }
    }

    /// Check exactly once
    #[must_use]
    pub const fn once() -> Self {
        Self::new(0, 0)
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// POLLER
// =============================================================================

/// Outcome of [`poll_for`]
#[derive(Debug, Clone)]
pub struct Polled<T> {
    /// Value produced by the probe, if it ever produced one
    pub value: Option<T>,
    /// Number of probe evaluations
    pub attempts: u32,
    /// Time spent
    pub elapsed: Duration,
}

/// Run `probe` until it yields `Some` or the timeout elapses
pub async fn poll_for<T, F, Fut>(options: &PollOptions, mut probe: F) -> Polled<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    let timeout = options.timeout();
    let mut attempts = 0;

    loop {
        attempts += 1;
        if let Some(value) = probe().await {
            return Polled {
                value: Some(value),
                attempts,
                elapsed: start.elapsed(),
            };
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Polled {
                value: None,
                attempts,
                elapsed,
            };
        }

        let remaining = timeout.saturating_sub(elapsed);
        tokio::time::sleep(options.poll_interval().min(remaining)).await;
    }
}

/// Wait until `condition` is true; returns the final evaluation
pub async fn wait_until<F, Fut>(options: &PollOptions, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    poll_for(options, || {
        let fut = condition();
        async move { fut.await.then_some(()) }
    })
    .await
    .value
    .is_some()
}

// =============================================================================
// WAIT CONDITIONS
// =============================================================================

/// Predicate over the element(s) described by a [`LocatorSpec`].
///
/// Re-resolved on every evaluation: handles are never reused across polls.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitCondition {
    /// A visible match exists
    Visible,
    /// No visible match exists
    Hidden,
    /// No match exists at all
    Detached,
    /// The first visible match is enabled
    Enabled,
    /// The first attached match has this checked state
    Checked(bool),
    /// The first attached match has this selected state
    Selected(bool),
    /// The first attached match carries attribute `name` = `value`
    AttributeEquals {
        /// Attribute name
        name: String,
        /// Expected value
        value: String,
    },
    /// The first visible match's text satisfies the matcher
    TextMatches(TextMatch),
    /// The first attached match's value equals this string
    ValueEquals(String),
    /// At least this many visible matches of the first matching candidate
    CountAtLeast(usize),
}

impl WaitCondition {
    /// Evaluate once. Page errors count as "not satisfied".
    pub async fn evaluate<P: RemotePage + ?Sized>(&self, page: &P, spec: &LocatorSpec) -> bool {
        match self {
            Self::Visible => resolver::resolve_once(page, spec, Actionability::Visible)
                .await
                .is_some(),
            Self::Hidden => resolver::resolve_once(page, spec, Actionability::Visible)
                .await
                .is_none(),
            Self::Detached => resolver::first_attached(page, spec).await.is_none(),
            Self::Enabled => {
                resolver::resolve_once(page, spec, Actionability::VisibleAndEnabled)
                    .await
                    .is_some()
            }
            Self::Checked(expected) => match resolver::first_attached(page, spec).await {
                Some(el) => page
                    .state(&el)
                    .await
                    .is_ok_and(|s| s.attached && s.checked == *expected),
                None => false,
            },
            Self::Selected(expected) => match resolver::first_attached(page, spec).await {
                Some(el) => page
                    .state(&el)
                    .await
                    .is_ok_and(|s| s.attached && s.selected == *expected),
                None => false,
            },
            Self::AttributeEquals { name, value } => {
                match resolver::first_attached(page, spec).await {
                    Some(el) => page
                        .attribute(&el, name)
                        .await
                        .is_ok_and(|v| v.as_deref() == Some(value.as_str())),
                    None => false,
                }
            }
            Self::TextMatches(matcher) => {
                match resolver::resolve_once(page, spec, Actionability::Visible).await {
                    Some(resolved) => page
                        .text(&resolved.element)
                        .await
                        .is_ok_and(|t| matcher.matches(&t)),
                    None => false,
                }
            }
            Self::ValueEquals(expected) => match resolver::first_attached(page, spec).await {
                Some(el) => page.value(&el).await.is_ok_and(|v| v == *expected),
                None => false,
            },
            Self::CountAtLeast(n) => resolver::visible_matches(page, spec).await.len() >= *n,
        }
    }

    /// Evaluate once against an already-resolved element
    pub async fn evaluate_element<P: RemotePage + ?Sized>(
        &self,
        page: &P,
        element: &ElementRef,
    ) -> bool {
        let Ok(state) = page.state(element).await else {
            return matches!(self, Self::Detached | Self::Hidden);
        };
        match self {
            Self::Visible => state.is_actionable(false),
            Self::Hidden => !state.is_actionable(false),
            Self::Detached => !state.attached,
            Self::Enabled => state.is_actionable(true),
            Self::Checked(expected) => state.attached && state.checked == *expected,
            Self::Selected(expected) => state.attached && state.selected == *expected,
            Self::AttributeEquals { name, value } => page
                .attribute(element, name)
                .await
                .is_ok_and(|v| v.as_deref() == Some(value.as_str())),
            Self::TextMatches(matcher) => {
                page.text(element).await.is_ok_and(|t| matcher.matches(&t))
            }
            Self::ValueEquals(expected) => page.value(element).await.is_ok_and(|v| v == *expected),
            Self::CountAtLeast(n) => *n == 0 || (*n == 1 && state.is_actionable(false)),
        }
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Visible => write!(f, "visible"),
            Self::Hidden => write!(f, "hidden"),
            Self::Detached => write!(f, "detached"),
            Self::Enabled => write!(f, "enabled"),
            Self::Checked(b) => write!(f, "checked = {b}"),
            Self::Selected(b) => write!(f, "selected = {b}"),
            Self::AttributeEquals { name, value } => write!(f, "[{name}] = {value:?}"),
            Self::TextMatches(m) => write!(f, "text {m}"),
            Self::ValueEquals(v) => write!(f, "value = {v:?}"),
            Self::CountAtLeast(n) => write!(f, "count >= {n}"),
        }
    }
}

/// Result of a wait operation
#[derive(Debug, Clone)]
pub struct WaitResult {
    /// Whether the wait was successful
    pub success: bool,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of evaluations
    pub attempts: u32,
    /// Description of what was waited for
    pub waited_for: String,
}

/// Wait for `condition` to hold for `spec`
pub async fn wait_for_condition<P: RemotePage + ?Sized>(
    page: &P,
    spec: &LocatorSpec,
    condition: &WaitCondition,
    options: &PollOptions,
) -> WaitResult {
    let polled = poll_for(options, || async {
        condition.evaluate(page, spec).await.then_some(())
    })
    .await;
    WaitResult {
        success: polled.value.is_some(),
        elapsed: polled.elapsed,
        attempts: polled.attempts,
        waited_for: format!("{} {condition}", spec.target()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::Candidate;
    use crate::mock::{MockNode, MockPage};
    use std::sync::atomic::{AtomicU32, Ordering};

    mod poll_options_tests {
        use super::*;

        #[test]
        fn test_once() {
            let options = PollOptions::once();
            assert_eq!(options.timeout(), Duration::ZERO);
        }

        #[test]
        fn test_builder() {
            let options = PollOptions::default()
                .with_timeout(1000)
                .with_poll_interval(20);
            assert_eq!(options.timeout(), Duration::from_millis(1000));
            assert_eq!(options.poll_interval(), Duration::from_millis(20));
        }
    }

    mod poller_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_zero_timeout_evaluates_exactly_once() {
            let calls = AtomicU32::new(0);
            let start = Instant::now();
            let result = wait_until(&PollOptions::once(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                false
            })
            .await;
            assert!(!result);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(start.elapsed(), Duration::ZERO);
        }

        #[tokio::test(start_paused = true)]
        async fn test_zero_timeout_returns_true_value() {
            assert!(wait_until(&PollOptions::once(), || async { true }).await);
        }

        #[tokio::test(start_paused = true)]
        async fn test_succeeds_on_later_attempt() {
            let calls = AtomicU32::new(0);
            let polled = poll_for(&PollOptions::new(1000, 100), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                (n == 4).then_some(n)
            })
            .await;
            assert_eq!(polled.value, Some(4));
            assert_eq!(polled.attempts, 4);
            assert_eq!(polled.elapsed, Duration::from_millis(300));
        }

        #[tokio::test(start_paused = true)]
        async fn test_times_out_with_final_check_at_deadline() {
            let calls = AtomicU32::new(0);
            let polled: Polled<()> = poll_for(&PollOptions::new(250, 100), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            })
            .await;
            assert!(polled.value.is_none());
            // t=0, 100, 200, 250
            assert_eq!(polled.attempts, 4);
            assert_eq!(polled.elapsed, Duration::from_millis(250));
        }
    }

    mod condition_tests {
        use super::*;

        fn page_with_checkbox(checked: bool) -> MockPage {
            let page = MockPage::new();
            let mut node = MockNode::new("input").attr("type", "checkbox").id("agree");
            if checked {
                node = node.checked();
            }
            page.append(page.root(), node);
            page
        }

        #[tokio::test]
        async fn test_checked_condition() {
            let page = page_with_checkbox(true);
            let spec = LocatorSpec::new("agree", Candidate::css("#agree"));
            assert!(WaitCondition::Checked(true).evaluate(&page, &spec).await);
            assert!(!WaitCondition::Checked(false).evaluate(&page, &spec).await);
        }

        #[tokio::test]
        async fn test_visible_and_hidden() {
            let page = MockPage::new();
            page.append(page.root(), MockNode::new("div").class("toast").hidden());
            let spec = LocatorSpec::new("toast", Candidate::marker("toast"));
            assert!(!WaitCondition::Visible.evaluate(&page, &spec).await);
            assert!(WaitCondition::Hidden.evaluate(&page, &spec).await);
            assert!(!WaitCondition::Detached.evaluate(&page, &spec).await);
        }

        #[tokio::test]
        async fn test_value_and_attribute() {
            let page = MockPage::new();
            page.append(
                page.root(),
                MockNode::new("input")
                    .id("code")
                    .value("SAVE10")
                    .attr("aria-invalid", "false"),
            );
            let spec = LocatorSpec::new("code", Candidate::css("#code"));
            assert!(
                WaitCondition::ValueEquals("SAVE10".into())
                    .evaluate(&page, &spec)
                    .await
            );
            assert!(
                WaitCondition::AttributeEquals {
                    name: "aria-invalid".into(),
                    value: "false".into()
                }
                .evaluate(&page, &spec)
                .await
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_for_delayed_visibility() {
            let page = MockPage::new();
            let panel = page.append(page.root(), MockNode::new("div").class("panel").hidden());
            page.show_after(panel, Duration::from_millis(120));
            let spec = LocatorSpec::new("panel", Candidate::marker("panel"));
            let result = wait_for_condition(
                &page,
                &spec,
                &WaitCondition::Visible,
                &PollOptions::new(500, 50),
            )
            .await;
            assert!(result.success);
            assert!(result.elapsed >= Duration::from_millis(120));
            assert!(result.waited_for.contains("panel visible"));
        }

        #[tokio::test]
        async fn test_element_bound_evaluation() {
            let page = page_with_checkbox(false);
            let spec = LocatorSpec::new("agree", Candidate::css("#agree"));
            let el = resolver::first_attached(&page, &spec).await.unwrap();
            assert!(WaitCondition::Checked(false).evaluate_element(&page, &el).await);
            assert!(WaitCondition::Visible.evaluate_element(&page, &el).await);
            assert!(!WaitCondition::Detached.evaluate_element(&page, &el).await);
        }

        #[tokio::test]
        async fn test_count_at_least() {
            let page = MockPage::new();
            for _ in 0..3 {
                page.append(page.root(), MockNode::new("li").class("row"));
            }
            let spec = LocatorSpec::new("rows", Candidate::marker("row"));
            assert!(WaitCondition::CountAtLeast(3).evaluate(&page, &spec).await);
            assert!(!WaitCondition::CountAtLeast(4).evaluate(&page, &spec).await);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_zero_timeout_never_retries(result in any::<bool>()) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .start_paused(true)
                    .build()
                    .unwrap();
                let calls = AtomicU32::new(0);
                let got = rt.block_on(wait_until(&PollOptions::once(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    result
                }));
                prop_assert_eq!(got, result);
                prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            }
        }
    }
}
