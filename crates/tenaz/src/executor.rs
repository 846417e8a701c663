//! Interaction Executor
//!
//! Performs one action against one logical target with escalating delivery
//! mechanisms, then verifies the resulting state.
//!
//! # Escalation
//!
//! ```text
//! resolve ──► Primary (native, actionability checks)
//!               │ error
//!               ▼
//!             Forced (native, checks skipped)
//!               │ error
//!               ▼
//!             Programmatic (property write + dispatched events)
//!               │ error
//!               ▼
//!             AllTiersFailed
//! ```
//!
//! Any tier that returns without error ends escalation. A failing
//! post-condition does not escalate: the action was delivered, the page
//! disagreed, and the call is reported as [`OutcomeStatus::PostConditionTimeout`].

use crate::config::EngineConfig;
use crate::locator::LocatorSpec;
use crate::page::{ClickMode, DomEvent, ElementRef, RemotePage};
use crate::resolver::{self, Actionability, Resolution};
use crate::result::{TenazError, TenazResult};
use crate::wait::{wait_until, WaitCondition};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

// =============================================================================
// ACTIONS AND TIERS
// =============================================================================

/// Action to perform on a resolved element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Click
    Click,
    /// Clear-then-type
    Fill(String),
    /// Pick an option by value or label
    SelectOption(String),
    /// Drive a checkbox to the given state
    ToggleCheckbox(bool),
}

impl Action {
    /// Post-condition verified when the caller supplies none
    #[must_use]
    pub fn implicit_post_condition(&self) -> Option<WaitCondition> {
        match self {
            Self::ToggleCheckbox(desired) => Some(WaitCondition::Checked(*desired)),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Click => write!(f, "click"),
            Self::Fill(v) => write!(f, "fill({v:?})"),
            Self::SelectOption(v) => write!(f, "select_option({v:?})"),
            Self::ToggleCheckbox(b) => write!(f, "toggle_checkbox({b})"),
        }
    }
}

/// Escalation tier that delivered an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// The target was already in the desired state
    NoneNeeded,
    /// Native interaction with actionability checks
    Primary,
    /// Native interaction without actionability checks
    Forced,
    /// Direct property mutation plus synthetic events
    Programmatic,
}

impl Tier {
    /// Tiers tried in order
    pub const ESCALATION: [Self; 3] = [Self::Primary, Self::Forced, Self::Programmatic];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoneNeeded => "none-needed",
            Self::Primary => "primary",
            Self::Forced => "forced",
            Self::Programmatic => "programmatic",
        };
        write!(f, "{s}")
    }
}

/// Error captured from a failed tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierFailure {
    /// Tier that failed
    pub tier: Tier,
    /// Rendered error
    pub error: String,
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tier, self.error)
    }
}

// =============================================================================
// POST-CONDITIONS
// =============================================================================

/// State expected after an action
#[derive(Debug, Clone, PartialEq)]
pub enum PostCondition {
    /// Evaluated on the element that was acted on
    OnTarget(WaitCondition),
    /// Evaluated on another logical target (re-resolved each poll)
    On(LocatorSpec, WaitCondition),
}

impl PostCondition {
    async fn holds<P: RemotePage + ?Sized>(&self, page: &P, acted_on: &ElementRef) -> bool {
        match self {
            Self::OnTarget(condition) => condition.evaluate_element(page, acted_on).await,
            Self::On(spec, condition) => condition.evaluate(page, spec).await,
        }
    }
}

impl fmt::Display for PostCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnTarget(c) => write!(f, "{c}"),
            Self::On(spec, c) => write!(f, "{} {c}", spec.target()),
        }
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// How an interaction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Delivered and verified
    Succeeded,
    /// The target never resolved
    ElementNotFound,
    /// Every tier errored
    AllTiersFailed,
    /// Delivered, but the expected state was never observed
    PostConditionTimeout,
}

/// Result of one [`Executor::perform`] call
#[derive(Debug, Clone, Serialize)]
pub struct InteractionOutcome {
    /// How the call ended
    pub status: OutcomeStatus,
    /// Rendered action
    pub action: String,
    /// Logical target
    pub target: String,
    /// Tier that delivered the action, if any did
    pub tier: Option<Tier>,
    /// Errors from tiers that failed, in escalation order
    pub failures: Vec<TierFailure>,
    /// Index of the candidate that resolved the target
    pub candidate_index: Option<usize>,
    /// Element acted on
    pub element: Option<ElementRef>,
    /// Resolution passes
    pub resolution_attempts: u32,
    /// Rendered candidate list
    pub candidates: String,
    /// Rendered post-condition, if one was checked
    pub post_condition: Option<String>,
    /// Post-condition timeout in milliseconds
    pub post_condition_timeout_ms: u64,
}

impl InteractionOutcome {
    /// Whether the action was delivered and verified
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }

    /// Rendered tier failures, `primary: ...; forced: ...`
    #[must_use]
    pub fn describe_failures(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Which candidate resolved the target, `candidate [1] after 2 attempt(s)`
    #[must_use]
    pub fn describe_resolution(&self) -> String {
        match self.candidate_index {
            Some(index) => format!(
                "candidate [{index}] after {} attempt(s)",
                self.resolution_attempts
            ),
            None => "element reference".to_string(),
        }
    }

    /// Map non-success outcomes onto the error taxonomy
    pub fn into_result(self) -> TenazResult<Self> {
        match self.status {
            OutcomeStatus::Succeeded => Ok(self),
            OutcomeStatus::ElementNotFound => Err(TenazError::NotFound {
                action: self.action,
                target: self.target,
                candidates: self.candidates,
                attempts: self.resolution_attempts,
            }),
            OutcomeStatus::AllTiersFailed => Err(TenazError::AllTiersExhausted {
                failures: self.describe_failures(),
                resolved: self.describe_resolution(),
                action: self.action,
                target: self.target,
                candidates: self.candidates,
            }),
            OutcomeStatus::PostConditionTimeout => Err(TenazError::StateMismatch {
                resolved: self.describe_resolution(),
                action: self.action,
                target: self.target,
                expected: self.post_condition.unwrap_or_default(),
                timeout_ms: self.post_condition_timeout_ms,
                candidates: self.candidates,
            }),
        }
    }
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// Executes actions against one page
#[derive(Debug, Clone, Copy)]
pub struct Executor<'a, P: ?Sized> {
    page: &'a P,
    config: &'a EngineConfig,
}

impl<'a, P: RemotePage + ?Sized> Executor<'a, P> {
    /// Create an executor over a page
    #[must_use]
    pub const fn new(page: &'a P, config: &'a EngineConfig) -> Self {
        Self { page, config }
    }

    /// Resolve `spec`, deliver `action`, verify `post` (or the action's
    /// implicit post-condition)
    pub async fn perform(
        &self,
        action: &Action,
        spec: &LocatorSpec,
        post: Option<PostCondition>,
    ) -> InteractionOutcome {
        let resolution = resolver::resolve(
            self.page,
            spec,
            &self.config.action_options(),
            Actionability::VisibleAndEnabled,
        )
        .await;
        let mut outcome = self.blank_outcome(action, spec.target(), spec.describe_candidates());
        match resolution {
            Resolution::Found(resolved) => {
                outcome.candidate_index = Some(resolved.candidate_index);
                outcome.resolution_attempts = resolved.attempts;
                self.deliver(action, &resolved.element, post, outcome).await
            }
            Resolution::NotFound { attempts, .. } => {
                outcome.status = OutcomeStatus::ElementNotFound;
                outcome.resolution_attempts = attempts;
                outcome
            }
        }
    }

    /// Deliver `action` to an element that is already resolved
    pub async fn perform_on(
        &self,
        action: &Action,
        element: &ElementRef,
        target: &str,
        post: Option<PostCondition>,
    ) -> InteractionOutcome {
        let mut outcome = self.blank_outcome(action, target, element.to_string());
        outcome.resolution_attempts = 1;
        self.deliver(action, element, post, outcome).await
    }

    fn blank_outcome(&self, action: &Action, target: &str, candidates: String) -> InteractionOutcome {
        InteractionOutcome {
            status: OutcomeStatus::Succeeded,
            action: action.to_string(),
            target: target.to_string(),
            tier: None,
            failures: Vec::new(),
            candidate_index: None,
            element: None,
            resolution_attempts: 0,
            candidates,
            post_condition: None,
            post_condition_timeout_ms: self.config.post_condition_timeout_ms,
        }
    }

    async fn deliver(
        &self,
        action: &Action,
        element: &ElementRef,
        post: Option<PostCondition>,
        mut outcome: InteractionOutcome,
    ) -> InteractionOutcome {
        outcome.element = Some(element.clone());

        if let Action::ToggleCheckbox(desired) = action {
            if let Ok(state) = self.page.state(element).await {
                if state.checked == *desired {
                    debug!(target_name = %outcome.target, desired, "checkbox already in desired state");
                    outcome.tier = Some(Tier::NoneNeeded);
                }
            }
        }

        if outcome.tier.is_none() {
            for tier in Tier::ESCALATION {
                match self.attempt(tier, action, element).await {
                    Ok(()) => {
                        outcome.tier = Some(tier);
                        break;
                    }
                    Err(e) => {
                        warn!(
                            target_name = %outcome.target,
                            action = %outcome.action,
                            %tier,
                            error = %e,
                            "tier failed, escalating"
                        );
                        outcome.failures.push(TierFailure {
                            tier,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        if outcome.tier.is_none() {
            outcome.status = OutcomeStatus::AllTiersFailed;
            return outcome;
        }

        let post = post.or_else(|| action.implicit_post_condition().map(PostCondition::OnTarget));
        if let Some(post) = post {
            outcome.post_condition = Some(post.to_string());
            let page = self.page;
            let reached = wait_until(&self.config.post_condition_options(), || {
                post.holds(page, element)
            })
            .await;
            if !reached {
                warn!(
                    target_name = %outcome.target,
                    action = %outcome.action,
                    expected = %post,
                    "post-condition not reached"
                );
                outcome.status = OutcomeStatus::PostConditionTimeout;
                return outcome;
            }
        }

        debug!(
            target_name = %outcome.target,
            action = %outcome.action,
            tier = ?outcome.tier,
            "interaction succeeded"
        );
        outcome
    }

    async fn attempt(&self, tier: Tier, action: &Action, el: &ElementRef) -> TenazResult<()> {
        let page = self.page;
        match tier {
            Tier::NoneNeeded => Ok(()),
            Tier::Primary | Tier::Forced => {
                let mode = if tier == Tier::Primary {
                    ClickMode::Standard
                } else {
                    ClickMode::Forced
                };
                match action {
                    Action::Click | Action::ToggleCheckbox(_) => page.click(el, mode).await,
                    Action::Fill(value) => page.fill(el, value, mode).await,
                    Action::SelectOption(value) => page.select_option(el, value, mode).await,
                }
            }
            Tier::Programmatic => match action {
                Action::Click => page.dispatch(el, DomEvent::Click).await,
                Action::Fill(value) | Action::SelectOption(value) => {
                    page.set_value(el, value).await?;
                    page.dispatch(el, DomEvent::Input).await?;
                    page.dispatch(el, DomEvent::Change).await
                }
                Action::ToggleCheckbox(desired) => {
                    page.set_checked(el, *desired).await?;
                    page.dispatch(el, DomEvent::Input).await?;
                    page.dispatch(el, DomEvent::Change).await
                }
            },
        }
    }
}
