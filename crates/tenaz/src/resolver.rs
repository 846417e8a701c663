//! Locator Resolver
//!
//! Turns a [`LocatorSpec`] into a live element. One pass walks the candidates
//! in order; within a candidate, matches are taken in document order and the
//! first actionable one wins. A candidate whose matches are all hidden (or
//! disabled, when required) falls through to the next candidate. If a full
//! pass finds nothing, the pass is repeated on the poll interval until the
//! timeout.
//!
//! Absence is a return value ([`Resolution::NotFound`]), never an error: the
//! caller decides whether a missing element is fatal.

use crate::locator::{LocatorSpec, ResolvedElement};
use crate::page::{ElementRef, RemotePage};
use crate::result::{TenazError, TenazResult};
use crate::wait::{poll_for, PollOptions};
use tracing::debug;

/// What the resolver requires of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actionability {
    /// Still in the document
    Attached,
    /// Attached and visible
    Visible,
    /// Attached, visible and enabled
    VisibleAndEnabled,
}

impl Actionability {
    fn accepts(self, state: crate::page::ElementState) -> bool {
        match self {
            Self::Attached => state.attached,
            Self::Visible => state.is_actionable(false),
            Self::VisibleAndEnabled => state.is_actionable(true),
        }
    }
}

/// Outcome of [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A candidate matched
    Found(ResolvedElement),
    /// No candidate matched before the timeout
    NotFound {
        /// Logical target description
        target: String,
        /// Rendered candidate list
        candidates: String,
        /// Number of full passes
        attempts: u32,
    },
}

impl Resolution {
    /// The resolved element, if any
    #[must_use]
    pub fn found(self) -> Option<ResolvedElement> {
        match self {
            Self::Found(resolved) => Some(resolved),
            Self::NotFound { .. } => None,
        }
    }

    /// Whether something was found
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Convert absence into [`TenazError::NotFound`]
    pub fn into_result(self) -> TenazResult<ResolvedElement> {
        match self {
            Self::Found(resolved) => Ok(resolved),
            Self::NotFound {
                target,
                candidates,
                attempts,
            } => Err(TenazError::NotFound {
                action: "resolve".to_string(),
                target,
                candidates,
                attempts,
            }),
        }
    }
}

/// Resolve `spec`, polling until a candidate yields an element meeting `need`
pub async fn resolve<P: RemotePage + ?Sized>(
    page: &P,
    spec: &LocatorSpec,
    options: &PollOptions,
    need: Actionability,
) -> Resolution {
    let polled = poll_for(options, || resolve_once(page, spec, need)).await;
    match polled.value {
        Some(mut resolved) => {
            resolved.attempts = polled.attempts;
            Resolution::Found(resolved)
        }
        None => {
            debug!(
                target_name = spec.target(),
                attempts = polled.attempts,
                "locator did not resolve"
            );
            Resolution::NotFound {
                target: spec.target().to_string(),
                candidates: spec.describe_candidates(),
                attempts: polled.attempts,
            }
        }
    }
}

/// One resolution pass without waiting
pub async fn resolve_once<P: RemotePage + ?Sized>(
    page: &P,
    spec: &LocatorSpec,
    need: Actionability,
) -> Option<ResolvedElement> {
    for (index, candidate) in spec.candidates().iter().enumerate() {
        let matches = match page.query_all(candidate, spec.scope()).await {
            Ok(matches) => matches,
            Err(e) => {
                debug!(%candidate, error = %e, "candidate query failed");
                continue;
            }
        };
        if matches.is_empty() {
            continue;
        }
        for element in matches {
            if let Ok(state) = page.state(&element).await {
                if need.accepts(state) {
                    return Some(ResolvedElement {
                        element,
                        candidate_index: index,
                        candidate: candidate.to_string(),
                        attempts: 1,
                    });
                }
            }
        }
        debug!(%candidate, "candidate matched only non-actionable elements, falling through");
    }
    None
}

/// First attached element of the first candidate that has any
pub async fn first_attached<P: RemotePage + ?Sized>(
    page: &P,
    spec: &LocatorSpec,
) -> Option<ElementRef> {
    resolve_once(page, spec, Actionability::Attached)
        .await
        .map(|r| r.element)
}

/// All visible matches of the first candidate that has a visible match
pub async fn visible_matches<P: RemotePage + ?Sized>(
    page: &P,
    spec: &LocatorSpec,
) -> Vec<ElementRef> {
    for candidate in spec.candidates() {
        let Ok(matches) = page.query_all(candidate, spec.scope()).await else {
            continue;
        };
        let mut visible = Vec::new();
        for element in matches {
            if page.state(&element).await.is_ok_and(|s| s.is_actionable(false)) {
                visible.push(element);
            }
        }
        if !visible.is_empty() {
            return visible;
        }
    }
    Vec::new()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::{Candidate, TextMatch};
    use crate::mock::{MockNode, MockPage};
    use std::time::Duration;

    fn save_spec() -> LocatorSpec {
        LocatorSpec::new("save button", Candidate::test_id("save"))
            .or(Candidate::role_named("button", TextMatch::exact("Save")))
            .or(Candidate::text(TextMatch::contains("Save")))
    }

    mod ordering_tests {
        use super::*;

        #[tokio::test]
        async fn test_first_candidate_wins_when_it_matches() {
            let page = MockPage::new();
            page.append(page.root(), MockNode::new("button").text("Save"));
            page.append(
                page.root(),
                MockNode::new("button").attr("data-testid", "save").text("Save"),
            );
            let resolved = resolve(&page, &save_spec(), &PollOptions::once(), Actionability::Visible)
                .await
                .found()
                .unwrap();
            assert_eq!(resolved.candidate_index, 0);
            assert_eq!(
                page.attribute(&resolved.element, "data-testid").await.unwrap(),
                Some("save".into())
            );
        }

        #[tokio::test]
        async fn test_falls_through_on_zero_matches() {
            let page = MockPage::new();
            page.append(page.root(), MockNode::new("button").text("Save"));
            let resolved = resolve(&page, &save_spec(), &PollOptions::once(), Actionability::Visible)
                .await
                .found()
                .unwrap();
            assert_eq!(resolved.candidate_index, 1);
            assert_eq!(resolved.candidate, "role=button name=\"Save\"");
        }

        #[tokio::test]
        async fn test_falls_through_when_only_hidden_matches() {
            let page = MockPage::new();
            page.append(
                page.root(),
                MockNode::new("button").attr("data-testid", "save").hidden(),
            );
            page.append(page.root(), MockNode::new("button").text("Save"));
            let resolved = resolve(&page, &save_spec(), &PollOptions::once(), Actionability::Visible)
                .await
                .found()
                .unwrap();
            assert_eq!(resolved.candidate_index, 1);
        }

        #[tokio::test]
        async fn test_first_in_document_order() {
            let page = MockPage::new();
            let first = page.append(page.root(), MockNode::new("li").class("item").text("one"));
            page.append(page.root(), MockNode::new("li").class("item").text("two"));
            let spec = LocatorSpec::new("item", Candidate::marker("item"));
            let resolved = resolve(&page, &spec, &PollOptions::once(), Actionability::Visible)
                .await
                .found()
                .unwrap();
            assert_eq!(resolved.element, page.element(first));
        }

        #[tokio::test]
        async fn test_skips_hidden_sibling_within_candidate() {
            let page = MockPage::new();
            page.append(page.root(), MockNode::new("li").class("item").hidden());
            let second = page.append(page.root(), MockNode::new("li").class("item"));
            let spec = LocatorSpec::new("item", Candidate::marker("item"));
            let resolved = resolve_once(&page, &spec, Actionability::Visible).await.unwrap();
            assert_eq!(resolved.element, page.element(second));
            assert_eq!(resolved.candidate_index, 0);
        }

        #[tokio::test]
        async fn test_enabled_requirement() {
            let page = MockPage::new();
            page.append(page.root(), MockNode::new("button").text("Save").disabled());
            let spec = LocatorSpec::new("save", Candidate::tag_text("button", TextMatch::exact("Save")));
            assert!(resolve_once(&page, &spec, Actionability::Visible).await.is_some());
            assert!(resolve_once(&page, &spec, Actionability::VisibleAndEnabled)
                .await
                .is_none());
        }
    }

    mod scope_tests {
        use super::*;

        #[tokio::test]
        async fn test_scope_restricts_matches() {
            let page = MockPage::new();
            let row_a = page.append(page.root(), MockNode::new("tr"));
            page.append(row_a, MockNode::new("span").class("edit"));
            let row_b = page.append(page.root(), MockNode::new("tr"));
            let edit_b = page.append(row_b, MockNode::new("span").class("edit"));
            let spec =
                LocatorSpec::new("edit", Candidate::marker("edit")).scoped(page.element(row_b));
            let resolved = resolve_once(&page, &spec, Actionability::Visible).await.unwrap();
            assert_eq!(resolved.element, page.element(edit_b));
        }
    }

    mod timing_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_not_found_after_timeout() {
            let page = MockPage::new();
            let resolution = resolve(
                &page,
                &save_spec(),
                &PollOptions::new(200, 50),
                Actionability::Visible,
            )
            .await;
            match resolution {
                Resolution::NotFound {
                    target, attempts, ..
                } => {
                    assert_eq!(target, "save button");
                    assert_eq!(attempts, 5);
                }
                Resolution::Found(_) => panic!("nothing should resolve"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_resolves_after_async_render() {
            let page = MockPage::new();
            let btn = page.append(page.root(), MockNode::new("button").text("Save").hidden());
            page.show_after(btn, Duration::from_millis(130));
            let resolved = resolve(
                &page,
                &save_spec(),
                &PollOptions::new(1000, 50),
                Actionability::Visible,
            )
            .await
            .found()
            .unwrap();
            assert_eq!(resolved.attempts, 4);
        }

        #[tokio::test]
        async fn test_into_result_carries_context() {
            let page = MockPage::new();
            let err = resolve(&page, &save_spec(), &PollOptions::once(), Actionability::Visible)
                .await
                .into_result()
                .unwrap_err();
            match err {
                TenazError::NotFound {
                    candidates,
                    attempts,
                    ..
                } => {
                    assert!(candidates.contains("[2] text~\"Save\""));
                    assert_eq!(attempts, 1);
                }
                other => panic!("unexpected {other}"),
            }
        }
    }

    mod helper_tests {
        use super::*;

        #[tokio::test]
        async fn test_first_attached_ignores_visibility() {
            let page = MockPage::new();
            let input = page.append(
                page.root(),
                MockNode::new("input").attr("type", "checkbox").hidden(),
            );
            let spec = LocatorSpec::new("box", Candidate::css("input"));
            assert_eq!(first_attached(&page, &spec).await, Some(page.element(input)));
        }

        #[tokio::test]
        async fn test_visible_matches_skips_hidden() {
            let page = MockPage::new();
            page.append(page.root(), MockNode::new("div").class("pane"));
            page.append(page.root(), MockNode::new("div").class("pane").hidden());
            page.append(page.root(), MockNode::new("div").class("pane"));
            let spec = LocatorSpec::new("panes", Candidate::marker("pane"));
            assert_eq!(visible_matches(&page, &spec).await.len(), 2);
        }
    }
}
