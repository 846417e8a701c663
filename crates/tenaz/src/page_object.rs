//! Business-flow surface: [`Session`] and the [`PageObject`] trait.
//!
//! A `Session` binds one page to one configuration and exposes the operation
//! shapes page objects are written in (`is_visible`, `fill_field`,
//! `select_all_in`, `verify_record_in_table`, `perform_row_action`, ...).
//!
//! Error propagation is decided here:
//!
//! - Read-only operations never fail. A missing element, an ambiguous panel
//!   or a driver error reads as `false`/`None` and is logged at debug level.
//! - Mutating operations return [`TenazError`] carrying the action, the
//!   target and its candidate list.
//!
//! # Example
//!
//! ```ignore
//! struct CouponsPage {
//!     code: LocatorSpec,
//! }
//!
//! impl PageObject for CouponsPage {
//!     fn url_pattern(&self) -> &str {
//!         "/admin/coupons"
//!     }
//! }
//!
//! impl CouponsPage {
//!     async fn create(&self, session: &Session<'_, impl RemotePage>, code: &str) -> TenazResult<()> {
//!         session.fill_field(&self.code, code).await?;
//!         Ok(())
//!     }
//! }
//! ```

use crate::config::EngineConfig;
use crate::executor::{Action, Executor, InteractionOutcome, PostCondition};
use crate::locator::{normalize_whitespace, LocatorSpec};
use crate::overlay::{OverlayController, OverlayHandle, OverlayWidget, SelectAllReport};
use crate::page::{ElementRef, RemotePage, Screenshot};
use crate::resolver::{self, Actionability};
use crate::result::{TenazError, TenazResult};
use crate::router::{TableHandle, TableRouter};
use crate::table::{cell_texts, default_cell_candidate, RowExtractor, RowRecord};
use crate::wait::{poll_for, wait_until, PollOptions, WaitCondition};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

// =============================================================================
// PAGE OBJECTS
// =============================================================================

/// Trait for page objects representing a page of the application under test
pub trait PageObject {
    /// URL pattern that matches this page (e.g. `/users/:id`, `/reports/*`)
    fn url_pattern(&self) -> &str;

    /// Element whose visibility means the page is ready for interaction
    fn ready_marker(&self) -> Option<LocatorSpec> {
        None
    }

    /// Wait time for page load (in milliseconds)
    fn load_timeout_ms(&self) -> u64 {
        10_000
    }

    /// Page name for logging
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// URL pattern matcher for page objects
#[derive(Debug, Clone)]
pub struct UrlMatcher {
    pattern: String,
    segments: Vec<UrlSegment>,
}

#[derive(Debug, Clone)]
enum UrlSegment {
    Literal(String),
    Wildcard,
    Parameter(String),
}

/// Path component of a URL: scheme, host, query and fragment removed
#[must_use]
pub fn url_path(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = if url.contains("://") {
        without_scheme.find('/').map_or("", |i| &without_scheme[i..])
    } else {
        without_scheme
    };
    path.split(['?', '#']).next().unwrap_or_default()
}

impl UrlMatcher {
    /// Create a new URL matcher from a pattern
    ///
    /// Patterns support:
    /// - Literal segments: `/coupons`
    /// - Wildcards: `/reports/*`
    /// - Named parameters: `/users/:id`
    #[must_use]
    pub fn new(pattern: &str) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s == "*" {
                    UrlSegment::Wildcard
                } else if let Some(name) = s.strip_prefix(':') {
                    UrlSegment::Parameter(name.to_string())
                } else {
                    UrlSegment::Literal(s.to_string())
                }
            })
            .collect();

        Self {
            pattern: pattern.to_string(),
            segments,
        }
    }

    fn url_segments(url: &str) -> Vec<&str> {
        url_path(url).split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Check if a URL (absolute or path-only) matches the pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let url_segments = Self::url_segments(url);
        url_segments.len() == self.segments.len()
            && self
                .segments
                .iter()
                .zip(&url_segments)
                .all(|(segment, actual)| match segment {
                    UrlSegment::Literal(lit) => lit == actual,
                    UrlSegment::Wildcard | UrlSegment::Parameter(_) => true,
                })
    }

    /// Extract named parameters from a URL
    #[must_use]
    pub fn extract_params(&self, url: &str) -> HashMap<String, String> {
        self.segments
            .iter()
            .zip(Self::url_segments(url))
            .filter_map(|(segment, value)| match segment {
                UrlSegment::Parameter(name) => Some((name.clone(), value.to_string())),
                _ => None,
            })
            .collect()
    }

    /// Get the original pattern
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// One scenario's view of one page
#[derive(Debug, Clone)]
pub struct Session<'p, P: ?Sized> {
    page: &'p P,
    config: EngineConfig,
    router: TableRouter,
}

impl<'p, P: RemotePage + ?Sized> Session<'p, P> {
    /// Session with default configuration
    #[must_use]
    pub fn new(page: &'p P) -> Self {
        Self {
            page,
            config: EngineConfig::default(),
            router: TableRouter::new(),
        }
    }

    /// Replace the configuration
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the table router
    #[must_use]
    pub fn with_router(mut self, router: TableRouter) -> Self {
        self.router = router;
        self
    }

    /// Underlying page
    #[must_use]
    pub const fn page(&self) -> &'p P {
        self.page
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executor bound to this session
    #[must_use]
    pub fn executor(&self) -> Executor<'_, P> {
        Executor::new(self.page, &self.config)
    }

    /// Overlay controller for `widget`
    #[must_use]
    pub fn overlay<'a>(&'a self, widget: &'a OverlayWidget) -> OverlayController<'a, P> {
        OverlayController::new(self.page, &self.config, widget)
    }

    // =========================================================================
    // READ-ONLY
    // =========================================================================

    /// Whether `spec` resolves to a visible element within the resolve timeout
    pub async fn is_visible(&self, spec: &LocatorSpec) -> bool {
        self.is_visible_within(spec, &self.config.resolve_options())
            .await
    }

    /// Whether `spec` resolves to a visible element within `options`
    pub async fn is_visible_within(&self, spec: &LocatorSpec, options: &PollOptions) -> bool {
        resolver::resolve(self.page, spec, options, Actionability::Visible)
            .await
            .is_found()
    }

    /// Whether some row of the category's table matches every criterion
    pub async fn verify_record_in_table(&self, category: &str, criteria: &[&str]) -> bool {
        match self.find_row(category, criteria).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                debug!(category, ?criteria, "no matching row");
                false
            }
            Err(e) => {
                debug!(category, error = %e, "table lookup failed, treating as absent");
                false
            }
        }
    }

    /// Extract the row matching `identifier`
    pub async fn get_row_data(
        &self,
        category: &str,
        identifier: &str,
        schema: &RowExtractor,
    ) -> Option<RowRecord> {
        match self.read_row(category, identifier, schema).await {
            Ok(record) => record,
            Err(e) => {
                debug!(category, identifier, error = %e, "row read failed, treating as absent");
                None
            }
        }
    }

    async fn read_row(
        &self,
        category: &str,
        identifier: &str,
        schema: &RowExtractor,
    ) -> TenazResult<Option<RowRecord>> {
        let Some((table, row)) = self.find_row(category, &[identifier]).await? else {
            return Ok(None);
        };
        let headers = table.header_texts(self.page).await?;
        let extractor = schema.clone().with_headers(&headers);
        extractor.extract(self.page, &row).await.map(Some)
    }

    /// Resolve the category's table (fallback resolution is flagged, not raised)
    pub async fn resolve_table(&self, category: &str) -> TenazResult<TableHandle> {
        self.router
            .resolve_table(self.page, category, &self.config)
            .await
    }

    async fn find_row(
        &self,
        category: &str,
        criteria: &[&str],
    ) -> TenazResult<Option<(TableHandle, ElementRef)>> {
        if criteria.is_empty() {
            debug!(category, "no row criteria given, nothing can match");
            return Ok(None);
        }
        let policy = self.config.row_match;
        let cell = default_cell_candidate();
        let single_pass = self.config.clone().with_table_timeout(0);

        // waits for the first table to render; absence is an error here
        self.router
            .resolve_table(self.page, category, &self.config)
            .await?;

        let polled = poll_for(&self.config.table_options(), || async {
            let table = self
                .router
                .resolve_table(self.page, category, &single_pass)
                .await
                .ok()?;
            for row in &table.rows {
                let text = normalize_whitespace(&self.page.text(row).await.ok()?);
                let cells = cell_texts(self.page, row, &cell).await.ok()?;
                if criteria.iter().all(|c| policy.matches(c, &text, &cells)) {
                    let row = row.clone();
                    return Some((table, row));
                }
            }
            None
        })
        .await;
        Ok(polled.value)
    }

    // =========================================================================
    // MUTATING
    // =========================================================================

    /// Perform `action` on `spec`; non-success outcomes become errors
    pub async fn perform(
        &self,
        action: Action,
        spec: &LocatorSpec,
        post: Option<PostCondition>,
    ) -> TenazResult<InteractionOutcome> {
        self.executor()
            .perform(&action, spec, post)
            .await
            .into_result()
    }

    /// Click `spec`
    pub async fn click(&self, spec: &LocatorSpec) -> TenazResult<InteractionOutcome> {
        self.perform(Action::Click, spec, None).await
    }

    /// Replace the value of a field and verify it took
    pub async fn fill_field(&self, spec: &LocatorSpec, value: &str) -> TenazResult<InteractionOutcome> {
        self.perform(
            Action::Fill(value.to_string()),
            spec,
            Some(PostCondition::OnTarget(WaitCondition::ValueEquals(
                value.to_string(),
            ))),
        )
        .await
    }

    /// Choose an option of a native select by value or label
    pub async fn select_option(&self, spec: &LocatorSpec, value: &str) -> TenazResult<InteractionOutcome> {
        self.perform(Action::SelectOption(value.to_string()), spec, None)
            .await
    }

    /// Drive a checkbox to `checked`
    pub async fn set_checkbox(&self, spec: &LocatorSpec, checked: bool) -> TenazResult<InteractionOutcome> {
        self.perform(Action::ToggleCheckbox(checked), spec, None)
            .await
    }

    /// Open an overlay widget
    pub async fn open_overlay(&self, widget: &OverlayWidget) -> TenazResult<OverlayHandle> {
        self.overlay(widget).open().await
    }

    /// Open, select every option, confirm
    pub async fn select_all_in(&self, widget: &OverlayWidget) -> TenazResult<SelectAllReport> {
        let overlay = self.overlay(widget);
        let mut handle = overlay.open().await?;
        match overlay.select_all(&handle, true).await {
            Ok(report) => {
                overlay.confirm(&mut handle).await?;
                info!(widget = %widget.name, options = report.options, "selected all");
                Ok(report)
            }
            Err(e) => {
                if let Err(close_err) = overlay.cancel(&mut handle).await {
                    warn!(widget = %widget.name, error = %close_err, "could not close panel after failure");
                }
                Err(e)
            }
        }
    }

    /// Click a control inside the row matching `identifier`
    pub async fn perform_row_action(
        &self,
        category: &str,
        identifier: &str,
        control: &LocatorSpec,
    ) -> TenazResult<InteractionOutcome> {
        let Some((table, row)) = self.find_row(category, &[identifier]).await? else {
            return Err(TenazError::NotFound {
                action: "row_action".to_string(),
                target: format!("row '{identifier}' in {category} table"),
                candidates: format!("row text matching {:?}", self.config.row_match),
                attempts: 1,
            });
        };
        if table.fallback {
            debug!(category, "row action on fallback table");
        }
        let scoped = control.clone().scoped(row);
        self.perform(Action::Click, &scoped, None).await
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// Navigate and wait for the network to settle
    pub async fn navigate(&self, url: &str) -> TenazResult<()> {
        self.page
            .navigate(url)
            .await
            .map_err(|e| TenazError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let idle = Duration::from_millis(self.config.network_idle_timeout_ms);
        if let Err(e) = self.page.wait_for_network_idle(idle).await {
            debug!(url, error = %e, "network did not go idle, continuing");
        }
        Ok(())
    }

    /// Wait until the current URL matches the page object and its ready
    /// marker is visible
    pub async fn wait_until_loaded<O: PageObject + ?Sized>(&self, page_object: &O) -> TenazResult<()> {
        let matcher = UrlMatcher::new(page_object.url_pattern());
        let marker = page_object.ready_marker();
        let options = PollOptions::new(page_object.load_timeout_ms(), self.config.poll_interval_ms);
        let loaded = wait_until(&options, || async {
            let url_ok = self
                .page
                .current_url()
                .await
                .is_ok_and(|url| matcher.matches(&url));
            match &marker {
                Some(spec) if url_ok => WaitCondition::Visible.evaluate(self.page, spec).await,
                _ => url_ok,
            }
        })
        .await;
        if loaded {
            return Ok(());
        }
        let url = self.page.current_url().await.unwrap_or_default();
        Err(TenazError::Navigation {
            url,
            message: format!(
                "{} ({}) not loaded within {}ms",
                page_object.page_name(),
                page_object.url_pattern(),
                page_object.load_timeout_ms()
            ),
        })
    }

    /// Capture the page
    pub async fn screenshot(&self) -> TenazResult<Screenshot> {
        self.page.screenshot().await
    }
}
