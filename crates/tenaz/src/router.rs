//! Role-Scoped Table Router
//!
//! Finds the table that belongs to a logical category on pages that render
//! zero, one or several segmented tables depending on the user's
//! permissions.
//!
//! Strategy:
//!
//! 1. Wait until any table-like structure has rendered
//! 2. Find the category's section marker (heading by default)
//! 3. Search the marker's parent, then grandparent, for the first table that
//!    follows the marker in document order
//! 4. Otherwise fall back to the first table on the page and flag the handle
//!    as a fallback resolution
//!
//! A fallback is never an error; callers in strict contexts assert on
//! [`TableHandle::fallback`].

use crate::config::EngineConfig;
use crate::locator::{Candidate, LocatorSpec, TextMatch};
use crate::page::{ElementRef, RemotePage};
use crate::resolver::{self, Actionability};
use crate::result::{TenazError, TenazResult};
use crate::wait::{wait_for_condition, WaitCondition};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A resolved table for one category.
///
/// Re-resolve rather than keep: the app can rebuild the table between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    /// Category requested
    pub category: String,
    /// Table root element
    pub root: ElementRef,
    /// Data rows in document order
    pub rows: Vec<ElementRef>,
    /// Column header cells in document order
    pub headers: Vec<ElementRef>,
    /// Whether the table was found only via the first-table fallback
    pub fallback: bool,
    /// Marker candidate that located the section, if any
    pub marker: Option<String>,
}

impl TableHandle {
    /// Whether the result is a lower-confidence fallback
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Normalized header texts
    pub async fn header_texts<P: RemotePage + ?Sized>(&self, page: &P) -> TenazResult<Vec<String>> {
        let mut out = Vec::with_capacity(self.headers.len());
        for header in &self.headers {
            out.push(crate::locator::normalize_whitespace(&page.text(header).await?));
        }
        Ok(out)
    }
}

/// Routes categories to tables
#[derive(Debug, Clone)]
pub struct TableRouter {
    routes: BTreeMap<String, Vec<Candidate>>,
    table: Candidate,
    row: Candidate,
    data_cell: Candidate,
    header: Candidate,
}

impl Default for TableRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl TableRouter {
    /// Router with default table, row and header shapes
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: BTreeMap::new(),
            table: Candidate::css("table, [role=table], [role=grid]"),
            row: Candidate::css("tr, [role=row]"),
            data_cell: Candidate::css("td, [role=cell], [role=gridcell]"),
            header: Candidate::css("th, [role=columnheader]"),
        }
    }

    /// Register section markers for a category, most specific first
    #[must_use]
    pub fn route(mut self, category: impl Into<String>, markers: Vec<Candidate>) -> Self {
        let _ = self.routes.insert(category.into(), markers);
        self
    }

    /// Override the table shape
    #[must_use]
    pub fn with_table(mut self, table: Candidate) -> Self {
        self.table = table;
        self
    }

    /// Override the row shape
    #[must_use]
    pub fn with_rows(mut self, row: Candidate) -> Self {
        self.row = row;
        self
    }

    /// Override the header shape
    #[must_use]
    pub fn with_headers(mut self, header: Candidate) -> Self {
        self.header = header;
        self
    }

    /// Markers for a category: registered ones, else a heading naming it
    #[must_use]
    pub fn markers_for(&self, category: &str) -> Vec<Candidate> {
        self.routes.get(category).cloned().unwrap_or_else(|| {
            vec![Candidate::role_named("heading", TextMatch::contains(category))]
        })
    }

    fn any_table(&self) -> LocatorSpec {
        LocatorSpec::new("table", self.table.clone())
    }

    /// Resolve the table for `category`
    pub async fn resolve_table<P: RemotePage + ?Sized>(
        &self,
        page: &P,
        category: &str,
        config: &EngineConfig,
    ) -> TenazResult<TableHandle> {
        let tables = self.any_table();
        let rendered = wait_for_condition(
            page,
            &tables,
            &WaitCondition::Visible,
            &config.table_options(),
        )
        .await;
        if !rendered.success {
            return Err(TenazError::NotFound {
                action: "resolve_table".to_string(),
                target: format!("{category} table"),
                candidates: tables.describe_candidates(),
                attempts: rendered.attempts,
            });
        }

        if let Some((root, marker)) = self.near_marker(page, category).await? {
            debug!(category, %root, %marker, "table resolved via section marker");
            return self.handle(page, category, root, false, Some(marker)).await;
        }

        let first = resolver::resolve_once(page, &tables, Actionability::Visible)
            .await
            .map(|r| r.element)
            .ok_or_else(|| TenazError::NotFound {
                action: "resolve_table".to_string(),
                target: format!("{category} table"),
                candidates: tables.describe_candidates(),
                attempts: 1,
            })?;
        warn!(category, table = %first, "no section for category, using first table on page");
        self.handle(page, category, first, true, None).await
    }

    async fn near_marker<P: RemotePage + ?Sized>(
        &self,
        page: &P,
        category: &str,
    ) -> TenazResult<Option<(ElementRef, String)>> {
        for candidate in self.markers_for(category) {
            let spec = LocatorSpec::new(format!("{category} section"), candidate.clone());
            let Some(marker) = resolver::resolve_once(page, &spec, Actionability::Visible).await
            else {
                continue;
            };
            let parent = page.parent(&marker.element).await?;
            let grandparent = match &parent {
                Some(p) => page.parent(p).await?,
                None => None,
            };
            for scope in [parent, grandparent].into_iter().flatten() {
                if let Some(table) = self.following_table(page, &scope, &marker.element).await? {
                    return Ok(Some((table, candidate.to_string())));
                }
            }
            debug!(category, %candidate, "marker found but no table follows it");
        }
        Ok(None)
    }

    async fn following_table<P: RemotePage + ?Sized>(
        &self,
        page: &P,
        scope: &ElementRef,
        marker: &ElementRef,
    ) -> TenazResult<Option<ElementRef>> {
        for table in page.query_all(&self.table, Some(scope)).await? {
            if page.follows(&table, marker).await? && page.state(&table).await?.is_actionable(false)
            {
                return Ok(Some(table));
            }
        }
        Ok(None)
    }

    async fn handle<P: RemotePage + ?Sized>(
        &self,
        page: &P,
        category: &str,
        root: ElementRef,
        fallback: bool,
        marker: Option<String>,
    ) -> TenazResult<TableHandle> {
        let mut rows = Vec::new();
        for row in page.query_all(&self.row, Some(&root)).await? {
            if !page.query_all(&self.data_cell, Some(&row)).await?.is_empty() {
                rows.push(row);
            }
        }
        let headers = page.query_all(&self.header, Some(&root)).await?;
        Ok(TableHandle {
            category: category.to_string(),
            root,
            rows,
            headers,
            fallback,
            marker,
        })
    }
}
