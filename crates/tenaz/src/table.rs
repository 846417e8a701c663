//! Tabular Data Extractor
//!
//! Reads one row into a [`RowRecord`] using a per-field strategy chain:
//!
//! 1. Fixed cell position (or the position of a named header)
//! 2. Labeled region: an element carrying the label, then its adjacent value
//! 3. Pattern over the full row text
//!
//! The first strategy yielding a non-empty, *plausible* value wins. An
//! implausible value (a status where an email belongs, after a column shift)
//! falls through to the next strategy instead of being accepted.

use crate::config::MatchPolicy;
use crate::locator::{normalize_whitespace, Candidate, TextMatch};
use crate::page::{ElementRef, RemotePage};
use crate::result::{TenazError, TenazResult};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use tracing::debug;

// =============================================================================
// FIELD SCHEMA
// =============================================================================

/// Field-specific sanity check applied to every extracted value
#[derive(Debug, Clone)]
pub enum Plausibility {
    /// Any non-empty value
    NonEmpty,
    /// Looks like an email address
    Email,
    /// Contains at least this many digits and nothing but digits and phone punctuation
    Digits(usize),
    /// One of a closed set (case-insensitive)
    OneOf(Vec<String>),
    /// Matches a regex
    Pattern(Regex),
}

impl Plausibility {
    /// Check a candidate value
    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        match self {
            Self::NonEmpty => true,
            Self::Email => {
                let Some((local, domain)) = value.split_once('@') else {
                    return false;
                };
                !local.is_empty()
                    && !local.contains(char::is_whitespace)
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !domain.contains(['@', ' '])
            }
            Self::Digits(min) => {
                value.chars().filter(char::is_ascii_digit).count() >= *min
                    && value
                        .chars()
                        .all(|c| c.is_ascii_digit() || " +-().".contains(c))
            }
            Self::OneOf(allowed) => allowed.iter().any(|a| a.eq_ignore_ascii_case(value)),
            Self::Pattern(re) => re.is_match(value),
        }
    }
}

/// How to extract one field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    cell_index: Option<usize>,
    header: Option<String>,
    label: Option<String>,
    pattern: Option<Regex>,
    plausibility: Plausibility,
}

impl FieldSpec {
    /// New field with no strategies yet
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell_index: None,
            header: None,
            label: None,
            pattern: None,
            plausibility: Plausibility::NonEmpty,
        }
    }

    /// Fixed zero-based cell position
    #[must_use]
    pub const fn cell(mut self, index: usize) -> Self {
        self.cell_index = Some(index);
        self
    }

    /// Header text whose column position overrides the fixed cell position
    #[must_use]
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Label to search for inside the row
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Pattern applied to the full row text; capture group 1 wins if present
    pub fn pattern(mut self, pattern: &str) -> TenazResult<Self> {
        let re = Regex::new(pattern).map_err(|e| TenazError::InvalidLocator {
            message: format!("field '{}': invalid pattern: {e}", self.name),
        })?;
        self.pattern = Some(re);
        Ok(self)
    }

    /// Plausibility check
    #[must_use]
    pub fn plausible(mut self, check: Plausibility) -> Self {
        self.plausibility = check;
        self
    }

    /// Field name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn has_strategy(&self) -> bool {
        self.cell_index.is_some()
            || self.header.is_some()
            || self.label.is_some()
            || self.pattern.is_some()
    }

    fn label_matcher(&self) -> Option<TextMatch> {
        let label = self.label.as_ref()?;
        let escaped = regex::escape(&normalize_whitespace(label));
        TextMatch::pattern(&format!(r"(?i)^\s*{escaped}\s*:?\s*$")).ok()
    }
}

// =============================================================================
// ROW RECORD
// =============================================================================

/// Which strategy produced a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Cell at this position
    CellPosition(usize),
    /// Value adjacent to a label
    LabeledRegion,
    /// Pattern over the full row text
    PatternMatch,
    /// Nothing plausible was found
    None,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CellPosition(i) => write!(f, "cell[{i}]"),
            Self::LabeledRegion => write!(f, "label"),
            Self::PatternMatch => write!(f, "pattern"),
            Self::None => write!(f, "none"),
        }
    }
}

/// One extracted field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    /// Field name
    pub name: String,
    /// Extracted value, empty when nothing plausible was found
    pub value: String,
    /// Strategy that produced it
    pub provenance: Provenance,
}

/// Values extracted from one row, in schema order.
///
/// Every declared field has an entry. Created fresh on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowRecord {
    fields: Vec<FieldValue>,
    raw_text: String,
}

impl RowRecord {
    /// Value of a field
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value.as_str())
    }

    /// Provenance of a field
    #[must_use]
    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        self.field(name).map(|f| f.provenance)
    }

    /// Full field entry
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// All fields in schema order
    #[must_use]
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Whole-row text snapshot
    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Whether every field produced a value
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fields.iter().all(|f| f.provenance != Provenance::None)
    }
}

// =============================================================================
// EXTRACTOR
// =============================================================================

/// Default shape of a cell inside a row
#[must_use]
pub fn default_cell_candidate() -> Candidate {
    Candidate::css("td, th, [role=cell], [role=gridcell]")
}

/// Normalized text of each `cell` match inside `row`
pub async fn cell_texts<P: RemotePage + ?Sized>(
    page: &P,
    row: &ElementRef,
    cell: &Candidate,
) -> TenazResult<Vec<String>> {
    let mut out = Vec::new();
    for el in page.query_all(cell, Some(row)).await? {
        out.push(normalize_whitespace(&page.text(&el).await?));
    }
    Ok(out)
}

/// Extracts [`RowRecord`]s for one field schema
#[derive(Debug, Clone)]
pub struct RowExtractor {
    fields: Vec<FieldSpec>,
    header_positions: Vec<Option<usize>>,
    cell: Candidate,
}

impl RowExtractor {
    /// Create an extractor
    ///
    /// # Errors
    ///
    /// Returns `Config` if a field declares no strategy at all
    pub fn new(fields: Vec<FieldSpec>) -> TenazResult<Self> {
        if let Some(bad) = fields.iter().find(|f| !f.has_strategy()) {
            return Err(TenazError::Config {
                message: format!(
                    "field '{}' needs a cell index, header, label or pattern",
                    bad.name
                ),
            });
        }
        let header_positions = vec![None; fields.len()];
        Ok(Self {
            fields,
            header_positions,
            cell: default_cell_candidate(),
        })
    }

    /// Override the cell shape
    #[must_use]
    pub fn with_cell(mut self, cell: Candidate) -> Self {
        self.cell = cell;
        self
    }

    /// Map each field's declared header to its column position
    #[must_use]
    pub fn with_headers(mut self, headers: &[String]) -> Self {
        self.header_positions = self
            .fields
            .iter()
            .map(|f| {
                let wanted = TextMatch::exact(f.header.as_deref()?);
                headers.iter().position(|h| wanted.matches(h))
            })
            .collect();
        self
    }

    /// Declared fields
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Normalized text of each cell of a row
    pub async fn cells<P: RemotePage + ?Sized>(
        &self,
        page: &P,
        row: &ElementRef,
    ) -> TenazResult<Vec<String>> {
        cell_texts(page, row, &self.cell).await
    }

    /// First row matching `identifier` under `policy`
    pub async fn find_row<P: RemotePage + ?Sized>(
        &self,
        page: &P,
        rows: &[ElementRef],
        identifier: &str,
        policy: &MatchPolicy,
    ) -> TenazResult<Option<ElementRef>> {
        for row in rows {
            let text = normalize_whitespace(&page.text(row).await?);
            let cells = self.cells(page, row).await?;
            if policy.matches(identifier, &text, &cells) {
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }

    /// Extract every declared field from `row`
    pub async fn extract<P: RemotePage + ?Sized>(
        &self,
        page: &P,
        row: &ElementRef,
    ) -> TenazResult<RowRecord> {
        let raw_text = normalize_whitespace(&page.text(row).await?);
        let cells = self.cells(page, row).await?;
        let mut fields = Vec::with_capacity(self.fields.len());
        for (field, header_pos) in self.fields.iter().zip(&self.header_positions) {
            let (value, provenance) = self
                .extract_field(page, row, field, *header_pos, &cells, &raw_text)
                .await;
            if provenance == Provenance::None {
                debug!(field = %field.name, "no strategy produced a plausible value");
            }
            fields.push(FieldValue {
                name: field.name.clone(),
                value,
                provenance,
            });
        }
        Ok(RowRecord { fields, raw_text })
    }

    async fn extract_field<P: RemotePage + ?Sized>(
        &self,
        page: &P,
        row: &ElementRef,
        field: &FieldSpec,
        header_pos: Option<usize>,
        cells: &[String],
        raw_text: &str,
    ) -> (String, Provenance) {
        let check = &field.plausibility;

        if let Some(index) = header_pos.or(field.cell_index) {
            if let Some(value) = cells.get(index) {
                if check.accepts(value) {
                    return (value.trim().to_string(), Provenance::CellPosition(index));
                }
                debug!(field = %field.name, index, value = %value, "cell value implausible, falling through");
            }
        }

        if let Some(matcher) = field.label_matcher() {
            if let Some(value) = labeled_value(page, row, matcher).await {
                if check.accepts(&value) {
                    return (value, Provenance::LabeledRegion);
                }
                debug!(field = %field.name, value = %value, "labeled value implausible, falling through");
            }
        }

        if let Some(re) = &field.pattern {
            if let Some(value) = first_plausible_match(re, raw_text, check) {
                return (value, Provenance::PatternMatch);
            }
        }

        (String::new(), Provenance::None)
    }
}

/// Text of the element adjacent to the innermost element whose text is the label
async fn labeled_value<P: RemotePage + ?Sized>(
    page: &P,
    row: &ElementRef,
    matcher: TextMatch,
) -> Option<String> {
    let labels = page
        .query_all(&Candidate::text(matcher), Some(row))
        .await
        .ok()?;
    for label in labels {
        let adjacent = match page.next_sibling(&label).await.ok()? {
            Some(sibling) => Some(sibling),
            None => match page.parent(&label).await.ok()? {
                Some(parent) if parent != *row => page.next_sibling(&parent).await.ok()?,
                _ => None,
            },
        };
        if let Some(el) = adjacent {
            let text = normalize_whitespace(&page.text(&el).await.ok()?);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn first_plausible_match(re: &Regex, text: &str, check: &Plausibility) -> Option<String> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
        .map(|m| m.as_str().trim().to_string())
        .find(|v| check.accepts(v))
}
