//! RemotePage - the primitive page capability the engine is built on.
//!
//! Everything above this trait is strategy: which element to pick, which
//! mechanism to try next, when to stop waiting. Everything below it is a
//! browser driver.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Session / page objects                                       │
//! ├───────────────────────────────────────────────────────────────┤
//! │  Resolver · Poller · Executor · Overlay · Extractor · Router  │
//! ├───────────────────────────────────────────────────────────────┤
//! │  RemotePage (this trait)                                      │
//! │   ┌──────────────────────┐      ┌──────────────────────┐      │
//! │   │  ChromiumPage        │      │  MockPage            │      │
//! │   │  (feature "browser") │      │  (in-memory DOM)     │      │
//! │   └──────────────────────┘      └──────────────────────┘      │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use crate::locator::Candidate;
use crate::result::TenazResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque handle to a DOM node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    /// Backend-assigned identifier
    pub id: String,
    /// Element tag name (lowercase)
    pub tag_name: String,
}

impl ElementRef {
    /// Create a new element reference
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
        }
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}#{}>", self.tag_name, self.id)
    }
}

/// Point-in-time state of an element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Still in the document
    pub attached: bool,
    /// Rendered with a non-empty box and not hidden by style
    pub visible: bool,
    /// Not disabled (native or aria-disabled)
    pub enabled: bool,
    /// Checked (native checkbox or aria-checked)
    pub checked: bool,
    /// Selected (native option or aria-selected)
    pub selected: bool,
}

impl ElementState {
    /// State reported for a handle that no longer resolves
    pub const DETACHED: Self = Self {
        attached: false,
        visible: false,
        enabled: false,
        checked: false,
        selected: false,
    };

    /// Whether an interaction may target this element
    #[must_use]
    pub const fn is_actionable(&self, require_enabled: bool) -> bool {
        self.attached && self.visible && (self.enabled || !require_enabled)
    }

    /// Checked-or-selected, for controls that express either
    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.checked || self.selected
    }
}

/// How aggressively a native action is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClickMode {
    /// Honour actionability checks (obstruction, scrolling)
    Standard,
    /// Skip actionability checks
    Forced,
}

impl fmt::Display for ClickMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Forced => write!(f, "forced"),
        }
    }
}

/// Synthetic DOM events for programmatic interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomEvent {
    /// `input`
    Input,
    /// `change`
    Change,
    /// `click`
    Click,
}

impl DomEvent {
    /// DOM event name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Change => "change",
            Self::Click => "click",
        }
    }
}

/// Screenshot data with metadata
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Raw PNG data
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Timestamp when screenshot was taken
    pub timestamp: std::time::SystemTime,
}

impl Screenshot {
    /// Create a new screenshot
    #[must_use]
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: std::time::SystemTime::now(),
        }
    }

    /// Check if screenshot is valid (has data)
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && self.width > 0 && self.height > 0
    }
}

/// Abstract page capability.
///
/// Implementations must return `query_all` results in document order and must
/// treat `fill` as clear-then-set. Every method takes `&self`: a page is owned
/// by exactly one scenario, which borrows it into each component it drives.
#[async_trait]
pub trait RemotePage: Send + Sync {
    /// All elements matching `candidate`, in document order, optionally
    /// restricted to descendants of `scope`
    async fn query_all(
        &self,
        candidate: &Candidate,
        scope: Option<&ElementRef>,
    ) -> TenazResult<Vec<ElementRef>>;

    /// Current state; detached handles report [`ElementState::DETACHED`]
    async fn state(&self, element: &ElementRef) -> TenazResult<ElementState>;

    /// Rendered text
    async fn text(&self, element: &ElementRef) -> TenazResult<String>;

    /// Attribute value
    async fn attribute(&self, element: &ElementRef, name: &str) -> TenazResult<Option<String>>;

    /// Current form value
    async fn value(&self, element: &ElementRef) -> TenazResult<String>;

    /// Parent element
    async fn parent(&self, element: &ElementRef) -> TenazResult<Option<ElementRef>>;

    /// Next element sibling
    async fn next_sibling(&self, element: &ElementRef) -> TenazResult<Option<ElementRef>>;

    /// Whether `element` comes after `reference` in document order
    async fn follows(&self, element: &ElementRef, reference: &ElementRef) -> TenazResult<bool>;

    /// Native click
    async fn click(&self, element: &ElementRef, mode: ClickMode) -> TenazResult<()>;

    /// Native typing; replaces any existing value
    async fn fill(&self, element: &ElementRef, value: &str, mode: ClickMode) -> TenazResult<()>;

    /// Native option selection by value or label
    async fn select_option(
        &self,
        element: &ElementRef,
        value: &str,
        mode: ClickMode,
    ) -> TenazResult<()>;

    /// Write the value property directly
    async fn set_value(&self, element: &ElementRef, value: &str) -> TenazResult<()>;

    /// Write the checked property directly
    async fn set_checked(&self, element: &ElementRef, checked: bool) -> TenazResult<()>;

    /// Dispatch a synthetic event
    async fn dispatch(&self, element: &ElementRef, event: DomEvent) -> TenazResult<()>;

    /// Press a key on the focused element (e.g. "Escape")
    async fn press_key(&self, key: &str) -> TenazResult<()>;

    /// Navigate to URL
    async fn navigate(&self, url: &str) -> TenazResult<()>;

    /// Get current URL
    async fn current_url(&self) -> TenazResult<String>;

    /// Wait until no network requests are in flight
    async fn wait_for_network_idle(&self, timeout: Duration) -> TenazResult<()>;

    /// Take screenshot
    async fn screenshot(&self) -> TenazResult<Screenshot>;
}
