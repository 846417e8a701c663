//! Tenaz: resilient element resolution and interaction for browser-driven
//! acceptance tests.
//!
//! Tenaz (Spanish: "tenacious") sits between business-level test steps
//! ("verify the partner table contains Alice", "select every coupon") and a
//! remote browser page. It absorbs the ways real applications make naive
//! automation flaky: markup that varies between builds, elements that render
//! late, controls covered by other controls, overlays appearing in portals,
//! tables whose number and order depend on the user's permissions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     TENAZ Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Session /  │    │ Strategy   │    │ RemotePage │            │
//! │   │ PageObject │───►│ components │───►│ (chromium  │            │
//! │   │            │    │            │    │  or mock)  │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │                                                                 │
//! │   Resolver → Poller → Executor → Overlay → Extractor → Router   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use tenaz::mock::{MockNode, MockPage};
//! use tenaz::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let page = MockPage::new();
//! page.append(page.root(), MockNode::new("button").text("Save"));
//!
//! let session = Session::new(&page);
//! let save = LocatorSpec::new("save button", Candidate::css("button.primary"))
//!     .or(Candidate::role_named("button", TextMatch::exact("Save")));
//! assert!(session.is_visible(&save).await);
//! session.click(&save).await.unwrap();
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod chromium;
pub mod config;
pub mod executor;
pub mod locator;
pub mod logging;
pub mod mock;
pub mod overlay;
pub mod page;
pub mod page_object;
pub mod resolver;
pub mod result;
pub mod router;
pub mod table;
pub mod wait;

pub use chromium::BrowserConfig;
#[cfg(feature = "browser")]
pub use chromium::{ChromiumBrowser, ChromiumPage};
pub use config::{EngineConfig, MatchPolicy};
pub use executor::{
    Action, Executor, InteractionOutcome, OutcomeStatus, PostCondition, Tier, TierFailure,
};
pub use locator::{Candidate, LocatorSpec, ResolvedElement, TextMatch};
pub use overlay::{
    OverlayController, OverlayHandle, OverlayOption, OverlayWidget, PanelState, SelectAllReport,
};
pub use page::{ClickMode, DomEvent, ElementRef, ElementState, RemotePage, Screenshot};
pub use page_object::{PageObject, Session, UrlMatcher};
pub use resolver::{Actionability, Resolution};
pub use result::{TenazError, TenazResult};
pub use router::{TableHandle, TableRouter};
pub use table::{FieldSpec, FieldValue, Plausibility, Provenance, RowExtractor, RowRecord};
pub use wait::{PollOptions, WaitCondition, WaitResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::config::*;
    pub use super::executor::*;
    pub use super::locator::*;
    pub use super::overlay::*;
    pub use super::page::*;
    pub use super::page_object::*;
    pub use super::resolver::{Actionability, Resolution};
    pub use super::result::*;
    pub use super::router::*;
    pub use super::table::*;
    pub use super::wait::{PollOptions, WaitCondition, WaitResult};
}
