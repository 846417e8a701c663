//! In-memory page backend.
//!
//! [`MockPage`] implements [`RemotePage`](crate::page::RemotePage) over a
//! small DOM arena so every strategy in the crate can be exercised without a
//! browser. It understands a CSS subset (tag, `#id`, `.class`, `[attr]`,
//! `[attr=v]`, `[attr*=v]`, descendant and `>` combinators, `,` groups),
//! implicit ARIA roles, innermost-text matching, and records every call.
//!
//! ```
//! use tenaz::mock::{MockNode, MockPage};
//!
//! let page = MockPage::new();
//! let table = page.append(page.root(), MockNode::new("table").class("users"));
//! let row = page.append(table, MockNode::new("tr"));
//! page.append(row, MockNode::new("td").text("Alice"));
//! assert!(page.history().is_empty());
//! ```

mod dom;
mod page;

pub use dom::{MockNode, NodeId};
pub use page::{ClickEffect, MockAction, MockPage};
