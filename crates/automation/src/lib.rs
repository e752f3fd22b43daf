//! Page-driven sign-up automation. A [`Controller`] watches one page
//! through the [`PageAccessor`] capability, classifies what step of the
//! flow it shows, and performs the matching fill-and-submit action.
//! Account data and verification codes come from a [`HostCoordinator`].

use thiserror::Error;

pub mod classify;
pub mod controller;
pub mod coordinator;
pub mod page;
pub mod selectors;
pub mod session;

pub use classify::{classify, page_id, PageKind};
pub use controller::Controller;
pub use coordinator::{CodeReply, HostCoordinator};
pub use page::{FakePage, PageAccessor};
pub use session::{FlowSession, TickState};

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("coordinator request failed: {0}")]
    Coordinator(String),
}
