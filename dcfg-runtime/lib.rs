//! Async orchestration over a remote document service.
//!
//! Three independent containers share one [`service::DocumentService`]:
//! the [`documents::DocumentStore`] mirrors loaded documents, the
//! [`session::EditSessionEngine`] drives the single open edit session and
//! [`search::LineSearch`] keeps the latest search results. A
//! [`workspace::Workspace`] wires them together.
//!
//! Every remote call is the only suspension point of its operation; local
//! state lives behind `parking_lot` locks that are never held across an
//! `.await`.

pub mod config;
pub mod documents;
mod preview;
pub mod search;
pub mod service;
pub mod session;
pub mod workspace;

pub use config::{
  ConfigLoadError,
  EngineConfig,
  ServiceConfig,
};
pub use documents::{
  DocumentStore,
  StoreError,
};
pub use search::LineSearch;
pub use service::{
  DocumentService,
  ServiceError,
};
pub use session::{
  CommitResult,
  EditSessionEngine,
  SessionError,
};
pub use workspace::Workspace;

/// Whether an async response was applied or dropped as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Applied,
  Discarded,
}

impl Outcome {
  pub fn is_applied(self) -> bool {
    self == Self::Applied
  }
}
