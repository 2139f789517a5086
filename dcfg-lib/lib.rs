//! Pure state for editing line-oriented configuration documents.
//!
//! Nothing in this crate performs IO. Documents, sessions and the derived
//! problem views evolve from explicit inputs so that the async layer in
//! `dcfg-runtime` can stay a thin orchestration shell.

pub mod document;
pub mod line;
pub mod position;
pub mod problems;
pub mod protocol;
pub mod session;

pub use document::{
  DocType,
  Document,
  DocumentError,
  DocumentId,
};
pub use line::{
  ConflictInfo,
  ConflictPeer,
  Line,
  LineStatus,
  StatusCounts,
};
pub use position::{
  Position,
  StructuralEdit,
};
