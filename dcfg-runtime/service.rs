//! The remote document service the runtime talks to.
//!
//! The service owns parsing, validation, undo history and conflict
//! detection. Clients only ever see its responses; implementations exist for
//! HTTP (`dcfg-client`) and in memory for tests.

use async_trait::async_trait;
use dcfg_lib::{
  DocType,
  DocumentId,
  Line,
  Position,
  protocol::{
    CommitOutcome,
    HistoryState,
    Hydrated,
    MutexActiveRequest,
    MutexEntryRequest,
    NetMatches,
    NetQuery,
    SaveOutcome,
    SearchQuery,
    Summary,
  },
  session::{
    FevMode,
    MutexSession,
  },
};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
  #[error("not found: {0}")]
  NotFound(String),
  #[error("{detail}")]
  Rejected { status: u16, detail: String },
  #[error("document service unreachable: {0}")]
  Transport(String),
  #[error("unexpected response from document service: {0}")]
  Decode(String),
}

impl ServiceError {
  pub fn rejected(detail: impl Into<String>) -> Self {
    Self::Rejected {
      status: 422,
      detail: detail.into(),
    }
  }

  /// Human readable detail without the category prefix.
  pub fn detail(&self) -> &str {
    match self {
      Self::NotFound(detail)
      | Self::Rejected { detail, .. }
      | Self::Transport(detail)
      | Self::Decode(detail) => detail,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound(_))
  }
}

impl From<serde_json::Error> for ServiceError {
  fn from(err: serde_json::Error) -> Self {
    Self::Decode(err.to_string())
  }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[async_trait]
pub trait DocumentService: Send + Sync + 'static {
  async fn load_document(
    &self,
    doc_id: &DocumentId,
    file_path: &str,
    doc_type: DocType,
  ) -> Result<Summary>;

  async fn list_documents(&self) -> Result<Vec<Summary>>;

  async fn close_document(&self, doc_id: &DocumentId) -> Result<()>;

  /// Persist to `file_path`, or to the path the document was loaded from.
  async fn save_document(&self, doc_id: &DocumentId, file_path: Option<&str>)
  -> Result<SaveOutcome>;

  /// Lines starting at `offset`; all remaining lines when `limit` is `None`.
  async fn get_lines(
    &self,
    doc_id: &DocumentId,
    offset: usize,
    limit: Option<usize>,
  ) -> Result<Vec<Line>>;

  async fn search_lines(&self, doc_id: &DocumentId, query: &SearchQuery) -> Result<Vec<Line>>;

  async fn delete_line(&self, doc_id: &DocumentId, position: Position) -> Result<()>;

  /// Insert a blank line at `position`.
  async fn insert_line(&self, doc_id: &DocumentId, position: Position) -> Result<()>;

  async fn toggle_comment(&self, doc_id: &DocumentId, position: Position) -> Result<()>;

  async fn swap_lines(&self, doc_id: &DocumentId, a: Position, b: Position) -> Result<()>;

  async fn edit_comment_text(
    &self,
    doc_id: &DocumentId,
    position: Position,
    text: &str,
  ) -> Result<()>;

  async fn undo(&self, doc_id: &DocumentId) -> Result<HistoryState>;

  async fn redo(&self, doc_id: &DocumentId) -> Result<HistoryState>;

  /// Start or refresh the edit session of a line. `fields` carries the
  /// client's draft; without it the line's current data is returned.
  async fn hydrate_session(
    &self,
    doc_id: &DocumentId,
    position: Position,
    fields: Option<Value>,
  ) -> Result<Hydrated>;

  async fn commit_edit(&self, doc_id: &DocumentId, position: Position) -> Result<CommitOutcome>;

  async fn get_mutex_session(&self, doc_id: &DocumentId, position: Position)
  -> Result<MutexSession>;

  async fn mutex_add_mutexed(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexEntryRequest,
  ) -> Result<MutexSession>;

  async fn mutex_remove_mutexed(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexEntryRequest,
  ) -> Result<MutexSession>;

  async fn mutex_add_active(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexActiveRequest,
  ) -> Result<MutexSession>;

  async fn mutex_remove_active(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexActiveRequest,
  ) -> Result<MutexSession>;

  async fn mutex_set_fev(
    &self,
    doc_id: &DocumentId,
    position: Position,
    fev: FevMode,
  ) -> Result<MutexSession>;

  async fn mutex_set_num_active(
    &self,
    doc_id: &DocumentId,
    position: Position,
    num_active: u32,
  ) -> Result<MutexSession>;

  async fn query_nets(&self, query: &NetQuery) -> Result<NetMatches>;
}
