//! Request and response payloads exchanged with the document service.

use std::collections::BTreeMap;

use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;

use crate::{
  document::{
    DocType,
    DocumentId,
  },
  line::LineStatus,
  position::Position,
  session::AfFields,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
  pub doc_id:        DocumentId,
  pub doc_type:      DocType,
  #[serde(default)]
  pub file_path:     String,
  #[serde(default)]
  pub total_lines:   usize,
  #[serde(default)]
  pub status_counts: BTreeMap<String, usize>,
  #[serde(default)]
  pub can_undo:      bool,
  #[serde(default)]
  pub can_redo:      bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryState {
  #[serde(default)]
  pub can_undo: bool,
  #[serde(default)]
  pub can_redo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
  pub file_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hydrated {
  pub position: Position,
  pub doc_type: DocType,
  #[serde(default)]
  pub data:     Value,
}

impl Hydrated {
  /// Decode the data of an AF line. A line without data yields blank fields.
  pub fn af_fields(&self) -> Result<AfFields, serde_json::Error> {
    if self.data.is_null() {
      return Ok(AfFields::default());
    }
    serde_json::from_value(self.data.clone())
  }
}

/// Result of a commit. Any reported error means the commit was rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
  #[serde(default)]
  pub errors:   Vec<String>,
  #[serde(default)]
  pub warnings: Vec<String>,
}

impl CommitOutcome {
  pub fn is_accepted(&self) -> bool {
    self.errors.is_empty()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
  pub query:         String,
  #[serde(default)]
  pub use_regex:     bool,
  #[serde(default)]
  pub status_filter: Option<LineStatus>,
}

impl SearchQuery {
  pub fn text(query: impl Into<String>) -> Self {
    Self {
      query: query.into(),
      ..Self::default()
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetQuery {
  #[serde(default)]
  pub template:       Option<String>,
  pub net_pattern:    String,
  #[serde(default)]
  pub template_regex: bool,
  #[serde(default)]
  pub net_regex:      bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetMatches {
  #[serde(default)]
  pub nets:      Vec<String>,
  #[serde(default)]
  pub templates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutexEntryRequest {
  pub template:    Option<String>,
  pub net_pattern: String,
  pub is_regex:    bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutexActiveRequest {
  pub template: Option<String>,
  pub net_name: String,
}
