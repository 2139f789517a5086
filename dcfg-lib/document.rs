//! Client-side mirror of one loaded document.
//!
//! The service owns the authoritative lines; a [`Document`] only ever holds
//! a complete, freshly fetched snapshot of them. Lines are replaced
//! wholesale after every mutation and never patched one by one, which keeps
//! positions, status counts and the selection consistent with each other.

use std::{
  fmt,
  str::FromStr,
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

use crate::{
  line::{
    Line,
    StatusCounts,
  },
  position::Position,
  protocol::Summary,
};

/// Caller-chosen identifier of a loaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for DocumentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for DocumentId {
  fn from(id: &str) -> Self {
    Self::new(id)
  }
}

impl From<String> for DocumentId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
  Af,
  Mutex,
}

impl DocType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Af => "af",
      Self::Mutex => "mutex",
    }
  }
}

impl fmt::Display for DocType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for DocType {
  type Err = DocumentError;

  fn from_str(value: &str) -> Result<Self> {
    match value.trim().to_ascii_lowercase().as_str() {
      "af" => Ok(Self::Af),
      "mutex" => Ok(Self::Mutex),
      _ => Err(DocumentError::UnknownDocType(value.to_string())),
    }
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
  #[error("line positions are not contiguous: expected {expected}, found {found}")]
  NonContiguous { expected: Position, found: Position },
  #[error("line {position} is out of range for a document with {len} lines")]
  OutOfRange { position: Position, len: usize },
  #[error("unknown document type '{0}'")]
  UnknownDocType(String),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
  id:        DocumentId,
  doc_type:  DocType,
  file_path: String,
  lines:     Vec<Line>,
  counts:    StatusCounts,
  selected:  Option<Position>,
  can_undo:  bool,
  can_redo:  bool,
  loading:   bool,
  revision:  u64,
}

impl Document {
  pub fn new(id: DocumentId, doc_type: DocType, file_path: impl Into<String>) -> Self {
    Self {
      id,
      doc_type,
      file_path: file_path.into(),
      lines: Vec::new(),
      counts: StatusCounts::default(),
      selected: None,
      can_undo: false,
      can_redo: false,
      loading: false,
      revision: 0,
    }
  }

  /// Fresh document shell carrying the history flags of a load summary.
  pub fn from_summary(summary: &Summary) -> Self {
    let mut doc = Self::new(
      summary.doc_id.clone(),
      summary.doc_type,
      summary.file_path.clone(),
    );
    doc.set_history(summary.can_undo, summary.can_redo);
    doc
  }

  pub fn id(&self) -> &DocumentId {
    &self.id
  }

  pub fn doc_type(&self) -> DocType {
    self.doc_type
  }

  pub fn file_path(&self) -> &str {
    &self.file_path
  }

  pub fn lines(&self) -> &[Line] {
    &self.lines
  }

  pub fn line(&self, position: Position) -> Option<&Line> {
    self.lines.get(position)
  }

  pub fn len(&self) -> usize {
    self.lines.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  pub fn counts(&self) -> StatusCounts {
    self.counts
  }

  pub fn selected(&self) -> Option<Position> {
    self.selected
  }

  pub fn selected_line(&self) -> Option<&Line> {
    self.selected.and_then(|position| self.line(position))
  }

  pub fn can_undo(&self) -> bool {
    self.can_undo
  }

  pub fn can_redo(&self) -> bool {
    self.can_redo
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  /// Bumped every time the line snapshot is replaced.
  pub fn revision(&self) -> u64 {
    self.revision
  }

  /// Install a complete line snapshot.
  ///
  /// Lines are ordered by position first; the result must cover `0..n`
  /// without gaps or duplicates, otherwise the document is left unchanged.
  /// A selection that no longer exists is cleared.
  pub fn replace_lines(&mut self, mut lines: Vec<Line>) -> Result<()> {
    lines.sort_by_key(|line| line.position);
    for (expected, line) in lines.iter().enumerate() {
      if line.position != expected {
        return Err(DocumentError::NonContiguous {
          expected,
          found: line.position,
        });
      }
    }

    self.counts = StatusCounts::from_lines(&lines);
    self.lines = lines;
    self.revision = self.revision.wrapping_add(1);
    self.settle_selection(self.selected);
    Ok(())
  }

  pub fn select(&mut self, position: Option<Position>) -> Result<()> {
    if let Some(position) = position
      && position >= self.lines.len()
    {
      return Err(DocumentError::OutOfRange {
        position,
        len: self.lines.len(),
      });
    }
    self.selected = position;
    Ok(())
  }

  /// Set the selection, dropping it when it points past the last line.
  pub fn settle_selection(&mut self, position: Option<Position>) {
    self.selected = position.filter(|position| *position < self.lines.len());
  }

  pub fn set_history(&mut self, can_undo: bool, can_redo: bool) {
    self.can_undo = can_undo;
    self.can_redo = can_redo;
  }

  /// A new action was applied: it can be undone and the redo branch is gone.
  pub fn record_action(&mut self) {
    self.set_history(true, false);
  }

  pub fn set_loading(&mut self, loading: bool) {
    self.loading = loading;
  }

  pub fn set_file_path(&mut self, file_path: impl Into<String>) {
    self.file_path = file_path.into();
  }
}
