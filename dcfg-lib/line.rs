use serde::{
  Deserialize,
  Serialize,
};
use serde_json::Value;

use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
  Ok,
  Warning,
  Error,
  Comment,
  Conflict,
}

impl LineStatus {
  pub const ALL: [LineStatus; 5] = [
    LineStatus::Ok,
    LineStatus::Warning,
    LineStatus::Error,
    LineStatus::Comment,
    LineStatus::Conflict,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Ok => "ok",
      Self::Warning => "warning",
      Self::Error => "error",
      Self::Comment => "comment",
      Self::Conflict => "conflict",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|status| status.as_str() == value)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPeer {
  pub position:    Position,
  #[serde(default)]
  pub shared_nets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictInfo {
  #[serde(default)]
  pub peers: Vec<ConflictPeer>,
}

impl ConflictInfo {
  pub fn is_empty(&self) -> bool {
    self.peers.is_empty()
  }

  pub fn peer(&self, position: Position) -> Option<&ConflictPeer> {
    self.peers.iter().find(|peer| peer.position == position)
  }
}

/// One parsed line as reported by the document service.
///
/// `reported` is the raw classification from the service; [`Line::status`]
/// is the status the line is displayed with once errors, conflicts and
/// warnings attached to it are taken into account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
  pub position:      Position,
  #[serde(default)]
  pub raw_text:      String,
  #[serde(rename = "status")]
  pub reported:      LineStatus,
  #[serde(default)]
  pub errors:        Vec<String>,
  #[serde(default)]
  pub warnings:      Vec<String>,
  #[serde(default)]
  pub has_data:      bool,
  #[serde(default)]
  pub data:          Option<Value>,
  #[serde(default)]
  pub conflict_info: Option<ConflictInfo>,
}

impl Line {
  pub fn new(position: Position, raw_text: impl Into<String>) -> Self {
    Self {
      position,
      raw_text: raw_text.into(),
      reported: LineStatus::Ok,
      errors: Vec::new(),
      warnings: Vec::new(),
      has_data: false,
      data: None,
      conflict_info: None,
    }
  }

  pub fn is_comment(&self) -> bool {
    self.reported == LineStatus::Comment
  }

  pub fn has_errors(&self) -> bool {
    !self.errors.is_empty() || self.reported == LineStatus::Error
  }

  pub fn has_warnings(&self) -> bool {
    !self.warnings.is_empty() || self.reported == LineStatus::Warning
  }

  pub fn is_conflict(&self) -> bool {
    self.conflict_info.as_ref().is_some_and(|info| !info.is_empty())
      || self.reported == LineStatus::Conflict
  }

  /// Display status: comment, then error, then conflict, then warning.
  pub fn status(&self) -> LineStatus {
    if self.is_comment() {
      LineStatus::Comment
    } else if self.has_errors() {
      LineStatus::Error
    } else if self.is_conflict() {
      LineStatus::Conflict
    } else if self.has_warnings() {
      LineStatus::Warning
    } else {
      LineStatus::Ok
    }
  }

  pub fn conflict_peers(&self) -> &[ConflictPeer] {
    self
      .conflict_info
      .as_ref()
      .map(|info| info.peers.as_slice())
      .unwrap_or_default()
  }
}

/// Per-category line counts.
///
/// Categories are counted independently: a line with both warnings and a
/// conflict contributes to `warning` and `conflict`. `ok` only counts lines
/// whose display status is [`LineStatus::Ok`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
  pub total:    usize,
  pub ok:       usize,
  pub warning:  usize,
  pub error:    usize,
  pub comment:  usize,
  pub conflict: usize,
}

impl StatusCounts {
  pub fn from_lines(lines: &[Line]) -> Self {
    let mut counts = Self::default();
    for line in lines {
      counts.total = counts.total.saturating_add(1);
      if line.is_comment() {
        counts.comment = counts.comment.saturating_add(1);
        continue;
      }
      if line.has_errors() {
        counts.error = counts.error.saturating_add(1);
      }
      if line.is_conflict() {
        counts.conflict = counts.conflict.saturating_add(1);
      }
      if line.has_warnings() {
        counts.warning = counts.warning.saturating_add(1);
      }
      if line.status() == LineStatus::Ok {
        counts.ok = counts.ok.saturating_add(1);
      }
    }
    counts
  }

  pub fn get(&self, status: LineStatus) -> usize {
    match status {
      LineStatus::Ok => self.ok,
      LineStatus::Warning => self.warning,
      LineStatus::Error => self.error,
      LineStatus::Comment => self.comment,
      LineStatus::Conflict => self.conflict,
    }
  }

  pub fn has_problems(&self) -> bool {
    self.error > 0 || self.conflict > 0 || self.warning > 0
  }
}
