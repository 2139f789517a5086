//! Problem list and conflict grouping projections.
//!
//! Both views are pure functions of a document's current lines and are
//! recomputed whenever those lines are replaced.

use std::collections::HashSet;

use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  document::DocumentId,
  line::{
    ConflictPeer,
    Line,
  },
  position::Position,
};

/// Ordered so that `Error > Conflict > Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Warning,
  Conflict,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
  pub doc_id:   DocumentId,
  pub position: Position,
  pub severity: Severity,
  pub message:  String,
}

/// One problem per error, one per warning and one per conflicting line.
pub fn derive_problems(doc_id: &DocumentId, lines: &[Line]) -> Vec<Problem> {
  let mut problems = Vec::new();
  for line in lines {
    let problem = |severity, message: String| {
      Problem {
        doc_id: doc_id.clone(),
        position: line.position,
        severity,
        message,
      }
    };
    problems.extend(
      line
        .errors
        .iter()
        .map(|message| problem(Severity::Error, message.clone())),
    );
    problems.extend(
      line
        .warnings
        .iter()
        .map(|message| problem(Severity::Warning, message.clone())),
    );
    if !line.conflict_peers().is_empty() {
      problems.push(problem(
        Severity::Conflict,
        conflict_message(line.conflict_peers()),
      ));
    }
  }
  problems
}

/// Most severe first, then by position. Stable for equal keys.
pub fn sort_problems(problems: &mut [Problem]) {
  problems.sort_by(|a, b| {
    b.severity
      .cmp(&a.severity)
      .then_with(|| a.position.cmp(&b.position))
  });
}

pub fn sorted_problems(doc_id: &DocumentId, lines: &[Line]) -> Vec<Problem> {
  let mut problems = derive_problems(doc_id, lines);
  sort_problems(&mut problems);
  problems
}

fn conflict_message(peers: &[ConflictPeer]) -> String {
  let described: Vec<String> = peers
    .iter()
    .map(|peer| {
      if peer.shared_nets.is_empty() {
        format!("line {}", peer.position + 1)
      } else {
        format!("line {} ({})", peer.position + 1, peer.shared_nets.join(", "))
      }
    })
    .collect();
  format!("conflicts with {}", described.join("; "))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictGroup {
  pub doc_id: DocumentId,
  pub root:   Position,
  pub peers:  Vec<ConflictPeer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PairKey {
  doc_id: DocumentId,
  low:    Position,
  high:   Position,
}

impl PairKey {
  fn new(doc_id: &DocumentId, a: Position, b: Position) -> Self {
    Self {
      doc_id: doc_id.clone(),
      low:    a.min(b),
      high:   a.max(b),
    }
  }
}

/// Group conflicts by root line, reporting each symmetric pair once.
///
/// Conflict info is stored on both sides of a pair, so the second line of a
/// pair would repeat it; those duplicates are removed and roots left without
/// peers are dropped.
pub fn derive_conflict_groups(doc_id: &DocumentId, lines: &[Line]) -> Vec<ConflictGroup> {
  let mut seen = HashSet::new();
  let mut groups = Vec::new();
  for line in lines {
    let peers: Vec<ConflictPeer> = line
      .conflict_peers()
      .iter()
      .filter(|peer| seen.insert(PairKey::new(doc_id, line.position, peer.position)))
      .cloned()
      .collect();
    if peers.is_empty() {
      continue;
    }
    groups.push(ConflictGroup {
      doc_id: doc_id.clone(),
      root: line.position,
      peers,
    });
  }
  groups
}
