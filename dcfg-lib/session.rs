//! Edit session state machine.
//!
//! A client has at most one edit session. Its lifecycle is modelled as a
//! tagged [`SessionState`] that only changes through
//! [`SessionState::transition`]; the async engine feeds service responses in
//! as [`SessionEvent`]s after checking they are still current.

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
  document::{
    DocType,
    DocumentId,
  },
  position::Position,
};

/// The line a session edits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditTarget {
  pub doc_id:   DocumentId,
  pub position: Position,
  pub doc_type: DocType,
}

impl EditTarget {
  pub fn new(doc_id: DocumentId, position: Position, doc_type: DocType) -> Self {
    Self {
      doc_id,
      position,
      doc_type,
    }
  }

  pub fn same_line(&self, other: &EditTarget) -> bool {
    self.doc_id == other.doc_id && self.position == other.position
  }
}

/// Structured contents of an AF line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AfFields {
  pub template:          Option<String>,
  pub net:               String,
  pub af_value:          f64,
  pub is_template_regex: bool,
  pub is_net_regex:      bool,
  pub is_em_enabled:     bool,
  pub is_sh_enabled:     bool,
  pub is_sch_enabled:    bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FevMode {
  #[default]
  #[serde(rename = "")]
  Unset,
  #[serde(rename = "low")]
  Low,
  #[serde(rename = "high")]
  High,
  #[serde(rename = "ignore")]
  Ignore,
}

impl FevMode {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Unset => "",
      Self::Low => "low",
      Self::High => "high",
      Self::Ignore => "ignore",
    }
  }
}

impl FromStr for FevMode {
  type Err = String;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value {
      "" | "none" => Ok(Self::Unset),
      "low" => Ok(Self::Low),
      "high" => Ok(Self::High),
      "ignore" => Ok(Self::Ignore),
      other => Err(format!("invalid fev mode '{other}'")),
    }
  }
}

/// A mutexed or active net as computed by the service.
///
/// Entries have no constructor; they only come out of a deserialized
/// [`MutexSession`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MutexEntry {
  net_name:      String,
  #[serde(default)]
  template_name: Option<String>,
  #[serde(default)]
  regex_mode:    bool,
  #[serde(default)]
  match_count:   usize,
}

impl MutexEntry {
  pub fn net_name(&self) -> &str {
    &self.net_name
  }

  pub fn template_name(&self) -> Option<&str> {
    self.template_name.as_deref()
  }

  pub fn regex_mode(&self) -> bool {
    self.regex_mode
  }

  pub fn match_count(&self) -> usize {
    self.match_count
  }
}

/// Server-side state of an open mutex session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutexSession {
  #[serde(default)]
  template:        Option<String>,
  #[serde(default)]
  regex_mode:      Option<bool>,
  #[serde(default)]
  num_active:      u32,
  #[serde(default)]
  fev:             FevMode,
  #[serde(default)]
  mutexed_entries: Vec<MutexEntry>,
  #[serde(default)]
  active_entries:  Vec<MutexEntry>,
}

impl MutexSession {
  pub fn template(&self) -> Option<&str> {
    self.template.as_deref()
  }

  pub fn regex_mode(&self) -> Option<bool> {
    self.regex_mode
  }

  pub fn num_active(&self) -> u32 {
    self.num_active
  }

  pub fn fev(&self) -> FevMode {
    self.fev
  }

  pub fn mutexed_entries(&self) -> &[MutexEntry] {
    &self.mutexed_entries
  }

  pub fn active_entries(&self) -> &[MutexEntry] {
    &self.active_entries
  }

  pub fn is_active(&self, net_name: &str) -> bool {
    self
      .active_entries
      .iter()
      .any(|entry| entry.net_name == net_name)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionData {
  /// `working` mirrors the last server response, `draft` holds what the user
  /// typed since.
  Af {
    working: AfFields,
    draft:   AfFields,
  },
  Mutex(MutexSession),
}

impl SessionData {
  pub fn doc_type(&self) -> DocType {
    match self {
      Self::Af { .. } => DocType::Af,
      Self::Mutex(_) => DocType::Mutex,
    }
  }
}

/// Working data delivered by the initial hydrate of a session.
#[derive(Debug, Clone, PartialEq)]
pub enum Hydration {
  Af(AfFields),
  Mutex(MutexSession),
}

impl Hydration {
  fn doc_type(&self) -> DocType {
    match self {
      Self::Af(_) => DocType::Af,
      Self::Mutex(_) => DocType::Mutex,
    }
  }

  fn into_data(self) -> SessionData {
    match self {
      Self::Af(fields) => {
        SessionData::Af {
          draft:   fields.clone(),
          working: fields,
        }
      },
      Self::Mutex(session) => SessionData::Mutex(session),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenSession {
  target:        EditTarget,
  data:          SessionData,
  errors:        Vec<String>,
  warnings:      Vec<String>,
  preview_error: Option<String>,
}

impl OpenSession {
  pub fn target(&self) -> &EditTarget {
    &self.target
  }

  pub fn data(&self) -> &SessionData {
    &self.data
  }

  pub fn errors(&self) -> &[String] {
    &self.errors
  }

  pub fn warnings(&self) -> &[String] {
    &self.warnings
  }

  /// Detail of the last failed live preview, cleared by the next success.
  pub fn preview_error(&self) -> Option<&str> {
    self.preview_error.as_deref()
  }

  pub fn af_working(&self) -> Option<&AfFields> {
    match &self.data {
      SessionData::Af { working, .. } => Some(working),
      SessionData::Mutex(_) => None,
    }
  }

  pub fn af_draft(&self) -> Option<&AfFields> {
    match &self.data {
      SessionData::Af { draft, .. } => Some(draft),
      SessionData::Mutex(_) => None,
    }
  }

  pub fn mutex(&self) -> Option<&MutexSession> {
    match &self.data {
      SessionData::Mutex(session) => Some(session),
      SessionData::Af { .. } => None,
    }
  }
}

fn schema_mismatch(session: DocType, schema: DocType) -> TransitionError {
  TransitionError::SchemaMismatch { session, schema }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
  /// Start editing a line, replacing whatever session existed.
  Open(EditTarget),
  /// Initial working data for the target being opened.
  Hydrated {
    target: EditTarget,
    data:   Hydration,
  },
  /// The user changed the AF draft.
  Edited(AfFields),
  /// A live preview came back with server-derived working data.
  Previewed(AfFields),
  PreviewFailed(String),
  /// A mutex round-trip returned the whole session payload.
  MutexRefreshed(MutexSession),
  CommitRequested,
  CommitRejected {
    errors:   Vec<String>,
    warnings: Vec<String>,
  },
  /// The commit never reached a verdict (transport failure).
  CommitFailed,
  Committed,
  Cancel,
}

impl SessionEvent {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Open(_) => "open",
      Self::Hydrated { .. } => "hydrated",
      Self::Edited(_) => "edited",
      Self::Previewed(_) => "previewed",
      Self::PreviewFailed(_) => "preview-failed",
      Self::MutexRefreshed(_) => "mutex-refreshed",
      Self::CommitRequested => "commit-requested",
      Self::CommitRejected { .. } => "commit-rejected",
      Self::CommitFailed => "commit-failed",
      Self::Committed => "committed",
      Self::Cancel => "cancel",
    }
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
  #[error("cannot handle '{event}' while the session is {state}")]
  Invalid {
    state: &'static str,
    event: &'static str,
  },
  #[error("hydrate for line {found} does not match the session opening line {expected}")]
  TargetMismatch { expected: Position, found: Position },
  #[error("a {session} session cannot hold {schema} data")]
  SchemaMismatch { session: DocType, schema: DocType },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SessionState {
  #[default]
  Closed,
  Opening(EditTarget),
  Open(OpenSession),
  Committing(OpenSession),
}

impl SessionState {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Closed => "closed",
      Self::Opening(_) => "opening",
      Self::Open(_) => "open",
      Self::Committing(_) => "committing",
    }
  }

  pub fn target(&self) -> Option<&EditTarget> {
    match self {
      Self::Closed => None,
      Self::Opening(target) => Some(target),
      Self::Open(session) | Self::Committing(session) => Some(&session.target),
    }
  }

  /// The session, whether idle or committing.
  pub fn session(&self) -> Option<&OpenSession> {
    match self {
      Self::Open(session) | Self::Committing(session) => Some(session),
      Self::Closed | Self::Opening(_) => None,
    }
  }

  pub fn is_closed(&self) -> bool {
    matches!(self, Self::Closed)
  }

  pub fn is_loading(&self) -> bool {
    matches!(self, Self::Opening(_))
  }

  pub fn is_committing(&self) -> bool {
    matches!(self, Self::Committing(_))
  }

  pub fn errors(&self) -> &[String] {
    self.session().map(OpenSession::errors).unwrap_or_default()
  }

  pub fn warnings(&self) -> &[String] {
    self.session().map(OpenSession::warnings).unwrap_or_default()
  }

  pub fn transition(self, event: SessionEvent) -> Result<Self, TransitionError> {
    match (self, event) {
      (_, SessionEvent::Open(target)) => Ok(Self::Opening(target)),
      (_, SessionEvent::Cancel) => Ok(Self::Closed),
      (Self::Opening(pending), SessionEvent::Hydrated { target, data }) => {
        if !pending.same_line(&target) {
          return Err(TransitionError::TargetMismatch {
            expected: pending.position,
            found:    target.position,
          });
        }
        if pending.doc_type != data.doc_type() {
          return Err(TransitionError::SchemaMismatch {
            session: pending.doc_type,
            schema:  data.doc_type(),
          });
        }
        Ok(Self::Open(OpenSession {
          target:        pending,
          data:          data.into_data(),
          errors:        Vec::new(),
          warnings:      Vec::new(),
          preview_error: None,
        }))
      },
      (Self::Open(mut session), SessionEvent::Edited(fields)) => {
        match &mut session.data {
          SessionData::Af { draft, .. } => *draft = fields,
          SessionData::Mutex(_) => return Err(schema_mismatch(session.target.doc_type, DocType::Af)),
        }
        Ok(Self::Open(session))
      },
      (Self::Open(mut session), SessionEvent::Previewed(fields)) => {
        match &mut session.data {
          SessionData::Af { working, .. } => *working = fields,
          SessionData::Mutex(_) => return Err(schema_mismatch(session.target.doc_type, DocType::Af)),
        }
        session.preview_error = None;
        Ok(Self::Open(session))
      },
      (Self::Open(mut session), SessionEvent::PreviewFailed(detail)) => {
        session.preview_error = Some(detail);
        Ok(Self::Open(session))
      },
      (Self::Open(mut session), SessionEvent::MutexRefreshed(mutex)) => {
        match &mut session.data {
          SessionData::Mutex(current) => *current = mutex,
          SessionData::Af { .. } => return Err(schema_mismatch(session.target.doc_type, DocType::Mutex)),
        }
        Ok(Self::Open(session))
      },
      (Self::Open(mut session), SessionEvent::CommitRequested) => {
        session.errors.clear();
        session.warnings.clear();
        Ok(Self::Committing(session))
      },
      (Self::Committing(mut session), SessionEvent::CommitRejected { errors, warnings }) => {
        session.errors = errors;
        session.warnings = warnings;
        Ok(Self::Open(session))
      },
      (Self::Committing(session), SessionEvent::CommitFailed) => Ok(Self::Open(session)),
      (Self::Committing(_), SessionEvent::Committed) => Ok(Self::Closed),
      (state, event) => {
        Err(TransitionError::Invalid {
          state: state.name(),
          event: event.name(),
        })
      },
    }
  }
}

impl fmt::Display for SessionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.target() {
      Some(target) => {
        write!(
          f,
          "{} ({} line {})",
          self.name(),
          target.doc_id,
          target.position
        )
      },
      None => f.write_str(self.name()),
    }
  }
}
