#![allow(dead_code)]

use std::{
  collections::{
    HashMap,
    VecDeque,
  },
  sync::Arc,
  time::Duration,
};

use async_trait::async_trait;
use dcfg_lib::{
  DocType,
  DocumentId,
  Line,
  LineStatus,
  Position,
  line::{
    ConflictInfo,
    ConflictPeer,
  },
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
    AfFields,
    FevMode,
    MutexSession,
  },
};
use dcfg_runtime::{
  DocumentService,
  EngineConfig,
  ServiceError,
};
use parking_lot::Mutex;
use serde_json::{
  Value,
  json,
};
use tokio::sync::Notify;

pub const AF_FILE: &str = "/data/top.af";
pub const MUTEX_FILE: &str = "/data/top.mutex";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockLine {
  pub raw:           String,
  pub comment:       bool,
  pub errors:        Vec<String>,
  pub warnings:      Vec<String>,
  pub conflict_with: Vec<Position>,
  pub data:          Option<Value>,
}

impl MockLine {
  pub fn text(raw: &str) -> Self {
    Self {
      raw: raw.to_string(),
      ..Self::default()
    }
  }

  pub fn af(net: &str, af_value: f64) -> Self {
    Self {
      raw: format!("{net} {af_value}"),
      data: Some(json!({ "net": net, "af_value": af_value })),
      ..Self::default()
    }
  }

  pub fn comment(raw: &str) -> Self {
    Self {
      raw: format!("# {raw}"),
      comment: true,
      ..Self::default()
    }
  }

  pub fn with_error(mut self, error: &str) -> Self {
    self.errors.push(error.to_string());
    self
  }

  pub fn with_warning(mut self, warning: &str) -> Self {
    self.warnings.push(warning.to_string());
    self
  }

  pub fn conflicting(mut self, peers: &[Position]) -> Self {
    self.conflict_with = peers.to_vec();
    self
  }

  fn to_line(&self, position: Position) -> Line {
    let mut line = Line::new(position, self.raw.clone());
    line.reported = if self.comment {
      LineStatus::Comment
    } else if !self.errors.is_empty() {
      LineStatus::Error
    } else if !self.warnings.is_empty() {
      LineStatus::Warning
    } else {
      LineStatus::Ok
    };
    line.errors = self.errors.clone();
    line.warnings = self.warnings.clone();
    line.has_data = self.data.is_some();
    line.data = self.data.clone();
    if !self.conflict_with.is_empty() {
      line.conflict_info = Some(ConflictInfo {
        peers: self
          .conflict_with
          .iter()
          .map(|peer| {
            ConflictPeer {
              position:    *peer,
              shared_nets: vec!["shared".into()],
            }
          })
          .collect(),
      });
    }
    line
  }
}

/// Pauses gated hydrates until released.
#[derive(Default)]
pub struct Gate {
  pub entered: Notify,
  pub release: Notify,
}

#[derive(Debug, Clone, Default)]
struct MutexState {
  template:   Option<String>,
  num_active: u32,
  fev:        FevMode,
  mutexed:    Vec<(String, Option<String>, bool)>,
  active:     Vec<(String, Option<String>)>,
}

impl MutexState {
  fn to_session(&self, nets: &[String]) -> MutexSession {
    let match_count = |pattern: &str, regex: bool| {
      if regex {
        nets.iter().filter(|net| net.contains(pattern)).count()
      } else {
        1
      }
    };
    let mut mutexed = self.mutexed.clone();
    mutexed.sort();
    let mut active = self.active.clone();
    active.sort();
    serde_json::from_value(json!({
      "template": self.template,
      "regex_mode": mutexed.iter().any(|(_, _, regex)| *regex),
      "num_active": self.num_active,
      "fev": self.fev,
      "mutexed_entries": mutexed.iter().map(|(net, template, regex)| json!({
        "net_name": net,
        "template_name": template,
        "regex_mode": regex,
        "match_count": match_count(net, *regex),
      })).collect::<Vec<_>>(),
      "active_entries": active.iter().map(|(net, template)| json!({
        "net_name": net,
        "template_name": template,
        "regex_mode": false,
        "match_count": 1,
      })).collect::<Vec<_>>(),
    }))
    .expect("mock mutex session")
  }
}

struct MockDoc {
  doc_type:  DocType,
  file_path: String,
  lines:     Vec<MockLine>,
  undo:      Vec<Vec<MockLine>>,
  redo:      Vec<Vec<MockLine>>,
}

impl MockDoc {
  fn checkpoint(&mut self) {
    self.undo.push(self.lines.clone());
    self.redo.clear();
  }

  fn history(&self) -> HistoryState {
    HistoryState {
      can_undo: !self.undo.is_empty(),
      can_redo: !self.redo.is_empty(),
    }
  }

  fn line_mut(&mut self, position: Position) -> Result<&mut MockLine, ServiceError> {
    let len = self.lines.len();
    self
      .lines
      .get_mut(position)
      .ok_or_else(|| ServiceError::NotFound(format!("line {position} of {len}")))
  }
}

#[derive(Default)]
struct MockState {
  files:         HashMap<String, (DocType, Vec<MockLine>)>,
  docs:          HashMap<DocumentId, MockDoc>,
  hydrated:      HashMap<(DocumentId, Position), Value>,
  mutex:         HashMap<(DocumentId, Position), MutexState>,
  verdicts:      VecDeque<CommitOutcome>,
  nets:          Vec<String>,
  ignore_paging: bool,
}

impl MockState {
  fn doc(&self, doc_id: &DocumentId) -> Result<&MockDoc, ServiceError> {
    self
      .docs
      .get(doc_id)
      .ok_or_else(|| ServiceError::NotFound(format!("Document {doc_id} not found")))
  }

  fn doc_mut(&mut self, doc_id: &DocumentId) -> Result<&mut MockDoc, ServiceError> {
    self
      .docs
      .get_mut(doc_id)
      .ok_or_else(|| ServiceError::NotFound(format!("Document {doc_id} not found")))
  }

  fn summary(&self, doc_id: &DocumentId) -> Result<Summary, ServiceError> {
    let doc = self.doc(doc_id)?;
    let history = doc.history();
    Ok(Summary {
      doc_id:        doc_id.clone(),
      doc_type:      doc.doc_type,
      file_path:     doc.file_path.clone(),
      total_lines:   doc.lines.len(),
      status_counts: Default::default(),
      can_undo:      history.can_undo,
      can_redo:      history.can_redo,
    })
  }

  fn mutex_mut(
    &mut self,
    doc_id: &DocumentId,
    position: Position,
  ) -> Result<&mut MutexState, ServiceError> {
    self
      .mutex
      .get_mut(&(doc_id.clone(), position))
      .ok_or_else(|| ServiceError::NotFound("No active mutex session".into()))
  }
}

/// In-memory document service with call counters, one-shot failure
/// injection and an optional gate on preview hydrates.
#[derive(Default)]
pub struct MockService {
  state:        Mutex<MockState>,
  calls:        Mutex<Vec<&'static str>>,
  failures:     Mutex<HashMap<&'static str, ServiceError>>,
  preview_gate: Mutex<Option<Arc<Gate>>>,
}

impl MockService {
  pub fn new() -> Arc<Self> {
    let service = Self::default();
    {
      let mut state = service.state.lock();
      state.files.insert(AF_FILE.to_string(), (DocType::Af, af_fixture()));
      state.files.insert(MUTEX_FILE.to_string(), (DocType::Mutex, vec![
        MockLine::text("mutex T1 a b"),
        MockLine::text("mutex T2 c"),
      ]));
      state.nets = ["a", "b", "c", "bus0", "bus1", "bus2"]
        .iter()
        .map(|net| net.to_string())
        .collect();
    }
    Arc::new(service)
  }

  pub fn add_file(&self, path: &str, doc_type: DocType, lines: Vec<MockLine>) {
    self
      .state
      .lock()
      .files
      .insert(path.to_string(), (doc_type, lines));
  }

  /// Make the next call named `method` fail with `err`.
  pub fn fail_next(&self, method: &'static str, err: ServiceError) {
    self.failures.lock().insert(method, err);
  }

  /// Answer every `get_lines` with the whole document, whatever the
  /// requested offset and limit.
  pub fn ignore_paging(&self) {
    self.state.lock().ignore_paging = true;
  }

  pub fn queue_verdict(&self, outcome: CommitOutcome) {
    self.state.lock().verdicts.push_back(outcome);
  }

  pub fn gate_previews(&self) -> Arc<Gate> {
    let gate = Arc::new(Gate::default());
    *self.preview_gate.lock() = Some(gate.clone());
    gate
  }

  pub fn calls(&self, method: &str) -> usize {
    self
      .calls
      .lock()
      .iter()
      .filter(|call| **call == method)
      .count()
  }

  pub fn raw_lines(&self, doc_id: &str) -> Vec<String> {
    self
      .state
      .lock()
      .docs
      .get(&DocumentId::new(doc_id))
      .map(|doc| doc.lines.iter().map(|line| line.raw.clone()).collect())
      .unwrap_or_default()
  }

  pub fn last_hydrate(&self, doc_id: &str, position: Position) -> Option<Value> {
    self
      .state
      .lock()
      .hydrated
      .get(&(DocumentId::new(doc_id), position))
      .cloned()
  }

  fn enter(&self, method: &'static str) -> Result<(), ServiceError> {
    self.calls.lock().push(method);
    match self.failures.lock().remove(method) {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  fn with_doc<R>(
    &self,
    doc_id: &DocumentId,
    f: impl FnOnce(&mut MockDoc) -> Result<R, ServiceError>,
  ) -> Result<R, ServiceError> {
    let mut state = self.state.lock();
    f(state.doc_mut(doc_id)?)
  }

  fn mutex_action(
    &self,
    doc_id: &DocumentId,
    position: Position,
    f: impl FnOnce(&mut MutexState) -> Result<(), ServiceError>,
  ) -> Result<MutexSession, ServiceError> {
    let mut state = self.state.lock();
    let mutex = state.mutex_mut(doc_id, position)?;
    f(mutex)?;
    let mutex = mutex.clone();
    Ok(mutex.to_session(&state.nets))
  }
}

/// Six AF lines: two conflicting with each other, one broken, one warning.
pub fn af_fixture() -> Vec<MockLine> {
  vec![
    MockLine::comment("top level af"),
    MockLine::af("a", 0.5).conflicting(&[3]),
    MockLine::af("b", 1.0).with_error("af value out of range"),
    MockLine::af("a", 0.7).conflicting(&[1]),
    MockLine::af("c", 0.2).with_warning("template not found"),
    MockLine::af("d", 0.9),
  ]
}

pub fn test_config() -> EngineConfig {
  EngineConfig {
    preview_debounce_ms: 20,
    search_debounce_ms: 20,
    ..EngineConfig::default()
  }
}

/// Poll `condition` while letting background tasks run.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
  for _ in 0..200 {
    if condition() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  condition()
}

pub fn af(net: &str, af_value: f64) -> AfFields {
  AfFields {
    net: net.to_string(),
    af_value,
    ..AfFields::default()
  }
}

#[async_trait]
impl DocumentService for MockService {
  async fn load_document(
    &self,
    doc_id: &DocumentId,
    file_path: &str,
    doc_type: DocType,
  ) -> Result<Summary, ServiceError> {
    self.enter("load_document")?;
    let mut state = self.state.lock();
    let (file_type, lines) = state
      .files
      .get(file_path)
      .cloned()
      .ok_or_else(|| ServiceError::NotFound(format!("File not found: {file_path}")))?;
    if file_type != doc_type {
      return Err(ServiceError::rejected(format!(
        "{file_path} is not a {doc_type} file"
      )));
    }
    state.docs.insert(doc_id.clone(), MockDoc {
      doc_type,
      file_path: file_path.to_string(),
      lines,
      undo: Vec::new(),
      redo: Vec::new(),
    });
    state.summary(doc_id)
  }

  async fn list_documents(&self) -> Result<Vec<Summary>, ServiceError> {
    self.enter("list_documents")?;
    let state = self.state.lock();
    state
      .docs
      .keys()
      .map(|doc_id| state.summary(doc_id))
      .collect()
  }

  async fn close_document(&self, doc_id: &DocumentId) -> Result<(), ServiceError> {
    self.enter("close_document")?;
    let mut state = self.state.lock();
    state
      .docs
      .remove(doc_id)
      .map(|_| ())
      .ok_or_else(|| ServiceError::NotFound(format!("Document {doc_id} not found")))
  }

  async fn save_document(
    &self,
    doc_id: &DocumentId,
    file_path: Option<&str>,
  ) -> Result<SaveOutcome, ServiceError> {
    self.enter("save_document")?;
    self.with_doc(doc_id, |doc| {
      if let Some(path) = file_path {
        doc.file_path = path.to_string();
      }
      Ok(SaveOutcome {
        file_path: doc.file_path.clone(),
      })
    })
  }

  async fn get_lines(
    &self,
    doc_id: &DocumentId,
    offset: usize,
    limit: Option<usize>,
  ) -> Result<Vec<Line>, ServiceError> {
    self.enter("get_lines")?;
    let state = self.state.lock();
    let doc = state.doc(doc_id)?;
    let (offset, limit) = if state.ignore_paging {
      (0, None)
    } else {
      (offset, limit)
    };
    let end = limit.map_or(doc.lines.len(), |limit| {
      offset.saturating_add(limit).min(doc.lines.len())
    });
    Ok(
      doc
        .lines
        .iter()
        .enumerate()
        .skip(offset)
        .take(end.saturating_sub(offset))
        .map(|(position, line)| line.to_line(position))
        .collect(),
    )
  }

  async fn search_lines(
    &self,
    doc_id: &DocumentId,
    query: &SearchQuery,
  ) -> Result<Vec<Line>, ServiceError> {
    self.enter("search_lines")?;
    let state = self.state.lock();
    let doc = state.doc(doc_id)?;
    Ok(
      doc
        .lines
        .iter()
        .enumerate()
        .map(|(position, line)| line.to_line(position))
        .filter(|line| line.raw_text.contains(&query.query))
        .filter(|line| {
          query
            .status_filter
            .is_none_or(|status| line.status() == status)
        })
        .collect(),
    )
  }

  async fn delete_line(&self, doc_id: &DocumentId, position: Position) -> Result<(), ServiceError> {
    self.enter("delete_line")?;
    self.with_doc(doc_id, |doc| {
      doc.line_mut(position)?;
      doc.checkpoint();
      doc.lines.remove(position);
      Ok(())
    })
  }

  async fn insert_line(&self, doc_id: &DocumentId, position: Position) -> Result<(), ServiceError> {
    self.enter("insert_line")?;
    self.with_doc(doc_id, |doc| {
      if position > doc.lines.len() {
        return Err(ServiceError::rejected("insert position out of range"));
      }
      doc.checkpoint();
      doc.lines.insert(position, MockLine::text(""));
      Ok(())
    })
  }

  async fn toggle_comment(
    &self,
    doc_id: &DocumentId,
    position: Position,
  ) -> Result<(), ServiceError> {
    self.enter("toggle_comment")?;
    self.with_doc(doc_id, |doc| {
      doc.line_mut(position)?;
      doc.checkpoint();
      let line = doc.line_mut(position)?;
      if line.comment {
        let raw = line.raw.trim_start_matches("# ").to_string();
        *line = MockLine::text(&raw);
      } else {
        *line = MockLine::comment(&line.raw.clone());
      }
      Ok(())
    })
  }

  async fn swap_lines(
    &self,
    doc_id: &DocumentId,
    a: Position,
    b: Position,
  ) -> Result<(), ServiceError> {
    self.enter("swap_lines")?;
    self.with_doc(doc_id, |doc| {
      doc.line_mut(a)?;
      doc.line_mut(b)?;
      doc.checkpoint();
      doc.lines.swap(a, b);
      Ok(())
    })
  }

  async fn edit_comment_text(
    &self,
    doc_id: &DocumentId,
    position: Position,
    text: &str,
  ) -> Result<(), ServiceError> {
    self.enter("edit_comment_text")?;
    self.with_doc(doc_id, |doc| {
      if !doc.line_mut(position)?.comment {
        return Err(ServiceError::rejected("Line is not a comment"));
      }
      doc.checkpoint();
      *doc.line_mut(position)? = MockLine::comment(text);
      Ok(())
    })
  }

  async fn undo(&self, doc_id: &DocumentId) -> Result<HistoryState, ServiceError> {
    self.enter("undo")?;
    self.with_doc(doc_id, |doc| {
      let previous = doc
        .undo
        .pop()
        .ok_or_else(|| ServiceError::rejected("Nothing to undo"))?;
      let current = std::mem::replace(&mut doc.lines, previous);
      doc.redo.push(current);
      Ok(doc.history())
    })
  }

  async fn redo(&self, doc_id: &DocumentId) -> Result<HistoryState, ServiceError> {
    self.enter("redo")?;
    self.with_doc(doc_id, |doc| {
      let next = doc
        .redo
        .pop()
        .ok_or_else(|| ServiceError::rejected("Nothing to redo"))?;
      let current = std::mem::replace(&mut doc.lines, next);
      doc.undo.push(current);
      Ok(doc.history())
    })
  }

  async fn hydrate_session(
    &self,
    doc_id: &DocumentId,
    position: Position,
    fields: Option<Value>,
  ) -> Result<Hydrated, ServiceError> {
    self.enter("hydrate_session")?;
    let gate = fields
      .as_ref()
      .and_then(|_| self.preview_gate.lock().clone());
    if let Some(gate) = gate {
      gate.entered.notify_one();
      gate.release.notified().await;
    }

    let mut state = self.state.lock();
    let doc = state.doc(doc_id)?;
    let doc_type = doc.doc_type;
    let line = doc
      .lines
      .get(position)
      .cloned()
      .ok_or_else(|| ServiceError::NotFound(format!("line {position}")))?;

    let data = match (doc_type, fields) {
      (DocType::Af, Some(fields)) => {
        let mut draft: AfFields = serde_json::from_value(fields)?;
        draft.net = draft.net.trim().to_string();
        serde_json::to_value(draft)?
      },
      (DocType::Af, None) => line.data.clone().unwrap_or(Value::Null),
      (DocType::Mutex, _) => {
        state
          .mutex
          .entry((doc_id.clone(), position))
          .or_insert_with(|| {
            MutexState {
              template: Some("T1".into()),
              num_active: 1,
              ..MutexState::default()
            }
          });
        Value::Null
      },
    };
    state
      .hydrated
      .insert((doc_id.clone(), position), data.clone());
    Ok(Hydrated {
      position,
      doc_type,
      data,
    })
  }

  async fn commit_edit(
    &self,
    doc_id: &DocumentId,
    position: Position,
  ) -> Result<CommitOutcome, ServiceError> {
    self.enter("commit_edit")?;
    let mut state = self.state.lock();
    let verdict = state.verdicts.pop_front().unwrap_or_default();
    if !verdict.is_accepted() {
      return Ok(verdict);
    }
    let hydrated = state
      .hydrated
      .get(&(doc_id.clone(), position))
      .cloned()
      .unwrap_or(Value::Null);
    let doc = state.doc_mut(doc_id)?;
    doc.line_mut(position)?;
    doc.checkpoint();
    let line = doc.line_mut(position)?;
    *line = match doc_type_of(&hydrated) {
      Some(fields) => MockLine::af(&fields.net, fields.af_value),
      None => MockLine::text("mutex committed"),
    };
    Ok(verdict)
  }

  async fn get_mutex_session(
    &self,
    doc_id: &DocumentId,
    position: Position,
  ) -> Result<MutexSession, ServiceError> {
    self.enter("get_mutex_session")?;
    self.mutex_action(doc_id, position, |_| Ok(()))
  }

  async fn mutex_add_mutexed(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexEntryRequest,
  ) -> Result<MutexSession, ServiceError> {
    self.enter("mutex_add_mutexed")?;
    self.mutex_action(doc_id, position, |mutex| {
      if mutex
        .mutexed
        .iter()
        .any(|(net, ..)| *net == request.net_pattern)
      {
        return Err(ServiceError::rejected(format!(
          "{} is already mutexed",
          request.net_pattern
        )));
      }
      mutex.mutexed.push((
        request.net_pattern.clone(),
        request.template.clone(),
        request.is_regex,
      ));
      Ok(())
    })
  }

  async fn mutex_remove_mutexed(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexEntryRequest,
  ) -> Result<MutexSession, ServiceError> {
    self.enter("mutex_remove_mutexed")?;
    self.mutex_action(doc_id, position, |mutex| {
      mutex.mutexed.retain(|(net, ..)| *net != request.net_pattern);
      mutex.active.retain(|(net, _)| *net != request.net_pattern);
      Ok(())
    })
  }

  async fn mutex_add_active(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexActiveRequest,
  ) -> Result<MutexSession, ServiceError> {
    self.enter("mutex_add_active")?;
    self.mutex_action(doc_id, position, |mutex| {
      if !mutex.mutexed.iter().any(|(net, ..)| *net == request.net_name) {
        return Err(ServiceError::rejected(format!(
          "{} must be mutexed before it can be active",
          request.net_name
        )));
      }
      mutex
        .active
        .push((request.net_name.clone(), request.template.clone()));
      Ok(())
    })
  }

  async fn mutex_remove_active(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexActiveRequest,
  ) -> Result<MutexSession, ServiceError> {
    self.enter("mutex_remove_active")?;
    self.mutex_action(doc_id, position, |mutex| {
      mutex.active.retain(|(net, _)| *net != request.net_name);
      Ok(())
    })
  }

  async fn mutex_set_fev(
    &self,
    doc_id: &DocumentId,
    position: Position,
    fev: FevMode,
  ) -> Result<MutexSession, ServiceError> {
    self.enter("mutex_set_fev")?;
    self.mutex_action(doc_id, position, |mutex| {
      mutex.fev = fev;
      Ok(())
    })
  }

  async fn mutex_set_num_active(
    &self,
    doc_id: &DocumentId,
    position: Position,
    num_active: u32,
  ) -> Result<MutexSession, ServiceError> {
    self.enter("mutex_set_num_active")?;
    self.mutex_action(doc_id, position, |mutex| {
      mutex.num_active = num_active;
      Ok(())
    })
  }

  async fn query_nets(&self, query: &NetQuery) -> Result<NetMatches, ServiceError> {
    self.enter("query_nets")?;
    let state = self.state.lock();
    Ok(NetMatches {
      nets:      state
        .nets
        .iter()
        .filter(|net| net.contains(&query.net_pattern))
        .cloned()
        .collect(),
      templates: vec!["T1".into(), "T2".into()],
    })
  }
}

fn doc_type_of(hydrated: &Value) -> Option<AfFields> {
  if hydrated.is_null() {
    return None;
  }
  serde_json::from_value(hydrated.clone()).ok()
}
