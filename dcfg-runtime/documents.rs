//! Client-side store of loaded documents.
//!
//! Every operation is confirmed by the service before local state moves:
//! a mutation is sent, the complete line set is refetched and installed,
//! and only then is the selection remapped and the history flags updated.
//! A failed remote call leaves the document exactly as it was and is never
//! followed by a refetch.

use std::{
  collections::{
    BTreeMap,
    BTreeSet,
  },
  sync::Arc,
};

use dcfg_lib::{
  DocType,
  Document,
  DocumentError,
  DocumentId,
  Line,
  Position,
  StructuralEdit,
  position,
  protocol::{
    HistoryState,
    Summary,
  },
};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{
  debug,
  info,
  warn,
};

use crate::service::{
  DocumentService,
  ServiceError,
};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("document '{0}' is not loaded")]
  UnknownDocument(DocumentId),
  #[error("failed to load '{file_path}' as '{doc_id}': {source}")]
  Load {
    doc_id:    DocumentId,
    file_path: String,
    #[source]
    source:    ServiceError,
  },
  #[error(transparent)]
  Service(#[from] ServiceError),
  #[error(transparent)]
  Document(#[from] DocumentError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mutation {
  Delete(Position),
  Insert(Position),
  ToggleComment(Position),
  Swap(Position, Position),
  EditComment(Position, String),
}

impl Mutation {
  fn structural(&self) -> Option<StructuralEdit> {
    match self {
      Self::Delete(position) => Some(StructuralEdit::Delete(*position)),
      Self::Insert(position) => Some(StructuralEdit::Insert(*position)),
      Self::Swap(a, b) => Some(StructuralEdit::Swap(*a, *b)),
      Self::ToggleComment(_) | Self::EditComment(..) => None,
    }
  }

  fn name(&self) -> &'static str {
    match self {
      Self::Delete(_) => "delete",
      Self::Insert(_) => "insert",
      Self::ToggleComment(_) => "toggle-comment",
      Self::Swap(..) => "swap",
      Self::EditComment(..) => "edit-comment",
    }
  }
}

#[derive(Debug, Clone, Copy)]
enum HistoryStep {
  Undo,
  Redo,
}

#[derive(Default)]
struct StoreState {
  documents: BTreeMap<DocumentId, Document>,
  loading:   BTreeSet<DocumentId>,
}

#[derive(Clone)]
pub struct DocumentStore {
  service:   Arc<dyn DocumentService>,
  state:     Arc<Mutex<StoreState>>,
  page_size: Option<usize>,
}

impl DocumentStore {
  pub fn new(service: Arc<dyn DocumentService>) -> Self {
    Self {
      service,
      state: Arc::new(Mutex::new(StoreState::default())),
      page_size: None,
    }
  }

  /// Fetch lines in pages of `page_size` instead of one request.
  pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
    self.page_size = page_size.filter(|size| *size > 0);
    self
  }

  pub fn document(&self, doc_id: &DocumentId) -> Option<Document> {
    self.state.lock().documents.get(doc_id).cloned()
  }

  /// Run `f` against a loaded document without cloning it.
  pub fn with_document<R>(&self, doc_id: &DocumentId, f: impl FnOnce(&Document) -> R) -> Option<R> {
    self.state.lock().documents.get(doc_id).map(f)
  }

  pub fn document_ids(&self) -> Vec<DocumentId> {
    self.state.lock().documents.keys().cloned().collect()
  }

  pub fn contains(&self, doc_id: &DocumentId) -> bool {
    self.state.lock().documents.contains_key(doc_id)
  }

  /// True while a load or refresh of `doc_id` is in flight.
  pub fn is_loading(&self, doc_id: &DocumentId) -> bool {
    let state = self.state.lock();
    state.loading.contains(doc_id)
      || state
        .documents
        .get(doc_id)
        .is_some_and(Document::is_loading)
  }

  pub async fn list_remote(&self) -> Result<Vec<Summary>> {
    Ok(self.service.list_documents().await?)
  }

  /// Load `file_path` into the service and mirror it under `doc_id`.
  ///
  /// On failure no entry is created; an entry already present under the
  /// same id is left untouched.
  pub async fn load_document(
    &self,
    doc_id: DocumentId,
    file_path: &str,
    doc_type: DocType,
  ) -> Result<Summary> {
    self.state.lock().loading.insert(doc_id.clone());
    let loaded = self.load_remote(&doc_id, file_path, doc_type).await;

    let mut state = self.state.lock();
    state.loading.remove(&doc_id);
    match loaded {
      Ok((summary, document)) => {
        info!(doc = %doc_id, path = file_path, lines = document.len(), "loaded document");
        state.documents.insert(doc_id, document);
        Ok(summary)
      },
      Err(source) => {
        Err(StoreError::Load {
          doc_id,
          file_path: file_path.to_string(),
          source,
        })
      },
    }
  }

  async fn load_remote(
    &self,
    doc_id: &DocumentId,
    file_path: &str,
    doc_type: DocType,
  ) -> std::result::Result<(Summary, Document), ServiceError> {
    let summary = self
      .service
      .load_document(doc_id, file_path, doc_type)
      .await?;
    let lines = self.fetch_lines(doc_id).await?;
    let mut document = Document::from_summary(&summary);
    document
      .replace_lines(lines)
      .map_err(|err| ServiceError::Decode(err.to_string()))?;
    Ok((summary, document))
  }

  /// Mirror a document the service already holds.
  pub async fn attach_document(&self, doc_id: &DocumentId) -> Result<Summary> {
    let summary = self
      .service
      .list_documents()
      .await?
      .into_iter()
      .find(|summary| &summary.doc_id == doc_id)
      .ok_or_else(|| ServiceError::NotFound(format!("document '{doc_id}'")))?;
    let lines = self.fetch_lines(doc_id).await?;
    let mut document = Document::from_summary(&summary);
    document.replace_lines(lines)?;
    debug!(doc = %doc_id, lines = document.len(), "attached document");
    self.state.lock().documents.insert(doc_id.clone(), document);
    Ok(summary)
  }

  /// Refetch all lines of `doc_id` and recompute its counts.
  pub async fn refresh_lines(&self, doc_id: &DocumentId) -> Result<()> {
    self.update(doc_id, |doc| {
      doc.set_loading(true);
      Ok(())
    })?;
    let fetched = self.fetch_lines(doc_id).await;
    self.update(doc_id, |doc| {
      doc.set_loading(false);
      doc.replace_lines(fetched?)?;
      Ok(())
    })
  }

  pub fn select(&self, doc_id: &DocumentId, position: Option<Position>) -> Result<()> {
    self.update(doc_id, |doc| Ok(doc.select(position)?))
  }

  pub async fn delete_line(&self, doc_id: &DocumentId, position: Position) -> Result<()> {
    self.mutate(doc_id, Mutation::Delete(position)).await
  }

  pub async fn insert_line(&self, doc_id: &DocumentId, position: Position) -> Result<()> {
    self.mutate(doc_id, Mutation::Insert(position)).await
  }

  pub async fn toggle_comment(&self, doc_id: &DocumentId, position: Position) -> Result<()> {
    self.mutate(doc_id, Mutation::ToggleComment(position)).await
  }

  pub async fn swap_lines(&self, doc_id: &DocumentId, a: Position, b: Position) -> Result<()> {
    self.mutate(doc_id, Mutation::Swap(a, b)).await
  }

  pub async fn edit_comment_text(
    &self,
    doc_id: &DocumentId,
    position: Position,
    text: &str,
  ) -> Result<()> {
    self
      .mutate(doc_id, Mutation::EditComment(position, text.to_string()))
      .await
  }

  async fn mutate(&self, doc_id: &DocumentId, mutation: Mutation) -> Result<()> {
    let captured = self.read(doc_id, Document::selected)?;
    debug!(doc = %doc_id, action = mutation.name(), "sending mutation");

    match &mutation {
      Mutation::Delete(position) => self.service.delete_line(doc_id, *position).await?,
      Mutation::Insert(position) => self.service.insert_line(doc_id, *position).await?,
      Mutation::ToggleComment(position) => self.service.toggle_comment(doc_id, *position).await?,
      Mutation::Swap(a, b) => self.service.swap_lines(doc_id, *a, *b).await?,
      Mutation::EditComment(position, text) => {
        self
          .service
          .edit_comment_text(doc_id, *position, text)
          .await?
      },
    }

    let lines = self.fetch_lines(doc_id).await?;
    self.update(doc_id, |doc| {
      doc.replace_lines(lines)?;
      if let Some(edit) = mutation.structural() {
        doc.settle_selection(position::adjust(captured, edit));
      }
      doc.record_action();
      Ok(())
    })?;
    info!(doc = %doc_id, action = mutation.name(), "mutation applied");
    Ok(())
  }

  pub async fn undo(&self, doc_id: &DocumentId) -> Result<HistoryState> {
    self.step_history(doc_id, HistoryStep::Undo).await
  }

  pub async fn redo(&self, doc_id: &DocumentId) -> Result<HistoryState> {
    self.step_history(doc_id, HistoryStep::Redo).await
  }

  async fn step_history(&self, doc_id: &DocumentId, step: HistoryStep) -> Result<HistoryState> {
    self.read(doc_id, |_| ())?;
    let history = match step {
      HistoryStep::Undo => self.service.undo(doc_id).await?,
      HistoryStep::Redo => self.service.redo(doc_id).await?,
    };
    let lines = self.fetch_lines(doc_id).await?;
    self.update(doc_id, |doc| {
      doc.replace_lines(lines)?;
      doc.set_history(history.can_undo, history.can_redo);
      Ok(())
    })?;
    info!(doc = %doc_id, ?step, "history step applied");
    Ok(history)
  }

  /// Persist the document and return the path it was written to.
  pub async fn save_document(&self, doc_id: &DocumentId, file_path: Option<&str>) -> Result<String> {
    self.read(doc_id, |_| ())?;
    let saved = self.service.save_document(doc_id, file_path).await?;
    self.update(doc_id, |doc| {
      doc.set_file_path(saved.file_path.clone());
      Ok(())
    })?;
    info!(doc = %doc_id, path = %saved.file_path, "saved document");
    Ok(saved.file_path)
  }

  /// Close the remote document and drop the local entry.
  ///
  /// Failures of the remote close are logged and otherwise ignored.
  pub async fn close_document(&self, doc_id: &DocumentId) {
    if let Err(err) = self.service.close_document(doc_id).await {
      warn!(doc = %doc_id, %err, "failed to close remote document");
    }
    self.state.lock().documents.remove(doc_id);
  }

  /// Fetch every line, in pages of `page_size` when one is configured.
  ///
  /// Paging ends on a short or empty page. A page that is longer than asked
  /// for, or does not start at the requested offset, means the service is
  /// not paging and fails with [`ServiceError::Decode`].
  async fn fetch_lines(&self, doc_id: &DocumentId) -> std::result::Result<Vec<Line>, ServiceError> {
    let Some(page_size) = self.page_size else {
      return self.service.get_lines(doc_id, 0, None).await;
    };
    let mut lines = Vec::new();
    loop {
      let offset = lines.len();
      let page = self
        .service
        .get_lines(doc_id, offset, Some(page_size))
        .await?;
      if page.len() > page_size {
        return Err(ServiceError::Decode(format!(
          "asked for {page_size} lines at {offset}, got {}",
          page.len()
        )));
      }
      match page.first() {
        None => break,
        Some(first) if first.position != offset => {
          return Err(ServiceError::Decode(format!(
            "asked for lines from {offset}, got a page starting at {}",
            first.position
          )));
        },
        Some(_) => {},
      }
      let last_page = page.len() < page_size;
      lines.extend(page);
      if last_page {
        break;
      }
    }
    debug!(doc = %doc_id, lines = lines.len(), page_size, "fetched paged lines");
    Ok(lines)
  }

  fn read<R>(&self, doc_id: &DocumentId, f: impl FnOnce(&Document) -> R) -> Result<R> {
    self
      .with_document(doc_id, f)
      .ok_or_else(|| StoreError::UnknownDocument(doc_id.clone()))
  }

  fn update<R>(
    &self,
    doc_id: &DocumentId,
    f: impl FnOnce(&mut Document) -> Result<R>,
  ) -> Result<R> {
    let mut state = self.state.lock();
    let doc = state
      .documents
      .get_mut(doc_id)
      .ok_or_else(|| StoreError::UnknownDocument(doc_id.clone()))?;
    f(doc)
  }
}
