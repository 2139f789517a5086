use std::sync::Arc;

use dcfg_lib::{
  DocumentId,
  problems::{
    self,
    ConflictGroup,
    Problem,
  },
};
use tracing::debug;

use crate::{
  config::EngineConfig,
  documents::DocumentStore,
  search::LineSearch,
  service::DocumentService,
  session::EditSessionEngine,
};

/// The document store, edit session and search of one client, wired to a
/// shared service.
#[derive(Clone)]
pub struct Workspace {
  pub documents: DocumentStore,
  pub session:   EditSessionEngine,
  pub search:    LineSearch,
}

impl Workspace {
  pub fn create(service: Arc<dyn DocumentService>, config: &EngineConfig) -> Self {
    let documents = DocumentStore::new(service.clone()).with_page_size(config.page_size);
    let session =
      EditSessionEngine::new(service.clone(), documents.clone(), config.preview_debounce());
    let search = LineSearch::new(service, config.search_debounce());
    Self {
      documents,
      session,
      search,
    }
  }

  /// Problems of a loaded document, most severe first.
  pub fn problems(&self, doc_id: &DocumentId) -> Vec<Problem> {
    self
      .documents
      .with_document(doc_id, |doc| problems::sorted_problems(doc_id, doc.lines()))
      .unwrap_or_default()
  }

  pub fn conflict_groups(&self, doc_id: &DocumentId) -> Vec<ConflictGroup> {
    self
      .documents
      .with_document(doc_id, |doc| {
        problems::derive_conflict_groups(doc_id, doc.lines())
      })
      .unwrap_or_default()
  }

  /// Cancel the edit session and close every loaded document.
  pub async fn dispose(&self) {
    self.session.cancel_edit();
    self.search.clear();
    for doc_id in self.documents.document_ids() {
      self.documents.close_document(&doc_id).await;
    }
    debug!("workspace disposed");
  }
}
