//! Line search and net lookup that keep only the latest answer.

use std::{
  sync::Arc,
  time::Duration,
};

use dcfg_event::{
  AsyncHook,
  Latest,
  HookSender,
  Ticket,
};
use dcfg_lib::{
  DocumentId,
  Line,
  protocol::{
    NetMatches,
    NetQuery,
    SearchQuery,
  },
};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::{
  Outcome,
  service::{
    DocumentService,
    ServiceError,
  },
};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
  pub doc_id: DocumentId,
  pub query:  SearchQuery,
  pub lines:  Vec<Line>,
}

#[derive(Default)]
struct SearchSlots {
  lines: Latest<SearchResults>,
  nets:  Latest<NetMatches>,
}

struct SearchCore {
  service: Arc<dyn DocumentService>,
  slots:   Mutex<SearchSlots>,
}

impl SearchCore {
  async fn run(
    &self,
    ticket: Ticket,
    doc_id: DocumentId,
    query: SearchQuery,
  ) -> Result<Outcome, ServiceError> {
    if !self.slots.lock().lines.is_current(ticket) {
      return Ok(Outcome::Discarded);
    }
    let lines = self.service.search_lines(&doc_id, &query).await?;
    let found = lines.len();
    let results = SearchResults {
      doc_id,
      query,
      lines,
    };
    if self.slots.lock().lines.fulfill(ticket, results) {
      debug!(found, "search results updated");
      Ok(Outcome::Applied)
    } else {
      debug!("discarding superseded search results");
      Ok(Outcome::Discarded)
    }
  }
}

#[derive(Clone)]
struct PendingSearch {
  ticket: Ticket,
  doc_id: DocumentId,
  query:  SearchQuery,
}

struct SearchHook {
  core:     Arc<SearchCore>,
  debounce: Duration,
  pending:  Option<PendingSearch>,
}

impl AsyncHook for SearchHook {
  type Event = PendingSearch;

  fn handle_event(&mut self, event: Self::Event, _timeout: Option<Instant>) -> Option<Instant> {
    self.pending = Some(event);
    Some(Instant::now() + self.debounce)
  }

  fn finish_debounce(&mut self) {
    let Some(PendingSearch {
      ticket,
      doc_id,
      query,
    }) = self.pending.take()
    else {
      return;
    };
    let core = self.core.clone();
    tokio::spawn(async move {
      if let Err(err) = core.run(ticket, doc_id, query).await {
        debug!(%err, "search failed");
      }
    });
  }
}

/// Search and net lookup where a newer request always supersedes an older
/// one, no matter which response arrives first.
#[derive(Clone)]
pub struct LineSearch {
  core: Arc<SearchCore>,
  tx:   HookSender<PendingSearch>,
}

impl LineSearch {
  pub fn new(service: Arc<dyn DocumentService>, debounce: Duration) -> Self {
    let core = Arc::new(SearchCore {
      service,
      slots: Mutex::new(SearchSlots::default()),
    });
    let tx = SearchHook {
      core: core.clone(),
      debounce,
      pending: None,
    }
    .spawn();
    Self { core, tx }
  }

  /// Search immediately.
  pub async fn search(&self, doc_id: DocumentId, query: SearchQuery) -> Result<Outcome, ServiceError> {
    let ticket = self.core.slots.lock().lines.begin();
    self.core.run(ticket, doc_id, query).await
  }

  /// Search once typing pauses. Results of earlier queries stop counting
  /// right away.
  pub fn search_as_you_type(&self, doc_id: DocumentId, query: SearchQuery) {
    let ticket = self.core.slots.lock().lines.begin();
    self.tx.send(PendingSearch {
      ticket,
      doc_id,
      query,
    });
  }

  pub async fn query_nets(&self, query: &NetQuery) -> Result<Outcome, ServiceError> {
    let ticket = self.core.slots.lock().nets.begin();
    let matches = self.core.service.query_nets(query).await?;
    if self.core.slots.lock().nets.fulfill(ticket, matches) {
      Ok(Outcome::Applied)
    } else {
      debug!("discarding superseded net matches");
      Ok(Outcome::Discarded)
    }
  }

  pub fn results(&self) -> Option<SearchResults> {
    self.core.slots.lock().lines.get().cloned()
  }

  pub fn nets(&self) -> Option<NetMatches> {
    self.core.slots.lock().nets.get().cloned()
  }

  pub fn clear(&self) {
    let mut slots = self.core.slots.lock();
    slots.lines.clear();
    slots.nets.clear();
  }
}
