use std::{
  sync::Arc,
  time::Duration,
};

use dcfg_event::AsyncHook;
use tokio::time::Instant;
use tracing::debug;

use crate::session::{
  PreviewRequest,
  SessionCore,
};

#[derive(Clone)]
pub(crate) enum PreviewEvent {
  Schedule(PreviewRequest),
  Cancel,
}

/// Debounces AF draft edits into live preview hydrates.
pub(crate) struct PreviewHook {
  core:     Arc<SessionCore>,
  debounce: Duration,
  pending:  Option<PreviewRequest>,
}

impl PreviewHook {
  pub(crate) fn new(core: Arc<SessionCore>, debounce: Duration) -> Self {
    Self {
      core,
      debounce,
      pending: None,
    }
  }
}

impl AsyncHook for PreviewHook {
  type Event = PreviewEvent;

  fn handle_event(&mut self, event: Self::Event, _timeout: Option<Instant>) -> Option<Instant> {
    match event {
      PreviewEvent::Schedule(request) => {
        self.pending = Some(request);
        Some(Instant::now() + self.debounce)
      },
      PreviewEvent::Cancel => {
        self.pending = None;
        None
      },
    }
  }

  fn finish_debounce(&mut self) {
    let Some(request) = self.pending.take() else {
      return;
    };
    let core = self.core.clone();
    tokio::spawn(async move {
      if let Err(err) = core.preview(request).await {
        debug!(%err, "live preview failed");
      }
    });
  }
}
