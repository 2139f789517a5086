//! Debounced background hooks.
//!
//! Interactive input (typing an AF field, a search query) arrives far
//! faster than the document service should be asked about it. A hook runs
//! as a tokio task and only ever looks at the most recent event: sending
//! overwrites whatever the task has not picked up yet, so senders never wait
//! and a burst of input costs one slot. Each event the hook sees may push
//! its deadline out, and the hook acts once input has been quiet until then.

use std::sync::Arc;

use tokio::{
  sync::watch,
  time::Instant,
};

pub trait AsyncHook: Sync + Send + 'static + Sized {
  type Event: Clone + Sync + Send + 'static;

  /// Handle the latest event and return the deadline to wait for.
  ///
  /// `timeout` is the deadline currently pending, if any. Returning `None`
  /// drops it without calling [`AsyncHook::finish_debounce`].
  fn handle_event(&mut self, event: Self::Event, timeout: Option<Instant>) -> Option<Instant>;

  /// Called once the deadline passes without a newer event.
  fn finish_debounce(&mut self);

  /// Start the hook and return the handle feeding it.
  ///
  /// Outside of a tokio runtime no task is spawned and events are never
  /// handled; callers without a runtime drive the work directly instead.
  fn spawn(self) -> HookSender<Self::Event> {
    let (tx, rx) = watch::channel(None);
    if tokio::runtime::Handle::try_current().is_ok() {
      tokio::spawn(run(self, rx));
    }
    HookSender { tx: Arc::new(tx) }
  }
}

/// Feeds a spawned hook. Cloning shares the same hook.
pub struct HookSender<E> {
  tx: Arc<watch::Sender<Option<E>>>,
}

impl<E> Clone for HookSender<E> {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
    }
  }
}

impl<E> HookSender<E> {
  /// Replace the pending event. Never blocks, also when the hook is not
  /// running.
  pub fn send(&self, event: E) {
    self.tx.send_replace(Some(event));
  }

  /// Whether a hook task is still listening.
  pub fn is_running(&self) -> bool {
    !self.tx.is_closed()
  }
}

async fn run<Hook: AsyncHook>(mut hook: Hook, mut rx: watch::Receiver<Option<Hook::Event>>) {
  let mut deadline = None;
  loop {
    let changed = match deadline {
      Some(until) => {
        match tokio::time::timeout_at(until, rx.changed()).await {
          Ok(changed) => changed,
          Err(_) => {
            hook.finish_debounce();
            deadline = None;
            continue;
          },
        }
      },
      None => rx.changed().await,
    };
    if changed.is_err() {
      tracing::trace!("hook sender dropped");
      break;
    }
    let Some(event) = rx.borrow_and_update().clone() else {
      continue;
    };
    deadline = hook.handle_event(event, deadline);
  }
}
