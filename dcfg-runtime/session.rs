//! The single edit session of a client.
//!
//! State changes go through [`SessionState::transition`]. Responses are
//! checked against two generations before they are fed in: the session
//! generation (advanced by open, cancel and a completed commit) and the
//! preview generation (advanced by every AF draft edit). A response whose
//! generation or target no longer matches is dropped and reported as
//! [`Outcome::Discarded`].

use std::{
  sync::Arc,
  time::Duration,
};

use dcfg_event::{
  AsyncHook,
  Generation,
  HookSender,
  Ticket,
};
use dcfg_lib::{
  DocType,
  DocumentId,
  Position,
  protocol::{
    CommitOutcome,
    MutexActiveRequest,
    MutexEntryRequest,
  },
  session::{
    AfFields,
    EditTarget,
    FevMode,
    Hydration,
    MutexEntry,
    MutexSession,
    SessionEvent,
    SessionState,
    TransitionError,
  },
};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{
  debug,
  info,
};

use crate::{
  Outcome,
  documents::{
    DocumentStore,
    StoreError,
  },
  preview::{
    PreviewEvent,
    PreviewHook,
  },
  service::{
    DocumentService,
    ServiceError,
  },
};

#[derive(Debug, Error)]
pub enum SessionError {
  #[error("no edit session is open")]
  NotOpen,
  #[error("the open session edits a {actual} line, not a {expected} line")]
  WrongDocType { expected: DocType, actual: DocType },
  #[error(transparent)]
  Transition(#[from] TransitionError),
  #[error(transparent)]
  Service(#[from] ServiceError),
  #[error(transparent)]
  Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
  /// The service accepted the edit; the session is closed.
  Committed { warnings: Vec<String> },
  /// The service reported errors; the session stays open and shows them.
  Rejected {
    errors:   Vec<String>,
    warnings: Vec<String>,
  },
  /// The session was replaced or cancelled while the commit was in flight.
  Discarded,
}

/// A live preview captured at the time of an AF draft edit.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRequest {
  session: Ticket,
  preview: Ticket,
  target:  EditTarget,
  fields:  AfFields,
}

impl PreviewRequest {
  pub fn target(&self) -> &EditTarget {
    &self.target
  }

  pub fn fields(&self) -> &AfFields {
    &self.fields
  }
}

#[derive(Debug, Default)]
struct SessionSlot {
  session: Generation,
  preview: Generation,
  state:   SessionState,
}

impl SessionSlot {
  fn apply(&mut self, event: SessionEvent) -> std::result::Result<(), TransitionError> {
    self.state = self.state.clone().transition(event)?;
    Ok(())
  }

  fn is_live(&self, ticket: Ticket, target: &EditTarget) -> bool {
    self.session.is_current(ticket)
      && self
        .state
        .target()
        .is_some_and(|current| current.same_line(target))
  }

  fn accepts_preview(&self, request: &PreviewRequest) -> bool {
    self.preview.is_current(request.preview)
      && matches!(&self.state, SessionState::Open(_))
      && self.is_live(request.session, &request.target)
  }

  /// Target of the open (not committing) session, checked for its type.
  fn open_target(&self, expected: DocType) -> Result<(Ticket, EditTarget)> {
    let SessionState::Open(session) = &self.state else {
      return Err(SessionError::NotOpen);
    };
    let target = session.target();
    if target.doc_type != expected {
      return Err(SessionError::WrongDocType {
        expected,
        actual: target.doc_type,
      });
    }
    Ok((self.session.current(), target.clone()))
  }
}

/// State shared between the engine handle and its preview hook.
pub(crate) struct SessionCore {
  service: Arc<dyn DocumentService>,
  slot:    Mutex<SessionSlot>,
}

impl SessionCore {
  fn new(service: Arc<dyn DocumentService>) -> Self {
    Self {
      service,
      slot: Mutex::new(SessionSlot::default()),
    }
  }

  pub(crate) async fn preview(&self, request: PreviewRequest) -> Result<Outcome> {
    if !self.slot.lock().accepts_preview(&request) {
      debug!(position = request.target.position, "preview superseded before dispatch");
      return Ok(Outcome::Discarded);
    }

    let response = self.hydrate_af(&request.target, Some(&request.fields)).await;

    let mut slot = self.slot.lock();
    if !slot.accepts_preview(&request) {
      debug!(position = request.target.position, "discarding stale preview");
      return Ok(Outcome::Discarded);
    }
    match response {
      Ok(fields) => {
        slot.apply(SessionEvent::Previewed(fields))?;
        Ok(Outcome::Applied)
      },
      Err(err) => {
        slot.apply(SessionEvent::PreviewFailed(err.detail().to_string()))?;
        Err(err.into())
      },
    }
  }

  async fn hydrate_af(
    &self,
    target: &EditTarget,
    fields: Option<&AfFields>,
  ) -> std::result::Result<AfFields, ServiceError> {
    let fields = fields.map(serde_json::to_value).transpose()?;
    let hydrated = self
      .service
      .hydrate_session(&target.doc_id, target.position, fields)
      .await?;
    Ok(hydrated.af_fields()?)
  }

  async fn hydrate_for_open(
    &self,
    target: &EditTarget,
  ) -> std::result::Result<Hydration, ServiceError> {
    match target.doc_type {
      DocType::Af => Ok(Hydration::Af(self.hydrate_af(target, None).await?)),
      DocType::Mutex => {
        self
          .service
          .hydrate_session(&target.doc_id, target.position, None)
          .await?;
        let session = self
          .service
          .get_mutex_session(&target.doc_id, target.position)
          .await?;
        Ok(Hydration::Mutex(session))
      },
    }
  }

  async fn submit(
    &self,
    target: &EditTarget,
    draft: Option<&AfFields>,
  ) -> std::result::Result<CommitOutcome, ServiceError> {
    if let Some(draft) = draft {
      self.hydrate_af(target, Some(draft)).await?;
    }
    self
      .service
      .commit_edit(&target.doc_id, target.position)
      .await
  }
}

enum MutexAction {
  AddMutexed(MutexEntryRequest),
  RemoveMutexed(MutexEntryRequest),
  AddActive(MutexActiveRequest),
  RemoveActive(MutexActiveRequest),
  SetFev(FevMode),
  SetNumActive(u32),
}

impl MutexAction {
  fn name(&self) -> &'static str {
    match self {
      Self::AddMutexed(_) => "add-mutexed",
      Self::RemoveMutexed(_) => "remove-mutexed",
      Self::AddActive(_) => "add-active",
      Self::RemoveActive(_) => "remove-active",
      Self::SetFev(_) => "set-fev",
      Self::SetNumActive(_) => "set-num-active",
    }
  }
}

/// Handle to the edit session. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct EditSessionEngine {
  core:       Arc<SessionCore>,
  documents:  DocumentStore,
  preview_tx: HookSender<PreviewEvent>,
}

impl EditSessionEngine {
  /// Create the engine. Live previews are debounced by `preview_debounce`
  /// when a tokio runtime is available.
  pub fn new(
    service: Arc<dyn DocumentService>,
    documents: DocumentStore,
    preview_debounce: Duration,
  ) -> Self {
    let core = Arc::new(SessionCore::new(service));
    let preview_tx = PreviewHook::new(core.clone(), preview_debounce).spawn();
    Self {
      core,
      documents,
      preview_tx,
    }
  }

  pub fn state(&self) -> SessionState {
    self.core.slot.lock().state.clone()
  }

  pub fn target(&self) -> Option<EditTarget> {
    self.core.slot.lock().state.target().cloned()
  }

  pub fn is_loading(&self) -> bool {
    self.core.slot.lock().state.is_loading()
  }

  pub fn is_committing(&self) -> bool {
    self.core.slot.lock().state.is_committing()
  }

  /// Open a session on a line, replacing any session that is open.
  pub async fn open_edit(
    &self,
    doc_id: DocumentId,
    position: Position,
    doc_type: DocType,
  ) -> Result<Outcome> {
    let target = EditTarget::new(doc_id, position, doc_type);
    let ticket = {
      let mut slot = self.core.slot.lock();
      let ticket = slot.session.advance();
      slot.preview.advance();
      slot.apply(SessionEvent::Open(target.clone()))?;
      ticket
    };
    self.preview_tx.send(PreviewEvent::Cancel);
    debug!(doc = %target.doc_id, position, %doc_type, "opening edit session");

    let hydrated = self.core.hydrate_for_open(&target).await;

    let mut slot = self.core.slot.lock();
    if !slot.is_live(ticket, &target) {
      debug!(position, "discarding hydrate of a replaced session");
      return Ok(Outcome::Discarded);
    }
    match hydrated {
      Ok(data) => {
        slot.apply(SessionEvent::Hydrated { target, data })?;
        Ok(Outcome::Applied)
      },
      Err(err) => {
        slot.session.advance();
        slot.apply(SessionEvent::Cancel)?;
        Err(err.into())
      },
    }
  }

  /// Replace the AF draft and schedule a debounced live preview of it.
  pub fn edit_af(&self, fields: AfFields) -> Result<()> {
    let request = {
      let mut slot = self.core.slot.lock();
      let (session, target) = slot.open_target(DocType::Af)?;
      slot.apply(SessionEvent::Edited(fields.clone()))?;
      PreviewRequest {
        session,
        preview: slot.preview.advance(),
        target,
        fields,
      }
    };
    self.preview_tx.send(PreviewEvent::Schedule(request));
    Ok(())
  }

  /// Preview request for the current draft, to run it without debouncing.
  pub fn preview_request(&self) -> Option<PreviewRequest> {
    let slot = self.core.slot.lock();
    let SessionState::Open(session) = &slot.state else {
      return None;
    };
    Some(PreviewRequest {
      session: slot.session.current(),
      preview: slot.preview.current(),
      target:  session.target().clone(),
      fields:  session.af_draft()?.clone(),
    })
  }

  pub async fn run_preview(&self, request: PreviewRequest) -> Result<Outcome> {
    self.core.preview(request).await
  }

  pub async fn add_mutexed(
    &self,
    template: Option<String>,
    net_pattern: impl Into<String>,
    is_regex: bool,
  ) -> Result<Outcome> {
    self
      .round_trip(MutexAction::AddMutexed(MutexEntryRequest {
        template,
        net_pattern: net_pattern.into(),
        is_regex,
      }))
      .await
  }

  pub async fn remove_mutexed(
    &self,
    template: Option<String>,
    net_pattern: impl Into<String>,
    is_regex: bool,
  ) -> Result<Outcome> {
    self
      .round_trip(MutexAction::RemoveMutexed(MutexEntryRequest {
        template,
        net_pattern: net_pattern.into(),
        is_regex,
      }))
      .await
  }

  pub async fn add_active(
    &self,
    template: Option<String>,
    net_name: impl Into<String>,
  ) -> Result<Outcome> {
    self
      .round_trip(MutexAction::AddActive(MutexActiveRequest {
        template,
        net_name: net_name.into(),
      }))
      .await
  }

  pub async fn remove_active(
    &self,
    template: Option<String>,
    net_name: impl Into<String>,
  ) -> Result<Outcome> {
    self
      .round_trip(MutexAction::RemoveActive(MutexActiveRequest {
        template,
        net_name: net_name.into(),
      }))
      .await
  }

  /// Make a mutexed entry active as well.
  pub async fn promote_to_active(&self, entry: &MutexEntry) -> Result<Outcome> {
    self
      .add_active(
        entry.template_name().map(str::to_string),
        entry.net_name(),
      )
      .await
  }

  pub async fn set_fev(&self, fev: FevMode) -> Result<Outcome> {
    self.round_trip(MutexAction::SetFev(fev)).await
  }

  pub async fn set_num_active(&self, num_active: u32) -> Result<Outcome> {
    self.round_trip(MutexAction::SetNumActive(num_active)).await
  }

  async fn round_trip(&self, action: MutexAction) -> Result<Outcome> {
    let (ticket, target) = self.core.slot.lock().open_target(DocType::Mutex)?;
    let (doc_id, position) = (&target.doc_id, target.position);
    let service = &self.core.service;
    debug!(doc = %doc_id, position, action = action.name(), "mutex round-trip");

    let session: MutexSession = match &action {
      MutexAction::AddMutexed(request) => {
        service
          .mutex_add_mutexed(doc_id, position, request)
          .await?
      },
      MutexAction::RemoveMutexed(request) => {
        service
          .mutex_remove_mutexed(doc_id, position, request)
          .await?
      },
      MutexAction::AddActive(request) => service.mutex_add_active(doc_id, position, request).await?,
      MutexAction::RemoveActive(request) => {
        service
          .mutex_remove_active(doc_id, position, request)
          .await?
      },
      MutexAction::SetFev(fev) => service.mutex_set_fev(doc_id, position, *fev).await?,
      MutexAction::SetNumActive(num_active) => {
        service
          .mutex_set_num_active(doc_id, position, *num_active)
          .await?
      },
    };

    let mut slot = self.core.slot.lock();
    if !slot.is_live(ticket, &target) {
      debug!(position, action = action.name(), "discarding stale mutex response");
      return Ok(Outcome::Discarded);
    }
    slot.apply(SessionEvent::MutexRefreshed(session))?;
    Ok(Outcome::Applied)
  }

  /// Validate and apply the open session.
  ///
  /// AF sessions first send their draft so the service commits exactly what
  /// the user sees. On success the document's lines are refetched.
  pub async fn commit(&self) -> Result<CommitResult> {
    let (ticket, target, draft) = {
      let mut slot = self.core.slot.lock();
      let SessionState::Open(session) = &slot.state else {
        return Err(SessionError::NotOpen);
      };
      let target = session.target().clone();
      let draft = session.af_draft().cloned();
      slot.preview.advance();
      slot.apply(SessionEvent::CommitRequested)?;
      (slot.session.current(), target, draft)
    };
    self.preview_tx.send(PreviewEvent::Cancel);
    debug!(doc = %target.doc_id, position = target.position, "committing edit");

    let response = self.core.submit(&target, draft.as_ref()).await;

    let (live, outcome) = {
      let mut slot = self.core.slot.lock();
      let live = slot.session.is_current(ticket)
        && matches!(&slot.state, SessionState::Committing(session) if session.target().same_line(&target));
      let outcome = match response {
        Err(err) => {
          if live {
            slot.apply(SessionEvent::CommitFailed)?;
          }
          return Err(err.into());
        },
        Ok(outcome) => outcome,
      };
      if !outcome.is_accepted() {
        if !live {
          return Ok(CommitResult::Discarded);
        }
        slot.apply(SessionEvent::CommitRejected {
          errors:   outcome.errors.clone(),
          warnings: outcome.warnings.clone(),
        })?;
        return Ok(CommitResult::Rejected {
          errors:   outcome.errors,
          warnings: outcome.warnings,
        });
      }
      if live {
        slot.session.advance();
        slot.apply(SessionEvent::Committed)?;
      }
      (live, outcome)
    };

    info!(doc = %target.doc_id, position = target.position, "edit committed");
    self.documents.refresh_lines(&target.doc_id).await?;
    if live {
      Ok(CommitResult::Committed {
        warnings: outcome.warnings,
      })
    } else {
      Ok(CommitResult::Discarded)
    }
  }

  /// Close the session from any state. Nothing is sent to the service.
  pub fn cancel_edit(&self) {
    {
      let mut slot = self.core.slot.lock();
      slot.session.advance();
      slot.preview.advance();
      slot.state = std::mem::take(&mut slot.state)
        .transition(SessionEvent::Cancel)
        .unwrap_or_default();
    }
    self.preview_tx.send(PreviewEvent::Cancel);
  }
}
