//! HTTP implementation of [`DocumentService`] against the dcfg backend.
//!
//! Every operation is one JSON request below `/api`. Status codes are mapped
//! onto [`ServiceError`]: 404 is `NotFound`, any other failure status is
//! `Rejected` carrying the backend's `detail` message, connection problems
//! and timeouts are `Transport`.

mod routes;

use async_trait::async_trait;
use dcfg_lib::{
  DocType,
  DocumentId,
  Line,
  Position,
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
    FevMode,
    MutexSession,
  },
};
use dcfg_runtime::{
  ServiceConfig,
  ServiceError,
  service::DocumentService,
};
use reqwest::{
  Client,
  Method,
  RequestBuilder,
  StatusCode,
  Url,
};
use serde::de::DeserializeOwned;
use serde_json::{
  Value,
  json,
};
use thiserror::Error;
use tracing::debug;

pub use crate::routes::Route;

type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("invalid service url {url:?}: {reason}")]
  InvalidBaseUrl { url: String, reason: String },
  #[error("failed to build http client: {0}")]
  Build(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct HttpDocumentService {
  client: Client,
  base:   Url,
}

impl HttpDocumentService {
  pub fn new(config: &ServiceConfig) -> std::result::Result<Self, ClientError> {
    let base = Url::parse(&config.base_url).map_err(|err| {
      ClientError::InvalidBaseUrl {
        url:    config.base_url.clone(),
        reason: err.to_string(),
      }
    })?;
    if base.cannot_be_a_base() {
      return Err(ClientError::InvalidBaseUrl {
        url:    config.base_url.clone(),
        reason: "not a hierarchical url".to_string(),
      });
    }
    let client = Client::builder().timeout(config.timeout()).build()?;
    Ok(Self { client, base })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn request(&self, method: Method, url: Url) -> RequestBuilder {
    debug!(%method, %url, "document service request");
    self.client.request(method, url)
  }

  fn get(&self, route: &Route) -> Result<RequestBuilder> {
    Ok(self.request(Method::GET, route.url(&self.base)?))
  }

  fn post(&self, route: &Route) -> Result<RequestBuilder> {
    Ok(self.request(Method::POST, route.url(&self.base)?))
  }

  fn put(&self, route: &Route) -> Result<RequestBuilder> {
    Ok(self.request(Method::PUT, route.url(&self.base)?))
  }

  /// Send and return the body of a successful response.
  async fn send(&self, request: RequestBuilder) -> Result<String> {
    let response = request.send().await.map_err(transport_error)?;
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;
    if status.is_success() {
      Ok(body)
    } else {
      let err = status_error(status, &body);
      debug!(%status, error = %err, "document service refused request");
      Err(err)
    }
  }

  async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
    let body = self.send(request).await?;
    Ok(serde_json::from_str(&body)?)
  }

  async fn execute(&self, request: RequestBuilder) -> Result<()> {
    self.send(request).await.map(drop)
  }
}

fn transport_error(err: reqwest::Error) -> ServiceError {
  if err.is_decode() {
    ServiceError::Decode(err.to_string())
  } else {
    ServiceError::Transport(err.to_string())
  }
}

/// Map a failure status and its body onto a [`ServiceError`].
pub fn status_error(status: StatusCode, body: &str) -> ServiceError {
  let detail = error_detail(body).unwrap_or_else(|| {
    status
      .canonical_reason()
      .map_or_else(|| status.to_string(), str::to_string)
  });
  if status == StatusCode::NOT_FOUND {
    ServiceError::NotFound(detail)
  } else {
    ServiceError::Rejected {
      status: status.as_u16(),
      detail,
    }
  }
}

/// The `detail` of an error body. Validation failures carry a list of
/// objects with a `msg` each; those are joined.
fn error_detail(body: &str) -> Option<String> {
  let value: Value = serde_json::from_str(body).ok()?;
  match value.get("detail")? {
    Value::String(detail) => Some(detail.clone()),
    Value::Array(items) => {
      let messages: Vec<&str> = items
        .iter()
        .filter_map(|item| item.get("msg").and_then(Value::as_str))
        .collect();
      (!messages.is_empty()).then(|| messages.join("; "))
    },
    Value::Null => None,
    other => Some(other.to_string()),
  }
}

fn with_query<'a>(mut url: Url, pairs: impl IntoIterator<Item = (&'a str, String)>) -> Url {
  url.query_pairs_mut().extend_pairs(pairs);
  url
}

#[async_trait]
impl DocumentService for HttpDocumentService {
  async fn load_document(
    &self,
    doc_id: &DocumentId,
    file_path: &str,
    doc_type: DocType,
  ) -> Result<Summary> {
    let request = self.post(&Route::load())?.json(&json!({
      "doc_id": doc_id,
      "file_path": file_path,
      "doc_type": doc_type,
    }));
    self.call(request).await
  }

  async fn list_documents(&self) -> Result<Vec<Summary>> {
    self.call(self.get(&Route::documents())?).await
  }

  async fn close_document(&self, doc_id: &DocumentId) -> Result<()> {
    let url = Route::document(doc_id).url(&self.base)?;
    self.execute(self.request(Method::DELETE, url)).await
  }

  async fn save_document(
    &self,
    doc_id: &DocumentId,
    file_path: Option<&str>,
  ) -> Result<SaveOutcome> {
    let request = self
      .post(&Route::document(doc_id).join("save"))?
      .json(&json!({ "file_path": file_path }));
    self.call(request).await
  }

  async fn get_lines(
    &self,
    doc_id: &DocumentId,
    offset: usize,
    limit: Option<usize>,
  ) -> Result<Vec<Line>> {
    let mut pairs = vec![("offset", offset.to_string())];
    if let Some(limit) = limit {
      pairs.push(("limit", limit.to_string()));
    }
    let url = with_query(Route::lines(doc_id).url(&self.base)?, pairs);
    self.call(self.request(Method::GET, url)).await
  }

  async fn search_lines(&self, doc_id: &DocumentId, query: &SearchQuery) -> Result<Vec<Line>> {
    let mut pairs = vec![
      ("q", query.query.clone()),
      ("regex", query.use_regex.to_string()),
    ];
    if let Some(status) = query.status_filter {
      pairs.push(("status", status.as_str().to_string()));
    }
    let url = with_query(Route::document(doc_id).join("search").url(&self.base)?, pairs);
    self.call(self.request(Method::GET, url)).await
  }

  async fn delete_line(&self, doc_id: &DocumentId, position: Position) -> Result<()> {
    let route = Route::line(doc_id, position).join("delete");
    self.execute(self.post(&route)?).await
  }

  async fn insert_line(&self, doc_id: &DocumentId, position: Position) -> Result<()> {
    let route = Route::line(doc_id, position).join("insert");
    self.execute(self.post(&route)?).await
  }

  async fn toggle_comment(&self, doc_id: &DocumentId, position: Position) -> Result<()> {
    let route = Route::line(doc_id, position).join("toggle-comment");
    self.execute(self.post(&route)?).await
  }

  async fn swap_lines(&self, doc_id: &DocumentId, a: Position, b: Position) -> Result<()> {
    let request = self
      .post(&Route::document(doc_id).join("swap"))?
      .json(&json!({ "a": a, "b": b }));
    self.execute(request).await
  }

  async fn edit_comment_text(
    &self,
    doc_id: &DocumentId,
    position: Position,
    text: &str,
  ) -> Result<()> {
    let request = self
      .put(&Route::line(doc_id, position).join("comment"))?
      .json(&json!({ "text": text }));
    self.execute(request).await
  }

  async fn undo(&self, doc_id: &DocumentId) -> Result<HistoryState> {
    self.call(self.post(&Route::document(doc_id).join("undo"))?).await
  }

  async fn redo(&self, doc_id: &DocumentId) -> Result<HistoryState> {
    self.call(self.post(&Route::document(doc_id).join("redo"))?).await
  }

  async fn hydrate_session(
    &self,
    doc_id: &DocumentId,
    position: Position,
    fields: Option<Value>,
  ) -> Result<Hydrated> {
    let line = Route::line(doc_id, position);
    let request = match fields {
      None => self.post(&line.join("edit"))?,
      Some(fields) => self.put(&line.join("session"))?.json(&json!({ "fields": fields })),
    };
    self.call(request).await
  }

  async fn commit_edit(&self, doc_id: &DocumentId, position: Position) -> Result<CommitOutcome> {
    let route = Route::line(doc_id, position).join("commit");
    self.call(self.post(&route)?).await
  }

  async fn get_mutex_session(
    &self,
    doc_id: &DocumentId,
    position: Position,
  ) -> Result<MutexSession> {
    self.call(self.get(&Route::mutex(doc_id, position, "session"))?).await
  }

  async fn mutex_add_mutexed(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexEntryRequest,
  ) -> Result<MutexSession> {
    let route = Route::mutex(doc_id, position, "add-mutexed");
    self.call(self.post(&route)?.json(request)).await
  }

  async fn mutex_remove_mutexed(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexEntryRequest,
  ) -> Result<MutexSession> {
    let route = Route::mutex(doc_id, position, "remove-mutexed");
    self.call(self.post(&route)?.json(request)).await
  }

  async fn mutex_add_active(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexActiveRequest,
  ) -> Result<MutexSession> {
    let route = Route::mutex(doc_id, position, "add-active");
    self.call(self.post(&route)?.json(request)).await
  }

  async fn mutex_remove_active(
    &self,
    doc_id: &DocumentId,
    position: Position,
    request: &MutexActiveRequest,
  ) -> Result<MutexSession> {
    let route = Route::mutex(doc_id, position, "remove-active");
    self.call(self.post(&route)?.json(request)).await
  }

  async fn mutex_set_fev(
    &self,
    doc_id: &DocumentId,
    position: Position,
    fev: FevMode,
  ) -> Result<MutexSession> {
    let route = Route::mutex(doc_id, position, "set-fev");
    let request = self.post(&route)?.json(&json!({ "fev": fev.as_str() }));
    self.call(request).await
  }

  async fn mutex_set_num_active(
    &self,
    doc_id: &DocumentId,
    position: Position,
    num_active: u32,
  ) -> Result<MutexSession> {
    let route = Route::mutex(doc_id, position, "set-num-active");
    let request = self.post(&route)?.json(&json!({ "value": num_active }));
    self.call(request).await
  }

  async fn query_nets(&self, query: &NetQuery) -> Result<NetMatches> {
    self.call(self.post(&Route::query_nets())?.json(query)).await
  }
}
