//! URL layout of the backend REST API.

use dcfg_lib::{
  DocumentId,
  Position,
};
use dcfg_runtime::ServiceError;
use reqwest::Url;

/// Path below the service base url, built one segment at a time so document
/// ids are percent-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
  segments: Vec<String>,
}

impl Route {
  fn api() -> Self {
    Self {
      segments: vec!["api".to_string()],
    }
  }

  pub fn documents() -> Self {
    Self::api().join("documents")
  }

  pub fn load() -> Self {
    Self::documents().join("load")
  }

  pub fn query_nets() -> Self {
    Self::api().join("query-nets")
  }

  pub fn document(doc_id: &DocumentId) -> Self {
    Self::documents().join(doc_id.as_str())
  }

  pub fn lines(doc_id: &DocumentId) -> Self {
    Self::document(doc_id).join("lines")
  }

  pub fn line(doc_id: &DocumentId, position: Position) -> Self {
    Self::lines(doc_id).join(position.to_string())
  }

  pub fn mutex(doc_id: &DocumentId, position: Position, action: &str) -> Self {
    Self::line(doc_id, position).join("mutex").join(action)
  }

  pub fn join(mut self, segment: impl Into<String>) -> Self {
    self.segments.push(segment.into());
    self
  }

  /// Resolve against `base`, keeping any path prefix the base already has.
  pub fn url(&self, base: &Url) -> Result<Url, ServiceError> {
    let mut url = base.clone();
    url
      .path_segments_mut()
      .map_err(|()| ServiceError::Transport(format!("invalid service url: {base}")))?
      .pop_if_empty()
      .extend(&self.segments);
    Ok(url)
  }
}
