//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Domain failures are classified via [`proeve_core::Error::kind`]: missing
//! entities map to 404, status preconditions to 409, referential and
//! consistency violations to 422. Anything the chain walk cannot classify
//! is a 500.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use proeve_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unprocessable: {0}")]
  Unprocessable(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  /// Classify a store error by walking its source chain until the domain
  /// error surfaces.
  pub fn from_store<E>(error: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let mut current: Option<&(dyn std::error::Error + 'static)> =
      Some(&error);
    while let Some(err) = current {
      if let Some(domein) = err.downcast_ref::<proeve_core::Error>() {
        let message = domein.to_string();
        return match domein.kind() {
          ErrorKind::NotFound => Self::NotFound(message),
          ErrorKind::Precondition => Self::Conflict(message),
          ErrorKind::Consistency => Self::Unprocessable(message),
          ErrorKind::Other => Self::Internal(message),
        };
      }
      current = err.source();
    }
    Self::Internal(error.to_string())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Unprocessable(m) => {
        (StatusCode::UNPROCESSABLE_ENTITY, m.clone())
      }
      ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
