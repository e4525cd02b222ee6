//! Handler for `/toestemmingen` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/toestemmingen/:record_id` | Record a decision on an open request |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  response::IntoResponse,
};
use proeve_core::{
  leercoach::{ToestemmingBesluit, ToestemmingRecord},
  store::AanvraagStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{aanvragen::HandelingBody, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct BesluitBody {
  pub besluit:   ToestemmingBesluit,
  #[serde(flatten)]
  pub handeling: HandelingBody,
}

/// `POST /toestemmingen/:record_id` — body: `{"besluit":"gegeven"|"geweigerd"}`.
///
/// Returns the newly-appended decision record; the `gevraagd` record it
/// answers is left untouched.
pub async fn decide<S>(
  State(store): State<Arc<S>>,
  Path(record_id): Path<Uuid>,
  Json(body): Json<BesluitBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let record: ToestemmingRecord = store
    .set_leercoach_toestemming(record_id, body.besluit, body.handeling.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(record))
}
