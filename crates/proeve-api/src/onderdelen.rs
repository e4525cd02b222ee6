//! Handlers for onderdeel endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`  | `/aanvragen/:id/onderdelen` | Attach a kerntaakonderdeel |
//! | `PATCH` | `/onderdelen/:id/beoordelaar` | Assign or clear the beoordelaar |
//! | `PATCH` | `/onderdelen/:id/startdatum` | Set or clear the scheduled start |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use proeve_core::{onderdeel::Onderdeel, store::AanvraagStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  aanvragen::{HandelingBody, OnderdeelBody},
  error::ApiError,
};

// ─── Add ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddBody {
  #[serde(flatten)]
  pub onderdeel: OnderdeelBody,
  #[serde(flatten)]
  pub handeling: HandelingBody,
}

/// `POST /aanvragen/:id/onderdelen` — returns 201 + the stored onderdeel.
pub async fn add<S>(
  State(store): State<Arc<S>>,
  Path(aanvraag_id): Path<Uuid>,
  Json(body): Json<AddBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let onderdeel: Onderdeel = store
    .add_onderdeel(aanvraag_id, body.onderdeel.into(), body.handeling.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(onderdeel)))
}

// ─── Beoordelaar ──────────────────────────────────────────────────────────────

/// Body of `PATCH /onderdelen/:id/beoordelaar`. A `null` (or absent)
/// `beoordelaar_id` clears the assignment.
#[derive(Debug, Deserialize)]
pub struct BeoordelaarBody {
  pub beoordelaar_id: Option<Uuid>,
  #[serde(flatten)]
  pub handeling:      HandelingBody,
}

/// `PATCH /onderdelen/:id/beoordelaar`
pub async fn update_beoordelaar<S>(
  State(store): State<Arc<S>>,
  Path(onderdeel_id): Path<Uuid>,
  Json(body): Json<BeoordelaarBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .update_beoordelaar(onderdeel_id, body.beoordelaar_id, body.handeling.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Startdatum ───────────────────────────────────────────────────────────────

/// Body of `PATCH /onderdelen/:id/startdatum`. A `null` (or absent)
/// `startdatum` clears the schedule.
#[derive(Debug, Deserialize)]
pub struct StartdatumBody {
  pub startdatum: Option<DateTime<Utc>>,
  #[serde(flatten)]
  pub handeling:  HandelingBody,
}

/// `PATCH /onderdelen/:id/startdatum`
pub async fn plan<S>(
  State(store): State<Arc<S>>,
  Path(onderdeel_id): Path<Uuid>,
  Json(body): Json<StartdatumBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .plan_onderdeel(onderdeel_id, body.startdatum, body.handeling.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}
