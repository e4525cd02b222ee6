//! Handlers for `/aanvragen` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/aanvragen` | Body: [`CreateBody`]; returns 201 + aanvraag |
//! | `GET`  | `/aanvragen` | `?locatie_id` required; optional `zoek`, `limit`, `offset` |
//! | `GET`  | `/aanvragen/:id` | Full aggregate; 404 if not found |
//! | `POST` | `/aanvragen/:id/indienen` | Submit; returns the resulting status |
//! | `POST` | `/aanvragen/:id/intrekken` | Withdraw |
//! | `POST` | `/aanvragen/:id/cursussen` | Link a cursus |
//! | `DELETE` | `/aanvragen/:id/cursussen/:cursus_id` | Unlink a cursus |
//! | `POST` | `/aanvragen/:id/cursussen/:cursus_id/hoofd` | Promote to hoofdcursus |
//! | `POST` | `/aanvragen/:id/leercoach` | Request leercoach toestemming |
//! | `GET`  | `/aanvragen/:id/voorwaarden` | Prerequisite evaluation |
//! | `GET`  | `/aanvragen/:id/status` | Status ledger, oldest first |
//! | `GET`  | `/aanvragen/:id/toestemmingen` | Permission ledger, oldest first |
//! | `GET`  | `/aanvragen/:id/events` | Audit trail, oldest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use proeve_core::{
  aanvraag::{Aanvraag, AanvraagSoort, Handeling, NieuweAanvraag},
  cursus::{CursusLink, NieuweCursusLink},
  event::EventRecord,
  leercoach::ToestemmingRecord,
  onderdeel::NieuwOnderdeel,
  status::StatusRecord,
  store::{AanvraagDetail, AanvraagPage, AanvraagQuery, AanvraagStore},
  voorwaarden::VoorwaardenResultaat,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Shared body fragments ────────────────────────────────────────────────────

/// The acting user carried by every mutating request body.
#[derive(Debug, Deserialize)]
pub struct HandelingBody {
  pub verricht_door: Uuid,
  pub reden:         Option<String>,
}

impl From<HandelingBody> for Handeling {
  fn from(b: HandelingBody) -> Self {
    Handeling { verricht_door: b.verricht_door, reden: b.reden }
  }
}

#[derive(Debug, Deserialize)]
pub struct CursusLinkBody {
  pub cursus_id:      Uuid,
  #[serde(default)]
  pub is_hoofdcursus: bool,
  pub opmerkingen:    Option<String>,
}

impl From<CursusLinkBody> for NieuweCursusLink {
  fn from(b: CursusLinkBody) -> Self {
    NieuweCursusLink {
      cursus_id:      b.cursus_id,
      is_hoofdcursus: b.is_hoofdcursus,
      opmerkingen:    b.opmerkingen,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct OnderdeelBody {
  pub kto_id:         Uuid,
  pub beoordelaar_id: Option<Uuid>,
  pub startdatum:     Option<chrono::DateTime<chrono::Utc>>,
  pub opmerkingen:    Option<String>,
}

impl From<OnderdeelBody> for NieuwOnderdeel {
  fn from(b: OnderdeelBody) -> Self {
    NieuwOnderdeel {
      kto_id:         b.kto_id,
      beoordelaar_id: b.beoordelaar_id,
      startdatum:     b.startdatum,
      opmerkingen:    b.opmerkingen,
    }
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /aanvragen`.
#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub kandidaat_id: Uuid,
  pub locatie_id:   Uuid,
  pub soort:        AanvraagSoort,
  pub leercoach_id: Option<Uuid>,
  pub opmerkingen:  Option<String>,
  pub cursussen:    Vec<CursusLinkBody>,
  #[serde(default)]
  pub onderdelen:   Vec<OnderdeelBody>,
  #[serde(flatten)]
  pub handeling:    HandelingBody,
}

/// `POST /aanvragen` — returns 201 + the stored [`Aanvraag`].
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let input = NieuweAanvraag {
    kandidaat_id: body.kandidaat_id,
    locatie_id:   body.locatie_id,
    soort:        body.soort,
    leercoach_id: body.leercoach_id,
    opmerkingen:  body.opmerkingen,
    cursussen:    body.cursussen.into_iter().map(Into::into).collect(),
    onderdelen:   body.onderdelen.into_iter().map(Into::into).collect(),
  };
  let aanvraag: Aanvraag = store
    .create_aanvraag(input, body.handeling.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(aanvraag)))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Required: the locatie whose aanvragen to return.
  pub locatie_id: Uuid,
  /// Free-text filter on the handle.
  pub zoek:       Option<String>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

/// `GET /aanvragen?locatie_id=<id>[&zoek=...][&limit=...][&offset=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<AanvraagPage>, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let query = AanvraagQuery {
    locatie_id: params.locatie_id,
    zoek:       params.zoek,
    limit:      params.limit,
    offset:     params.offset,
  };
  let page = store
    .list_aanvragen(&query)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(page))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /aanvragen/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<AanvraagDetail>, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let detail = store
    .get_aanvraag(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("aanvraag {id} not found")))?;
  Ok(Json(detail))
}

// ─── Submit / withdraw ────────────────────────────────────────────────────────

/// `POST /aanvragen/:id/indienen` — returns `{"status": "<resulting>"}`.
pub async fn submit<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<HandelingBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let status = store
    .submit_aanvraag(id, body.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(json!({ "status": status })))
}

/// `POST /aanvragen/:id/intrekken`
pub async fn withdraw<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<HandelingBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .withdraw_aanvraag(id, body.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Cursussen ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AddCursusBody {
  #[serde(flatten)]
  pub link:      CursusLinkBody,
  #[serde(flatten)]
  pub handeling: HandelingBody,
}

/// `POST /aanvragen/:id/cursussen` — returns 201 + the stored link.
pub async fn add_cursus<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<AddCursusBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let link: CursusLink = store
    .add_cursus(id, body.link.into(), body.handeling.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(link)))
}

/// `DELETE /aanvragen/:id/cursussen/:cursus_id`
pub async fn remove_cursus<S>(
  State(store): State<Arc<S>>,
  Path((id, cursus_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<HandelingBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .remove_cursus(id, cursus_id, body.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /aanvragen/:id/cursussen/:cursus_id/hoofd`
pub async fn set_hoofdcursus<S>(
  State(store): State<Arc<S>>,
  Path((id, cursus_id)): Path<(Uuid, Uuid)>,
  Json(body): Json<HandelingBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  store
    .set_hoofdcursus(id, cursus_id, body.into())
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Leercoach ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RequestToestemmingBody {
  pub leercoach_id: Uuid,
  #[serde(flatten)]
  pub handeling:    HandelingBody,
}

/// `POST /aanvragen/:id/leercoach` — returns 201 + the `gevraagd` record.
pub async fn request_toestemming<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<RequestToestemmingBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let record: ToestemmingRecord = store
    .request_leercoach_toestemming(
      id,
      body.leercoach_id,
      body.handeling.into(),
    )
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(record)))
}

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /aanvragen/:id/voorwaarden`
pub async fn voorwaarden<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<VoorwaardenResultaat>, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let res = store
    .check_voorwaarden(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(res))
}

/// `GET /aanvragen/:id/status`
pub async fn status_historie<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<StatusRecord>>, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let records = store
    .status_historie(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(records))
}

/// `GET /aanvragen/:id/toestemmingen`
pub async fn toestemming_historie<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ToestemmingRecord>>, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let records = store
    .toestemming_historie(id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(records))
}

/// `GET /aanvragen/:id/events`
pub async fn events<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<EventRecord>>, ApiError>
where
  S: AanvraagStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let records = store.events(id).await.map_err(ApiError::from_store)?;
  Ok(Json(records))
}
