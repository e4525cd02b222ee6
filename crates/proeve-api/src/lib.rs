//! JSON REST API for Proeve.
//!
//! Exposes an axum [`Router`] backed by any
//! [`proeve_core::store::AanvraagStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", proeve_api::api_router(store.clone()))
//! ```

pub mod aanvragen;
pub mod error;
pub mod onderdelen;
pub mod toestemmingen;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, patch, post},
};
use proeve_core::store::AanvraagStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: AanvraagStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Aanvragen
    .route(
      "/aanvragen",
      get(aanvragen::list::<S>).post(aanvragen::create::<S>),
    )
    .route("/aanvragen/{id}", get(aanvragen::get_one::<S>))
    .route("/aanvragen/{id}/indienen", post(aanvragen::submit::<S>))
    .route("/aanvragen/{id}/intrekken", post(aanvragen::withdraw::<S>))
    // Cursussen
    .route("/aanvragen/{id}/cursussen", post(aanvragen::add_cursus::<S>))
    .route(
      "/aanvragen/{id}/cursussen/{cursus_id}",
      delete(aanvragen::remove_cursus::<S>),
    )
    .route(
      "/aanvragen/{id}/cursussen/{cursus_id}/hoofd",
      post(aanvragen::set_hoofdcursus::<S>),
    )
    // Onderdelen
    .route("/aanvragen/{id}/onderdelen", post(onderdelen::add::<S>))
    .route(
      "/onderdelen/{id}/beoordelaar",
      patch(onderdelen::update_beoordelaar::<S>),
    )
    .route("/onderdelen/{id}/startdatum", patch(onderdelen::plan::<S>))
    // Leercoach toestemming
    .route(
      "/aanvragen/{id}/leercoach",
      post(aanvragen::request_toestemming::<S>),
    )
    .route("/toestemmingen/{record_id}", post(toestemmingen::decide::<S>))
    // Ledger reads
    .route(
      "/aanvragen/{id}/voorwaarden",
      get(aanvragen::voorwaarden::<S>),
    )
    .route("/aanvragen/{id}/status", get(aanvragen::status_historie::<S>))
    .route(
      "/aanvragen/{id}/toestemmingen",
      get(aanvragen::toestemming_historie::<S>),
    )
    .route("/aanvragen/{id}/events", get(aanvragen::events::<S>))
    .with_state(store)
}
