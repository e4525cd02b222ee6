//! The `AanvraagStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `proeve-store-sqlite`). Higher layers (`proeve-api`) depend on this
//! abstraction, not on any concrete backend. Each method is one command or
//! query from the workflow contract: commands validate, mutate the
//! aggregate, append to the ledgers, and never partially apply.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  aanvraag::{Aanvraag, Handeling, NieuweAanvraag},
  catalogus::OnderdeelSoort,
  cursus::{CursusLink, NieuweCursusLink},
  event::EventRecord,
  leercoach::{ToestemmingBesluit, ToestemmingRecord},
  onderdeel::{NieuwOnderdeel, Onderdeel, Uitslag},
  status::{AanvraagStatus, StatusRecord},
  voorwaarden::VoorwaardenResultaat,
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`AanvraagStore::list_aanvragen`].
#[derive(Debug, Clone)]
pub struct AanvraagQuery {
  pub locatie_id: Uuid,
  /// Free-text filter matched against the handle.
  pub zoek:       Option<String>,
  pub limit:      Option<usize>,
  pub offset:     Option<usize>,
}

impl AanvraagQuery {
  pub fn voor_locatie(locatie_id: Uuid) -> Self {
    Self { locatie_id, zoek: None, limit: None, offset: None }
  }
}

/// One onderdeel tuple inside a list item, in catalog rank order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnderdeelSamenvatting {
  pub titel:   String,
  pub soort:   OnderdeelSoort,
  pub uitslag: Uitslag,
}

/// One row of the list query: the aanvraag joined with its current status
/// and the rank-ordered summaries of its onderdelen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AanvraagListItem {
  pub aanvraag_id:  Uuid,
  pub handle:       String,
  pub kandidaat_id: Uuid,
  pub locatie_id:   Uuid,
  pub status:       AanvraagStatus,
  pub onderdelen:   Vec<OnderdeelSamenvatting>,
}

/// A page of list results plus the unpaginated total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AanvraagPage {
  pub items:  Vec<AanvraagListItem>,
  pub totaal: u64,
}

/// The full aggregate for one aanvraag, as read by `getAanvraag`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AanvraagDetail {
  pub aanvraag:   Aanvraag,
  pub status:     AanvraagStatus,
  pub onderdelen: Vec<Onderdeel>,
  pub cursussen:  Vec<CursusLink>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Proeve workflow store backend.
///
/// Status, permission and event writes are append-only. Aggregate rows
/// (onderdelen, cursus links) are mutable. Every command runs its writes in
/// one transaction; commands marked as triggering the prerequisite re-check
/// run that check in a separate transaction after the command commits.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AanvraagStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Commands ──────────────────────────────────────────────────────────

  /// Create an aanvraag with its initial cursussen and onderdelen, append
  /// the first (`concept`) status record, and log the creation.
  ///
  /// Onderdelen that carried a beoordelaar get it assigned as a follow-up
  /// step via the same path as [`AanvraagStore::update_beoordelaar`].
  fn create_aanvraag(
    &self,
    input: NieuweAanvraag,
    door: Handeling,
  ) -> impl Future<Output = Result<Aanvraag, Self::Error>> + Send + '_;

  /// Attach a kerntaakonderdeel. Only legal while the aanvraag is
  /// `concept` or `wacht_op_voorwaarden`.
  fn add_onderdeel(
    &self,
    aanvraag_id: Uuid,
    input: NieuwOnderdeel,
    door: Handeling,
  ) -> impl Future<Output = Result<Onderdeel, Self::Error>> + Send + '_;

  /// Assign or clear the beoordelaar of an onderdeel, then trigger the
  /// prerequisite re-check.
  fn update_beoordelaar(
    &self,
    onderdeel_id: Uuid,
    beoordelaar_id: Option<Uuid>,
    door: Handeling,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Set or clear the scheduled start time of an onderdeel, then trigger
  /// the prerequisite re-check.
  fn plan_onderdeel(
    &self,
    onderdeel_id: Uuid,
    startdatum: Option<DateTime<Utc>>,
    door: Handeling,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Link a cursus. If `is_hoofdcursus` is requested the prior hoofdcursus
  /// is demoted in the same transaction.
  fn add_cursus(
    &self,
    aanvraag_id: Uuid,
    input: NieuweCursusLink,
    door: Handeling,
  ) -> impl Future<Output = Result<CursusLink, Self::Error>> + Send + '_;

  /// Unlink a cursus. Fails for the last remaining cursus, and for the
  /// hoofdcursus while other cursussen are still linked.
  fn remove_cursus(
    &self,
    aanvraag_id: Uuid,
    cursus_id: Uuid,
    door: Handeling,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Demote the current hoofdcursus and promote `cursus_id` in one
  /// operation. Fails if it is already the hoofdcursus.
  fn set_hoofdcursus(
    &self,
    aanvraag_id: Uuid,
    cursus_id: Uuid,
    door: Handeling,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Associate a leercoach and append a `gevraagd` permission record.
  fn request_leercoach_toestemming(
    &self,
    aanvraag_id: Uuid,
    leercoach_id: Uuid,
    door: Handeling,
  ) -> impl Future<Output = Result<ToestemmingRecord, Self::Error>> + Send + '_;

  /// Append a decision record. Only legal while the latest record for the
  /// same aanvraag is still `gevraagd`; the prior record is never mutated.
  /// A `gegeven` decision triggers the prerequisite re-check.
  fn set_leercoach_toestemming(
    &self,
    record_id: Uuid,
    besluit: ToestemmingBesluit,
    door: Handeling,
  ) -> impl Future<Output = Result<ToestemmingRecord, Self::Error>> + Send + '_;

  /// Submit a concept aanvraag: appends `wacht_op_voorwaarden`, auto-issues
  /// a permission request when a leercoach is associated, and immediately
  /// re-evaluates the prerequisites (possibly advancing straight to
  /// `gereed_voor_beoordeling`). Returns the resulting status.
  fn submit_aanvraag(
    &self,
    aanvraag_id: Uuid,
    door: Handeling,
  ) -> impl Future<Output = Result<AanvraagStatus, Self::Error>> + Send + '_;

  /// Withdraw the aanvraag. Legal only from `concept`,
  /// `wacht_op_voorwaarden` or `gereed_voor_beoordeling`.
  fn withdraw_aanvraag(
    &self,
    aanvraag_id: Uuid,
    door: Handeling,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Prerequisite evaluation ───────────────────────────────────────────

  /// Evaluate the three prerequisites without side effects.
  fn check_voorwaarden(
    &self,
    aanvraag_id: Uuid,
  ) -> impl Future<Output = Result<VoorwaardenResultaat, Self::Error>> + Send + '_;

  /// The side-effecting wrapper: a no-op unless the current status is
  /// `wacht_op_voorwaarden`; otherwise evaluates and, when fully
  /// satisfied, appends `gereed_voor_beoordeling` plus a
  /// `voorwaarden_voltooid` event. Idempotent by construction — it always
  /// starts from a fresh status read. Returns whether it advanced.
  fn check_voorwaarden_and_update_status(
    &self,
    aanvraag_id: Uuid,
    door: Handeling,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The full aggregate plus current status. `None` if the aanvraag does
  /// not exist.
  fn get_aanvraag(
    &self,
    aanvraag_id: Uuid,
  ) -> impl Future<Output = Result<Option<AanvraagDetail>, Self::Error>> + Send + '_;

  /// The paginated list view for one locatie.
  fn list_aanvragen<'a>(
    &'a self,
    query: &'a AanvraagQuery,
  ) -> impl Future<Output = Result<AanvraagPage, Self::Error>> + Send + 'a;

  /// Full status ledger for an aanvraag, oldest first.
  fn status_historie(
    &self,
    aanvraag_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StatusRecord>, Self::Error>> + Send + '_;

  /// Full permission ledger for an aanvraag, oldest first.
  fn toestemming_historie(
    &self,
    aanvraag_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ToestemmingRecord>, Self::Error>> + Send + '_;

  /// Full audit trail for an aanvraag, oldest first.
  fn events(
    &self,
    aanvraag_id: Uuid,
  ) -> impl Future<Output = Result<Vec<EventRecord>, Self::Error>> + Send + '_;
}
