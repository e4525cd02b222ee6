//! The audit event ledger — strictly additive.
//!
//! Every mutating command appends one or more events describing what
//! happened, by whom and why. Nothing in the workflow reads events back to
//! drive behaviour; they exist for auditability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Event types ─────────────────────────────────────────────────────────────

/// The kind of domain occurrence an [`EventRecord`] describes. The variant
/// name doubles as the `event_type` column discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
  AanvraagAangemaakt,
  AanvraagIngediend,
  AanvraagIngetrokken,
  OnderdeelToegevoegd,
  BeoordelaarGewijzigd,
  OnderdeelGepland,
  CursusToegevoegd,
  CursusVerwijderd,
  HoofdcursusGewijzigd,
  LeercoachToestemmingGevraagd,
  LeercoachToestemmingBeslist,
  VoorwaardenVoltooid,
}

impl EventType {
  /// The discriminant string stored in the `event_type` column.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(self) -> &'static str {
    match self {
      Self::AanvraagAangemaakt => "aanvraag_aangemaakt",
      Self::AanvraagIngediend => "aanvraag_ingediend",
      Self::AanvraagIngetrokken => "aanvraag_ingetrokken",
      Self::OnderdeelToegevoegd => "onderdeel_toegevoegd",
      Self::BeoordelaarGewijzigd => "beoordelaar_gewijzigd",
      Self::OnderdeelGepland => "onderdeel_gepland",
      Self::CursusToegevoegd => "cursus_toegevoegd",
      Self::CursusVerwijderd => "cursus_verwijderd",
      Self::HoofdcursusGewijzigd => "hoofdcursus_gewijzigd",
      Self::LeercoachToestemmingGevraagd => "leercoach_toestemming_gevraagd",
      Self::LeercoachToestemmingBeslist => "leercoach_toestemming_beslist",
      Self::VoorwaardenVoltooid => "voorwaarden_voltooid",
    }
  }

  pub fn from_discriminant(s: &str) -> Option<Self> {
    Some(match s {
      "aanvraag_aangemaakt" => Self::AanvraagAangemaakt,
      "aanvraag_ingediend" => Self::AanvraagIngediend,
      "aanvraag_ingetrokken" => Self::AanvraagIngetrokken,
      "onderdeel_toegevoegd" => Self::OnderdeelToegevoegd,
      "beoordelaar_gewijzigd" => Self::BeoordelaarGewijzigd,
      "onderdeel_gepland" => Self::OnderdeelGepland,
      "cursus_toegevoegd" => Self::CursusToegevoegd,
      "cursus_verwijderd" => Self::CursusVerwijderd,
      "hoofdcursus_gewijzigd" => Self::HoofdcursusGewijzigd,
      "leercoach_toestemming_gevraagd" => Self::LeercoachToestemmingGevraagd,
      "leercoach_toestemming_beslist" => Self::LeercoachToestemmingBeslist,
      "voorwaarden_voltooid" => Self::VoorwaardenVoltooid,
      _ => return None,
    })
  }
}

// ─── Ledger record ───────────────────────────────────────────────────────────

/// One audit event. `payload` carries optional structured detail (old/new
/// values, counts); its shape is event-type specific and uninterpreted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
  pub event_id:      Uuid,
  pub aanvraag_id:   Uuid,
  pub onderdeel_id:  Option<Uuid>,
  pub event_type:    EventType,
  pub payload:       Option<serde_json::Value>,
  pub verricht_door: Uuid,
  pub reden:         Option<String>,
  pub recorded_at:   DateTime<Utc>,
}
