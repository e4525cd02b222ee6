//! Leercoach permission — an append-only decision ledger.
//!
//! A request appends a `gevraagd` record; a decision appends a `gegeven` or
//! `geweigerd` record. The prior record is never mutated. The latest record
//! per aanvraag is authoritative, and a decision may only be recorded while
//! that latest record is still `gevraagd`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToestemmingStatus {
  Gevraagd,
  Gegeven,
  Geweigerd,
}

impl ToestemmingStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Gevraagd => "gevraagd",
      Self::Gegeven => "gegeven",
      Self::Geweigerd => "geweigerd",
    }
  }
}

impl std::fmt::Display for ToestemmingStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Besluit ─────────────────────────────────────────────────────────────────

/// The two decisions a coach (or someone on their behalf) can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToestemmingBesluit {
  Gegeven,
  Geweigerd,
}

impl ToestemmingBesluit {
  pub fn als_status(self) -> ToestemmingStatus {
    match self {
      Self::Gegeven => ToestemmingStatus::Gegeven,
      Self::Geweigerd => ToestemmingStatus::Geweigerd,
    }
  }
}

// ─── Ledger record ───────────────────────────────────────────────────────────

/// One row in the append-only permission ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToestemmingRecord {
  pub record_id:     Uuid,
  pub aanvraag_id:   Uuid,
  pub leercoach_id:  Uuid,
  pub status:        ToestemmingStatus,
  pub verricht_door: Uuid,
  pub reden:         Option<String>,
  pub recorded_at:   DateTime<Utc>,
}
