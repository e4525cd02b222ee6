//! Aanvraag — the aggregate root of the assessment workflow.
//!
//! An aanvraag itself is a thin envelope: onderdelen, cursus links and the
//! three ledgers carry everything that changes. Aanvragen are never deleted;
//! withdrawal is a status transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{cursus::NieuweCursusLink, onderdeel::NieuwOnderdeel};

// ─── Soort ───────────────────────────────────────────────────────────────────

/// Whether the kandidaat belongs to the organisation. Only `intern`
/// aanvragen are supported; `extern` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AanvraagSoort {
  Intern,
  Extern,
}

impl AanvraagSoort {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Intern => "intern",
      Self::Extern => "extern",
    }
  }
}

// ─── Aanvraag ────────────────────────────────────────────────────────────────

/// The aggregate root. Immutable once created except through its
/// sub-records (onderdelen, cursus links, ledgers) and the leercoach
/// association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aanvraag {
  pub aanvraag_id:  Uuid,
  /// Human-shareable handle, derived from the id at creation.
  pub handle:       String,
  pub kandidaat_id: Uuid,
  pub locatie_id:   Uuid,
  pub soort:        AanvraagSoort,
  /// The associated leercoach, if any. Submit auto-issues a permission
  /// request when this is set.
  pub leercoach_id: Option<Uuid>,
  pub opmerkingen:  Option<String>,
  pub created_at:   DateTime<Utc>,
}

/// Derive the human-shareable handle from a freshly generated id.
pub fn handle_voor(id: Uuid) -> String {
  let hex = id.simple().to_string();
  format!("AV-{}", hex[..6].to_uppercase())
}

// ─── NieuweAanvraag ──────────────────────────────────────────────────────────

/// Input to `createAanvraag`. Must carry at least one cursus, exactly one of
/// which is the hoofdcursus.
#[derive(Debug, Clone)]
pub struct NieuweAanvraag {
  pub kandidaat_id: Uuid,
  pub locatie_id:   Uuid,
  pub soort:        AanvraagSoort,
  pub leercoach_id: Option<Uuid>,
  pub opmerkingen:  Option<String>,
  pub cursussen:    Vec<NieuweCursusLink>,
  pub onderdelen:   Vec<NieuwOnderdeel>,
}

// ─── Handeling ───────────────────────────────────────────────────────────────

/// The acting user behind a command, with an optional free-text reason.
/// Persisted verbatim into every event the command appends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handeling {
  pub verricht_door: Uuid,
  pub reden:         Option<String>,
}

impl Handeling {
  pub fn door(verricht_door: Uuid) -> Self {
    Self { verricht_door, reden: None }
  }

  pub fn met_reden(verricht_door: Uuid, reden: impl Into<String>) -> Self {
    Self { verricht_door, reden: Some(reden.into()) }
  }
}

#[cfg(test)]
mod tests {
  use uuid::Uuid;

  use super::handle_voor;

  #[test]
  fn handle_is_prefixed_and_short() {
    let id = Uuid::parse_str("3f8a2c10-0000-4000-8000-000000000000").unwrap();
    assert_eq!(handle_voor(id), "AV-3F8A2C");
  }
}
