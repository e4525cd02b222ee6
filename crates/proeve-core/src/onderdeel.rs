//! Onderdeel — one kerntaakonderdeel being assessed within an aanvraag.
//!
//! Unlike the ledgers, onderdelen are mutable rows: the beoordelaar and the
//! scheduled start time may be reassigned while the aanvraag is still open.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Uitslag ─────────────────────────────────────────────────────────────────

/// Assessment outcome of an onderdeel. Set during the assessment phase;
/// the workflow core only ever writes the default.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Uitslag {
  Behaald,
  NietBehaald,
  #[default]
  NogNietBekend,
}

impl Uitslag {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Behaald => "behaald",
      Self::NietBehaald => "niet_behaald",
      Self::NogNietBekend => "nog_niet_bekend",
    }
  }
}

// ─── Onderdeel ───────────────────────────────────────────────────────────────

/// One attached task-component. `kerntaak_id` is copied from the catalog at
/// insert so the assigned task survives catalog edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Onderdeel {
  pub onderdeel_id:   Uuid,
  pub aanvraag_id:    Uuid,
  pub kto_id:         Uuid,
  pub kerntaak_id:    Uuid,
  pub beoordelaar_id: Option<Uuid>,
  pub startdatum:     Option<DateTime<Utc>>,
  pub opmerkingen:    Option<String>,
  pub uitslag:        Uitslag,
}

// ─── NieuwOnderdeel ──────────────────────────────────────────────────────────

/// Input to `addOnderdeel`. A supplied beoordelaar is assigned as a
/// follow-up step after the insert, via the same path as
/// `updateBeoordelaar`.
#[derive(Debug, Clone)]
pub struct NieuwOnderdeel {
  pub kto_id:         Uuid,
  pub beoordelaar_id: Option<Uuid>,
  pub startdatum:     Option<DateTime<Utc>>,
  pub opmerkingen:    Option<String>,
}

impl NieuwOnderdeel {
  /// Convenience constructor with all optional fields unset.
  pub fn voor(kto_id: Uuid) -> Self {
    Self {
      kto_id,
      beoordelaar_id: None,
      startdatum: None,
      opmerkingen: None,
    }
  }
}
