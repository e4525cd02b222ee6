//! Reference-catalog types — the read-only external collaborators.
//!
//! Actor roles, the cursus catalog, the kerntaakonderdeel catalog and the
//! register of previously achieved qualifications are consumed by the
//! workflow core but never managed by it. Stores materialise them however
//! they like; the workflow only reads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Actors ──────────────────────────────────────────────────────────────────

/// A role a persoon can hold at a locatie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRol {
  Kandidaat,
  Instructeur,
  Beoordelaar,
}

impl ActorRol {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Kandidaat => "kandidaat",
      Self::Instructeur => "instructeur",
      Self::Beoordelaar => "beoordelaar",
    }
  }
}

impl std::fmt::Display for ActorRol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One (persoon, locatie, rol) registration in the actor directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorRegistratie {
  pub persoon_id: Uuid,
  pub locatie_id: Uuid,
  pub rol:        ActorRol,
}

// ─── Cursussen ───────────────────────────────────────────────────────────────

/// A cursus from the catalog. All cursussen linked to one aanvraag must
/// share the same instructie-groep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cursus {
  pub cursus_id:           Uuid,
  pub code:                String,
  pub instructie_groep_id: Uuid,
}

// ─── Kerntaakonderdelen ──────────────────────────────────────────────────────

/// How an onderdeel is assessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnderdeelSoort {
  Portfolio,
  Praktijk,
}

impl OnderdeelSoort {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Portfolio => "portfolio",
      Self::Praktijk => "praktijk",
    }
  }
}

/// A task-component from the qualification catalog. `rang` orders the
/// onderdelen of an aanvraag in list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kerntaakonderdeel {
  pub kto_id:      Uuid,
  pub kerntaak_id: Uuid,
  pub titel:       String,
  pub soort:       OnderdeelSoort,
  pub niveau:      u8,
  pub rang:        u32,
}

// ─── Behaalde kwalificaties ──────────────────────────────────────────────────

/// A qualification the kandidaat already holds. An aanvraag may not attach a
/// kerntaakonderdeel/cursus pair the kandidaat has already achieved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaaldeKwalificatie {
  pub persoon_id: Uuid,
  pub kto_id:     Uuid,
  pub cursus_id:  Uuid,
}
