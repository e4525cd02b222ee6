//! The prerequisite evaluator — a pure function over a snapshot.
//!
//! Three independently satisfiable conditions gate the advancement from
//! `wacht_op_voorwaarden` to `gereed_voor_beoordeling`. The evaluator never
//! touches storage: stores gather a [`VoorwaardenSnapshot`] (component
//! counts plus the latest permission status, read concurrently) and hand it
//! here. The unmet conditions are reported in a fixed order for stable
//! user-facing messaging.

use serde::{Deserialize, Serialize};

use crate::leercoach::ToestemmingStatus;

// ─── Conditions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Voorwaarde {
  BeoordelaarToegewezen,
  LeercoachAkkoord,
  StartdatumGepland,
}

impl Voorwaarde {
  /// Evaluation and reporting order. Fixed; never reorder.
  pub const ALLE: [Voorwaarde; 3] = [
    Voorwaarde::BeoordelaarToegewezen,
    Voorwaarde::LeercoachAkkoord,
    Voorwaarde::StartdatumGepland,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::BeoordelaarToegewezen => "beoordelaar_toegewezen",
      Self::LeercoachAkkoord => "leercoach_akkoord",
      Self::StartdatumGepland => "startdatum_gepland",
    }
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// The two independent reads the evaluator needs, taken as one value so the
/// evaluation itself is pure and trivially testable.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoorwaardenSnapshot {
  pub onderdelen_totaal: u32,
  pub met_beoordelaar:   u32,
  pub met_startdatum:    u32,
  /// Status of the latest permission record, if any exists.
  pub leercoach:         Option<ToestemmingStatus>,
}

// ─── Result ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoorwaardenResultaat {
  pub voldaan:    bool,
  /// Unmet conditions, in [`Voorwaarde::ALLE`] order.
  pub ontbrekend: Vec<Voorwaarde>,
}

/// Evaluate all three conditions against a snapshot.
///
/// A condition over onderdelen requires at least one onderdeel to exist: an
/// empty aanvraag satisfies nothing.
pub fn check_alle_voorwaarden(
  snapshot: &VoorwaardenSnapshot,
) -> VoorwaardenResultaat {
  let ontbrekend: Vec<Voorwaarde> = Voorwaarde::ALLE
    .into_iter()
    .filter(|v| !voldaan(*v, snapshot))
    .collect();

  VoorwaardenResultaat { voldaan: ontbrekend.is_empty(), ontbrekend }
}

fn voldaan(voorwaarde: Voorwaarde, s: &VoorwaardenSnapshot) -> bool {
  match voorwaarde {
    Voorwaarde::BeoordelaarToegewezen => {
      s.onderdelen_totaal > 0 && s.met_beoordelaar == s.onderdelen_totaal
    }
    Voorwaarde::LeercoachAkkoord => {
      s.leercoach == Some(ToestemmingStatus::Gegeven)
    }
    Voorwaarde::StartdatumGepland => {
      s.onderdelen_totaal > 0 && s.met_startdatum == s.onderdelen_totaal
    }
  }
}
