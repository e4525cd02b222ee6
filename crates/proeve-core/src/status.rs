//! The aanvraag status state machine and its append-only ledger record.
//!
//! Status values are never updated in place. Every transition appends a
//! [`StatusRecord`]; the current status is the most recently appended row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of an aanvraag.
///
/// Main path: `concept → wacht_op_voorwaarden → gereed_voor_beoordeling →
/// in_beoordeling → afgerond`. Side exits: `ingetrokken` (withdrawn while
/// still pre-assessment) and `afgebroken` (aborted during assessment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AanvraagStatus {
  Concept,
  WachtOpVoorwaarden,
  GereedVoorBeoordeling,
  InBeoordeling,
  Afgerond,
  Ingetrokken,
  Afgebroken,
}

impl AanvraagStatus {
  /// The snake_case string stored in the `status` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Concept => "concept",
      Self::WachtOpVoorwaarden => "wacht_op_voorwaarden",
      Self::GereedVoorBeoordeling => "gereed_voor_beoordeling",
      Self::InBeoordeling => "in_beoordeling",
      Self::Afgerond => "afgerond",
      Self::Ingetrokken => "ingetrokken",
      Self::Afgebroken => "afgebroken",
    }
  }

  /// A terminal status admits no further transitions.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Afgerond | Self::Ingetrokken | Self::Afgebroken)
  }

  /// Whether the aanvraag may still be withdrawn by the kandidaat.
  pub fn kan_intrekken(self) -> bool {
    matches!(
      self,
      Self::Concept | Self::WachtOpVoorwaarden | Self::GereedVoorBeoordeling
    )
  }

  /// Whether onderdelen may still be attached or rearranged.
  pub fn onderdelen_bewerkbaar(self) -> bool {
    matches!(self, Self::Concept | Self::WachtOpVoorwaarden)
  }

  /// The full transition table. Appending a status row for a transition not
  /// listed here is a bug in the caller.
  pub fn mag_overgaan_naar(self, naar: AanvraagStatus) -> bool {
    use AanvraagStatus::*;
    matches!(
      (self, naar),
      (Concept, WachtOpVoorwaarden)
        | (Concept, Ingetrokken)
        | (WachtOpVoorwaarden, GereedVoorBeoordeling)
        | (WachtOpVoorwaarden, Ingetrokken)
        | (GereedVoorBeoordeling, InBeoordeling)
        | (GereedVoorBeoordeling, Ingetrokken)
        | (InBeoordeling, Afgerond)
        | (InBeoordeling, Afgebroken)
    )
  }
}

impl std::fmt::Display for AanvraagStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Ledger record ───────────────────────────────────────────────────────────

/// One row in the append-only status ledger. The first record for any
/// aanvraag is always `concept`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
  pub record_id:     Uuid,
  pub aanvraag_id:   Uuid,
  pub status:        AanvraagStatus,
  pub verricht_door: Uuid,
  pub reden:         Option<String>,
  pub recorded_at:   DateTime<Utc>,
}
