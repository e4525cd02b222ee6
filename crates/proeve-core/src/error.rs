//! Error taxonomy for the workflow core.
//!
//! Four classes of failure (surfaced via [`Error::kind`]): missing entities,
//! status preconditions, referential/uniqueness violations and
//! consistency-invariant violations. A rejected command never leaves partial
//! state behind; callers decide whether to retry.

use thiserror::Error;
use uuid::Uuid;

use crate::{
  catalogus::ActorRol, leercoach::ToestemmingStatus, status::AanvraagStatus,
};

/// Coarse classification used by outer layers (e.g. HTTP status mapping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// A referenced aanvraag, onderdeel or record does not exist.
  NotFound,
  /// The current status forbids the requested transition or mutation.
  Precondition,
  /// Duplicate attachment, conflicting qualification, level or
  /// instructie-groep mismatch, or an improper cursus removal.
  Consistency,
  Other,
}

#[derive(Debug, Error)]
pub enum Error {
  // ── Not found ─────────────────────────────────────────────────────────
  #[error("aanvraag {0} not found")]
  AanvraagNotFound(Uuid),

  #[error("onderdeel {0} not found")]
  OnderdeelNotFound(Uuid),

  #[error("toestemming record {0} not found")]
  ToestemmingNotFound(Uuid),

  #[error("cursus {0} not found in the catalog")]
  OnbekendeCursus(Uuid),

  #[error("kerntaakonderdeel {0} not found in the catalog")]
  OnbekendKerntaakonderdeel(Uuid),

  #[error("cursus {cursus} is not linked to aanvraag {aanvraag}")]
  CursusNietGekoppeld { aanvraag: Uuid, cursus: Uuid },

  // ── Status preconditions ──────────────────────────────────────────────
  #[error("externe aanvragen are not supported")]
  ExternNietOndersteund,

  #[error(
    "aanvraag {aanvraag} is {status}; onderdelen and cursussen can only \
     change while it is concept or wacht_op_voorwaarden"
  )]
  AanvraagBevroren { aanvraag: Uuid, status: AanvraagStatus },

  #[error("aanvraag {aanvraag} is {status}; only a concept can be submitted")]
  NietInConcept { aanvraag: Uuid, status: AanvraagStatus },

  #[error("aanvraag {aanvraag} is {status} and cannot be withdrawn")]
  NietIntrekbaar { aanvraag: Uuid, status: AanvraagStatus },

  #[error(
    "latest toestemming record for this aanvraag is {0}; a decision \
     requires gevraagd"
  )]
  ToestemmingNietOpen(ToestemmingStatus),

  // ── Referential / uniqueness ──────────────────────────────────────────
  #[error("kerntaakonderdeel {0} is already attached to this aanvraag")]
  DuplicaatOnderdeel(Uuid),

  #[error("cursus {0} is already linked to this aanvraag")]
  DuplicaatCursus(Uuid),

  #[error(
    "persoon {persoon} does not hold the {rol} role at locatie {locatie}"
  )]
  ActorZonderRol { persoon: Uuid, rol: ActorRol, locatie: Uuid },

  #[error(
    "kandidaat already achieved kerntaakonderdeel {kto} under cursus {cursus}"
  )]
  KwalificatieReedsBehaald { kto: Uuid, cursus: Uuid },

  // ── Consistency invariants ────────────────────────────────────────────
  #[error(
    "kerntaakonderdeel has niveau {gevonden}, but this aanvraag is at \
     niveau {verwacht}"
  )]
  NiveauMismatch { verwacht: u8, gevonden: u8 },

  #[error(
    "cursus {cursus} belongs to a different instructie-groep than the \
     hoofdcursus"
  )]
  InstructieGroepMismatch { cursus: Uuid },

  #[error("cannot remove the last remaining cursus from an aanvraag")]
  LaatsteCursus,

  #[error(
    "cannot remove the hoofdcursus while other cursussen are linked; \
     designate a new hoofdcursus first"
  )]
  HoofdcursusNogInGebruik,

  #[error("cursus {0} is already the hoofdcursus")]
  AlHoofdcursus(Uuid),

  #[error("an aanvraag needs at least one cursus")]
  GeenCursussen,

  #[error("an aanvraag needs exactly one hoofdcursus, got {0}")]
  HoofdcursusAantal(usize),

  // ── Other ─────────────────────────────────────────────────────────────
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::AanvraagNotFound(_)
      | Self::OnderdeelNotFound(_)
      | Self::ToestemmingNotFound(_)
      | Self::OnbekendeCursus(_)
      | Self::OnbekendKerntaakonderdeel(_)
      | Self::CursusNietGekoppeld { .. } => ErrorKind::NotFound,

      Self::ExternNietOndersteund
      | Self::AanvraagBevroren { .. }
      | Self::NietInConcept { .. }
      | Self::NietIntrekbaar { .. }
      | Self::ToestemmingNietOpen(_) => ErrorKind::Precondition,

      Self::DuplicaatOnderdeel(_)
      | Self::DuplicaatCursus(_)
      | Self::ActorZonderRol { .. }
      | Self::KwalificatieReedsBehaald { .. }
      | Self::NiveauMismatch { .. }
      | Self::InstructieGroepMismatch { .. }
      | Self::LaatsteCursus
      | Self::HoofdcursusNogInGebruik
      | Self::AlHoofdcursus(_)
      | Self::GeenCursussen
      | Self::HoofdcursusAantal(_) => ErrorKind::Consistency,

      Self::Serialization(_) => ErrorKind::Other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
