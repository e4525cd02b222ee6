//! Cursus links — the courses attached to an aanvraag.
//!
//! Exactly one link per aanvraag is the hoofdcursus; every additional cursus
//! must share the hoofdcursus's instructie-groep. An aanvraag always retains
//! at least one cursus.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cursus attached to an aanvraag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursusLink {
  pub link_id:        Uuid,
  pub aanvraag_id:    Uuid,
  pub cursus_id:      Uuid,
  pub is_hoofdcursus: bool,
  pub opmerkingen:    Option<String>,
}

/// Input to `addCourse` and the cursus list of `createAanvraag`.
#[derive(Debug, Clone)]
pub struct NieuweCursusLink {
  pub cursus_id:      Uuid,
  pub is_hoofdcursus: bool,
  pub opmerkingen:    Option<String>,
}

impl NieuweCursusLink {
  pub fn hoofd(cursus_id: Uuid) -> Self {
    Self { cursus_id, is_hoofdcursus: true, opmerkingen: None }
  }

  pub fn extra(cursus_id: Uuid) -> Self {
    Self { cursus_id, is_hoofdcursus: false, opmerkingen: None }
  }
}
