//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Enum discriminants are
//! stored as their snake_case strings. UUIDs are stored as hyphenated
//! lowercase strings.

use chrono::{DateTime, Utc};
use proeve_core::{
  aanvraag::{Aanvraag, AanvraagSoort},
  catalogus::{ActorRol, OnderdeelSoort},
  cursus::CursusLink,
  event::{EventRecord, EventType},
  leercoach::{ToestemmingRecord, ToestemmingStatus},
  onderdeel::{Onderdeel, Uitslag},
  status::{AanvraagStatus, StatusRecord},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_uuid_opt(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enum discriminants ──────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<AanvraagStatus> {
  Ok(match s {
    "concept" => AanvraagStatus::Concept,
    "wacht_op_voorwaarden" => AanvraagStatus::WachtOpVoorwaarden,
    "gereed_voor_beoordeling" => AanvraagStatus::GereedVoorBeoordeling,
    "in_beoordeling" => AanvraagStatus::InBeoordeling,
    "afgerond" => AanvraagStatus::Afgerond,
    "ingetrokken" => AanvraagStatus::Ingetrokken,
    "afgebroken" => AanvraagStatus::Afgebroken,
    other => return Err(Error::Decode(format!("unknown status: {other:?}"))),
  })
}

pub fn decode_soort(s: &str) -> Result<AanvraagSoort> {
  Ok(match s {
    "intern" => AanvraagSoort::Intern,
    "extern" => AanvraagSoort::Extern,
    other => {
      return Err(Error::Decode(format!("unknown aanvraag soort: {other:?}")));
    }
  })
}

pub fn decode_toestemming_status(s: &str) -> Result<ToestemmingStatus> {
  Ok(match s {
    "gevraagd" => ToestemmingStatus::Gevraagd,
    "gegeven" => ToestemmingStatus::Gegeven,
    "geweigerd" => ToestemmingStatus::Geweigerd,
    other => {
      return Err(Error::Decode(format!(
        "unknown toestemming status: {other:?}"
      )));
    }
  })
}

pub fn decode_uitslag(s: &str) -> Result<Uitslag> {
  Ok(match s {
    "behaald" => Uitslag::Behaald,
    "niet_behaald" => Uitslag::NietBehaald,
    "nog_niet_bekend" => Uitslag::NogNietBekend,
    other => return Err(Error::Decode(format!("unknown uitslag: {other:?}"))),
  })
}

pub fn decode_onderdeel_soort(s: &str) -> Result<OnderdeelSoort> {
  Ok(match s {
    "portfolio" => OnderdeelSoort::Portfolio,
    "praktijk" => OnderdeelSoort::Praktijk,
    other => {
      return Err(Error::Decode(format!("unknown onderdeel soort: {other:?}")));
    }
  })
}

pub fn encode_rol(rol: ActorRol) -> &'static str { rol.as_str() }

pub fn decode_event_type(s: &str) -> Result<EventType> {
  EventType::from_discriminant(s)
    .ok_or_else(|| Error::Decode(format!("unknown event type: {s:?}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `aanvragen` row.
pub struct RawAanvraag {
  pub aanvraag_id:  String,
  pub handle:       String,
  pub kandidaat_id: String,
  pub locatie_id:   String,
  pub soort:        String,
  pub leercoach_id: Option<String>,
  pub opmerkingen:  Option<String>,
  pub created_at:   String,
}

impl RawAanvraag {
  pub fn into_aanvraag(self) -> Result<Aanvraag> {
    Ok(Aanvraag {
      aanvraag_id:  decode_uuid(&self.aanvraag_id)?,
      handle:       self.handle,
      kandidaat_id: decode_uuid(&self.kandidaat_id)?,
      locatie_id:   decode_uuid(&self.locatie_id)?,
      soort:        decode_soort(&self.soort)?,
      leercoach_id: decode_uuid_opt(self.leercoach_id.as_deref())?,
      opmerkingen:  self.opmerkingen,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `onderdelen` row.
pub struct RawOnderdeel {
  pub onderdeel_id:   String,
  pub aanvraag_id:    String,
  pub kto_id:         String,
  pub kerntaak_id:    String,
  pub beoordelaar_id: Option<String>,
  pub startdatum:     Option<String>,
  pub opmerkingen:    Option<String>,
  pub uitslag:        String,
}

impl RawOnderdeel {
  pub fn into_onderdeel(self) -> Result<Onderdeel> {
    Ok(Onderdeel {
      onderdeel_id:   decode_uuid(&self.onderdeel_id)?,
      aanvraag_id:    decode_uuid(&self.aanvraag_id)?,
      kto_id:         decode_uuid(&self.kto_id)?,
      kerntaak_id:    decode_uuid(&self.kerntaak_id)?,
      beoordelaar_id: decode_uuid_opt(self.beoordelaar_id.as_deref())?,
      startdatum:     self.startdatum.as_deref().map(decode_dt).transpose()?,
      opmerkingen:    self.opmerkingen,
      uitslag:        decode_uitslag(&self.uitslag)?,
    })
  }
}

/// Raw strings read directly from a `cursus_links` row.
pub struct RawCursusLink {
  pub link_id:        String,
  pub aanvraag_id:    String,
  pub cursus_id:      String,
  pub is_hoofdcursus: bool,
  pub opmerkingen:    Option<String>,
}

impl RawCursusLink {
  pub fn into_link(self) -> Result<CursusLink> {
    Ok(CursusLink {
      link_id:        decode_uuid(&self.link_id)?,
      aanvraag_id:    decode_uuid(&self.aanvraag_id)?,
      cursus_id:      decode_uuid(&self.cursus_id)?,
      is_hoofdcursus: self.is_hoofdcursus,
      opmerkingen:    self.opmerkingen,
    })
  }
}

/// Raw strings read directly from a `status_records` row.
pub struct RawStatusRecord {
  pub record_id:     String,
  pub aanvraag_id:   String,
  pub status:        String,
  pub verricht_door: String,
  pub reden:         Option<String>,
  pub recorded_at:   String,
}

impl RawStatusRecord {
  pub fn into_record(self) -> Result<StatusRecord> {
    Ok(StatusRecord {
      record_id:     decode_uuid(&self.record_id)?,
      aanvraag_id:   decode_uuid(&self.aanvraag_id)?,
      status:        decode_status(&self.status)?,
      verricht_door: decode_uuid(&self.verricht_door)?,
      reden:         self.reden,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings read directly from a `toestemming_records` row.
pub struct RawToestemmingRecord {
  pub record_id:     String,
  pub aanvraag_id:   String,
  pub leercoach_id:  String,
  pub status:        String,
  pub verricht_door: String,
  pub reden:         Option<String>,
  pub recorded_at:   String,
}

impl RawToestemmingRecord {
  pub fn into_record(self) -> Result<ToestemmingRecord> {
    Ok(ToestemmingRecord {
      record_id:     decode_uuid(&self.record_id)?,
      aanvraag_id:   decode_uuid(&self.aanvraag_id)?,
      leercoach_id:  decode_uuid(&self.leercoach_id)?,
      status:        decode_toestemming_status(&self.status)?,
      verricht_door: decode_uuid(&self.verricht_door)?,
      reden:         self.reden,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings read directly from an `events` row.
pub struct RawEventRecord {
  pub event_id:      String,
  pub aanvraag_id:   String,
  pub onderdeel_id:  Option<String>,
  pub event_type:    String,
  pub payload:       Option<String>,
  pub verricht_door: String,
  pub reden:         Option<String>,
  pub recorded_at:   String,
}

impl RawEventRecord {
  pub fn into_record(self) -> Result<EventRecord> {
    let payload = self
      .payload
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(EventRecord {
      event_id:      decode_uuid(&self.event_id)?,
      aanvraag_id:   decode_uuid(&self.aanvraag_id)?,
      onderdeel_id:  decode_uuid_opt(self.onderdeel_id.as_deref())?,
      event_type:    decode_event_type(&self.event_type)?,
      payload,
      verricht_door: decode_uuid(&self.verricht_door)?,
      reden:         self.reden,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }
}
