//! [`SqliteStore`] — the SQLite implementation of [`AanvraagStore`].
//!
//! Each command validates against concurrent reads, then applies all of its
//! writes in one transaction. The prerequisite re-check triggered by some
//! commands runs in its own transaction after the command has committed,
//! re-reading the current status so duplicate triggers are harmless.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use proeve_core::{
  aanvraag::{handle_voor, Aanvraag, AanvraagSoort, Handeling, NieuweAanvraag},
  catalogus::{
    ActorRegistratie, ActorRol, BehaaldeKwalificatie, Cursus, Kerntaakonderdeel,
  },
  cursus::{CursusLink, NieuweCursusLink},
  event::{EventRecord, EventType},
  leercoach::{ToestemmingBesluit, ToestemmingRecord, ToestemmingStatus},
  onderdeel::{NieuwOnderdeel, Onderdeel, Uitslag},
  status::{AanvraagStatus, StatusRecord},
  store::{
    AanvraagDetail, AanvraagListItem, AanvraagPage, AanvraagQuery,
    AanvraagStore, OnderdeelSamenvatting,
  },
  voorwaarden::{
    check_alle_voorwaarden, Voorwaarde, VoorwaardenResultaat,
    VoorwaardenSnapshot,
  },
};

use crate::{
  encode::{
    decode_onderdeel_soort, decode_status, decode_uitslag, encode_dt,
    encode_rol, encode_uuid, RawAanvraag, RawCursusLink, RawEventRecord,
    RawOnderdeel, RawStatusRecord, RawToestemmingRecord,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// Append one row to the status ledger. Only ever called inside a command's
/// transaction.
fn append_status_row(
  conn: &rusqlite::Connection,
  aanvraag_id: &str,
  status: AanvraagStatus,
  verricht_door: &str,
  reden: Option<&str>,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO status_records
       (record_id, aanvraag_id, status, verricht_door, reden, recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      aanvraag_id,
      status.as_str(),
      verricht_door,
      reden,
      encode_dt(Utc::now()),
    ],
  )?;
  Ok(())
}

/// Append one row to the audit event ledger.
fn append_event_row(
  conn: &rusqlite::Connection,
  aanvraag_id: &str,
  onderdeel_id: Option<&str>,
  event_type: EventType,
  payload: Option<&str>,
  verricht_door: &str,
  reden: Option<&str>,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO events
       (event_id, aanvraag_id, onderdeel_id, event_type, payload,
        verricht_door, reden, recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    rusqlite::params![
      encode_uuid(Uuid::new_v4()),
      aanvraag_id,
      onderdeel_id,
      event_type.discriminant(),
      payload,
      verricht_door,
      reden,
      encode_dt(Utc::now()),
    ],
  )?;
  Ok(())
}

/// Append one row to the permission ledger, returning the stored record.
fn append_toestemming_row(
  conn: &rusqlite::Connection,
  aanvraag_id: Uuid,
  leercoach_id: Uuid,
  status: ToestemmingStatus,
  door: &Handeling,
) -> rusqlite::Result<ToestemmingRecord> {
  let record = ToestemmingRecord {
    record_id: Uuid::new_v4(),
    aanvraag_id,
    leercoach_id,
    status,
    verricht_door: door.verricht_door,
    reden: door.reden.clone(),
    recorded_at: Utc::now(),
  };
  conn.execute(
    "INSERT INTO toestemming_records
       (record_id, aanvraag_id, leercoach_id, status, verricht_door, reden,
        recorded_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      encode_uuid(record.record_id),
      encode_uuid(record.aanvraag_id),
      encode_uuid(record.leercoach_id),
      record.status.as_str(),
      encode_uuid(record.verricht_door),
      record.reden,
      encode_dt(record.recorded_at),
    ],
  )?;
  Ok(record)
}

/// Shape of one element of the JSON-aggregated onderdelen column in the
/// list query.
#[derive(serde::Deserialize)]
struct RawSamenvatting {
  titel:   String,
  soort:   String,
  uitslag: String,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Proeve workflow store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Catalog seeding ───────────────────────────────────────────────────
  // The workflow core only reads these tables; seeding is for operators
  // and tests.

  pub async fn registreer_actor(&self, reg: ActorRegistratie) -> Result<()> {
    let persoon = encode_uuid(reg.persoon_id);
    let locatie = encode_uuid(reg.locatie_id);
    let rol = encode_rol(reg.rol).to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO actor_rollen (persoon_id, locatie_id, rol)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![persoon, locatie, rol],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn voeg_cursus_toe(&self, cursus: Cursus) -> Result<()> {
    let id = encode_uuid(cursus.cursus_id);
    let groep = encode_uuid(cursus.instructie_groep_id);
    let code = cursus.code;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cursussen (cursus_id, code, instructie_groep_id)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![id, code, groep],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn voeg_kerntaakonderdeel_toe(
    &self,
    kto: Kerntaakonderdeel,
  ) -> Result<()> {
    let id = encode_uuid(kto.kto_id);
    let kerntaak = encode_uuid(kto.kerntaak_id);
    let titel = kto.titel;
    let soort = kto.soort.as_str().to_owned();
    let niveau = kto.niveau as i64;
    let rang = kto.rang as i64;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO kerntaakonderdelen
             (kto_id, kerntaak_id, titel, soort, niveau, rang)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id, kerntaak, titel, soort, niveau, rang],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn registreer_kwalificatie(
    &self,
    kw: BehaaldeKwalificatie,
  ) -> Result<()> {
    let persoon = encode_uuid(kw.persoon_id);
    let kto = encode_uuid(kw.kto_id);
    let cursus = encode_uuid(kw.cursus_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO behaalde_kwalificaties
             (persoon_id, kto_id, cursus_id)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![persoon, kto, cursus],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Internal reads ────────────────────────────────────────────────────

  async fn require_aanvraag(&self, aanvraag_id: Uuid) -> Result<Aanvraag> {
    let id_str = encode_uuid(aanvraag_id);

    let raw: Option<RawAanvraag> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT aanvraag_id, handle, kandidaat_id, locatie_id, soort,
                      leercoach_id, opmerkingen, created_at
               FROM aanvragen WHERE aanvraag_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawAanvraag {
                  aanvraag_id:  row.get(0)?,
                  handle:       row.get(1)?,
                  kandidaat_id: row.get(2)?,
                  locatie_id:   row.get(3)?,
                  soort:        row.get(4)?,
                  leercoach_id: row.get(5)?,
                  opmerkingen:  row.get(6)?,
                  created_at:   row.get(7)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(RawAanvraag::into_aanvraag)
      .transpose()?
      .ok_or_else(|| proeve_core::Error::AanvraagNotFound(aanvraag_id).into())
  }

  /// The most recent status row, by (recorded_at, insertion order).
  async fn current_status(
    &self,
    aanvraag_id: Uuid,
  ) -> Result<Option<AanvraagStatus>> {
    let id_str = encode_uuid(aanvraag_id);

    let status: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT status FROM status_records WHERE aanvraag_id = ?1
               ORDER BY recorded_at DESC, rowid DESC LIMIT 1",
              rusqlite::params![id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    status.as_deref().map(decode_status).transpose()
  }

  async fn require_status(&self, aanvraag_id: Uuid) -> Result<AanvraagStatus> {
    self.current_status(aanvraag_id).await?.ok_or_else(|| {
      Error::Decode(format!("aanvraag {aanvraag_id} has no status records"))
    })
  }

  async fn require_rol(
    &self,
    persoon: Uuid,
    locatie: Uuid,
    rol: ActorRol,
  ) -> Result<()> {
    let p = encode_uuid(persoon);
    let l = encode_uuid(locatie);
    let r = encode_rol(rol).to_owned();

    let held: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM actor_rollen
               WHERE persoon_id = ?1 AND locatie_id = ?2 AND rol = ?3",
              rusqlite::params![p, l, r],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    if held {
      Ok(())
    } else {
      Err(proeve_core::Error::ActorZonderRol { persoon, rol, locatie }.into())
    }
  }

  async fn cursus_catalog(&self, cursus_id: Uuid) -> Result<Cursus> {
    let id_str = encode_uuid(cursus_id);

    let row: Option<(String, String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT cursus_id, code, instructie_groep_id FROM cursussen
               WHERE cursus_id = ?1",
              rusqlite::params![id_str],
              |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?,
        )
      })
      .await?;

    match row {
      Some((id, code, groep)) => Ok(Cursus {
        cursus_id:           crate::encode::decode_uuid(&id)?,
        code,
        instructie_groep_id: crate::encode::decode_uuid(&groep)?,
      }),
      None => Err(proeve_core::Error::OnbekendeCursus(cursus_id).into()),
    }
  }

  async fn kto_catalog(&self, kto_id: Uuid) -> Result<Kerntaakonderdeel> {
    let id_str = encode_uuid(kto_id);

    let row: Option<(String, String, String, String, i64, i64)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT kto_id, kerntaak_id, titel, soort, niveau, rang
               FROM kerntaakonderdelen WHERE kto_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok((
                  row.get(0)?,
                  row.get(1)?,
                  row.get(2)?,
                  row.get(3)?,
                  row.get(4)?,
                  row.get(5)?,
                ))
              },
            )
            .optional()?,
        )
      })
      .await?;

    match row {
      Some((id, kerntaak, titel, soort, niveau, rang)) => {
        Ok(Kerntaakonderdeel {
          kto_id:      crate::encode::decode_uuid(&id)?,
          kerntaak_id: crate::encode::decode_uuid(&kerntaak)?,
          titel,
          soort:       decode_onderdeel_soort(&soort)?,
          niveau:      niveau as u8,
          rang:        rang as u32,
        })
      }
      None => {
        Err(proeve_core::Error::OnbekendKerntaakonderdeel(kto_id).into())
      }
    }
  }

  /// The qualification level of the aanvraag, set by its first onderdeel.
  /// `None` while no onderdelen are attached.
  async fn aanvraag_niveau(&self, aanvraag_id: Uuid) -> Result<Option<u8>> {
    let id_str = encode_uuid(aanvraag_id);

    let niveau: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT k.niveau FROM onderdelen o
               JOIN kerntaakonderdelen k ON k.kto_id = o.kto_id
               WHERE o.aanvraag_id = ?1 LIMIT 1",
              rusqlite::params![id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(niveau.map(|n| n as u8))
  }

  async fn onderdeel_attached(
    &self,
    aanvraag_id: Uuid,
    kto_id: Uuid,
  ) -> Result<bool> {
    let a = encode_uuid(aanvraag_id);
    let k = encode_uuid(kto_id);

    let exists: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM onderdelen
               WHERE aanvraag_id = ?1 AND kto_id = ?2",
              rusqlite::params![a, k],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  /// A cursus already linked to the aanvraag under which the kandidaat has
  /// achieved this kerntaakonderdeel, if any.
  async fn kwalificatie_via_gekoppelde_cursus(
    &self,
    aanvraag_id: Uuid,
    kandidaat_id: Uuid,
    kto_id: Uuid,
  ) -> Result<Option<Uuid>> {
    let a = encode_uuid(aanvraag_id);
    let p = encode_uuid(kandidaat_id);
    let k = encode_uuid(kto_id);

    let cursus: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT cl.cursus_id FROM cursus_links cl
               JOIN behaalde_kwalificaties bk ON bk.cursus_id = cl.cursus_id
               WHERE cl.aanvraag_id = ?1 AND bk.persoon_id = ?2
                 AND bk.kto_id = ?3
               LIMIT 1",
              rusqlite::params![a, p, k],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    cursus.as_deref().map(crate::encode::decode_uuid).transpose()
  }

  /// A kerntaakonderdeel already attached to the aanvraag that the
  /// kandidaat has achieved under this cursus, if any.
  async fn kwalificatie_via_gekoppeld_onderdeel(
    &self,
    aanvraag_id: Uuid,
    kandidaat_id: Uuid,
    cursus_id: Uuid,
  ) -> Result<Option<Uuid>> {
    let a = encode_uuid(aanvraag_id);
    let p = encode_uuid(kandidaat_id);
    let c = encode_uuid(cursus_id);

    let kto: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT o.kto_id FROM onderdelen o
               JOIN behaalde_kwalificaties bk ON bk.kto_id = o.kto_id
               WHERE o.aanvraag_id = ?1 AND bk.persoon_id = ?2
                 AND bk.cursus_id = ?3
               LIMIT 1",
              rusqlite::params![a, p, c],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    kto.as_deref().map(crate::encode::decode_uuid).transpose()
  }

  /// The instructie-groep of the current hoofdcursus, if one is linked.
  async fn hoofdcursus_groep(&self, aanvraag_id: Uuid) -> Result<Option<Uuid>> {
    let a = encode_uuid(aanvraag_id);

    let groep: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT c.instructie_groep_id FROM cursus_links cl
               JOIN cursussen c ON c.cursus_id = cl.cursus_id
               WHERE cl.aanvraag_id = ?1 AND cl.is_hoofdcursus = 1",
              rusqlite::params![a],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    groep.as_deref().map(crate::encode::decode_uuid).transpose()
  }

  /// All cursus links of an aanvraag as `(cursus_id, is_hoofdcursus)`.
  async fn cursus_links_van(
    &self,
    aanvraag_id: Uuid,
  ) -> Result<Vec<(Uuid, bool)>> {
    let a = encode_uuid(aanvraag_id);

    let rows: Vec<(String, bool)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT cursus_id, is_hoofdcursus FROM cursus_links
           WHERE aanvraag_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![a], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, hoofd)| Ok((crate::encode::decode_uuid(&id)?, hoofd)))
      .collect()
  }

  async fn onderdeel_met_aanvraag(
    &self,
    onderdeel_id: Uuid,
  ) -> Result<(Onderdeel, Aanvraag)> {
    let id_str = encode_uuid(onderdeel_id);

    let raw: Option<(RawOnderdeel, RawAanvraag)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT o.onderdeel_id, o.aanvraag_id, o.kto_id, o.kerntaak_id,
                      o.beoordelaar_id, o.startdatum, o.opmerkingen, o.uitslag,
                      a.aanvraag_id, a.handle, a.kandidaat_id, a.locatie_id,
                      a.soort, a.leercoach_id, a.opmerkingen, a.created_at
               FROM onderdelen o
               JOIN aanvragen a ON a.aanvraag_id = o.aanvraag_id
               WHERE o.onderdeel_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok((
                  RawOnderdeel {
                    onderdeel_id:   row.get(0)?,
                    aanvraag_id:    row.get(1)?,
                    kto_id:         row.get(2)?,
                    kerntaak_id:    row.get(3)?,
                    beoordelaar_id: row.get(4)?,
                    startdatum:     row.get(5)?,
                    opmerkingen:    row.get(6)?,
                    uitslag:        row.get(7)?,
                  },
                  RawAanvraag {
                    aanvraag_id:  row.get(8)?,
                    handle:       row.get(9)?,
                    kandidaat_id: row.get(10)?,
                    locatie_id:   row.get(11)?,
                    soort:        row.get(12)?,
                    leercoach_id: row.get(13)?,
                    opmerkingen:  row.get(14)?,
                    created_at:   row.get(15)?,
                  },
                ))
              },
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some((o, a)) => Ok((o.into_onderdeel()?, a.into_aanvraag()?)),
      None => Err(proeve_core::Error::OnderdeelNotFound(onderdeel_id).into()),
    }
  }

  /// Aggregate counts for the prerequisite snapshot.
  async fn voorwaarden_tellingen(
    &self,
    aanvraag_id: Uuid,
  ) -> Result<(u32, u32, u32)> {
    let a = encode_uuid(aanvraag_id);

    let counts: (i64, i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*), COUNT(beoordelaar_id), COUNT(startdatum)
           FROM onderdelen WHERE aanvraag_id = ?1",
          rusqlite::params![a],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?)
      })
      .await?;

    Ok((counts.0 as u32, counts.1 as u32, counts.2 as u32))
  }

  async fn latest_toestemming(
    &self,
    aanvraag_id: Uuid,
  ) -> Result<Option<ToestemmingRecord>> {
    let a = encode_uuid(aanvraag_id);

    let raw: Option<RawToestemmingRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT record_id, aanvraag_id, leercoach_id, status,
                      verricht_door, reden, recorded_at
               FROM toestemming_records WHERE aanvraag_id = ?1
               ORDER BY recorded_at DESC, rowid DESC LIMIT 1",
              rusqlite::params![a],
              |row| {
                Ok(RawToestemmingRecord {
                  record_id:     row.get(0)?,
                  aanvraag_id:   row.get(1)?,
                  leercoach_id:  row.get(2)?,
                  status:        row.get(3)?,
                  verricht_door: row.get(4)?,
                  reden:         row.get(5)?,
                  recorded_at:   row.get(6)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawToestemmingRecord::into_record).transpose()
  }
}

// ─── AanvraagStore impl ──────────────────────────────────────────────────────

impl AanvraagStore for SqliteStore {
  type Error = Error;

  // ── Create ────────────────────────────────────────────────────────────

  async fn create_aanvraag(
    &self,
    input: NieuweAanvraag,
    door: Handeling,
  ) -> Result<Aanvraag> {
    if input.soort == AanvraagSoort::Extern {
      return Err(proeve_core::Error::ExternNietOndersteund.into());
    }
    if input.cursussen.is_empty() {
      return Err(proeve_core::Error::GeenCursussen.into());
    }
    let hoofd_aantal =
      input.cursussen.iter().filter(|c| c.is_hoofdcursus).count();
    if hoofd_aantal != 1 {
      return Err(proeve_core::Error::HoofdcursusAantal(hoofd_aantal).into());
    }
    for (i, c) in input.cursussen.iter().enumerate() {
      if input.cursussen[..i].iter().any(|p| p.cursus_id == c.cursus_id) {
        return Err(proeve_core::Error::DuplicaatCursus(c.cursus_id).into());
      }
    }
    for (i, o) in input.onderdelen.iter().enumerate() {
      if input.onderdelen[..i].iter().any(|p| p.kto_id == o.kto_id) {
        return Err(proeve_core::Error::DuplicaatOnderdeel(o.kto_id).into());
      }
    }

    // Eligibility checks are independent; issue them concurrently.
    let leercoach_check = async {
      match input.leercoach_id {
        Some(coach) => {
          self
            .require_rol(coach, input.locatie_id, ActorRol::Instructeur)
            .await
        }
        None => Ok(()),
      }
    };
    let beoordelaar_check = async {
      for o in &input.onderdelen {
        if let Some(b) = o.beoordelaar_id {
          self.require_rol(b, input.locatie_id, ActorRol::Beoordelaar).await?;
        }
      }
      Ok::<_, Error>(())
    };
    tokio::try_join!(
      self.require_rol(input.kandidaat_id, input.locatie_id, ActorRol::Kandidaat),
      leercoach_check,
      beoordelaar_check,
    )?;

    // Catalog resolution.
    let mut cursussen = Vec::with_capacity(input.cursussen.len());
    for link in &input.cursussen {
      cursussen.push(self.cursus_catalog(link.cursus_id).await?);
    }
    let hoofd_groep = input
      .cursussen
      .iter()
      .zip(&cursussen)
      .find(|(link, _)| link.is_hoofdcursus)
      .map(|(_, c)| c.instructie_groep_id)
      .unwrap_or_default();
    for cursus in &cursussen {
      if cursus.instructie_groep_id != hoofd_groep {
        return Err(
          proeve_core::Error::InstructieGroepMismatch {
            cursus: cursus.cursus_id,
          }
          .into(),
        );
      }
    }

    let mut ktos = Vec::with_capacity(input.onderdelen.len());
    for o in &input.onderdelen {
      ktos.push(self.kto_catalog(o.kto_id).await?);
    }
    if let Some(eerste) = ktos.first() {
      for kto in &ktos {
        if kto.niveau != eerste.niveau {
          return Err(
            proeve_core::Error::NiveauMismatch {
              verwacht: eerste.niveau,
              gevonden: kto.niveau,
            }
            .into(),
          );
        }
      }
    }

    // Conflicting pre-existing qualifications, across every (kto, cursus)
    // pair in the input.
    {
      let p = encode_uuid(input.kandidaat_id);
      let kto_ids: Vec<String> =
        ktos.iter().map(|k| encode_uuid(k.kto_id)).collect();
      let cursus_ids: Vec<String> =
        cursussen.iter().map(|c| encode_uuid(c.cursus_id)).collect();

      let conflict: Option<(String, String)> = self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(
            "SELECT 1 FROM behaalde_kwalificaties
             WHERE persoon_id = ?1 AND kto_id = ?2 AND cursus_id = ?3",
          )?;
          for kto in &kto_ids {
            for cursus in &cursus_ids {
              if stmt.exists(rusqlite::params![p, kto, cursus])? {
                return Ok(Some((kto.clone(), cursus.clone())));
              }
            }
          }
          Ok(None)
        })
        .await?;

      if let Some((kto, cursus)) = conflict {
        return Err(
          proeve_core::Error::KwalificatieReedsBehaald {
            kto:    crate::encode::decode_uuid(&kto)?,
            cursus: crate::encode::decode_uuid(&cursus)?,
          }
          .into(),
        );
      }
    }

    let aanvraag_id = Uuid::new_v4();
    let aanvraag = Aanvraag {
      aanvraag_id,
      handle: handle_voor(aanvraag_id),
      kandidaat_id: input.kandidaat_id,
      locatie_id: input.locatie_id,
      soort: input.soort,
      leercoach_id: input.leercoach_id,
      opmerkingen: input.opmerkingen.clone(),
      created_at: Utc::now(),
    };

    // Pre-encode everything the write closure needs.
    let a_str = encode_uuid(aanvraag_id);
    let handle = aanvraag.handle.clone();
    let kandidaat = encode_uuid(aanvraag.kandidaat_id);
    let locatie = encode_uuid(aanvraag.locatie_id);
    let soort = aanvraag.soort.as_str().to_owned();
    let leercoach = aanvraag.leercoach_id.map(encode_uuid);
    let opmerkingen = aanvraag.opmerkingen.clone();
    let created_at = encode_dt(aanvraag.created_at);
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden.clone();
    let payload = serde_json::json!({
      "onderdelen": input.onderdelen.len(),
      "cursussen":  input.cursussen.len(),
    })
    .to_string();

    struct OnderdeelRij {
      onderdeel_id: String,
      kto_id:       String,
      kerntaak_id:  String,
      startdatum:   Option<String>,
      opmerkingen:  Option<String>,
    }
    let mut rijen = Vec::with_capacity(input.onderdelen.len());
    let mut beoordelaar_follow_ups = Vec::new();
    for (o, kto) in input.onderdelen.iter().zip(&ktos) {
      let onderdeel_id = Uuid::new_v4();
      rijen.push(OnderdeelRij {
        onderdeel_id: encode_uuid(onderdeel_id),
        kto_id:       encode_uuid(o.kto_id),
        kerntaak_id:  encode_uuid(kto.kerntaak_id),
        startdatum:   o.startdatum.map(encode_dt),
        opmerkingen:  o.opmerkingen.clone(),
      });
      if let Some(b) = o.beoordelaar_id {
        beoordelaar_follow_ups.push((onderdeel_id, b));
      }
    }

    struct LinkRij {
      link_id:     String,
      cursus_id:   String,
      is_hoofd:    bool,
      opmerkingen: Option<String>,
    }
    let links: Vec<LinkRij> = input
      .cursussen
      .iter()
      .map(|l| LinkRij {
        link_id:     encode_uuid(Uuid::new_v4()),
        cursus_id:   encode_uuid(l.cursus_id),
        is_hoofd:    l.is_hoofdcursus,
        opmerkingen: l.opmerkingen.clone(),
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO aanvragen
             (aanvraag_id, handle, kandidaat_id, locatie_id, soort,
              leercoach_id, opmerkingen, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            a_str, handle, kandidaat, locatie, soort, leercoach, opmerkingen,
            created_at,
          ],
        )?;
        for link in &links {
          tx.execute(
            "INSERT INTO cursus_links
               (link_id, aanvraag_id, cursus_id, is_hoofdcursus, opmerkingen)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
              link.link_id,
              a_str,
              link.cursus_id,
              link.is_hoofd,
              link.opmerkingen,
            ],
          )?;
        }
        for rij in &rijen {
          tx.execute(
            "INSERT INTO onderdelen
               (onderdeel_id, aanvraag_id, kto_id, kerntaak_id, beoordelaar_id,
                startdatum, opmerkingen, uitslag)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7)",
            rusqlite::params![
              rij.onderdeel_id,
              a_str,
              rij.kto_id,
              rij.kerntaak_id,
              rij.startdatum,
              rij.opmerkingen,
              Uitslag::NogNietBekend.as_str(),
            ],
          )?;
        }
        append_status_row(
          &tx,
          &a_str,
          AanvraagStatus::Concept,
          &door_str,
          reden.as_deref(),
        )?;
        append_event_row(
          &tx,
          &a_str,
          None,
          EventType::AanvraagAangemaakt,
          Some(&payload),
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!(%aanvraag_id, handle = %aanvraag.handle, "aanvraag created");

    // Assessor assignment is a follow-up step through the regular command,
    // so it logs and re-checks like any later reassignment would.
    for (onderdeel_id, beoordelaar) in beoordelaar_follow_ups {
      self
        .update_beoordelaar(onderdeel_id, Some(beoordelaar), door.clone())
        .await?;
    }

    Ok(aanvraag)
  }

  // ── Onderdelen ────────────────────────────────────────────────────────

  async fn add_onderdeel(
    &self,
    aanvraag_id: Uuid,
    input: NieuwOnderdeel,
    door: Handeling,
  ) -> Result<Onderdeel> {
    let aanvraag = self.require_aanvraag(aanvraag_id).await?;
    let status = self.require_status(aanvraag_id).await?;
    if !status.onderdelen_bewerkbaar() {
      return Err(
        proeve_core::Error::AanvraagBevroren { aanvraag: aanvraag_id, status }
          .into(),
      );
    }

    let beoordelaar_check = async {
      match input.beoordelaar_id {
        Some(b) => {
          self.require_rol(b, aanvraag.locatie_id, ActorRol::Beoordelaar).await
        }
        None => Ok(()),
      }
    };
    let (kto, al_gekoppeld, niveau, conflict, ()) = tokio::try_join!(
      self.kto_catalog(input.kto_id),
      self.onderdeel_attached(aanvraag_id, input.kto_id),
      self.aanvraag_niveau(aanvraag_id),
      self.kwalificatie_via_gekoppelde_cursus(
        aanvraag_id,
        aanvraag.kandidaat_id,
        input.kto_id,
      ),
      beoordelaar_check,
    )?;

    if al_gekoppeld {
      return Err(proeve_core::Error::DuplicaatOnderdeel(input.kto_id).into());
    }
    if let Some(cursus) = conflict {
      return Err(
        proeve_core::Error::KwalificatieReedsBehaald {
          kto: input.kto_id,
          cursus,
        }
        .into(),
      );
    }
    if let Some(verwacht) = niveau
      && verwacht != kto.niveau
    {
      return Err(
        proeve_core::Error::NiveauMismatch { verwacht, gevonden: kto.niveau }
          .into(),
      );
    }

    let onderdeel = Onderdeel {
      onderdeel_id:   Uuid::new_v4(),
      aanvraag_id,
      kto_id:         input.kto_id,
      kerntaak_id:    kto.kerntaak_id,
      beoordelaar_id: None,
      startdatum:     input.startdatum,
      opmerkingen:    input.opmerkingen.clone(),
      uitslag:        Uitslag::NogNietBekend,
    };

    let o_str = encode_uuid(onderdeel.onderdeel_id);
    let a_str = encode_uuid(aanvraag_id);
    let kto_str = encode_uuid(onderdeel.kto_id);
    let kerntaak_str = encode_uuid(onderdeel.kerntaak_id);
    let startdatum = onderdeel.startdatum.map(encode_dt);
    let opmerkingen = onderdeel.opmerkingen.clone();
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden.clone();
    let payload =
      serde_json::json!({ "kto_id": onderdeel.kto_id, "titel": kto.titel })
        .to_string();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO onderdelen
             (onderdeel_id, aanvraag_id, kto_id, kerntaak_id, beoordelaar_id,
              startdatum, opmerkingen, uitslag)
           VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7)",
          rusqlite::params![
            o_str,
            a_str,
            kto_str,
            kerntaak_str,
            startdatum,
            opmerkingen,
            Uitslag::NogNietBekend.as_str(),
          ],
        )?;
        append_event_row(
          &tx,
          &a_str,
          Some(&o_str),
          EventType::OnderdeelToegevoegd,
          Some(&payload),
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    if let Some(b) = input.beoordelaar_id {
      self
        .update_beoordelaar(onderdeel.onderdeel_id, Some(b), door)
        .await?;
      return Ok(Onderdeel { beoordelaar_id: Some(b), ..onderdeel });
    }

    Ok(onderdeel)
  }

  async fn update_beoordelaar(
    &self,
    onderdeel_id: Uuid,
    beoordelaar_id: Option<Uuid>,
    door: Handeling,
  ) -> Result<()> {
    let (onderdeel, aanvraag) =
      self.onderdeel_met_aanvraag(onderdeel_id).await?;

    if let Some(b) = beoordelaar_id {
      self
        .require_rol(b, aanvraag.locatie_id, ActorRol::Beoordelaar)
        .await?;
    }

    let o_str = encode_uuid(onderdeel_id);
    let a_str = encode_uuid(onderdeel.aanvraag_id);
    let b_str = beoordelaar_id.map(encode_uuid);
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden.clone();
    let payload = serde_json::json!({
      "van": onderdeel.beoordelaar_id,
      "naar": beoordelaar_id,
    })
    .to_string();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE onderdelen SET beoordelaar_id = ?2 WHERE onderdeel_id = ?1",
          rusqlite::params![o_str, b_str],
        )?;
        append_event_row(
          &tx,
          &a_str,
          Some(&o_str),
          EventType::BeoordelaarGewijzigd,
          Some(&payload),
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    // Deliberately outside the write's transaction; see module docs.
    self
      .check_voorwaarden_and_update_status(onderdeel.aanvraag_id, door)
      .await?;
    Ok(())
  }

  async fn plan_onderdeel(
    &self,
    onderdeel_id: Uuid,
    startdatum: Option<DateTime<Utc>>,
    door: Handeling,
  ) -> Result<()> {
    let (onderdeel, _aanvraag) =
      self.onderdeel_met_aanvraag(onderdeel_id).await?;

    let o_str = encode_uuid(onderdeel_id);
    let a_str = encode_uuid(onderdeel.aanvraag_id);
    let datum_str = startdatum.map(encode_dt);
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden.clone();
    let payload = serde_json::json!({
      "van": onderdeel.startdatum,
      "naar": startdatum,
    })
    .to_string();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE onderdelen SET startdatum = ?2 WHERE onderdeel_id = ?1",
          rusqlite::params![o_str, datum_str],
        )?;
        append_event_row(
          &tx,
          &a_str,
          Some(&o_str),
          EventType::OnderdeelGepland,
          Some(&payload),
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    self
      .check_voorwaarden_and_update_status(onderdeel.aanvraag_id, door)
      .await?;
    Ok(())
  }

  // ── Cursussen ─────────────────────────────────────────────────────────

  async fn add_cursus(
    &self,
    aanvraag_id: Uuid,
    input: NieuweCursusLink,
    door: Handeling,
  ) -> Result<CursusLink> {
    let aanvraag = self.require_aanvraag(aanvraag_id).await?;

    let (cursus, bestaande, hoofd_groep, conflict) = tokio::try_join!(
      self.cursus_catalog(input.cursus_id),
      self.cursus_links_van(aanvraag_id),
      self.hoofdcursus_groep(aanvraag_id),
      self.kwalificatie_via_gekoppeld_onderdeel(
        aanvraag_id,
        aanvraag.kandidaat_id,
        input.cursus_id,
      ),
    )?;

    if bestaande.iter().any(|(id, _)| *id == input.cursus_id) {
      return Err(proeve_core::Error::DuplicaatCursus(input.cursus_id).into());
    }
    if let Some(kto) = conflict {
      return Err(
        proeve_core::Error::KwalificatieReedsBehaald {
          kto,
          cursus: input.cursus_id,
        }
        .into(),
      );
    }
    if let Some(groep) = hoofd_groep
      && groep != cursus.instructie_groep_id
    {
      return Err(
        proeve_core::Error::InstructieGroepMismatch {
          cursus: input.cursus_id,
        }
        .into(),
      );
    }

    let link = CursusLink {
      link_id:        Uuid::new_v4(),
      aanvraag_id,
      cursus_id:      input.cursus_id,
      is_hoofdcursus: input.is_hoofdcursus,
      opmerkingen:    input.opmerkingen.clone(),
    };

    let l_str = encode_uuid(link.link_id);
    let a_str = encode_uuid(aanvraag_id);
    let c_str = encode_uuid(link.cursus_id);
    let is_hoofd = link.is_hoofdcursus;
    let opmerkingen = link.opmerkingen.clone();
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden;
    let payload = serde_json::json!({
      "cursus_id": link.cursus_id,
      "is_hoofdcursus": is_hoofd,
    })
    .to_string();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if is_hoofd {
          tx.execute(
            "UPDATE cursus_links SET is_hoofdcursus = 0
             WHERE aanvraag_id = ?1 AND is_hoofdcursus = 1",
            rusqlite::params![a_str],
          )?;
        }
        tx.execute(
          "INSERT INTO cursus_links
             (link_id, aanvraag_id, cursus_id, is_hoofdcursus, opmerkingen)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![l_str, a_str, c_str, is_hoofd, opmerkingen],
        )?;
        append_event_row(
          &tx,
          &a_str,
          None,
          EventType::CursusToegevoegd,
          Some(&payload),
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(link)
  }

  async fn remove_cursus(
    &self,
    aanvraag_id: Uuid,
    cursus_id: Uuid,
    door: Handeling,
  ) -> Result<()> {
    self.require_aanvraag(aanvraag_id).await?;
    let links = self.cursus_links_van(aanvraag_id).await?;

    let Some((_, is_hoofd)) =
      links.iter().find(|(id, _)| *id == cursus_id).copied()
    else {
      return Err(
        proeve_core::Error::CursusNietGekoppeld {
          aanvraag: aanvraag_id,
          cursus:   cursus_id,
        }
        .into(),
      );
    };

    if links.len() == 1 {
      return Err(proeve_core::Error::LaatsteCursus.into());
    }
    if is_hoofd {
      return Err(proeve_core::Error::HoofdcursusNogInGebruik.into());
    }

    let a_str = encode_uuid(aanvraag_id);
    let c_str = encode_uuid(cursus_id);
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden;
    let payload = serde_json::json!({ "cursus_id": cursus_id }).to_string();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM cursus_links
           WHERE aanvraag_id = ?1 AND cursus_id = ?2",
          rusqlite::params![a_str, c_str],
        )?;
        append_event_row(
          &tx,
          &a_str,
          None,
          EventType::CursusVerwijderd,
          Some(&payload),
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn set_hoofdcursus(
    &self,
    aanvraag_id: Uuid,
    cursus_id: Uuid,
    door: Handeling,
  ) -> Result<()> {
    self.require_aanvraag(aanvraag_id).await?;
    let links = self.cursus_links_van(aanvraag_id).await?;

    let Some((_, is_hoofd)) =
      links.iter().find(|(id, _)| *id == cursus_id).copied()
    else {
      return Err(
        proeve_core::Error::CursusNietGekoppeld {
          aanvraag: aanvraag_id,
          cursus:   cursus_id,
        }
        .into(),
      );
    };
    if is_hoofd {
      return Err(proeve_core::Error::AlHoofdcursus(cursus_id).into());
    }

    let vorige = links.iter().find(|(_, hoofd)| *hoofd).map(|(id, _)| *id);
    let a_str = encode_uuid(aanvraag_id);
    let c_str = encode_uuid(cursus_id);
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden;
    let payload =
      serde_json::json!({ "van": vorige, "naar": cursus_id }).to_string();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE cursus_links SET is_hoofdcursus = 0
           WHERE aanvraag_id = ?1 AND is_hoofdcursus = 1",
          rusqlite::params![a_str],
        )?;
        tx.execute(
          "UPDATE cursus_links SET is_hoofdcursus = 1
           WHERE aanvraag_id = ?1 AND cursus_id = ?2",
          rusqlite::params![a_str, c_str],
        )?;
        append_event_row(
          &tx,
          &a_str,
          None,
          EventType::HoofdcursusGewijzigd,
          Some(&payload),
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  // ── Leercoach ─────────────────────────────────────────────────────────

  async fn request_leercoach_toestemming(
    &self,
    aanvraag_id: Uuid,
    leercoach_id: Uuid,
    door: Handeling,
  ) -> Result<ToestemmingRecord> {
    let aanvraag = self.require_aanvraag(aanvraag_id).await?;
    self
      .require_rol(leercoach_id, aanvraag.locatie_id, ActorRol::Instructeur)
      .await?;

    let a_str = encode_uuid(aanvraag_id);
    let coach_str = encode_uuid(leercoach_id);
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden.clone();
    let payload =
      serde_json::json!({ "leercoach_id": leercoach_id }).to_string();

    let record = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE aanvragen SET leercoach_id = ?2 WHERE aanvraag_id = ?1",
          rusqlite::params![a_str, coach_str],
        )?;
        let record = append_toestemming_row(
          &tx,
          aanvraag_id,
          leercoach_id,
          ToestemmingStatus::Gevraagd,
          &door,
        )?;
        append_event_row(
          &tx,
          &a_str,
          None,
          EventType::LeercoachToestemmingGevraagd,
          Some(&payload),
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(record)
      })
      .await?;

    Ok(record)
  }

  async fn set_leercoach_toestemming(
    &self,
    record_id: Uuid,
    besluit: ToestemmingBesluit,
    door: Handeling,
  ) -> Result<ToestemmingRecord> {
    let id_str = encode_uuid(record_id);

    let aanvraag_id: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT aanvraag_id FROM toestemming_records
               WHERE record_id = ?1",
              rusqlite::params![id_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    let Some(aanvraag_id) = aanvraag_id else {
      return Err(proeve_core::Error::ToestemmingNotFound(record_id).into());
    };
    let aanvraag_id = crate::encode::decode_uuid(&aanvraag_id)?;

    // The decision applies to the aanvraag's open request, which must
    // still be the latest record.
    let laatste = self
      .latest_toestemming(aanvraag_id)
      .await?
      .ok_or(proeve_core::Error::ToestemmingNotFound(record_id))?;
    if laatste.status != ToestemmingStatus::Gevraagd {
      return Err(
        proeve_core::Error::ToestemmingNietOpen(laatste.status).into(),
      );
    }

    let status = besluit.als_status();
    let a_str = encode_uuid(aanvraag_id);
    let leercoach_id = laatste.leercoach_id;
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden.clone();
    let door_voor_tx = door.clone();
    let payload =
      serde_json::json!({ "besluit": status.as_str() }).to_string();

    let record = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let record = append_toestemming_row(
          &tx,
          aanvraag_id,
          leercoach_id,
          status,
          &door_voor_tx,
        )?;
        append_event_row(
          &tx,
          &a_str,
          None,
          EventType::LeercoachToestemmingBeslist,
          Some(&payload),
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(record)
      })
      .await?;

    if status == ToestemmingStatus::Gegeven {
      self
        .check_voorwaarden_and_update_status(aanvraag_id, door)
        .await?;
    }

    Ok(record)
  }

  // ── Submit / withdraw ─────────────────────────────────────────────────

  async fn submit_aanvraag(
    &self,
    aanvraag_id: Uuid,
    door: Handeling,
  ) -> Result<AanvraagStatus> {
    let aanvraag = self.require_aanvraag(aanvraag_id).await?;
    let status = self.require_status(aanvraag_id).await?;
    if status != AanvraagStatus::Concept {
      return Err(
        proeve_core::Error::NietInConcept { aanvraag: aanvraag_id, status }
          .into(),
      );
    }

    let a_str = encode_uuid(aanvraag_id);
    let leercoach = aanvraag.leercoach_id;
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden.clone();
    let door_voor_tx = door.clone();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        append_status_row(
          &tx,
          &a_str,
          AanvraagStatus::WachtOpVoorwaarden,
          &door_str,
          reden.as_deref(),
        )?;
        append_event_row(
          &tx,
          &a_str,
          None,
          EventType::AanvraagIngediend,
          None,
          &door_str,
          reden.as_deref(),
        )?;
        if let Some(coach) = leercoach {
          let payload =
            serde_json::json!({ "leercoach_id": coach }).to_string();
          append_toestemming_row(
            &tx,
            aanvraag_id,
            coach,
            ToestemmingStatus::Gevraagd,
            &door_voor_tx,
          )?;
          append_event_row(
            &tx,
            &a_str,
            None,
            EventType::LeercoachToestemmingGevraagd,
            Some(&payload),
            &door_str,
            reden.as_deref(),
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!(%aanvraag_id, "aanvraag submitted");

    // Immediate re-evaluation; an aanvraag whose prerequisites are already
    // satisfied advances within the same command.
    let advanced = self
      .check_voorwaarden_and_update_status(aanvraag_id, door)
      .await?;

    Ok(if advanced {
      AanvraagStatus::GereedVoorBeoordeling
    } else {
      AanvraagStatus::WachtOpVoorwaarden
    })
  }

  async fn withdraw_aanvraag(
    &self,
    aanvraag_id: Uuid,
    door: Handeling,
  ) -> Result<()> {
    self.require_aanvraag(aanvraag_id).await?;
    let status = self.require_status(aanvraag_id).await?;
    if !status.kan_intrekken() {
      return Err(
        proeve_core::Error::NietIntrekbaar { aanvraag: aanvraag_id, status }
          .into(),
      );
    }

    let a_str = encode_uuid(aanvraag_id);
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        append_status_row(
          &tx,
          &a_str,
          AanvraagStatus::Ingetrokken,
          &door_str,
          reden.as_deref(),
        )?;
        append_event_row(
          &tx,
          &a_str,
          None,
          EventType::AanvraagIngetrokken,
          None,
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!(%aanvraag_id, "aanvraag withdrawn");
    Ok(())
  }

  // ── Prerequisite evaluation ───────────────────────────────────────────

  async fn check_voorwaarden(
    &self,
    aanvraag_id: Uuid,
  ) -> Result<VoorwaardenResultaat> {
    self.require_aanvraag(aanvraag_id).await?;

    // Two independent reads, issued concurrently.
    let ((totaal, met_beoordelaar, met_startdatum), laatste) = tokio::try_join!(
      self.voorwaarden_tellingen(aanvraag_id),
      self.latest_toestemming(aanvraag_id),
    )?;

    let snapshot = VoorwaardenSnapshot {
      onderdelen_totaal: totaal,
      met_beoordelaar,
      met_startdatum,
      leercoach: laatste.map(|r| r.status),
    };
    Ok(check_alle_voorwaarden(&snapshot))
  }

  async fn check_voorwaarden_and_update_status(
    &self,
    aanvraag_id: Uuid,
    door: Handeling,
  ) -> Result<bool> {
    // Fresh status read: once the aanvraag has advanced or been withdrawn
    // this wrapper is a no-op, which makes duplicate triggers harmless.
    match self.current_status(aanvraag_id).await? {
      Some(AanvraagStatus::WachtOpVoorwaarden) => {}
      _ => return Ok(false),
    }

    let resultaat = self.check_voorwaarden(aanvraag_id).await?;
    if !resultaat.voldaan {
      return Ok(false);
    }

    let a_str = encode_uuid(aanvraag_id);
    let door_str = encode_uuid(door.verricht_door);
    let reden = door.reden;
    let payload = serde_json::json!({
      "voorwaarden": Voorwaarde::ALLE
        .iter()
        .map(|v| v.as_str())
        .collect::<Vec<_>>(),
    })
    .to_string();

    let advanced = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // Re-check inside the transaction: a concurrent trigger may have
        // advanced the aanvraag between our read and this write.
        let huidige: Option<String> = tx
          .query_row(
            "SELECT status FROM status_records WHERE aanvraag_id = ?1
             ORDER BY recorded_at DESC, rowid DESC LIMIT 1",
            rusqlite::params![a_str],
            |row| row.get(0),
          )
          .optional()?;
        if huidige.as_deref()
          != Some(AanvraagStatus::WachtOpVoorwaarden.as_str())
        {
          return Ok(false);
        }
        append_status_row(
          &tx,
          &a_str,
          AanvraagStatus::GereedVoorBeoordeling,
          &door_str,
          reden.as_deref(),
        )?;
        append_event_row(
          &tx,
          &a_str,
          None,
          EventType::VoorwaardenVoltooid,
          Some(&payload),
          &door_str,
          reden.as_deref(),
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if advanced {
      tracing::info!(%aanvraag_id, "all prerequisites met, aanvraag advanced");
    }
    Ok(advanced)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  async fn get_aanvraag(
    &self,
    aanvraag_id: Uuid,
  ) -> Result<Option<AanvraagDetail>> {
    let aanvraag = match self.require_aanvraag(aanvraag_id).await {
      Ok(a) => a,
      Err(Error::Core(proeve_core::Error::AanvraagNotFound(_))) => {
        return Ok(None);
      }
      Err(e) => return Err(e),
    };

    let status = self.require_status(aanvraag_id).await?;

    let a_str = encode_uuid(aanvraag_id);
    let onderdelen_raw: Vec<RawOnderdeel> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT o.onderdeel_id, o.aanvraag_id, o.kto_id, o.kerntaak_id,
                  o.beoordelaar_id, o.startdatum, o.opmerkingen, o.uitslag
           FROM onderdelen o
           JOIN kerntaakonderdelen k ON k.kto_id = o.kto_id
           WHERE o.aanvraag_id = ?1
           ORDER BY k.rang",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![a_str], |row| {
            Ok(RawOnderdeel {
              onderdeel_id:   row.get(0)?,
              aanvraag_id:    row.get(1)?,
              kto_id:         row.get(2)?,
              kerntaak_id:    row.get(3)?,
              beoordelaar_id: row.get(4)?,
              startdatum:     row.get(5)?,
              opmerkingen:    row.get(6)?,
              uitslag:        row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let a_str = encode_uuid(aanvraag_id);
    let links_raw: Vec<RawCursusLink> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT link_id, aanvraag_id, cursus_id, is_hoofdcursus, opmerkingen
           FROM cursus_links WHERE aanvraag_id = ?1
           ORDER BY is_hoofdcursus DESC, rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![a_str], |row| {
            Ok(RawCursusLink {
              link_id:        row.get(0)?,
              aanvraag_id:    row.get(1)?,
              cursus_id:      row.get(2)?,
              is_hoofdcursus: row.get(3)?,
              opmerkingen:    row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(Some(AanvraagDetail {
      aanvraag,
      status,
      onderdelen: onderdelen_raw
        .into_iter()
        .map(RawOnderdeel::into_onderdeel)
        .collect::<Result<_>>()?,
      cursussen: links_raw
        .into_iter()
        .map(RawCursusLink::into_link)
        .collect::<Result<_>>()?,
    }))
  }

  async fn list_aanvragen(&self, query: &AanvraagQuery) -> Result<AanvraagPage> {
    let locatie = encode_uuid(query.locatie_id);
    let pattern = query.zoek.as_deref().map(|z| format!("%{z}%"));
    let limit = query.limit.unwrap_or(50) as i64;
    let offset = query.offset.unwrap_or(0) as i64;

    let locatie_count = locatie.clone();
    let pattern_count = pattern.clone();
    let totaal: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM aanvragen a
           WHERE a.locatie_id = ?1 AND (?2 IS NULL OR a.handle LIKE ?2)",
          rusqlite::params![locatie_count, pattern_count],
          |row| row.get(0),
        )?)
      })
      .await?;

    struct RawListItem {
      aanvraag_id:  String,
      handle:       String,
      kandidaat_id: String,
      locatie_id:   String,
      status:       String,
      onderdelen:   String,
    }

    let raws: Vec<RawListItem> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT
             a.aanvraag_id, a.handle, a.kandidaat_id, a.locatie_id,
             (SELECT s.status FROM status_records s
              WHERE s.aanvraag_id = a.aanvraag_id
              ORDER BY s.recorded_at DESC, s.rowid DESC LIMIT 1) AS status,
             COALESCE((
               SELECT json_group_array(json_object(
                 'titel', k.titel, 'soort', k.soort, 'uitslag', o.uitslag
               ) ORDER BY k.rang)
               FROM onderdelen o
               JOIN kerntaakonderdelen k ON k.kto_id = o.kto_id
               WHERE o.aanvraag_id = a.aanvraag_id
             ), '[]') AS onderdelen
           FROM aanvragen a
           WHERE a.locatie_id = ?1 AND (?2 IS NULL OR a.handle LIKE ?2)
           ORDER BY a.created_at DESC, a.rowid DESC
           LIMIT ?3 OFFSET ?4",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![locatie, pattern, limit, offset],
            |row| {
              Ok(RawListItem {
                aanvraag_id:  row.get(0)?,
                handle:       row.get(1)?,
                kandidaat_id: row.get(2)?,
                locatie_id:   row.get(3)?,
                status:       row.get(4)?,
                onderdelen:   row.get(5)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut items = Vec::with_capacity(raws.len());
    for raw in raws {
      let samenvattingen: Vec<RawSamenvatting> =
        serde_json::from_str(&raw.onderdelen)?;
      items.push(AanvraagListItem {
        aanvraag_id:  crate::encode::decode_uuid(&raw.aanvraag_id)?,
        handle:       raw.handle,
        kandidaat_id: crate::encode::decode_uuid(&raw.kandidaat_id)?,
        locatie_id:   crate::encode::decode_uuid(&raw.locatie_id)?,
        status:       decode_status(&raw.status)?,
        onderdelen:   samenvattingen
          .into_iter()
          .map(|s| {
            Ok(OnderdeelSamenvatting {
              titel:   s.titel,
              soort:   decode_onderdeel_soort(&s.soort)?,
              uitslag: decode_uitslag(&s.uitslag)?,
            })
          })
          .collect::<Result<_>>()?,
      });
    }

    Ok(AanvraagPage { items, totaal: totaal as u64 })
  }

  async fn status_historie(
    &self,
    aanvraag_id: Uuid,
  ) -> Result<Vec<StatusRecord>> {
    self.require_aanvraag(aanvraag_id).await?;
    let a_str = encode_uuid(aanvraag_id);

    let raws: Vec<RawStatusRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT record_id, aanvraag_id, status, verricht_door, reden,
                  recorded_at
           FROM status_records WHERE aanvraag_id = ?1
           ORDER BY recorded_at ASC, rowid ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![a_str], |row| {
            Ok(RawStatusRecord {
              record_id:     row.get(0)?,
              aanvraag_id:   row.get(1)?,
              status:        row.get(2)?,
              verricht_door: row.get(3)?,
              reden:         row.get(4)?,
              recorded_at:   row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStatusRecord::into_record).collect()
  }

  async fn toestemming_historie(
    &self,
    aanvraag_id: Uuid,
  ) -> Result<Vec<ToestemmingRecord>> {
    self.require_aanvraag(aanvraag_id).await?;
    let a_str = encode_uuid(aanvraag_id);

    let raws: Vec<RawToestemmingRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT record_id, aanvraag_id, leercoach_id, status, verricht_door,
                  reden, recorded_at
           FROM toestemming_records WHERE aanvraag_id = ?1
           ORDER BY recorded_at ASC, rowid ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![a_str], |row| {
            Ok(RawToestemmingRecord {
              record_id:     row.get(0)?,
              aanvraag_id:   row.get(1)?,
              leercoach_id:  row.get(2)?,
              status:        row.get(3)?,
              verricht_door: row.get(4)?,
              reden:         row.get(5)?,
              recorded_at:   row.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawToestemmingRecord::into_record)
      .collect()
  }

  async fn events(&self, aanvraag_id: Uuid) -> Result<Vec<EventRecord>> {
    self.require_aanvraag(aanvraag_id).await?;
    let a_str = encode_uuid(aanvraag_id);

    let raws: Vec<RawEventRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, aanvraag_id, onderdeel_id, event_type, payload,
                  verricht_door, reden, recorded_at
           FROM events WHERE aanvraag_id = ?1
           ORDER BY recorded_at ASC, rowid ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![a_str], |row| {
            Ok(RawEventRecord {
              event_id:      row.get(0)?,
              aanvraag_id:   row.get(1)?,
              onderdeel_id:  row.get(2)?,
              event_type:    row.get(3)?,
              payload:       row.get(4)?,
              verricht_door: row.get(5)?,
              reden:         row.get(6)?,
              recorded_at:   row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEventRecord::into_record).collect()
  }
}
