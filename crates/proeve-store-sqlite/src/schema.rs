//! SQL schema for the Proeve SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Reference catalogs ───────────────────────────────────────────────────
-- Read-only from the workflow's perspective; seeded out of band.

CREATE TABLE IF NOT EXISTS actor_rollen (
    persoon_id TEXT NOT NULL,
    locatie_id TEXT NOT NULL,
    rol        TEXT NOT NULL,    -- 'kandidaat' | 'instructeur' | 'beoordelaar'
    UNIQUE (persoon_id, locatie_id, rol)
);

CREATE TABLE IF NOT EXISTS cursussen (
    cursus_id           TEXT PRIMARY KEY,
    code                TEXT NOT NULL,
    instructie_groep_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kerntaakonderdelen (
    kto_id      TEXT PRIMARY KEY,
    kerntaak_id TEXT NOT NULL,
    titel       TEXT NOT NULL,
    soort       TEXT NOT NULL,   -- 'portfolio' | 'praktijk'
    niveau      INTEGER NOT NULL,
    rang        INTEGER NOT NULL -- natural display order in list views
);

CREATE TABLE IF NOT EXISTS behaalde_kwalificaties (
    persoon_id TEXT NOT NULL,
    kto_id     TEXT NOT NULL REFERENCES kerntaakonderdelen(kto_id),
    cursus_id  TEXT NOT NULL REFERENCES cursussen(cursus_id),
    UNIQUE (persoon_id, kto_id, cursus_id)
);

-- ── Aggregate ────────────────────────────────────────────────────────────
-- Mutable rows. Aanvragen are never deleted; withdrawal is a status row.

CREATE TABLE IF NOT EXISTS aanvragen (
    aanvraag_id  TEXT PRIMARY KEY,
    handle       TEXT NOT NULL UNIQUE,
    kandidaat_id TEXT NOT NULL,
    locatie_id   TEXT NOT NULL,
    soort        TEXT NOT NULL,  -- 'intern' | 'extern'
    leercoach_id TEXT,
    opmerkingen  TEXT,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS onderdelen (
    onderdeel_id   TEXT PRIMARY KEY,
    aanvraag_id    TEXT NOT NULL REFERENCES aanvragen(aanvraag_id),
    kto_id         TEXT NOT NULL REFERENCES kerntaakonderdelen(kto_id),
    kerntaak_id    TEXT NOT NULL,
    beoordelaar_id TEXT,
    startdatum     TEXT,
    opmerkingen    TEXT,
    uitslag        TEXT NOT NULL DEFAULT 'nog_niet_bekend',
    UNIQUE (aanvraag_id, kto_id)  -- settles concurrent duplicate attaches
);

CREATE TABLE IF NOT EXISTS cursus_links (
    link_id        TEXT PRIMARY KEY,
    aanvraag_id    TEXT NOT NULL REFERENCES aanvragen(aanvraag_id),
    cursus_id      TEXT NOT NULL REFERENCES cursussen(cursus_id),
    is_hoofdcursus INTEGER NOT NULL DEFAULT 0,
    opmerkingen    TEXT,
    UNIQUE (aanvraag_id, cursus_id)
);

-- ── Ledgers ──────────────────────────────────────────────────────────────
-- Strictly append-only. No UPDATE or DELETE is ever issued against these
-- tables; the current row is the most recent by (recorded_at, rowid).

CREATE TABLE IF NOT EXISTS status_records (
    record_id     TEXT PRIMARY KEY,
    aanvraag_id   TEXT NOT NULL REFERENCES aanvragen(aanvraag_id),
    status        TEXT NOT NULL,
    verricht_door TEXT NOT NULL,
    reden         TEXT,
    recorded_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS toestemming_records (
    record_id     TEXT PRIMARY KEY,
    aanvraag_id   TEXT NOT NULL REFERENCES aanvragen(aanvraag_id),
    leercoach_id  TEXT NOT NULL,
    status        TEXT NOT NULL,  -- 'gevraagd' | 'gegeven' | 'geweigerd'
    verricht_door TEXT NOT NULL,
    reden         TEXT,
    recorded_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    event_id      TEXT PRIMARY KEY,
    aanvraag_id   TEXT NOT NULL REFERENCES aanvragen(aanvraag_id),
    onderdeel_id  TEXT,
    event_type    TEXT NOT NULL,
    payload       TEXT,           -- JSON, event-type specific
    verricht_door TEXT NOT NULL,
    reden         TEXT,
    recorded_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS onderdelen_aanvraag_idx  ON onderdelen(aanvraag_id);
CREATE INDEX IF NOT EXISTS cursus_links_aanvraag_idx ON cursus_links(aanvraag_id);
CREATE INDEX IF NOT EXISTS status_aanvraag_idx      ON status_records(aanvraag_id, recorded_at);
CREATE INDEX IF NOT EXISTS toestemming_aanvraag_idx ON toestemming_records(aanvraag_id, recorded_at);
CREATE INDEX IF NOT EXISTS events_aanvraag_idx      ON events(aanvraag_id, recorded_at);
CREATE INDEX IF NOT EXISTS aanvragen_locatie_idx    ON aanvragen(locatie_id);

PRAGMA user_version = 1;
";
