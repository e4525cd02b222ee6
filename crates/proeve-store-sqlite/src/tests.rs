use chrono::{Duration, Utc};
use uuid::Uuid;

use proeve_core::{
  aanvraag::{AanvraagSoort, Handeling, NieuweAanvraag},
  catalogus::{
    ActorRegistratie, ActorRol, BehaaldeKwalificatie, Cursus,
    Kerntaakonderdeel, OnderdeelSoort,
  },
  cursus::NieuweCursusLink,
  event::EventType,
  leercoach::{ToestemmingBesluit, ToestemmingStatus},
  onderdeel::{NieuwOnderdeel, Uitslag},
  status::AanvraagStatus,
  store::{AanvraagQuery, AanvraagStore},
  voorwaarden::Voorwaarde,
};

use crate::{Error, SqliteStore};

// ─── Fixture ─────────────────────────────────────────────────────────────────

struct Fixture {
  store:       SqliteStore,
  locatie:     Uuid,
  kandidaat:   Uuid,
  coach:       Uuid,
  beoordelaar: Uuid,
  admin:       Uuid,
  cursus_a:    Uuid,
  cursus_b:    Uuid,
  cursus_los:  Uuid,
  kto_1:       Uuid,
  kto_2:       Uuid,
  kto_n3:      Uuid,
}

impl Fixture {
  /// Minimal valid creation input: one hoofdcursus, one onderdeel, no
  /// leercoach.
  fn basis_input(&self) -> NieuweAanvraag {
    NieuweAanvraag {
      kandidaat_id: self.kandidaat,
      locatie_id:   self.locatie,
      soort:        AanvraagSoort::Intern,
      leercoach_id: None,
      opmerkingen:  None,
      cursussen:    vec![NieuweCursusLink::hoofd(self.cursus_a)],
      onderdelen:   vec![NieuwOnderdeel::voor(self.kto_1)],
    }
  }

  fn admin(&self) -> Handeling { Handeling::door(self.admin) }
}

async fn fixture() -> Fixture {
  let store = SqliteStore::open_in_memory().await.unwrap();

  let locatie = Uuid::new_v4();
  let kandidaat = Uuid::new_v4();
  let coach = Uuid::new_v4();
  let beoordelaar = Uuid::new_v4();
  let admin = Uuid::new_v4();

  for (persoon_id, rol) in [
    (kandidaat, ActorRol::Kandidaat),
    (coach, ActorRol::Instructeur),
    (beoordelaar, ActorRol::Beoordelaar),
  ] {
    store
      .registreer_actor(ActorRegistratie { persoon_id, locatie_id: locatie, rol })
      .await
      .unwrap();
  }

  // Two cursussen in one instructie-groep, a third in a different one.
  let groep = Uuid::new_v4();
  let cursus_a = Uuid::new_v4();
  let cursus_b = Uuid::new_v4();
  let cursus_los = Uuid::new_v4();
  for (cursus_id, code, instructie_groep_id) in [
    (cursus_a, "TIMMEREN-1", groep),
    (cursus_b, "TIMMEREN-2", groep),
    (cursus_los, "METSELEN-1", Uuid::new_v4()),
  ] {
    store
      .voeg_cursus_toe(Cursus {
        cursus_id,
        code: code.to_owned(),
        instructie_groep_id,
      })
      .await
      .unwrap();
  }

  // Two niveau-4 kerntaakonderdelen and one at niveau 3.
  let kerntaak = Uuid::new_v4();
  let kto_1 = Uuid::new_v4();
  let kto_2 = Uuid::new_v4();
  let kto_n3 = Uuid::new_v4();
  for (kto_id, titel, soort, niveau, rang) in [
    (kto_1, "Werkvoorbereiding", OnderdeelSoort::Portfolio, 4, 1),
    (kto_2, "Uitvoering", OnderdeelSoort::Praktijk, 4, 2),
    (kto_n3, "Basisvaardigheden", OnderdeelSoort::Praktijk, 3, 3),
  ] {
    store
      .voeg_kerntaakonderdeel_toe(Kerntaakonderdeel {
        kto_id,
        kerntaak_id: kerntaak,
        titel: titel.to_owned(),
        soort,
        niveau,
        rang,
      })
      .await
      .unwrap();
  }

  Fixture {
    store,
    locatie,
    kandidaat,
    coach,
    beoordelaar,
    admin,
    cursus_a,
    cursus_b,
    cursus_los,
    kto_1,
    kto_2,
    kto_n3,
  }
}

fn assert_core_err(
  result: Result<impl std::fmt::Debug, Error>,
  check: impl FnOnce(&proeve_core::Error) -> bool,
) {
  match result {
    Err(Error::Core(e)) if check(&e) => {}
    other => panic!("expected a domain error, got {other:?}"),
  }
}

/// Drive an aanvraag to the point where every prerequisite is met and a
/// decision record is the only thing missing. Returns the open permission
/// record id.
async fn bijna_gereed(fx: &Fixture, aanvraag_id: Uuid) -> Uuid {
  fx.store
    .submit_aanvraag(aanvraag_id, fx.admin())
    .await
    .unwrap();
  let detail = fx.store.get_aanvraag(aanvraag_id).await.unwrap().unwrap();
  for onderdeel in &detail.onderdelen {
    fx.store
      .update_beoordelaar(
        onderdeel.onderdeel_id,
        Some(fx.beoordelaar),
        fx.admin(),
      )
      .await
      .unwrap();
    fx.store
      .plan_onderdeel(
        onderdeel.onderdeel_id,
        Some(Utc::now() + Duration::days(14)),
        fx.admin(),
      )
      .await
      .unwrap();
  }
  let laatste = fx
    .store
    .toestemming_historie(aanvraag_id)
    .await
    .unwrap()
    .pop()
    .expect("submit should have issued a permission request");
  assert_eq!(laatste.status, ToestemmingStatus::Gevraagd);
  laatste.record_id
}

// ─── Creation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_starts_in_concept_with_a_handle() {
  let fx = fixture().await;

  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();

  assert!(aanvraag.handle.starts_with("AV-"));
  assert_eq!(aanvraag.handle.len(), 9);

  let detail = fx
    .store
    .get_aanvraag(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(detail.status, AanvraagStatus::Concept);
  assert_eq!(detail.onderdelen.len(), 1);
  assert_eq!(detail.onderdelen[0].uitslag, Uitslag::NogNietBekend);
  assert_eq!(detail.cursussen.len(), 1);
  assert!(detail.cursussen[0].is_hoofdcursus);

  let historie =
    fx.store.status_historie(aanvraag.aanvraag_id).await.unwrap();
  assert_eq!(historie.len(), 1);
  assert_eq!(historie[0].status, AanvraagStatus::Concept);

  let events = fx.store.events(aanvraag.aanvraag_id).await.unwrap();
  assert_eq!(events[0].event_type, EventType::AanvraagAangemaakt);
}

#[tokio::test]
async fn create_rejects_extern() {
  let fx = fixture().await;
  let input =
    NieuweAanvraag { soort: AanvraagSoort::Extern, ..fx.basis_input() };

  assert_core_err(
    fx.store.create_aanvraag(input, fx.admin()).await,
    |e| matches!(e, proeve_core::Error::ExternNietOndersteund),
  );
}

#[tokio::test]
async fn create_requires_exactly_one_hoofdcursus() {
  let fx = fixture().await;

  let zonder = NieuweAanvraag { cursussen: vec![], ..fx.basis_input() };
  assert_core_err(fx.store.create_aanvraag(zonder, fx.admin()).await, |e| {
    matches!(e, proeve_core::Error::GeenCursussen)
  });

  let twee = NieuweAanvraag {
    cursussen: vec![
      NieuweCursusLink::hoofd(fx.cursus_a),
      NieuweCursusLink::hoofd(fx.cursus_b),
    ],
    ..fx.basis_input()
  };
  assert_core_err(fx.store.create_aanvraag(twee, fx.admin()).await, |e| {
    matches!(e, proeve_core::Error::HoofdcursusAantal(2))
  });
}

#[tokio::test]
async fn create_rejects_unknown_catalog_entries() {
  let fx = fixture().await;

  let input = NieuweAanvraag {
    cursussen: vec![NieuweCursusLink::hoofd(Uuid::new_v4())],
    ..fx.basis_input()
  };
  assert_core_err(fx.store.create_aanvraag(input, fx.admin()).await, |e| {
    matches!(e, proeve_core::Error::OnbekendeCursus(_))
  });

  let input = NieuweAanvraag {
    onderdelen: vec![NieuwOnderdeel::voor(Uuid::new_v4())],
    ..fx.basis_input()
  };
  assert_core_err(fx.store.create_aanvraag(input, fx.admin()).await, |e| {
    matches!(e, proeve_core::Error::OnbekendKerntaakonderdeel(_))
  });
}

#[tokio::test]
async fn create_requires_kandidaat_role_at_locatie() {
  let fx = fixture().await;
  let vreemde = Uuid::new_v4();
  let input = NieuweAanvraag { kandidaat_id: vreemde, ..fx.basis_input() };

  assert_core_err(fx.store.create_aanvraag(input, fx.admin()).await, |e| {
    matches!(
      e,
      proeve_core::Error::ActorZonderRol { persoon, rol: ActorRol::Kandidaat, .. }
        if *persoon == vreemde
    )
  });
}

#[tokio::test]
async fn create_rejects_mixed_instructie_groepen() {
  let fx = fixture().await;
  let input = NieuweAanvraag {
    cursussen: vec![
      NieuweCursusLink::hoofd(fx.cursus_a),
      NieuweCursusLink::extra(fx.cursus_los),
    ],
    ..fx.basis_input()
  };

  assert_core_err(fx.store.create_aanvraag(input, fx.admin()).await, |e| {
    matches!(
      e,
      proeve_core::Error::InstructieGroepMismatch { cursus } if *cursus == fx.cursus_los
    )
  });
}

#[tokio::test]
async fn create_rejects_mixed_niveaus() {
  let fx = fixture().await;
  let input = NieuweAanvraag {
    onderdelen: vec![
      NieuwOnderdeel::voor(fx.kto_1),
      NieuwOnderdeel::voor(fx.kto_n3),
    ],
    ..fx.basis_input()
  };

  assert_core_err(fx.store.create_aanvraag(input, fx.admin()).await, |e| {
    matches!(
      e,
      proeve_core::Error::NiveauMismatch { verwacht: 4, gevonden: 3 }
    )
  });
}

#[tokio::test]
async fn create_assigns_supplied_beoordelaar_as_follow_up() {
  let fx = fixture().await;
  let input = NieuweAanvraag {
    onderdelen: vec![NieuwOnderdeel {
      beoordelaar_id: Some(fx.beoordelaar),
      ..NieuwOnderdeel::voor(fx.kto_1)
    }],
    ..fx.basis_input()
  };

  let aanvraag =
    fx.store.create_aanvraag(input, fx.admin()).await.unwrap();
  let detail = fx
    .store
    .get_aanvraag(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(detail.onderdelen[0].beoordelaar_id, Some(fx.beoordelaar));

  // The assignment went through the regular command path and was logged.
  let types: Vec<_> = fx
    .store
    .events(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .into_iter()
    .map(|e| e.event_type)
    .collect();
  assert!(types.contains(&EventType::BeoordelaarGewijzigd));
}

// ─── Submit and the prerequisite gate ────────────────────────────────────────

#[tokio::test]
async fn submit_waits_when_prerequisites_are_missing() {
  let fx = fixture().await;
  let input =
    NieuweAanvraag { leercoach_id: Some(fx.coach), ..fx.basis_input() };
  let aanvraag =
    fx.store.create_aanvraag(input, fx.admin()).await.unwrap();

  let status = fx
    .store
    .submit_aanvraag(aanvraag.aanvraag_id, fx.admin())
    .await
    .unwrap();
  assert_eq!(status, AanvraagStatus::WachtOpVoorwaarden);

  let res =
    fx.store.check_voorwaarden(aanvraag.aanvraag_id).await.unwrap();
  assert!(!res.voldaan);
  assert_eq!(res.ontbrekend, Voorwaarde::ALLE);
}

#[tokio::test]
async fn submit_auto_issues_permission_request_for_associated_coach() {
  let fx = fixture().await;
  let input =
    NieuweAanvraag { leercoach_id: Some(fx.coach), ..fx.basis_input() };
  let aanvraag =
    fx.store.create_aanvraag(input, fx.admin()).await.unwrap();

  assert!(fx
    .store
    .toestemming_historie(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .is_empty());

  fx.store
    .submit_aanvraag(aanvraag.aanvraag_id, fx.admin())
    .await
    .unwrap();

  let historie = fx
    .store
    .toestemming_historie(aanvraag.aanvraag_id)
    .await
    .unwrap();
  assert_eq!(historie.len(), 1);
  assert_eq!(historie[0].status, ToestemmingStatus::Gevraagd);
  assert_eq!(historie[0].leercoach_id, fx.coach);
}

#[tokio::test]
async fn granting_the_last_prerequisite_advances_automatically() {
  let fx = fixture().await;
  let input =
    NieuweAanvraag { leercoach_id: Some(fx.coach), ..fx.basis_input() };
  let aanvraag =
    fx.store.create_aanvraag(input, fx.admin()).await.unwrap();
  let record_id = bijna_gereed(&fx, aanvraag.aanvraag_id).await;

  fx.store
    .set_leercoach_toestemming(
      record_id,
      ToestemmingBesluit::Gegeven,
      Handeling::door(fx.coach),
    )
    .await
    .unwrap();

  let historie =
    fx.store.status_historie(aanvraag.aanvraag_id).await.unwrap();
  let statussen: Vec<_> = historie.iter().map(|r| r.status).collect();
  assert_eq!(statussen, vec![
    AanvraagStatus::Concept,
    AanvraagStatus::WachtOpVoorwaarden,
    AanvraagStatus::GereedVoorBeoordeling,
  ]);

  let voltooid = fx
    .store
    .events(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .into_iter()
    .filter(|e| e.event_type == EventType::VoorwaardenVoltooid)
    .count();
  assert_eq!(voltooid, 1);
}

#[tokio::test]
async fn pre_approved_aanvraag_advances_within_submit() {
  let fx = fixture().await;
  let morgen = Utc::now() + Duration::days(1);
  let input = NieuweAanvraag {
    onderdelen: vec![NieuwOnderdeel {
      beoordelaar_id: Some(fx.beoordelaar),
      startdatum: Some(morgen),
      ..NieuwOnderdeel::voor(fx.kto_1)
    }],
    ..fx.basis_input()
  };
  let aanvraag =
    fx.store.create_aanvraag(input, fx.admin()).await.unwrap();

  // Permission can be requested and granted while still in concept.
  let record = fx
    .store
    .request_leercoach_toestemming(
      aanvraag.aanvraag_id,
      fx.coach,
      fx.admin(),
    )
    .await
    .unwrap();
  fx.store
    .set_leercoach_toestemming(
      record.record_id,
      ToestemmingBesluit::Gegeven,
      Handeling::door(fx.coach),
    )
    .await
    .unwrap();

  let status = fx
    .store
    .submit_aanvraag(aanvraag.aanvraag_id, fx.admin())
    .await
    .unwrap();
  assert_eq!(status, AanvraagStatus::GereedVoorBeoordeling);
}

#[tokio::test]
async fn recheck_is_idempotent_after_advancing() {
  let fx = fixture().await;
  let input =
    NieuweAanvraag { leercoach_id: Some(fx.coach), ..fx.basis_input() };
  let aanvraag =
    fx.store.create_aanvraag(input, fx.admin()).await.unwrap();
  let record_id = bijna_gereed(&fx, aanvraag.aanvraag_id).await;
  fx.store
    .set_leercoach_toestemming(
      record_id,
      ToestemmingBesluit::Gegeven,
      Handeling::door(fx.coach),
    )
    .await
    .unwrap();

  let voor =
    fx.store.status_historie(aanvraag.aanvraag_id).await.unwrap().len();
  let advanced = fx
    .store
    .check_voorwaarden_and_update_status(aanvraag.aanvraag_id, fx.admin())
    .await
    .unwrap();
  assert!(!advanced);
  let na =
    fx.store.status_historie(aanvraag.aanvraag_id).await.unwrap().len();
  assert_eq!(voor, na);
}

#[tokio::test]
async fn submit_requires_concept() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();
  fx.store
    .submit_aanvraag(aanvraag.aanvraag_id, fx.admin())
    .await
    .unwrap();

  assert_core_err(
    fx.store.submit_aanvraag(aanvraag.aanvraag_id, fx.admin()).await,
    |e| {
      matches!(
        e,
        proeve_core::Error::NietInConcept {
          status: AanvraagStatus::WachtOpVoorwaarden,
          ..
        }
      )
    },
  );
}

// ─── Leercoach toestemming ───────────────────────────────────────────────────

#[tokio::test]
async fn decision_requires_an_open_request() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();
  let record = fx
    .store
    .request_leercoach_toestemming(
      aanvraag.aanvraag_id,
      fx.coach,
      fx.admin(),
    )
    .await
    .unwrap();
  fx.store
    .set_leercoach_toestemming(
      record.record_id,
      ToestemmingBesluit::Geweigerd,
      Handeling::door(fx.coach),
    )
    .await
    .unwrap();

  // The request has been decided; a second decision must be refused.
  assert_core_err(
    fx.store
      .set_leercoach_toestemming(
        record.record_id,
        ToestemmingBesluit::Gegeven,
        Handeling::door(fx.coach),
      )
      .await,
    |e| {
      matches!(
        e,
        proeve_core::Error::ToestemmingNietOpen(ToestemmingStatus::Geweigerd)
      )
    },
  );
}

#[tokio::test]
async fn denial_blocks_and_a_new_request_reopens() {
  let fx = fixture().await;
  let input =
    NieuweAanvraag { leercoach_id: Some(fx.coach), ..fx.basis_input() };
  let aanvraag =
    fx.store.create_aanvraag(input, fx.admin()).await.unwrap();
  let record_id = bijna_gereed(&fx, aanvraag.aanvraag_id).await;

  fx.store
    .set_leercoach_toestemming(
      record_id,
      ToestemmingBesluit::Geweigerd,
      Handeling::door(fx.coach),
    )
    .await
    .unwrap();

  let res =
    fx.store.check_voorwaarden(aanvraag.aanvraag_id).await.unwrap();
  assert_eq!(res.ontbrekend, vec![Voorwaarde::LeercoachAkkoord]);

  // A fresh request appends a new gevraagd record; granting it advances.
  let nieuw = fx
    .store
    .request_leercoach_toestemming(
      aanvraag.aanvraag_id,
      fx.coach,
      fx.admin(),
    )
    .await
    .unwrap();
  fx.store
    .set_leercoach_toestemming(
      nieuw.record_id,
      ToestemmingBesluit::Gegeven,
      Handeling::door(fx.coach),
    )
    .await
    .unwrap();

  let detail = fx
    .store
    .get_aanvraag(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(detail.status, AanvraagStatus::GereedVoorBeoordeling);

  // Ledger kept every record; nothing was rewritten.
  let historie = fx
    .store
    .toestemming_historie(aanvraag.aanvraag_id)
    .await
    .unwrap();
  let statussen: Vec<_> = historie.iter().map(|r| r.status).collect();
  assert_eq!(statussen, vec![
    ToestemmingStatus::Gevraagd,
    ToestemmingStatus::Geweigerd,
    ToestemmingStatus::Gevraagd,
    ToestemmingStatus::Gegeven,
  ]);
}

#[tokio::test]
async fn request_requires_instructeur_role() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();

  assert_core_err(
    fx.store
      .request_leercoach_toestemming(
        aanvraag.aanvraag_id,
        fx.beoordelaar,
        fx.admin(),
      )
      .await,
    |e| {
      matches!(
        e,
        proeve_core::Error::ActorZonderRol { rol: ActorRol::Instructeur, .. }
      )
    },
  );
}

// ─── Withdraw ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn withdraw_is_allowed_until_assessment_starts() {
  let fx = fixture().await;
  let input =
    NieuweAanvraag { leercoach_id: Some(fx.coach), ..fx.basis_input() };
  let aanvraag =
    fx.store.create_aanvraag(input, fx.admin()).await.unwrap();
  let record_id = bijna_gereed(&fx, aanvraag.aanvraag_id).await;
  fx.store
    .set_leercoach_toestemming(
      record_id,
      ToestemmingBesluit::Gegeven,
      Handeling::door(fx.coach),
    )
    .await
    .unwrap();

  // Withdrawing from gereed_voor_beoordeling is still allowed.
  fx.store
    .withdraw_aanvraag(
      aanvraag.aanvraag_id,
      Handeling::met_reden(fx.kandidaat, "verhuizing"),
    )
    .await
    .unwrap();

  let detail = fx
    .store
    .get_aanvraag(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(detail.status, AanvraagStatus::Ingetrokken);

  let laatste = fx
    .store
    .status_historie(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .pop()
    .unwrap();
  assert_eq!(laatste.reden.as_deref(), Some("verhuizing"));

  assert_core_err(
    fx.store
      .withdraw_aanvraag(aanvraag.aanvraag_id, fx.admin())
      .await,
    |e| {
      matches!(
        e,
        proeve_core::Error::NietIntrekbaar {
          status: AanvraagStatus::Ingetrokken,
          ..
        }
      )
    },
  );
}

#[tokio::test]
async fn withdrawn_aanvraag_is_frozen() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();
  fx.store
    .withdraw_aanvraag(aanvraag.aanvraag_id, fx.admin())
    .await
    .unwrap();

  assert_core_err(
    fx.store
      .add_onderdeel(
        aanvraag.aanvraag_id,
        NieuwOnderdeel::voor(fx.kto_2),
        fx.admin(),
      )
      .await,
    |e| matches!(e, proeve_core::Error::AanvraagBevroren { .. }),
  );
}

// ─── Onderdelen ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn onderdelen_stay_editable_while_waiting() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();
  fx.store
    .submit_aanvraag(aanvraag.aanvraag_id, fx.admin())
    .await
    .unwrap();

  let onderdeel = fx
    .store
    .add_onderdeel(
      aanvraag.aanvraag_id,
      NieuwOnderdeel::voor(fx.kto_2),
      fx.admin(),
    )
    .await
    .unwrap();
  assert_eq!(onderdeel.kto_id, fx.kto_2);
}

#[tokio::test]
async fn duplicate_onderdeel_is_rejected() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();

  assert_core_err(
    fx.store
      .add_onderdeel(
        aanvraag.aanvraag_id,
        NieuwOnderdeel::voor(fx.kto_1),
        fx.admin(),
      )
      .await,
    |e| {
      matches!(e, proeve_core::Error::DuplicaatOnderdeel(kto) if *kto == fx.kto_1)
    },
  );
}

#[tokio::test]
async fn added_onderdeel_must_match_aanvraag_niveau() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();

  assert_core_err(
    fx.store
      .add_onderdeel(
        aanvraag.aanvraag_id,
        NieuwOnderdeel::voor(fx.kto_n3),
        fx.admin(),
      )
      .await,
    |e| {
      matches!(
        e,
        proeve_core::Error::NiveauMismatch { verwacht: 4, gevonden: 3 }
      )
    },
  );
}

#[tokio::test]
async fn already_achieved_kwalificatie_is_rejected() {
  let fx = fixture().await;
  fx.store
    .registreer_kwalificatie(BehaaldeKwalificatie {
      persoon_id: fx.kandidaat,
      kto_id:     fx.kto_2,
      cursus_id:  fx.cursus_a,
    })
    .await
    .unwrap();

  // At creation time.
  let input = NieuweAanvraag {
    onderdelen: vec![
      NieuwOnderdeel::voor(fx.kto_1),
      NieuwOnderdeel::voor(fx.kto_2),
    ],
    ..fx.basis_input()
  };
  assert_core_err(fx.store.create_aanvraag(input, fx.admin()).await, |e| {
    matches!(
      e,
      proeve_core::Error::KwalificatieReedsBehaald { kto, cursus }
        if *kto == fx.kto_2 && *cursus == fx.cursus_a
    )
  });

  // And against an existing aanvraag.
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();
  assert_core_err(
    fx.store
      .add_onderdeel(
        aanvraag.aanvraag_id,
        NieuwOnderdeel::voor(fx.kto_2),
        fx.admin(),
      )
      .await,
    |e| matches!(e, proeve_core::Error::KwalificatieReedsBehaald { .. }),
  );
}

#[tokio::test]
async fn update_beoordelaar_validates_the_role() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();
  let detail = fx
    .store
    .get_aanvraag(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .unwrap();
  let onderdeel_id = detail.onderdelen[0].onderdeel_id;

  assert_core_err(
    fx.store
      .update_beoordelaar(onderdeel_id, Some(fx.kandidaat), fx.admin())
      .await,
    |e| {
      matches!(
        e,
        proeve_core::Error::ActorZonderRol { rol: ActorRol::Beoordelaar, .. }
      )
    },
  );

  // Clearing is always allowed.
  fx.store
    .update_beoordelaar(onderdeel_id, None, fx.admin())
    .await
    .unwrap();
}

#[tokio::test]
async fn plan_onderdeel_records_old_and_new_value() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();
  let detail = fx
    .store
    .get_aanvraag(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .unwrap();
  let onderdeel_id = detail.onderdelen[0].onderdeel_id;

  let start = Utc::now() + Duration::days(7);
  fx.store
    .plan_onderdeel(onderdeel_id, Some(start), fx.admin())
    .await
    .unwrap();

  let detail = fx
    .store
    .get_aanvraag(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(detail.onderdelen[0].startdatum, Some(start));

  let event = fx
    .store
    .events(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .into_iter()
    .find(|e| e.event_type == EventType::OnderdeelGepland)
    .unwrap();
  assert_eq!(event.onderdeel_id, Some(onderdeel_id));
  let payload = event.payload.unwrap();
  assert!(payload["van"].is_null());
  assert!(!payload["naar"].is_null());
}

// ─── Cursussen ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn cursus_rules_hold_across_add_remove_and_promote() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();

  // The last cursus can never be removed.
  assert_core_err(
    fx.store
      .remove_cursus(aanvraag.aanvraag_id, fx.cursus_a, fx.admin())
      .await,
    |e| matches!(e, proeve_core::Error::LaatsteCursus),
  );

  fx.store
    .add_cursus(
      aanvraag.aanvraag_id,
      NieuweCursusLink::extra(fx.cursus_b),
      fx.admin(),
    )
    .await
    .unwrap();

  // The hoofdcursus is pinned while others remain.
  assert_core_err(
    fx.store
      .remove_cursus(aanvraag.aanvraag_id, fx.cursus_a, fx.admin())
      .await,
    |e| matches!(e, proeve_core::Error::HoofdcursusNogInGebruik),
  );

  fx.store
    .set_hoofdcursus(aanvraag.aanvraag_id, fx.cursus_b, fx.admin())
    .await
    .unwrap();
  fx.store
    .remove_cursus(aanvraag.aanvraag_id, fx.cursus_a, fx.admin())
    .await
    .unwrap();

  let detail = fx
    .store
    .get_aanvraag(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(detail.cursussen.len(), 1);
  assert_eq!(detail.cursussen[0].cursus_id, fx.cursus_b);
  assert!(detail.cursussen[0].is_hoofdcursus);
}

#[tokio::test]
async fn exactly_one_hoofdcursus_survives_a_hoofd_add() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();

  // Adding with the hoofd flag demotes the incumbent in the same step.
  fx.store
    .add_cursus(
      aanvraag.aanvraag_id,
      NieuweCursusLink::hoofd(fx.cursus_b),
      fx.admin(),
    )
    .await
    .unwrap();

  let detail = fx
    .store
    .get_aanvraag(aanvraag.aanvraag_id)
    .await
    .unwrap()
    .unwrap();
  let hoofden: Vec<_> = detail
    .cursussen
    .iter()
    .filter(|l| l.is_hoofdcursus)
    .map(|l| l.cursus_id)
    .collect();
  assert_eq!(hoofden, vec![fx.cursus_b]);
}

#[tokio::test]
async fn added_cursus_must_share_the_hoofd_instructie_groep() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();

  for input in [
    NieuweCursusLink::extra(fx.cursus_los),
    // Requesting hoofd status does not exempt the cursus from the rule.
    NieuweCursusLink::hoofd(fx.cursus_los),
  ] {
    assert_core_err(
      fx.store.add_cursus(aanvraag.aanvraag_id, input, fx.admin()).await,
      |e| {
        matches!(
          e,
          proeve_core::Error::InstructieGroepMismatch { cursus }
            if *cursus == fx.cursus_los
        )
      },
    );
  }
}

#[tokio::test]
async fn duplicate_and_unlinked_cursussen_are_rejected() {
  let fx = fixture().await;
  let aanvraag = fx
    .store
    .create_aanvraag(fx.basis_input(), fx.admin())
    .await
    .unwrap();

  assert_core_err(
    fx.store
      .add_cursus(
        aanvraag.aanvraag_id,
        NieuweCursusLink::extra(fx.cursus_a),
        fx.admin(),
      )
      .await,
    |e| {
      matches!(e, proeve_core::Error::DuplicaatCursus(c) if *c == fx.cursus_a)
    },
  );

  assert_core_err(
    fx.store
      .remove_cursus(aanvraag.aanvraag_id, fx.cursus_b, fx.admin())
      .await,
    |e| {
      matches!(
        e,
        proeve_core::Error::CursusNietGekoppeld { cursus, .. }
          if *cursus == fx.cursus_b
      )
    },
  );

  assert_core_err(
    fx.store
      .set_hoofdcursus(aanvraag.aanvraag_id, fx.cursus_a, fx.admin())
      .await,
    |e| {
      matches!(e, proeve_core::Error::AlHoofdcursus(c) if *c == fx.cursus_a)
    },
  );
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_aanvraag_surfaces_as_not_found() {
  let fx = fixture().await;
  let spook = Uuid::new_v4();

  assert!(fx.store.get_aanvraag(spook).await.unwrap().is_none());
  assert_core_err(fx.store.submit_aanvraag(spook, fx.admin()).await, |e| {
    matches!(e, proeve_core::Error::AanvraagNotFound(id) if *id == spook)
  });
  assert_core_err(fx.store.status_historie(spook).await, |e| {
    matches!(e, proeve_core::Error::AanvraagNotFound(_))
  });
}

#[tokio::test]
async fn list_paginates_and_filters_by_handle() {
  let fx = fixture().await;

  let mut handles = Vec::new();
  for _ in 0..3 {
    let aanvraag = fx
      .store
      .create_aanvraag(fx.basis_input(), fx.admin())
      .await
      .unwrap();
    handles.push(aanvraag.handle);
  }

  let alles = fx
    .store
    .list_aanvragen(&AanvraagQuery::voor_locatie(fx.locatie))
    .await
    .unwrap();
  assert_eq!(alles.totaal, 3);
  assert_eq!(alles.items.len(), 3);

  let pagina = fx
    .store
    .list_aanvragen(&AanvraagQuery {
      limit: Some(2),
      offset: Some(2),
      ..AanvraagQuery::voor_locatie(fx.locatie)
    })
    .await
    .unwrap();
  assert_eq!(pagina.totaal, 3);
  assert_eq!(pagina.items.len(), 1);

  // Filter on a fragment of one specific handle (skip the shared prefix).
  let fragment = handles[1][3..].to_owned();
  let gefilterd = fx
    .store
    .list_aanvragen(&AanvraagQuery {
      zoek: Some(fragment),
      ..AanvraagQuery::voor_locatie(fx.locatie)
    })
    .await
    .unwrap();
  assert_eq!(gefilterd.items.len(), 1);
  assert_eq!(gefilterd.items[0].handle, handles[1]);

  // Another locatie sees nothing.
  let leeg = fx
    .store
    .list_aanvragen(&AanvraagQuery::voor_locatie(Uuid::new_v4()))
    .await
    .unwrap();
  assert_eq!(leeg.totaal, 0);
  assert!(leeg.items.is_empty());
}

#[tokio::test]
async fn list_summaries_follow_catalog_rank_order() {
  let fx = fixture().await;
  // Attach in reverse rank order; the list view must sort by rang.
  let input = NieuweAanvraag {
    onderdelen: vec![
      NieuwOnderdeel::voor(fx.kto_2),
      NieuwOnderdeel::voor(fx.kto_1),
    ],
    ..fx.basis_input()
  };
  fx.store.create_aanvraag(input, fx.admin()).await.unwrap();

  let page = fx
    .store
    .list_aanvragen(&AanvraagQuery::voor_locatie(fx.locatie))
    .await
    .unwrap();
  let titels: Vec<_> = page.items[0]
    .onderdelen
    .iter()
    .map(|o| o.titel.as_str())
    .collect();
  assert_eq!(titels, vec!["Werkvoorbereiding", "Uitvoering"]);
  assert_eq!(page.items[0].status, AanvraagStatus::Concept);
}

#[tokio::test]
async fn ledgers_only_ever_grow() {
  let fx = fixture().await;
  let input =
    NieuweAanvraag { leercoach_id: Some(fx.coach), ..fx.basis_input() };
  let aanvraag =
    fx.store.create_aanvraag(input, fx.admin()).await.unwrap();

  let record_id = bijna_gereed(&fx, aanvraag.aanvraag_id).await;
  fx.store
    .set_leercoach_toestemming(
      record_id,
      ToestemmingBesluit::Gegeven,
      Handeling::door(fx.coach),
    )
    .await
    .unwrap();
  fx.store
    .withdraw_aanvraag(aanvraag.aanvraag_id, fx.admin())
    .await
    .unwrap();

  let events = fx.store.events(aanvraag.aanvraag_id).await.unwrap();
  assert!(!events.is_empty());
  let vorige = events.len();

  // A failed command appends nothing.
  let _ = fx.store.submit_aanvraag(aanvraag.aanvraag_id, fx.admin()).await;
  assert_eq!(fx.store.events(aanvraag.aanvraag_id).await.unwrap().len(), vorige);
}
