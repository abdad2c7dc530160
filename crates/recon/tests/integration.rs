use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use beacon_recon::config::ConflictPolicy;
use beacon_recon::{
    repair, validate, BankTransaction, BeaconEntry, Decision, MatchRef, MatchStatus, MatchType, ReconConfig,
    ReconEngine, ReconError, ReconState, StateStore,
};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 8).unwrap() + chrono::Days::new(u64::from(d))
}

fn bank(idx: usize, amount: Decimal, d: u32, description: &str) -> BankTransaction {
    BankTransaction {
        id: format!("BANK_{idx:04}"),
        date: day(d),
        kind: "FPI".into(),
        description: description.into(),
        amount,
    }
}

fn beacon(idx: usize, amount: Decimal, d: u32, payee: &str) -> BeaconEntry {
    BeaconEntry {
        id: format!("BEACON_{idx:04}"),
        date: day(d),
        trans_no: format!("{}", 100 + idx),
        payee: payee.into(),
        amount,
        detail: "Subs".into(),
        matched: false,
    }
}

fn engine(banks: Vec<BankTransaction>, beacons: Vec<BeaconEntry>) -> ReconEngine {
    ReconEngine::new(ReconConfig::default(), banks, beacons, ReconState::default())
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn simple_one_to_one() {
    let mut e = engine(
        vec![bank(0, dec!(13.00), 0, "SMITH J PAYMENT")],
        vec![beacon(0, dec!(13.00), 0, "J Smith")],
    );
    let out = e.generate();
    assert_eq!(out.len(), 1);
    let m = &out[0];
    assert_eq!(m.match_type(), MatchType::OneToOne);
    assert_eq!(m.status, MatchStatus::Pending);
    assert_eq!(m.scores.amount, 0.3);
    assert_eq!(m.scores.date, 1.0);
    assert_eq!(m.scores.name, 1.0);
    assert!((m.confidence() - 0.93).abs() < 1e-9);
}

#[test]
fn one_to_two_penalty() {
    let mut e = engine(
        vec![bank(0, dec!(26.00), 1, "SMITH J PAYMENT")],
        vec![beacon(0, dec!(13.00), 0, "J Smith"), beacon(1, dec!(13.00), 0, "J Smith")],
    );
    let out = e.generate();
    assert_eq!(out.len(), 1);
    let m = &out[0];
    assert_eq!(m.match_type(), MatchType::OneToTwo);
    // 26.00 is not common: other weights, both halves common so amount 0.3.
    let raw = 0.30 * 0.3 + 0.35 * m.scores.date + 0.35 * 1.0;
    assert!((m.confidence() - raw * 0.90).abs() < 1e-9);
    let id = m.id.clone();

    e.confirm(&id).unwrap();
    assert_eq!(e.state().matched_beacon_ids.len(), 2);
    assert!(validate(e.state()).is_empty());
}

#[test]
fn exclusivity_conflict_leaves_state_unchanged() {
    let mut e = engine(
        vec![bank(0, dec!(13.00), 0, "SMITH J"), bank(1, dec!(13.00), 2, "SMITH J")],
        vec![beacon(1, dec!(13.00), 1, "J Smith")],
    );
    e.generate();
    let ids: Vec<String> = e.suggestions().iter().map(|m| m.id.clone()).collect();
    assert_eq!(ids.len(), 2);

    e.confirm(&ids[0]).unwrap();
    let after_a = e.state().clone();
    let err = e.confirm(&ids[1]).unwrap_err();
    assert!(matches!(err, ReconError::Conflict { ref beacon_id, .. } if beacon_id == "BEACON_0001"));
    assert_eq!(e.state(), &after_a);
}

#[test]
fn duplicate_id_repair_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("reconciliation_state.json"));

    let mut e = engine(
        vec![bank(0, dec!(13.00), 0, "SMITH J"), bank(1, dec!(9.50), 0, "JONES A")],
        vec![beacon(0, dec!(13.00), 0, "J Smith"), beacon(1, dec!(9.50), 0, "A Jones")],
    );
    e.generate();
    let ids: Vec<String> = e.suggestions().iter().map(|m| m.id.clone()).collect();
    for id in &ids {
        e.confirm(id).unwrap();
    }
    let mut state = e.into_state();
    // Legacy corruption: both records carry MATCH_0001.
    for m in &mut state.confirmed_matches {
        m.id = "MATCH_0001".into();
    }
    store.save(&state).unwrap();

    let mut loaded = store.load().unwrap();
    let findings = validate(&loaded);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].code(), "duplicate_match_id");

    store.backup().unwrap();
    let report = repair(&mut loaded, ConflictPolicy::default());
    assert_eq!(report.renumbered.len(), 1);
    assert_eq!(report.renumbered[0].to, "MATCH_0002");
    store.save(&loaded).unwrap();

    let reloaded = store.load().unwrap();
    assert!(validate(&reloaded).is_empty());
    assert!(store.backup_path().exists());
}

#[test]
fn date_tolerance_boundary() {
    let mut e = engine(
        vec![bank(0, dec!(40.00), 7, "JONES A"), bank(1, dec!(41.00), 8, "JONES A")],
        vec![beacon(0, dec!(40.00), 0, "A Jones"), beacon(1, dec!(41.00), 0, "A Jones")],
    );
    let out = e.generate();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].bank_id(), "BANK_0000");
    assert!((out[0].scores.date - 0.125).abs() < 1e-9);
}

#[test]
fn tolerance_override_changes_eligibility() {
    let mut config = ReconConfig::default();
    config.matching.date_tolerance_days = 10;
    let mut e = ReconEngine::new(
        config,
        vec![bank(0, dec!(41.00), 8, "JONES A")],
        vec![beacon(0, dec!(41.00), 0, "A Jones")],
        ReconState::default(),
    );
    assert_eq!(e.generate().len(), 1);
}

// -------------------------------------------------------------------------
// Multi-pass + persistence
// -------------------------------------------------------------------------

fn fixture() -> (Vec<BankTransaction>, Vec<BeaconEntry>) {
    (
        vec![
            bank(0, dec!(13.00), 0, "SMITH J PAYMENT"),
            bank(1, dec!(26.00), 3, "BROWN K"),
            bank(2, dec!(55.20), 4, "TAYLOR B"),
            bank(3, dec!(2.50), 5, "SERVICE CHARGE"),
        ],
        vec![
            beacon(0, dec!(13.00), 0, "J Smith"),
            beacon(1, dec!(13.00), 2, "K Brown"),
            beacon(2, dec!(13.00), 2, "K Brown"),
            beacon(3, dec!(55.20), 9, "B Taylor"),
        ],
    )
}

#[test]
fn decisions_survive_reload_and_ids_keep_rising() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));

    let (banks, beacons) = fixture();
    let mut e = ReconEngine::new(ReconConfig::default(), banks.clone(), beacons.clone(), store.load().unwrap());
    e.generate();
    let first_max = e
        .suggestions()
        .iter()
        .chain(e.alternates("BANK_0000"))
        .filter_map(|m| m.number())
        .max()
        .unwrap();

    let smith = e.suggestions().iter().find(|m| m.bank_id() == "BANK_0000").unwrap().id.clone();
    let taylor = e.suggestions().iter().find(|m| m.bank_id() == "BANK_0002").unwrap().id.clone();
    e.confirm(&smith).unwrap();
    e.reject(&taylor).unwrap();
    e.resolve("BANK_0003", "bank fee").unwrap();
    store.save(e.state()).unwrap();

    let mut e = ReconEngine::new(ReconConfig::default(), banks, beacons, store.load().unwrap());
    assert!(e.beacon()[0].matched);
    let out = e.generate();

    // Smith confirmed, Taylor's only pairing rejected, fee resolved: only Brown remains.
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].bank_id(), "BANK_0001");
    assert_eq!(out[0].match_type(), MatchType::OneToTwo);
    assert!(out[0].number().unwrap() > first_max);

    let stats = e.stats();
    assert_eq!(stats.unmatched_bank, 2);
    assert_eq!(stats.bucket(MatchStatus::Confirmed).count, 1);
    assert_eq!(stats.bucket(MatchStatus::Rejected).count, 1);
    assert_eq!(stats.bucket(MatchStatus::ManuallyResolved).count, 1);
    assert_eq!(stats.bucket(MatchStatus::Pending).count, 1);
}

#[test]
fn replayed_batch_never_lands_on_a_reassigned_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    let banks = vec![
        bank(0, dec!(13.00), 0, "SMITH J"),
        bank(1, dec!(13.00), 2, "SMITH J"),
        bank(2, dec!(9.50), 3, "JONES A"),
    ];
    let beacons = vec![beacon(1, dec!(13.00), 1, "J Smith"), beacon(2, dec!(9.50), 3, "A Jones")];

    let mut e = ReconEngine::new(ReconConfig::default(), banks.clone(), beacons.clone(), store.load().unwrap());
    e.generate();
    let first = e.suggestions().iter().find(|m| m.bank_id() == "BANK_0000").unwrap().id.clone();
    let second = e.suggestions().iter().find(|m| m.bank_id() == "BANK_0001").unwrap().id.clone();
    let batch = vec![
        Decision::Confirm(MatchRef::new(first.clone(), "BANK_0000")),
        Decision::Confirm(MatchRef::new(second.clone(), "BANK_0001")),
    ];
    let results = e.apply_batch(&batch);
    assert!(results[0].as_ref().unwrap().changed());
    assert!(results[1].as_ref().unwrap_err().is_conflict());
    store.save(e.state()).unwrap();

    // Next session: same batch file, fresh working ids.
    let mut e = ReconEngine::new(ReconConfig::default(), banks, beacons, store.load().unwrap());
    e.generate();
    let before = e.state().clone();
    let results = e.apply_batch(&batch);

    assert!(!results[0].as_ref().unwrap().changed());
    match e.find(&second) {
        Some(reused) => {
            assert_ne!(reused.bank_id(), "BANK_0001");
            assert!(matches!(results[1], Err(ReconError::StaleDecision { .. })), "{:?}", results[1]);
        }
        None => assert_eq!(results[1], Err(ReconError::UnknownMatch(second.clone()))),
    }
    assert_eq!(e.state(), &before);
    let confirmed: Vec<&str> = e.state().confirmed_matches.iter().map(|m| m.bank_id()).collect();
    assert_eq!(confirmed, ["BANK_0000"]);
    let jones = e.suggestions().iter().find(|m| m.bank_id() == "BANK_0002").unwrap();
    assert_eq!(jones.status, MatchStatus::Pending);
}

#[test]
fn inconsistent_ledger_cannot_be_made_worse_by_decisions() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    let banks = vec![
        bank(0, dec!(13.00), 0, "SMITH J"),
        bank(1, dec!(13.00), 1, "SMITH J"),
        bank(2, dec!(9.50), 0, "JONES A"),
        bank(3, dec!(40.00), 0, "TAYLOR B"),
    ];
    let beacons = vec![
        beacon(0, dec!(13.00), 0, "J Smith"),
        beacon(1, dec!(9.50), 0, "A Jones"),
        beacon(2, dec!(40.00), 0, "B Taylor"),
    ];

    let mut e = ReconEngine::new(ReconConfig::default(), banks.clone(), beacons.clone(), ReconState::default());
    e.generate();
    for bank_id in ["BANK_0000", "BANK_0002"] {
        let id = e.suggestions().iter().find(|m| m.bank_id() == bank_id).unwrap().id.clone();
        e.confirm(&id).unwrap();
    }
    let mut state = e.into_state();
    // A second confirmed match on BEACON_0000 that also reuses Jones's id.
    let mut twin = state.confirmed_matches[0].clone();
    twin.bank_transaction = bank(1, dec!(13.00), 1, "SMITH J");
    twin.id = state.confirmed_matches[1].id.clone();
    let duplicated = twin.id.clone();
    state.confirmed_matches.push(twin);
    store.save(&state).unwrap();

    let loaded = store.load().unwrap();
    let codes: Vec<&str> = validate(&loaded).iter().map(|f| f.code()).collect();
    assert!(codes.contains(&"duplicate_match_id"), "{codes:?}");
    assert!(codes.contains(&"exclusivity_violation"), "{codes:?}");
    let violations = |state: &ReconState| {
        validate(state)
            .into_iter()
            .filter(|f| f.code() == "exclusivity_violation")
            .count()
    };

    let mut e = ReconEngine::new(ReconConfig::default(), banks, beacons, loaded);
    e.generate();
    assert!(e.suggestions().iter().all(|m| m.beacon_ids().all(|id| id != "BEACON_0000")));
    let taylor = e.suggestions().iter().find(|m| m.bank_id() == "BANK_0003").unwrap().clone();

    // The contested entry cannot be handed out again.
    assert!(matches!(
        e.manual_match("BANK_0003", &["100".to_string()], ""),
        Err(ReconError::Conflict { .. })
    ));
    // The duplicated id resolves to Jones, so a decision naming the twin is refused.
    let before = e.state().clone();
    let twin_revert = Decision::Revert(MatchRef::new(duplicated.clone(), "BANK_0001"));
    assert!(matches!(e.apply(&twin_revert), Err(ReconError::StaleDecision { .. })));
    assert_eq!(e.state(), &before);

    let out = e.apply(&Decision::Confirm(MatchRef::of(&taylor))).unwrap();
    assert_eq!(out.status, MatchStatus::Confirmed);
    assert!(taylor.number().unwrap() > duplicated[6..].parse::<u32>().unwrap());
    assert_eq!(violations(e.state()), 1);

    e.repair();
    assert!(validate(e.state()).is_empty());
    assert_eq!(e.state().confirmed_matches.len(), 3);
}

#[test]
fn corrupt_ledger_never_overwritten_by_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, r#"{"matched_beacon_ids": [], "confirmed_matches": [{"id": 1}]}"#).unwrap();
    let before = std::fs::read(&path).unwrap();
    assert!(matches!(StateStore::new(&path).load(), Err(ReconError::StateFormat(_))));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

// -------------------------------------------------------------------------
// Properties
// -------------------------------------------------------------------------

const AMOUNTS: [Decimal; 5] = [dec!(13.00), dec!(9.50), dec!(26.00), dec!(22.50), dec!(40.00)];
const NAMES: [(&str, &str); 3] = [("SMITH J", "J Smith"), ("JONES A", "A Jones"), ("TAYLOR B", "B Taylor")];

fn records() -> impl Strategy<Value = (Vec<BankTransaction>, Vec<BeaconEntry>)> {
    let bank_rows = prop::collection::vec((0..AMOUNTS.len(), 0u32..10, 0..NAMES.len()), 1..6);
    let beacon_rows = prop::collection::vec((0..AMOUNTS.len(), 0u32..10, 0..NAMES.len()), 1..8);
    (bank_rows, beacon_rows).prop_map(|(b, e)| {
        let banks = b
            .into_iter()
            .enumerate()
            .map(|(i, (a, d, n))| bank(i, AMOUNTS[a], d, NAMES[n].0))
            .collect();
        let beacons = e
            .into_iter()
            .enumerate()
            .map(|(i, (a, d, n))| beacon(i, AMOUNTS[a], d, NAMES[n].1))
            .collect();
        (banks, beacons)
    })
}

fn apply_ops(e: &mut ReconEngine, ops: &[(u8, usize)]) {
    for &(op, pick) in ops {
        let ids: Vec<String> = e.all_matches().map(|m| m.id.clone()).collect();
        if ids.is_empty() {
            return;
        }
        let id = &ids[pick % ids.len()];
        let _ = match op % 4 {
            0 => e.confirm(id),
            1 => e.reject(id),
            2 => e.skip(id),
            _ => e.revert(id),
        };
        assert!(validate(e.state()).is_empty(), "{:?}", validate(e.state()));
    }
}

proptest! {
    #[test]
    fn decisions_preserve_invariants(
        (banks, beacons) in records(),
        ops in prop::collection::vec((0u8..4, 0usize..32), 0..24),
    ) {
        let mut e = engine(banks, beacons);
        e.generate();
        apply_ops(&mut e, &ops);

        // Exclusivity + derived-set agreement hold after every pass too.
        e.generate();
        prop_assert!(validate(e.state()).is_empty());
        let derived = e.state().referenced_beacon_ids();
        prop_assert_eq!(&derived, &e.state().matched_beacon_ids);
    }

    #[test]
    fn generated_ids_exceed_ledger(
        (banks, beacons) in records(),
        ops in prop::collection::vec((0u8..4, 0usize..32), 0..12),
    ) {
        let mut e = engine(banks, beacons);
        e.generate();
        apply_ops(&mut e, &ops);
        let ledger_max = e.state().max_match_number();
        e.generate();
        for m in e.suggestions() {
            prop_assert!(m.number().unwrap() > ledger_max);
        }
    }

    #[test]
    fn repair_is_idempotent(
        (banks, beacons) in records(),
        ops in prop::collection::vec((0u8..4, 0usize..32), 0..12),
        dup in any::<bool>(),
        unflag in any::<bool>(),
        orphan in any::<bool>(),
    ) {
        let mut e = engine(banks, beacons);
        e.generate();
        apply_ops(&mut e, &ops);
        let mut state = e.into_state();

        if dup {
            if let Some(first) = state.confirmed_matches.first().cloned() {
                let mut copy = first.clone();
                copy.bank_transaction.id = "BANK_9999".into();
                state.rejected_matches.push(copy);
                state.confirmed_matches.push(first);
            }
        }
        if unflag {
            if let Some(m) = state.confirmed_matches.first_mut() {
                m.flag_entries(false);
            }
        }
        if orphan {
            state.matched_beacon_ids.insert("BEACON_0999".into());
        }

        for policy in [ConflictPolicy::HigherConfidence, ConflictPolicy::MostRecent] {
            let mut once = state.clone();
            repair(&mut once, policy);
            prop_assert!(validate(&once).is_empty());
            let mut twice = once.clone();
            let second = repair(&mut twice, policy);
            prop_assert!(second.is_empty());
            prop_assert_eq!(&twice, &once);
        }
    }
}
