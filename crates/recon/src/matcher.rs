use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::model::{format_match_id, match_number, BankTransaction, BeaconEntry, MatchKind, MatchStatus, MatchSuggestion, Scores};
use crate::scoring::Scorer;

/// Ranked output of one generation pass.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    /// Best candidate per bank transaction, descending confidence.
    pub primary: Vec<MatchSuggestion>,
    /// Remaining candidates per bank id, each list descending confidence.
    pub alternates: BTreeMap<String, Vec<MatchSuggestion>>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.primary.len() + self.alternates.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Shift provisional ids (`MATCH_0001`..) so the first one becomes
    /// `first`. Returns the next free number.
    pub fn rebase(&mut self, first: u32) -> u32 {
        let mut next = first;
        for m in self.primary.iter_mut().chain(self.alternates.values_mut().flatten()) {
            let offset = m.number().unwrap_or(1).saturating_sub(1);
            let n = first + offset;
            m.id = format_match_id(n);
            next = next.max(n + 1);
        }
        next
    }
}

fn pending(bank: &BankTransaction, kind: MatchKind, scores: Scores) -> MatchSuggestion {
    MatchSuggestion {
        id: String::new(),
        bank_transaction: bank.clone(),
        kind,
        status: MatchStatus::Pending,
        scores,
    }
}

/// Every amount-exact pairing that survives the date tolerance.
///
/// 1-to-1: Beacon amount equals the bank amount. 1-to-2: two distinct Beacon
/// entries sum to the bank amount, each unordered pair considered once.
/// Unranked and without ids.
pub fn generate_candidates(
    bank: &[&BankTransaction],
    beacon: &[&BeaconEntry],
    scorer: &Scorer,
) -> Vec<MatchSuggestion> {
    let mut by_amount: HashMap<Decimal, Vec<usize>> = HashMap::new();
    for (i, e) in beacon.iter().enumerate() {
        by_amount.entry(e.amount.normalize()).or_default().push(i);
    }

    let mut out = Vec::new();
    let mut excluded = 0usize;

    for b in bank {
        if let Some(hits) = by_amount.get(&b.amount.normalize()) {
            for &i in hits {
                match scorer.score_one_to_one(b, beacon[i]) {
                    Ok(scores) => out.push(pending(b, MatchKind::OneToOne(beacon[i].clone()), scores)),
                    Err(_) => excluded += 1,
                }
            }
        }

        for (i, first) in beacon.iter().enumerate() {
            let need = (b.amount - first.amount).normalize();
            let Some(hits) = by_amount.get(&need) else {
                continue;
            };
            for &j in hits.iter().filter(|&&j| j > i) {
                let second = beacon[j];
                match scorer.score_one_to_two(b, first, second) {
                    Ok(scores) => out.push(pending(
                        b,
                        MatchKind::OneToTwo([(*first).clone(), second.clone()]),
                        scores,
                    )),
                    Err(_) => excluded += 1,
                }
            }
        }
    }

    log::debug!(
        "generated {} candidates from {} bank x {} Beacon ({} outside tolerance)",
        out.len(),
        bank.len(),
        beacon.len(),
        excluded
    );
    out
}

/// Group by bank transaction, keep the best as primary, retain the rest as
/// alternates, and hand out provisional ids: primaries first, then
/// alternates by bank id.
pub fn rank(candidates: Vec<MatchSuggestion>) -> CandidateSet {
    let mut grouped: BTreeMap<String, Vec<MatchSuggestion>> = BTreeMap::new();
    for c in candidates {
        grouped.entry(c.bank_id().to_string()).or_default().push(c);
    }

    let mut set = CandidateSet::default();
    for (bank_id, mut group) in grouped {
        group.sort_by(|a, b| {
            b.confidence()
                .total_cmp(&a.confidence())
                .then_with(|| a.beacon_entries().len().cmp(&b.beacon_entries().len()))
                .then_with(|| a.beacon_ids().cmp(b.beacon_ids()))
        });
        let mut rest = group.into_iter();
        if let Some(top) = rest.next() {
            set.primary.push(top);
        }
        let rest: Vec<_> = rest.collect();
        if !rest.is_empty() {
            set.alternates.insert(bank_id, rest);
        }
    }

    set.primary.sort_by(|a, b| {
        b.confidence()
            .total_cmp(&a.confidence())
            .then_with(|| a.bank_id().cmp(b.bank_id()))
    });

    let mut n = 1;
    for m in set.primary.iter_mut().chain(set.alternates.values_mut().flatten()) {
        m.id = format_match_id(n);
        n += 1;
    }
    set
}

/// Highest numeric id suffix in `matches`, 0 when none parse.
pub fn max_number<'a>(matches: impl IntoIterator<Item = &'a MatchSuggestion>) -> u32 {
    matches
        .into_iter()
        .filter_map(|m| match_number(&m.id))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;
    use crate::model::MatchType;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap() + chrono::Days::new(u64::from(d))
    }

    fn bank(id: &str, amount: Decimal, d: u32, description: &str) -> BankTransaction {
        BankTransaction {
            id: id.into(),
            date: day(d),
            kind: "FPI".into(),
            description: description.into(),
            amount,
        }
    }

    fn beacon(id: &str, amount: Decimal, d: u32, payee: &str) -> BeaconEntry {
        BeaconEntry {
            id: id.into(),
            date: day(d),
            trans_no: id.replace("BEACON_", "T"),
            payee: payee.into(),
            amount,
            detail: String::new(),
            matched: false,
        }
    }

    fn run(bank: &[BankTransaction], beacon: &[BeaconEntry]) -> Vec<MatchSuggestion> {
        let scorer = Scorer::new(&ReconConfig::default());
        let b: Vec<&BankTransaction> = bank.iter().collect();
        let e: Vec<&BeaconEntry> = beacon.iter().collect();
        generate_candidates(&b, &e, &scorer)
    }

    #[test]
    fn one_to_one_exact_amount() {
        let out = run(
            &[bank("BANK_0000", dec!(13.00), 0, "SMITH J PAYMENT")],
            &[beacon("BEACON_0000", dec!(13), 0, "J Smith"), beacon("BEACON_0001", dec!(13.01), 0, "J Smith")],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].match_type(), MatchType::OneToOne);
        assert_eq!(out[0].beacon_ids().collect::<Vec<_>>(), ["BEACON_0000"]);
        assert_eq!(out[0].status, MatchStatus::Pending);
    }

    #[test]
    fn one_to_two_unordered_pairs_once() {
        let out = run(
            &[bank("BANK_0000", dec!(26.00), 3, "SMITH J")],
            &[
                beacon("BEACON_0000", dec!(13.00), 2, "J Smith"),
                beacon("BEACON_0001", dec!(13.00), 2, "J Smith"),
                beacon("BEACON_0002", dec!(13.00), 2, "K Smith"),
            ],
        );
        // C(3, 2) pairs, no 1-to-1 at 26.00.
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|m| m.match_type() == MatchType::OneToTwo));
        let mut pairs: Vec<Vec<&str>> = out.iter().map(|m| m.beacon_ids().collect()).collect();
        pairs.sort();
        assert_eq!(
            pairs,
            [
                vec!["BEACON_0000", "BEACON_0001"],
                vec!["BEACON_0000", "BEACON_0002"],
                vec!["BEACON_0001", "BEACON_0002"],
            ]
        );
    }

    #[test]
    fn off_by_one_minor_unit_never_pairs() {
        let out = run(
            &[bank("BANK_0000", dec!(26.00), 0, "SMITH J")],
            &[beacon("BEACON_0000", dec!(13.00), 0, "J Smith"), beacon("BEACON_0001", dec!(12.99), 0, "J Smith")],
        );
        assert!(out.is_empty());
    }

    #[test]
    fn outside_tolerance_dropped() {
        let out = run(
            &[bank("BANK_0000", dec!(40.00), 8, "JONES A")],
            &[beacon("BEACON_0000", dec!(40.00), 0, "A Jones")],
        );
        assert!(out.is_empty());
        let out = run(
            &[bank("BANK_0000", dec!(40.00), 7, "JONES A")],
            &[beacon("BEACON_0000", dec!(40.00), 0, "A Jones")],
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn rank_keeps_alternates() {
        let out = run(
            &[
                bank("BANK_0000", dec!(50.00), 0, "TAYLOR B"),
                bank("BANK_0001", dec!(70.00), 0, "JONES A"),
            ],
            &[
                beacon("BEACON_0000", dec!(50.00), 3, "B Taylor"),
                beacon("BEACON_0001", dec!(50.00), 0, "B Taylor"),
                beacon("BEACON_0002", dec!(70.00), 0, "A Jones"),
            ],
        );
        let set = rank(out);
        assert_eq!(set.len(), 3);
        assert_eq!(set.primary.len(), 2);
        let taylor = set.primary.iter().find(|m| m.bank_id() == "BANK_0000").unwrap();
        assert_eq!(taylor.beacon_ids().collect::<Vec<_>>(), ["BEACON_0001"]);
        let alts = &set.alternates["BANK_0000"];
        assert_eq!(alts.len(), 1);
        assert_eq!(alts[0].beacon_ids().collect::<Vec<_>>(), ["BEACON_0000"]);
        assert!(!set.alternates.contains_key("BANK_0001"));

        // Primaries descend by confidence; ties break on bank id.
        assert_eq!(set.primary[0].bank_id(), "BANK_0000");
        assert_eq!(set.primary[0].id, "MATCH_0001");
        assert_eq!(set.primary[1].id, "MATCH_0002");
        assert_eq!(alts[0].id, "MATCH_0003");
    }

    #[test]
    fn rebase_shifts_provisional_ids() {
        let out = run(
            &[bank("BANK_0000", dec!(50.00), 0, "TAYLOR B")],
            &[beacon("BEACON_0000", dec!(50.00), 3, "B Taylor"), beacon("BEACON_0001", dec!(50.00), 0, "B Taylor")],
        );
        let mut set = rank(out);
        let next = set.rebase(151);
        assert_eq!(set.primary[0].id, "MATCH_0151");
        assert_eq!(set.alternates["BANK_0000"][0].id, "MATCH_0152");
        assert_eq!(next, 153);
    }

    #[test]
    fn max_number_ignores_foreign_ids() {
        let out = run(
            &[bank("BANK_0000", dec!(50.00), 0, "TAYLOR B")],
            &[beacon("BEACON_0000", dec!(50.00), 0, "B Taylor")],
        );
        let mut set = rank(out);
        assert_eq!(max_number(&set.primary), 1);
        set.primary[0].id = "legacy".into();
        assert_eq!(max_number(&set.primary), 0);
    }
}
