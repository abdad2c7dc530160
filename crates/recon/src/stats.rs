use std::collections::{BTreeMap, HashSet};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::{BankTransaction, BeaconEntry, MatchStatus, MatchSuggestion};
use crate::state::ReconState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub count: usize,
    /// Sum of the bank amounts of the matches in this bucket.
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// Review progress: counts and summed amounts per status bucket.
///
/// Unmatched bank transactions are counted once per transaction (not per
/// pending suggestion): uncovered by any confirmed-class match and not in
/// `rejected_bank_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconStats {
    pub total_bank: usize,
    pub total_beacon: usize,
    pub buckets: BTreeMap<MatchStatus, Bucket>,
    pub matched_beacon: usize,
    pub unmatched_beacon: usize,
    pub unmatched_bank: usize,
    #[serde(with = "rust_decimal::serde::str")]
    pub unmatched_bank_amount: Decimal,
    pub resolved_bank: usize,
}

impl ReconStats {
    pub fn compute(
        bank: &[BankTransaction],
        beacon: &[BeaconEntry],
        state: &ReconState,
        working: &[MatchSuggestion],
    ) -> Self {
        let mut buckets: BTreeMap<MatchStatus, Bucket> =
            MatchStatus::ALL.iter().map(|s| (*s, Bucket::default())).collect();

        let ledger = state.confirmed_matches.iter().chain(&state.rejected_matches);
        for m in ledger.chain(working) {
            let bucket = buckets.entry(m.status).or_default();
            bucket.count += 1;
            bucket.amount += m.bank_transaction.amount;
        }

        let covered: HashSet<&str> = state.covered_bank_ids();
        let unmatched: Vec<&BankTransaction> = bank
            .iter()
            .filter(|b| !covered.contains(b.id.as_str()) && !state.rejected_bank_ids.contains(&b.id))
            .collect();

        let matched_beacon = beacon
            .iter()
            .filter(|e| state.matched_beacon_ids.contains(&e.id))
            .count();

        Self {
            total_bank: bank.len(),
            total_beacon: beacon.len(),
            buckets,
            matched_beacon,
            unmatched_beacon: beacon.len() - matched_beacon,
            unmatched_bank: unmatched.len(),
            unmatched_bank_amount: unmatched.iter().map(|b| b.amount).sum(),
            resolved_bank: bank.iter().filter(|b| state.rejected_bank_ids.contains(&b.id)).count(),
        }
    }

    pub fn bucket(&self, status: MatchStatus) -> &Bucket {
        static EMPTY: Bucket = Bucket { count: 0, amount: Decimal::ZERO };
        self.buckets.get(&status).unwrap_or(&EMPTY)
    }
}

impl std::fmt::Display for ReconStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "bank transactions:   {}", self.total_bank)?;
        writeln!(f, "Beacon entries:      {}", self.total_beacon)?;
        for (status, b) in &self.buckets {
            writeln!(f, "  {:<18} {:>5}  {:>12}", status.to_string(), b.count, b.amount)?;
        }
        writeln!(f, "matched Beacon:      {}", self.matched_beacon)?;
        writeln!(f, "unmatched Beacon:    {}", self.unmatched_beacon)?;
        writeln!(f, "unmatched bank:      {} ({})", self.unmatched_bank, self.unmatched_bank_amount)?;
        write!(f, "resolved bank:       {}", self.resolved_bank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MatchKind, Scores};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn bank(id: &str, amount: Decimal) -> BankTransaction {
        BankTransaction {
            id: id.into(),
            date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            kind: "FPI".into(),
            description: "JONES A".into(),
            amount,
        }
    }

    fn beacon(id: &str) -> BeaconEntry {
        BeaconEntry {
            id: id.into(),
            date: NaiveDate::from_ymd_opt(2024, 4, 2).unwrap(),
            trans_no: id.into(),
            payee: "A Jones".into(),
            amount: dec!(10.00),
            detail: String::new(),
            matched: false,
        }
    }

    fn suggestion(id: &str, b: &BankTransaction, e: &str, status: MatchStatus) -> MatchSuggestion {
        MatchSuggestion {
            id: id.into(),
            bank_transaction: b.clone(),
            kind: MatchKind::OneToOne(beacon(e)),
            status,
            scores: Scores::default(),
        }
    }

    #[test]
    fn unmatched_bank_counts_transactions_not_suggestions() {
        let banks = vec![bank("BANK_0000", dec!(10.00)), bank("BANK_0001", dec!(25.50)), bank("BANK_0002", dec!(3.00))];
        let beacons = vec![beacon("BEACON_0000"), beacon("BEACON_0001"), beacon("BEACON_0002")];

        let mut state = ReconState::default();
        state.confirmed_matches.push(suggestion("MATCH_0001", &banks[0], "BEACON_0000", MatchStatus::Confirmed));
        state.rejected_bank_ids.insert("BANK_0002".into());
        state.recompute_matched_ids();

        // Two pending suggestions for the same bank transaction.
        let working = vec![
            suggestion("MATCH_0002", &banks[1], "BEACON_0001", MatchStatus::Pending),
            suggestion("MATCH_0003", &banks[1], "BEACON_0002", MatchStatus::Pending),
        ];

        let stats = ReconStats::compute(&banks, &beacons, &state, &working);
        assert_eq!(stats.unmatched_bank, 1);
        assert_eq!(stats.unmatched_bank_amount, dec!(25.50));
        assert_eq!(stats.bucket(MatchStatus::Pending).count, 2);
        assert_eq!(stats.bucket(MatchStatus::Pending).amount, dec!(51.00));
        assert_eq!(stats.bucket(MatchStatus::Confirmed).count, 1);
        assert_eq!(stats.bucket(MatchStatus::Skipped).count, 0);
        assert_eq!(stats.matched_beacon, 1);
        assert_eq!(stats.unmatched_beacon, 2);
        assert_eq!(stats.resolved_bank, 1);
        assert!(stats.to_string().contains("unmatched bank:      1 (25.50)"));
    }

    #[test]
    fn json_shape_uses_status_keys() {
        let stats = ReconStats::compute(&[], &[], &ReconState::default(), &[]);
        let v = serde_json::to_value(&stats).unwrap();
        assert_eq!(v["buckets"]["manually_resolved"]["count"], 0);
        assert_eq!(v["unmatched_bank_amount"], "0");
    }
}
