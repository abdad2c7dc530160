//! Amount / date / name sub-scores and the weighted confidence model.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::config::{MatchingConfig, ReconConfig};
use crate::model::{BankTransaction, BeaconEntry, Scores};
use crate::name::NameScorer;

/// Amount score when every component amount is in the common set.
pub const COMMON_AMOUNT_SCORE: f64 = 0.3;
/// Amount score when some, but not all, component amounts are common.
pub const MIXED_AMOUNT_SCORE: f64 = 0.6;
pub const DISTINCT_AMOUNT_SCORE: f64 = 1.0;

/// Why a pairing is not a valid candidate at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    /// Beacon amount(s) do not sum exactly to the bank amount.
    AmountMismatch,
    /// Day gap is larger than the configured tolerance.
    OutsideTolerance { gap_days: i64 },
    /// The two halves of a 1-to-2 pairing carry different dates.
    SplitDates,
}

#[derive(Debug, Clone)]
pub struct Scorer {
    matching: MatchingConfig,
    names: NameScorer,
}

impl Scorer {
    pub fn new(config: &ReconConfig) -> Self {
        Self {
            matching: config.matching.clone(),
            names: NameScorer::new(&config.names),
        }
    }

    pub fn matching(&self) -> &MatchingConfig {
        &self.matching
    }

    /// 0.3 if all component amounts are common, 0.6 if some are, 1.0 otherwise.
    pub fn amount_score(&self, components: &[Decimal]) -> f64 {
        let common = components.iter().filter(|a| self.matching.is_common(**a)).count();
        if components.is_empty() || common == 0 {
            DISTINCT_AMOUNT_SCORE
        } else if common == components.len() {
            COMMON_AMOUNT_SCORE
        } else {
            MIXED_AMOUNT_SCORE
        }
    }

    /// Linear decay from 1.0 on the same day; ineligible beyond the tolerance.
    pub fn date_score(&self, bank_date: NaiveDate, beacon_date: NaiveDate) -> Result<f64, Ineligible> {
        let gap_days = (bank_date - beacon_date).num_days().abs();
        let tolerance = i64::from(self.matching.date_tolerance_days);
        if gap_days > tolerance {
            return Err(Ineligible::OutsideTolerance { gap_days });
        }
        Ok((1.0 - gap_days as f64 / (tolerance + 1) as f64).max(0.0))
    }

    pub fn name_score(&self, description: &str, payee: &str) -> f64 {
        self.names.score(description, payee)
    }

    /// Weighted sum, weights picked by whether the bank amount is common.
    pub fn confidence(&self, bank_amount: Decimal, amount: f64, date: f64, name: f64) -> f64 {
        let w = self.matching.weights_for(bank_amount);
        (w.amount * amount + w.date * date + w.name * name).clamp(0.0, 1.0)
    }

    pub fn score_one_to_one(&self, bank: &BankTransaction, entry: &BeaconEntry) -> Result<Scores, Ineligible> {
        if entry.amount != bank.amount {
            return Err(Ineligible::AmountMismatch);
        }
        let date = self.date_score(bank.date, entry.date)?;
        let name = self.name_score(&bank.description, &entry.payee);
        let amount = self.amount_score(&[bank.amount]);
        Ok(Scores {
            amount,
            date,
            name,
            confidence: self.confidence(bank.amount, amount, date, name),
        })
    }

    /// Both entries must share one date; confidence carries the 1-to-2 penalty.
    pub fn score_one_to_two(
        &self,
        bank: &BankTransaction,
        first: &BeaconEntry,
        second: &BeaconEntry,
    ) -> Result<Scores, Ineligible> {
        if first.amount + second.amount != bank.amount {
            return Err(Ineligible::AmountMismatch);
        }
        if first.date != second.date {
            return Err(Ineligible::SplitDates);
        }
        let date = self.date_score(bank.date, first.date)?;
        let name = (self.name_score(&bank.description, &first.payee)
            + self.name_score(&bank.description, &second.payee))
            / 2.0;
        let amount = self.amount_score(&[first.amount, second.amount]);
        let base = self.confidence(bank.amount, amount, date, name);
        Ok(Scores {
            amount,
            date,
            name,
            confidence: base * (1.0 - self.matching.one_to_two_penalty),
        })
    }

    /// Informational scores for a user-chosen pairing. Never excludes:
    /// dates past the tolerance simply score 0.
    pub fn score_manual(&self, bank: &BankTransaction, entries: &[BeaconEntry]) -> Scores {
        if entries.is_empty() {
            return Scores::default();
        }
        let n = entries.len() as f64;
        let amounts: Vec<Decimal> = entries.iter().map(|e| e.amount).collect();
        let amount = self.amount_score(&amounts);
        let date = entries
            .iter()
            .map(|e| self.date_score(bank.date, e.date).unwrap_or(0.0))
            .sum::<f64>()
            / n;
        let name = entries
            .iter()
            .map(|e| self.name_score(&bank.description, &e.payee))
            .sum::<f64>()
            / n;
        Scores {
            amount,
            date,
            name,
            confidence: self.confidence(bank.amount, amount, date, name),
        }
    }
}
