use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Every section is optional; an empty document yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconConfig {
    pub sources: SourcesConfig,
    pub matching: MatchingConfig,
    pub names: NameConfig,
    pub auto_confirm: AutoConfirmConfig,
    pub repair: RepairConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesConfig {
    pub bank_file: PathBuf,
    pub beacon_file: PathBuf,
    pub state_file: PathBuf,
    pub report_file: PathBuf,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            bank_file: "Bank_Transactions.csv".into(),
            beacon_file: "Beacon_Entries.csv".into(),
            state_file: "reconciliation_state.json".into(),
            report_file: "reconciliation_results.csv".into(),
        }
    }
}

impl SourcesConfig {
    /// Resolve relative paths against `base` (the config file's directory).
    pub fn resolve(&mut self, base: &Path) {
        for path in [
            &mut self.bank_file,
            &mut self.beacon_file,
            &mut self.state_file,
            &mut self.report_file,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Matching + scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// Largest accepted |bank date - Beacon date| in days.
    pub date_tolerance_days: u32,
    /// Amounts that recur often enough to be a weak signal.
    #[serde(deserialize_with = "decimal_strings")]
    pub common_amounts: Vec<Decimal>,
    /// Multiplicative reduction applied to 1-to-2 confidence.
    pub one_to_two_penalty: f64,
    pub weights: WeightSets,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            date_tolerance_days: 7,
            common_amounts: vec![Decimal::new(1300, 2), Decimal::new(950, 2)],
            one_to_two_penalty: 0.10,
            weights: WeightSets::default(),
        }
    }
}

impl MatchingConfig {
    pub fn is_common(&self, amount: Decimal) -> bool {
        self.common_amounts.contains(&amount)
    }

    pub fn weights_for(&self, amount: Decimal) -> &Weights {
        if self.is_common(amount) {
            &self.weights.common
        } else {
            &self.weights.other
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeightSets {
    pub common: Weights,
    pub other: Weights,
}

impl Default for WeightSets {
    fn default() -> Self {
        Self {
            common: Weights { amount: 0.10, date: 0.45, name: 0.45 },
            other: Weights { amount: 0.30, date: 0.35, name: 0.35 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Weights {
    pub amount: f64,
    pub date: f64,
    pub name: f64,
}

impl Weights {
    fn sum(&self) -> f64 {
        self.amount + self.date + self.name
    }
}

fn decimal_strings<'de, D>(d: D) -> Result<Vec<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Vec<String> = Vec::deserialize(d)?;
    raw.iter()
        .map(|s| {
            s.trim()
                .parse::<Decimal>()
                .map_err(|e| serde::de::Error::custom(format!("bad amount '{s}': {e}")))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NameConfig {
    /// Tokens dropped before surname/initial extraction (titles, bank narrative).
    pub ignored_words: Vec<String>,
    /// Largest edit distance at which two surnames still count as equal.
    pub max_edit_distance: usize,
    /// Surnames shorter than this must match exactly.
    pub min_fuzzy_len: usize,
    /// Score for a surname match whose initials differ or are missing.
    pub surname_only_score: f64,
    /// Deducted when the surname matched only within edit distance.
    pub fuzzy_penalty: f64,
}

impl Default for NameConfig {
    fn default() -> Self {
        let words = [
            "MR", "MRS", "MS", "MISS", "MX", "DR", "PROF", "REV", "SIR", "DAME", "PAYMENT", "PAYMENTS",
            "TRANSFER", "DEPOSIT", "CREDIT", "DEBIT", "REF", "REFERENCE", "FROM", "TO", "FOR", "AND", "THE",
            "FPI", "FPO", "BGC", "BACS", "CHQ", "CHEQUE", "DD", "SO", "STO", "TFR", "ONLINE", "BANKING",
            "SUBS", "SUBSCRIPTION", "MEMBERSHIP", "FEE", "FEES",
        ];
        Self {
            ignored_words: words.iter().map(|w| w.to_string()).collect(),
            max_edit_distance: 1,
            min_fuzzy_len: 4,
            surname_only_score: 0.5,
            fuzzy_penalty: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// Auto-confirm + repair
// ---------------------------------------------------------------------------

/// Opt-in promotion of high-confidence suggestions straight to `confirmed`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoConfirmConfig {
    pub enabled: bool,
    pub common_threshold: f64,
    pub other_threshold: f64,
}

impl Default for AutoConfirmConfig {
    fn default() -> Self {
        Self { enabled: false, common_threshold: 0.95, other_threshold: 0.90 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepairConfig {
    pub conflict_policy: ConflictPolicy,
}

/// Which of two confirmed-class matches sharing a Beacon entry survives repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Higher confidence wins; equal confidence falls back to the most recent.
    #[default]
    HigherConfidence,
    /// The match confirmed last (later in `confirmed_matches`) wins.
    MostRecent,
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HigherConfidence => write!(f, "higher_confidence"),
            Self::MostRecent => write!(f, "most_recent"),
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "higher_confidence" => Ok(Self::HigherConfidence),
            "most_recent" => Ok(Self::MostRecent),
            other => Err(format!(
                "unknown conflict policy \"{other}\" (expected higher_confidence or most_recent)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let m = &self.matching;

        for (label, w) in [("common", &m.weights.common), ("other", &m.weights.other)] {
            if [w.amount, w.date, w.name].iter().any(|x| !(0.0..=1.0).contains(x)) {
                return Err(ReconError::ConfigValidation(format!(
                    "matching.weights.{label}: each weight must be within [0, 1]"
                )));
            }
            if (w.sum() - 1.0).abs() > 1e-6 {
                return Err(ReconError::ConfigValidation(format!(
                    "matching.weights.{label} must sum to 1, got {}",
                    w.sum()
                )));
            }
        }

        if !(0.0..1.0).contains(&m.one_to_two_penalty) {
            return Err(ReconError::ConfigValidation(format!(
                "matching.one_to_two_penalty must be within [0, 1), got {}",
                m.one_to_two_penalty
            )));
        }

        if m.common_amounts.iter().any(|a| a.is_sign_negative() || a.is_zero()) {
            return Err(ReconError::ConfigValidation(
                "matching.common_amounts must be positive".into(),
            ));
        }

        let n = &self.names;
        if !(0.0..=1.0).contains(&n.surname_only_score) || !(0.0..=1.0).contains(&n.fuzzy_penalty) {
            return Err(ReconError::ConfigValidation(
                "names.surname_only_score and names.fuzzy_penalty must be within [0, 1]".into(),
            ));
        }

        let a = &self.auto_confirm;
        for (label, t) in [("common_threshold", a.common_threshold), ("other_threshold", a.other_threshold)] {
            if !(0.0..=1.0).contains(&t) {
                return Err(ReconError::ConfigValidation(format!(
                    "auto_confirm.{label} must be within [0, 1], got {t}"
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
