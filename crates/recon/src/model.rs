use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::serde_fmt::{bank_date, beacon_date};

// ---------------------------------------------------------------------------
// Input records
// ---------------------------------------------------------------------------

/// A bank statement line. Immutable after ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransaction {
    pub id: String,
    #[serde(with = "bank_date")]
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// An accounting-system (Beacon) ledger line.
///
/// `matched` is a cache of ledger state: true iff the entry is referenced by
/// some confirmed-class match. Only the engine writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconEntry {
    pub id: String,
    #[serde(with = "beacon_date")]
    pub date: NaiveDate,
    pub trans_no: String,
    pub payee: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub matched: bool,
}

// ---------------------------------------------------------------------------
// Status + type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Confirmed,
    Rejected,
    Skipped,
    ManualMatch,
    ManuallyResolved,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Rejected,
        Self::Skipped,
        Self::ManualMatch,
        Self::ManuallyResolved,
    ];

    /// Statuses that consume Beacon entries and live in `confirmed_matches`.
    pub fn is_confirmed_class(self) -> bool {
        matches!(self, Self::Confirmed | Self::ManualMatch | Self::ManuallyResolved)
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Rejected => write!(f, "rejected"),
            Self::Skipped => write!(f, "skipped"),
            Self::ManualMatch => write!(f, "manual_match"),
            Self::ManuallyResolved => write!(f, "manually_resolved"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    #[serde(rename = "1-to-1")]
    OneToOne,
    #[serde(rename = "1-to-2")]
    OneToTwo,
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "resolved")]
    Resolved,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneToOne => write!(f, "1-to-1"),
            Self::OneToTwo => write!(f, "1-to-2"),
            Self::Manual => write!(f, "manual"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

// ---------------------------------------------------------------------------
// Match suggestion
// ---------------------------------------------------------------------------

/// Which Beacon entries back a match, tagged by how the match came about.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchKind {
    OneToOne(BeaconEntry),
    OneToTwo([BeaconEntry; 2]),
    Manual { entries: Vec<BeaconEntry>, comment: String },
    Resolved { comment: String },
}

impl MatchKind {
    pub fn match_type(&self) -> MatchType {
        match self {
            Self::OneToOne(_) => MatchType::OneToOne,
            Self::OneToTwo(_) => MatchType::OneToTwo,
            Self::Manual { .. } => MatchType::Manual,
            Self::Resolved { .. } => MatchType::Resolved,
        }
    }
}

/// Amount/date/name sub-scores plus the weighted confidence, all in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Scores {
    pub amount: f64,
    pub date: f64,
    pub name: f64,
    pub confidence: f64,
}

/// A proposed (or decided) pairing of one bank transaction with zero, one,
/// or two Beacon entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MatchRecord", try_from = "MatchRecord")]
pub struct MatchSuggestion {
    pub id: String,
    pub bank_transaction: BankTransaction,
    pub kind: MatchKind,
    pub status: MatchStatus,
    pub scores: Scores,
}

impl MatchSuggestion {
    pub fn match_type(&self) -> MatchType {
        self.kind.match_type()
    }

    pub fn confidence(&self) -> f64 {
        self.scores.confidence
    }

    pub fn bank_id(&self) -> &str {
        &self.bank_transaction.id
    }

    pub fn beacon_entries(&self) -> &[BeaconEntry] {
        match &self.kind {
            MatchKind::OneToOne(e) => std::slice::from_ref(e),
            MatchKind::OneToTwo(pair) => pair,
            MatchKind::Manual { entries, .. } => entries,
            MatchKind::Resolved { .. } => &[],
        }
    }

    pub fn beacon_entries_mut(&mut self) -> &mut [BeaconEntry] {
        match &mut self.kind {
            MatchKind::OneToOne(e) => std::slice::from_mut(e),
            MatchKind::OneToTwo(pair) => pair,
            MatchKind::Manual { entries, .. } => entries,
            MatchKind::Resolved { .. } => &mut [],
        }
    }

    pub fn beacon_ids(&self) -> impl Iterator<Item = &str> {
        self.beacon_entries().iter().map(|e| e.id.as_str())
    }

    pub fn comment(&self) -> &str {
        match &self.kind {
            MatchKind::Manual { comment, .. } | MatchKind::Resolved { comment } => comment,
            _ => "",
        }
    }

    /// Numeric suffix of the id, if it follows the `MATCH_NNNN` scheme.
    pub fn number(&self) -> Option<u32> {
        match_number(&self.id)
    }

    /// Same bank transaction and same set of Beacon entries.
    pub fn same_pairing(&self, other: &MatchSuggestion) -> bool {
        if self.bank_id() != other.bank_id() {
            return false;
        }
        let mut a: Vec<&str> = self.beacon_ids().collect();
        let mut b: Vec<&str> = other.beacon_ids().collect();
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }

    /// Set the cached `matched` flag on every referenced entry.
    pub fn flag_entries(&mut self, matched: bool) {
        for entry in self.beacon_entries_mut() {
            entry.matched = matched;
        }
    }
}

pub const MATCH_ID_PREFIX: &str = "MATCH_";

pub fn format_match_id(n: u32) -> String {
    format!("{MATCH_ID_PREFIX}{n:04}")
}

pub fn match_number(id: &str) -> Option<u32> {
    id.strip_prefix(MATCH_ID_PREFIX)?.parse().ok()
}

// ---------------------------------------------------------------------------
// Wire record
// ---------------------------------------------------------------------------

/// Flat ledger shape of a match: the tagged kind is spread over
/// `match_type`, `beacon_entries` and `comment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub bank_transaction: BankTransaction,
    pub beacon_entries: Vec<BeaconEntry>,
    pub confidence_score: f64,
    pub match_type: MatchType,
    pub status: MatchStatus,
    #[serde(default)]
    pub amount_score: f64,
    #[serde(default)]
    pub date_score: f64,
    #[serde(default)]
    pub name_score: f64,
    #[serde(default)]
    pub comment: String,
}

impl From<MatchSuggestion> for MatchRecord {
    fn from(m: MatchSuggestion) -> Self {
        let match_type = m.match_type();
        let (beacon_entries, comment) = match m.kind {
            MatchKind::OneToOne(e) => (vec![e], String::new()),
            MatchKind::OneToTwo([a, b]) => (vec![a, b], String::new()),
            MatchKind::Manual { entries, comment } => (entries, comment),
            MatchKind::Resolved { comment } => (Vec::new(), comment),
        };
        MatchRecord {
            id: m.id,
            bank_transaction: m.bank_transaction,
            beacon_entries,
            confidence_score: m.scores.confidence,
            match_type,
            status: m.status,
            amount_score: m.scores.amount,
            date_score: m.scores.date,
            name_score: m.scores.name,
            comment,
        }
    }
}

impl TryFrom<MatchRecord> for MatchSuggestion {
    type Error = String;

    fn try_from(r: MatchRecord) -> Result<Self, Self::Error> {
        let count = r.beacon_entries.len();
        let mismatch = || format!("{}: match_type {} with {count} Beacon entries", r.id, r.match_type);
        let kind = match r.match_type {
            MatchType::OneToOne => {
                let entry = match <[BeaconEntry; 1]>::try_from(r.beacon_entries.clone()) {
                    Ok([e]) => e,
                    Err(_) => return Err(mismatch()),
                };
                MatchKind::OneToOne(entry)
            }
            MatchType::OneToTwo => {
                let pair = <[BeaconEntry; 2]>::try_from(r.beacon_entries.clone())
                    .map_err(|_| mismatch())?;
                MatchKind::OneToTwo(pair)
            }
            MatchType::Manual => {
                if count == 0 {
                    return Err(mismatch());
                }
                MatchKind::Manual { entries: r.beacon_entries.clone(), comment: r.comment.clone() }
            }
            MatchType::Resolved => {
                if count != 0 {
                    return Err(mismatch());
                }
                MatchKind::Resolved { comment: r.comment.clone() }
            }
        };
        Ok(MatchSuggestion {
            id: r.id,
            bank_transaction: r.bank_transaction,
            kind,
            status: r.status,
            scores: Scores {
                amount: r.amount_score,
                date: r.date_score,
                name: r.name_score,
                confidence: r.confidence_score,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
