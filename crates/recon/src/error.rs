use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (weights that do not sum to 1, bad thresholds, etc.).
    ConfigValidation(String),
    /// Malformed input record at the ingestion boundary.
    Validation { record: String, message: String },
    /// A Beacon entry is already held by a different confirmed-class match.
    Conflict { match_id: String, beacon_id: String, held_by: String },
    /// The bank transaction is already covered by a different confirmed-class match.
    BankAlreadyMatched { bank_id: String, held_by: String },
    /// No suggestion or ledger record carries this match id.
    UnknownMatch(String),
    /// The match id now names a different pairing than the decision was made against.
    StaleDecision { match_id: String, expected: String, found: String },
    /// No ingested bank transaction carries this id.
    UnknownBank(String),
    /// No ingested Beacon entry carries this ledger transaction number.
    UnknownTransNo(String),
    /// `manually_resolved` requires a non-empty comment.
    MissingComment { bank_id: String },
    /// The requested status change is not a valid decision.
    InvalidTransition { match_id: String, from: String, to: String },
    /// Persisted ledger is unparseable or structurally invalid.
    StateFormat(String),
    /// Another process holds the ledger lock.
    StoreLocked(PathBuf),
    /// IO error (file read, rename, etc.).
    Io(String),
}

impl ReconError {
    /// True for the recoverable exclusivity family: the ledger is unchanged
    /// and the caller must pick another target or reject the candidate.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::BankAlreadyMatched { .. })
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Validation { record, message } => {
                write!(f, "invalid record {record}: {message}")
            }
            Self::Conflict { match_id, beacon_id, held_by } => write!(
                f,
                "conflict: {match_id} references {beacon_id}, already matched by {held_by}"
            ),
            Self::BankAlreadyMatched { bank_id, held_by } => {
                write!(f, "conflict: {bank_id} is already matched by {held_by}")
            }
            Self::UnknownMatch(id) => write!(f, "unknown match: {id}"),
            Self::StaleDecision { match_id, expected, found } => {
                write!(f, "stale decision: {match_id} now pairs {found}, not {expected}")
            }
            Self::UnknownBank(id) => write!(f, "unknown bank transaction: {id}"),
            Self::UnknownTransNo(no) => write!(f, "unknown Beacon trans_no: {no}"),
            Self::MissingComment { bank_id } => {
                write!(f, "{bank_id}: manually_resolved requires a comment")
            }
            Self::InvalidTransition { match_id, from, to } => {
                write!(f, "{match_id}: cannot move from {from} to {to}")
            }
            Self::StateFormat(msg) => write!(f, "state format error: {msg}"),
            Self::StoreLocked(path) => {
                write!(f, "ledger is locked by another process: {}", path.display())
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

impl From<std::io::Error> for ReconError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
