//! `beacon-recon`: bank statement to Beacon ledger reconciliation engine.
//!
//! Pure engine crate: receives pre-validated bank and Beacon records,
//! proposes scored candidate matches, and maintains the persisted decision
//! ledger. CSV ingestion and argument parsing live in the CLI crate.

pub mod config;
pub mod consistency;
pub mod engine;
pub mod error;
pub mod export;
pub mod matcher;
pub mod model;
pub mod name;
pub mod scoring;
pub mod serde_fmt;
pub mod state;
pub mod stats;

pub use config::ReconConfig;
pub use consistency::{repair, validate, Finding, RepairReport};
pub use engine::{Decision, DecisionOutcome, MatchRef, ReconEngine};
pub use error::ReconError;
pub use model::{BankTransaction, BeaconEntry, MatchKind, MatchStatus, MatchSuggestion, MatchType, Scores};
pub use state::{ReconState, StateStore};
pub use stats::ReconStats;
