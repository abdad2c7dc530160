//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! # Exit Codes
//!
//! | Code | Domain      | Description                                    |
//! |------|-------------|------------------------------------------------|
//! | 0    | Universal   | Success                                        |
//! | 1    | Universal   | General error (unspecified)                    |
//! | 2    | Universal   | CLI usage error (bad args, bad config)         |
//! | 3    | ingest      | Malformed bank or Beacon CSV record            |
//! | 4    | ledger      | Ledger file unparseable or structurally bad    |
//! | 5    | ledger      | Ledger locked, or a file could not be read/written |
//! | 6    | decide      | A decision conflicted with an existing match   |
//! | 7    | validate    | Consistency findings present                   |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant with the next free number
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `CliError` in main.rs

use beacon_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable decision file, invalid recon.toml.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Ingestion (3)
// =============================================================================

/// A bank or Beacon CSV row has a missing column, a bad date or a bad amount.
/// Nothing was loaded and the ledger was not touched.
pub const EXIT_INGEST: u8 = 3;

// =============================================================================
// Ledger (4-5)
// =============================================================================

/// The ledger file could not be parsed. It was left exactly as found.
pub const EXIT_STATE_FORMAT: u8 = 4;

/// The ledger is locked by another process, or an IO operation failed.
pub const EXIT_STORE: u8 = 5;

// =============================================================================
// Decisions (6)
// =============================================================================

/// At least one decision hit an exclusivity conflict. Every other decision
/// in the batch was still applied and saved.
pub const EXIT_CONFLICT: u8 = 6;

// =============================================================================
// Validation (7)
// =============================================================================

/// `validate` found consistency problems. Run `repair` to fix them.
pub const EXIT_FINDINGS: u8 = 7;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_USAGE,
        ReconError::Validation { .. } => EXIT_INGEST,
        ReconError::StateFormat(_) => EXIT_STATE_FORMAT,
        ReconError::StoreLocked(_) | ReconError::Io(_) => EXIT_STORE,
        ReconError::Conflict { .. } | ReconError::BankAlreadyMatched { .. } => EXIT_CONFLICT,
        ReconError::UnknownMatch(_)
        | ReconError::StaleDecision { .. }
        | ReconError::UnknownBank(_)
        | ReconError::UnknownTransNo(_)
        | ReconError::MissingComment { .. }
        | ReconError::InvalidTransition { .. } => EXIT_ERROR,
    }
}
