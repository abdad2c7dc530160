// beacon-recon - bank statement to Beacon ledger reconciliation (CLI mode)

mod exit_codes;
mod ingest;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use beacon_recon::config::ConflictPolicy;
use beacon_recon::ReconError;
use clap::{Parser, Subcommand};

use exit_codes::{recon_exit_code, EXIT_STORE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "beacon-recon")]
#[command(about = "Match bank statement lines to Beacon ledger entries and keep a reviewed ledger")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./recon.toml when present)
    #[arg(long, short = 'c', global = true, env = "BEACON_RECON_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest both sources, regenerate and print pending suggestions
    #[command(after_help = "\
Examples:
  beacon-recon suggest
  beacon-recon suggest --all --tolerance 3
  beacon-recon -c books/recon.toml suggest --json")]
    Suggest {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Override matching.date_tolerance_days for this run
        #[arg(long, value_name = "DAYS")]
        tolerance: Option<u32>,

        /// Also list the alternate candidates for each bank transaction
        #[arg(long)]
        all: bool,
    },

    /// Apply a JSON-lines file of review decisions, in order, and save once
    #[command(after_help = "\
Decision lines:
  {\"action\":\"confirm\",\"match_id\":\"MATCH_0012\",\"bank_id\":\"BANK_0040\"}
  {\"action\":\"reject\",\"match_id\":\"MATCH_0013\",\"bank_id\":\"BANK_0041\",\"beacon_ids\":[\"BEACON_0107\"]}
  {\"action\":\"skip\",\"match_id\":\"MATCH_0014\",\"bank_id\":\"BANK_0044\"}
  {\"action\":\"revert\",\"match_id\":\"MATCH_0009\",\"bank_id\":\"BANK_0012\"}
  {\"action\":\"manual\",\"bank_id\":\"BANK_0042\",\"trans_nos\":[\"5120\",\"5121\"],\"comment\":\"split\"}
  {\"action\":\"resolve\",\"bank_id\":\"BANK_0043\",\"comment\":\"bank charge\"}

Exit codes:
  0  all decisions applied (or already applied)
  1  some decisions failed (unknown or stale id, invalid transition)
  6  some decisions conflicted with an existing match")]
    Decide {
        /// Decision file (one JSON object per line)
        decisions: PathBuf,

        /// Override matching.date_tolerance_days for this run
        #[arg(long, value_name = "DAYS")]
        tolerance: Option<u32>,
    },

    /// Review progress: counts and amounts per status
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find matches whose bank description or Beacon payee contains TERM
    Search {
        /// Case-insensitive search term
        term: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the ledger for consistency problems (read-only)
    #[command(after_help = "\
Exit codes:
  0  ledger is consistent
  4  ledger file cannot be parsed
  7  findings present (run `beacon-recon repair`)")]
    Validate {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Ledger file (overrides sources.state_file)
        #[arg(long, value_name = "FILE")]
        state: Option<PathBuf>,
    },

    /// Repair the ledger deterministically, keeping a .bak copy
    Repair {
        /// Ledger file (overrides sources.state_file)
        #[arg(long, value_name = "FILE")]
        state: Option<PathBuf>,

        /// Which match keeps a shared Beacon entry: higher_confidence or most_recent
        #[arg(long)]
        policy: Option<ConflictPolicy>,
    },

    /// Write the reconciliation report as CSV (one row per match)
    Export {
        /// Output file, or - for stdout (overrides sources.report_file)
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = recon::load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Suggest { json, tolerance, all } => recon::cmd_suggest(config, json, tolerance, all),
        Commands::Decide { decisions, tolerance } => recon::cmd_decide(config, decisions, tolerance),
        Commands::Stats { json } => recon::cmd_stats(config, json),
        Commands::Search { term, json } => recon::cmd_search(config, term, json),
        Commands::Validate { json, state } => recon::cmd_validate(config, state, json),
        Commands::Repair { state, policy } => recon::cmd_repair(config, state, policy),
        Commands::Export { output } => recon::cmd_export(config, output),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_STORE, message: msg.into(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
                Some("check recon.toml; every section is optional".to_string())
            }
            ReconError::Validation { .. } => {
                Some("fix the source CSV and re-run; nothing was loaded".to_string())
            }
            ReconError::StateFormat(_) => Some(
                "the ledger was left untouched; restore the .bak copy or fix the file by hand".to_string(),
            ),
            ReconError::StoreLocked(path) => Some(format!(
                "another beacon-recon is running; if it crashed, delete {}",
                path.display()
            )),
            ReconError::Conflict { .. } => {
                Some("reject the candidate or pick a different Beacon entry".to_string())
            }
            ReconError::BankAlreadyMatched { .. } => {
                Some("revert the existing match first".to_string())
            }
            ReconError::StaleDecision { .. } => {
                Some("match ids change between runs; re-run `beacon-recon suggest`".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}
