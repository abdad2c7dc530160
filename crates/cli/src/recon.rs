//! Command implementations: ingest both sources, load the ledger, run the
//! engine, persist.
//!
//! Commands that can change the ledger hold the store lock for the whole
//! load-mutate-save cycle. Read-only commands never take the lock and run
//! with auto-confirm switched off so their view matches what is on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use beacon_recon::config::ConflictPolicy;
use beacon_recon::consistency::render_findings;
use beacon_recon::export::write_report;
use beacon_recon::{
    repair, validate, Decision, MatchSuggestion, ReconConfig, ReconEngine, ReconError, StateStore,
};
use serde_json::json;

use crate::exit_codes::{EXIT_CONFLICT, EXIT_ERROR, EXIT_FINDINGS};
use crate::ingest;
use crate::CliError;

const DEFAULT_CONFIG: &str = "recon.toml";

// ============================================================================
// Setup
// ============================================================================

/// Load `recon.toml` (explicit path, else `./recon.toml` when present, else
/// defaults). Relative source paths resolve against the config's directory.
pub fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None if Path::new(DEFAULT_CONFIG).exists() => PathBuf::from(DEFAULT_CONFIG),
        None => {
            log::debug!("no {DEFAULT_CONFIG} in working directory, using defaults");
            return Ok(ReconConfig::default());
        }
    };

    let text = fs::read_to_string(&path)
        .map_err(|e| CliError::args(format!("cannot read config {}: {e}", path.display())))?;
    let mut config = ReconConfig::from_toml(&text)?;
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    config.sources.resolve(base);
    log::debug!("loaded config {}", path.display());
    Ok(config)
}

fn with_tolerance(mut config: ReconConfig, tolerance: Option<u32>) -> ReconConfig {
    if let Some(days) = tolerance {
        log::debug!("date tolerance overridden to {days} day(s)");
        config.matching.date_tolerance_days = days;
    }
    config
}

fn read_only(mut config: ReconConfig) -> ReconConfig {
    config.auto_confirm.enabled = false;
    config
}

fn open_engine(config: ReconConfig, store: &StateStore) -> Result<ReconEngine, CliError> {
    let bank = ingest::load_bank(&config.sources.bank_file)?;
    let beacon = ingest::load_beacon(&config.sources.beacon_file)?;
    let state = store.load()?;
    Ok(ReconEngine::new(config, bank, beacon, state))
}

/// Regenerate; returns how many suggestions auto-confirm promoted.
fn regenerate(engine: &mut ReconEngine) -> usize {
    let before = engine.state().confirmed_matches.len();
    engine.generate();
    engine.state().confirmed_matches.len().saturating_sub(before)
}

fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
    println!("{text}");
    Ok(())
}

fn print_match(m: &MatchSuggestion, prefix: &str) {
    let bank = &m.bank_transaction;
    println!(
        "{prefix}{:<10}  {}  {}  {:>10}  {:<7}  {:<17}  {:.2}  {}",
        m.id,
        bank.id,
        bank.date.format(beacon_recon::serde_fmt::BANK_DATE_FORMAT),
        bank.amount,
        m.match_type().to_string(),
        m.status.to_string(),
        m.confidence(),
        bank.description,
    );
    for e in m.beacon_entries() {
        println!(
            "{prefix}            -> {}  #{}  {}  {:>10}  {}",
            e.id,
            e.trans_no,
            e.date.format(beacon_recon::serde_fmt::BEACON_DATE_FORMAT),
            e.amount,
            e.payee,
        );
    }
    if !m.comment().is_empty() {
        println!("{prefix}            comment: {}", m.comment());
    }
}

// ============================================================================
// suggest
// ============================================================================

pub fn cmd_suggest(
    config: ReconConfig,
    json_output: bool,
    tolerance: Option<u32>,
    all: bool,
) -> Result<(), CliError> {
    let config = with_tolerance(config, tolerance);
    let store = StateStore::new(config.sources.state_file.clone());
    let _lock = store.lock()?;
    let mut engine = open_engine(config, &store)?;

    let promoted = regenerate(&mut engine);
    if promoted > 0 {
        store.save(engine.state())?;
        eprintln!("auto-confirmed {promoted} suggestion(s)");
    }

    let suggestions = engine.suggestions();
    if json_output {
        if all {
            let alternates: BTreeMap<&str, &[MatchSuggestion]> = suggestions
                .iter()
                .map(|m| (m.bank_id(), engine.alternates(m.bank_id())))
                .filter(|(_, alts)| !alts.is_empty())
                .collect();
            print_json(&json!({ "suggestions": suggestions, "alternates": alternates }))?;
        } else {
            print_json(&json!(suggestions))?;
        }
    } else {
        for m in suggestions {
            print_match(m, "");
            if all {
                for alt in engine.alternates(m.bank_id()) {
                    print_match(alt, "    alt ");
                }
            }
        }
    }

    eprintln!("{} pending suggestion(s)", suggestions.len());
    Ok(())
}

// ============================================================================
// decide
// ============================================================================

/// Parse a JSON-lines decision file. Blank lines and `#` comments are skipped.
/// Returns each decision with its 1-based line number.
pub fn parse_decisions(text: &str, source: &Path) -> Result<Vec<(usize, Decision)>, CliError> {
    let mut decisions = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let decision: Decision = serde_json::from_str(line).map_err(|e| {
            CliError::args(format!("{}:{}: invalid decision: {e}", source.display(), idx + 1))
                .with_hint("each line is one JSON object with an \"action\" field")
        })?;
        decisions.push((idx + 1, decision));
    }
    Ok(decisions)
}

pub fn cmd_decide(config: ReconConfig, path: PathBuf, tolerance: Option<u32>) -> Result<(), CliError> {
    let text = fs::read_to_string(&path)
        .map_err(|e| CliError::args(format!("cannot read {}: {e}", path.display())))?;
    let decisions = parse_decisions(&text, &path)?;

    let config = with_tolerance(config, tolerance);
    let store = StateStore::new(config.sources.state_file.clone());
    let _lock = store.lock()?;
    let mut engine = open_engine(config, &store)?;
    let promoted = regenerate(&mut engine);

    let results = engine.apply_batch(decisions.iter().map(|(_, d)| d));

    let mut changed = promoted > 0;
    let mut conflicts = 0;
    let mut failures = 0;
    for ((line, _), result) in decisions.iter().zip(&results) {
        match result {
            Ok(o) if o.changed() => {
                changed = true;
                let from = o.from.map(|s| s.to_string()).unwrap_or_else(|| "new".into());
                println!("ok         {}  {}  {from} -> {}", o.match_id, o.bank_id, o.status);
            }
            Ok(o) => println!("unchanged  {}  {}  {}", o.match_id, o.bank_id, o.status),
            Err(e) => {
                if e.is_conflict() {
                    conflicts += 1;
                } else {
                    failures += 1;
                }
                println!("failed     line {line}: {e}");
            }
        }
    }

    if changed {
        store.save(engine.state())?;
    }

    eprintln!(
        "{} decision(s): {} failed, {} conflicted",
        decisions.len(),
        failures,
        conflicts
    );

    if conflicts > 0 {
        return Err(CliError {
            code: EXIT_CONFLICT,
            message: format!("{conflicts} decision(s) conflicted with existing matches"),
            hint: Some("reject the candidate or pick a different Beacon entry; the rest were saved".into()),
        });
    }
    if failures > 0 {
        return Err(CliError {
            code: EXIT_ERROR,
            message: format!("{failures} decision(s) failed"),
            hint: None,
        });
    }
    Ok(())
}

// ============================================================================
// stats / search
// ============================================================================

pub fn cmd_stats(config: ReconConfig, json_output: bool) -> Result<(), CliError> {
    let store = StateStore::new(config.sources.state_file.clone());
    let mut engine = open_engine(read_only(config), &store)?;
    engine.generate();
    let stats = engine.stats();

    if json_output {
        print_json(&json!(stats))?;
    } else {
        println!("{stats}");
    }
    Ok(())
}

pub fn cmd_search(config: ReconConfig, term: String, json_output: bool) -> Result<(), CliError> {
    let store = StateStore::new(config.sources.state_file.clone());
    let mut engine = open_engine(read_only(config), &store)?;
    engine.generate();
    let hits = engine.search(&term);

    if json_output {
        print_json(&json!(hits))?;
    } else {
        for m in &hits {
            print_match(m, "");
        }
    }
    eprintln!("{} match(es) for '{term}'", hits.len());
    Ok(())
}

// ============================================================================
// validate / repair
// ============================================================================

pub fn cmd_validate(config: ReconConfig, state_file: Option<PathBuf>, json_output: bool) -> Result<(), CliError> {
    let store = StateStore::new(state_file.unwrap_or(config.sources.state_file));
    let state = store.load()?;
    let findings = validate(&state);

    if json_output {
        print_json(&json!({
            "ledger": store.path().display().to_string(),
            "consistent": findings.is_empty(),
            "findings": findings,
        }))?;
    } else {
        print!("{}", render_findings(&findings));
    }

    if findings.is_empty() {
        Ok(())
    } else {
        Err(CliError {
            code: EXIT_FINDINGS,
            message: String::new(),
            hint: Some("run `beacon-recon repair` to fix (a .bak copy is kept)".into()),
        })
    }
}

pub fn cmd_repair(
    config: ReconConfig,
    state_file: Option<PathBuf>,
    policy: Option<ConflictPolicy>,
) -> Result<(), CliError> {
    let policy = policy.unwrap_or(config.repair.conflict_policy);
    let store = StateStore::new(state_file.unwrap_or(config.sources.state_file));
    let _lock = store.lock()?;
    let mut state = store.load()?;

    let report = repair(&mut state, policy);
    if !report.is_empty() {
        if let Some(backup) = store.backup()? {
            eprintln!("backup written to {}", backup.display());
        }
        store.save(&state)?;
    }
    print!("{report}");
    Ok(())
}

// ============================================================================
// export
// ============================================================================

pub fn cmd_export(config: ReconConfig, output: Option<PathBuf>) -> Result<(), CliError> {
    let output = output.unwrap_or_else(|| config.sources.report_file.clone());
    let store = StateStore::new(config.sources.state_file.clone());
    let mut engine = open_engine(read_only(config), &store)?;
    engine.generate();

    if output.as_os_str() == "-" {
        let stdout = io::stdout();
        write_report(engine.all_matches(), stdout.lock())?;
        return Ok(());
    }

    let file = fs::File::create(&output).map_err(|e| ReconError::Io(format!("cannot create {}: {e}", output.display())))?;
    let mut writer = BufWriter::new(file);
    let rows = write_report(engine.all_matches(), &mut writer)?;
    writer.flush()?;
    eprintln!("wrote {rows} row(s) to {}", output.display());
    Ok(())
}
