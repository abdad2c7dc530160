//! Persisted decision ledger and its on-disk store.

use std::collections::{BTreeSet, HashSet};
use std::ffi::OsString;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ReconError;
use crate::matcher::max_number;
use crate::model::MatchSuggestion;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// The durable outcome of every review decision.
///
/// `confirmed_matches` is the source of truth; `matched_beacon_ids` and the
/// per-entry `matched` flags are caches derived from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconState {
    pub matched_beacon_ids: BTreeSet<String>,
    pub confirmed_matches: Vec<MatchSuggestion>,
    #[serde(default)]
    pub rejected_bank_ids: BTreeSet<String>,
    #[serde(default)]
    pub rejected_matches: Vec<MatchSuggestion>,
}

impl ReconState {
    pub fn from_json(input: &str) -> Result<Self, ReconError> {
        serde_json::from_str(input).map_err(|e| ReconError::StateFormat(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ReconError> {
        serde_json::to_string_pretty(self).map_err(|e| ReconError::StateFormat(e.to_string()))
    }

    /// Highest `MATCH_NNNN` suffix across confirmed and rejected lists.
    pub fn max_match_number(&self) -> u32 {
        max_number(self.confirmed_matches.iter().chain(&self.rejected_matches))
    }

    /// Confirmed-class entries of `confirmed_matches`.
    pub fn confirmed_class(&self) -> impl Iterator<Item = &MatchSuggestion> {
        self.confirmed_matches.iter().filter(|m| m.status.is_confirmed_class())
    }

    /// Beacon ids referenced by confirmed-class matches.
    pub fn referenced_beacon_ids(&self) -> BTreeSet<String> {
        self.confirmed_class()
            .flat_map(|m| m.beacon_ids().map(str::to_string))
            .collect()
    }

    /// Bank ids covered by a confirmed-class match.
    pub fn covered_bank_ids(&self) -> HashSet<&str> {
        self.confirmed_class().map(MatchSuggestion::bank_id).collect()
    }

    /// The confirmed-class match holding `beacon_id`, if any.
    pub fn holder_of(&self, beacon_id: &str) -> Option<&MatchSuggestion> {
        self.confirmed_class().find(|m| m.beacon_ids().any(|id| id == beacon_id))
    }

    /// The confirmed-class match covering `bank_id`, if any.
    pub fn bank_holder(&self, bank_id: &str) -> Option<&MatchSuggestion> {
        self.confirmed_class().find(|m| m.bank_id() == bank_id)
    }

    pub fn find(&self, match_id: &str) -> Option<&MatchSuggestion> {
        self.confirmed_matches
            .iter()
            .chain(&self.rejected_matches)
            .find(|m| m.id == match_id)
    }

    /// Rebuild `matched_beacon_ids` from the match list. Returns true if the
    /// persisted set differed.
    pub fn recompute_matched_ids(&mut self) -> bool {
        let derived = self.referenced_beacon_ids();
        let changed = derived != self.matched_beacon_ids;
        self.matched_beacon_ids = derived;
        changed
    }

    /// Force `matched = true` on every confirmed-class Beacon entry.
    /// Returns how many flags were flipped.
    pub fn sync_matched_flags(&mut self) -> usize {
        let mut flipped = 0;
        for m in self.confirmed_matches.iter_mut().filter(|m| m.status.is_confirmed_class()) {
            for e in m.beacon_entries_mut() {
                if !e.matched {
                    e.matched = true;
                    flipped += 1;
                }
            }
        }
        flipped
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// JSON ledger file with atomic save and a sidecar lock.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        sidecar(&self.path, "lock")
    }

    pub fn backup_path(&self) -> PathBuf {
        sidecar(&self.path, "bak")
    }

    /// Missing file yields an empty ledger; anything unparseable is a
    /// `StateFormat` error and the file is left untouched.
    pub fn load(&self) -> Result<ReconState, ReconError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("no ledger at {}, starting empty", self.path.display());
                return Ok(ReconState::default());
            }
            Err(e) => return Err(e.into()),
        };
        let state = ReconState::from_json(&data)
            .map_err(|e| ReconError::StateFormat(format!("{}: {e}", self.path.display())))?;
        log::debug!(
            "loaded ledger {}: {} confirmed, {} rejected",
            self.path.display(),
            state.confirmed_matches.len(),
            state.rejected_matches.len()
        );
        Ok(state)
    }

    /// Write to a temp file, flush to disk, then rename over the target.
    pub fn save(&self, state: &ReconState) -> Result<(), ReconError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = state.to_json()?;
        let temp_path = sidecar(&self.path, "tmp");
        let written = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| fs::rename(&temp_path, &self.path)) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        log::info!(
            "saved ledger {}: {} confirmed, {} rejected",
            self.path.display(),
            state.confirmed_matches.len(),
            state.rejected_matches.len()
        );
        Ok(())
    }

    /// Copy the current file to `<file>.bak`. `None` when there is nothing
    /// to back up.
    pub fn backup(&self) -> Result<Option<PathBuf>, ReconError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let backup = self.backup_path();
        fs::copy(&self.path, &backup)?;
        log::info!("backed up ledger to {}", backup.display());
        Ok(Some(backup))
    }

    /// Take the exclusive lock for a load-mutate-save cycle. Released on drop.
    pub fn lock(&self) -> Result<StoreLock, ReconError> {
        let path = self.lock_path();
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // Guard first: a failed pid write still removes the file.
                let lock = StoreLock { path };
                writeln!(file, "{}", std::process::id())?;
                Ok(lock)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(ReconError::StoreLocked(path)),
            Err(e) => Err(e.into()),
        }
    }
}

/// Held lock on a [`StateStore`].
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
