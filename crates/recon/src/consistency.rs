//! Read-only ledger validation and deterministic repair.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::config::ConflictPolicy;
use crate::model::{format_match_id, MatchStatus, MatchSuggestion};
use crate::state::ReconState;

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// One consistency warning. Non-fatal; surfaced for explicit repair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Finding {
    /// Several ledger records (confirmed and rejected combined) share an id.
    DuplicateMatchId { id: String, count: usize, identical: bool },
    /// In `matched_beacon_ids` but no confirmed-class match references it.
    OrphanedBeaconId { beacon_id: String },
    /// Referenced by a confirmed-class match but missing from `matched_beacon_ids`.
    UnrecordedBeaconId { beacon_id: String },
    /// A non-confirmed-class status inside `confirmed_matches`.
    InvalidConfirmedStatus { match_id: String, status: MatchStatus },
    /// A confirmed-class Beacon entry with `matched = false`.
    UnflaggedBeacon { match_id: String, beacon_id: String },
    /// One Beacon entry backs more than one confirmed-class match.
    ExclusivityViolation { beacon_id: String, match_ids: Vec<String> },
}

impl Finding {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateMatchId { .. } => "duplicate_match_id",
            Self::OrphanedBeaconId { .. } => "orphaned_beacon_id",
            Self::UnrecordedBeaconId { .. } => "unrecorded_beacon_id",
            Self::InvalidConfirmedStatus { .. } => "invalid_confirmed_status",
            Self::UnflaggedBeacon { .. } => "unflagged_beacon",
            Self::ExclusivityViolation { .. } => "exclusivity_violation",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Self::DuplicateMatchId { .. } => {
                "repair collapses identical copies and renumbers the later ones"
            }
            Self::OrphanedBeaconId { .. } => "repair drops the id from matched_beacon_ids",
            Self::UnrecordedBeaconId { .. } => "repair adds the id to matched_beacon_ids",
            Self::InvalidConfirmedStatus { .. } => {
                "repair moves rejected entries to rejected_matches and drops the rest"
            }
            Self::UnflaggedBeacon { .. } => "repair sets matched = true",
            Self::ExclusivityViolation { .. } => {
                "repair keeps one match per the conflict policy and rejects the others"
            }
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateMatchId { id, count, identical } => {
                let kind = if *identical { "identical" } else { "different" };
                write!(f, "{id} appears {count} times ({kind} content)")
            }
            Self::OrphanedBeaconId { beacon_id } => {
                write!(f, "{beacon_id} is marked matched but no confirmed match references it")
            }
            Self::UnrecordedBeaconId { beacon_id } => {
                write!(f, "{beacon_id} is referenced by a confirmed match but not marked matched")
            }
            Self::InvalidConfirmedStatus { match_id, status } => {
                write!(f, "{match_id} has status {status} inside confirmed_matches")
            }
            Self::UnflaggedBeacon { match_id, beacon_id } => {
                write!(f, "{match_id}: {beacon_id} has matched = false")
            }
            Self::ExclusivityViolation { beacon_id, match_ids } => {
                write!(f, "{beacon_id} is held by {}", match_ids.join(", "))
            }
        }
    }
}

/// Check every ledger invariant. Read-only.
pub fn validate(state: &ReconState) -> Vec<Finding> {
    let mut findings = Vec::new();

    let mut by_id: BTreeMap<&str, Vec<&MatchSuggestion>> = BTreeMap::new();
    for m in state.confirmed_matches.iter().chain(&state.rejected_matches) {
        by_id.entry(m.id.as_str()).or_default().push(m);
    }
    for (id, records) in &by_id {
        if records.len() > 1 {
            findings.push(Finding::DuplicateMatchId {
                id: id.to_string(),
                count: records.len(),
                identical: records.iter().all(|r| *r == records[0]),
            });
        }
    }

    let referenced = state.referenced_beacon_ids();
    for id in state.matched_beacon_ids.difference(&referenced) {
        findings.push(Finding::OrphanedBeaconId { beacon_id: id.clone() });
    }
    for id in referenced.difference(&state.matched_beacon_ids) {
        findings.push(Finding::UnrecordedBeaconId { beacon_id: id.clone() });
    }

    for m in &state.confirmed_matches {
        if !m.status.is_confirmed_class() {
            findings.push(Finding::InvalidConfirmedStatus { match_id: m.id.clone(), status: m.status });
        }
    }

    for m in state.confirmed_class() {
        for e in m.beacon_entries().iter().filter(|e| !e.matched) {
            findings.push(Finding::UnflaggedBeacon { match_id: m.id.clone(), beacon_id: e.id.clone() });
        }
    }

    let mut holders: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for m in state.confirmed_class() {
        for id in m.beacon_ids() {
            holders.entry(id).or_default().push(m.id.clone());
        }
    }
    for (beacon_id, match_ids) in holders {
        if match_ids.len() > 1 {
            findings.push(Finding::ExclusivityViolation { beacon_id: beacon_id.to_string(), match_ids });
        }
    }

    findings
}

/// Human-readable report grouped by finding code, one hint per group.
pub fn render_findings(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return "ledger is consistent\n".to_string();
    }
    let mut groups: BTreeMap<&str, Vec<&Finding>> = BTreeMap::new();
    for f in findings {
        groups.entry(f.code()).or_default().push(f);
    }
    let mut out = format!("{} finding(s)\n", findings.len());
    for (code, group) in groups {
        out.push_str(&format!("\n{code} ({})\n", group.len()));
        for f in &group {
            out.push_str(&format!("  - {f}\n"));
        }
        out.push_str(&format!("  fix: {}\n", group[0].hint()));
    }
    out
}

// ---------------------------------------------------------------------------
// Repair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Renumbered {
    pub from: String,
    pub to: String,
    pub bank_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Demotion {
    pub match_id: String,
    pub beacon_id: String,
    pub kept: String,
}

/// Everything one repair pass changed. Empty on a consistent ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub collapsed_duplicates: Vec<String>,
    pub renumbered: Vec<Renumbered>,
    pub moved_to_rejected: Vec<String>,
    pub dropped_invalid: Vec<String>,
    pub demoted: Vec<Demotion>,
    pub flags_set: usize,
    pub orphans_dropped: Vec<String>,
    pub unrecorded_added: Vec<String>,
}

impl RepairReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "nothing to repair");
        }
        for id in &self.collapsed_duplicates {
            writeln!(f, "collapsed identical duplicate {id}")?;
        }
        for r in &self.renumbered {
            writeln!(f, "renumbered {} -> {} ({})", r.from, r.to, r.bank_id)?;
        }
        for id in &self.moved_to_rejected {
            writeln!(f, "moved {id} to rejected_matches")?;
        }
        for id in &self.dropped_invalid {
            writeln!(f, "dropped {id} from confirmed_matches")?;
        }
        for d in &self.demoted {
            writeln!(f, "rejected {} (shares {} with {})", d.match_id, d.beacon_id, d.kept)?;
        }
        if self.flags_set > 0 {
            writeln!(f, "set matched = true on {} Beacon entries", self.flags_set)?;
        }
        for id in &self.orphans_dropped {
            writeln!(f, "dropped orphaned {id}")?;
        }
        for id in &self.unrecorded_added {
            writeln!(f, "recorded {id} as matched")?;
        }
        Ok(())
    }
}

/// Repair every finding class in a fixed order. Running it again on the
/// result changes nothing.
pub fn repair(state: &mut ReconState, policy: ConflictPolicy) -> RepairReport {
    let mut report = RepairReport::default();

    collapse_identical(state, &mut report);
    renumber_duplicates(state, &mut report);
    clean_statuses(state, &mut report);
    resolve_exclusivity(state, policy, &mut report);

    report.flags_set = state.sync_matched_flags();

    let persisted = state.matched_beacon_ids.clone();
    state.recompute_matched_ids();
    report.orphans_dropped = persisted.difference(&state.matched_beacon_ids).cloned().collect();
    report.unrecorded_added = state.matched_beacon_ids.difference(&persisted).cloned().collect();

    if !report.is_empty() {
        log::warn!("ledger repaired:\n{report}");
    }
    report
}

fn collapse_identical(state: &mut ReconState, report: &mut RepairReport) {
    let mut seen: HashMap<String, Vec<MatchSuggestion>> = HashMap::new();
    for list in [&mut state.confirmed_matches, &mut state.rejected_matches] {
        list.retain(|m| {
            let same_id = seen.entry(m.id.clone()).or_default();
            if same_id.iter().any(|s| s == m) {
                report.collapsed_duplicates.push(m.id.clone());
                false
            } else {
                same_id.push(m.clone());
                true
            }
        });
    }
}

/// First occurrence keeps its id; later ones take max + 1, max + 2, ...
fn renumber_duplicates(state: &mut ReconState, report: &mut RepairReport) {
    let mut next = state.max_match_number() + 1;
    let mut seen = std::collections::HashSet::new();
    for m in state.confirmed_matches.iter_mut().chain(state.rejected_matches.iter_mut()) {
        if seen.insert(m.id.clone()) {
            continue;
        }
        let to = format_match_id(next);
        next += 1;
        report.renumbered.push(Renumbered {
            from: std::mem::replace(&mut m.id, to.clone()),
            to: to.clone(),
            bank_id: m.bank_id().to_string(),
        });
        seen.insert(to);
    }
}

/// Move `rejected` entries out of `confirmed_matches` into `rejected_matches`;
/// drop any other non-confirmed-class entry.
pub(crate) fn clean_statuses(state: &mut ReconState, report: &mut RepairReport) {
    let (keep, invalid): (Vec<_>, Vec<_>) = std::mem::take(&mut state.confirmed_matches)
        .into_iter()
        .partition(|m| m.status.is_confirmed_class());
    state.confirmed_matches = keep;

    for mut m in invalid {
        if m.status == MatchStatus::Rejected {
            m.flag_entries(false);
            report.moved_to_rejected.push(m.id.clone());
            state.rejected_matches.push(m);
        } else {
            report.dropped_invalid.push(m.id.clone());
        }
    }
}

fn resolve_exclusivity(state: &mut ReconState, policy: ConflictPolicy, report: &mut RepairReport) {
    while let Some((beacon_id, holders)) = first_violation(&state.confirmed_matches) {
        let winner = match policy {
            // Later position wins ties.
            ConflictPolicy::HigherConfidence => holders.iter().copied().fold(holders[0], |best, i| {
                let (a, b) = (&state.confirmed_matches[best], &state.confirmed_matches[i]);
                if b.confidence() >= a.confidence() {
                    i
                } else {
                    best
                }
            }),
            ConflictPolicy::MostRecent => holders[holders.len() - 1],
        };
        let kept = state.confirmed_matches[winner].id.clone();

        for &i in holders.iter().rev().filter(|&&i| i != winner) {
            let mut loser = state.confirmed_matches.remove(i);
            loser.status = MatchStatus::Rejected;
            loser.flag_entries(false);
            report.demoted.push(Demotion {
                match_id: loser.id.clone(),
                beacon_id: beacon_id.clone(),
                kept: kept.clone(),
            });
            state.rejected_matches.push(loser);
        }
    }
}

/// Lowest Beacon id held by several matches, with holder positions ascending.
fn first_violation(matches: &[MatchSuggestion]) -> Option<(String, Vec<usize>)> {
    let mut holders: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, m) in matches.iter().enumerate() {
        for id in m.beacon_ids() {
            holders.entry(id).or_default().push(i);
        }
    }
    holders
        .into_iter()
        .find(|(_, h)| h.len() > 1)
        .map(|(id, h)| (id.to_string(), h))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
