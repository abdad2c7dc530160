use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::ReconConfig;
use crate::consistency::{self, Finding, RepairReport};
use crate::error::ReconError;
use crate::matcher::{generate_candidates, rank};
use crate::model::{format_match_id, BankTransaction, BeaconEntry, MatchKind, MatchStatus, MatchSuggestion, Scores};
use crate::scoring::Scorer;
use crate::state::ReconState;
use crate::stats::ReconStats;

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// The match a status decision targets. Working ids are reassigned on every
/// pass, so `bank_id` (and `beacon_ids`, when given) pin the pairing the
/// reviewer actually looked at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRef {
    pub match_id: String,
    pub bank_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub beacon_ids: Vec<String>,
}

impl MatchRef {
    pub fn new(match_id: impl Into<String>, bank_id: impl Into<String>) -> Self {
        Self { match_id: match_id.into(), bank_id: bank_id.into(), beacon_ids: Vec::new() }
    }

    pub fn with_beacon_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.beacon_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Pin the pairing `m` currently carries.
    pub fn of(m: &MatchSuggestion) -> Self {
        Self::new(m.id.clone(), m.bank_id()).with_beacon_ids(m.beacon_ids())
    }
}

/// One review decision, as queued by a review surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Confirm(MatchRef),
    Reject(MatchRef),
    Skip(MatchRef),
    Revert(MatchRef),
    Manual {
        bank_id: String,
        trans_nos: Vec<String>,
        #[serde(default)]
        comment: String,
    },
    Resolve { bank_id: String, comment: String },
}

/// What a decision did. `from == Some(status)` means it was already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    pub match_id: String,
    pub bank_id: String,
    pub from: Option<MatchStatus>,
    pub status: MatchStatus,
}

impl DecisionOutcome {
    fn of(m: &MatchSuggestion, from: Option<MatchStatus>) -> Self {
        Self {
            match_id: m.id.clone(),
            bank_id: m.bank_id().to_string(),
            from,
            status: m.status,
        }
    }

    pub fn changed(&self) -> bool {
        self.from != Some(self.status)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

enum Slot {
    Confirmed(usize),
    Rejected(usize),
    Working(usize),
    Alternate(String, usize),
}

/// Owns the ingested records, the ledger, and the current working list of
/// suggestions. Every decision either fully applies or leaves all of them
/// unchanged.
pub struct ReconEngine {
    config: ReconConfig,
    scorer: Scorer,
    bank: Vec<BankTransaction>,
    beacon: Vec<BeaconEntry>,
    state: ReconState,
    suggestions: Vec<MatchSuggestion>,
    alternates: BTreeMap<String, Vec<MatchSuggestion>>,
    /// Highest id number handed out this session.
    issued: u32,
}

impl ReconEngine {
    pub fn new(
        config: ReconConfig,
        bank: Vec<BankTransaction>,
        beacon: Vec<BeaconEntry>,
        state: ReconState,
    ) -> Self {
        let scorer = Scorer::new(&config);
        let mut engine = Self {
            config,
            scorer,
            bank,
            beacon,
            state,
            suggestions: Vec::new(),
            alternates: BTreeMap::new(),
            issued: 0,
        };
        engine.heal();
        engine
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn state(&self) -> &ReconState {
        &self.state
    }

    pub fn into_state(self) -> ReconState {
        self.state
    }

    pub fn bank(&self) -> &[BankTransaction] {
        &self.bank
    }

    pub fn beacon(&self) -> &[BeaconEntry] {
        &self.beacon
    }

    /// Current working list: one pending or skipped suggestion per bank
    /// transaction, descending confidence.
    pub fn suggestions(&self) -> &[MatchSuggestion] {
        &self.suggestions
    }

    /// Secondary candidates retained for `bank_id`.
    pub fn alternates(&self, bank_id: &str) -> &[MatchSuggestion] {
        self.alternates.get(bank_id).map(Vec::as_slice).unwrap_or(&[])
    }

    // -----------------------------------------------------------------------
    // Regeneration
    // -----------------------------------------------------------------------

    /// Clear non-confirmed-class entries out of `confirmed_matches` (a
    /// stray rejection moves to `rejected_matches`, anything else is
    /// dropped) and rebuild every derived cache from the match list.
    fn heal(&mut self) {
        let mut report = RepairReport::default();
        consistency::clean_statuses(&mut self.state, &mut report);
        for id in &report.moved_to_rejected {
            log::warn!("moved rejected {id} from confirmed_matches to rejected_matches");
        }
        for id in &report.dropped_invalid {
            log::warn!("dropped {id} from confirmed_matches: not a confirmed status");
        }

        if self.state.recompute_matched_ids() {
            log::warn!("matched_beacon_ids disagreed with confirmed matches; rebuilt");
        }
        let flipped = self.state.sync_matched_flags();
        if flipped > 0 {
            log::warn!("set matched = true on {flipped} confirmed Beacon entries");
        }
        self.sync_beacon_flags();
    }

    fn sync_beacon_flags(&mut self) {
        for e in &mut self.beacon {
            e.matched = self.state.matched_beacon_ids.contains(&e.id);
        }
    }

    fn next_base(&self) -> u32 {
        self.state.max_match_number().max(self.issued) + 1
    }

    fn allocate_id(&mut self) -> String {
        let n = self.next_base();
        self.issued = n;
        format_match_id(n)
    }

    /// Regenerate the working list from the unmatched records.
    ///
    /// Bank transactions covered by a confirmed-class match or listed in
    /// `rejected_bank_ids` are skipped, as are Beacon entries already
    /// matched and pairings the ledger has already rejected. Ids continue
    /// above everything in the ledger and everything issued this session.
    pub fn generate(&mut self) -> &[MatchSuggestion] {
        self.heal();

        let covered = self.state.covered_bank_ids();
        let bank: Vec<&BankTransaction> = self
            .bank
            .iter()
            .filter(|b| !covered.contains(b.id.as_str()) && !self.state.rejected_bank_ids.contains(&b.id))
            .collect();
        let beacon: Vec<&BeaconEntry> = self
            .beacon
            .iter()
            .filter(|e| !self.state.matched_beacon_ids.contains(&e.id))
            .collect();

        let mut candidates = generate_candidates(&bank, &beacon, &self.scorer);
        let before = candidates.len();
        candidates.retain(|c| !self.state.rejected_matches.iter().any(|r| r.same_pairing(c)));
        if candidates.len() < before {
            log::debug!("suppressed {} previously rejected pairings", before - candidates.len());
        }

        let mut set = rank(candidates);
        let next = set.rebase(self.next_base());
        if !set.is_empty() {
            self.issued = next - 1;
        }
        log::info!(
            "{} suggestions ({} alternates) for {} unmatched bank transactions",
            set.primary.len(),
            set.len() - set.primary.len(),
            bank.len()
        );

        self.suggestions = set.primary;
        self.alternates = set.alternates;

        if self.config.auto_confirm.enabled {
            self.auto_confirm();
        }
        &self.suggestions
    }

    /// Promote primaries whose confidence exceeds the amount-class threshold.
    /// A primary sharing a Beacon entry with another equally confident one
    /// stays pending, as does anything that would break exclusivity.
    fn auto_confirm(&mut self) {
        let auto = &self.config.auto_confirm;
        let eligible: Vec<String> = self
            .suggestions
            .iter()
            .filter(|m| {
                let threshold = if self.scorer.matching().is_common(m.bank_transaction.amount) {
                    auto.common_threshold
                } else {
                    auto.other_threshold
                };
                m.confidence() > threshold
            })
            .map(|m| m.id.clone())
            .collect();

        let mut claims: HashMap<&str, Vec<&MatchSuggestion>> = HashMap::new();
        for m in self.suggestions.iter().filter(|m| eligible.contains(&m.id)) {
            for id in m.beacon_ids() {
                claims.entry(id).or_default().push(m);
            }
        }
        let tied: HashSet<String> = claims
            .values()
            .flat_map(|holders| {
                holders.iter().filter(move |a| {
                    holders.iter().any(|b| b.id != a.id && b.confidence() == a.confidence())
                })
            })
            .map(|m| m.id.clone())
            .collect();

        for id in eligible {
            if tied.contains(&id) {
                log::debug!("{id}: tied with another candidate, left pending");
                continue;
            }
            match self.set_status(&id, MatchStatus::Confirmed) {
                Ok(_) => log::info!("{id}: auto-confirmed"),
                Err(e) if e.is_conflict() => log::debug!("{id}: not auto-confirmed: {e}"),
                Err(e) => log::warn!("{id}: auto-confirm failed: {e}"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    fn locate(&self, match_id: &str) -> Option<Slot> {
        if let Some(i) = self.state.confirmed_matches.iter().position(|m| m.id == match_id) {
            return Some(Slot::Confirmed(i));
        }
        if let Some(i) = self.state.rejected_matches.iter().position(|m| m.id == match_id) {
            return Some(Slot::Rejected(i));
        }
        if let Some(i) = self.suggestions.iter().position(|m| m.id == match_id) {
            return Some(Slot::Working(i));
        }
        self.alternates.iter().find_map(|(bank_id, alts)| {
            alts.iter()
                .position(|m| m.id == match_id)
                .map(|i| Slot::Alternate(bank_id.clone(), i))
        })
    }

    fn at(&self, slot: &Slot) -> &MatchSuggestion {
        match slot {
            Slot::Confirmed(i) => &self.state.confirmed_matches[*i],
            Slot::Rejected(i) => &self.state.rejected_matches[*i],
            Slot::Working(i) => &self.suggestions[*i],
            Slot::Alternate(bank_id, i) => &self.alternates[bank_id][*i],
        }
    }

    fn take(&mut self, slot: Slot) -> MatchSuggestion {
        match slot {
            Slot::Confirmed(i) => self.state.confirmed_matches.remove(i),
            Slot::Rejected(i) => self.state.rejected_matches.remove(i),
            Slot::Working(i) => self.suggestions.remove(i),
            Slot::Alternate(bank_id, i) => {
                let alts = self.alternates.entry(bank_id.clone()).or_default();
                let m = alts.remove(i);
                if alts.is_empty() {
                    self.alternates.remove(&bank_id);
                }
                m
            }
        }
    }

    /// Ledger records followed by the working list.
    pub fn all_matches(&self) -> impl Iterator<Item = &MatchSuggestion> {
        self.state
            .confirmed_matches
            .iter()
            .chain(&self.state.rejected_matches)
            .chain(&self.suggestions)
    }

    /// Any match (working or ledger) by id.
    pub fn find(&self, match_id: &str) -> Option<&MatchSuggestion> {
        self.locate(match_id).map(|slot| self.at(&slot))
    }

    /// Working suggestions, alternates and ledger records whose bank
    /// description or any Beacon payee contains `term`, case-insensitively.
    pub fn search(&self, term: &str) -> Vec<&MatchSuggestion> {
        let needle = term.to_lowercase();
        let hit = |m: &&MatchSuggestion| {
            m.bank_transaction.description.to_lowercase().contains(&needle)
                || m.beacon_entries().iter().any(|e| e.payee.to_lowercase().contains(&needle))
        };
        self.suggestions
            .iter()
            .chain(self.alternates.values().flatten())
            .chain(&self.state.confirmed_matches)
            .chain(&self.state.rejected_matches)
            .filter(hit)
            .collect()
    }

    fn bank_by_id(&self, bank_id: &str) -> Result<&BankTransaction, ReconError> {
        self.bank
            .iter()
            .find(|b| b.id == bank_id)
            .ok_or_else(|| ReconError::UnknownBank(bank_id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Exclusivity against the ledger, ignoring `m` itself.
    fn check_exclusive(&self, m: &MatchSuggestion) -> Result<(), ReconError> {
        for beacon_id in m.beacon_ids() {
            if let Some(holder) = self.state.holder_of(beacon_id).filter(|h| h.id != m.id) {
                return Err(ReconError::Conflict {
                    match_id: m.id.clone(),
                    beacon_id: beacon_id.to_string(),
                    held_by: holder.id.clone(),
                });
            }
        }
        if let Some(holder) = self.state.bank_holder(m.bank_id()).filter(|h| h.id != m.id) {
            return Err(ReconError::BankAlreadyMatched {
                bank_id: m.bank_id().to_string(),
                held_by: holder.id.clone(),
            });
        }
        Ok(())
    }

    /// Move `m` into `confirmed_matches` and update every derived cache.
    fn commit(&mut self, mut m: MatchSuggestion) {
        m.flag_entries(true);
        self.state
            .matched_beacon_ids
            .extend(m.beacon_ids().map(str::to_string));
        let bank_id = m.bank_id().to_string();
        self.state.confirmed_matches.push(m);
        self.retire_working(&bank_id);
        self.sync_beacon_flags();
    }

    /// Park working suggestions for a now-covered bank transaction among its
    /// alternates.
    fn retire_working(&mut self, bank_id: &str) {
        let (retired, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.suggestions)
            .into_iter()
            .partition(|m| m.bank_id() == bank_id);
        self.suggestions = keep;
        if !retired.is_empty() {
            let alts = self.alternates.entry(bank_id.to_string()).or_default();
            let rest = std::mem::take(alts);
            alts.extend(retired);
            alts.extend(rest);
        }
    }

    /// Put a generated match back in the working list, or among the
    /// alternates if its bank transaction already has a working suggestion.
    fn requeue(&mut self, m: MatchSuggestion) {
        if self.suggestions.iter().any(|s| s.bank_id() == m.bank_id()) {
            self.alternates.entry(m.bank_id().to_string()).or_default().insert(0, m);
            return;
        }
        self.suggestions.push(m);
        self.suggestions.sort_by(|a, b| {
            b.confidence()
                .total_cmp(&a.confidence())
                .then_with(|| a.bank_id().cmp(b.bank_id()))
        });
    }

    /// After a rejection, offer the best remaining alternate for the bank.
    fn promote_alternate(&mut self, bank_id: &str) {
        if self.suggestions.iter().any(|s| s.bank_id() == bank_id)
            || self.state.bank_holder(bank_id).is_some()
        {
            return;
        }
        let Some(alts) = self.alternates.get_mut(bank_id) else {
            return;
        };
        if alts.is_empty() {
            return;
        }
        let mut next = alts.remove(0);
        if alts.is_empty() {
            self.alternates.remove(bank_id);
        }
        next.status = MatchStatus::Pending;
        log::debug!("{bank_id}: promoted alternate {}", next.id);
        self.requeue(next);
    }

    /// Generic status transition. Re-applying the current status is a no-op.
    ///
    /// Generated matches move freely between `pending`, `skipped`,
    /// `rejected` and `confirmed`. Manual and resolved matches can be
    /// rejected (kept in `rejected_matches`) or reverted to `pending`, which
    /// drops them from the ledger. Either way a resolved bank transaction
    /// becomes eligible for suggestions again.
    pub fn set_status(&mut self, match_id: &str, to: MatchStatus) -> Result<DecisionOutcome, ReconError> {
        let slot = self
            .locate(match_id)
            .ok_or_else(|| ReconError::UnknownMatch(match_id.to_string()))?;
        let current = self.at(&slot);
        let from = current.status;
        if from == to {
            return Ok(DecisionOutcome::of(current, Some(from)));
        }

        let generated = matches!(current.kind, MatchKind::OneToOne(_) | MatchKind::OneToTwo(_));
        let allowed = match to {
            MatchStatus::ManualMatch | MatchStatus::ManuallyResolved => false,
            MatchStatus::Pending | MatchStatus::Rejected => true,
            MatchStatus::Confirmed | MatchStatus::Skipped => generated,
        };
        if !allowed {
            return Err(ReconError::InvalidTransition {
                match_id: match_id.to_string(),
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if to == MatchStatus::Confirmed {
            self.check_exclusive(current)?;
        }

        let mut m = self.take(slot);
        let was_confirmed = from.is_confirmed_class();
        if was_confirmed {
            m.flag_entries(false);
        }
        m.status = to;
        let outcome = DecisionOutcome::of(&m, Some(from));
        let bank_id = m.bank_id().to_string();

        match (to, generated) {
            (MatchStatus::Confirmed, _) => self.commit(m),
            (MatchStatus::Rejected, true) => {
                self.state.rejected_matches.push(m);
                self.promote_alternate(&bank_id);
            }
            (MatchStatus::Rejected, false) => {
                if matches!(m.kind, MatchKind::Resolved { .. }) {
                    self.state.rejected_bank_ids.remove(&bank_id);
                }
                self.state.rejected_matches.push(m);
            }
            (_, true) => self.requeue(m),
            (_, false) => {
                if matches!(m.kind, MatchKind::Resolved { .. }) {
                    self.state.rejected_bank_ids.remove(&bank_id);
                }
                log::debug!("{}: dropped {} match on revert", m.id, m.match_type());
            }
        }

        if was_confirmed {
            self.state.recompute_matched_ids();
            self.sync_beacon_flags();
        }
        log::info!("{match_id}: {from} -> {to}");
        Ok(outcome)
    }

    /// `pending -> confirmed`. Fails with a conflict if any referenced Beacon
    /// entry (or the bank transaction) is held by another confirmed match.
    pub fn confirm(&mut self, match_id: &str) -> Result<DecisionOutcome, ReconError> {
        self.set_status(match_id, MatchStatus::Confirmed)
    }

    /// `pending -> rejected`. The bank transaction stays eligible.
    pub fn reject(&mut self, match_id: &str) -> Result<DecisionOutcome, ReconError> {
        self.set_status(match_id, MatchStatus::Rejected)
    }

    pub fn skip(&mut self, match_id: &str) -> Result<DecisionOutcome, ReconError> {
        self.set_status(match_id, MatchStatus::Skipped)
    }

    pub fn revert(&mut self, match_id: &str) -> Result<DecisionOutcome, ReconError> {
        self.set_status(match_id, MatchStatus::Pending)
    }

    /// Match a bank transaction to Beacon entries chosen by `trans_no`.
    pub fn manual_match(
        &mut self,
        bank_id: &str,
        trans_nos: &[String],
        comment: &str,
    ) -> Result<DecisionOutcome, ReconError> {
        let bank = self.bank_by_id(bank_id)?.clone();

        let mut entries: Vec<BeaconEntry> = Vec::new();
        for no in trans_nos {
            let no = no.trim();
            let entry = self
                .beacon
                .iter()
                .find(|e| e.trans_no == no)
                .ok_or_else(|| ReconError::UnknownTransNo(no.to_string()))?;
            if !entries.iter().any(|e| e.id == entry.id) {
                entries.push(entry.clone());
            }
        }
        if entries.is_empty() {
            return Err(ReconError::InvalidTransition {
                match_id: bank_id.to_string(),
                from: MatchStatus::Pending.to_string(),
                to: MatchStatus::ManualMatch.to_string(),
            });
        }

        let mut m = MatchSuggestion {
            id: format_match_id(self.next_base()),
            scores: self.scorer.score_manual(&bank, &entries),
            bank_transaction: bank,
            kind: MatchKind::Manual { entries, comment: comment.trim().to_string() },
            status: MatchStatus::ManualMatch,
        };

        if let Some(existing) = self
            .state
            .confirmed_class()
            .find(|c| c.match_type() == m.match_type() && c.same_pairing(&m))
        {
            return Ok(DecisionOutcome::of(existing, Some(existing.status)));
        }
        self.check_exclusive(&m)?;

        m.id = self.allocate_id();
        let outcome = DecisionOutcome::of(&m, None);
        log::info!("{}: manual match for {bank_id} ({} entries)", m.id, m.beacon_entries().len());
        self.commit(m);
        Ok(outcome)
    }

    /// Mark a bank transaction as needing no Beacon counterpart.
    pub fn resolve(&mut self, bank_id: &str, comment: &str) -> Result<DecisionOutcome, ReconError> {
        let comment = comment.trim();
        if comment.is_empty() {
            return Err(ReconError::MissingComment { bank_id: bank_id.to_string() });
        }
        let bank = self.bank_by_id(bank_id)?.clone();

        if let Some(holder) = self.state.bank_holder(bank_id) {
            if matches!(holder.kind, MatchKind::Resolved { .. }) {
                return Ok(DecisionOutcome::of(holder, Some(holder.status)));
            }
            return Err(ReconError::BankAlreadyMatched {
                bank_id: bank_id.to_string(),
                held_by: holder.id.clone(),
            });
        }

        let m = MatchSuggestion {
            id: self.allocate_id(),
            bank_transaction: bank,
            kind: MatchKind::Resolved { comment: comment.to_string() },
            status: MatchStatus::ManuallyResolved,
            scores: Scores { confidence: 1.0, ..Scores::default() },
        };
        let outcome = DecisionOutcome::of(&m, None);
        log::info!("{}: {bank_id} resolved without a Beacon match", m.id);
        self.state.rejected_bank_ids.insert(bank_id.to_string());
        self.commit(m);
        Ok(outcome)
    }

    /// Fail with `StaleDecision` unless `target.match_id` still names the
    /// pairing the decision was made against.
    fn check_target(&self, target: &MatchRef) -> Result<(), ReconError> {
        let slot = self
            .locate(&target.match_id)
            .ok_or_else(|| ReconError::UnknownMatch(target.match_id.clone()))?;
        let m = self.at(&slot);

        let mut expected: Vec<&str> = target.beacon_ids.iter().map(|id| id.trim()).collect();
        expected.sort_unstable();
        expected.dedup();
        let mut found: Vec<&str> = m.beacon_ids().collect();
        found.sort_unstable();

        let bank_moved = m.bank_id() != target.bank_id.trim();
        if bank_moved || (!expected.is_empty() && expected != found) {
            return Err(ReconError::StaleDecision {
                match_id: target.match_id.clone(),
                expected: describe_pairing(target.bank_id.trim(), &expected),
                found: describe_pairing(m.bank_id(), &found),
            });
        }
        Ok(())
    }

    fn decide(&mut self, target: &MatchRef, to: MatchStatus) -> Result<DecisionOutcome, ReconError> {
        self.check_target(target)?;
        self.set_status(&target.match_id, to)
    }

    /// Apply one decision. Status decisions are checked against the pairing
    /// they name before anything changes.
    pub fn apply(&mut self, decision: &Decision) -> Result<DecisionOutcome, ReconError> {
        match decision {
            Decision::Confirm(target) => self.decide(target, MatchStatus::Confirmed),
            Decision::Reject(target) => self.decide(target, MatchStatus::Rejected),
            Decision::Skip(target) => self.decide(target, MatchStatus::Skipped),
            Decision::Revert(target) => self.decide(target, MatchStatus::Pending),
            Decision::Manual { bank_id, trans_nos, comment } => self.manual_match(bank_id, trans_nos, comment),
            Decision::Resolve { bank_id, comment } => self.resolve(bank_id, comment),
        }
    }

    /// Apply queued decisions in order. A failed decision leaves the ledger
    /// as it was and does not stop the ones after it.
    pub fn apply_batch<'a>(
        &mut self,
        decisions: impl IntoIterator<Item = &'a Decision>,
    ) -> Vec<Result<DecisionOutcome, ReconError>> {
        decisions.into_iter().map(|d| self.apply(d)).collect()
    }

    // -----------------------------------------------------------------------
    // Reporting + maintenance
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> ReconStats {
        ReconStats::compute(&self.bank, &self.beacon, &self.state, &self.suggestions)
    }

    pub fn validate(&self) -> Vec<Finding> {
        consistency::validate(&self.state)
    }

    pub fn repair(&mut self) -> RepairReport {
        let report = consistency::repair(&mut self.state, self.config.repair.conflict_policy);
        self.sync_beacon_flags();
        report
    }
}

fn describe_pairing(bank_id: &str, beacon_ids: &[&str]) -> String {
    if beacon_ids.is_empty() {
        bank_id.to_string()
    } else {
        format!("{bank_id} [{}]", beacon_ids.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
