//! The progression engine: owns the ledger, the prestige hierarchy, the
//! predicate engine and the save pipeline, and drives them from two ticks.
//!
//! # Tick pipeline
//!
//! [`Engine::ledger_tick`] integrates production, then requests a debounced
//! ledger save and polls the scheduler.
//!
//! [`Engine::automation_tick`] runs, in order:
//! 1. **Auto-buy** -- cheapest-first bulk purchases until nothing is affordable
//! 2. **Auto-advance** -- advance the skill tier if eligible
//! 3. **Unlock refresh** -- quantum milestones, artifacts, forge
//! 4. **Rates** -- recompile every production rate
//! 5. **Predicates** -- evaluate achievements and hints on a fresh snapshot
//! 6. **Rates again** -- only when a predicate granted a reward
//! 7. **Saves** -- write every due key
//!
//! Every user action recompiles rates before returning, so the next ledger
//! tick never integrates a stale rate.
//!
//! Time is always passed in as milliseconds; the engine never reads a clock.

use std::collections::BTreeMap;

use stellar_core::Numeral;
use stellar_core::config::EngineConfig;
use stellar_core::id::{PredicateId, ResourceId};
use stellar_core::ledger::{LedgerError, OfflineReport, ResourceLedger};
use stellar_data::ContentPack;
use stellar_data::schema::HintDef;
use tracing::{debug, info, warn};

use crate::error::{EngineError, ImportError, LayerError, SaveError};
use crate::forge::PullResult;
use crate::hierarchy::{AdvanceReport, Hierarchy, Rates};
use crate::persistence::{MemoryStore, SaveScheduler, SaveStore};
use crate::predicate::{Notification, PredicateEngine, Progress, Snapshot};
use crate::save::{self, Documents, SaveSource, SaveTarget};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something a presentation layer may want to announce.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    TierAdvanced { from_tier: u8, to_tier: u8 },
    AscensionPointsEarned(Numeral),
    EchoFragmentsEarned(Numeral),
    Collapsed,
    MilestoneReached(Numeral),
    ArtifactsAvailable,
    ForgeAvailable,
    Pulled { outcome: String, is_new: bool },
    AchievementUnlocked(PredicateId),
    HintTriggered(String),
    OfflineProgress(OfflineReport),
}

/// What one automation tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutomationReport {
    pub levels_bought: u32,
    pub advance: Option<AdvanceReport>,
    pub unlocked: Vec<PredicateId>,
}

/// What a load restored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub restored_keys: Vec<&'static str>,
    /// Saved ids with no counterpart in the current content.
    pub skipped_ids: usize,
    pub offline: Option<OfflineReport>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// State decoded from save documents, waiting to replace the live state.
struct Staged {
    hierarchy: Hierarchy,
    ledger: ResourceLedger,
    predicates: PredicateEngine,
    progress: Progress,
}

#[derive(Debug)]
pub struct Engine<S: SaveStore = MemoryStore> {
    config: EngineConfig,
    starting_energy: Numeral,
    ledger: ResourceLedger,
    hierarchy: Hierarchy,
    predicates: PredicateEngine,
    progress: Progress,
    scheduler: SaveScheduler,
    store: S,
    events: Vec<EngineEvent>,
}

impl<S: SaveStore> Engine<S> {
    /// Build a fresh play-through. Content is validated here; a bad graph is
    /// fatal.
    pub fn new(config: EngineConfig, content: ContentPack, store: S) -> Result<Self, EngineError> {
        let hierarchy = Hierarchy::new(&content, config.economy.clone(), config.forge.seed)?;
        let predicates = PredicateEngine::new(
            content.achievements,
            content.hints,
            config.predicates.notification_capacity,
        );
        let scheduler = SaveScheduler::new(
            config.persistence.save_debounce_ms,
            config.persistence.save_min_interval_ms,
        );
        let starting_energy = content.skills.starting_energy;
        let mut ledger = ResourceLedger::new();
        ledger.reset(ResourceId::Energy, starting_energy);

        let mut engine = Self {
            config,
            starting_energy,
            ledger,
            hierarchy,
            predicates,
            progress: Progress::default(),
            scheduler,
            store,
            events: Vec::new(),
        };
        engine.recompute_rates(0)?;
        Ok(engine)
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn predicates(&self) -> &PredicateEngine {
        &self.predicates
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scheduler(&self) -> &SaveScheduler {
        &self.scheduler
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut ResourceLedger {
        &mut self.ledger
    }

    pub fn amount(&self, resource: ResourceId) -> Numeral {
        self.ledger.amount(resource)
    }

    pub fn rate(&self, resource: ResourceId) -> Numeral {
        self.ledger.rate(resource)
    }

    /// Render a value with the configured display settings.
    pub fn format(&self, value: Numeral) -> String {
        self.config.display.format(value)
    }

    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.predicates.notifications()
    }

    pub fn pending_hints(&self) -> Vec<&HintDef> {
        self.predicates.pending_hints()
    }

    /// Drain all events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// A read-only view for evaluating conditions against the current state.
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            hierarchy: &self.hierarchy,
            ledger: &self.ledger,
            progress: &self.progress,
        }
    }

    fn session_minutes(&self, now_ms: u64) -> f64 {
        self.progress
            .session_started_ms
            .map_or(0.0, |start| now_ms.saturating_sub(start) as f64 / 60_000.0)
    }

    // -----------------------------------------------------------------------
    // Rates
    // -----------------------------------------------------------------------

    pub fn rates(&self, now_ms: u64) -> Rates {
        self.hierarchy
            .rates(&self.ledger, self.predicates.rewards(), self.session_minutes(now_ms))
    }

    /// Recompile every rate into the ledger. Returns whether any changed.
    pub fn recompute_rates(&mut self, now_ms: u64) -> Result<bool, LedgerError> {
        let rates = self.rates(now_ms);
        let mut changed = false;
        for (resource, rate) in [
            (ResourceId::Energy, rates.energy),
            (ResourceId::Quanta, rates.quanta),
            (ResourceId::FateTokens, rates.fate_tokens),
        ] {
            changed |= self.ledger.set_rate(resource, rate)?;
        }
        if changed {
            debug!(energy = %rates.energy, quanta = %rates.quanta, "Rates recomputed");
        }
        Ok(changed)
    }

    // -----------------------------------------------------------------------
    // Ticks
    // -----------------------------------------------------------------------

    /// High-frequency tick: integrate production only.
    pub fn ledger_tick(&mut self, delta_seconds: f64, now_ms: u64) -> Result<(), LedgerError> {
        self.ledger.tick(delta_seconds)?;
        self.progress.play_seconds += delta_seconds;
        self.scheduler.request(save::LEDGER_KEY, now_ms);
        self.poll_saves(now_ms);
        Ok(())
    }

    /// Low-frequency tick: automation, unlocks, rates and predicates.
    pub fn automation_tick(&mut self, now_ms: u64) -> Result<AutomationReport, LayerError> {
        let mut report = AutomationReport::default();
        let rewards = self.predicates.rewards().clone();

        if self.hierarchy.auto_buy_enabled(&rewards) {
            report.levels_bought = self.hierarchy.auto_buy(&mut self.ledger);
            if report.levels_bought > 0 {
                self.scheduler.request(save::LEDGER_KEY, now_ms);
            }
        }
        if self.hierarchy.auto_advance_enabled(&rewards) && self.hierarchy.can_advance(&self.ledger) {
            report.advance = Some(self.advance_unchecked(now_ms)?);
        }
        self.refresh_unlocks(now_ms);
        self.recompute_rates(now_ms)?;

        let evaluation = {
            let snapshot = Snapshot {
                hierarchy: &self.hierarchy,
                ledger: &self.ledger,
                progress: &self.progress,
            };
            self.predicates.evaluate(&snapshot, now_ms)
        };
        if !evaluation.unlocked.is_empty() {
            self.scheduler.request(save::ACHIEVEMENTS_KEY, now_ms);
        }
        self.events.extend(
            evaluation
                .unlocked
                .iter()
                .cloned()
                .map(EngineEvent::AchievementUnlocked),
        );
        self.events
            .extend(evaluation.hints.into_iter().map(EngineEvent::HintTriggered));
        if evaluation.rewards_changed {
            self.recompute_rates(now_ms)?;
        }
        report.unlocked = evaluation.unlocked;

        self.poll_saves(now_ms);
        Ok(report)
    }

    fn refresh_unlocks(&mut self, now_ms: u64) {
        let unlocks = self.hierarchy.refresh_unlocks(&self.ledger);
        if !unlocks.milestones.is_empty() {
            self.scheduler.request(save::QUANTUM_KEY, now_ms);
        }
        self.events
            .extend(unlocks.milestones.into_iter().map(EngineEvent::MilestoneReached));
        if unlocks.artifacts_opened {
            self.scheduler.request(save::ARTIFACTS_KEY, now_ms);
            self.events.push(EngineEvent::ArtifactsAvailable);
        }
        if unlocks.forge_opened {
            self.scheduler.request(save::FORGE_KEY, now_ms);
            self.events.push(EngineEvent::ForgeAvailable);
        }
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    pub fn purchase_skill(&mut self, id: &str, now_ms: u64) -> Result<u32, LayerError> {
        let level = self.hierarchy.purchase_skill(id, &mut self.ledger)?;
        self.after_action(&[save::LEDGER_KEY], now_ms)?;
        Ok(level)
    }

    pub fn can_advance(&self) -> bool {
        self.hierarchy.can_advance(&self.ledger)
    }

    /// Advance the skill tier. Fails without touching state when the tier is
    /// not maxed or Energy is below the threshold.
    pub fn advance(&mut self, now_ms: u64) -> Result<AdvanceReport, LayerError> {
        let report = self.advance_unchecked(now_ms)?;
        self.recompute_rates(now_ms)?;
        self.poll_saves(now_ms);
        Ok(report)
    }

    fn advance_unchecked(&mut self, now_ms: u64) -> Result<AdvanceReport, LayerError> {
        let rewards = self.predicates.rewards().clone();
        let report = self.hierarchy.advance(&mut self.ledger, &rewards)?;
        let advance = &report.advance;
        self.progress
            .record_advance(now_ms, self.hierarchy.skills().is_top_tier());
        self.events.push(EngineEvent::TierAdvanced {
            from_tier: advance.from_tier,
            to_tier: advance.to_tier,
        });
        self.scheduler.request(save::LEDGER_KEY, now_ms);
        if let Some(points) = report.ascension_points {
            self.events.push(EngineEvent::AscensionPointsEarned(points));
            self.scheduler.request(save::ASCENSION_KEY, now_ms);
        }
        if let Some(fragments) = report.echo_fragments {
            self.events.push(EngineEvent::EchoFragmentsEarned(fragments));
            self.scheduler.request(save::DIMENSIONS_KEY, now_ms);
        }
        info!(
            from_tier = advance.from_tier,
            to_tier = advance.to_tier,
            completed_run = advance.completed_run,
            "Tier advanced"
        );
        Ok(report)
    }

    pub fn purchase_ascension(&mut self, id: &str, now_ms: u64) -> Result<u32, LayerError> {
        let level = self.hierarchy.purchase_ascension(id)?;
        self.after_action(&[save::ASCENSION_KEY, save::LEDGER_KEY], now_ms)?;
        Ok(level)
    }

    pub fn unlock_dimension(&mut self, id: &str, now_ms: u64) -> Result<(), LayerError> {
        self.hierarchy.unlock_dimension(id)?;
        self.after_action(&[save::DIMENSIONS_KEY], now_ms)
    }

    pub fn upgrade_dimension(&mut self, dimension: &str, node: &str, now_ms: u64) -> Result<u32, LayerError> {
        let level = self.hierarchy.upgrade_dimension(dimension, node)?;
        self.after_action(&[save::DIMENSIONS_KEY, save::LEDGER_KEY], now_ms)?;
        Ok(level)
    }

    pub fn can_collapse(&self) -> bool {
        self.hierarchy
            .can_collapse(|id| self.predicates.is_unlocked(id.as_str()))
    }

    pub fn collapse(&mut self, now_ms: u64) -> Result<(), LayerError> {
        let predicates = &self.predicates;
        self.hierarchy
            .collapse(&mut self.ledger, |id| predicates.is_unlocked(id.as_str()))?;
        self.events.push(EngineEvent::Collapsed);
        self.after_action(&[save::DIMENSIONS_KEY, save::QUANTUM_KEY, save::LEDGER_KEY], now_ms)
    }

    pub fn purchase_quantum(&mut self, node: &str, now_ms: u64) -> Result<u32, LayerError> {
        let level = self.hierarchy.purchase_quantum(node, &mut self.ledger)?;
        self.after_action(&[save::QUANTUM_KEY, save::LEDGER_KEY], now_ms)?;
        Ok(level)
    }

    pub fn purchase_artifact(&mut self, id: &str, now_ms: u64) -> Result<u32, LayerError> {
        let level = self.hierarchy.purchase_artifact(id, &mut self.ledger)?;
        self.after_action(&[save::ARTIFACTS_KEY, save::LEDGER_KEY], now_ms)?;
        Ok(level)
    }

    pub fn pull(&mut self, now_ms: u64) -> Result<PullResult, LayerError> {
        let result = self.hierarchy.pull(&mut self.ledger)?;
        self.events.push(EngineEvent::Pulled {
            outcome: result.outcome.id.to_string(),
            is_new: result.is_new,
        });
        self.after_action(&[save::FORGE_KEY, save::LEDGER_KEY], now_ms)?;
        Ok(result)
    }

    pub fn upgrade_fate_weight(&mut self, id: &str, now_ms: u64) -> Result<u32, LayerError> {
        let level = self.hierarchy.upgrade_fate_weight(id, &mut self.ledger)?;
        self.after_action(&[save::FORGE_KEY, save::LEDGER_KEY], now_ms)?;
        Ok(level)
    }

    /// Mark a triggered hint as shown. Returns `false` if it already was.
    pub fn acknowledge_hint(&mut self, id: &str, now_ms: u64) -> bool {
        let acknowledged = self.predicates.acknowledge_hint(id);
        if acknowledged {
            self.scheduler.request(save::TUTORIAL_KEY, now_ms);
        }
        acknowledged
    }

    fn after_action(&mut self, keys: &[&'static str], now_ms: u64) -> Result<(), LayerError> {
        for &key in keys {
            self.scheduler.request(key, now_ms);
        }
        self.recompute_rates(now_ms)?;
        self.poll_saves(now_ms);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn encode(&self, key: &'static str, now_ms: u64) -> Result<String, SaveError> {
        save::encode(
            key,
            &SaveSource {
                hierarchy: &self.hierarchy,
                ledger: &self.ledger,
                predicates: &self.predicates,
                progress: &self.progress,
                now_ms,
            },
        )
    }

    /// Encode and write `keys`, plus the meta document.
    fn write_keys(&mut self, keys: &[&'static str], now_ms: u64) -> Result<usize, SaveError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut all: Vec<&'static str> = keys.to_vec();
        if !all.contains(&save::META_KEY) {
            all.push(save::META_KEY);
        }
        for &key in &all {
            let text = self.encode(key, now_ms)?;
            self.store
                .write(key, &text)
                .map_err(|source| SaveError::Store { key, source })?;
        }
        debug!(keys = ?all, "Saved");
        Ok(all.len())
    }

    /// Write every due key. Failures are logged and the key is retried on a
    /// later poll.
    fn poll_saves(&mut self, now_ms: u64) {
        let due = self.scheduler.take_due(now_ms);
        if let Err(err) = self.write_keys(&due, now_ms) {
            warn!(keys = ?due, error = %err, "Save failed");
            for key in due {
                self.scheduler.retry(key, now_ms);
            }
        }
    }

    /// Write every pending key now, ignoring both scheduling windows.
    /// Returns the number of documents written. On a store failure every
    /// taken key is pending again.
    pub fn flush(&mut self, now_ms: u64) -> Result<usize, SaveError> {
        let keys = self.scheduler.flush(now_ms);
        let written = match self.write_keys(&keys, now_ms) {
            Ok(written) => written,
            Err(err) => {
                warn!(keys = ?keys, error = %err, "Flush failed");
                for &key in &keys {
                    self.scheduler.retry(key, now_ms);
                }
                return Err(err);
            }
        };
        if written > 0 {
            info!(documents = written, "Save flushed");
        }
        Ok(written)
    }

    /// Request every key and flush.
    pub fn save_all(&mut self, now_ms: u64) -> Result<usize, SaveError> {
        for key in save::ALL_KEYS {
            self.scheduler.request(key, now_ms);
        }
        self.flush(now_ms)
    }

    /// Restore from the store and apply offline progress since the last
    /// save. Marks the start of the session.
    pub fn load(&mut self, now_ms: u64) -> Result<LoadReport, SaveError> {
        let mut raw: BTreeMap<&'static str, String> = BTreeMap::new();
        for key in save::ALL_KEYS {
            let text = self
                .store
                .read(key)
                .map_err(|source| SaveError::Store { key, source })?;
            if let Some(text) = text {
                raw.insert(key, text);
            }
        }
        let documents = Documents::decode(raw.iter().map(|(k, v)| (*k, v.as_str())))?;
        let last_saved = documents.last_saved_ms();
        let mut report = LoadReport {
            restored_keys: documents.keys(),
            ..LoadReport::default()
        };
        let (staged, skipped) = self.stage_documents(documents)?;
        self.commit(staged);
        report.skipped_ids = skipped;
        self.progress.session_started_ms = Some(now_ms);
        self.recompute_rates(now_ms)?;

        if let Some(last) = last_saved {
            let elapsed = now_ms.saturating_sub(last) as f64 / 1000.0;
            if elapsed > 0.0 {
                let policy = self
                    .hierarchy
                    .offline_policy(&self.ledger, self.predicates.rewards());
                let offline = self.ledger.catch_up_offline(elapsed, &policy)?;
                self.progress.record_offline(offline.seconds_applied);
                info!(
                    seconds = offline.seconds_applied,
                    gains = ?offline.gains,
                    "Offline progress applied"
                );
                self.events.push(EngineEvent::OfflineProgress(offline.clone()));
                report.offline = Some(offline);
                self.refresh_unlocks(now_ms);
                self.recompute_rates(now_ms)?;
            }
        }
        if report.skipped_ids > 0 {
            warn!(skipped = report.skipped_ids, "Saved ids missing from content were dropped");
        }
        Ok(report)
    }

    /// Apply documents to copies of the state. Nothing is swapped in until
    /// [`commit`](Self::commit).
    fn stage_documents(&self, documents: Documents) -> Result<(Staged, usize), SaveError> {
        let mut staged = Staged {
            hierarchy: self.hierarchy.clone(),
            ledger: self.ledger.clone(),
            predicates: self.predicates.clone(),
            progress: self.progress.clone(),
        };
        let skipped = documents.apply(SaveTarget {
            hierarchy: &mut staged.hierarchy,
            ledger: &mut staged.ledger,
            predicates: &mut staged.predicates,
            progress: &mut staged.progress,
        })?;
        Ok((staged, skipped))
    }

    fn commit(&mut self, staged: Staged) {
        self.hierarchy = staged.hierarchy;
        self.ledger = staged.ledger;
        self.predicates = staged.predicates;
        self.progress = staged.progress;
    }

    /// Write every raw document, or put back what was there before and fail.
    fn replace_documents(&mut self, raw: &BTreeMap<&'static str, String>) -> Result<(), SaveError> {
        let mut previous = BTreeMap::new();
        for &key in raw.keys() {
            let text = self
                .store
                .read(key)
                .map_err(|source| SaveError::Store { key, source })?;
            previous.insert(key, text);
        }
        let mut touched = Vec::new();
        for (&key, text) in raw {
            touched.push(key);
            if let Err(source) = self.store.write(key, text) {
                for &done in &touched {
                    let restored = match previous.get(done) {
                        Some(Some(old)) => self.store.write(done, old),
                        _ => self.store.remove(done),
                    };
                    if let Err(err) = restored {
                        warn!(key = done, error = %err, "Could not roll back save document");
                    }
                }
                return Err(SaveError::Store { key, source });
            }
        }
        Ok(())
    }

    /// Every document of the current state, wrapped for clipboard transfer.
    pub fn export(&self, now_ms: u64) -> Result<String, SaveError> {
        let mut documents = BTreeMap::new();
        for key in save::ALL_KEYS {
            documents.insert(key, self.encode(key, now_ms)?);
        }
        save::export_string(&documents)
    }

    /// Apply an export string. Only the keys it holds are replaced, both in
    /// memory and in the store. A bad string or a failed store write
    /// changes nothing.
    pub fn import(&mut self, text: &str, now_ms: u64) -> Result<Vec<&'static str>, ImportError> {
        let raw = save::decode_export(text).inspect_err(|err| warn!(error = %err, "Import rejected"))?;
        let documents = Documents::decode(raw.iter().map(|(k, v)| (*k, v.as_str())))?;
        let keys = documents.keys();
        let (staged, _) = self.stage_documents(documents)?;
        self.replace_documents(&raw)?;
        self.commit(staged);
        self.progress.imported = true;
        self.scheduler.request(save::LEDGER_KEY, now_ms);
        self.recompute_rates(now_ms).map_err(SaveError::from)?;
        info!(keys = ?keys, "Save imported");
        Ok(keys)
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Erase every layer, unlock and counter. The only operation that clears
    /// unlock sets.
    pub fn full_reset(&mut self, now_ms: u64) -> Result<(), EngineError> {
        self.hierarchy
            .full_reset()
            .map_err(EngineError::graph("skill"))?;
        self.ledger = ResourceLedger::new();
        self.ledger.reset(ResourceId::Energy, self.starting_energy);
        self.predicates.full_reset();
        self.progress = Progress {
            session_started_ms: Some(now_ms),
            ..Progress::default()
        };
        self.scheduler.clear();
        for key in save::ALL_KEYS {
            self.scheduler.request(key, now_ms);
        }
        self.recompute_rates(now_ms)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FailingStore, advance_tier, engine, grant, max_current_tier, with_store};
    use stellar_core::test_utils::num;

    fn welcome() -> PredicateId {
        PredicateId::new("welcome")
    }

    // -----------------------------------------------------------------------
    // Test 1: Fresh engine
    // -----------------------------------------------------------------------
    #[test]
    fn fresh_engine_starts_at_tier_one() {
        let e = engine();
        assert_eq!(e.amount(ResourceId::Energy), num(10.0));
        assert_eq!(e.rate(ResourceId::Energy), num(1.0));
        assert_eq!(e.rate(ResourceId::Quanta), Numeral::ZERO);
        assert_eq!(e.hierarchy().skills().current_tier(), 1);
        assert_eq!(e.store().writes(), 0);
    }

    // -----------------------------------------------------------------------
    // Test 2: Ledger tick and debounced saves
    // -----------------------------------------------------------------------
    #[test]
    fn ledger_tick_integrates_and_debounces() {
        let mut e = engine();
        e.ledger_tick(1.0, 0).unwrap();
        assert_eq!(e.amount(ResourceId::Energy), num(11.0));
        assert_eq!(e.store().writes(), 0);

        e.ledger_tick(0.5, 500).unwrap();
        assert_eq!(e.store().writes(), 0);

        e.ledger_tick(0.5, 1_000).unwrap();
        assert!(e.store().get(save::LEDGER_KEY).is_some());
        assert!(e.store().get(save::META_KEY).is_some());
        assert_eq!(e.store().writes(), 2);
        assert_eq!(e.progress().play_seconds, 2.0);
    }

    #[test]
    fn negative_tick_is_rejected() {
        let mut e = engine();
        assert!(e.ledger_tick(-1.0, 0).is_err());
        assert_eq!(e.amount(ResourceId::Energy), num(10.0));
    }

    // -----------------------------------------------------------------------
    // Test 3: Automation tick
    // -----------------------------------------------------------------------
    #[test]
    fn automation_tick_unlocks_once() {
        let mut e = engine();
        let first = e.automation_tick(0).unwrap();
        assert!(first.unlocked.contains(&welcome()));
        let events = e.drain_events();
        assert!(events.contains(&EngineEvent::AchievementUnlocked(welcome())));
        assert!(events.contains(&EngineEvent::HintTriggered("game_start".into())));

        let second = e.automation_tick(0).unwrap();
        assert!(second.unlocked.is_empty());
        assert!(e.drain_events().is_empty());
        assert_eq!(e.notifications().count(), first.unlocked.len().min(5));
    }

    #[test]
    fn acknowledged_hint_is_no_longer_pending() {
        let mut e = engine();
        e.automation_tick(0).unwrap();
        assert!(e.pending_hints().iter().any(|h| h.id == "game_start"));
        assert!(e.acknowledge_hint("game_start", 0));
        assert!(!e.acknowledge_hint("game_start", 0));
        assert!(e.pending_hints().iter().all(|h| h.id != "game_start"));
        assert!(e.scheduler().is_pending(save::TUTORIAL_KEY));
    }

    // -----------------------------------------------------------------------
    // Test 4: Advancing
    // -----------------------------------------------------------------------
    #[test]
    fn failed_advance_changes_nothing() {
        let mut e = engine();
        assert_eq!(e.advance(0), Err(LayerError::TierIncomplete));
        assert_eq!(e.hierarchy().skills().current_tier(), 1);
        assert_eq!(e.amount(ResourceId::Energy), num(10.0));
        assert!(e.drain_events().is_empty());
    }

    #[test]
    fn advance_emits_event_and_records_progress() {
        let mut e = engine();
        let report = advance_tier(&mut e, 1_000);
        assert_eq!(report.advance.to_tier, 2);
        assert_eq!(e.amount(ResourceId::Energy), num(10.0));
        assert!(e.drain_events().contains(&EngineEvent::TierAdvanced {
            from_tier: 1,
            to_tier: 2
        }));
        assert!(e.scheduler().is_pending(save::LEDGER_KEY));
    }

    // -----------------------------------------------------------------------
    // Test 5: Save and load
    // -----------------------------------------------------------------------
    #[test]
    fn saved_state_loads_into_a_new_engine() {
        let mut a = engine();
        advance_tier(&mut a, 1_000);
        max_current_tier(&mut a, 1_000);
        a.save_all(2_000).unwrap();

        let mut b = with_store(a.store().clone());
        let report = b.load(2_000).unwrap();
        assert_eq!(report.restored_keys.len(), save::ALL_KEYS.len());
        assert_eq!(report.skipped_ids, 0);
        assert_eq!(report.offline, None);
        assert_eq!(b.hierarchy().skills().current_tier(), 2);
        assert_eq!(
            b.hierarchy().skills().graph().levels(),
            a.hierarchy().skills().graph().levels()
        );
        assert_eq!(b.amount(ResourceId::Energy), a.amount(ResourceId::Energy));
        assert_eq!(b.rate(ResourceId::Energy), a.rate(ResourceId::Energy));
    }

    #[test]
    fn load_applies_offline_progress() {
        let mut a = engine();
        a.save_all(0).unwrap();

        let mut b = with_store(a.store().clone());
        let report = b.load(3_600_000).unwrap();
        let offline = report.offline.unwrap();
        assert_eq!(offline.seconds_applied, 3600.0);
        assert_eq!(b.amount(ResourceId::Energy), num(3610.0));
        assert_eq!(b.progress().longest_offline_seconds, 3600.0);
        assert!(matches!(
            b.drain_events().as_slice(),
            [EngineEvent::OfflineProgress(_)]
        ));
    }

    #[test]
    fn empty_store_loads_nothing() {
        let mut e = engine();
        let report = e.load(5_000).unwrap();
        assert!(report.restored_keys.is_empty());
        assert_eq!(report.offline, None);
        assert_eq!(e.amount(ResourceId::Energy), num(10.0));
    }

    #[test]
    fn corrupt_document_fails_load_without_changes() {
        let mut store = MemoryStore::new();
        store.write(save::LEDGER_KEY, "{ not json").unwrap();
        let mut e = with_store(store);
        assert!(matches!(e.load(0), Err(SaveError::Decode { .. })));
        assert_eq!(e.amount(ResourceId::Energy), num(10.0));
    }

    #[test]
    fn failed_flush_keeps_every_key_pending() {
        let mut e = with_store(FailingStore::failing_on(save::ASCENSION_KEY));
        assert!(matches!(
            e.save_all(0),
            Err(SaveError::Store {
                key: save::ASCENSION_KEY,
                ..
            })
        ));
        assert_eq!(e.scheduler().pending_count(), save::ALL_KEYS.len());

        e.store.failing = None;
        assert_eq!(e.flush(10).unwrap(), save::ALL_KEYS.len());
        assert!(e.store().inner.get(save::ASCENSION_KEY).is_some());
        assert_eq!(e.scheduler().pending_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Test 6: Export and import
    // -----------------------------------------------------------------------
    #[test]
    fn import_replaces_state_and_marks_imported() {
        let mut a = engine();
        grant(&mut a, ResourceId::Energy, 490.0);
        let text = a.export(0).unwrap();

        let mut b = engine();
        let keys = b.import(&text, 0).unwrap();
        assert_eq!(keys.len(), save::ALL_KEYS.len());
        assert_eq!(b.amount(ResourceId::Energy), num(500.0));
        assert!(b.progress().imported);
        assert!(b.store().get(save::LEDGER_KEY).is_some());

        let report = b.automation_tick(0).unwrap();
        assert!(report.unlocked.contains(&PredicateId::new("save_import")));
    }

    #[test]
    fn bad_import_changes_nothing() {
        let mut e = engine();
        grant(&mut e, ResourceId::Energy, 5.0);
        assert!(e.import("definitely not base64!", 0).is_err());
        assert!(matches!(e.import("", 0), Err(_)));
        assert_eq!(e.amount(ResourceId::Energy), num(15.0));
        assert!(!e.progress().imported);
        assert_eq!(e.store().writes(), 0);
    }

    #[test]
    fn partial_import_refreshes_skill_discounts() {
        let mut e = engine();
        assert_eq!(e.hierarchy().skills().graph().cost("t1_root"), Ok(num(10.0)));

        let mut documents = BTreeMap::new();
        documents.insert(
            save::ASCENSION_KEY,
            r#"{"levels":{"cost_reduce_10":1}}"#.to_string(),
        );
        let text = save::export_string(&documents).unwrap();
        assert_eq!(e.import(&text, 0).unwrap(), vec![save::ASCENSION_KEY]);
        assert_eq!(e.hierarchy().skills().graph().cost("t1_root"), Ok(num(9.0)));

        let mut reloaded = with_store(e.store().clone());
        reloaded.load(0).unwrap();
        assert_eq!(
            reloaded.hierarchy().skills().graph().cost("t1_root"),
            Ok(num(9.0))
        );
    }

    #[test]
    fn import_rolls_back_when_the_store_fails() {
        let mut source = engine();
        grant(&mut source, ResourceId::Energy, 490.0);
        let text = source.export(0).unwrap();

        let mut store = FailingStore::failing_on(save::TUTORIAL_KEY);
        store.inner.write(save::LEDGER_KEY, "{}").unwrap();
        let mut e = with_store(store);
        assert!(matches!(
            e.import(&text, 0),
            Err(ImportError::Document(SaveError::Store {
                key: save::TUTORIAL_KEY,
                ..
            }))
        ));
        assert_eq!(e.amount(ResourceId::Energy), num(10.0));
        assert!(!e.progress().imported);
        assert_eq!(e.store().inner.get(save::LEDGER_KEY), Some("{}"));
        assert_eq!(e.store().inner.keys().count(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 7: Full reset
    // -----------------------------------------------------------------------
    #[test]
    fn full_reset_clears_everything() {
        let mut e = engine();
        e.automation_tick(0).unwrap();
        advance_tier(&mut e, 0);
        e.full_reset(10).unwrap();
        assert_eq!(e.hierarchy().skills().current_tier(), 1);
        assert_eq!(e.hierarchy().skills().state().total_advances, 0);
        assert_eq!(e.amount(ResourceId::Energy), num(10.0));
        assert_eq!(e.predicates().unlocked_count(), 0);
        assert_eq!(e.scheduler().pending_count(), save::ALL_KEYS.len());
    }
}
