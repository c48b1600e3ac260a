//! The predicate engine: achievements and tutorial hints evaluated against a
//! read-only snapshot of the other components.
//!
//! Nothing else in the engine depends on this module. Each predicate unlocks
//! at most once and stays unlocked until a full reset.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use stellar_core::id::{PredicateId, ResourceId};
use stellar_core::ledger::ResourceLedger;
use stellar_data::schema::{AchievementDef, Condition, HintDef, Reward};
use tracing::{debug, info};

use crate::hierarchy::Hierarchy;
use crate::modifiers::RewardTotals;

/// Session accounting read by progression and speed conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub play_seconds: f64,
    pub longest_offline_seconds: f64,
    pub imported: bool,

    /// Shortest time between two consecutive advances.
    pub fastest_advance_seconds: Option<f64>,

    /// Time from session start to first reaching the top skill tier.
    pub top_tier_seconds: Option<f64>,

    #[serde(skip)]
    pub session_started_ms: Option<u64>,
    #[serde(skip)]
    pub last_advance_ms: Option<u64>,
}

impl Progress {
    /// Record an advance at `now_ms`.
    pub fn record_advance(&mut self, now_ms: u64, reached_top_tier: bool) {
        if let Some(last) = self.last_advance_ms {
            let seconds = now_ms.saturating_sub(last) as f64 / 1000.0;
            self.fastest_advance_seconds = Some(
                self.fastest_advance_seconds
                    .map_or(seconds, |best| best.min(seconds)),
            );
        }
        self.last_advance_ms = Some(now_ms);
        if reached_top_tier && self.top_tier_seconds.is_none() {
            let start = self.session_started_ms.unwrap_or(now_ms);
            self.top_tier_seconds = Some(now_ms.saturating_sub(start) as f64 / 1000.0);
        }
    }

    pub fn record_offline(&mut self, seconds: f64) {
        self.longest_offline_seconds = self.longest_offline_seconds.max(seconds);
    }
}

/// Everything a condition may read.
#[derive(Clone, Copy)]
pub struct Snapshot<'a> {
    pub hierarchy: &'a Hierarchy,
    pub ledger: &'a ResourceLedger,
    pub progress: &'a Progress,
}

/// Evaluate one condition. Conditions over layers not reached yet are false.
pub fn holds(condition: &Condition, s: &Snapshot<'_>) -> bool {
    let h = s.hierarchy;
    let skills = h.skills().state();
    let energy = s.ledger.amount(ResourceId::Energy);
    match condition {
        Condition::Always => true,
        Condition::EnergyAtLeast(n) => energy >= *n,
        Condition::EnergyRateAtLeast(n) => s.ledger.rate(ResourceId::Energy) >= *n,
        Condition::AnySkillPurchased => {
            h.skills().graph().total_levels() > 0 || skills.total_advances > 0
        }
        Condition::SkillTierComplete(tier) => skills.completions_of(*tier) > 0,
        Condition::AllSkillTiersComplete => h.all_skill_tiers_complete(),
        Condition::AdvancesAtLeast(n) => skills.total_advances >= *n,
        Condition::AscensionPointsAtLeast(n) => h.ascension().points().total_earned() >= *n,
        Condition::AscensionRowsComplete { from_row, to_row } => {
            h.ascension().rows_complete(*from_row, *to_row)
        }
        Condition::AscensionComplete => h.ascension().is_complete(),
        Condition::EchoFragmentsAtLeast(n) => h.dimensions().fragments().total_earned() >= *n,
        Condition::TranscendsAtLeast(n) => h.dimensions().transcends() >= *n,
        Condition::DimensionUnlocked(id) => h.dimensions().is_unlocked(id),
        Condition::AllDimensionsUnlocked => h.dimensions().all_unlocked(),
        Condition::PlayTimeAtLeast(seconds) => s.progress.play_seconds >= *seconds,
        Condition::EnergyWithoutAdvance(n) => skills.total_advances == 0 && energy >= *n,
        Condition::FastAdvance(limit) => s
            .progress
            .fastest_advance_seconds
            .is_some_and(|t| t < *limit),
        Condition::FastTopTier(limit) => s.progress.top_tier_seconds.is_some_and(|t| t < *limit),
        Condition::SaveImported => s.progress.imported,
        Condition::OfflineAtLeast(seconds) => s.progress.longest_offline_seconds >= *seconds,
        Condition::AllTreesMaxed => h.all_trees_maxed(),
        Condition::Collapsed => h.dimensions().has_collapsed(),
        Condition::QuantaGeneratedAtLeast(n) => {
            s.ledger.total_generated(ResourceId::Quanta) >= *n
        }
        Condition::SynergiesActive(n) => h.quantum().active_synergies().len() >= *n,
        Condition::EntanglementsActive(n) => h.quantum().entanglements() >= *n,
        Condition::QuantumTreeMaxed(id) => h.quantum().is_active() && h.quantum().tree_maxed(id),
        Condition::AllQuantumTreesMaxed => h.quantum().is_active() && h.quantum().all_maxed(),
        Condition::ArtifactsAvailable => h.artifacts().is_available(),
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Achievement {
    def: AchievementDef,
    unlocked_at: Option<u64>,
}

impl Achievement {
    pub fn def(&self) -> &AchievementDef {
        &self.def
    }

    pub fn unlocked_at(&self) -> Option<u64> {
        self.unlocked_at
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

/// A recent unlock, kept for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: PredicateId,
    pub name: String,
    pub unlocked_at: u64,
}

/// What one evaluation changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub unlocked: Vec<PredicateId>,
    pub hints: Vec<String>,

    /// An unlocked achievement carried a reward.
    pub rewards_changed: bool,
}

#[derive(Debug, Clone)]
pub struct PredicateEngine {
    achievements: Vec<Achievement>,
    index: BTreeMap<PredicateId, usize>,
    hints: Vec<HintDef>,
    triggered_hints: BTreeSet<String>,
    shown_hints: BTreeSet<String>,
    notifications: VecDeque<Notification>,
    capacity: usize,
    rewards: RewardTotals,
}

impl PredicateEngine {
    pub fn new(achievements: Vec<AchievementDef>, hints: Vec<HintDef>, capacity: usize) -> Self {
        let index = achievements
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();
        Self {
            achievements: achievements
                .into_iter()
                .map(|def| Achievement {
                    def,
                    unlocked_at: None,
                })
                .collect(),
            index,
            hints,
            triggered_hints: BTreeSet::new(),
            shown_hints: BTreeSet::new(),
            notifications: VecDeque::new(),
            capacity,
            rewards: RewardTotals::new(),
        }
    }

    pub fn achievements(&self) -> &[Achievement] {
        &self.achievements
    }

    pub fn achievement(&self, id: &str) -> Option<&Achievement> {
        self.index.get(id).map(|&i| &self.achievements[i])
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.achievement(id).is_some_and(Achievement::is_unlocked)
    }

    pub fn unlocked_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.is_unlocked()).count()
    }

    /// Most recent unlocks, oldest first.
    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter()
    }

    pub fn rewards(&self) -> &RewardTotals {
        &self.rewards
    }

    /// Evaluate every locked achievement and untriggered hint.
    pub fn evaluate(&mut self, snapshot: &Snapshot<'_>, now_ms: u64) -> Evaluation {
        let mut evaluation = Evaluation::default();
        for achievement in &mut self.achievements {
            if achievement.unlocked_at.is_some() || !holds(&achievement.def.condition, snapshot) {
                continue;
            }
            achievement.unlocked_at = Some(now_ms);
            info!(
                achievement = %achievement.def.id,
                name = %achievement.def.name,
                "Achievement unlocked"
            );
            if self.capacity > 0 {
                if self.notifications.len() >= self.capacity {
                    self.notifications.pop_front();
                }
                self.notifications.push_back(Notification {
                    id: achievement.def.id.clone(),
                    name: achievement.def.name.clone(),
                    unlocked_at: now_ms,
                });
            }
            if achievement.def.reward != Reward::None {
                self.rewards.apply(&achievement.def.reward);
                evaluation.rewards_changed = true;
            }
            evaluation.unlocked.push(achievement.def.id.clone());
        }

        for hint in &self.hints {
            if self.triggered_hints.contains(&hint.id) || !holds(&hint.trigger, snapshot) {
                continue;
            }
            debug!(hint = %hint.id, "Hint triggered");
            self.triggered_hints.insert(hint.id.clone());
            evaluation.hints.push(hint.id.clone());
        }
        evaluation
    }

    /// Triggered hints not yet acknowledged, in definition order.
    pub fn pending_hints(&self) -> Vec<&HintDef> {
        self.hints
            .iter()
            .filter(|h| self.triggered_hints.contains(&h.id) && !self.shown_hints.contains(&h.id))
            .collect()
    }

    /// Returns `false` for unknown or already acknowledged ids.
    pub fn acknowledge_hint(&mut self, id: &str) -> bool {
        if !self.hints.iter().any(|h| h.id == id) {
            return false;
        }
        self.shown_hints.insert(id.to_string())
    }

    pub fn shown_hints(&self) -> &BTreeSet<String> {
        &self.shown_hints
    }

    /// Unlock timestamps by id.
    pub fn unlocked(&self) -> BTreeMap<PredicateId, u64> {
        self.achievements
            .iter()
            .filter_map(|a| a.unlocked_at.map(|t| (a.def.id.clone(), t)))
            .collect()
    }

    /// Load saved unlocks. Unknown ids are skipped and counted. Rewards are
    /// rebuilt from the restored set; no notification is raised.
    pub fn restore(&mut self, unlocked: &BTreeMap<PredicateId, u64>, shown_hints: BTreeSet<String>) -> usize {
        for achievement in &mut self.achievements {
            achievement.unlocked_at = unlocked.get(&achievement.def.id).copied();
        }
        self.rewards = self
            .achievements
            .iter()
            .filter(|a| a.is_unlocked())
            .map(|a| &a.def.reward)
            .collect();
        self.triggered_hints = shown_hints.clone();
        self.shown_hints = shown_hints;
        self.notifications.clear();
        unlocked.keys().filter(|id| !self.index.contains_key(*id)).count()
    }

    pub fn full_reset(&mut self) {
        for achievement in &mut self.achievements {
            achievement.unlocked_at = None;
        }
        self.triggered_hints.clear();
        self.shown_hints.clear();
        self.notifications.clear();
        self.rewards = RewardTotals::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stellar_core::config::EconomyConfig;
    use stellar_core::test_utils::{funded_ledger, num};
    use stellar_data::builtin;
    use stellar_data::schema::{AchievementCategory, Capability};

    fn achievement(id: &str, condition: Condition, reward: Reward) -> AchievementDef {
        AchievementDef {
            id: PredicateId::new(id),
            name: id.to_string(),
            category: AchievementCategory::Energy,
            condition,
            reward,
        }
    }

    fn hierarchy() -> Hierarchy {
        Hierarchy::new(&builtin::content(), EconomyConfig::default(), 1).unwrap()
    }

    // -----------------------------------------------------------------------
    // Test 1: Unlock at most once
    // -----------------------------------------------------------------------
    #[test]
    fn unlocks_once_with_first_timestamp() {
        let h = hierarchy();
        let ledger = funded_ledger(500.0);
        let progress = Progress::default();
        let snapshot = Snapshot { hierarchy: &h, ledger: &ledger, progress: &progress };
        let mut engine = PredicateEngine::new(
            vec![achievement("energy_100", Condition::EnergyAtLeast(num(100.0)), Reward::None)],
            vec![],
            5,
        );

        let first = engine.evaluate(&snapshot, 1_000);
        assert_eq!(first.unlocked, vec![PredicateId::new("energy_100")]);
        assert!(!first.rewards_changed);
        let second = engine.evaluate(&snapshot, 2_000);
        assert!(second.unlocked.is_empty());
        assert_eq!(engine.achievement("energy_100").unwrap().unlocked_at(), Some(1_000));
        assert_eq!(engine.notifications().count(), 1);
    }

    #[test]
    fn unmet_layer_conditions_are_false() {
        let h = hierarchy();
        let ledger = ResourceLedger::new();
        let progress = Progress::default();
        let s = Snapshot { hierarchy: &h, ledger: &ledger, progress: &progress };
        for condition in [
            Condition::Collapsed,
            Condition::QuantumTreeMaxed("matter".into()),
            Condition::AllQuantumTreesMaxed,
            Condition::DimensionUnlocked("nowhere".into()),
            Condition::FastAdvance(1e9),
            Condition::ArtifactsAvailable,
            Condition::AscensionComplete,
        ] {
            assert!(!holds(&condition, &s), "{condition:?}");
        }
        assert!(holds(&Condition::Always, &s));
    }

    // -----------------------------------------------------------------------
    // Test 2: Notification cap
    // -----------------------------------------------------------------------
    #[test]
    fn keeps_five_most_recent_notifications() {
        let h = hierarchy();
        let ledger = ResourceLedger::new();
        let progress = Progress::default();
        let snapshot = Snapshot { hierarchy: &h, ledger: &ledger, progress: &progress };
        let defs = (0..7)
            .map(|i| achievement(&format!("a{i}"), Condition::Always, Reward::None))
            .collect();
        let mut engine = PredicateEngine::new(defs, vec![], 5);
        engine.evaluate(&snapshot, 10);
        let ids: Vec<_> = engine.notifications().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a3", "a4", "a5", "a6"]);
        assert_eq!(engine.unlocked_count(), 7);
    }

    // -----------------------------------------------------------------------
    // Test 3: Rewards
    // -----------------------------------------------------------------------
    #[test]
    fn rewards_apply_on_unlock_and_restore() {
        let h = hierarchy();
        let ledger = ResourceLedger::new();
        let progress = Progress::default();
        let snapshot = Snapshot { hierarchy: &h, ledger: &ledger, progress: &progress };
        let defs = vec![achievement(
            "auto",
            Condition::Always,
            Reward::Automation(Capability::AutoBuy),
        )];
        let mut engine = PredicateEngine::new(defs.clone(), vec![], 5);
        assert!(engine.evaluate(&snapshot, 0).rewards_changed);
        assert!(engine.rewards().grants(Capability::AutoBuy));

        let mut reloaded = PredicateEngine::new(defs, vec![], 5);
        let skipped = reloaded.restore(
            &BTreeMap::from([(PredicateId::new("auto"), 0), (PredicateId::new("gone"), 3)]),
            BTreeSet::new(),
        );
        assert_eq!(skipped, 1);
        assert!(reloaded.rewards().grants(Capability::AutoBuy));
        assert_eq!(reloaded.notifications().count(), 0);
    }

    // -----------------------------------------------------------------------
    // Test 4: Hints
    // -----------------------------------------------------------------------
    #[test]
    fn hints_pend_until_acknowledged() {
        let h = hierarchy();
        let ledger = ResourceLedger::new();
        let progress = Progress::default();
        let snapshot = Snapshot { hierarchy: &h, ledger: &ledger, progress: &progress };
        let mut engine = PredicateEngine::new(vec![], builtin::hints(), 5);
        let evaluation = engine.evaluate(&snapshot, 0);
        assert_eq!(evaluation.hints, vec!["game_start".to_string()]);
        assert_eq!(engine.pending_hints().len(), 1);
        assert!(engine.acknowledge_hint("game_start"));
        assert!(!engine.acknowledge_hint("game_start"));
        assert!(!engine.acknowledge_hint("unknown"));
        assert!(engine.pending_hints().is_empty());
        assert!(engine.evaluate(&snapshot, 1).hints.is_empty());
    }

    // -----------------------------------------------------------------------
    // Test 5: Progress accounting
    // -----------------------------------------------------------------------
    #[test]
    fn fastest_advance_tracks_minimum_gap() {
        let mut progress = Progress {
            session_started_ms: Some(0),
            ..Progress::default()
        };
        progress.record_advance(10_000, false);
        assert_eq!(progress.fastest_advance_seconds, None);
        progress.record_advance(40_000, false);
        progress.record_advance(45_000, true);
        progress.record_advance(95_000, true);
        assert_eq!(progress.fastest_advance_seconds, Some(5.0));
        assert_eq!(progress.top_tier_seconds, Some(45.0));
    }
}
