//! The prestige hierarchy: every layer above the ledger and the transitions
//! between them.
//!
//! Layers are only mutated through this type, so the cross-layer hooks
//! (skill discounts, skill caps, quantum activation) are re-synchronised at
//! every transition. The ledger is owned by the engine and lent to each call
//! that spends or resets a resource.

use std::collections::BTreeMap;

use stellar_core::Numeral;
use stellar_core::config::EconomyConfig;
use stellar_core::id::{NodeId, PredicateId, ResourceId};
use stellar_core::ledger::{OfflinePolicy, ResourceLedger};
use stellar_data::ContentPack;
use stellar_data::schema::{Capability, RewardTarget};
use stellar_tree::{Discounts, GraphError};
use tracing::{debug, info};

use crate::artifacts::{ArtifactContext, ArtifactLayer};
use crate::ascension::AscensionLayer;
use crate::dimensions::DimensionalLayer;
use crate::error::{EngineError, LayerError};
use crate::forge::{ProbabilityForge, PullResult};
use crate::modifiers::{EnergyModifiers, QuantaModifiers, RewardTotals, Stage};
use crate::quantum::QuantumLayer;
use crate::skills::{LayerState, SkillHooks, SkillLayer, TierAdvance};

/// Echo fragments for a tier-5 completion at `energy`: one below the
/// threshold, otherwise `1 + floor(log10(energy / threshold))`.
pub fn echo_reward(energy: Numeral, threshold: Numeral) -> Numeral {
    if !threshold.is_positive() || energy < threshold {
        return Numeral::ONE;
    }
    let decades = (energy / threshold).log10().floor();
    Numeral::from(1.0 + decades.max(0.0))
}

/// `floor(base)`, never below one.
fn whole_reward(base: f64) -> Numeral {
    Numeral::from(base).floor().max(Numeral::ONE)
}

/// What an advance did, including any prestige currency it minted.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceReport {
    pub advance: TierAdvance,
    pub ascension_points: Option<Numeral>,
    pub echo_fragments: Option<Numeral>,
}

/// Systems opened by the latest lifetime-Quanta report.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnlockReport {
    pub milestones: Vec<Numeral>,
    pub artifacts_opened: bool,
    pub forge_opened: bool,
}

/// Steady-state production of every resource.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rates {
    pub energy: Numeral,
    pub quanta: Numeral,
    pub fate_tokens: Numeral,
}

#[derive(Debug, Clone)]
pub struct Hierarchy {
    economy: EconomyConfig,
    forge_seed: u64,
    skills: SkillLayer,
    ascension: AscensionLayer,
    dimensions: DimensionalLayer,
    quantum: QuantumLayer,
    artifacts: ArtifactLayer,
    forge: ProbabilityForge,
    collapse_required: Vec<PredicateId>,
}

impl Hierarchy {
    pub fn new(
        content: &ContentPack,
        economy: EconomyConfig,
        forge_seed: u64,
    ) -> Result<Self, EngineError> {
        content.validate()?;
        let dimensions = DimensionalLayer::new(content.dimensions.clone())
            .map_err(|(tree, e)| EngineError::graph(tree)(e))?;
        let quantum = QuantumLayer::new(content.quantum.clone())
            .map_err(|(tree, e)| EngineError::graph(tree)(e))?;
        Ok(Self {
            economy,
            forge_seed,
            skills: SkillLayer::new(content.skills.clone()).map_err(EngineError::graph("skill"))?,
            ascension: AscensionLayer::new(content.ascension.clone())
                .map_err(EngineError::graph("ascension"))?,
            dimensions,
            quantum,
            artifacts: ArtifactLayer::new(content.artifacts.clone())
                .map_err(EngineError::graph("artifact"))?,
            forge: ProbabilityForge::new(content.forge.clone(), forge_seed)
                .map_err(EngineError::graph("fate weight"))?,
            collapse_required: content.collapse.required.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn skills(&self) -> &SkillLayer {
        &self.skills
    }

    pub fn ascension(&self) -> &AscensionLayer {
        &self.ascension
    }

    pub fn dimensions(&self) -> &DimensionalLayer {
        &self.dimensions
    }

    pub fn quantum(&self) -> &QuantumLayer {
        &self.quantum
    }

    pub fn artifacts(&self) -> &ArtifactLayer {
        &self.artifacts
    }

    pub fn forge(&self) -> &ProbabilityForge {
        &self.forge
    }

    pub fn collapse_required(&self) -> &[PredicateId] {
        &self.collapse_required
    }

    pub(crate) fn ascension_mut(&mut self) -> &mut AscensionLayer {
        &mut self.ascension
    }

    pub(crate) fn dimensions_mut(&mut self) -> &mut DimensionalLayer {
        &mut self.dimensions
    }

    pub(crate) fn quantum_mut(&mut self) -> &mut QuantumLayer {
        &mut self.quantum
    }

    pub(crate) fn artifacts_mut(&mut self) -> &mut ArtifactLayer {
        &mut self.artifacts
    }

    pub(crate) fn forge_mut(&mut self) -> &mut ProbabilityForge {
        &mut self.forge
    }

    // -----------------------------------------------------------------------
    // Cross-layer hooks
    // -----------------------------------------------------------------------

    fn skill_hooks(&self) -> SkillHooks {
        let ascension = self.ascension.bonuses();
        let dimensions = self.dimensions.bonuses();
        SkillHooks {
            discounts: Discounts {
                ascension: ascension.cost_reduction,
                dimensional: dimensions.cost_reduction,
            },
            cap_bonus: ascension.skill_cap + dimensions.skill_cap,
        }
    }

    /// Push the current ascension and dimension bonuses into the tier graph.
    pub(crate) fn sync_hooks(&mut self) {
        let hooks = self.skill_hooks();
        self.skills.apply_hooks(hooks);
    }

    /// Load skill counters and levels. Ascension and dimension state must be
    /// restored first so the tier graph gets its caps before levels land.
    pub(crate) fn restore_skills(
        &mut self,
        state: LayerState,
        levels: &BTreeMap<NodeId, u32>,
    ) -> Result<usize, GraphError> {
        let hooks = self.skill_hooks();
        self.skills.restore(state, levels, hooks)
    }

    // -----------------------------------------------------------------------
    // Skill tiers
    // -----------------------------------------------------------------------

    pub fn advance_threshold(&self) -> Numeral {
        self.skills
            .threshold(self.ascension.bonuses().threshold_reduction)
    }

    pub fn can_advance(&self, ledger: &ResourceLedger) -> bool {
        self.skills.can_advance(
            ledger.amount(ResourceId::Energy),
            self.ascension.bonuses().threshold_reduction,
        )
    }

    pub fn purchase_skill(&mut self, id: &str, ledger: &mut ResourceLedger) -> Result<u32, LayerError> {
        Ok(self
            .skills
            .graph_mut()
            .upgrade(id, &mut ledger.purse(ResourceId::Energy))?)
    }

    /// Advance the skill tier. Completing the top tier mints ascension
    /// points, and echo fragments once the ascension tree is complete.
    pub fn advance(
        &mut self,
        ledger: &mut ResourceLedger,
        rewards: &RewardTotals,
    ) -> Result<AdvanceReport, LayerError> {
        if !self.skills.graph().all_maxed() {
            return Err(LayerError::TierIncomplete);
        }
        let required = self.advance_threshold();
        let energy = ledger.amount(ResourceId::Energy);
        if energy < required {
            return Err(LayerError::BelowThreshold { required });
        }

        let bonuses = self.ascension.bonuses();
        let hooks = self.skill_hooks();
        let advance = self.skills.advance(hooks)?;

        let starting = bonuses
            .starting_energy
            .unwrap_or(self.skills.def().starting_energy);
        let kept = energy.scale(bonuses.keep_percent.clamp(0.0, 1.0));
        ledger.reset(ResourceId::Energy, starting.max(kept));

        let mut report = AdvanceReport {
            advance,
            ascension_points: None,
            echo_fragments: None,
        };
        if report.advance.completed_run {
            let stellar_core = 1.0 + self.dimensions.bonuses().stellar_core;
            let points = whole_reward(stellar_core * rewards.multiplier(RewardTarget::AscensionPoints));
            self.ascension.mint(points);
            info!(points = %points, "Ascension points earned");
            report.ascension_points = Some(points);

            if self.ascension.is_complete() {
                let echo = echo_reward(energy, self.economy.echo_base_threshold);
                let fragments =
                    whole_reward(echo.to_f64() * rewards.multiplier(RewardTarget::EchoFragments));
                self.dimensions.mint(fragments);
                info!(fragments = %fragments, energy = %energy, "Echo fragments earned");
                report.echo_fragments = Some(fragments);
            }
        }
        Ok(report)
    }

    /// One automation pass over the skill graph: repeatedly buy the cheapest
    /// affordable nodes, at most `bulk` levels per node, until nothing more
    /// can be bought. Returns the number of levels bought.
    pub fn auto_buy(&mut self, ledger: &mut ResourceLedger) -> u32 {
        let bulk = self.ascension.bonuses().bulk_amount.max(1);
        let mut bought: BTreeMap<NodeId, u32> = BTreeMap::new();
        let graph = self.skills.graph_mut();
        loop {
            let mut progressed = false;
            for (id, _) in graph.purchasable(ledger.amount(ResourceId::Energy)) {
                let so_far = bought.get(&id).copied().unwrap_or(0);
                if so_far >= bulk {
                    continue;
                }
                let n = graph.bulk_upgrade(id.as_str(), bulk - so_far, &mut ledger.purse(ResourceId::Energy));
                if n > 0 {
                    progressed = true;
                    *bought.entry(id).or_insert(0) += n;
                }
            }
            if !progressed {
                break;
            }
        }
        let total: u32 = bought.values().sum();
        if total > 0 {
            debug!(levels = total, "Auto-buy pass");
        }
        total
    }

    pub fn auto_buy_enabled(&self, rewards: &RewardTotals) -> bool {
        self.ascension.bonuses().auto_buy || rewards.grants(Capability::AutoBuy)
    }

    pub fn auto_advance_enabled(&self, rewards: &RewardTotals) -> bool {
        self.ascension.bonuses().auto_advance || rewards.grants(Capability::AutoAdvance)
    }

    // -----------------------------------------------------------------------
    // Ascension and dimensions
    // -----------------------------------------------------------------------

    pub fn purchase_ascension(&mut self, id: &str) -> Result<u32, LayerError> {
        let level = self.ascension.purchase(id)?;
        self.sync_hooks();
        info!(node = id, level, "Ascension node purchased");
        Ok(level)
    }

    pub fn unlock_dimension(&mut self, id: &str) -> Result<(), LayerError> {
        self.dimensions.unlock(id)?;
        self.sync_hooks();
        Ok(())
    }

    pub fn upgrade_dimension(&mut self, dimension: &str, node: &str) -> Result<u32, LayerError> {
        let level = self.dimensions.upgrade(dimension, node)?;
        self.sync_hooks();
        Ok(level)
    }

    /// Every gate of the collapse holds. `is_unlocked` reports achievement
    /// state.
    pub fn can_collapse(&self, is_unlocked: impl Fn(&PredicateId) -> bool) -> bool {
        self.check_collapse(is_unlocked).is_ok()
    }

    fn check_collapse(&self, is_unlocked: impl Fn(&PredicateId) -> bool) -> Result<(), LayerError> {
        if self.dimensions.has_collapsed() {
            return Err(LayerError::AlreadyCollapsed);
        }
        if !self.dimensions.all_maxed() {
            return Err(LayerError::DimensionsIncomplete);
        }
        match self.collapse_required.iter().find(|id| !is_unlocked(id)) {
            Some(missing) => Err(LayerError::MissingRequirement(missing.to_string())),
            None => Ok(()),
        }
    }

    /// The Dimensional to Quantum transition. Dimension unlocks and levels
    /// survive; echo fragments do not.
    pub fn collapse(
        &mut self,
        ledger: &mut ResourceLedger,
        is_unlocked: impl Fn(&PredicateId) -> bool,
    ) -> Result<(), LayerError> {
        self.check_collapse(is_unlocked)?;
        self.dimensions.collapse();
        self.quantum.activate();
        ledger.reset(ResourceId::Quanta, Numeral::ZERO);
        info!("Cosmic collapse: quantum layer active");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Quantum, artifacts and forge
    // -----------------------------------------------------------------------

    pub fn purchase_quantum(&mut self, node: &str, ledger: &mut ResourceLedger) -> Result<u32, LayerError> {
        self.quantum
            .purchase(node, &mut ledger.purse(ResourceId::Quanta))
    }

    pub fn purchase_artifact(&mut self, id: &str, ledger: &mut ResourceLedger) -> Result<u32, LayerError> {
        self.artifacts
            .purchase(id, &mut ledger.purse(ResourceId::Quanta))
    }

    pub fn pull(&mut self, ledger: &mut ResourceLedger) -> Result<PullResult, LayerError> {
        self.forge.pull(&mut ledger.purse(ResourceId::FateTokens))
    }

    pub fn upgrade_fate_weight(&mut self, id: &str, ledger: &mut ResourceLedger) -> Result<u32, LayerError> {
        self.forge
            .upgrade_weight(id, &mut ledger.purse(ResourceId::FateTokens))
    }

    /// Report lifetime Quanta to the milestone-gated systems.
    pub fn refresh_unlocks(&mut self, ledger: &ResourceLedger) -> UnlockReport {
        let total = ledger.total_generated(ResourceId::Quanta);
        let milestones = self.quantum.refresh_milestones(total);
        let artifacts_opened = self.artifacts.refresh(total);
        let forge_opened = self
            .forge
            .refresh(total, self.artifacts.all_branches_maxed());
        UnlockReport {
            milestones,
            artifacts_opened,
            forge_opened,
        }
    }

    // -----------------------------------------------------------------------
    // Aggregation
    // -----------------------------------------------------------------------

    pub fn energy_modifiers(&self, rewards: &RewardTotals) -> EnergyModifiers {
        let ascension = self.ascension.bonuses();
        let dimensions = self.dimensions.bonuses();
        let state = self.skills.state();

        let mut m = EnergyModifiers::new(self.economy.base_production);
        let (synergy, resonance, momentum) = self.skills.contribute(&mut m);
        m.multiplier_strength = ascension.multiplier_strength + dimensions.multiplier_power;

        let maxed = self.skills.graph().maxed_count() as f64;
        let held_points = self.ascension.points().amount().to_f64();
        let runs = state.run_counter as f64;
        let stages = [
            (Stage::RunMultiplier, state.run_multiplier),
            (
                Stage::ProductionBoost,
                Numeral::from(
                    1.0 + ascension.production_boost * rewards.multiplier(RewardTarget::AscensionBonus),
                ),
            ),
            (
                Stage::AllTime,
                Numeral::from(rewards.multiplier(RewardTarget::EnergyProduction)),
            ),
            (Stage::Synergy, Numeral::from(1.0 + synergy * maxed)),
            (Stage::CoreResonance, Numeral::from(1.0 + resonance * held_points)),
            (
                Stage::Momentum,
                Numeral::from(1.0 + (momentum + self.economy.momentum_per_run) * runs),
            ),
            (
                Stage::Dimensional,
                Numeral::from(
                    dimensions.production * rewards.multiplier(RewardTarget::DimensionBonus),
                ),
            ),
            (Stage::CrossDimension, Numeral::from(dimensions.cross_dimension)),
            (Stage::AllAspects, Numeral::from(dimensions.all_aspects)),
        ];
        for (stage, factor) in stages {
            m.set_stage(stage, factor);
        }
        m
    }

    pub fn artifact_context(&self, ledger: &ResourceLedger, session_minutes: f64) -> ArtifactContext {
        ArtifactContext {
            held_quanta: ledger.amount(ResourceId::Quanta),
            quantum_levels: self.quantum.total_levels(),
            session_minutes,
        }
    }

    /// Quanta rate inputs, or `None` before the collapse.
    pub fn quanta_modifiers(
        &self,
        ledger: &ResourceLedger,
        rewards: &RewardTotals,
        session_minutes: f64,
    ) -> Option<QuantaModifiers> {
        if !self.quantum.is_active() {
            return None;
        }
        let mut m = self.quantum.modifiers();
        let artifacts = self
            .artifacts
            .bonuses(&self.artifact_context(ledger, session_minutes));
        m.flat_percent = artifacts.flat_percent;
        m.unlock_multipliers.push(Numeral::from(artifacts.multiplier));
        m.unlock_multipliers.push(self.forge.total_multiplier());
        m.reward = rewards.multiplier(RewardTarget::QuantaProduction);
        Some(m)
    }

    pub fn rates(&self, ledger: &ResourceLedger, rewards: &RewardTotals, session_minutes: f64) -> Rates {
        Rates {
            energy: self.energy_modifiers(rewards).compile(),
            quanta: self
                .quanta_modifiers(ledger, rewards, session_minutes)
                .map_or(Numeral::ZERO, |m| m.compile()),
            fate_tokens: if self.forge.is_available() {
                self.forge.token_rate()
            } else {
                Numeral::ZERO
            },
        }
    }

    /// Offline bonuses of the layers, for the ledger's catch-up.
    pub fn offline_policy(&self, ledger: &ResourceLedger, rewards: &RewardTotals) -> OfflinePolicy {
        let reward = rewards.multiplier(RewardTarget::OfflineProduction);
        let ascension = self.ascension.bonuses();
        let idle = self
            .artifacts
            .bonuses(&self.artifact_context(ledger, 0.0))
            .idle_percent;
        OfflinePolicy::new()
            .with_multiplier(ResourceId::Energy, (1.0 + ascension.offline_bonus) * reward)
            .with_multiplier(ResourceId::Quanta, (1.0 + idle / 100.0) * reward)
            .with_cap(self.economy.offline_cap_seconds)
    }

    // -----------------------------------------------------------------------
    // Whole-hierarchy queries
    // -----------------------------------------------------------------------

    /// Every skill tier completed at least once.
    pub fn all_skill_tiers_complete(&self) -> bool {
        let state = self.skills.state();
        (1..=self.skills.def().top_tier()).all(|tier| state.completions_of(tier) > 0)
    }

    /// Skill tiers, ascension and every dimension fully owned.
    pub fn all_trees_maxed(&self) -> bool {
        self.all_skill_tiers_complete()
            && self.ascension.is_complete()
            && self.dimensions.all_maxed()
    }

    /// Back to a fresh play-through. The ledger is reset by the caller.
    pub fn full_reset(&mut self) -> Result<(), GraphError> {
        self.ascension.full_reset();
        self.dimensions.full_reset();
        self.quantum.full_reset();
        self.artifacts.full_reset();
        self.forge.full_reset(self.forge_seed);
        self.skills.full_reset()?;
        self.sync_hooks();
        info!("Progression fully reset");
        Ok(())
    }
}
