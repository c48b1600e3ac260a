//! The skill tiers: the Energy economy and its five cumulative sub-tiers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stellar_core::Numeral;
use stellar_core::id::NodeId;
use stellar_data::schema::{SkillEffect, SkillTreeDef};
use stellar_tree::{Discounts, GraphError, PrerequisiteGraph, UnlockRule};
use tracing::debug;

use crate::modifiers::{EnergyModifiers, FlatSource, MultiplierSource};

/// Counters of the skill layer. Only the hierarchy writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerState {
    pub current_tier: u8,

    /// Advances since the last top-tier completion.
    pub run_counter: u64,

    /// Top-tier completions.
    pub all_time_counter: u64,

    /// Every advance ever made.
    pub total_advances: u64,

    /// Product of tier bonuses earned this run.
    pub run_multiplier: Numeral,

    /// Advances out of each tier.
    pub completions: BTreeMap<u8, u64>,
}

impl Default for LayerState {
    fn default() -> Self {
        Self {
            current_tier: 1,
            run_counter: 0,
            all_time_counter: 0,
            total_advances: 0,
            run_multiplier: Numeral::ONE,
            completions: BTreeMap::new(),
        }
    }
}

impl LayerState {
    pub fn completions_of(&self, tier: u8) -> u64 {
        self.completions.get(&tier).copied().unwrap_or(0)
    }
}

/// Higher-layer settings every rebuilt tier graph receives before any level
/// is loaded into it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SkillHooks {
    pub discounts: Discounts,
    pub cap_bonus: u32,
}

/// What a tier advance did.
#[derive(Debug, Clone, PartialEq)]
pub struct TierAdvance {
    pub from_tier: u8,
    pub to_tier: u8,

    /// The top tier was completed and the run restarted.
    pub completed_run: bool,
}

#[derive(Debug, Clone)]
pub struct SkillLayer {
    def: SkillTreeDef,
    graph: PrerequisiteGraph<SkillEffect>,
    state: LayerState,
}

impl SkillLayer {
    pub fn new(def: SkillTreeDef) -> Result<Self, GraphError> {
        // Build every tier once so a bad definition fails here.
        for tier in 1..=def.top_tier() {
            PrerequisiteGraph::new(UnlockRule::PrerequisitesMaxed, def.nodes_for(tier))?;
        }
        let graph = PrerequisiteGraph::new(UnlockRule::PrerequisitesMaxed, def.nodes_for(1))?;
        Ok(Self {
            def,
            graph,
            state: LayerState::default(),
        })
    }

    pub fn def(&self) -> &SkillTreeDef {
        &self.def
    }

    pub fn graph(&self) -> &PrerequisiteGraph<SkillEffect> {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut PrerequisiteGraph<SkillEffect> {
        &mut self.graph
    }

    pub fn state(&self) -> &LayerState {
        &self.state
    }

    pub(crate) fn apply_hooks(&mut self, hooks: SkillHooks) {
        self.graph.set_discounts(hooks.discounts);
        self.graph.set_max_level_bonus(hooks.cap_bonus);
    }

    pub fn current_tier(&self) -> u8 {
        self.state.current_tier
    }

    pub fn is_top_tier(&self) -> bool {
        self.state.current_tier >= self.def.top_tier()
    }

    /// Energy needed to advance, after the threshold discount.
    pub fn threshold(&self, reduction: f64) -> Numeral {
        let required = self
            .def
            .tier(self.state.current_tier)
            .map_or(Numeral::ZERO, |t| t.required_energy);
        required.scale(1.0 - reduction.clamp(0.0, 0.99))
    }

    pub fn can_advance(&self, energy: Numeral, reduction: f64) -> bool {
        self.graph.all_maxed() && energy >= self.threshold(reduction)
    }

    /// Move to the next tier, or restart the run from tier 1 after the top
    /// tier. Levels reset.
    pub(crate) fn advance(&mut self, hooks: SkillHooks) -> Result<TierAdvance, GraphError> {
        let from_tier = self.state.current_tier;
        let completed_run = self.is_top_tier();
        let to_tier = if completed_run { 1 } else { from_tier + 1 };
        let graph = PrerequisiteGraph::new(UnlockRule::PrerequisitesMaxed, self.def.nodes_for(to_tier))?;

        let bonus = self.def.tier(from_tier).map_or(1.0, |t| t.bonus);
        let state = &mut self.state;
        *state.completions.entry(from_tier).or_insert(0) += 1;
        state.total_advances += 1;
        if completed_run {
            state.run_multiplier = Numeral::ONE;
            state.run_counter = 0;
            state.all_time_counter += 1;
        } else {
            state.run_multiplier = state.run_multiplier.scale(bonus);
            state.run_counter += 1;
        }
        state.current_tier = to_tier;
        self.graph = graph;
        self.apply_hooks(hooks);
        debug!(from_tier, to_tier, completed_run, "Skill tier advanced");
        Ok(TierAdvance {
            from_tier,
            to_tier,
            completed_run,
        })
    }

    /// Load persisted counters and levels. The tier graph is rebuilt for the
    /// saved tier. Returns the number of unknown node ids skipped.
    pub(crate) fn restore(
        &mut self,
        state: LayerState,
        levels: &BTreeMap<NodeId, u32>,
        hooks: SkillHooks,
    ) -> Result<usize, GraphError> {
        let tier = state.current_tier.clamp(1, self.def.top_tier().max(1));
        self.graph = PrerequisiteGraph::new(UnlockRule::PrerequisitesMaxed, self.def.nodes_for(tier))?;
        self.apply_hooks(hooks);
        self.state = LayerState {
            current_tier: tier,
            ..state
        };
        Ok(self.graph.restore_levels(levels))
    }

    pub(crate) fn full_reset(&mut self) -> Result<(), GraphError> {
        self.graph = PrerequisiteGraph::new(UnlockRule::PrerequisitesMaxed, self.def.nodes_for(1))?;
        self.state = LayerState::default();
        Ok(())
    }

    /// Steps 1 and 2 inputs, plus the per-level synergy fractions
    /// `(synergy, core_resonance, momentum)`.
    pub fn contribute(&self, modifiers: &mut EnergyModifiers) -> (f64, f64, f64) {
        let (mut synergy, mut resonance, mut momentum) = (0.0, 0.0, 0.0);
        for node in self.graph.nodes() {
            let level = node.level();
            if level == 0 {
                continue;
            }
            match *node.effect() {
                SkillEffect::Production(per_level) => {
                    modifiers.flat.push(FlatSource { per_level, level })
                }
                SkillEffect::Multiplier(factor) => {
                    modifiers.multipliers.push(MultiplierSource { factor, level })
                }
                SkillEffect::Synergy(v) => synergy += v * f64::from(level),
                SkillEffect::CoreResonance(v) => resonance += v * f64::from(level),
                SkillEffect::Momentum(v) => momentum += v * f64::from(level),
            }
        }
        (synergy, resonance, momentum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stellar_core::ledger::CurrencyPool;
    use stellar_core::test_utils::num;
    use stellar_data::builtin;

    fn max_tier(layer: &mut SkillLayer) {
        let mut wallet = CurrencyPool::new();
        wallet.mint(num(1e30));
        loop {
            let buyable = layer.graph.purchasable(wallet.amount());
            if buyable.is_empty() {
                break;
            }
            for (id, _) in buyable {
                layer.graph.bulk_upgrade(id.as_str(), u32::MAX, &mut wallet);
            }
        }
        assert!(layer.graph.all_maxed());
    }

    // -----------------------------------------------------------------------
    // Test 1: Tier thresholds and eligibility
    // -----------------------------------------------------------------------
    #[test]
    fn threshold_discount() {
        let layer = SkillLayer::new(builtin::skills()).unwrap();
        assert_eq!(layer.threshold(0.0), num(1e5));
        assert_eq!(layer.threshold(0.4), num(6e4));
    }

    #[test]
    fn advance_needs_maxed_tier() {
        let layer = SkillLayer::new(builtin::skills()).unwrap();
        assert!(!layer.can_advance(num(1e30), 0.0));
    }

    // -----------------------------------------------------------------------
    // Test 2: Advancing reseeds cumulatively
    // -----------------------------------------------------------------------
    #[test]
    fn advance_reseeds_next_tier() {
        let mut layer = SkillLayer::new(builtin::skills()).unwrap();
        max_tier(&mut layer);
        assert!(layer.can_advance(num(1e5), 0.0));
        let advance = layer.advance(SkillHooks::default()).unwrap();
        assert_eq!(advance.to_tier, 2);
        assert!(!advance.completed_run);
        assert_eq!(layer.graph.len(), 6);
        assert_eq!(layer.graph.total_levels(), 0);
        assert_eq!(layer.state.run_multiplier, num(2.0));
        assert_eq!(layer.state.run_counter, 1);
        assert_eq!(layer.state.completions_of(1), 1);
    }

    #[test]
    fn top_tier_resets_run_multiplier() {
        let mut layer = SkillLayer::new(builtin::skills()).unwrap();
        for expected in [2.0, 8.0, 64.0, 1024.0] {
            max_tier(&mut layer);
            layer.advance(SkillHooks::default()).unwrap();
            assert_eq!(layer.state.run_multiplier, num(expected));
        }
        assert_eq!(layer.current_tier(), 5);
        max_tier(&mut layer);
        let advance = layer.advance(SkillHooks::default()).unwrap();
        assert!(advance.completed_run);
        assert_eq!(layer.current_tier(), 1);
        assert_eq!(layer.state.run_multiplier, Numeral::ONE);
        assert_eq!(layer.state.run_counter, 0);
        assert_eq!(layer.state.all_time_counter, 1);
        assert_eq!(layer.state.total_advances, 5);
        assert_eq!(layer.state.completions_of(5), 1);
    }

    // -----------------------------------------------------------------------
    // Test 3: Contributions
    // -----------------------------------------------------------------------
    #[test]
    fn contributions_follow_levels() {
        let mut layer = SkillLayer::new(builtin::skills()).unwrap();
        let mut wallet = CurrencyPool::new();
        wallet.mint(num(1e6));
        layer.graph.bulk_upgrade("t1_root", 2, &mut wallet);
        let mut modifiers = EnergyModifiers::new(Numeral::ONE);
        layer.contribute(&mut modifiers);
        assert_eq!(modifiers.flat, vec![FlatSource { per_level: 10.0, level: 2 }]);
        assert!(modifiers.multipliers.is_empty());
        assert_eq!(modifiers.compile(), num(21.0));
    }

    #[test]
    fn restore_rebuilds_saved_tier() {
        let mut layer = SkillLayer::new(builtin::skills()).unwrap();
        let state = LayerState {
            current_tier: 3,
            run_counter: 2,
            ..LayerState::default()
        };
        let mut levels = BTreeMap::new();
        levels.insert("t3_amplifier_c".into(), 4);
        levels.insert("gone".into(), 1);
        assert_eq!(layer.restore(state, &levels, SkillHooks::default()).unwrap(), 1);
        assert_eq!(layer.graph.len(), 9);
        assert_eq!(layer.graph.level("t3_amplifier_c"), 4);
    }

    #[test]
    fn restore_keeps_levels_above_base_cap() {
        let mut layer = SkillLayer::new(builtin::skills()).unwrap();
        let levels = BTreeMap::from([("t1_root".into(), 13)]);
        let hooks = SkillHooks {
            cap_bonus: 3,
            ..SkillHooks::default()
        };
        layer.restore(LayerState::default(), &levels, hooks).unwrap();
        assert_eq!(layer.graph.level("t1_root"), 13);
        assert!(layer.graph.is_maxed("t1_root"));
    }
}
