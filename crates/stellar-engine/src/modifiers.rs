//! The production-rate compiler.
//!
//! Each layer contributes raw inputs (flat sources, multiplier sources and
//! one factor per bonus [`Stage`]); [`EnergyModifiers::compile`] and
//! [`QuantaModifiers::compile`] fold them in a fixed order. Both are pure:
//! recompiling the same inputs always yields the same rate.
//!
//! # Energy composition
//!
//! 1. `base + sum(per_level * level)` over production sources.
//! 2. Times the product of `boosted(factor)^level` over multiplier sources,
//!    where `boosted(m) = 1 + (m - 1) * (1 + strength)`.
//! 3. Times each stage factor in [`Stage::ORDER`].

use std::collections::{BTreeMap, BTreeSet};

use stellar_core::Numeral;
use stellar_data::schema::{Capability, Reward, RewardTarget};

/// Flat production: `per_level` for each owned level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatSource {
    pub per_level: f64,
    pub level: u32,
}

/// Compounding factor applied once per owned level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplierSource {
    pub factor: f64,
    pub level: u32,
}

/// `m` strengthened by a fractional boost: `1 + (m - 1) * (1 + boost)`.
pub fn boosted(factor: f64, boost: f64) -> f64 {
    1.0 + (factor - 1.0) * (1.0 + boost)
}

/// Cross-cutting bonuses, folded in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Product of tier bonuses earned this run.
    RunMultiplier,
    /// Ascension production boost.
    ProductionBoost,
    /// Global all-time bonus from achievements.
    AllTime,
    /// Per maxed skill node.
    Synergy,
    /// Per held ascension point.
    CoreResonance,
    /// Per advance this run.
    Momentum,
    /// Dimension production nodes.
    Dimensional,
    /// Cross-dimension synergy nodes.
    CrossDimension,
    /// Balanced bonus over every aspect.
    AllAspects,
}

impl Stage {
    pub const ORDER: [Stage; 9] = [
        Stage::RunMultiplier,
        Stage::ProductionBoost,
        Stage::AllTime,
        Stage::Synergy,
        Stage::CoreResonance,
        Stage::Momentum,
        Stage::Dimensional,
        Stage::CrossDimension,
        Stage::AllAspects,
    ];
}

// ---------------------------------------------------------------------------
// Energy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnergyModifiers {
    pub base: Numeral,
    pub flat: Vec<FlatSource>,
    pub multipliers: Vec<MultiplierSource>,

    /// Strength boost applied to every multiplier source.
    pub multiplier_strength: f64,

    /// Stage factors; a missing stage is a factor of one.
    pub stages: BTreeMap<Stage, Numeral>,
}

impl EnergyModifiers {
    pub fn new(base: Numeral) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    pub fn set_stage(&mut self, stage: Stage, factor: Numeral) {
        self.stages.insert(stage, factor);
    }

    pub fn stage(&self, stage: Stage) -> Numeral {
        self.stages.get(&stage).copied().unwrap_or(Numeral::ONE)
    }

    /// Steps 1 and 2: flat sum times compounded multipliers.
    pub fn node_rate(&self) -> Numeral {
        let flat: Numeral = self
            .flat
            .iter()
            .map(|s| Numeral::from(s.per_level * f64::from(s.level)))
            .sum();
        let multiplier: Numeral = self
            .multipliers
            .iter()
            .map(|s| {
                Numeral::from(boosted(s.factor, self.multiplier_strength)).pow(f64::from(s.level))
            })
            .product();
        (self.base + flat) * multiplier
    }

    /// The full rate.
    pub fn compile(&self) -> Numeral {
        self.breakdown()
            .last()
            .map_or_else(|| self.node_rate(), |(_, rate)| *rate)
    }

    /// Running rate after each stage, in order.
    pub fn breakdown(&self) -> Vec<(Stage, Numeral)> {
        let mut rate = self.node_rate();
        Stage::ORDER
            .iter()
            .map(|&stage| {
                rate = rate * self.stage(stage);
                (stage, rate)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Quanta
// ---------------------------------------------------------------------------

/// Inputs of the Quanta rate:
/// `(base + sum(flat * level) * (1 + flat_percent / 100) + synergy_flat)
///  * product((1 + m)^level) * product(synergies) * product(unlocks) * reward`.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantaModifiers {
    pub base: Numeral,
    pub flat: Vec<FlatSource>,

    /// Percent bonus on node flat production (artifacts).
    pub flat_percent: f64,
    pub synergy_flat: f64,

    /// Factor per level is `1 + factor`.
    pub multipliers: Vec<MultiplierSource>,
    pub synergy_multipliers: Vec<f64>,

    /// One-shot unlock multipliers (artifacts, forge).
    pub unlock_multipliers: Vec<Numeral>,

    /// Achievement reward multiplier.
    pub reward: f64,
}

impl QuantaModifiers {
    pub fn new(base: Numeral) -> Self {
        Self {
            base,
            flat: Vec::new(),
            flat_percent: 0.0,
            synergy_flat: 0.0,
            multipliers: Vec::new(),
            synergy_multipliers: Vec::new(),
            unlock_multipliers: Vec::new(),
            reward: 1.0,
        }
    }

    pub fn compile(&self) -> Numeral {
        let node_flat: f64 = self
            .flat
            .iter()
            .map(|s| s.per_level * f64::from(s.level))
            .sum();
        let flat = self.base
            + Numeral::from(node_flat * (1.0 + self.flat_percent / 100.0))
            + Numeral::from(self.synergy_flat);
        let nodes: Numeral = self
            .multipliers
            .iter()
            .map(|s| Numeral::from(1.0 + s.factor).pow(f64::from(s.level)))
            .product();
        let synergies: Numeral = self.synergy_multipliers.iter().map(|&m| Numeral::from(m)).product();
        let unlocks: Numeral = self.unlock_multipliers.iter().copied().product();
        (flat * nodes * synergies * unlocks).scale(self.reward)
    }
}

// ---------------------------------------------------------------------------
// Rewards
// ---------------------------------------------------------------------------

/// Achievement rewards folded into aggregator inputs. Multipliers of the same
/// target compound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardTotals {
    multipliers: BTreeMap<RewardTarget, f64>,
    capabilities: BTreeSet<Capability>,
}

impl RewardTotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, reward: &Reward) {
        match *reward {
            Reward::None => {}
            Reward::Multiplier { target, value } => {
                *self.multipliers.entry(target).or_insert(1.0) *= value
            }
            Reward::Automation(capability) => {
                self.capabilities.insert(capability);
            }
        }
    }

    /// Product of every reward aimed at `target`; one when there is none.
    pub fn multiplier(&self, target: RewardTarget) -> f64 {
        self.multipliers.get(&target).copied().unwrap_or(1.0)
    }

    pub fn grants(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

impl<'a> FromIterator<&'a Reward> for RewardTotals {
    fn from_iter<I: IntoIterator<Item = &'a Reward>>(iter: I) -> Self {
        let mut totals = Self::new();
        for reward in iter {
            totals.apply(reward);
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stellar_core::test_utils::{approx_eq, num};

    // -----------------------------------------------------------------------
    // Test 1: Flat then multiplicative
    // -----------------------------------------------------------------------
    #[test]
    fn flat_then_multiplier_golden() {
        let mut m = EnergyModifiers::new(Numeral::ONE);
        m.flat.push(FlatSource { per_level: 10.0, level: 2 });
        m.multipliers.push(MultiplierSource { factor: 1.2, level: 3 });
        assert!(approx_eq(m.compile(), num(21.0 * 1.728), 1e-12));
    }

    #[test]
    fn multipliers_compound_geometrically() {
        let mut m = EnergyModifiers::new(num(10.0));
        m.multipliers.push(MultiplierSource { factor: 2.0, level: 2 });
        m.multipliers.push(MultiplierSource { factor: 3.0, level: 1 });
        assert_eq!(m.compile(), num(120.0));
    }

    #[test]
    fn strength_boost_applies_before_level_power() {
        let mut m = EnergyModifiers::new(Numeral::ONE);
        m.multipliers.push(MultiplierSource { factor: 2.0, level: 2 });
        m.multiplier_strength = 0.5;
        // (1 + 1 * 1.5)^2
        assert!(approx_eq(m.compile(), num(6.25), 1e-12));
    }

    #[test]
    fn unleveled_sources_are_neutral() {
        let mut m = EnergyModifiers::new(num(3.0));
        m.flat.push(FlatSource { per_level: 50.0, level: 0 });
        m.multipliers.push(MultiplierSource { factor: 9.0, level: 0 });
        assert_eq!(m.compile(), num(3.0));
    }

    // -----------------------------------------------------------------------
    // Test 2: Stage order
    // -----------------------------------------------------------------------
    #[test]
    fn stages_fold_in_documented_order() {
        let mut m = EnergyModifiers::new(num(100.0));
        m.set_stage(Stage::AllAspects, num(1.4));
        m.set_stage(Stage::RunMultiplier, num(8.0));
        m.set_stage(Stage::Dimensional, num(1.5));
        m.set_stage(Stage::ProductionBoost, num(1.25));

        let steps = m.breakdown();
        let order: Vec<Stage> = steps.iter().map(|(s, _)| *s).collect();
        assert_eq!(order, Stage::ORDER.to_vec());
        assert_eq!(steps[0].1, num(800.0));
        assert_eq!(steps[1].1, num(1000.0));
        assert_eq!(steps[6].1, num(1500.0));
        assert!(approx_eq(m.compile(), num(2100.0), 1e-12));
    }

    #[test]
    fn full_pipeline_golden() {
        let mut m = EnergyModifiers::new(Numeral::ONE);
        m.flat.push(FlatSource { per_level: 10.0, level: 10 });
        m.flat.push(FlatSource { per_level: 50.0, level: 4 });
        m.multipliers.push(MultiplierSource { factor: 2.0, level: 5 });
        m.multiplier_strength = 0.2;
        for (stage, factor) in [
            (Stage::RunMultiplier, 2.0),
            (Stage::ProductionBoost, 1.75),
            (Stage::AllTime, 1.05),
            (Stage::Synergy, 1.1),
            (Stage::CoreResonance, 1.02),
            (Stage::Momentum, 1.0),
            (Stage::Dimensional, 1.21),
            (Stage::CrossDimension, 1.06),
            (Stage::AllAspects, 1.05),
        ] {
            m.set_stage(stage, num(factor));
        }
        let expected = 301.0
            * 2.2f64.powi(5)
            * 2.0
            * 1.75
            * 1.05
            * 1.1
            * 1.02
            * 1.21
            * 1.06
            * 1.05;
        assert!(approx_eq(m.compile(), num(expected), 1e-9));
    }

    #[test]
    fn stages_reach_past_f64_range() {
        let mut m = EnergyModifiers::new(num(1e150));
        m.set_stage(Stage::RunMultiplier, num(1e100));
        m.set_stage(Stage::Dimensional, num(1e100));
        let rate = m.compile();
        assert_eq!(rate.exponent(), 350);
    }

    // -----------------------------------------------------------------------
    // Test 3: Quanta
    // -----------------------------------------------------------------------
    #[test]
    fn quanta_golden() {
        let mut q = QuantaModifiers::new(Numeral::ONE);
        q.flat.push(FlatSource { per_level: 5.0, level: 2 });
        q.flat_percent = 50.0;
        q.synergy_flat = 100.0;
        q.multipliers.push(MultiplierSource { factor: 0.5, level: 2 });
        q.synergy_multipliers.push(1.5);
        q.unlock_multipliers.push(num(2.0));
        q.reward = 2.0;
        // (1 + 10 * 1.5 + 100) * 2.25 * 1.5 * 2 * 2
        assert!(approx_eq(q.compile(), num(116.0 * 2.25 * 6.0), 1e-12));
    }

    #[test]
    fn quanta_base_only() {
        assert_eq!(QuantaModifiers::new(Numeral::ONE).compile(), Numeral::ONE);
    }

    // -----------------------------------------------------------------------
    // Test 4: Reward folding
    // -----------------------------------------------------------------------
    #[test]
    fn rewards_compound_per_target() {
        let rewards = [
            Reward::Multiplier { target: RewardTarget::EnergyProduction, value: 1.05 },
            Reward::None,
            Reward::Multiplier { target: RewardTarget::EnergyProduction, value: 1.25 },
            Reward::Automation(Capability::AutoBuy),
        ];
        let totals: RewardTotals = rewards.iter().collect();
        assert!((totals.multiplier(RewardTarget::EnergyProduction) - 1.3125).abs() < 1e-12);
        assert_eq!(totals.multiplier(RewardTarget::QuantaProduction), 1.0);
        assert!(totals.grants(Capability::AutoBuy));
        assert!(!totals.grants(Capability::AutoAdvance));
    }
}
