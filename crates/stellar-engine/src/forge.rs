//! The probability forge: pulls paid in Fate Tokens, seeded for replay.
//!
//! # Pull algorithm
//!
//! 1. If an owned pity timer has run out, its rarity is forced (the highest
//!    such rarity wins).
//! 2. Otherwise roll `uniform * 100` against the rarity weights renormalised
//!    to 100, walking them in [`Rarity::ALL`] order. Owned rerolls roll again
//!    while the result is Common and keep the best.
//! 3. Pick uniformly within the rarity. With duplicate protection, a pick that
//!    is already discovered is redirected to an undiscovered outcome of the
//!    same rarity with the protection's chance.
//! 4. A new discovery multiplies the forge total by its multiplier, raised by
//!    the streak bonus on rare-or-better pulls.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use stellar_core::Numeral;
use stellar_core::id::{NodeId, OutcomeId};
use stellar_core::ledger::Purse;
use stellar_core::rng::SeededRng;
use stellar_data::schema::{FateEffect, ForgeDef, Outcome, Rarity};
use stellar_tree::{GraphError, PrerequisiteGraph, UnlockRule};
use tracing::info;

use crate::error::LayerError;

/// Mutable forge counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeState {
    pub available: bool,
    pub total_pulls: u64,
    pub discovered: BTreeSet<OutcomeId>,
    pub obtained: BTreeMap<OutcomeId, u64>,
    pub rarity_counts: BTreeMap<Rarity, u64>,
    pub streak: u32,
    pub best_streak: u32,

    /// Pulls since the last pull of at least each rarity.
    pub pulls_since: BTreeMap<Rarity, u32>,

    /// Product of every discovery's final multiplier.
    pub total_multiplier: Numeral,
}

impl Default for ForgeState {
    fn default() -> Self {
        Self {
            available: false,
            total_pulls: 0,
            discovered: BTreeSet::new(),
            obtained: BTreeMap::new(),
            rarity_counts: BTreeMap::new(),
            streak: 0,
            best_streak: 0,
            pulls_since: BTreeMap::new(),
            total_multiplier: Numeral::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullResult {
    pub outcome: Outcome,
    pub is_new: bool,

    /// A pity timer decided the rarity.
    pub forced: bool,

    /// Percent added by the streak.
    pub streak_bonus: f64,
    pub final_multiplier: f64,
}

/// Owned fate-weight effects, folded.
#[derive(Debug, Clone, Default, PartialEq)]
struct FateBonuses {
    shifts: BTreeMap<Rarity, f64>,
    rerolls: u32,
    pity: Vec<(Rarity, u32)>,
    duplicate_protection: Option<f64>,
    streak_percent: f64,
    per_mythic: Option<f64>,
}

/// Walk cumulative weights; `point` is in `[0, total)`.
fn walk(weights: &[(Rarity, f64)], point: f64) -> Rarity {
    let mut cumulative = 0.0;
    for &(rarity, weight) in weights {
        cumulative += weight;
        if point < cumulative {
            return rarity;
        }
    }
    Rarity::Common
}

#[derive(Debug, Clone)]
pub struct ProbabilityForge {
    def: ForgeDef,
    outcomes: Vec<Outcome>,
    weights: PrerequisiteGraph<FateEffect>,
    state: ForgeState,
    rng: SeededRng,
}

impl ProbabilityForge {
    pub fn new(def: ForgeDef, seed: u64) -> Result<Self, GraphError> {
        let weights = PrerequisiteGraph::new(UnlockRule::PrerequisitesMaxed, def.weights.clone())?;
        Ok(Self {
            outcomes: def.outcomes(),
            def,
            weights,
            state: ForgeState::default(),
            rng: SeededRng::new(seed),
        })
    }

    pub fn state(&self) -> &ForgeState {
        &self.state
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn weights(&self) -> &PrerequisiteGraph<FateEffect> {
        &self.weights
    }

    pub fn rng_state(&self) -> u64 {
        self.rng.state()
    }

    pub fn is_available(&self) -> bool {
        self.state.available
    }

    pub fn discovered_count(&self) -> usize {
        self.state.discovered.len()
    }

    pub fn total_multiplier(&self) -> Numeral {
        self.state.total_multiplier
    }

    /// Fate Tokens per second.
    pub fn token_rate(&self) -> Numeral {
        let bonus = 1.0 + self.def.token_bonus_per_discovery * self.discovered_count() as f64;
        Numeral::from(self.def.token_rate * bonus)
    }

    /// `ceil(base * growth^discovered)` Fate Tokens.
    pub fn pull_cost(&self) -> Numeral {
        let growth = Numeral::from(self.def.pull_cost_growth).pow(self.discovered_count() as f64);
        (Numeral::from(self.def.pull_base_cost) * growth).ceil()
    }

    /// Open the forge once lifetime Quanta and the artifact branches allow
    /// it. Returns `true` when this call opened it.
    pub(crate) fn refresh(&mut self, total_quanta: Numeral, artifacts_maxed: bool) -> bool {
        if self.state.available || !artifacts_maxed || total_quanta < self.def.unlock_total_quanta {
            return false;
        }
        self.state.available = true;
        info!(total_quanta = %total_quanta, "Probability forge available");
        true
    }

    fn fate_bonuses(&self) -> FateBonuses {
        let mut b = FateBonuses::default();
        for node in self.weights.nodes().filter(|n| n.level() > 0) {
            let level = node.level();
            match *node.effect() {
                FateEffect::RarityShift { rarity, per_level } => {
                    *b.shifts.entry(rarity).or_insert(0.0) += per_level * f64::from(level)
                }
                FateEffect::Reroll(n) => b.rerolls += n,
                FateEffect::Pity { rarity, threshold } => b.pity.push((rarity, threshold)),
                FateEffect::DuplicateProtection { chance } => {
                    b.duplicate_protection = Some(b.duplicate_protection.map_or(chance, |c| c.max(chance)))
                }
                FateEffect::StreakBonus { percent_per_level } => {
                    b.streak_percent += percent_per_level * f64::from(level)
                }
                FateEffect::MythicScaling { per_mythic } => b.per_mythic = Some(per_mythic),
            }
        }
        b
    }

    /// Current rarity chances in percent, in roll order.
    pub fn rarity_weights(&self) -> Vec<(Rarity, f64)> {
        self.weights_with(&self.fate_bonuses())
    }

    fn weights_with(&self, bonuses: &FateBonuses) -> Vec<(Rarity, f64)> {
        let mythics = self.state.rarity_counts.get(&Rarity::Mythic).copied().unwrap_or(0);
        let raw: Vec<(Rarity, f64)> = Rarity::ALL
            .iter()
            .map(|&r| {
                let mut weight = self.def.base_weight(r) + bonuses.shifts.get(&r).copied().unwrap_or(0.0);
                if r == Rarity::Mythic {
                    weight += bonuses.per_mythic.map_or(0.0, |p| p * mythics as f64);
                }
                (r, weight.max(0.0))
            })
            .collect();
        let total: f64 = raw.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return raw;
        }
        raw.into_iter().map(|(r, w)| (r, w / total * 100.0)).collect()
    }

    fn forced_rarity(&self, bonuses: &FateBonuses) -> Option<Rarity> {
        bonuses
            .pity
            .iter()
            .filter(|(rarity, threshold)| {
                let since = self.state.pulls_since.get(rarity).copied().unwrap_or(0);
                since + 1 >= *threshold
            })
            .map(|(rarity, _)| *rarity)
            .max()
    }

    fn roll_rarity(&mut self, bonuses: &FateBonuses) -> Rarity {
        let weights = self.weights_with(bonuses);
        let mut best = walk(&weights, self.rng.uniform() * 100.0);
        for _ in 0..bonuses.rerolls {
            if best != Rarity::Common {
                break;
            }
            best = best.max(walk(&weights, self.rng.uniform() * 100.0));
        }
        best
    }

    fn select_outcome(&mut self, rarity: Rarity, bonuses: &FateBonuses) -> usize {
        let mut band: Vec<usize> = (0..self.outcomes.len())
            .filter(|&i| self.outcomes[i].rarity == rarity)
            .collect();
        if band.is_empty() {
            band = (0..self.outcomes.len()).collect();
        }
        let pick = band[self.rng.index(band.len())];
        let Some(chance) = bonuses.duplicate_protection else {
            return pick;
        };
        if !self.state.discovered.contains(&self.outcomes[pick].id) {
            return pick;
        }
        let fresh: Vec<usize> = band
            .into_iter()
            .filter(|&i| !self.state.discovered.contains(&self.outcomes[i].id))
            .collect();
        if fresh.is_empty() || !self.rng.chance(chance) {
            return pick;
        }
        fresh[self.rng.index(fresh.len())]
    }

    /// One pull. Fails without touching the purse or the RNG when the forge
    /// is closed or the cost is unaffordable.
    pub(crate) fn pull(&mut self, purse: &mut impl Purse) -> Result<PullResult, LayerError> {
        if !self.state.available || self.outcomes.is_empty() {
            return Err(LayerError::Unavailable("probability forge"));
        }
        let cost = self.pull_cost();
        if !purse.spend(cost) {
            return Err(LayerError::Unaffordable {
                currency: "fate tokens",
                cost,
            });
        }

        let bonuses = self.fate_bonuses();
        let forced = self.forced_rarity(&bonuses);
        let rarity = match forced {
            Some(rarity) => rarity,
            None => self.roll_rarity(&bonuses),
        };
        let index = self.select_outcome(rarity, &bonuses);
        let outcome = self.outcomes[index].clone();

        let is_new = !self.state.discovered.contains(&outcome.id);
        let streak_bonus = if rarity.is_rare_or_better() {
            f64::from(self.state.streak) * bonuses.streak_percent
        } else {
            0.0
        };
        let final_multiplier = outcome.multiplier * (1.0 + streak_bonus / 100.0);

        let state = &mut self.state;
        state.total_pulls += 1;
        *state.obtained.entry(outcome.id.clone()).or_insert(0) += 1;
        *state.rarity_counts.entry(rarity).or_insert(0) += 1;
        if is_new {
            state.discovered.insert(outcome.id.clone());
            state.total_multiplier = state.total_multiplier.scale(final_multiplier);
        }
        state.streak = if rarity.is_rare_or_better() { state.streak + 1 } else { 0 };
        state.best_streak = state.best_streak.max(state.streak);
        for r in Rarity::ALL {
            let since = state.pulls_since.entry(r).or_insert(0);
            *since = if rarity >= r { 0 } else { *since + 1 };
        }

        info!(
            outcome = %outcome.id,
            ?rarity,
            is_new,
            forced = forced.is_some(),
            %cost,
            "Forge pull"
        );
        Ok(PullResult {
            outcome,
            is_new,
            forced: forced.is_some(),
            streak_bonus,
            final_multiplier,
        })
    }

    pub(crate) fn upgrade_weight(&mut self, id: &str, purse: &mut impl Purse) -> Result<u32, LayerError> {
        if !self.state.available {
            return Err(LayerError::Unavailable("probability forge"));
        }
        Ok(self.weights.upgrade(id, purse)?)
    }

    pub fn weight_levels(&self) -> BTreeMap<NodeId, u32> {
        self.weights.levels()
    }

    /// Load saved state; unknown outcome ids are dropped.
    pub(crate) fn restore(
        &mut self,
        mut state: ForgeState,
        weights: &BTreeMap<NodeId, u32>,
        rng_state: u64,
    ) -> usize {
        let known: BTreeSet<&OutcomeId> = self.outcomes.iter().map(|o| &o.id).collect();
        state.discovered.retain(|id| known.contains(id));
        state.obtained.retain(|id, _| known.contains(id));
        self.state = state;
        self.rng = SeededRng::new(rng_state);
        self.weights.restore_levels(weights)
    }

    pub(crate) fn full_reset(&mut self, seed: u64) {
        self.state = ForgeState::default();
        self.rng = SeededRng::new(seed);
        self.weights.reset_levels();
    }
}
