//! Artifacts: three ten-tier branches bought with Quanta.
//!
//! Only the highest owned tier of each branch is active. Effectiveness is
//! folded first and scales every other active value.

use std::collections::BTreeMap;

use stellar_core::Numeral;
use stellar_core::id::NodeId;
use stellar_core::ledger::Purse;
use stellar_data::schema::{Artifact, ArtifactBranch, ArtifactEffect, ArtifactsDef};
use stellar_tree::{GraphError, PrerequisiteGraph, UnlockRule};
use tracing::info;

use crate::error::LayerError;

/// Live inputs some artifact effects scale with.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArtifactContext {
    pub held_quanta: Numeral,
    pub quantum_levels: u64,
    pub session_minutes: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactBonuses {
    /// Percent added to quantum node flat production.
    pub flat_percent: f64,

    /// Product of every multiplicative artifact effect.
    pub multiplier: f64,

    /// Percent added to offline Quanta gains.
    pub idle_percent: f64,
}

impl Default for ArtifactBonuses {
    fn default() -> Self {
        Self {
            flat_percent: 0.0,
            multiplier: 1.0,
            idle_percent: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactLayer {
    graph: PrerequisiteGraph<Artifact>,
    unlock_total_quanta: Numeral,
    stored_quanta_step: Numeral,
    persistent_cap_minutes: f64,
    max_tiers: BTreeMap<ArtifactBranch, u32>,
    available: bool,
}

impl ArtifactLayer {
    pub fn new(def: ArtifactsDef) -> Result<Self, GraphError> {
        let max_tiers = ArtifactBranch::ALL
            .iter()
            .map(|&b| (b, def.max_tier(b)))
            .collect();
        Ok(Self {
            graph: PrerequisiteGraph::new(UnlockRule::PrerequisitesMaxed, def.artifacts)?,
            unlock_total_quanta: def.unlock_total_quanta,
            stored_quanta_step: def.stored_quanta_step,
            persistent_cap_minutes: def.persistent_cap_minutes,
            max_tiers,
            available: false,
        })
    }

    pub fn graph(&self) -> &PrerequisiteGraph<Artifact> {
        &self.graph
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn owned_count(&self) -> usize {
        self.graph.leveled_count()
    }

    /// Report lifetime Quanta. Returns `true` when this call opened the
    /// system; availability never reverts.
    pub(crate) fn refresh(&mut self, total_quanta: Numeral) -> bool {
        self.graph.set_milestone_progress(total_quanta);
        if self.available || total_quanta < self.unlock_total_quanta {
            return false;
        }
        self.available = true;
        info!(total_quanta = %total_quanta, "Artifacts available");
        true
    }

    pub(crate) fn purchase(&mut self, id: &str, purse: &mut impl Purse) -> Result<u32, LayerError> {
        if !self.available {
            return Err(LayerError::Unavailable("artifacts"));
        }
        let level = self.graph.upgrade(id, purse)?;
        info!(artifact = id, "Artifact unlocked");
        Ok(level)
    }

    /// Highest owned artifact of each branch.
    pub fn highest_tiers(&self) -> BTreeMap<ArtifactBranch, Artifact> {
        let mut highest: BTreeMap<ArtifactBranch, Artifact> = BTreeMap::new();
        for node in self.graph.nodes().filter(|n| n.level() > 0) {
            let artifact = *node.effect();
            let slot = highest.entry(artifact.branch).or_insert(artifact);
            if artifact.tier > slot.tier {
                *slot = artifact;
            }
        }
        highest
    }

    /// Every branch owned up to its final tier.
    pub fn all_branches_maxed(&self) -> bool {
        let highest = self.highest_tiers();
        self.max_tiers.iter().all(|(branch, &max)| {
            max > 0 && highest.get(branch).is_some_and(|a| a.tier >= max)
        })
    }

    pub fn bonuses(&self, ctx: &ArtifactContext) -> ArtifactBonuses {
        let mut b = ArtifactBonuses::default();
        if !self.available {
            return b;
        }
        let active = self.highest_tiers();
        let effectiveness = 1.0
            + active
                .values()
                .map(|a| match a.effect {
                    ArtifactEffect::Effectiveness(v) => v / 100.0,
                    _ => 0.0,
                })
                .sum::<f64>();

        let steps = if self.stored_quanta_step.is_positive() {
            (ctx.held_quanta / self.stored_quanta_step).floor().to_f64()
        } else {
            0.0
        };
        let minutes = ctx.session_minutes.max(0.0);

        for artifact in active.values() {
            match artifact.effect {
                ArtifactEffect::FlatProduction(v) => b.flat_percent += v * effectiveness,
                ArtifactEffect::Multiplier(v) => b.multiplier *= v * effectiveness,
                ArtifactEffect::Idle(v) => b.idle_percent += v * effectiveness,
                ArtifactEffect::Scaling(v) => {
                    b.multiplier *= 1.0 + v * effectiveness * ctx.quantum_levels as f64 / 100.0
                }
                ArtifactEffect::StoredQuanta(v) => {
                    b.multiplier *= 1.0 + steps * v * effectiveness / 100.0
                }
                ArtifactEffect::Persistent(v) => {
                    b.multiplier *=
                        1.0 + minutes.min(self.persistent_cap_minutes) * v * effectiveness / 100.0
                }
                ArtifactEffect::Compound(v) => b.multiplier *= 1.0 + minutes * v * effectiveness / 100.0,
                ArtifactEffect::Effectiveness(_) => {}
            }
        }
        b
    }

    pub fn owned(&self) -> BTreeMap<NodeId, u32> {
        self.graph.levels()
    }

    pub(crate) fn restore(
        &mut self,
        available: bool,
        owned: &BTreeMap<NodeId, u32>,
        total_quanta: Numeral,
    ) -> usize {
        self.available = available;
        self.graph.set_milestone_progress(total_quanta);
        self.graph.restore_levels(owned)
    }

    pub(crate) fn full_reset(&mut self) {
        self.available = false;
        self.graph.set_milestone_progress(Numeral::ZERO);
        self.graph.reset_levels();
    }
}
