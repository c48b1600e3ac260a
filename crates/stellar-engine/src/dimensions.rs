//! The dimensional layer: five parallel graphs sharing Echo Fragments.
//!
//! A dimension is opened once by paying its unlock cost; the unlock is
//! sticky until a full reset. Collapse keeps every unlock and level and only
//! zeroes the fragments.

use std::collections::{BTreeMap, BTreeSet};

use stellar_core::Numeral;
use stellar_core::id::NodeId;
use stellar_core::ledger::{CurrencyPool, Purse};
use stellar_data::schema::{DimensionDef, DimensionEffect};
use stellar_tree::{GraphError, PrerequisiteGraph, UnlockRule};
use tracing::info;

use crate::error::LayerError;

#[derive(Debug, Clone)]
pub struct Dimension {
    id: String,
    name: String,
    unlock_cost: Numeral,
    unlocked: bool,
    graph: PrerequisiteGraph<DimensionEffect>,
}

impl Dimension {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unlock_cost(&self) -> Numeral {
        self.unlock_cost
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn graph(&self) -> &PrerequisiteGraph<DimensionEffect> {
        &self.graph
    }
}

/// Effects of every leveled dimension node, folded.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionBonuses {
    /// Product of `(1 + v)^level`.
    pub production: f64,
    pub multiplier_power: f64,
    pub skill_cap: u32,
    pub stellar_core: f64,
    pub cost_reduction: f64,

    /// Product of `(1 + per_node * leveled nodes of the target)`.
    pub cross_dimension: f64,

    /// Product of `(1 + v * level)`.
    pub all_aspects: f64,
}

impl Default for DimensionBonuses {
    fn default() -> Self {
        Self {
            production: 1.0,
            multiplier_power: 0.0,
            skill_cap: 0,
            stellar_core: 0.0,
            cost_reduction: 0.0,
            cross_dimension: 1.0,
            all_aspects: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DimensionalLayer {
    dimensions: Vec<Dimension>,
    fragments: CurrencyPool,
    transcends: u64,
    has_collapsed: bool,
}

impl DimensionalLayer {
    pub fn new(defs: Vec<DimensionDef>) -> Result<Self, (String, GraphError)> {
        let mut dimensions = Vec::with_capacity(defs.len());
        for def in defs {
            let graph = PrerequisiteGraph::new(UnlockRule::PrerequisitesMaxed, def.nodes)
                .map_err(|e| (def.id.clone(), e))?;
            dimensions.push(Dimension {
                id: def.id,
                name: def.name,
                unlock_cost: def.unlock_cost,
                unlocked: false,
                graph,
            });
        }
        Ok(Self {
            dimensions,
            fragments: CurrencyPool::new(),
            transcends: 0,
            has_collapsed: false,
        })
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, id: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.id == id)
    }

    pub fn fragments(&self) -> &CurrencyPool {
        &self.fragments
    }

    /// Echo fragment mints so far.
    pub fn transcends(&self) -> u64 {
        self.transcends
    }

    pub fn has_collapsed(&self) -> bool {
        self.has_collapsed
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.dimension(id).is_some_and(Dimension::is_unlocked)
    }

    pub fn unlocked_ids(&self) -> BTreeSet<String> {
        self.dimensions
            .iter()
            .filter(|d| d.unlocked)
            .map(|d| d.id.clone())
            .collect()
    }

    pub fn all_unlocked(&self) -> bool {
        self.dimensions.iter().all(|d| d.unlocked)
    }

    /// Every dimension open and every node maxed.
    pub fn all_maxed(&self) -> bool {
        self.dimensions
            .iter()
            .all(|d| d.unlocked && d.graph.all_maxed())
    }

    /// Open a dimension. The cost is consumed once and never refunded.
    pub(crate) fn unlock(&mut self, id: &str) -> Result<(), LayerError> {
        let Self {
            dimensions,
            fragments,
            ..
        } = self;
        let dimension = dimensions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| LayerError::UnknownDimension(id.to_string()))?;
        if dimension.unlocked {
            return Err(LayerError::AlreadyUnlocked(id.to_string()));
        }
        let cost = dimension.unlock_cost;
        if !fragments.spend(cost) {
            return Err(LayerError::Unaffordable {
                currency: "echo fragments",
                cost,
            });
        }
        dimension.unlocked = true;
        info!(dimension = id, %cost, "Dimension unlocked");
        Ok(())
    }

    pub(crate) fn upgrade(&mut self, dimension: &str, node: &str) -> Result<u32, LayerError> {
        let index = self
            .dimensions
            .iter()
            .position(|d| d.id == dimension)
            .ok_or_else(|| LayerError::UnknownDimension(dimension.to_string()))?;
        let target = &mut self.dimensions[index];
        if !target.unlocked {
            return Err(LayerError::DimensionLocked(dimension.to_string()));
        }
        Ok(target.graph.upgrade(node, &mut self.fragments)?)
    }

    pub(crate) fn mint(&mut self, amount: Numeral) -> Numeral {
        self.transcends += 1;
        self.fragments.mint(amount)
    }

    /// Zero the fragments and flip the one-way collapse flag.
    pub(crate) fn collapse(&mut self) {
        self.fragments.clear();
        self.has_collapsed = true;
    }

    pub fn levels(&self) -> BTreeMap<String, BTreeMap<NodeId, u32>> {
        self.dimensions
            .iter()
            .map(|d| (d.id.clone(), d.graph.levels()))
            .filter(|(_, levels)| !levels.is_empty())
            .collect()
    }

    pub(crate) fn restore(
        &mut self,
        fragments: CurrencyPool,
        unlocked: &BTreeSet<String>,
        levels: &BTreeMap<String, BTreeMap<NodeId, u32>>,
        transcends: u64,
        has_collapsed: bool,
    ) -> usize {
        self.fragments = fragments;
        self.transcends = transcends;
        self.has_collapsed = has_collapsed;
        let empty = BTreeMap::new();
        let mut skipped = 0;
        for d in &mut self.dimensions {
            d.unlocked = unlocked.contains(&d.id);
            skipped += d.graph.restore_levels(levels.get(&d.id).unwrap_or(&empty));
        }
        skipped
    }

    pub(crate) fn full_reset(&mut self) {
        self.fragments = CurrencyPool::new();
        self.transcends = 0;
        self.has_collapsed = false;
        for d in &mut self.dimensions {
            d.unlocked = false;
            d.graph.reset_levels();
        }
    }

    pub fn bonuses(&self) -> DimensionBonuses {
        let mut b = DimensionBonuses::default();
        for dimension in self.dimensions.iter().filter(|d| d.unlocked) {
            for node in dimension.graph.nodes().filter(|n| n.level() > 0) {
                let level = node.level();
                let levels = f64::from(level);
                match node.effect() {
                    DimensionEffect::ProductionMult(v) => b.production *= (1.0 + v).powi(level as i32),
                    DimensionEffect::MultiplierPower(v) => b.multiplier_power += v * levels,
                    DimensionEffect::SkillCap(n) => b.skill_cap += n * level,
                    DimensionEffect::StellarCoreBonus(v) => b.stellar_core += v * levels,
                    DimensionEffect::CostReduction(v) => b.cost_reduction += v * levels,
                    DimensionEffect::CrossDimension { target, per_node } => {
                        let leveled = match target {
                            Some(target) => self
                                .dimension(target)
                                .filter(|d| d.unlocked)
                                .map_or(0, |d| d.graph.leveled_count()),
                            None => self
                                .dimensions
                                .iter()
                                .filter(|d| d.unlocked)
                                .map(|d| d.graph.leveled_count())
                                .sum(),
                        };
                        b.cross_dimension *= 1.0 + per_node * leveled as f64;
                    }
                    DimensionEffect::AllAspects(v) => b.all_aspects *= 1.0 + v * levels,
                }
            }
        }
        b
    }
}
