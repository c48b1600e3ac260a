//! The ascension tree, paid in ascension points minted by top-tier
//! completions.

use std::collections::BTreeMap;

use stellar_core::Numeral;
use stellar_core::id::NodeId;
use stellar_core::ledger::CurrencyPool;
use stellar_data::schema::AscensionEffect;
use stellar_tree::{GraphError, NodeDef, PrerequisiteGraph, UnlockRule};

/// Effects of every owned ascension node, folded.
#[derive(Debug, Clone, PartialEq)]
pub struct AscensionBonuses {
    pub auto_buy: bool,
    pub auto_advance: bool,

    /// Levels bought per node per automation pass.
    pub bulk_amount: u32,

    /// Energy after a tier reset, if any node raises it.
    pub starting_energy: Option<Numeral>,
    pub production_boost: f64,
    pub cost_reduction: f64,
    pub threshold_reduction: f64,
    pub offline_bonus: f64,
    pub multiplier_strength: f64,
    pub skill_cap: u32,
    pub keep_percent: f64,
}

impl Default for AscensionBonuses {
    fn default() -> Self {
        Self {
            auto_buy: false,
            auto_advance: false,
            bulk_amount: 1,
            starting_energy: None,
            production_boost: 0.0,
            cost_reduction: 0.0,
            threshold_reduction: 0.0,
            offline_bonus: 0.0,
            multiplier_strength: 0.0,
            skill_cap: 0,
            keep_percent: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AscensionLayer {
    graph: PrerequisiteGraph<AscensionEffect>,
    points: CurrencyPool,
}

impl AscensionLayer {
    pub fn new(defs: Vec<NodeDef<AscensionEffect>>) -> Result<Self, GraphError> {
        Ok(Self {
            graph: PrerequisiteGraph::new(UnlockRule::PrerequisitesMaxed, defs)?,
            points: CurrencyPool::new(),
        })
    }

    pub fn graph(&self) -> &PrerequisiteGraph<AscensionEffect> {
        &self.graph
    }

    pub fn points(&self) -> &CurrencyPool {
        &self.points
    }

    pub fn is_complete(&self) -> bool {
        self.graph.all_maxed()
    }

    /// Every node laid out in rows `from_row..=to_row` is owned. An empty
    /// band does not count as complete.
    pub fn rows_complete(&self, from_row: f32, to_row: f32) -> bool {
        let mut band = self
            .graph
            .nodes()
            .filter(|n| (from_row..=to_row).contains(&n.def().position.y))
            .peekable();
        band.peek().is_some() && band.all(|n| n.is_maxed())
    }

    pub(crate) fn purchase(&mut self, id: &str) -> Result<u32, GraphError> {
        self.graph.upgrade(id, &mut self.points)
    }

    pub(crate) fn mint(&mut self, amount: Numeral) -> Numeral {
        self.points.mint(amount)
    }

    pub(crate) fn restore(
        &mut self,
        points: CurrencyPool,
        levels: &BTreeMap<NodeId, u32>,
    ) -> usize {
        self.points = points;
        self.graph.restore_levels(levels)
    }

    pub(crate) fn full_reset(&mut self) {
        self.points = CurrencyPool::new();
        self.graph.reset_levels();
    }

    pub fn bonuses(&self) -> AscensionBonuses {
        let mut b = AscensionBonuses::default();
        for node in self.graph.nodes().filter(|n| n.level() > 0) {
            match *node.effect() {
                AscensionEffect::AutoBuy => b.auto_buy = true,
                AscensionEffect::AutoAdvance => b.auto_advance = true,
                AscensionEffect::BulkBuy(n) => b.bulk_amount = b.bulk_amount.max(n),
                AscensionEffect::StartingEnergy(e) => {
                    b.starting_energy = Some(b.starting_energy.map_or(e, |s| s.max(e)))
                }
                AscensionEffect::ProductionBoost(v) => b.production_boost += v,
                AscensionEffect::CostReduction(v) => b.cost_reduction = b.cost_reduction.max(v),
                AscensionEffect::ThresholdReduction(v) => {
                    b.threshold_reduction = b.threshold_reduction.max(v)
                }
                AscensionEffect::OfflineBonus(v) => b.offline_bonus += v,
                AscensionEffect::MultiplierBoost(v) => b.multiplier_strength += v,
                AscensionEffect::SkillCap(n) => b.skill_cap += n,
                AscensionEffect::KeepPercent(v) => b.keep_percent = b.keep_percent.max(v),
            }
        }
        b
    }
}
