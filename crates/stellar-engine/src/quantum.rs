//! The quantum layer: three trees paid in Quanta, activated by collapse.

use std::collections::{BTreeMap, BTreeSet};

use stellar_core::Numeral;
use stellar_core::id::NodeId;
use stellar_core::ledger::Purse;
use stellar_data::schema::{QuantumDef, QuantumEffect, SynergyBonus, SynergyDef};
use stellar_tree::{GraphError, PrerequisiteGraph, UnlockRule};
use tracing::info;

use crate::error::LayerError;
use crate::modifiers::{FlatSource, MultiplierSource, QuantaModifiers};

#[derive(Debug, Clone)]
pub struct QuantumTree {
    id: String,
    name: String,
    graph: PrerequisiteGraph<QuantumEffect>,
}

impl QuantumTree {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &PrerequisiteGraph<QuantumEffect> {
        &self.graph
    }
}

#[derive(Debug, Clone)]
struct Synergy {
    def: SynergyDef,
    cross_tree: bool,
}

#[derive(Debug, Clone)]
pub struct QuantumLayer {
    base_production: Numeral,
    trees: Vec<QuantumTree>,
    synergies: Vec<Synergy>,
    milestones: Vec<Numeral>,
    reached: BTreeSet<Numeral>,
    active: bool,
}

impl QuantumLayer {
    pub fn new(def: QuantumDef) -> Result<Self, (String, GraphError)> {
        let synergies = def
            .synergies
            .iter()
            .map(|s| Synergy {
                cross_tree: def.is_cross_tree(s),
                def: s.clone(),
            })
            .collect();
        let mut trees = Vec::with_capacity(def.trees.len());
        for tree in def.trees {
            let graph = PrerequisiteGraph::new(UnlockRule::PrerequisitesLeveled, tree.nodes)
                .map_err(|e| (tree.id.clone(), e))?;
            trees.push(QuantumTree {
                id: tree.id,
                name: tree.name,
                graph,
            });
        }
        Ok(Self {
            base_production: def.base_production,
            trees,
            synergies,
            milestones: def.milestones,
            reached: BTreeSet::new(),
            active: false,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn activate(&mut self) {
        self.active = true;
    }

    pub fn trees(&self) -> &[QuantumTree] {
        &self.trees
    }

    pub fn tree(&self, id: &str) -> Option<&QuantumTree> {
        self.trees.iter().find(|t| t.id == id)
    }

    /// Level of `node` in whichever tree owns it.
    pub fn level(&self, node: &str) -> u32 {
        self.trees
            .iter()
            .find(|t| t.graph.contains(node))
            .map_or(0, |t| t.graph.level(node))
    }

    pub fn total_levels(&self) -> u64 {
        self.trees.iter().map(|t| t.graph.total_levels()).sum()
    }

    pub fn tree_maxed(&self, id: &str) -> bool {
        self.tree(id).is_some_and(|t| t.graph.all_maxed())
    }

    pub fn all_maxed(&self) -> bool {
        self.trees.iter().all(|t| t.graph.all_maxed())
    }

    pub fn milestones_reached(&self) -> &BTreeSet<Numeral> {
        &self.reached
    }

    pub(crate) fn purchase(&mut self, node: &str, purse: &mut impl Purse) -> Result<u32, LayerError> {
        if !self.active {
            return Err(LayerError::Unavailable("quantum layer"));
        }
        let tree = self
            .trees
            .iter_mut()
            .find(|t| t.graph.contains(node))
            .ok_or_else(|| LayerError::UnknownQuantumNode(node.to_string()))?;
        Ok(tree.graph.upgrade(node, purse)?)
    }

    /// Report lifetime Quanta to every tree and record newly crossed
    /// milestones. Returns the marks crossed by this call.
    pub(crate) fn refresh_milestones(&mut self, total_generated: Numeral) -> Vec<Numeral> {
        for tree in &mut self.trees {
            tree.graph.set_milestone_progress(total_generated);
        }
        let crossed: Vec<Numeral> = self
            .milestones
            .iter()
            .copied()
            .filter(|m| total_generated >= *m && !self.reached.contains(m))
            .collect();
        for mark in &crossed {
            info!(milestone = %mark, "Quanta milestone reached");
            self.reached.insert(*mark);
        }
        crossed
    }

    fn synergy_active(&self, synergy: &SynergyDef) -> bool {
        synergy.requires.iter().all(|n| self.level(n.as_str()) > 0)
    }

    pub fn active_synergies(&self) -> Vec<&SynergyDef> {
        self.synergies
            .iter()
            .filter(|s| self.synergy_active(&s.def))
            .map(|s| &s.def)
            .collect()
    }

    /// Active synergies spanning more than one tree.
    pub fn entanglements(&self) -> usize {
        self.synergies
            .iter()
            .filter(|s| s.cross_tree && self.synergy_active(&s.def))
            .count()
    }

    /// Node and synergy inputs of the Quanta rate. Artifact, forge and reward
    /// inputs are added by the hierarchy.
    pub fn modifiers(&self) -> QuantaModifiers {
        let mut m = QuantaModifiers::new(self.base_production);
        for node in self.trees.iter().flat_map(|t| t.graph.nodes()) {
            let level = node.level();
            if level == 0 {
                continue;
            }
            match *node.effect() {
                QuantumEffect::Production(per_level) => m.flat.push(FlatSource { per_level, level }),
                QuantumEffect::Multiplier(factor) => {
                    m.multipliers.push(MultiplierSource { factor, level })
                }
                QuantumEffect::Bridge => {}
            }
        }
        for synergy in self.active_synergies() {
            match synergy.bonus {
                SynergyBonus::Production(v) => m.synergy_flat += v,
                SynergyBonus::Multiplier(v) => m.synergy_multipliers.push(1.0 + v),
            }
        }
        m
    }

    pub fn levels(&self) -> BTreeMap<String, BTreeMap<NodeId, u32>> {
        self.trees
            .iter()
            .map(|t| (t.id.clone(), t.graph.levels()))
            .filter(|(_, levels)| !levels.is_empty())
            .collect()
    }

    /// Load saved state. Milestone progress must be reported first so gated
    /// nodes keep their unlocks.
    pub(crate) fn restore(
        &mut self,
        active: bool,
        reached: BTreeSet<Numeral>,
        levels: &BTreeMap<String, BTreeMap<NodeId, u32>>,
        total_generated: Numeral,
    ) -> usize {
        self.active = active;
        self.reached = reached;
        let empty = BTreeMap::new();
        let mut skipped = 0;
        for tree in &mut self.trees {
            tree.graph.set_milestone_progress(total_generated);
            skipped += tree.graph.restore_levels(levels.get(&tree.id).unwrap_or(&empty));
        }
        skipped
    }

    pub(crate) fn full_reset(&mut self) {
        self.active = false;
        self.reached.clear();
        for tree in &mut self.trees {
            tree.graph.set_milestone_progress(Numeral::ZERO);
            tree.graph.reset_levels();
        }
    }
}
