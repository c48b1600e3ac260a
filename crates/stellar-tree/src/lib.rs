//! Prerequisite graphs shared by every upgrade tree.
//!
//! Skill tiers, the ascension tree, each dimension and each quantum tree are
//! all a [`PrerequisiteGraph`]: an arena of leveled nodes with exponential
//! cost curves, prerequisite edges by id, and unlock propagation.
//!
//! # Overview
//!
//! A graph is built in one shot from its [`NodeDef`]s via
//! [`PrerequisiteGraph::new`]. Construction validates the definitions and
//! rejects duplicate ids, dangling or self prerequisites and cycles, so a
//! malformed tree fails at startup and never at purchase time.
//!
//! At runtime the owning layer calls [`PrerequisiteGraph::upgrade`] or
//! [`PrerequisiteGraph::bulk_upgrade`] with a [`Purse`] to pay from. Each
//! level purchase is all-or-nothing. After a purchase every node that lists
//! the upgraded node as a prerequisite is re-checked and may unlock.
//!
//! # Unlock Rules
//!
//! - [`UnlockRule::PrerequisitesMaxed`]: every prerequisite at max level
//!   (skill tiers, ascension, dimensions).
//! - [`UnlockRule::PrerequisitesLeveled`]: every prerequisite at level 1 or
//!   more (quantum trees).
//!
//! Either rule can additionally be gated by a per-node milestone compared
//! against progress the owner reports through
//! [`PrerequisiteGraph::set_milestone_progress`]. Unlocks are sticky until
//! [`PrerequisiteGraph::reset_levels`] or [`PrerequisiteGraph::restore_levels`].

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap, new_key_type};
use stellar_core::Numeral;
use stellar_core::id::NodeId;
use stellar_core::ledger::Purse;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

new_key_type! {
    /// Arena key of a node inside one graph.
    pub struct NodeKey;
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Layout position, carried for presentation only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Static definition of a node. Immutable once the graph is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef<E> {
    pub id: NodeId,

    /// Human-readable name.
    pub name: String,

    pub max_level: u32,

    /// Cost of the first level.
    pub base_cost: Numeral,

    /// Growth factor applied once per owned level.
    pub cost_multiplier: f64,

    /// Nodes that must satisfy the graph's [`UnlockRule`] first.
    #[serde(default)]
    pub prerequisites: Vec<NodeId>,

    /// What a level of this node does; interpreted by the owning layer.
    pub effect: E,

    #[serde(default)]
    pub position: Position,

    /// Progress the owner must report before this node unlocks.
    #[serde(default)]
    pub milestone: Option<Numeral>,
}

/// When a node's prerequisites count as satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlockRule {
    PrerequisitesMaxed,
    PrerequisitesLeveled,
}

/// Cost discounts from higher layers, applied in this field order.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Discounts {
    pub ascension: f64,
    pub dimensional: f64,
}

impl Discounts {
    fn factor(discount: f64) -> f64 {
        1.0 - discount.clamp(0.0, 0.99)
    }

    /// Apply both discounts to a raw cost, then floor.
    pub fn apply(&self, raw: Numeral) -> Numeral {
        raw.scale(Self::factor(self.ascension))
            .scale(Self::factor(self.dimensional))
            .floor()
    }
}

// ---------------------------------------------------------------------------
// Runtime node
// ---------------------------------------------------------------------------

/// A node with its runtime state.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode<E> {
    def: NodeDef<E>,
    level: u32,
    max_level: u32,
    unlocked: bool,
}

impl<E> GraphNode<E> {
    pub fn id(&self) -> &NodeId {
        &self.def.id
    }

    pub fn def(&self) -> &NodeDef<E> {
        &self.def
    }

    pub fn effect(&self) -> &E {
        &self.def.effect
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Definition max level plus any cap bonus the graph carries.
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn is_maxed(&self) -> bool {
        self.level >= self.max_level
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    NodeUpgraded { id: NodeId, level: u32 },
    NodeUnlocked { id: NodeId },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),

    #[error("node {node} lists missing prerequisite {prerequisite}")]
    DanglingPrerequisite { node: NodeId, prerequisite: NodeId },

    #[error("node {0} lists itself as a prerequisite")]
    SelfPrerequisite(NodeId),

    #[error("prerequisite cycle through node {0}")]
    Cycle(NodeId),

    #[error("node {node} is malformed: {reason}")]
    InvalidDefinition { node: NodeId, reason: &'static str },

    #[error("node not found: {0}")]
    UnknownNode(NodeId),

    #[error("node {0} is locked")]
    Locked(NodeId),

    #[error("node {0} is already at max level")]
    Maxed(NodeId),

    #[error("cannot afford node {node}: costs {cost}")]
    InsufficientFunds { node: NodeId, cost: Numeral },
}

// ---------------------------------------------------------------------------
// PrerequisiteGraph
// ---------------------------------------------------------------------------

/// One upgrade tree. Nodes live in an arena and reference each other by id.
#[derive(Debug, Clone)]
pub struct PrerequisiteGraph<E> {
    nodes: SlotMap<NodeKey, GraphNode<E>>,

    index: HashMap<NodeId, NodeKey>,

    /// Definition order; iteration and tie-breaking follow it.
    order: Vec<NodeKey>,

    /// Reverse prerequisite edges.
    dependents: SecondaryMap<NodeKey, Vec<NodeKey>>,

    rule: UnlockRule,
    discounts: Discounts,
    max_level_bonus: u32,
    prerequisites_waived: bool,
    milestone_progress: Numeral,

    /// Events emitted since last drain.
    events: Vec<GraphEvent>,
}

impl<E> PrerequisiteGraph<E> {
    /// Build and validate a graph.
    pub fn new(
        rule: UnlockRule,
        defs: impl IntoIterator<Item = NodeDef<E>>,
    ) -> Result<Self, GraphError> {
        let mut graph = Self {
            nodes: SlotMap::with_key(),
            index: HashMap::new(),
            order: Vec::new(),
            dependents: SecondaryMap::new(),
            rule,
            discounts: Discounts::default(),
            max_level_bonus: 0,
            prerequisites_waived: false,
            milestone_progress: Numeral::ZERO,
            events: Vec::new(),
        };

        for def in defs {
            validate_def(&def)?;
            if graph.index.contains_key(&def.id) {
                return Err(GraphError::DuplicateId(def.id));
            }
            let id = def.id.clone();
            let max_level = def.max_level;
            let key = graph.nodes.insert(GraphNode {
                def,
                level: 0,
                max_level,
                unlocked: false,
            });
            graph.index.insert(id, key);
            graph.order.push(key);
            graph.dependents.insert(key, Vec::new());
        }

        graph.link_prerequisites()?;
        graph.check_acyclic()?;
        graph.relock_all();
        Ok(graph)
    }

    fn link_prerequisites(&mut self) -> Result<(), GraphError> {
        for &key in &self.order {
            let node = &self.nodes[key];
            for prereq in &node.def.prerequisites {
                if *prereq == node.def.id {
                    return Err(GraphError::SelfPrerequisite(prereq.clone()));
                }
                let Some(&prereq_key) = self.index.get(prereq) else {
                    return Err(GraphError::DanglingPrerequisite {
                        node: node.def.id.clone(),
                        prerequisite: prereq.clone(),
                    });
                };
                self.dependents[prereq_key].push(key);
            }
        }
        Ok(())
    }

    /// Kahn's algorithm; any node left with unmet in-degree sits on a cycle.
    fn check_acyclic(&self) -> Result<(), GraphError> {
        let mut in_degree: SecondaryMap<NodeKey, usize> = SecondaryMap::new();
        for &key in &self.order {
            in_degree.insert(key, self.nodes[key].def.prerequisites.len());
        }
        let mut ready: VecDeque<NodeKey> = self
            .order
            .iter()
            .copied()
            .filter(|key| in_degree[*key] == 0)
            .collect();
        let mut visited = 0;
        while let Some(key) = ready.pop_front() {
            visited += 1;
            for &dependent in &self.dependents[key] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push_back(dependent);
                }
            }
        }
        if visited == self.order.len() {
            return Ok(());
        }
        let stuck = self
            .order
            .iter()
            .find(|key| in_degree[**key] > 0)
            .map(|key| self.nodes[*key].def.id.clone());
        match stuck {
            Some(id) => Err(GraphError::Cycle(id)),
            None => Ok(()),
        }
    }

    // -- Query API --

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn rule(&self) -> UnlockRule {
        self.rule
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode<E>> {
        self.index.get(id).map(|key| &self.nodes[*key])
    }

    fn key(&self, id: &str) -> Result<NodeKey, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(NodeId::new(id)))
    }

    /// Nodes in definition order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode<E>> {
        self.order.iter().map(|key| &self.nodes[*key])
    }

    pub fn level(&self, id: &str) -> u32 {
        self.node(id).map_or(0, GraphNode::level)
    }

    pub fn is_maxed(&self, id: &str) -> bool {
        self.node(id).is_some_and(GraphNode::is_maxed)
    }

    /// Every node at its max level. An empty graph counts as complete.
    pub fn all_maxed(&self) -> bool {
        self.nodes().all(GraphNode::is_maxed)
    }

    pub fn maxed_count(&self) -> usize {
        self.nodes().filter(|node| node.is_maxed()).count()
    }

    /// Nodes with at least one level.
    pub fn leveled_count(&self) -> usize {
        self.nodes().filter(|node| node.level > 0).count()
    }

    pub fn total_levels(&self) -> u64 {
        self.nodes().map(|node| node.level as u64).sum()
    }

    pub fn discounts(&self) -> Discounts {
        self.discounts
    }

    /// Price of the next level: `base * multiplier^level`, discounted, floored.
    pub fn cost(&self, id: &str) -> Result<Numeral, GraphError> {
        let key = self.key(id)?;
        Ok(self.cost_of(&self.nodes[key]))
    }

    fn cost_of(&self, node: &GraphNode<E>) -> Numeral {
        let growth = Numeral::from(node.def.cost_multiplier).pow(node.level as f64);
        self.discounts.apply(node.def.base_cost * growth)
    }

    /// Exists, unlocked, below max level, and affordable from `balance`.
    pub fn can_upgrade(&self, id: &str, balance: Numeral) -> bool {
        self.node(id).is_some_and(|node| {
            node.unlocked && !node.is_maxed() && self.cost_of(node) <= balance
        })
    }

    /// Upgradable nodes sorted by ascending cost, ties in definition order.
    pub fn purchasable(&self, balance: Numeral) -> Vec<(NodeId, Numeral)> {
        let mut affordable: Vec<(NodeId, Numeral)> = self
            .nodes()
            .filter(|node| node.unlocked && !node.is_maxed())
            .map(|node| (node.def.id.clone(), self.cost_of(node)))
            .filter(|(_, cost)| *cost <= balance)
            .collect();
        affordable.sort_by(|a, b| a.1.cmp(&b.1));
        affordable
    }

    /// Ids of nodes still locked.
    pub fn locked(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|node| !node.unlocked)
            .map(|node| node.def.id.clone())
            .collect()
    }

    // -- Purchase API --

    /// Buy one level. Charges `purse`, raises the level, then propagates
    /// unlocks to dependents. On any error nothing changes.
    pub fn upgrade(&mut self, id: &str, purse: &mut impl Purse) -> Result<u32, GraphError> {
        let key = self.key(id)?;
        let node = &self.nodes[key];
        if !node.unlocked {
            return Err(GraphError::Locked(node.def.id.clone()));
        }
        if node.is_maxed() {
            return Err(GraphError::Maxed(node.def.id.clone()));
        }
        let cost = self.cost_of(node);
        if cost > purse.balance() || !purse.spend(cost) {
            return Err(GraphError::InsufficientFunds {
                node: node.def.id.clone(),
                cost,
            });
        }

        let node = &mut self.nodes[key];
        node.level += 1;
        let level = node.level;
        self.events.push(GraphEvent::NodeUpgraded {
            id: node.def.id.clone(),
            level,
        });
        self.propagate_from(key);
        Ok(level)
    }

    /// Repeat [`upgrade`](Self::upgrade) up to `max_count` times, stopping at
    /// the first failure. Returns the number of levels bought.
    pub fn bulk_upgrade(&mut self, id: &str, max_count: u32, purse: &mut impl Purse) -> u32 {
        let mut bought = 0;
        while bought < max_count && self.upgrade(id, purse).is_ok() {
            bought += 1;
        }
        bought
    }

    // -- Unlock propagation --

    fn satisfies_rule(&self, prereq: &GraphNode<E>) -> bool {
        match self.rule {
            UnlockRule::PrerequisitesMaxed => prereq.is_maxed(),
            UnlockRule::PrerequisitesLeveled => prereq.level > 0,
        }
    }

    fn prerequisites_met(&self, key: NodeKey) -> bool {
        let node = &self.nodes[key];
        let milestone_met = node
            .def
            .milestone
            .is_none_or(|needed| self.milestone_progress >= needed);
        if !milestone_met {
            return false;
        }
        self.prerequisites_waived
            || node.def.prerequisites.iter().all(|prereq| {
                self.index
                    .get(prereq)
                    .is_some_and(|k| self.satisfies_rule(&self.nodes[*k]))
            })
    }

    fn try_unlock(&mut self, key: NodeKey) {
        if self.nodes[key].unlocked || !self.prerequisites_met(key) {
            return;
        }
        let node = &mut self.nodes[key];
        node.unlocked = true;
        self.events.push(GraphEvent::NodeUnlocked {
            id: node.def.id.clone(),
        });
    }

    /// O(dependents) re-check after a level change.
    fn propagate_from(&mut self, key: NodeKey) {
        let dependents = self.dependents[key].clone();
        for dependent in dependents {
            self.try_unlock(dependent);
        }
    }

    /// Re-check every locked node.
    fn refresh_unlocks(&mut self) {
        for i in 0..self.order.len() {
            self.try_unlock(self.order[i]);
        }
    }

    /// Recompute unlock flags from scratch without emitting events. Unlock
    /// state depends only on levels, so one pass settles the whole graph.
    fn relock_all(&mut self) {
        for i in 0..self.order.len() {
            let key = self.order[i];
            let unlocked = self.prerequisites_met(key);
            self.nodes[key].unlocked = unlocked;
        }
    }

    // -- Layer hooks --

    /// Replace the discounts used by [`cost`](Self::cost).
    pub fn set_discounts(&mut self, discounts: Discounts) {
        self.discounts = discounts;
    }

    /// Raise every node's max level by `bonus` over its definition. Levels
    /// above a lowered cap are clamped.
    pub fn set_max_level_bonus(&mut self, bonus: u32) {
        if bonus == self.max_level_bonus {
            return;
        }
        self.max_level_bonus = bonus;
        for node in self.nodes.values_mut() {
            node.max_level = node.def.max_level.saturating_add(bonus);
            node.level = node.level.min(node.max_level);
        }
        self.refresh_unlocks();
    }

    pub fn max_level_bonus(&self) -> u32 {
        self.max_level_bonus
    }

    /// Treat every prerequisite as satisfied while set.
    pub fn set_prerequisites_waived(&mut self, waived: bool) {
        self.prerequisites_waived = waived;
        if waived {
            self.refresh_unlocks();
        }
    }

    /// Report progress toward node milestones; may unlock gated nodes.
    pub fn set_milestone_progress(&mut self, progress: Numeral) {
        if progress == self.milestone_progress {
            return;
        }
        self.milestone_progress = progress;
        self.refresh_unlocks();
    }

    /// Layer reset: all levels to zero, unlock flags recomputed from
    /// prerequisites.
    pub fn reset_levels(&mut self) {
        for node in self.nodes.values_mut() {
            node.level = 0;
        }
        self.relock_all();
    }

    // -- Persistence --

    /// Non-zero levels by id; the only graph state a save needs.
    pub fn levels(&self) -> BTreeMap<NodeId, u32> {
        self.nodes()
            .filter(|node| node.level > 0)
            .map(|node| (node.def.id.clone(), node.level))
            .collect()
    }

    /// Load saved levels against the current definitions. Unknown ids are
    /// skipped and levels above the current cap are clamped. Returns the
    /// number of skipped ids.
    pub fn restore_levels(&mut self, levels: &BTreeMap<NodeId, u32>) -> usize {
        for node in self.nodes.values_mut() {
            node.level = 0;
        }
        let mut skipped = 0;
        for (id, level) in levels {
            match self.index.get(id.as_str()) {
                Some(&key) => {
                    let node = &mut self.nodes[key];
                    node.level = (*level).min(node.max_level);
                }
                None => skipped += 1,
            }
        }
        self.relock_all();
        skipped
    }

    // -- Events --

    /// Drain all events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}

fn validate_def<E>(def: &NodeDef<E>) -> Result<(), GraphError> {
    let invalid = |reason| GraphError::InvalidDefinition {
        node: def.id.clone(),
        reason,
    };
    if def.max_level == 0 {
        return Err(invalid("max level must be at least 1"));
    }
    if def.base_cost.is_negative() {
        return Err(invalid("base cost must be non-negative"));
    }
    if !def.cost_multiplier.is_finite() || def.cost_multiplier <= 0.0 {
        return Err(invalid("cost multiplier must be positive and finite"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{def, diamond, wallet};
    use stellar_core::ledger::CurrencyPool;
    use stellar_core::test_utils::num;

    // -----------------------------------------------------------------------
    // Test 1: Construction rejects malformed trees
    // -----------------------------------------------------------------------
    #[test]
    fn duplicate_ids_rejected() {
        let result = PrerequisiteGraph::new(
            UnlockRule::PrerequisitesMaxed,
            vec![def("a", 1, 10.0, 1.5, &[]), def("a", 1, 10.0, 1.5, &[])],
        );
        assert_eq!(result.err(), Some(GraphError::DuplicateId(NodeId::new("a"))));
    }

    #[test]
    fn dangling_prerequisite_rejected() {
        let result = PrerequisiteGraph::new(
            UnlockRule::PrerequisitesMaxed,
            vec![def("a", 1, 10.0, 1.5, &["ghost"])],
        );
        assert!(matches!(
            result,
            Err(GraphError::DanglingPrerequisite { .. })
        ));
    }

    #[test]
    fn self_prerequisite_rejected() {
        let result = PrerequisiteGraph::new(
            UnlockRule::PrerequisitesMaxed,
            vec![def("a", 1, 10.0, 1.5, &["a"])],
        );
        assert_eq!(
            result.err(),
            Some(GraphError::SelfPrerequisite(NodeId::new("a")))
        );
    }

    #[test]
    fn cycle_rejected() {
        let result = PrerequisiteGraph::new(
            UnlockRule::PrerequisitesMaxed,
            vec![
                def("root", 1, 1.0, 1.5, &[]),
                def("a", 1, 10.0, 1.5, &["root", "c"]),
                def("b", 1, 10.0, 1.5, &["a"]),
                def("c", 1, 10.0, 1.5, &["b"]),
            ],
        );
        assert_eq!(result.err(), Some(GraphError::Cycle(NodeId::new("a"))));
    }

    #[test]
    fn zero_max_level_rejected() {
        let result = PrerequisiteGraph::new(
            UnlockRule::PrerequisitesMaxed,
            vec![def("a", 0, 10.0, 1.5, &[])],
        );
        assert!(matches!(result, Err(GraphError::InvalidDefinition { .. })));
    }

    // -----------------------------------------------------------------------
    // Test 2: Cost curve and discounts
    // -----------------------------------------------------------------------
    #[test]
    fn cost_follows_curve_then_floors() {
        let mut graph = diamond();
        let mut purse = wallet(1e6);
        assert_eq!(graph.cost("root").unwrap(), num(10.0));
        graph.upgrade("root", &mut purse).unwrap();
        assert_eq!(graph.cost("root").unwrap(), num(15.0));
        graph.upgrade("root", &mut purse).unwrap();
        // 10 * 1.5^2 = 22.5
        assert_eq!(graph.cost("root").unwrap(), num(22.0));
    }

    #[test]
    fn discounts_apply_in_order_then_floor() {
        let mut graph = diamond();
        graph.set_discounts(Discounts {
            ascension: 0.25,
            dimensional: 0.1,
        });
        // 100 * 0.75 * 0.9 = 67.5
        assert_eq!(graph.cost("left").unwrap(), num(67.0));
        assert!(matches!(
            graph.cost("ghost"),
            Err(GraphError::UnknownNode(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Test 3: Upgrade charges, levels, and propagates unlocks
    // -----------------------------------------------------------------------
    #[test]
    fn upgrade_unlocks_dependents_when_maxed() {
        let mut graph = diamond();
        let mut purse = wallet(1e6);
        assert!(!graph.node("left").unwrap().is_unlocked());

        graph.upgrade("root", &mut purse).unwrap();
        assert!(!graph.node("left").unwrap().is_unlocked());
        graph.upgrade("root", &mut purse).unwrap();
        graph.upgrade("root", &mut purse).unwrap();

        assert!(graph.is_maxed("root"));
        assert!(graph.node("left").unwrap().is_unlocked());
        assert!(graph.node("right").unwrap().is_unlocked());
        assert!(!graph.node("final").unwrap().is_unlocked());

        let events = graph.drain_events();
        assert!(events.contains(&GraphEvent::NodeUnlocked {
            id: NodeId::new("left")
        }));
        assert!(graph.drain_events().is_empty());
    }

    #[test]
    fn upgrade_failures_leave_state_untouched() {
        let mut graph = diamond();
        let mut purse = wallet(12.0);

        assert!(matches!(
            graph.upgrade("left", &mut purse),
            Err(GraphError::Locked(_))
        ));
        assert_eq!(graph.upgrade("root", &mut purse), Ok(1));
        assert_eq!(
            graph.upgrade("root", &mut purse),
            Err(GraphError::InsufficientFunds {
                node: NodeId::new("root"),
                cost: num(15.0)
            })
        );
        assert_eq!(purse.amount(), num(2.0));
        assert_eq!(graph.level("root"), 1);
    }

    #[test]
    fn maxed_node_refuses_upgrade() {
        let mut graph = diamond();
        let mut purse = wallet(1e6);
        assert_eq!(graph.bulk_upgrade("root", 10, &mut purse), 3);
        assert!(matches!(
            graph.upgrade("root", &mut purse),
            Err(GraphError::Maxed(_))
        ));
        assert!(!graph.can_upgrade("root", num(1e9)));
    }

    // -----------------------------------------------------------------------
    // Test 4: Bulk upgrade stops at affordability without partial charges
    // -----------------------------------------------------------------------
    #[test]
    fn bulk_upgrade_stops_when_unaffordable() {
        let mut graph = diamond();
        // root costs 10, 15, 22
        let mut purse = wallet(30.0);
        assert_eq!(graph.bulk_upgrade("root", 3, &mut purse), 2);
        assert_eq!(purse.amount(), num(5.0));
        assert_eq!(graph.level("root"), 2);
    }

    // -----------------------------------------------------------------------
    // Test 5: Purchasable set is sorted by ascending cost
    // -----------------------------------------------------------------------
    #[test]
    fn purchasable_sorted_by_cost() {
        let mut graph = diamond();
        let mut purse = wallet(1e6);
        graph.bulk_upgrade("root", 3, &mut purse);
        let ids: Vec<String> = graph
            .purchasable(num(1e6))
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(ids, vec!["right", "left"]);
        assert!(graph.purchasable(num(50.0)).is_empty());
        assert_eq!(graph.locked(), vec![NodeId::new("final")]);
    }

    // -----------------------------------------------------------------------
    // Test 6: Leveled rule and milestones
    // -----------------------------------------------------------------------
    #[test]
    fn leveled_rule_unlocks_after_first_level() {
        let mut graph = PrerequisiteGraph::new(
            UnlockRule::PrerequisitesLeveled,
            vec![
                def("m1", 10, 10.0, 1.5, &[]),
                def("m2", 10, 50.0, 1.6, &["m1"]),
            ],
        )
        .unwrap();
        let mut purse = wallet(1e3);
        graph.upgrade("m1", &mut purse).unwrap();
        assert!(graph.node("m2").unwrap().is_unlocked());
    }

    #[test]
    fn milestone_gates_unlock() {
        let mut gated = def("m7", 10, 5000.0, 1.9, &[]);
        gated.milestone = Some(num(1e5));
        let mut graph =
            PrerequisiteGraph::new(UnlockRule::PrerequisitesLeveled, vec![gated]).unwrap();
        assert!(!graph.node("m7").unwrap().is_unlocked());
        graph.set_milestone_progress(num(99_999.0));
        assert!(!graph.node("m7").unwrap().is_unlocked());
        graph.set_milestone_progress(num(1e5));
        assert!(graph.node("m7").unwrap().is_unlocked());
    }

    // -----------------------------------------------------------------------
    // Test 7: Cap bonus, waiver, reset
    // -----------------------------------------------------------------------
    #[test]
    fn max_level_bonus_extends_caps_without_relocking() {
        let mut graph = diamond();
        let mut purse = wallet(1e6);
        graph.bulk_upgrade("root", 3, &mut purse);
        graph.set_max_level_bonus(2);
        assert_eq!(graph.node("root").unwrap().max_level(), 5);
        assert!(!graph.is_maxed("root"));
        // Children unlocked at the old cap stay unlocked.
        assert!(graph.node("left").unwrap().is_unlocked());
    }

    #[test]
    fn waiver_unlocks_everything() {
        let mut graph = diamond();
        graph.set_prerequisites_waived(true);
        assert!(graph.locked().is_empty());
    }

    #[test]
    fn reset_levels_relocks_dependents() {
        let mut graph = diamond();
        let mut purse = wallet(1e6);
        graph.bulk_upgrade("root", 3, &mut purse);
        graph.reset_levels();
        assert_eq!(graph.total_levels(), 0);
        assert!(graph.node("root").unwrap().is_unlocked());
        assert!(!graph.node("left").unwrap().is_unlocked());
    }

    // -----------------------------------------------------------------------
    // Test 8: Level persistence tolerates changed definitions
    // -----------------------------------------------------------------------
    #[test]
    fn restore_levels_skips_unknown_and_clamps() {
        let mut graph = diamond();
        let mut saved = BTreeMap::new();
        saved.insert(NodeId::new("root"), 99);
        saved.insert(NodeId::new("left"), 1);
        saved.insert(NodeId::new("retired_node"), 4);

        assert_eq!(graph.restore_levels(&saved), 1);
        assert_eq!(graph.level("root"), 3);
        assert_eq!(graph.level("left"), 1);
        assert!(graph.node("left").unwrap().is_unlocked());
        assert_eq!(graph.levels().len(), 2);
    }

    #[test]
    fn levels_round_trip() {
        let mut graph = diamond();
        let mut purse = CurrencyPool::new();
        purse.mint(num(1e6));
        graph.bulk_upgrade("root", 3, &mut purse);
        graph.upgrade("right", &mut purse).unwrap();
        let saved = graph.levels();

        let mut fresh = diamond();
        fresh.restore_levels(&saved);
        assert_eq!(fresh.levels(), saved);
        assert_eq!(fresh.locked(), graph.locked());
    }
}
