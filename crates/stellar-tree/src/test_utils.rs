//! Synthetic graphs for tests in this and downstream crates.

use stellar_core::Numeral;
use stellar_core::id::NodeId;
use stellar_core::ledger::CurrencyPool;

use crate::{NodeDef, Position, PrerequisiteGraph, UnlockRule};

/// A node definition with a unit effect.
pub fn def(id: &str, max_level: u32, base_cost: f64, multiplier: f64, prereqs: &[&str]) -> NodeDef<()> {
    NodeDef {
        id: NodeId::new(id),
        name: id.to_string(),
        max_level,
        base_cost: Numeral::from(base_cost),
        cost_multiplier: multiplier,
        prerequisites: prereqs.iter().map(|p| NodeId::new(*p)).collect(),
        effect: (),
        position: Position::default(),
        milestone: None,
    }
}

/// root(3) -> left(2), right(2) -> final(1), prerequisites must be maxed.
///
/// Costs: root 10 x1.5, left 100 x2, right 60 x2, final 1000 x1.
pub fn diamond() -> PrerequisiteGraph<()> {
    PrerequisiteGraph::new(
        UnlockRule::PrerequisitesMaxed,
        vec![
            def("root", 3, 10.0, 1.5, &[]),
            def("left", 2, 100.0, 2.0, &["root"]),
            def("right", 2, 60.0, 2.0, &["root"]),
            def("final", 1, 1000.0, 1.0, &["left", "right"]),
        ],
    )
    .expect("diamond graph is well-formed")
}

/// A currency pool holding `amount`.
pub fn wallet(amount: f64) -> CurrencyPool {
    let mut pool = CurrencyPool::new();
    pool.mint(Numeral::from(amount));
    pool
}
