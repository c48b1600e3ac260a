//! The built-in content catalog.
//!
//! A content file loaded through [`crate::load_content`] replaces this pack
//! wholesale.

use stellar_core::Numeral;
use stellar_core::id::{NodeId, PredicateId};
use stellar_tree::{NodeDef, Position};

use crate::schema::*;

fn n(value: f64) -> Numeral {
    Numeral::from(value)
}

#[allow(clippy::too_many_arguments)]
fn node<E>(
    id: &str,
    name: &str,
    max_level: u32,
    base_cost: f64,
    cost_multiplier: f64,
    prerequisites: &[&str],
    effect: E,
    (x, y): (f32, f32),
) -> NodeDef<E> {
    NodeDef {
        id: NodeId::new(id),
        name: name.to_string(),
        max_level,
        base_cost: n(base_cost),
        cost_multiplier,
        prerequisites: prerequisites.iter().map(|p| NodeId::new(*p)).collect(),
        effect,
        position: Position::new(x, y),
        milestone: None,
    }
}

/// The full catalog.
pub fn content() -> ContentPack {
    ContentPack {
        skills: skills(),
        ascension: ascension(),
        dimensions: dimensions(),
        quantum: quantum(),
        collapse: collapse(),
        artifacts: artifacts(),
        forge: forge(),
        achievements: achievements(),
        hints: hints(),
    }
}

// ===========================================================================
// Skill tiers
// ===========================================================================

pub fn skills() -> SkillTreeDef {
    use SkillEffect::*;

    let tier = |tier: u8, name: &str, required: f64, bonus: f64, new_nodes| SkillTierDef {
        tier,
        name: name.to_string(),
        required_energy: n(required),
        bonus,
        new_nodes,
    };

    SkillTreeDef {
        starting_energy: n(10.0),
        tiers: vec![
            tier(1, "Energy Seed", 1e5, 2.0, vec![
                node("t1_root", "Energy Core", 10, 10.0, 1.5, &[], Production(10.0), (0.0, 0.0)),
                node("t1_left", "Amplifier A", 5, 100.0, 1.8, &["t1_root"], Multiplier(2.0), (-1.0, 1.0)),
                node("t1_right", "Generator A", 10, 100.0, 1.7, &["t1_root"], Production(50.0), (1.0, 1.0)),
                node("t1_final", "Synthesis Node", 10, 2000.0, 1.6, &["t1_left", "t1_right"], Production(100.0), (0.0, 2.0)),
            ]),
            tier(2, "Power Network", 5e5, 4.0, vec![
                node("t2_amplifier_b", "Amplifier B", 8, 5e3, 2.0, &["t1_left"], Production(200.0), (-2.5, 2.0)),
                node("t2_generator_b", "Generator B", 8, 5e3, 2.0, &["t1_right"], Production(300.0), (2.5, 2.0)),
            ]),
            tier(3, "Synthesis Grid", 5e7, 8.0, vec![
                node("t3_amplifier_c", "Amplifier C", 7, 5e4, 2.1, &["t2_amplifier_b"], Production(500.0), (-3.5, 3.0)),
                node("t3_generator_c", "Generator C", 7, 5e4, 2.1, &["t2_generator_b"], Production(800.0), (3.5, 3.0)),
                node("t3_convergence", "Convergence Hub", 5, 5e5, 2.5, &["t3_amplifier_c", "t3_generator_c"], Multiplier(3.0), (0.0, 3.5)),
            ]),
            tier(4, "Nexus Array", 5e9, 16.0, vec![
                node("t4_amplifier_d", "Amplifier D", 6, 5e6, 2.2, &["t3_convergence"], Production(1500.0), (-4.5, 4.0)),
                node("t4_generator_d", "Generator D", 6, 5e6, 2.2, &["t3_convergence"], Production(2500.0), (4.5, 4.0)),
                node("t4_nexus_left", "Nexus Alpha", 4, 5e7, 2.8, &["t4_amplifier_d"], Multiplier(4.0), (-2.0, 4.5)),
                node("t4_nexus_right", "Nexus Beta", 4, 5e7, 2.8, &["t4_generator_d"], Multiplier(4.0), (2.0, 4.5)),
            ]),
            tier(5, "Ultimate Synthesis", 1e12, 32.0, vec![
                node("t5_amplifier_e", "Amplifier E", 5, 5e8, 2.3, &["t4_nexus_left"], Production(5000.0), (-5.5, 5.0)),
                node("t5_generator_e", "Generator E", 5, 5e8, 2.3, &["t4_nexus_right"], Production(8000.0), (5.5, 5.0)),
                node("t5_super_nexus", "Super Nexus", 4, 5e9, 2.8, &["t5_generator_e", "t5_amplifier_e"], Multiplier(5.0), (0.0, 5.5)),
                node("t5_ultimate_left", "Ultimate Synthesis Alpha", 3, 5e10, 3.0, &["t5_super_nexus"], Multiplier(6.0), (-3.0, 6.0)),
                node("t5_ultimate_right", "Ultimate Synthesis Beta", 3, 5e10, 3.0, &["t5_super_nexus"], Multiplier(6.0), (3.0, 6.0)),
            ]),
        ],
    }
}

// ===========================================================================
// Ascension
// ===========================================================================

pub fn ascension() -> Vec<NodeDef<AscensionEffect>> {
    use AscensionEffect::*;

    const ROW1: &[&str] = &["bulk_buy_5", "start_energy", "production_25"];
    const ROW2: &[&str] = &["warp_speed_1", "production_50", "cost_reduce_10"];
    const ROW5: &[&str] = &["bulk_buy_max", "skill_cap_increase", "production_200"];
    const WARP2: &[&str] = &["warp_speed_2", "cost_reduce_25", "production_100"];

    let single = |id: &str, name: &str, cost: f64, prereqs: &[&str], effect: AscensionEffect, pos: (f32, f32)| {
        node(id, name, 1, cost, 1.0, prereqs, effect, pos)
    };

    vec![
        single("auto_buy", "Automated Systems", 1.0, &[], AutoBuy, (0.0, 0.0)),
        single("bulk_buy_5", "Bulk Processing I", 1.0, &["auto_buy"], BulkBuy(5), (-1.0, 1.0)),
        single("start_energy", "Momentum Start", 1.0, &["auto_buy"], StartingEnergy(n(1000.0)), (0.0, 1.0)),
        single("production_25", "Power Enhancement I", 1.0, &["auto_buy"], ProductionBoost(0.25), (1.0, 1.0)),
        single("cost_reduce_10", "Cost Optimization I", 1.0, ROW1, CostReduction(0.10), (-1.0, 2.0)),
        single("warp_speed_1", "Warp Acceleration I", 2.0, ROW1, ThresholdReduction(0.20), (0.0, 2.0)),
        single("production_50", "Power Enhancement II", 2.0, ROW1, ProductionBoost(0.50), (1.0, 2.0)),
        single("auto_warp", "Automated Warping", 2.0, ROW2, AutoAdvance, (-1.5, 3.0)),
        single("bulk_buy_10", "Bulk Processing II", 2.0, &["cost_reduce_10", "production_25", "start_energy"], BulkBuy(10), (-0.5, 3.0)),
        single("offline_bonus", "Persistent Training", 2.0, ROW2, OfflineBonus(0.50), (0.5, 3.0)),
        single("multiplier_boost", "Multiplier Amplification", 2.0, &["production_50", "bulk_buy_10", "start_energy"], MultiplierBoost(0.20), (1.5, 3.0)),
        single("cost_reduce_25", "Cost Optimization II", 3.0, &["bulk_buy_10", "production_25", "start_energy"], CostReduction(0.25), (-1.0, 4.0)),
        single("warp_speed_2", "Warp Acceleration II", 3.0, &["offline_bonus", "bulk_buy_10", "multiplier_boost"], ThresholdReduction(0.40), (0.0, 4.0)),
        single("production_100", "Power Enhancement III", 3.0, &["multiplier_boost", "bulk_buy_10", "start_energy"], ProductionBoost(1.0), (1.0, 4.0)),
        single("bulk_buy_max", "Quantum Processing", 4.0, WARP2, BulkBuy(999), (-1.0, 5.0)),
        single("skill_cap_increase", "Limitless Growth", 4.0, WARP2, SkillCap(5), (0.0, 5.0)),
        single("production_200", "Power Enhancement IV", 4.0, WARP2, ProductionBoost(2.0), (1.0, 5.0)),
        single("prestige_keep_10", "Energy Retention I", 5.0, ROW5, KeepPercent(0.10), (-1.0, 6.0)),
        single("prestige_keep_25", "Energy Retention II", 6.0, ROW5, KeepPercent(0.25), (0.0, 6.0)),
        single("mega_boost", "Transcendent Power", 8.0, ROW5, ProductionBoost(5.0), (1.0, 6.0)),
    ]
}

// ===========================================================================
// Dimensions
// ===========================================================================

pub fn dimensions() -> Vec<DimensionDef> {
    use DimensionEffect::*;

    let cross = |target: Option<&str>, per_node| CrossDimension {
        target: target.map(str::to_string),
        per_node,
    };
    let dimension = |id: &str, name: &str, unlock_cost: f64, nodes| DimensionDef {
        id: id.to_string(),
        name: name.to_string(),
        unlock_cost: n(unlock_cost),
        nodes,
    };

    vec![
        dimension("void", "Void Dimension", 0.0, vec![
            node("void_root", "Void Gateway", 5, 1.0, 4.0, &[], ProductionMult(0.10), (0.0, 0.0)),
            node("void_left", "Dark Matter Infusion", 3, 3.0, 5.0, &["void_root"], MultiplierPower(0.03), (-1.0, 1.0)),
            node("void_right", "Entropy Collapse", 4, 3.0, 4.0, &["void_root"], ProductionMult(0.22), (1.0, 1.0)),
            node("void_deep_left", "Singularity Core", 3, 8.0, 6.0, &["void_left"], ProductionMult(0.25), (-2.0, 2.0)),
            node("void_deep_right", "Void Resonance", 1, 10.0, 1.0, &["void_right"], cross(Some("void"), 0.02), (2.0, 2.0)),
            node("void_convergence", "Event Horizon", 2, 15.0, 4.0, &["void_deep_left", "void_deep_right"], ProductionMult(0.35), (0.0, 3.0)),
            node("void_ultimate", "Cosmic Annihilation", 1, 25.0, 1.0, &["void_convergence"], ProductionMult(1.0), (0.0, 4.0)),
        ]),
        dimension("crystal", "Crystal Dimension", 10.0, vec![
            node("crystal_root", "Crystal Lattice", 10, 1.0, 2.0, &[], MultiplierPower(0.06), (0.0, 0.0)),
            node("crystal_left", "Prismatic Refraction", 8, 2.0, 1.6, &["crystal_root"], ProductionMult(0.12), (-1.5, 1.0)),
            node("crystal_center", "Stellar Crystallization", 5, 2.0, 2.0, &["crystal_root"], StellarCoreBonus(0.10), (0.0, 1.0)),
            node("crystal_right", "Faceted Growth", 3, 3.0, 3.0, &["crystal_root"], SkillCap(1), (1.5, 1.0)),
            node("crystal_branch_left", "Gemstone Amplifier", 6, 4.0, 2.0, &["crystal_left"], MultiplierPower(0.02), (-2.5, 2.0)),
            node("crystal_branch_right", "Diamond Optimization", 4, 4.0, 2.5, &["crystal_right"], StellarCoreBonus(0.15), (2.5, 2.0)),
            node("crystal_deep", "Crystal Harmony", 1, 8.0, 1.0, &["crystal_center", "crystal_left", "crystal_right"], cross(Some("crystal"), 0.01), (0.0, 2.5)),
            node("crystal_ultimate_left", "Eternal Clarity", 2, 12.0, 3.0, &["crystal_branch_left", "crystal_deep"], StellarCoreBonus(0.50), (-1.5, 3.5)),
            node("crystal_ultimate_right", "Perfect Structure", 5, 12.0, 2.0, &["crystal_branch_right", "crystal_deep"], ProductionMult(0.30), (1.5, 3.5)),
        ]),
        dimension("quantum", "Quantum Dimension", 15.0, vec![
            node("quantum_root", "Superposition", 6, 1.0, 2.5, &[], ProductionMult(0.15), (0.0, 0.0)),
            node("quantum_left", "Wave Function", 4, 2.0, 2.5, &["quantum_root"], MultiplierPower(0.04), (-1.0, 1.0)),
            node("quantum_right", "Particle Acceleration", 5, 2.0, 2.0, &["quantum_root"], MultiplierPower(0.06), (1.0, 1.0)),
            node("quantum_entangle_left", "Quantum Entanglement", 4, 5.0, 3.0, &["quantum_left"], ProductionMult(0.20), (-2.0, 2.0)),
            node("quantum_entangle_right", "Heisenberg Uncertainty", 4, 5.0, 2.5, &["quantum_right"], ProductionMult(0.28), (2.0, 2.0)),
            node("quantum_synergy", "Quantum Coherence", 1, 10.0, 1.0, &["quantum_entangle_left", "quantum_entangle_right"], cross(Some("quantum"), 0.03), (0.0, 2.5)),
            node("quantum_collapse", "Quantum Collapse", 2, 15.0, 4.0, &["quantum_synergy"], MultiplierPower(0.08), (0.0, 3.5)),
            node("quantum_ultimate", "Schrodinger's Paradox", 1, 20.0, 1.0, &["quantum_collapse"], ProductionMult(0.50), (0.0, 4.5)),
        ]),
        dimension("temporal", "Temporal Dimension", 20.0, vec![
            node("temporal_root", "Time Stream", 8, 1.0, 2.5, &[], ProductionMult(0.10), (0.0, 0.0)),
            node("temporal_left", "Temporal Acceleration", 5, 2.0, 2.0, &["temporal_root"], ProductionMult(0.30), (-1.0, 1.0)),
            node("temporal_right", "Chronos Blessing", 6, 2.0, 2.0, &["temporal_root"], MultiplierPower(0.08), (1.0, 1.0)),
            node("temporal_loop", "Time Dilation", 3, 4.0, 3.0, &["temporal_left", "temporal_right"], SkillCap(2), (0.0, 2.0)),
            node("temporal_branch_left", "Past Echo", 5, 6.0, 2.5, &["temporal_loop"], ProductionMult(0.18), (-1.5, 3.0)),
            node("temporal_branch_right", "Future Vision", 2, 7.0, 4.0, &["temporal_loop"], SkillCap(1), (1.5, 3.0)),
            node("temporal_synergy", "Temporal Convergence", 1, 12.0, 1.0, &["temporal_branch_left", "temporal_branch_right"], cross(Some("temporal"), 0.025), (0.0, 4.0)),
            node("temporal_ultimate", "Eternal Moment", 2, 18.0, 3.0, &["temporal_synergy"], MultiplierPower(0.10), (0.0, 5.0)),
        ]),
        dimension("prism", "Prism Dimension", 25.0, vec![
            node("prism_root", "Prismatic Core", 8, 1.0, 2.0, &[], AllAspects(0.05), (0.0, 0.0)),
            node("prism_production", "Radiant Power", 6, 2.0, 2.0, &["prism_root"], ProductionMult(0.25), (-2.0, 1.0)),
            node("prism_cost", "Efficient Spectrum", 6, 2.0, 2.0, &["prism_root"], CostReduction(0.05), (2.0, 1.0)),
            node("prism_multiplier", "Amplified Light", 6, 2.0, 2.0, &["prism_root"], MultiplierPower(0.05), (0.0, 1.0)),
            node("prism_warp", "Light Speed", 4, 4.0, 2.5, &["prism_production", "prism_multiplier"], StellarCoreBonus(0.20), (-1.0, 2.0)),
            node("prism_retention", "Spectrum Amplifier", 3, 4.0, 3.0, &["prism_cost", "prism_multiplier"], ProductionMult(0.25), (1.0, 2.0)),
            node("prism_synergy", "Rainbow Resonance", 1, 10.0, 1.0, &["prism_warp", "prism_retention"], cross(None, 0.005), (0.0, 3.0)),
            node("prism_cap", "Limitless Refraction", 2, 12.0, 4.0, &["prism_synergy"], SkillCap(2), (-1.0, 4.0)),
            node("prism_stellar", "Prismatic Ascension", 2, 15.0, 4.0, &["prism_synergy"], StellarCoreBonus(1.0), (1.0, 4.0)),
            node("prism_ultimate", "Chromatic Singularity", 1, 30.0, 1.0, &["prism_cap", "prism_stellar"], ProductionMult(2.0), (0.0, 5.0)),
        ]),
    ]
}

// ===========================================================================
// Quantum layer
// ===========================================================================

pub fn quantum() -> QuantumDef {
    use QuantumEffect::*;

    let gated = |mut def: NodeDef<QuantumEffect>| {
        def.milestone = Some(n(1e5));
        def
    };
    let tree = |id: &str, name: &str, nodes| QuantumTreeDef {
        id: id.to_string(),
        name: name.to_string(),
        nodes,
    };
    let synergy = |id: &str, name: &str, requires: &[&str], bonus| SynergyDef {
        id: id.to_string(),
        name: name.to_string(),
        requires: requires.iter().map(|r| NodeId::new(*r)).collect(),
        bonus,
    };

    QuantumDef {
        base_production: Numeral::ONE,
        trees: vec![
            tree("matter", "Matter", vec![
                node("matter_1", "Quantum Foam", 10, 10.0, 1.5, &[], Production(1.0), (2.0, 0.0)),
                node("matter_2", "Particle Genesis", 10, 50.0, 1.6, &["matter_1"], Production(5.0), (1.0, 1.0)),
                node("matter_3", "Atomic Forge", 10, 250.0, 1.7, &["matter_2"], Production(25.0), (0.0, 2.0)),
                node("matter_4", "Mass Amplification", 5, 500.0, 2.0, &["matter_2"], Multiplier(0.5), (2.0, 2.0)),
                node("matter_5", "Molecular Assembly", 10, 1000.0, 1.8, &["matter_3", "matter_4"], Production(100.0), (1.0, 3.0)),
                node("matter_6", "Matter-Energy Bridge", 1, 2500.0, 1.0, &["matter_4"], Bridge, (3.0, 2.0)),
                gated(node("matter_7", "Complex Structures", 10, 5000.0, 1.9, &["matter_5"], Production(500.0), (1.0, 4.0))),
            ]),
            tree("energy", "Energy", vec![
                node("energy_1", "Quantum Field", 10, 10.0, 1.5, &[], Multiplier(0.1), (6.0, 0.0)),
                node("energy_2", "Wave Function", 10, 50.0, 1.6, &["energy_1"], Multiplier(0.25), (7.0, 1.0)),
                node("energy_3", "Photon Stream", 10, 250.0, 1.7, &["energy_2"], Multiplier(0.5), (8.0, 2.0)),
                node("energy_4", "Zero Point", 10, 500.0, 2.0, &["energy_2"], Production(50.0), (6.0, 2.0)),
                node("energy_5", "Resonance Cascade", 5, 1000.0, 1.8, &["energy_3", "energy_4"], Multiplier(1.0), (7.0, 3.0)),
                node("energy_6", "Energy-Time Nexus", 1, 2500.0, 1.0, &["energy_4"], Bridge, (5.0, 2.0)),
                gated(node("energy_7", "Singularity Core", 10, 5000.0, 1.9, &["energy_5"], Multiplier(2.0), (7.0, 4.0))),
            ]),
            tree("time", "Time", vec![
                node("time_1", "Temporal Flow", 10, 10.0, 1.5, &[], Production(0.5), (10.0, 0.0)),
                node("time_2", "Causality Loop", 10, 50.0, 1.6, &["time_1"], Multiplier(0.15), (11.0, 1.0)),
                node("time_3", "Chrono Compression", 10, 250.0, 1.7, &["time_2"], Production(20.0), (12.0, 2.0)),
                node("time_4", "Future Echo", 5, 500.0, 2.0, &["time_2"], Multiplier(0.2), (10.0, 2.0)),
                node("time_5", "Parallel Timelines", 10, 1000.0, 1.8, &["time_3", "time_4"], Multiplier(0.75), (11.0, 3.0)),
                node("time_6", "Time-Matter Convergence", 1, 2500.0, 1.0, &["time_4"], Bridge, (9.0, 2.0)),
                gated(node("time_7", "Eternal Moment", 5, 5000.0, 1.9, &["time_5"], Multiplier(1.5), (11.0, 4.0))),
            ]),
        ],
        synergies: vec![
            synergy("synergy_matter_energy", "Mass-Energy Equivalence", &["matter_6", "energy_1"], SynergyBonus::Multiplier(0.5)),
            synergy("synergy_energy_time", "Temporal Energization", &["energy_6", "time_1"], SynergyBonus::Multiplier(0.75)),
            synergy("synergy_time_matter", "Accelerated Genesis", &["time_6", "matter_1"], SynergyBonus::Production(100.0)),
            synergy("synergy_trinity", "Quantum Trinity", &["matter_6", "energy_6", "time_6"], SynergyBonus::Multiplier(2.0)),
            synergy("synergy_advanced_matter", "Dense Matter", &["matter_3", "matter_5", "matter_7"], SynergyBonus::Production(200.0)),
            synergy("synergy_advanced_energy", "Hyper Energized", &["energy_3", "energy_5", "energy_7"], SynergyBonus::Multiplier(1.5)),
            synergy("synergy_advanced_time", "Temporal Mastery", &["time_3", "time_5", "time_7"], SynergyBonus::Multiplier(1.0)),
        ],
        milestones: vec![n(1e5), n(1e6), n(1e7)],
    }
}

/// Everything from the skill, ascension and dimension achievement groups.
pub fn collapse() -> CollapseDef {
    const REQUIRED: &[&str] = &[
        "first_skill", "tier1_complete", "tier2_complete", "tier3_complete",
        "tier4_complete", "tier5_complete", "all_tiers_complete",
        "first_warp", "warp_5", "warp_10", "warp_25",
        "stellar_100", "stellar_250", "stellar_400",
        "ascension_unlocked", "ascension_tier1_complete", "ascension_tier2_complete",
        "ascension_tier3_complete", "ascension_all_complete",
        "dimensions_unlocked", "first_transcend", "transcend_10", "transcend_50", "transcend_100",
        "echo_100", "echo_500", "echo_1000", "echo_5000",
        "dimension_void_unlocked", "dimension_crystal_unlocked", "dimension_quantum_unlocked",
        "dimension_temporal_unlocked", "dimension_prism_unlocked", "all_dimensions_unlocked",
    ];
    CollapseDef {
        required: REQUIRED.iter().map(|id| PredicateId::new(*id)).collect(),
    }
}

// ===========================================================================
// Artifacts
// ===========================================================================

pub fn artifacts() -> ArtifactsDef {
    use ArtifactEffect::*;

    const COSTS: [f64; 10] = [5e7, 1e8, 1e9, 1e10, 1e12, 1e13, 1e14, 1e15, 1e16, 1e17];
    const REQUIRED: [f64; 10] = [5e7, 1e8, 2.5e8, 5e8, 1e9, 2.5e9, 5e9, 1e10, 2.5e10, 5e10];

    let branches: [(ArtifactBranch, &str, f32, [(&str, ArtifactEffect); 10]); 3] = [
        (ArtifactBranch::Production, "prod", 0.0, [
            ("Energy Amplifier", FlatProduction(100.0)),
            ("Quantum Resonator", FlatProduction(500.0)),
            ("Stellar Forge", FlatProduction(2000.0)),
            ("Dimensional Generator", FlatProduction(10_000.0)),
            ("Cosmic Accelerator", FlatProduction(50_000.0)),
            ("Reality Shaper", FlatProduction(250_000.0)),
            ("Universal Engine", FlatProduction(1_000_000.0)),
            ("Infinity Core", FlatProduction(5_000_000.0)),
            ("Omniverse Reactor", FlatProduction(25_000_000.0)),
            ("Absolute Genesis", FlatProduction(100_000_000.0)),
        ]),
        (ArtifactBranch::Multiplier, "mult", 1.0, [
            ("Power Conduit", Multiplier(2.0)),
            ("Synergy Matrix", Multiplier(5.0)),
            ("Exponential Lens", Multiplier(10.0)),
            ("Cascade Amplifier", Multiplier(25.0)),
            ("Singularity Compressor", Multiplier(100.0)),
            ("Hyperbolic Chamber", Multiplier(500.0)),
            ("Quantum Superposition", Multiplier(2500.0)),
            ("Temporal Recursion", Multiplier(10_000.0)),
            ("Probability Manipulator", Multiplier(50_000.0)),
            ("Absolute Convergence", Multiplier(250_000.0)),
        ]),
        (ArtifactBranch::Efficiency, "eff", 2.0, [
            ("Idle Optimizer", Idle(50.0)),
            ("Scaling Converter", Scaling(2.0)),
            ("Bank Multiplier", StoredQuanta(2.0)),
            ("Persistent Engine", Persistent(10.0)),
            ("Quantum Catalyst", Effectiveness(25.0)),
            ("Advanced Scaling", Scaling(5.0)),
            ("Deep Storage Bonus", StoredQuanta(5.0)),
            ("Compound Interest", Compound(2.0)),
            ("Hyper Catalyst", Effectiveness(75.0)),
            ("Infinite Compounding", Compound(10.0)),
        ]),
    ];

    let mut list = Vec::new();
    for (branch, prefix, column, tiers) in branches {
        for (i, (name, effect)) in tiers.into_iter().enumerate() {
            let tier = i as u32 + 1;
            let previous = format!("{prefix}_{i}");
            let prerequisites: Vec<&str> = if i == 0 { vec![] } else { vec![previous.as_str()] };
            let mut def = node(
                &format!("{prefix}_{tier}"),
                name,
                1,
                COSTS[i],
                1.0,
                &prerequisites,
                Artifact { branch, tier, effect },
                (column, i as f32),
            );
            def.milestone = Some(n(REQUIRED[i]));
            list.push(def);
        }
    }

    ArtifactsDef {
        unlock_total_quanta: n(5e7),
        stored_quanta_step: n(1e7),
        persistent_cap_minutes: 50.0,
        artifacts: list,
    }
}

// ===========================================================================
// Probability forge
// ===========================================================================

pub fn forge() -> ForgeDef {
    use FateEffect::*;

    let band = |rarity, count, min_multiplier, max_multiplier, base_weight| OutcomeBand {
        rarity,
        count,
        min_multiplier,
        max_multiplier,
        base_weight,
    };
    let weight = |id, name, cost, max_level, effect| node(id, name, max_level, cost, 2.0, &[], effect, (0.0, 0.0));

    ForgeDef {
        unlock_total_quanta: n(1e18),
        token_rate: 1.0,
        token_bonus_per_discovery: 0.02,
        pull_base_cost: 10.0,
        pull_cost_growth: 1.05,
        bands: vec![
            band(Rarity::Common, 40, 1.1, 1.5, 60.0),
            band(Rarity::Uncommon, 30, 2.0, 5.0, 25.0),
            band(Rarity::Rare, 20, 10.0, 50.0, 10.0),
            band(Rarity::Epic, 8, 100.0, 450.0, 4.0),
            band(Rarity::Mythic, 2, 1000.0, 5000.0, 1.0),
        ],
        weights: vec![
            weight("shift_uncommon", "Uncommon Bias", 50.0, 10, RarityShift { rarity: Rarity::Uncommon, per_level: 2.0 }),
            weight("shift_rare", "Rare Attunement", 200.0, 10, RarityShift { rarity: Rarity::Rare, per_level: 1.0 }),
            weight("shift_epic", "Epic Magnetism", 800.0, 10, RarityShift { rarity: Rarity::Epic, per_level: 0.5 }),
            weight("shift_mythic", "Mythic Convergence", 3000.0, 15, RarityShift { rarity: Rarity::Mythic, per_level: 0.2 }),
            weight("reroll_1", "Second Chance", 100.0, 1, Reroll(1)),
            weight("reroll_2", "Third Chance", 500.0, 1, Reroll(2)),
            weight("reroll_3", "Endless Chances", 2000.0, 1, Reroll(5)),
            weight("pity_rare", "Rare Guarantee", 400.0, 1, Pity { rarity: Rarity::Rare, threshold: 50 }),
            weight("pity_epic", "Epic Guarantee", 1500.0, 1, Pity { rarity: Rarity::Epic, threshold: 100 }),
            weight("pity_mythic", "Mythic Guarantee", 5000.0, 1, Pity { rarity: Rarity::Mythic, threshold: 200 }),
            weight("dupe_protection", "Anti-Duplication Field", 1000.0, 1, DuplicateProtection { chance: 0.75 }),
            weight("streak_bonus", "Hot Streak", 600.0, 10, StreakBonus { percent_per_level: 10.0 }),
            weight("expo_scaling", "Cascade Effect", 10_000.0, 1, MythicScaling { per_mythic: 0.1 }),
        ],
    }
}

// ===========================================================================
// Achievements
// ===========================================================================

pub fn achievements() -> Vec<AchievementDef> {
    use AchievementCategory::*;
    use Condition::*;
    use RewardTarget::*;

    let plain = |id: &str, name: &str, category, condition| AchievementDef {
        id: PredicateId::new(id),
        name: name.to_string(),
        category,
        condition,
        reward: Reward::None,
    };
    let boost = |id: &str, name: &str, category, condition, target, value| AchievementDef {
        reward: Reward::Multiplier { target, value },
        ..plain(id, name, category, condition)
    };
    let automation = |id: &str, name: &str, category, condition, capability| AchievementDef {
        reward: Reward::Automation(capability),
        ..plain(id, name, category, condition)
    };

    vec![
        plain("energy_1k", "Spark of Power", Energy, EnergyAtLeast(n(1e3))),
        plain("energy_1m", "Energy Surge", Energy, EnergyAtLeast(n(1e6))),
        plain("energy_1b", "Power Overwhelming", Energy, EnergyAtLeast(n(1e9))),
        plain("energy_1t", "Cosmic Battery", Energy, EnergyAtLeast(n(1e12))),
        plain("energy_1qa", "Stellar Dynamo", Energy, EnergyAtLeast(n(1e15))),
        plain("production_100", "Efficient Generator", Energy, EnergyRateAtLeast(n(100.0))),
        plain("production_10k", "Power Plant", Energy, EnergyRateAtLeast(n(1e4))),
        plain("production_1m", "Industrial Complex", Energy, EnergyRateAtLeast(n(1e6))),
        plain("production_1b", "Stellar Forge", Energy, EnergyRateAtLeast(n(1e9))),
        plain("first_skill", "First Steps", Stellar, AnySkillPurchased),
        plain("tier1_complete", "Energy Seed Mastery", Stellar, SkillTierComplete(1)),
        plain("tier2_complete", "Power Network Mastery", Stellar, SkillTierComplete(2)),
        plain("tier3_complete", "Synthesis Grid Mastery", Stellar, SkillTierComplete(3)),
        plain("tier4_complete", "Nexus Array Mastery", Stellar, SkillTierComplete(4)),
        automation("tier5_complete", "Ultimate Synthesis Mastery", Stellar, SkillTierComplete(5), Capability::AutoBuy),
        boost("all_tiers_complete", "Stellar Network Complete", Stellar, AllSkillTiersComplete, EnergyProduction, 1.05),
        plain("first_warp", "Space-Time Novice", Ascension, AdvancesAtLeast(1)),
        automation("warp_5", "Warp Veteran", Ascension, AdvancesAtLeast(5), Capability::AutoAdvance),
        plain("warp_10", "Master Navigator", Ascension, AdvancesAtLeast(10)),
        plain("warp_25", "Reality Bender", Ascension, AdvancesAtLeast(25)),
        plain("stellar_100", "Stellar Collector", Ascension, AscensionPointsAtLeast(n(100.0))),
        plain("stellar_250", "Stellar Hoarder", Ascension, AscensionPointsAtLeast(n(250.0))),
        boost("stellar_400", "Stellar Magnate", Ascension, AscensionPointsAtLeast(n(400.0)), AscensionPoints, 1.1),
        plain("ascension_unlocked", "Nexus Awakening", Ascension, AscensionPointsAtLeast(Numeral::ONE)),
        plain("ascension_tier1_complete", "Foundation Architect", Ascension, AscensionRowsComplete { from_row: 0.0, to_row: 1.0 }),
        plain("ascension_tier2_complete", "Enhancement Expert", Ascension, AscensionRowsComplete { from_row: 2.0, to_row: 3.0 }),
        plain("ascension_tier3_complete", "Transcendence Master", Ascension, AscensionRowsComplete { from_row: 4.0, to_row: 5.0 }),
        boost("ascension_all_complete", "Stellar Nexus Complete", Ascension, AscensionComplete, AscensionBonus, 1.15),
        plain("dimensions_unlocked", "Dimensional Awakening", Dimension, EchoFragmentsAtLeast(Numeral::ONE)),
        plain("first_transcend", "Echo Seeker", Dimension, TranscendsAtLeast(1)),
        plain("transcend_10", "Echo Collector", Dimension, TranscendsAtLeast(10)),
        plain("transcend_50", "Echo Master", Dimension, TranscendsAtLeast(50)),
        boost("transcend_100", "Echo Incarnate", Dimension, TranscendsAtLeast(100), EchoFragments, 1.1),
        plain("echo_100", "Fragment Gatherer", Dimension, EchoFragmentsAtLeast(n(100.0))),
        plain("echo_500", "Fragment Collector", Dimension, EchoFragmentsAtLeast(n(500.0))),
        plain("echo_1000", "Fragment Hoarder", Dimension, EchoFragmentsAtLeast(n(1000.0))),
        boost("echo_5000", "Fragment Magnate", Dimension, EchoFragmentsAtLeast(n(5000.0)), EchoFragments, 1.2),
        plain("dimension_void_unlocked", "Void Walker", Dimension, DimensionUnlocked("void".into())),
        plain("dimension_crystal_unlocked", "Crystal Architect", Dimension, DimensionUnlocked("crystal".into())),
        plain("dimension_quantum_unlocked", "Quantum Explorer", Dimension, DimensionUnlocked("quantum".into())),
        plain("dimension_temporal_unlocked", "Time Weaver", Dimension, DimensionUnlocked("temporal".into())),
        plain("dimension_prism_unlocked", "Prism Master", Dimension, DimensionUnlocked("prism".into())),
        boost("all_dimensions_unlocked", "Dimensional Sovereign", Dimension, AllDimensionsUnlocked, DimensionBonus, 1.25),
        plain("progression_1hour", "Committed Explorer", Progression, PlayTimeAtLeast(3600.0)),
        plain("progression_10hours", "Dedicated Researcher", Progression, PlayTimeAtLeast(36_000.0)),
        boost("progression_100hours", "Eternal Student", Progression, PlayTimeAtLeast(360_000.0), OfflineProduction, 1.05),
        plain("no_warp_1b", "Patient Accumulator", Progression, EnergyWithoutAdvance(n(1e9))),
        plain("fast_warp", "Speed Runner", Speed, FastAdvance(300.0)),
        boost("fast_tier5", "Lightning Fast", Speed, FastTopTier(3600.0), EnergyProduction, 1.1),
        plain("welcome", "Welcome to Stellar Infinitum", Special, Always),
        plain("save_import", "Traveler Between Worlds", Special, SaveImported),
        plain("offline_8hours", "Long Journey", Special, OfflineAtLeast(28_800.0)),
        plain("overflow_prevention", "Number Wrangler", Special, EnergyAtLeast(n(1e100))),
        AchievementDef {
            reward: Reward::Multiplier { target: EnergyProduction, value: 1.25 },
            ..plain("max_all_trees", "Perfect Harmony", Special, AllTreesMaxed)
        },
        plain("cosmic_collapse", "Big Crunch", Special, Collapsed),
        plain("quantum_beginner", "Quantum Initiate", Progression, QuantaGeneratedAtLeast(n(1e5))),
        plain("quantum_intermediate", "Quantum Adept", Progression, QuantaGeneratedAtLeast(n(1e6))),
        plain("first_synergy", "Synergistic", Progression, SynergiesActive(1)),
        boost("all_synergies", "Master of Synergy", Progression, SynergiesActive(7), QuantaProduction, 1.5),
        plain("first_entanglement", "Quantum Entangled", Progression, EntanglementsActive(1)),
        plain("many_entanglements", "Entanglement Web", Progression, EntanglementsActive(4)),
        plain("max_matter_tree", "Master of Matter", Progression, QuantumTreeMaxed("matter".into())),
        plain("max_energy_tree", "Master of Energy", Progression, QuantumTreeMaxed("energy".into())),
        plain("max_time_tree", "Master of Time", Progression, QuantumTreeMaxed("time".into())),
        boost("quantum_trinity", "Trinity Complete", Progression, AllQuantumTreesMaxed, QuantaProduction, 2.0),
    ]
}

pub fn hints() -> Vec<HintDef> {
    use Condition::*;

    let hint = |id: &str, trigger| HintDef {
        id: id.to_string(),
        trigger,
    };
    vec![
        hint("game_start", Always),
        hint("first_warp", AdvancesAtLeast(1)),
        hint("stellar_nexus", AscensionPointsAtLeast(Numeral::ONE)),
        hint("first_transcend", TranscendsAtLeast(1)),
        hint("dimensional_echoes", EchoFragmentsAtLeast(Numeral::ONE)),
        hint("cosmic_collapse", Collapsed),
        hint("artifacts_unlocked", ArtifactsAvailable),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_sizes() {
        let content = content();
        assert_eq!(content.ascension.len(), 20);
        assert_eq!(content.dimensions.len(), 5);
        assert_eq!(
            content.dimensions.iter().map(|d| d.nodes.len()).sum::<usize>(),
            42
        );
        assert_eq!(content.quantum.trees.len(), 3);
        assert!(content.quantum.trees.iter().all(|t| t.nodes.len() == 7));
        assert_eq!(content.quantum.synergies.len(), 7);
        assert_eq!(content.artifacts.artifacts.len(), 30);
        assert_eq!(content.forge.weights.len(), 13);
        assert_eq!(content.achievements.len(), 65);
        assert_eq!(content.collapse.required.len(), 34);
    }

    #[test]
    fn artifact_chain_links_previous_tier() {
        let artifacts = artifacts();
        let eff_3 = artifacts
            .artifacts
            .iter()
            .find(|a| a.id.as_str() == "eff_3")
            .unwrap();
        assert_eq!(eff_3.prerequisites, vec![NodeId::new("eff_2")]);
        assert_eq!(eff_3.milestone, Some(n(2.5e8)));
        assert_eq!(eff_3.effect.tier, 3);
        assert_eq!(artifacts.max_tier(ArtifactBranch::Efficiency), 10);
    }

    #[test]
    fn top_quantum_nodes_are_milestone_gated() {
        let quantum = quantum();
        for tree in &quantum.trees {
            let gated: Vec<_> = tree
                .nodes
                .iter()
                .filter(|n| n.milestone.is_some())
                .map(|n| n.id.as_str())
                .collect();
            assert_eq!(gated, vec![format!("{}_7", tree.id).as_str()]);
        }
    }

    #[test]
    fn automation_rewards() {
        let grants: Vec<_> = achievements()
            .into_iter()
            .filter_map(|a| match a.reward {
                Reward::Automation(c) => Some((a.id.as_str().to_string(), c)),
                _ => None,
            })
            .collect();
        assert_eq!(
            grants,
            vec![
                ("tier5_complete".to_string(), Capability::AutoBuy),
                ("warp_5".to_string(), Capability::AutoAdvance),
            ]
        );
    }
}
