//! Serde structs for progression content.
//!
//! Node effects are closed enums per layer; the engine interprets them. Trees
//! are plain [`NodeDef`] lists so the same definitions build a
//! [`PrerequisiteGraph`](stellar_tree::PrerequisiteGraph) at startup.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use stellar_core::Numeral;
use stellar_core::id::{NodeId, OutcomeId, PredicateId};
use stellar_tree::NodeDef;

// ===========================================================================
// Errors
// ===========================================================================

/// Cross-reference problems in a content pack. Graph-shape problems (cycles,
/// dangling prerequisites) are reported when the graphs are built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContentError {
    #[error("skill tiers must be numbered 1..={expected}, found tier {found}")]
    TierOrder { expected: usize, found: u8 },

    #[error("skill tier {0} has a non-positive advance bonus")]
    TierBonus(u8),

    #[error("duplicate {kind} id '{id}'")]
    Duplicate { kind: &'static str, id: String },

    #[error("{owner} references unknown {kind} '{id}'")]
    UnknownReference {
        owner: String,
        kind: &'static str,
        id: String,
    },

    #[error("outcome band for {0:?} is empty or has a negative weight")]
    EmptyBand(Rarity),
}

// ===========================================================================
// Skill tiers
// ===========================================================================

/// Effect of one level of a skill node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillEffect {
    /// Flat Energy/s per level.
    Production(f64),
    /// Factor compounded once per level.
    Multiplier(f64),
    /// Fraction of bonus per maxed skill node, per level.
    Synergy(f64),
    /// Fraction of bonus per held ascension point, per level.
    CoreResonance(f64),
    /// Fraction of bonus per advance in the current run, per level.
    Momentum(f64),
}

/// One sub-tier. Its graph is every node of tiers `1..=tier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTierDef {
    pub tier: u8,
    pub name: String,

    /// Energy needed, with the tier maxed, to advance.
    pub required_energy: Numeral,

    /// Run multiplier factor earned on advancing out of this tier.
    pub bonus: f64,

    /// Nodes introduced by this tier.
    #[serde(default)]
    pub new_nodes: Vec<NodeDef<SkillEffect>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTreeDef {
    /// Energy after a reset before any starting bonus.
    pub starting_energy: Numeral,
    pub tiers: Vec<SkillTierDef>,
}

impl SkillTreeDef {
    pub fn top_tier(&self) -> u8 {
        self.tiers.len() as u8
    }

    pub fn tier(&self, tier: u8) -> Option<&SkillTierDef> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    /// Cumulative node list of `tier`.
    pub fn nodes_for(&self, tier: u8) -> Vec<NodeDef<SkillEffect>> {
        self.tiers
            .iter()
            .filter(|t| t.tier <= tier)
            .flat_map(|t| t.new_nodes.iter().cloned())
            .collect()
    }
}

// ===========================================================================
// Ascension
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AscensionEffect {
    AutoBuy,
    AutoAdvance,
    /// Levels bought per node per automation pass; the highest owned wins.
    BulkBuy(u32),
    StartingEnergy(Numeral),
    /// Additive production boost fraction.
    ProductionBoost(f64),
    /// Skill cost discount; the highest owned wins.
    CostReduction(f64),
    /// Advance threshold discount; the highest owned wins.
    ThresholdReduction(f64),
    OfflineBonus(f64),
    /// Strength boost for skill multiplier nodes.
    MultiplierBoost(f64),
    SkillCap(u32),
    /// Fraction of Energy kept through a tier advance; the highest owned wins.
    KeepPercent(f64),
}

// ===========================================================================
// Dimensions
// ===========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionEffect {
    /// Production factor `(1 + v)` compounded per level.
    ProductionMult(f64),
    /// Additive multiplier strength boost per level.
    MultiplierPower(f64),
    /// Extra skill max level per level.
    SkillCap(u32),
    /// Additive ascension point mint bonus per level.
    StellarCoreBonus(f64),
    /// Dimensional skill cost discount per level.
    CostReduction(f64),
    /// `(1 + per_node * leveled nodes)` of `target`, or of every unlocked
    /// dimension when `target` is `None`.
    CrossDimension {
        #[serde(default)]
        target: Option<String>,
        per_node: f64,
    },
    /// `(1 + v * level)` applied to every production aspect.
    AllAspects(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDef {
    pub id: String,
    pub name: String,

    /// Echo Fragments consumed, once, to open the dimension.
    pub unlock_cost: Numeral,
    pub nodes: Vec<NodeDef<DimensionEffect>>,
}

// ===========================================================================
// Quantum layer
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantumEffect {
    /// Flat Quanta/s per level.
    Production(f64),
    /// Factor `(1 + v)` compounded per level.
    Multiplier(f64),
    /// No direct effect; a synergy ingredient.
    Bridge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumTreeDef {
    pub id: String,
    pub name: String,
    pub nodes: Vec<NodeDef<QuantumEffect>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynergyBonus {
    Production(f64),
    Multiplier(f64),
}

/// Active while every listed node has a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynergyDef {
    pub id: String,
    pub name: String,
    pub requires: Vec<NodeId>,
    pub bonus: SynergyBonus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumDef {
    pub base_production: Numeral,
    pub trees: Vec<QuantumTreeDef>,
    pub synergies: Vec<SynergyDef>,

    /// Lifetime Quanta marks, each recorded once.
    pub milestones: Vec<Numeral>,
}

impl QuantumDef {
    /// Which tree owns `node`.
    pub fn tree_of(&self, node: &str) -> Option<&str> {
        self.trees
            .iter()
            .find(|t| t.nodes.iter().any(|n| n.id.as_str() == node))
            .map(|t| t.id.as_str())
    }

    /// Synergies whose ingredients span more than one tree.
    pub fn is_cross_tree(&self, synergy: &SynergyDef) -> bool {
        let trees: HashSet<_> = synergy
            .requires
            .iter()
            .filter_map(|n| self.tree_of(n.as_str()))
            .collect();
        trees.len() > 1
    }
}

/// Gate of the Dimensional to Quantum transition. Every dimension node maxed
/// is implied; `required` lists the achievements that must also be unlocked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollapseDef {
    pub required: Vec<PredicateId>,
}

// ===========================================================================
// Artifacts
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactBranch {
    Production,
    Multiplier,
    Efficiency,
}

impl ArtifactBranch {
    pub const ALL: [ArtifactBranch; 3] = [
        ArtifactBranch::Production,
        ArtifactBranch::Multiplier,
        ArtifactBranch::Efficiency,
    ];
}

/// Values are percentages except `Multiplier`, which is a plain factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactEffect {
    FlatProduction(f64),
    Multiplier(f64),
    /// Offline Quanta bonus.
    Idle(f64),
    /// Per quantum node level.
    Scaling(f64),
    /// Per stored-Quanta step held.
    StoredQuanta(f64),
    /// Per session minute, capped.
    Persistent(f64),
    /// Per session minute, uncapped.
    Compound(f64),
    /// Scales every other active artifact effect.
    Effectiveness(f64),
}

/// Effect payload of an artifact node. Artifacts are single-level nodes whose
/// milestone is the lifetime Quanta requirement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub branch: ArtifactBranch,
    pub tier: u32,
    pub effect: ArtifactEffect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsDef {
    /// Lifetime Quanta at which artifacts become available.
    pub unlock_total_quanta: Numeral,
    pub stored_quanta_step: Numeral,
    pub persistent_cap_minutes: f64,
    pub artifacts: Vec<NodeDef<Artifact>>,
}

impl ArtifactsDef {
    pub fn max_tier(&self, branch: ArtifactBranch) -> u32 {
        self.artifacts
            .iter()
            .filter(|a| a.effect.branch == branch)
            .map(|a| a.effect.tier)
            .max()
            .unwrap_or(0)
    }
}

// ===========================================================================
// Probability forge
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Mythic,
}

impl Rarity {
    /// Roll order.
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Mythic,
    ];

    pub fn is_rare_or_better(self) -> bool {
        self >= Rarity::Rare
    }

    fn prefix(self) -> char {
        match self {
            Rarity::Common => 'c',
            Rarity::Uncommon => 'u',
            Rarity::Rare => 'r',
            Rarity::Epic => 'e',
            Rarity::Mythic => 'm',
        }
    }
}

/// `count` outcomes of one rarity with multipliers spread evenly from
/// `min_multiplier` to `max_multiplier`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeBand {
    pub rarity: Rarity,
    pub count: u32,
    pub min_multiplier: f64,
    pub max_multiplier: f64,

    /// Relative roll weight before fate weights.
    pub base_weight: f64,
}

/// A concrete pullable outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub id: OutcomeId,
    pub rarity: Rarity,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FateEffect {
    /// Adds `per_level` to the weight of `rarity`.
    RarityShift { rarity: Rarity, per_level: f64 },
    /// Extra rolls when a roll lands on Common; the best result is kept.
    Reroll(u32),
    /// Guarantees `rarity` after `threshold` pulls without it.
    Pity { rarity: Rarity, threshold: u32 },
    /// Chance to redirect a pull toward an undiscovered outcome.
    DuplicateProtection { chance: f64 },
    /// Percent per level per streak step on rare-or-better pulls.
    StreakBonus { percent_per_level: f64 },
    /// Mythic weight added per mythic obtained.
    MythicScaling { per_mythic: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForgeDef {
    pub unlock_total_quanta: Numeral,
    pub token_rate: f64,
    pub token_bonus_per_discovery: f64,
    pub pull_base_cost: f64,
    pub pull_cost_growth: f64,
    pub bands: Vec<OutcomeBand>,

    /// Fate weights; upgrade cost is `base_cost * cost_multiplier^level`.
    pub weights: Vec<NodeDef<FateEffect>>,
}

impl ForgeDef {
    /// Expand the bands into outcomes, in band order.
    pub fn outcomes(&self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        for band in &self.bands {
            for i in 0..band.count {
                let t = if band.count > 1 {
                    f64::from(i) / f64::from(band.count - 1)
                } else {
                    0.0
                };
                let multiplier =
                    band.min_multiplier + (band.max_multiplier - band.min_multiplier) * t;
                outcomes.push(Outcome {
                    id: OutcomeId::new(format!("{}{}", band.rarity.prefix(), i + 1)),
                    rarity: band.rarity,
                    multiplier: (multiplier * 100.0).round() / 100.0,
                });
            }
        }
        outcomes
    }

    pub fn base_weight(&self, rarity: Rarity) -> f64 {
        self.bands
            .iter()
            .filter(|b| b.rarity == rarity)
            .map(|b| b.base_weight)
            .sum()
    }
}

// ===========================================================================
// Achievements
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Energy,
    Stellar,
    Ascension,
    Dimension,
    Progression,
    Speed,
    Special,
}

/// Closed set of conditions over a progression snapshot. Conditions whose
/// layer is not reached yet evaluate to false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Always,
    EnergyAtLeast(Numeral),
    EnergyRateAtLeast(Numeral),
    AnySkillPurchased,
    /// Tier advanced out of at least once.
    SkillTierComplete(u8),
    AllSkillTiersComplete,
    AdvancesAtLeast(u64),
    /// Lifetime ascension points earned.
    AscensionPointsAtLeast(Numeral),
    /// Every ascension node laid out in rows `from_row..=to_row` is owned.
    AscensionRowsComplete { from_row: f32, to_row: f32 },
    AscensionComplete,
    /// Lifetime echo fragments earned.
    EchoFragmentsAtLeast(Numeral),
    TranscendsAtLeast(u64),
    DimensionUnlocked(String),
    AllDimensionsUnlocked,
    PlayTimeAtLeast(f64),
    EnergyWithoutAdvance(Numeral),
    /// Last advance took less than this many seconds.
    FastAdvance(f64),
    /// Top tier reached within this many seconds of session start.
    FastTopTier(f64),
    SaveImported,
    OfflineAtLeast(f64),
    AllTreesMaxed,
    Collapsed,
    QuantaGeneratedAtLeast(Numeral),
    SynergiesActive(usize),
    /// Active synergies spanning more than one quantum tree.
    EntanglementsActive(usize),
    QuantumTreeMaxed(String),
    AllQuantumTreesMaxed,
    ArtifactsAvailable,
}

/// Where a multiplier reward feeds in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTarget {
    EnergyProduction,
    AscensionPoints,
    EchoFragments,
    AscensionBonus,
    DimensionBonus,
    QuantaProduction,
    OfflineProduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    AutoBuy,
    AutoAdvance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reward {
    #[default]
    None,
    Multiplier { target: RewardTarget, value: f64 },
    Automation(Capability),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: PredicateId,
    pub name: String,
    pub category: AchievementCategory,
    pub condition: Condition,
    #[serde(default)]
    pub reward: Reward,
}

/// A tutorial hint that becomes pending once its trigger holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintDef {
    pub id: String,
    pub trigger: Condition,
}

// ===========================================================================
// Content pack
// ===========================================================================

/// Every tree, catalog and table the engine runs on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPack {
    pub skills: SkillTreeDef,
    pub ascension: Vec<NodeDef<AscensionEffect>>,
    pub dimensions: Vec<DimensionDef>,
    pub quantum: QuantumDef,
    #[serde(default)]
    pub collapse: CollapseDef,
    pub artifacts: ArtifactsDef,
    pub forge: ForgeDef,
    #[serde(default)]
    pub achievements: Vec<AchievementDef>,
    #[serde(default)]
    pub hints: Vec<HintDef>,
}

fn unique<'a>(
    kind: &'static str,
    ids: impl IntoIterator<Item = &'a str>,
) -> Result<HashSet<&'a str>, ContentError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ContentError::Duplicate {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(seen)
}

fn known(
    set: &HashSet<&str>,
    owner: &str,
    kind: &'static str,
    id: &str,
) -> Result<(), ContentError> {
    if set.contains(id) {
        Ok(())
    } else {
        Err(ContentError::UnknownReference {
            owner: owner.to_string(),
            kind,
            id: id.to_string(),
        })
    }
}

impl ContentPack {
    /// Check references that cross tree boundaries.
    pub fn validate(&self) -> Result<(), ContentError> {
        for (i, tier) in self.skills.tiers.iter().enumerate() {
            if usize::from(tier.tier) != i + 1 {
                return Err(ContentError::TierOrder {
                    expected: self.skills.tiers.len(),
                    found: tier.tier,
                });
            }
            if tier.bonus <= 0.0 {
                return Err(ContentError::TierBonus(tier.tier));
            }
        }

        let dimensions = unique("dimension", self.dimensions.iter().map(|d| d.id.as_str()))?;
        for dimension in &self.dimensions {
            for node in &dimension.nodes {
                if let DimensionEffect::CrossDimension {
                    target: Some(target),
                    ..
                } = &node.effect
                {
                    known(&dimensions, node.id.as_str(), "dimension", target)?;
                }
            }
        }

        unique("quantum tree", self.quantum.trees.iter().map(|t| t.id.as_str()))?;
        let quantum_nodes = unique(
            "quantum node",
            self.quantum
                .trees
                .iter()
                .flat_map(|t| t.nodes.iter().map(|n| n.id.as_str())),
        )?;
        unique("synergy", self.quantum.synergies.iter().map(|s| s.id.as_str()))?;
        for synergy in &self.quantum.synergies {
            for node in &synergy.requires {
                known(&quantum_nodes, &synergy.id, "quantum node", node.as_str())?;
            }
        }

        for band in &self.forge.bands {
            if band.count == 0 || band.base_weight < 0.0 {
                return Err(ContentError::EmptyBand(band.rarity));
            }
        }

        let achievements = unique(
            "achievement",
            self.achievements.iter().map(|a| a.id.as_str()),
        )?;
        for id in &self.collapse.required {
            known(&achievements, "collapse", "achievement", id.as_str())?;
        }
        for achievement in &self.achievements {
            match &achievement.condition {
                Condition::DimensionUnlocked(d) => {
                    known(&dimensions, achievement.id.as_str(), "dimension", d)?
                }
                Condition::QuantumTreeMaxed(t) => {
                    let trees: HashSet<&str> =
                        self.quantum.trees.iter().map(|t| t.id.as_str()).collect();
                    known(&trees, achievement.id.as_str(), "quantum tree", t)?
                }
                _ => {}
            }
        }
        unique("hint", self.hints.iter().map(|h| h.id.as_str()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;

    // -----------------------------------------------------------------------
    // Test 1: Cumulative tiers
    // -----------------------------------------------------------------------
    #[test]
    fn tier_nodes_accumulate() {
        let skills = builtin::content().skills;
        assert_eq!(skills.nodes_for(1).len(), 4);
        assert_eq!(skills.nodes_for(2).len(), 6);
        assert_eq!(skills.nodes_for(5).len(), 18);
        assert_eq!(skills.top_tier(), 5);
        assert!(skills.tier(6).is_none());
    }

    // -----------------------------------------------------------------------
    // Test 2: Outcome table expansion
    // -----------------------------------------------------------------------
    #[test]
    fn forge_bands_expand_to_interpolated_outcomes() {
        let forge = builtin::content().forge;
        let outcomes = forge.outcomes();
        assert_eq!(outcomes.len(), 100);
        assert_eq!(outcomes[0].id.as_str(), "c1");
        assert_eq!(outcomes[0].multiplier, 1.1);
        assert_eq!(outcomes[39].id.as_str(), "c40");
        assert_eq!(outcomes[39].multiplier, 1.5);
        let mythic: Vec<_> = outcomes
            .iter()
            .filter(|o| o.rarity == Rarity::Mythic)
            .collect();
        assert_eq!(mythic.len(), 2);
        assert_eq!(mythic[1].multiplier, 5000.0);
        assert_eq!(forge.base_weight(Rarity::Common), 60.0);
    }

    #[test]
    fn rarity_order_is_roll_order() {
        assert!(Rarity::Common < Rarity::Mythic);
        assert!(Rarity::Rare.is_rare_or_better());
        assert!(!Rarity::Uncommon.is_rare_or_better());
    }

    // -----------------------------------------------------------------------
    // Test 3: Validation catches cross-reference mistakes
    // -----------------------------------------------------------------------
    #[test]
    fn builtin_content_validates() {
        builtin::content().validate().unwrap();
    }

    #[test]
    fn unknown_collapse_requirement_rejected() {
        let mut content = builtin::content();
        content.collapse.required.push(PredicateId::new("nope"));
        assert!(matches!(
            content.validate(),
            Err(ContentError::UnknownReference { kind: "achievement", .. })
        ));
    }

    #[test]
    fn duplicate_achievement_rejected() {
        let mut content = builtin::content();
        let copy = content.achievements[0].clone();
        content.achievements.push(copy);
        assert!(matches!(
            content.validate(),
            Err(ContentError::Duplicate { kind: "achievement", .. })
        ));
    }

    #[test]
    fn synergy_with_unknown_node_rejected() {
        let mut content = builtin::content();
        content.quantum.synergies[0]
            .requires
            .push(NodeId::new("matter_99"));
        assert!(matches!(
            content.validate(),
            Err(ContentError::UnknownReference { kind: "quantum node", .. })
        ));
    }

    #[test]
    fn misnumbered_tiers_rejected() {
        let mut content = builtin::content();
        content.skills.tiers.swap(0, 1);
        assert!(matches!(
            content.validate(),
            Err(ContentError::TierOrder { found: 2, .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Test 4: Cross-tree synergies
    // -----------------------------------------------------------------------
    #[test]
    fn cross_tree_synergies_detected() {
        let quantum = builtin::content().quantum;
        let cross: Vec<_> = quantum
            .synergies
            .iter()
            .filter(|s| quantum.is_cross_tree(s))
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(
            cross,
            vec![
                "synergy_matter_energy",
                "synergy_energy_time",
                "synergy_time_matter",
                "synergy_trinity"
            ]
        );
        assert_eq!(quantum.tree_of("time_4"), Some("time"));
    }
}
