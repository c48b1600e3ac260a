//! Save documents and the export codec.
//!
//! Every subsystem persists one small JSON document under a stable key. Only
//! mutable state is written; definitions always come from the current
//! content, so saved levels load against whatever the catalog now says.
//! Every document field defaults when missing.
//!
//! Loading decodes every document before touching any state, so a corrupt
//! save or import is rejected whole.

use std::collections::{BTreeMap, BTreeSet};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use stellar_core::Numeral;
use stellar_core::id::{NodeId, PredicateId, ResourceId};
use stellar_core::ledger::{CurrencyPool, ResourceLedger};
use stellar_tree::GraphError;
use tracing::debug;

use crate::error::{ImportError, SaveError};
use crate::forge::ForgeState;
use crate::hierarchy::Hierarchy;
use crate::predicate::{PredicateEngine, Progress};
use crate::skills::LayerState;

pub const LEDGER_KEY: &str = "stellar_ledger";
pub const ASCENSION_KEY: &str = "stellar_ascension";
pub const DIMENSIONS_KEY: &str = "stellar_dimensions";
pub const QUANTUM_KEY: &str = "stellar_quantum";
pub const ARTIFACTS_KEY: &str = "stellar_artifacts";
pub const FORGE_KEY: &str = "stellar_forge";
pub const ACHIEVEMENTS_KEY: &str = "stellar_achievements";
pub const TUTORIAL_KEY: &str = "stellar_tutorial";
pub const META_KEY: &str = "stellar_meta";

pub const ALL_KEYS: [&str; 9] = [
    LEDGER_KEY,
    ASCENSION_KEY,
    DIMENSIONS_KEY,
    QUANTUM_KEY,
    ARTIFACTS_KEY,
    FORGE_KEY,
    ACHIEVEMENTS_KEY,
    TUTORIAL_KEY,
    META_KEY,
];

/// The static key matching `key`, if it is one of ours.
pub fn known_key(key: &str) -> Option<&'static str> {
    ALL_KEYS.iter().copied().find(|k| *k == key)
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountDoc {
    pub amount: Numeral,
    pub total_generated: Numeral,
}

/// Resources, skill tiers and session accounting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerDoc {
    pub accounts: BTreeMap<ResourceId, AccountDoc>,
    pub skills: LayerState,
    pub skill_levels: BTreeMap<NodeId, u32>,
    pub progress: Progress,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AscensionDoc {
    pub points: CurrencyPool,
    pub levels: BTreeMap<NodeId, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionsDoc {
    pub fragments: CurrencyPool,
    pub unlocked: BTreeSet<String>,
    pub levels: BTreeMap<String, BTreeMap<NodeId, u32>>,
    pub transcends: u64,
    pub has_collapsed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantumDoc {
    pub active: bool,
    pub milestones: BTreeSet<Numeral>,
    pub levels: BTreeMap<String, BTreeMap<NodeId, u32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsDoc {
    pub available: bool,
    pub owned: BTreeMap<NodeId, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeDoc {
    pub state: ForgeState,
    pub weights: BTreeMap<NodeId, u32>,
    pub rng_state: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AchievementsDoc {
    pub unlocked: BTreeMap<PredicateId, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorialDoc {
    pub shown: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaDoc {
    pub last_saved_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Capture
// ---------------------------------------------------------------------------

/// Read-only view of everything that is persisted.
#[derive(Clone, Copy)]
pub(crate) struct SaveSource<'a> {
    pub hierarchy: &'a Hierarchy,
    pub ledger: &'a ResourceLedger,
    pub predicates: &'a PredicateEngine,
    pub progress: &'a Progress,
    pub now_ms: u64,
}

fn to_json<T: Serialize>(key: &'static str, doc: &T) -> Result<String, SaveError> {
    serde_json::to_string(doc).map_err(|source| SaveError::Encode { key, source })
}

/// Encode the current document for `key`.
pub(crate) fn encode(key: &'static str, s: &SaveSource<'_>) -> Result<String, SaveError> {
    let h = s.hierarchy;
    match key {
        LEDGER_KEY => to_json(
            key,
            &LedgerDoc {
                accounts: ResourceId::ALL
                    .iter()
                    .map(|&r| {
                        (
                            r,
                            AccountDoc {
                                amount: s.ledger.amount(r),
                                total_generated: s.ledger.total_generated(r),
                            },
                        )
                    })
                    .collect(),
                skills: h.skills().state().clone(),
                skill_levels: h.skills().graph().levels(),
                progress: s.progress.clone(),
            },
        ),
        ASCENSION_KEY => to_json(
            key,
            &AscensionDoc {
                points: h.ascension().points().clone(),
                levels: h.ascension().graph().levels(),
            },
        ),
        DIMENSIONS_KEY => {
            let d = h.dimensions();
            to_json(
                key,
                &DimensionsDoc {
                    fragments: d.fragments().clone(),
                    unlocked: d.unlocked_ids(),
                    levels: d.levels(),
                    transcends: d.transcends(),
                    has_collapsed: d.has_collapsed(),
                },
            )
        }
        QUANTUM_KEY => to_json(
            key,
            &QuantumDoc {
                active: h.quantum().is_active(),
                milestones: h.quantum().milestones_reached().clone(),
                levels: h.quantum().levels(),
            },
        ),
        ARTIFACTS_KEY => to_json(
            key,
            &ArtifactsDoc {
                available: h.artifacts().is_available(),
                owned: h.artifacts().owned(),
            },
        ),
        FORGE_KEY => to_json(
            key,
            &ForgeDoc {
                state: h.forge().state().clone(),
                weights: h.forge().weight_levels(),
                rng_state: Some(h.forge().rng_state()),
            },
        ),
        ACHIEVEMENTS_KEY => to_json(
            key,
            &AchievementsDoc {
                unlocked: s.predicates.unlocked(),
            },
        ),
        TUTORIAL_KEY => to_json(
            key,
            &TutorialDoc {
                shown: s.predicates.shown_hints().clone(),
            },
        ),
        _ => to_json(
            META_KEY,
            &MetaDoc {
                last_saved_ms: Some(s.now_ms),
            },
        ),
    }
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

/// Decoded documents, each present only if its key was.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Documents {
    pub ledger: Option<LedgerDoc>,
    pub ascension: Option<AscensionDoc>,
    pub dimensions: Option<DimensionsDoc>,
    pub quantum: Option<QuantumDoc>,
    pub artifacts: Option<ArtifactsDoc>,
    pub forge: Option<ForgeDoc>,
    pub achievements: Option<AchievementsDoc>,
    pub tutorial: Option<TutorialDoc>,
    pub meta: Option<MetaDoc>,
}

fn from_json<T: DeserializeOwned>(key: &'static str, text: &str) -> Result<T, SaveError> {
    serde_json::from_str(text).map_err(|source| SaveError::Decode { key, source })
}

/// Mutable view of everything that is restored.
pub(crate) struct SaveTarget<'a> {
    pub hierarchy: &'a mut Hierarchy,
    pub ledger: &'a mut ResourceLedger,
    pub predicates: &'a mut PredicateEngine,
    pub progress: &'a mut Progress,
}

impl Documents {
    /// Decode raw `(key, json)` pairs. Unknown keys are ignored.
    pub fn decode<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, SaveError> {
        let mut docs = Self::default();
        for (key, text) in entries {
            let Some(key) = known_key(key) else {
                debug!(key, "Ignoring unknown save key");
                continue;
            };
            match key {
                LEDGER_KEY => docs.ledger = Some(from_json(key, text)?),
                ASCENSION_KEY => docs.ascension = Some(from_json(key, text)?),
                DIMENSIONS_KEY => docs.dimensions = Some(from_json(key, text)?),
                QUANTUM_KEY => docs.quantum = Some(from_json(key, text)?),
                ARTIFACTS_KEY => docs.artifacts = Some(from_json(key, text)?),
                FORGE_KEY => docs.forge = Some(from_json(key, text)?),
                ACHIEVEMENTS_KEY => docs.achievements = Some(from_json(key, text)?),
                TUTORIAL_KEY => docs.tutorial = Some(from_json(key, text)?),
                _ => docs.meta = Some(from_json(key, text)?),
            }
        }
        Ok(docs)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Keys of the documents present.
    pub fn keys(&self) -> Vec<&'static str> {
        let present = [
            self.ledger.is_some(),
            self.ascension.is_some(),
            self.dimensions.is_some(),
            self.quantum.is_some(),
            self.artifacts.is_some(),
            self.forge.is_some(),
            self.achievements.is_some(),
            self.tutorial.is_some(),
            self.meta.is_some(),
        ];
        ALL_KEYS
            .iter()
            .zip(present)
            .filter(|(_, p)| *p)
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn last_saved_ms(&self) -> Option<u64> {
        self.meta.as_ref().and_then(|m| m.last_saved_ms)
    }

    /// Apply every present document. Ascension and dimension state land
    /// before the skill tier so its caps are in place, and the ledger lands
    /// before the Quanta-gated layers so milestone progress is known.
    /// Returns the number of unknown ids skipped.
    pub(crate) fn apply(self, t: SaveTarget<'_>) -> Result<usize, GraphError> {
        let mut skipped = 0;
        if let Some(doc) = self.ascension {
            skipped += t.hierarchy.ascension_mut().restore(doc.points, &doc.levels);
        }
        if let Some(doc) = self.dimensions {
            skipped += t.hierarchy.dimensions_mut().restore(
                doc.fragments,
                &doc.unlocked,
                &doc.levels,
                doc.transcends,
                doc.has_collapsed,
            );
        }
        if let Some(doc) = self.ledger {
            for resource in ResourceId::ALL {
                let account = doc.accounts.get(&resource).cloned().unwrap_or_default();
                t.ledger
                    .restore(resource, account.amount, account.total_generated);
            }
            skipped += t.hierarchy.restore_skills(doc.skills, &doc.skill_levels)?;
            let session_started_ms = t.progress.session_started_ms;
            *t.progress = Progress {
                session_started_ms,
                ..doc.progress
            };
        }
        let total_quanta = t.ledger.total_generated(ResourceId::Quanta);
        if let Some(doc) = self.quantum {
            skipped += t
                .hierarchy
                .quantum_mut()
                .restore(doc.active, doc.milestones, &doc.levels, total_quanta);
        }
        if let Some(doc) = self.artifacts {
            skipped += t
                .hierarchy
                .artifacts_mut()
                .restore(doc.available, &doc.owned, total_quanta);
        }
        if let Some(doc) = self.forge {
            let rng_state = doc
                .rng_state
                .unwrap_or_else(|| t.hierarchy.forge().rng_state());
            skipped += t
                .hierarchy
                .forge_mut()
                .restore(doc.state, &doc.weights, rng_state);
        }
        match (self.achievements, self.tutorial) {
            (None, None) => {}
            (achievements, tutorial) => {
                let unlocked = achievements.map_or_else(|| t.predicates.unlocked(), |d| d.unlocked);
                let shown = tutorial.map_or_else(|| t.predicates.shown_hints().clone(), |d| d.shown);
                skipped += t.predicates.restore(&unlocked, shown);
            }
        }
        // A partial set may replace ascension or dimensions without the ledger.
        t.hierarchy.sync_hooks();
        Ok(skipped)
    }
}

// ---------------------------------------------------------------------------
// Export codec
// ---------------------------------------------------------------------------

/// Wrap raw documents into one base64 string (standard alphabet, UTF-8
/// JSON object keyed by save key).
pub fn export_string(documents: &BTreeMap<&'static str, String>) -> Result<String, SaveError> {
    let mut object = serde_json::Map::new();
    for (&key, text) in documents {
        let value: serde_json::Value = from_json(key, text)?;
        object.insert(key.to_string(), value);
    }
    let json = serde_json::Value::Object(object).to_string();
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Reverse [`export_string`]: decode, validate and return the raw documents
/// of every known key present.
pub fn decode_export(text: &str) -> Result<BTreeMap<&'static str, String>, ImportError> {
    let bytes = STANDARD.decode(text.trim())?;
    let json = String::from_utf8(bytes)?;
    let value: serde_json::Value = serde_json::from_str(&json)?;
    let serde_json::Value::Object(object) = value else {
        return Err(ImportError::NotAnObject);
    };
    let documents: BTreeMap<&'static str, String> = object
        .iter()
        .filter_map(|(key, value)| known_key(key).map(|k| (k, value.to_string())))
        .collect();
    if documents.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(documents)
}
