//! Stellar Engine -- the prestige hierarchy and everything that drives it.
//!
//! Five prestige layers sit on top of the skill tiers, each resetting the
//! layers below it in exchange for a currency that outlives the reset:
//!
//! ```text
//! Skill tiers 1..5 --advance--> Ascension points
//!                  --advance past the echo threshold--> Echo fragments (Dimensions)
//! Dimensions maxed --collapse--> Quanta (Quantum trees)
//! Quanta milestones --> Artifacts, then the Probability Forge
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- owns every piece of state and runs the two ticks.
//! - [`hierarchy::Hierarchy`] -- the layers, their resets and their
//!   cross-layer hooks (discounts, cap bonuses, milestone progress).
//! - [`modifiers`] -- the pure Energy and Quanta multiplier pipelines.
//! - [`predicate::PredicateEngine`] -- achievements, rewards and tutorial
//!   hints evaluated against a [`predicate::Snapshot`].
//! - [`persistence::SaveScheduler`] -- per-key debounced saves into a
//!   [`persistence::SaveStore`].
//! - [`save`] -- the per-key JSON save documents and the base64 export.

pub mod artifacts;
pub mod ascension;
pub mod dimensions;
pub mod engine;
pub mod error;
pub mod forge;
pub mod hierarchy;
pub mod modifiers;
pub mod persistence;
pub mod predicate;
pub mod quantum;
pub mod save;
pub mod skills;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use engine::{Engine, EngineEvent};
pub use error::{EngineError, ImportError, LayerError, SaveError};
pub use persistence::{MemoryStore, SaveStore};
