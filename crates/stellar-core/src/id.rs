use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Declares a string-backed identifier. Content refers to nodes, predicates
/// and outcomes by stable text ids that appear verbatim in save documents.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifies a node in any upgrade tree.
    NodeId
}

string_id! {
    /// Identifies an achievement predicate.
    PredicateId
}

string_id! {
    /// Identifies a probability forge outcome.
    OutcomeId
}

/// Closed set of ledger resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceId {
    /// Primary currency of the skill tiers.
    Energy,
    /// Produced once the quantum layer is active.
    Quanta,
    /// Spent on probability forge pulls.
    FateTokens,
}

impl ResourceId {
    pub const ALL: [ResourceId; 3] = [ResourceId::Energy, ResourceId::Quanta, ResourceId::FateTokens];
}
