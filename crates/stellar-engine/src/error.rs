use stellar_core::Numeral;
use stellar_core::ledger::LedgerError;
use stellar_data::ContentError;
use stellar_tree::GraphError;

/// Why a layer operation did not happen. State is unchanged whenever one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayerError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("current tier is not fully maxed")]
    TierIncomplete,

    #[error("advance needs {required} energy")]
    BelowThreshold { required: Numeral },

    #[error("unknown dimension '{0}'")]
    UnknownDimension(String),

    #[error("dimension '{0}' is already unlocked")]
    AlreadyUnlocked(String),

    #[error("dimension '{0}' is locked")]
    DimensionLocked(String),

    #[error("not enough {currency}: need {cost}")]
    Unaffordable { currency: &'static str, cost: Numeral },

    #[error("collapse requires every dimension node maxed")]
    DimensionsIncomplete,

    #[error("collapse requires achievement '{0}'")]
    MissingRequirement(String),

    #[error("already collapsed")]
    AlreadyCollapsed,

    #[error("{0} is not available yet")]
    Unavailable(&'static str),

    #[error("no quantum tree contains node '{0}'")]
    UnknownQuantumNode(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Fatal construction problems.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid content: {0}")]
    Content(#[from] ContentError),

    #[error("invalid {tree} tree: {source}")]
    Graph {
        tree: String,
        #[source]
        source: GraphError,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    pub(crate) fn graph(tree: impl Into<String>) -> impl FnOnce(GraphError) -> Self {
        let tree = tree.into();
        move |source| EngineError::Graph { tree, source }
    }
}

/// Failure at the save boundary.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("document {key} is corrupt: {source}")]
    Decode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("store failed on {key}: {source}")]
    Store {
        key: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("saved levels do not fit the current content: {0}")]
    Restore(#[from] GraphError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Rejected import. The engine and the store are untouched.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("decoded bytes are not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("export must be a JSON object")]
    NotAnObject,

    #[error("export holds no known save keys")]
    Empty,

    #[error(transparent)]
    Document(#[from] SaveError),
}
