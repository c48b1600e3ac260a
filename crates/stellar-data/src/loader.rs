//! Reads engine configuration and content overrides from disk.
//!
//! The format is chosen by file extension (RON, TOML or JSON). A data
//! directory may hold `stellar.{ext}` for the configuration and
//! `content.{ext}` for a full content pack; either may be absent.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use stellar_core::config::EngineConfig;

use crate::builtin;
use crate::schema::{ContentError, ContentPack};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("invalid content in {file}: {source}")]
    Content {
        file: PathBuf,
        #[source]
        source: ContentError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` or `.json` in `dir`. More than one
/// match is an error.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }
    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let text = std::fs::read_to_string(path)?;
    let parse_error = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(&text).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(&text).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(&text).map_err(|e| parse_error(e.to_string())),
    }
}

/// Load an [`EngineConfig`]. Sections and fields the file leaves out keep
/// their defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig, DataLoadError> {
    deserialize_file(path)
}

/// Load and validate a full [`ContentPack`].
pub fn load_content(path: &Path) -> Result<ContentPack, DataLoadError> {
    let content: ContentPack = deserialize_file(path)?;
    content.validate().map_err(|source| DataLoadError::Content {
        file: path.to_path_buf(),
        source,
    })?;
    Ok(content)
}

/// Configuration and content from `dir`, falling back to the defaults and
/// the built-in catalog for whatever is missing.
pub fn load_overrides(dir: &Path) -> Result<(EngineConfig, ContentPack), DataLoadError> {
    let config = match find_data_file(dir, "stellar")? {
        Some(path) => load_config(&path)?,
        None => EngineConfig::default(),
    };
    let content = match find_data_file(dir, "content")? {
        Some(path) => load_content(&path)?,
        None => builtin::content(),
    };
    Ok((config, content))
}
