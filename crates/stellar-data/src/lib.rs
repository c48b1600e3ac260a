//! Content definitions for every progression layer, the built-in catalog,
//! and file loading for configuration and content overrides.

pub mod builtin;
pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, load_config, load_content, load_overrides};
pub use schema::{ContentError, ContentPack};
