//! Error types for the simulation core
//!
//! Only caller-facing failures live here: bad construction parameters,
//! unreadable or incompatible saved state, and the (locally recovered)
//! non-finite body state that a step reports after resetting the body.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid body parameters: {0}")]
    InvalidBody(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unsupported state format version {found} (max supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid format: missing version")]
    MissingVersion,

    #[error("malformed state: {0}")]
    MalformedState(String),

    #[error("duplicate body id {0}")]
    DuplicateBodyId(u64),

    #[error("{names} had NaN/Infinity state and were reset to rest at the origin; consider reducing the timestep or increasing softening")]
    NonFiniteState { count: usize, names: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
