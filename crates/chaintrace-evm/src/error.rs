//! Errors from the deployment registry's on-disk form.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractMapError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialise contract map: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid address '{value}' in {path}")]
    InvalidAddress { path: PathBuf, value: String },
}
