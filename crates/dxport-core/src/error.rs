//! Export pipeline errors

use std::path::PathBuf;

use dxport_kernel::{AppContext, CadError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that abort the export of the current part
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    #[error("Failed to open part {path}: {source}")]
    PartOpen { path: PathBuf, source: CadError },

    #[error("Failed to enter {context} context: {source}")]
    Context {
        context: AppContext,
        source: CadError,
    },

    #[error("Export transaction failed: {0}")]
    Transaction(CadError),

    #[error("Failed to write {path}: {source}")]
    Commit { path: PathBuf, source: CadError },

    #[error("IO error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Naming failed: {0}")]
    Naming(#[from] NamingError),

    #[error("License capability '{capability}' unavailable: {source}")]
    License { capability: String, source: CadError },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("CAD session error: {0}")]
    Cad(#[from] CadError),
}

/// Result type for export operations
pub type ExportResult<T> = Result<T, ExportError>;

/// Output-name resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("Part has no bodies to name")]
    NoBodies,
}
