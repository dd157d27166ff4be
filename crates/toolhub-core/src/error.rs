//! Error types for the toolhub-core service layer.

use crate::store::StoreError;
use crate::transport::TransportError;

/// Errors returned by [`InstanceService`](crate::InstanceService).
///
/// Schema problems are not errors; they come back as a
/// [`ValidationResult`](crate::ValidationResult).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No server definition with this id
    #[error("Unknown server: {0}")]
    UnknownServer(String),

    /// No instance with this id in the project
    #[error("Instance not found: {0}")]
    NotFound(String),

    #[error("Transport creation failed for instance {instance_id}: {source}")]
    Transport {
        instance_id: String,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors loading the user configuration or the catalog it points at.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Catalog(#[from] crate::definition::CatalogError),
}
