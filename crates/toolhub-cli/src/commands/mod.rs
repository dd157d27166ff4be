//! Command implementations.

pub mod call;
pub mod instance;
pub mod servers;
pub mod tools;

use std::sync::Arc;
use toolhub_core::{Config, FileInstanceStore, InstanceService};

/// Service over the on-disk store and the configured catalog.
pub fn build_service(config: &Config) -> anyhow::Result<InstanceService> {
    let definitions = config
        .definitions()
        .map_err(|e| anyhow::anyhow!("Failed to load server definitions: {e}"))?;
    let store = FileInstanceStore::with_dir(config.instance_store_dir());
    tracing::debug!(
        store = %config.instance_store_dir().display(),
        servers = definitions.len(),
        "loaded configuration"
    );
    Ok(InstanceService::new(
        Arc::new(store),
        Arc::new(definitions),
        Arc::new(config.launcher()),
        config.timeouts(),
    ))
}
