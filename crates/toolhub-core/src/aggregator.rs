//! Builds one [`ToolProvider`] from every enabled instance of a project.

use crate::connector::Connector;
use crate::definition::DefinitionRegistry;
use crate::provider::ToolProvider;
use crate::store::{InstanceStore, StoreError};
use crate::transport::{TransportHandle, TransportLauncher, TransportTimeouts};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;

/// Starts a fresh transport per enabled instance on every call.
///
/// Transports are never shared between calls. A failing instance is logged
/// and skipped; the others still contribute their tools.
pub struct ToolProviderAggregator {
    store: Arc<dyn InstanceStore>,
    definitions: Arc<DefinitionRegistry>,
    launcher: Arc<dyn TransportLauncher>,
    timeouts: TransportTimeouts,
}

impl ToolProviderAggregator {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        definitions: Arc<DefinitionRegistry>,
        launcher: Arc<dyn TransportLauncher>,
        timeouts: TransportTimeouts,
    ) -> Self {
        Self {
            store,
            definitions,
            launcher,
            timeouts,
        }
    }

    /// Composite provider for `project_id`, or `None` when no enabled
    /// instance produced a transport.
    ///
    /// Only store failures are errors. Dropping the returned future mid-flight
    /// cancels pending launches and closes the transports already started.
    pub async fn tool_provider(
        &self,
        project_id: &str,
    ) -> Result<Option<ToolProvider>, StoreError> {
        let enabled: Vec<_> = self
            .store
            .list(project_id)
            .await?
            .into_iter()
            .filter(|instance| instance.enabled)
            .collect();
        if enabled.is_empty() {
            tracing::debug!(project_id, "no enabled instances");
            return Ok(None);
        }

        let mut pending = FuturesUnordered::new();
        for instance in enabled {
            let Some(definition) = self.definitions.get(&instance.server_id) else {
                tracing::warn!(
                    instance_id = %instance.id,
                    server_id = %instance.server_id,
                    "skipping instance with unknown server definition"
                );
                continue;
            };
            let connector = Connector::new(instance, definition);
            let launcher = Arc::clone(&self.launcher);
            let timeouts = self.timeouts;
            pending.push(async move {
                let result = connector.create_transport(launcher.as_ref(), &timeouts).await;
                (connector, result)
            });
        }

        let mut started = LaunchGuard::default();
        while let Some((connector, result)) = pending.next().await {
            let instance = connector.instance();
            match result {
                Ok(handle) => {
                    tracing::debug!(
                        instance_id = %instance.id,
                        server_id = %instance.server_id,
                        tools = handle.tools.len(),
                        "transport ready"
                    );
                    started.handles.push(handle);
                }
                Err(err) => {
                    tracing::warn!(
                        instance_id = %instance.id,
                        server_id = %instance.server_id,
                        error = %err,
                        "transport creation failed, skipping instance"
                    );
                }
            }
        }

        let handles = started.release();
        if handles.is_empty() {
            tracing::warn!(project_id, "every enabled instance failed to start");
            return Ok(None);
        }
        Ok(Some(ToolProvider::from_transports(handles)))
    }
}

/// Transports started during one aggregation pass that have not been handed
/// to a provider yet. Closed on drop.
#[derive(Default)]
struct LaunchGuard {
    handles: Vec<TransportHandle>,
}

impl LaunchGuard {
    fn release(mut self) -> Vec<TransportHandle> {
        std::mem::take(&mut self.handles)
    }
}

impl Drop for LaunchGuard {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let handles = std::mem::take(&mut self.handles);
        tracing::debug!(transports = handles.len(), "aggregation cancelled, closing started transports");
        // Without a runtime, dropping the handles still kills the processes.
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                futures::future::join_all(handles.iter().map(|handle| handle.close())).await;
            });
        }
    }
}
