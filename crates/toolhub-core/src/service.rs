//! Instance orchestration: the surface front ends talk to.

use crate::aggregator::ToolProviderAggregator;
use crate::connector::{validate_parameters, Connector};
use crate::definition::{DefinitionRegistry, ServerDefinition};
use crate::error::ServiceError;
use crate::instance::{Instance, InstanceStats, InstanceUpdate};
use crate::provider::ToolProvider;
use crate::store::InstanceStore;
use crate::template::ValidationResult;
use crate::transport::{StdioLauncher, TransportLauncher, TransportTimeouts};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Outcome of a successful [`InstanceService::test_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub server_id: String,
    /// Tools the server advertised, in server order.
    pub tool_names: Vec<String>,
}

/// Instance CRUD plus the tool-provider entry point.
pub struct InstanceService {
    store: Arc<dyn InstanceStore>,
    definitions: Arc<DefinitionRegistry>,
    launcher: Arc<dyn TransportLauncher>,
    timeouts: TransportTimeouts,
    aggregator: ToolProviderAggregator,
}

impl InstanceService {
    pub fn new(
        store: Arc<dyn InstanceStore>,
        definitions: Arc<DefinitionRegistry>,
        launcher: Arc<dyn TransportLauncher>,
        timeouts: TransportTimeouts,
    ) -> Self {
        let aggregator = ToolProviderAggregator::new(
            Arc::clone(&store),
            Arc::clone(&definitions),
            Arc::clone(&launcher),
            timeouts,
        );
        Self {
            store,
            definitions,
            launcher,
            timeouts,
            aggregator,
        }
    }

    /// Service launching real stdio tool servers.
    pub fn with_stdio(
        store: Arc<dyn InstanceStore>,
        definitions: Arc<DefinitionRegistry>,
        timeouts: TransportTimeouts,
    ) -> Self {
        Self::new(store, definitions, Arc::new(StdioLauncher::new()), timeouts)
    }

    pub fn definitions(&self) -> &DefinitionRegistry {
        &self.definitions
    }

    /// Every known server definition, ordered by id.
    pub fn available_servers(&self) -> Vec<Arc<ServerDefinition>> {
        self.definitions.list()
    }

    pub fn server_parameters(&self, server_id: &str) -> Result<BTreeSet<String>, ServiceError> {
        self.definitions
            .parameters(server_id)
            .ok_or_else(|| ServiceError::UnknownServer(server_id.to_string()))
    }

    /// Persist a new enabled instance. Parameter values are not validated.
    pub async fn create_instance(
        &self,
        project_id: &str,
        server_id: &str,
        name: &str,
        parameter_values: BTreeMap<String, String>,
    ) -> Result<Instance, ServiceError> {
        self.definition(server_id)?;
        let instance = self
            .store
            .create(Instance::new(project_id, server_id, name, parameter_values))
            .await?;
        tracing::info!(
            project_id,
            instance_id = %instance.id,
            server_id,
            "created instance"
        );
        Ok(instance)
    }

    pub async fn get_instance(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<Instance, ServiceError> {
        self.store
            .get(project_id, instance_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(instance_id.to_string()))
    }

    /// Instances of a project, oldest first.
    pub async fn list_instances(&self, project_id: &str) -> Result<Vec<Instance>, ServiceError> {
        Ok(self.store.list(project_id).await?)
    }

    /// Schema-only check, usable before an instance exists.
    pub fn validate_instance(
        &self,
        server_id: &str,
        parameter_values: &BTreeMap<String, String>,
    ) -> ValidationResult {
        match self.definitions.get(server_id) {
            Some(definition) => validate_parameters(&definition, parameter_values),
            None => ValidationResult::from_errors(vec![format!("Unknown server: {server_id}")]),
        }
    }

    /// Replace an instance's parameter values.
    pub async fn update_instance(
        &self,
        project_id: &str,
        instance_id: &str,
        parameter_values: BTreeMap<String, String>,
    ) -> Result<Instance, ServiceError> {
        self.apply(
            project_id,
            instance_id,
            InstanceUpdate::parameter_values(parameter_values),
        )
        .await
    }

    pub async fn rename_instance(
        &self,
        project_id: &str,
        instance_id: &str,
        name: &str,
    ) -> Result<Instance, ServiceError> {
        self.apply(project_id, instance_id, InstanceUpdate::name(name))
            .await
    }

    /// Returns `false` when nothing was deleted.
    pub async fn delete_instance(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<bool, ServiceError> {
        let deleted = self.store.delete(project_id, instance_id).await?;
        if deleted {
            tracing::info!(project_id, instance_id, "deleted instance");
        }
        Ok(deleted)
    }

    pub async fn delete_all_instances(&self, project_id: &str) -> Result<usize, ServiceError> {
        let removed = self.store.delete_all(project_id).await?;
        tracing::info!(project_id, removed, "deleted all instances");
        Ok(removed)
    }

    /// Enable or disable an instance. Setting the current value does not
    /// write to the store.
    pub async fn set_instance_enabled(
        &self,
        project_id: &str,
        instance_id: &str,
        enabled: bool,
    ) -> Result<Instance, ServiceError> {
        let instance = self.get_instance(project_id, instance_id).await?;
        if instance.enabled == enabled {
            return Ok(instance);
        }
        self.apply(project_id, instance_id, InstanceUpdate::enabled(enabled))
            .await
    }

    /// Start the instance's server, list its tools, and shut it down again.
    ///
    /// Runs whether or not the instance is enabled or passes validation.
    pub async fn test_connection(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<ConnectionReport, ServiceError> {
        let instance = self.get_instance(project_id, instance_id).await?;
        let definition = self.definition(&instance.server_id)?;
        let connector = Connector::new(instance, definition);

        let handle = connector
            .create_transport(self.launcher.as_ref(), &self.timeouts)
            .await
            .map_err(|source| ServiceError::Transport {
                instance_id: instance_id.to_string(),
                source,
            })?;
        let report = ConnectionReport {
            server_id: handle.server_id.clone(),
            tool_names: handle.tools.iter().map(|tool| tool.name.clone()).collect(),
        };
        handle.close().await;
        Ok(report)
    }

    pub async fn instance_stats(&self, project_id: &str) -> Result<InstanceStats, ServiceError> {
        let instances = self.store.list(project_id).await?;
        Ok(InstanceStats::from_instances(&instances))
    }

    /// Merged tools of every enabled instance that starts, or `None`.
    ///
    /// The caller owns the provider and should [`close`](ToolProvider::close)
    /// it when done.
    pub async fn tool_provider(
        &self,
        project_id: &str,
    ) -> Result<Option<ToolProvider>, ServiceError> {
        Ok(self.aggregator.tool_provider(project_id).await?)
    }

    fn definition(&self, server_id: &str) -> Result<Arc<ServerDefinition>, ServiceError> {
        self.definitions
            .get(server_id)
            .ok_or_else(|| ServiceError::UnknownServer(server_id.to_string()))
    }

    async fn apply(
        &self,
        project_id: &str,
        instance_id: &str,
        update: InstanceUpdate,
    ) -> Result<Instance, ServiceError> {
        if !self.store.update(project_id, instance_id, update).await? {
            return Err(ServiceError::NotFound(instance_id.to_string()));
        }
        tracing::debug!(project_id, instance_id, "updated instance");
        self.get_instance(project_id, instance_id).await
    }
}
