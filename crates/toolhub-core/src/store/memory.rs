//! In-memory instance store.

use super::{sort_instances, InstanceStore, StoreError};
use crate::instance::{Instance, InstanceUpdate};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Thread-safe in-memory store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct InMemoryInstanceStore {
    projects: RwLock<HashMap<String, HashMap<String, Instance>>>,
}

impl InMemoryInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstanceStore for InMemoryInstanceStore {
    async fn create(&self, instance: Instance) -> Result<Instance, StoreError> {
        let mut projects = self.projects.write().await;
        let project = projects.entry(instance.project_id.clone()).or_default();
        if project.contains_key(&instance.id) {
            return Err(StoreError::Duplicate(instance.id));
        }
        project.insert(instance.id.clone(), instance.clone());
        Ok(instance)
    }

    async fn get(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<Option<Instance>, StoreError> {
        let projects = self.projects.read().await;
        Ok(projects
            .get(project_id)
            .and_then(|project| project.get(instance_id))
            .cloned())
    }

    async fn list(&self, project_id: &str) -> Result<Vec<Instance>, StoreError> {
        let projects = self.projects.read().await;
        let mut instances: Vec<Instance> = projects
            .get(project_id)
            .map(|project| project.values().cloned().collect())
            .unwrap_or_default();
        sort_instances(&mut instances);
        Ok(instances)
    }

    async fn update(
        &self,
        project_id: &str,
        instance_id: &str,
        update: InstanceUpdate,
    ) -> Result<bool, StoreError> {
        let mut projects = self.projects.write().await;
        let Some(instance) = projects
            .get_mut(project_id)
            .and_then(|project| project.get_mut(instance_id))
        else {
            return Ok(false);
        };
        instance.apply(&update);
        Ok(true)
    }

    async fn delete(&self, project_id: &str, instance_id: &str) -> Result<bool, StoreError> {
        let mut projects = self.projects.write().await;
        Ok(projects
            .get_mut(project_id)
            .and_then(|project| project.remove(instance_id))
            .is_some())
    }

    async fn delete_all(&self, project_id: &str) -> Result<usize, StoreError> {
        let mut projects = self.projects.write().await;
        Ok(projects.remove(project_id).map_or(0, |project| project.len()))
    }
}
