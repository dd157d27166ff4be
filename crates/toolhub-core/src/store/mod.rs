//! Persistence of [`Instance`] records, scoped by project.

mod file;
mod memory;

pub(crate) use file::default_root;
pub use file::FileInstanceStore;
pub use memory::InMemoryInstanceStore;

use crate::instance::{Instance, InstanceUpdate};
use async_trait::async_trait;

/// Errors returned by instance stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An instance with the same id already exists in the project
    #[error("Instance already exists: {0}")]
    Duplicate(String),

    /// Stored data could not be read back
    #[error("Invalid stored instance: {0}")]
    InvalidFormat(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// CRUD contract for instance persistence.
///
/// Each mutation is atomic per instance: `update` applies its partial fields
/// to the current stored record, so concurrent updates of different fields
/// never lose each other.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Persist a new instance.
    async fn create(&self, instance: Instance) -> Result<Instance, StoreError>;

    async fn get(&self, project_id: &str, instance_id: &str)
        -> Result<Option<Instance>, StoreError>;

    /// Instances of a project, oldest first.
    async fn list(&self, project_id: &str) -> Result<Vec<Instance>, StoreError>;

    /// Apply a partial update. Returns `false` when the instance does not
    /// exist.
    async fn update(
        &self,
        project_id: &str,
        instance_id: &str,
        update: InstanceUpdate,
    ) -> Result<bool, StoreError>;

    /// Returns `false` when the instance does not exist.
    async fn delete(&self, project_id: &str, instance_id: &str) -> Result<bool, StoreError>;

    /// Delete every instance of a project, returning how many were removed.
    async fn delete_all(&self, project_id: &str) -> Result<usize, StoreError>;
}

// Compile-time check: InstanceStore must be object-safe
const _: () = {
    fn _assert_object_safe(_: &dyn InstanceStore) {}
};

fn sort_instances(instances: &mut [Instance]) {
    instances.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
