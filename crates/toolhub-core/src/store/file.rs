//! JSON-file instance store: one file per instance, grouped by project.

use super::{sort_instances, InstanceStore, StoreError};
use crate::instance::{Instance, InstanceUpdate};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Persistent instance storage below a root directory.
///
/// Layout: `<root>/<hash of project id>/<instance id>.json`. Writes go
/// through a temp file and a rename, and are serialised by one lock so a
/// read-modify-write never interleaves with another.
pub struct FileInstanceStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileInstanceStore {
    /// Store under `~/.local/share/toolhub/instances/` (platform data dir).
    pub fn new() -> Self {
        Self::with_dir(default_root())
    }

    /// Create with a custom directory (for testing or config overrides).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            root: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Hash a project id into a short folder name.
    fn project_hash(project_id: &str) -> String {
        let hash = blake3::hash(project_id.as_bytes());
        hash.to_hex()[..16].to_string()
    }

    fn project_dir(&self, project_id: &str) -> PathBuf {
        self.root.join(Self::project_hash(project_id))
    }

    /// `None` for ids that could escape the project directory.
    fn instance_path(&self, project_id: &str, instance_id: &str) -> Option<PathBuf> {
        let safe = !instance_id.is_empty()
            && instance_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        safe.then(|| {
            self.project_dir(project_id)
                .join(format!("{instance_id}.json"))
        })
    }

    async fn read_instance(path: &Path, project_id: &str) -> Result<Option<Instance>, StoreError> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let instance: Instance = serde_json::from_str(&content)?;
        if instance.project_id != project_id {
            return Err(StoreError::InvalidFormat(format!(
                "{} belongs to project '{}'",
                path.display(),
                instance.project_id
            )));
        }
        Ok(Some(instance))
    }

    async fn write_instance(path: &Path, instance: &Instance) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(instance)?).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl Default for FileInstanceStore {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn default_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("toolhub")
        .join("instances")
}

fn is_instance_file(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "json")
}

#[async_trait]
impl InstanceStore for FileInstanceStore {
    async fn create(&self, instance: Instance) -> Result<Instance, StoreError> {
        let path = self
            .instance_path(&instance.project_id, &instance.id)
            .ok_or_else(|| StoreError::InvalidFormat(format!("invalid instance id '{}'", instance.id)))?;
        let _guard = self.write_lock.lock().await;
        if fs::try_exists(&path).await? {
            return Err(StoreError::Duplicate(instance.id));
        }
        Self::write_instance(&path, &instance).await?;
        tracing::debug!(project_id = %instance.project_id, instance_id = %instance.id, "stored instance");
        Ok(instance)
    }

    async fn get(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<Option<Instance>, StoreError> {
        match self.instance_path(project_id, instance_id) {
            Some(path) => Self::read_instance(&path, project_id).await,
            None => Ok(None),
        }
    }

    async fn list(&self, project_id: &str) -> Result<Vec<Instance>, StoreError> {
        let dir = self.project_dir(project_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut instances = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_instance_file(&path) {
                continue;
            }
            match Self::read_instance(&path, project_id).await {
                Ok(Some(instance)) => instances.push(instance),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable instance file");
                }
            }
        }

        sort_instances(&mut instances);
        Ok(instances)
    }

    async fn update(
        &self,
        project_id: &str,
        instance_id: &str,
        update: InstanceUpdate,
    ) -> Result<bool, StoreError> {
        let Some(path) = self.instance_path(project_id, instance_id) else {
            return Ok(false);
        };
        let _guard = self.write_lock.lock().await;
        let Some(mut instance) = Self::read_instance(&path, project_id).await? else {
            return Ok(false);
        };
        if instance.apply(&update) {
            Self::write_instance(&path, &instance).await?;
        }
        Ok(true)
    }

    async fn delete(&self, project_id: &str, instance_id: &str) -> Result<bool, StoreError> {
        let Some(path) = self.instance_path(project_id, instance_id) else {
            return Ok(false);
        };
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_all(&self, project_id: &str) -> Result<usize, StoreError> {
        let dir = self.project_dir(project_id);
        let _guard = self.write_lock.lock().await;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_instance_file(&path) {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        // Leaves the directory in place if anything else lives there.
        let _ = fs::remove_dir(&dir).await;
        Ok(removed)
    }
}
