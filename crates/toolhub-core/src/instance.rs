//! User-configured tool-server instances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_enabled() -> bool {
    true
}

/// One configured server instance, owned by a project.
///
/// Creation is permissive: parameter values are not checked until the
/// instance is validated or launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub project_id: String,
    /// Id of the [`ServerDefinition`](crate::ServerDefinition) to launch.
    pub server_id: String,
    pub name: String,
    #[serde(default)]
    pub parameter_values: BTreeMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Unix milliseconds.
    pub created_at: u64,
    /// Unix milliseconds.
    pub updated_at: u64,
}

impl Instance {
    /// New enabled instance with a fresh ULID.
    pub fn new(
        project_id: impl Into<String>,
        server_id: impl Into<String>,
        name: impl Into<String>,
        parameter_values: BTreeMap<String, String>,
    ) -> Self {
        let now = unix_millis();
        Self {
            id: ulid::Ulid::new().to_string(),
            project_id: project_id.into(),
            server_id: server_id.into(),
            name: name.into(),
            parameter_values,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the set fields of `update`. Returns whether anything changed;
    /// `updated_at` only moves when it did.
    pub fn apply(&mut self, update: &InstanceUpdate) -> bool {
        let mut changed = false;
        if let Some(name) = &update.name {
            if *name != self.name {
                self.name = name.clone();
                changed = true;
            }
        }
        if let Some(values) = &update.parameter_values {
            if *values != self.parameter_values {
                self.parameter_values = values.clone();
                changed = true;
            }
        }
        if let Some(enabled) = update.enabled {
            if enabled != self.enabled {
                self.enabled = enabled;
                changed = true;
            }
        }
        if changed {
            self.updated_at = unix_millis().max(self.updated_at);
        }
        changed
    }
}

/// Partial update of an [`Instance`]; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceUpdate {
    pub name: Option<String>,
    pub parameter_values: Option<BTreeMap<String, String>>,
    pub enabled: Option<bool>,
}

impl InstanceUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn parameter_values(values: BTreeMap<String, String>) -> Self {
        Self {
            parameter_values: Some(values),
            ..Default::default()
        }
    }

    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Default::default()
        }
    }
}

/// Instance counts for one project, computed on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceStats {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub by_server: BTreeMap<String, usize>,
}

impl InstanceStats {
    pub fn from_instances(instances: &[Instance]) -> Self {
        let mut stats = Self::default();
        for instance in instances {
            stats.total += 1;
            if instance.enabled {
                stats.enabled += 1;
            } else {
                stats.disabled += 1;
            }
            *stats.by_server.entry(instance.server_id.clone()).or_default() += 1;
        }
        stats
    }
}

pub(crate) fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
