//! Read-only catalog of known tool-server definitions.

use crate::template::{TemplateResolver, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// How a parameter value is entered and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterKind {
    /// Free text.
    #[default]
    Text,
    /// A filesystem path; checked for shape only, never for existence.
    Path,
    /// `true`/`false`, consumed by conditional placeholders.
    Flag,
    /// Free text that front ends should mask.
    Secret,
}

/// Schema entry for one definition parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParameterSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub kind: ParameterKind,
    /// Regex a non-blank value must match. Overrides the kind's own check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Value bound when the instance leaves the parameter unset or blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ParameterSpec {
    pub fn required(kind: ParameterKind, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            required: true,
            kind,
            ..Default::default()
        }
    }

    pub fn optional(kind: ParameterKind, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            kind,
            ..Default::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Template for launching one kind of tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Executable template.
    pub command: String,
    /// Argument templates; blank results are dropped at launch.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variable templates.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterSpec>,
    /// Overrides the configured startup timeout for slow servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_timeout_secs: Option<u64>,
}

impl ServerDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            parameters: BTreeMap::new(),
            startup_timeout_secs: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.env.insert(key.into(), template.into());
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, spec: ParameterSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    pub fn startup_timeout_secs(mut self, secs: u64) -> Self {
        self.startup_timeout_secs = Some(secs);
        self
    }

    /// Command, argument, and environment templates in that order.
    pub fn templates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .chain(self.env.values().map(String::as_str))
    }

    /// Schema keys plus every name referenced by a template.
    pub fn parameter_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.parameters.keys().cloned().collect();
        for template in self.templates() {
            names.extend(TemplateResolver::extract_parameters(template));
        }
        names
    }

    /// Bind schema defaults for parameters left unset or blank.
    pub fn with_defaults(&self, values: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut bound = values.clone();
        for (name, spec) in &self.parameters {
            let Some(default) = &spec.default else {
                continue;
            };
            let unset = bound.get(name).map_or(true, |v| v.trim().is_empty());
            if unset {
                bound.insert(name.clone(), default.clone());
            }
        }
        bound
    }

    /// Brace-structure check of every template, prefixed with the template.
    pub fn validate_templates(&self) -> ValidationResult {
        let mut result = ValidationResult::valid();
        for template in self.templates() {
            let checked = TemplateResolver::validate(template);
            result.merge(ValidationResult::from_errors(
                checked
                    .errors
                    .into_iter()
                    .map(|err| format!("Template '{template}': {err}"))
                    .collect(),
            ));
        }
        result
    }
}

/// Errors raised while loading a definition catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read server catalog {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse server catalog {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Server definition '{id}' is invalid: {}", .errors.join("; "))]
    Invalid { id: String, errors: Vec<String> },
}

/// Immutable lookup of server definitions by id.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    definitions: BTreeMap<String, Arc<ServerDefinition>>,
}

impl DefinitionRegistry {
    /// Registry over the given definitions. Later entries replace earlier
    /// ones with the same id.
    pub fn new(definitions: impl IntoIterator<Item = ServerDefinition>) -> Self {
        Self {
            definitions: definitions
                .into_iter()
                .map(|definition| (definition.id.clone(), Arc::new(definition)))
                .collect(),
        }
    }

    /// The catalog shipped with toolhub.
    pub fn builtin() -> Self {
        Self::new(builtin_definitions())
    }

    /// Merge a JSON array of definitions from `path` over this registry.
    pub fn with_catalog_file(mut self, path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let loaded: Vec<ServerDefinition> =
            serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        for definition in loaded {
            let checked = definition.validate_templates();
            if !checked.is_valid {
                return Err(CatalogError::Invalid {
                    id: definition.id,
                    errors: checked.errors,
                });
            }
            tracing::debug!(server_id = %definition.id, path = %path.display(), "loaded server definition");
            self.definitions
                .insert(definition.id.clone(), Arc::new(definition));
        }
        Ok(self)
    }

    pub fn get(&self, server_id: &str) -> Option<Arc<ServerDefinition>> {
        self.definitions.get(server_id).cloned()
    }

    /// All definitions, ordered by id.
    pub fn list(&self) -> Vec<Arc<ServerDefinition>> {
        self.definitions.values().cloned().collect()
    }

    /// Parameter names a front end should offer for `server_id`.
    pub fn parameters(&self, server_id: &str) -> Option<BTreeSet<String>> {
        self.definitions
            .get(server_id)
            .map(|definition| definition.parameter_names())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

fn builtin_definitions() -> Vec<ServerDefinition> {
    use ParameterKind::{Flag, Path, Secret, Text};

    vec![
        ServerDefinition::new("filesystem", "Filesystem", "npx")
            .description("Read, write, and search files below the allowed directories")
            .args([
                "-y",
                "@modelcontextprotocol/server-filesystem",
                "{{root}}",
                "{{extra_root}}",
            ])
            .parameter("root", ParameterSpec::required(Path, "Directory the server may access"))
            .parameter(
                "extra_root",
                ParameterSpec::optional(Path, "Additional directory the server may access"),
            )
            .startup_timeout_secs(60),
        ServerDefinition::new("git", "Git", "uvx")
            .description("Inspect and operate on a local git repository")
            .args(["mcp-server-git", "--repository", "{{repository}}"])
            .parameter("repository", ParameterSpec::required(Path, "Repository working tree"))
            .startup_timeout_secs(60),
        ServerDefinition::new("sqlite", "SQLite", "uvx")
            .description("Query and modify a SQLite database file")
            .args(["mcp-server-sqlite", "--db-path", "{{db_path}}"])
            .parameter("db_path", ParameterSpec::required(Path, "Database file"))
            .startup_timeout_secs(60),
        ServerDefinition::new("postgres", "PostgreSQL", "npx")
            .description("Read-only access to a PostgreSQL database")
            .args(["-y", "@modelcontextprotocol/server-postgres", "{{connection_url}}"])
            .parameter(
                "connection_url",
                ParameterSpec::required(Secret, "postgres:// connection URL")
                    .with_pattern(r"^postgres(ql)?://\S+$"),
            )
            .startup_timeout_secs(60),
        ServerDefinition::new("fetch", "Fetch", "uvx")
            .description("Fetch web pages and convert them to markdown")
            .args(["mcp-server-fetch", "{{?ignore_robots:--ignore-robots-txt}}"])
            .parameter(
                "ignore_robots",
                ParameterSpec::optional(Flag, "Ignore robots.txt restrictions").with_default("false"),
            )
            .startup_timeout_secs(60),
        ServerDefinition::new("github", "GitHub", "npx")
            .description("Repositories, issues, and pull requests on GitHub")
            .args(["-y", "@modelcontextprotocol/server-github"])
            .env("GITHUB_PERSONAL_ACCESS_TOKEN", "{{token}}")
            .parameter("token", ParameterSpec::required(Secret, "Personal access token"))
            .startup_timeout_secs(60),
        ServerDefinition::new("brave-search", "Brave Search", "npx")
            .description("Web and local search through the Brave Search API")
            .args(["-y", "@modelcontextprotocol/server-brave-search"])
            .env("BRAVE_API_KEY", "{{api_key}}")
            .parameter("api_key", ParameterSpec::required(Secret, "Brave Search API key"))
            .startup_timeout_secs(60),
        ServerDefinition::new("memory", "Memory", "npx")
            .description("Knowledge-graph memory persisted to a local file")
            .args(["-y", "@modelcontextprotocol/server-memory"])
            .env("MEMORY_FILE_PATH", "{{memory_file}}")
            .parameter(
                "memory_file",
                ParameterSpec::optional(Path, "File the graph is stored in"),
            )
            .startup_timeout_secs(60),
        ServerDefinition::new("stdio", "Custom stdio server", "{{command}}")
            .description("Any executable speaking MCP over stdin/stdout")
            .args(["{{arg1}}", "{{arg2}}", "{{arg3}}", "{{arg4}}"])
            .env("ENV", "{{env}}")
            .parameter("command", ParameterSpec::required(Text, "Executable to launch"))
            .parameter("arg1", ParameterSpec::optional(Text, "First argument"))
            .parameter("arg2", ParameterSpec::optional(Text, "Second argument"))
            .parameter("arg3", ParameterSpec::optional(Text, "Third argument"))
            .parameter("arg4", ParameterSpec::optional(Text, "Fourth argument"))
            .parameter(
                "env",
                ParameterSpec::optional(Text, "Environment as KEY=value pairs separated by commas"),
            ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_templates_are_well_formed() {
        let registry = DefinitionRegistry::builtin();
        assert!(!registry.is_empty());
        for definition in registry.list() {
            let checked = definition.validate_templates();
            assert!(checked.is_valid, "{}: {:?}", definition.id, checked.errors);
        }
    }

    #[test]
    fn test_parameters_include_template_references() {
        let definition = ServerDefinition::new("x", "X", "run")
            .args(["{{a}}", "{{?b:--b}}"])
            .parameter("c", ParameterSpec::optional(ParameterKind::Text, ""));
        let registry = DefinitionRegistry::new([definition]);

        let names: Vec<_> = registry.parameters("x").unwrap().into_iter().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(registry.parameters("missing").is_none());
    }

    #[test]
    fn test_defaults_fill_unset_and_blank_values() {
        let definition = DefinitionRegistry::builtin().get("fetch").unwrap();
        let bound = definition.with_defaults(&BTreeMap::new());
        assert_eq!(bound.get("ignore_robots").map(String::as_str), Some("false"));

        let explicit = BTreeMap::from([("ignore_robots".to_string(), "true".to_string())]);
        let bound = definition.with_defaults(&explicit);
        assert_eq!(bound.get("ignore_robots").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_catalog_file_overrides_builtin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(
            &path,
            r#"[{"id":"git","name":"Patched Git","command":"git-mcp"},
                {"id":"weather","name":"Weather","command":"weather-mcp","args":["--city={{city}}"],
                 "parameters":{"city":{"required":true}}}]"#,
        )
        .unwrap();

        let registry = DefinitionRegistry::builtin().with_catalog_file(&path).unwrap();
        assert_eq!(registry.get("git").unwrap().name, "Patched Git");
        let weather = registry.get("weather").unwrap();
        assert!(weather.parameters["city"].required);
        assert_eq!(weather.parameters["city"].kind, ParameterKind::Text);
        assert!(registry.get("filesystem").is_some());
    }

    #[test]
    fn test_catalog_file_rejects_malformed_templates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, r#"[{"id":"bad","name":"Bad","command":"{{cmd"}]"#).unwrap();

        let err = DefinitionRegistry::builtin()
            .with_catalog_file(&path)
            .unwrap_err();
        assert!(matches!(err, CatalogError::Invalid { ref id, .. } if id == "bad"));
    }

    #[test]
    fn test_missing_catalog_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = DefinitionRegistry::builtin()
            .with_catalog_file(&dir.path().join("nope.json"))
            .unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}
