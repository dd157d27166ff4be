//! Binds one instance to its server definition.

use crate::definition::{ParameterKind, ServerDefinition};
use crate::instance::Instance;
use crate::template::{TemplateResolver, ValidationResult};
use crate::transport::{
    LaunchSpec, TransportError, TransportHandle, TransportLauncher, TransportTimeouts,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Absolute, home-relative, dot-relative, Windows drive, or UNC paths.
static PATH_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(~|/|\.{1,2}([/\\]|$)|[A-Za-z]:[/\\]|\\\\)")
        .expect("path pattern is a valid regex")
});

/// One instance paired with the definition it instantiates.
///
/// Validation is advisory: a transport can be requested whatever
/// [`Connector::validate`] says.
#[derive(Debug, Clone)]
pub struct Connector {
    instance: Instance,
    definition: Arc<ServerDefinition>,
}

impl Connector {
    pub fn new(instance: Instance, definition: Arc<ServerDefinition>) -> Self {
        Self {
            instance,
            definition,
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn definition(&self) -> &ServerDefinition {
        &self.definition
    }

    /// Schema-level check of the instance's parameter values. Never touches
    /// the filesystem or network.
    pub fn validate(&self) -> ValidationResult {
        validate_parameters(&self.definition, &self.instance.parameter_values)
    }

    /// Resolve the definition's templates into a concrete launch request.
    pub fn launch_spec(&self, timeouts: &TransportTimeouts) -> Result<LaunchSpec, TransportError> {
        let resolver =
            TemplateResolver::new(self.definition.with_defaults(&self.instance.parameter_values));
        let command = resolver.resolve(&self.definition.command).trim().to_string();
        if command.is_empty() {
            return Err(TransportError::InvalidCommand(format!(
                "command template '{}' resolved to nothing",
                self.definition.command
            )));
        }

        Ok(LaunchSpec {
            instance_id: self.instance.id.clone(),
            server_id: self.instance.server_id.clone(),
            name: self.instance.name.clone(),
            command,
            args: resolver.resolve_list(&self.definition.args),
            env: resolver.resolve_map(&self.definition.env),
            startup_timeout: self
                .definition
                .startup_timeout_secs
                .map_or(timeouts.startup, std::time::Duration::from_secs),
            tool_timeout: timeouts.tool,
        })
    }

    /// Resolve and launch.
    pub async fn create_transport(
        &self,
        launcher: &dyn TransportLauncher,
        timeouts: &TransportTimeouts,
    ) -> Result<TransportHandle, TransportError> {
        let spec = self.launch_spec(timeouts)?;
        tracing::debug!(
            instance_id = %spec.instance_id,
            server_id = %spec.server_id,
            command = %spec.command,
            args = ?spec.args,
            "launching transport"
        );
        launcher.launch(spec).await
    }
}

/// Check parameter values against a definition without an instance.
///
/// Reports malformed templates, required parameters that are unset or blank
/// (schema-required ones and anything the command template references), and
/// values that fail a pattern or path-shape check.
pub fn validate_parameters(
    definition: &ServerDefinition,
    values: &BTreeMap<String, String>,
) -> ValidationResult {
    let mut result = definition.validate_templates();
    let bound = definition.with_defaults(values);
    let mut errors = Vec::new();

    let mut required: BTreeSet<String> = definition
        .parameters
        .iter()
        .filter(|(_, spec)| spec.required)
        .map(|(name, _)| name.clone())
        .collect();
    required.extend(TemplateResolver::extract_parameters(&definition.command));
    for name in &required {
        if bound.get(name).map_or(true, |v| v.trim().is_empty()) {
            errors.push(format!("Missing required parameter: {name}"));
        }
    }

    for (name, spec) in &definition.parameters {
        let Some(value) = bound.get(name).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        if let Some(pattern) = &spec.pattern {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(value) => {}
                Ok(_) => errors.push(format!(
                    "Parameter '{name}' does not match the expected format"
                )),
                Err(_) => errors.push(format!("Parameter '{name}' has an invalid pattern")),
            }
        } else if spec.kind == ParameterKind::Path && !PATH_LIKE.is_match(value.trim()) {
            errors.push(format!("Parameter '{name}' must be an absolute or relative path"));
        }
    }

    result.merge(ValidationResult::from_errors(errors));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{DefinitionRegistry, ParameterSpec};
    use std::time::Duration;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn connector(server_id: &str, values: &[(&str, &str)]) -> Connector {
        let definition = DefinitionRegistry::builtin().get(server_id).unwrap();
        Connector::new(
            Instance::new("p", server_id, "test", params(values)),
            definition,
        )
    }

    #[test]
    fn test_missing_required_parameter() {
        let result = connector("filesystem", &[]).validate();
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["Missing required parameter: root"]);

        let blank = connector("filesystem", &[("root", "   ")]).validate();
        assert_eq!(blank.errors, vec!["Missing required parameter: root"]);
    }

    #[test]
    fn test_path_shape_is_checked_without_touching_disk() {
        assert!(connector("filesystem", &[("root", "/definitely/not/on/disk")])
            .validate()
            .is_valid);
        assert!(connector("filesystem", &[("root", "~/notes")]).validate().is_valid);
        assert!(connector("filesystem", &[("root", "./data")]).validate().is_valid);
        assert!(connector("filesystem", &[("root", "C:\\work")]).validate().is_valid);

        let result = connector("filesystem", &[("root", "not a path")]).validate();
        assert!(!result.is_valid);
        assert!(result.errors[0].contains("'root'"));
    }

    #[test]
    fn test_pattern_overrides_kind() {
        let bad = connector("postgres", &[("connection_url", "mysql://db")]).validate();
        assert!(!bad.is_valid);
        assert!(connector("postgres", &[("connection_url", "postgresql://u@h/db")])
            .validate()
            .is_valid);
    }

    #[test]
    fn test_command_placeholders_are_required() {
        let definition = Arc::new(ServerDefinition::new("x", "X", "{{bin}}"));
        let result = validate_parameters(&definition, &BTreeMap::new());
        assert_eq!(result.errors, vec!["Missing required parameter: bin"]);
    }

    #[test]
    fn test_launch_spec_resolves_templates() {
        let spec = connector(
            "stdio",
            &[
                ("command", "my-server"),
                ("arg1", "--port"),
                ("arg2", "8080"),
                ("env", "API_KEY=abc, REGION=eu"),
            ],
        )
        .launch_spec(&TransportTimeouts::default())
        .unwrap();

        assert_eq!(spec.command, "my-server");
        assert_eq!(spec.args, vec!["--port", "8080"]);
        assert_eq!(
            spec.env,
            params(&[("API_KEY", "abc"), ("REGION", "eu")])
        );
        assert_eq!(spec.startup_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_launch_spec_applies_defaults_and_timeout_override() {
        let spec = connector("fetch", &[])
            .launch_spec(&TransportTimeouts::default())
            .unwrap();
        assert_eq!(spec.args, vec!["mcp-server-fetch"]);
        assert_eq!(spec.startup_timeout, Duration::from_secs(60));

        let spec = connector("fetch", &[("ignore_robots", "TRUE")])
            .launch_spec(&TransportTimeouts::default())
            .unwrap();
        assert_eq!(spec.args, vec!["mcp-server-fetch", "--ignore-robots-txt"]);
    }

    #[test]
    fn test_blank_command_is_rejected() {
        let err = connector("stdio", &[])
            .launch_spec(&TransportTimeouts::default())
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidCommand(_)));
    }

    #[test]
    fn test_invalid_instance_still_resolves() {
        let definition = Arc::new(
            ServerDefinition::new("x", "X", "server")
                .args(["{{dir}}"])
                .parameter("dir", ParameterSpec::required(ParameterKind::Path, "")),
        );
        let connector = Connector::new(
            Instance::new("p", "x", "x", params(&[("dir", "relative")])),
            definition,
        );
        assert!(!connector.validate().is_valid);
        let spec = connector.launch_spec(&TransportTimeouts::default()).unwrap();
        assert_eq!(spec.args, vec!["relative"]);
    }
}
