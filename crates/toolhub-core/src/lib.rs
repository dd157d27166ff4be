//! toolhub-core: server definitions, instances, and tool-provider aggregation.

pub mod aggregator;
pub mod config;
pub mod connector;
pub mod definition;
mod error;
pub mod instance;
pub mod provider;
pub mod service;
pub mod store;
pub mod template;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::ToolProviderAggregator;
pub use config::{Config, ConfigStore};
pub use connector::{validate_parameters, Connector};
pub use definition::{CatalogError, DefinitionRegistry, ParameterKind, ParameterSpec, ServerDefinition};
pub use error::{ConfigError, ServiceError};
pub use instance::{Instance, InstanceStats, InstanceUpdate};
pub use provider::ToolProvider;
pub use service::{ConnectionReport, InstanceService};
pub use store::{FileInstanceStore, InMemoryInstanceStore, InstanceStore, StoreError};
pub use template::{TemplateResolver, ValidationResult};
pub use transport::{
    LaunchSpec, StdioLauncher, TransportError, TransportHandle, TransportLauncher,
    TransportTimeouts,
};
