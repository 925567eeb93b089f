//! Compiler crate
//!
//! The compiled project model and the analyses run over it.

pub mod connectors;
pub mod error;
pub mod project;

pub use connectors::{analyze_connectors, Connector};
pub use error::AnalyzeError;
pub use project::{
    ConnectorDef, MetricsViewSpec, MigrationSpec, ModelSpec, Notifier, NotifierSpec, Project,
    ResolverSpec, Resource, ResourceKind, ResourceName, ResourceSpec, SourceSpec,
};
