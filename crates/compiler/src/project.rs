//! Compiled project model consumed by the connector analyzer.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sluice_common::ExtractPolicy;
use sluice_drivers::Properties;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Source,
    Model,
    MetricsView,
    Migration,
    Api,
    Component,
    Alert,
    Report,
    Other,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Source => "source",
            ResourceKind::Model => "model",
            ResourceKind::MetricsView => "metrics_view",
            ResourceKind::Migration => "migration",
            ResourceKind::Api => "api",
            ResourceKind::Component => "component",
            ResourceKind::Alert => "alert",
            ResourceKind::Report => "report",
            ResourceKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceName {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceName {
    pub fn new(kind: ResourceKind, name: &str) -> Self {
        Self { kind, name: name.to_string() }
    }

    /// Names are case-insensitive within a kind.
    pub fn normalized(&self) -> String {
        format!("{}/{}", self.kind.as_str(), self.name.to_lowercase())
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub source_connector: String,
    pub sink_connector: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub policy: Option<ExtractPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub input_connector: String,
    pub output_connector: String,
    #[serde(default)]
    pub input_properties: Properties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsViewSpec {
    pub connector: String,
    #[serde(default)]
    pub table: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationSpec {
    pub connector: String,
    #[serde(default)]
    pub sql: String,
}

/// Shared by APIs and components, which both resolve data through a named resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverSpec {
    pub resolver: String,
    #[serde(default)]
    pub resolver_properties: Properties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notifier {
    pub connector: String,
    #[serde(default)]
    pub properties: Properties,
}

/// Shared by alerts and reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotifierSpec {
    #[serde(default)]
    pub notifiers: Vec<Notifier>,
}

/// Exactly one kind-specific spec per resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    Source(SourceSpec),
    Model(ModelSpec),
    MetricsView(MetricsViewSpec),
    Migration(MigrationSpec),
    Api(ResolverSpec),
    Component(ResolverSpec),
    Alert(NotifierSpec),
    Report(NotifierSpec),
    #[serde(other)]
    Other,
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::Source(_) => ResourceKind::Source,
            ResourceSpec::Model(_) => ResourceKind::Model,
            ResourceSpec::MetricsView(_) => ResourceKind::MetricsView,
            ResourceSpec::Migration(_) => ResourceKind::Migration,
            ResourceSpec::Api(_) => ResourceKind::Api,
            ResourceSpec::Component(_) => ResourceKind::Component,
            ResourceSpec::Alert(_) => ResourceKind::Alert,
            ResourceSpec::Report(_) => ResourceKind::Report,
            ResourceSpec::Other => ResourceKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(flatten)]
    pub spec: ResourceSpec,
}

impl Resource {
    pub fn new(name: &str, spec: ResourceSpec) -> Self {
        Self { name: name.to_string(), paths: Vec::new(), spec }
    }

    pub fn resource_name(&self) -> ResourceName {
        ResourceName::new(self.spec.kind(), &self.name)
    }
}

/// A connector declared at project level, carrying defaults even when no
/// resource references it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorDef {
    pub name: String,
    /// Driver backing the connector. Defaults to the connector name.
    #[serde(default, rename = "type")]
    pub driver: Option<String>,
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub connectors: Vec<ConnectorDef>,
    /// The primary query-engine connector.
    #[serde(default)]
    pub olap_connector: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Project {
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// First declared connector named `name`.
    pub fn connector_def(&self, name: &str) -> Option<&ConnectorDef> {
        self.connectors.iter().find(|c| c.name == name)
    }
}
