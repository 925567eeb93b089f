//! Drivers crate
//!
//! A [`Driver`] is the small capability surface the connector analyzer needs
//! from each backing system: a descriptor, an anonymous-access probe, and
//! discovery of connectors referenced indirectly from source properties.
//! Full driver internals (connections, queries) live elsewhere.

pub mod druid;
pub mod duckdb;
pub mod error;
pub mod local_file;
pub mod registry;
pub mod s3;
pub mod slack;
pub mod spec;
pub mod sqlite;

use async_trait::async_trait;
use sluice_common::RequestContext;

pub use error::DriverError;
pub use registry::DriverRegistry;
pub use spec::{DriverSpec, PropertySchema, PropertyType};

/// Free-form resource properties, as declared in the project.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// The core trait for any Sluice connector driver.
#[async_trait]
pub trait Driver: Send + Sync {
    fn spec(&self) -> DriverSpec;

    /// Whether a source with `props` can be read without user credentials.
    async fn has_anonymous_source_access(
        &self,
        ctx: &RequestContext,
        props: &Properties,
    ) -> Result<bool, DriverError>;

    /// Connectors referenced from inside `props`, e.g. object URIs inside a SQL query.
    async fn tertiary_source_connectors(
        &self,
        ctx: &RequestContext,
        props: &Properties,
    ) -> Result<Vec<String>, DriverError>;
}

/// Deserializes `props` into a driver-specific config struct.
pub(crate) fn decode_props<T: serde::de::DeserializeOwned>(
    driver: &str,
    props: &Properties,
) -> Result<T, DriverError> {
    serde_json::from_value(serde_json::Value::Object(props.clone()))
        .map_err(|e| DriverError::invalid_properties(driver, e))
}
