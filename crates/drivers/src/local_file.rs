use async_trait::async_trait;
use sluice_common::RequestContext;

use crate::spec::{DriverSpec, PropertySchema, PropertyType};
use crate::{Driver, DriverError, Properties};

/// Files on the runtime host's disk. Needs no credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileDriver;

#[async_trait]
impl Driver for LocalFileDriver {
    fn spec(&self) -> DriverSpec {
        DriverSpec {
            display_name: "Local file".to_string(),
            description: "Import locally stored data files.".to_string(),
            source_properties: vec![PropertySchema::new("path", "Path", PropertyType::String)
                .description("Path or URL to file")
                .placeholder("/path/to/file")
                .required()],
            implements_object_store: true,
            ..Default::default()
        }
    }

    async fn has_anonymous_source_access(
        &self,
        _ctx: &RequestContext,
        _props: &Properties,
    ) -> Result<bool, DriverError> {
        Ok(true)
    }

    async fn tertiary_source_connectors(
        &self,
        _ctx: &RequestContext,
        _props: &Properties,
    ) -> Result<Vec<String>, DriverError> {
        Ok(Vec::new())
    }
}
