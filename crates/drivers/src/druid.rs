use async_trait::async_trait;
use sluice_common::RequestContext;

use crate::spec::{DriverSpec, PropertySchema, PropertyType};
use crate::{Driver, DriverError, Properties};

/// Druid over Avatica. The DSN must look like
/// `http://host/druid/v2/sql/avatica-protobuf/`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DruidDriver;

#[async_trait]
impl Driver for DruidDriver {
    fn spec(&self) -> DriverSpec {
        DriverSpec {
            display_name: "Druid".to_string(),
            description: "Connect to Apache Druid.".to_string(),
            config_properties: vec![PropertySchema::new("dsn", "Connection string", PropertyType::String)
                .placeholder("http://localhost:8082/druid/v2/sql/avatica-protobuf/")
                .required()
                .secret()],
            implements_olap: true,
            ..Default::default()
        }
    }

    async fn has_anonymous_source_access(
        &self,
        _ctx: &RequestContext,
        _props: &Properties,
    ) -> Result<bool, DriverError> {
        Ok(false)
    }

    async fn tertiary_source_connectors(
        &self,
        _ctx: &RequestContext,
        _props: &Properties,
    ) -> Result<Vec<String>, DriverError> {
        Ok(Vec::new())
    }
}
