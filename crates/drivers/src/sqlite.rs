use async_trait::async_trait;
use sluice_common::RequestContext;

use crate::spec::{DriverSpec, PropertySchema, PropertyType};
use crate::{Driver, DriverError, Properties};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

#[async_trait]
impl Driver for SqliteDriver {
    fn spec(&self) -> DriverSpec {
        DriverSpec {
            display_name: "SQLite".to_string(),
            description: "Import data from SQLite into DuckDB.".to_string(),
            source_properties: vec![
                PropertySchema::new("db", "DB", PropertyType::String)
                    .description("Path to SQLite db file")
                    .placeholder("/path/to/sqlite.db")
                    .required(),
                PropertySchema::new("table", "Table", PropertyType::String)
                    .description("SQLite table name")
                    .placeholder("table")
                    .required(),
            ],
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
