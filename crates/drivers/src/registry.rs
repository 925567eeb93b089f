use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{druid, duckdb, local_file, s3, slack, sqlite, Driver, DriverError};

/// Maps driver names to implementations.
///
/// Built once and then shared read-only, so lookups need no locking.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every driver shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("s3", Arc::new(s3::S3Driver));
        registry.register("local_file", Arc::new(local_file::LocalFileDriver));
        registry.register("duckdb", Arc::new(duckdb::DuckDbDriver));
        registry.register("sqlite", Arc::new(sqlite::SqliteDriver));
        registry.register("druid", Arc::new(druid::DruidDriver));
        registry.register("slack", Arc::new(slack::SlackDriver));
        registry
    }

    pub fn register(&mut self, name: &str, driver: Arc<dyn Driver>) {
        self.drivers.insert(name.to_string(), driver);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }

    /// Looks up `driver` on behalf of `connector`.
    pub fn resolve(&self, connector: &str, driver: &str) -> Result<Arc<dyn Driver>, DriverError> {
        self.get(driver).ok_or_else(|| DriverError::UnknownDriver {
            connector: connector.to_string(),
            driver: driver.to_string(),
        })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry").field("drivers", &self.names()).finish()
    }
}
