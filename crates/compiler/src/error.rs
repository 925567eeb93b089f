use thiserror::Error;

use sluice_drivers::DriverError;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("cannot resolve connector {connector:?}{}: {source}", resource_suffix(.resource))]
    UnresolvedConnector {
        connector: String,
        /// Referencing resource, `None` for project-level connectors.
        resource: Option<String>,
        #[source]
        source: DriverError,
    },

    #[error("connector analysis aborted: {0}")]
    Aborted(#[from] sluice_common::Error),
}

fn resource_suffix(resource: &Option<String>) -> String {
    match resource {
        Some(name) => format!(" referenced by {name}"),
        None => String::new(),
    }
}

impl AnalyzeError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AnalyzeError::Aborted(e) if e.is_cancellation())
    }
}
