use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("connector {connector:?} uses unknown driver {driver:?}")]
    UnknownDriver { connector: String, driver: String },

    #[error("invalid properties for driver {driver:?}: {message}")]
    InvalidProperties { driver: String, message: String },

    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error(transparent)]
    Common(#[from] sluice_common::Error),
}

impl DriverError {
    pub fn invalid_properties(driver: &str, message: impl ToString) -> Self {
        DriverError::InvalidProperties { driver: driver.to_string(), message: message.to_string() }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, DriverError::Common(e) if e.is_cancellation())
    }
}
