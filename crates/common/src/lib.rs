//! Common crate
//!
//! Shared error handling, request contexts, and settings for Sluice.
//!
//! # Example
//! ```rust
//! use sluice_common::Error;
//! let err = Error::internal("example error");
//! assert!(!err.is_cancellation());
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod policy;

pub use config::{AnalyzeSettings, ExtractSettings, Settings};
pub use context::RequestContext;
pub use error::{Error, Result};
pub use policy::{ExtractPolicy, Strategy};
