//! Object store connector.
//!
//! Lists objects under a prefix and downloads them, optionally sampling each
//! parquet file down to a byte budget taken from its head or tail.

pub mod allocator;
pub mod error;
pub mod estimate;
pub mod extract;
pub mod selection;

pub use allocator::{CheckedAllocator, RetainedBatch};
pub use error::ExtractError;
pub use estimate::{estimate_records, plan_row_groups, RowGroupPlan, RowGroupStats};
pub use extract::{normalized_schema, write_normalized, BoundedExtractor, ExtractSummary};
pub use selection::{remove_partial, select_files};
