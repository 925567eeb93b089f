//! Row-group size estimation.
//!
//! Picks the row groups a bounded read needs and converts the byte budget into
//! a number of record batches, using only the file footer. The actual batches
//! are then pulled into a capacity-bounded container.

use futures::StreamExt;
use parquet::arrow::arrow_reader::ArrowReaderMetadata;
use parquet::arrow::async_reader::{AsyncFileReader, ParquetRecordBatchStreamBuilder};
use parquet::arrow::ProjectionMask;
use parquet::file::metadata::ParquetMetaData;
use sluice_common::{ExtractPolicy, ExtractSettings, RequestContext, Strategy};
use sluice_container::Container;
use tracing::debug;

use crate::allocator::{CheckedAllocator, RetainedBatch};
use crate::error::ExtractError;

/// Footer statistics of one row group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowGroupStats {
    pub index: usize,
    /// Compressed size of the row group's column chunks on disk.
    pub byte_size: u64,
    pub num_rows: u64,
}

impl RowGroupStats {
    pub fn new(index: usize, byte_size: u64, num_rows: u64) -> Self {
        Self { index, byte_size, num_rows }
    }

    /// Reads the stats of every row group in `metadata`.
    pub fn from_metadata(metadata: &ParquetMetaData) -> Result<Vec<Self>, ExtractError> {
        metadata
            .row_groups()
            .iter()
            .enumerate()
            .map(|(index, rg)| {
                let byte_size = u64::try_from(rg.compressed_size()).map_err(|_| {
                    ExtractError::Invariant(format!(
                        "row group {index} has negative size {}",
                        rg.compressed_size()
                    ))
                })?;
                let num_rows = u64::try_from(rg.num_rows()).map_err(|_| {
                    ExtractError::Invariant(format!(
                        "row group {index} has negative row count {}",
                        rg.num_rows()
                    ))
                })?;
                Ok(Self { index, byte_size, num_rows })
            })
            .collect()
    }
}

/// Which row groups to read and how many batches to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroupPlan {
    /// Row groups in read order.
    pub row_groups: Vec<usize>,
    /// Estimated rows fitting the budget.
    pub rows: u64,
    /// Estimated bytes of those rows.
    pub bytes: u64,
    /// Batches to retain, never less than one.
    pub num_records: usize,
}

/// Plans a bounded read over `row_groups`.
///
/// Groups are walked in ascending order for head sampling and descending order
/// for tail sampling. Whole groups are taken while they fit `limit_bytes`; the
/// first group that does not fit contributes the rows its average row size
/// allows and ends the walk. That group is still part of the read set.
pub fn plan_row_groups(
    path: &str,
    row_groups: &[RowGroupStats],
    strategy: Strategy,
    limit_bytes: u64,
    batch_size: usize,
) -> Result<RowGroupPlan, ExtractError> {
    if row_groups.is_empty() {
        return Err(ExtractError::invalid_file(path, "file has no row groups"));
    }
    if batch_size == 0 {
        return Err(ExtractError::Invariant("batch size must be positive".to_string()));
    }

    let ordered: Box<dyn Iterator<Item = &RowGroupStats>> = match strategy {
        Strategy::Tail => Box::new(row_groups.iter().rev()),
        Strategy::Head | Strategy::Unspecified => Box::new(row_groups.iter()),
    };

    let mut selected = Vec::new();
    let mut bytes = 0u64;
    let mut rows = 0u64;
    for rg in ordered {
        if rg.num_rows == 0 {
            continue;
        }
        selected.push(rg.index);

        let total = bytes.saturating_add(rg.byte_size);
        if total > limit_bytes {
            let remaining = limit_bytes.checked_sub(bytes).ok_or_else(|| {
                ExtractError::Invariant(format!(
                    "accumulated {bytes} bytes exceeds the {limit_bytes} byte budget"
                ))
            })?;
            let per_row = (rg.byte_size / rg.num_rows).max(1);
            let partial = (remaining / per_row).min(rg.num_rows);
            rows += partial;
            bytes += partial * per_row;
            break;
        }
        bytes = total;
        rows += rg.num_rows;
    }

    let batches = rows / batch_size as u64;
    let num_records = usize::try_from(batches).unwrap_or(usize::MAX).max(1);
    Ok(RowGroupPlan { row_groups: selected, rows, bytes, num_records })
}

/// Reads the batches of a bounded sample of one parquet file.
///
/// Every batch handed back is retained with `allocator`; on error or
/// cancellation, everything retained so far is released before returning.
pub async fn estimate_records<T>(
    ctx: &RequestContext,
    path: &str,
    input: T,
    metadata: ArrowReaderMetadata,
    policy: &ExtractPolicy,
    settings: &ExtractSettings,
    allocator: &CheckedAllocator,
) -> Result<Vec<RetainedBatch>, ExtractError>
where
    T: AsyncFileReader + Send + Unpin + 'static,
{
    let stats = RowGroupStats::from_metadata(metadata.metadata())?;
    let plan = plan_row_groups(
        path,
        &stats,
        policy.rows_strategy,
        policy.rows_limit_bytes,
        settings.batch_size,
    )?;
    debug!(
        path,
        row_groups = ?plan.row_groups,
        rows = plan.rows,
        bytes = plan.bytes,
        num_records = plan.num_records,
        "planned bounded read"
    );

    let mut stream = ParquetRecordBatchStreamBuilder::new_with_metadata(input, metadata)
        .with_batch_size(settings.batch_size)
        .with_row_groups(plan.row_groups)
        .with_projection(ProjectionMask::all())
        .build()
        .map_err(ExtractError::parquet(path))?;

    let mut container = match policy.rows_strategy {
        Strategy::Head => Container::head(plan.num_records, RetainedBatch::release)?,
        Strategy::Tail => Container::tail(plan.num_records, RetainedBatch::release)?,
        Strategy::Unspecified => Container::unbounded(RetainedBatch::release),
    };

    while !container.is_full() {
        let Some(batch) = ctx.run(stream.next()).await? else {
            break;
        };
        let batch = batch.map_err(ExtractError::parquet(path))?;
        container.add(allocator.retain(&batch));
    }

    Ok(container.items())
}
