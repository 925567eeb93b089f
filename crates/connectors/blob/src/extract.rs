//! Bounded download of a single remote parquet file.

use std::io::Write;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use futures::StreamExt;
use object_store::path::Path;
use object_store::ObjectStore;
use parquet::arrow::arrow_reader::{ArrowReaderMetadata, ArrowReaderOptions};
use parquet::arrow::arrow_writer::{compute_leaves, get_column_writers};
use parquet::arrow::async_reader::ParquetObjectReader;
use parquet::arrow::{add_encoded_arrow_schema_to_metadata, ArrowSchemaConverter};
use parquet::basic::{Compression, Repetition};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::types::{SchemaDescriptor, Type, TypePtr};
use sluice_common::{ExtractPolicy, ExtractSettings, RequestContext};
use tracing::{debug, info};

use crate::allocator::{CheckedAllocator, RetainedBatch};
use crate::error::ExtractError;
use crate::estimate::estimate_records;

/// What a bounded download wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub path: String,
    pub batches: usize,
    pub rows: usize,
}

/// Downloads bounded samples of parquet objects from one store.
#[derive(Debug, Clone)]
pub struct BoundedExtractor {
    store: Arc<dyn ObjectStore>,
    settings: ExtractSettings,
    allocator: CheckedAllocator,
}

impl BoundedExtractor {
    pub fn new(store: Arc<dyn ObjectStore>, settings: ExtractSettings) -> Self {
        Self { store, settings, allocator: CheckedAllocator::new() }
    }

    pub fn with_allocator(mut self, allocator: CheckedAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn settings(&self) -> &ExtractSettings {
        &self.settings
    }

    pub fn allocator(&self) -> &CheckedAllocator {
        &self.allocator
    }

    /// Samples `location` when `policy` limits rows and copies it unchanged
    /// otherwise.
    pub async fn download<W>(
        &self,
        ctx: &RequestContext,
        location: &Path,
        policy: &ExtractPolicy,
        destination: W,
    ) -> Result<ExtractSummary, ExtractError>
    where
        W: Write + Send,
    {
        if policy.limits_rows() {
            return self.download_bounded(ctx, location, policy, destination).await;
        }
        self.download_full(ctx, location, destination).await
    }

    /// Writes the rows `policy` selects from `location` to `destination` as an
    /// uncompressed parquet file with a required root.
    ///
    /// On error the destination may hold a partial file; discarding it is up
    /// to the caller.
    pub async fn download_bounded<W>(
        &self,
        ctx: &RequestContext,
        location: &Path,
        policy: &ExtractPolicy,
        destination: W,
    ) -> Result<ExtractSummary, ExtractError>
    where
        W: Write + Send,
    {
        let path = location.as_ref();
        let meta = ctx.run(self.store.head(location)).await??;

        let mut reader = ParquetObjectReader::new(Arc::clone(&self.store), location.clone())
            .with_file_size(meta.size)
            .with_footer_size_hint(self.settings.metadata_prefetch_bytes);
        let metadata = ctx
            .run(ArrowReaderMetadata::load_async(&mut reader, ArrowReaderOptions::new()))
            .await?
            .map_err(ExtractError::parquet(path))?;
        let schema = Arc::clone(metadata.schema());
        debug!(
            path,
            size = meta.size,
            row_groups = metadata.metadata().num_row_groups(),
            "read parquet footer"
        );

        let batches = estimate_records(
            ctx,
            path,
            reader,
            metadata,
            policy,
            &self.settings,
            &self.allocator,
        )
        .await?;

        let table = concat_batches(&schema, batches.iter().map(RetainedBatch::batch))
            .map_err(ExtractError::arrow(path))?;
        let table = self.allocator.retain(&table);

        write_normalized(destination, table.batch()).map_err(ExtractError::parquet(path))?;

        let summary = ExtractSummary {
            path: path.to_string(),
            batches: batches.len(),
            rows: table.num_rows(),
        };
        table.release();
        for batch in batches {
            batch.release();
        }
        info!(path, batches = summary.batches, rows = summary.rows, "wrote bounded sample");
        Ok(summary)
    }

    async fn download_full<W>(
        &self,
        ctx: &RequestContext,
        location: &Path,
        mut destination: W,
    ) -> Result<ExtractSummary, ExtractError>
    where
        W: Write + Send,
    {
        let path = location.as_ref();
        let mut stream = ctx.run(self.store.get(location)).await??.into_stream();
        while let Some(chunk) = ctx.run(stream.next()).await? {
            destination.write_all(&chunk?).map_err(ExtractError::io(path))?;
        }
        destination.flush().map_err(ExtractError::io(path))?;
        debug!(path, "copied object");
        Ok(ExtractSummary { path: path.to_string(), batches: 0, rows: 0 })
    }
}

/// Parquet schema for `schema` with the root group marked required.
pub fn normalized_schema(schema: &Schema) -> Result<TypePtr, ParquetError> {
    let descr = ArrowSchemaConverter::new().convert(schema)?;
    let root = descr.root_schema();
    let root = Type::group_type_builder(root.name())
        .with_repetition(Repetition::REQUIRED)
        .with_fields(root.get_fields().to_vec())
        .build()?;
    Ok(Arc::new(root))
}

/// Writes `batch` as a single-row-group parquet file without compression.
/// An empty batch produces a file with the schema and no row groups.
pub fn write_normalized<W: Write + Send>(writer: W, batch: &RecordBatch) -> Result<(), ParquetError> {
    let arrow_schema = batch.schema();
    let root = normalized_schema(&arrow_schema)?;
    let parquet_schema = SchemaDescriptor::new(Arc::clone(&root));

    let mut props = WriterProperties::builder().set_compression(Compression::UNCOMPRESSED).build();
    add_encoded_arrow_schema_to_metadata(&arrow_schema, &mut props);
    let props = Arc::new(props);

    let mut file_writer = SerializedFileWriter::new(writer, root, Arc::clone(&props))?;
    if batch.num_rows() > 0 {
        let mut column_writers = get_column_writers(&parquet_schema, &props, &arrow_schema)?;
        let mut leaves_writers = column_writers.iter_mut();
        for (field, column) in arrow_schema.fields().iter().zip(batch.columns()) {
            for leaf in compute_leaves(field, column)? {
                let column_writer = leaves_writers.next().ok_or_else(|| {
                    ParquetError::General("more leaf columns than column writers".to_string())
                })?;
                column_writer.write(&leaf)?;
            }
        }

        let mut row_group = file_writer.next_row_group()?;
        for column_writer in column_writers {
            column_writer.close()?.append_to_row_group(&mut row_group)?;
        }
        row_group.close()?;
    }
    file_writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field};
    use bytes::Bytes;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec![Some("a"), None, Some("c")])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_normalized_schema_root_is_required() {
        let root = normalized_schema(&batch().schema()).unwrap();
        let info = root.get_basic_info();
        assert!(info.has_repetition());
        assert_eq!(info.repetition(), Repetition::REQUIRED);

        let fields = root.get_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].get_basic_info().repetition(), Repetition::REQUIRED);
        assert_eq!(fields[1].get_basic_info().repetition(), Repetition::OPTIONAL);
    }

    #[test]
    fn test_write_normalized_round_trip() {
        let mut buf = Vec::new();
        write_normalized(&mut buf, &batch()).unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(buf)).unwrap();
        let metadata = builder.metadata().clone();
        assert_eq!(metadata.num_row_groups(), 1);
        for column in metadata.row_group(0).columns() {
            assert_eq!(column.compression(), Compression::UNCOMPRESSED);
        }

        let batches: Vec<RecordBatch> = builder.build().unwrap().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].columns(), batch().columns());
    }

    #[test]
    fn test_write_normalized_empty_batch() {
        let empty = RecordBatch::new_empty(batch().schema());
        let mut buf = Vec::new();
        write_normalized(&mut buf, &empty).unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(buf)).unwrap();
        assert_eq!(builder.metadata().num_row_groups(), 0);
        assert_eq!(builder.schema().fields().len(), 2);
    }
}
