use std::io::{self, Write};
use std::ops::Range;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use arrow::array::{Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use futures::future::BoxFuture;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use parquet::arrow::arrow_reader::{ArrowReaderMetadata, ArrowReaderOptions, ParquetRecordBatchReaderBuilder};
use parquet::arrow::async_reader::{AsyncFileReader, ParquetObjectReader};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::ParquetMetaData;
use parquet::file::properties::WriterProperties;
use sluice_common::{ExtractPolicy, ExtractSettings, RequestContext, Strategy};
use sluice_connector_blob::{estimate_records, BoundedExtractor, CheckedAllocator, ExtractError};

fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("label", DataType::Utf8, false),
    ]))
}

/// A parquet file with ids `0..rows`, split into row groups of `group_rows`.
fn fixture(rows: i64, group_rows: usize) -> Bytes {
    let props = WriterProperties::builder().set_max_row_group_size(group_rows).build();
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, schema(), Some(props)).unwrap();
    if rows > 0 {
        let ids: Vec<i64> = (0..rows).collect();
        let labels: Vec<String> = ids.iter().map(|i| format!("row-{i:06}")).collect();
        let batch = RecordBatch::try_new(
            schema(),
            vec![Arc::new(Int64Array::from(ids)), Arc::new(StringArray::from(labels))],
        )
        .unwrap();
        writer.write(&batch).unwrap();
    }
    writer.close().unwrap();
    Bytes::from(buf)
}

fn group_sizes(file: &Bytes) -> Vec<u64> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(file.clone()).unwrap();
    builder.metadata().row_groups().iter().map(|rg| rg.compressed_size() as u64).collect()
}

fn read_ids(file: Vec<u8>) -> Vec<i64> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(file)).unwrap().build().unwrap();
    let mut ids = Vec::new();
    for batch in reader {
        let batch = batch.unwrap();
        let col = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        ids.extend(col.values().iter().copied());
    }
    ids
}

async fn setup(files: &[(&str, Bytes)]) -> BoundedExtractor {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
    for (key, data) in files {
        store.put(&Path::from(*key), PutPayload::from(data.clone())).await.unwrap();
    }
    BoundedExtractor::new(store, ExtractSettings::default())
}

async fn extract(
    extractor: &BoundedExtractor,
    key: &str,
    policy: ExtractPolicy,
) -> Result<Vec<u8>, ExtractError> {
    let ctx = RequestContext::new();
    let mut out = Vec::new();
    extractor.download_bounded(&ctx, &Path::from(key), &policy, &mut out).await?;
    Ok(out)
}

#[tokio::test]
async fn test_head_reads_first_rows() {
    let file = fixture(5000, 1000);
    let sizes = group_sizes(&file);
    assert_eq!(sizes.len(), 5);
    let extractor = setup(&[("t.parquet", file)]).await;

    let budget = sizes[0] + sizes[1] / 2;
    let out = extract(&extractor, "t.parquet", ExtractPolicy::rows(Strategy::Head, budget)).await.unwrap();

    let ids = read_ids(out);
    assert_eq!(ids, (0..1000).collect::<Vec<_>>());
    extractor.allocator().assert_outstanding(0);
}

#[tokio::test]
async fn test_tail_reads_last_group() {
    let file = fixture(5000, 1000);
    let sizes = group_sizes(&file);
    let extractor = setup(&[("t.parquet", file)]).await;

    let budget = sizes[4] / 2;
    let out = extract(&extractor, "t.parquet", ExtractPolicy::rows(Strategy::Tail, budget)).await.unwrap();

    let ids = read_ids(out);
    assert_eq!(ids, (4000..5000).collect::<Vec<_>>());
    extractor.allocator().assert_outstanding(0);
}

#[tokio::test]
async fn test_tail_spanning_groups_keeps_last_read_batches() {
    let file = fixture(5000, 1000);
    let sizes = group_sizes(&file);
    let extractor = setup(&[("t.parquet", file)]).await;

    // Groups 4 and 3 fit whole and group 2 half fits: 2500 rows, two batches.
    // Groups are read newest first and the container keeps the last two read.
    let budget = sizes[4] + sizes[3] + sizes[2] / 2;
    let out = extract(&extractor, "t.parquet", ExtractPolicy::rows(Strategy::Tail, budget)).await.unwrap();

    let expected: Vec<i64> = (3000..4000).chain(2000..3000).collect();
    assert_eq!(read_ids(out), expected);
    extractor.allocator().assert_outstanding(0);
}

#[tokio::test]
async fn test_budget_covering_whole_file() {
    let file = fixture(5000, 1000);
    let extractor = setup(&[("t.parquet", file)]).await;

    let out = extract(&extractor, "t.parquet", ExtractPolicy::rows(Strategy::Head, 1 << 40)).await.unwrap();
    assert_eq!(read_ids(out), (0..5000).collect::<Vec<_>>());

    let out = extract(&extractor, "t.parquet", ExtractPolicy::rows(Strategy::Tail, 1 << 40)).await.unwrap();
    let mut ids = read_ids(out);
    ids.sort_unstable();
    assert_eq!(ids, (0..5000).collect::<Vec<_>>());
    extractor.allocator().assert_outstanding(0);
}

#[tokio::test]
async fn test_file_smaller_than_one_batch() {
    let extractor = setup(&[("small.parquet", fixture(10, 1000))]).await;
    let out = extract(&extractor, "small.parquet", ExtractPolicy::rows(Strategy::Head, 1 << 20)).await.unwrap();
    assert_eq!(read_ids(out), (0..10).collect::<Vec<_>>());
    extractor.allocator().assert_outstanding(0);
}

#[tokio::test]
async fn test_output_is_uncompressed_with_same_schema() {
    let extractor = setup(&[("t.parquet", fixture(2500, 1000))]).await;
    let out = extract(&extractor, "t.parquet", ExtractPolicy::rows(Strategy::Head, 1 << 30)).await.unwrap();

    let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(out)).unwrap();
    assert_eq!(builder.schema().fields(), schema().fields());
    let metadata = builder.metadata();
    assert_eq!(metadata.num_row_groups(), 1);
    // 2500 rows is two full batches; the partial third does not fit the estimate.
    assert_eq!(metadata.file_metadata().num_rows(), 2000);
    for column in metadata.row_group(0).columns() {
        assert_eq!(column.compression(), Compression::UNCOMPRESSED);
    }

    let batch = builder.build().unwrap().next().unwrap().unwrap();
    let labels = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
    assert_eq!(labels.value(0), "row-000000");
    assert_eq!(labels.null_count(), 0);
}

#[tokio::test]
async fn test_no_row_groups_is_invalid() {
    let extractor = setup(&[("empty.parquet", fixture(0, 1000))]).await;
    let err = extract(&extractor, "empty.parquet", ExtractPolicy::rows(Strategy::Head, 1000))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::InvalidFile { ref path, .. } if path == "empty.parquet"), "{err}");
    extractor.allocator().assert_outstanding(0);
}

#[tokio::test]
async fn test_missing_object() {
    let extractor = setup(&[]).await;
    let err = extract(&extractor, "nope.parquet", ExtractPolicy::rows(Strategy::Head, 1000))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::ObjectStore(object_store::Error::NotFound { .. })), "{err}");
}

#[tokio::test]
async fn test_not_a_parquet_file() {
    let extractor = setup(&[("bad.parquet", Bytes::from_static(b"definitely not parquet"))]).await;
    let err = extract(&extractor, "bad.parquet", ExtractPolicy::rows(Strategy::Head, 1000))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Parquet { .. }), "{err}");
    extractor.allocator().assert_outstanding(0);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let extractor = setup(&[("t.parquet", fixture(5000, 1000))]).await;
    let ctx = RequestContext::new();
    ctx.cancel();

    let mut out = Vec::new();
    let err = extractor
        .download_bounded(&ctx, &Path::from("t.parquet"), &ExtractPolicy::rows(Strategy::Head, 1 << 20), &mut out)
        .await
        .unwrap_err();
    assert!(err.is_cancellation());
    assert!(out.is_empty());
    extractor.allocator().assert_outstanding(0);
}

/// Cancels its context on the first read issued while a batch is retained.
struct CancelAfterFirstBatch {
    inner: ParquetObjectReader,
    ctx: RequestContext,
    allocator: CheckedAllocator,
    retained_at_cancel: Arc<AtomicI64>,
}

impl AsyncFileReader for CancelAfterFirstBatch {
    fn get_bytes(&mut self, range: Range<u64>) -> BoxFuture<'_, parquet::errors::Result<Bytes>> {
        let retained = self.allocator.outstanding_batches();
        if retained > 0 && !self.ctx.is_done() {
            self.retained_at_cancel.store(retained, Ordering::SeqCst);
            self.ctx.cancel();
        }
        self.inner.get_bytes(range)
    }

    fn get_metadata<'a>(
        &'a mut self,
        options: Option<&'a ArrowReaderOptions>,
    ) -> BoxFuture<'a, parquet::errors::Result<Arc<ParquetMetaData>>> {
        self.inner.get_metadata(options)
    }
}

#[tokio::test]
async fn test_cancelled_mid_read_releases_batches() {
    let file = fixture(5000, 1000);
    let metadata = ArrowReaderMetadata::load(&file, ArrowReaderOptions::new()).unwrap();
    let size = file.len() as u64;
    let extractor = setup(&[("t.parquet", file)]).await;

    let ctx = RequestContext::new();
    let allocator = CheckedAllocator::new();
    let retained_at_cancel = Arc::new(AtomicI64::new(0));
    let input = CancelAfterFirstBatch {
        inner: ParquetObjectReader::new(Arc::clone(extractor.store()), Path::from("t.parquet")).with_file_size(size),
        ctx: ctx.clone(),
        allocator: allocator.clone(),
        retained_at_cancel: Arc::clone(&retained_at_cancel),
    };

    let err = estimate_records(
        &ctx,
        "t.parquet",
        input,
        metadata,
        &ExtractPolicy::rows(Strategy::Head, 1 << 40),
        &ExtractSettings::default(),
        &allocator,
    )
    .await
    .unwrap_err();

    assert!(err.is_cancellation(), "{err}");
    assert!(retained_at_cancel.load(Ordering::SeqCst) >= 1);
    allocator.assert_outstanding(0);
}

struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::other("disk full"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_write_failure_releases_batches() {
    let extractor = setup(&[("t.parquet", fixture(3000, 1000))]).await;
    let ctx = RequestContext::new();
    let err = extractor
        .download_bounded(&ctx, &Path::from("t.parquet"), &ExtractPolicy::rows(Strategy::Tail, 1 << 20), FailingWriter)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Parquet { .. }), "{err}");
    extractor.allocator().assert_outstanding(0);
}

#[tokio::test]
async fn test_download_prefix_selects_and_samples() {
    let file = fixture(3000, 1000);
    let first_group = group_sizes(&file)[0];
    let extractor = setup(&[
        ("data/b.parquet", file.clone()),
        ("data/a.parquet", file.clone()),
        ("data/c.parquet", file.clone()),
        ("data/notes.csv", Bytes::from_static(b"a,b\n1,2\n")),
        ("other/d.parquet", file),
    ])
    .await;
    let dir = tempfile::tempdir().unwrap();
    let policy = ExtractPolicy {
        rows_strategy: Strategy::Head,
        rows_limit_bytes: first_group,
        files_strategy: Strategy::Tail,
        files_limit: 2,
    };

    let ctx = RequestContext::new();
    let written = extractor.download_prefix(&ctx, &Path::from("data"), &policy, dir.path()).await.unwrap();

    let names: Vec<String> =
        written.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert_eq!(names, vec!["data_b.parquet", "data_c.parquet"]);
    for path in &written {
        let ids = read_ids(std::fs::read(path).unwrap());
        assert_eq!(ids, (0..1000).collect::<Vec<_>>());
    }
    extractor.allocator().assert_outstanding(0);
}

#[tokio::test]
async fn test_download_prefix_copies_whole_files_without_row_limit() {
    let file = fixture(1500, 1000);
    let extractor = setup(&[("data/a.parquet", file.clone())]).await;
    let dir = tempfile::tempdir().unwrap();

    let ctx = RequestContext::new();
    let written = extractor
        .download_prefix(&ctx, &Path::from("data"), &ExtractPolicy::default(), dir.path())
        .await
        .unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(std::fs::read(&written[0]).unwrap(), file.to_vec());
}

#[tokio::test]
async fn test_download_prefix_removes_failed_file() {
    let extractor = setup(&[
        ("data/a.parquet", fixture(100, 1000)),
        ("data/b.parquet", Bytes::from_static(b"corrupt")),
    ])
    .await;
    let dir = tempfile::tempdir().unwrap();

    let ctx = RequestContext::new();
    let err = extractor
        .download_prefix(&ctx, &Path::from("data"), &ExtractPolicy::rows(Strategy::Head, 1 << 20), dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::Parquet { ref path, .. } if path == "data/b.parquet"), "{err}");
    assert!(dir.path().join("data_a.parquet").exists());
    assert!(!dir.path().join("data_b.parquet").exists());
    extractor.allocator().assert_outstanding(0);
}
