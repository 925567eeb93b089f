//! Selecting and downloading the objects under a prefix.

use std::fs::File;
use std::path::{Path as FsPath, PathBuf};

use futures::{StreamExt, TryStreamExt};
use object_store::path::Path;
use object_store::ObjectMeta;
use sluice_common::{ExtractPolicy, RequestContext, Strategy};
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::extract::{BoundedExtractor, ExtractSummary};

const PARALLEL_DOWNLOADS: usize = 4;

/// Orders `objects` by key and keeps the ones `policy` selects: the first
/// `files_limit` for head, the last `files_limit` for tail.
pub fn select_files(mut objects: Vec<ObjectMeta>, policy: &ExtractPolicy) -> Vec<ObjectMeta> {
    objects.sort_by(|a, b| a.location.as_ref().cmp(b.location.as_ref()));
    if !policy.limits_files() {
        return objects;
    }

    let limit = usize::try_from(policy.files_limit).unwrap_or(usize::MAX).min(objects.len());
    match policy.files_strategy {
        Strategy::Head => objects.truncate(limit),
        Strategy::Tail => {
            objects.drain(..objects.len() - limit);
        }
        Strategy::Unspecified => {}
    }
    objects
}

fn is_parquet(meta: &ObjectMeta) -> bool {
    meta.location.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"))
}

/// Local file name for `location`, flattening the key's directories.
fn local_name(location: &Path) -> String {
    location.parts().map(|p| p.as_ref().to_string()).collect::<Vec<_>>().join("_")
}

/// Removes the output of a failed download. A file that was never created is
/// fine; any other failure is logged and otherwise ignored.
pub fn remove_partial(path: &FsPath) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), %err, "cannot remove partial file");
        }
    }
}

impl BoundedExtractor {
    /// Downloads the parquet objects under `prefix` that `policy` selects into
    /// `dir`. Files are sampled when the policy limits rows and copied whole
    /// otherwise. Every selected file is attempted; files that fail are
    /// removed and the first error is returned.
    pub async fn download_prefix(
        &self,
        ctx: &RequestContext,
        prefix: &Path,
        policy: &ExtractPolicy,
        dir: &FsPath,
    ) -> Result<Vec<PathBuf>, ExtractError> {
        let objects: Vec<ObjectMeta> = ctx.run(self.store().list(Some(prefix)).try_collect()).await??;
        let listed = objects.len();
        let objects: Vec<ObjectMeta> = objects.into_iter().filter(is_parquet).collect();
        let selected = select_files(objects, policy);
        debug!(prefix = %prefix, listed, selected = selected.len(), "selected objects");

        let concurrency = if self.settings().parallel_decode { PARALLEL_DOWNLOADS } else { 1 };
        futures::stream::iter(selected)
            .map(|meta| async move {
                let target = dir.join(local_name(&meta.location));
                match self.download_one(ctx, &meta.location, policy, &target).await {
                    Ok(_) => Ok(target),
                    Err(err) => {
                        remove_partial(&target);
                        Err(err)
                    }
                }
            })
            .buffered(concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect()
    }

    async fn download_one(
        &self,
        ctx: &RequestContext,
        location: &Path,
        policy: &ExtractPolicy,
        target: &FsPath,
    ) -> Result<ExtractSummary, ExtractError> {
        let target_name = target.display().to_string();
        let file = File::create(target).map_err(ExtractError::io(&target_name))?;
        self.download(ctx, location, policy, file).await
    }
}
