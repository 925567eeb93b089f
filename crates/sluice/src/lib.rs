//! Sluice: connector analysis and policy-bounded extraction.
//!
//! Re-exports the component crates and resolves the object store locations
//! the command line accepts.

use std::sync::Arc;

use object_store::path::Path;
use object_store::ObjectStore;
use url::Url;

pub use sluice_common as common;
pub use sluice_compiler as compiler;
pub use sluice_connector_blob as blob;
pub use sluice_container as container;
pub use sluice_drivers as drivers;

/// Turns a URL (`s3://bucket/key`, `file:///tmp/x.parquet`, `memory:///k`) or
/// a local path into a store and the object path within it.
pub fn open_location(location: &str) -> Result<(Arc<dyn ObjectStore>, Path), object_store::Error> {
    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(_) => local_url(location)?,
    };
    let (store, path) = object_store::parse_url(&url)?;
    Ok((Arc::from(store), path))
}

fn local_url(path: &str) -> Result<Url, object_store::Error> {
    let invalid = |message: String| object_store::Error::Generic {
        store: "LocalFileSystem",
        source: message.into(),
    };
    let absolute = std::path::absolute(path).map_err(|e| invalid(format!("{path}: {e}")))?;
    Url::from_file_path(&absolute).map_err(|_| invalid(format!("not a usable path: {path}")))
}
