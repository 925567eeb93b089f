use async_trait::async_trait;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::ObjectStore;
use serde::Deserialize;
use sluice_common::RequestContext;
use tracing::debug;
use url::Url;

use crate::spec::{DriverSpec, PropertySchema, PropertyType};
use crate::{decode_props, Driver, DriverError, Properties};

const DRIVER: &str = "s3";
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3SourceConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
}

impl S3SourceConfig {
    pub fn parse(props: &Properties) -> Result<Self, DriverError> {
        decode_props(DRIVER, props)
    }

    fn has_credentials(&self) -> bool {
        let set = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        set(&self.aws_access_key_id) || set(&self.aws_secret_access_key)
    }
}

/// Splits `s3://bucket/key/prefix*` into the bucket and the listable prefix
/// in front of any glob character.
pub fn bucket_and_prefix(path: &str) -> Result<(String, String), DriverError> {
    let url = Url::parse(path).map_err(|e| DriverError::invalid_properties(DRIVER, format!("{path}: {e}")))?;
    if url.scheme() != "s3" {
        return Err(DriverError::invalid_properties(DRIVER, format!("{path}: expected an s3:// URI")));
    }
    let bucket = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| DriverError::invalid_properties(DRIVER, format!("{path}: missing bucket")))?
        .to_string();
    let key = url.path().trim_start_matches('/');
    let prefix = match key.find(['*', '?', '[', '{']) {
        Some(idx) => &key[..idx],
        None => key,
    };
    Ok((bucket, prefix.to_string()))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct S3Driver;

#[async_trait]
impl Driver for S3Driver {
    fn spec(&self) -> DriverSpec {
        DriverSpec {
            display_name: "Amazon S3".to_string(),
            description: "Connect to AWS S3 Storage.".to_string(),
            config_properties: vec![
                PropertySchema::new("aws_access_key_id", "AWS access key ID", PropertyType::String).secret(),
                PropertySchema::new("aws_secret_access_key", "AWS secret access key", PropertyType::String)
                    .secret(),
            ],
            source_properties: vec![
                PropertySchema::new("path", "S3 URI", PropertyType::String)
                    .description("Path to file on the disk.")
                    .placeholder("s3://bucket-name/path/to/file.csv")
                    .required()
                    .hint("Glob patterns are supported"),
                PropertySchema::new("region", "AWS region", PropertyType::String)
                    .description("AWS Region for the bucket.")
                    .placeholder(DEFAULT_REGION)
                    .hint("Defaults to us-east-1 when unset."),
                PropertySchema::new("endpoint", "Endpoint URL", PropertyType::String)
                    .description("Override S3 Endpoint URL")
                    .placeholder("https://my.s3.server.com"),
            ],
            implements_object_store: true,
            ..Default::default()
        }
    }

    /// Anonymous iff no credentials are configured and an unsigned listing of
    /// the path prefix succeeds.
    async fn has_anonymous_source_access(
        &self,
        ctx: &RequestContext,
        props: &Properties,
    ) -> Result<bool, DriverError> {
        let conf = S3SourceConfig::parse(props)?;
        if conf.has_credentials() {
            return Ok(false);
        }
        let (bucket, prefix) = bucket_and_prefix(&conf.path)?;

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&bucket)
            .with_region(conf.region.as_deref().unwrap_or(DEFAULT_REGION))
            .with_skip_signature(true);
        if let Some(endpoint) = conf.endpoint.as_deref() {
            builder = builder.with_endpoint(endpoint);
        }
        let store = builder.build()?;

        let prefix = Path::from(prefix);
        let mut listing = store.list(Some(&prefix));
        match ctx.run(listing.next()).await? {
            Some(Err(err)) => {
                debug!(bucket, %err, "unsigned s3 listing failed");
                Ok(false)
            }
            Some(Ok(_)) | None => Ok(true),
        }
    }

    async fn tertiary_source_connectors(
        &self,
        _ctx: &RequestContext,
        _props: &Properties,
    ) -> Result<Vec<String>, DriverError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bucket_and_prefix() {
        let (bucket, prefix) = bucket_and_prefix("s3://my-bucket/data/2024/*.parquet").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(prefix, "data/2024/");

        let (bucket, prefix) = bucket_and_prefix("s3://my-bucket/file.csv").unwrap();
        assert_eq!(bucket, "my-bucket");
        assert_eq!(prefix, "file.csv");
    }

    #[test]
    fn test_bucket_and_prefix_rejects_other_schemes() {
        assert!(bucket_and_prefix("gs://bucket/file.csv").is_err());
        assert!(bucket_and_prefix("not a url").is_err());
    }

    #[tokio::test]
    async fn test_credentials_are_not_anonymous() {
        let props = json!({
            "path": "s3://bucket/file.parquet",
            "aws_access_key_id": "AKIA",
            "aws_secret_access_key": "secret",
        });
        let anon = S3Driver
            .has_anonymous_source_access(&RequestContext::new(), props.as_object().unwrap())
            .await
            .unwrap();
        assert!(!anon);
    }

    #[tokio::test]
    async fn test_invalid_path_is_an_error() {
        let props = json!({"path": "bucket/file.parquet"});
        let res = S3Driver
            .has_anonymous_source_access(&RequestContext::new(), props.as_object().unwrap())
            .await;
        assert!(matches!(res, Err(DriverError::InvalidProperties { .. })));
    }
}
