use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, BucketConfiguration, Region};
use tokio::fs;

use crate::config::ObjectStoreConfig;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Creates the bucket when it does not exist yet. Safe to call repeatedly.
    async fn ensure_bucket(&self, bucket: &str) -> anyhow::Result<()>;

    async fn exists(&self, bucket: &str, key: &str) -> bool;

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    region: Region,
    credentials: Credentials,
}

impl S3ObjectStore {
    pub fn new(config: &ObjectStoreConfig) -> anyhow::Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .context("build s3 credentials")?;
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
        };
        Ok(Self {
            region,
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> anyhow::Result<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .with_context(|| format!("open bucket handle: {name}"))?;
        Ok(bucket.with_path_style())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> anyhow::Result<()> {
        let created = Bucket::create_with_path_style(
            bucket,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match created {
            Ok(response) if response.success() => {
                tracing::info!(bucket, "created bucket");
                Ok(())
            }
            Ok(response) if response.response_code == 409 => {
                tracing::debug!(bucket, "bucket already exists");
                Ok(())
            }
            Ok(response) => anyhow::bail!(
                "create bucket {bucket} failed ({}): {}",
                response.response_code,
                response.response_text
            ),
            Err(S3Error::HttpFailWithBody(409, _)) => {
                tracing::debug!(bucket, "bucket already exists");
                Ok(())
            }
            Err(err) => Err(err).with_context(|| format!("create bucket: {bucket}")),
        }
    }

    async fn exists(&self, bucket: &str, key: &str) -> bool {
        let handle = match self.bucket(bucket) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::debug!(bucket, key, ?err, "object probe failed");
                return false;
            }
        };
        match handle.head_object(key).await {
            Ok((_, code)) => (200..300).contains(&code),
            Err(err) => {
                tracing::debug!(bucket, key, %err, "object probe failed");
                false
            }
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> anyhow::Result<String> {
        let handle = self.bucket(bucket)?;
        let response = handle
            .put_object_with_content_type(key, data, content_type)
            .await
            .with_context(|| format!("put s3://{bucket}/{key}"))?;
        let code = response.status_code();
        if !(200..300).contains(&code) {
            anyhow::bail!("put s3://{bucket}/{key} failed ({code})");
        }
        Ok(key.to_owned())
    }
}

#[derive(Debug, Clone)]
pub struct LocalFsObjectStore {
    root: PathBuf,
}

impl LocalFsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> anyhow::Result<PathBuf> {
        let mut path = self.root.join(checked_segment(bucket)?);
        for segment in key.split('/') {
            if segment.is_empty() {
                continue;
            }
            path = path.join(checked_segment(segment)?);
        }
        Ok(path)
    }
}

fn checked_segment(segment: &str) -> anyhow::Result<&Path> {
    let path = Path::new(segment);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => anyhow::bail!("invalid object path segment: {segment:?}"),
    }
}

#[async_trait]
impl ObjectStore for LocalFsObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> anyhow::Result<()> {
        let dir = self.root.join(checked_segment(bucket)?);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create bucket dir: {}", dir.display()))
    }

    async fn exists(&self, bucket: &str, key: &str) -> bool {
        match self.object_path(bucket, key) {
            Ok(path) => fs::metadata(&path)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        _content_type: &str,
    ) -> anyhow::Result<String> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create object dir: {}", parent.display()))?;
        }
        fs::write(&path, data)
            .await
            .with_context(|| format!("write object: {}", path.display()))?;
        Ok(key.to_owned())
    }
}
