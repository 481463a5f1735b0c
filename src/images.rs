use std::time::Duration;

use anyhow::Context as _;
use md5::{Digest as _, Md5};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use url::Url;

use crate::http::PoliteClient;
use crate::object_store::ObjectStore;

const IMAGE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_EXTENSION: &str = "jpg";
const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct ImageTarget {
    pub bucket: String,
    pub prefix: String,
}

/// `<prefix>/<md5(url)>.<ext>`; the hash is over the source URL, not the bytes.
pub fn image_key(prefix: &str, image_url: &str) -> String {
    let digest = Md5::digest(image_url.as_bytes());
    let extension = image_extension(image_url);
    let prefix = prefix.trim_matches('/');
    let prefix = if prefix.is_empty() { "books" } else { prefix };
    format!("{prefix}/{}.{extension}", hex::encode(digest))
}

fn image_extension(image_url: &str) -> String {
    let without_query = image_url.split(['?', '#']).next().unwrap_or_default();
    let last_segment = without_query.rsplit('/').next().unwrap_or_default();
    match last_segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            ext.to_owned()
        }
        _ => DEFAULT_EXTENSION.to_owned(),
    }
}

/// Uploads the image behind `image_url` unless its key is already present.
pub async fn store_image(
    http: &PoliteClient,
    store: &dyn ObjectStore,
    target: &ImageTarget,
    image_url: &Url,
) -> Option<String> {
    let key = image_key(&target.prefix, image_url.as_str());

    if store.exists(&target.bucket, &key).await {
        tracing::debug!(bucket = %target.bucket, %key, "image already stored");
        return Some(key);
    }

    let (data, content_type) = match download(http, image_url).await {
        Ok(downloaded) => downloaded,
        Err(err) => {
            tracing::warn!(url = %image_url, err = %format!("{err:#}"), "image download failed");
            return None;
        }
    };

    match store.put(&target.bucket, &key, &data, &content_type).await {
        Ok(key) => {
            tracing::info!(bucket = %target.bucket, %key, "image uploaded");
            Some(key)
        }
        Err(err) => {
            tracing::warn!(url = %image_url, err = %format!("{err:#}"), "image upload failed");
            None
        }
    }
}

async fn download(http: &PoliteClient, image_url: &Url) -> anyhow::Result<(Vec<u8>, String)> {
    let response = http
        .client()
        .get(image_url.clone())
        .header(USER_AGENT, http.user_agent())
        .timeout(IMAGE_TIMEOUT)
        .send()
        .await
        .with_context(|| format!("GET {image_url}"))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("GET {image_url} failed ({status})");
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned());
    let data = response
        .bytes()
        .await
        .with_context(|| format!("read image body: {image_url}"))?;

    Ok((data.to_vec(), content_type))
}
