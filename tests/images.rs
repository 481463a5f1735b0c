mod support;

use std::time::Duration;

use datapulse::http::PoliteClient;
use datapulse::images::{ImageTarget, image_key, store_image};
use datapulse::object_store::{LocalFsObjectStore, ObjectStore as _};
use support::{MockServer, bytes};
use url::Url;

fn target() -> ImageTarget {
    ImageTarget {
        bucket: "images".to_owned(),
        prefix: "books".to_owned(),
    }
}

#[tokio::test]
async fn second_store_of_same_url_does_not_download_again() -> anyhow::Result<()> {
    let site = MockServer::start(vec![bytes("/media/cover.jpg", "image/jpeg", b"cover")]);
    let tmp = tempfile::TempDir::new()?;
    let store = LocalFsObjectStore::new(tmp.path());
    let http = PoliteClient::new("DataPulseTest/1.0", Duration::ZERO)?;
    let url = Url::parse(&site.url("/media/cover.jpg"))?;

    let first = store_image(&http, &store, &target(), &url).await;
    let second = store_image(&http, &store, &target(), &url).await;

    let expected = image_key("books", url.as_str());
    assert_eq!(first.as_deref(), Some(expected.as_str()));
    assert_eq!(second, first);
    assert_eq!(site.hits("/media/cover.jpg"), 1);
    assert!(store.exists("images", &expected).await);
    Ok(())
}

#[tokio::test]
async fn failed_download_is_soft() -> anyhow::Result<()> {
    let site = MockServer::start(vec![]);
    let tmp = tempfile::TempDir::new()?;
    let store = LocalFsObjectStore::new(tmp.path());
    let http = PoliteClient::new("DataPulseTest/1.0", Duration::ZERO)?;
    let url = Url::parse(&site.url("/media/gone.jpg"))?;

    let stored = store_image(&http, &store, &target(), &url).await;

    assert_eq!(stored, None);
    assert!(!store.exists("images", &image_key("books", url.as_str())).await);
    Ok(())
}
