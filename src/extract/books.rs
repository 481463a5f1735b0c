use anyhow::Context as _;
use url::Url;

use super::{Pagination, next_page, selector, text_of};
use crate::formats::RawBook;
use crate::http::PoliteClient;
use crate::images::{ImageTarget, store_image};
use crate::object_store::ObjectStore;

pub const DEFAULT_SEED_URL: &str = "https://books.toscrape.com/";

#[derive(Clone, Copy)]
pub struct BookImages<'a> {
    pub store: &'a dyn ObjectStore,
    pub target: &'a ImageTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookItem {
    pub title: String,
    pub price_raw: String,
    pub rating: i64,
    pub in_stock: bool,
    pub img_url: Option<Url>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookListingPage {
    pub header: Option<String>,
    pub items: Vec<BookItem>,
    pub next: Option<Url>,
}

/// Scrapes every book reachable from `seed`.
///
/// When the seed page has a category sidebar each category listing is walked
/// and tagged with the category name; otherwise the seed itself is walked as a
/// single listing and the page header names the category.
pub async fn scrape_books(
    http: &PoliteClient,
    seed: &Url,
    images: Option<BookImages<'_>>,
) -> anyhow::Result<Vec<RawBook>> {
    tracing::info!(%seed, "books scrape started");

    if let Some(images) = images {
        images
            .store
            .ensure_bucket(&images.target.bucket)
            .await
            .with_context(|| format!("ensure bucket: {}", images.target.bucket))?;
    }

    let seed_html = http.get_html(seed).await.context("fetch books seed page")?;
    let categories = parse_categories(&seed_html, seed)?;

    let mut rows = Vec::new();
    if categories.is_empty() {
        walk_listing(http, seed.clone(), None, Some(seed_html), images, &mut rows).await?;
    } else {
        tracing::info!(categories = categories.len(), "books categories found");
        for (name, url) in categories {
            tracing::info!(category = %name, "books category");
            walk_listing(http, url, Some(name), None, images, &mut rows).await?;
        }
    }

    tracing::info!(rows = rows.len(), "books scrape finished");
    Ok(rows)
}

async fn walk_listing(
    http: &PoliteClient,
    start: Url,
    category: Option<String>,
    mut prefetched: Option<String>,
    images: Option<BookImages<'_>>,
    rows: &mut Vec<RawBook>,
) -> anyhow::Result<()> {
    let mut pagination = Pagination::default();
    let mut next_url = Some(start);

    while let Some(url) = next_url.take() {
        if !pagination.first_visit(&url) {
            break;
        }
        let html = match prefetched.take() {
            Some(html) => html,
            None => http.get_html(&url).await?,
        };
        let page = parse_listing(&html, &url)?;
        tracing::info!(%url, books = page.items.len(), "books page parsed");

        let page_category = category
            .clone()
            .or(page.header)
            .unwrap_or_default();

        for item in page.items {
            let img_path = match (images, item.img_url.as_ref()) {
                (Some(images), Some(img_url)) => {
                    store_image(http, images.store, images.target, img_url).await
                }
                _ => None,
            };
            rows.push(RawBook {
                title: item.title,
                category: page_category.clone(),
                price_raw: item.price_raw,
                rating: item.rating,
                book_availability: item.in_stock,
                img_url: item.img_url.map(String::from),
                img_path,
            });
        }

        next_url = page.next;
    }

    Ok(())
}

pub fn parse_categories(html: &str, page_url: &Url) -> anyhow::Result<Vec<(String, Url)>> {
    let document = scraper::Html::parse_document(html);
    let link_sel = selector("div.side_categories ul li ul li a")?;

    let mut categories = Vec::new();
    for link in document.select(&link_sel) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let name = text_of(link);
        let url = page_url
            .join(href)
            .with_context(|| format!("resolve category link {href:?}"))?;
        categories.push((name, url));
    }
    Ok(categories)
}

pub fn parse_listing(html: &str, page_url: &Url) -> anyhow::Result<BookListingPage> {
    let document = scraper::Html::parse_document(html);
    let header_sel = selector("div.page-header h1")?;
    let pod_sel = selector("article.product_pod")?;
    let title_sel = selector("h3 a")?;
    let price_sel = selector("p.price_color")?;
    let rating_sel = selector("p.star-rating")?;
    let availability_sel = selector("p.instock.availability")?;
    let img_sel = selector("div.image_container img")?;

    let header = document
        .select(&header_sel)
        .next()
        .map(text_of)
        .filter(|h| !h.is_empty());

    let mut items = Vec::new();
    for pod in document.select(&pod_sel) {
        let title = pod
            .select(&title_sel)
            .next()
            .and_then(|a| a.value().attr("title"))
            .unwrap_or_default()
            .trim()
            .to_owned();
        let price_raw = pod.select(&price_sel).next().map(text_of).unwrap_or_default();
        let rating = pod
            .select(&rating_sel)
            .next()
            .and_then(|p| p.value().classes().find_map(rating_from_word))
            .unwrap_or(0);
        let in_stock = pod
            .select(&availability_sel)
            .next()
            .map(text_of)
            .is_some_and(|text| text.contains("In stock"));
        let img_url = pod
            .select(&img_sel)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| page_url.join(src).ok());

        items.push(BookItem {
            title,
            price_raw,
            rating,
            in_stock,
            img_url,
        });
    }

    let next = next_page(&document, page_url)?;
    Ok(BookListingPage {
        header,
        items,
        next,
    })
}

fn rating_from_word(word: &str) -> Option<i64> {
    match word {
        "One" => Some(1),
        "Two" => Some(2),
        "Three" => Some(3),
        "Four" => Some(4),
        "Five" => Some(5),
        _ => None,
    }
}
