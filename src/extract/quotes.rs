use url::Url;

use super::{Pagination, next_page, selector, text_of};
use crate::formats::RawQuote;
use crate::http::PoliteClient;

pub const DEFAULT_SEED_URL: &str = "https://quotes.toscrape.com/";

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteItem {
    pub text: String,
    pub author: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuotePage {
    pub items: Vec<QuoteItem>,
    pub next: Option<Url>,
}

/// Walks the quote listing from `seed` until no "next" link remains.
pub async fn scrape_quotes(http: &PoliteClient, seed: &Url) -> anyhow::Result<Vec<RawQuote>> {
    tracing::info!(%seed, "quotes scrape started");
    let source = seed.host_str().unwrap_or_default().to_owned();

    let mut rows = Vec::new();
    let mut pagination = Pagination::default();
    let mut next_url = Some(seed.clone());

    while let Some(url) = next_url.take() {
        if !pagination.first_visit(&url) {
            break;
        }
        let html = http.get_html(&url).await?;
        let page = parse_quote_page(&html, &url)?;
        tracing::info!(%url, quotes = page.items.len(), "quotes page parsed");

        rows.extend(page.items.into_iter().map(|item| RawQuote {
            quote_text: item.text,
            author: item.author,
            tags: item.tags,
            source: source.clone(),
            page_url: url.to_string(),
        }));
        next_url = page.next;
    }

    tracing::info!(rows = rows.len(), "quotes scrape finished");
    Ok(rows)
}

pub fn parse_quote_page(html: &str, page_url: &Url) -> anyhow::Result<QuotePage> {
    let document = scraper::Html::parse_document(html);
    let quote_sel = selector("div.quote")?;
    let text_sel = selector("span.text")?;
    let author_sel = selector("small.author")?;
    let tag_sel = selector("div.tags a.tag")?;

    let items = document
        .select(&quote_sel)
        .map(|quote| QuoteItem {
            text: quote.select(&text_sel).next().map(text_of).unwrap_or_default(),
            author: quote
                .select(&author_sel)
                .next()
                .map(text_of)
                .unwrap_or_default(),
            tags: quote.select(&tag_sel).map(text_of).collect(),
        })
        .collect();

    let next = next_page(&document, page_url)?;
    Ok(QuotePage { items, next })
}
