pub mod books;
pub mod geocode;
pub mod partners;
pub mod quotes;

use std::collections::HashSet;

use scraper::{ElementRef, Selector};
use url::Url;

pub(crate) fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("invalid selector {css:?}: {err}"))
}

pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn next_page(
    document: &scraper::Html,
    page_url: &Url,
) -> anyhow::Result<Option<Url>> {
    let next_sel = selector("li.next a")?;
    let Some(href) = document
        .select(&next_sel)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
    else {
        return Ok(None);
    };
    let next = page_url
        .join(href)
        .map_err(|err| anyhow::anyhow!("resolve next link {href:?} on {page_url}: {err}"))?;
    Ok(Some(next))
}

/// Tracks visited listing pages so a self-referencing "next" link ends the walk.
#[derive(Debug, Default)]
pub(crate) struct Pagination {
    visited: HashSet<String>,
}

impl Pagination {
    pub(crate) fn first_visit(&mut self, url: &Url) -> bool {
        if self.visited.insert(url.as_str().to_owned()) {
            return true;
        }
        tracing::warn!(%url, "pagination loops back to a visited page; stopping");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_page_resolves_relative_to_current_page() -> anyhow::Result<()> {
        let html = scraper::Html::parse_document(
            r#"<ul class="pager"><li class="next"><a href="page-3.html">next</a></li></ul>"#,
        );
        let page = Url::parse("https://books.toscrape.com/catalogue/page-2.html")?;

        let next = next_page(&html, &page)?;

        assert_eq!(
            next.map(|u| u.to_string()),
            Some("https://books.toscrape.com/catalogue/page-3.html".to_owned())
        );
        Ok(())
    }

    #[test]
    fn missing_next_link_ends_pagination() -> anyhow::Result<()> {
        let html = scraper::Html::parse_document(r#"<ul class="pager"><li class="previous"><a href="/">prev</a></li></ul>"#);
        let page = Url::parse("https://quotes.toscrape.com/page/10/")?;
        assert_eq!(next_page(&html, &page)?, None);
        Ok(())
    }

    #[test]
    fn text_collapses_whitespace() {
        let html = scraper::Html::parse_fragment("<p>\n   In stock\n\n  (22 available) </p>");
        let sel = selector("p").unwrap();
        let p = html.select(&sel).next().unwrap();
        assert_eq!(text_of(p), "In stock (22 available)");
    }

    #[test]
    fn pagination_stops_on_revisit() -> anyhow::Result<()> {
        let mut pagination = Pagination::default();
        let url = Url::parse("http://x/page-1.html")?;
        assert!(pagination.first_visit(&url));
        assert!(!pagination.first_visit(&url));
        Ok(())
    }
}
