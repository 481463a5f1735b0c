use std::collections::HashSet;

use crate::formats::{CleanQuote, RawQuote};

/// Drops quotes missing text or author and keeps the first of each
/// (text, author) pair, preserving input order.
pub fn transform_quotes(raw: &[RawQuote]) -> Vec<CleanQuote> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut clean = Vec::new();

    for quote in raw {
        let text = quote.quote_text.trim();
        let author = quote.author.trim();
        if text.is_empty() || author.is_empty() {
            continue;
        }
        if !seen.insert((text.to_owned(), author.to_owned())) {
            continue;
        }
        clean.push(CleanQuote {
            quote_text: text.to_owned(),
            author: author.to_owned(),
            tags: quote.tags.clone(),
        });
    }

    tracing::info!(valid = clean.len(), total = raw.len(), "quotes transformed");
    clean
}
