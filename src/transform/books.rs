use crate::formats::{CleanBook, RawBook};

pub const DEFAULT_GBP_TO_EUR: f64 = 1.17;

/// First numeric token of a price string (`"Â£45.17"` → 45.17); 0.0 if none.
pub fn parse_price(price_raw: &str) -> f64 {
    let normalized = price_raw.replace(',', ".");
    let Some(start) = normalized.find(|c: char| c.is_ascii_digit()) else {
        return 0.0;
    };
    let rest = &normalized[start..];

    let int_len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let mut end = int_len;
    if let Some(fraction) = rest[int_len..].strip_prefix('.') {
        let frac_len = fraction
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(fraction.len());
        if frac_len > 0 {
            end = int_len + 1 + frac_len;
        }
    }

    rest[..end].parse().unwrap_or(0.0)
}

/// Half-cent ties go to the even cent.
fn round_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

pub fn transform_books(raw: &[RawBook], gbp_to_eur: f64) -> Vec<CleanBook> {
    let clean: Vec<CleanBook> = raw
        .iter()
        .filter_map(|book| {
            let title = book.title.trim();
            let category = book.category.trim();
            if title.is_empty() || category.is_empty() {
                return None;
            }
            if !(1..=5).contains(&book.rating) {
                return None;
            }

            let price = round_cents(parse_price(&book.price_raw) * gbp_to_eur);
            if price <= 0.0 {
                return None;
            }

            Some(CleanBook {
                title: title.to_owned(),
                category: category.to_owned(),
                price,
                rating: book.rating as i32,
                book_availability: book.book_availability,
                img_url: book.img_url.clone(),
                img_path: book.img_path.clone(),
            })
        })
        .collect();

    tracing::info!(valid = clean.len(), total = raw.len(), "books transformed");
    clean
}
