pub mod books;
pub mod geocoding;
pub mod partners;
pub mod quotes;

pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
