use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context as _;
use serde::Serialize;

use crate::run::RunLayout;

pub const BOOKS_COLUMNS: &[&str] = &[
    "title",
    "category",
    "price",
    "rating",
    "book_availability",
    "img_url",
    "img_path",
];

#[derive(Debug, Clone, Copy)]
pub enum Columns {
    /// A dataset-specific schema, in this order.
    Fixed(&'static [&'static str]),
    /// Sorted union of every key present across the rows.
    UnionOfKeys,
}

/// Writes `<silver>/run_id=<id>/<dataset>_clean.csv`.
pub fn write_silver_csv<T: Serialize>(
    layout: &RunLayout,
    dataset: &str,
    rows: &[T],
    columns: Columns,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(layout.silver_dir())
        .with_context(|| format!("create silver dir: {}", layout.silver_dir().display()))?;
    let path = layout.silver_csv_path(dataset);

    if rows.is_empty() {
        std::fs::write(&path, b"")
            .with_context(|| format!("write empty silver: {}", path.display()))?;
        return Ok(path);
    }

    let objects = rows
        .iter()
        .map(|row| match serde_json::to_value(row).context("serialize silver row")? {
            serde_json::Value::Object(map) => Ok(map),
            other => anyhow::bail!("silver row must serialize to an object, got: {other}"),
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let header: Vec<String> = match columns {
        Columns::Fixed(names) => names.iter().map(|name| (*name).to_owned()).collect(),
        Columns::UnionOfKeys => objects
            .iter()
            .flat_map(|map| map.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    };

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(&path)
        .with_context(|| format!("create silver: {}", path.display()))?;
    writer.write_record(&header).context("write silver header")?;
    for map in &objects {
        let record = header
            .iter()
            .map(|name| map.get(name).map(cell).unwrap_or_default());
        writer.write_record(record).context("write silver row")?;
    }
    writer.flush().context("flush silver")?;

    Ok(path)
}

fn cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
