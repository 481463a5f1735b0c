use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;

use crate::formats::BronzeSnapshot;
use crate::run::RunLayout;

pub const PARTNERS_SOURCE_NAME: &str = "partners_source.xlsx";

/// Writes `<bronze>/run_id=<id>/<dataset>_raw.json`, replacing any previous file.
pub fn write_bronze_json<T: Serialize>(
    layout: &RunLayout,
    dataset: &str,
    rows: &[T],
) -> anyhow::Result<PathBuf> {
    let path = layout.bronze_json_path(dataset);
    let snapshot = BronzeSnapshot {
        run_id: layout.run_id().to_string(),
        dataset: dataset.to_owned(),
        created_at: chrono::Utc::now().to_rfc3339(),
        rows,
    };
    let data = serde_json::to_vec_pretty(&snapshot).context("serialize bronze snapshot")?;
    write_atomic(&path, &data).with_context(|| format!("write bronze: {}", path.display()))?;

    Ok(path)
}

pub fn copy_to_bronze(
    layout: &RunLayout,
    source: &Path,
    dest_name: &str,
) -> anyhow::Result<PathBuf> {
    if !source.is_file() {
        anyhow::bail!("bronze source file not found: {}", source.display());
    }

    std::fs::create_dir_all(layout.bronze_dir()).with_context(|| {
        format!("create bronze dir: {}", layout.bronze_dir().display())
    })?;

    let dest = layout.bronze_copy_path(dest_name);
    std::fs::copy(source, &dest).with_context(|| {
        format!("copy {} to {}", source.display(), dest.display())
    })?;

    if !dest.is_file() {
        anyhow::bail!("bronze copy did not materialize: {}", dest.display());
    }

    Ok(dest)
}

fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    std::fs::write(&tmp_path, data)
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
