use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

const RUN_ID_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    pub fn now() -> Self {
        Self::from_timestamp(Utc::now())
    }

    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(at.format(RUN_ID_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn dir_name(&self) -> String {
        format!("run_id={}", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct RunLayout {
    run_id: RunId,
    bronze_dir: PathBuf,
    silver_dir: PathBuf,
}

impl RunLayout {
    pub fn new(run_id: RunId, bronze_root: &Path, silver_root: &Path) -> Self {
        let bronze_dir = bronze_root.join(run_id.dir_name());
        let silver_dir = silver_root.join(run_id.dir_name());
        Self {
            run_id,
            bronze_dir,
            silver_dir,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn bronze_dir(&self) -> &Path {
        &self.bronze_dir
    }

    pub fn silver_dir(&self) -> &Path {
        &self.silver_dir
    }

    pub fn bronze_json_path(&self, dataset: &str) -> PathBuf {
        self.bronze_dir.join(format!("{dataset}_raw.json"))
    }

    pub fn bronze_copy_path(&self, dest_name: &str) -> PathBuf {
        self.bronze_dir.join(dest_name)
    }

    pub fn silver_csv_path(&self, dataset: &str) -> PathBuf {
        self.silver_dir.join(format!("{dataset}_clean.csv"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn run_id_uses_dashed_utc_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let run_id = RunId::from_timestamp(at);
        assert_eq!(run_id.as_str(), "2024-03-09T07-05-01");
        assert_eq!(run_id.dir_name(), "run_id=2024-03-09T07-05-01");
    }

    #[test]
    fn layout_places_files_under_run_directories() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let layout = RunLayout::new(
            RunId::from_timestamp(at),
            Path::new("data/bronze"),
            Path::new("data/silver"),
        );

        assert_eq!(
            layout.bronze_json_path("books"),
            PathBuf::from("data/bronze/run_id=2024-03-09T07-05-01/books_raw.json")
        );
        assert_eq!(
            layout.bronze_copy_path("partners_source.xlsx"),
            PathBuf::from("data/bronze/run_id=2024-03-09T07-05-01/partners_source.xlsx")
        );
        assert_eq!(
            layout.silver_csv_path("quotes"),
            PathBuf::from("data/silver/run_id=2024-03-09T07-05-01/quotes_clean.csv")
        );
    }
}
