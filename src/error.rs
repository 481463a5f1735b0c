use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("source file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("missing columns in spreadsheet: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("spreadsheet has no worksheet: {}", .0.display())]
    NoWorksheet(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}
