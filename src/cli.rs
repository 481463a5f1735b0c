use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bronze/silver/gold pipeline once.
    Run(RunArgs),
    /// Create or update the gold schema.
    Migrate(MigrateArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Dataset {
    Books,
    Quotes,
    Partners,
    /// Enrich gold partners with coordinates.
    Geocoding,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Datasets to process (comma-separated). Defaults to all of them.
    #[arg(long, value_enum, value_delimiter = ',')]
    pub datasets: Vec<Dataset>,

    /// Seed page for the book catalogue.
    #[arg(long, default_value = crate::extract::books::DEFAULT_SEED_URL)]
    pub books_url: String,

    /// Seed page for the quotes.
    #[arg(long, default_value = crate::extract::quotes::DEFAULT_SEED_URL)]
    pub quotes_url: String,

    /// Address search endpoint.
    #[arg(long, default_value = crate::extract::geocode::DEFAULT_API_URL)]
    pub geocoder_url: String,

    /// Partners spreadsheet (first worksheet is read).
    #[arg(long, default_value = "data/partenaire_librairies.xlsx")]
    pub partners_xlsx: PathBuf,

    /// Root of the bronze layer.
    #[arg(long, default_value = "data/bronze")]
    pub bronze_dir: PathBuf,

    /// Root of the silver layer.
    #[arg(long, default_value = "data/silver")]
    pub silver_dir: PathBuf,

    /// User-Agent sent with every outbound request.
    #[arg(long, default_value = "DataPulseAnalyticsBot/1.0")]
    pub user_agent: String,

    /// Delay after each scraped page (politeness).
    #[arg(long, default_value_t = 1000)]
    pub delay_ms: u64,

    /// Delay after each geocoding call (politeness).
    #[arg(long, default_value_t = 200)]
    pub geocode_delay_ms: u64,

    /// Exchange rate applied to scraped GBP prices.
    #[arg(long, default_value_t = crate::transform::books::DEFAULT_GBP_TO_EUR)]
    pub gbp_to_eur: f64,

    /// Skip cover image upload; books keep no image path.
    #[arg(long, default_value_t = false)]
    pub no_images: bool,

    /// Key prefix for uploaded cover images.
    #[arg(long, default_value = "books")]
    pub images_prefix: String,

    /// Optional env file with DB_*, S3_* and PII_SALT.
    #[arg(long, default_value = "config/.env")]
    pub env_file: PathBuf,

    /// Keep gold tables in memory instead of Postgres.
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Store images under this directory instead of S3.
    #[arg(long)]
    pub object_store_dir: Option<PathBuf>,

    /// Only geocode partners that have no coordinates yet.
    #[arg(long, default_value_t = false)]
    pub geocode_missing_only: bool,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Optional env file with DB_* settings.
    #[arg(long, default_value = "config/.env")]
    pub env_file: PathBuf,
}
