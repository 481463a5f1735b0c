use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;
use url::Url;

use crate::bronze::{self, PARTNERS_SOURCE_NAME};
use crate::cli::{Dataset, RunArgs};
use crate::config::{EnvConfig, load_env_file};
use crate::extract::books::{BookImages, scrape_books};
use crate::extract::geocode::Geocoder;
use crate::extract::partners::read_partners_xlsx;
use crate::extract::quotes::scrape_quotes;
use crate::formats::FlatQuote;
use crate::gold::memory::MemoryWarehouse;
use crate::gold::postgres::PgWarehouse;
use crate::gold::{self, GoldConnection, Warehouse};
use crate::http::PoliteClient;
use crate::images::ImageTarget;
use crate::object_store::{LocalFsObjectStore, ObjectStore, S3ObjectStore};
use crate::run::{RunId, RunLayout};
use crate::silver::{self, BOOKS_COLUMNS, Columns};
use crate::transform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Books,
    Quotes,
    Partners,
    Geocoding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoldTable {
    Books,
    Authors,
    Quotes,
    QuoteTags,
    Partners,
    PartnerGeocoding,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Books, Stage::Quotes, Stage::Partners, Stage::Geocoding];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Books => "books",
            Stage::Quotes => "quotes",
            Stage::Partners => "partners",
            Stage::Geocoding => "geocoding",
        }
    }

    pub fn requires(self) -> &'static [GoldTable] {
        match self {
            Stage::Geocoding => &[GoldTable::Partners],
            Stage::Books | Stage::Quotes | Stage::Partners => &[],
        }
    }

    pub fn provides(self) -> &'static [GoldTable] {
        match self {
            Stage::Books => &[GoldTable::Books],
            Stage::Quotes => &[GoldTable::Authors, GoldTable::Quotes, GoldTable::QuoteTags],
            Stage::Partners => &[GoldTable::Partners],
            Stage::Geocoding => &[GoldTable::PartnerGeocoding],
        }
    }
}

impl From<Dataset> for Stage {
    fn from(dataset: Dataset) -> Self {
        match dataset {
            Dataset::Books => Stage::Books,
            Dataset::Quotes => Stage::Quotes,
            Dataset::Partners => Stage::Partners,
            Dataset::Geocoding => Stage::Geocoding,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    pub fn new(requested: impl IntoIterator<Item = Stage>) -> anyhow::Result<Self> {
        let mut pending: Vec<Stage> = Vec::new();
        for stage in requested {
            if !pending.contains(&stage) {
                pending.push(stage);
            }
        }

        let mut stages = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let ready = pending.iter().position(|stage| {
                stage.requires().iter().all(|table| {
                    !pending
                        .iter()
                        .any(|other| other != stage && other.provides().contains(table))
                })
            });
            let Some(idx) = ready else {
                anyhow::bail!("stage requirements form a cycle: {pending:?}");
            };
            stages.push(pending.remove(idx));
        }

        Ok(Self { stages })
    }

    pub fn all() -> Self {
        Self {
            stages: Stage::ALL.to_vec(),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub extracted: usize,
    pub cleaned: usize,
    pub loaded: u64,
    pub bronze: Option<PathBuf>,
    pub silver: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub stages: Vec<StageReport>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub books_seed: Url,
    pub quotes_seed: Url,
    pub partners_xlsx: PathBuf,
    pub bronze_root: PathBuf,
    pub silver_root: PathBuf,
    pub gbp_to_eur: f64,
    pub images: Option<ImageTarget>,
    pub geocode_missing_only: bool,
    pub pii_salt: String,
}

pub struct Pipeline {
    settings: PipelineSettings,
    http: PoliteClient,
    geocoder: Geocoder,
    object_store: Arc<dyn ObjectStore>,
    warehouse: Arc<dyn Warehouse>,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        http: PoliteClient,
        geocoder: Geocoder,
        object_store: Arc<dyn ObjectStore>,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        Self {
            settings,
            http,
            geocoder,
            object_store,
            warehouse,
        }
    }

    pub async fn run(&self, plan: &StagePlan) -> anyhow::Result<RunSummary> {
        self.run_with_id(RunId::now(), plan).await
    }

    pub async fn run_with_id(&self, run_id: RunId, plan: &StagePlan) -> anyhow::Result<RunSummary> {
        let layout = RunLayout::new(run_id, &self.settings.bronze_root, &self.settings.silver_root);
        tracing::info!(run_id = %layout.run_id(), stages = ?plan.stages(), "pipeline started");

        let mut reports = Vec::with_capacity(plan.stages().len());
        for &stage in plan.stages() {
            match self.run_stage(stage, &layout).await {
                Ok(report) => {
                    tracing::info!(
                        run_id = %layout.run_id(),
                        dataset = stage.name(),
                        extracted = report.extracted,
                        cleaned = report.cleaned,
                        loaded = report.loaded,
                        "stage finished"
                    );
                    reports.push(report);
                }
                Err(err) => {
                    let err = err.context(format!("stage {}", stage.name()));
                    tracing::error!(run_id = %layout.run_id(), error = %format!("{err:#}"), "pipeline failed");
                    return Err(err);
                }
            }
        }

        tracing::info!(run_id = %layout.run_id(), "pipeline finished");
        Ok(RunSummary {
            run_id: layout.run_id().to_string(),
            stages: reports,
        })
    }

    async fn run_stage(&self, stage: Stage, layout: &RunLayout) -> anyhow::Result<StageReport> {
        tracing::info!(run_id = %layout.run_id(), dataset = stage.name(), "stage started");
        match stage {
            Stage::Books => self.books(layout).await,
            Stage::Quotes => self.quotes(layout).await,
            Stage::Partners => self.partners(layout).await,
            Stage::Geocoding => self.geocoding().await,
        }
    }

    async fn books(&self, layout: &RunLayout) -> anyhow::Result<StageReport> {
        let images = self.settings.images.as_ref().map(|target| BookImages {
            store: self.object_store.as_ref(),
            target,
        });
        let raw = scrape_books(&self.http, &self.settings.books_seed, images)
            .await
            .context("extract books")?;
        let bronze = bronze::write_bronze_json(layout, "books", &raw)?;
        tracing::info!(path = %bronze.display(), rows = raw.len(), "bronze written");

        let clean = transform::books::transform_books(&raw, self.settings.gbp_to_eur);
        let silver = silver::write_silver_csv(layout, "books", &clean, Columns::Fixed(BOOKS_COLUMNS))?;
        tracing::info!(path = %silver.display(), rows = clean.len(), "silver written");

        let mut conn = self.connect().await?;
        let result = gold::load_books(conn.as_mut(), &clean, true).await;
        let loaded = gold::release(conn, result).await?;

        Ok(StageReport {
            stage: Stage::Books,
            extracted: raw.len(),
            cleaned: clean.len(),
            loaded,
            bronze: Some(bronze),
            silver: Some(silver),
        })
    }

    async fn quotes(&self, layout: &RunLayout) -> anyhow::Result<StageReport> {
        let raw = scrape_quotes(&self.http, &self.settings.quotes_seed)
            .await
            .context("extract quotes")?;
        let bronze = bronze::write_bronze_json(layout, "quotes", &raw)?;
        tracing::info!(path = %bronze.display(), rows = raw.len(), "bronze written");

        let clean = transform::quotes::transform_quotes(&raw);
        let flat: Vec<FlatQuote<'_>> = clean.iter().map(FlatQuote::from).collect();
        let silver = silver::write_silver_csv(layout, "quotes", &flat, Columns::UnionOfKeys)?;
        tracing::info!(path = %silver.display(), rows = clean.len(), "silver written");

        let mut conn = self.connect().await?;
        let result = gold::load_quotes(conn.as_mut(), &clean, true).await;
        let loaded = gold::release(conn, result).await?;

        Ok(StageReport {
            stage: Stage::Quotes,
            extracted: raw.len(),
            cleaned: clean.len(),
            loaded,
            bronze: Some(bronze),
            silver: Some(silver),
        })
    }

    async fn partners(&self, layout: &RunLayout) -> anyhow::Result<StageReport> {
        let source = &self.settings.partners_xlsx;
        let raw = read_partners_xlsx(source).context("extract partners")?;
        let copy = bronze::copy_to_bronze(layout, source, PARTNERS_SOURCE_NAME)?;
        tracing::info!(path = %copy.display(), "source copied to bronze");
        let bronze = bronze::write_bronze_json(layout, "partners", &raw)?;
        tracing::info!(path = %bronze.display(), rows = raw.len(), "bronze written");

        let clean = transform::partners::transform_partners(&raw, &self.settings.pii_salt);
        let silver = silver::write_silver_csv(layout, "partners", &clean, Columns::UnionOfKeys)?;
        tracing::info!(path = %silver.display(), rows = clean.len(), "silver written");

        let mut conn = self.connect().await?;
        let result = gold::upsert_partners(conn.as_mut(), &clean).await;
        let loaded = gold::release(conn, result).await?;

        Ok(StageReport {
            stage: Stage::Partners,
            extracted: raw.len(),
            cleaned: clean.len(),
            loaded,
            bronze: Some(bronze),
            silver: Some(silver),
        })
    }

    async fn geocoding(&self) -> anyhow::Result<StageReport> {
        let mut conn = self.connect().await?;
        let result = self.geocode_partners(conn.as_mut()).await;
        gold::release(conn, result).await
    }

    async fn geocode_partners(&self, conn: &mut dyn GoldConnection) -> anyhow::Result<StageReport> {
        let partners = conn
            .partners_for_geocoding(self.settings.geocode_missing_only)
            .await
            .context("read partners from gold")?;

        let mut rows = Vec::with_capacity(partners.len());
        for partner in &partners {
            let query = transform::geocoding::geocode_query(partner);
            if query.is_empty() {
                tracing::warn!(partner_id = partner.partner_id, "partner has no address to geocode");
                continue;
            }
            match self.geocoder.lookup(&query).await? {
                Some(hit) => rows.push(transform::geocoding::enrichment_row(partner, hit)),
                None => {
                    tracing::warn!(partner_id = partner.partner_id, query = %query, "address not geocoded");
                }
            }
        }

        let loaded = gold::upsert_partner_geocoding(conn, &rows).await?;
        Ok(StageReport {
            stage: Stage::Geocoding,
            extracted: partners.len(),
            cleaned: rows.len(),
            loaded,
            bronze: None,
            silver: None,
        })
    }

    async fn connect(&self) -> anyhow::Result<Box<dyn GoldConnection>> {
        self.warehouse.connect().await.context("connect to warehouse")
    }
}

fn parse_url(name: &str, raw: &str) -> anyhow::Result<Url> {
    Url::parse(raw).with_context(|| format!("invalid {name}: {raw}"))
}

pub async fn run(args: RunArgs) -> anyhow::Result<RunSummary> {
    if load_env_file(&args.env_file)? {
        tracing::info!(path = %args.env_file.display(), "env file loaded");
    }
    let env = EnvConfig::from_env().context("read environment")?;
    tracing::debug!(?env, "environment");

    let plan = if args.datasets.is_empty() {
        StagePlan::all()
    } else {
        StagePlan::new(args.datasets.iter().copied().map(Stage::from))?
    };

    let http = PoliteClient::new(&args.user_agent, Duration::from_millis(args.delay_ms))?;
    let geocoder = Geocoder::new(
        http.client().clone(),
        parse_url("geocoder url", &args.geocoder_url)?,
        &args.user_agent,
        Duration::from_millis(args.geocode_delay_ms),
    );

    let object_store: Arc<dyn ObjectStore> = match &args.object_store_dir {
        Some(dir) => Arc::new(LocalFsObjectStore::new(dir)),
        None => Arc::new(S3ObjectStore::new(&env.object_store)?),
    };
    let warehouse: Arc<dyn Warehouse> = if args.dry_run {
        tracing::warn!("dry run: gold tables are kept in memory");
        Arc::new(MemoryWarehouse::default())
    } else {
        Arc::new(PgWarehouse::new(&env.warehouse))
    };

    let settings = PipelineSettings {
        books_seed: parse_url("books url", &args.books_url)?,
        quotes_seed: parse_url("quotes url", &args.quotes_url)?,
        partners_xlsx: args.partners_xlsx,
        bronze_root: args.bronze_dir,
        silver_root: args.silver_dir,
        gbp_to_eur: args.gbp_to_eur,
        images: (!args.no_images).then(|| ImageTarget {
            bucket: env.object_store.bucket.clone(),
            prefix: args.images_prefix.clone(),
        }),
        geocode_missing_only: args.geocode_missing_only,
        pii_salt: env.pii_salt,
    };

    let pipeline = Pipeline::new(settings, http, geocoder, object_store, warehouse);
    let summary = pipeline.run(&plan).await?;
    Ok(summary)
}
