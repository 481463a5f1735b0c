pub mod memory;
pub mod postgres;

use std::collections::{BTreeSet, HashMap};

use anyhow::Context as _;
use async_trait::async_trait;

use crate::cli::MigrateArgs;
use crate::config::{EnvConfig, load_env_file};
use crate::formats::{CleanBook, CleanPartner, CleanQuote, PartnerAddress, PartnerGeocoding};

#[derive(Debug, Clone, PartialEq)]
pub struct NewQuote {
    pub quote_text: String,
    pub author_id: i64,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    async fn connect(&self) -> anyhow::Result<Box<dyn GoldConnection>>;
}

#[async_trait]
pub trait GoldConnection: Send {
    async fn truncate_books(&mut self) -> anyhow::Result<()>;
    async fn insert_books(&mut self, rows: &[CleanBook]) -> anyhow::Result<u64>;

    async fn truncate_quotes(&mut self) -> anyhow::Result<()>;
    async fn insert_authors_ignore(&mut self, names: &[String]) -> anyhow::Result<()>;
    async fn author_ids(&mut self) -> anyhow::Result<HashMap<String, i64>>;
    async fn insert_quotes(&mut self, rows: &[NewQuote]) -> anyhow::Result<u64>;
    async fn quote_ids(&mut self) -> anyhow::Result<HashMap<(String, String), i64>>;
    async fn insert_quote_tags_ignore(&mut self, rows: &[(i64, String)]) -> anyhow::Result<()>;

    async fn upsert_partners(&mut self, rows: &[CleanPartner]) -> anyhow::Result<u64>;
    async fn partners_for_geocoding(
        &mut self,
        only_missing: bool,
    ) -> anyhow::Result<Vec<PartnerAddress>>;
    async fn upsert_partner_geocoding(&mut self, rows: &[PartnerGeocoding])
    -> anyhow::Result<u64>;

    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}

pub async fn migrate(args: MigrateArgs) -> anyhow::Result<()> {
    load_env_file(&args.env_file)?;
    let env = EnvConfig::from_env().context("read environment")?;
    tracing::info!(host = %env.warehouse.host, dbname = %env.warehouse.dbname, "migrating gold schema");
    postgres::PgWarehouse::new(&env.warehouse).migrate().await
}

/// Closes `conn` on every outcome; the work's error wins over a close error.
pub async fn release<T>(
    conn: Box<dyn GoldConnection>,
    result: anyhow::Result<T>,
) -> anyhow::Result<T> {
    let closed = conn.close().await;
    let value = result?;
    closed.context("close warehouse connection")?;
    Ok(value)
}

pub async fn load_books(
    conn: &mut dyn GoldConnection,
    rows: &[CleanBook],
    truncate: bool,
) -> anyhow::Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    if truncate {
        conn.truncate_books().await.context("truncate gold.books")?;
    }
    conn.insert_books(rows).await.context("insert gold.books")?;
    Ok(rows.len() as u64)
}

pub async fn load_quotes(
    conn: &mut dyn GoldConnection,
    rows: &[CleanQuote],
    truncate: bool,
) -> anyhow::Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    if truncate {
        conn.truncate_quotes().await.context("truncate gold quotes tables")?;
    }

    let authors: Vec<String> = rows
        .iter()
        .map(|q| q.author.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    conn.insert_authors_ignore(&authors)
        .await
        .context("insert gold.authors")?;
    let author_ids = conn.author_ids().await.context("read gold.authors")?;

    let new_quotes = rows
        .iter()
        .map(|q| {
            let author_id = author_ids
                .get(&q.author)
                .copied()
                .ok_or_else(|| anyhow::anyhow!("author not found after insert: {}", q.author))?;
            Ok(NewQuote {
                quote_text: q.quote_text.clone(),
                author_id,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    conn.insert_quotes(&new_quotes)
        .await
        .context("insert gold.quotes")?;
    let quote_ids = conn.quote_ids().await.context("read gold.quotes")?;

    let mut tag_rows = Vec::new();
    for quote in rows {
        let key = (quote.quote_text.clone(), quote.author.clone());
        let quote_id = quote_ids.get(&key).copied().ok_or_else(|| {
            anyhow::anyhow!("quote not found after insert: {:?}", quote.quote_text)
        })?;
        tag_rows.extend(quote.tags.iter().map(|tag| (quote_id, tag.clone())));
    }
    if !tag_rows.is_empty() {
        conn.insert_quote_tags_ignore(&tag_rows)
            .await
            .context("insert gold.quote_tags")?;
    }

    Ok(rows.len() as u64)
}

pub async fn upsert_partners(
    conn: &mut dyn GoldConnection,
    rows: &[CleanPartner],
) -> anyhow::Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let rows = last_wins(rows, |p| {
        (
            p.nom_librairie.clone(),
            p.adresse.clone(),
            p.code_postal.clone(),
            p.ville.clone(),
        )
    });
    conn.upsert_partners(&rows)
        .await
        .context("upsert gold.partners")
}

pub async fn upsert_partner_geocoding(
    conn: &mut dyn GoldConnection,
    rows: &[PartnerGeocoding],
) -> anyhow::Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }
    let rows = last_wins(rows, |g| g.partner_id);
    conn.upsert_partner_geocoding(&rows)
        .await
        .context("upsert gold.partner_geocoding")
}

fn last_wins<T: Clone, K: std::hash::Hash + Eq>(rows: &[T], key: impl Fn(&T) -> K) -> Vec<T> {
    let mut position: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::with_capacity(rows.len());
    for row in rows {
        match position.get(&key(row)) {
            Some(&idx) => out[idx] = row.clone(),
            None => {
                position.insert(key(row), out.len());
                out.push(row.clone());
            }
        }
    }
    out
}
