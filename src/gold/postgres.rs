use std::collections::HashMap;

use anyhow::Context as _;
use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection as _, PgConnection, Postgres, QueryBuilder};

use super::{GoldConnection, NewQuote, Warehouse};
use crate::config::WarehouseConfig;
use crate::formats::{CleanBook, CleanPartner, PartnerAddress, PartnerGeocoding};

// Postgres caps bind parameters at 65535 per statement.
const INSERT_CHUNK: usize = 1000;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct PgWarehouse {
    options: PgConnectOptions,
}

impl PgWarehouse {
    pub fn new(config: &WarehouseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.dbname);
        Self { options }
    }

    async fn open(&self) -> anyhow::Result<PgConnection> {
        PgConnection::connect_with(&self.options)
            .await
            .context("connect to postgres")
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        let mut conn = self.open().await?;
        let outcome = MIGRATOR
            .run(&mut conn)
            .await
            .context("run gold migrations");
        conn.close().await.context("close postgres connection")?;
        outcome?;
        tracing::info!("gold schema migrated");
        Ok(())
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn connect(&self) -> anyhow::Result<Box<dyn GoldConnection>> {
        let conn = self.open().await?;
        Ok(Box::new(PgGold { conn }))
    }
}

struct PgGold {
    conn: PgConnection,
}

impl PgGold {
    async fn execute(&mut self, sql: &str) -> anyhow::Result<u64> {
        let result = sqlx::query(sql).execute(&mut self.conn).await?;
        Ok(result.rows_affected())
    }

    async fn execute_built(&mut self, mut builder: QueryBuilder<'_, Postgres>) -> anyhow::Result<u64> {
        let result = builder.build().execute(&mut self.conn).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl GoldConnection for PgGold {
    async fn truncate_books(&mut self) -> anyhow::Result<()> {
        self.execute("TRUNCATE TABLE gold.books").await?;
        Ok(())
    }

    async fn insert_books(&mut self, rows: &[CleanBook]) -> anyhow::Result<u64> {
        let mut affected = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO gold.books \
                 (title, category, price, rating, book_availability, img_url, img_path) ",
            );
            builder.push_values(chunk, |mut row, book| {
                row.push_bind(book.title.clone())
                    .push_bind(book.category.clone())
                    .push_bind(book.price)
                    .push_bind(book.rating)
                    .push_bind(book.book_availability)
                    .push_bind(book.img_url.clone())
                    .push_bind(book.img_path.clone());
            });
            affected += self.execute_built(builder).await?;
        }
        Ok(affected)
    }

    async fn truncate_quotes(&mut self) -> anyhow::Result<()> {
        self.execute("TRUNCATE TABLE gold.quote_tags, gold.quotes, gold.authors RESTART IDENTITY")
            .await?;
        Ok(())
    }

    async fn insert_authors_ignore(&mut self, names: &[String]) -> anyhow::Result<()> {
        for chunk in names.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO gold.authors (name) ");
            builder.push_values(chunk, |mut row, name| {
                row.push_bind(name.clone());
            });
            builder.push(" ON CONFLICT (name) DO NOTHING");
            self.execute_built(builder).await?;
        }
        Ok(())
    }

    async fn author_ids(&mut self) -> anyhow::Result<HashMap<String, i64>> {
        let rows = sqlx::query_as::<_, (i64, String)>("SELECT author_id, name FROM gold.authors")
            .fetch_all(&mut self.conn)
            .await?;
        Ok(rows.into_iter().map(|(id, name)| (name, id)).collect())
    }

    async fn insert_quotes(&mut self, rows: &[NewQuote]) -> anyhow::Result<u64> {
        let mut affected = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder =
                QueryBuilder::<Postgres>::new("INSERT INTO gold.quotes (quote_text, author_id) ");
            builder.push_values(chunk, |mut row, quote| {
                row.push_bind(quote.quote_text.clone())
                    .push_bind(quote.author_id);
            });
            affected += self.execute_built(builder).await?;
        }
        Ok(affected)
    }

    async fn quote_ids(&mut self) -> anyhow::Result<HashMap<(String, String), i64>> {
        let rows = sqlx::query_as::<_, (i64, String, String)>(
            r#"
            SELECT q.quote_id, q.quote_text, a.name
            FROM gold.quotes q
            JOIN gold.authors a ON a.author_id = q.author_id
            "#,
        )
        .fetch_all(&mut self.conn)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, text, author)| ((text, author), id))
            .collect())
    }

    async fn insert_quote_tags_ignore(&mut self, rows: &[(i64, String)]) -> anyhow::Result<()> {
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO gold.quote_tags (quote_id, tag) ");
            builder.push_values(chunk, |mut row, (quote_id, tag)| {
                row.push_bind(*quote_id).push_bind(tag.clone());
            });
            builder.push(" ON CONFLICT DO NOTHING");
            self.execute_built(builder).await?;
        }
        Ok(())
    }

    async fn upsert_partners(&mut self, rows: &[CleanPartner]) -> anyhow::Result<u64> {
        let mut affected = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO gold.partners \
                 (nom_librairie, adresse, code_postal, ville, specialite, \
                  ca_annuel, date_partenariat, contact_hash) ",
            );
            builder.push_values(chunk, |mut row, partner| {
                row.push_bind(partner.nom_librairie.clone())
                    .push_bind(partner.adresse.clone())
                    .push_bind(partner.code_postal.clone())
                    .push_bind(partner.ville.clone())
                    .push_bind(partner.specialite.clone())
                    .push_bind(partner.ca_annuel)
                    .push_bind(partner.date_partenariat)
                    .push_bind(partner.contact_hash.clone());
            });
            builder.push(
                " ON CONFLICT (nom_librairie, adresse, code_postal, ville) DO UPDATE SET \
                 specialite = EXCLUDED.specialite, \
                 ca_annuel = EXCLUDED.ca_annuel, \
                 date_partenariat = EXCLUDED.date_partenariat, \
                 contact_hash = EXCLUDED.contact_hash, \
                 updated_at = now()",
            );
            affected += self.execute_built(builder).await?;
        }
        Ok(affected)
    }

    async fn partners_for_geocoding(
        &mut self,
        only_missing: bool,
    ) -> anyhow::Result<Vec<PartnerAddress>> {
        let sql = if only_missing {
            r#"
            SELECT p.partner_id, p.adresse, p.code_postal, p.ville
            FROM gold.partners p
            LEFT JOIN gold.partner_geocoding g ON g.partner_id = p.partner_id
            WHERE g.partner_id IS NULL
            ORDER BY p.partner_id
            "#
        } else {
            r#"
            SELECT partner_id, adresse, code_postal, ville
            FROM gold.partners
            ORDER BY partner_id
            "#
        };
        let rows = sqlx::query_as::<_, (i64, String, Option<String>, Option<String>)>(sql)
            .fetch_all(&mut self.conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(partner_id, adresse, code_postal, ville)| PartnerAddress {
                partner_id,
                adresse,
                code_postal,
                ville,
            })
            .collect())
    }

    async fn upsert_partner_geocoding(
        &mut self,
        rows: &[PartnerGeocoding],
    ) -> anyhow::Result<u64> {
        let mut affected = 0;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO gold.partner_geocoding (partner_id, label, score, lon, lat) ",
            );
            builder.push_values(chunk, |mut row, geo| {
                row.push_bind(geo.partner_id)
                    .push_bind(geo.label.clone())
                    .push_bind(geo.score)
                    .push_bind(geo.lon)
                    .push_bind(geo.lat);
            });
            builder.push(
                " ON CONFLICT (partner_id) DO UPDATE SET \
                 label = EXCLUDED.label, \
                 score = EXCLUDED.score, \
                 lon = EXCLUDED.lon, \
                 lat = EXCLUDED.lat, \
                 geocoded_at = now()",
            );
            affected += self.execute_built(builder).await?;
        }
        Ok(affected)
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}
