use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{GoldConnection, NewQuote, Warehouse};
use crate::formats::{CleanBook, CleanPartner, PartnerAddress, PartnerGeocoding};

#[derive(Debug, Default)]
struct MemoryGold {
    books: Vec<CleanBook>,
    authors: BTreeMap<i64, String>,
    next_author_id: i64,
    quotes: BTreeMap<i64, NewQuote>,
    next_quote_id: i64,
    quote_tags: BTreeSet<(i64, String)>,
    partners: BTreeMap<i64, CleanPartner>,
    next_partner_id: i64,
    geocoding: BTreeMap<i64, PartnerGeocoding>,
    statements: Vec<String>,
    open_connections: usize,
}

impl MemoryGold {
    fn log(&mut self, statement: &str) {
        self.statements.push(statement.to_owned());
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    state: Arc<Mutex<MemoryGold>>,
}

impl MemoryWarehouse {
    fn read(&self) -> MutexGuard<'_, MemoryGold> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn statements(&self) -> Vec<String> {
        self.read().statements.clone()
    }

    pub fn open_connections(&self) -> usize {
        self.read().open_connections
    }

    pub fn books(&self) -> Vec<CleanBook> {
        self.read().books.clone()
    }

    pub fn authors(&self) -> Vec<String> {
        self.read().authors.values().cloned().collect()
    }

    pub fn quotes_with_authors(&self) -> Vec<(String, String)> {
        let state = self.read();
        state
            .quotes
            .values()
            .map(|quote| {
                let author = state
                    .authors
                    .get(&quote.author_id)
                    .cloned()
                    .unwrap_or_default();
                (quote.quote_text.clone(), author)
            })
            .collect()
    }

    pub fn quote_tags(&self) -> Vec<(String, String)> {
        let state = self.read();
        state
            .quote_tags
            .iter()
            .map(|(quote_id, tag)| {
                let text = state
                    .quotes
                    .get(quote_id)
                    .map(|q| q.quote_text.clone())
                    .unwrap_or_default();
                (text, tag.clone())
            })
            .collect()
    }

    pub fn partners(&self) -> Vec<(i64, CleanPartner)> {
        self.read()
            .partners
            .iter()
            .map(|(id, partner)| (*id, partner.clone()))
            .collect()
    }

    pub fn geocoding(&self) -> Vec<PartnerGeocoding> {
        self.read().geocoding.values().cloned().collect()
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn connect(&self) -> anyhow::Result<Box<dyn GoldConnection>> {
        self.read().open_connections += 1;
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemoryConnection {
    state: Arc<Mutex<MemoryGold>>,
}

impl MemoryConnection {
    fn state(&self) -> anyhow::Result<MutexGuard<'_, MemoryGold>> {
        self.state
            .lock()
            .map_err(|_| anyhow::anyhow!("memory warehouse lock poisoned"))
    }
}

fn same_natural_key(a: &CleanPartner, b: &CleanPartner) -> bool {
    a.nom_librairie == b.nom_librairie
        && a.adresse == b.adresse
        && a.code_postal == b.code_postal
        && a.ville == b.ville
}

#[async_trait]
impl GoldConnection for MemoryConnection {
    async fn truncate_books(&mut self) -> anyhow::Result<()> {
        let mut state = self.state()?;
        state.log("TRUNCATE gold.books");
        state.books.clear();
        Ok(())
    }

    async fn insert_books(&mut self, rows: &[CleanBook]) -> anyhow::Result<u64> {
        let mut state = self.state()?;
        state.log("INSERT gold.books");
        state.books.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }

    async fn truncate_quotes(&mut self) -> anyhow::Result<()> {
        let mut state = self.state()?;
        state.log("TRUNCATE gold.quote_tags, gold.quotes, gold.authors");
        state.quote_tags.clear();
        state.quotes.clear();
        state.authors.clear();
        state.next_quote_id = 0;
        state.next_author_id = 0;
        Ok(())
    }

    async fn insert_authors_ignore(&mut self, names: &[String]) -> anyhow::Result<()> {
        let mut state = self.state()?;
        state.log("INSERT gold.authors");
        for name in names {
            if state.authors.values().any(|existing| existing == name) {
                continue;
            }
            state.next_author_id += 1;
            let id = state.next_author_id;
            state.authors.insert(id, name.clone());
        }
        Ok(())
    }

    async fn author_ids(&mut self) -> anyhow::Result<HashMap<String, i64>> {
        let mut state = self.state()?;
        state.log("SELECT gold.authors");
        Ok(state
            .authors
            .iter()
            .map(|(id, name)| (name.clone(), *id))
            .collect())
    }

    async fn insert_quotes(&mut self, rows: &[NewQuote]) -> anyhow::Result<u64> {
        let mut state = self.state()?;
        state.log("INSERT gold.quotes");
        if let Some(orphan) = rows.iter().find(|q| !state.authors.contains_key(&q.author_id)) {
            anyhow::bail!("unknown author_id {} for gold.quotes", orphan.author_id);
        }
        for row in rows {
            state.next_quote_id += 1;
            let id = state.next_quote_id;
            state.quotes.insert(id, row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn quote_ids(&mut self) -> anyhow::Result<HashMap<(String, String), i64>> {
        let mut state = self.state()?;
        state.log("SELECT gold.quotes");
        let ids = state
            .quotes
            .iter()
            .filter_map(|(id, quote)| {
                let author = state.authors.get(&quote.author_id)?;
                Some(((quote.quote_text.clone(), author.clone()), *id))
            })
            .collect();
        Ok(ids)
    }

    async fn insert_quote_tags_ignore(&mut self, rows: &[(i64, String)]) -> anyhow::Result<()> {
        let mut state = self.state()?;
        state.log("INSERT gold.quote_tags");
        if let Some((orphan, _)) = rows.iter().find(|(id, _)| !state.quotes.contains_key(id)) {
            anyhow::bail!("unknown quote_id {orphan} for gold.quote_tags");
        }
        state.quote_tags.extend(rows.iter().cloned());
        Ok(())
    }

    async fn upsert_partners(&mut self, rows: &[CleanPartner]) -> anyhow::Result<u64> {
        let mut state = self.state()?;
        state.log("UPSERT gold.partners");
        for row in rows {
            let existing = state
                .partners
                .iter()
                .find(|(_, partner)| same_natural_key(partner, row))
                .map(|(id, _)| *id);
            let id = match existing {
                Some(id) => id,
                None => {
                    state.next_partner_id += 1;
                    state.next_partner_id
                }
            };
            state.partners.insert(id, row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn partners_for_geocoding(
        &mut self,
        only_missing: bool,
    ) -> anyhow::Result<Vec<PartnerAddress>> {
        let mut state = self.state()?;
        state.log("SELECT gold.partners");
        Ok(state
            .partners
            .iter()
            .filter(|(id, _)| !only_missing || !state.geocoding.contains_key(id))
            .map(|(id, partner)| PartnerAddress {
                partner_id: *id,
                adresse: partner.adresse.clone(),
                code_postal: partner.code_postal.clone(),
                ville: partner.ville.clone(),
            })
            .collect())
    }

    async fn upsert_partner_geocoding(
        &mut self,
        rows: &[PartnerGeocoding],
    ) -> anyhow::Result<u64> {
        let mut state = self.state()?;
        state.log("UPSERT gold.partner_geocoding");
        if let Some(orphan) = rows
            .iter()
            .find(|g| !state.partners.contains_key(&g.partner_id))
        {
            anyhow::bail!(
                "unknown partner_id {} for gold.partner_geocoding",
                orphan.partner_id
            );
        }
        for row in rows {
            state.geocoding.insert(row.partner_id, row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        let mut state = self.state()?;
        state.open_connections = state.open_connections.saturating_sub(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner(name: &str) -> CleanPartner {
        CleanPartner {
            nom_librairie: name.to_owned(),
            adresse: "1 rue A".to_owned(),
            code_postal: Some("69001".to_owned()),
            ville: Some("Lyon".to_owned()),
            specialite: None,
            ca_annuel: None,
            date_partenariat: None,
            contact_hash: "h".to_owned(),
        }
    }

    fn geo(partner_id: i64) -> PartnerGeocoding {
        PartnerGeocoding {
            partner_id,
            label: None,
            score: None,
            lon: 4.8,
            lat: 45.7,
        }
    }

    #[tokio::test]
    async fn geocoding_requires_known_partner() -> anyhow::Result<()> {
        let warehouse = MemoryWarehouse::default();
        let mut conn = warehouse.connect().await?;

        let err = conn.upsert_partner_geocoding(&[geo(9)]).await.unwrap_err();
        assert!(err.to_string().contains("unknown partner_id 9"));

        conn.upsert_partners(&[partner("A")]).await?;
        conn.upsert_partner_geocoding(&[geo(1)]).await?;
        conn.close().await?;

        assert_eq!(warehouse.geocoding().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn only_missing_filters_geocoded_partners() -> anyhow::Result<()> {
        let warehouse = MemoryWarehouse::default();
        let mut conn = warehouse.connect().await?;
        conn.upsert_partners(&[partner("A"), partner("B")]).await?;
        conn.upsert_partner_geocoding(&[geo(1)]).await?;

        let all = conn.partners_for_geocoding(false).await?;
        let missing = conn.partners_for_geocoding(true).await?;
        conn.close().await?;

        assert_eq!(all.len(), 2);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].partner_id, 2);
        Ok(())
    }

    #[tokio::test]
    async fn connections_are_counted() -> anyhow::Result<()> {
        let warehouse = MemoryWarehouse::default();
        let first = warehouse.connect().await?;
        let second = warehouse.connect().await?;
        assert_eq!(warehouse.open_connections(), 2);

        first.close().await?;
        second.close().await?;
        assert_eq!(warehouse.open_connections(), 0);
        Ok(())
    }
}
