use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBook {
    pub title: String,
    pub category: String,
    pub price_raw: String,
    pub rating: i64,
    pub book_availability: bool,
    pub img_url: Option<String>,
    pub img_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawQuote {
    pub quote_text: String,
    pub author: String,
    pub tags: Vec<String>,
    pub source: String,
    pub page_url: String,
}

/// One spreadsheet row, PII included. Only ever written to bronze.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPartner {
    pub nom_librairie: Option<String>,
    pub adresse: Option<String>,
    pub code_postal: Option<String>,
    pub ville: Option<String>,
    pub contact_nom: Option<String>,
    pub contact_email: Option<String>,
    pub contact_telephone: Option<String>,
    pub ca_annuel: Option<f64>,
    pub date_partenariat: Option<String>,
    pub specialite: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanBook {
    pub title: String,
    pub category: String,
    pub price: f64,
    pub rating: i32,
    pub book_availability: bool,
    pub img_url: Option<String>,
    pub img_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanQuote {
    pub quote_text: String,
    pub author: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlatQuote<'a> {
    pub quote_text: &'a str,
    pub author: &'a str,
    pub tags: String,
}

impl<'a> From<&'a CleanQuote> for FlatQuote<'a> {
    fn from(quote: &'a CleanQuote) -> Self {
        Self {
            quote_text: &quote.quote_text,
            author: &quote.author,
            tags: quote.tags.join(","),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanPartner {
    pub nom_librairie: String,
    pub adresse: String,
    pub code_postal: Option<String>,
    pub ville: Option<String>,
    pub specialite: Option<String>,
    pub ca_annuel: Option<f64>,
    pub date_partenariat: Option<NaiveDate>,
    pub contact_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerAddress {
    pub partner_id: i64,
    pub adresse: String,
    pub code_postal: Option<String>,
    pub ville: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeHit {
    pub label: Option<String>,
    pub score: Option<f64>,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerGeocoding {
    pub partner_id: i64,
    pub label: Option<String>,
    pub score: Option<f64>,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BronzeSnapshot<R> {
    pub run_id: String,
    pub dataset: String,
    pub created_at: String,
    pub rows: R,
}
