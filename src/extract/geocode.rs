use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use url::Url;

use crate::formats::GeocodeHit;

pub const DEFAULT_API_URL: &str = "https://api-adresse.data.gouv.fr/search/";

const GEOCODE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Geometry,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// `[lon, lat]`
    coordinates: (f64, f64),
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    label: Option<String>,
    score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    endpoint: Url,
    user_agent: String,
    delay: Duration,
}

impl Geocoder {
    pub fn new(
        client: reqwest::Client,
        endpoint: Url,
        user_agent: impl Into<String>,
        delay: Duration,
    ) -> Self {
        Self {
            client,
            endpoint,
            user_agent: user_agent.into(),
            delay,
        }
    }

    /// Best match for `query`, or `None` when the API returns no feature.
    pub async fn lookup(&self, query: &str) -> anyhow::Result<Option<GeocodeHit>> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("q", query), ("limit", "1")])
            .header(USER_AGENT, &self.user_agent)
            .timeout(GEOCODE_TIMEOUT)
            .send()
            .await
            .with_context(|| format!("GET {} q={query:?}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("geocoding {query:?} failed ({status})");
        }
        let body: SearchResponse = response
            .json()
            .await
            .with_context(|| format!("parse geocoding response for {query:?}"))?;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(body.features.into_iter().next().map(|feature| {
            let (lon, lat) = feature.geometry.coordinates;
            GeocodeHit {
                label: feature.properties.label,
                score: feature.properties.score,
                lon,
                lat,
            }
        }))
    }
}
