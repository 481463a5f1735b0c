use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

pub const PAGE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct PoliteClient {
    client: reqwest::Client,
    user_agent: String,
    delay: Duration,
}

impl PoliteClient {
    pub fn new(user_agent: impl Into<String>, delay: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
            delay,
        })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GETs an HTML page and fails on transport errors or a non-2xx status.
    pub async fn get_html(&self, url: &Url) -> anyhow::Result<String> {
        tracing::info!(%url, "GET");
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .timeout(PAGE_TIMEOUT)
            .send()
            .await
            .inspect_err(|err| tracing::error!(%url, %err, "http error"))
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(%url, %status, "http error");
            anyhow::bail!("GET {url} failed ({status})");
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("read body: {url}"))?;
        self.pause().await;
        Ok(body)
    }

    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
