use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use url::Url;

use super::{FeedBatch, FeedResponse, FeedSource};
use crate::config::Config;
use crate::logging::{log_feed_fetch, obj, v_str, warn, Domain, ProfileScope};

/// NASA NeoWs `feed` endpoint client.
pub struct NeoWsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl NeoWsClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.http_timeout())
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: cfg.feed_url.clone(),
            api_key: cfg.api_key.clone(),
        })
    }

    /// Feed URL covering a single day.
    pub fn feed_url(&self, date: NaiveDate) -> Result<Url> {
        let day = date.to_string();
        Url::parse_with_params(
            &self.base_url,
            &[
                ("start_date", day.as_str()),
                ("end_date", day.as_str()),
                ("api_key", self.api_key.as_str()),
            ],
        )
        .with_context(|| format!("bad feed url {}", self.base_url))
    }
}

#[async_trait]
impl FeedSource for NeoWsClient {
    async fn fetch(&self, date: NaiveDate) -> Result<FeedBatch> {
        let _profile =
            ProfileScope::with_context(Domain::Feed, "neows_fetch", &[("date", v_str(&date.to_string()))]);
        let url = self.feed_url(date)?;

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("feed request failed: {}", status));
        }
        let body: FeedResponse = resp.json().await.context("decode feed body")?;

        let batch = body.flatten();
        for skip in &batch.skipped {
            warn(
                Domain::Feed,
                "object_skipped",
                obj(&[("source", v_str("neows")), ("reason", v_str(&skip.to_string()))]),
            );
        }
        log_feed_fetch(&date.to_string(), batch.records.len(), batch.skipped.len());
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_sets_both_dates_and_key() {
        let cfg = Config {
            api_key: "DEMO_KEY".to_string(),
            ..Config::default()
        };
        let client = NeoWsClient::new(&cfg).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let url = client.feed_url(date).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.nasa.gov/neo/rest/v1/feed?start_date=2024-03-01&end_date=2024-03-01&api_key=DEMO_KEY"
        );
    }

    #[test]
    fn empty_key_is_still_sent() {
        let client = NeoWsClient::new(&Config::default()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let url = client.feed_url(date).unwrap();
        assert!(url.as_str().ends_with("&api_key="));
    }

    #[test]
    fn bad_base_url_is_an_error() {
        let cfg = Config {
            feed_url: "not a url".to_string(),
            ..Config::default()
        };
        let client = NeoWsClient::new(&cfg).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(client.feed_url(date).is_err());
    }
}
