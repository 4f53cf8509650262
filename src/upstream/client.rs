use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::UpstreamError;

/// Raw access to the provider: one GET returning a JSON body.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<serde_json::Value, UpstreamError>;
}

/// API-Football v3 over HTTPS, authenticated with `x-apisports-key`.
pub struct ApiFootballHttp {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ApiFootballHttp {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(ApiFootballHttp {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

#[async_trait]
impl UpstreamTransport for ApiFootballHttp {
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<serde_json::Value, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::ConfigurationMissing("API_FOOTBALL_KEY"))?;

        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("GET {} {:?}", url, query);

        let resp = self
            .http
            .get(&url)
            .header("x-apisports-key", api_key)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status { status, body });
        }

        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_fails_the_call() {
        let client =
            ApiFootballHttp::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        let err = client.get_json("fixtures", &[]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::ConfigurationMissing(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_blank_key_counts_as_missing() {
        let client = ApiFootballHttp::new(
            "http://127.0.0.1:9/",
            Some("   ".into()),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = client.get_json("/players", &[]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::ConfigurationMissing(_)));
    }
}
