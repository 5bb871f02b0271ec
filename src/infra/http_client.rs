use crate::app::ports::{FetchResponse, HttpFetcher};
use crate::error::{Result, WeatherError};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("weather_ingest/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| WeatherError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestHttp {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let start = tokio::time::Instant::now();
        let resp = self.client.get(url).send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connect"
            } else {
                "request"
            };
            // reqwest errors echo the URL, which carries the API key
            warn!(kind, "HTTP GET failed");
            WeatherError::Network(format!("{kind} error: {}", e.without_url()))
        })?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = resp
            .bytes()
            .await
            .map_err(|e| WeatherError::Network(format!("failed reading body: {}", e.without_url())))?
            .to_vec();
        debug!(
            status,
            bytes = body.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "HTTP GET done"
        );
        Ok(FetchResponse {
            status,
            body,
            content_type,
        })
    }
}
