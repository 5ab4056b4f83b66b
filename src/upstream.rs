use crate::config::UpstreamConfig;
use bytes::Bytes;
use reqwest::{header, Client, StatusCode};
use std::time::{Duration, Instant};
use url::Url;

/// Raw outcome of one upstream call. The body is kept as bytes; nothing about
/// its content type is assumed.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
    pub elapsed: Duration,
}

/// Transport-level failure. `status` is set when headers arrived before the
/// failure (for example while reading the body).
#[derive(Debug, Clone)]
pub struct TransportError {
    pub message: String,
    pub status: Option<u16>,
}

/// Client for the fixed upstream conversion endpoint.
#[derive(Clone, Debug)]
pub struct Upstream {
    client: Client,
    base_url: String,
    format: String,
}

impl Upstream {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs()))
            .build()?;
        Ok(Upstream {
            client,
            base_url: config.base_url.clone(),
            format: config.format.clone(),
        })
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// Upstream URL for a canonical identifier.
    pub fn request_url(&self, canonical: &str) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| TransportError {
            message: format!("invalid upstream base url '{}': {}", self.base_url, e),
            status: None,
        })?;
        url.query_pairs_mut()
            .append_pair("url", canonical)
            .append_pair("format", &self.format);
        Ok(url)
    }

    /// Exactly one attempt, no retries.
    pub async fn fetch(&self, canonical: &str) -> Result<UpstreamReply, TransportError> {
        let url = self.request_url(canonical)?;
        let start = Instant::now();

        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| TransportError {
                message: describe(&e),
                status: e.status().map(|s| s.as_u16()),
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.bytes().await.map_err(|e| TransportError {
            message: describe(&e),
            status: Some(status.as_u16()),
        })?;

        let elapsed = start.elapsed();
        tracing::info!(
            upstream = %url,
            status = status.as_u16(),
            bytes = body.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "upstream call finished"
        );

        Ok(UpstreamReply {
            status,
            content_type,
            body,
            elapsed,
        })
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("upstream request timed out: {err}")
    } else if err.is_connect() {
        format!("could not connect to upstream: {err}")
    } else {
        err.to_string()
    }
}
