use crate::catalog::Catalog;
use crate::history::History;
use crate::models::Method;
use crate::render::classify;
use crate::session::{Outcome, Session, Ticket};
use anyhow::{anyhow, Context, Result};
use reqwest::{header, Client};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use url::Url;

/// A request that has been recorded and marked as sending.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub ticket: Ticket,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Online,
    Error,
}

impl Health {
    pub fn label(&self) -> &'static str {
        match self {
            Health::Online => "Online",
            Health::Error => "Error",
        }
    }
}

/// Health of one catalog endpoint, keyed by its catalog index.
#[derive(Debug, Clone)]
pub struct EndpointHealth {
    pub index: usize,
    pub name: String,
    pub path: String,
    pub health: Health,
}

/// Issues console requests against a fixed origin.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    origin: Url,
}

impl RequestExecutor {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self> {
        let origin = Url::parse(origin).with_context(|| format!("invalid console origin '{}'", origin))?;
        let client = Client::builder()
            .user_agent("ada-api-console")
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(RequestExecutor { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Records the request in `history` and marks the session as sending.
    pub fn prepare(&self, session: &mut Session, history: &mut History) -> Option<PendingRequest> {
        let url = session.request_url()?;
        let descriptor = session.descriptor()?;
        if descriptor.method != Method::Get {
            tracing::warn!(
                "{} is declared as {}; sending GET",
                descriptor.name,
                descriptor.method.as_str()
            );
        }
        history.record(&descriptor.name, &url, chrono::Utc::now());
        let ticket = session.begin()?;
        Some(PendingRequest { ticket, url })
    }

    /// Absolute URL for a request path. Absolute inputs are kept as they are.
    pub fn absolute_url(&self, request_url: &str) -> Result<Url> {
        self.origin
            .join(request_url)
            .with_context(|| format!("cannot build a URL from '{}'", request_url))
    }

    /// Sends one GET. Every failure is folded into the outcome.
    pub async fn send(&self, request_url: &str) -> Outcome {
        let start = Instant::now();
        let failed = |message: String, status: Option<u16>| Outcome {
            status,
            elapsed: start.elapsed(),
            payload: Err(message),
        };

        let url = match self.absolute_url(request_url) {
            Ok(url) => url,
            Err(e) => return failed(format!("{:#}", e), None),
        };

        tracing::info!("GET {}", url);
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("request to {} failed: {}", url, e);
                return failed(e.to_string(), None);
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match response.bytes().await {
            Ok(body) => Outcome {
                status: Some(status),
                elapsed: start.elapsed(),
                payload: Ok(classify(content_type.as_deref(), body)),
            },
            Err(e) => failed(format!("failed to read response body: {}", e), Some(status)),
        }
    }

    /// Prepares, sends and completes one request in sequence.
    pub async fn execute(&self, session: &mut Session, history: &mut History) -> Option<bool> {
        let pending = self.prepare(session, history)?;
        let outcome = self.send(&pending.url).await;
        Some(session.complete(pending.ticket, outcome))
    }

    /// Downloads `link` into `dir`, naming the file after the last path segment.
    pub async fn download(&self, link: &str, dir: &Path) -> Result<PathBuf> {
        let url = Url::parse(link).with_context(|| format!("invalid link '{}'", link))?;
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|s| !s.is_empty())
            .map(|s| percent_encoding::percent_decode_str(s).decode_utf8_lossy().to_string())
            .filter(|s| !s.contains(['/', '\\']) && s != ".." && s != ".")
            .unwrap_or_else(|| "download.bin".to_string());

        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "*/*")
            .send()
            .await
            .with_context(|| format!("request failed for {}", url))?;
        if !response.status().is_success() {
            return Err(anyhow!("server returned {} for {}", response.status(), url));
        }
        let body = response.bytes().await.context("failed to read download body")?;

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(name);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("Saved {} bytes to {}", body.len(), path.display());
        Ok(path)
    }

    /// One GET to `path`. Only a 2xx answer counts as online.
    pub async fn check(&self, path: &str) -> Health {
        let url = match self.absolute_url(path) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("{:#}", e);
                return Health::Error;
            }
        };
        match self.client.get(url.clone()).send().await {
            Ok(response) if response.status().is_success() => Health::Online,
            Ok(response) => {
                tracing::debug!("{} answered {}", url, response.status());
                Health::Error
            }
            Err(e) => {
                tracing::debug!("{} unreachable: {}", url, e);
                Health::Error
            }
        }
    }

    /// Checks every catalog endpoint concurrently. Reports come back in
    /// catalog order.
    pub async fn check_catalog(self: &Arc<Self>, catalog: &Catalog) -> Vec<EndpointHealth> {
        let mut checks = JoinSet::new();
        for entry in catalog.entries() {
            let executor = Arc::clone(self);
            let mut report = EndpointHealth {
                index: entry.index,
                name: entry.descriptor.name.clone(),
                path: entry.descriptor.path.clone(),
                health: Health::Error,
            };
            checks.spawn(async move {
                report.health = executor.check(&report.path).await;
                report
            });
        }

        let mut reports = Vec::with_capacity(checks.len());
        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!("health check task failed: {}", e),
            }
        }
        reports.sort_by_key(|r| r.index);
        reports
    }
}
