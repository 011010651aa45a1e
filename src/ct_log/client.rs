// src/ct_log/client.rs
use anyhow::{Context, Result};
use tracing::debug;

use super::types::{GetEntriesResponse, LogEntry, SignedTreeHead};

pub const USER_AGENT: &str = concat!("certalert/", env!("CARGO_PKG_VERSION"));

/// HTTP client for one CT log endpoint (RFC 6962 subset)
#[derive(Debug, Clone)]
pub struct CtLogClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl CtLogClient {
    /// Create a client for a log base URL. The reqwest client is shared
    /// across all logs; it carries the User-Agent and request timeout.
    pub fn new(http_client: reqwest::Client, base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    /// Fetch the Signed Tree Head and return the current tree size.
    /// Endpoint: GET {base_url}/ct/v1/get-sth
    pub async fn get_sth(&self) -> Result<i64> {
        let url = format!("{}/ct/v1/get-sth", self.base_url);

        debug!("Fetching STH from {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch STH")?;

        if response.status().as_u16() >= 300 {
            anyhow::bail!("STH request failed with status {}", response.status());
        }

        let sth: SignedTreeHead = response.json().await.context("Failed to parse STH JSON")?;

        debug!(
            "STH received from {}: tree_size={}",
            self.base_url, sth.tree_size
        );

        Ok(sth.tree_size)
    }

    /// Fetch entries in the inclusive range [start, end]. The server is free
    /// to return a shorter prefix of the requested range.
    /// Endpoint: GET {base_url}/ct/v1/get-entries?start={start}&end={end}
    pub async fn get_entries(&self, start: i64, end: i64) -> Result<Vec<LogEntry>> {
        let url = format!(
            "{}/ct/v1/get-entries?start={}&end={}",
            self.base_url, start, end
        );

        debug!("Fetching entries {}-{} from {}", start, end, self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch entries")?;

        if response.status().as_u16() >= 300 {
            anyhow::bail!(
                "Get entries request failed with status {}",
                response.status()
            );
        }

        let entries_response: GetEntriesResponse = response
            .json()
            .await
            .context("Failed to parse entries JSON")?;

        debug!(
            "Received {} entries from {}",
            entries_response.entries.len(),
            self.base_url
        );

        Ok(entries_response.entries)
    }
}
