// src/ct_log/log_list.rs
use anyhow::{Context, Result};
use reqwest::header;
use tracing::{debug, info};

use super::types::{CtLog, LogListUpdate, LogListV3};

/// Outcome of a conditional log list fetch.
#[derive(Debug)]
pub enum LogListRefresh {
    Updated(LogListUpdate),
    NotModified,
}

/// Fetches Google's CT log list and filters it down to usable logs.
#[derive(Debug, Clone)]
pub struct LogListClient {
    http_client: reqwest::Client,
}

impl LogListClient {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Conditionally fetch the log list. `last_modified` is the value echoed
    /// from the previous response; empty on the first request. A 304 response
    /// means the caller's cached bundle is still current.
    pub async fn fetch(&self, list_url: &str, last_modified: &str) -> Result<LogListRefresh> {
        debug!("Fetching CT log list from {}", list_url);

        let mut request = self.http_client.get(list_url);
        if !last_modified.is_empty() {
            request = request.header(header::IF_MODIFIED_SINCE, last_modified);
        }

        let response = request.send().await.context("Failed to fetch CT log list")?;

        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            debug!("CT log list not modified");
            return Ok(LogListRefresh::NotModified);
        }

        if !response.status().is_success() {
            anyhow::bail!("Log list request failed with status {}", response.status());
        }

        let new_last_modified = response
            .headers()
            .get(header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let log_list: LogListV3 = response
            .json()
            .await
            .context("Failed to parse log list JSON")?;

        let mut logs = Vec::new();

        for operator in &log_list.operators {
            for log in &operator.logs {
                // Only usable logs accept and serve fresh entries.
                let usable = log
                    .state
                    .as_ref()
                    .map(|s| s.usable.is_some())
                    .unwrap_or(false);

                if !usable || log.url.is_empty() {
                    continue;
                }

                logs.push(CtLog {
                    operator: operator.name.clone(),
                    description: log.description.clone(),
                    url: log.url.clone(),
                    log_id: log.log_id.clone(),
                });
            }
        }

        info!("Fetched {} usable CT logs", logs.len());

        Ok(LogListRefresh::Updated(LogListUpdate {
            logs,
            last_modified: new_last_modified,
        }))
    }
}

/// Statically configured log URLs become logs with an unknown operator; the
/// URL doubles as description and log id.
pub fn static_logs(urls: &[String]) -> Vec<CtLog> {
    urls.iter()
        .map(|url| CtLog {
            operator: "unknown".to_string(),
            description: url.clone(),
            url: url.clone(),
            log_id: url.clone(),
        })
        .collect()
}
