// src/suffix.rs
//! Public suffix list utility
//!
//! Computes the registrable base domain of a host from the ICANN section of
//! the public suffix list. Not consumed by the ingestion path.

use anyhow::{Context, Result};
use tracing::info;

pub const PUBLIC_SUFFIX_LIST_URL: &str = "https://publicsuffix.org/list/public_suffix_list.dat";

#[derive(Debug, Clone)]
struct Suffix {
    suffix: String,
    label_count: usize,
}

/// Registrable-domain lookup backed by the ICANN public suffix list.
#[derive(Debug, Clone, Default)]
pub struct PublicSuffixList {
    suffixes: Vec<Suffix>,
}

impl PublicSuffixList {
    /// Download and parse the ICANN section of the public suffix list.
    pub async fn fetch(http_client: &reqwest::Client) -> Result<Self> {
        let body = http_client
            .get(PUBLIC_SUFFIX_LIST_URL)
            .send()
            .await
            .context("Failed to get public suffix list")?
            .text()
            .await
            .context("Failed to read public suffix list")?;

        let start = body.find("===BEGIN ICANN DOMAINS===").unwrap_or(0);
        let end = body.find("===END ICANN DOMAINS===").unwrap_or(body.len());

        let list = Self::from_lines(body[start..end].lines());
        info!("Built public suffix list with {} suffixes", list.len());

        Ok(list)
    }

    /// Build a list from raw suffix lines; comments and blanks are skipped.
    pub fn from_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Self {
        let suffixes = lines
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("//"))
            .map(|line| Suffix {
                suffix: line.to_string(),
                label_count: line.split('.').count(),
            })
            .collect();

        Self { suffixes }
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// The registrable base domain of a host: one label more than the most
    /// specific matching public suffix, or the last two labels if no suffix
    /// matches.
    pub fn base_domain(&self, input: &str) -> String {
        let mut best_label_count = 0;

        for suffix in &self.suffixes {
            if suffix.label_count > best_label_count
                && input.ends_with(&format!(".{}", suffix.suffix))
            {
                best_label_count = suffix.label_count;
            }
        }

        let parts: Vec<&str> = input.split('.').collect();

        // some people point NS records at single-label hosts
        if parts.len() <= 1 {
            return input.to_string();
        }

        let keep = if best_label_count == 0 {
            2
        } else {
            best_label_count + 1
        };

        if keep >= parts.len() {
            return input.to_string();
        }

        parts[parts.len() - keep..].join(".")
    }
}
