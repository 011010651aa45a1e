// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::matcher::Pattern;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub prometheus: PrometheusConfig,
    #[serde(rename = "logCollection")]
    pub log_collection: LogCollectionConfig,
    #[serde(default)]
    pub watchers: Vec<WatcherConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogCollectionConfig {
    /// Tick period of the ingestion loop
    #[serde(
        rename = "logRenewalInterval",
        deserialize_with = "deserialize_duration",
        default = "default_renewal_interval"
    )]
    pub log_renewal_interval: Duration,

    /// Upper bound on entries ingested per tick per log
    #[serde(rename = "maxHandleableLogGap", default = "default_max_log_gap")]
    pub max_handleable_log_gap: i64,

    /// Source of the dynamic log list; optional if logsURLs is set
    #[serde(rename = "googleLogListURL", default)]
    pub google_log_list_url: String,

    /// Statically configured logs; optional if googleLogListURL is set
    #[serde(rename = "logsURLs", default)]
    pub logs_urls: Vec<String>,
}

fn default_renewal_interval() -> Duration {
    Duration::from_secs(60)
}
fn default_max_log_gap() -> i64 {
    10_000
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatcherConfig {
    /// Wildcard pattern, anchored at both ends. Mutually exclusive with regexp.
    #[serde(default)]
    pub glob: String,
    /// Regular expression, matched against the whole name. Mutually exclusive
    /// with glob.
    #[serde(rename = "regexp", default)]
    pub regexp: String,
    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(rename = "shoutrrrURL")]
    pub shoutrrr_url: String,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read file {}", path.display()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(contents).context("parse yaml")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the ingestion loop cannot run with. Pattern
    /// compilation happens here so a bad watcher fails the load, not a tick.
    fn validate(&self) -> Result<()> {
        if self.log_collection.google_log_list_url.trim().is_empty()
            && self.log_collection.logs_urls.is_empty()
        {
            anyhow::bail!(
                "validation: either logCollection.googleLogListURL or logCollection.logsURLs must be provided"
            );
        }

        if self.watchers.is_empty() {
            anyhow::bail!("validation: at least one watcher must be provided");
        }

        for (i, watcher) in self.watchers.iter().enumerate() {
            let has_regex = !watcher.regexp.trim().is_empty();
            let has_glob = !watcher.glob.trim().is_empty();

            if has_regex && has_glob {
                anyhow::bail!(
                    "watcher[{}]: provide only one of 'regexp' or 'glob', not both",
                    i
                );
            }
            if !has_regex && !has_glob {
                anyhow::bail!("watcher[{}]: must provide either 'glob' or 'regexp'", i);
            }

            Pattern::compile(watcher).with_context(|| format!("watcher[{}]", i))?;

            if watcher.notifiers.is_empty() {
                anyhow::bail!("watcher[{}]: at least one notifier is required", i);
            }

            for (j, notifier) in watcher.notifiers.iter().enumerate() {
                if notifier.shoutrrr_url.trim().is_empty() {
                    anyhow::bail!("watcher[{}].notifiers[{}]: shoutrrrURL is empty", i, j);
                }
            }
        }

        Ok(())
    }
}

/// Parse a duration string such as "30s", "5m", "1h" or "1m30s".
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        anyhow::bail!("duration is empty");
    }

    let bytes = s.as_bytes();
    let mut total = Duration::ZERO;
    let mut i = 0;

    while i < s.len() {
        let number_start = i;
        while i < s.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
            i += 1;
        }
        if number_start == i {
            anyhow::bail!("invalid duration {:?}", input);
        }
        let value: f64 = s[number_start..i]
            .parse()
            .with_context(|| format!("invalid duration {:?}", input))?;

        let unit_start = i;
        while i < s.len() && !bytes[i].is_ascii_digit() {
            i += 1;
        }
        let seconds_per_unit = match &s[unit_start..i] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            unit => anyhow::bail!("invalid duration unit {:?} in {:?}", unit, input),
        };

        total += Duration::from_secs_f64(value * seconds_per_unit);
    }

    Ok(total)
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
prometheus:
  enabled: true
logCollection:
  logRenewalInterval: "30s"
  maxHandleableLogGap: 1000
  googleLogListURL: "https://www.gstatic.com/ct/log_list/v3/log_list.json"
watchers:
  - glob: "*.example.com"
    notifiers:
      - shoutrrrURL: "https://hooks.example.com/notify"
"#;

    #[test]
    fn test_config_from_valid_yaml() {
        let config = Config::from_yaml(VALID_CONFIG).unwrap();

        assert!(config.prometheus.enabled);
        assert_eq!(
            config.log_collection.log_renewal_interval,
            Duration::from_secs(30)
        );
        assert_eq!(config.log_collection.max_handleable_log_gap, 1000);
        assert_eq!(config.watchers.len(), 1);
        assert_eq!(config.watchers[0].glob, "*.example.com");
        assert_eq!(config.watchers[0].notifiers.len(), 1);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_yaml(
            r#"
logCollection:
  logsURLs: ["https://ct.example.com/log/"]
watchers:
  - regexp: "api\\..+"
    notifiers:
      - shoutrrrURL: "https://hooks.example.com/notify"
"#,
        )
        .unwrap();

        assert!(!config.prometheus.enabled);
        assert_eq!(
            config.log_collection.log_renewal_interval,
            Duration::from_secs(60)
        );
        assert_eq!(config.log_collection.max_handleable_log_gap, 10_000);
    }

    #[test]
    fn test_config_requires_log_source() {
        let result = Config::from_yaml(
            r#"
logCollection: {}
watchers:
  - glob: "*"
    notifiers:
      - shoutrrrURL: "https://hooks.example.com/notify"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_requires_watchers() {
        let result = Config::from_yaml(
            r#"
logCollection:
  logsURLs: ["https://ct.example.com/log/"]
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_rejects_glob_and_regexp() {
        let result = Config::from_yaml(
            r#"
logCollection:
  logsURLs: ["https://ct.example.com/log/"]
watchers:
  - glob: "*.example.com"
    regexp: ".*"
    notifiers:
      - shoutrrrURL: "https://hooks.example.com/notify"
"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("only one of"), "unexpected error: {}", err);
    }

    #[test]
    fn test_config_rejects_missing_pattern() {
        let result = Config::from_yaml(
            r#"
logCollection:
  logsURLs: ["https://ct.example.com/log/"]
watchers:
  - notifiers:
      - shoutrrrURL: "https://hooks.example.com/notify"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_rejects_invalid_regexp() {
        let result = Config::from_yaml(
            r#"
logCollection:
  logsURLs: ["https://ct.example.com/log/"]
watchers:
  - regexp: "("
    notifiers:
      - shoutrrrURL: "https://hooks.example.com/notify"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_rejects_missing_notifiers() {
        let result = Config::from_yaml(
            r#"
logCollection:
  logsURLs: ["https://ct.example.com/log/"]
watchers:
  - glob: "*.example.com"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("10d").is_err());
        assert!(parse_duration("fast").is_err());
    }
}
