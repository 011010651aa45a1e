// src/matcher.rs
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::Arc;

use crate::config::{Config, WatcherConfig};
use crate::notifier::Notifier;

/// Compiled watcher pattern. Both kinds match the entire input string; the
/// glob form is translated into an anchored regular expression.
#[derive(Debug, Clone)]
pub enum Pattern {
    Glob(Regex),
    Regex(Regex),
}

impl Pattern {
    /// Compile the pattern of a watcher config. Config validation guarantees
    /// exactly one of glob/regexp is set.
    pub fn compile(watcher: &WatcherConfig) -> Result<Self> {
        let glob = watcher.glob.trim();
        let regexp = watcher.regexp.trim();

        if !regexp.is_empty() {
            let re = Regex::new(&format!("^(?:{})$", regexp))
                .with_context(|| format!("invalid regexp {:?}", regexp))?;
            Ok(Pattern::Regex(re))
        } else if !glob.is_empty() {
            let re = Regex::new(&glob_to_regex(glob))
                .with_context(|| format!("invalid wildcard {:?}", glob))?;
            Ok(Pattern::Glob(re))
        } else {
            anyhow::bail!("must provide either 'glob' or 'regexp'")
        }
    }

    pub fn matches(&self, s: &str) -> bool {
        match self {
            Pattern::Glob(re) | Pattern::Regex(re) => re.is_match(s),
        }
    }
}

/// Translate a wildcard pattern into an anchored regular expression: `*`
/// matches any run of characters, `?` exactly one, everything else literally.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }
    out.push('$');
    out
}

/// A compiled watcher: one pattern plus its notification destinations.
#[derive(Debug)]
pub struct Watcher {
    pub pattern: Pattern,
    pub notifiers: Vec<Notifier>,
}

impl Watcher {
    pub fn matches(&self, s: &str) -> bool {
        self.pattern.matches(s)
    }

    /// Deliver a notification to every destination of this watcher,
    /// collecting per-destination errors.
    pub async fn notify(&self, title: &str, message: &str) -> Vec<anyhow::Error> {
        let mut errors = Vec::new();
        for notifier in &self.notifiers {
            if let Err(e) = notifier.send(title, message).await {
                errors.push(e);
            }
        }
        errors
    }
}

/// The full compiled watcher set of one config load.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    watchers: Vec<Arc<Watcher>>,
}

impl Matcher {
    /// Build the compiled watcher set from a validated config.
    pub fn from_config(config: &Config, http_client: &reqwest::Client) -> Result<Self> {
        let mut watchers = Vec::with_capacity(config.watchers.len());

        for (i, watcher) in config.watchers.iter().enumerate() {
            let pattern = Pattern::compile(watcher).with_context(|| format!("watcher[{}]", i))?;
            let notifiers = watcher
                .notifiers
                .iter()
                .map(|n| Notifier::new(http_client.clone(), n.shoutrrr_url.clone()))
                .collect();

            watchers.push(Arc::new(Watcher { pattern, notifiers }));
        }

        Ok(Self { watchers })
    }

    /// All watchers whose pattern matches the whole input, in config order.
    pub fn watchers_for(&self, name: &str) -> Vec<Arc<Watcher>> {
        self.watchers
            .iter()
            .filter(|w| w.matches(name))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn matcher_from_yaml(yaml: &str) -> Matcher {
        let config = Config::from_yaml(yaml).unwrap();
        Matcher::from_config(&config, &reqwest::Client::new()).unwrap()
    }

    fn glob_pattern(glob: &str) -> Pattern {
        Pattern::compile(&WatcherConfig {
            glob: glob.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    fn regex_pattern(regexp: &str) -> Pattern {
        Pattern::compile(&WatcherConfig {
            regexp: regexp.to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_glob_is_anchored() {
        let pattern = glob_pattern("*.example.com");

        assert!(pattern.matches("api.example.com"));
        assert!(pattern.matches("deep.sub.example.com"));
        assert!(!pattern.matches("example.com"));
        assert!(!pattern.matches("api.example.com.evil.net"));
        assert!(!pattern.matches("prefix-api.example.net"));
    }

    #[test]
    fn test_glob_escapes_literals() {
        // The dot must not act as a regex wildcard
        let pattern = glob_pattern("a.b");

        assert!(pattern.matches("a.b"));
        assert!(!pattern.matches("aXb"));
    }

    #[test]
    fn test_glob_question_mark() {
        let pattern = glob_pattern("host-?.example.com");

        assert!(pattern.matches("host-1.example.com"));
        assert!(!pattern.matches("host-12.example.com"));
        assert!(!pattern.matches("host-.example.com"));
    }

    #[test]
    fn test_regex_matches_whole_string() {
        let pattern = regex_pattern("api\\..+");

        assert!(pattern.matches("api.example.com"));
        assert!(!pattern.matches("www.api.example.com"));

        // An unanchored fragment must not match as a substring
        let fragment = regex_pattern("example");
        assert!(fragment.matches("example"));
        assert!(!fragment.matches("api.example.com"));
    }

    #[test]
    fn test_watchers_for_returns_all_matches_in_order() {
        let matcher = matcher_from_yaml(
            r#"
logCollection:
  logsURLs: ["https://ct.example.com/log/"]
watchers:
  - glob: "*.example.com"
    notifiers:
      - shoutrrrURL: "https://hooks.example.com/a"
  - regexp: ".+\\.example\\.com"
    notifiers:
      - shoutrrrURL: "https://hooks.example.com/b"
  - glob: "*.other.net"
    notifiers:
      - shoutrrrURL: "https://hooks.example.com/c"
"#,
        );

        let matched = matcher.watchers_for("api.example.com");
        assert_eq!(matched.len(), 2);
        assert!(matches!(matched[0].pattern, Pattern::Glob(_)));
        assert!(matches!(matched[1].pattern, Pattern::Regex(_)));

        assert!(matcher.watchers_for("unrelated.org").is_empty());
    }

    #[test]
    fn test_reload_is_idempotent() {
        let yaml = r#"
logCollection:
  logsURLs: ["https://ct.example.com/log/"]
watchers:
  - glob: "*.example.com"
    notifiers:
      - shoutrrrURL: "https://hooks.example.com/notify"
  - regexp: "internal-[0-9]+\\.corp"
    notifiers:
      - shoutrrrURL: "https://hooks.example.com/notify"
"#;
        let first = matcher_from_yaml(yaml);
        let second = matcher_from_yaml(yaml);

        let samples = [
            "api.example.com",
            "example.com",
            "internal-42.corp",
            "internal-x.corp",
            "unrelated.org",
        ];

        for name in samples {
            assert_eq!(
                first.watchers_for(name).len(),
                second.watchers_for(name).len(),
                "match decision changed across reload for {}",
                name
            );
        }
    }
}
