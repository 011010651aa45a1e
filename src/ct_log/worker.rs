// src/ct_log/worker.rs
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::client::CtLogClient;
use super::types::CtLog;
use crate::cert_parser::LeafDecoder;
use crate::matcher::Matcher;
use crate::metrics;
use crate::types::MatchEvent;

/// Per-log update procedure. The coordinator runs at most one worker per log
/// at a time; the log's lock is held by the spawning task for the whole
/// update including any failure backoff.
pub struct LogWorker {
    log: CtLog,
    client: CtLogClient,
    last_tree_size: Arc<AtomicI64>,
    matcher: Arc<Matcher>,
    max_log_gap: i64,
    events: mpsc::Sender<MatchEvent>,
}

impl LogWorker {
    pub fn new(
        log: CtLog,
        http_client: reqwest::Client,
        last_tree_size: Arc<AtomicI64>,
        matcher: Arc<Matcher>,
        max_log_gap: i64,
        events: mpsc::Sender<MatchEvent>,
    ) -> Self {
        let client = CtLogClient::new(http_client, &log.url);
        Self {
            log,
            client,
            last_tree_size,
            matcher,
            max_log_gap,
            events,
        }
    }

    /// Run one update. Returns false only when the STH fetch fails; entry
    /// fetch errors are absorbed as partial progress.
    pub async fn update(&self) -> bool {
        let started = Instant::now();
        let labels = [self.log.operator.as_str(), self.log.description.as_str()];

        let tree_size = match self.client.get_sth().await {
            Ok(size) => size,
            Err(e) => {
                warn!("Failed to get STH @ {}: {:#}", self.log.url, e);
                return false;
            }
        };

        let previous = self.last_tree_size.swap(tree_size, Ordering::SeqCst);

        metrics::LOG_TREE_SIZE
            .with_label_values(&labels)
            .set(tree_size);

        // First observation of this log only records the baseline, so a
        // newly seen log does not trigger a full historical scan.
        if previous == 0 {
            debug!(
                "Skipping {}: no previous tree size",
                self.log.description
            );
            return true;
        }

        let gap = tree_size - previous;

        if gap > self.max_log_gap {
            metrics::LOG_ITERATIONS_SKIPPED
                .with_label_values(&labels)
                .inc();
            warn!(
                "Skipping {}: gap of {} entries exceeds the handleable limit",
                self.log.description, gap
            );
            return true;
        }

        // Covers both an unchanged and a (never expected) shrunken tree.
        if gap <= 0 {
            return true;
        }

        let mut handled: i64 = 0;

        'batches: while handled < gap {
            metrics::LOG_ENTRY_REQUESTS.with_label_values(&labels).inc();

            let entries = match self
                .client
                .get_entries(previous + handled, tree_size - 1)
                .await
            {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Failed to get entries @ {}: {:#}", self.log.url, e);
                    break;
                }
            };

            // A server answering with an empty batch would stall the loop.
            if entries.is_empty() {
                warn!(
                    "{} returned an empty entry batch, giving up until next tick",
                    self.log.description
                );
                break;
            }

            for entry in &entries {
                metrics::LOG_CERTS_INGESTED.with_label_values(&labels).inc();

                let index = previous + handled;
                handled += 1;

                let cert = match LeafDecoder::decode(&entry.leaf_input, &entry.extra_data, index)
                {
                    Ok(cert) => cert,
                    Err(e) => {
                        debug!("Failed to decode entry @ {}: {:#}", self.log.description, e);
                        continue;
                    }
                };

                let mut watchers = self.matcher.watchers_for(&cert.common_name);

                for dns_name in &cert.dns_names {
                    metrics::LOG_DNS_NAMES_INGESTED
                        .with_label_values(&labels)
                        .inc();
                    watchers.extend(self.matcher.watchers_for(dns_name));
                }

                if watchers.is_empty() {
                    continue;
                }

                let event = MatchEvent {
                    certificate: cert,
                    watchers,
                    log_description: self.log.description.clone(),
                };

                metrics::MATCH_EVENTS_BUFFERED.inc();
                if self.events.send(event).await.is_err() {
                    metrics::MATCH_EVENTS_BUFFERED.dec();
                    warn!("Match event channel closed, dropping remaining entries");
                    break 'batches;
                }
            }
        }

        metrics::LOG_INGEST_DURATION
            .with_label_values(&labels)
            .observe(started.elapsed().as_secs_f64());

        true
    }
}
