// src/ct_log/coordinator.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::log_list::{static_logs, LogListClient, LogListRefresh};
use super::types::{CtLog, LogListUpdate};
use super::worker::LogWorker;
use crate::config::Config;
use crate::matcher::Matcher;
use crate::metrics;
use crate::types::MatchEvent;

const LOG_LIST_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Mutable per-log state. Created on first sight of a log id, never removed.
struct LogState {
    lock: Arc<Mutex<()>>,
    last_tree_size: Arc<AtomicI64>,
    failure_streak: Arc<AtomicI64>,
}

impl LogState {
    fn new() -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            last_tree_size: Arc::new(AtomicI64::new(0)),
            failure_streak: Arc::new(AtomicI64::new(0)),
        }
    }
}

/// Periodic scheduler for all log workers. Every iteration reloads the
/// configuration, keeps the log directory fresh and dispatches one worker
/// per log under a per-log try-lock.
pub struct CtLogCoordinator {
    config_path: PathBuf,
    http_client: reqwest::Client,
    events: mpsc::Sender<MatchEvent>,
    log_list: LogListClient,
    cached_list: LogListUpdate,
    last_list_refresh: Option<Instant>,
    states: HashMap<String, LogState>,
    workers: JoinSet<()>,
}

impl CtLogCoordinator {
    pub fn new(
        config_path: PathBuf,
        http_client: reqwest::Client,
        events: mpsc::Sender<MatchEvent>,
    ) -> Self {
        Self {
            config_path,
            log_list: LogListClient::new(http_client.clone()),
            http_client,
            events,
            cached_list: LogListUpdate::default(),
            last_list_refresh: None,
            states: HashMap::new(),
            workers: JoinSet::new(),
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            // Hot reload: watcher patterns and intervals may change between
            // iterations without a restart. A transient load error is not
            // fatal here, unlike at startup.
            let config = match Config::from_file(&self.config_path) {
                Ok(config) => config,
                Err(e) => {
                    error!("Failed to load new config: {:#}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Received shutdown signal, stopping ingestion");
                        self.drain_workers().await;
                        return;
                    }
                }
                _ = tokio::time::sleep(config.log_collection.log_renewal_interval) => {
                    self.tick(&config).await;
                }
            }
        }
    }

    async fn tick(&mut self, config: &Config) {
        // Reap workers that finished since the last tick so the set does not
        // grow with completed tasks.
        while self.workers.try_join_next().is_some() {}

        // Rebuilt from scratch each tick; workers hold a snapshot.
        let matcher = match Matcher::from_config(config, &self.http_client) {
            Ok(matcher) => Arc::new(matcher),
            Err(e) => {
                error!("Failed to compile watchers: {:#}", e);
                return;
            }
        };

        if !config.log_collection.google_log_list_url.trim().is_empty() {
            self.refresh_log_list(&config.log_collection.google_log_list_url)
                .await;
        }

        let mut logs_to_update: Vec<CtLog> = self.cached_list.logs.clone();
        logs_to_update.extend(static_logs(&config.log_collection.logs_urls));

        for log in logs_to_update {
            self.dispatch(log, &matcher, config);
        }

        metrics::ITERATION_COUNT.inc();
    }

    /// Refresh the Google log list at most once per five minutes. A failed
    /// refresh keeps the previous list; the attempt timestamp advances
    /// regardless so a broken list endpoint is not hammered every tick.
    async fn refresh_log_list(&mut self, list_url: &str) {
        let due = self
            .last_list_refresh
            .map_or(true, |at| at.elapsed() > LOG_LIST_REFRESH_INTERVAL);
        if !due {
            return;
        }

        match self
            .log_list
            .fetch(list_url, &self.cached_list.last_modified)
            .await
        {
            Ok(LogListRefresh::Updated(update)) => self.cached_list = update,
            Ok(LogListRefresh::NotModified) => {}
            Err(e) => warn!(
                "Failed to update CT log list, retrying at a later iteration: {:#}",
                e
            ),
        }

        self.last_list_refresh = Some(Instant::now());
    }

    fn dispatch(&mut self, log: CtLog, matcher: &Arc<Matcher>, config: &Config) {
        let state = self
            .states
            .entry(log.log_id.clone())
            .or_insert_with(LogState::new);

        // Skip when the previous update (or its backoff sleep) still holds
        // the lock.
        let guard = match state.lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                metrics::LOG_ITERATIONS_MISSED
                    .with_label_values(&[log.operator.as_str(), log.description.as_str()])
                    .inc();
                return;
            }
        };

        let worker = LogWorker::new(
            log,
            self.http_client.clone(),
            state.last_tree_size.clone(),
            matcher.clone(),
            config.log_collection.max_handleable_log_gap,
            self.events.clone(),
        );
        let failure_streak = state.failure_streak.clone();

        self.workers.spawn(async move {
            let was_ok = worker.update().await;

            if was_ok {
                failure_streak.store(0, Ordering::SeqCst);
            } else {
                // The lock is held across the backoff sleep; subsequent
                // ticks find it busy and count a missed iteration.
                let streak = failure_streak.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(backoff_duration(streak)).await;
            }

            drop(guard);
        });
    }

    /// Wait for in-flight workers (including those sleeping out a failure
    /// backoff) to finish; workers are never cancelled mid-batch.
    async fn drain_workers(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        info!("Waiting for {} in-flight log workers", self.workers.len());

        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                error!("Log worker task failed: {}", e);
            }
        }

        info!("All log workers stopped");
    }
}

/// Backoff applied after a failed update. `previous_streak` is the streak
/// value before this failure was counted, so consecutive failures sleep for
/// 1, 6, 11, ... minutes.
fn backoff_duration(previous_streak: i64) -> Duration {
    Duration::from_secs((previous_streak * 5 + 1) as u64 * 60)
}
