// src/types.rs
use std::sync::Arc;

use crate::cert_parser::CertInfo;
use crate::matcher::Watcher;

/// A certificate that matched at least one watcher, moved from a log worker
/// over the event channel to the dispatcher.
#[derive(Debug, Clone)]
pub struct MatchEvent {
    pub certificate: CertInfo,
    pub watchers: Vec<Arc<Watcher>>,
    pub log_description: String,
}
