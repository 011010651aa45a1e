// src/ct_log/types.rs
use serde::Deserialize;

/// Response from a CT log's get-sth endpoint. Only the tree size is needed;
/// the signature and root hash are not verified here.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedTreeHead {
    pub tree_size: i64,
    #[serde(default)]
    pub timestamp: u64,
}

/// Single entry from a CT log's get-entries endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    pub leaf_input: String, // base64-encoded MerkleTreeLeaf
    pub extra_data: String, // base64-encoded chain data
}

/// Response wrapper for get-entries
#[derive(Debug, Deserialize)]
pub struct GetEntriesResponse {
    pub entries: Vec<LogEntry>,
}

/// Google's CT log list v3 format
#[derive(Debug, Deserialize)]
pub struct LogListV3 {
    pub operators: Vec<Operator>,
}

#[derive(Debug, Deserialize)]
pub struct Operator {
    pub name: String,
    #[serde(default)]
    pub logs: Vec<LogInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub log_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub state: Option<StateWrapper>,
}

/// Log state; only `usable` gates inclusion in the poll set.
#[derive(Debug, Clone, Deserialize)]
pub struct StateWrapper {
    #[serde(default)]
    pub usable: Option<StateTimestamp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateTimestamp {
    pub timestamp: String,
}

/// A log endpoint to poll, as produced by the log directory each tick.
#[derive(Debug, Clone)]
pub struct CtLog {
    pub operator: String,
    pub description: String,
    pub url: String,
    pub log_id: String,
}

/// Result of refreshing the Google log list. `last_modified` is echoed back
/// as `If-Modified-Since` on the next conditional request.
#[derive(Debug, Clone, Default)]
pub struct LogListUpdate {
    pub logs: Vec<CtLog>,
    pub last_modified: String,
}
