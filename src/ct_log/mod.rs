// src/ct_log/mod.rs
pub mod client;
pub mod coordinator;
pub mod log_list;
pub mod types;
pub mod worker;

pub use client::CtLogClient;
pub use coordinator::CtLogCoordinator;
pub use log_list::{static_logs, LogListClient, LogListRefresh};
pub use types::{CtLog, LogEntry, LogListUpdate, SignedTreeHead};
pub use worker::LogWorker;
