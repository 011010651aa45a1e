// src/lib.rs
// Library interface for certalert
pub mod cert_parser;
pub mod cli;
pub mod config;
pub mod ct_log;
pub mod dedupe;
pub mod dispatcher;
pub mod matcher;
pub mod metrics;
pub mod notifier;
pub mod suffix;
pub mod types;
