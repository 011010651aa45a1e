// src/dedupe.rs
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-lifetime set of certificate serial numbers that have already been
/// dispatched. Grows unboundedly with distinct observed certificates.
#[derive(Clone, Default)]
pub struct SerialSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl SerialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-and-set: returns true if the serial was not seen before (and
    /// records it), false for a duplicate.
    pub async fn insert(&self, serial: &str) -> bool {
        let mut guard = self.inner.lock().await;
        guard.insert(serial.to_string())
    }
}
