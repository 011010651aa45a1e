// src/dispatcher.rs
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::dedupe::SerialSet;
use crate::metrics;
use crate::types::MatchEvent;

pub const NOTIFICATION_TITLE: &str = "Certalert: Found matching certificate";

/// Single consumer of match events. Deduplicates by certificate serial and
/// fans each surviving event out to the matched watchers' notifiers.
pub struct Dispatcher {
    events: mpsc::Receiver<MatchEvent>,
    covered_serials: SerialSet,
}

impl Dispatcher {
    pub fn new(events: mpsc::Receiver<MatchEvent>) -> Self {
        Self {
            events,
            covered_serials: SerialSet::new(),
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        metrics::MATCH_EVENTS_BUFFERED.dec();
                        self.handle(event).await;
                    }
                    None => break,
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Dispatcher stopped");
    }

    /// An event is considered delivered once popped: notifier errors are
    /// logged but do not reset the dedup state.
    async fn handle(&self, event: MatchEvent) {
        if !self.covered_serials.insert(&event.certificate.serial).await {
            debug!(
                "Skipping already covered serial {}",
                event.certificate.serial
            );
            return;
        }

        let message = format_notification(&event);

        for watcher in &event.watchers {
            for error in watcher.notify(NOTIFICATION_TITLE, &message).await {
                warn!("Failed to notify watcher: {:#}", error);
            }
        }
    }
}

/// Plain-text notification body. Subject and DNS names are defanged so chat
/// clients do not auto-link the hostnames.
pub fn format_notification(event: &MatchEvent) -> String {
    let cert = &event.certificate;
    format!(
        "Issuer: {}\nSubject: {}\nDNS Names: {}\nLog: {}\nValid after: {}\nValid until: {}\nSerial: {}",
        cert.issuer,
        defang(&cert.subject),
        defang(&cert.dns_names.join(", ")),
        event.log_description,
        cert.not_before,
        cert.not_after,
        cert.serial_hex,
    )
}

fn defang(s: &str) -> String {
    s.replace('.', "[.]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert_parser::CertInfo;
    use chrono::DateTime;

    fn test_event() -> MatchEvent {
        MatchEvent {
            certificate: CertInfo {
                subject: "CN=api.example.com".to_string(),
                common_name: "api.example.com".to_string(),
                issuer: "CN=Test CA".to_string(),
                dns_names: vec![
                    "api.example.com".to_string(),
                    "www.example.com".to_string(),
                ],
                not_before: DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
                not_after: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                serial: "1234567890".to_string(),
                serial_hex: "499602D2".to_string(),
            },
            watchers: vec![],
            log_description: "Test Log 2024".to_string(),
        }
    }

    #[test]
    fn test_defang() {
        assert_eq!(defang("api.example.com"), "api[.]example[.]com");
        assert_eq!(defang("no-dots"), "no-dots");
    }

    #[test]
    fn test_format_notification() {
        let message = format_notification(&test_event());

        assert!(message.starts_with("Issuer: CN=Test CA\n"));
        assert!(message.contains("Subject: CN=api[.]example[.]com\n"));
        assert!(message.contains("DNS Names: api[.]example[.]com, www[.]example[.]com\n"));
        assert!(message.contains("Log: Test Log 2024\n"));
        assert!(message.contains("Valid after: 2020-09-13 12:26:40 UTC\n"));
        assert!(message.contains("Valid until: 2023-11-14 22:13:20 UTC\n"));
        assert!(message.ends_with("Serial: 499602D2"));
    }

    #[tokio::test]
    async fn test_duplicate_serial_is_dropped() {
        let (tx, rx) = mpsc::channel(8);
        let dispatcher = Dispatcher::new(rx);

        // Two events with the same serial: only the first passes the set
        assert!(
            dispatcher
                .covered_serials
                .insert(&test_event().certificate.serial)
                .await
        );
        assert!(
            !dispatcher
                .covered_serials
                .insert(&test_event().certificate.serial)
                .await
        );

        drop(tx);
    }
}
