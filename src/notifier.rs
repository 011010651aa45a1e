// src/notifier.rs
use anyhow::Result;
use serde::Serialize;

/// One notification destination. The configured URL receives the title and
/// message as a JSON document via HTTP POST.
#[derive(Debug, Clone)]
pub struct Notifier {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct NotificationPayload<'a> {
    title: &'a str,
    message: &'a str,
}

impl Notifier {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    pub async fn send(&self, title: &str, message: &str) -> Result<()> {
        let payload = NotificationPayload { title, message };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        response.error_for_status()?; // non-2xx -> error

        Ok(())
    }
}
