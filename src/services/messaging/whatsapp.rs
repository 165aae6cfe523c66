use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{MessagingProvider, SentMessage};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// Sends text messages through the WhatsApp Business Cloud API.
pub struct WhatsAppProvider {
    access_token: String,
    phone_number_id: String,
    client: reqwest::Client,
}

impl WhatsAppProvider {
    pub fn new(access_token: String, phone_number_id: String) -> Self {
        Self {
            access_token,
            phone_number_id,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentId>,
}

#[derive(Deserialize)]
struct SentId {
    id: String,
}

#[async_trait]
impl MessagingProvider for WhatsAppProvider {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<SentMessage> {
        anyhow::ensure!(
            !self.access_token.is_empty() && !self.phone_number_id.is_empty(),
            "WhatsApp is not configured"
        );

        let url = format!("{GRAPH_API_BASE}/{}/messages", self.phone_number_id);
        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to.trim_start_matches('+'),
            "type": "text",
            "text": { "body": body },
        });

        let response: SendResponse = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .context("failed to send WhatsApp message")?
            .error_for_status()
            .context("WhatsApp API returned error")?
            .json()
            .await
            .context("failed to decode WhatsApp response")?;

        Ok(SentMessage {
            external_id: response.messages.into_iter().next().map(|m| m.id),
        })
    }
}
