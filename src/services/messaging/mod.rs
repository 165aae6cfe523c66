pub mod twilio;
pub mod whatsapp;

use async_trait::async_trait;

/// Provider-side identity of a message that was accepted for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub external_id: Option<String>,
}

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<SentMessage>;
}
