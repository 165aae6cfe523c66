use std::sync::Arc;

use chrono::Utc;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Channel, Direction, Message, MessageStatus};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub channel: Channel,
    pub from: String,
    pub content: String,
    pub external_id: Option<String>,
    pub media_url: Option<String>,
}

/// Sends `content` to `to` and records the outbound message. A provider
/// failure is stored as a `failed` message and returned to the caller.
pub async fn send_message(
    state: &Arc<AppState>,
    channel: Channel,
    to: &str,
    content: &str,
) -> Result<Message, AppError> {
    let result = state.provider(channel).send_message(to, content).await;

    let now = Utc::now().naive_utc();
    let mut message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: state.config.admin_user_id.clone(),
        admin_id: Some(state.config.admin_user_id.clone()),
        channel,
        phone_number: to.to_string(),
        content: content.to_string(),
        direction: Direction::Outbound,
        status: MessageStatus::Sent,
        external_id: None,
        media_url: None,
        created_at: now,
        updated_at: now,
    };

    let failure = match result {
        Ok(sent) => {
            message.external_id = sent.external_id;
            None
        }
        Err(e) => {
            tracing::error!(error = %e, channel = channel.as_str(), to, "outbound message failed");
            message.status = MessageStatus::Failed;
            Some(e)
        }
    };

    {
        let db = state.db();
        queries::insert_message(&db, &message)?;
    }
    publish(state, &message);

    match failure {
        Some(e) => Err(AppError::Messaging(format!("{e:#}"))),
        None => {
            tracing::info!(message_id = %message.id, channel = channel.as_str(), to, "message sent");
            Ok(message)
        }
    }
}

/// Stores a message received through a provider webhook. Providers
/// redeliver webhooks, so a known external id returns the stored row.
pub fn record_inbound(state: &Arc<AppState>, inbound: InboundMessage) -> anyhow::Result<Message> {
    let db = state.db();

    if let Some(external_id) = inbound.external_id.as_deref() {
        if let Some(existing) = queries::get_message_by_external_id(&db, external_id)? {
            tracing::debug!(external_id, "duplicate inbound message ignored");
            return Ok(existing);
        }
    }

    let now = Utc::now().naive_utc();
    let message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: state.config.admin_user_id.clone(),
        admin_id: None,
        channel: inbound.channel,
        phone_number: inbound.from,
        content: inbound.content,
        direction: Direction::Inbound,
        status: MessageStatus::Received,
        external_id: inbound.external_id,
        media_url: inbound.media_url,
        created_at: now,
        updated_at: now,
    };
    queries::insert_message(&db, &message)?;
    drop(db);

    tracing::info!(
        message_id = %message.id,
        channel = message.channel.as_str(),
        from = %message.phone_number,
        "inbound message stored"
    );
    publish(state, &message);
    Ok(message)
}

/// Applies a provider delivery report. Returns `None` when the status is
/// not one we track or no message carries that external id.
pub fn apply_status_update(
    state: &Arc<AppState>,
    external_id: &str,
    raw_status: &str,
) -> anyhow::Result<Option<Message>> {
    let Some(status) = MessageStatus::parse(raw_status) else {
        tracing::warn!(external_id, status = raw_status, "unknown delivery status");
        return Ok(None);
    };

    let updated = {
        let db = state.db();
        queries::update_message_status(&db, external_id, status)?
    };

    match &updated {
        Some(message) if message.status != status => {
            tracing::debug!(
                external_id,
                current = message.status.as_str(),
                status = status.as_str(),
                "stale status update ignored"
            );
        }
        Some(message) => {
            tracing::info!(external_id, status = status.as_str(), "message status updated");
            publish(state, message);
        }
        None => tracing::warn!(external_id, "status update for unknown message"),
    }
    Ok(updated)
}

fn publish(state: &Arc<AppState>, message: &Message) {
    // No subscribers is not an error
    let _ = state.message_tx.send(message.clone());
}
