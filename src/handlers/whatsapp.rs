use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::errors::{ApiResult, AppError};
use crate::handlers::messages::{normalize_phone, send_on_channel, SendRequest};
use crate::models::{Channel, Message};
use crate::services::messages::{self, InboundMessage};
use crate::state::AppState;

// ── Payload ──

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub statuses: Vec<StatusReport>,
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct StatusReport {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub from: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub text: Option<TextBody>,
    pub image: Option<Media>,
    pub document: Option<Media>,
    pub audio: Option<Media>,
    pub video: Option<Media>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct Media {
    pub id: String,
    pub caption: Option<String>,
}

impl IncomingMessage {
    fn into_inbound(self) -> Result<InboundMessage, AppError> {
        let from = normalize_phone(&format!("+{}", self.from.trim_start_matches('+')))?;
        let media = self
            .image
            .or(self.document)
            .or(self.video)
            .or(self.audio);

        let content = match (&self.text, &media) {
            (Some(text), _) => text.body.clone(),
            (None, Some(media)) => media.caption.clone().unwrap_or_default(),
            (None, None) => format!("[unsupported {} message]", self.kind),
        };

        Ok(InboundMessage {
            channel: Channel::Whatsapp,
            from,
            content,
            external_id: Some(self.id),
            media_url: media.map(|m| m.id),
        })
    }
}

/// Processes every status report and message in the payload. Returns the
/// number of items that failed; failures are logged and not retried.
pub fn dispatch(state: &Arc<AppState>, payload: WebhookPayload) -> usize {
    let mut failed = 0;

    for change in payload.entry.into_iter().flat_map(|e| e.changes) {
        for report in change.value.statuses {
            if let Err(e) = messages::apply_status_update(state, &report.id, &report.status) {
                tracing::error!(error = %e, external_id = %report.id, "failed to apply WhatsApp status");
                failed += 1;
            }
        }

        for incoming in change.value.messages {
            let id = incoming.id.clone();
            let result = incoming
                .into_inbound()
                .map_err(anyhow::Error::from)
                .and_then(|inbound| messages::record_inbound(state, inbound));
            if let Err(e) = result {
                tracing::error!(error = %e, external_id = %id, "failed to store WhatsApp message");
                failed += 1;
            }
        }
    }

    failed
}

// ── Handlers ──

#[derive(Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

// GET /api/whatsapp/webhook
pub async fn verify_webhook(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let expected = state.config.whatsapp_verify_token.as_str();
    let subscribed = query.mode.as_deref() == Some("subscribe");
    let token_ok = !expected.is_empty() && query.verify_token.as_deref() == Some(expected);

    match (subscribed && token_ok, query.challenge) {
        (true, Some(challenge)) => {
            tracing::info!("WhatsApp webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            tracing::warn!(mode = ?query.mode, "WhatsApp webhook verification failed");
            AppError::Forbidden("verification failed".to_string()).into_response()
        }
    }
}

// POST /api/whatsapp/webhook
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<WebhookPayload>,
) -> (StatusCode, Json<serde_json::Value>) {
    let failed = dispatch(&state, payload);
    if failed > 0 {
        tracing::warn!(failed, "WhatsApp webhook processed with failures");
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({ "success": true, "data": { "failed": failed } })),
    )
}

// POST /api/whatsapp/send
pub async fn send_whatsapp(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SendRequest>,
) -> ApiResult<Message> {
    send_on_channel(state, headers, Channel::Whatsapp, body).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_and_status_payload() {
        let payload: WebhookPayload = serde_json::from_value(serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "123",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "messages": [{
                            "from": "351912345678",
                            "id": "wamid.A",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": { "body": "Olá!" }
                        }],
                        "statuses": [{
                            "id": "wamid.B",
                            "status": "read",
                            "timestamp": "1700000001",
                            "recipient_id": "351912345678"
                        }]
                    }
                }]
            }]
        }))
        .unwrap();

        let value = &payload.entry[0].changes[0].value;
        assert_eq!(value.statuses[0].status, "read");
        assert_eq!(value.messages[0].kind, "text");
    }

    #[test]
    fn test_image_message_uses_caption_and_media_id() {
        let incoming: IncomingMessage = serde_json::from_value(serde_json::json!({
            "from": "351912345678",
            "id": "wamid.C",
            "type": "image",
            "image": { "id": "media-1", "caption": "The view", "mime_type": "image/jpeg" }
        }))
        .unwrap();

        let inbound = incoming.into_inbound().unwrap();
        assert_eq!(inbound.from, "+351912345678");
        assert_eq!(inbound.content, "The view");
        assert_eq!(inbound.media_url.as_deref(), Some("media-1"));
        assert_eq!(inbound.channel, Channel::Whatsapp);
    }

    #[test]
    fn test_empty_change_value_defaults() {
        let payload: WebhookPayload =
            serde_json::from_str(r#"{"entry":[{"changes":[{"value":{}}]}]}"#).unwrap();
        assert!(payload.entry[0].changes[0].value.messages.is_empty());
    }
}
