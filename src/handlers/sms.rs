use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::errors::{ApiResult, AppError};
use crate::handlers::messages::{normalize_phone, send_on_channel, SendRequest};
use crate::models::{Channel, Message};
use crate::services::messages::{self, InboundMessage};
use crate::state::AppState;

const WEBHOOK_PATH: &str = "/api/sms/webhook";

// POST /api/sms/send
pub async fn send_sms(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SendRequest>,
) -> ApiResult<Message> {
    send_on_channel(state, headers, Channel::Sms, body).await
}

/// Twilio signs the full webhook URL followed by every POST parameter,
/// sorted by name, as `name + value`.
pub fn validate_twilio_signature(
    auth_token: &str,
    signature: &str,
    url: &str,
    params: &HashMap<String, String>,
) -> bool {
    let mut data = url.to_string();
    let mut sorted_params: Vec<(&String, &String)> = params.iter().collect();
    sorted_params.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in sorted_params {
        data.push_str(key);
        data.push_str(value);
    }

    let mut mac = match Hmac::<Sha1>::new_from_slice(auth_token.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(data.as_bytes());

    let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    mac.verify_slice(&provided).is_ok()
}

fn webhook_url(state: &AppState, headers: &HeaderMap) -> String {
    if !state.config.public_base_url.is_empty() {
        return format!(
            "{}{WEBHOOK_PATH}",
            state.config.public_base_url.trim_end_matches('/')
        );
    }

    // Reconstruct from X-Forwarded-Proto/Host when behind a proxy
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{proto}://{host}{WEBHOOK_PATH}")
}

/// What a Twilio webhook asks us to do.
#[derive(Debug, PartialEq)]
pub enum TwilioEvent {
    StatusUpdate { sid: String, status: String },
    Inbound(InboundMessage),
}

/// Status callbacks carry `MessageStatus` and no `Body`; anything else with
/// a sender is an incoming message.
pub fn classify(params: &HashMap<String, String>) -> Result<TwilioEvent, AppError> {
    let get = |key: &str| {
        params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let sid = get("MessageSid").or_else(|| get("SmsSid"));

    if let (Some(status), None) = (get("MessageStatus"), params.get("Body")) {
        let sid = sid.ok_or_else(|| AppError::Validation("missing MessageSid".to_string()))?;
        return Ok(TwilioEvent::StatusUpdate {
            sid: sid.to_string(),
            status: status.to_string(),
        });
    }

    let raw_from = get("From").ok_or_else(|| AppError::Validation("missing From".to_string()))?;
    // Twilio's WhatsApp sender addresses look like `whatsapp:+15551234567`
    let (channel, from) = match raw_from.strip_prefix("whatsapp:") {
        Some(number) => (Channel::Whatsapp, number),
        None => (Channel::Sms, raw_from),
    };
    let from = normalize_phone(from)?;
    let media_url = get("MediaUrl0").map(str::to_string);
    let content = params.get("Body").map(|b| b.trim().to_string()).unwrap_or_default();
    if content.is_empty() && media_url.is_none() {
        return Err(AppError::Validation("message has neither body nor media".to_string()));
    }

    Ok(TwilioEvent::Inbound(InboundMessage {
        channel,
        from,
        content,
        external_id: sid.map(str::to_string),
        media_url,
    }))
}

// POST /api/sms/webhook
pub async fn sms_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    // Signature validation is skipped when no auth token is configured (dev mode)
    if !state.config.twilio_auth_token.is_empty() {
        let signature = headers
            .get("x-twilio-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing X-Twilio-Signature header");
            return AppError::Forbidden("missing signature".to_string()).into_response();
        }

        let url = webhook_url(&state, &headers);
        if !validate_twilio_signature(&state.config.twilio_auth_token, signature, &url, &params) {
            tracing::warn!(url = %url, "invalid Twilio signature");
            return AppError::Forbidden("invalid signature".to_string()).into_response();
        }
    }

    let event = match classify(&params) {
        Ok(event) => event,
        Err(e) => return e.into_response(),
    };

    let outcome = match event {
        TwilioEvent::StatusUpdate { sid, status } => {
            messages::apply_status_update(&state, &sid, &status).map(|_| ())
        }
        TwilioEvent::Inbound(inbound) => messages::record_inbound(&state, inbound).map(|_| ()),
    };

    // Twilio retries on non-2xx; a storage failure is logged and not retried
    if let Err(e) = outcome {
        tracing::error!(error = %e, "failed to process Twilio webhook");
        return (StatusCode::INTERNAL_SERVER_ERROR, twiml_body()).into_response();
    }

    twiml_response()
}

fn twiml_body() -> ([(header::HeaderName, &'static str); 1], &'static str) {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        "<Response></Response>",
    )
}

fn twiml_response() -> Response {
    twiml_body().into_response()
}
