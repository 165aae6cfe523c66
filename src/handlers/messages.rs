use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::{ok, ApiResult, AppError};
use crate::handlers::check_auth;
use crate::models::{Channel, Message, MessageTemplate};
use crate::services::messages;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SendRequest {
    pub to: String,
    pub content: Option<String>,
    pub template_id: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

/// Accepts E.164 numbers, tolerating spaces, dashes and parentheses.
pub fn normalize_phone(raw: &str) -> Result<String, AppError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let well_formed = raw.trim().starts_with('+')
        && raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'))
        && (8..=15).contains(&digits.len());
    if !well_formed {
        return Err(AppError::Validation(format!(
            "invalid phone number {raw:?}: expected international format like +15551234567"
        )));
    }
    Ok(format!("+{digits}"))
}

fn resolve_content(state: &AppState, request: &SendRequest) -> Result<String, AppError> {
    let content = match (&request.content, &request.template_id) {
        (Some(content), None) => content.trim().to_string(),
        (None, Some(template_id)) => {
            let template = load_template(state, template_id)?;
            template
                .render(&request.variables)
                .map_err(|e| AppError::Validation(e.to_string()))?
        }
        _ => {
            return Err(AppError::Validation(
                "provide exactly one of content or template_id".to_string(),
            ))
        }
    };

    if content.is_empty() {
        return Err(AppError::Validation("message content is empty".to_string()));
    }
    Ok(content)
}

pub(crate) async fn send_on_channel(
    state: Arc<AppState>,
    headers: HeaderMap,
    channel: Channel,
    request: SendRequest,
) -> ApiResult<Message> {
    check_auth(&headers, &state.config.admin_token)?;

    let to = normalize_phone(&request.to)?;
    let content = resolve_content(&state, &request)?;
    let message = messages::send_message(&state, channel, &to, &content).await?;
    ok(message)
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    pub phone: Option<String>,
    pub limit: Option<i64>,
}

// GET /api/admin/messages
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Vec<Message>> {
    check_auth(&headers, &state.config.admin_token)?;

    let phone = query
        .phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(normalize_phone)
        .transpose()?;
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);

    let messages = {
        let db = state.db();
        queries::list_messages(&db, phone.as_deref(), limit)?
    };
    ok(messages)
}

#[derive(Deserialize)]
pub struct EventsQuery {
    pub token: Option<String>,
    pub since: Option<NaiveDateTime>,
}

// GET /api/admin/messages/events — SSE stream
pub async fn message_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource can't set headers, so the token comes in the query
    let token = query.token.as_deref().unwrap_or("");
    if token.is_empty() || token != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }

    // Subscribe before the catch-up read so nothing falls in between
    let rx = state.message_tx.subscribe();

    let catchup = match query.since {
        Some(since) => {
            let db = state.db();
            queries::get_messages_since(&db, &since)?
        }
        None => Vec::new(),
    };

    let catchup_stream = tokio_stream::iter(catchup.into_iter().map(|message| {
        let data = serde_json::to_string(&message).unwrap_or_default();
        Ok::<_, Infallible>(Event::default().data(data).event("message"))
    }));

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(message) => {
            let data = serde_json::to_string(&message).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("message")))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "message event subscriber lagged");
            None
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    let combined = catchup_stream.chain(live_stream);
    let merged = StreamExt::merge(combined, keepalive_stream);

    Ok(Sse::new(merged))
}

// ── Templates ──

fn load_template(state: &AppState, id: &str) -> Result<MessageTemplate, AppError> {
    let db = state.db();
    queries::get_template(&db, id)?
        .filter(|t| t.user_id == state.config.admin_user_id)
        .ok_or_else(|| AppError::NotFound("template".to_string()))
}

// GET /api/admin/templates
pub async fn list_templates(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Vec<MessageTemplate>> {
    check_auth(&headers, &state.config.admin_token)?;

    let templates = {
        let db = state.db();
        queries::list_templates(&db, &state.config.admin_user_id)?
    };
    ok(templates)
}

// GET /api/admin/templates/:id
pub async fn get_template(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<MessageTemplate> {
    check_auth(&headers, &state.config.admin_token)?;
    ok(load_template(&state, &id)?)
}

#[derive(Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

#[derive(Serialize)]
pub struct RenderResponse {
    pub content: String,
}

// POST /api/admin/templates/:id/render
pub async fn render_template(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    axum::Json(body): axum::Json<RenderRequest>,
) -> ApiResult<RenderResponse> {
    check_auth(&headers, &state.config.admin_token)?;

    let template = load_template(&state, &id)?;
    let content = template
        .render(&body.variables)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    ok(RenderResponse { content })
}
