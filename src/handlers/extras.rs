use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::{created, ok, ApiResponse, ApiResult, AppError};
use crate::handlers::{check_auth, is_admin};
use crate::models::{Extra, PriceUnit};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ExtraInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    #[serde(default)]
    pub price_unit: PriceUnit,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Deserialize)]
pub struct ExtraPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub price_unit: Option<PriceUnit>,
    pub active: Option<bool>,
}

fn validate(name: &str, price_cents: i64) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }
    if price_cents < 0 {
        return Err(AppError::Validation("price must not be negative".to_string()));
    }
    Ok(())
}

fn load(state: &AppState, id: &str) -> Result<Extra, AppError> {
    let db = state.db();
    queries::get_extra(&db, id)?.ok_or_else(|| AppError::NotFound("extra".to_string()))
}

// GET /api/extras
pub async fn list_public(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Extra>> {
    let extras = {
        let db = state.db();
        queries::list_extras(&db, false)?
    };
    ok(extras)
}

// GET /api/admin/extras
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Vec<Extra>> {
    check_auth(&headers, &state.config.admin_token)?;

    let extras = {
        let db = state.db();
        queries::list_extras(&db, true)?
    };
    ok(extras)
}

// GET /api/extras/:id
pub async fn get_extra(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Extra> {
    let extra = load(&state, &id)?;
    if !extra.active && !is_admin(&headers, &state.config.admin_token) {
        return Err(AppError::NotFound("extra".to_string()));
    }
    ok(extra)
}

// POST /api/extras
pub async fn create_extra(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ExtraInput>,
) -> Result<(StatusCode, Json<ApiResponse<Extra>>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate(&body.name, body.price_cents)?;

    let now = Utc::now().naive_utc();
    let extra = Extra {
        id: uuid::Uuid::new_v4().to_string(),
        name: body.name.trim().to_string(),
        description: body.description,
        price_cents: body.price_cents,
        price_unit: body.price_unit,
        active: body.active,
        created_at: now,
        updated_at: now,
    };

    {
        let db = state.db();
        queries::create_extra(&db, &extra)?;
    }
    tracing::info!(extra_id = %extra.id, name = %extra.name, "extra created");
    created(extra)
}

// PUT /api/extras/:id
pub async fn replace_extra(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ExtraInput>,
) -> ApiResult<Extra> {
    check_auth(&headers, &state.config.admin_token)?;
    validate(&body.name, body.price_cents)?;

    let mut extra = load(&state, &id)?;
    extra.name = body.name.trim().to_string();
    extra.description = body.description;
    extra.price_cents = body.price_cents;
    extra.price_unit = body.price_unit;
    extra.active = body.active;

    save(&state, extra)
}

// PATCH /api/extras/:id
pub async fn patch_extra(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ExtraPatch>,
) -> ApiResult<Extra> {
    check_auth(&headers, &state.config.admin_token)?;

    let mut extra = load(&state, &id)?;
    if let Some(name) = body.name {
        extra.name = name.trim().to_string();
    }
    if let Some(description) = body.description {
        extra.description = description;
    }
    if let Some(price_cents) = body.price_cents {
        extra.price_cents = price_cents;
    }
    if let Some(price_unit) = body.price_unit {
        extra.price_unit = price_unit;
    }
    if let Some(active) = body.active {
        extra.active = active;
    }
    validate(&extra.name, extra.price_cents)?;

    save(&state, extra)
}

fn save(state: &AppState, extra: Extra) -> ApiResult<Extra> {
    let db = state.db();
    if !queries::update_extra(&db, &extra)? {
        return Err(AppError::NotFound("extra".to_string()));
    }
    let updated = queries::get_extra(&db, &extra.id)?
        .ok_or_else(|| AppError::NotFound("extra".to_string()))?;
    drop(db);

    tracing::info!(extra_id = %updated.id, active = updated.active, "extra updated");
    ok(updated)
}

// DELETE /api/extras/:id
pub async fn delete_extra(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db();
    if queries::extra_in_use(&db, &id)? {
        return Err(AppError::Conflict(
            "extra is attached to bookings; deactivate it instead".to_string(),
        ));
    }
    if !queries::delete_extra(&db, &id)? {
        return Err(AppError::NotFound("extra".to_string()));
    }
    drop(db);

    tracing::info!(extra_id = %id, "extra deleted");
    ok(serde_json::json!({ "id": id }))
}
