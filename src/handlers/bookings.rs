use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::{created, ok, ApiResponse, ApiResult, AppError};
use crate::handlers::check_auth;
use crate::models::{Booking, BookingExtra, BookingStatus};
use crate::services::booking::{self, NewBooking, Quote, StayRequest};
use crate::state::AppState;

// POST /api/bookings/quote
pub async fn quote(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StayRequest>,
) -> ApiResult<Quote> {
    let db = state.db();
    let property = queries::get_property(&db, &body.property_id)?
        .ok_or_else(|| AppError::NotFound("property".to_string()))?;
    let quote = booking::quote(&db, &property, &body)?;
    drop(db);
    ok(quote)
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), AppError> {
    let booking = {
        let db = state.db();
        booking::create_booking(&db, &body)?
    };
    created(booking)
}

#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

// GET /api/admin/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> ApiResult<Vec<Booking>> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = match query.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(s @ ("pending" | "confirmed" | "cancelled")) => Some(BookingStatus::parse(s)),
        Some(other) => {
            return Err(AppError::Validation(format!("unknown booking status: {other}")));
        }
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let bookings = {
        let db = state.db();
        queries::list_bookings(&db, status, limit)?
    };
    ok(bookings)
}

#[derive(Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub extras: Vec<BookingExtra>,
}

// GET /api/admin/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<BookingDetail> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db();
    let booking =
        queries::get_booking(&db, &id)?.ok_or_else(|| AppError::NotFound("booking".to_string()))?;
    let extras = queries::get_booking_extras(&db, &id)?;
    drop(db);
    ok(BookingDetail { booking, extras })
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: BookingStatus,
}

// PATCH /api/admin/bookings/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<Booking> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db();
    let current =
        queries::get_booking(&db, &id)?.ok_or_else(|| AppError::NotFound("booking".to_string()))?;

    // Reinstating a cancelled stay must not double-book its nights
    if current.status == BookingStatus::Cancelled && body.status != BookingStatus::Cancelled {
        booking::check_availability(&db, &current.property_id, current.check_in, current.check_out)?;
    }

    queries::update_booking_status(&db, &id, body.status)?;
    let updated =
        queries::get_booking(&db, &id)?.ok_or_else(|| AppError::NotFound("booking".to_string()))?;
    drop(db);

    tracing::info!(booking_id = %id, status = body.status.as_str(), "booking status changed");
    ok(updated)
}
