pub mod bookings;
pub mod calendar;
pub mod extras;
pub mod health;
pub mod messages;
pub mod properties;
pub mod sms;
pub mod whatsapp;

use axum::http::HeaderMap;

use crate::errors::AppError;

/// Requires `Authorization: Bearer <token>` matching the admin token.
pub fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    if is_admin(headers, expected_token) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

pub fn is_admin(headers: &HeaderMap, expected_token: &str) -> bool {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match auth.strip_prefix("Bearer ") {
        Some(token) => !expected_token.is_empty() && token == expected_token,
        None => false,
    }
}
