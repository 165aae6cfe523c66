use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::services::calendar::generate_feed;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct FeedQuery {
    pub property: Option<String>,
}

// GET /api/calendar.ics
pub async fn calendar_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    let (bookings, properties, calendar_name) = {
        let db = state.db();
        let properties: HashMap<_, _> = queries::list_properties(&db)?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        match query.property.as_deref() {
            Some(slug) => {
                let property = properties
                    .values()
                    .find(|p| p.slug == slug)
                    .cloned()
                    .ok_or_else(|| AppError::NotFound("property".to_string()))?;
                let bookings = queries::get_calendar_bookings(&db, Some(property.id.as_str()))?;
                (bookings, properties, property.name)
            }
            None => {
                let bookings = queries::get_calendar_bookings(&db, None)?;
                (bookings, properties, state.config.calendar_name.clone())
            }
        }
    };

    let ics = generate_feed(
        &calendar_name,
        &bookings,
        &properties,
        &Utc::now().naive_utc(),
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"bookings.ics\""),
        ],
        ics,
    )
        .into_response())
}
