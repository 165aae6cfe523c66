use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::{created, ok, ApiResponse, ApiResult, AppError};
use crate::handlers::check_auth;
use crate::models::{Property, PropertyPhoto};
use crate::services::booking;
use crate::state::AppState;

#[derive(Serialize)]
pub struct PropertyDetail {
    #[serde(flatten)]
    pub property: Property,
    pub photos: Vec<PropertyPhoto>,
}

#[derive(Deserialize)]
pub struct PropertyInput {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub max_guests: i64,
    #[serde(default = "one")]
    pub bedrooms: i64,
    #[serde(default = "one")]
    pub bathrooms: i64,
    pub nightly_rate_cents: i64,
    #[serde(default)]
    pub cleaning_fee_cents: i64,
    #[serde(default = "one")]
    pub min_nights: i64,
}

fn one() -> i64 {
    1
}

impl PropertyInput {
    fn validate(&self) -> Result<(), AppError> {
        let slug_ok = !self.slug.is_empty()
            && self
                .slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !slug_ok {
            return Err(AppError::Validation(
                "slug must be lowercase letters, digits and dashes".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        if self.max_guests < 1 || self.min_nights < 1 {
            return Err(AppError::Validation(
                "max_guests and min_nights must be at least 1".to_string(),
            ));
        }
        if self.nightly_rate_cents < 0 || self.cleaning_fee_cents < 0 {
            return Err(AppError::Validation("prices must not be negative".to_string()));
        }
        Ok(())
    }

    fn apply(self, property: &mut Property) {
        property.slug = self.slug;
        property.name = self.name.trim().to_string();
        property.description = self.description;
        property.location = self.location;
        property.max_guests = self.max_guests;
        property.bedrooms = self.bedrooms;
        property.bathrooms = self.bathrooms;
        property.nightly_rate_cents = self.nightly_rate_cents;
        property.cleaning_fee_cents = self.cleaning_fee_cents;
        property.min_nights = self.min_nights;
    }
}

fn is_unique_violation(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn slug_taken(e: anyhow::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("slug is already in use".to_string())
    } else {
        AppError::Internal(e)
    }
}

// GET /api/properties
pub async fn list_properties(State(state): State<Arc<AppState>>) -> ApiResult<Vec<PropertyDetail>> {
    let db = state.db();
    let properties = queries::list_properties(&db)?;

    let mut details = Vec::with_capacity(properties.len());
    for property in properties {
        let photos = queries::list_photos(&db, &property.id)?;
        details.push(PropertyDetail { property, photos });
    }
    drop(db);
    ok(details)
}

// GET /api/properties/:slug
pub async fn get_property(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> ApiResult<PropertyDetail> {
    let db = state.db();
    let property = queries::get_property_by_slug(&db, &slug)?
        .ok_or_else(|| AppError::NotFound("property".to_string()))?;
    let photos = queries::list_photos(&db, &property.id)?;
    drop(db);
    ok(PropertyDetail { property, photos })
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub unavailable: Vec<NaiveDate>,
}

// GET /api/properties/:slug/availability
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<AvailabilityResponse> {
    let from = query.from.unwrap_or_else(|| Utc::now().date_naive());
    let to = match query.to {
        Some(to) => to,
        None => from
            .checked_add_signed(Duration::days(365))
            .ok_or_else(|| AppError::Validation("`from` is out of range".to_string()))?,
    };
    if to < from {
        return Err(AppError::Validation("`to` must not be before `from`".to_string()));
    }
    if (to - from).num_days() > 731 {
        return Err(AppError::Validation("range is limited to two years".to_string()));
    }

    let db = state.db();
    let property = queries::get_property_by_slug(&db, &slug)?
        .ok_or_else(|| AppError::NotFound("property".to_string()))?;
    let unavailable = booking::unavailable_dates(&db, &property.id, from, to)?;
    drop(db);

    ok(AvailabilityResponse {
        from,
        to,
        unavailable,
    })
}

// POST /api/admin/properties
pub async fn create_property(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PropertyInput>,
) -> Result<(StatusCode, Json<ApiResponse<Property>>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    body.validate()?;

    let now = Utc::now().naive_utc();
    let mut property = Property {
        id: uuid::Uuid::new_v4().to_string(),
        slug: String::new(),
        name: String::new(),
        description: String::new(),
        location: String::new(),
        max_guests: 1,
        bedrooms: 1,
        bathrooms: 1,
        nightly_rate_cents: 0,
        cleaning_fee_cents: 0,
        min_nights: 1,
        created_at: now,
        updated_at: now,
    };
    body.apply(&mut property);

    {
        let db = state.db();
        queries::create_property(&db, &property).map_err(slug_taken)?;
    }
    tracing::info!(property_id = %property.id, slug = %property.slug, "property created");
    created(property)
}

// PUT /api/admin/properties/:id
pub async fn update_property(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<PropertyInput>,
) -> ApiResult<Property> {
    check_auth(&headers, &state.config.admin_token)?;
    body.validate()?;

    let db = state.db();
    let mut property =
        queries::get_property(&db, &id)?.ok_or_else(|| AppError::NotFound("property".to_string()))?;
    body.apply(&mut property);
    queries::update_property(&db, &property).map_err(slug_taken)?;
    let updated =
        queries::get_property(&db, &id)?.ok_or_else(|| AppError::NotFound("property".to_string()))?;
    drop(db);

    ok(updated)
}

// DELETE /api/admin/properties/:id
pub async fn delete_property(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    check_auth(&headers, &state.config.admin_token)?;

    let deleted = {
        let db = state.db();
        queries::delete_property(&db, &id)?
    };
    if !deleted {
        return Err(AppError::NotFound("property".to_string()));
    }
    tracing::info!(property_id = %id, "property deleted");
    ok(serde_json::json!({ "id": id }))
}

#[derive(Deserialize)]
pub struct PhotoInput {
    pub url: String,
    pub caption: Option<String>,
}

// POST /api/admin/properties/:id/photos
pub async fn add_photo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Json(body): Json<PhotoInput>,
) -> Result<(StatusCode, Json<ApiResponse<PropertyPhoto>>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let url = body.url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/')) {
        return Err(AppError::Validation("photo url must be absolute".to_string()));
    }

    let db = state.db();
    if queries::get_property(&db, &property_id)?.is_none() {
        return Err(AppError::NotFound("property".to_string()));
    }
    let photo = PropertyPhoto {
        id: uuid::Uuid::new_v4().to_string(),
        position: queries::next_photo_position(&db, &property_id)?,
        property_id,
        url: url.to_string(),
        caption: body.caption.filter(|c| !c.trim().is_empty()),
    };
    queries::add_photo(&db, &photo)?;
    drop(db);

    created(photo)
}

// DELETE /api/admin/photos/:id
pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    check_auth(&headers, &state.config.admin_token)?;

    let deleted = {
        let db = state.db();
        queries::delete_photo(&db, &id)?
    };
    if !deleted {
        return Err(AppError::NotFound("photo".to_string()));
    }
    ok(serde_json::json!({ "id": id }))
}

#[derive(Deserialize)]
pub struct PhotoOrder {
    pub photo_ids: Vec<String>,
}

// PUT /api/admin/properties/:id/photos/order
pub async fn reorder_photos(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Json(body): Json<PhotoOrder>,
) -> ApiResult<Vec<PropertyPhoto>> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db();
    if queries::get_property(&db, &property_id)?.is_none() {
        return Err(AppError::NotFound("property".to_string()));
    }
    queries::reorder_photos(&db, &property_id, &body.photo_ids)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let photos = queries::list_photos(&db, &property_id)?;
    drop(db);

    ok(photos)
}
