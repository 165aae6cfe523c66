use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub location: String,
    pub max_guests: i64,
    pub bedrooms: i64,
    pub bathrooms: i64,
    pub nightly_rate_cents: i64,
    pub cleaning_fee_cents: i64,
    pub min_nights: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyPhoto {
    pub id: String,
    pub property_id: String,
    pub url: String,
    pub caption: Option<String>,
    pub position: i64,
}
