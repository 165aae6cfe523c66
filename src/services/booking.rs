use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingExtra, BookingStatus, Property};
use crate::services::dates::{calculate_nights, get_dates_in_range, stays_overlap};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("property not found")]
    UnknownProperty,

    #[error("check-out must be after check-in")]
    InvalidDates,

    #[error("this property requires a minimum stay of {min} nights")]
    TooShort { min: i64 },

    #[error("this property sleeps at most {max} guests")]
    TooManyGuests { max: i64 },

    #[error("at least one guest is required")]
    NoGuests,

    #[error("extra {0} is not available")]
    UnknownExtra(String),

    #[error("quantity for extra {0} must be at least 1")]
    InvalidQuantity(String),

    #[error("{0}")]
    MissingField(&'static str),

    #[error("date is out of range")]
    DateOutOfRange,

    #[error("the requested stay is too large to price")]
    PriceOverflow,

    #[error("those dates are no longer available")]
    Unavailable,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for BookingError {
    fn from(e: rusqlite::Error) -> Self {
        BookingError::Storage(e.into())
    }
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::UnknownProperty => AppError::NotFound("property".to_string()),
            BookingError::Unavailable => AppError::Conflict(BookingError::Unavailable.to_string()),
            BookingError::Storage(inner) => AppError::Internal(inner),
            other => AppError::Validation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtraSelection {
    pub extra_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct StayRequest {
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: i64,
    #[serde(default)]
    pub extras: Vec<ExtraSelection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    #[serde(flatten)]
    pub stay: StayRequest,
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuoteLine {
    pub extra_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Quote {
    pub nights: i64,
    pub nightly_rate_cents: i64,
    pub accommodation_cents: i64,
    pub cleaning_fee_cents: i64,
    pub extras: Vec<QuoteLine>,
    pub total_cents: i64,
}

/// Prices a stay without touching availability.
pub fn quote(conn: &Connection, property: &Property, stay: &StayRequest) -> Result<Quote, BookingError> {
    if stay.check_out <= stay.check_in {
        return Err(BookingError::InvalidDates);
    }
    let nights = calculate_nights(stay.check_in, stay.check_out);
    if nights < property.min_nights {
        return Err(BookingError::TooShort {
            min: property.min_nights,
        });
    }
    if stay.guests < 1 {
        return Err(BookingError::NoGuests);
    }
    if stay.guests > property.max_guests {
        return Err(BookingError::TooManyGuests {
            max: property.max_guests,
        });
    }

    let mut lines = Vec::with_capacity(stay.extras.len());
    for selection in &stay.extras {
        if selection.quantity < 1 {
            return Err(BookingError::InvalidQuantity(selection.extra_id.clone()));
        }
        let extra = queries::get_extra(conn, &selection.extra_id)?
            .filter(|e| e.active)
            .ok_or_else(|| BookingError::UnknownExtra(selection.extra_id.clone()))?;

        let total_cents = extra
            .line_total(selection.quantity, nights, stay.guests)
            .ok_or(BookingError::PriceOverflow)?;
        lines.push(QuoteLine {
            total_cents,
            extra_id: extra.id,
            name: extra.name,
            quantity: selection.quantity,
            unit_price_cents: extra.price_cents,
        });
    }

    let accommodation_cents = nights
        .checked_mul(property.nightly_rate_cents)
        .ok_or(BookingError::PriceOverflow)?;
    let total_cents = lines
        .iter()
        .try_fold(accommodation_cents, |acc, l| acc.checked_add(l.total_cents))
        .and_then(|t| t.checked_add(property.cleaning_fee_cents))
        .ok_or(BookingError::PriceOverflow)?;

    Ok(Quote {
        nights,
        nightly_rate_cents: property.nightly_rate_cents,
        accommodation_cents,
        cleaning_fee_cents: property.cleaning_fee_cents,
        total_cents,
        extras: lines,
    })
}

pub fn check_availability(
    conn: &Connection,
    property_id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<(), BookingError> {
    let existing = queries::get_bookings_in_range(conn, property_id, &check_in, &check_out)?;
    let conflict = existing
        .iter()
        .any(|b| stays_overlap(b.check_in, b.check_out, check_in, check_out));
    if conflict {
        return Err(BookingError::Unavailable);
    }
    Ok(())
}

/// Validates, prices and stores a booking request as `pending`. The
/// availability check and the insert share one transaction.
pub fn create_booking(conn: &Connection, request: &NewBooking) -> Result<Booking, BookingError> {
    if request.guest_name.trim().is_empty() {
        return Err(BookingError::MissingField("guest name is required"));
    }
    if !request.guest_email.contains('@') {
        return Err(BookingError::MissingField("a valid guest email is required"));
    }

    let tx = conn.unchecked_transaction()?;

    let property = queries::get_property(&tx, &request.stay.property_id)?
        .ok_or(BookingError::UnknownProperty)?;
    let quote = quote(&tx, &property, &request.stay)?;
    check_availability(&tx, &property.id, request.stay.check_in, request.stay.check_out)?;

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        property_id: property.id.clone(),
        guest_name: request.guest_name.trim().to_string(),
        guest_email: request.guest_email.trim().to_string(),
        guest_phone: request.guest_phone.clone().filter(|p| !p.trim().is_empty()),
        check_in: request.stay.check_in,
        check_out: request.stay.check_out,
        guests: request.stay.guests,
        status: BookingStatus::Pending,
        total_price_cents: quote.total_cents,
        notes: request.notes.clone(),
        created_at: now,
        updated_at: now,
    };
    let extras: Vec<BookingExtra> = quote
        .extras
        .iter()
        .map(|line| BookingExtra {
            booking_id: booking.id.clone(),
            extra_id: line.extra_id.clone(),
            quantity: line.quantity,
            unit_price_cents: line.unit_price_cents,
        })
        .collect();

    queries::create_booking(&tx, &booking, &extras)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        property_id = %booking.property_id,
        nights = quote.nights,
        total_cents = booking.total_price_cents,
        "booking request stored"
    );
    Ok(booking)
}

/// Nights in `[from, to]` already taken by a non-cancelled booking.
pub fn unavailable_dates(
    conn: &Connection,
    property_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<NaiveDate>, BookingError> {
    let window_end = to.succ_opt().ok_or(BookingError::DateOutOfRange)?;
    let bookings = queries::get_bookings_in_range(conn, property_id, &from, &window_end)?;

    let mut taken = BTreeSet::new();
    for booking in &bookings {
        let Some(last_night) = booking.check_out.pred_opt() else {
            continue;
        };
        for date in get_dates_in_range(booking.check_in, last_night) {
            if date >= from && date <= to {
                taken.insert(date);
            }
        }
    }
    Ok(taken.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Extra, PriceUnit};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup() -> (Connection, Property) {
        let conn = db::init_db(":memory:").unwrap();
        let now = Utc::now().naive_utc();
        let property = Property {
            id: "villa".to_string(),
            slug: "villa".to_string(),
            name: "Villa Sol".to_string(),
            description: String::new(),
            location: String::new(),
            max_guests: 4,
            bedrooms: 2,
            bathrooms: 2,
            nightly_rate_cents: 10_000,
            cleaning_fee_cents: 3_000,
            min_nights: 2,
            created_at: now,
            updated_at: now,
        };
        queries::create_property(&conn, &property).unwrap();

        for (id, unit, active) in [
            ("breakfast", PriceUnit::PerGuest, true),
            ("transfer", PriceUnit::PerStay, true),
            ("boat", PriceUnit::PerStay, false),
        ] {
            queries::create_extra(
                &conn,
                &Extra {
                    id: id.to_string(),
                    name: id.to_string(),
                    description: String::new(),
                    price_cents: 1_000,
                    price_unit: unit,
                    active,
                    created_at: now,
                    updated_at: now,
                },
            )
            .unwrap();
        }
        (conn, property)
    }

    fn request(check_in: &str, check_out: &str, extras: Vec<ExtraSelection>) -> NewBooking {
        NewBooking {
            stay: StayRequest {
                property_id: "villa".to_string(),
                check_in: d(check_in),
                check_out: d(check_out),
                guests: 2,
                extras,
            },
            guest_name: "Ana".to_string(),
            guest_email: "ana@example.com".to_string(),
            guest_phone: None,
            notes: None,
        }
    }

    fn select(id: &str, quantity: i64) -> ExtraSelection {
        ExtraSelection {
            extra_id: id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_quote_totals() {
        let (conn, property) = setup();
        let req = request("2024-07-01", "2024-07-04", vec![select("breakfast", 1), select("transfer", 2)]);
        let q = quote(&conn, &property, &req.stay).unwrap();

        assert_eq!(q.nights, 3);
        assert_eq!(q.accommodation_cents, 30_000);
        // breakfast 1000 x 2 guests, transfer 1000 x 2
        assert_eq!(q.total_cents, 30_000 + 3_000 + 2_000 + 2_000);
    }

    #[test]
    fn test_quote_rejects_bad_input() {
        let (conn, property) = setup();

        let reversed = request("2024-07-04", "2024-07-01", vec![]);
        assert!(matches!(quote(&conn, &property, &reversed.stay), Err(BookingError::InvalidDates)));

        let short = request("2024-07-01", "2024-07-02", vec![]);
        assert!(matches!(
            quote(&conn, &property, &short.stay),
            Err(BookingError::TooShort { min: 2 })
        ));

        let mut crowded = request("2024-07-01", "2024-07-04", vec![]);
        crowded.stay.guests = 9;
        assert!(matches!(
            quote(&conn, &property, &crowded.stay),
            Err(BookingError::TooManyGuests { max: 4 })
        ));

        let inactive = request("2024-07-01", "2024-07-04", vec![select("boat", 1)]);
        assert!(matches!(
            quote(&conn, &property, &inactive.stay),
            Err(BookingError::UnknownExtra(_))
        ));
    }

    #[test]
    fn test_huge_quantity_is_rejected_not_wrapped() {
        let (conn, property) = setup();
        let req = request(
            "2024-07-01",
            "2024-07-04",
            vec![select("transfer", 18_446_744_073_709_552)],
        );
        assert!(matches!(
            quote(&conn, &property, &req.stay),
            Err(BookingError::PriceOverflow)
        ));
        assert!(matches!(create_booking(&conn, &req), Err(BookingError::PriceOverflow)));
        assert!(queries::list_bookings(&conn, None, 10).unwrap().is_empty());

        let err: AppError = BookingError::PriceOverflow.into();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_create_booking_stores_pending_with_extras() {
        let (conn, _) = setup();
        let booking = create_booking(&conn, &request("2024-07-01", "2024-07-04", vec![select("transfer", 1)]))
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        let stored = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.check_in, booking.check_in);
        assert_eq!(stored.check_out, booking.check_out);
        assert_eq!(stored.guest_email, "ana@example.com");
        assert_eq!(stored.total_price_cents, 30_000 + 3_000 + 1_000);

        let extras = queries::get_booking_extras(&conn, &booking.id).unwrap();
        assert_eq!(extras.len(), 1);
        assert_eq!(extras[0].unit_price_cents, 1_000);
    }

    #[test]
    fn test_overlapping_request_is_rejected() {
        let (conn, _) = setup();
        create_booking(&conn, &request("2024-07-01", "2024-07-05", vec![])).unwrap();

        let clash = create_booking(&conn, &request("2024-07-03", "2024-07-06", vec![]));
        assert!(matches!(clash, Err(BookingError::Unavailable)));

        // Arriving on the previous guest's departure day is fine
        create_booking(&conn, &request("2024-07-05", "2024-07-07", vec![])).unwrap();
    }

    #[test]
    fn test_cancelled_booking_frees_dates() {
        let (conn, _) = setup();
        let first = create_booking(&conn, &request("2024-07-01", "2024-07-05", vec![])).unwrap();
        queries::update_booking_status(&conn, &first.id, BookingStatus::Cancelled).unwrap();

        create_booking(&conn, &request("2024-07-02", "2024-07-04", vec![])).unwrap();
    }

    #[test]
    fn test_unavailable_dates_lists_booked_nights() {
        let (conn, _) = setup();
        create_booking(&conn, &request("2024-07-01", "2024-07-04", vec![])).unwrap();

        let taken = unavailable_dates(&conn, "villa", d("2024-06-30"), d("2024-07-10")).unwrap();
        assert_eq!(taken, vec![d("2024-07-01"), d("2024-07-02"), d("2024-07-03")]);

        let clipped = unavailable_dates(&conn, "villa", d("2024-07-02"), d("2024-07-02")).unwrap();
        assert_eq!(clipped, vec![d("2024-07-02")]);
    }

    #[test]
    fn test_unavailable_dates_at_calendar_end() {
        let (conn, _) = setup();
        assert!(matches!(
            unavailable_dates(&conn, "villa", d("2024-07-01"), NaiveDate::MAX),
            Err(BookingError::DateOutOfRange)
        ));
    }
}
