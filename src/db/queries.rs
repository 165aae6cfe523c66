use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    Booking, BookingExtra, BookingStatus, Channel, Direction, Extra, Message, MessageStatus,
    MessageTemplate, PriceUnit, Property, PropertyPhoto, TemplateType, DATE_FORMAT,
    TIMESTAMP_FORMAT,
};

fn now_string() -> String {
    Utc::now().naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| anyhow::anyhow!("invalid stored date {s:?}: {e}"))
}

// ── Properties ──

const PROPERTY_COLUMNS: &str = "id, slug, name, description, location, max_guests, bedrooms, bathrooms, \
     nightly_rate_cents, cleaning_fee_cents, min_nights, created_at, updated_at";

pub fn create_property(conn: &Connection, property: &Property) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO properties (id, slug, name, description, location, max_guests, bedrooms, bathrooms,
                                 nightly_rate_cents, cleaning_fee_cents, min_nights, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            property.id,
            property.slug,
            property.name,
            property.description,
            property.location,
            property.max_guests,
            property.bedrooms,
            property.bathrooms,
            property.nightly_rate_cents,
            property.cleaning_fee_cents,
            property.min_nights,
            format_ts(&property.created_at),
            format_ts(&property.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_property(conn: &Connection, id: &str) -> anyhow::Result<Option<Property>> {
    let property = conn
        .query_row(
            &format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ?1"),
            params![id],
            parse_property_row,
        )
        .optional()?;
    Ok(property)
}

pub fn get_property_by_slug(conn: &Connection, slug: &str) -> anyhow::Result<Option<Property>> {
    let property = conn
        .query_row(
            &format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE slug = ?1"),
            params![slug],
            parse_property_row,
        )
        .optional()?;
    Ok(property)
}

pub fn list_properties(conn: &Connection) -> anyhow::Result<Vec<Property>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {PROPERTY_COLUMNS} FROM properties ORDER BY name ASC"))?;
    let rows = stmt.query_map([], parse_property_row)?;

    let mut properties = vec![];
    for row in rows {
        properties.push(row?);
    }
    Ok(properties)
}

pub fn update_property(conn: &Connection, property: &Property) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE properties SET
           slug = ?2, name = ?3, description = ?4, location = ?5, max_guests = ?6,
           bedrooms = ?7, bathrooms = ?8, nightly_rate_cents = ?9, cleaning_fee_cents = ?10,
           min_nights = ?11, updated_at = ?12
         WHERE id = ?1",
        params![
            property.id,
            property.slug,
            property.name,
            property.description,
            property.location,
            property.max_guests,
            property.bedrooms,
            property.bathrooms,
            property.nightly_rate_cents,
            property.cleaning_fee_cents,
            property.min_nights,
            now_string(),
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_property(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM properties WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

fn parse_property_row(row: &rusqlite::Row) -> rusqlite::Result<Property> {
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;
    Ok(Property {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        max_guests: row.get(5)?,
        bedrooms: row.get(6)?,
        bathrooms: row.get(7)?,
        nightly_rate_cents: row.get(8)?,
        cleaning_fee_cents: row.get(9)?,
        min_nights: row.get(10)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Property Photos ──

pub fn add_photo(conn: &Connection, photo: &PropertyPhoto) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO property_photos (id, property_id, url, caption, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            photo.id,
            photo.property_id,
            photo.url,
            photo.caption,
            photo.position
        ],
    )?;
    Ok(())
}

pub fn next_photo_position(conn: &Connection, property_id: &str) -> anyhow::Result<i64> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM property_photos WHERE property_id = ?1",
        params![property_id],
        |row| row.get(0),
    )?;
    Ok(next)
}

pub fn list_photos(conn: &Connection, property_id: &str) -> anyhow::Result<Vec<PropertyPhoto>> {
    let mut stmt = conn.prepare(
        "SELECT id, property_id, url, caption, position FROM property_photos
         WHERE property_id = ?1 ORDER BY position ASC, id ASC",
    )?;
    let rows = stmt.query_map(params![property_id], |row| {
        Ok(PropertyPhoto {
            id: row.get(0)?,
            property_id: row.get(1)?,
            url: row.get(2)?,
            caption: row.get(3)?,
            position: row.get(4)?,
        })
    })?;

    let mut photos = vec![];
    for row in rows {
        photos.push(row?);
    }
    Ok(photos)
}

pub fn delete_photo(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM property_photos WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

/// Rewrites photo positions to follow `ordered_ids`. The list must name
/// exactly the property's photos; otherwise nothing is changed.
pub fn reorder_photos(
    conn: &Connection,
    property_id: &str,
    ordered_ids: &[String],
) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;

    let existing: i64 = tx.query_row(
        "SELECT COUNT(*) FROM property_photos WHERE property_id = ?1",
        params![property_id],
        |row| row.get(0),
    )?;
    if existing != ordered_ids.len() as i64 {
        anyhow::bail!(
            "expected {existing} photo ids, got {}",
            ordered_ids.len()
        );
    }

    for (position, id) in ordered_ids.iter().enumerate() {
        let count = tx.execute(
            "UPDATE property_photos SET position = ?1 WHERE id = ?2 AND property_id = ?3",
            params![position as i64, id, property_id],
        )?;
        if count == 0 {
            anyhow::bail!("photo {id} does not belong to property {property_id}");
        }
    }

    tx.commit()?;
    Ok(())
}

// ── Extras ──

const EXTRA_COLUMNS: &str =
    "id, name, description, price_cents, price_unit, active, created_at, updated_at";

pub fn create_extra(conn: &Connection, extra: &Extra) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO extras (id, name, description, price_cents, price_unit, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            extra.id,
            extra.name,
            extra.description,
            extra.price_cents,
            extra.price_unit.as_str(),
            extra.active as i32,
            format_ts(&extra.created_at),
            format_ts(&extra.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_extra(conn: &Connection, id: &str) -> anyhow::Result<Option<Extra>> {
    let extra = conn
        .query_row(
            &format!("SELECT {EXTRA_COLUMNS} FROM extras WHERE id = ?1"),
            params![id],
            parse_extra_row,
        )
        .optional()?;
    Ok(extra)
}

pub fn list_extras(conn: &Connection, include_inactive: bool) -> anyhow::Result<Vec<Extra>> {
    let sql = if include_inactive {
        format!("SELECT {EXTRA_COLUMNS} FROM extras ORDER BY name ASC")
    } else {
        format!("SELECT {EXTRA_COLUMNS} FROM extras WHERE active = 1 ORDER BY name ASC")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], parse_extra_row)?;

    let mut extras = vec![];
    for row in rows {
        extras.push(row?);
    }
    Ok(extras)
}

pub fn update_extra(conn: &Connection, extra: &Extra) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE extras SET name = ?2, description = ?3, price_cents = ?4, price_unit = ?5,
                           active = ?6, updated_at = ?7
         WHERE id = ?1",
        params![
            extra.id,
            extra.name,
            extra.description,
            extra.price_cents,
            extra.price_unit.as_str(),
            extra.active as i32,
            now_string(),
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_extra(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM extras WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn extra_in_use(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM booking_extras WHERE extra_id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn parse_extra_row(row: &rusqlite::Row) -> rusqlite::Result<Extra> {
    let price_unit: String = row.get(4)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(Extra {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price_cents: row.get(3)?,
        price_unit: PriceUnit::parse(&price_unit),
        active: row.get::<_, i32>(5)? != 0,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, property_id, guest_name, guest_email, guest_phone, check_in, check_out, \
     guests, status, total_price_cents, notes, created_at, updated_at";

pub fn create_booking(
    conn: &Connection,
    booking: &Booking,
    extras: &[BookingExtra],
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, property_id, guest_name, guest_email, guest_phone, check_in, check_out,
                               guests, status, total_price_cents, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            booking.id,
            booking.property_id,
            booking.guest_name,
            booking.guest_email,
            booking.guest_phone,
            format_date(&booking.check_in),
            format_date(&booking.check_out),
            booking.guests,
            booking.status.as_str(),
            booking.total_price_cents,
            booking.notes,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;

    for extra in extras {
        conn.execute(
            "INSERT INTO booking_extras (booking_id, extra_id, quantity, unit_price_cents)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                extra.booking_id,
                extra.extra_id,
                extra.quantity,
                extra.unit_price_cents
            ],
        )?;
    }
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    match result {
        Some(booking) => Ok(Some(booking?)),
        None => Ok(None),
    }
}

pub fn list_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY check_in DESC LIMIT ?2"
    ))?;
    let status = status_filter.map(|s| s.as_str());
    let rows = stmt.query_map(params![status, limit], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Non-cancelled bookings of a property occupying at least one night in
/// `[from, to)`.
pub fn get_bookings_in_range(
    conn: &Connection,
    property_id: &str,
    from: &NaiveDate,
    to: &NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE property_id = ?1 AND check_in < ?3 AND check_out > ?2 AND status != 'cancelled'
         ORDER BY check_in ASC"
    ))?;
    let rows = stmt.query_map(
        params![property_id, format_date(from), format_date(to)],
        |row| Ok(parse_booking_row(row)),
    )?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_calendar_bookings(
    conn: &Connection,
    property_id: Option<&str>,
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE status != 'cancelled' AND (?1 IS NULL OR property_id = ?1)
         ORDER BY check_in ASC"
    ))?;
    let rows = stmt.query_map(params![property_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_string(), id],
    )?;
    Ok(count > 0)
}

pub fn get_booking_extras(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<BookingExtra>> {
    let mut stmt = conn.prepare(
        "SELECT booking_id, extra_id, quantity, unit_price_cents
         FROM booking_extras WHERE booking_id = ?1",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        Ok(BookingExtra {
            booking_id: row.get(0)?,
            extra_id: row.get(1)?,
            quantity: row.get(2)?,
            unit_price_cents: row.get(3)?,
        })
    })?;

    let mut extras = vec![];
    for row in rows {
        extras.push(row?);
    }
    Ok(extras)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let check_in: String = row.get(5)?;
    let check_out: String = row.get(6)?;
    let status: String = row.get(8)?;
    let created_at: String = row.get(11)?;
    let updated_at: String = row.get(12)?;

    Ok(Booking {
        id: row.get(0)?,
        property_id: row.get(1)?,
        guest_name: row.get(2)?,
        guest_email: row.get(3)?,
        guest_phone: row.get(4)?,
        check_in: parse_date(&check_in)?,
        check_out: parse_date(&check_out)?,
        guests: row.get(7)?,
        status: BookingStatus::parse(&status),
        total_price_cents: row.get(9)?,
        notes: row.get(10)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Messages ──

const MESSAGE_COLUMNS: &str = "id, user_id, admin_id, channel, phone_number, content, direction, status, \
     external_id, media_url, created_at, updated_at";

pub fn insert_message(conn: &Connection, message: &Message) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO messages (id, user_id, admin_id, channel, phone_number, content, direction, status,
                               external_id, media_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            message.id,
            message.user_id,
            message.admin_id,
            message.channel.as_str(),
            message.phone_number,
            message.content,
            message.direction.as_str(),
            message.status.as_str(),
            message.external_id,
            message.media_url,
            format_ts(&message.created_at),
            format_ts(&message.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_message(conn: &Connection, id: &str) -> anyhow::Result<Option<Message>> {
    let result = conn
        .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
            params![id],
            |row| Ok(parse_message_row(row)),
        )
        .optional()?;

    match result {
        Some(message) => Ok(Some(message?)),
        None => Ok(None),
    }
}

pub fn get_message_by_external_id(
    conn: &Connection,
    external_id: &str,
) -> anyhow::Result<Option<Message>> {
    let result = conn
        .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE external_id = ?1"),
            params![external_id],
            |row| Ok(parse_message_row(row)),
        )
        .optional()?;

    match result {
        Some(message) => Ok(Some(message?)),
        None => Ok(None),
    }
}

/// Sets the delivery status of the message the provider knows as
/// `external_id` if it moves the message forward. Returns the row as it
/// stands afterwards, or `None` if no message matches.
pub fn update_message_status(
    conn: &Connection,
    external_id: &str,
    status: MessageStatus,
) -> anyhow::Result<Option<Message>> {
    let Some(current) = get_message_by_external_id(conn, external_id)? else {
        return Ok(None);
    };
    if !current.status.can_advance_to(status) {
        return Ok(Some(current));
    }

    conn.execute(
        "UPDATE messages SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now_string(), current.id],
    )?;
    get_message(conn, &current.id)
}

pub fn list_messages(
    conn: &Connection,
    phone: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE (?1 IS NULL OR phone_number = ?1)
         ORDER BY created_at DESC, rowid DESC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![phone, limit], |row| Ok(parse_message_row(row)))?;

    let mut messages = vec![];
    for row in rows {
        messages.push(row??);
    }
    Ok(messages)
}

pub fn get_messages_since(conn: &Connection, since: &NaiveDateTime) -> anyhow::Result<Vec<Message>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE updated_at > ?1
         ORDER BY updated_at ASC, rowid ASC"
    ))?;
    let rows = stmt.query_map(params![format_ts(since)], |row| Ok(parse_message_row(row)))?;

    let mut messages = vec![];
    for row in rows {
        messages.push(row??);
    }
    Ok(messages)
}

fn parse_message_row(row: &rusqlite::Row) -> anyhow::Result<Message> {
    let channel: String = row.get(3)?;
    let direction: String = row.get(6)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Message {
        id: row.get(0)?,
        user_id: row.get(1)?,
        admin_id: row.get(2)?,
        channel: Channel::parse(&channel)
            .ok_or_else(|| anyhow::anyhow!("unknown message channel: {channel}"))?,
        phone_number: row.get(4)?,
        content: row.get(5)?,
        direction: Direction::parse(&direction)
            .ok_or_else(|| anyhow::anyhow!("unknown message direction: {direction}"))?,
        status: MessageStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("unknown message status: {status}"))?,
        external_id: row.get(8)?,
        media_url: row.get(9)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

// ── Message Templates ──

const TEMPLATE_COLUMNS: &str =
    "id, user_id, name, content, type, description, variables, created_at, updated_at";

pub fn insert_template(conn: &Connection, template: &MessageTemplate) -> anyhow::Result<()> {
    let variables = serde_json::to_string(&template.variables)?;
    conn.execute(
        "INSERT INTO message_templates (id, user_id, name, content, type, description, variables, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            template.id,
            template.user_id,
            template.name,
            template.content,
            template.template_type.as_str(),
            template.description,
            variables,
            format_ts(&template.created_at),
            format_ts(&template.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_template(conn: &Connection, id: &str) -> anyhow::Result<Option<MessageTemplate>> {
    let result = conn
        .query_row(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM message_templates WHERE id = ?1"),
            params![id],
            |row| Ok(parse_template_row(row)),
        )
        .optional()?;

    match result {
        Some(template) => Ok(Some(template?)),
        None => Ok(None),
    }
}

pub fn list_templates(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<MessageTemplate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TEMPLATE_COLUMNS} FROM message_templates WHERE user_id = ?1 ORDER BY name ASC"
    ))?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_template_row(row)))?;

    let mut templates = vec![];
    for row in rows {
        templates.push(row??);
    }
    Ok(templates)
}

pub fn has_template_of_type(
    conn: &Connection,
    user_id: &str,
    template_type: TemplateType,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM message_templates WHERE user_id = ?1 AND type = ?2",
        params![user_id, template_type.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn parse_template_row(row: &rusqlite::Row) -> anyhow::Result<MessageTemplate> {
    let template_type: String = row.get(4)?;
    let variables: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(MessageTemplate {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        content: row.get(3)?,
        template_type: TemplateType::parse(&template_type)
            .ok_or_else(|| anyhow::anyhow!("unknown template type: {template_type}"))?,
        description: row.get(5)?,
        variables: serde_json::from_str(&variables).unwrap_or_default(),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn sample_property(conn: &Connection, slug: &str) -> Property {
        let now = Utc::now().naive_utc();
        let property = Property {
            id: format!("prop-{slug}"),
            slug: slug.to_string(),
            name: "Casa Azul".to_string(),
            description: "Sea view".to_string(),
            location: "Lagos".to_string(),
            max_guests: 4,
            bedrooms: 2,
            bathrooms: 1,
            nightly_rate_cents: 12_000,
            cleaning_fee_cents: 5_000,
            min_nights: 2,
            created_at: now,
            updated_at: now,
        };
        create_property(conn, &property).unwrap();
        property
    }

    fn sample_booking(property_id: &str, id: &str, check_in: &str, check_out: &str) -> Booking {
        let now = Utc::now().naive_utc();
        Booking {
            id: id.to_string(),
            property_id: property_id.to_string(),
            guest_name: "Ana".to_string(),
            guest_email: "ana@example.com".to_string(),
            guest_phone: None,
            check_in: date(check_in),
            check_out: date(check_out),
            guests: 2,
            status: BookingStatus::Confirmed,
            total_price_cents: 0,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_property_create_fetch_delete() {
        let conn = setup_db();
        let property = sample_property(&conn, "casa-azul");

        let fetched = get_property_by_slug(&conn, "casa-azul").unwrap().unwrap();
        assert_eq!(fetched.name, property.name);
        assert_eq!(fetched.nightly_rate_cents, 12_000);

        assert!(delete_property(&conn, &property.id).unwrap());
        assert!(get_property(&conn, &property.id).unwrap().is_none());
    }

    #[test]
    fn test_photos_are_ordered_and_reorderable() {
        let conn = setup_db();
        let property = sample_property(&conn, "casa");

        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            add_photo(
                &conn,
                &PropertyPhoto {
                    id: id.to_string(),
                    property_id: property.id.clone(),
                    url: format!("https://img.example.com/{id}.jpg"),
                    caption: None,
                    position: i as i64,
                },
            )
            .unwrap();
        }
        assert_eq!(next_photo_position(&conn, &property.id).unwrap(), 3);

        reorder_photos(
            &conn,
            &property.id,
            &["c".to_string(), "a".to_string(), "b".to_string()],
        )
        .unwrap();
        let ids: Vec<String> = list_photos(&conn, &property.id)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        // Incomplete list is rejected and leaves the order alone
        assert!(reorder_photos(&conn, &property.id, &["b".to_string()]).is_err());
        assert_eq!(list_photos(&conn, &property.id).unwrap()[0].id, "c");
    }

    #[test]
    fn test_deleting_property_removes_photos() {
        let conn = setup_db();
        let property = sample_property(&conn, "casa");
        add_photo(
            &conn,
            &PropertyPhoto {
                id: "p1".to_string(),
                property_id: property.id.clone(),
                url: "https://img.example.com/1.jpg".to_string(),
                caption: Some("Pool".to_string()),
                position: 0,
            },
        )
        .unwrap();

        delete_property(&conn, &property.id).unwrap();
        assert!(list_photos(&conn, &property.id).unwrap().is_empty());
    }

    #[test]
    fn test_photo_delete_then_fetch() {
        let conn = setup_db();
        let property = sample_property(&conn, "casa");
        add_photo(
            &conn,
            &PropertyPhoto {
                id: "p1".to_string(),
                property_id: property.id.clone(),
                url: "https://img.example.com/1.jpg".to_string(),
                caption: None,
                position: 0,
            },
        )
        .unwrap();

        assert!(delete_photo(&conn, "p1").unwrap());
        assert!(list_photos(&conn, &property.id).unwrap().is_empty());
        assert!(!delete_photo(&conn, "p1").unwrap());
        assert!(get_property(&conn, &property.id).unwrap().is_some());
    }

    #[test]
    fn test_bookings_in_range_excludes_cancelled_and_touching() {
        let conn = setup_db();
        let property = sample_property(&conn, "casa");

        create_booking(&conn, &sample_booking(&property.id, "b1", "2024-07-01", "2024-07-05"), &[])
            .unwrap();
        let mut cancelled = sample_booking(&property.id, "b2", "2024-07-10", "2024-07-12");
        cancelled.status = BookingStatus::Cancelled;
        create_booking(&conn, &cancelled, &[]).unwrap();

        let found =
            get_bookings_in_range(&conn, &property.id, &date("2024-07-04"), &date("2024-07-11"))
                .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "b1");

        // Checking in on the day b1 checks out is free
        let found =
            get_bookings_in_range(&conn, &property.id, &date("2024-07-05"), &date("2024-07-08"))
                .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_booking_status_update_and_filter() {
        let conn = setup_db();
        let property = sample_property(&conn, "casa");
        let mut booking = sample_booking(&property.id, "b1", "2024-07-01", "2024-07-05");
        booking.status = BookingStatus::Pending;
        create_booking(&conn, &booking, &[]).unwrap();

        assert!(update_booking_status(&conn, "b1", BookingStatus::Confirmed).unwrap());
        assert!(!update_booking_status(&conn, "missing", BookingStatus::Confirmed).unwrap());

        let confirmed = list_bookings(&conn, Some(BookingStatus::Confirmed), 10).unwrap();
        assert_eq!(confirmed.len(), 1);
        assert!(list_bookings(&conn, Some(BookingStatus::Pending), 10)
            .unwrap()
            .is_empty());
        assert_eq!(list_bookings(&conn, None, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_extras_crud_and_visibility() {
        let conn = setup_db();
        let now = Utc::now().naive_utc();
        let mut extra = Extra {
            id: "e1".to_string(),
            name: "Airport transfer".to_string(),
            description: "One way".to_string(),
            price_cents: 4_000,
            price_unit: PriceUnit::PerStay,
            active: true,
            created_at: now,
            updated_at: now,
        };
        create_extra(&conn, &extra).unwrap();

        let fetched = get_extra(&conn, "e1").unwrap().unwrap();
        assert_eq!(fetched.name, extra.name);
        assert_eq!(fetched.price_cents, 4_000);
        assert!(fetched.active);

        extra.active = false;
        assert!(update_extra(&conn, &extra).unwrap());
        assert!(list_extras(&conn, false).unwrap().is_empty());
        assert_eq!(list_extras(&conn, true).unwrap().len(), 1);

        assert!(delete_extra(&conn, "e1").unwrap());
        assert!(get_extra(&conn, "e1").unwrap().is_none());
    }

    #[test]
    fn test_message_status_update_by_external_id() {
        let conn = setup_db();
        let now = Utc::now().naive_utc();
        let message = Message {
            id: "m1".to_string(),
            user_id: "admin".to_string(),
            admin_id: Some("admin".to_string()),
            channel: Channel::Sms,
            phone_number: "+15550001111".to_string(),
            content: "Hello".to_string(),
            direction: Direction::Outbound,
            status: MessageStatus::Sent,
            external_id: Some("SM123".to_string()),
            media_url: None,
            created_at: now,
            updated_at: now,
        };
        insert_message(&conn, &message).unwrap();

        let updated = update_message_status(&conn, "SM123", MessageStatus::Delivered)
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, "m1");
        assert_eq!(updated.status, MessageStatus::Delivered);

        // A late `sent` callback does not move the message back
        let stale = update_message_status(&conn, "SM123", MessageStatus::Sent)
            .unwrap()
            .unwrap();
        assert_eq!(stale.status, MessageStatus::Delivered);
        assert_eq!(
            get_message(&conn, "m1").unwrap().unwrap().status,
            MessageStatus::Delivered
        );

        let failed = update_message_status(&conn, "SM123", MessageStatus::Failed)
            .unwrap()
            .unwrap();
        assert_eq!(failed.status, MessageStatus::Failed);

        assert!(update_message_status(&conn, "SM999", MessageStatus::Read)
            .unwrap()
            .is_none());

        let listed = list_messages(&conn, Some("+15550001111"), 10).unwrap();
        assert_eq!(listed.len(), 1);
        assert!(list_messages(&conn, Some("+15550002222"), 10).unwrap().is_empty());
    }
}
