use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::models::{Booking, Property};

const MAX_LINE_OCTETS: usize = 75;

/// Renders non-cancelled bookings as an iCalendar feed of all-day events.
/// `DTEND` is the check-out date, which iCalendar treats as exclusive.
pub fn generate_feed(
    calendar_name: &str,
    bookings: &[Booking],
    properties: &HashMap<String, Property>,
    generated_at: &NaiveDateTime,
) -> String {
    let dtstamp = generated_at.format("%Y%m%dT%H%M%SZ").to_string();

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//Staybook//Bookings//EN".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
        format!("X-WR-CALNAME:{}", escape_text(calendar_name)),
    ];

    for booking in bookings {
        let property_name = properties
            .get(&booking.property_id)
            .map(|p| p.name.as_str())
            .unwrap_or("Property");

        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("UID:{}@staybook", booking.id));
        lines.push(format!("DTSTAMP:{dtstamp}"));
        lines.push(format!(
            "DTSTART;VALUE=DATE:{}",
            booking.check_in.format("%Y%m%d")
        ));
        lines.push(format!(
            "DTEND;VALUE=DATE:{}",
            booking.check_out.format("%Y%m%d")
        ));
        lines.push(format!("SUMMARY:{}", escape_text(&booking.guest_name)));
        lines.push(format!(
            "DESCRIPTION:{}",
            escape_text(&format!(
                "{property_name}\n{} guest(s)\nStatus: {}",
                booking.guests,
                booking.status.as_str()
            ))
        ));
        lines.push(format!("LOCATION:{}", escape_text(property_name)));
        lines.push(format!(
            "STATUS:{}",
            match booking.status {
                crate::models::BookingStatus::Confirmed => "CONFIRMED",
                _ => "TENTATIVE",
            }
        ));
        lines.push("END:VEVENT".to_string());
    }

    lines.push("END:VCALENDAR".to_string());

    let mut out = String::new();
    for line in lines {
        out.push_str(&fold_line(&line));
        out.push_str("\r\n");
    }
    out
}

/// Escapes a TEXT property value (RFC 5545 §3.3.11).
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Folds a content line at 75 octets without splitting a UTF-8 sequence.
fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut width = 0;
    for c in line.chars() {
        let len = c.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            // The leading space counts towards the continuation line
            width = 1;
        }
        out.push(c);
        width += len;
    }
    out
}
