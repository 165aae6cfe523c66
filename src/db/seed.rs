use chrono::Utc;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::template::placeholder_names;
use crate::models::{MessageTemplate, TemplateType};

const DEFAULT_TEMPLATES: &[(TemplateType, &str, &str, &str)] = &[
    (
        TemplateType::BookingConfirmation,
        "Booking confirmation",
        "Sent once a booking request is confirmed",
        "Hi {{guestName}}, your stay at {{propertyName}} from {{checkIn}} to {{checkOut}} is confirmed. Total: {{totalPrice}}. We look forward to hosting you!",
    ),
    (
        TemplateType::CheckInInstructions,
        "Check-in instructions",
        "Sent the day before arrival",
        "Hi {{guestName}}, welcome to {{propertyName}}! Check-in is from {{checkInTime}} on {{checkIn}}. Door code: {{doorCode}}. Wi-Fi: {{wifiPassword}}.",
    ),
    (
        TemplateType::CheckOutReminder,
        "Check-out reminder",
        "Sent the evening before departure",
        "Hi {{guestName}}, a reminder that check-out is by {{checkOutTime}} on {{checkOut}}. Please leave the keys on the kitchen table. Safe travels!",
    ),
    (
        TemplateType::PaymentReminder,
        "Payment reminder",
        "Sent when a balance is outstanding",
        "Hi {{guestName}}, the remaining balance of {{amountDue}} for your stay at {{propertyName}} is due on {{dueDate}}.",
    ),
    (
        TemplateType::ReviewRequest,
        "Review request",
        "Sent after check-out",
        "Hi {{guestName}}, thank you for staying at {{propertyName}}! We'd love to hear about your stay: {{reviewLink}}",
    ),
    (
        TemplateType::Welcome,
        "Welcome",
        "First reply to a new enquiry",
        "Hello {{guestName}}, thanks for getting in touch about {{propertyName}}. How can we help?",
    ),
];

/// Inserts the default templates `user_id` does not have yet. Returns how
/// many were added.
pub fn seed_templates(conn: &Connection, user_id: &str) -> anyhow::Result<usize> {
    let now = Utc::now().naive_utc();
    let mut inserted = 0;

    for (template_type, name, description, content) in DEFAULT_TEMPLATES {
        if queries::has_template_of_type(conn, user_id, *template_type)? {
            continue;
        }

        let template = MessageTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            content: content.to_string(),
            template_type: *template_type,
            description: Some(description.to_string()),
            variables: placeholder_names(content),
            created_at: now,
            updated_at: now,
        };
        queries::insert_template(conn, &template)?;
        inserted += 1;
    }

    if inserted > 0 {
        tracing::info!(user_id, inserted, "seeded message templates");
    }
    Ok(inserted)
}
