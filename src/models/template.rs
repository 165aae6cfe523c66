use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub template_type: TemplateType,
    pub description: Option<String>,
    pub variables: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    BookingConfirmation,
    CheckInInstructions,
    CheckOutReminder,
    PaymentReminder,
    ReviewRequest,
    Welcome,
    Custom,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::BookingConfirmation => "booking_confirmation",
            TemplateType::CheckInInstructions => "check_in_instructions",
            TemplateType::CheckOutReminder => "check_out_reminder",
            TemplateType::PaymentReminder => "payment_reminder",
            TemplateType::ReviewRequest => "review_request",
            TemplateType::Welcome => "welcome",
            TemplateType::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "booking_confirmation" => Some(TemplateType::BookingConfirmation),
            "check_in_instructions" => Some(TemplateType::CheckInInstructions),
            "check_out_reminder" => Some(TemplateType::CheckOutReminder),
            "payment_reminder" => Some(TemplateType::PaymentReminder),
            "review_request" => Some(TemplateType::ReviewRequest),
            "welcome" => Some(TemplateType::Welcome),
            "custom" => Some(TemplateType::Custom),
            _ => None,
        }
    }
}

impl MessageTemplate {
    pub fn render(&self, values: &HashMap<String, String>) -> anyhow::Result<String> {
        render_placeholders(&self.content, values)
    }
}

/// Names of the `{{variable}}` placeholders in `content`, deduplicated and
/// sorted.
pub fn placeholder_names(content: &str) -> Vec<String> {
    let mut names = BTreeSet::new();
    let mut rest = content;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        let name = after[..end].trim();
        if !name.is_empty() {
            names.insert(name.to_string());
        }
        rest = &after[end + 2..];
    }
    names.into_iter().collect()
}

/// Substitutes every `{{ name }}` in `content`. Fails listing the names
/// that have no value, rather than sending a half-filled message.
pub fn render_placeholders(
    content: &str,
    values: &HashMap<String, String>,
) -> anyhow::Result<String> {
    let missing: Vec<String> = placeholder_names(content)
        .into_iter()
        .filter(|name| !values.contains_key(name))
        .collect();
    if !missing.is_empty() {
        anyhow::bail!("missing template variables: {}", missing.join(", "));
    }

    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else { break };
        out.push_str(&rest[..start]);
        let name = after[..end].trim();
        match values.get(name) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}
