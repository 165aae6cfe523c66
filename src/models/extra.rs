use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Extra {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub price_unit: PriceUnit,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    #[default]
    PerStay,
    PerNight,
    PerGuest,
}

impl PriceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceUnit::PerStay => "per_stay",
            PriceUnit::PerNight => "per_night",
            PriceUnit::PerGuest => "per_guest",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "per_night" => PriceUnit::PerNight,
            "per_guest" => PriceUnit::PerGuest,
            _ => PriceUnit::PerStay,
        }
    }
}

impl Extra {
    /// Price of `quantity` units of this extra for a stay, or `None` if it
    /// does not fit in an `i64`.
    pub fn line_total(&self, quantity: i64, nights: i64, guests: i64) -> Option<i64> {
        let multiplier = match self.price_unit {
            PriceUnit::PerStay => 1,
            PriceUnit::PerNight => nights,
            PriceUnit::PerGuest => guests,
        };
        self.price_cents.checked_mul(quantity)?.checked_mul(multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extra(price_unit: PriceUnit) -> Extra {
        let now = chrono::Utc::now().naive_utc();
        Extra {
            id: "x".to_string(),
            name: "Breakfast".to_string(),
            description: String::new(),
            price_cents: 1_500,
            price_unit,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_line_total_by_unit() {
        assert_eq!(extra(PriceUnit::PerStay).line_total(2, 4, 3), Some(3_000));
        assert_eq!(extra(PriceUnit::PerNight).line_total(1, 4, 3), Some(6_000));
        assert_eq!(extra(PriceUnit::PerGuest).line_total(1, 4, 3), Some(4_500));
    }

    #[test]
    fn test_line_total_overflow_is_none() {
        assert_eq!(extra(PriceUnit::PerStay).line_total(i64::MAX / 1_500 + 1, 1, 1), None);
        assert_eq!(extra(PriceUnit::PerNight).line_total(i64::MAX / 2_000, 3, 1), None);
    }
}
