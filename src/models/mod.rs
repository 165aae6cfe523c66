pub mod booking;
pub mod extra;
pub mod message;
pub mod property;
pub mod template;

pub use booking::{Booking, BookingExtra, BookingStatus};
pub use extra::{Extra, PriceUnit};
pub use message::{Channel, Direction, Message, MessageStatus};
pub use property::{Property, PropertyPhoto};
pub use template::{MessageTemplate, TemplateType};

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
