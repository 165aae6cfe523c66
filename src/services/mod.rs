pub mod booking;
pub mod calendar;
pub mod dates;
pub mod messages;
pub mod messaging;
