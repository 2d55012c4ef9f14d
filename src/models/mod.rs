pub mod booking;
pub mod event;
pub mod user;

pub use booking::{Booking, BookingStatus};
pub use event::{Event, EventStatus};
pub use user::User;
