pub mod booking;
pub mod event;
pub mod service;
pub mod shop;
pub mod slot;

pub use booking::{Booking, BookingStatus};
pub use event::{BookingEvent, BookingEventKind};
pub use service::Service;
pub use shop::{BusinessHours, DayHours, Shop};
pub use slot::Slot;
