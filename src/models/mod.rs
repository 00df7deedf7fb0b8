pub mod appointment;
pub mod conflict;
pub mod service;
pub mod slot;
pub mod time_window;

pub use appointment::{Appointment, AppointmentStatus};
pub use conflict::{ConflictEvent, ConflictKind};
pub use service::{Service, ServiceFormat, ServiceStatus};
pub use slot::{AvailabilitySlot, FreeSlot, SlotSource, SlotStatus};
pub use time_window::TimeWindow;
