pub mod alternatives;
pub mod availability;
pub mod conflicts;
pub mod reservation;
pub mod store;
pub mod time_window;
