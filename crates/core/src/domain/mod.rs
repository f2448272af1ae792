pub mod catalog;
pub mod location;
pub mod reservation;
pub mod session;
