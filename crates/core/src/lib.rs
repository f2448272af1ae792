//! Domain core for the lagertool borrowing assistant.
//!
//! Everything here is free of I/O: catalog matching, availability arithmetic, the
//! borrow conversation state machine, configuration loading and error layering.

pub mod audit;
pub mod availability;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use availability::{availability, Availability};
pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::catalog::{
    CatalogItem, CatalogItemId, InventoryRecord, InventoryRecordId, ReservationDemand,
};
pub use domain::location::LocationDescriptor;
pub use domain::reservation::{NewReservation, ReservationId, ReservationReceipt};
pub use domain::session::BorrowSession;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::BorrowStage;
