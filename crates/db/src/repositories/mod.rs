use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;

use lagertool_core::availability::{availability, Availability};
use lagertool_core::domain::catalog::{
    CatalogItem, CatalogItemId, InventoryRecord, InventoryRecordId, ReservationDemand,
};
use lagertool_core::domain::reservation::{NewReservation, ReservationReceipt};
use lagertool_core::errors::{ApplicationError, DomainError};

pub mod catalog;
pub mod memory;
pub mod reservation;

pub use catalog::SqlCatalogRepository;
pub use memory::InMemoryInventoryStore;
pub use reservation::SqlReservationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("only {available} of {requested} available at the chosen location")]
    InsufficientAvailability { requested: u32, available: u32 },
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Domain(error) => ApplicationError::Domain(error),
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

/// Read side used while a conversation is being validated.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, RepositoryError>;

    async fn list_inventory_for(
        &self,
        item_id: CatalogItemId,
    ) -> Result<Vec<InventoryRecord>, RepositoryError>;

    /// Demand from active reservations only.
    async fn list_demand_for(
        &self,
        inventory_id: InventoryRecordId,
    ) -> Result<Vec<ReservationDemand>, RepositoryError>;
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Resolves item and location, checks availability for
    /// `[start_date, due_date]` and records the reservation, all or nothing.
    async fn create_reservation(
        &self,
        request: NewReservation,
    ) -> Result<ReservationReceipt, RepositoryError>;
}

/// Availability gate shared by every reservation backend.
pub(crate) fn ensure_capacity(
    record: &InventoryRecord,
    is_consumable: bool,
    demand: &[ReservationDemand],
    start: NaiveDate,
    end: NaiveDate,
    requested: u32,
) -> Result<Availability, RepositoryError> {
    let result = availability(record, is_consumable, demand, start, end);
    if result.is_overcommitted() {
        warn!(
            event_name = "persistence.inventory.overcommitted",
            inventory_id = record.id.0,
            on_hand = record.amount,
            overcommitted_by = result.overcommitted_by,
            "active reservations exceed on-hand stock"
        );
    }
    if !result.covers(requested) {
        return Err(RepositoryError::InsufficientAvailability {
            requested,
            available: result.available,
        });
    }
    Ok(result)
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("invalid date `{raw}`: {error}")))
}
