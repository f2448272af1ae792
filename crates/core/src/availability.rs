//! Remaining quantity of an inventory record over a date range.

use chrono::NaiveDate;

use crate::domain::catalog::{InventoryRecord, ReservationDemand};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Availability {
    pub available: u32,
    /// How far committed demand exceeds on-hand stock. Non-zero means the stored
    /// reservations are inconsistent with the inventory.
    pub overcommitted_by: u32,
}

impl Availability {
    pub fn is_overcommitted(&self) -> bool {
        self.overcommitted_by > 0
    }

    pub fn covers(&self, amount: u32) -> bool {
        self.available >= amount
    }
}

/// Consumables are never tracked per reservation, so the full on-hand amount is
/// returned for them regardless of demand.
pub fn availability(
    record: &InventoryRecord,
    is_consumable: bool,
    demand: &[ReservationDemand],
    start: NaiveDate,
    end: NaiveDate,
) -> Availability {
    if is_consumable {
        return Availability { available: record.amount, overcommitted_by: 0 };
    }

    let committed: u64 = demand
        .iter()
        .filter(|entry| entry.overlaps(start, end))
        .map(|entry| u64::from(entry.amount))
        .sum();
    let on_hand = u64::from(record.amount);

    if committed > on_hand {
        let shortfall = u32::try_from(committed - on_hand).unwrap_or(u32::MAX);
        Availability { available: 0, overcommitted_by: shortfall }
    } else {
        // on_hand - committed <= record.amount, which already fits in u32
        Availability { available: (on_hand - committed) as u32, overcommitted_by: 0 }
    }
}
