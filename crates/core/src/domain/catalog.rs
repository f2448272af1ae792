use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::location::LocationDescriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogItemId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InventoryRecordId(pub i64);

/// A borrowable kind of thing, independent of where it is stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub name: String,
    pub is_consumable: bool,
}

impl CatalogItem {
    pub fn new(id: i64, name: impl Into<String>, is_consumable: bool) -> Self {
        Self { id: CatalogItemId(id), name: name.into(), is_consumable }
    }

    /// Case-folded name comparison. Folding is Unicode-aware, so `Überzieher`
    /// and `überzieher` are the same item.
    pub fn is_named(&self, query: &str) -> bool {
        self.name.to_lowercase() == query.trim().to_lowercase()
    }
}

/// On-hand stock of one catalog item at one location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: InventoryRecordId,
    pub item_id: CatalogItemId,
    pub location: LocationDescriptor,
    pub amount: u32,
}

/// Quantity committed against an inventory record by an active reservation.
/// Both dates are inclusive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationDemand {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount: u32,
}

impl ReservationDemand {
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start_date <= end && start <= self.end_date
    }
}

pub fn total_on_hand(records: &[InventoryRecord]) -> u64 {
    records.iter().map(|record| u64::from(record.amount)).sum()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        total_on_hand, CatalogItem, CatalogItemId, InventoryRecord, InventoryRecordId,
        ReservationDemand,
    };
    use crate::domain::location::LocationDescriptor;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, d).expect("valid day")
    }

    #[test]
    fn overlap_includes_touching_boundaries() {
        let demand = ReservationDemand { start_date: day(1), end_date: day(5), amount: 1 };

        assert!(demand.overlaps(day(5), day(9)));
        assert!(demand.overlaps(day(1), day(1)));
        assert!(!demand.overlaps(day(6), day(9)));
        assert!(demand.overlaps(day(2), day(3)));
    }

    #[test]
    fn window_ending_before_demand_does_not_overlap() {
        let demand = ReservationDemand { start_date: day(10), end_date: day(12), amount: 2 };

        assert!(!demand.overlaps(day(6), day(9)));
        assert!(demand.overlaps(day(6), day(10)));
        assert!(demand.overlaps(day(12), day(20)));
    }

    #[test]
    fn names_compare_with_unicode_case_folding() {
        let item = CatalogItem::new(1, "Überzieher", false);

        assert!(item.is_named("überzieher"));
        assert!(item.is_named(" ÜBERZIEHER "));
        assert!(!item.is_named("Überziehen"));
    }

    #[test]
    fn on_hand_sums_every_record() {
        let location = LocationDescriptor::new("Main", "Sci", "101");
        let records = vec![
            InventoryRecord {
                id: InventoryRecordId(1),
                item_id: CatalogItemId(7),
                location: location.clone(),
                amount: 4,
            },
            InventoryRecord {
                id: InventoryRecordId(2),
                item_id: CatalogItemId(7),
                location,
                amount: 6,
            },
        ];

        assert_eq!(total_on_hand(&records), 10);
        assert_eq!(total_on_hand(&[]), 0);
    }
}
