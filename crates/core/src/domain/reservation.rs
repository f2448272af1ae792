use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::InventoryRecordId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationStatus {
    Active,
    Returned,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "returned" => Some(Self::Returned),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Only active reservations hold stock.
    pub fn commits_stock(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Command issued once a borrow conversation is confirmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub requester_id: String,
    pub requester_display_name: String,
    pub item_name: String,
    pub amount: u32,
    /// Raw `campus;building;room` text as the user typed it.
    pub location: String,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReceipt {
    pub id: ReservationId,
    pub inventory_id: InventoryRecordId,
    pub amount: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Splits a chat handle like `ada.lovelace` into first and last name.
pub fn split_display_name(display_name: &str) -> (String, String) {
    match display_name.trim().split_once('.') {
        Some((first, last)) => (first.to_owned(), last.to_owned()),
        None => (display_name.trim().to_owned(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::{split_display_name, ReservationStatus};

    #[test]
    fn display_name_splits_on_first_dot() {
        assert_eq!(split_display_name("ada.lovelace"), ("ada".to_owned(), "lovelace".to_owned()));
        assert_eq!(split_display_name("grace"), ("grace".to_owned(), String::new()));
        assert_eq!(split_display_name("a.b.c"), ("a".to_owned(), "b.c".to_owned()));
    }

    #[test]
    fn only_active_reservations_commit_stock() {
        assert!(ReservationStatus::Active.commits_stock());
        assert!(!ReservationStatus::Returned.commits_stock());
        assert_eq!(ReservationStatus::parse("cancelled"), Some(ReservationStatus::Cancelled));
        assert_eq!(ReservationStatus::parse("lost"), None);
    }
}
