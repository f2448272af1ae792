use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::CatalogItemId;
use crate::flows::BorrowStage;

/// Per-user conversation state for one borrow request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowSession {
    pub user_id: String,
    pub stage: BorrowStage,
    pub item: Option<String>,
    pub item_id: Option<CatalogItemId>,
    pub quantity: Option<u32>,
    pub source: Option<String>,
    pub due_date: Option<NaiveDate>,
    /// Channel that receives the public confirmation.
    pub group_channel: Option<String>,
    /// Channel the user last wrote from; private replies go here.
    pub reply_channel: Option<String>,
    pub last_activity: DateTime<Utc>,
}

impl BorrowSession {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            stage: BorrowStage::Start,
            item: None,
            item_id: None,
            quantity: None,
            source: None,
            due_date: None,
            group_channel: None,
            reply_channel: None,
            last_activity: now,
        }
    }

    /// Drops the collected request fields. Channels survive so the next request
    /// announces to the same place.
    pub fn clear_request(&mut self) {
        self.item = None;
        self.item_id = None;
        self.quantity = None;
        self.source = None;
        self.due_date = None;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }

    pub fn is_idle(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity > timeout
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::BorrowSession;
    use crate::domain::catalog::CatalogItemId;
    use crate::flows::BorrowStage;

    #[test]
    fn clear_request_keeps_channels() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).single().expect("valid time");
        let mut session = BorrowSession::new("U1", now);
        session.stage = BorrowStage::Confirm;
        session.item = Some("Beaker".to_owned());
        session.item_id = Some(CatalogItemId(1));
        session.quantity = Some(3);
        session.source = Some("Main;Sci;101".to_owned());
        session.due_date = NaiveDate::from_ymd_opt(2030, 2, 1);
        session.group_channel = Some("C1".to_owned());

        session.clear_request();

        assert_eq!(session.item, None);
        assert_eq!(session.quantity, None);
        assert_eq!(session.due_date, None);
        assert_eq!(session.group_channel.as_deref(), Some("C1"));
    }

    #[test]
    fn idle_check_is_strict() {
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).single().expect("valid time");
        let session = BorrowSession::new("U1", start);
        let timeout = Duration::minutes(30);

        assert!(!session.is_idle(start + Duration::minutes(30), timeout));
        assert!(session.is_idle(start + Duration::minutes(31), timeout));
    }
}
