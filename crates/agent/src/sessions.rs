use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use lagertool_core::{BorrowSession, Clock};

type Slot = Arc<Mutex<BorrowSession>>;

/// How [`SessionStore::lock`] treats a user without a live session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    CreateIfAbsent,
    ExistingOnly,
}

/// Exclusive access to one user's session. Writes through the guard are visible
/// to the next holder; dropping the guard releases the user to the next waiter.
pub struct SessionGuard {
    guard: OwnedMutexGuard<BorrowSession>,
}

impl Deref for SessionGuard {
    type Target = BorrowSession;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

/// Per-user conversation sessions.
///
/// Each user owns a slot behind its own fair mutex, so events for one user are
/// handled one at a time in arrival order while different users never block each
/// other. Sessions idle for longer than the configured timeout are treated as
/// absent; they are dropped lazily on access or by [`SessionStore::expire`].
///
/// Lock order: a slot may be held while taking the index lock, never the reverse.
pub struct SessionStore {
    slots: Mutex<HashMap<String, Slot>>,
    idle_timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { slots: Mutex::new(HashMap::new()), idle_timeout, clock }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Waits for exclusive access to `user_id`'s session.
    ///
    /// With [`LockMode::ExistingOnly`] a missing or expired session yields `None`;
    /// otherwise a fresh session in the start stage is created.
    pub async fn lock(&self, user_id: &str, mode: LockMode) -> Option<SessionGuard> {
        loop {
            let slot = {
                let mut slots = self.slots.lock().await;
                match slots.get(user_id) {
                    Some(slot) => Arc::clone(slot),
                    None if mode == LockMode::ExistingOnly => return None,
                    None => {
                        let slot =
                            Arc::new(Mutex::new(BorrowSession::new(user_id, self.clock.now())));
                        slots.insert(user_id.to_owned(), Arc::clone(&slot));
                        slot
                    }
                }
            };

            let guard = Arc::clone(&slot).lock_owned().await;

            // The slot may have been deleted or replaced while this task waited.
            if !self.is_current(user_id, &slot).await {
                continue;
            }

            if guard.is_idle(self.clock.now(), self.idle_timeout) {
                debug!(
                    event_name = "agent.session.expired",
                    user_id = %user_id,
                    stage = guard.stage.as_str(),
                    "dropping idle session"
                );
                self.remove_if_current(user_id, &slot).await;
                drop(guard);
                if mode == LockMode::ExistingOnly {
                    return None;
                }
                continue;
            }

            return Some(SessionGuard { guard });
        }
    }

    /// Snapshot of the live session, if any.
    pub async fn get(&self, user_id: &str) -> Option<BorrowSession> {
        self.lock(user_id, LockMode::ExistingOnly).await.map(|guard| (*guard).clone())
    }

    /// Replaces the user's session, waiting for any in-flight handler first.
    pub async fn upsert(&self, session: BorrowSession) {
        let user_id = session.user_id.clone();
        if let Some(mut guard) = self.lock(&user_id, LockMode::CreateIfAbsent).await {
            *guard = session;
        }
    }

    /// Removes the user's session. Returns whether one was live.
    pub async fn delete(&self, user_id: &str) -> bool {
        match self.lock(user_id, LockMode::ExistingOnly).await {
            Some(guard) => {
                let mut slots = self.slots.lock().await;
                slots.remove(user_id);
                drop(guard);
                true
            }
            None => false,
        }
    }

    /// Drops every idle session that is not currently being handled.
    pub async fn expire(&self) -> usize {
        let snapshot: Vec<(String, Slot)> = {
            let slots = self.slots.lock().await;
            slots.iter().map(|(user, slot)| (user.clone(), Arc::clone(slot))).collect()
        };

        let now = self.clock.now();
        let mut removed = 0;
        for (user_id, slot) in snapshot {
            let Ok(guard) = slot.try_lock() else {
                continue;
            };
            if !guard.is_idle(now, self.idle_timeout) {
                continue;
            }
            if self.remove_if_current(&user_id, &slot).await {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(event_name = "agent.session.swept", removed, "expired idle sessions");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn is_current(&self, user_id: &str, slot: &Slot) -> bool {
        let slots = self.slots.lock().await;
        slots.get(user_id).is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    async fn remove_if_current(&self, user_id: &str, slot: &Slot) -> bool {
        let mut slots = self.slots.lock().await;
        if slots.get(user_id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            slots.remove(user_id);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use chrono::{Duration, TimeZone, Utc};

    use lagertool_core::{BorrowSession, BorrowStage, Clock, FixedClock};

    use super::{LockMode, SessionStore};

    fn store(timeout_secs: i64) -> (SessionStore, FixedClock) {
        let clock =
            FixedClock::new(Utc.with_ymd_and_hms(2030, 3, 1, 9, 0, 0).single().expect("time"));
        let store = SessionStore::new(Duration::seconds(timeout_secs), Arc::new(clock.clone()));
        (store, clock)
    }

    #[tokio::test]
    async fn creates_on_demand_and_persists_writes() {
        let (store, _clock) = store(60);
        assert!(store.get("U1").await.is_none());

        {
            let mut session =
                store.lock("U1", LockMode::CreateIfAbsent).await.expect("created session");
            assert_eq!(session.stage, BorrowStage::Start);
            session.stage = BorrowStage::AwaitingQuantity;
        }

        let session = store.get("U1").await.expect("session survives");
        assert_eq!(session.stage, BorrowStage::AwaitingQuantity);
    }

    #[tokio::test]
    async fn existing_only_does_not_create() {
        let (store, _clock) = store(60);

        assert!(store.lock("U1", LockMode::ExistingOnly).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn idle_sessions_read_as_absent() {
        let (store, clock) = store(60);
        store.lock("U1", LockMode::CreateIfAbsent).await.expect("session");

        clock.advance(Duration::seconds(61));

        assert!(store.get("U1").await.is_none());
        assert_eq!(store.len().await, 0);
        let fresh = store.lock("U1", LockMode::CreateIfAbsent).await.expect("fresh session");
        assert_eq!(fresh.stage, BorrowStage::Start);
    }

    #[tokio::test]
    async fn sweep_removes_only_idle_sessions() {
        let (store, clock) = store(60);
        store.lock("U1", LockMode::CreateIfAbsent).await.expect("first");
        clock.advance(Duration::seconds(45));
        store.lock("U2", LockMode::CreateIfAbsent).await.expect("second");
        clock.advance(Duration::seconds(30));

        assert_eq!(store.expire().await, 1);
        assert!(store.get("U1").await.is_none());
        assert!(store.get("U2").await.is_some());
    }

    #[tokio::test]
    async fn delete_and_upsert() {
        let (store, clock) = store(60);
        let mut session = BorrowSession::new("U1", clock.now());
        session.stage = BorrowStage::Confirm;
        store.upsert(session).await;

        assert_eq!(store.get("U1").await.map(|s| s.stage), Some(BorrowStage::Confirm));
        assert!(store.delete("U1").await);
        assert!(!store.delete("U1").await);
    }

    #[tokio::test]
    async fn same_user_is_serialized_in_arrival_order() {
        let (store, _clock) = store(600);
        let store = Arc::new(store);
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let first = store.lock("U1", LockMode::CreateIfAbsent).await.expect("first holder");

        let mut handles = Vec::new();
        for n in 1..=3 {
            let store = Arc::clone(&store);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _guard = store.lock("U1", LockMode::CreateIfAbsent).await.expect("waiter");
                order.lock().await.push(n);
            }));
            // Give each waiter time to queue before the next one starts.
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }

        assert!(order.lock().await.is_empty(), "waiters must block on the held session");
        drop(first);
        for handle in handles {
            handle.await.expect("task");
        }
        assert_eq!(*order.lock().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn other_users_are_not_blocked() {
        let (store, _clock) = store(600);
        let _held = store.lock("U1", LockMode::CreateIfAbsent).await.expect("held");

        let other = tokio::time::timeout(
            StdDuration::from_millis(200),
            store.lock("U2", LockMode::CreateIfAbsent),
        )
        .await;

        assert!(matches!(other, Ok(Some(_))));
    }
}
