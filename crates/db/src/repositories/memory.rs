use std::collections::BTreeMap;

use tokio::sync::RwLock;

use lagertool_core::domain::catalog::{
    CatalogItem, CatalogItemId, InventoryRecord, InventoryRecordId, ReservationDemand,
};
use lagertool_core::domain::location::LocationDescriptor;
use lagertool_core::domain::reservation::{
    NewReservation, ReservationId, ReservationReceipt, ReservationStatus,
};

use super::reservation::validate_request;
use super::{ensure_capacity, CatalogRepository, RepositoryError, ReservationRepository};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredReservation {
    pub id: ReservationId,
    pub inventory_id: InventoryRecordId,
    pub requester_id: String,
    pub status: ReservationStatus,
    pub demand: ReservationDemand,
}

#[derive(Default)]
struct State {
    items: Vec<CatalogItem>,
    inventory: Vec<InventoryRecord>,
    reservations: BTreeMap<i64, StoredReservation>,
    next_reservation_id: i64,
}

/// Catalog and reservation storage kept entirely in memory. Both traits share one
/// lock so a reservation write is atomic with its availability check.
#[derive(Default)]
pub struct InMemoryInventoryStore {
    state: RwLock<State>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_item(&self, name: &str, is_consumable: bool) -> CatalogItemId {
        let mut state = self.state.write().await;
        let id = CatalogItemId(state.items.len() as i64 + 1);
        state.items.push(CatalogItem { id, name: name.to_owned(), is_consumable });
        id
    }

    pub async fn add_inventory(
        &self,
        item_id: CatalogItemId,
        location: LocationDescriptor,
        amount: u32,
    ) -> InventoryRecordId {
        let mut state = self.state.write().await;
        let id = InventoryRecordId(state.inventory.len() as i64 + 1);
        state.inventory.push(InventoryRecord { id, item_id, location, amount });
        id
    }

    pub async fn reservations(&self) -> Vec<StoredReservation> {
        self.state.read().await.reservations.values().cloned().collect()
    }

    pub async fn set_status(&self, id: ReservationId, status: ReservationStatus) -> bool {
        let mut state = self.state.write().await;
        match state.reservations.get_mut(&id.0) {
            Some(stored) => {
                stored.status = status;
                true
            }
            None => false,
        }
    }
}

fn active_demand(state: &State, inventory_id: InventoryRecordId) -> Vec<ReservationDemand> {
    state
        .reservations
        .values()
        .filter(|stored| stored.inventory_id == inventory_id && stored.status.commits_stock())
        .map(|stored| stored.demand.clone())
        .collect()
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryInventoryStore {
    async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        Ok(self.state.read().await.items.clone())
    }

    async fn list_inventory_for(
        &self,
        item_id: CatalogItemId,
    ) -> Result<Vec<InventoryRecord>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.inventory.iter().filter(|record| record.item_id == item_id).cloned().collect())
    }

    async fn list_demand_for(
        &self,
        inventory_id: InventoryRecordId,
    ) -> Result<Vec<ReservationDemand>, RepositoryError> {
        Ok(active_demand(&*self.state.read().await, inventory_id))
    }
}

#[async_trait::async_trait]
impl ReservationRepository for InMemoryInventoryStore {
    async fn create_reservation(
        &self,
        request: NewReservation,
    ) -> Result<ReservationReceipt, RepositoryError> {
        let location = validate_request(&request)?;
        let mut state = self.state.write().await;

        let item = state
            .items
            .iter()
            .find(|item| item.is_named(&request.item_name))
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("item `{}`", request.item_name)))?;
        let record = state
            .inventory
            .iter()
            .find(|record| record.item_id == item.id && record.location == location)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("no `{}` stocked at {location}", item.name))
            })?;

        let demand = active_demand(&state, record.id);
        ensure_capacity(
            &record,
            item.is_consumable,
            &demand,
            request.start_date,
            request.due_date,
            request.amount,
        )?;

        state.next_reservation_id += 1;
        let id = ReservationId(state.next_reservation_id);
        state.reservations.insert(
            id.0,
            StoredReservation {
                id,
                inventory_id: record.id,
                requester_id: request.requester_id.clone(),
                status: ReservationStatus::Active,
                demand: ReservationDemand {
                    start_date: request.start_date,
                    end_date: request.due_date,
                    amount: request.amount,
                },
            },
        );

        Ok(ReservationReceipt {
            id,
            inventory_id: record.id,
            amount: request.amount,
            start_date: request.start_date,
            end_date: request.due_date,
        })
    }
}
