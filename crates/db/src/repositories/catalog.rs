use sqlx::Row;

use lagertool_core::domain::catalog::{
    CatalogItem, CatalogItemId, InventoryRecord, InventoryRecordId, ReservationDemand,
};
use lagertool_core::domain::location::LocationDescriptor;

use super::{parse_date, CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn to_u32(value: i64, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Decode(format!("{column} out of range: {value}")))
}

pub(crate) fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<CatalogItem, RepositoryError> {
    let id: i64 = decode(row.try_get("id"))?;
    let name: String = decode(row.try_get("name"))?;
    let is_consumable: bool = decode(row.try_get("is_consumable"))?;
    Ok(CatalogItem { id: CatalogItemId(id), name, is_consumable })
}

pub(crate) fn row_to_inventory(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<InventoryRecord, RepositoryError> {
    let id: i64 = decode(row.try_get("id"))?;
    let item_id: i64 = decode(row.try_get("item_id"))?;
    let amount: i64 = decode(row.try_get("amount"))?;
    Ok(InventoryRecord {
        id: InventoryRecordId(id),
        item_id: CatalogItemId(item_id),
        location: LocationDescriptor::new(
            decode(row.try_get::<String, _>("campus"))?,
            decode(row.try_get::<String, _>("building"))?,
            decode(row.try_get::<String, _>("room"))?,
        ),
        amount: to_u32(amount, "inventory.amount")?,
    })
}

pub(crate) fn row_to_demand(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ReservationDemand, RepositoryError> {
    let start: String = decode(row.try_get("start_date"))?;
    let end: String = decode(row.try_get("end_date"))?;
    let amount: i64 = decode(row.try_get("amount"))?;
    Ok(ReservationDemand {
        start_date: parse_date(&start)?,
        end_date: parse_date(&end)?,
        amount: to_u32(amount, "reservation_item.amount")?,
    })
}

const INVENTORY_COLUMNS: &str = "inventory.id, inventory.item_id, inventory.amount, \
     location.campus, location.building, location.room";

pub(crate) const ACTIVE_DEMAND_QUERY: &str =
    "SELECT reservation.start_date, reservation.end_date, reservation_item.amount
     FROM reservation_item
     JOIN reservation ON reservation.id = reservation_item.reservation_id
     WHERE reservation_item.inventory_id = ? AND reservation.status = 'active'
     ORDER BY reservation.start_date ASC, reservation.id ASC";

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn list_catalog_items(&self) -> Result<Vec<CatalogItem>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name, is_consumable FROM catalog_item ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_item).collect()
    }

    async fn list_inventory_for(
        &self,
        item_id: CatalogItemId,
    ) -> Result<Vec<InventoryRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS}
             FROM inventory JOIN location ON location.id = inventory.location_id
             WHERE inventory.item_id = ?
             ORDER BY inventory.id ASC"
        ))
        .bind(item_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_inventory).collect()
    }

    async fn list_demand_for(
        &self,
        inventory_id: InventoryRecordId,
    ) -> Result<Vec<ReservationDemand>, RepositoryError> {
        let rows =
            sqlx::query(ACTIVE_DEMAND_QUERY).bind(inventory_id.0).fetch_all(&self.pool).await?;

        rows.iter().map(row_to_demand).collect()
    }
}
