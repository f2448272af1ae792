use serde::Serialize;
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

struct SeedStock {
    item: &'static str,
    campus: &'static str,
    building: &'static str,
    room: &'static str,
    amount: i64,
}

/// Stock rows the demo dataset must contain after loading.
const SEED_STOCK: &[SeedStock] = &[
    SeedStock { item: "Beaker", campus: "Main", building: "Sci", room: "101", amount: 10 },
    SeedStock { item: "Erlenmeyer Flask", campus: "North", building: "Lab", room: "B1", amount: 4 },
    SeedStock { item: "Erlenmeyer Flask", campus: "Main", building: "Sci", room: "101", amount: 6 },
    SeedStock { item: "Pipette", campus: "Main", building: "Sci", room: "204", amount: 25 },
    SeedStock { item: "Microscope", campus: "Main", building: "Sci", room: "204", amount: 2 },
    SeedStock { item: "Nitrile Gloves", campus: "Main", building: "Sci", room: "101", amount: 500 },
    SeedStock { item: "Bunsen Burner", campus: "North", building: "Lab", room: "B1", amount: 3 },
];

const SEED_CONSUMABLES: &[&str] = &["Nitrile Gloves"];

#[derive(Clone, Debug, Serialize)]
pub struct SeedResult {
    pub items_seeded: usize,
    pub stock_rows_seeded: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

/// Deterministic lab inventory used by local runs, the `seed` command and tests.
/// Loading is idempotent.
pub struct DemoInventoryDataset;

impl DemoInventoryDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_inventory.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let mut items: Vec<&str> = SEED_STOCK.iter().map(|stock| stock.item).collect();
        items.dedup();
        Ok(SeedResult { items_seeded: items.len(), stock_rows_seeded: SEED_STOCK.len() })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for stock in SEED_STOCK {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(
                    SELECT 1 FROM inventory
                    JOIN catalog_item ON catalog_item.id = inventory.item_id
                    JOIN location ON location.id = inventory.location_id
                    WHERE catalog_item.name = ?1 AND location.campus = ?2
                      AND location.building = ?3 AND location.room = ?4
                      AND inventory.amount = ?5)",
            )
            .bind(stock.item)
            .bind(stock.campus)
            .bind(stock.building)
            .bind(stock.room)
            .bind(stock.amount)
            .fetch_one(pool)
            .await?;
            checks.push((
                format!("{} @ {};{};{}", stock.item, stock.campus, stock.building, stock.room),
                present == 1,
            ));
        }

        for name in SEED_CONSUMABLES {
            let consumable: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM catalog_item WHERE name = ?1 AND is_consumable = 1)",
            )
            .bind(name)
            .fetch_one(pool)
            .await?;
            checks.push((format!("{name} is consumable"), consumable == 1));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}
