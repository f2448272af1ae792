use lagertool_core::domain::reservation::NewReservation;
use lagertool_db::repositories::{CatalogRepository, ReservationRepository};
use lagertool_db::{
    connect_with_settings, migrations, DemoInventoryDataset, SqlCatalogRepository,
    SqlReservationRepository,
};

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

#[test]
fn seed_sql_only_uses_idempotent_inserts() -> SeedContractTestResult {
    for statement in DemoInventoryDataset::SQL.split(';') {
        let statement = statement
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        require!(
            statement.starts_with("INSERT OR IGNORE INTO"),
            "seed statement is not idempotent: {statement}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn seeded_catalog_supports_a_full_reservation() -> SeedContractTestResult {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate: {error}"))?;
    DemoInventoryDataset::load(&pool).await.map_err(|error| format!("seed: {error}"))?;

    let catalog = SqlCatalogRepository::new(pool.clone());
    let items = catalog.list_catalog_items().await.map_err(|error| error.to_string())?;
    let beaker = items
        .iter()
        .find(|item| item.name == "Beaker")
        .ok_or_else(|| "Beaker should be seeded".to_string())?;
    let stock = catalog.list_inventory_for(beaker.id).await.map_err(|error| error.to_string())?;
    require_eq!(stock.iter().map(|record| record.amount).sum::<u32>(), 10);

    let start = chrono::NaiveDate::from_ymd_opt(2099, 1, 1).ok_or("start date")?;
    let due = chrono::NaiveDate::from_ymd_opt(2099, 1, 8).ok_or("due date")?;
    let receipt = SqlReservationRepository::new(pool.clone())
        .create_reservation(NewReservation {
            requester_id: "U0SEED".to_string(),
            requester_display_name: "seed.user".to_string(),
            item_name: "Beaker".to_string(),
            amount: 3,
            location: "Main;Sci;101".to_string(),
            start_date: start,
            due_date: due,
        })
        .await
        .map_err(|error| format!("reserve: {error}"))?;
    require_eq!(receipt.amount, 3);

    let demand =
        catalog.list_demand_for(receipt.inventory_id).await.map_err(|error| error.to_string())?;
    require_eq!(demand.len(), 1);

    let verification =
        DemoInventoryDataset::verify(&pool).await.map_err(|error| error.to_string())?;
    require!(verification.all_present, "seed verification failed: {:?}", verification.checks);
    Ok(())
}
