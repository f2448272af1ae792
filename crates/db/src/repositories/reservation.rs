use chrono::Utc;
use tracing::info;

use lagertool_core::domain::location::LocationDescriptor;
use lagertool_core::domain::reservation::{
    split_display_name, NewReservation, ReservationId, ReservationReceipt, ReservationStatus,
};
use lagertool_core::errors::DomainError;

use super::catalog::{row_to_demand, row_to_inventory, row_to_item, ACTIVE_DEMAND_QUERY};
use super::{ensure_capacity, format_date, RepositoryError, ReservationRepository};
use crate::DbPool;

pub struct SqlReservationRepository {
    pool: DbPool,
}

impl SqlReservationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn validate_request(
    request: &NewReservation,
) -> Result<LocationDescriptor, RepositoryError> {
    if request.amount == 0 {
        return Err(DomainError::InvariantViolation(
            "reservation amount must be positive".to_owned(),
        )
        .into());
    }
    if request.due_date < request.start_date {
        return Err(DomainError::InvariantViolation(format!(
            "due date {} is before start date {}",
            request.due_date, request.start_date
        ))
        .into());
    }
    Ok(LocationDescriptor::parse(&request.location)?)
}

#[async_trait::async_trait]
impl ReservationRepository for SqlReservationRepository {
    async fn create_reservation(
        &self,
        request: NewReservation,
    ) -> Result<ReservationReceipt, RepositoryError> {
        let location = validate_request(&request)?;
        let mut tx = self.pool.begin().await?;

        // NOCASE only folds ASCII, so names are compared after loading.
        let item = sqlx::query("SELECT id, name, is_consumable FROM catalog_item ORDER BY id")
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(row_to_item)
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .find(|item| item.is_named(&request.item_name))
            .ok_or_else(|| RepositoryError::NotFound(format!("item `{}`", request.item_name)))?;

        let record = sqlx::query(
            "SELECT inventory.id, inventory.item_id, inventory.amount,
                    location.campus, location.building, location.room
             FROM inventory JOIN location ON location.id = inventory.location_id
             WHERE inventory.item_id = ?
               AND location.campus = ? AND location.building = ? AND location.room = ?",
        )
        .bind(item.id.0)
        .bind(&location.campus)
        .bind(&location.building)
        .bind(&location.room)
        .fetch_optional(&mut *tx)
        .await?
        .as_ref()
        .map(row_to_inventory)
        .transpose()?
        .ok_or_else(|| {
            RepositoryError::NotFound(format!("no `{}` stocked at {location}", item.name))
        })?;

        let demand = sqlx::query(ACTIVE_DEMAND_QUERY)
            .bind(record.id.0)
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(row_to_demand)
            .collect::<Result<Vec<_>, _>>()?;
        ensure_capacity(
            &record,
            item.is_consumable,
            &demand,
            request.start_date,
            request.due_date,
            request.amount,
        )?;

        let now = Utc::now().to_rfc3339();
        let (first_name, last_name) = split_display_name(&request.requester_display_name);
        let person_id: i64 = sqlx::query_scalar(
            "INSERT INTO person (slack_id, first_name, last_name, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(slack_id) DO UPDATE SET
                 first_name = excluded.first_name,
                 last_name = excluded.last_name
             RETURNING id",
        )
        .bind(&request.requester_id)
        .bind(&first_name)
        .bind(&last_name)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        let reservation_id: i64 = sqlx::query_scalar(
            "INSERT INTO reservation (person_id, start_date, end_date, status, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(person_id)
        .bind(format_date(request.start_date))
        .bind(format_date(request.due_date))
        .bind(ReservationStatus::Active.as_str())
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO reservation_item (reservation_id, inventory_id, amount) VALUES (?, ?, ?)",
        )
        .bind(reservation_id)
        .bind(record.id.0)
        .bind(i64::from(request.amount))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            event_name = "persistence.reservation.created",
            reservation_id,
            inventory_id = record.id.0,
            requester_id = %request.requester_id,
            amount = request.amount,
            "reservation stored"
        );

        Ok(ReservationReceipt {
            id: ReservationId(reservation_id),
            inventory_id: record.id,
            amount: request.amount,
            start_date: request.start_date,
            end_date: request.due_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use lagertool_core::domain::catalog::InventoryRecordId;
    use lagertool_core::domain::reservation::NewReservation;
    use lagertool_core::errors::DomainError;

    use super::SqlReservationRepository;
    use crate::repositories::{
        CatalogRepository, RepositoryError, ReservationRepository, SqlCatalogRepository,
    };
    use crate::{connect_with_settings, migrations, DbPool, DemoInventoryDataset};

    async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoInventoryDataset::load(&pool).await.expect("seed");
        pool
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn request(amount: u32) -> NewReservation {
        NewReservation {
            requester_id: "U024BE7LH".to_owned(),
            requester_display_name: "ada.lovelace".to_owned(),
            item_name: "Beaker".to_owned(),
            amount,
            location: "Main;Sci;101".to_owned(),
            start_date: date(2030, 1, 1),
            due_date: date(2030, 1, 10),
        }
    }

    #[tokio::test]
    async fn creates_reservation_person_and_demand() {
        let pool = seeded_pool().await;
        let repo = SqlReservationRepository::new(pool.clone());

        let receipt = repo.create_reservation(request(3)).await.expect("create");

        assert_eq!(receipt.inventory_id, InventoryRecordId(1));
        assert_eq!(receipt.amount, 3);
        assert_eq!(receipt.end_date, date(2030, 1, 10));

        let (first, last): (String, String) =
            sqlx::query_as("SELECT first_name, last_name FROM person WHERE slack_id = 'U024BE7LH'")
                .fetch_one(&pool)
                .await
                .expect("person row");
        assert_eq!((first.as_str(), last.as_str()), ("ada", "lovelace"));

        let demand = SqlCatalogRepository::new(pool)
            .list_demand_for(InventoryRecordId(1))
            .await
            .expect("demand");
        assert_eq!(demand.len(), 1);
        assert_eq!(demand[0].amount, 3);
    }

    #[tokio::test]
    async fn repeat_requester_reuses_person_row() {
        let pool = seeded_pool().await;
        let repo = SqlReservationRepository::new(pool.clone());

        repo.create_reservation(request(2)).await.expect("first");
        repo.create_reservation(request(2)).await.expect("second");

        let people: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM person").fetch_one(&pool).await.expect("n");
        assert_eq!(people, 1);
    }

    #[tokio::test]
    async fn overlapping_demand_limits_new_reservations() {
        let pool = seeded_pool().await;
        let repo = SqlReservationRepository::new(pool.clone());
        repo.create_reservation(request(8)).await.expect("first reservation");

        let error = repo.create_reservation(request(3)).await.expect_err("only 2 left");

        assert!(matches!(
            error,
            RepositoryError::InsufficientAvailability { requested: 3, available: 2 }
        ));
        let reservations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reservation")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(reservations, 1, "failed attempt must not leave rows behind");
    }

    #[tokio::test]
    async fn unknown_location_or_item_is_not_found() {
        let repo = SqlReservationRepository::new(seeded_pool().await);

        let mut wrong_room = request(1);
        wrong_room.location = "Main;Sci;999".to_owned();
        assert!(matches!(
            repo.create_reservation(wrong_room).await,
            Err(RepositoryError::NotFound(_))
        ));

        let mut wrong_item = request(1);
        wrong_item.item_name = "Centrifuge".to_owned();
        assert!(matches!(
            repo.create_reservation(wrong_item).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn malformed_location_is_a_domain_error() {
        let repo = SqlReservationRepository::new(seeded_pool().await);
        let mut malformed = request(1);
        malformed.location = "Main Sci 101".to_owned();

        let error = repo.create_reservation(malformed).await.expect_err("bad location");

        assert!(matches!(error, RepositoryError::Domain(DomainError::InvalidLocation(_))));
    }
}
