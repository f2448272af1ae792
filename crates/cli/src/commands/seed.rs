use lagertool_db::{connect_from_config, migrations, DemoInventoryDataset};

use crate::commands::{finish, prepare, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seeded = DemoInventoryDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoInventoryDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
        pool.close().await;

        if !verification.all_present {
            let failed: Vec<&str> = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
                .collect();
            return Err(("seed_verification", verification_failure_message(&failed), 6u8));
        }
        Ok::<_, StepFailure>(format!(
            "demo inventory loaded: {} catalog items, {} stock rows",
            seeded.items_seeded, seeded.stock_rows_seeded
        ))
    });

    finish("seed", result)
}

fn verification_failure_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "some demo inventory rows failed to load".to_string()
    } else {
        format!("seed verification failed for: {}", failed.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::verification_failure_message;

    #[test]
    fn verification_message_names_missing_stock() {
        assert_eq!(
            verification_failure_message(&["Beaker @ Main;Sci;101", "Pipette @ Main;Sci;204"]),
            "seed verification failed for: Beaker @ Main;Sci;101, Pipette @ Main;Sci;204"
        );
    }

    #[test]
    fn verification_message_falls_back_without_labels() {
        assert_eq!(verification_failure_message(&[]), "some demo inventory rows failed to load");
    }
}
