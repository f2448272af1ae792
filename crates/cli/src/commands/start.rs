use lagertool_db::{connect_from_config, migrations};

use crate::commands::{finish, prepare, CommandResult, StepFailure};

/// Preflight for `lagertool-server`: configuration, database reachability and
/// schema, without opening a Slack connection.
pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("start") {
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
        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM catalog_item")
            .fetch_one(&pool)
            .await
            .map_err(|error| ("schema_readiness", error.to_string(), 5u8))?;
        pool.close().await;

        let announce = config.borrow.announce_channel.as_deref().unwrap_or("none");
        Ok::<_, StepFailure>(format!(
            "preflight passed: {items} catalog items, session idle timeout {}s, \
             announce channel {announce}",
            config.borrow.session_idle_timeout_secs
        ))
    });

    finish("start", result)
}
