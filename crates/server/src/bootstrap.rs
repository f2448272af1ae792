use std::sync::Arc;
use std::time::Duration as StdDuration;

use lagertool_agent::{BorrowWorkflow, CatalogSearch, SessionStore};
use lagertool_core::config::{AppConfig, ConfigError, LoadOptions};
use lagertool_core::{Clock, SystemClock};
use lagertool_db::{
    connect_with_settings, migrations, DbPool, SqlCatalogRepository, SqlReservationRepository,
};
use lagertool_slack::events::{
    BlockActionHandler, DirectMessageHandler, EventDispatcher, SlashCommandHandler,
};
use lagertool_slack::ingress::SlackIngress;
use lagertool_slack::web::{SlackWebClient, WebApiError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::audit::TracingAuditSink;
use crate::directory::SlackDirectory;
use crate::slack_service::BorrowSlackService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub workflow: Arc<BorrowWorkflow>,
    pub ingress: Arc<SlackIngress>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("slack web client setup failed: {0}")]
    Slack(#[source] WebApiError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let web_client = SlackWebClient::new(&config.slack).map_err(BootstrapError::Slack)?;
    let catalog = Arc::new(SqlCatalogRepository::new(db_pool.clone()));
    let workflow =
        Arc::new(build_workflow(&config, &db_pool, catalog.clone(), web_client.clone()));
    let service = BorrowSlackService::new(workflow.clone(), Arc::new(CatalogSearch::new(catalog)));

    let ingress = Arc::new(SlackIngress::new(borrow_dispatcher(service), Arc::new(web_client)));

    Ok(Application { config, db_pool, workflow, ingress })
}

fn build_workflow(
    config: &AppConfig,
    db_pool: &DbPool,
    catalog: Arc<SqlCatalogRepository>,
    web_client: SlackWebClient,
) -> BorrowWorkflow {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sessions = Arc::new(SessionStore::new(config.borrow.idle_timeout(), clock.clone()));

    BorrowWorkflow::new(
        sessions,
        catalog,
        Arc::new(SqlReservationRepository::new(db_pool.clone())),
        clock,
    )
    .with_directory(Arc::new(SlackDirectory::new(web_client)))
    .with_audit_sink(Arc::new(TracingAuditSink))
    .with_announce_channel(config.borrow.announce_channel.clone())
}

pub fn borrow_dispatcher(service: BorrowSlackService) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(service.clone()));
    dispatcher.register(DirectMessageHandler::new(service.clone()));
    dispatcher.register(BlockActionHandler::new(service));
    dispatcher
}

/// Periodically drops idle sessions so abandoned conversations do not pile up.
pub fn spawn_session_sweeper(sessions: Arc<SessionStore>) -> JoinHandle<()> {
    let period = sessions.idle_timeout().to_std().unwrap_or(StdDuration::from_secs(1_800));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let expired = sessions.expire().await;
            debug!(event_name = "system.sessions.swept", expired, "idle session sweep finished");
        }
    })
}
