use std::sync::Arc;
use std::time::Duration;

use shelfdesk_agent::runtime::{AgentRuntime, RuntimeBuildError};
use shelfdesk_core::config::{AppConfig, ConfigError, LoadOptions};
use shelfdesk_db::repositories::SqlSessionRepository;
use shelfdesk_db::{connect_with_config, migrations, DbPool};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("agent runtime could not be built: {0}")]
    Runtime(#[from] RuntimeBuildError),
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

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
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

    purge_idle_sessions(&config, &db_pool).await;

    let runtime = AgentRuntime::from_config(&config, db_pool.clone())?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "agent runtime initialized"
    );

    Ok(Application { config, db_pool, runtime: Arc::new(runtime) })
}

/// Drops sessions left idle past `session.idle_timeout_secs` by an earlier run.
/// A failure is logged and startup continues.
pub async fn purge_idle_sessions(config: &AppConfig, db_pool: &DbPool) -> u64 {
    let idle_ttl = Duration::from_secs(config.session.idle_timeout_secs);
    match SqlSessionRepository::new(db_pool.clone()).purge_idle(idle_ttl).await {
        Ok(removed) => {
            info!(
                event_name = "system.bootstrap.sessions_purged",
                correlation_id = "bootstrap",
                removed,
                "idle sessions purged"
            );
            removed
        }
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.session_purge_failed",
                correlation_id = "bootstrap",
                error = %error,
                "could not purge idle sessions"
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use shelfdesk_core::config::{AppConfig, ConfigOverrides, LlmProvider, LoadOptions};
    use shelfdesk_core::domain::conversation::{Session, SessionId, TurnRequest};
    use shelfdesk_db::repositories::{SessionRepository, SqlSessionRepository};
    use shelfdesk_db::{connect_with_config, migrations, DemoOrders};

    use crate::bootstrap::{bootstrap, purge_idle_sessions};

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                llm_provider: Some(LlmProvider::Ollama),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_non_sqlite_database_url() {
        let result = bootstrap(overrides("postgres://localhost/shelfdesk")).await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("database.url"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_answers_from_the_order_store() {
        let app = bootstrap(overrides("sqlite::memory:")).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('customer_order', 'order_line_item', 'order_shipping_address', 'chat_session')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("count tables");
        assert_eq!(table_count, 4);

        DemoOrders::load(&app.db_pool).await.expect("seed demo orders");

        let reply = app
            .runtime
            .handle_turn(TurnRequest {
                session_id: SessionId("bootstrap-smoke".to_string()),
                message: "Where is my order UR1234567890".to_string(),
            })
            .await
            .expect("turn");
        assert!(reply.response.contains("The Midnight Library"));
        assert!(reply.response.contains("DTDC7700112233"));

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn startup_purge_drops_sessions_idle_past_the_ttl() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.session.idle_timeout_secs = 1800;

        let pool = connect_with_config(&config.database).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");

        let sessions = SqlSessionRepository::new(pool.clone());
        for id in ["recent", "abandoned"] {
            sessions.save(&Session::new(SessionId(id.to_string()), 6)).await.expect("save");
        }
        sqlx::query("UPDATE chat_session SET updated_at = ?1 WHERE session_id = 'abandoned'")
            .bind((chrono::Utc::now() - chrono::Duration::hours(3)).to_rfc3339())
            .execute(&pool)
            .await
            .expect("age session");

        assert_eq!(purge_idle_sessions(&config, &pool).await, 1);
        assert!(sessions.load(&SessionId("recent".to_string())).await.expect("load").is_some());

        let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_session")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(remaining, 1);

        pool.close().await;
    }
}
