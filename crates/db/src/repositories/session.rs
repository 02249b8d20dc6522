use std::time::Duration;

use chrono::{DateTime, Utc};
use shelfdesk_core::domain::conversation::{Session, SessionId};
use sqlx::Row;

use super::{RepositoryError, SessionRepository};
use crate::DbPool;

/// Sessions stored as a JSON document per session id.
///
/// With an idle TTL configured, a session untouched for longer than the TTL is
/// dropped on the next load and reported as absent.
pub struct SqlSessionRepository {
    pool: DbPool,
    idle_ttl: Option<Duration>,
}

impl SqlSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, idle_ttl: None }
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = Some(idle_ttl);
        self
    }

    /// Deletes every session idle for longer than `idle_ttl`. Returns the number removed.
    pub async fn purge_idle(&self, idle_ttl: Duration) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - chrono_duration(idle_ttl)?;
        let result = sqlx::query("DELETE FROM chat_session WHERE updated_at < ?1")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    fn is_expired(&self, updated_at: &DateTime<Utc>) -> Result<bool, RepositoryError> {
        match self.idle_ttl {
            Some(ttl) => Ok(Utc::now() - *updated_at > chrono_duration(ttl)?),
            None => Ok(false),
        }
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT state_json, updated_at FROM chat_session WHERE session_id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let updated_at: String = row.try_get("updated_at")?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|error| {
                RepositoryError::Decode(format!("invalid session updated_at `{updated_at}`: {error}"))
            })?
            .with_timezone(&Utc);

        if self.is_expired(&updated_at)? {
            self.clear(id).await?;
            return Ok(None);
        }

        let state_json: String = row.try_get("state_json")?;
        let session = serde_json::from_str::<Session>(&state_json)
            .map_err(|error| RepositoryError::Decode(format!("invalid session state: {error}")))?;

        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let state_json = serde_json::to_string(session)
            .map_err(|error| RepositoryError::Decode(format!("session encode failed: {error}")))?;

        sqlx::query(
            "INSERT INTO chat_session (session_id, state_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET
                 state_json = excluded.state_json,
                 updated_at = excluded.updated_at",
        )
        .bind(session.id.as_str())
        .bind(state_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, id: &SessionId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM chat_session WHERE session_id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn chrono_duration(duration: Duration) -> Result<chrono::Duration, RepositoryError> {
    chrono::Duration::from_std(duration)
        .map_err(|error| RepositoryError::Decode(format!("idle ttl out of range: {error}")))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use shelfdesk_core::domain::conversation::{Session, SessionId};

    use crate::repositories::{SessionRepository, SqlSessionRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[tokio::test]
    async fn save_load_and_clear_round_trip() {
        let pool = migrated_pool().await;
        let repo = SqlSessionRepository::new(pool.clone());
        let id = SessionId("sess-1".to_string());

        let mut session = Session::new(id.clone(), 6);
        session.record_exchange("hello", "Please share your order number.");
        repo.save(&session).await.expect("save");

        session.record_exchange("UR1234567890", "Found it.");
        repo.save(&session).await.expect("upsert");

        let loaded = repo.load(&id).await.expect("load").expect("session present");
        assert_eq!(loaded, session);

        repo.clear(&id).await.expect("clear");
        assert_eq!(repo.load(&id).await.expect("load after clear"), None);

        pool.close().await;
    }

    #[tokio::test]
    async fn idle_sessions_load_as_absent() {
        let pool = migrated_pool().await;
        let repo = SqlSessionRepository::new(pool.clone()).with_idle_ttl(Duration::from_secs(60));
        let id = SessionId("sess-stale".to_string());

        repo.save(&Session::new(id.clone(), 6)).await.expect("save");
        let stale = (Utc::now() - chrono::Duration::minutes(5)).to_rfc3339();
        sqlx::query("UPDATE chat_session SET updated_at = ?1 WHERE session_id = ?2")
            .bind(stale)
            .bind(id.as_str())
            .execute(&pool)
            .await
            .expect("age session");

        assert_eq!(repo.load(&id).await.expect("load"), None);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM chat_session")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(remaining, 0, "expired session should be deleted on load");

        pool.close().await;
    }

    #[tokio::test]
    async fn purge_idle_removes_only_stale_rows() {
        let pool = migrated_pool().await;
        let repo = SqlSessionRepository::new(pool.clone());

        repo.save(&Session::new(SessionId("fresh".to_string()), 6)).await.expect("save fresh");
        repo.save(&Session::new(SessionId("stale".to_string()), 6)).await.expect("save stale");
        sqlx::query("UPDATE chat_session SET updated_at = ?1 WHERE session_id = 'stale'")
            .bind((Utc::now() - chrono::Duration::hours(2)).to_rfc3339())
            .execute(&pool)
            .await
            .expect("age session");

        let removed = repo.purge_idle(Duration::from_secs(3600)).await.expect("purge");
        assert_eq!(removed, 1);
        assert!(repo.load(&SessionId("fresh".to_string())).await.expect("load").is_some());

        pool.close().await;
    }
}
