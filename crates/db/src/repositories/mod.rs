use async_trait::async_trait;
use thiserror::Error;

use shelfdesk_core::domain::conversation::{Session, SessionId};
use shelfdesk_core::domain::order::{OrderNumber, OrderRecord};

pub mod memory;
pub mod order;
pub mod session;

pub use memory::{InMemoryOrderRepository, InMemorySessionRepository};
pub use order::SqlOrderRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Read-only view of the order store.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Returns `Ok(None)` for unknown order numbers; errors are reserved for store failures.
    async fn lookup_order(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Option<OrderRecord>, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;
    async fn save(&self, session: &Session) -> Result<(), RepositoryError>;
    async fn clear(&self, id: &SessionId) -> Result<(), RepositoryError>;
}
