use std::collections::HashMap;

use tokio::sync::RwLock;

use shelfdesk_core::domain::conversation::{Session, SessionId};
use shelfdesk_core::domain::order::{OrderNumber, OrderRecord};

use super::{OrderRepository, RepositoryError, SessionRepository};

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, OrderRecord>>,
}

impl InMemoryOrderRepository {
    pub fn with_orders(orders: impl IntoIterator<Item = OrderRecord>) -> Self {
        let orders = orders
            .into_iter()
            .map(|order| (order.order_number.as_str().to_string(), order))
            .collect();
        Self { orders: RwLock::new(orders) }
    }

    pub async fn insert(&self, order: OrderRecord) {
        let mut orders = self.orders.write().await;
        orders.insert(order.order_number.as_str().to_string(), order);
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn lookup_order(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Option<OrderRecord>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(order_number.as_str()).cloned())
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionRepository {
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id.as_str()).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.as_str().to_string(), session.clone());
        Ok(())
    }

    async fn clear(&self, id: &SessionId) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use shelfdesk_core::domain::conversation::{Language, Session, SessionId};
    use shelfdesk_core::domain::order::{Book, OrderNumber, OrderRecord, OrderStatus};

    use crate::repositories::{
        InMemoryOrderRepository, InMemorySessionRepository, OrderRepository, SessionRepository,
    };

    fn order(number: &str) -> OrderRecord {
        OrderRecord::new(OrderNumber::parse(number).expect("order number"), OrderStatus::Shipped)
            .with_books([Book::new("The Guide")])
    }

    #[tokio::test]
    async fn order_lookup_hits_and_misses() {
        let repo = InMemoryOrderRepository::with_orders([order("UR1234567890")]);
        repo.insert(order("BW202405120001")).await;

        let found = repo
            .lookup_order(&OrderNumber::parse("ur1234567890").expect("order number"))
            .await
            .expect("lookup");
        assert_eq!(found.map(|o| o.book_count()), Some(1));

        let second = repo
            .lookup_order(&OrderNumber::parse("BW202405120001").expect("order number"))
            .await
            .expect("lookup");
        assert!(second.is_some());

        let missing = repo
            .lookup_order(&OrderNumber::parse("BW000000000000").expect("order number"))
            .await
            .expect("lookup");
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn session_save_overwrites_and_clear_removes() {
        let repo = InMemorySessionRepository::default();
        let id = SessionId("s-1".to_string());

        let mut session = Session::new(id.clone(), 4);
        repo.save(&session).await.expect("save");

        session.language = Language::Secondary;
        session.active_order = Some(order("UR1234567890"));
        repo.save(&session).await.expect("save again");

        assert_eq!(repo.len().await, 1);
        assert_eq!(repo.load(&id).await.expect("load"), Some(session));

        repo.clear(&id).await.expect("clear");
        assert!(repo.is_empty().await);
        assert_eq!(repo.load(&id).await.expect("load"), None);
    }
}
