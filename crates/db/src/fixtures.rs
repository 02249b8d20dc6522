use crate::connection::DbPool;
use crate::repositories::RepositoryError;
use sqlx::Executor;

/// Seeded demo orders and the shape each one must have after loading.
const SEED_ORDERS: &[SeedOrderContract] = &[
    SeedOrderContract {
        order_number: "UR1234567890",
        status: "Shipped",
        expected_line_rows: 1,
        expected_unique_books: 1,
        cancellation_reason: None,
        description: "Shipped order with one tracked book",
    },
    SeedOrderContract {
        order_number: "BW202405120001",
        status: "Authorized/Under Processing",
        expected_line_rows: 4,
        expected_unique_books: 3,
        cancellation_reason: None,
        description: "Processing order with a duplicated line item",
    },
    SeedOrderContract {
        order_number: "BW202403150002",
        status: "Cancelled",
        expected_line_rows: 2,
        expected_unique_books: 2,
        cancellation_reason: Some("Customer requested cancellation"),
        description: "Cancelled order with a recorded reason",
    },
    SeedOrderContract {
        order_number: "UR9876543210",
        status: "Cancelled",
        expected_line_rows: 1,
        expected_unique_books: 1,
        cancellation_reason: None,
        description: "Cancelled order without a recorded reason",
    },
    SeedOrderContract {
        order_number: "BW202406010003",
        status: "Pending Authorization",
        expected_line_rows: 0,
        expected_unique_books: 0,
        cancellation_reason: None,
        description: "Order awaiting payment with no line items",
    },
];

/// Demo order store used by `shelfdesk seed` and the integration tests.
///
/// Covers a shipped order, a multi-book order with a duplicate row, cancelled
/// orders with and without a reason, and an order that has no books.
pub struct DemoOrders;

impl DemoOrders {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_orders.sql");

    /// Loads the demo orders. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let orders_seeded = SEED_ORDERS
            .iter()
            .map(|order| OrderSeedInfo {
                order_number: order.order_number,
                status: order.status,
                unique_books: order.expected_unique_books,
                description: order.description,
            })
            .collect();

        Ok(SeedResult { orders_seeded })
    }

    /// Checks every seeded order against its contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for order in SEED_ORDERS {
            let order_exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM customer_order WHERE order_number = ?1 AND status = ?2)",
            )
            .bind(order.order_number)
            .bind(order.status)
            .fetch_one(pool)
            .await?;
            checks.push((order.order_number.to_string(), order_exists == 1));

            let line_rows: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM order_line_item WHERE order_number = ?1")
                    .bind(order.order_number)
                    .fetch_one(pool)
                    .await?;
            checks.push((
                format!("{}:line-rows", order.order_number),
                line_rows == order.expected_line_rows,
            ));

            let unique_books: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM (
                     SELECT DISTINCT product_title, COALESCE(isbn13, '')
                     FROM order_line_item WHERE order_number = ?1
                 )",
            )
            .bind(order.order_number)
            .fetch_one(pool)
            .await?;
            checks.push((
                format!("{}:unique-books", order.order_number),
                unique_books == order.expected_unique_books as i64,
            ));

            let reason: Option<String> = sqlx::query_scalar(
                "SELECT r.reason FROM customer_order o
                 LEFT JOIN order_cancellation_reason r ON r.id = o.cancellation_reason_id
                 WHERE o.order_number = ?1",
            )
            .bind(order.order_number)
            .fetch_optional(pool)
            .await?
            .flatten();
            checks.push((
                format!("{}:cancellation-reason", order.order_number),
                reason.as_deref() == order.cancellation_reason,
            ));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    pub fn order_numbers() -> impl Iterator<Item = &'static str> {
        SEED_ORDERS.iter().map(|order| order.order_number)
    }
}

struct SeedOrderContract {
    order_number: &'static str,
    status: &'static str,
    expected_line_rows: i64,
    expected_unique_books: usize,
    cancellation_reason: Option<&'static str>,
    description: &'static str,
}

#[derive(Debug, Clone)]
pub struct SeedResult {
    pub orders_seeded: Vec<OrderSeedInfo>,
}

#[derive(Debug, Clone)]
pub struct OrderSeedInfo {
    pub order_number: &'static str,
    pub status: &'static str,
    pub unique_books: usize,
    pub description: &'static str,
}

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl VerificationResult {
    pub fn failed_checks(&self) -> impl Iterator<Item = &str> {
        self.checks.iter().filter(|(_, ok)| !*ok).map(|(name, _)| name.as_str())
    }
}
