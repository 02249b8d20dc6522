use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shelfdesk_core::domain::order::{
    Book, OrderNumber, OrderRecord, OrderStatus, ShippingAddress,
};
use sqlx::{sqlite::SqliteRow, Row};

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

/// One row per line item; order-level columns repeat on every row.
const LOOKUP_ORDER_SQL: &str = "
    SELECT
        o.order_number,
        o.purchase_date,
        o.promise_date,
        o.status,
        o.payment_status,
        o.amount,
        o.customer_name,
        o.customer_email,
        r.reason AS cancellation_reason,
        s.address AS shipping_address,
        s.city AS shipping_city,
        s.state AS shipping_state,
        s.zip AS shipping_zip,
        s.country AS shipping_country,
        s.mobile AS shipping_mobile,
        s.tracking_number,
        li.product_title,
        li.isbn13,
        li.tracking_number AS item_tracking_number
    FROM customer_order o
    LEFT JOIN order_cancellation_reason r ON r.id = o.cancellation_reason_id
    LEFT JOIN order_shipping_address s ON s.order_number = o.order_number
    LEFT JOIN order_line_item li ON li.order_number = o.order_number
    WHERE o.order_number = ?1
    ORDER BY li.id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderLineRecord {
    pub order_number: String,
    pub purchase_date: Option<String>,
    pub promise_date: Option<String>,
    pub status: String,
    pub payment_status: Option<String>,
    pub amount: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub cancellation_reason: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_state: Option<String>,
    pub shipping_zip: Option<String>,
    pub shipping_country: Option<String>,
    pub shipping_mobile: Option<String>,
    pub tracking_number: Option<String>,
    pub product_title: Option<String>,
    pub isbn13: Option<String>,
    pub item_tracking_number: Option<String>,
}

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn count_orders(&self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customer_order")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn lookup_order(
        &self,
        order_number: &OrderNumber,
    ) -> Result<Option<OrderRecord>, RepositoryError> {
        let rows = sqlx::query(LOOKUP_ORDER_SQL)
            .bind(order_number.as_str())
            .fetch_all(&self.pool)
            .await?;

        let lines = rows.iter().map(order_line_record_from_row).collect::<Result<Vec<_>, _>>()?;
        assemble_order(lines)
    }
}

/// Folds joined line-item rows into a single order, suppressing duplicate books.
pub fn assemble_order(
    lines: Vec<OrderLineRecord>,
) -> Result<Option<OrderRecord>, RepositoryError> {
    let Some(header) = lines.first() else {
        return Ok(None);
    };

    let order_number = OrderNumber::parse(&header.order_number)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let mut record = OrderRecord::new(order_number, OrderStatus::from_source(&header.status));
    record.purchase_date = parse_date("purchase_date", header.purchase_date.as_deref())?;
    record.promise_date = parse_date("promise_date", header.promise_date.as_deref())?;
    record.payment_status = non_empty(header.payment_status.clone());
    record.amount = parse_amount(header.amount.as_deref())?;
    record.customer_name = non_empty(header.customer_name.clone());
    record.customer_email = non_empty(header.customer_email.clone());
    record.recorded_cancellation_reason = non_empty(header.cancellation_reason.clone());
    record.tracking_number = non_empty(header.tracking_number.clone());
    record.shipping = ShippingAddress {
        address: non_empty(header.shipping_address.clone()),
        city: non_empty(header.shipping_city.clone()),
        state: non_empty(header.shipping_state.clone()),
        zip: non_empty(header.shipping_zip.clone()),
        country: non_empty(header.shipping_country.clone()),
        mobile: non_empty(header.shipping_mobile.clone()),
    };

    let books = lines.into_iter().filter_map(|line| {
        let product_name = non_empty(line.product_title)?;
        Some(Book {
            product_name,
            isbn: non_empty(line.isbn13),
            tracking_number: non_empty(line.item_tracking_number),
        })
    });

    Ok(Some(record.with_books(books)))
}

fn order_line_record_from_row(row: &SqliteRow) -> Result<OrderLineRecord, RepositoryError> {
    Ok(OrderLineRecord {
        order_number: row.try_get("order_number")?,
        purchase_date: row.try_get("purchase_date")?,
        promise_date: row.try_get("promise_date")?,
        status: row.try_get("status")?,
        payment_status: row.try_get("payment_status")?,
        amount: row.try_get("amount")?,
        customer_name: row.try_get("customer_name")?,
        customer_email: row.try_get("customer_email")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        shipping_address: row.try_get("shipping_address")?,
        shipping_city: row.try_get("shipping_city")?,
        shipping_state: row.try_get("shipping_state")?,
        shipping_zip: row.try_get("shipping_zip")?,
        shipping_country: row.try_get("shipping_country")?,
        shipping_mobile: row.try_get("shipping_mobile")?,
        tracking_number: row.try_get("tracking_number")?,
        product_title: row.try_get("product_title")?,
        isbn13: row.try_get("isbn13")?,
        item_tracking_number: row.try_get("item_tracking_number")?,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, RepositoryError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    // Accepts both `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS` style timestamps.
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(|error| RepositoryError::Decode(format!("invalid {field} `{raw}`: {error}")))
}

fn parse_amount(raw: Option<&str>) -> Result<Option<Decimal>, RepositoryError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };

    Decimal::from_str(raw)
        .map(Some)
        .map_err(|error| RepositoryError::Decode(format!("invalid amount `{raw}`: {error}")))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use shelfdesk_core::domain::order::OrderStatus;

    use super::{assemble_order, OrderLineRecord};
    use crate::repositories::RepositoryError;

    fn line(title: Option<&str>, isbn: Option<&str>) -> OrderLineRecord {
        OrderLineRecord {
            order_number: "bw202405120001".to_string(),
            purchase_date: Some("2025-03-12 10:15:00".to_string()),
            promise_date: Some("2025-03-20".to_string()),
            status: "Cancelled".to_string(),
            payment_status: Some("Refunded".to_string()),
            amount: Some("1647.50".to_string()),
            customer_name: Some("Rohan Mehta".to_string()),
            customer_email: Some(" ".to_string()),
            cancellation_reason: Some("Customer requested cancellation".to_string()),
            shipping_address: None,
            shipping_city: Some("Bengaluru".to_string()),
            shipping_state: None,
            shipping_zip: None,
            shipping_country: Some("India".to_string()),
            shipping_mobile: None,
            tracking_number: None,
            product_title: title.map(str::to_string),
            isbn13: isbn.map(str::to_string),
            item_tracking_number: None,
        }
    }

    #[test]
    fn empty_result_set_is_not_found() {
        assert_eq!(assemble_order(Vec::new()).expect("assemble"), None);
    }

    #[test]
    fn repeated_rows_collapse_into_one_order_with_unique_books() {
        let record = assemble_order(vec![
            line(Some("Atomic Habits"), Some("9780735211292")),
            line(Some("Sapiens"), Some("9780062316097")),
            line(Some("Sapiens"), Some("9780062316097")),
            line(Some("Untitled Notebook"), None),
            line(Some("Untitled Notebook"), None),
        ])
        .expect("assemble")
        .expect("order present");

        assert_eq!(record.order_number.as_str(), "BW202405120001");
        assert_eq!(record.status, OrderStatus::Cancelled);
        assert_eq!(record.book_count(), 3);
        assert_eq!(record.amount, Some(Decimal::new(164750, 2)));
        assert_eq!(record.customer_email, None);
        assert_eq!(record.cancellation_reason(), Some("Customer requested cancellation"));
        assert_eq!(record.purchase_date.map(|d| d.to_string()), Some("2025-03-12".to_string()));
    }

    #[test]
    fn order_without_line_items_has_no_books() {
        let record = assemble_order(vec![line(None, None)]).expect("assemble").expect("order");
        assert!(record.books.is_empty());
    }

    #[test]
    fn malformed_amount_is_a_decode_error() {
        let mut bad = line(Some("Atomic Habits"), None);
        bad.amount = Some("twelve".to_string());

        let error = assemble_order(vec![bad]).expect_err("amount should fail");
        assert!(matches!(error, RepositoryError::Decode(message) if message.contains("amount")));
    }
}
