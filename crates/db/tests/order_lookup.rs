use shelfdesk_core::domain::order::{OrderNumber, OrderStatus};
use shelfdesk_db::repositories::SqlOrderRepository;
use shelfdesk_db::{connect_with_settings, migrations, DbPool, DemoOrders, OrderRepository};

type LookupTestResult<T = ()> = Result<T, String>;

async fn seeded_pool() -> LookupTestResult<DbPool> {
    let pool = connect_with_settings("sqlite::memory:", 1, 5)
        .await
        .map_err(|error| format!("connect failed: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate failed: {error}"))?;
    DemoOrders::load(&pool).await.map_err(|error| format!("seed failed: {error}"))?;
    Ok(pool)
}

fn number(raw: &str) -> LookupTestResult<OrderNumber> {
    OrderNumber::parse(raw).map_err(|error| error.to_string())
}

#[tokio::test]
async fn seeded_store_satisfies_its_contract() -> LookupTestResult {
    let pool = seeded_pool().await?;

    DemoOrders::load(&pool).await.map_err(|error| format!("second seed failed: {error}"))?;
    let verification =
        DemoOrders::verify(&pool).await.map_err(|error| format!("verify failed: {error}"))?;

    let failed = verification.failed_checks().collect::<Vec<_>>();
    if !verification.all_present {
        return Err(format!("failed checks: {failed:?}"));
    }

    pool.close().await;
    Ok(())
}

#[tokio::test]
async fn duplicate_line_items_collapse_to_unique_books() -> LookupTestResult {
    let pool = seeded_pool().await?;
    let repo = SqlOrderRepository::new(pool.clone());

    let order = repo
        .lookup_order(&number("bw202405120001")?)
        .await
        .map_err(|error| error.to_string())?
        .ok_or("order should exist")?;

    let titles = order.books.iter().map(|book| book.product_name.as_str()).collect::<Vec<_>>();
    assert_eq!(
        titles,
        vec!["Atomic Habits", "Sapiens: A Brief History of Humankind", "The Alchemist"]
    );
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.shipping.city.as_deref(), Some("Bengaluru"));

    pool.close().await;
    Ok(())
}

#[tokio::test]
async fn cancelled_orders_expose_reason_only_when_recorded() -> LookupTestResult {
    let pool = seeded_pool().await?;
    let repo = SqlOrderRepository::new(pool.clone());

    let with_reason = repo
        .lookup_order(&number("BW202403150002")?)
        .await
        .map_err(|error| error.to_string())?
        .ok_or("cancelled order should exist")?;
    assert!(with_reason.status.is_cancelled());
    assert_eq!(with_reason.cancellation_reason(), Some("Customer requested cancellation"));

    let without_reason = repo
        .lookup_order(&number("UR9876543210")?)
        .await
        .map_err(|error| error.to_string())?
        .ok_or("cancelled order should exist")?;
    assert!(without_reason.status.is_cancelled());
    assert_eq!(without_reason.cancellation_reason(), None);
    assert_eq!(without_reason.books[0].isbn, None);

    pool.close().await;
    Ok(())
}

#[tokio::test]
async fn order_without_line_items_and_unknown_orders() -> LookupTestResult {
    let pool = seeded_pool().await?;
    let repo = SqlOrderRepository::new(pool.clone());

    let empty = repo
        .lookup_order(&number("BW202406010003")?)
        .await
        .map_err(|error| error.to_string())?
        .ok_or("order should exist")?;
    assert_eq!(empty.book_count(), 0);
    assert_eq!(empty.status, OrderStatus::PendingAuthorization);

    let shipped = repo
        .lookup_order(&number("UR1234567890")?)
        .await
        .map_err(|error| error.to_string())?
        .ok_or("order should exist")?;
    assert_eq!(shipped.tracking_number.as_deref(), Some("DTDC7700112233"));

    let missing =
        repo.lookup_order(&number("BW999999999999")?).await.map_err(|error| error.to_string())?;
    assert!(missing.is_none());

    pool.close().await;
    Ok(())
}
