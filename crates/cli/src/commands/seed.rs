use shelfdesk_db::{DemoOrders, OrderSeedInfo};

use crate::commands::{async_runtime, load_config, prepared_pool, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match async_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = prepared_pool(&config).await?;

        let seeded = DemoOrders::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
        let verification = DemoOrders::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result = if verification.all_present {
            Ok(seeded.orders_seeded)
        } else {
            Err((
                "seed_verification",
                verification_failure_message(verification.failed_checks()),
                6u8,
            ))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(orders) => CommandResult::success("seed", seed_summary(&orders)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seed_summary(orders: &[OrderSeedInfo]) -> String {
    let lines = orders
        .iter()
        .map(|order| {
            format!(
                "  - {}: {} ({} book(s), {})",
                order.order_number, order.status, order.unique_books, order.description
            )
        })
        .collect::<Vec<_>>();
    format!("demo orders loaded ({}):\n{}", orders.len(), lines.join("\n"))
}

fn verification_failure_message<'a>(failed: impl Iterator<Item = &'a str>) -> String {
    let failed = failed.collect::<Vec<_>>();
    if failed.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed.join(", "))
    }
}
