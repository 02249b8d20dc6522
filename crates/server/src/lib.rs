//! HTTP front end for the order-support assistant.

pub mod bootstrap;
pub mod chat;
pub mod health;

use axum::Router;
use shelfdesk_db::DbPool;

use crate::chat::ChatState;

/// Chat API and readiness probe on one router.
pub fn router(chat: ChatState, db_pool: DbPool) -> Router {
    chat::router(chat).merge(health::router(db_pool))
}
