//! # Repository Module
//!
//! Database repository implementations for foodhub.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Request handler                                                       │
//! │       │                                                                 │
//! │       │  db.order_items().add_to_order(rid, oid, uid, dish, 3)        │
//! │       ▼                                                                 │
//! │  OrderItemRepository                                                   │
//! │  ├── with_deadline(query_timeout, ...)   every call is bounded         │
//! │  └── one transaction: total += subtotal, insert item                   │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Optimistic Locking
//! Versioned writes use `WHERE id = ? AND version = ?`. When nothing
//! matches, [`missed_write`] probes for the row to tell a missing row
//! (NotFound) from a stale version (EditConflict).
//!
//! ## Available Repositories
//!
//! - [`DishRepository`](dish::DishRepository) - Dish CRUD and search
//! - [`OrderRepository`](order::OrderRepository) - Order CRUD and listing
//! - [`OrderItemRepository`](order_item::OrderItemRepository) - Line items and order totals
//! - [`UserRepository`](user::UserRepository) - Accounts

pub mod dish;
pub mod order;
pub mod order_item;
pub mod user;

use std::future::Future;
use std::time::Duration;

use sqlx::{Executor, Sqlite};
use tracing::warn;

use crate::error::{DbError, DbResult};

/// Runs `fut`, abandoning it once `deadline` passes.
///
/// A transaction still open inside `fut` is rolled back when it is dropped.
pub(crate) async fn with_deadline<T, F>(
    deadline: Duration,
    operation: &'static str,
    fut: F,
) -> DbResult<T>
where
    F: Future<Output = DbResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(
                operation,
                deadline_ms = deadline.as_millis() as u64,
                "Database call exceeded its deadline"
            );
            Err(DbError::Timeout {
                operation,
                after: deadline,
            })
        }
    }
}

/// Explains why a versioned write touched no row.
pub(crate) async fn missed_write<'e, E>(
    executor: E,
    table: &'static str,
    entity: &'static str,
    id: i64,
) -> DbError
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE id = ?)");

    match sqlx::query_scalar::<_, bool>(&sql)
        .bind(id)
        .fetch_one(executor)
        .await
    {
        Ok(true) => {
            warn!(entity, id, "Edit conflict");
            DbError::edit_conflict(entity, id)
        }
        Ok(false) => DbError::not_found(entity, id),
        Err(e) => e.into(),
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================
