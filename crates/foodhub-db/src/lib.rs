//! # foodhub-db: Database Layer for Foodhub
//!
//! This crate provides database access for the Foodhub ordering backend.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Foodhub Data Flow                                │
//! │                                                                         │
//! │  Request handler (add dish to order)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    foodhub-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │ (repository/)  │   │  (embedded)  │   │   │
//! │  │   │               │    │                │   │              │   │   │
//! │  │   │ SqlitePool    │    │ DishRepo       │   │ 001_init.sql │   │   │
//! │  │   │ Deadlines     │◄───│ OrderRepo      │   │ 002_fts.sql  │   │   │
//! │  │   │ Health check  │    │ OrderItemRepo  │   │              │   │   │
//! │  │   │               │    │ UserRepo       │   │              │   │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Pool settings, from code or environment
//! - [`pool`] - Connection pool creation and repository access
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (dish, order, order item, user)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use foodhub_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/foodhub.db")).await?;
//!
//! // Order total and line item are written together
//! let item = db
//!     .order_items()
//!     .add_to_order(restaurant_id, order_id, user_id, dish_id, 3)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, DbConfig};
pub use error::{DbError, DbResult};
pub use pool::Database;

// Repository re-exports for convenience
pub use repository::dish::DishRepository;
pub use repository::order::OrderRepository;
pub use repository::order_item::OrderItemRepository;
pub use repository::user::UserRepository;
