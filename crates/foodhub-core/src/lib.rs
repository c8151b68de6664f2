//! # foodhub-core: Domain Rules for Foodhub
//!
//! Types and rules shared by every part of the foodhub persistence layer,
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Foodhub Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              HTTP handlers (calling service)                    │   │
//! │  │    list dishes, place order, add item, change status           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ foodhub-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  filters  │  │ validation│  │   │
//! │  │   │   Dish    │  │   Money   │  │  Filters  │  │   rules   │  │   │
//! │  │   │   Order   │  │  "$12.5"  │  │  Metadata │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  foodhub-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Dish, Order, OrderItem, User)
//! - [`money`] - Money type and its `"$12.5"` wire format
//! - [`filters`] - Pagination, sort safelists, list metadata
//! - [`error`] - Domain error types
//! - [`validation`] - Field rules
//!
//! ## Example Usage
//!
//! ```rust
//! use foodhub_core::{Money, NewDish};
//! use foodhub_core::validation::validate_dish;
//!
//! let dish = NewDish {
//!     name: "Margherita".into(),
//!     price: "$12.5".parse::<Money>().unwrap(),
//!     description: "Tomato, mozzarella, basil".into(),
//!     categories: vec!["Pizzas".into()],
//! }
//! .into_dish(1);
//!
//! assert!(validate_dish(&dish).is_ok());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod filters;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError, ValidationErrors};
pub use filters::{DishQuery, Filters, Metadata, OrderQuery, SortDirection};
pub use money::{Money, MoneyError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Longest dish name, in characters.
pub const MAX_DISH_NAME_CHARS: usize = 100;

/// Longest dish description, in characters.
pub const MAX_DISH_DESCRIPTION_CHARS: usize = 280;

/// Fewest categories a dish may carry.
pub const MIN_DISH_CATEGORIES: usize = 1;

/// Most categories a dish may carry.
pub const MAX_DISH_CATEGORIES: usize = 5;

/// Longest user name, in bytes.
pub const MAX_USER_NAME_BYTES: usize = 500;
