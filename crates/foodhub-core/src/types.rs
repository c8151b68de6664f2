//! # Domain Types
//!
//! Core domain types used throughout foodhub.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Dish       │   │      Order      │   │   OrderItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  restaurant_id  │   │  user_id        │   │  order_id (FK)  │       │
//! │  │  name, price    │   │  restaurant_id  │   │  dish_id  (FK)  │       │
//! │  │  categories     │   │  total, status  │   │  quantity       │       │
//! │  │  version        │   │  version        │   │  subtotal       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      User       │   │  OrderStatus    │   │      Role       │       │
//! │  │  email (unique) │   │  created        │   │  admin          │       │
//! │  │  role, version  │   │  in progress    │   │  customer       │       │
//! │  └─────────────────┘   │  ready          │   │  restaurant     │       │
//! │                        │  delivered      │   └─────────────────┘       │
//! │                        │  cancelled      │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Versioned Rows
//! Dish, Order, OrderItem and User all carry a `version` counter. Stores
//! only write a row when the caller's `version` still matches, then bump it.
//! The counter never appears on the wire.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreError;
use crate::money::Money;

// =============================================================================
// Dish
// =============================================================================

/// A menu item offered by a restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Dish {
    pub id: i64,

    /// The restaurant account that owns this dish.
    pub restaurant_id: i64,

    pub name: String,

    pub price: Money,

    pub description: String,

    /// Labels such as "Pizzas" or "Vegan". Stored as a JSON array.
    #[serde(rename = "category")]
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub categories: Vec<String>,

    /// Path of the stored photo, if one was uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,

    /// Server-defaulted to true on insert.
    pub available: bool,

    #[serde(skip)]
    pub version: i64,
}

/// Payload for creating a dish.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDish {
    pub name: String,
    pub price: Money,
    pub description: String,
    pub categories: Vec<String>,
}

impl NewDish {
    /// Builds the unsaved dish for `restaurant_id`.
    ///
    /// `id` and `version` are placeholders until the store assigns them.
    pub fn into_dish(self, restaurant_id: i64) -> Dish {
        Dish {
            id: 0,
            restaurant_id,
            name: self.name,
            price: self.price,
            description: self.description,
            categories: self.categories,
            photo: None,
            available: true,
            version: 0,
        }
    }
}

/// Partial update of a dish. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DishPatch {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub description: Option<String>,
    #[serde(rename = "category")]
    pub categories: Option<Vec<String>>,
    /// `null` clears the photo, a string replaces it.
    #[serde(default, deserialize_with = "present_or_null")]
    pub photo: Option<Option<String>>,
    pub available: Option<bool>,
}

/// Keeps an explicit `null` apart from an absent field.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl DishPatch {
    /// Copies every present field onto `dish`.
    pub fn apply(self, dish: &mut Dish) {
        if let Some(name) = self.name {
            dish.name = name;
        }
        if let Some(price) = self.price {
            dish.price = price;
        }
        if let Some(description) = self.description {
            dish.description = description;
        }
        if let Some(categories) = self.categories {
            dish.categories = categories;
        }
        if let Some(photo) = self.photo {
            dish.photo = photo;
        }
        if let Some(available) = self.available {
            dish.available = available;
        }
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle state of an order.
///
/// Any status may be written over any other; only `Delivered` carries a
/// rule, it freezes the order's items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Created,
    #[serde(rename = "in progress")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "in progress"))]
    InProgress,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Created,
        OrderStatus::InProgress,
        OrderStatus::Ready,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    /// The stored and wire spelling.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::InProgress => "in progress",
            OrderStatus::Ready => "ready",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether items may still be added to or revised on the order.
    pub const fn accepts_item_changes(&self) -> bool {
        !matches!(self, OrderStatus::Delivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::UnknownStatus(s.to_string()))
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer's order at one restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub restaurant_id: i64,

    /// Sum of the order's item subtotals. Maintained by the store.
    pub total: Money,

    pub address: String,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,

    #[serde(skip)]
    pub version: i64,
}

impl Order {
    /// Builds a fresh, empty order.
    ///
    /// `id`, `created_at` and `version` are placeholders until inserted.
    pub fn new(user_id: i64, restaurant_id: i64, address: impl Into<String>) -> Self {
        Order {
            id: 0,
            user_id,
            restaurant_id,
            total: Money::zero(),
            address: address.into(),
            created_at: Utc::now(),
            status: OrderStatus::Created,
            version: 0,
        }
    }

    /// Fails when the order's items are frozen.
    pub fn ensure_accepts_item_changes(&self) -> Result<(), CoreError> {
        if self.status.accepts_item_changes() {
            Ok(())
        } else {
            Err(CoreError::OrderLocked {
                order_id: self.id,
                status: self.status.to_string(),
            })
        }
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
///
/// `subtotal` is a price snapshot: the dish price at insertion time times
/// the quantity. Later dish price changes do not touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub dish_id: i64,
    pub quantity: i64,
    pub subtotal: Money,

    #[serde(skip)]
    pub version: i64,
}

impl OrderItem {
    /// Prices `quantity` units of `dish` for `order_id`.
    ///
    /// ## Example
    /// ```rust
    /// use foodhub_core::{Dish, Money, OrderItem};
    ///
    /// let dish = Dish {
    ///     id: 7,
    ///     restaurant_id: 1,
    ///     name: "Pizza".into(),
    ///     price: Money::new(10.0),
    ///     description: "desc".into(),
    ///     categories: vec!["Pizzas".into()],
    ///     photo: None,
    ///     available: true,
    ///     version: 1,
    /// };
    /// let item = OrderItem::priced(42, &dish, 3);
    /// assert_eq!(item.subtotal, Money::new(30.0));
    /// ```
    pub fn priced(order_id: i64, dish: &Dish, quantity: i64) -> Self {
        OrderItem {
            id: 0,
            order_id,
            dish_id: dish.id,
            quantity,
            subtotal: dish.price * quantity,
            version: 0,
        }
    }
}

/// An order item as shown to API consumers: `{dish, quantity, subtotal}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLine {
    #[serde(rename = "dish")]
    pub dish_name: String,
    pub quantity: i64,
    pub subtotal: Money,
}

// =============================================================================
// User
// =============================================================================

/// What an account is allowed to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
    Restaurant,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
            Role::Restaurant => "restaurant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            "restaurant" => Ok(Role::Restaurant),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// An account: customer, restaurant or admin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,

    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,

    /// Produced and checked by the auth service; opaque here.
    #[serde(skip)]
    pub password_hash: Vec<u8>,

    pub activated: bool,
    pub role: Role,

    #[serde(skip)]
    pub version: i64,
}

impl User {
    /// Builds an unsaved, not yet activated account.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: Vec<u8>,
        role: Role,
    ) -> Self {
        User {
            id: 0,
            photo: None,
            created_at: Utc::now(),
            name: name.into(),
            email: email.into(),
            password_hash,
            activated: false,
            role,
            version: 0,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
