//! # Validation Module
//!
//! Field rules for dishes, orders, order items and users.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request decoding (caller)                                    │
//! │  ├── Unknown JSON fields rejected                                      │
//! │  └── Money must be "$<number>"                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── One rule function per field (first failure only)                  │
//! │  └── Entity validators collect every failing field                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE email                                                      │
//! │  └── Foreign keys (order → user, item → dish)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use foodhub_core::validation::{validate_quantity, validate_status};
//! use foodhub_core::OrderStatus;
//!
//! assert!(validate_quantity(2).is_ok());
//! assert!(validate_quantity(0).is_err());
//! assert_eq!(validate_status("ready").unwrap(), OrderStatus::Ready);
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ValidationError, ValidationErrors};
use crate::money::Money;
use crate::types::{Dish, Order, OrderItem, OrderStatus, User};
use crate::{
    MAX_DISH_CATEGORIES, MAX_DISH_DESCRIPTION_CHARS, MAX_DISH_NAME_CHARS, MAX_USER_NAME_BYTES,
    MIN_DISH_CATEGORIES,
};

/// Result type for single-field rules.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Validator
// =============================================================================

/// Collects field failures across several rules.
///
/// ```rust
/// use foodhub_core::validation::{validate_address, validate_quantity, Validator};
///
/// let mut v = Validator::new();
/// v.check(validate_address(""));
/// v.check(validate_quantity(-1));
/// assert_eq!(v.finish().unwrap_err().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the failure of `result`, if any.
    pub fn check<T>(&mut self, result: ValidationResult<T>) {
        if let Err(error) = result {
            self.errors.add(error);
        }
    }

    /// Ok when no rule failed, otherwise every failing field.
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

fn required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Dish Rules
// =============================================================================

/// Validates a dish name.
///
/// ## Rules
/// - Must not be empty
/// - At most 100 characters (Unicode scalar values, not bytes)
///
/// ## Example
/// ```rust
/// use foodhub_core::validation::validate_dish_name;
///
/// assert!(validate_dish_name("Margherita").is_ok());
/// assert!(validate_dish_name("").is_err());
/// assert!(validate_dish_name(&"é".repeat(100)).is_ok());
/// ```
pub fn validate_dish_name(name: &str) -> ValidationResult<()> {
    required("name", name)?;

    if name.chars().count() > MAX_DISH_NAME_CHARS {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_DISH_NAME_CHARS,
        });
    }

    Ok(())
}

/// Validates a dish price: strictly greater than zero.
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if !price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "price".to_string(),
        });
    }
    Ok(())
}

/// Validates a dish description: required, at most 280 characters.
pub fn validate_description(description: &str) -> ValidationResult<()> {
    required("description", description)?;

    if description.chars().count() > MAX_DISH_DESCRIPTION_CHARS {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DISH_DESCRIPTION_CHARS,
        });
    }

    Ok(())
}

/// Validates a dish's category list.
///
/// ## Rules
/// - At least 1 entry
/// - At most 5 entries
/// - No entry repeated
pub fn validate_categories(categories: &[String]) -> ValidationResult<()> {
    if categories.len() < MIN_DISH_CATEGORIES {
        return Err(ValidationError::TooFew {
            field: "categories".to_string(),
            min: MIN_DISH_CATEGORIES,
        });
    }

    if categories.len() > MAX_DISH_CATEGORIES {
        return Err(ValidationError::TooMany {
            field: "categories".to_string(),
            max: MAX_DISH_CATEGORIES,
        });
    }

    let mut seen = HashSet::with_capacity(categories.len());
    if !categories.iter().all(|c| seen.insert(c.as_str())) {
        return Err(ValidationError::NotUnique {
            field: "categories".to_string(),
        });
    }

    Ok(())
}

/// Validates every field of a dish, reporting all failures at once.
///
/// ## Example
/// ```rust
/// use foodhub_core::validation::validate_dish;
/// use foodhub_core::{Money, NewDish};
///
/// let dish = NewDish {
///     name: String::new(),
///     price: Money::new(0.0),
///     description: "Thin crust".into(),
///     categories: vec!["Pizzas".into()],
/// }
/// .into_dish(1);
///
/// let errors = validate_dish(&dish).unwrap_err();
/// assert!(errors.get("name").is_some());
/// assert!(errors.get("price").is_some());
/// assert!(errors.get("description").is_none());
/// ```
pub fn validate_dish(dish: &Dish) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();
    v.check(validate_dish_name(&dish.name));
    v.check(validate_price(dish.price));
    v.check(validate_description(&dish.description));
    v.check(validate_categories(&dish.categories));
    v.finish()
}

// =============================================================================
// Order Rules
// =============================================================================

/// Validates a delivery address: must not be empty.
pub fn validate_address(address: &str) -> ValidationResult<()> {
    required("address", address)
}

/// Parses and validates an order status string.
///
/// Any of the five statuses is accepted regardless of the order's current
/// status.
pub fn validate_status(status: &str) -> ValidationResult<OrderStatus> {
    required("status", status)?;

    status
        .parse::<OrderStatus>()
        .map_err(|_| ValidationError::NotAllowed {
            field: "status".to_string(),
            allowed: OrderStatus::ALL.iter().map(|s| s.to_string()).collect(),
        })
}

/// Validates an order before it is inserted or updated.
pub fn validate_order(order: &Order) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();
    v.check(validate_address(&order.address));
    v.finish()
}

// =============================================================================
// Order Item Rules
// =============================================================================

/// Validates an order item quantity.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Order: Add Item                                                        │
/// │                                                                         │
/// │  Customer asks for 3 pizzas                                            │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(3) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0? → "quantity must be a positive number"             │
/// │       │                                                                 │
/// │       └── OK → subtotal = price × 3, order total += subtotal           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

pub fn validate_order_item(item: &OrderItem) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();
    v.check(validate_quantity(item.quantity));
    v.finish()
}

// =============================================================================
// User Rules
// =============================================================================

/// Validates a user's display name: required, at most 500 bytes.
pub fn validate_user_name(name: &str) -> ValidationResult<()> {
    required("name", name)?;

    if name.len() > MAX_USER_NAME_BYTES {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_USER_NAME_BYTES,
        });
    }

    Ok(())
}

static EMAIL_RX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is valid")
});

/// Validates an email address.
///
/// Accepts `local@domain` where the domain is dot-separated labels of
/// letters, digits and inner hyphens, each at most 63 characters.
///
/// ## Example
/// ```rust
/// use foodhub_core::validation::validate_email;
///
/// assert!(validate_email("alice@example.com").is_ok());
/// assert!(validate_email("alice@").is_err());
/// assert!(validate_email("not an email").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    required("email", email)?;

    if !EMAIL_RX.is_match(email) {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must be a valid email address".to_string(),
        });
    }

    Ok(())
}

pub fn validate_user(user: &User) -> Result<(), ValidationErrors> {
    let mut v = Validator::new();
    v.check(validate_user_name(&user.name));
    v.check(validate_email(&user.email));
    v.finish()
}

// =============================================================================
// Unit Tests
// =============================================================================
