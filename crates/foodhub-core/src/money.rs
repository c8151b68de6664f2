//! # Money Module
//!
//! Provides the `Money` type used for every monetary field: dish price,
//! order total and order-item subtotal.
//!
//! ## Wire Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  MONEY ON THE WIRE                                                      │
//! │                                                                         │
//! │  Rust value          JSON                                               │
//! │  ──────────          ────                                               │
//! │  Money(12.5)   ───►  "$12.5"                                            │
//! │  Money(15.0)   ───►  "$15"                                              │
//! │  Money(0.99)   ───►  "$0.99"                                            │
//! │                                                                         │
//! │  Decoding strips the leading `$` and parses the rest as f64.            │
//! │  "12.5", "$abc", "$", 12.5 (bare number) → MoneyError::InvalidFormat    │
//! │                                                                         │
//! │  decode(encode(x)) == x for every finite x                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use foodhub_core::money::Money;
//!
//! let price = Money::decode("$10").unwrap();
//! let subtotal = price * 3;
//! assert_eq!(subtotal.encode(), "$30");
//! ```

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Prefix every encoded amount starts with.
const CURRENCY_PREFIX: char = '$';

// =============================================================================
// Errors
// =============================================================================

/// Failure to decode a money string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The input was not `$` followed by a finite number.
    #[error("invalid price format: {0:?}")]
    InvalidFormat(String),
}

// =============================================================================
// Money Type
// =============================================================================

/// A currency amount.
///
/// Stored as a 64-bit float, which is also how it is persisted (a REAL
/// column). Equality and ordering are plain numeric comparison.
///
/// ## Where Money Flows
/// ```text
/// Dish.price ──► × quantity ──► OrderItem.subtotal ──► += Order.total
///   (snapshot taken when the item is inserted, never re-read later)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(f64);

impl Money {
    /// Wraps a raw amount.
    #[inline]
    pub const fn new(amount: f64) -> Self {
        Money(amount)
    }

    /// Returns the raw amount.
    #[inline]
    pub const fn amount(&self) -> f64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0.0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    /// Checks if the value is strictly greater than zero.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > 0.0
    }

    /// Multiplies a unit price by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use foodhub_core::money::Money;
    ///
    /// let unit_price = Money::new(10.0);
    /// assert_eq!(unit_price.multiply_quantity(3), Money::new(30.0));
    /// ```
    #[inline]
    pub fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty as f64)
    }

    /// Encodes the amount in its canonical wire form, e.g. `"$12.5"`.
    ///
    /// Uses the shortest representation that parses back to the same
    /// float, so `decode(encode(x)) == x`.
    pub fn encode(&self) -> String {
        format!("{}{}", CURRENCY_PREFIX, self.0)
    }

    /// Decodes the canonical wire form.
    ///
    /// ## Example
    /// ```rust
    /// use foodhub_core::money::{Money, MoneyError};
    ///
    /// assert_eq!(Money::decode("$12.5"), Ok(Money::new(12.5)));
    /// assert!(matches!(Money::decode("12.5"), Err(MoneyError::InvalidFormat(_))));
    /// ```
    pub fn decode(s: &str) -> Result<Self, MoneyError> {
        let invalid = || MoneyError::InvalidFormat(s.to_string());

        let number = s.strip_prefix(CURRENCY_PREFIX).ok_or_else(invalid)?;
        let amount: f64 = number.parse().map_err(|_| invalid())?;

        // f64::from_str accepts "inf" and "NaN"; neither is a price
        if !amount.is_finite() {
            return Err(invalid());
        }

        Ok(Money(amount))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display uses the wire encoding.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CURRENCY_PREFIX, self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::decode(s)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Multiplication by a quantity.
///
/// ```rust
/// use foodhub_core::money::Money;
///
/// let quantity: i64 = 4;
/// assert_eq!(Money::new(2.25) * quantity, Money::new(9.0));
/// assert_eq!(Money::new(10.0) * 3, Money::new(30.0));
/// ```
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Serde
// =============================================================================

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string such as \"$12.5\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::decode(v).map_err(E::custom)
    }

    // Bare JSON numbers are rejected with the same error as bad strings
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        Err(E::custom(MoneyError::InvalidFormat(v.to_string())))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        Err(E::custom(MoneyError::InvalidFormat(v.to_string())))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        Err(E::custom(MoneyError::InvalidFormat(v.to_string())))
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
