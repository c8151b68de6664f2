//! # Filters Module
//!
//! Pagination and sorting parameters for list queries, plus the pagination
//! metadata returned alongside each page.
//!
//! ## Sort Safety
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "?sort=-price"                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Filters.sort = "-price"      (caller-controlled String)                │
//! │       │                                                                 │
//! │       ▼  sort_column() looks it up in the safelist                      │
//! │  "-price" ∈ DISH_SORT_SAFELIST ──► "price"  (&'static str owned here)  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ORDER BY price DESC, id ASC                                            │
//! │                                                                         │
//! │  Only strings from the safelist ever reach SQL text.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationErrors};
use crate::types::OrderStatus;
use crate::validation::{validate_status, Validator};

/// Highest page number a caller may request.
pub const MAX_PAGE: i64 = 10_000_000;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Sort keys accepted when listing dishes.
pub const DISH_SORT_SAFELIST: &[&str] = &[
    "id",
    "name",
    "price",
    "available",
    "-id",
    "-name",
    "-price",
    "-available",
];

/// Sort keys accepted when listing orders.
pub const ORDER_SORT_SAFELIST: &[&str] = &["id", "total", "status", "-id", "-total", "-status"];

// =============================================================================
// Sort Direction
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Page, page size and sort key for one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,

    /// A column name, optionally prefixed with `-` for descending.
    pub sort: String,

    /// The sort keys this listing accepts.
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    pub fn new(
        page: i64,
        page_size: i64,
        sort: impl Into<String>,
        sort_safelist: &'static [&'static str],
    ) -> Self {
        Filters {
            page,
            page_size,
            sort: sort.into(),
            sort_safelist,
        }
    }

    /// Defaults for listing dishes: page 1 of 20, sorted by id.
    pub fn for_dishes() -> Self {
        Filters::new(1, 20, "id", DISH_SORT_SAFELIST)
    }

    /// Defaults for listing orders: page 1 of 50, sorted by id.
    pub fn for_orders() -> Self {
        Filters::new(1, 50, "id", ORDER_SORT_SAFELIST)
    }

    /// Reads `page`, `page_size` and `sort` from query parameters, falling
    /// back to `defaults` for each one that is absent, then validates.
    ///
    /// ## Example
    /// ```rust
    /// use std::collections::HashMap;
    /// use foodhub_core::filters::Filters;
    ///
    /// let params = HashMap::from([
    ///     ("page".to_string(), "2".to_string()),
    ///     ("sort".to_string(), "-price".to_string()),
    /// ]);
    /// let filters = Filters::from_query(&params, Filters::for_dishes()).unwrap();
    /// assert_eq!(filters.offset(), 20);
    /// assert_eq!(filters.sort_column().unwrap(), "price");
    /// ```
    pub fn from_query(
        params: &HashMap<String, String>,
        defaults: Filters,
    ) -> Result<Self, ValidationErrors> {
        let mut v = Validator::new();

        let page = read_int(params, "page", defaults.page);
        let page_size = read_int(params, "page_size", defaults.page_size);
        let filters = Filters {
            page: page.clone().unwrap_or(defaults.page),
            page_size: page_size.clone().unwrap_or(defaults.page_size),
            sort: params
                .get("sort")
                .cloned()
                .unwrap_or_else(|| defaults.sort.clone()),
            sort_safelist: defaults.sort_safelist,
        };

        // Parse failures win over range failures on the same field
        v.check(page);
        v.check(page_size);
        if let Err(errors) = filters.validate() {
            for error in errors.iter() {
                v.check::<()>(Err(error.clone()));
            }
        }

        v.finish().map(|()| filters)
    }

    /// Checks page and page size bounds and the sort key.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut v = Validator::new();

        if !(1..=MAX_PAGE).contains(&self.page) {
            v.check::<()>(Err(ValidationError::OutOfRange {
                field: "page".to_string(),
                min: 1,
                max: MAX_PAGE,
            }));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            v.check::<()>(Err(ValidationError::OutOfRange {
                field: "page_size".to_string(),
                min: 1,
                max: MAX_PAGE_SIZE,
            }));
        }

        v.check(self.safelisted_sort());
        v.finish()
    }

    fn safelisted_sort(&self) -> Result<&'static str, ValidationError> {
        self.sort_safelist
            .iter()
            .copied()
            .find(|candidate| *candidate == self.sort)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "sort".to_string(),
                allowed: self.sort_safelist.iter().map(|s| s.to_string()).collect(),
            })
    }

    /// The column to sort by, taken from the safelist rather than from the
    /// caller's string.
    pub fn sort_column(&self) -> Result<&'static str, ValidationErrors> {
        let key = self.safelisted_sort()?;
        Ok(key.trim_start_matches('-'))
    }

    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

fn read_int(params: &HashMap<String, String>, key: &str, default: i64) -> Result<i64, ValidationError> {
    match params.get(key) {
        None => Ok(default),
        Some(raw) if raw.is_empty() => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ValidationError::InvalidFormat {
            field: key.to_string(),
            reason: "must be an integer value".to_string(),
        }),
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Pagination metadata for one page of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

impl Metadata {
    /// Builds metadata for a page. An empty result gives all-zero metadata.
    ///
    /// ```rust
    /// use foodhub_core::filters::Metadata;
    ///
    /// let m = Metadata::calculate(45, 2, 20);
    /// assert_eq!(m.last_page, 3);
    /// assert_eq!(Metadata::calculate(0, 1, 20), Metadata::default());
    /// ```
    pub fn calculate(total_records: i64, page: i64, page_size: i64) -> Self {
        if total_records == 0 || page_size <= 0 {
            return Metadata::default();
        }

        Metadata {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: (total_records + page_size - 1) / page_size,
            total_records,
        }
    }
}

// =============================================================================
// Dish Query
// =============================================================================

/// Search conditions for listing dishes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DishQuery {
    /// Full-text search over dish names. Empty means no condition.
    pub name: String,

    /// Every listed category must be present on a dish. Empty means any.
    pub categories: Vec<String>,

    /// Restrict to available or unavailable dishes.
    pub available: Option<bool>,
}

impl DishQuery {
    /// Reads `name`, `categories` (comma-separated, `category` also
    /// accepted) and `available` from query parameters.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, ValidationErrors> {
        let mut v = Validator::new();

        let categories = params
            .get("categories")
            .or_else(|| params.get("category"))
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let available = match params.get("available").map(String::as_str) {
            None | Some("") => Ok(None),
            Some("1" | "t" | "T" | "true" | "TRUE" | "True") => Ok(Some(true)),
            Some("0" | "f" | "F" | "false" | "FALSE" | "False") => Ok(Some(false)),
            Some(_) => Err(ValidationError::InvalidFormat {
                field: "available".to_string(),
                reason: "must be a boolean value".to_string(),
            }),
        };

        let query = DishQuery {
            name: params.get("name").cloned().unwrap_or_default(),
            categories,
            available: available.clone().unwrap_or(None),
        };
        v.check(available);

        v.finish().map(|()| query)
    }
}

// =============================================================================
// Order Query
// =============================================================================

/// Search conditions for listing orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
}

impl OrderQuery {
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, ValidationErrors> {
        match params.get("status").map(String::as_str) {
            None | Some("") => Ok(OrderQuery::default()),
            Some(raw) => Ok(OrderQuery {
                status: Some(validate_status(raw)?),
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
