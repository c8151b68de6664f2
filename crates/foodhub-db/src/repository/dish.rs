//! # Dish Repository
//!
//! Database operations for dishes.
//!
//! ## Key Operations
//! - CRUD with optimistic locking on update
//! - Filtered, sorted, paginated listing
//! - Photo file cleanup on delete
//!
//! ## Listing Query
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ?name=cheese pizza&categories=Vegan&available=true&sort=-price         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT COUNT(*) OVER() AS total_records, dishes.*                     │
//! │  FROM dishes                                                            │
//! │  WHERE dishes.id IN (SELECT rowid FROM dishes_fts                      │
//! │                      WHERE dishes_fts MATCH '"cheese" "pizza"')        │
//! │    AND NOT EXISTS (requested category missing from dishes.categories)  │
//! │    AND dishes.available = 1                                            │
//! │  ORDER BY dishes.price DESC, dishes.id ASC                             │
//! │  LIMIT 20 OFFSET 0                                                      │
//! │                                                                         │
//! │  Each absent condition is left out entirely. The window count gives    │
//! │  the total for pagination metadata from the same query.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::io::ErrorKind;
use std::time::Duration;

use foodhub_core::validation::validate_dish;
use foodhub_core::{Dish, DishQuery, Filters, Metadata};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn};

use super::{missed_write, with_deadline};
use crate::error::{DbError, DbResult};

const DISH_COLUMNS: &str = "dishes.id, dishes.restaurant_id, dishes.name, dishes.price, \
     dishes.description, dishes.categories, dishes.photo, dishes.available, dishes.version";

#[derive(sqlx::FromRow)]
struct CountedDish {
    total_records: i64,
    #[sqlx(flatten)]
    dish: Dish,
}

/// Builds an FTS5 query requiring every word of `term`.
///
/// Each word is quoted so FTS5 operators typed by the caller are matched
/// as plain text. Returns None for a blank term.
fn fts_match_expression(term: &str) -> Option<String> {
    let words: Vec<String> = term
        .split_whitespace()
        .map(|word| format!("\"{}\"", word.replace('"', "\"\"")))
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Repository for dish database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.dishes();
///
/// let (dishes, metadata) = repo.list_all(&DishQuery::default(), &Filters::for_dishes()).await?;
/// let dish = repo.get_for_restaurant(7, restaurant.id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DishRepository {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl DishRepository {
    /// Creates a new DishRepository.
    pub fn new(pool: SqlitePool, query_timeout: Duration) -> Self {
        DishRepository {
            pool,
            query_timeout,
        }
    }

    /// Inserts a new dish.
    ///
    /// Fills in `id`, `available` (always true for a new dish) and
    /// `version`.
    pub async fn insert(&self, dish: &mut Dish) -> DbResult<()> {
        validate_dish(dish)?;

        debug!(
            restaurant_id = dish.restaurant_id,
            name = %dish.name,
            "Inserting dish"
        );

        let (id, available, version): (i64, bool, i64) =
            with_deadline(self.query_timeout, "dishes.insert", async {
                Ok::<_, DbError>(sqlx::query_as(
                    r#"
                    INSERT INTO dishes (restaurant_id, name, price, description, categories, photo)
                    VALUES (?, ?, ?, ?, ?, ?)
                    RETURNING id, available, version
                    "#,
                )
                .bind(dish.restaurant_id)
                .bind(&dish.name)
                .bind(dish.price)
                .bind(&dish.description)
                .bind(Json(&dish.categories))
                .bind(&dish.photo)
                .fetch_one(&self.pool)
                .await?)
            })
            .await?;

        dish.id = id;
        dish.available = available;
        dish.version = version;
        Ok(())
    }

    /// Gets a dish by its ID.
    pub async fn get(&self, id: i64) -> DbResult<Dish> {
        debug!(id, "Fetching dish");

        let sql = format!("SELECT {DISH_COLUMNS} FROM dishes WHERE dishes.id = ?");
        with_deadline(self.query_timeout, "dishes.get", async {
            sqlx::query_as::<_, Dish>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("Dish", id))
        })
        .await
    }

    /// Gets a dish only if `restaurant_id` owns it.
    ///
    /// A dish owned by someone else is reported as not found.
    pub async fn get_for_restaurant(&self, id: i64, restaurant_id: i64) -> DbResult<Dish> {
        debug!(id, restaurant_id, "Fetching restaurant dish");

        let sql = format!(
            "SELECT {DISH_COLUMNS} FROM dishes WHERE dishes.id = ? AND dishes.restaurant_id = ?"
        );
        with_deadline(self.query_timeout, "dishes.get_for_restaurant", async {
            sqlx::query_as::<_, Dish>(&sql)
                .bind(id)
                .bind(restaurant_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("Dish", id))
        })
        .await
    }

    /// Writes every mutable field of the dish, guarded by `version`.
    ///
    /// ## Returns
    /// * `Ok(())` - Update successful, `dish.version` bumped
    /// * `Err(DbError::EditConflict)` - Someone else updated first
    /// * `Err(DbError::NotFound)` - Dish doesn't exist
    pub async fn update(&self, dish: &mut Dish) -> DbResult<()> {
        validate_dish(dish)?;

        debug!(id = dish.id, version = dish.version, "Updating dish");

        let new_version = with_deadline(self.query_timeout, "dishes.update", async {
            let row: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE dishes SET
                    name = ?,
                    price = ?,
                    description = ?,
                    categories = ?,
                    photo = ?,
                    available = ?,
                    version = version + 1
                WHERE id = ? AND version = ?
                RETURNING version
                "#,
            )
            .bind(&dish.name)
            .bind(dish.price)
            .bind(&dish.description)
            .bind(Json(&dish.categories))
            .bind(&dish.photo)
            .bind(dish.available)
            .bind(dish.id)
            .bind(dish.version)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some(version) => Ok(version),
                None => Err(missed_write(&self.pool, "dishes", "Dish", dish.id).await),
            }
        })
        .await?;

        dish.version = new_version;
        Ok(())
    }

    /// Deletes a dish, then removes its photo file.
    ///
    /// The file removal happens after the row is gone and is not part of
    /// any transaction. A photo that is already missing is ignored; any
    /// other failure is reported as `PhotoCleanupFailed` even though the
    /// dish itself was deleted.
    ///
    /// Fails with `ForeignKeyViolation` while order items still reference
    /// the dish.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting dish");

        let deleted: Option<Option<String>> =
            with_deadline(self.query_timeout, "dishes.delete", async {
                Ok(
                    sqlx::query_scalar("DELETE FROM dishes WHERE id = ? RETURNING photo")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await?,
                )
            })
            .await?;

        let photo = deleted.ok_or_else(|| DbError::not_found("Dish", id))?;

        if let Some(path) = photo {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!(id, path = %path, "Removed dish photo"),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(id, path = %path, "Dish photo already gone")
                }
                Err(source) => {
                    warn!(id, path = %path, error = %source, "Failed to remove dish photo");
                    return Err(DbError::PhotoCleanupFailed { path, source });
                }
            }
        }

        Ok(())
    }

    /// Lists dishes from every restaurant.
    pub async fn list_all(
        &self,
        query: &DishQuery,
        filters: &Filters,
    ) -> DbResult<(Vec<Dish>, Metadata)> {
        self.list(None, query, filters).await
    }

    /// Lists the dishes of one restaurant.
    pub async fn list_for_restaurant(
        &self,
        restaurant_id: i64,
        query: &DishQuery,
        filters: &Filters,
    ) -> DbResult<(Vec<Dish>, Metadata)> {
        self.list(Some(restaurant_id), query, filters).await
    }

    async fn list(
        &self,
        restaurant_id: Option<i64>,
        query: &DishQuery,
        filters: &Filters,
    ) -> DbResult<(Vec<Dish>, Metadata)> {
        // Rejects an unsafelisted sort before any SQL is built
        filters.validate()?;
        let column = filters.sort_column()?;
        let direction = filters.sort_direction();

        debug!(
            restaurant_id = ?restaurant_id,
            name = %query.name,
            categories = ?query.categories,
            available = ?query.available,
            sort = %filters.sort,
            page = filters.page,
            "Listing dishes"
        );

        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) OVER() AS total_records, ");
        qb.push(DISH_COLUMNS);
        qb.push(" FROM dishes WHERE 1 = 1");

        if let Some(restaurant_id) = restaurant_id {
            qb.push(" AND dishes.restaurant_id = ");
            qb.push_bind(restaurant_id);
        }

        if let Some(expression) = fts_match_expression(&query.name) {
            qb.push(" AND dishes.id IN (SELECT rowid FROM dishes_fts WHERE dishes_fts MATCH ");
            qb.push_bind(expression);
            qb.push(")");
        }

        if !query.categories.is_empty() {
            qb.push(" AND NOT EXISTS (SELECT 1 FROM json_each(");
            qb.push_bind(Json(query.categories.clone()));
            qb.push(") AS wanted WHERE wanted.value NOT IN (SELECT value FROM json_each(dishes.categories)))");
        }

        if let Some(available) = query.available {
            qb.push(" AND dishes.available = ");
            qb.push_bind(available);
        }

        // `column` comes from the safelist, never from the caller
        qb.push(format!(
            " ORDER BY dishes.{column} {}, dishes.id ASC",
            direction.as_sql()
        ));
        qb.push(" LIMIT ");
        qb.push_bind(filters.limit());
        qb.push(" OFFSET ");
        qb.push_bind(filters.offset());

        let rows = with_deadline(self.query_timeout, "dishes.list", async {
            Ok::<_, DbError>(
                qb.build_query_as::<CountedDish>()
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await?;

        let total_records = rows.first().map(|row| row.total_records).unwrap_or(0);
        let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
        let dishes: Vec<Dish> = rows.into_iter().map(|row| row.dish).collect();

        debug!(count = dishes.len(), total_records, "Listed dishes");
        Ok((dishes, metadata))
    }

    /// Counts all dishes (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        with_deadline(self.query_timeout, "dishes.count", async {
            Ok::<_, DbError>(sqlx::query_scalar("SELECT COUNT(*) FROM dishes")
                .fetch_one(&self.pool)
                .await?)
        })
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use foodhub_core::filters::DISH_SORT_SAFELIST;
    use foodhub_core::{DishPatch, Money};

    use super::*;
    use crate::repository::fixtures;
    use crate::Database;

    fn ids(dishes: &[Dish]) -> Vec<i64> {
        dishes.iter().map(|d| d.id).collect()
    }

    fn search(name: &str, categories: &[&str]) -> DishQuery {
        DishQuery {
            name: name.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            available: None,
        }
    }

    /// Two restaurants, four dishes.
    async fn menu(db: &Database) -> (i64, i64, Vec<Dish>) {
        let luigi = fixtures::restaurant(db, "luigi@example.com").await.id;
        let sakura = fixtures::restaurant(db, "sakura@example.com").await.id;

        let dishes = vec![
            fixtures::dish(db, luigi, "Margherita Pizza", 10.0, &["Pizzas", "Vegetarian"]).await,
            fixtures::dish(db, luigi, "Pepperoni Pizza", 12.5, &["Pizzas"]).await,
            fixtures::dish(db, luigi, "Vegan Cheese Pizza", 12.5, &["Pizzas", "Vegan", "Vegetarian"]).await,
            fixtures::dish(db, sakura, "Salmon Nigiri", 8.0, &["Sushi"]).await,
        ];
        (luigi, sakura, dishes)
    }

    #[test]
    fn test_fts_match_expression() {
        assert_eq!(fts_match_expression(""), None);
        assert_eq!(fts_match_expression("   "), None);
        assert_eq!(
            fts_match_expression("cheese  pizza").as_deref(),
            Some("\"cheese\" \"pizza\"")
        );
        assert_eq!(
            fts_match_expression("say\"what").as_deref(),
            Some("\"say\"\"what\"")
        );
    }

    #[tokio::test]
    async fn test_insert_defaults_to_available() {
        let db = fixtures::database().await;
        let owner = fixtures::restaurant(&db, "owner@example.com").await;
        let pizza = fixtures::dish(&db, owner.id, "Pizza", 15.0, &["Pizzas"]).await;

        assert!(pizza.id > 0);
        assert!(pizza.available);
        assert_eq!(pizza.version, 1);

        let loaded = db.dishes().get(pizza.id).await.unwrap();
        assert_eq!(loaded, pizza);
        assert_eq!(loaded.categories, vec!["Pizzas".to_string()]);
        assert_eq!(loaded.price, Money::new(15.0));
    }

    #[tokio::test]
    async fn test_categories_are_stored_as_a_json_array() {
        let db = fixtures::database().await;
        let owner = fixtures::restaurant(&db, "owner@example.com").await;
        let dish = fixtures::dish(&db, owner.id, "Ramen", 11.0, &["Noodles", "Japanese"]).await;

        let raw: String = sqlx::query_scalar("SELECT categories FROM dishes WHERE id = ?")
            .bind(dish.id)
            .fetch_one(db.pool())
            .await
            .unwrap();

        let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored, serde_json::json!(["Noodles", "Japanese"]));
    }

    #[tokio::test]
    async fn test_invalid_dish_is_rejected_before_insert() {
        let db = fixtures::database().await;
        let owner = fixtures::restaurant(&db, "owner@example.com").await;

        let mut dish = fixtures::dish(&db, owner.id, "Pizza", 15.0, &["Pizzas"]).await;
        dish.name = "n".repeat(101);
        dish.categories = Vec::new();

        match db.dishes().insert(&mut dish).await {
            Err(DbError::Validation(errors)) => {
                assert!(errors.get("name").is_some());
                assert!(errors.get("categories").is_some());
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(db.dishes().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_for_restaurant_hides_other_restaurants_dishes() {
        let db = fixtures::database().await;
        let (luigi, sakura, dishes) = menu(&db).await;

        let pizza = &dishes[0];
        assert_eq!(
            db.dishes().get_for_restaurant(pizza.id, luigi).await.unwrap().id,
            pizza.id
        );
        assert!(db
            .dishes()
            .get_for_restaurant(pizza.id, sakura)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(db.dishes().get(9999).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_patch_availability() {
        let db = fixtures::database().await;
        let owner = fixtures::restaurant(&db, "owner@example.com").await;
        let mut pizza = fixtures::dish(&db, owner.id, "Pizza", 15.0, &["Pizzas"]).await;

        DishPatch {
            available: Some(false),
            ..DishPatch::default()
        }
        .apply(&mut pizza);
        db.dishes().update(&mut pizza).await.unwrap();

        let loaded = db.dishes().get(pizza.id).await.unwrap();
        assert!(!loaded.available);
        assert_eq!(loaded.version, 2);
        assert_eq!(pizza.version, 2);
    }

    #[tokio::test]
    async fn test_stale_update_is_an_edit_conflict() {
        let db = fixtures::database().await;
        let owner = fixtures::restaurant(&db, "owner@example.com").await;
        let mut first = fixtures::dish(&db, owner.id, "Pizza", 15.0, &["Pizzas"]).await;
        let mut second = first.clone();

        first.price = Money::new(16.0);
        db.dishes().update(&mut first).await.unwrap();

        second.price = Money::new(99.0);
        assert!(db.dishes().update(&mut second).await.unwrap_err().is_edit_conflict());
        assert_eq!(db.dishes().get(first.id).await.unwrap().price, Money::new(16.0));

        second.id = 4242;
        assert!(db.dishes().update(&mut second).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_removes_photo() {
        let db = fixtures::database().await;
        let owner = fixtures::restaurant(&db, "owner@example.com").await;
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("pizza.jpg");
        std::fs::write(&photo, b"jpeg").unwrap();

        let mut pizza = fixtures::dish(&db, owner.id, "Pizza", 15.0, &["Pizzas"]).await;
        pizza.photo = Some(photo.display().to_string());
        db.dishes().update(&mut pizza).await.unwrap();

        db.dishes().delete(pizza.id).await.unwrap();
        assert!(!photo.exists());
        assert!(db.dishes().get(pizza.id).await.unwrap_err().is_not_found());
        assert!(db.dishes().delete(pizza.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_ignores_missing_photo() {
        let db = fixtures::database().await;
        let owner = fixtures::restaurant(&db, "owner@example.com").await;
        let mut pizza = fixtures::dish(&db, owner.id, "Pizza", 15.0, &["Pizzas"]).await;
        pizza.photo = Some("/nonexistent/foodhub/pizza.jpg".to_string());
        db.dishes().update(&mut pizza).await.unwrap();

        db.dishes().delete(pizza.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_without_conditions_returns_everything() {
        let db = fixtures::database().await;
        let (_, _, dishes) = menu(&db).await;

        let (listed, metadata) = db
            .dishes()
            .list_all(&DishQuery::default(), &Filters::for_dishes())
            .await
            .unwrap();

        assert_eq!(ids(&listed), ids(&dishes));
        assert_eq!(metadata, Metadata::calculate(4, 1, 20));
    }

    #[tokio::test]
    async fn test_list_full_text_search() {
        let db = fixtures::database().await;
        let (_, _, dishes) = menu(&db).await;
        let repo = db.dishes();
        let filters = Filters::for_dishes();

        let (listed, _) = repo.list_all(&search("pizza", &[]), &filters).await.unwrap();
        assert_eq!(ids(&listed), ids(&dishes[..3]));

        // Every word must match, case-insensitively
        let (listed, _) = repo.list_all(&search("CHEESE pizza", &[]), &filters).await.unwrap();
        assert_eq!(ids(&listed), vec![dishes[2].id]);

        let (listed, metadata) = repo.list_all(&search("burrito", &[]), &filters).await.unwrap();
        assert!(listed.is_empty());
        assert_eq!(metadata, Metadata::default());
    }

    #[tokio::test]
    async fn test_search_follows_renames() {
        let db = fixtures::database().await;
        let owner = fixtures::restaurant(&db, "owner@example.com").await;
        let mut dish = fixtures::dish(&db, owner.id, "Calzone", 11.0, &["Pizzas"]).await;

        dish.name = "Stromboli".to_string();
        db.dishes().update(&mut dish).await.unwrap();

        let filters = Filters::for_dishes();
        let (listed, _) = db.dishes().list_all(&search("calzone", &[]), &filters).await.unwrap();
        assert!(listed.is_empty());
        let (listed, _) = db.dishes().list_all(&search("stromboli", &[]), &filters).await.unwrap();
        assert_eq!(ids(&listed), vec![dish.id]);
    }

    #[tokio::test]
    async fn test_list_category_containment() {
        let db = fixtures::database().await;
        let (_, _, dishes) = menu(&db).await;
        let repo = db.dishes();
        let filters = Filters::for_dishes();

        let (listed, _) = repo.list_all(&search("", &["Vegetarian"]), &filters).await.unwrap();
        assert_eq!(ids(&listed), vec![dishes[0].id, dishes[2].id]);

        // A dish must carry every requested category
        let (listed, _) = repo
            .list_all(&search("", &["Vegetarian", "Vegan"]), &filters)
            .await
            .unwrap();
        assert_eq!(ids(&listed), vec![dishes[2].id]);

        let (listed, _) = repo.list_all(&search("", &["Desserts"]), &filters).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_list_availability_filter() {
        let db = fixtures::database().await;
        let (_, _, mut dishes) = menu(&db).await;

        dishes[1].available = false;
        db.dishes().update(&mut dishes[1]).await.unwrap();

        let query = DishQuery {
            available: Some(false),
            ..DishQuery::default()
        };
        let (listed, _) = db.dishes().list_all(&query, &Filters::for_dishes()).await.unwrap();
        assert_eq!(ids(&listed), vec![dishes[1].id]);

        let query = DishQuery {
            available: Some(true),
            ..DishQuery::default()
        };
        let (listed, _) = db.dishes().list_all(&query, &Filters::for_dishes()).await.unwrap();
        assert_eq!(listed.len(), 3);
    }

    #[tokio::test]
    async fn test_list_sorting_breaks_ties_by_id() {
        let db = fixtures::database().await;
        let (_, _, dishes) = menu(&db).await;

        let filters = Filters::new(1, 20, "-price", DISH_SORT_SAFELIST);
        let (listed, _) = db.dishes().list_all(&DishQuery::default(), &filters).await.unwrap();

        // 12.5 (two dishes, lower id first), 10.0, 8.0
        assert_eq!(
            ids(&listed),
            vec![dishes[1].id, dishes[2].id, dishes[0].id, dishes[3].id]
        );
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let db = fixtures::database().await;
        let (_, _, dishes) = menu(&db).await;

        let filters = Filters::new(2, 3, "id", DISH_SORT_SAFELIST);
        let (listed, metadata) = db.dishes().list_all(&DishQuery::default(), &filters).await.unwrap();

        assert_eq!(ids(&listed), vec![dishes[3].id]);
        assert_eq!(
            metadata,
            Metadata {
                current_page: 2,
                page_size: 3,
                first_page: 1,
                last_page: 2,
                total_records: 4,
            }
        );
    }

    #[tokio::test]
    async fn test_list_for_restaurant_is_scoped() {
        let db = fixtures::database().await;
        let (_, sakura, dishes) = menu(&db).await;

        let (listed, metadata) = db
            .dishes()
            .list_for_restaurant(sakura, &DishQuery::default(), &Filters::for_dishes())
            .await
            .unwrap();
        assert_eq!(ids(&listed), vec![dishes[3].id]);
        assert_eq!(metadata.total_records, 1);
    }

    #[tokio::test]
    async fn test_unsafelisted_sort_runs_no_query() {
        let db = fixtures::database().await;
        // A closed pool would fail any query that did run
        db.close().await;

        let filters = Filters::new(1, 20, "price; DROP TABLE dishes", DISH_SORT_SAFELIST);
        match db.dishes().list_all(&DishQuery::default(), &filters).await {
            Err(DbError::Validation(errors)) => assert!(errors.get("sort").is_some()),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
