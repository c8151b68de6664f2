//! # Order Item Repository
//!
//! Line items of an order, and the protocol that keeps `orders.total`
//! equal to the sum of its items' subtotals.
//!
//! ## Adding an Item
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add_to_order(restaurant, order, customer, dish, quantity = 3)         │
//! │                                                                         │
//! │  1. dish = dishes.get_for_restaurant(dish, restaurant)   → NotFound    │
//! │  2. subtotal = dish.price × 3          ($10 × 3 = $30, a snapshot)     │
//! │  3. quantity > 0                                         → Validation  │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │  4. UPDATE orders SET total = total + $30, version = version + 1       │
//! │     WHERE id = order AND restaurant_id = restaurant                    │
//! │       AND user_id = customer AND status <> 'delivered'                 │
//! │     no row? → NotFound | EditConflict | RestaurantMismatch (ROLLBACK)  │
//! │  5. INSERT INTO order_items (...) RETURNING id                         │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  The increment is the first statement, so the transaction holds the    │
//! │  write lock before it reads anything. Two concurrent adds of X and Y   │
//! │  always leave total_before + X + Y.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use foodhub_core::validation::validate_order_item;
use foodhub_core::{Order, OrderItem, OrderLine};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::dish::DishRepository;
use super::order::ORDER_COLUMNS;
use super::{missed_write, with_deadline};
use crate::error::{DbError, DbResult};

const ITEM_COLUMNS: &str = "id, order_id, dish_id, quantity, subtotal, version";

/// Repository for order items.
#[derive(Debug, Clone)]
pub struct OrderItemRepository {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl OrderItemRepository {
    /// Creates a new OrderItemRepository.
    pub fn new(pool: SqlitePool, query_timeout: Duration) -> Self {
        OrderItemRepository {
            pool,
            query_timeout,
        }
    }

    /// Adds `quantity` units of a dish to an order and raises the order's
    /// total by the item's subtotal, atomically.
    ///
    /// ## Arguments
    /// * `restaurant_id` - Restaurant the dish must belong to
    /// * `order_id` - Order to add to
    /// * `user_id` - Customer who must own the order
    /// * `dish_id` - Dish being ordered
    /// * `quantity` - Units, greater than zero
    ///
    /// ## Returns
    /// * `Ok(OrderItem)` - The stored item
    /// * `Err(DbError::NotFound)` - Dish not on this restaurant's menu, or
    ///   order missing or not the customer's
    /// * `Err(DbError::Validation)` - Quantity not positive
    /// * `Err(DbError::EditConflict)` - Order already delivered
    /// * `Err(DbError::RestaurantMismatch)` - Order placed with another restaurant
    pub async fn add_to_order(
        &self,
        restaurant_id: i64,
        order_id: i64,
        user_id: i64,
        dish_id: i64,
        quantity: i64,
    ) -> DbResult<OrderItem> {
        debug!(
            restaurant_id,
            order_id,
            user_id,
            dish_id,
            quantity,
            "Adding item to order"
        );

        let dish = DishRepository::new(self.pool.clone(), self.query_timeout)
            .get_for_restaurant(dish_id, restaurant_id)
            .await?;

        let mut item = OrderItem::priced(order_id, &dish, quantity);
        validate_order_item(&item)?;

        let (id, version) = with_deadline(self.query_timeout, "order_items.add_to_order", async {
            let mut tx = self.pool.begin().await?;

            let bumped: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE orders
                SET total = total + ?, version = version + 1
                WHERE id = ?
                  AND restaurant_id = ?
                  AND user_id = ?
                  AND status <> 'delivered'
                RETURNING version
                "#,
            )
            .bind(item.subtotal)
            .bind(order_id)
            .bind(restaurant_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

            if bumped.is_none() {
                // Dropping `tx` rolls back
                return Err(rejected_order(&mut *tx, order_id, restaurant_id, user_id).await);
            }

            let row: (i64, i64) = sqlx::query_as(
                r#"
                INSERT INTO order_items (order_id, dish_id, quantity, subtotal)
                VALUES (?, ?, ?, ?)
                RETURNING id, version
                "#,
            )
            .bind(item.order_id)
            .bind(item.dish_id)
            .bind(item.quantity)
            .bind(item.subtotal)
            .fetch_one(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok(row)
        })
        .await?;

        item.id = id;
        item.version = version;

        info!(
            order_id,
            item_id = id,
            subtotal = %item.subtotal,
            "Order item added"
        );
        Ok(item)
    }

    /// Stores an item without touching the order's total.
    ///
    /// Callers that need the total kept in step use [`add_to_order`](Self::add_to_order).
    pub async fn insert(&self, item: &mut OrderItem) -> DbResult<()> {
        validate_order_item(item)?;

        debug!(order_id = item.order_id, dish_id = item.dish_id, "Inserting order item");

        let (id, version): (i64, i64) =
            with_deadline(self.query_timeout, "order_items.insert", async {
                Ok::<_, DbError>(
                    sqlx::query_as(
                        r#"
                        INSERT INTO order_items (order_id, dish_id, quantity, subtotal)
                        VALUES (?, ?, ?, ?)
                        RETURNING id, version
                        "#,
                    )
                    .bind(item.order_id)
                    .bind(item.dish_id)
                    .bind(item.quantity)
                    .bind(item.subtotal)
                    .fetch_one(&self.pool)
                    .await?,
                )
            })
            .await?;

        item.id = id;
        item.version = version;
        Ok(())
    }

    /// Gets an item by its ID.
    pub async fn get(&self, id: i64) -> DbResult<OrderItem> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE id = ?");
        with_deadline(self.query_timeout, "order_items.get", async {
            sqlx::query_as::<_, OrderItem>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("OrderItem", id))
        })
        .await
    }

    /// All items of an order, oldest first.
    pub async fn get_for_order(&self, order_id: i64) -> DbResult<Vec<OrderItem>> {
        debug!(order_id, "Fetching order items");

        let sql = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ? ORDER BY id");
        with_deadline(self.query_timeout, "order_items.get_for_order", async {
            Ok::<_, DbError>(
                sqlx::query_as::<_, OrderItem>(&sql)
                    .bind(order_id)
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await
    }

    /// The `{dish, quantity, subtotal}` view of an order's items.
    pub async fn list_lines_for_order(&self, order_id: i64) -> DbResult<Vec<OrderLine>> {
        debug!(order_id, "Fetching order lines");

        with_deadline(self.query_timeout, "order_items.list_lines_for_order", async {
            Ok::<_, DbError>(
                sqlx::query_as::<_, OrderLine>(
                    r#"
                    SELECT dishes.name AS dish_name, order_items.quantity, order_items.subtotal
                    FROM order_items
                    INNER JOIN dishes ON dishes.id = order_items.dish_id
                    WHERE order_items.order_id = ?
                    ORDER BY order_items.id
                    "#,
                )
                .bind(order_id)
                .fetch_all(&self.pool)
                .await?,
            )
        })
        .await
    }

    /// Revises an item's quantity and subtotal, guarded by `version`.
    ///
    /// The parent order's total moves by the change in subtotal in the same
    /// transaction. Items of a delivered order cannot be revised.
    ///
    /// ## Returns
    /// * `Ok(())` - Update successful, `item.version` bumped
    /// * `Err(DbError::EditConflict)` - Stale version, or order delivered
    /// * `Err(DbError::NotFound)` - Item doesn't exist
    pub async fn update(&self, item: &mut OrderItem) -> DbResult<()> {
        validate_order_item(item)?;

        debug!(id = item.id, version = item.version, "Updating order item");

        let new_version = with_deadline(self.query_timeout, "order_items.update", async {
            let mut tx = self.pool.begin().await?;

            // Write first: adjust the total by (new - old) subtotal, locating
            // the order and the old subtotal through the versioned item
            let adjusted: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE orders
                SET total = total + (? - (SELECT subtotal FROM order_items WHERE id = ? AND version = ?)),
                    version = version + 1
                WHERE id = (SELECT order_id FROM order_items WHERE id = ? AND version = ?)
                  AND status <> 'delivered'
                RETURNING id
                "#,
            )
            .bind(item.subtotal)
            .bind(item.id)
            .bind(item.version)
            .bind(item.id)
            .bind(item.version)
            .fetch_optional(&mut *tx)
            .await?;

            if adjusted.is_none() {
                return Err(missed_write(&mut *tx, "order_items", "OrderItem", item.id).await);
            }

            let version: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE order_items SET
                    quantity = ?,
                    subtotal = ?,
                    version = version + 1
                WHERE id = ? AND version = ?
                RETURNING version
                "#,
            )
            .bind(item.quantity)
            .bind(item.subtotal)
            .bind(item.id)
            .bind(item.version)
            .fetch_optional(&mut *tx)
            .await?;

            let version = match version {
                Some(version) => version,
                None => {
                    return Err(missed_write(&mut *tx, "order_items", "OrderItem", item.id).await)
                }
            };

            tx.commit().await?;
            Ok(version)
        })
        .await?;

        item.version = new_version;
        Ok(())
    }
}

/// Works out why the guarded total increment matched no order.
async fn rejected_order(
    conn: &mut SqliteConnection,
    order_id: i64,
    restaurant_id: i64,
    user_id: i64,
) -> DbError {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE orders.id = ?");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(order_id)
        .fetch_optional(conn)
        .await;

    let error = match order {
        Err(e) => return e.into(),
        Ok(None) => DbError::not_found("Order", order_id),
        Ok(Some(order)) if order.user_id != user_id => DbError::not_found("Order", order_id),
        Ok(Some(order)) if order.ensure_accepts_item_changes().is_err() => {
            DbError::edit_conflict("Order", order_id)
        }
        Ok(Some(order)) if order.restaurant_id != restaurant_id => {
            DbError::RestaurantMismatch {
                order_id,
                restaurant_id,
            }
        }
        // Matched on re-read, so the row changed under us
        Ok(Some(_)) => DbError::edit_conflict("Order", order_id),
    };

    warn!(order_id, error = %error, "Order rejected new item");
    error
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use foodhub_core::{Money, OrderStatus};

    use super::*;
    use crate::repository::fixtures;
    use crate::Database;

    struct Scene {
        db: Database,
        shop: i64,
        customer: i64,
        order: Order,
    }

    async fn scene() -> Scene {
        let db = fixtures::database().await;
        let shop = fixtures::restaurant(&db, "shop@example.com").await.id;
        let customer = fixtures::customer(&db, "alice@example.com").await.id;
        let order = fixtures::order(&db, customer, shop).await;
        Scene {
            db,
            shop,
            customer,
            order,
        }
    }

    async fn total(db: &Database, order_id: i64) -> Money {
        db.orders().get(order_id).await.unwrap().total
    }

    #[tokio::test]
    async fn test_add_prices_and_totals() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;

        let item = s
            .db
            .order_items()
            .add_to_order(s.shop, s.order.id, s.customer, pizza.id, 3)
            .await
            .unwrap();

        assert!(item.id > 0);
        assert_eq!(item.subtotal, Money::new(30.0));
        assert_eq!(item.subtotal.encode(), "$30");

        let order = s.db.orders().get(s.order.id).await.unwrap();
        assert_eq!(order.total, Money::new(30.0));
        assert_eq!(order.version, s.order.version + 1);
    }

    #[tokio::test]
    async fn test_total_tracks_sum_of_subtotals() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;
        let salad = fixtures::dish(&s.db, s.shop, "Salad", 6.5, &["Salads"]).await;
        let items = s.db.order_items();

        items.add_to_order(s.shop, s.order.id, s.customer, pizza.id, 2).await.unwrap();
        items.add_to_order(s.shop, s.order.id, s.customer, salad.id, 1).await.unwrap();
        items.add_to_order(s.shop, s.order.id, s.customer, pizza.id, 1).await.unwrap();

        let stored = items.get_for_order(s.order.id).await.unwrap();
        let sum: Money = stored.iter().map(|i| i.subtotal).sum();
        assert_eq!(stored.len(), 3);
        assert_eq!(sum, Money::new(36.5));
        assert_eq!(total(&s.db, s.order.id).await, sum);
    }

    #[tokio::test]
    async fn test_delivered_order_is_an_edit_conflict() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;
        s.db
            .order_items()
            .add_to_order(s.shop, s.order.id, s.customer, pizza.id, 1)
            .await
            .unwrap();

        let mut order = s.db.orders().get(s.order.id).await.unwrap();
        order.status = OrderStatus::Delivered;
        s.db.orders().update(&mut order).await.unwrap();

        let err = s
            .db
            .order_items()
            .add_to_order(s.shop, s.order.id, s.customer, pizza.id, 2)
            .await
            .unwrap_err();
        assert!(err.is_edit_conflict());

        assert_eq!(total(&s.db, s.order.id).await, Money::new(10.0));
        assert_eq!(s.db.order_items().get_for_order(s.order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_order_from_another_restaurant() {
        let s = scene().await;
        let rival = fixtures::restaurant(&s.db, "rival@example.com").await.id;
        let sushi = fixtures::dish(&s.db, rival, "Sushi", 9.0, &["Sushi"]).await;

        let err = s
            .db
            .order_items()
            .add_to_order(rival, s.order.id, s.customer, sushi.id, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::RestaurantMismatch { order_id, restaurant_id }
                if order_id == s.order.id && restaurant_id == rival
        ));
        assert_eq!(total(&s.db, s.order.id).await, Money::zero());
    }

    #[tokio::test]
    async fn test_dish_must_be_on_the_restaurants_menu() {
        let s = scene().await;
        let rival = fixtures::restaurant(&s.db, "rival@example.com").await.id;
        let sushi = fixtures::dish(&s.db, rival, "Sushi", 9.0, &["Sushi"]).await;

        let err = s
            .db
            .order_items()
            .add_to_order(s.shop, s.order.id, s.customer, sushi.id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Dish"));
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_order_is_not_found() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;
        let bob = fixtures::customer(&s.db, "bob@example.com").await.id;
        let items = s.db.order_items();

        let err = items.add_to_order(s.shop, 4242, s.customer, pizza.id, 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, .. } if entity == "Order"));

        let err = items.add_to_order(s.shop, s.order.id, bob, pizza.id, 1).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(total(&s.db, s.order.id).await, Money::zero());
    }

    #[tokio::test]
    async fn test_quantity_must_be_positive() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;

        for quantity in [0, -2] {
            let err = s
                .db
                .order_items()
                .add_to_order(s.shop, s.order.id, s.customer, pizza.id, quantity)
                .await
                .unwrap_err();
            match err {
                DbError::Validation(errors) => assert!(errors.get("quantity").is_some()),
                other => panic!("expected validation error, got {other:?}"),
            }
        }
        assert_eq!(total(&s.db, s.order.id).await, Money::zero());
    }

    #[tokio::test]
    async fn test_subtotal_is_a_price_snapshot() {
        let s = scene().await;
        let mut pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;
        let item = s
            .db
            .order_items()
            .add_to_order(s.shop, s.order.id, s.customer, pizza.id, 2)
            .await
            .unwrap();

        pizza.price = Money::new(25.0);
        s.db.dishes().update(&mut pizza).await.unwrap();

        assert_eq!(s.db.order_items().get(item.id).await.unwrap().subtotal, Money::new(20.0));
        assert_eq!(total(&s.db, s.order.id).await, Money::new(20.0));
    }

    #[tokio::test]
    async fn test_order_lines() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 15.0, &["Pizzas"]).await;
        let salad = fixtures::dish(&s.db, s.shop, "Salad", 7.0, &["Salads"]).await;
        let items = s.db.order_items();
        items.add_to_order(s.shop, s.order.id, s.customer, pizza.id, 2).await.unwrap();
        items.add_to_order(s.shop, s.order.id, s.customer, salad.id, 1).await.unwrap();

        let lines = items.list_lines_for_order(s.order.id).await.unwrap();
        assert_eq!(
            lines,
            vec![
                OrderLine {
                    dish_name: "Pizza".to_string(),
                    quantity: 2,
                    subtotal: Money::new(30.0),
                },
                OrderLine {
                    dish_name: "Salad".to_string(),
                    quantity: 1,
                    subtotal: Money::new(7.0),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_raw_insert_leaves_total_alone() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;

        let mut item = OrderItem::priced(s.order.id, &pizza, 1);
        s.db.order_items().insert(&mut item).await.unwrap();

        assert!(item.id > 0);
        assert_eq!(item.version, 1);
        assert_eq!(total(&s.db, s.order.id).await, Money::zero());
    }

    #[tokio::test]
    async fn test_update_moves_total_by_the_delta() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;
        let items = s.db.order_items();
        items.add_to_order(s.shop, s.order.id, s.customer, pizza.id, 1).await.unwrap();
        let mut item = items.add_to_order(s.shop, s.order.id, s.customer, pizza.id, 3).await.unwrap();
        assert_eq!(total(&s.db, s.order.id).await, Money::new(40.0));

        item.quantity = 1;
        item.subtotal = pizza.price * 1;
        items.update(&mut item).await.unwrap();

        assert_eq!(item.version, 2);
        assert_eq!(total(&s.db, s.order.id).await, Money::new(20.0));
    }

    #[tokio::test]
    async fn test_stale_item_update_is_an_edit_conflict() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;
        let items = s.db.order_items();
        let mut first = items.add_to_order(s.shop, s.order.id, s.customer, pizza.id, 1).await.unwrap();
        let mut second = first.clone();

        first.quantity = 2;
        first.subtotal = Money::new(20.0);
        items.update(&mut first).await.unwrap();

        second.quantity = 5;
        second.subtotal = Money::new(50.0);
        assert!(items.update(&mut second).await.unwrap_err().is_edit_conflict());
        assert_eq!(total(&s.db, s.order.id).await, Money::new(20.0));

        second.id = 4242;
        assert!(items.update(&mut second).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_items_of_delivered_order_cannot_be_revised() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;
        let mut item = s
            .db
            .order_items()
            .add_to_order(s.shop, s.order.id, s.customer, pizza.id, 1)
            .await
            .unwrap();

        let mut order = s.db.orders().get(s.order.id).await.unwrap();
        order.status = OrderStatus::Delivered;
        s.db.orders().update(&mut order).await.unwrap();

        item.quantity = 4;
        item.subtotal = Money::new(40.0);
        assert!(s.db.order_items().update(&mut item).await.unwrap_err().is_edit_conflict());
        assert_eq!(total(&s.db, s.order.id).await, Money::new(10.0));
    }

    #[tokio::test]
    async fn test_ordered_dish_cannot_be_deleted() {
        let s = scene().await;
        let pizza = fixtures::dish(&s.db, s.shop, "Pizza", 10.0, &["Pizzas"]).await;
        s.db
            .order_items()
            .add_to_order(s.shop, s.order.id, s.customer, pizza.id, 1)
            .await
            .unwrap();

        assert!(matches!(
            s.db.dishes().delete(pizza.id).await,
            Err(DbError::ForeignKeyViolation { .. })
        ));
    }
}
