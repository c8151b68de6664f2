//! # Order Repository
//!
//! Database operations for orders.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Order Lifecycle                                      │
//! │                                                                         │
//! │  insert()          total = $0, status = created, created_at = now      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  add_to_order()    total += subtotal (OrderItemRepository)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  update()          status → in progress / ready / delivered / ...      │
//! │       │            (guarded by version)                                 │
//! │       ▼                                                                 │
//! │  delivered         items frozen                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use chrono::Utc;
use foodhub_core::validation::validate_order;
use foodhub_core::{Filters, Metadata, Money, Order, OrderStatus};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::{missed_write, with_deadline};
use crate::error::{DbError, DbResult};

pub(super) const ORDER_COLUMNS: &str = "orders.id, orders.user_id, orders.restaurant_id, orders.total, \
     orders.address, orders.created_at, orders.status, orders.version";

#[derive(sqlx::FromRow)]
struct CountedOrder {
    total_records: i64,
    #[sqlx(flatten)]
    order: Order,
}

/// Which owner column a listing or lookup is scoped by.
#[derive(Debug, Clone, Copy)]
enum Owner {
    Restaurant(i64),
    Customer(i64),
}

impl Owner {
    fn column(&self) -> &'static str {
        match self {
            Owner::Restaurant(_) => "orders.restaurant_id",
            Owner::Customer(_) => "orders.user_id",
        }
    }

    fn id(&self) -> i64 {
        match self {
            Owner::Restaurant(id) | Owner::Customer(id) => *id,
        }
    }
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    query_timeout: Duration,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool, query_timeout: Duration) -> Self {
        OrderRepository {
            pool,
            query_timeout,
        }
    }

    /// Inserts a new order.
    ///
    /// Whatever the caller set, the order starts empty (`$0`) in status
    /// `created` with the current time as `created_at`. Fills in `id` and
    /// `version`.
    pub async fn insert(&self, order: &mut Order) -> DbResult<()> {
        validate_order(order)?;

        order.total = Money::zero();
        order.status = OrderStatus::Created;
        order.created_at = Utc::now();

        debug!(
            user_id = order.user_id,
            restaurant_id = order.restaurant_id,
            "Inserting order"
        );

        let (id, version): (i64, i64) = with_deadline(self.query_timeout, "orders.insert", async {
            Ok::<_, DbError>(
                sqlx::query_as(
                    r#"
                    INSERT INTO orders (user_id, restaurant_id, total, address, created_at, status)
                    VALUES (?, ?, ?, ?, ?, ?)
                    RETURNING id, version
                    "#,
                )
                .bind(order.user_id)
                .bind(order.restaurant_id)
                .bind(order.total)
                .bind(&order.address)
                .bind(order.created_at)
                .bind(order.status)
                .fetch_one(&self.pool)
                .await?,
            )
        })
        .await?;

        order.id = id;
        order.version = version;
        Ok(())
    }

    /// Gets an order by its ID.
    pub async fn get(&self, id: i64) -> DbResult<Order> {
        debug!(id, "Fetching order");

        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE orders.id = ?");
        with_deadline(self.query_timeout, "orders.get", async {
            sqlx::query_as::<_, Order>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("Order", id))
        })
        .await
    }

    /// Gets an order placed with `restaurant_id`.
    pub async fn get_for_restaurant(&self, id: i64, restaurant_id: i64) -> DbResult<Order> {
        self.get_owned(id, Owner::Restaurant(restaurant_id)).await
    }

    /// Gets an order placed by customer `user_id`.
    pub async fn get_for_user(&self, id: i64, user_id: i64) -> DbResult<Order> {
        self.get_owned(id, Owner::Customer(user_id)).await
    }

    async fn get_owned(&self, id: i64, owner: Owner) -> DbResult<Order> {
        debug!(id, owner = ?owner, "Fetching scoped order");

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE orders.id = ? AND {} = ?",
            owner.column()
        );
        with_deadline(self.query_timeout, "orders.get_owned", async {
            sqlx::query_as::<_, Order>(&sql)
                .bind(id)
                .bind(owner.id())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("Order", id))
        })
        .await
    }

    /// Writes `total` and `status`, guarded by `version`.
    ///
    /// Any status may replace any other. The total is owned by the order
    /// item store; callers must carry the `total` they read through
    /// unchanged, or use [`update_status`](Self::update_status).
    ///
    /// ## Returns
    /// * `Ok(())` - Update successful, `order.version` bumped
    /// * `Err(DbError::EditConflict)` - The order changed since it was read
    /// * `Err(DbError::NotFound)` - Order doesn't exist
    pub async fn update(&self, order: &mut Order) -> DbResult<()> {
        validate_order(order)?;

        debug!(
            id = order.id,
            version = order.version,
            status = %order.status,
            "Updating order"
        );

        let new_version = with_deadline(self.query_timeout, "orders.update", async {
            let row: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE orders SET
                    total = ?,
                    status = ?,
                    version = version + 1
                WHERE id = ? AND version = ?
                RETURNING version
                "#,
            )
            .bind(order.total)
            .bind(order.status)
            .bind(order.id)
            .bind(order.version)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some(version) => Ok(version),
                None => Err(missed_write(&self.pool, "orders", "Order", order.id).await),
            }
        })
        .await?;

        order.version = new_version;
        Ok(())
    }

    /// Writes `status` alone, guarded by `version`.
    ///
    /// `order.total` is refreshed from the store, so a stale or edited
    /// total on the caller's copy is never written back.
    pub async fn update_status(&self, order: &mut Order) -> DbResult<()> {
        debug!(
            id = order.id,
            version = order.version,
            status = %order.status,
            "Updating order status"
        );

        let (version, total) = with_deadline(self.query_timeout, "orders.update_status", async {
            let row: Option<(i64, Money)> = sqlx::query_as(
                r#"
                UPDATE orders SET
                    status = ?,
                    version = version + 1
                WHERE id = ? AND version = ?
                RETURNING version, total
                "#,
            )
            .bind(order.status)
            .bind(order.id)
            .bind(order.version)
            .fetch_optional(&self.pool)
            .await?;

            match row {
                Some(row) => Ok(row),
                None => Err(missed_write(&self.pool, "orders", "Order", order.id).await),
            }
        })
        .await?;

        order.version = version;
        order.total = total;
        Ok(())
    }

    /// Lists the orders placed with a restaurant, optionally by status.
    pub async fn list_for_restaurant(
        &self,
        restaurant_id: i64,
        status: Option<OrderStatus>,
        filters: &Filters,
    ) -> DbResult<(Vec<Order>, Metadata)> {
        self.list(Owner::Restaurant(restaurant_id), status, filters)
            .await
    }

    /// Lists the orders placed by a customer, optionally by status.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        filters: &Filters,
    ) -> DbResult<(Vec<Order>, Metadata)> {
        self.list(Owner::Customer(user_id), status, filters).await
    }

    async fn list(
        &self,
        owner: Owner,
        status: Option<OrderStatus>,
        filters: &Filters,
    ) -> DbResult<(Vec<Order>, Metadata)> {
        filters.validate()?;
        let column = filters.sort_column()?;
        let direction = filters.sort_direction();

        debug!(
            owner = ?owner,
            status = ?status,
            sort = %filters.sort,
            page = filters.page,
            "Listing orders"
        );

        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) OVER() AS total_records, ");
        qb.push(ORDER_COLUMNS);
        qb.push(format!(" FROM orders WHERE {} = ", owner.column()));
        qb.push_bind(owner.id());

        if let Some(status) = status {
            qb.push(" AND orders.status = ");
            qb.push_bind(status);
        }

        qb.push(format!(
            " ORDER BY orders.{column} {}, orders.id ASC",
            direction.as_sql()
        ));
        qb.push(" LIMIT ");
        qb.push_bind(filters.limit());
        qb.push(" OFFSET ");
        qb.push_bind(filters.offset());

        let rows = with_deadline(self.query_timeout, "orders.list", async {
            Ok::<_, DbError>(
                qb.build_query_as::<CountedOrder>()
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await?;

        let total_records = rows.first().map(|row| row.total_records).unwrap_or(0);
        let metadata = Metadata::calculate(total_records, filters.page, filters.page_size);
        let orders: Vec<Order> = rows.into_iter().map(|row| row.order).collect();

        debug!(count = orders.len(), total_records, "Listed orders");
        Ok((orders, metadata))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use foodhub_core::filters::ORDER_SORT_SAFELIST;

    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_insert_forces_initial_state() {
        let db = fixtures::database().await;
        let shop = fixtures::restaurant(&db, "shop@example.com").await;
        let alice = fixtures::customer(&db, "alice@example.com").await;

        let mut order = Order::new(alice.id, shop.id, "Main St 1");
        order.total = Money::new(500.0);
        order.status = OrderStatus::Delivered;
        db.orders().insert(&mut order).await.unwrap();

        assert!(order.id > 0);
        assert_eq!(order.version, 1);
        let loaded = db.orders().get(order.id).await.unwrap();
        assert_eq!(loaded.total, Money::zero());
        assert_eq!(loaded.status, OrderStatus::Created);
        assert_eq!(loaded.address, "Main St 1");
        assert_eq!(loaded.created_at.timestamp(), order.created_at.timestamp());
    }

    #[tokio::test]
    async fn test_insert_requires_address() {
        let db = fixtures::database().await;
        let shop = fixtures::restaurant(&db, "shop@example.com").await;
        let alice = fixtures::customer(&db, "alice@example.com").await;

        let mut order = Order::new(alice.id, shop.id, "");
        assert!(matches!(
            db.orders().insert(&mut order).await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_insert_for_unknown_customer() {
        let db = fixtures::database().await;
        let shop = fixtures::restaurant(&db, "shop@example.com").await;

        let mut order = Order::new(4242, shop.id, "Main St 1");
        assert!(matches!(
            db.orders().insert(&mut order).await,
            Err(DbError::ForeignKeyViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_scoped_gets() {
        let db = fixtures::database().await;
        let shop = fixtures::restaurant(&db, "shop@example.com").await;
        let other_shop = fixtures::restaurant(&db, "other@example.com").await;
        let alice = fixtures::customer(&db, "alice@example.com").await;
        let bob = fixtures::customer(&db, "bob@example.com").await;
        let order = fixtures::order(&db, alice.id, shop.id).await;

        let orders = db.orders();
        assert_eq!(orders.get_for_restaurant(order.id, shop.id).await.unwrap().id, order.id);
        assert_eq!(orders.get_for_user(order.id, alice.id).await.unwrap().id, order.id);

        assert!(orders
            .get_for_restaurant(order.id, other_shop.id)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(orders
            .get_for_user(order.id, bob.id)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(orders.get(9999).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_status_update_bumps_version() {
        let db = fixtures::database().await;
        let shop = fixtures::restaurant(&db, "shop@example.com").await;
        let alice = fixtures::customer(&db, "alice@example.com").await;
        let mut order = fixtures::order(&db, alice.id, shop.id).await;

        order.status = OrderStatus::InProgress;
        db.orders().update(&mut order).await.unwrap();
        assert_eq!(order.version, 2);

        // No transition graph: going back is allowed
        order.status = OrderStatus::Created;
        db.orders().update(&mut order).await.unwrap();

        let loaded = db.orders().get(order.id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Created);
        assert_eq!(loaded.version, 3);
    }

    #[tokio::test]
    async fn test_status_update_keeps_the_item_total() {
        let db = fixtures::database().await;
        let shop = fixtures::restaurant(&db, "shop@example.com").await;
        let alice = fixtures::customer(&db, "alice@example.com").await;
        let order = fixtures::order(&db, alice.id, shop.id).await;
        let pizza = fixtures::dish(&db, shop.id, "Pizza", 10.0, &["Pizzas"]).await;
        db.order_items()
            .add_to_order(shop.id, order.id, alice.id, pizza.id, 3)
            .await
            .unwrap();

        let mut order = db.orders().get(order.id).await.unwrap();
        order.status = OrderStatus::Ready;
        order.total = Money::new(1.0);
        db.orders().update_status(&mut order).await.unwrap();

        assert_eq!(order.total, Money::new(30.0));
        let loaded = db.orders().get(order.id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Ready);
        assert_eq!(loaded.total, Money::new(30.0));
        assert_eq!(loaded.version, order.version);

        let mut stale = loaded.clone();
        stale.version -= 1;
        assert!(db
            .orders()
            .update_status(&mut stale)
            .await
            .unwrap_err()
            .is_edit_conflict());
    }

    #[tokio::test]
    async fn test_stale_update_is_an_edit_conflict() {
        let db = fixtures::database().await;
        let shop = fixtures::restaurant(&db, "shop@example.com").await;
        let alice = fixtures::customer(&db, "alice@example.com").await;
        let mut kitchen = fixtures::order(&db, alice.id, shop.id).await;
        let mut courier = kitchen.clone();

        kitchen.status = OrderStatus::Ready;
        db.orders().update(&mut kitchen).await.unwrap();

        courier.status = OrderStatus::Cancelled;
        assert!(db.orders().update(&mut courier).await.unwrap_err().is_edit_conflict());
        assert_eq!(
            db.orders().get(kitchen.id).await.unwrap().status,
            OrderStatus::Ready
        );

        courier.id = 4242;
        assert!(db.orders().update(&mut courier).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_with_status_filter_and_sort() {
        let db = fixtures::database().await;
        let shop = fixtures::restaurant(&db, "shop@example.com").await;
        let alice = fixtures::customer(&db, "alice@example.com").await;
        let bob = fixtures::customer(&db, "bob@example.com").await;

        let mut placed = Vec::new();
        for (customer, total, status) in [
            (alice.id, 30.0, OrderStatus::Created),
            (bob.id, 12.5, OrderStatus::Delivered),
            (alice.id, 45.0, OrderStatus::Delivered),
        ] {
            let mut order = fixtures::order(&db, customer, shop.id).await;
            order.total = Money::new(total);
            order.status = status;
            db.orders().update(&mut order).await.unwrap();
            placed.push(order.id);
        }

        let filters = Filters::new(1, 50, "-total", ORDER_SORT_SAFELIST);
        let (orders, metadata) = db
            .orders()
            .list_for_restaurant(shop.id, None, &filters)
            .await
            .unwrap();
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![placed[2], placed[0], placed[1]]);
        assert_eq!(metadata.total_records, 3);

        let (orders, _) = db
            .orders()
            .list_for_restaurant(shop.id, Some(OrderStatus::Delivered), &Filters::for_orders())
            .await
            .unwrap();
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![placed[1], placed[2]]);

        let (orders, _) = db
            .orders()
            .list_for_user(alice.id, Some(OrderStatus::Delivered), &Filters::for_orders())
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, placed[2]);
    }

    #[tokio::test]
    async fn test_list_empty_gives_zero_metadata() {
        let db = fixtures::database().await;
        let alice = fixtures::customer(&db, "alice@example.com").await;

        let (orders, metadata) = db
            .orders()
            .list_for_user(alice.id, None, &Filters::for_orders())
            .await
            .unwrap();
        assert!(orders.is_empty());
        assert_eq!(metadata, Metadata::default());
    }

    #[tokio::test]
    async fn test_list_rejects_dish_sort_keys() {
        let db = fixtures::database().await;
        let filters = Filters::new(1, 50, "name", ORDER_SORT_SAFELIST);

        assert!(matches!(
            db.orders().list_for_restaurant(1, None, &filters).await,
            Err(DbError::Validation(_))
        ));
    }
}
