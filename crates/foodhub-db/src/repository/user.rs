//! # User Repository
//!
//! Database operations for accounts. Customers own orders, restaurant
//! accounts own dishes and receive orders.
//!
//! Emails are unique regardless of case; a clash surfaces as a validation
//! failure on the `email` field.

use std::time::Duration;

use chrono::Utc;
use foodhub_core::validation::validate_user;
use foodhub_core::{Role, User};
use sqlx::SqlitePool;
use tracing::debug;

use super::{missed_write, with_deadline};
use crate::error::{DbError, DbResult};

const USER_COLUMNS: &str =
    "id, photo, created_at, name, email, password_hash, activated, role, version";

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    query_timeout: Duration,
}

/// Maps a unique violation on `email` to a field-level validation error.
fn map_duplicate_email(err: sqlx::Error, email: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } if field == "email" => {
            DbError::duplicate_email(email)
        }
        other => other,
    }
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool, query_timeout: Duration) -> Self {
        UserRepository {
            pool,
            query_timeout,
        }
    }

    /// Inserts a new account.
    ///
    /// Fills in `id`, `created_at` and `version` on success.
    pub async fn insert(&self, user: &mut User) -> DbResult<()> {
        validate_user(user)?;

        debug!(email = %user.email, role = %user.role, "Inserting user");

        let created_at = Utc::now();
        let (id, version): (i64, i64) = with_deadline(self.query_timeout, "users.insert", async {
            sqlx::query_as(
                r#"
                INSERT INTO users (created_at, name, email, password_hash, activated, role, photo)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                RETURNING id, version
                "#,
            )
            .bind(created_at)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.role)
            .bind(&user.photo)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_duplicate_email(e, &user.email))
        })
        .await?;

        user.id = id;
        user.created_at = created_at;
        user.version = version;
        Ok(())
    }

    /// Gets an account by its ID.
    pub async fn get(&self, id: i64) -> DbResult<User> {
        debug!(id, "Fetching user");

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        with_deadline(self.query_timeout, "users.get", async {
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("User", id))
        })
        .await
    }

    /// Gets an account by email, ignoring case.
    pub async fn get_by_email(&self, email: &str) -> DbResult<User> {
        debug!(email = %email, "Fetching user by email");

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        with_deadline(self.query_timeout, "users.get_by_email", async {
            sqlx::query_as::<_, User>(&sql)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| DbError::not_found("User", email))
        })
        .await
    }

    /// Writes every mutable field, guarded by `version`.
    ///
    /// ## Returns
    /// * `Ok(())` - Update successful, `user.version` bumped
    /// * `Err(DbError::EditConflict)` - Someone else updated first
    /// * `Err(DbError::NotFound)` - Account doesn't exist
    /// * `Err(DbError::Validation)` - Email taken by another account
    pub async fn update(&self, user: &mut User) -> DbResult<()> {
        validate_user(user)?;

        debug!(id = user.id, version = user.version, "Updating user");

        let new_version = with_deadline(self.query_timeout, "users.update", async {
            let row: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE users SET
                    name = ?,
                    email = ?,
                    password_hash = ?,
                    activated = ?,
                    role = ?,
                    photo = ?,
                    version = version + 1
                WHERE id = ? AND version = ?
                RETURNING version
                "#,
            )
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.activated)
            .bind(user.role)
            .bind(&user.photo)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_duplicate_email(e, &user.email))?;

            match row {
                Some(version) => Ok(version),
                None => Err(missed_write(&self.pool, "users", "User", user.id).await),
            }
        })
        .await?;

        user.version = new_version;
        Ok(())
    }

    /// Deletes an account. Its dishes and orders go with it.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting user");

        let result = with_deadline(self.query_timeout, "users.delete", async {
            Ok::<_, DbError>(
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(&self.pool)
                    .await?,
            )
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Lists every restaurant account, oldest first.
    pub async fn list_restaurants(&self) -> DbResult<Vec<User>> {
        debug!("Listing restaurants");

        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE role = ? ORDER BY id ASC");
        with_deadline(self.query_timeout, "users.list_restaurants", async {
            Ok::<_, DbError>(
                sqlx::query_as::<_, User>(&sql)
                    .bind(Role::Restaurant)
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
