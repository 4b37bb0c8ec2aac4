//! Repository for the `users` table.

use sqlx::PgPool;
use sourcegate_core::types::{DbId, UnixTime};

use crate::models::user::{CreateUser, User};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, login_name, name, full_name, email, login_type, is_admin, is_active, \
                       password_hash, last_login_unix, created_at, updated_at";

pub struct UserRepo;

impl UserRepo {
    pub async fn create(pool: &PgPool, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (login_name, name, full_name, email, login_type, is_admin, password_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.login_name)
            .bind(&input.name)
            .bind(&input.full_name)
            .bind(&input.email)
            .bind(input.login_type.as_str())
            .bind(input.is_admin)
            .bind(&input.password_hash)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by login name (case-sensitive).
    pub async fn find_by_login_name(
        pool: &PgPool,
        login_name: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE login_name = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(login_name)
            .fetch_optional(pool)
            .await
    }

    pub async fn set_admin(pool: &PgPool, id: DbId, is_admin: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET is_admin = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(is_admin)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_last_login(pool: &PgPool, id: DbId, at: UnixTime) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_unix = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(())
    }
}
