//! Local identity model.

use serde::Serialize;
use sqlx::FromRow;
use sourcegate_core::types::{DbId, Timestamp, UnixTime};

use super::cron_lock::define_text_enum;

define_text_enum! {
    /// How a local identity authenticates.
    LoginType {
        /// Password or locally issued token.
        Local = "local",
        /// Provisioned from the identity provider.
        Iam = "iam",
    }
}

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: DbId,
    pub login_name: String,
    pub name: String,
    pub full_name: String,
    pub email: String,
    pub login_type: String,
    pub is_admin: bool,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub last_login_unix: UnixTime,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub login_name: String,
    pub name: String,
    pub full_name: String,
    pub email: String,
    pub login_type: LoginType,
    pub is_admin: bool,
    pub password_hash: Option<String>,
}
