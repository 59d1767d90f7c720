//! User repository for database operations

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use super::PgUnitOfWork;
use crate::models::{AccountType, NewUser, User};
use crate::repositories::UserStore;

pub(super) const USER_COLUMNS: &str =
    "users.id, users.username, users.email, users.password_hash, users.account_type, users.enabled, users.created_at";

pub(super) fn user_from_row(row: &PgRow) -> DatabaseResult<User> {
    let account_type: String = row.try_get("account_type").map_err(DatabaseError::Query)?;
    let account_type = account_type
        .parse::<AccountType>()
        .map_err(DatabaseError::Decode)?;

    Ok(User {
        id: row.try_get("id").map_err(DatabaseError::Query)?,
        username: row.try_get("username").map_err(DatabaseError::Query)?,
        email: row.try_get("email").map_err(DatabaseError::Query)?,
        password_hash: row.try_get("password_hash").map_err(DatabaseError::Query)?,
        account_type,
        enabled: row.try_get("enabled").map_err(DatabaseError::Query)?,
        created_at: row.try_get("created_at").map_err(DatabaseError::Query)?,
    })
}

#[async_trait]
impl UserStore for PgUnitOfWork {
    async fn insert_user(&mut self, new_user: &NewUser) -> DatabaseResult<User> {
        info!("Creating new user: {}", new_user.username);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash, account_type, enabled, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.account_type.as_str())
        .bind(new_user.enabled)
        .bind(new_user.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        user_from_row(&row)
    }

    async fn find_user_by_id(&mut self, id: Uuid) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DatabaseError::from_query)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_username(&mut self, username: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&mut self, email: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(DatabaseError::from_query)?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn set_user_enabled(&mut self, id: Uuid, enabled: bool) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE users SET enabled = $2 WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(&mut *self.tx)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_account_type(
        &mut self,
        id: Uuid,
        account_type: AccountType,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query("UPDATE users SET account_type = $2 WHERE id = $1")
            .bind(id)
            .bind(account_type.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }
}
