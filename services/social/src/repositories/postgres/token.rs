//! Verification token repository

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use super::PgUnitOfWork;
use crate::models::VerificationToken;
use crate::repositories::TokenStore;

fn token_from_row(row: &PgRow) -> DatabaseResult<VerificationToken> {
    Ok(VerificationToken {
        id: row.try_get("id").map_err(DatabaseError::Query)?,
        token: row.try_get("token").map_err(DatabaseError::Query)?,
        user_id: row.try_get("user_id").map_err(DatabaseError::Query)?,
        created_at: row.try_get("created_at").map_err(DatabaseError::Query)?,
    })
}

#[async_trait]
impl TokenStore for PgUnitOfWork {
    async fn insert_token(&mut self, token: &VerificationToken) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO verification_tokens (id, token, user_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token.id)
        .bind(&token.token)
        .bind(token.user_id)
        .bind(token.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn find_token(&mut self, token: &str) -> DatabaseResult<Option<VerificationToken>> {
        let row = sqlx::query(
            r#"
            SELECT id, token, user_id, created_at
            FROM verification_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref().map(token_from_row).transpose()
    }

    async fn tokens_for_user(&mut self, user_id: Uuid) -> DatabaseResult<Vec<VerificationToken>> {
        let rows = sqlx::query(
            r#"
            SELECT id, token, user_id, created_at
            FROM verification_tokens
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        rows.iter().map(token_from_row).collect()
    }
}
