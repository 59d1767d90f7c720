//! Follow repository

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use super::PgUnitOfWork;
use super::user::{USER_COLUMNS, user_from_row};
use crate::models::{Follow, User};
use crate::repositories::FollowStore;

fn follow_from_row(row: &PgRow) -> DatabaseResult<Follow> {
    Ok(Follow {
        id: row.try_get("id").map_err(DatabaseError::Query)?,
        following_id: row.try_get("following_id").map_err(DatabaseError::Query)?,
        followed_id: row.try_get("followed_id").map_err(DatabaseError::Query)?,
        followed_at: row.try_get("followed_at").map_err(DatabaseError::Query)?,
    })
}

#[async_trait]
impl FollowStore for PgUnitOfWork {
    async fn insert_follow(&mut self, follow: &Follow) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO follows (id, following_id, followed_id, followed_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(follow.id)
        .bind(follow.following_id)
        .bind(follow.followed_id)
        .bind(follow.followed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn find_follow(
        &mut self,
        following_id: Uuid,
        followed_id: Uuid,
    ) -> DatabaseResult<Option<Follow>> {
        let row = sqlx::query(
            r#"
            SELECT id, following_id, followed_id, followed_at
            FROM follows
            WHERE following_id = $1 AND followed_id = $2
            "#,
        )
        .bind(following_id)
        .bind(followed_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        row.as_ref().map(follow_from_row).transpose()
    }

    async fn delete_follow(
        &mut self,
        following_id: Uuid,
        followed_id: Uuid,
    ) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE following_id = $1 AND followed_id = $2")
            .bind(following_id)
            .bind(followed_id)
            .execute(&mut *self.tx)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(result.rows_affected() > 0)
    }

    async fn followers_of(&mut self, user_id: Uuid) -> DatabaseResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM follows
            JOIN users ON users.id = follows.following_id
            WHERE follows.followed_id = $1
            ORDER BY follows.followed_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        rows.iter().map(user_from_row).collect()
    }

    async fn followed_by(&mut self, user_id: Uuid) -> DatabaseResult<Vec<User>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM follows
            JOIN users ON users.id = follows.followed_id
            WHERE follows.following_id = $1
            ORDER BY follows.followed_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        rows.iter().map(user_from_row).collect()
    }
}
