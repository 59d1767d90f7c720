//! Post repository

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::Row;
use uuid::Uuid;

use super::PgUnitOfWork;
use crate::models::Post;
use crate::repositories::PostStore;

#[async_trait]
impl PostStore for PgUnitOfWork {
    async fn insert_post(&mut self, post: &Post) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, user_id, content, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(post.id)
        .bind(post.user_id)
        .bind(&post.content)
        .bind(post.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn posts_by_user(&mut self, user_id: Uuid) -> DatabaseResult<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, content, created_at
            FROM posts
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(DatabaseError::from_query)?;

        rows.into_iter()
            .map(|row| {
                Ok(Post {
                    id: row.try_get("id").map_err(DatabaseError::Query)?,
                    user_id: row.try_get("user_id").map_err(DatabaseError::Query)?,
                    content: row.try_get("content").map_err(DatabaseError::Query)?,
                    created_at: row.try_get("created_at").map_err(DatabaseError::Query)?,
                })
            })
            .collect()
    }
}
