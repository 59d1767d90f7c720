//! Follow graph and posts

use chrono::Utc;
use common::error::DatabaseError;
use tracing::info;
use uuid::Uuid;

use super::accounts::resolve_principal;
use super::rollback_quietly;
use crate::error::{ServiceError, ServiceResult};
use crate::jwt::Principal;
use crate::models::{Follow, Post, User};
use crate::repositories::{
    Database, FollowStore, PostStore, UnitOfWork, UserStore, constraints,
};
use crate::validation::validate_post_content;

fn follow_conflict(err: DatabaseError) -> ServiceError {
    match err.violated_constraint() {
        Some(constraints::FOLLOWS_PAIR) => ServiceError::AlreadyFollowing,
        Some(constraints::FOLLOWS_NO_SELF) => ServiceError::SelfFollow,
        _ => ServiceError::Database(err),
    }
}

async fn require_user<T: UserStore>(tx: &mut T, id: Uuid) -> ServiceResult<User> {
    tx.find_user_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::UserNotFound(id.to_string()))
}

/// Add the edge `actor -> target`
pub async fn add_follow<T: UnitOfWork>(
    tx: &mut T,
    principal: &Principal,
    target_id: Uuid,
) -> ServiceResult<Follow> {
    let actor = resolve_principal(&mut *tx, principal).await?;
    if actor.id == target_id {
        return Err(ServiceError::SelfFollow);
    }
    require_user(&mut *tx, target_id).await?;

    if tx.find_follow(actor.id, target_id).await?.is_some() {
        return Err(ServiceError::AlreadyFollowing);
    }

    let follow = Follow {
        id: Uuid::new_v4(),
        following_id: actor.id,
        followed_id: target_id,
        followed_at: Utc::now(),
    };
    tx.insert_follow(&follow).await.map_err(follow_conflict)?;

    Ok(follow)
}

/// Follow edges and posts, each operation one unit of work
#[derive(Clone)]
pub struct NetworkService<D: Database> {
    db: D,
}

impl<D: Database> NetworkService<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    pub async fn follow(&self, principal: &Principal, target_id: Uuid) -> ServiceResult<Follow> {
        let mut tx = self.db.begin().await?;
        match add_follow(&mut tx, principal, target_id).await {
            Ok(follow) => {
                tx.commit().await?;
                info!("{} now follows {}", principal.username, target_id);
                Ok(follow)
            }
            Err(e) => {
                rollback_quietly(tx).await;
                Err(e)
            }
        }
    }

    pub async fn unfollow(&self, principal: &Principal, target_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.db.begin().await?;

        let removed = match resolve_principal(&mut tx, principal).await {
            Ok(actor) => tx
                .delete_follow(actor.id, target_id)
                .await
                .map_err(ServiceError::from),
            Err(e) => Err(e),
        };

        match removed {
            Ok(true) => {
                tx.commit().await?;
                info!("{} unfollowed {}", principal.username, target_id);
                Ok(())
            }
            Ok(false) => {
                rollback_quietly(tx).await;
                Err(ServiceError::NotFollowing)
            }
            Err(e) => {
                rollback_quietly(tx).await;
                Err(e)
            }
        }
    }

    /// Users following `user_id`
    pub async fn followers(&self, user_id: Uuid) -> ServiceResult<Vec<User>> {
        let mut tx = self.db.begin().await?;
        let result = match require_user(&mut tx, user_id).await {
            Ok(_) => tx.followers_of(user_id).await.map_err(ServiceError::from),
            Err(e) => Err(e),
        };
        rollback_quietly(tx).await;
        result
    }

    /// Users `user_id` follows
    pub async fn following(&self, user_id: Uuid) -> ServiceResult<Vec<User>> {
        let mut tx = self.db.begin().await?;
        let result = match require_user(&mut tx, user_id).await {
            Ok(_) => tx.followed_by(user_id).await.map_err(ServiceError::from),
            Err(e) => Err(e),
        };
        rollback_quietly(tx).await;
        result
    }

    /// Publish a post as the current user
    pub async fn create_post(&self, principal: &Principal, content: &str) -> ServiceResult<Post> {
        let content = validate_post_content(content).map_err(ServiceError::InvalidInput)?;

        let mut tx = self.db.begin().await?;
        let author = match resolve_principal(&mut tx, principal).await {
            Ok(author) => author,
            Err(e) => {
                rollback_quietly(tx).await;
                return Err(e);
            }
        };

        let post = Post {
            id: Uuid::new_v4(),
            user_id: author.id,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = tx.insert_post(&post).await {
            rollback_quietly(tx).await;
            return Err(e.into());
        }

        tx.commit().await?;
        info!("{} published post {}", author.username, post.id);
        Ok(post)
    }

    /// All posts by `user_id`, newest first
    pub async fn posts_by_user(&self, user_id: Uuid) -> ServiceResult<Vec<Post>> {
        let mut tx = self.db.begin().await?;
        let result = match require_user(&mut tx, user_id).await {
            Ok(_) => tx.posts_by_user(user_id).await.map_err(ServiceError::from),
            Err(e) => Err(e),
        };
        rollback_quietly(tx).await;
        result
    }
}
