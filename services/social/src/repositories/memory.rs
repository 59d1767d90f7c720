//! In-memory storage engine
//!
//! Units of work hold the engine lock for their whole lifetime and write to a
//! private copy of the state, so transactions are serialised and a dropped
//! unit of work leaves nothing behind. Constraint names match the PostgreSQL
//! schema.

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    Database, FollowStore, PostStore, TokenStore, UnitOfWork, UserStore, constraints,
};
use crate::models::{AccountType, Follow, NewUser, Post, User, VerificationToken};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    users: Vec<User>,
    tokens: Vec<VerificationToken>,
    follows: Vec<Follow>,
    posts: Vec<Post>,
}

/// Process-local database
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    type Tx = MemoryUnitOfWork;

    async fn begin(&self) -> DatabaseResult<MemoryUnitOfWork> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(MemoryUnitOfWork { guard, working })
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        Ok(true)
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryUnitOfWork {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.working.users.iter().find(|u| u.id == id)
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.working.users.iter_mut().find(|u| u.id == id)
    }

    fn users_for_edges<F>(&self, mut edges: Vec<&Follow>, other_side: F) -> Vec<User>
    where
        F: Fn(&Follow) -> Uuid,
    {
        edges.sort_by(|a, b| b.followed_at.cmp(&a.followed_at));
        edges
            .into_iter()
            .filter_map(|edge| self.user(other_side(edge)).cloned())
            .collect()
    }
}

#[async_trait]
impl UserStore for MemoryUnitOfWork {
    async fn insert_user(&mut self, new_user: &NewUser) -> DatabaseResult<User> {
        if self
            .working
            .users
            .iter()
            .any(|u| u.username == new_user.username)
        {
            return Err(DatabaseError::UniqueViolation(
                constraints::USERS_USERNAME.to_string(),
            ));
        }
        if self.working.users.iter().any(|u| u.email == new_user.email) {
            return Err(DatabaseError::UniqueViolation(
                constraints::USERS_EMAIL.to_string(),
            ));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            account_type: new_user.account_type,
            enabled: new_user.enabled,
            created_at: new_user.created_at,
        };
        self.working.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&mut self, id: Uuid) -> DatabaseResult<Option<User>> {
        Ok(self.user(id).cloned())
    }

    async fn find_user_by_username(&mut self, username: &str) -> DatabaseResult<Option<User>> {
        Ok(self
            .working
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> DatabaseResult<Option<User>> {
        Ok(self.working.users.iter().find(|u| u.email == email).cloned())
    }

    async fn set_user_enabled(&mut self, id: Uuid, enabled: bool) -> DatabaseResult<bool> {
        Ok(match self.user_mut(id) {
            Some(user) => {
                user.enabled = enabled;
                true
            }
            None => false,
        })
    }

    async fn set_account_type(
        &mut self,
        id: Uuid,
        account_type: AccountType,
    ) -> DatabaseResult<bool> {
        Ok(match self.user_mut(id) {
            Some(user) => {
                user.account_type = account_type;
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl TokenStore for MemoryUnitOfWork {
    async fn insert_token(&mut self, token: &VerificationToken) -> DatabaseResult<()> {
        if self.working.tokens.iter().any(|t| t.token == token.token) {
            return Err(DatabaseError::UniqueViolation(
                constraints::TOKENS_TOKEN.to_string(),
            ));
        }
        self.working.tokens.push(token.clone());
        Ok(())
    }

    async fn find_token(&mut self, token: &str) -> DatabaseResult<Option<VerificationToken>> {
        Ok(self
            .working
            .tokens
            .iter()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn tokens_for_user(&mut self, user_id: Uuid) -> DatabaseResult<Vec<VerificationToken>> {
        Ok(self
            .working
            .tokens
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FollowStore for MemoryUnitOfWork {
    async fn insert_follow(&mut self, follow: &Follow) -> DatabaseResult<()> {
        if follow.following_id == follow.followed_id {
            return Err(DatabaseError::CheckViolation(
                constraints::FOLLOWS_NO_SELF.to_string(),
            ));
        }
        if self.working.follows.iter().any(|f| {
            f.following_id == follow.following_id && f.followed_id == follow.followed_id
        }) {
            return Err(DatabaseError::UniqueViolation(
                constraints::FOLLOWS_PAIR.to_string(),
            ));
        }
        self.working.follows.push(follow.clone());
        Ok(())
    }

    async fn find_follow(
        &mut self,
        following_id: Uuid,
        followed_id: Uuid,
    ) -> DatabaseResult<Option<Follow>> {
        Ok(self
            .working
            .follows
            .iter()
            .find(|f| f.following_id == following_id && f.followed_id == followed_id)
            .cloned())
    }

    async fn delete_follow(
        &mut self,
        following_id: Uuid,
        followed_id: Uuid,
    ) -> DatabaseResult<bool> {
        let before = self.working.follows.len();
        self.working
            .follows
            .retain(|f| !(f.following_id == following_id && f.followed_id == followed_id));
        Ok(self.working.follows.len() < before)
    }

    async fn followers_of(&mut self, user_id: Uuid) -> DatabaseResult<Vec<User>> {
        let edges = self
            .working
            .follows
            .iter()
            .filter(|f| f.followed_id == user_id)
            .collect();
        Ok(self.users_for_edges(edges, |f| f.following_id))
    }

    async fn followed_by(&mut self, user_id: Uuid) -> DatabaseResult<Vec<User>> {
        let edges = self
            .working
            .follows
            .iter()
            .filter(|f| f.following_id == user_id)
            .collect();
        Ok(self.users_for_edges(edges, |f| f.followed_id))
    }
}

#[async_trait]
impl PostStore for MemoryUnitOfWork {
    async fn insert_post(&mut self, post: &Post) -> DatabaseResult<()> {
        self.working.posts.push(post.clone());
        Ok(())
    }

    async fn posts_by_user(&mut self, user_id: Uuid) -> DatabaseResult<Vec<Post>> {
        let mut posts: Vec<Post> = self
            .working
            .posts
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self) -> DatabaseResult<()> {
        let MemoryUnitOfWork { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> DatabaseResult<()> {
        Ok(())
    }
}
