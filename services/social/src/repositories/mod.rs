//! Storage access interfaces
//!
//! Every entity gets its own store trait with named queries. A unit of work
//! implements all of them against one open transaction; nothing it writes is
//! visible to other units of work until [`UnitOfWork::commit`] succeeds, and
//! dropping it without committing discards its writes.

use async_trait::async_trait;
use common::error::DatabaseResult;
use uuid::Uuid;

use crate::models::{AccountType, Follow, NewUser, Post, User, VerificationToken};

pub mod memory;
pub mod postgres;

pub use memory::MemoryDatabase;
pub use postgres::PgDatabase;

/// Constraint names shared by the PostgreSQL schema and the in-memory engine
pub mod constraints {
    pub const USERS_USERNAME: &str = "users_username_key";
    pub const USERS_EMAIL: &str = "users_email_key";
    pub const TOKENS_TOKEN: &str = "verification_tokens_token_key";
    pub const FOLLOWS_PAIR: &str = "follows_pair_key";
    pub const FOLLOWS_NO_SELF: &str = "follows_no_self";
}

/// User records
#[async_trait]
pub trait UserStore: Send {
    /// Persist a new user; the store assigns the id
    async fn insert_user(&mut self, new_user: &NewUser) -> DatabaseResult<User>;

    async fn find_user_by_id(&mut self, id: Uuid) -> DatabaseResult<Option<User>>;

    async fn find_user_by_username(&mut self, username: &str) -> DatabaseResult<Option<User>>;

    async fn find_user_by_email(&mut self, email: &str) -> DatabaseResult<Option<User>>;

    /// Returns false when no user has this id
    async fn set_user_enabled(&mut self, id: Uuid, enabled: bool) -> DatabaseResult<bool>;

    /// Returns false when no user has this id
    async fn set_account_type(
        &mut self,
        id: Uuid,
        account_type: AccountType,
    ) -> DatabaseResult<bool>;
}

/// Verification tokens
#[async_trait]
pub trait TokenStore: Send {
    async fn insert_token(&mut self, token: &VerificationToken) -> DatabaseResult<()>;

    async fn find_token(&mut self, token: &str) -> DatabaseResult<Option<VerificationToken>>;

    /// All tokens issued to a user, oldest first
    async fn tokens_for_user(&mut self, user_id: Uuid) -> DatabaseResult<Vec<VerificationToken>>;
}

/// Follow edges
#[async_trait]
pub trait FollowStore: Send {
    async fn insert_follow(&mut self, follow: &Follow) -> DatabaseResult<()>;

    async fn find_follow(
        &mut self,
        following_id: Uuid,
        followed_id: Uuid,
    ) -> DatabaseResult<Option<Follow>>;

    /// Returns false when there was no such edge
    async fn delete_follow(&mut self, following_id: Uuid, followed_id: Uuid)
    -> DatabaseResult<bool>;

    /// Users following `user_id`, most recent edge first
    async fn followers_of(&mut self, user_id: Uuid) -> DatabaseResult<Vec<User>>;

    /// Users `user_id` follows, most recent edge first
    async fn followed_by(&mut self, user_id: Uuid) -> DatabaseResult<Vec<User>>;
}

/// Posts
#[async_trait]
pub trait PostStore: Send {
    async fn insert_post(&mut self, post: &Post) -> DatabaseResult<()>;

    /// Posts authored by `user_id`, newest first
    async fn posts_by_user(&mut self, user_id: Uuid) -> DatabaseResult<Vec<Post>>;
}

/// One open storage transaction
#[async_trait]
pub trait UnitOfWork: UserStore + TokenStore + FollowStore + PostStore + Send {
    async fn commit(self) -> DatabaseResult<()>;

    async fn rollback(self) -> DatabaseResult<()>;
}

/// A storage engine that hands out units of work
#[async_trait]
pub trait Database: Clone + Send + Sync + 'static {
    type Tx: UnitOfWork + 'static;

    async fn begin(&self) -> DatabaseResult<Self::Tx>;

    async fn health_check(&self) -> DatabaseResult<bool>;
}
