//! PostgreSQL-backed stores

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Postgres, Transaction};

use super::{Database, UnitOfWork};

mod follow;
mod post;
mod token;
mod user;

/// Connection pool handing out PostgreSQL transactions
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for PgDatabase {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> DatabaseResult<PgUnitOfWork> {
        let tx = self.pool.begin().await.map_err(DatabaseError::Connection)?;
        Ok(PgUnitOfWork { tx })
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        common::database::health_check(&self.pool).await
    }
}

/// A single PostgreSQL transaction; rolled back by sqlx when dropped
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> DatabaseResult<()> {
        self.tx.commit().await.map_err(DatabaseError::from_query)
    }

    async fn rollback(self) -> DatabaseResult<()> {
        self.tx.rollback().await.map_err(DatabaseError::from_query)
    }
}
