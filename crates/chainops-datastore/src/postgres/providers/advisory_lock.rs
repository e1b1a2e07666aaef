use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Postgres, Row};

use crate::error::DatastoreError;
use crate::postgres::PgDatastore;
use crate::providers::{AdvisoryLockProvider, EvmFunderLock};

struct PgFunderLock {
    conn: PoolConnection<Postgres>,
    key: String,
}

#[async_trait]
impl EvmFunderLock for PgFunderLock {
    async fn unlock(mut self: Box<Self>) -> Result<(), DatastoreError> {
        sqlx::query("SELECT pg_advisory_unlock(hashtext($1)::bigint)")
            .bind(&self.key)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AdvisoryLockProvider for PgDatastore {
    async fn lock_evm_funder(&self, key: &str) -> Result<Box<dyn EvmFunderLock>, DatastoreError> {
        let mut conn = self.pool().acquire().await?;
        let row = sqlx::query("SELECT pg_try_advisory_lock(hashtext($1)::bigint) AS acquired")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;
        let acquired: bool = row
            .try_get("acquired")
            .map_err(|e| DatastoreError::InvalidData(format!("acquired: {e}")))?;
        if acquired {
            Ok(Box::new(PgFunderLock { conn, key: key.to_string() }))
        } else {
            Err(DatastoreError::Connection(format!("funder lock {key} already held")))
        }
    }
}
