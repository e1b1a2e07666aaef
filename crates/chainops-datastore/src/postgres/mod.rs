mod providers;
mod rows;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::error::DatastoreError;

/// Postgres-backed `Datastore`. A thin wrapper around a connection pool;
/// every provider impl lives under `postgres::providers` as a separate
/// `impl Provider for PgDatastore` block, one file per concern.
pub struct PgDatastore {
    pool: PgPool,
}

impl PgDatastore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, DatastoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub(crate) fn get_opt_str(row: &PgRow, col: &str) -> Result<Option<String>, DatastoreError> {
    row.try_get::<Option<String>, _>(col)
        .map_err(|e| DatastoreError::InvalidData(format!("{col}: {e}")))
}

pub(crate) fn get_str(row: &PgRow, col: &str) -> Result<String, DatastoreError> {
    row.try_get::<String, _>(col)
        .map_err(|e| DatastoreError::InvalidData(format!("{col}: {e}")))
}
