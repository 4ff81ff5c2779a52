use async_trait::async_trait;
use log::{error, info};
use sqlx::{Pool, Postgres};
use crate::error::StoreError;
use crate::models::BlockBatch;
use super::queries;

// Durable history of the indexer; the sole source of truth for the resume height
#[async_trait]
pub trait Store: Send + Sync {
    // Highest persisted checkpoint height, or None if nothing was indexed yet
    async fn latest_checkpoint_height(&self) -> Result<Option<u64>, StoreError>;
    // Writes all records of one block and its checkpoint atomically
    async fn persist_block(&self, batch: &BlockBatch) -> Result<(), StoreError>;
    // Waits for in-flight writes and releases the underlying connections
    async fn close(&self);
}

// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        PgStore { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn latest_checkpoint_height(&self) -> Result<Option<u64>, StoreError> {
        queries::latest_checkpoint_height(&self.pool).await
    }

    async fn persist_block(&self, batch: &BlockBatch) -> Result<(), StoreError> {
        // Begin a database transaction; dropping it without commit rolls everything back
        let mut db_tx = self.pool.begin().await?;

        // Relayer records keep the block's native transaction order
        for record in &batch.transactions {
            queries::insert_transaction(&mut db_tx, record).await?;
        }
        for record in &batch.misbehaviors {
            queries::insert_misbehavior(&mut db_tx, record).await?;
        }
        queries::insert_checkpoint(&mut db_tx, &batch.checkpoint).await?;
        if let Some(snapshot) = &batch.aggregate {
            queries::insert_aggregate(&mut db_tx, snapshot).await?;
        }

        // Commit; the checkpoint is only visible together with the records it covers
        db_tx.commit().await.map_err(|e| {
            error!("Failed to commit block {}: {}", batch.checkpoint.height, e);
            e
        })?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed the database connection pool");
    }
}
