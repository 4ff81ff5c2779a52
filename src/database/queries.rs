use sqlx::{postgres::PgTransaction, Pool, Postgres};
use crate::error::StoreError;
use crate::models::{AggregateSnapshot, Checkpoint, MisbehaviorRecord, TransactionRecord};

// Postgres has no unsigned 64-bit integers; values past BIGINT are stored as i64::MAX
pub fn to_bigint(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// Returns the highest checkpointed block height, or None on a fresh database
pub async fn latest_checkpoint_height(pool: &Pool<Postgres>) -> Result<Option<u64>, StoreError> {
    let height: Option<i64> = sqlx::query_scalar("SELECT MAX(block_height) FROM last_block")
        .fetch_one(pool)
        .await?;
    // Heights are written from u64 values, so a negative one can only come from outside
    Ok(height.and_then(|h| u64::try_from(h).ok()))
}

// Inserts one relayer transaction
pub async fn insert_transaction(
    db_tx: &mut PgTransaction<'_>,
    record: &TransactionRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO relayer_transactions
            (block_height, block_time, relayer_address, msg_array, gas_wanted, gas_used, fee_amount, gas_price)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(to_bigint(record.height))
    .bind(record.time)
    .bind(&record.relayer_address)
    .bind(serde_json::to_string(&record.message_types)?)
    .bind(to_bigint(record.gas_wanted))
    .bind(to_bigint(record.gas_used))
    .bind(to_bigint(record.fee_amount))
    .bind(record.gas_price)
    .execute(&mut **db_tx)
    .await?;
    Ok(())
}

// Inserts one flushed aggregate snapshot
pub async fn insert_aggregate(
    db_tx: &mut PgTransaction<'_>,
    snapshot: &AggregateSnapshot,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO total_metrics
            (block_height, block_time, total_gas_wanted, total_gas_used, total_fee, transaction_count)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(to_bigint(snapshot.height))
    .bind(snapshot.time)
    .bind(to_bigint(snapshot.total_gas_wanted))
    .bind(to_bigint(snapshot.total_gas_used))
    .bind(to_bigint(snapshot.total_fee))
    .bind(to_bigint(snapshot.transaction_count))
    .execute(&mut **db_tx)
    .await?;
    Ok(())
}

// Inserts the checkpoint for a processed block
pub async fn insert_checkpoint(
    db_tx: &mut PgTransaction<'_>,
    checkpoint: &Checkpoint,
) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO last_block (block_height, block_time) VALUES ($1, $2)")
        .bind(to_bigint(checkpoint.height))
        .bind(checkpoint.time)
        .execute(&mut **db_tx)
        .await?;
    Ok(())
}

// Inserts one grantee misbehavior event
pub async fn insert_misbehavior(
    db_tx: &mut PgTransaction<'_>,
    record: &MisbehaviorRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO grantee_misbehaviors (block_height, block_time, grantee_address, msg_array)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(to_bigint(record.height))
    .bind(record.time)
    .bind(&record.grantee_address)
    .bind(record.message_list())
    .execute(&mut **db_tx)
    .await?;
    Ok(())
}
