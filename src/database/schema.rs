use sqlx::{Pool, Postgres};

// Creates the four indexer tables if they do not exist yet
pub async fn init_db(pool: &Pool<Postgres>) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS relayer_transactions (
            block_height BIGINT NOT NULL,
            block_time TIMESTAMPTZ NOT NULL,
            relayer_address TEXT NOT NULL,
            msg_array TEXT NOT NULL,
            gas_wanted BIGINT NOT NULL,
            gas_used BIGINT NOT NULL,
            fee_amount BIGINT NOT NULL,
            gas_price DOUBLE PRECISION
        );
        CREATE TABLE IF NOT EXISTS total_metrics (
            block_height BIGINT NOT NULL,
            block_time TIMESTAMPTZ NOT NULL,
            total_gas_wanted BIGINT NOT NULL,
            total_gas_used BIGINT NOT NULL,
            total_fee BIGINT NOT NULL,
            transaction_count BIGINT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS last_block (
            block_height BIGINT NOT NULL,
            block_time TIMESTAMPTZ NOT NULL
        );
        CREATE TABLE IF NOT EXISTS grantee_misbehaviors (
            block_height BIGINT NOT NULL,
            block_time TIMESTAMPTZ NOT NULL,
            grantee_address TEXT NOT NULL,
            msg_array TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_last_block_height ON last_block (block_height);
        CREATE INDEX IF NOT EXISTS idx_relayer_tx_height ON relayer_transactions (block_height);
        CREATE INDEX IF NOT EXISTS idx_misbehavior_grantee ON grantee_misbehaviors (grantee_address);
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
