use chrono::{DateTime, Utc};

// A block as seen by the indexer: header fields plus raw base64 transaction envelopes
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub height: u64,
    pub time: DateTime<Utc>,
    pub txs: Vec<String>,
}

// Marks a block as processed; the highest one is the resume point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub height: u64,
    pub time: DateTime<Utc>,
}

// One relayer transaction paid by the shared granter
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub height: u64,
    pub time: DateTime<Utc>,
    pub relayer_address: String,
    pub message_types: Vec<String>,
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub fee_amount: u64,
    pub gas_price: Option<f64>,
}

// Running totals flushed after a block with relayer activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSnapshot {
    pub height: u64,
    pub time: DateTime<Utc>,
    pub total_gas_wanted: u64,
    pub total_gas_used: u64,
    pub total_fee: u64,
    pub transaction_count: u64,
}

// A grantee that spent the shared allowance on non-relay messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MisbehaviorRecord {
    pub height: u64,
    pub time: DateTime<Utc>,
    pub grantee_address: String,
    pub message_types: Vec<String>,
}

impl MisbehaviorRecord {
    // Spaced list `["a", "b"]`, shared by the msg_array column and the misbehaviour metric label
    pub fn message_list(&self) -> String {
        let quoted: Vec<String> = self.message_types.iter().map(|t| format!("\"{}\"", t)).collect();
        format!("[{}]", quoted.join(", "))
    }
}

// Everything one block produces, written atomically by the store
#[derive(Debug, Clone, PartialEq)]
pub struct BlockBatch {
    pub transactions: Vec<TransactionRecord>,
    pub misbehaviors: Vec<MisbehaviorRecord>,
    pub checkpoint: Checkpoint,
    pub aggregate: Option<AggregateSnapshot>,
}
