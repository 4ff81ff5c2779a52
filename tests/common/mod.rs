#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use feegrant_indexer::blockchain::fetcher::ChainClient;
use feegrant_indexer::blockchain::proto;
use feegrant_indexer::database::Store;
use feegrant_indexer::{
    AggregateSnapshot, Block, BlockBatch, ChainError, Checkpoint, Config, MisbehaviorRecord, StoreError,
    TransactionRecord,
};
use prost::Message;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const GRANTER: &str = "cosmos1granter0000000000000000000000000000000";
pub const RECV_PACKET: &str = "/ibc.core.channel.v1.MsgRecvPacket";
pub const UPDATE_CLIENT: &str = "/ibc.core.client.v1.MsgUpdateClient";
pub const ACKNOWLEDGEMENT: &str = "/ibc.core.channel.v1.MsgAcknowledgement";
pub const TRANSFER: &str = "/ibc.applications.transfer.v1.MsgTransfer";
pub const BANK_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";

// Known secp256k1 keys and their cosmos addresses
pub const KEY_A: &str = "AtQaCqFnshaZQp6rIkvAPyzThvCvXSDO+9AzbxVErqJP";
pub const ADDR_A: &str = "cosmos1h806c7khnvmjlywdrkdgk2vrayy2mmvf9rxk2r";
pub const KEY_B: &str = "A08EGB7ro1ORuFhjOnZcSgwYlpe0DSFjVNUIkNNQxwKQ";
pub const ADDR_B: &str = "cosmos1pkptre7fdkl6gfrzlesjjvhxhlc3r4gmmk8rs6";

pub fn test_config() -> Config {
    Config {
        db_url: "postgres://unused".to_string(),
        rpc_url: "http://unused".to_string(),
        granter_address: GRANTER.to_string(),
        addr_prefix: "cosmos".to_string(),
        start_height: 100,
        poll_frequency: Duration::from_millis(1_000),
        max_retry_interval: Duration::from_millis(2_000),
        fetch_tx_results: true,
        rpc_timeout: Duration::from_millis(1_000),
        metrics_bind_addr: "127.0.0.1:0".to_string(),
    }
}

pub fn block_time(height: u64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + height as i64 * 6, 0).unwrap()
}

// Builder for base64 transaction envelopes
pub struct TxBuilder {
    messages: Vec<String>,
    granter: String,
    gas_limit: u64,
    fee: Vec<proto::Coin>,
    signer: Option<proto::Any>,
}

impl TxBuilder {
    pub fn new(messages: &[&str]) -> Self {
        TxBuilder {
            messages: messages.iter().map(|m| m.to_string()).collect(),
            granter: GRANTER.to_string(),
            gas_limit: 100_000,
            fee: vec![coin("250")],
            signer: Some(secp256k1_key(KEY_A)),
        }
    }

    pub fn granter(mut self, granter: &str) -> Self {
        self.granter = granter.to_string();
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn fee(mut self, amount: &str) -> Self {
        self.fee = vec![coin(amount)];
        self
    }

    pub fn fees(mut self, amounts: &[&str]) -> Self {
        self.fee = amounts.iter().map(|a| coin(a)).collect();
        self
    }

    pub fn signer_key(mut self, key_b64: &str) -> Self {
        self.signer = Some(secp256k1_key(key_b64));
        self
    }

    pub fn signer_any(mut self, any: Option<proto::Any>) -> Self {
        self.signer = any;
        self
    }

    pub fn build(self) -> proto::Tx {
        proto::Tx {
            body: Some(proto::TxBody {
                messages: self
                    .messages
                    .into_iter()
                    .map(|type_url| proto::Any { type_url, value: vec![1, 2, 3] })
                    .collect(),
                memo: String::new(),
                timeout_height: 0,
            }),
            auth_info: Some(proto::AuthInfo {
                signer_infos: self
                    .signer
                    .map(|key| vec![proto::SignerInfo { public_key: Some(key), sequence: 7 }])
                    .unwrap_or_default(),
                fee: Some(proto::Fee {
                    amount: self.fee,
                    gas_limit: self.gas_limit,
                    payer: String::new(),
                    granter: self.granter,
                }),
            }),
            signatures: vec![vec![0u8; 64]],
        }
    }

    pub fn encode(self) -> String {
        STANDARD.encode(self.build().encode_to_vec())
    }
}

pub fn coin(amount: &str) -> proto::Coin {
    proto::Coin { denom: "uatom".to_string(), amount: amount.to_string() }
}

pub fn secp256k1_key(key_b64: &str) -> proto::Any {
    let key = STANDARD.decode(key_b64).unwrap();
    proto::Any {
        type_url: "/cosmos.crypto.secp256k1.PubKey".to_string(),
        value: proto::Secp256k1PubKey { key }.encode_to_vec(),
    }
}

#[derive(Default)]
struct ChainInner {
    blocks: HashMap<u64, Block>,
    tip: u64,
    failures: HashMap<u64, usize>,
    gas_used: HashMap<u64, Vec<u64>>,
    pruned_results: Vec<u64>,
    results_failures: HashMap<u64, usize>,
    latest_fails: bool,
    fetched: Vec<u64>,
}

// ChainClient serving prepared blocks, with injectable failures
#[derive(Clone, Default)]
pub struct ScriptedChain {
    inner: Arc<Mutex<ChainInner>>,
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_block(&self, height: u64, txs: Vec<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.blocks.insert(height, Block { height, time: block_time(height), txs });
        inner.tip = inner.tip.max(height);
    }

    pub fn set_gas_used(&self, height: u64, gas_used: Vec<u64>) {
        self.inner.lock().unwrap().gas_used.insert(height, gas_used);
    }

    // Results for `height` are answered the way a pruned node does
    pub fn prune_results(&self, height: u64) {
        self.inner.lock().unwrap().pruned_results.push(height);
    }

    // The next `times` results requests for `height` hit a gateway error
    pub fn fail_results(&self, height: u64, times: usize) {
        self.inner.lock().unwrap().results_failures.insert(height, times);
    }

    // The next `times` fetches of `height` fail with a network-style error
    pub fn fail_block(&self, height: u64, times: usize) {
        self.inner.lock().unwrap().failures.insert(height, times);
    }

    pub fn set_latest_fails(&self, fails: bool) {
        self.inner.lock().unwrap().latest_fails = fails;
    }

    pub fn fetched(&self) -> Vec<u64> {
        self.inner.lock().unwrap().fetched.clone()
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn block_at(&self, height: u64) -> Result<Block, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetched.push(height);
        if let Some(remaining) = inner.failures.get_mut(&height) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ChainError::Rpc("connection refused".to_string()));
            }
        }
        inner.blocks.get(&height).cloned().ok_or(ChainError::NotFound(height))
    }

    async fn latest_block(&self) -> Result<Block, ChainError> {
        let inner = self.inner.lock().unwrap();
        if inner.latest_fails {
            return Err(ChainError::Rpc("connection refused".to_string()));
        }
        Ok(inner.blocks.get(&inner.tip).cloned().unwrap_or(Block {
            height: inner.tip,
            time: block_time(inner.tip),
            txs: Vec::new(),
        }))
    }

    async fn tx_gas_used(&self, height: u64) -> Result<Option<Vec<u64>>, ChainError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(remaining) = inner.results_failures.get_mut(&height) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ChainError::HttpStatus { status: 502, path: "block_results".to_string() });
            }
        }
        if inner.pruned_results.contains(&height) {
            return Err(ChainError::Rpc(format!(
                "Internal error (-32603): could not find results for height #{}",
                height
            )));
        }
        Ok(inner.gas_used.get(&height).cloned())
    }
}

#[derive(Default)]
struct StoreInner {
    transactions: Vec<TransactionRecord>,
    misbehaviors: Vec<MisbehaviorRecord>,
    checkpoints: Vec<Checkpoint>,
    aggregates: Vec<AggregateSnapshot>,
    failures: usize,
    closed: bool,
}

// In-memory Store with all-or-nothing block writes
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(height: u64) -> Self {
        let store = Self::new();
        store.inner.lock().unwrap().checkpoints.push(Checkpoint { height, time: block_time(height) });
        store
    }

    // The next `times` block writes fail
    pub fn fail_writes(&self, times: usize) {
        self.inner.lock().unwrap().failures = times;
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.inner.lock().unwrap().transactions.clone()
    }

    pub fn misbehaviors(&self) -> Vec<MisbehaviorRecord> {
        self.inner.lock().unwrap().misbehaviors.clone()
    }

    pub fn checkpoints(&self) -> Vec<u64> {
        self.inner.lock().unwrap().checkpoints.iter().map(|c| c.height).collect()
    }

    pub fn aggregates(&self) -> Vec<AggregateSnapshot> {
        self.inner.lock().unwrap().aggregates.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn latest_checkpoint_height(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.inner.lock().unwrap().checkpoints.iter().map(|c| c.height).max())
    }

    async fn persist_block(&self, batch: &BlockBatch) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.failures > 0 {
            inner.failures -= 1;
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        inner.transactions.extend(batch.transactions.iter().cloned());
        inner.misbehaviors.extend(batch.misbehaviors.iter().cloned());
        inner.checkpoints.push(batch.checkpoint.clone());
        inner.aggregates.extend(batch.aggregate.iter().cloned());
        Ok(())
    }

    async fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }
}
