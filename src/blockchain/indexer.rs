use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use log::{debug, info, warn};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use super::aggregator::{gas_price, Aggregator};
use super::classifier::{TransactionClassifier, TxClass};
use super::decoder::{DecodedTx, TxDecoder};
use super::fetcher::ChainClient;
use crate::config::Config;
use crate::database::Store;
use crate::error::{ChainError, IndexerError};
use crate::metrics::{
    BLOCK_PROCESS_TIME, GRANTEE_MISBEHAVIOUR_TXS, LAST_PROCESSED_HEIGHT, RELAYER_FEE, RELAYER_TXS,
    TX_DECODE_FAILURES,
};
use crate::models::{BlockBatch, Checkpoint, MisbehaviorRecord, TransactionRecord};

// First retry delay after a failed block
const INITIAL_RETRY_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    CatchingUp,
    Polling,
}

// Everything the loop mutates between blocks
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerState {
    // Next height to process
    pub current_height: u64,
    // Chain tip as of the last successful refresh
    pub latest_height: Option<u64>,
    pub mode: Mode,
    // Totals since the last flush
    pub aggregator: Aggregator,
}

// What one committed block contained
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSummary {
    pub height: u64,
    pub tx_count: usize,
    pub relayer_txs: usize,
    pub misbehaviors: usize,
    pub skipped: usize,
    pub flushed: bool,
}

// A transaction that passed decoding, classification and address derivation
struct ClassifiedTx {
    index: usize,
    tx: DecodedTx,
    class: TxClass,
    address: String,
}

// Sequential block indexer: catches up to the chain tip, then polls for new blocks
pub struct Indexer<C, D, S> {
    chain: C,
    decoder: D,
    store: S,
    classifier: TransactionClassifier,
    poll_frequency: Duration,
    fetch_tx_results: bool,
    retry_backoff: ExponentialBackoff,
    state: IndexerState,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C, D, S> Indexer<C, D, S>
where
    C: ChainClient,
    D: TxDecoder,
    S: Store,
{
    // Creates an indexer positioned right after the last checkpoint, or at the configured start height
    pub async fn resume(config: &Config, chain: C, decoder: D, store: S) -> Result<Self, IndexerError> {
        let current_height = match store.latest_checkpoint_height().await? {
            Some(height) => {
                info!("Found checkpoint at height {}, resuming at {}", height, height + 1);
                height + 1
            }
            None => {
                info!("No checkpoint found, starting at height {}", config.start_height);
                config.start_height
            }
        };

        let mut retry_backoff = ExponentialBackoff {
            initial_interval: INITIAL_RETRY_INTERVAL.min(config.max_retry_interval),
            max_interval: config.max_retry_interval,
            // Never give up on a height; the cap bounds each wait instead
            max_elapsed_time: None,
            ..Default::default()
        };
        retry_backoff.reset();

        Ok(Indexer {
            chain,
            decoder,
            store,
            classifier: TransactionClassifier::new(config.granter_address.clone()),
            poll_frequency: config.poll_frequency,
            fetch_tx_results: config.fetch_tx_results,
            retry_backoff,
            state: IndexerState {
                current_height,
                latest_height: None,
                mode: Mode::CatchingUp,
                aggregator: Aggregator::new(),
            },
            shutdown: None,
        })
    }

    pub fn state(&self) -> &IndexerState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // Drives the state machine until `shutdown` flips to true, then closes the store
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.shutdown = Some(shutdown.clone());
        info!("Indexer starting at height {}", self.state.current_height);

        // Catch up block by block, sleeping out the backoff after a failure
        while self.state.mode == Mode::CatchingUp && !self.is_stopping() {
            if let Some(delay) = self.catch_up_step().await {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        // Then follow the tip on a fixed interval
        if !self.is_stopping() {
            info!("Indexer caught up at height {}, switching to polling mode", self.state.current_height);
            let mut ticker = tokio::time::interval(self.poll_frequency);
            // A slow tick pushes the next one back instead of bursting
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            while !self.is_stopping() {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.poll_tick().await;
                    }
                    _ = shutdown.changed() => {}
                }
            }
        }

        // Stopped between blocks, so nothing is half-written
        info!("Indexer stopping at height {}", self.state.current_height);
        self.store.close().await;
    }

    // One catch-up iteration. Returns the delay to wait before retrying a failed height.
    pub async fn catch_up_step(&mut self) -> Option<Duration> {
        let height = self.state.current_height;
        let retry_delay = match self.process_height(height).await {
            Ok(_) => {
                self.state.current_height += 1;
                self.retry_backoff.reset();
                None
            }
            Err(e) => {
                let delay = self.next_retry_delay();
                warn!("Failed to index block {}: {}. Retrying in {:?}", height, e, delay);
                Some(delay)
            }
        };

        // Switch to polling once past a tip we actually saw
        self.refresh_latest_height().await;
        if let Some(latest) = self.state.latest_height {
            if self.state.current_height > latest {
                self.state.mode = Mode::Polling;
            }
        }
        retry_delay
    }

    // One polling tick: index every block up to the refreshed tip. Returns the number indexed.
    pub async fn poll_tick(&mut self) -> usize {
        self.refresh_latest_height().await;
        let Some(latest) = self.state.latest_height else {
            return 0;
        };

        // Drain every height up to the tip, stopping at the first failure
        let mut indexed = 0;
        while self.state.current_height <= latest && !self.is_stopping() {
            let height = self.state.current_height;
            match self.process_height(height).await {
                Ok(_) => {
                    self.state.current_height += 1;
                    indexed += 1;
                }
                Err(e) => {
                    // Same height again on the next tick
                    warn!("Failed to index block {}: {}. Retrying next tick", height, e);
                    break;
                }
            }
        }
        indexed
    }

    // Fetches, classifies and commits one block. On error nothing is persisted and the state is unchanged.
    pub async fn process_height(&mut self, height: u64) -> Result<BlockSummary, IndexerError> {
        let start_time = Instant::now();

        // Fetch the block and make sure the node answered for the height we asked
        let block = self.chain.block_at(height).await?;
        if block.height != height {
            return Err(ChainError::Malformed(format!("asked for block {} but got {}", height, block.height)).into());
        }

        // Decode and classify every transaction, keeping block order
        let mut classified = Vec::new();
        let mut skipped = 0;
        for (index, raw) in block.txs.iter().enumerate() {
            match self.classify_tx(height, index, raw) {
                Some(Ok(tx)) => classified.push(tx),
                Some(Err(())) => skipped += 1,
                None => {}
            }
        }

        // Gas used is only needed for relayer records
        let has_relayer = classified.iter().any(|c| c.class == TxClass::Relayer);
        let gas_used = if has_relayer && self.fetch_tx_results {
            self.fetch_gas_used(height, block.txs.len()).await?
        } else {
            Vec::new()
        };

        // Work on a copy so a failed commit leaves the running totals untouched
        let mut aggregator = self.state.aggregator.clone();
        let mut transactions = Vec::new();
        let mut misbehaviors = Vec::new();
        // Build the records; relayer transactions also feed the running totals
        for entry in classified {
            match entry.class {
                TxClass::Relayer => {
                    let gas_wanted = entry.tx.gas_limit;
                    let fee_amount = entry.tx.fee_amount;
                    let gas_used = gas_used.get(entry.index).copied().unwrap_or(0);
                    aggregator.record(gas_wanted, gas_used, fee_amount);
                    transactions.push(TransactionRecord {
                        height,
                        time: block.time,
                        relayer_address: entry.address,
                        message_types: entry.tx.message_types,
                        gas_wanted,
                        gas_used,
                        fee_amount,
                        gas_price: gas_price(fee_amount, gas_wanted),
                    });
                }
                TxClass::Misbehavior => misbehaviors.push(MisbehaviorRecord {
                    height,
                    time: block.time,
                    grantee_address: entry.address,
                    message_types: entry.tx.message_types,
                }),
                TxClass::Irrelevant => {}
            }
        }

        // Snapshot the totals only when this block had relayer activity
        let aggregate = if transactions.is_empty() {
            None
        } else {
            aggregator.flush_if_non_empty(height, block.time)
        };

        // Persist records, snapshot and checkpoint in one commit
        let batch = BlockBatch {
            transactions,
            misbehaviors,
            checkpoint: Checkpoint { height, time: block.time },
            aggregate,
        };
        self.store.persist_block(&batch).await?;

        // Committed: adopt the new totals and publish metrics
        self.state.aggregator = aggregator;
        self.publish_metrics(&batch);
        // Record processing time
        let elapsed = start_time.elapsed();
        BLOCK_PROCESS_TIME.observe(elapsed.as_secs_f64());

        let summary = BlockSummary {
            height,
            tx_count: block.txs.len(),
            relayer_txs: batch.transactions.len(),
            misbehaviors: batch.misbehaviors.len(),
            skipped,
            flushed: batch.aggregate.is_some(),
        };
        info!(
            "Indexed block {} ({}) with {} transactions: {} relayer, {} misbehaving, {} skipped in {:.2}s",
            height,
            block.time,
            summary.tx_count,
            summary.relayer_txs,
            summary.misbehaviors,
            summary.skipped,
            elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    // None for irrelevant transactions, Err for ones that had to be skipped
    fn classify_tx(&self, height: u64, index: usize, raw: &str) -> Option<Result<ClassifiedTx, ()>> {
        let tx = match self.decoder.decode(raw) {
            Ok(tx) => tx,
            Err(e) => {
                warn!("Skipping undecodable transaction {} in block {}: {}", index, height, e);
                TX_DECODE_FAILURES.inc();
                return Some(Err(()));
            }
        };

        let class = self.classifier.classify(&tx);
        if class == TxClass::Irrelevant {
            return None;
        }

        match self.decoder.derive_address(tx.signer.as_ref()) {
            Ok(address) => Some(Ok(ClassifiedTx { index, tx, class, address })),
            Err(e) => {
                warn!("Skipping {:?} transaction {} in block {}: {}", class, index, height, e);
                Some(Err(()))
            }
        }
    }

    // Gas used per transaction, or an empty list when the node has no results for the block.
    // JSON-RPC errors such as pruned results count as no results; transport failures fail the block.
    async fn fetch_gas_used(&self, height: u64, tx_count: usize) -> Result<Vec<u64>, ChainError> {
        let results = match self.chain.tx_gas_used(height).await {
            Ok(results) => results,
            Err(e @ (ChainError::Rpc(_) | ChainError::NotFound(_))) => {
                warn!("Transaction results for block {} unavailable ({}), recording gas used as zero", height, e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        match results {
            Some(gas_used) if gas_used.len() == tx_count => Ok(gas_used),
            Some(gas_used) => {
                warn!(
                    "Block {} has {} transactions but {} results, recording gas used as zero",
                    height,
                    tx_count,
                    gas_used.len()
                );
                Ok(Vec::new())
            }
            None => {
                debug!("No transaction results for block {}, recording gas used as zero", height);
                Ok(Vec::new())
            }
        }
    }

    // Keeps the previous tip when the node cannot be reached
    async fn refresh_latest_height(&mut self) {
        match self.chain.latest_block().await {
            Ok(block) => self.state.latest_height = Some(block.height),
            Err(e) => warn!("Failed to fetch latest block: {}", e),
        }
    }

    // Backoff never runs out with max_elapsed_time unset; fall back to the cap anyway
    fn next_retry_delay(&mut self) -> Duration {
        self.retry_backoff
            .next_backoff()
            .unwrap_or(self.retry_backoff.max_interval)
    }

    // Called only after the block commits
    fn publish_metrics(&self, batch: &BlockBatch) {
        for record in &batch.transactions {
            RELAYER_TXS.inc();
            RELAYER_FEE.inc_by(record.fee_amount as f64);
        }
        for record in &batch.misbehaviors {
            // Same format as the stored msg_array
            let messages = record.message_list();
            GRANTEE_MISBEHAVIOUR_TXS
                .with_label_values(&[record.grantee_address.as_str(), messages.as_str()])
                .inc();
        }
        LAST_PROCESSED_HEIGHT.set(batch.checkpoint.height as i64);
    }

    // A dropped shutdown sender counts as a stop request
    fn is_stopping(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|rx| rx.has_changed().is_err() || *rx.borrow())
    }
}
