pub mod blockchain;
pub mod config;
pub mod database;
pub mod error;
pub mod metrics;
pub mod models;

pub use config::Config;
pub use error::{ChainError, DecodeError, DerivationError, IndexerError, StoreError};
pub use models::{AggregateSnapshot, Block, BlockBatch, Checkpoint, MisbehaviorRecord, TransactionRecord};
