pub mod aggregator;
pub mod classifier;
pub mod decoder;
pub mod fetcher;
pub mod indexer;
pub mod proto;

pub use aggregator::{gas_price, Aggregator};
pub use classifier::{TransactionClassifier, TxClass};
pub use decoder::{CosmosTxDecoder, DecodedTx, SignerKey, TxDecoder};
pub use fetcher::{ChainClient, RpcChainClient};
pub use indexer::{BlockSummary, Indexer, IndexerState, Mode};
