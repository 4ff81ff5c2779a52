use thiserror::Error;

// Failures talking to the chain node
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block at height {0} not found")]
    NotFound(u64),
    #[error("request to chain node failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("chain node returned an error: {0}")]
    Rpc(String),
    #[error("chain node answered HTTP {status} for /{path}")]
    HttpStatus { status: u16, path: String },
    #[error("malformed response from chain node: {0}")]
    Malformed(String),
}

// Failures turning a raw transaction envelope into a DecodedTx
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("transaction is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("transaction is not a valid protobuf Tx: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("transaction has no auth info")]
    MissingAuthInfo,
    #[error("transaction has no fee")]
    MissingFee,
    #[error("invalid fee amount {0:?}")]
    InvalidFeeAmount(String),
}

// Failures deriving an account address from a signer public key
#[derive(Debug, Error)]
pub enum DerivationError {
    #[error("transaction has no signer")]
    MissingSigner,
    #[error("unsupported public key type {0}")]
    UnsupportedKeyType(String),
    #[error("public key is not a valid protobuf PubKey: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("invalid compressed secp256k1 public key {0}")]
    InvalidKey(String),
    #[error("invalid address prefix {0:?}")]
    InvalidPrefix(String),
    #[error("bech32 encoding failed: {0}")]
    Encoding(String),
}

// Failures writing to or reading from the store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to encode message types: {0}")]
    Encoding(#[from] serde_json::Error),
}

// Umbrella error for a single block's processing
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
