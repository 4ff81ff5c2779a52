use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use crate::error::ChainError;
use crate::models::Block;

// Read access to the chain node; failures are returned, never retried here
#[async_trait]
pub trait ChainClient: Send + Sync {
    // Fetches the block at the given height
    async fn block_at(&self, height: u64) -> Result<Block, ChainError>;
    // Fetches the chain tip
    async fn latest_block(&self) -> Result<Block, ChainError>;
    // Fetches gas used per transaction at the given height, in block order; None if results are unavailable
    async fn tx_gas_used(&self, height: u64) -> Result<Option<Vec<u64>>, ChainError>;
}

// JSON-RPC envelope returned by CometBFT's HTTP endpoints
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlockResult {
    block: RawBlock,
}

#[derive(Debug, Deserialize)]
struct RawBlock {
    header: RawHeader,
    #[serde(default)]
    data: RawData,
}

#[derive(Debug, Deserialize)]
struct RawHeader {
    #[serde(deserialize_with = "u64_from_string")]
    height: u64,
    time: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
struct RawData {
    // Empty blocks come back as `null`
    #[serde(default)]
    txs: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct BlockResultsResult {
    #[serde(default)]
    txs_results: Option<Vec<RawTxResult>>,
}

#[derive(Debug, Deserialize)]
struct RawTxResult {
    #[serde(default, deserialize_with = "u64_from_string")]
    gas_used: u64,
}

// CometBFT encodes 64-bit integers as JSON strings
fn u64_from_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
        StringOrNumber::Number(n) => Ok(n),
    }
}

// Unwraps a JSON-RPC body, mapping node-side errors into ChainError
fn parse_rpc<T: DeserializeOwned>(body: &str, height: Option<u64>) -> Result<T, ChainError> {
    // Anything that is not a JSON-RPC envelope is malformed
    let response: RpcResponse<T> =
        serde_json::from_str(body).map_err(|e| ChainError::Malformed(e.to_string()))?;
    if let Some(err) = response.error {
        let detail = err.data.unwrap_or_default();
        // The node reports unknown heights as a generic internal error
        if let Some(h) = height {
            if detail.contains("must be less than or equal to") {
                return Err(ChainError::NotFound(h));
            }
        }
        // Everything else, including pruned heights, is surfaced as reported
        return Err(ChainError::Rpc(format!("{} ({}): {}", err.message, err.code, detail)));
    }
    response
        .result
        .ok_or_else(|| ChainError::Malformed("response has neither result nor error".to_string()))
}

// Parses a /block response body
pub fn parse_block_response(body: &str, height: Option<u64>) -> Result<Block, ChainError> {
    let result: BlockResult = parse_rpc(body, height)?;
    // `data.txs` is null for empty blocks
    Ok(Block {
        height: result.block.header.height,
        time: result.block.header.time,
        txs: result.block.data.txs.unwrap_or_default(),
    })
}

// Parses a /block_results response body into per-transaction gas used
pub fn parse_block_results_response(body: &str, height: u64) -> Result<Option<Vec<u64>>, ChainError> {
    let result: BlockResultsResult = parse_rpc(body, Some(height))?;
    // Keep the block order; a missing result list is reported as None
    Ok(result
        .txs_results
        .map(|txs| txs.into_iter().map(|tx| tx.gas_used).collect()))
}

// ChainClient over the CometBFT HTTP RPC
pub struct RpcChainClient {
    http: reqwest::Client,
    rpc_url: String,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, ChainError> {
        // One client for every request so connections are pooled
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        info!("Using chain RPC at {}", rpc_url);
        Ok(RpcChainClient {
            http,
            rpc_url: rpc_url.trim_end_matches('/').to_string(),
        })
    }

    // Issues a GET and returns the body; error statuses still carry a JSON-RPC error body
    async fn get(&self, path: &str, height: Option<u64>) -> Result<String, ChainError> {
        let mut request = self.http.get(format!("{}/{}", self.rpc_url, path));
        // Without a height the node answers with its tip
        if let Some(h) = height {
            request = request.query(&[("height", h.to_string())]);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("GET /{} height={:?} -> {}", path, height, status);
        // A bare error status comes from a proxy in front of the node
        if !status.is_success() && !body.contains("\"error\"") {
            return Err(ChainError::HttpStatus { status: status.as_u16(), path: path.to_string() });
        }
        Ok(body)
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_at(&self, height: u64) -> Result<Block, ChainError> {
        let body = self.get("block", Some(height)).await?;
        parse_block_response(&body, Some(height))
    }

    async fn latest_block(&self) -> Result<Block, ChainError> {
        let body = self.get("block", None).await?;
        parse_block_response(&body, None)
    }

    async fn tx_gas_used(&self, height: u64) -> Result<Option<Vec<u64>>, ChainError> {
        let body = self.get("block_results", Some(height)).await?;
        parse_block_results_response(&body, height)
    }
}
