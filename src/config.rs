use std::env;
use std::time::Duration;

// Configuration for the fee-grant relayer indexer
#[derive(Clone, Debug)]
pub struct Config {
    pub db_url: String, // PostgreSQL connection URL
    pub rpc_url: String, // CometBFT RPC base URL
    pub granter_address: String, // Shared fee-granter account
    pub addr_prefix: String, // Bech32 prefix for derived signer addresses
    pub start_height: u64, // Starting block height when no checkpoint exists
    pub poll_frequency: Duration, // Interval between polling ticks
    pub max_retry_interval: Duration, // Upper bound for the fetch retry backoff
    pub fetch_tx_results: bool, // Whether to read gas used from /block_results
    pub rpc_timeout: Duration, // Timeout for a single RPC request
    pub metrics_bind_addr: String, // Address for the Prometheus metrics server
}

type ConfigResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync + 'static>>;

impl Config {
    // Loads configuration from environment variables, with defaults for optional fields
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    // Builds the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Treat blank values the same as missing ones
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Config {
            // Required: Database connection URL
            db_url: get("DATABASE_URL").ok_or("DATABASE_URL must be set")?,
            // Required: chain RPC URL, without trailing slash
            rpc_url: get("RPC_URL")
                .ok_or("RPC_URL must be set")?
                .trim_end_matches('/')
                .to_string(),
            // Required: granter whose allowance is watched
            granter_address: get("GRANTER_ADDRESS").ok_or("GRANTER_ADDRESS must be set")?,
            // Optional: address prefix (defaults to cosmos)
            addr_prefix: get("ADDR_PREFIX").unwrap_or_else(|| "cosmos".to_string()),
            // Optional: start height (defaults to 1)
            start_height: parse_or(&get, "INDEXER_START_BLOCK_HEIGHT", 1)?,
            // Optional: poll frequency in milliseconds (defaults to 5s)
            poll_frequency: Duration::from_millis(parse_or(&get, "INDEXER_POLL_FREQUENCY", 5_000)?),
            // Optional: retry backoff cap in milliseconds (defaults to 30s)
            max_retry_interval: Duration::from_millis(parse_or(&get, "INDEXER_MAX_RETRY_INTERVAL", 30_000)?),
            // Optional: read execution results for gas used (defaults to true)
            fetch_tx_results: parse_or(&get, "INDEXER_FETCH_TX_RESULTS", true)?,
            // Optional: RPC timeout in milliseconds (defaults to 10s)
            rpc_timeout: Duration::from_millis(parse_or(&get, "RPC_TIMEOUT", 10_000)?),
            // Optional: metrics server address (defaults to 0.0.0.0:9090)
            metrics_bind_addr: get("METRICS_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:9090".to_string()),
        };

        if config.poll_frequency.is_zero() {
            return Err("INDEXER_POLL_FREQUENCY must be greater than zero".into());
        }
        if config.start_height == 0 {
            return Err("INDEXER_START_BLOCK_HEIGHT must be at least 1".into());
        }

        Ok(config)
    }
}

// Parses an optional variable, failing loudly on garbage instead of silently defaulting
fn parse_or<G, T>(get: &G, key: &str, default: T) -> ConfigResult<T>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("{} has an invalid value: {}", key, raw).into()),
        None => Ok(default),
    }
}
