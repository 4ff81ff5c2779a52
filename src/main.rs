use actix_web::{web, App, HttpServer};
use feegrant_indexer::blockchain::{CosmosTxDecoder, Indexer, RpcChainClient};
use feegrant_indexer::database::{init_db, PgStore};
use feegrant_indexer::{metrics, Config};
use log::{error, info};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env if present, then initialize logging from RUST_LOG
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    info!(
        "Indexing fee grant {} (prefix {}) from {}",
        config.granter_address, config.addr_prefix, config.rpc_url
    );

    // A single connection: the indexer is the only writer
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.db_url)
        .await?;
    init_db(&pool).await?;

    let chain = RpcChainClient::new(&config.rpc_url, config.rpc_timeout)?;
    let decoder = CosmosTxDecoder::new(&config.addr_prefix)?;
    let indexer = Indexer::resume(&config, chain, decoder, PgStore::new(pool)).await?;

    // Run the indexer until the metrics server shuts down
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let indexer_task = tokio::spawn(indexer.run(shutdown_rx));

    info!("Serving metrics on {}", config.metrics_bind_addr);
    let server_result = HttpServer::new(|| App::new().route("/metrics", web::get().to(metrics::metrics)))
        .bind(&config.metrics_bind_addr)?
        .run()
        .await;

    // The server handles SIGINT/SIGTERM; let the current block finish before exiting
    info!("Shutting down indexer");
    let _ = shutdown_tx.send(true);
    if let Err(e) = indexer_task.await {
        error!("Indexer task failed: {}", e);
    }

    server_result?;
    Ok(())
}
