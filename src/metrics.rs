use actix_web::HttpResponse;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_int_counter, register_int_gauge, Counter,
    CounterVec, Histogram, IntCounter, IntGauge,
};

// Defines Prometheus metrics for monitoring the fee grant
lazy_static::lazy_static! {
    // Misbehaving transactions paid by the granter, per grantee and message list
    pub static ref GRANTEE_MISBEHAVIOUR_TXS: CounterVec = register_counter_vec!(
        "feegrant_grantee_misbehaviour_txs_total",
        "Transactions that spent the fee grant on non-relay messages",
        &["grantee", "messages"]
    ).unwrap();

    pub static ref RELAYER_TXS: IntCounter = register_int_counter!(
        "feegrant_relayer_txs_total",
        "Relayer transactions paid by the fee granter"
    ).unwrap();

    pub static ref RELAYER_FEE: Counter = register_counter!(
        "feegrant_relayer_fee_total",
        "Fees paid by the granter for relayer transactions, in the fee's base denomination"
    ).unwrap();

    pub static ref LAST_PROCESSED_HEIGHT: IntGauge = register_int_gauge!(
        "feegrant_last_processed_height",
        "Height of the last block committed to the database"
    ).unwrap();

    // Histogram for measuring block processing time in seconds
    pub static ref BLOCK_PROCESS_TIME: Histogram = register_histogram!(
        "feegrant_block_process_seconds",
        "Block processing time in seconds"
    ).unwrap();

    pub static ref TX_DECODE_FAILURES: IntCounter = register_int_counter!(
        "feegrant_tx_decode_failures_total",
        "Transactions skipped because they could not be decoded"
    ).unwrap();
}

// Handles GET /metrics requests to expose Prometheus metrics
pub async fn metrics() -> HttpResponse {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    // Return an empty body rather than failing the scrape
    let encoded = encoder.encode_to_string(&metric_families).unwrap_or_default();
    HttpResponse::Ok()
        .content_type(prometheus::TEXT_FORMAT)
        .body(encoded)
}
