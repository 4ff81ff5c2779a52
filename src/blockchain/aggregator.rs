use chrono::{DateTime, Utc};
use crate::models::AggregateSnapshot;

// Running gas/fee totals over the relayer transactions since the last flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregator {
    total_gas_wanted: u64,
    total_gas_used: u64,
    total_fee: u64,
    transaction_count: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    // Adds one relayer transaction to the totals
    pub fn record(&mut self, gas_wanted: u64, gas_used: u64, fee_amount: u64) {
        self.total_gas_wanted = self.total_gas_wanted.saturating_add(gas_wanted);
        self.total_gas_used = self.total_gas_used.saturating_add(gas_used);
        self.total_fee = self.total_fee.saturating_add(fee_amount);
        self.transaction_count += 1;
    }

    // Takes a snapshot and zeroes the counters, or does nothing if no transaction was recorded
    pub fn flush_if_non_empty(&mut self, height: u64, time: DateTime<Utc>) -> Option<AggregateSnapshot> {
        if self.is_empty() {
            return None;
        }
        let snapshot = AggregateSnapshot {
            height,
            time,
            total_gas_wanted: self.total_gas_wanted,
            total_gas_used: self.total_gas_used,
            total_fee: self.total_fee,
            transaction_count: self.transaction_count,
        };
        *self = Self::default();
        Some(snapshot)
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_count == 0
    }

    pub fn total_gas_wanted(&self) -> u64 {
        self.total_gas_wanted
    }

    pub fn total_gas_used(&self) -> u64 {
        self.total_gas_used
    }

    pub fn total_fee(&self) -> u64 {
        self.total_fee
    }

    pub fn transaction_count(&self) -> u64 {
        self.transaction_count
    }
}

// Fee paid per unit of gas requested; undefined when no gas was requested
pub fn gas_price(fee_amount: u64, gas_wanted: u64) -> Option<f64> {
    if gas_wanted == 0 {
        None
    } else {
        Some(fee_amount as f64 / gas_wanted as f64)
    }
}
