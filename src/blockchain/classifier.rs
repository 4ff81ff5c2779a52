use super::decoder::DecodedTx;

// Namespace marker shared by all IBC message type URLs
pub const IBC_MARKER: &str = "/ibc";
// Token transfers are user-initiated, not relayer infrastructure
pub const IBC_TRANSFER_MSG: &str = "/ibc.applications.transfer.v1.MsgTransfer";

// What a transaction means for the shared fee grant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxClass {
    Relayer,
    Misbehavior,
    Irrelevant,
}

// Labels transactions that spend a single granter's allowance
#[derive(Debug, Clone)]
pub struct TransactionClassifier {
    granter: String,
}

impl TransactionClassifier {
    // Initializes a classifier for the configured shared granter
    pub fn new(granter: impl Into<String>) -> Self {
        TransactionClassifier { granter: granter.into() }
    }

    // Classifies a decoded transaction against the granter
    pub fn classify(&self, tx: &DecodedTx) -> TxClass {
        classify(tx, &self.granter)
    }
}

// True if any message is IBC relay traffic (anything IBC except token transfers)
pub fn is_relay_candidate(message_types: &[String]) -> bool {
    message_types
        .iter()
        .any(|t| t.contains(IBC_MARKER) && t != IBC_TRANSFER_MSG)
}

// Transactions paying their own fees never involve the granter, whatever they contain
pub fn classify(tx: &DecodedTx, granter: &str) -> TxClass {
    if granter.is_empty() || tx.fee_granter != granter {
        return TxClass::Irrelevant;
    }
    if is_relay_candidate(&tx.message_types) {
        TxClass::Relayer
    } else {
        TxClass::Misbehavior
    }
}
