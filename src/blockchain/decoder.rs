use base64::{engine::general_purpose::STANDARD, Engine};
use bech32::{Bech32, Hrp};
use prost::Message;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use crate::error::{DecodeError, DerivationError};
use super::proto;

// Type URL of the only signer key algorithm the chain derives addresses for here
pub const SECP256K1_PUBKEY_TYPE: &str = "/cosmos.crypto.secp256k1.PubKey";

// Primary signer key as carried in the envelope: algorithm tag plus encoded key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerKey {
    pub type_url: String,
    pub value: Vec<u8>,
}

// The fields of a transaction the indexer cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTx {
    pub message_types: Vec<String>,
    pub fee_granter: String,
    pub gas_limit: u64,
    pub fee_amount: u64,
    pub signer: Option<SignerKey>,
}

// Decodes transaction envelopes and derives signer addresses for one chain's wire format
pub trait TxDecoder: Send + Sync {
    fn decode(&self, raw: &str) -> Result<DecodedTx, DecodeError>;
    fn derive_address(&self, signer: Option<&SignerKey>) -> Result<String, DerivationError>;
}

// Decoder for Cosmos SDK protobuf transactions
#[derive(Debug, Clone)]
pub struct CosmosTxDecoder {
    prefix: Hrp,
}

impl CosmosTxDecoder {
    // Creates a decoder that encodes addresses with the given bech32 prefix
    pub fn new(addr_prefix: &str) -> Result<Self, DerivationError> {
        let prefix = Hrp::parse(addr_prefix)
            .map_err(|_| DerivationError::InvalidPrefix(addr_prefix.to_string()))?;
        Ok(CosmosTxDecoder { prefix })
    }

    // Decodes raw protobuf bytes (already base64-decoded)
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<DecodedTx, DecodeError> {
        let tx = proto::Tx::decode(bytes)?;
        let auth_info = tx.auth_info.ok_or(DecodeError::MissingAuthInfo)?;
        let fee = auth_info.fee.ok_or(DecodeError::MissingFee)?;

        // Only the first denomination counts, like the fee grant allowance itself
        let fee_amount = match fee.amount.first() {
            Some(coin) => parse_fee_amount(&coin.amount)?,
            None => 0,
        };

        let message_types = tx
            .body
            .map(|body| body.messages.into_iter().map(|msg| msg.type_url).collect())
            .unwrap_or_default();

        let signer = auth_info
            .signer_infos
            .into_iter()
            .next()
            .and_then(|info| info.public_key)
            .map(|key| SignerKey { type_url: key.type_url, value: key.value });

        Ok(DecodedTx {
            message_types,
            fee_granter: fee.granter,
            gas_limit: fee.gas_limit,
            fee_amount,
            signer,
        })
    }
}

impl TxDecoder for CosmosTxDecoder {
    fn decode(&self, raw: &str) -> Result<DecodedTx, DecodeError> {
        let bytes = STANDARD.decode(raw.trim())?;
        self.decode_bytes(&bytes)
    }

    fn derive_address(&self, signer: Option<&SignerKey>) -> Result<String, DerivationError> {
        let signer = signer.ok_or(DerivationError::MissingSigner)?;
        if signer.type_url != SECP256K1_PUBKEY_TYPE {
            return Err(DerivationError::UnsupportedKeyType(signer.type_url.clone()));
        }
        let pubkey = proto::Secp256k1PubKey::decode(signer.value.as_slice())?;
        address_from_pubkey(self.prefix, &pubkey.key)
    }
}

// Coin amounts are arbitrary-precision decimals; 18-decimal denoms overflow u64 and saturate
pub fn parse_fee_amount(amount: &str) -> Result<u64, DecodeError> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::InvalidFeeAmount(amount.to_string()));
    }
    Ok(amount.parse::<u64>().unwrap_or(u64::MAX))
}

// bech32(prefix, RIPEMD160(SHA256(compressed_key))), the Cosmos SDK account address scheme
pub fn address_from_pubkey(prefix: Hrp, key: &[u8]) -> Result<String, DerivationError> {
    // Compressed SEC1 keys are 33 bytes with an even/odd y-coordinate tag
    if key.len() != 33 || !matches!(key[0], 0x02 | 0x03) {
        return Err(DerivationError::InvalidKey(hex::encode(key)));
    }
    let sha = Sha256::digest(key);
    let hash = Ripemd160::digest(sha);
    bech32::encode::<Bech32>(prefix, hash.as_slice()).map_err(|e| DerivationError::Encoding(e.to_string()))
}
