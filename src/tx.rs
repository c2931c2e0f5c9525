//! Signing request construction and validation
//!
//! Each signing operation accepts a typed parameter struct deserialized from
//! the host's field map, and `build()` turns it into a [`SigningRequest`] or
//! a validation error. Validation is fail-fast: no partially-built request
//! ever reaches the signer.

use alloy::consensus::{TxEip1559, TxLegacy};
use alloy::primitives::{hex, Address, Bytes, TxKind, U256};
use serde::Deserialize;

use crate::error::ValidationError;

/// Gas limit applied when the field is omitted (a plain value transfer).
pub const DEFAULT_GAS_LIMIT: u64 = 21_000;

/// A fully-validated signing request.
///
/// Closed sum type: the signer matches it exhaustively, so a new variant
/// cannot be added without deciding how it signs.
#[derive(Debug, Clone, PartialEq)]
pub enum SigningRequest {
    /// Pre-EIP-1559 transaction, replay-protected per EIP-155.
    Legacy(TxLegacy),
    /// EIP-1559 dynamic-fee transaction.
    DynamicFee(TxEip1559),
    /// Arbitrary bytes signed with EIP-191 personal-sign prefixing.
    Message(Vec<u8>),
}

impl SigningRequest {
    /// The destination address the chain policy gates on. Messages have none.
    pub fn destination(&self) -> Option<Address> {
        match self {
            SigningRequest::Legacy(tx) => tx.to.to().copied(),
            SigningRequest::DynamicFee(tx) => tx.to.to().copied(),
            SigningRequest::Message(_) => None,
        }
    }
}

/// Fields of a legacy transaction signing request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyTransactionParams {
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub gas_limit: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl LegacyTransactionParams {
    pub fn build(self) -> Result<SigningRequest, ValidationError> {
        let chain_id = self.chain_id.ok_or(ValidationError::MissingField("chain_id"))?;
        if chain_id == 0 {
            return Err(ValidationError::InvalidChainId);
        }
        let to = parse_to(self.to.as_deref())?;
        let nonce = self.nonce.ok_or(ValidationError::MissingField("nonce"))?;
        let value = parse_optional_wei("value", self.value.as_deref())?;
        // A present-but-empty gas price means zero; a missing field is an error.
        let gas_price = match self.gas_price.as_deref() {
            None => return Err(ValidationError::MissingField("gas_price")),
            Some(raw) if raw.trim().is_empty() => 0,
            Some(raw) => parse_fee("gas_price", raw)?,
        };
        let gas_limit = parse_gas_limit(self.gas_limit.as_deref())?;
        let input = parse_data(self.data.as_deref())?;

        Ok(SigningRequest::Legacy(TxLegacy {
            chain_id: Some(chain_id),
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(to),
            value,
            input,
        }))
    }
}

/// Fields of a dynamic-fee (EIP-1559) transaction signing request.
///
/// `chain_id` is required here and is carried into the signed transaction
/// itself; it is intentionally not reconciled with the chain mount's
/// configured id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DynamicFeeTransactionParams {
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub nonce: Option<u64>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<String>,
    #[serde(default)]
    pub max_fee_per_gas: Option<String>,
    #[serde(default)]
    pub gas_limit: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

impl DynamicFeeTransactionParams {
    pub fn build(self) -> Result<SigningRequest, ValidationError> {
        let chain_id = self.chain_id.ok_or(ValidationError::MissingField("chain_id"))?;
        if chain_id == 0 {
            return Err(ValidationError::InvalidChainId);
        }
        let to = parse_to(self.to.as_deref())?;
        let nonce = self.nonce.ok_or(ValidationError::MissingField("nonce"))?;
        let value = parse_optional_wei("value", self.value.as_deref())?;
        let max_priority_fee_per_gas = parse_required_fee(
            "max_priority_fee_per_gas",
            self.max_priority_fee_per_gas.as_deref(),
        )?;
        let max_fee_per_gas = parse_required_fee("max_fee_per_gas", self.max_fee_per_gas.as_deref())?;
        let gas_limit = parse_gas_limit(self.gas_limit.as_deref())?;
        let input = parse_data(self.data.as_deref())?;

        Ok(SigningRequest::DynamicFee(TxEip1559 {
            chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            to: TxKind::Call(to),
            value,
            input,
            ..TxEip1559::default()
        }))
    }
}

/// Fields of a message signing request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageParams {
    #[serde(default)]
    pub message: Option<String>,
}

impl MessageParams {
    pub fn build(self) -> Result<SigningRequest, ValidationError> {
        let message = self.message.ok_or(ValidationError::MissingField("message"))?;
        Ok(SigningRequest::Message(message.into_bytes()))
    }
}

fn parse_to(raw: Option<&str>) -> Result<Address, ValidationError> {
    let raw = raw.ok_or(ValidationError::MissingField("to"))?;
    raw.parse::<Address>()
        .map_err(|_| ValidationError::InvalidAddress("to"))
}

/// Parse a decimal-string wei amount. Sign characters are rejected along with
/// everything else that is not an ASCII digit.
fn parse_wei(field: &'static str, raw: &str) -> Result<U256, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidNumber(field));
    }
    U256::from_str_radix(raw, 10).map_err(|_| ValidationError::InvalidNumber(field))
}

fn parse_optional_wei(field: &'static str, raw: Option<&str>) -> Result<U256, ValidationError> {
    match raw {
        None => Ok(U256::ZERO),
        Some(raw) => parse_wei(field, raw),
    }
}

fn parse_fee(field: &'static str, raw: &str) -> Result<u128, ValidationError> {
    parse_wei(field, raw)?
        .try_into()
        .map_err(|_| ValidationError::InvalidNumber(field))
}

/// Required fee field where a present-but-empty string means zero.
fn parse_required_fee(field: &'static str, raw: Option<&str>) -> Result<u128, ValidationError> {
    match raw {
        None => Err(ValidationError::MissingField(field)),
        Some(raw) if raw.trim().is_empty() => Ok(0),
        Some(raw) => parse_fee(field, raw),
    }
}

fn parse_gas_limit(raw: Option<&str>) -> Result<u64, ValidationError> {
    match raw {
        None => Ok(DEFAULT_GAS_LIMIT),
        Some(raw) => {
            let raw = raw.trim();
            if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ValidationError::InvalidNumber("gas_limit"));
            }
            raw.parse::<u64>()
                .map_err(|_| ValidationError::InvalidNumber("gas_limit"))
        }
    }
}

/// Optional 0x-hex calldata; absent or empty becomes an empty byte sequence.
fn parse_data(raw: Option<&str>) -> Result<Bytes, ValidationError> {
    let Some(raw) = raw else {
        return Ok(Bytes::new());
    };
    let trimmed = raw.strip_prefix("0x").unwrap_or(raw);
    if trimmed.is_empty() {
        return Ok(Bytes::new());
    }
    hex::decode(trimmed)
        .map(Bytes::from)
        .map_err(|_| ValidationError::InvalidHex("data"))
}
