//! Request signing
//!
//! SECURITY: this is the ONLY place a private key is used.
//! - The key lives inside [`AccountSigner`] for the duration of one request.
//! - It is never serialized, logged, or returned to the caller.
//! - Signing returns signatures and encodings, never key material.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{
    eip191_hash_message, keccak256, Address, Bytes, Signature, B256, U256,
};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use serde::Serialize;

use crate::error::CryptoError;
use crate::tx::SigningRequest;

/// Signs one request with a freshly derived key pair.
pub struct AccountSigner {
    signer: PrivateKeySigner,
}

impl AccountSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// The address of the derived key pair (safe to expose).
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign a validated request.
    pub fn sign(&self, request: SigningRequest) -> Result<SignedOutcome, CryptoError> {
        match request {
            SigningRequest::Legacy(tx) => self.sign_legacy(tx).map(SignedOutcome::Transaction),
            SigningRequest::DynamicFee(tx) => {
                self.sign_dynamic_fee(tx).map(SignedOutcome::Transaction)
            }
            SigningRequest::Message(message) => {
                self.sign_message(&message).map(SignedOutcome::Message)
            }
        }
    }

    /// Sign a legacy transaction. The signing hash covers the EIP-155 fields
    /// `(chain_id, 0, 0)`, and the recovery value is encoded as
    /// `recovery_id + chain_id * 2 + 35`.
    fn sign_legacy(&self, tx: TxLegacy) -> Result<SignedTransaction, CryptoError> {
        let chain_id = tx.chain_id.unwrap_or_default();
        let signature = self.sign_hash(&tx.signature_hash())?;
        let v = u128::from(chain_id) * 2 + 35 + signature.v() as u128;

        let detail = TransactionDetail {
            nonce: tx.nonce,
            to: tx.to.to().copied().unwrap_or_default(),
            value: tx.value,
            gas_limit: tx.gas_limit,
            gas_price: Some(tx.gas_price),
            max_priority_fee_per_gas: None,
            max_fee_per_gas: None,
            input: tx.input.clone(),
            chain_id,
            v,
            r: signature.r(),
            s: signature.s(),
            hash: B256::ZERO,
        };

        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(SignedTransaction::assemble(chain_id, envelope, detail))
    }

    /// Sign a dynamic-fee transaction. The hash covers the EIP-1559 typed
    /// envelope preimage and the recovery value is the raw parity bit.
    fn sign_dynamic_fee(&self, tx: TxEip1559) -> Result<SignedTransaction, CryptoError> {
        let chain_id = tx.chain_id;
        let signature = self.sign_hash(&tx.signature_hash())?;
        let v = signature.v() as u128;

        let detail = TransactionDetail {
            nonce: tx.nonce,
            to: tx.to.to().copied().unwrap_or_default(),
            value: tx.value,
            gas_limit: tx.gas_limit,
            gas_price: None,
            max_priority_fee_per_gas: Some(tx.max_priority_fee_per_gas),
            max_fee_per_gas: Some(tx.max_fee_per_gas),
            input: tx.input.clone(),
            chain_id,
            v,
            r: signature.r(),
            s: signature.s(),
            hash: B256::ZERO,
        };

        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(SignedTransaction::assemble(chain_id, envelope, detail))
    }

    /// EIP-191 personal-sign: hash `"\x19Ethereum Signed Message:\n" + len +
    /// message`, sign it, and return the signature together with the address
    /// recovered from it so clients can verify without another round trip.
    fn sign_message(&self, message: &[u8]) -> Result<SignedMessage, CryptoError> {
        let hash = eip191_hash_message(message);
        let signature = self.sign_hash(&hash)?;
        let recovered = signature
            .recover_address_from_prehash(&hash)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        if recovered != self.address() {
            return Err(CryptoError::SigningFailed(
                "recovered address does not match the signing key".to_string(),
            ));
        }

        Ok(SignedMessage {
            signature,
            address: recovered,
            hash,
        })
    }

    fn sign_hash(&self, hash: &B256) -> Result<Signature, CryptoError> {
        self.signer
            .sign_hash_sync(hash)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))
    }
}

// Debug must not leak the key.
impl std::fmt::Debug for AccountSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSigner")
            .field("address", &self.address())
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

/// Result of signing a request.
#[derive(Debug)]
pub enum SignedOutcome {
    Transaction(SignedTransaction),
    Message(SignedMessage),
}

/// A signed transaction: its canonical encoding plus the structured fields.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub chain_id: u64,
    /// Canonical encoded form: plain RLP for legacy transactions, the
    /// EIP-2718 typed envelope for dynamic-fee transactions.
    pub encoded: Vec<u8>,
    pub detail: TransactionDetail,
}

impl SignedTransaction {
    fn assemble(chain_id: u64, envelope: TxEnvelope, mut detail: TransactionDetail) -> Self {
        let encoded = envelope.encoded_2718();
        detail.hash = keccak256(&encoded);
        Self {
            chain_id,
            encoded,
            detail,
        }
    }
}

/// Structured view of a signed transaction, returned to the caller alongside
/// the encoded form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    pub hash: B256,
    pub chain_id: u64,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub gas_limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<u128>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<u128>,
    pub input: Bytes,
    pub v: u128,
    pub r: U256,
    pub s: U256,
}

/// A signed message: the 65-byte signature, the address recovered from it,
/// and the EIP-191 hash that was signed.
#[derive(Debug, Clone)]
pub struct SignedMessage {
    pub signature: Signature,
    pub address: Address,
    pub hash: B256,
}
