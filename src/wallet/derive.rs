//! Deterministic key derivation
//!
//! Accounts are BIP-39 seed phrases; the key pair for an account is derived
//! along the standard Ethereum path `m/44'/60'/0'/0/{index}` with an empty
//! passphrase. Derivation is pure: the same phrase and index always produce
//! the same signer, so nothing is ever cached — callers derive per request
//! and drop the signer when the request completes.

use alloy::signers::local::coins_bip39::{English, Mnemonic};
use alloy::signers::local::{MnemonicBuilder, PrivateKeySigner};
use rand::thread_rng;
use secrecy::{ExposeSecret, SecretString};

use crate::error::CryptoError;

/// Generated phrases encode 128 bits of entropy.
const MNEMONIC_WORD_COUNT: usize = 12;

/// Draw fresh entropy from the OS CSPRNG and encode it as a 12-word English
/// mnemonic sentence.
pub fn generate_seed_phrase() -> Result<SecretString, CryptoError> {
    let mnemonic = Mnemonic::<English>::new_with_count(&mut thread_rng(), MNEMONIC_WORD_COUNT)
        .map_err(|e| CryptoError::MnemonicGeneration(e.to_string()))?;
    Ok(SecretString::from(mnemonic.to_phrase()))
}

/// Derive the secp256k1 signer for `phrase` at address index `index`.
///
/// Validates the mnemonic checksum before deriving. The returned signer owns
/// the private key; its key material is zeroized when dropped.
pub fn derive_signer(phrase: &SecretString, index: u32) -> Result<PrivateKeySigner, CryptoError> {
    MnemonicBuilder::<English>::default()
        .phrase(phrase.expose_secret())
        .index(index)
        .map_err(|e| CryptoError::DerivationFailed(e.to_string()))?
        .build()
        .map_err(|e| CryptoError::InvalidMnemonic(e.to_string()))
}
