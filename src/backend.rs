//! Backend operations
//!
//! [`Backend`] is the full operation surface the host routes requests into:
//! account and chain CRUD plus the three signing operations. Every operation
//! loads its records fresh from storage, so the stored record is always the
//! source of truth.
//!
//! Mutating operations serialize per record name through an async lock map;
//! reads and signing take no lock and rely on the storage backend's atomic
//! put guarantee.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use alloy::primitives::hex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::accounts::{account_path, AccountRecord, CreateAccountParams, ACCOUNTS_PREFIX};
use crate::chains::{chain_path, ChainParams, ChainRecord, CHAINS_PREFIX};
use crate::error::{CryptoError, Error, RecordKind, Result, StorageError, ValidationError};
use crate::policy;
use crate::storage::Storage;
use crate::tx::{DynamicFeeTransactionParams, LegacyTransactionParams, MessageParams};
use crate::wallet::{self, AccountSigner, SignedOutcome, TransactionDetail};

/// The signing backend over a host-supplied storage implementation.
pub struct Backend<S> {
    storage: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: Storage> Backend<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            locks: Mutex::new(HashMap::new()),
        }
    }

    // ── accounts ────────────────────────────────────────────────────────

    /// List the names of all stored accounts.
    pub async fn accounts_list(&self) -> Result<Vec<String>> {
        Ok(self.storage.list(ACCOUNTS_PREFIX).await?)
    }

    /// Create (or replace) the account `name`. A missing or empty mnemonic
    /// means a fresh one is generated; the index defaults to 0. The record is
    /// only persisted once the phrase has derived successfully.
    pub async fn account_create(
        &self,
        name: &str,
        params: CreateAccountParams,
    ) -> Result<AddressResponse> {
        validate_name(name)?;
        let index = params.index.unwrap_or(0);
        let mnemonic = match params.supplied_mnemonic() {
            Some(phrase) => phrase,
            None => wallet::generate_seed_phrase()?,
        };

        let record = AccountRecord { index, mnemonic };
        let address = wallet::derive_signer(&record.mnemonic, record.index)?
            .address()
            .to_checksum(None);

        let path = account_path(name);
        let lock = self.lock_for(&path).await;
        let _guard = lock.lock().await;
        self.storage.put(&path, encode_record(&path, &record)?).await?;

        info!(account = %name, address = %address, "account created");
        Ok(AddressResponse { address })
    }

    /// Read the account `name`, re-deriving its address.
    pub async fn account_read(&self, name: &str) -> Result<AddressResponse> {
        let record = self.load_account(name).await?;
        let address = wallet::derive_signer(&record.mnemonic, record.index)?
            .address()
            .to_checksum(None);
        Ok(AddressResponse { address })
    }

    /// Delete the account `name`. Deleting an absent account succeeds.
    pub async fn account_delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let path = account_path(name);
        let lock = self.lock_for(&path).await;
        let _guard = lock.lock().await;
        self.storage.delete(&path).await?;

        info!(account = %name, "account deleted");
        Ok(())
    }

    // ── chains ──────────────────────────────────────────────────────────

    /// List the names of all configured chains.
    pub async fn chains_list(&self) -> Result<Vec<String>> {
        Ok(self.storage.list(CHAINS_PREFIX).await?)
    }

    /// Create (or replace) the chain `name`, applying defaults for absent
    /// fields. Lists are validated before anything is persisted.
    pub async fn chain_create(&self, name: &str, params: ChainParams) -> Result<ChainResponse> {
        validate_name(name)?;
        let record = params.into_record();
        record.validate()?;

        let path = chain_path(name);
        let lock = self.lock_for(&path).await;
        let _guard = lock.lock().await;
        self.storage.put(&path, encode_record(&path, &record)?).await?;

        info!(chain = %name, chain_id = %record.chain_id, "chain configured");
        Ok(ChainResponse::from(record))
    }

    /// Update the chain `name` with a read-modify-write: absent fields keep
    /// their stored values. Fails with `NotFound` if the chain does not
    /// exist.
    pub async fn chain_update(&self, name: &str, params: ChainParams) -> Result<ChainResponse> {
        validate_name(name)?;
        let path = chain_path(name);
        let lock = self.lock_for(&path).await;
        let _guard = lock.lock().await;

        let existing = self.load_chain(name).await?;
        let record = params.apply(existing);
        record.validate()?;
        self.storage.put(&path, encode_record(&path, &record)?).await?;

        info!(chain = %name, chain_id = %record.chain_id, "chain updated");
        Ok(ChainResponse::from(record))
    }

    /// Read the chain `name`.
    pub async fn chain_read(&self, name: &str) -> Result<ChainResponse> {
        Ok(ChainResponse::from(self.load_chain(name).await?))
    }

    /// Delete the chain `name`. Deleting an absent chain succeeds.
    pub async fn chain_delete(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let path = chain_path(name);
        let lock = self.lock_for(&path).await;
        let _guard = lock.lock().await;
        self.storage.delete(&path).await?;

        info!(chain = %name, "chain deleted");
        Ok(())
    }

    // ── signing ─────────────────────────────────────────────────────────

    /// Sign a legacy (EIP-155) transaction with the account `account`,
    /// gated by the policy of the chain mount `chain`. `origin` is the
    /// caller's network address as reported by the host.
    pub async fn sign_transaction(
        &self,
        chain: &str,
        account: &str,
        params: LegacyTransactionParams,
        origin: Option<IpAddr>,
    ) -> Result<SignTransactionResponse> {
        let request = params.build()?;
        self.sign_gated(chain, account, request, origin).await
    }

    /// Sign a dynamic-fee (EIP-1559) transaction; same gating as
    /// [`Backend::sign_transaction`].
    pub async fn sign_dynamic_fee_transaction(
        &self,
        chain: &str,
        account: &str,
        params: DynamicFeeTransactionParams,
        origin: Option<IpAddr>,
    ) -> Result<SignTransactionResponse> {
        let request = params.build()?;
        self.sign_gated(chain, account, request, origin).await
    }

    /// Sign an EIP-191 message with the account `account`. Messages carry no
    /// destination, so no chain policy applies.
    pub async fn sign_message(
        &self,
        account: &str,
        params: MessageParams,
    ) -> Result<SignMessageResponse> {
        let request = params.build()?;
        let record = self.load_account(account).await?;
        let signer = AccountSigner::new(wallet::derive_signer(&record.mnemonic, record.index)?);

        match signer.sign(request)? {
            SignedOutcome::Message(signed) => {
                info!(account = %account, address = %signed.address, "message signed");
                Ok(SignMessageResponse {
                    signature: hex::encode_prefixed(signed.signature.as_bytes()),
                    address: signed.address.to_checksum(None),
                    hashed_message: format!("{}", signed.hash),
                })
            }
            SignedOutcome::Transaction(_) => Err(unexpected_outcome()),
        }
    }

    async fn sign_gated(
        &self,
        chain: &str,
        account: &str,
        request: crate::tx::SigningRequest,
        origin: Option<IpAddr>,
    ) -> Result<SignTransactionResponse> {
        let record = self.load_account(account).await?;
        let chain_record = self.load_chain(chain).await?;

        if let Some(destination) = request.destination() {
            policy::enforce(&chain_record, destination, origin)?;
        }

        let signer = AccountSigner::new(wallet::derive_signer(&record.mnemonic, record.index)?);
        match signer.sign(request)? {
            SignedOutcome::Transaction(signed) => {
                info!(
                    account = %account,
                    chain = %chain,
                    to = %signed.detail.to,
                    nonce = signed.detail.nonce,
                    "transaction signed"
                );
                Ok(SignTransactionResponse {
                    chain_id: signed.chain_id,
                    rlp_signature: hex::encode_prefixed(&signed.encoded),
                    signed_transaction: signed.detail,
                })
            }
            SignedOutcome::Message(_) => Err(unexpected_outcome()),
        }
    }

    // ── internals ───────────────────────────────────────────────────────

    async fn load_account(&self, name: &str) -> Result<AccountRecord> {
        validate_name(name)?;
        let path = account_path(name);
        let bytes = self.storage.get(&path).await?.ok_or_else(|| Error::NotFound {
            kind: RecordKind::Account,
            name: name.to_string(),
        })?;
        decode_record(&path, &bytes)
    }

    async fn load_chain(&self, name: &str) -> Result<ChainRecord> {
        validate_name(name)?;
        let path = chain_path(name);
        let bytes = self.storage.get(&path).await?.ok_or_else(|| Error::NotFound {
            kind: RecordKind::Chain,
            name: name.to_string(),
        })?;
        decode_record(&path, &bytes)
    }

    /// The mutual-exclusion guard for one storage key. Guards are created on
    /// first use and kept for the backend's lifetime; the map only grows with
    /// the set of record names.
    async fn lock_for(&self, path: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(path.to_string()).or_default().clone()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(ValidationError::InvalidName(name.to_string()).into());
    }
    Ok(())
}

fn encode_record<T: Serialize>(path: &str, record: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| {
        StorageError::CorruptRecord {
            path: path.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn decode_record<T: DeserializeOwned>(path: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        StorageError::CorruptRecord {
            path: path.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn unexpected_outcome() -> Error {
    CryptoError::SigningFailed("signer produced a mismatched result kind".to_string()).into()
}

/// Response for account create/read: the derived EIP-55 address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressResponse {
    pub address: String,
}

/// Response for chain create/read/update: the full record with its response
/// field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainResponse {
    pub bound_cidr_list: Vec<String>,
    pub inclusions: Vec<String>,
    pub exclusions: Vec<String>,
    pub rpc_url: String,
    pub chain_id: String,
}

impl From<ChainRecord> for ChainResponse {
    fn from(record: ChainRecord) -> Self {
        Self {
            bound_cidr_list: record.bound_cidr_list,
            inclusions: record.inclusions,
            exclusions: record.exclusions,
            rpc_url: record.rpc_url,
            chain_id: record.chain_id,
        }
    }
}

/// Response for the two transaction-signing operations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTransactionResponse {
    pub chain_id: u64,
    pub signed_transaction: TransactionDetail,
    /// 0x-hex of the canonical encoded signed transaction.
    pub rlp_signature: String,
}

/// Response for message signing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageResponse {
    /// 0x-hex of the 65-byte `(r, s, v)` signature.
    pub signature: String,
    /// Address recovered from the signature.
    pub address: String,
    /// 0x-hex of the EIP-191 hash that was signed.
    pub hashed_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyViolation;
    use crate::storage::MemoryStorage;
    use alloy::primitives::keccak256;
    use secrecy::SecretString;

    const PHRASE: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const VECTOR_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";
    const TO: &str = "0x00000000219ab540356cbb839cbe05303d7705fa";

    fn backend() -> Backend<MemoryStorage> {
        Backend::new(MemoryStorage::new())
    }

    fn known_account() -> CreateAccountParams {
        CreateAccountParams {
            mnemonic: Some(SecretString::from(PHRASE.to_string())),
            index: Some(0),
        }
    }

    fn legacy_params() -> LegacyTransactionParams {
        LegacyTransactionParams {
            chain_id: Some(1),
            to: Some(TO.to_string()),
            nonce: Some(1),
            value: Some("1000".to_string()),
            gas_price: Some("0".to_string()),
            gas_limit: Some("21000".to_string()),
            data: None,
        }
    }

    async fn backend_with_account_and_chain() -> Backend<MemoryStorage> {
        let backend = backend();
        backend.account_create("treasury", known_account()).await.unwrap();
        backend
            .chain_create(
                "mainnet",
                ChainParams {
                    chain_id: Some("1".to_string()),
                    ..ChainParams::default()
                },
            )
            .await
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn created_account_returns_a_stable_address() {
        let backend = backend();

        let created = backend.account_create("treasury", known_account()).await.unwrap();
        assert_eq!(created.address, VECTOR_ADDRESS);

        let read = backend.account_read("treasury").await.unwrap();
        assert_eq!(read.address, VECTOR_ADDRESS);
    }

    #[tokio::test]
    async fn account_without_mnemonic_gets_a_generated_one() {
        let backend = backend();

        let created = backend
            .account_create("fresh", CreateAccountParams::default())
            .await
            .unwrap();
        assert_eq!(created.address.len(), 42);
        assert!(created.address.starts_with("0x"));

        // Re-reading derives from the stored phrase and must agree.
        let read = backend.account_read("fresh").await.unwrap();
        assert_eq!(read.address, created.address);
    }

    #[tokio::test]
    async fn listing_returns_account_names() {
        let backend = backend();
        backend.account_create("bravo", known_account()).await.unwrap();
        backend
            .account_create("alpha", CreateAccountParams::default())
            .await
            .unwrap();

        assert_eq!(backend.accounts_list().await.unwrap(), vec!["alpha", "bravo"]);
    }

    #[tokio::test]
    async fn missing_records_surface_not_found() {
        let backend = backend();

        assert!(matches!(
            backend.account_read("ghost").await,
            Err(Error::NotFound { kind: RecordKind::Account, .. })
        ));
        assert!(matches!(
            backend.chain_read("ghost").await,
            Err(Error::NotFound { kind: RecordKind::Chain, .. })
        ));

        // Deletes stay idempotent.
        backend.account_delete("ghost").await.unwrap();
        backend.chain_delete("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn invalid_names_are_rejected() {
        let backend = backend();

        assert!(matches!(
            backend.account_create("", CreateAccountParams::default()).await,
            Err(Error::Validation(ValidationError::InvalidName(_)))
        ));
        assert!(matches!(
            backend.account_read("a/b").await,
            Err(Error::Validation(ValidationError::InvalidName(_)))
        ));
    }

    #[tokio::test]
    async fn chain_crud_round_trips() {
        let backend = backend();

        let created = backend.chain_create("mainnet", ChainParams::default()).await.unwrap();
        assert_eq!(created.chain_id, "8545");

        let updated = backend
            .chain_update(
                "mainnet",
                ChainParams {
                    chain_id: Some("1".to_string()),
                    rpc_url: Some("http://localhost:8545".to_string()),
                    ..ChainParams::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.chain_id, "1");

        let read = backend.chain_read("mainnet").await.unwrap();
        assert_eq!(read, updated);

        backend.chain_delete("mainnet").await.unwrap();
        assert!(backend.chain_read("mainnet").await.is_err());

        // Updating a deleted chain is NotFound, not an implicit create.
        assert!(matches!(
            backend.chain_update("mainnet", ChainParams::default()).await,
            Err(Error::NotFound { kind: RecordKind::Chain, .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_updates_are_serialized() {
        let backend = Arc::new(backend());
        backend.chain_create("mainnet", ChainParams::default()).await.unwrap();

        let include = {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move {
                backend
                    .chain_update(
                        "mainnet",
                        ChainParams {
                            inclusions: Some(vec![TO.to_string()]),
                            ..ChainParams::default()
                        },
                    )
                    .await
            })
        };
        let exclude = {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move {
                backend
                    .chain_update(
                        "mainnet",
                        ChainParams {
                            exclusions: Some(vec![TO.to_string()]),
                            ..ChainParams::default()
                        },
                    )
                    .await
            })
        };

        include.await.unwrap().unwrap();
        exclude.await.unwrap().unwrap();

        // Both read-modify-writes must survive; a lost update would drop one.
        let read = backend.chain_read("mainnet").await.unwrap();
        assert_eq!(read.inclusions, vec![TO.to_string()]);
        assert_eq!(read.exclusions, vec![TO.to_string()]);
    }

    #[tokio::test]
    async fn legacy_signing_returns_an_encoded_transaction() {
        let backend = backend_with_account_and_chain().await;

        let response = backend
            .sign_transaction("mainnet", "treasury", legacy_params(), None)
            .await
            .unwrap();

        assert_eq!(response.chain_id, 1);
        assert!(response.rlp_signature.starts_with("0x"));
        assert!(response.rlp_signature.len() > 2);
        assert_eq!(response.signed_transaction.nonce, 1);
        assert_eq!(response.signed_transaction.gas_limit, 21_000);
    }

    #[tokio::test]
    async fn dynamic_fee_signing_threads_the_request_chain_id() {
        let backend = backend_with_account_and_chain().await;

        let response = backend
            .sign_dynamic_fee_transaction(
                "mainnet",
                "treasury",
                DynamicFeeTransactionParams {
                    chain_id: Some(1),
                    to: Some(TO.to_string()),
                    nonce: Some(0),
                    value: Some("1000".to_string()),
                    max_priority_fee_per_gas: Some("2000000000".to_string()),
                    max_fee_per_gas: Some("30000000000".to_string()),
                    gas_limit: None,
                    data: None,
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(response.chain_id, 1);
        assert_eq!(response.signed_transaction.chain_id, 1);
        assert!(response.rlp_signature.starts_with("0x02"));
    }

    #[tokio::test]
    async fn excluded_destination_is_rejected_before_signing() {
        let backend = backend_with_account_and_chain().await;
        backend
            .chain_update(
                "mainnet",
                ChainParams {
                    inclusions: Some(vec![TO.to_string()]),
                    exclusions: Some(vec![TO.to_string()]),
                    ..ChainParams::default()
                },
            )
            .await
            .unwrap();

        let result = backend
            .sign_transaction("mainnet", "treasury", legacy_params(), None)
            .await;
        assert!(matches!(
            result,
            Err(Error::Policy(PolicyViolation::Excluded(_)))
        ));
    }

    #[tokio::test]
    async fn cidr_restrictions_gate_the_caller_origin() {
        let backend = backend_with_account_and_chain().await;
        backend
            .chain_update(
                "mainnet",
                ChainParams {
                    bound_cidr_list: Some(vec!["10.0.0.0/8".to_string()]),
                    ..ChainParams::default()
                },
            )
            .await
            .unwrap();

        let permitted: IpAddr = "10.1.2.3".parse().unwrap();
        backend
            .sign_transaction("mainnet", "treasury", legacy_params(), Some(permitted))
            .await
            .unwrap();

        let outside: IpAddr = "192.168.1.1".parse().unwrap();
        assert!(matches!(
            backend
                .sign_transaction("mainnet", "treasury", legacy_params(), Some(outside))
                .await,
            Err(Error::Policy(PolicyViolation::OriginNotPermitted(_)))
        ));

        assert!(matches!(
            backend
                .sign_transaction("mainnet", "treasury", legacy_params(), None)
                .await,
            Err(Error::Policy(PolicyViolation::OriginUnknown))
        ));
    }

    #[tokio::test]
    async fn signing_requires_the_chain_to_exist() {
        let backend = backend();
        backend.account_create("treasury", known_account()).await.unwrap();

        assert!(matches!(
            backend
                .sign_transaction("ghost", "treasury", legacy_params(), None)
                .await,
            Err(Error::NotFound { kind: RecordKind::Chain, .. })
        ));
    }

    #[tokio::test]
    async fn message_signing_matches_eip191() {
        let backend = backend_with_account_and_chain().await;

        let response = backend
            .sign_message(
                "treasury",
                MessageParams {
                    message: Some("hello".to_string()),
                },
            )
            .await
            .unwrap();

        let expected = keccak256(b"\x19Ethereum Signed Message:\n5hello");
        assert_eq!(response.hashed_message, format!("{expected}"));
        assert_eq!(response.address, VECTOR_ADDRESS);
        // 65 signature bytes -> 0x + 130 hex chars.
        assert_eq!(response.signature.len(), 132);
    }

    #[tokio::test]
    async fn validation_failures_abort_before_any_lookup_matters() {
        let backend = backend_with_account_and_chain().await;

        let result = backend
            .sign_transaction(
                "mainnet",
                "treasury",
                LegacyTransactionParams {
                    nonce: None,
                    ..legacy_params()
                },
                None,
            )
            .await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::MissingField("nonce")))
        ));
    }
}
