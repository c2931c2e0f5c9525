//! Account records
//!
//! An account is a name bound to a BIP-39 seed phrase and a BIP-44 address
//! index. The address is never stored: it is re-derived from the phrase and
//! index on every read, which keeps the record the single source of truth.
//!
//! SECURITY: the seed phrase is held as a [`SecretString`] — redacted `Debug`,
//! zeroized on drop. It is exposed exactly twice: when the record is encoded
//! for storage, and when a key pair is derived from it.

use secrecy::{ExposeSecret, SecretString};
use serde::de::Deserializer;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Storage namespace for account records.
pub const ACCOUNTS_PREFIX: &str = "accounts/";

/// Storage key for the account named `name`.
pub fn account_path(name: &str) -> String {
    format!("{ACCOUNTS_PREFIX}{name}")
}

/// A stored account.
///
/// Persisted as `{"index": <int>, "mnemonic": "<string>"}`; the field names
/// are stable because existing stored records use them.
#[derive(Debug)]
pub struct AccountRecord {
    /// Final component of the derivation path `m/44'/60'/0'/0/{index}`.
    pub index: u32,
    /// BIP-39 mnemonic sentence. Never logged.
    pub mnemonic: SecretString,
}

impl Serialize for AccountRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut record = serializer.serialize_struct("AccountRecord", 2)?;
        record.serialize_field("index", &self.index)?;
        record.serialize_field("mnemonic", self.mnemonic.expose_secret())?;
        record.end()
    }
}

impl<'de> Deserialize<'de> for AccountRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            index: u32,
            mnemonic: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(AccountRecord {
            index: raw.index,
            mnemonic: SecretString::from(raw.mnemonic),
        })
    }
}

/// Fields accepted when creating an account.
///
/// Both are optional: a missing or empty mnemonic means "generate one", and
/// the index defaults to 0.
#[derive(Debug, Default, Deserialize)]
pub struct CreateAccountParams {
    #[serde(default, deserialize_with = "de_opt_secret")]
    pub mnemonic: Option<SecretString>,
    #[serde(default)]
    pub index: Option<u32>,
}

impl CreateAccountParams {
    /// The caller-supplied mnemonic, treating an empty string as absent.
    pub fn supplied_mnemonic(self) -> Option<SecretString> {
        self.mnemonic
            .filter(|phrase| !phrase.expose_secret().trim().is_empty())
    }
}

fn de_opt_secret<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SecretString>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}
