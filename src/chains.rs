//! Chain-mount configuration records
//!
//! A chain record names an EVM network and carries the signing policy for it:
//! which destination addresses may be transacted with and which caller
//! network origins may request signatures. The RPC URL is stored opaquely
//! for the host's benefit; this crate never dials it.

use alloy::primitives::Address;
use ipnet::IpNet;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Storage namespace for chain records.
pub const CHAINS_PREFIX: &str = "chains/";

/// Chain id applied when a chain is created without one.
pub const DEFAULT_CHAIN_ID: &str = "8545";

/// Storage key for the chain named `name`.
pub fn chain_path(name: &str) -> String {
    format!("{CHAINS_PREFIX}{name}")
}

/// A stored chain configuration.
///
/// Persisted field names are stable; `bound_cidr_list_list` is the name
/// existing stored records carry, so it stays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    /// CIDR blocks that may originate signing requests. Empty = unrestricted.
    #[serde(rename = "bound_cidr_list_list", default)]
    pub bound_cidr_list: Vec<String>,
    /// If non-empty, only these destinations may be transacted with.
    #[serde(default)]
    pub inclusions: Vec<String>,
    /// Destinations that may never be transacted with.
    #[serde(default)]
    pub exclusions: Vec<String>,
    /// Opaque RPC endpoint, stored for the host and never dialed here.
    #[serde(default)]
    pub rpc_url: String,
    /// Decimal network id.
    pub chain_id: String,
}

impl ChainRecord {
    /// Validate list entries and the chain id before the record is persisted,
    /// so policy evaluation can assume well-formed data.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.chain_id.is_empty() || !self.chain_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidChainId);
        }
        for entry in &self.inclusions {
            entry
                .parse::<Address>()
                .map_err(|_| ValidationError::InvalidAddress("inclusions"))?;
        }
        for entry in &self.exclusions {
            entry
                .parse::<Address>()
                .map_err(|_| ValidationError::InvalidAddress("exclusions"))?;
        }
        for entry in &self.bound_cidr_list {
            entry
                .parse::<IpNet>()
                .map_err(|_| ValidationError::InvalidCidr(entry.clone()))?;
        }
        Ok(())
    }
}

/// Fields accepted when creating or updating a chain.
///
/// List fields accept either a JSON array or a comma-separated string, since
/// hosts commonly deliver them as the latter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainParams {
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default, deserialize_with = "de_comma_list")]
    pub inclusions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de_comma_list")]
    pub exclusions: Option<Vec<String>>,
    #[serde(default, deserialize_with = "de_comma_list")]
    pub bound_cidr_list: Option<Vec<String>>,
}

impl ChainParams {
    /// Build a fresh record, applying defaults for absent fields.
    pub fn into_record(self) -> ChainRecord {
        ChainRecord {
            bound_cidr_list: self.bound_cidr_list.unwrap_or_default(),
            inclusions: self.inclusions.unwrap_or_default(),
            exclusions: self.exclusions.unwrap_or_default(),
            rpc_url: self.rpc_url.unwrap_or_default(),
            chain_id: self.chain_id.unwrap_or_else(|| DEFAULT_CHAIN_ID.to_string()),
        }
    }

    /// Apply these fields on top of an existing record; absent fields keep
    /// their stored values.
    pub fn apply(self, existing: ChainRecord) -> ChainRecord {
        ChainRecord {
            bound_cidr_list: self.bound_cidr_list.unwrap_or(existing.bound_cidr_list),
            inclusions: self.inclusions.unwrap_or(existing.inclusions),
            exclusions: self.exclusions.unwrap_or(existing.exclusions),
            rpc_url: self.rpc_url.unwrap_or(existing.rpc_url),
            chain_id: self.chain_id.unwrap_or(existing.chain_id),
        }
    }
}

fn de_comma_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<String>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrString {
        List(Vec<String>),
        String(String),
    }

    Ok(Option::<ListOrString>::deserialize(deserializer)?.map(|value| match value {
        ListOrString::List(entries) => entries,
        ListOrString::String(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect(),
    }))
}
