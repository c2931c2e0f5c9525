//! Chain policy enforcement
//!
//! A pure decision over a chain record, a destination address, and the
//! caller's network origin. Evaluated once per transaction-signing request;
//! message signing has no destination and is not gated.
//!
//! The check order is fixed: exclusion strictly dominates inclusion, and the
//! origin check runs last and only when CIDR restrictions are configured.

use std::net::IpAddr;

use alloy::primitives::Address;
use ipnet::IpNet;

use crate::chains::ChainRecord;
use crate::error::PolicyViolation;

/// Decide whether a transaction to `destination` from `origin` is permitted
/// by `chain`. Returns the specific violation on rejection.
pub fn enforce(
    chain: &ChainRecord,
    destination: Address,
    origin: Option<IpAddr>,
) -> Result<(), PolicyViolation> {
    if contains_address(&chain.exclusions, destination) {
        return Err(PolicyViolation::Excluded(destination));
    }

    if !chain.inclusions.is_empty() && !contains_address(&chain.inclusions, destination) {
        return Err(PolicyViolation::NotIncluded(destination));
    }

    if !chain.bound_cidr_list.is_empty() {
        // Missing origin information rejects rather than silently allowing.
        let Some(origin) = origin else {
            return Err(PolicyViolation::OriginUnknown);
        };
        if !origin_permitted(&chain.bound_cidr_list, origin) {
            return Err(PolicyViolation::OriginNotPermitted(origin));
        }
    }

    Ok(())
}

/// Compare by parsed 20-byte value so checksum and case differences in the
/// stored list cannot bypass the policy. Entries are validated at write time;
/// anything unparseable can never match.
fn contains_address(list: &[String], address: Address) -> bool {
    list.iter()
        .filter_map(|entry| entry.parse::<Address>().ok())
        .any(|entry| entry == address)
}

fn origin_permitted(cidrs: &[String], origin: IpAddr) -> bool {
    cidrs
        .iter()
        .filter_map(|entry| entry.parse::<IpNet>().ok())
        .any(|block| block.contains(&origin))
}
