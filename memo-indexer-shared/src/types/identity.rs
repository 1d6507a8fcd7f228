use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::Hash as _;
use bitcoin::{Address, Network, PubkeyHash};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The public-key-hash that authored an action.
///
/// Derived from the signing script of the transaction, never taken from the
/// payload itself. Displays as a mainnet P2PKH address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(PubkeyHash);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidIdentity {
    #[error("public key hash must be 20 bytes, got {0}")]
    Length(usize),
    #[error("invalid address: {0}")]
    Address(String),
    #[error("address is not pay-to-public-key-hash")]
    NotPubkeyHash,
}

impl Identity {
    /// HASH160 of a serialized public key.
    pub fn from_pubkey(pubkey: &[u8]) -> Self {
        Identity(PubkeyHash::hash(pubkey))
    }

    pub fn from_byte_array(bytes: [u8; 20]) -> Self {
        Identity(PubkeyHash::from_byte_array(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, InvalidIdentity> {
        PubkeyHash::from_slice(bytes)
            .map(Identity)
            .map_err(|_| InvalidIdentity::Length(bytes.len()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_byte_array()
    }

    pub fn pubkey_hash(&self) -> PubkeyHash {
        self.0
    }

    pub fn to_address(&self) -> Address {
        Address::p2pkh(self.0, Network::Bitcoin)
    }
}

impl From<PubkeyHash> for Identity {
    fn from(hash: PubkeyHash) -> Self {
        Identity(hash)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_address())
    }
}

impl FromStr for Identity {
    type Err = InvalidIdentity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address::from_str(s)
            .map_err(|e| InvalidIdentity::Address(e.to_string()))?
            .require_network(Network::Bitcoin)
            .map_err(|e| InvalidIdentity::Address(e.to_string()))?;
        address
            .pubkey_hash()
            .map(Identity)
            .ok_or(InvalidIdentity::NotPubkeyHash)
    }
}
