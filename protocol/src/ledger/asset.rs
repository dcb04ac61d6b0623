//! # Asset and Account Identifiers
//!
//! Every payment asset the engine can price is named by an [`AssetId`]:
//! a content-addressed BLAKE3 hash of its symbol and issuer. Two
//! deployments that describe the same asset the same way agree on its ID
//! without a registry.
//!
//! Parties (buyers, holders, the desk, the vault) are named by
//! [`AccountId`], a plain label. The engine never derives balances from
//! keys, so a label is all an account needs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::hash::hash_fields;

const ASSET_ID_DOMAIN: &str = "reserve/asset-id/v1";

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// A content-addressed identifier for a payment asset.
///
/// Computed as `BLAKE3(domain || symbol || issuer)` with length-prefixed
/// fields. The symbol is upper-cased first so `usdc` and `USDC` name the
/// same asset.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId([u8; 32]);

impl AssetId {
    /// Wrap a raw 32-byte identifier.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the identifier for `symbol` issued by `issuer`.
    pub fn derive(symbol: &str, issuer: &str) -> Self {
        let symbol = symbol.to_uppercase();
        Self(hash_fields(
            ASSET_ID_DOMAIN,
            &[symbol.as_bytes(), issuer.as_bytes()],
        ))
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded identifier.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a hex-encoded identifier.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for AssetId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Serde helper for `HashMap<AssetId, V>` with hex-string keys.
///
/// JSON map keys must be strings; `AssetId` would otherwise serialize as a
/// byte array.
pub mod asset_id_map {
    use super::AssetId;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    pub fn serialize<V, S>(map: &HashMap<AssetId, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        V: Serialize,
        S: Serializer,
    {
        use serde::ser::SerializeMap;
        let mut ser_map = serializer.serialize_map(Some(map.len()))?;
        for (key, value) in map {
            ser_map.serialize_entry(&key.to_hex(), value)?;
        }
        ser_map.end()
    }

    pub fn deserialize<'de, V, D>(deserializer: D) -> Result<HashMap<AssetId, V>, D::Error>
    where
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let string_map: HashMap<String, V> = HashMap::deserialize(deserializer)?;
        string_map
            .into_iter()
            .map(|(key, value)| {
                AssetId::from_hex(&key)
                    .map(|id| (id, value))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A labelled account: a buyer, a holder, or one of the contracts.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create an account label.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for AccountId {
    fn from(label: String) -> Self {
        Self(label)
    }
}
