//! Per-asset credit prices.
//!
//! A price is the amount of the payment asset, in smallest units, that buys
//! one unit of credit. A price of zero means the asset is not accepted; the
//! table keeps the entry so the history of who disabled it survives.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reserve_protocol::ledger::asset::asset_id_map;
use reserve_protocol::ledger::{AccountId, AssetId};
use serde::{Deserialize, Serialize};

use crate::error::{SettlementError, SettlementResult};

/// Anything that can quote a credit price for an asset.
///
/// The vault reads its redemption price through this, so it never holds a
/// price of its own.
pub trait PriceSource {
    /// Active price of one credit in `asset`, or `None` if the asset is not
    /// accepted.
    fn price_of(&self, asset: &AssetId) -> Option<u64>;
}

/// The last price set for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub price: u64,
    pub updated_by: AccountId,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTable {
    #[serde(with = "asset_id_map")]
    entries: HashMap<AssetId, PriceEntry>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `price` for `asset` and returns the previous active price.
    pub fn set(&mut self, asset: AssetId, price: u64, by: AccountId) -> Option<u64> {
        let previous = self.price_of(&asset);
        self.entries.insert(
            asset,
            PriceEntry {
                price,
                updated_by: by,
                updated_at: Utc::now(),
            },
        );
        previous
    }

    pub fn entry(&self, asset: &AssetId) -> Option<&PriceEntry> {
        self.entries.get(asset)
    }

    /// Assets with a non-zero price.
    pub fn active_assets(&self) -> Vec<AssetId> {
        let mut assets: Vec<AssetId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.price > 0)
            .map(|(asset, _)| *asset)
            .collect();
        assets.sort();
        assets
    }

    /// Active price or [`SettlementError::UnsupportedAsset`].
    pub fn require_price(&self, asset: &AssetId) -> SettlementResult<u64> {
        self.price_of(asset)
            .ok_or(SettlementError::UnsupportedAsset(*asset))
    }

    /// Cost of `quantity` credit paid in `asset`.
    pub fn quote(&self, asset: &AssetId, quantity: u64) -> SettlementResult<u64> {
        let price = self.require_price(asset)?;
        scale(quantity, price, "credit quote")
    }
}

impl PriceSource for PriceTable {
    fn price_of(&self, asset: &AssetId) -> Option<u64> {
        self.entries
            .get(asset)
            .map(|entry| entry.price)
            .filter(|price| *price > 0)
    }
}

/// `quantity * price`, or [`SettlementError::Overflow`] tagged with `operation`.
pub fn scale(quantity: u64, price: u64, operation: &'static str) -> SettlementResult<u64> {
    quantity
        .checked_mul(price)
        .ok_or(SettlementError::Overflow { operation })
}
