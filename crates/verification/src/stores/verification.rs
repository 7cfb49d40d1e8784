//! Verification asset store.
//!
//! Flow:
//! 1. `set` validates the input, resolves the TTL to an absolute expiry and
//!    inserts a new row (never updates an existing one)
//! 2. Every read path first deletes all expired rows, so an expired secret is
//!    never observable even though nothing sweeps on a timer
//! 3. `get_once` deletes the row it returns; only the caller whose delete
//!    actually removed the row gets it back
//! 4. `clear_by_contact` deletes every asset addressed to the emails and phone
//!    numbers of the given contacts
//!
//! Notes:
//! - Writes don't sweep, so an expired row may linger until the next read
//! - Declined input is `Ok(None)` / `Ok(0)`; backend errors always propagate

use std::{collections::BTreeSet, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    clock::{Clock, SystemClock},
    models::{AssetKey, AssetName, NewAsset, VerificationAsset},
    repos::{AssetFilter, AssetRepo, ContactRepo},
    ttl::Ttl,
};

/// Store for short-lived verification secrets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store a new secret. Returns the new asset id, or `None` if the input
    /// was declined.
    async fn set(
        &self,
        channel_id: i64,
        address: &str,
        name: &AssetName,
        value: &str,
        ttl: Ttl,
    ) -> Result<Option<i64>>;

    /// Get an asset and delete it. At most one caller receives a given asset.
    async fn get_once(&self, id: i64) -> Result<Option<VerificationAsset>>;

    /// Get a live asset by id or by its `(channel_id, address, name)` key.
    async fn get_asset(&self, key: &AssetKey) -> Result<Option<VerificationAsset>>;

    /// Get the newest live asset matching the filter.
    async fn find_by(&self, filter: &AssetFilter) -> Result<Option<VerificationAsset>>;

    /// Get all live assets matching the filter, newest first.
    async fn find_all_by(
        &self,
        filter: &AssetFilter,
        limit: Option<i64>,
    ) -> Result<Vec<VerificationAsset>>;

    /// Delete every asset addressed to the contacts' emails or phone numbers.
    async fn clear_by_contact(&self, contact_ids: &[i64]) -> Result<u64>;

    /// Delete every expired asset.
    async fn clear_expired(&self) -> Result<u64>;
}

/// AssetStore backed by an asset repository and contact lookups.
pub struct VerificationAssetStore {
    assets: Arc<dyn AssetRepo>,
    contacts: Arc<dyn ContactRepo>,
    clock: Arc<dyn Clock>,
}

impl VerificationAssetStore {
    /// Open the store using wall-clock time. Expired assets are swept once.
    pub async fn open(assets: Arc<dyn AssetRepo>, contacts: Arc<dyn ContactRepo>) -> Result<Self> {
        Self::open_with_clock(assets, contacts, Arc::new(SystemClock)).await
    }

    /// Open the store with a custom time source. Expired assets are swept once.
    pub async fn open_with_clock(
        assets: Arc<dyn AssetRepo>,
        contacts: Arc<dyn ContactRepo>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = Self::new(assets, contacts, clock);
        store.clear_expired().await?;
        Ok(store)
    }

    pub(crate) fn new(
        assets: Arc<dyn AssetRepo>,
        contacts: Arc<dyn ContactRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            assets,
            contacts,
            clock,
        }
    }
}

#[async_trait]
impl AssetStore for VerificationAssetStore {
    async fn set(
        &self,
        channel_id: i64,
        address: &str,
        name: &AssetName,
        value: &str,
        ttl: Ttl,
    ) -> Result<Option<i64>> {
        let name = name.as_str();

        if channel_id <= 0 {
            tracing::debug!(channel_id, "asset declined: channel id must be positive");
            return Ok(None);
        }
        if address.is_empty() || name.is_empty() || value.is_empty() {
            tracing::debug!(channel_id, name, "asset declined: empty address, name or value");
            return Ok(None);
        }

        let expires = match ttl.expires_at(self.clock.now()) {
            Ok(expires) => expires,
            Err(err) => {
                tracing::debug!(channel_id, name, %err, "asset declined: invalid ttl");
                return Ok(None);
            }
        };

        let id = self
            .assets
            .insert(&NewAsset {
                channel_id,
                address: address.to_string(),
                name: name.to_string(),
                value: value.to_string(),
                expires,
            })
            .await?;

        tracing::debug!(id, channel_id, name, ?expires, "verification asset stored");

        Ok(Some(id))
    }

    async fn get_once(&self, id: i64) -> Result<Option<VerificationAsset>> {
        if id <= 0 {
            return Ok(None);
        }

        self.clear_expired().await?;

        let Some(asset) = self.assets.find_by_id(id).await? else {
            return Ok(None);
        };

        // Another consumer deleted it between our read and our delete
        if self.assets.delete_by_id(id).await? != 1 {
            tracing::debug!(id, "verification asset already consumed");
            return Ok(None);
        }

        Ok(Some(asset))
    }

    async fn get_asset(&self, key: &AssetKey) -> Result<Option<VerificationAsset>> {
        match key {
            AssetKey::Id(id) => {
                if *id <= 0 {
                    return Ok(None);
                }
                self.clear_expired().await?;
                self.assets.find_by_id(*id).await
            }
            AssetKey::Composite { .. } => {
                self.clear_expired().await?;
                self.assets.find_one(&AssetFilter::from(key)).await
            }
        }
    }

    async fn find_by(&self, filter: &AssetFilter) -> Result<Option<VerificationAsset>> {
        self.clear_expired().await?;
        self.assets.find_one(filter).await
    }

    async fn find_all_by(
        &self,
        filter: &AssetFilter,
        limit: Option<i64>,
    ) -> Result<Vec<VerificationAsset>> {
        self.clear_expired().await?;
        self.assets.find_all(filter, limit).await
    }

    async fn clear_by_contact(&self, contact_ids: &[i64]) -> Result<u64> {
        let ids: Vec<i64> = contact_ids
            .iter()
            .copied()
            .filter(|id| *id > 0)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let mut addresses: BTreeSet<String> = self
            .contacts
            .emails_by_contacts(&ids)
            .await?
            .into_iter()
            .collect();
        addresses.extend(self.contacts.phones_by_contacts(&ids).await?);

        if addresses.is_empty() {
            return Ok(0);
        }

        let deleted = self
            .assets
            .delete_by_filter(&AssetFilter::new().addresses(addresses))
            .await?;

        tracing::info!(contacts = ids.len(), deleted, "verification assets cleared for contacts");

        Ok(deleted)
    }

    async fn clear_expired(&self) -> Result<u64> {
        let deleted = self.assets.delete_expired(self.clock.now()).await?;
        if deleted > 0 {
            tracing::debug!(deleted, "expired verification assets removed");
        }
        Ok(deleted)
    }
}
