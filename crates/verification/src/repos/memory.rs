//! In-process asset repository.
//!
//! Keeps assets in an ordered map behind a mutex. Each operation holds the lock
//! for its whole duration, which gives the same per-statement atomicity the
//! PostgreSQL repository gets from the database.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{AssetFilter, AssetRepo, assets::clamp_limit};
use crate::models::{NewAsset, VerificationAsset};

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: BTreeMap<i64, VerificationAsset>,
}

/// In-memory implementation of AssetRepo.
#[derive(Default)]
pub struct MemoryAssetRepo {
    table: Mutex<Table>,
}

impl MemoryAssetRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored assets, expired or not.
    pub fn len(&self) -> usize {
        self.table.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AssetRepo for MemoryAssetRepo {
    async fn insert(&self, asset: &NewAsset) -> Result<i64> {
        let mut table = self.table.lock();
        table.next_id += 1;
        let id = table.next_id;
        table.rows.insert(
            id,
            VerificationAsset {
                id,
                channel_id: asset.channel_id,
                address: asset.address.clone(),
                name: asset.name.clone(),
                value: asset.value.clone(),
                expires: asset.expires,
            },
        );
        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<VerificationAsset>> {
        Ok(self.table.lock().rows.get(&id).cloned())
    }

    async fn delete_by_id(&self, id: i64) -> Result<u64> {
        Ok(self.table.lock().rows.remove(&id).map_or(0, |_| 1))
    }

    async fn find_one(&self, filter: &AssetFilter) -> Result<Option<VerificationAsset>> {
        let table = self.table.lock();
        let asset = table
            .rows
            .values()
            .rev()
            .find(|asset| filter.matches(asset))
            .cloned();
        Ok(asset)
    }

    async fn find_all(
        &self,
        filter: &AssetFilter,
        limit: Option<i64>,
    ) -> Result<Vec<VerificationAsset>> {
        let limit = match clamp_limit(limit) {
            Some(limit) => usize::try_from(limit)?,
            None => usize::MAX,
        };
        let table = self.table.lock();
        let assets = table
            .rows
            .values()
            .rev()
            .filter(|asset| filter.matches(asset))
            .take(limit)
            .cloned()
            .collect();
        Ok(assets)
    }

    async fn delete_by_filter(&self, filter: &AssetFilter) -> Result<u64> {
        if filter.is_unconstrained() {
            bail!("refusing to delete verification assets with an unconstrained filter");
        }
        let mut table = self.table.lock();
        let before = table.rows.len();
        table.rows.retain(|_, asset| !filter.matches(asset));
        Ok((before - table.rows.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut table = self.table.lock();
        let before = table.rows.len();
        table.rows.retain(|_, asset| !asset.is_expired_at(now));
        Ok((before - table.rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_asset(address: &str, expires: Option<DateTime<Utc>>) -> NewAsset {
        NewAsset {
            channel_id: 5,
            address: address.to_string(),
            name: "onetime_password".to_string(),
            value: "123456".to_string(),
            expires,
        }
    }

    #[tokio::test]
    async fn insert_assigns_increasing_ids() {
        let repo = MemoryAssetRepo::new();

        let first = repo.insert(&new_asset("a@example.com", None)).await.unwrap();
        let second = repo.insert(&new_asset("a@example.com", None)).await.unwrap();

        assert!(second > first);
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn find_one_prefers_newest_match() {
        let repo = MemoryAssetRepo::new();
        repo.insert(&new_asset("a@example.com", None)).await.unwrap();
        let newest = repo.insert(&new_asset("a@example.com", None)).await.unwrap();
        repo.insert(&new_asset("b@example.com", None)).await.unwrap();

        let found = repo
            .find_one(&AssetFilter::new().address("a@example.com"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, newest);
    }

    #[tokio::test]
    async fn find_all_respects_limit() {
        let repo = MemoryAssetRepo::new();
        for _ in 0..3 {
            repo.insert(&new_asset("a@example.com", None)).await.unwrap();
        }

        let filter = AssetFilter::new().channel_id(5);
        assert_eq!(repo.find_all(&filter, None).await.unwrap().len(), 3);
        assert_eq!(repo.find_all(&filter, Some(2)).await.unwrap().len(), 2);
        assert!(repo.find_all(&filter, Some(-1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_by_id_reports_rows_removed() {
        let repo = MemoryAssetRepo::new();
        let id = repo.insert(&new_asset("a@example.com", None)).await.unwrap();

        assert_eq!(repo.delete_by_id(id).await.unwrap(), 1);
        assert_eq!(repo.delete_by_id(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_by_filter_removes_address_set() {
        let repo = MemoryAssetRepo::new();
        repo.insert(&new_asset("u@x.com", None)).await.unwrap();
        repo.insert(&new_asset("+1555", None)).await.unwrap();
        repo.insert(&new_asset("keep@x.com", None)).await.unwrap();

        let deleted = repo
            .delete_by_filter(&AssetFilter::new().addresses(["u@x.com", "+1555"]))
            .await
            .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn delete_by_filter_refuses_unconstrained_filter() {
        let repo = MemoryAssetRepo::new();
        repo.insert(&new_asset("a@example.com", None)).await.unwrap();

        assert!(repo.delete_by_filter(&AssetFilter::new()).await.is_err());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn delete_expired_keeps_live_and_eternal_assets() {
        let repo = MemoryAssetRepo::new();
        let now = Utc::now();
        repo.insert(&new_asset("past@x.com", Some(now - Duration::seconds(1))))
            .await
            .unwrap();
        repo.insert(&new_asset("now@x.com", Some(now))).await.unwrap();
        repo.insert(&new_asset("future@x.com", Some(now + Duration::hours(1))))
            .await
            .unwrap();
        repo.insert(&new_asset("never@x.com", None)).await.unwrap();

        assert_eq!(repo.delete_expired(now).await.unwrap(), 2);
        assert_eq!(repo.len(), 2);
    }
}
