//! Shared test utilities for store tests.
//!
//! Provides mock factories, a manually advanced clock and a `TestStoreBuilder`
//! for constructing a `VerificationAssetStore` with only the collaborators each
//! test needs.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::test_utils::{TestStoreBuilder, mock_asset};
//!
//! let mut assets = MockAssetRepo::new();
//! assets.expect_find_by_id().returning(|id| Ok(Some(mock_asset(id, "a@example.com", "onetime_password"))));
//!
//! let store = TestStoreBuilder::new()
//!     .with_asset_repo(assets)
//!     .build();
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use crate::clock::Clock;
use crate::models::VerificationAsset;
use crate::repos::{AssetRepo, ContactRepo, MemoryAssetRepo, MockAssetRepo, MockContactRepo};
use crate::stores::VerificationAssetStore;

/// Fixed instant all test clocks start from.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

/// Creates a never-expiring asset with the given id, address and name.
pub fn mock_asset(id: i64, address: &str, name: &str) -> VerificationAsset {
    VerificationAsset {
        id,
        channel_id: 5,
        address: address.to_string(),
        name: name.to_string(),
        value: "123456".to_string(),
        expires: None,
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Builder for constructing a test `VerificationAssetStore`.
///
/// Uses default (empty) mocks for any collaborator not explicitly set, so any
/// unexpected backend call fails the test. The clock defaults to a
/// `ManualClock` frozen at [`test_now`].
pub struct TestStoreBuilder {
    assets: Option<Arc<dyn AssetRepo>>,
    contacts: Option<Arc<dyn ContactRepo>>,
    clock: Option<Arc<dyn Clock>>,
}

impl TestStoreBuilder {
    /// Creates a new builder with no collaborators configured.
    pub fn new() -> Self {
        Self {
            assets: None,
            contacts: None,
            clock: None,
        }
    }

    pub fn with_asset_repo(mut self, repo: MockAssetRepo) -> Self {
        self.assets = Some(Arc::new(repo) as Arc<dyn AssetRepo>);
        self
    }

    pub fn with_memory_repo(mut self, repo: Arc<MemoryAssetRepo>) -> Self {
        self.assets = Some(repo as Arc<dyn AssetRepo>);
        self
    }

    pub fn with_contact_repo(mut self, repo: MockContactRepo) -> Self {
        self.contacts = Some(Arc::new(repo) as Arc<dyn ContactRepo>);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the store without the initial sweep `open` performs.
    pub fn build(self) -> VerificationAssetStore {
        let assets = self
            .assets
            .unwrap_or_else(|| Arc::new(MockAssetRepo::new()) as Arc<dyn AssetRepo>);
        let contacts = self
            .contacts
            .unwrap_or_else(|| Arc::new(MockContactRepo::new()) as Arc<dyn ContactRepo>);
        let clock = self
            .clock
            .unwrap_or_else(|| ManualClock::new(test_now()) as Arc<dyn Clock>);

        VerificationAssetStore::new(assets, contacts, clock)
    }
}

impl Default for TestStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
