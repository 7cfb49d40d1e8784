//! Short-lived, single-use verification secrets.
//!
//! Each asset binds a channel and a recipient address to a named secret value
//! (confirmation hash, one-time password, recovery code) with an optional
//! expiry. Expired assets are removed lazily on read, single-use retrieval is
//! atomic per asset, and all assets for a contact's addresses can be revoked
//! in bulk.

pub mod clock;
pub mod config;
pub mod models;
pub mod repos;
pub mod stores;
pub mod sweeper;
pub mod ttl;
#[cfg(test)]
mod test_utils;

pub use clock::{Clock, SystemClock};
pub use models::{AssetKey, AssetName, VerificationAsset};
pub use repos::AssetFilter;
pub use stores::{AssetStore, VerificationAssetStore};
pub use ttl::Ttl;
