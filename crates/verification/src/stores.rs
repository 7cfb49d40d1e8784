//! Verification secret stores.
//!
//! All secrets stored here are short-lived: expired assets are deleted lazily
//! at the start of every read, never by a timer the store depends on.
//!
//! ## Usage in verification flows
//!
//! ```ignore
//! let store = VerificationAssetStore::open(assets, contacts).await?;
//!
//! let id = store
//!     .set(channel_id, &email, &AssetName::OnetimePassword, &hashed, Ttl::from("15 minutes"))
//!     .await?;
//!
//! // Later, when the user submits the code
//! let key = AssetKey::composite(channel_id, &email, AssetName::OnetimePassword);
//! if let Some(asset) = store.get_asset(&key).await? {
//!     store.get_once(asset.id).await?;
//! }
//! ```

mod verification;

pub use verification::{AssetStore, VerificationAssetStore};

#[cfg(test)]
pub use verification::MockAssetStore;
