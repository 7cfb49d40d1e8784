//! Storage backends.
//!
//! Each backend is abstracted behind a trait so the store can be tested with
//! mocks or run against an in-process table.
//!
//! ## Repositories
//!
//! - **assets** - Verification asset table (PostgreSQL)
//! - **memory** - Verification asset table kept in process
//! - **contacts** - Read-only address lookups in the identity subsystem
//!
//! ## Tables
//!
//! ```text
//! verification_channel_assets   → id, channel_id, address, name, value, expires
//! contact_emails                → contact_id, email           (read only)
//! contact_data                  → contact_id, field, value    (read only, field = 'phone')
//! ```

mod assets;
mod contacts;
mod memory;

pub use assets::{AssetFilter, AssetRepo, PgAssetRepo};
pub use contacts::{ContactRepo, PgContactRepo};
pub use memory::MemoryAssetRepo;

#[cfg(test)]
pub use assets::MockAssetRepo;
#[cfg(test)]
pub use contacts::MockContactRepo;
