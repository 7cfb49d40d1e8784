//! Verification asset repository for PostgreSQL.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, QueryBuilder};

use crate::models::{AssetKey, AssetName, NewAsset, VerificationAsset};

const TABLE: &str = "verification_channel_assets";
const COLUMNS: &str = "id, channel_id, address, name, value, expires";

/// Field predicates for asset lookups and deletes. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    pub id: Option<i64>,
    pub channel_id: Option<i64>,
    /// Matches when the address equals any of the entries.
    pub addresses: Option<Vec<String>>,
    pub name: Option<String>,
}

impl AssetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn channel_id(mut self, channel_id: i64) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.addresses = Some(vec![address.into()]);
        self
    }

    pub fn addresses<I, S>(mut self, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.addresses = Some(addresses.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// True when no predicate is set, i.e. the filter matches every row.
    pub fn is_unconstrained(&self) -> bool {
        self.id.is_none()
            && self.channel_id.is_none()
            && self.addresses.is_none()
            && self.name.is_none()
    }

    pub fn matches(&self, asset: &VerificationAsset) -> bool {
        self.id.is_none_or(|id| asset.id == id)
            && self.channel_id.is_none_or(|id| asset.channel_id == id)
            && self
                .addresses
                .as_ref()
                .is_none_or(|addresses| addresses.contains(&asset.address))
            && self.name.as_ref().is_none_or(|name| asset.name == *name)
    }
}

impl TryFrom<&AssetFilter> for AssetKey {
    type Error = anyhow::Error;

    /// Only a filter naming exactly one channel, one address and one name
    /// describes a composite key.
    fn try_from(filter: &AssetFilter) -> Result<Self> {
        let (Some(channel_id), Some([address]), Some(name)) = (
            filter.channel_id,
            filter.addresses.as_deref(),
            filter.name.as_deref(),
        ) else {
            bail!("filter does not name a single channel, address and name");
        };
        Ok(AssetKey::composite(
            channel_id,
            address.clone(),
            AssetName::from(name),
        ))
    }
}

impl From<&AssetKey> for AssetFilter {
    fn from(key: &AssetKey) -> Self {
        match key {
            AssetKey::Id(id) => AssetFilter::new().id(*id),
            AssetKey::Composite {
                channel_id,
                address,
                name,
            } => AssetFilter::new()
                .channel_id(*channel_id)
                .address(address.as_str())
                .name(name.as_str()),
        }
    }
}

/// Backend operations the verification asset store is built on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetRepo: Send + Sync {
    /// Insert a new asset and return its generated id.
    async fn insert(&self, asset: &NewAsset) -> Result<i64>;

    /// Find an asset by ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<VerificationAsset>>;

    /// Delete an asset by ID, returning the number of rows removed.
    async fn delete_by_id(&self, id: i64) -> Result<u64>;

    /// Find the newest asset matching the filter.
    async fn find_one(&self, filter: &AssetFilter) -> Result<Option<VerificationAsset>>;

    /// Find all assets matching the filter, newest first.
    async fn find_all(
        &self,
        filter: &AssetFilter,
        limit: Option<i64>,
    ) -> Result<Vec<VerificationAsset>>;

    /// Delete all assets matching the filter. Unconstrained filters are refused.
    async fn delete_by_filter(&self, filter: &AssetFilter) -> Result<u64>;

    /// Delete every asset whose expiry is at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// PostgreSQL implementation of AssetRepo.
#[derive(Clone)]
pub struct PgAssetRepo {
    pool: Pool<Postgres>,
}

impl PgAssetRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn push_conditions(builder: &mut QueryBuilder<'_, Postgres>, filter: &AssetFilter) {
    let mut separator = " WHERE ";

    if let Some(id) = filter.id {
        builder.push(separator).push("id = ").push_bind(id);
        separator = " AND ";
    }
    if let Some(channel_id) = filter.channel_id {
        builder
            .push(separator)
            .push("channel_id = ")
            .push_bind(channel_id);
        separator = " AND ";
    }
    if let Some(addresses) = &filter.addresses {
        builder
            .push(separator)
            .push("address = ANY(")
            .push_bind(addresses.clone())
            .push(")");
        separator = " AND ";
    }
    if let Some(name) = &filter.name {
        builder.push(separator).push("name = ").push_bind(name.clone());
    }
}

/// Negative limits mean "no rows" on every backend.
pub(crate) fn clamp_limit(limit: Option<i64>) -> Option<i64> {
    limit.map(|limit| limit.max(0))
}

fn select_query(filter: &AssetFilter, limit: Option<i64>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {COLUMNS} FROM {TABLE}"));
    push_conditions(&mut builder, filter);
    builder.push(" ORDER BY id DESC");
    if let Some(limit) = clamp_limit(limit) {
        builder.push(" LIMIT ").push_bind(limit);
    }
    builder
}

fn delete_query(filter: &AssetFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("DELETE FROM {TABLE}"));
    push_conditions(&mut builder, filter);
    builder
}

#[async_trait]
impl AssetRepo for PgAssetRepo {
    async fn insert(&self, asset: &NewAsset) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(&format!(
            "INSERT INTO {TABLE} (channel_id, address, name, value, expires) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id"
        ))
        .bind(asset.channel_id)
        .bind(&asset.address)
        .bind(&asset.name)
        .bind(&asset.value)
        .bind(asset.expires)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<VerificationAsset>> {
        let asset = sqlx::query_as::<_, VerificationAsset>(&format!(
            "SELECT {COLUMNS} FROM {TABLE} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(asset)
    }

    async fn delete_by_id(&self, id: i64) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {TABLE} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn find_one(&self, filter: &AssetFilter) -> Result<Option<VerificationAsset>> {
        let asset = select_query(filter, Some(1))
            .build_query_as::<VerificationAsset>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(asset)
    }

    async fn find_all(
        &self,
        filter: &AssetFilter,
        limit: Option<i64>,
    ) -> Result<Vec<VerificationAsset>> {
        let assets = select_query(filter, limit)
            .build_query_as::<VerificationAsset>()
            .fetch_all(&self.pool)
            .await?;
        Ok(assets)
    }

    async fn delete_by_filter(&self, filter: &AssetFilter) -> Result<u64> {
        if filter.is_unconstrained() {
            bail!("refusing to delete verification assets with an unconstrained filter");
        }
        let result = delete_query(filter).build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {TABLE} WHERE expires IS NOT NULL AND expires <= $1"
        ))
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(id: i64, address: &str) -> VerificationAsset {
        VerificationAsset {
            id,
            channel_id: 5,
            address: address.to_string(),
            name: "onetime_password".to_string(),
            value: "123456".to_string(),
            expires: None,
        }
    }

    #[test]
    fn empty_filter_selects_everything_newest_first() {
        let query = select_query(&AssetFilter::new(), None);

        assert_eq!(
            query.sql(),
            "SELECT id, channel_id, address, name, value, expires \
             FROM verification_channel_assets ORDER BY id DESC"
        );
    }

    #[test]
    fn composite_filter_binds_fields_in_index_order() {
        let filter = AssetFilter::new()
            .name("onetime_password")
            .address("a@example.com")
            .channel_id(5);
        let query = select_query(&filter, Some(1));

        assert_eq!(
            query.sql(),
            "SELECT id, channel_id, address, name, value, expires \
             FROM verification_channel_assets \
             WHERE channel_id = $1 AND address = ANY($2) AND name = $3 \
             ORDER BY id DESC LIMIT $4"
        );
    }

    #[test]
    fn negative_limit_is_clamped_to_zero() {
        let query = select_query(&AssetFilter::new(), Some(-1));

        assert!(query.sql().ends_with("ORDER BY id DESC LIMIT $1"));
        assert_eq!(clamp_limit(Some(-1)), Some(0));
        assert_eq!(clamp_limit(Some(3)), Some(3));
        assert_eq!(clamp_limit(None), None);
    }

    #[test]
    fn delete_by_addresses_uses_any() {
        let filter = AssetFilter::new().addresses(["u@x.com", "+1555"]);
        let query = delete_query(&filter);

        assert_eq!(
            query.sql(),
            "DELETE FROM verification_channel_assets WHERE address = ANY($1)"
        );
    }

    #[test]
    fn filter_matches_on_every_set_field() {
        let filter = AssetFilter::new().channel_id(5).address("a@example.com");

        assert!(filter.matches(&asset(1, "a@example.com")));
        assert!(!filter.matches(&asset(1, "b@example.com")));
        assert!(AssetFilter::new().matches(&asset(1, "anything")));
    }

    #[test]
    fn composite_key_from_filter_requires_all_three_fields() {
        let full = AssetFilter::new()
            .channel_id(5)
            .address("a@example.com")
            .name("onetime_password");
        assert_eq!(
            AssetKey::try_from(&full).ok(),
            Some(AssetKey::composite(
                5,
                "a@example.com",
                AssetName::OnetimePassword
            ))
        );

        let missing_name = AssetFilter::new().channel_id(5).address("a@example.com");
        assert!(AssetKey::try_from(&missing_name).is_err());

        let address_set = AssetFilter::new()
            .channel_id(5)
            .addresses(["a@example.com", "b@example.com"])
            .name("onetime_password");
        assert!(AssetKey::try_from(&address_set).is_err());
    }

    #[test]
    fn unconstrained_filter_is_detected() {
        assert!(AssetFilter::new().is_unconstrained());
        assert!(!AssetFilter::new().id(1).is_unconstrained());
    }
}
