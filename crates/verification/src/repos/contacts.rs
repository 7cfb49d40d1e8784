//! Contact address lookups for PostgreSQL.
//!
//! The contact tables are owned by the identity subsystem; this repository only
//! reads them to find the addresses a set of contacts currently claims.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Pool, Postgres};

/// Repository for contact address lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContactRepo: Send + Sync {
    /// Email addresses belonging to any of the contacts.
    async fn emails_by_contacts(&self, contact_ids: &[i64]) -> Result<Vec<String>>;

    /// Phone numbers belonging to any of the contacts.
    async fn phones_by_contacts(&self, contact_ids: &[i64]) -> Result<Vec<String>>;
}

/// PostgreSQL implementation of ContactRepo.
#[derive(Clone)]
pub struct PgContactRepo {
    pool: Pool<Postgres>,
}

impl PgContactRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepo for PgContactRepo {
    async fn emails_by_contacts(&self, contact_ids: &[i64]) -> Result<Vec<String>> {
        let emails: Vec<String> =
            sqlx::query_scalar("SELECT email FROM contact_emails WHERE contact_id = ANY($1)")
                .bind(contact_ids.to_vec())
                .fetch_all(&self.pool)
                .await?;
        Ok(emails)
    }

    async fn phones_by_contacts(&self, contact_ids: &[i64]) -> Result<Vec<String>> {
        let phones: Vec<String> = sqlx::query_scalar(
            "SELECT value FROM contact_data WHERE field = 'phone' AND contact_id = ANY($1)",
        )
        .bind(contact_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(phones)
    }
}
