//! Persistence seam for creature records.

use anyhow::Result;
use async_trait::async_trait;

use super::model::{CreaturePatch, CreatureRecord};

/// Result of inserting a brand-new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another record already owns `name.french`.
    NameTaken,
}

/// Result of applying a patch by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    Updated(CreatureRecord),
    /// No record with that id (deleted concurrently).
    Missing,
    /// The patch would rename onto a name owned by another record.
    NameTaken,
}

#[async_trait]
pub trait CreatureStore: Send + Sync {
    /// Exact match on the canonical `name.french`.
    async fn find_by_name(&self, name_french: &str) -> Result<Option<CreatureRecord>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<CreatureRecord>>;

    /// Window of records in stored (id) order.
    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<CreatureRecord>>;

    async fn count(&self) -> Result<i64>;

    /// Case-insensitive substring match on `name.french`; `needle` is already trimmed.
    async fn search_names(&self, needle: &str) -> Result<Vec<CreatureRecord>>;

    /// Atomically reserve the next identifier. Identifiers are never handed out twice.
    async fn next_id(&self) -> Result<i64>;

    async fn insert(&self, record: &CreatureRecord) -> Result<InsertOutcome>;

    async fn apply_patch(&self, id: i64, patch: &CreaturePatch) -> Result<PatchOutcome>;

    /// Overwrite every field of the row with `record.id`. A missing row stays missing.
    async fn restore(&self, record: &CreatureRecord) -> Result<()>;

    /// Returns whether a record was removed.
    async fn delete_by_name(&self, name_french: &str) -> Result<bool>;
}
