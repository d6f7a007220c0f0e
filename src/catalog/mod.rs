//! Creature catalog: records, the upsert engine, listing/search and artwork lookup.
//!
//! Everything here is storage-agnostic and talks to persistence through
//! [`store::CreatureStore`]; the SQLite implementation lives in
//! `database_ops::creatures`.

pub mod assets;
pub mod error;
pub mod model;
pub mod query;
pub mod store;
pub mod upsert;

pub use assets::{AssetResolver, AssetTier, ResolvedAsset, StagedUpload};
pub use error::CatalogError;
pub use model::{BaseStats, CreatureName, CreaturePatch, CreatureRecord, Stat};
pub use query::{CatalogEntry, CatalogPage, CatalogQuery, PageRequest};
pub use store::CreatureStore;
pub use upsert::{UpsertEngine, UpsertOutcome};
