//! Paginated listing and substring search over the catalog.

use serde::Serialize;
use tracing::debug;

use super::assets::AssetResolver;
use super::error::CatalogError;
use super::model::CreatureRecord;
use super::store::CreatureStore;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Validated page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Coerce raw query-string values. Non-numeric or non-positive input falls
    /// back to the default; `limit` is capped at [`MAX_PAGE_LIMIT`].
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = positive_or(page, DEFAULT_PAGE);
        let limit = positive_or(limit, DEFAULT_LIMIT).min(MAX_PAGE_LIMIT);
        Self { page, limit }
    }

    pub fn skip(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn positive_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(default)
}

/// `ceil(total / limit)`, zero for an empty catalog.
pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// A listed record plus whether full art exists for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub record: CreatureRecord,
    #[serde(rename = "hasFullArt")]
    pub has_full_art: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub entries: Vec<CatalogEntry>,
    pub total: i64,
    pub current_page: i64,
    pub total_pages: i64,
}

pub struct CatalogQuery<'a, S: CreatureStore + ?Sized> {
    store: &'a S,
    assets: &'a AssetResolver,
}

impl<'a, S: CreatureStore + ?Sized> CatalogQuery<'a, S> {
    pub fn new(store: &'a S, assets: &'a AssetResolver) -> Self {
        Self { store, assets }
    }

    /// One page of records in stored order.
    ///
    /// A page past the end is `NotFound`. An empty catalog still answers page 1
    /// with an empty list and `total_pages == 0`.
    pub async fn list(&self, request: PageRequest) -> Result<CatalogPage, CatalogError> {
        let total = self.store.count().await?;
        let pages = total_pages(total, request.limit);
        if request.page > pages.max(1) {
            return Err(CatalogError::not_found(format!(
                "page {} does not exist (total pages: {pages})",
                request.page
            )));
        }

        let records = self.store.list(request.skip(), request.limit).await?;
        debug!(
            page = request.page,
            limit = request.limit,
            returned = records.len(),
            total,
            "catalog page"
        );

        let entries = records
            .into_iter()
            .map(|record| CatalogEntry {
                has_full_art: self.assets.has_full_art(record.id),
                record,
            })
            .collect();

        Ok(CatalogPage {
            entries,
            total,
            current_page: request.page,
            total_pages: pages,
        })
    }

    /// Case-insensitive substring search on the canonical name. A blank query
    /// matches nothing rather than everything.
    pub async fn search(&self, query: &str) -> Result<Vec<CreatureRecord>, CatalogError> {
        let needle = query.trim();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.search_names(needle).await?)
    }
}
