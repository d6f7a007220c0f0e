// API request/response models (DTOs)

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogEntry, CatalogPage, CreatureRecord};

/// Body of every non-2xx JSON response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

/// Raw pagination query; values are coerced by `PageRequest::from_raw`.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: i64,
    pub current_page: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub data: Vec<CatalogEntry>,
    pub meta: PageMeta,
}

impl From<CatalogPage> for ListResponse {
    fn from(page: CatalogPage) -> Self {
        Self {
            data: page.entries,
            meta: PageMeta {
                total: page.total,
                current_page: page.current_page,
                total_pages: page.total_pages,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub data: Vec<CreatureRecord>,
}
