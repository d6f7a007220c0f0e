// Shared application state handed to every worker

use actix_web::web;

use crate::catalog::AssetResolver;
use crate::database_ops::db::Db;

/// Default cap for request bodies and uploaded images (5 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: web::Data<Db>,
    pub assets: web::Data<AssetResolver>,
    pub limits: web::Data<UploadLimits>,
}

impl AppState {
    pub fn new(db: Db, assets: AssetResolver, limits: UploadLimits) -> Self {
        Self {
            db: web::Data::new(db),
            assets: web::Data::new(assets),
            limits: web::Data::new(limits),
        }
    }
}
