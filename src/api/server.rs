// API server implementation using actix-web

use crate::api::{middleware, routes, state::AppState, state::UploadLimits};
use crate::catalog::AssetResolver;
use crate::database_ops::db::Db;
use crate::util::env as env_util;
use actix_web::{App, HttpServer};
use anyhow::{Context, Result};

pub const DEFAULT_PORT: u16 = 3000;

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub allowed_origins: String,
    pub assets_dir: String,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    pub database_url: String,
    pub db_max_connections: u32,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        env_util::init_env();

        let host = env_util::env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match env_util::env_opt("API_PORT") {
            Some(raw) => raw.trim().parse().context("Invalid API_PORT")?,
            None => DEFAULT_PORT,
        };

        let allowed_origins = env_util::env_opt("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:5173".to_string());

        Ok(Self {
            host,
            port,
            allowed_origins,
            assets_dir: env_util::env_opt("ASSETS_DIR").unwrap_or_else(|| "assets".to_string()),
            public_base_url: env_util::env_opt("PUBLIC_BASE_URL").unwrap_or_default(),
            max_upload_bytes: env_util::env_parse(
                "MAX_UPLOAD_BYTES",
                UploadLimits::default().max_bytes,
            ),
            database_url: env_util::db_url(),
            db_max_connections: env_util::env_parse("DB_MAX_CONNS", 5u32),
        })
    }

    /// Start the HTTP server
    pub async fn run(self, db: Db) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            assets = %self.assets_dir,
            "Starting pokedex API server"
        );

        let state = AppState::new(
            db,
            AssetResolver::new(&self.assets_dir, self.public_base_url.clone()),
            UploadLimits {
                max_bytes: self.max_upload_bytes,
            },
        );
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);

            App::new()
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .configure(routes::configure_app(state.clone()))
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
