// HTTP API server binary for the creature catalog

use anyhow::Result;
use pokedex_api::api::ApiServer;
use pokedex_api::database_ops::db::Db;
use pokedex_api::telemetry;
use pokedex_api::util::env as env_util;

#[actix_web::main]
async fn main() -> Result<()> {
    telemetry::init_tracing(telemetry::DEFAULT_FILTER)?;

    tracing::info!("Initializing pokedex API server");

    // Load dotenv/env once (safe to call multiple times)
    env_util::init_env();
    env_util::preflight_check(
        "api_server",
        &[],
        &[
            "API_HOST",
            "API_PORT",
            "ALLOWED_ORIGINS",
            "DATABASE_URL",
            "DB_MAX_CONNS",
            "ASSETS_DIR",
            "PUBLIC_BASE_URL",
            "MAX_UPLOAD_BYTES",
        ],
    )?;

    let server = ApiServer::from_env()?;

    let db = Db::connect(&server.database_url, server.db_max_connections).await?;
    tracing::info!("Database connected successfully");

    server.run(db).await?;

    Ok(())
}
