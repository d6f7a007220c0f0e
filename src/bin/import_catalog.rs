// Load a pokedex JSON dataset into the catalog store, keeping source ids.

use anyhow::Result;
use clap::Parser;
use pokedex_api::catalog::AssetResolver;
use pokedex_api::database_ops::db::Db;
use pokedex_api::database_ops::import::{import_entries, read_entries};
use pokedex_api::telemetry;
use pokedex_api::util::env;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "import_catalog", version, about = "Import a pokedex JSON dataset")]
struct Cli {
    /// JSON file holding an array of records
    #[arg(long, default_value = "pokedex.json")]
    file: PathBuf,
    /// Optional override for the database URL
    #[arg(long)]
    database_url: Option<String>,
    /// Assets root used to detect existing artwork (defaults to ASSETS_DIR)
    #[arg(long)]
    assets_dir: Option<PathBuf>,
    /// Import into a throwaway in-memory store and only report counts
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing(telemetry::DEFAULT_FILTER)?;
    env::init_env();
    let cli = Cli::parse();

    let entries = read_entries(&cli.file)?;
    info!(file = %cli.file.display(), entries = entries.len(), "dataset loaded");

    let assets_dir = cli
        .assets_dir
        .unwrap_or_else(|| PathBuf::from(env::env_opt("ASSETS_DIR").unwrap_or_else(|| "assets".into())));
    let assets = AssetResolver::new(assets_dir, env::env_opt("PUBLIC_BASE_URL").unwrap_or_default());

    let db = if cli.dry_run {
        info!("dry run: importing into an in-memory store");
        Db::connect_memory().await?
    } else {
        let url = cli.database_url.unwrap_or_else(env::db_url);
        Db::connect(&url, env::env_parse("DB_MAX_CONNS", 5u32)).await?
    };

    let report = import_entries(&db, &assets, &entries).await?;
    println!(
        "imported={} skipped={} failed={} next_id_floor={}",
        report.imported, report.skipped, report.failed, report.next_id_floor
    );
    Ok(())
}
