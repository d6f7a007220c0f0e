// Download full-art images for the catalog from an id -> url map.

use anyhow::Result;
use clap::Parser;
use pokedex_api::cli::full_art::{self, FullArtConfig};
use pokedex_api::telemetry;
use pokedex_api::util::env;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fetch_full_art", version, about = "Fetch full-art images into the assets tree")]
struct Cli {
    /// JSON object (id -> url) or CSV export with id and image cells
    #[arg(long)]
    map: PathBuf,
    /// Assets root (defaults to ASSETS_DIR, then ./assets)
    #[arg(long)]
    assets_dir: Option<PathBuf>,
    /// Overwrite images that already exist
    #[arg(long, default_value_t = false)]
    force: bool,
    /// Parallel downloads
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing(telemetry::DEFAULT_FILTER)?;
    env::init_env();
    let cli = Cli::parse();

    let assets_dir = cli
        .assets_dir
        .unwrap_or_else(|| PathBuf::from(env::env_opt("ASSETS_DIR").unwrap_or_else(|| "assets".into())));

    let summary = full_art::run(FullArtConfig {
        map_path: cli.map,
        assets_dir,
        force: cli.force,
        concurrency: cli.concurrency,
        timeout_secs: cli.timeout_secs,
    })
    .await?;

    println!(
        "downloaded={} skipped={} failed={}",
        summary.downloaded, summary.skipped, summary.failed
    );
    if summary.failed > 0 {
        anyhow::bail!("{} downloads failed", summary.failed);
    }
    Ok(())
}
