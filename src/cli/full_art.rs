use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::{stream, StreamExt};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::model::loose_i64;
use crate::catalog::AssetResolver;

#[derive(Debug, Clone)]
pub struct FullArtConfig {
    /// `id -> url` map: a JSON object, or a CSV export with an id column and a URL cell.
    pub map_path: PathBuf,
    pub assets_dir: PathBuf,
    /// Re-download even when the file already exists.
    pub force: bool,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FullArtSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Load the id -> url map, picking the format from the file extension.
pub fn load_art_map(path: &Path) -> Result<BTreeMap<i64, String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if is_csv {
        parse_csv_map(&raw)
    } else {
        parse_json_map(&raw)
    }
}

pub fn parse_json_map(raw: &str) -> Result<BTreeMap<i64, String>> {
    let Value::Object(map) = serde_json::from_str::<Value>(raw)? else {
        bail!("art map must be a JSON object of id -> url");
    };
    let mut out = BTreeMap::new();
    for (key, value) in map {
        let id = loose_i64(&Value::String(key.clone())).filter(|id| *id >= 1);
        match (id, value.as_str().and_then(extract_url)) {
            (Some(id), Some(url)) => {
                out.insert(id, url);
            }
            _ => warn!(key = %key, "skipping unusable art map entry"),
        }
    }
    Ok(out)
}

/// Rows whose first cell is not an id (headers included) are ignored. The URL
/// is the first cell holding either a bare http(s) URL or an `image("...")` formula.
pub fn parse_csv_map(raw: &str) -> Result<BTreeMap<i64, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw.as_bytes());
    let mut out = BTreeMap::new();
    for row in reader.records() {
        let row = row.context("malformed CSV row")?;
        let Some(id) = row
            .get(0)
            .and_then(|c| c.trim().parse::<i64>().ok())
            .filter(|id| *id >= 1)
        else {
            continue;
        };
        if let Some(url) = row.iter().skip(1).find_map(extract_url) {
            out.insert(id, url);
        }
    }
    Ok(out)
}

fn image_formula() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)image\("(.+?)"\)"#).ok())
        .as_ref()
}

/// A bare URL or the target of a spreadsheet `image("...")` cell.
fn extract_url(cell: &str) -> Option<String> {
    if let Some(caps) = image_formula().and_then(|re| re.captures(cell)) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    let cell = cell.trim();
    (cell.starts_with("http://") || cell.starts_with("https://")).then(|| cell.to_string())
}

pub async fn run(cfg: FullArtConfig) -> Result<FullArtSummary> {
    let map = load_art_map(&cfg.map_path)?;
    info!(entries = map.len(), map = %cfg.map_path.display(), "full art map loaded");

    let assets = AssetResolver::new(&cfg.assets_dir, "");
    let client = Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
        .user_agent(concat!("pokedex-api/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let client = &client;
    let assets = &assets;
    let force = cfg.force;
    let results: Vec<Outcome> = stream::iter(map)
        .map(move |(id, url)| {
            let target = assets.full_art_path(id);
            async move {
                if !force && target.is_file() {
                    return Outcome::Skipped;
                }
                match download(client, &url, &target).await {
                    Ok(size) => {
                        info!(id, size, "full art saved");
                        Outcome::Downloaded
                    }
                    Err(e) => {
                        warn!(id, url = %url, error = %e, "full art download failed");
                        Outcome::Failed
                    }
                }
            }
        })
        .buffer_unordered(cfg.concurrency.max(1))
        .collect()
        .await;

    let mut summary = FullArtSummary::default();
    for outcome in results {
        match outcome {
            Outcome::Downloaded => summary.downloaded += 1,
            Outcome::Skipped => summary.skipped += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }
    info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        failed = summary.failed,
        "full art fetch finished"
    );
    Ok(summary)
}

enum Outcome {
    Downloaded,
    Skipped,
    Failed,
}

async fn download(client: &Client, url: &str, target: &Path) -> Result<usize> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    // Write next to the target first so a failed run never leaves a truncated image.
    let partial = target.with_extension("png.part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, target)
        .await
        .with_context(|| format!("failed to move download into {}", target.display()))?;
    Ok(bytes.len())
}
