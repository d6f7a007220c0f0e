//! Bulk load of a pokedex-style JSON array, keeping the source ids.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use super::db::Db;
use crate::catalog::model::{loose_i64, types_from_value, UNKNOWN_IMAGE, UNKNOWN_TYPE};
use crate::catalog::{AssetResolver, BaseStats, CreatureName, CreatureRecord};
use crate::normalization::canonical_name_opt;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Id sequence value after the run.
    pub next_id_floor: i64,
}

/// Read the dataset file. Accepts a bare array or `{ "pokemons": [...] }`.
pub fn read_entries(path: &Path) -> Result<Vec<Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match parsed {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("pokemons") {
            Some(Value::Array(items)) => Ok(items),
            _ => bail!("expected a JSON array or an object with a \"pokemons\" array"),
        },
        _ => bail!("expected a JSON array of records"),
    }
}

/// Normalize one dataset entry. `None` when it has no usable id or French name.
///
/// The image falls back to the served asset URL when artwork exists on disk,
/// then to the unknown placeholder.
pub fn record_from_entry(entry: &Value, assets: &AssetResolver) -> Option<CreatureRecord> {
    let id = entry.get("id").and_then(loose_i64).filter(|id| *id >= 1)?;
    let name = entry.get("name")?;
    let (french, localized) = match name {
        Value::String(s) => (canonical_name_opt(Some(s.as_str()))?, None),
        Value::Object(m) => (
            canonical_name_opt(m.get("french").and_then(Value::as_str))?,
            Some(m),
        ),
        _ => return None,
    };
    let other = |key: &str| {
        localized
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let image = match entry.get("image").and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ if assets.resolve_creature(id).is_some() => assets.asset_url(id),
        _ => UNKNOWN_IMAGE.to_string(),
    };

    Some(CreatureRecord {
        id,
        name: CreatureName {
            french,
            english: other("english"),
            japanese: other("japanese"),
            chinese: other("chinese"),
        },
        types: entry
            .get("type")
            .and_then(types_from_value)
            .unwrap_or_else(|| vec![UNKNOWN_TYPE.to_string()]),
        base: entry.get("base").map(BaseStats::from_loose).unwrap_or_default(),
        image,
    })
}

/// Write every usable entry, then move the id sequence past the highest id.
/// A failing row is logged and counted; the rest of the batch continues.
pub async fn import_entries(
    db: &Db,
    assets: &AssetResolver,
    entries: &[Value],
) -> Result<ImportReport> {
    let mut report = ImportReport::default();
    for (idx, entry) in entries.iter().enumerate() {
        let Some(record) = record_from_entry(entry, assets) else {
            warn!(index = idx, "skipping entry without id or french name");
            report.skipped += 1;
            continue;
        };
        match db.import_record(&record).await {
            Ok(()) => report.imported += 1,
            Err(e) => {
                warn!(id = record.id, name = %record.name.french, error = %e, "import failed");
                report.failed += 1;
            }
        }
    }
    report.next_id_floor = db.sync_id_sequence().await?;
    info!(
        imported = report.imported,
        skipped = report.skipped,
        failed = report.failed,
        sequence = report.next_id_floor,
        "catalog import finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CreatureStore;
    use serde_json::json;

    #[test]
    fn entries_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetResolver::new(dir.path(), "");
        let entry = json!({
            "id": 25,
            "name": {"english": "Pikachu", "french": "  PIKACHU ", "japanese": ""},
            "type": ["Electric"],
            "base": {"HP": 35, "Sp. Attack": 50, "Speed": 90}
        });

        let record = record_from_entry(&entry, &assets).unwrap();
        assert_eq!(record.id, 25);
        assert_eq!(record.name.french, "Pikachu");
        assert_eq!(record.name.english.as_deref(), Some("Pikachu"));
        assert_eq!(record.name.japanese, None);
        assert_eq!(record.base.special_attack, 50);
        assert_eq!(record.image, UNKNOWN_IMAGE);
    }

    #[test]
    fn image_prefers_existing_artwork() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetResolver::new(dir.path(), "http://dex.local");
        std::fs::create_dir_all(dir.path().join("pokemons")).unwrap();
        std::fs::write(assets.standard_path(4), b"png").unwrap();

        let record = record_from_entry(&json!({"id": 4, "name": "salameche"}), &assets).unwrap();
        assert_eq!(record.image, "http://dex.local/assets/pokemons/4");
        assert_eq!(record.types, vec!["unknown"]);
    }

    #[test]
    fn unusable_entries_are_rejected() {
        let assets = AssetResolver::new("unused", "");
        assert!(record_from_entry(&json!({"name": "mew"}), &assets).is_none());
        assert!(record_from_entry(&json!({"id": 0, "name": "mew"}), &assets).is_none());
        assert!(record_from_entry(&json!({"id": 3, "name": {"english": "Mew"}}), &assets).is_none());
    }

    #[test]
    fn reads_wrapped_and_bare_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("bare.json");
        std::fs::write(&bare, r#"[{"id": 1, "name": "abo"}]"#).unwrap();
        assert_eq!(read_entries(&bare).unwrap().len(), 1);

        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(&wrapped, r#"{"pokemons": [{"id": 1}, {"id": 2}]}"#).unwrap();
        assert_eq!(read_entries(&wrapped).unwrap().len(), 2);

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"id": 1}"#).unwrap();
        assert!(read_entries(&bad).is_err());
    }

    #[tokio::test]
    async fn import_keeps_ids_and_advances_sequence() {
        let db = Db::connect_memory().await.unwrap();
        let assets = AssetResolver::new("unused", "");
        let entries = vec![
            json!({"id": 1, "name": {"french": "Bulbizarre"}}),
            json!({"id": 151, "name": {"french": "Mew"}}),
            json!({"id": 7}),
            json!({"id": 9, "name": {"french": "mew"}}),
        ];

        let report = import_entries(&db, &assets, &entries).await.unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.next_id_floor, 151);

        assert_eq!(db.find_by_name("Mew").await.unwrap().unwrap().id, 151);
        assert_eq!(db.next_id().await.unwrap(), 152);
    }

    #[tokio::test]
    async fn reimport_overwrites_by_id() {
        let db = Db::connect_memory().await.unwrap();
        let assets = AssetResolver::new("unused", "");
        import_entries(&db, &assets, &[json!({"id": 1, "name": "abo", "base": {"HP": 1}})])
            .await
            .unwrap();
        import_entries(&db, &assets, &[json!({"id": 1, "name": "abo", "base": {"HP": 35}})])
            .await
            .unwrap();

        assert_eq!(db.count().await.unwrap(), 1);
        assert_eq!(db.find_by_id(1).await.unwrap().unwrap().base.hp, 35);
    }
}
