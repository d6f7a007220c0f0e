//! Find-or-create with partial merge.
//!
//! A payload names a creature either with `name` or with an
//! `originalName`/`newName` pair (rename). When the searched name exists the
//! remaining payload is flattened into dot paths and applied as a
//! [`CreaturePatch`]; otherwise a full record is synthesized under a freshly
//! reserved id.

use serde_json::{Map, Value};
use tracing::{info, warn};

use super::assets::{AssetResolver, StagedUpload};
use super::error::CatalogError;
use super::model::{
    decode_base, decode_types, types_from_value, BaseStats, CreatureName, CreaturePatch,
    CreatureRecord, UNKNOWN_IMAGE, UNKNOWN_TYPE,
};
use super::store::{CreatureStore, InsertOutcome, PatchOutcome};
use crate::normalization::{canonical_name_opt, flatten};

const NAME_KEY: &str = "name";
const ORIGINAL_NAME_KEY: &str = "originalName";
const NEW_NAME_KEY: &str = "newName";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Updated(CreatureRecord),
    Created(CreatureRecord),
}

impl UpsertOutcome {
    pub fn record(&self) -> &CreatureRecord {
        match self {
            UpsertOutcome::Updated(r) | UpsertOutcome::Created(r) => r,
        }
    }

    pub fn into_record(self) -> CreatureRecord {
        match self {
            UpsertOutcome::Updated(r) | UpsertOutcome::Created(r) => r,
        }
    }
}

/// Canonical names extracted from a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyingNames {
    /// Name of the record to look up.
    pub search: String,
    /// Name the record should carry afterwards.
    pub desired: String,
}

impl IdentifyingNames {
    /// `name` may be a plain string or a `{ "french": ... }` object.
    pub fn from_payload(payload: &Map<String, Value>) -> Option<Self> {
        let name = match payload.get(NAME_KEY) {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(Value::Object(m)) => m.get("french").and_then(Value::as_str),
            _ => None,
        };
        let name = canonical_name_opt(name);
        let original = canonical_name_opt(payload.get(ORIGINAL_NAME_KEY).and_then(Value::as_str));
        let renamed = canonical_name_opt(payload.get(NEW_NAME_KEY).and_then(Value::as_str));

        let search = original.clone().or_else(|| name.clone()).or_else(|| renamed.clone())?;
        let desired = renamed.or(name).or(original)?;
        Some(Self { search, desired })
    }
}

/// Decode `type`/`base` values that arrived as encoded strings.
fn decode_encoded_fields(payload: &mut Map<String, Value>) {
    if let Some(Value::String(raw)) = payload.get("type") {
        let decoded = decode_types(raw);
        payload.insert(
            "type".into(),
            Value::Array(decoded.into_iter().map(Value::String).collect()),
        );
    }
    if let Some(Value::String(raw)) = payload.get("base") {
        let decoded = decode_base(raw);
        payload.insert("base".into(), Value::Object(decoded));
    }
}

pub struct UpsertEngine<'a, S: CreatureStore + ?Sized> {
    store: &'a S,
    assets: &'a AssetResolver,
}

impl<'a, S: CreatureStore + ?Sized> UpsertEngine<'a, S> {
    pub fn new(store: &'a S, assets: &'a AssetResolver) -> Self {
        Self { store, assets }
    }

    /// Update the record named by the payload, or create it.
    ///
    /// A staged upload is promoted to the record's image path on success and
    /// discarded on any failure.
    pub async fn upsert(
        &self,
        payload: Map<String, Value>,
        upload: Option<StagedUpload>,
    ) -> Result<UpsertOutcome, CatalogError> {
        let result = self.upsert_inner(payload, upload.as_ref()).await;
        if let (Err(_), Some(staged)) = (&result, &upload) {
            self.assets.discard(staged).await;
        }
        result
    }

    async fn upsert_inner(
        &self,
        mut payload: Map<String, Value>,
        upload: Option<&StagedUpload>,
    ) -> Result<UpsertOutcome, CatalogError> {
        let names = IdentifyingNames::from_payload(&payload).ok_or_else(|| {
            CatalogError::validation("provide at least a name; refusing to update into the void")
        })?;
        decode_encoded_fields(&mut payload);

        if let Some(existing) = self.store.find_by_name(&names.search).await? {
            let updated = self.update_existing(&existing, &names, &payload, upload).await?;
            return Ok(UpsertOutcome::Updated(updated));
        }

        let id = self.store.next_id().await?;
        let record = self.build_new_record(id, &names, &payload, upload.is_some());
        match self.store.insert(&record).await? {
            InsertOutcome::Inserted => {
                if let Some(staged) = upload {
                    self.attach_created_image(&record, staged).await?;
                }
                info!(id, name = %record.name.french, "creature created");
                Ok(UpsertOutcome::Created(record))
            }
            InsertOutcome::NameTaken => {
                // Lost a creation race for the same name; merge into the winner.
                warn!(id, name = %record.name.french, "name taken during create; retrying as update");
                let winner = self
                    .store
                    .find_by_name(&record.name.french)
                    .await?
                    .ok_or_else(|| {
                        CatalogError::Internal(anyhow::anyhow!(
                            "name {} reported taken but not found",
                            record.name.french
                        ))
                    })?;
                let retry_names = IdentifyingNames {
                    search: winner.name.french.clone(),
                    desired: names.desired.clone(),
                };
                let updated = self
                    .update_existing(&winner, &retry_names, &payload, upload)
                    .await?;
                Ok(UpsertOutcome::Updated(updated))
            }
        }
    }

    async fn update_existing(
        &self,
        existing: &CreatureRecord,
        names: &IdentifyingNames,
        payload: &Map<String, Value>,
        upload: Option<&StagedUpload>,
    ) -> Result<CreatureRecord, CatalogError> {
        let mut source = payload.clone();
        source.remove(ORIGINAL_NAME_KEY);
        source.remove(NEW_NAME_KEY);
        let mut name_fields = match source.remove(NAME_KEY) {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };
        name_fields.insert("french".into(), Value::String(names.desired.clone()));
        source.insert(NAME_KEY.into(), Value::Object(name_fields));
        if upload.is_some() {
            source.insert(
                "image".into(),
                Value::String(self.assets.asset_url(existing.id)),
            );
        }

        let paths = flatten(&source);
        let (patch, ignored) = CreaturePatch::from_paths(&paths);
        if !ignored.is_empty() {
            warn!(id = existing.id, ignored = ?ignored, "ignoring unknown or invalid update paths");
        }

        let updated = match self.store.apply_patch(existing.id, &patch).await? {
            PatchOutcome::Updated(record) => record,
            PatchOutcome::Missing => {
                return Err(CatalogError::not_found(format!(
                    "creature {} disappeared during update",
                    existing.name.french
                )))
            }
            PatchOutcome::NameTaken => {
                return Err(CatalogError::Conflict(format!(
                    "another creature is already named {}",
                    names.desired
                )))
            }
        };

        if let Some(staged) = upload {
            if let Err(e) = self.assets.promote(staged, updated.id).await {
                // The image never landed; put the whole record back as it was.
                if let Err(restore_err) = self.store.restore(existing).await {
                    warn!(id = existing.id, error = %restore_err, "failed to restore record after promotion error");
                }
                return Err(e.into());
            }
        }
        info!(id = updated.id, name = %updated.name.french, "creature updated");
        Ok(updated)
    }

    fn build_new_record(
        &self,
        id: i64,
        names: &IdentifyingNames,
        payload: &Map<String, Value>,
        has_upload: bool,
    ) -> CreatureRecord {
        let other_names = payload.get(NAME_KEY).and_then(Value::as_object);
        let localized = |key: &str| {
            other_names
                .and_then(|m| m.get(key))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        CreatureRecord {
            id,
            name: CreatureName {
                french: names.desired.clone(),
                english: localized("english"),
                japanese: localized("japanese"),
                chinese: localized("chinese"),
            },
            types: payload
                .get("type")
                .and_then(types_from_value)
                .unwrap_or_else(|| vec![UNKNOWN_TYPE.to_string()]),
            base: payload
                .get("base")
                .map(BaseStats::from_loose)
                .unwrap_or_default(),
            image: if has_upload {
                self.assets.asset_url(id)
            } else {
                UNKNOWN_IMAGE.to_string()
            },
        }
    }

    async fn attach_created_image(
        &self,
        record: &CreatureRecord,
        staged: &StagedUpload,
    ) -> Result<(), CatalogError> {
        if let Err(e) = self.assets.promote(staged, record.id).await {
            // Keep the record consistent with what is on disk.
            let reset = CreaturePatch {
                image: Some(UNKNOWN_IMAGE.to_string()),
                ..Default::default()
            };
            if let Err(reset_err) = self.store.apply_patch(record.id, &reset).await {
                warn!(id = record.id, error = %reset_err, "failed to reset image after promotion error");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::db::Db;
    use serde_json::json;

    fn payload(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object payload")
    }

    struct Fixture {
        db: Db,
        assets: AssetResolver,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        async fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                db: Db::connect_memory().await.unwrap(),
                assets: AssetResolver::new(dir.path(), ""),
                _dir: dir,
            }
        }

        fn engine(&self) -> UpsertEngine<'_, Db> {
            UpsertEngine::new(&self.db, &self.assets)
        }
    }

    #[test]
    fn identifying_names_cover_plain_and_rename_payloads() {
        let plain = IdentifyingNames::from_payload(&payload(json!({"name": "pikachu"}))).unwrap();
        assert_eq!(plain.search, "Pikachu");
        assert_eq!(plain.desired, "Pikachu");

        let rename = IdentifyingNames::from_payload(&payload(
            json!({"originalName": "PIKACHU", "newName": "raichu"}),
        ))
        .unwrap();
        assert_eq!(rename.search, "Pikachu");
        assert_eq!(rename.desired, "Raichu");

        let nested =
            IdentifyingNames::from_payload(&payload(json!({"name": {"french": "évoli"}}))).unwrap();
        assert_eq!(nested.search, "Évoli");

        assert!(IdentifyingNames::from_payload(&payload(json!({"type": ["Fire"]}))).is_none());
        assert!(IdentifyingNames::from_payload(&payload(json!({"name": "  "}))).is_none());
        assert!(IdentifyingNames::from_payload(&payload(json!({"name": 12}))).is_none());
    }

    #[tokio::test]
    async fn creates_with_defaults_when_missing() {
        let fx = Fixture::new().await;
        let outcome = fx
            .engine()
            .upsert(payload(json!({"name": "pikachu"})), None)
            .await
            .unwrap();

        let UpsertOutcome::Created(record) = outcome else {
            panic!("expected creation");
        };
        assert_eq!(record.id, 1);
        assert_eq!(record.name.french, "Pikachu");
        assert_eq!(record.types, vec!["unknown"]);
        assert_eq!(record.base, BaseStats::default());
        assert_eq!(record.image, UNKNOWN_IMAGE);
        assert_eq!(fx.db.find_by_name("Pikachu").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn sequential_creations_get_sequential_ids() {
        let fx = Fixture::new().await;
        let names = ["bulbizarre", "herbizarre", "florizarre", "salameche"];
        let mut ids = Vec::new();
        for name in names {
            let outcome = fx
                .engine()
                .upsert(payload(json!({ "name": name })), None)
                .await
                .unwrap();
            assert!(matches!(outcome, UpsertOutcome::Created(_)));
            ids.push(outcome.record().id);
        }
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reused() {
        let fx = Fixture::new().await;
        let engine = fx.engine();
        engine.upsert(payload(json!({"name": "abo"})), None).await.unwrap();
        engine.upsert(payload(json!({"name": "arbok"})), None).await.unwrap();
        assert!(fx.db.delete_by_name("Arbok").await.unwrap());

        let again = engine
            .upsert(payload(json!({"name": "arbok"})), None)
            .await
            .unwrap();
        assert_eq!(again.record().id, 3);
    }

    #[tokio::test]
    async fn creation_takes_partial_base_and_encoded_fields() {
        let fx = Fixture::new().await;
        let record = fx
            .engine()
            .upsert(
                payload(json!({
                    "name": "dracaufeu",
                    "type": "Fire, Flying",
                    "base": "{\"HP\": 78, \"Speed\": \"100\"}"
                })),
                None,
            )
            .await
            .unwrap()
            .into_record();

        assert_eq!(record.types, vec!["Fire", "Flying"]);
        assert_eq!(record.base.hp, 78);
        assert_eq!(record.base.speed, 100);
        assert_eq!(record.base.attack, 0);
    }

    #[tokio::test]
    async fn malformed_encoded_base_is_treated_as_empty() {
        let fx = Fixture::new().await;
        let record = fx
            .engine()
            .upsert(payload(json!({"name": "mew", "base": "{oops"})), None)
            .await
            .unwrap()
            .into_record();
        assert_eq!(record.base, BaseStats::default());
    }

    #[tokio::test]
    async fn rename_preserves_untouched_fields() {
        let fx = Fixture::new().await;
        let engine = fx.engine();
        engine
            .upsert(
                payload(json!({
                    "name": "pikachu",
                    "type": ["Electric"],
                    "base": {"HP": 35, "Speed": 90}
                })),
                None,
            )
            .await
            .unwrap();

        let outcome = engine
            .upsert(
                payload(json!({"originalName": "Pikachu", "newName": "Raichu"})),
                None,
            )
            .await
            .unwrap();
        let UpsertOutcome::Updated(record) = outcome else {
            panic!("expected update");
        };
        assert_eq!(record.id, 1);
        assert_eq!(record.name.french, "Raichu");
        assert_eq!(record.types, vec!["Electric"]);
        assert_eq!(record.base.hp, 35);
        assert_eq!(record.base.speed, 90);
        assert!(fx.db.find_by_name("Pikachu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_update_merges_nested_stats() {
        let fx = Fixture::new().await;
        let engine = fx.engine();
        engine
            .upsert(
                payload(json!({"name": "onix", "base": {"HP": 35, "Defense": 160}})),
                None,
            )
            .await
            .unwrap();

        let record = engine
            .upsert(
                payload(json!({"name": "ONIX", "base": {"HP": 40}, "id": 77, "admin": true})),
                None,
            )
            .await
            .unwrap()
            .into_record();

        assert_eq!(record.id, 1);
        assert_eq!(record.base.hp, 40);
        assert_eq!(record.base.defense, 160);
        assert_eq!(record.name.french, "Onix");
    }

    #[tokio::test]
    async fn missing_name_is_a_validation_error() {
        let fx = Fixture::new().await;
        let err = fx
            .engine()
            .upsert(payload(json!({"type": ["Ghost"]})), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert_eq!(fx.db.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rename_onto_existing_name_conflicts() {
        let fx = Fixture::new().await;
        let engine = fx.engine();
        engine.upsert(payload(json!({"name": "pikachu"})), None).await.unwrap();
        engine.upsert(payload(json!({"name": "raichu"})), None).await.unwrap();

        let err = engine
            .upsert(
                payload(json!({"originalName": "pikachu", "newName": "raichu"})),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[tokio::test]
    async fn upload_on_create_lands_at_new_id() {
        let fx = Fixture::new().await;
        fx.engine().upsert(payload(json!({"name": "abo"})), None).await.unwrap();

        let staged = fx.assets.stage_upload(b"img").await.unwrap();
        let staged_path = staged.path().to_path_buf();
        let record = fx
            .engine()
            .upsert(payload(json!({"name": "arbok"})), Some(staged))
            .await
            .unwrap()
            .into_record();

        assert_eq!(record.id, 2);
        assert_eq!(record.image, "/assets/pokemons/2");
        assert!(!staged_path.exists());
        assert_eq!(std::fs::read(fx.assets.standard_path(2)).unwrap(), b"img");
    }

    #[tokio::test]
    async fn upload_on_update_replaces_image() {
        let fx = Fixture::new().await;
        fx.engine().upsert(payload(json!({"name": "mew"})), None).await.unwrap();

        let staged = fx.assets.stage_upload(b"new-art").await.unwrap();
        let record = fx
            .engine()
            .upsert(payload(json!({"name": "mew"})), Some(staged))
            .await
            .unwrap()
            .into_record();

        assert_eq!(record.image, "/assets/pokemons/1");
        assert_eq!(std::fs::read(fx.assets.standard_path(1)).unwrap(), b"new-art");
    }

    #[tokio::test]
    async fn failed_promotion_on_update_leaves_record_untouched() {
        let fx = Fixture::new().await;
        let before = fx
            .engine()
            .upsert(payload(json!({"name": "pikachu", "base": {"HP": 35}})), None)
            .await
            .unwrap()
            .into_record();
        // A directory squatting on the target path makes the rename fail.
        std::fs::create_dir_all(fx.assets.standard_path(1)).unwrap();

        let staged = fx.assets.stage_upload(b"new-art").await.unwrap();
        let staged_path = staged.path().to_path_buf();
        let err = fx
            .engine()
            .upsert(
                payload(json!({"name": "pikachu", "base": {"HP": 99}, "type": ["Electric"]})),
                Some(staged),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Internal(_)));
        assert_eq!(fx.db.find_by_id(1).await.unwrap(), Some(before));
        assert!(fx.assets.resolve_creature(1).is_none());
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn failed_upsert_discards_staged_upload() {
        let fx = Fixture::new().await;
        let staged = fx.assets.stage_upload(b"orphan").await.unwrap();
        let staged_path = staged.path().to_path_buf();

        let err = fx
            .engine()
            .upsert(payload(json!({"base": {"HP": 1}})), Some(staged))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn concurrent_creations_never_share_an_id() {
        let fx = Fixture::new().await;
        let engine = fx.engine();
        let names: Vec<String> = (0..8).map(|i| format!("creature{i}")).collect();
        let results = futures::future::join_all(
            names
                .iter()
                .map(|n| engine.upsert(payload(json!({ "name": n })), None)),
        )
        .await;

        let mut ids: Vec<i64> = results
            .into_iter()
            .map(|r| r.unwrap().record().id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}
