//! SQLite-backed `CreatureStore`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{types::Json, QueryBuilder, Sqlite};
use tracing::{debug, instrument};

use crate::catalog::model::{BaseStats, CreatureName, CreaturePatch, CreatureRecord};
use crate::catalog::store::{CreatureStore, InsertOutcome, PatchOutcome};
use crate::database_ops::db::Db;

const SEQUENCE: &str = "creatures";

#[derive(Debug, sqlx::FromRow)]
struct CreatureRow {
    id: i64,
    name_french: String,
    name_english: Option<String>,
    name_japanese: Option<String>,
    name_chinese: Option<String>,
    types: Json<Vec<String>>,
    hp: i64,
    attack: i64,
    defense: i64,
    special_attack: i64,
    special_defense: i64,
    speed: i64,
    image: String,
}

impl From<CreatureRow> for CreatureRecord {
    fn from(row: CreatureRow) -> Self {
        CreatureRecord {
            id: row.id,
            name: CreatureName {
                french: row.name_french,
                english: row.name_english,
                japanese: row.name_japanese,
                chinese: row.name_chinese,
            },
            types: row.types.0,
            base: BaseStats {
                hp: row.hp,
                attack: row.attack,
                defense: row.defense,
                special_attack: row.special_attack,
                special_defense: row.special_defense,
                speed: row.speed,
            },
            image: row.image,
        }
    }
}

/// Lowercased copy of the canonical name used for substring search.
fn search_key(name_french: &str) -> String {
    name_french.to_lowercase()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

const INSERT_COLUMNS: &str = "INSERT INTO creatures (id, name_french, name_search, name_english, name_japanese, name_chinese, types, hp, attack, defense, special_attack, special_defense, speed, image) ";

fn push_record_values(qb: &mut QueryBuilder<'_, Sqlite>, record: &CreatureRecord) {
    qb.push_values(std::iter::once(record), |mut b, r| {
        b.push_bind(r.id)
            .push_bind(r.name.french.clone())
            .push_bind(search_key(&r.name.french))
            .push_bind(r.name.english.clone())
            .push_bind(r.name.japanese.clone())
            .push_bind(r.name.chinese.clone())
            .push_bind(Json(r.types.clone()))
            .push_bind(r.base.hp)
            .push_bind(r.base.attack)
            .push_bind(r.base.defense)
            .push_bind(r.base.special_attack)
            .push_bind(r.base.special_defense)
            .push_bind(r.base.speed)
            .push_bind(r.image.clone());
    });
}

impl Db {
    /// Insert or overwrite a record keeping its id. Used by bulk import.
    #[instrument(skip(self, record), fields(id = record.id))]
    pub async fn import_record(&self, record: &CreatureRecord) -> Result<()> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(INSERT_COLUMNS);
        push_record_values(&mut qb, record);
        qb.push(
            " ON CONFLICT (id) DO UPDATE SET
                name_french = excluded.name_french,
                name_search = excluded.name_search,
                name_english = excluded.name_english,
                name_japanese = excluded.name_japanese,
                name_chinese = excluded.name_chinese,
                types = excluded.types,
                hp = excluded.hp,
                attack = excluded.attack,
                defense = excluded.defense,
                special_attack = excluded.special_attack,
                special_defense = excluded.special_defense,
                speed = excluded.speed,
                image = excluded.image",
        );
        qb.build()
            .execute(&self.pool)
            .await
            .with_context(|| format!("import of creature {} failed", record.id))?;
        Ok(())
    }

    /// Advance the id sequence past every stored id. Returns the new high-water mark.
    pub async fn sync_id_sequence(&self) -> Result<i64> {
        let value: i64 = sqlx::query_scalar(
            "UPDATE id_sequences
                SET value = MAX(value, (SELECT COALESCE(MAX(id), 0) FROM creatures))
              WHERE name = ?
          RETURNING value",
        )
        .bind(SEQUENCE)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }
}

#[async_trait]
impl CreatureStore for Db {
    async fn find_by_name(&self, name_french: &str) -> Result<Option<CreatureRecord>> {
        let row = sqlx::query_as::<_, CreatureRow>("SELECT * FROM creatures WHERE name_french = ?")
            .bind(name_french)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<CreatureRecord>> {
        let row = sqlx::query_as::<_, CreatureRow>("SELECT * FROM creatures WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<CreatureRecord>> {
        let rows = sqlx::query_as::<_, CreatureRow>(
            "SELECT * FROM creatures ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM creatures")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn search_names(&self, needle: &str) -> Result<Vec<CreatureRecord>> {
        let rows = sqlx::query_as::<_, CreatureRow>(
            "SELECT * FROM creatures WHERE instr(name_search, ?) > 0 ORDER BY id",
        )
        .bind(needle.to_lowercase())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn next_id(&self) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "UPDATE id_sequences SET value = value + 1 WHERE name = ? RETURNING value",
        )
        .bind(SEQUENCE)
        .fetch_one(&self.pool)
        .await
        .context("id sequence missing")?;
        Ok(id)
    }

    async fn insert(&self, record: &CreatureRecord) -> Result<InsertOutcome> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(INSERT_COLUMNS);
        push_record_values(&mut qb, record);
        qb.push(" ON CONFLICT (name_french) DO NOTHING");
        let done = qb.build().execute(&self.pool).await?;
        if done.rows_affected() == 0 {
            debug!(name = %record.name.french, "insert skipped: name already taken");
            return Ok(InsertOutcome::NameTaken);
        }
        Ok(InsertOutcome::Inserted)
    }

    async fn apply_patch(&self, id: i64, patch: &CreaturePatch) -> Result<PatchOutcome> {
        if patch.is_empty() {
            return Ok(match self.find_by_id(id).await? {
                Some(record) => PatchOutcome::Updated(record),
                None => PatchOutcome::Missing,
            });
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("UPDATE creatures SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(v) = &patch.name_french {
                set.push("name_french = ").push_bind_unseparated(v.clone());
                set.push("name_search = ").push_bind_unseparated(search_key(v));
            }
            if let Some(v) = &patch.name_english {
                set.push("name_english = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.name_japanese {
                set.push("name_japanese = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.name_chinese {
                set.push("name_chinese = ").push_bind_unseparated(v.clone());
            }
            if let Some(v) = &patch.types {
                set.push("types = ").push_bind_unseparated(Json(v.clone()));
            }
            for (stat, value) in &patch.stats {
                set.push(format!("{} = ", stat.column()))
                    .push_bind_unseparated(*value);
            }
            if let Some(v) = &patch.image {
                set.push("image = ").push_bind_unseparated(v.clone());
            }
        }
        qb.push(" WHERE id = ").push_bind(id).push(" RETURNING *");

        match qb
            .build_query_as::<CreatureRow>()
            .fetch_optional(&self.pool)
            .await
        {
            Ok(Some(row)) => Ok(PatchOutcome::Updated(row.into())),
            Ok(None) => Ok(PatchOutcome::Missing),
            Err(e) if is_unique_violation(&e) => Ok(PatchOutcome::NameTaken),
            Err(e) => Err(e.into()),
        }
    }

    async fn restore(&self, record: &CreatureRecord) -> Result<()> {
        sqlx::query(
            "UPDATE creatures
                SET name_french = ?, name_search = ?, name_english = ?, name_japanese = ?,
                    name_chinese = ?, types = ?, hp = ?, attack = ?, defense = ?,
                    special_attack = ?, special_defense = ?, speed = ?, image = ?
              WHERE id = ?",
        )
        .bind(record.name.french.clone())
        .bind(search_key(&record.name.french))
        .bind(record.name.english.clone())
        .bind(record.name.japanese.clone())
        .bind(record.name.chinese.clone())
        .bind(Json(record.types.clone()))
        .bind(record.base.hp)
        .bind(record.base.attack)
        .bind(record.base.defense)
        .bind(record.base.special_attack)
        .bind(record.base.special_defense)
        .bind(record.base.speed)
        .bind(record.image.clone())
        .bind(record.id)
        .execute(&self.pool)
        .await
        .with_context(|| format!("restore of creature {} failed", record.id))?;
        Ok(())
    }

    async fn delete_by_name(&self, name_french: &str) -> Result<bool> {
        let done = sqlx::query("DELETE FROM creatures WHERE name_french = ?")
            .bind(name_french)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}
