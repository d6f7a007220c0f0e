use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Row, SqlitePool,
};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

/// Bootstrap schema, applied in order and recorded in `_schema_migrations`.
const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "creatures",
    include_str!("../../migrations/0001_creatures.sql"),
)];

#[derive(Clone)]
pub struct Db {
    pub pool: SqlitePool,
}

impl Db {
    /// Open (creating if needed) the store at `database_url` and apply the schema.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| "invalid sqlite database URL")?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await
            .context("failed to open sqlite pool")?;
        info!("connected to db");

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Private in-memory store on a single pinned connection. Used by tests and dry runs.
    pub async fn connect_memory() -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_options)
            .await
            .context("failed to open in-memory sqlite")?;
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Cheap connectivity probe for health checks.
    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT,
                installed_at TEXT DEFAULT CURRENT_TIMESTAMP
             )",
        )
        .execute(pool)
        .await?;

        let applied: HashSet<i64> = sqlx::query("SELECT version FROM _schema_migrations")
            .fetch_all(pool)
            .await?
            .iter()
            .map(|r| r.try_get::<i64, _>(0))
            .collect::<Result<_, _>>()?;

        for &(version, desc, sql) in MIGRATIONS {
            if applied.contains(&version) {
                continue;
            }
            info!(version, desc, "applying migration");
            let mut tx = pool.begin().await?;
            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {version} ({desc}) failed"))?;
            sqlx::query("INSERT INTO _schema_migrations (version, description) VALUES (?, ?)")
                .bind(version)
                .bind(desc)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = Db::connect_memory().await.unwrap();
        Db::run_migrations(&db.pool).await.unwrap();

        let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _schema_migrations")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(versions, MIGRATIONS.len() as i64);
        assert!(db.ping().await);
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("pokedex.db").display());

        let db = Db::connect(&url, 2).await.unwrap();
        sqlx::query("UPDATE id_sequences SET value = 41 WHERE name = 'creatures'")
            .execute(&db.pool)
            .await
            .unwrap();
        db.pool.close().await;

        let reopened = Db::connect(&url, 2).await.unwrap();
        let value: i64 =
            sqlx::query_scalar("SELECT value FROM id_sequences WHERE name = 'creatures'")
                .fetch_one(&reopened.pool)
                .await
                .unwrap();
        assert_eq!(value, 41);
    }
}
