use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, sqlite::SqliteRow, Pool, Row, Sqlite};
use uuid::Uuid;

use super::{ConflictError, GraphStore, NodeRecord};
use crate::models::Kind;

const SELECT_NODE: &str = "SELECT id, kind, key, data FROM nodes";

fn map_node_row(row: &SqliteRow) -> Result<NodeRecord> {
    let id: String = row.get("id");
    let kind: String = row.get("kind");
    let data: String = row.get("data");
    Ok(NodeRecord {
        id: Uuid::parse_str(&id).with_context(|| format!("Invalid node id {}", id))?,
        kind: kind.parse()?,
        key: row.get("key"),
        data: serde_json::from_str(&data).context("Invalid node data")?,
    })
}

/// SQLite-backed node store. One `nodes` table, unique on (kind, key).
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::with_pool_size(db_path, 5).await
    }

    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    async fn update_by_id(&self, record: &NodeRecord) -> Result<bool> {
        let result = sqlx::query("UPDATE nodes SET key = ?, data = ?, updated_at = ? WHERE id = ? AND kind = ?")
            .bind(&record.key)
            .bind(serde_json::to_string(&record.data)?)
            .bind(Utc::now())
            .bind(record.id.to_string())
            .bind(record.kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert(&self, record: &NodeRecord) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        let data = serde_json::to_string(&record.data).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        sqlx::query(
            r#"INSERT INTO nodes (id, kind, key, data, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.kind.as_str())
        .bind(&record.key)
        .bind(data)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GraphStore for SqliteStore {
    async fn create(&self, mut record: NodeRecord, allow_upsert: bool) -> Result<NodeRecord> {
        if let Some(stored) = self.get(record.kind, &record.key).await? {
            if !allow_upsert {
                return Err(ConflictError::new(record.kind, &record.key).into());
            }
            record.id = stored.id;
            self.update_by_id(&record).await?;
            return Ok(record);
        }

        if self.update_by_id(&record).await? {
            return Ok(record);
        }

        match self.insert(&record).await {
            Ok(()) => Ok(record),
            // Lost a race against a concurrent batch member on the same key
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                if !allow_upsert {
                    return Err(ConflictError::new(record.kind, &record.key).into());
                }
                let stored = self
                    .get(record.kind, &record.key)
                    .await?
                    .context("Node vanished after unique violation")?;
                record.id = stored.id;
                self.update_by_id(&record).await?;
                Ok(record)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, kind: Kind, key: &str) -> Result<Option<NodeRecord>> {
        let row = sqlx::query(&format!("{} WHERE kind = ? AND key = ?", SELECT_NODE))
            .bind(kind.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_node_row).transpose()
    }

    async fn get_by_id(&self, kind: Kind, id: Uuid) -> Result<Option<NodeRecord>> {
        let row = sqlx::query(&format!("{} WHERE kind = ? AND id = ?", SELECT_NODE))
            .bind(kind.as_str())
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_node_row).transpose()
    }

    async fn list(&self, kind: Kind) -> Result<Vec<NodeRecord>> {
        let rows = sqlx::query(&format!("{} WHERE kind = ? ORDER BY rowid ASC", SELECT_NODE))
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(map_node_row).collect()
    }
}
