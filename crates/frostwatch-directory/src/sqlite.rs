//! SQLite-backed mirror.
//!
//! One row per device token; the token's locations are stored as a JSON
//! array so a per-token write is a single-row upsert.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;

use frostwatch_core::{DeviceToken, Location, MirrorError, RusqliteErrorExt};

use crate::mirror::{Entries, LoadedDirectory, MirrorResult, RemoteMirror};

/// SQLite mirror. Statements run on the blocking pool so the caller's
/// timeout can fire while the connection is busy.
pub struct SqliteMirror {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMirror {
    /// Open (or create) the mirror database at the given path.
    ///
    /// Creates parent directories and the schema if they don't exist.
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let mirror = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        mirror.init_schema()?;
        tracing::info!("Opened SQLite mirror at {}", path.display());
        Ok(mirror)
    }

    /// Create an in-memory mirror (for testing).
    #[cfg(test)]
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mirror = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        mirror.init_schema()?;
        Ok(mirror)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS device_locations (
                token TEXT PRIMARY KEY,
                locations TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Number of stored tokens.
    pub fn count(&self) -> MirrorResult<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM device_locations", [], |row| row.get(0))
            .map_err(|e| e.into_mirror_error())?;
        Ok(count as usize)
    }
}

fn read_rows(conn: &Connection) -> MirrorResult<Vec<(String, String)>> {
    let mut stmt = conn
        .prepare("SELECT token, locations FROM device_locations ORDER BY token")
        .map_err(|e| e.into_mirror_error())?;

    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| e.into_mirror_error())?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.into_mirror_error())
}

fn upsert_row(conn: &Connection, token: &str, locations_json: &str) -> MirrorResult<()> {
    conn.execute(
        r#"
        INSERT INTO device_locations (token, locations, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(token) DO UPDATE SET
            locations = excluded.locations,
            updated_at = excluded.updated_at
        "#,
        params![token, locations_json, Utc::now().to_rfc3339()],
    )
    .map_err(|e| e.into_mirror_error())?;
    Ok(())
}

#[async_trait]
impl RemoteMirror for SqliteMirror {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load_all(&self) -> MirrorResult<LoadedDirectory> {
        let conn = Arc::clone(&self.conn);
        let rows = tokio::task::spawn_blocking(move || read_rows(&conn.lock()))
            .await
            .map_err(|e| MirrorError::unavailable(format!("load task failed: {}", e)))??;

        let mut entries = Entries::new();
        for (token, locations_json) in rows {
            let locations: Vec<Location> = serde_json::from_str(&locations_json).map_err(|e| {
                MirrorError::corrupt(format!("locations for token {}: {}", token, e))
            })?;
            entries.insert(DeviceToken::new(token), locations);
        }

        tracing::debug!("Loaded {} tokens from SQLite mirror", entries.len());
        Ok(LoadedDirectory { entries })
    }

    async fn save_one(&self, token: &DeviceToken, locations: &[Location]) -> MirrorResult<()> {
        let locations_json = serde_json::to_string(locations)
            .map_err(|e| MirrorError::Other(anyhow::anyhow!("encode locations: {}", e)))?;

        let conn = Arc::clone(&self.conn);
        let key = token.as_str().to_string();
        tokio::task::spawn_blocking(move || upsert_row(&conn.lock(), &key, &locations_json))
            .await
            .map_err(|e| MirrorError::unavailable(format!("save task failed: {}", e)))??;

        tracing::debug!("Mirrored {} locations for token {}", locations.len(), token);
        Ok(())
    }
}
