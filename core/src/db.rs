use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, params};
use tracing::{debug, warn};

use crate::models::{Record, Theme, Unit};

pub const RECORDS_SLOT: &str = "sugar_track_pro_db";
pub const THEME_SLOT: &str = "sugar_track_theme";
pub const UNIT_SLOT: &str = "sugar_track_default_unit";

/// Local key-value storage: one row per named slot, each holding a single
/// string value.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv_slots (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Raw slots ---

    pub fn set_slot(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO kv_slots (key, value, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("Failed to write slot '{key}'"))?;
        Ok(())
    }

    pub fn get_slot(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv_slots WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete_slot(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM kv_slots WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    // --- Typed slots ---

    /// Load the record collection. A missing or unreadable document yields an
    /// empty collection.
    pub fn load_records(&self) -> Result<Vec<Record>> {
        let Some(raw) = self.get_slot(RECORDS_SLOT)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Record>>(&raw) {
            Ok(records) => {
                debug!(count = records.len(), "loaded records");
                Ok(records)
            }
            Err(e) => {
                warn!(error = %e, "stored records could not be parsed, starting empty");
                Ok(Vec::new())
            }
        }
    }

    pub fn save_records(&self, records: &[Record]) -> Result<()> {
        let json = serde_json::to_string(records).context("Failed to serialize records")?;
        self.set_slot(RECORDS_SLOT, &json)?;
        debug!(count = records.len(), "persisted records");
        Ok(())
    }

    pub fn load_theme(&self) -> Result<Theme> {
        Ok(self.load_scalar(THEME_SLOT)?.unwrap_or_default())
    }

    pub fn save_theme(&self, theme: Theme) -> Result<()> {
        self.set_slot(THEME_SLOT, theme.as_str())
    }

    pub fn load_default_unit(&self) -> Result<Unit> {
        Ok(self.load_scalar(UNIT_SLOT)?.unwrap_or_default())
    }

    pub fn save_default_unit(&self, unit: Unit) -> Result<()> {
        self.set_slot(UNIT_SLOT, unit.as_str())
    }

    fn load_scalar<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: std::str::FromStr<Err = anyhow::Error>,
    {
        let Some(raw) = self.get_slot(key)? else {
            return Ok(None);
        };
        match raw.parse::<T>() {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!(slot = key, error = %e, "ignoring unreadable preference");
                Ok(None)
            }
        }
    }
}
