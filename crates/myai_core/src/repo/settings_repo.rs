//! Persisted key/value settings storage.
//!
//! # Responsibility
//! - Store raw string settings; typing and defaults live in `crate::settings`.

use crate::repo::RepoResult;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

/// Repository interface for raw settings values.
pub trait SettingsRepository {
    fn get_value(&self, key: &str) -> RepoResult<Option<String>>;
    fn set_value(&self, key: &str, value: &str) -> RepoResult<()>;
    /// Removes a key. Returns whether it existed.
    fn remove_value(&self, key: &str) -> RepoResult<bool>;
    fn all_values(&self) -> RepoResult<BTreeMap<String, String>>;
}

/// SQLite-backed settings repository.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn get_value(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1;", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_value(&self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_value(&self, key: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }

    fn all_values(&self) -> RepoResult<BTreeMap<String, String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key ASC;")?;
        let mut rows = stmt.query([])?;
        let mut values = BTreeMap::new();
        while let Some(row) = rows.next()? {
            values.insert(row.get(0)?, row.get(1)?);
        }
        Ok(values)
    }
}
