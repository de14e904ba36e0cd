//! Tool catalog store client.
//!
//! Descriptors live in a single SQLite table (`tools(name, descriptor)`)
//! with the descriptor document stored as JSON. The connection is opened
//! lazily on first use and the handle is reused for the life of the store.
//! Lookups are never retried; an unreachable store surfaces as
//! [`StoreError::Unavailable`].

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::StoreConfig;

/// Metadata document describing one tool. Immutable after lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub tool_name: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub output_schema: Value,
}

fn default_description() -> String {
    "No description available".to_string()
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),
    #[error("catalog query failed: {0}")]
    Query(String),
    #[error("descriptor for '{0}' is not valid JSON: {1}")]
    Corrupt(String, String),
}

/// Catalog store handle. Owned by the application root and shared by
/// reference; never a hidden global.
pub struct CatalogStore {
    db_path: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl CatalogStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            db_path: config.db_path.clone(),
            conn: Mutex::new(None),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` against the lazily opened connection.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))?;

        if guard.is_none() {
            if let Some(parent) = self.db_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
            let conn = Connection::open(&self.db_path)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS tools (
                    name TEXT PRIMARY KEY,
                    descriptor TEXT NOT NULL
                )",
                [],
            )
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            tracing::debug!(path = %self.db_path.display(), "Catalog store opened");
            *guard = Some(conn);
        }

        let conn = guard.as_ref().unwrap_or_else(|| unreachable!());
        f(conn).map_err(|e| StoreError::Query(e.to_string()))
    }

    /// All tool names, sorted.
    pub fn get_all_tool_names(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM tools ORDER BY name")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
    }

    /// Descriptor for one tool, or None when absent.
    pub fn get_tool_details(&self, tool_name: &str) -> Result<Option<ToolDescriptor>, StoreError> {
        let doc: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT descriptor FROM tools WHERE name = ?1",
                [tool_name],
                |row| row.get(0),
            )
            .optional()
        })?;

        match doc {
            None => Ok(None),
            Some(raw) => {
                let descriptor: ToolDescriptor = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Corrupt(tool_name.to_string(), e.to_string()))?;
                Ok(Some(descriptor))
            }
        }
    }

    /// Insert or replace a descriptor.
    pub fn upsert_tool(&self, descriptor: &ToolDescriptor) -> Result<(), StoreError> {
        let doc = serde_json::to_string(descriptor)
            .map_err(|e| StoreError::Corrupt(descriptor.tool_name.clone(), e.to_string()))?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tools (name, descriptor) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET descriptor = excluded.descriptor",
                rusqlite::params![descriptor.tool_name, doc],
            )
            .map(|_| ())
        })
    }

    /// Seed the catalog from a JSON file holding an array of descriptors.
    /// Returns the number of descriptors imported.
    pub fn import_file(&self, path: &Path) -> Result<usize, StoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let descriptors: Vec<ToolDescriptor> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Corrupt(path.display().to_string(), e.to_string()))?;
        for descriptor in &descriptors {
            self.upsert_tool(descriptor)?;
        }
        tracing::info!(count = descriptors.len(), "Catalog import completed");
        Ok(descriptors.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_store() -> (tempfile::TempDir, CatalogStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(&StoreConfig {
            db_path: dir.path().join("catalog.db"),
        });
        (dir, store)
    }

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor {
            tool_name: name.to_string(),
            description: "test tool".to_string(),
            version: 1,
            input_schema: json!({
                "properties": { "q": { "type": "string" } },
                "required": ["q"],
            }),
            output_schema: json!({}),
        }
    }

    #[test]
    fn lookup_of_missing_tool_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.get_tool_details("NoSuchTool").unwrap().is_none());
    }

    #[test]
    fn upsert_then_lookup_round_trips() {
        let (_dir, store) = temp_store();
        store.upsert_tool(&descriptor("EchoTool")).unwrap();
        let found = store.get_tool_details("EchoTool").unwrap().unwrap();
        assert_eq!(found.tool_name, "EchoTool");
        assert_eq!(found.input_schema["required"][0], "q");
    }

    #[test]
    fn names_come_back_sorted() {
        let (_dir, store) = temp_store();
        store.upsert_tool(&descriptor("Zeta")).unwrap();
        store.upsert_tool(&descriptor("Alpha")).unwrap();
        store.upsert_tool(&descriptor("Mid")).unwrap();
        assert_eq!(store.get_all_tool_names().unwrap(), vec!["Alpha", "Mid", "Zeta"]);
    }

    #[test]
    fn import_file_seeds_descriptors() {
        let (dir, store) = temp_store();
        let file = dir.path().join("seed.json");
        std::fs::write(
            &file,
            serde_json::to_string(&vec![descriptor("A"), descriptor("B")]).unwrap(),
        )
        .unwrap();
        assert_eq!(store.import_file(&file).unwrap(), 2);
        assert_eq!(store.get_all_tool_names().unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn descriptor_defaults_fill_missing_fields() {
        let descriptor: ToolDescriptor =
            serde_json::from_value(json!({ "tool_name": "Bare" })).unwrap();
        assert_eq!(descriptor.version, 1);
        assert_eq!(descriptor.description, "No description available");
        assert!(descriptor.input_schema.is_null());
    }
}
