//! Schema persistence: the store trait and a file-backed implementation.

use std::fs;
use std::path::PathBuf;

use strand_core::{Result, Schema};

/// Trait for schema persistence backends.
pub trait SchemaStore: Send + Sync {
    /// Load the persisted schema. A store that was never written yields an
    /// empty schema.
    fn load(&self) -> Result<Schema>;

    /// Replace the persisted schema.
    fn save(&self, schema: &Schema) -> Result<()>;
}

/// Stores the schema as one pretty-printed JSON document.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash never leaves a half-written schema behind.
pub struct FileSchemaStore {
    path: PathBuf,
}

impl FileSchemaStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SchemaStore for FileSchemaStore {
    fn load(&self) -> Result<Schema> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "No persisted schema, starting empty");
            return Ok(Schema::default());
        }
        let json = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn save(&self, schema: &Schema) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(schema)?;
        let tmp = self.temp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            things = schema.things.classes.len(),
            actions = schema.actions.classes.len(),
            "Schema saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::{Class, DataType};

    #[test]
    fn missing_file_loads_empty_schema() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSchemaStore::new(dir.path().join("schema.json"));
        assert_eq!(store.load().unwrap(), Schema::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSchemaStore::new(dir.path().join("nested/schema.json"));

        let mut schema = Schema::default();
        schema
            .things
            .classes
            .push(Class::new("City").with_property("name", DataType::String, true));
        store.save(&schema).unwrap();

        assert_eq!(store.load().unwrap(), schema);
        assert!(!dir.path().join("nested/schema.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(FileSchemaStore::new(path).load().is_err());
    }
}
