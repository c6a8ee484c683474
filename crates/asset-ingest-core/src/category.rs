use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::IngestError;

/// Remote category identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CategoryId(pub u64);

impl CategoryId {
    /// Accepts a positive JSON number or a numeric string.
    /// Whole floats such as `42.0` count as integers.
    /// Empty, zero and non-numeric values are not valid ids.
    fn from_json(value: &Value) -> Option<Self> {
        let id = match value {
            Value::Number(n) => match n.as_u64() {
                Some(id) => id,
                None => whole_f64(n.as_f64()?)?,
            },
            Value::String(s) => s.trim().parse::<u64>().ok()?,
            _ => return None,
        };
        (id > 0).then_some(CategoryId(id))
    }
}

fn whole_f64(f: f64) -> Option<u64> {
    (f.fract() == 0.0 && f > 0.0 && f < u64::MAX as f64).then_some(f as u64)
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Directory name -> category id mapping, read once at startup.
///
/// Persisted as a flat JSON object, e.g. `{"Invoices": 42, "Banners": "7"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryMap {
    entries: HashMap<String, CategoryId>,
}

impl CategoryMap {
    /// Build a map from in-memory entries.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, CategoryId)>,
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Parse the persisted JSON document.
    ///
    /// Entries with an unusable key or value are skipped with a warning;
    /// a document that is not a JSON object is an error.
    pub fn from_json(text: &str) -> Result<Self, IngestError> {
        let doc: Value = serde_json::from_str(text)
            .map_err(|e| IngestError::Config(format!("Invalid category map JSON: {}", e)))?;

        let Value::Object(obj) = doc else {
            return Err(IngestError::Config(
                "Category map must be a JSON object".to_string(),
            ));
        };

        let mut entries = HashMap::with_capacity(obj.len());
        for (dir, value) in obj {
            if dir.is_empty() || dir.contains(['/', '\\']) {
                warn!("Skipping category map key '{}': not a simple directory name", dir);
                continue;
            }
            match CategoryId::from_json(&value) {
                Some(id) => {
                    entries.insert(dir, id);
                }
                None => warn!("Skipping category map entry '{}': invalid id {}", dir, value),
            }
        }

        Ok(Self { entries })
    }

    /// Load the map from disk.
    ///
    /// A missing file is created as `{}` and yields an empty map.
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        if !path.exists() {
            info!("Category map {} not found, creating an empty one", path.display());
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    IngestError::Config(format!(
                        "Failed to create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            std::fs::write(path, "{}").map_err(|e| {
                IngestError::Config(format!("Failed to create {}: {}", path.display(), e))
            })?;
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    /// Like [`CategoryMap::load`], but degrades to an empty map on error.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(map) => {
                info!("Loaded {} category mapping(s) from {}", map.len(), path.display());
                map
            }
            Err(e) => {
                warn!("{}; continuing with an empty category map", e);
                Self::default()
            }
        }
    }

    /// Category for a directory name, `None` if unmapped.
    pub fn resolve(&self, directory_name: &str) -> Option<CategoryId> {
        self.entries.get(directory_name).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_numbers_and_numeric_strings() {
        let map = CategoryMap::from_json(r#"{"Invoices": 42, "Banners": "7"}"#).unwrap();
        assert_eq!(map.resolve("Invoices"), Some(CategoryId(42)));
        assert_eq!(map.resolve("Banners"), Some(CategoryId(7)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_whole_floats_are_accepted() {
        let map = CategoryMap::from_json(r#"{"Invoices": 42.0, "Half": 4.5, "Tiny": 0.0}"#)
            .unwrap();
        assert_eq!(map.resolve("Invoices"), Some(CategoryId(42)));
        assert_eq!(map.resolve("Half"), None);
        assert_eq!(map.resolve("Tiny"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let map = CategoryMap::from_json(r#"{"Invoices": 42}"#).unwrap();
        assert_eq!(map.resolve("invoices"), None);
    }

    #[test]
    fn test_invalid_entries_are_skipped() {
        let map = CategoryMap::from_json(
            r#"{
                "Ok": 1,
                "Empty": "",
                "Zero": 0,
                "Negative": -3,
                "Word": "abc",
                "Null": null,
                "List": [1],
                "a/b": 5
            }"#,
        )
        .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.resolve("Ok"), Some(CategoryId(1)));
        assert_eq!(map.resolve("Zero"), None);
        assert_eq!(map.resolve("a/b"), None);
    }

    #[test]
    fn test_non_object_is_config_error() {
        assert!(matches!(
            CategoryMap::from_json("[1, 2]"),
            Err(IngestError::Config(_))
        ));
        assert!(matches!(
            CategoryMap::from_json("{not json"),
            Err(IngestError::Config(_))
        ));
    }

    #[test]
    fn test_load_creates_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pasta_map.json");

        let map = CategoryMap::load(&path).unwrap();
        assert!(map.is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_load_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pasta_map.json");
        std::fs::write(&path, r#"{"Invoices": "42"}"#).unwrap();

        let map = CategoryMap::load(&path).unwrap();
        assert_eq!(map.resolve("Invoices"), Some(CategoryId(42)));
    }

    #[test]
    fn test_load_or_empty_degrades_on_malformed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("pasta_map.json");
        std::fs::write(&path, "{ broken").unwrap();

        assert!(CategoryMap::load(&path).is_err());
        assert!(CategoryMap::load_or_empty(&path).is_empty());
        // The malformed file is left for the operator to fix
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ broken");
    }
}
