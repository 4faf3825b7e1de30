//! Class-level default datasets
//!
//! A defaults file supplies per-class property sets and connection lists
//! applied to every record of that class after the full load. Datasets are
//! keyed by class; a dataset without a class attribute targets individual
//! map macros and is ignored here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::gamedata::component::Connection;
use crate::markup::{as_sequence, scalar_to_string};

/// Default property set and connections for one record class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDefault {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    pub origin_file: String,
}

/// Defaults keyed by class name, last write wins
#[derive(Debug, Clone, Default)]
pub struct DefaultStore {
    defaults: HashMap<String, ClassDefault>,
}

impl DefaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ClassDefault>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Insert a class default. A second dataset for the same class
    /// replaces the first; the warning is the only signal.
    pub fn insert(&mut self, default: ClassDefault) {
        if self.defaults.contains_key(&default.class) {
            warn!(
                "Multiple defaults for class {} ({})",
                default.class, default.origin_file
            );
        }
        self.defaults.insert(default.class.clone(), default);
    }

    pub fn get_by_class(&self, class: &str) -> Option<&ClassDefault> {
        self.defaults.get(class)
    }

    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }

    /// Flat record list for snapshot persistence, sorted by class for a
    /// deterministic snapshot
    pub fn snapshot(&self) -> Vec<ClassDefault> {
        let mut records: Vec<ClassDefault> = self.defaults.values().cloned().collect();
        records.sort_by(|a, b| a.class.cmp(&b.class));
        records
    }

    pub fn log_summary(&self) {
        info!("Loaded {} defaults", self.len());
    }
}

/// Extract all `defaults.dataset` records from one parsed file
pub fn ingest_defaults(store: &mut DefaultStore, file_name: &str, doc: &Value) {
    let Some(defaults) = doc.get("defaults") else {
        return;
    };

    for xml in as_sequence(defaults.get("dataset")) {
        let Some(class) = xml.get("class").and_then(scalar_to_string) else {
            // Datasets without a class target specific macros (map content)
            continue;
        };

        let connections = as_sequence(xml.get("connections").and_then(|c| c.get("connection")))
            .into_iter()
            .map(Connection::from_value)
            .collect();

        let properties = xml.get("properties").filter(|p| p.is_object()).cloned();

        store.insert(ClassDefault {
            class,
            properties,
            connections,
            origin_file: file_name.to_string(),
        });
    }
}
