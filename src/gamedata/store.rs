//! Record store with duplicate chaining
//!
//! All game records share one lookup discipline: a unique name, a class
//! bucket, and a first-seen-wins duplicate policy. The store owns both
//! indexes (by-name and by-class) as private state; records are addressed
//! by handle (their insertion index) so resolved references can be held
//! without lifetimes or repeated lookups.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

/// Handle of a record within its owning store
pub type RecordId = usize;

/// Behavior every stored record kind provides
pub trait Record {
    fn name(&self) -> &str;
    fn class(&self) -> &str;
    fn origin_file(&self) -> &str;
    /// Chain a later same-name definition onto this canonical record
    fn push_duplicate(&mut self, duplicate: Self);
}

/// A class name together with its canonical record count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    pub name: String,
    pub count: usize,
}

/// Name- and class-indexed storage for one record kind
#[derive(Debug, Clone)]
pub struct RecordStore<R> {
    records: Vec<R>,
    by_name: HashMap<String, RecordId>,
    by_class: HashMap<String, Vec<RecordId>>,
    class_order: Vec<String>,
}

impl<R> Default for RecordStore<R> {
    fn default() -> Self {
        RecordStore {
            records: Vec::new(),
            by_name: HashMap::new(),
            by_class: HashMap::new(),
            class_order: Vec::new(),
        }
    }
}

impl<R: Record> RecordStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a flat record list (snapshot restore)
    pub fn from_records(records: Vec<R>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Insert a record. A record whose name is already present does not
    /// replace the canonical one; it is chained into its `duplicates` and
    /// a warning names the record and its originating file. Only canonical
    /// records enter the class index.
    pub fn insert(&mut self, record: R) {
        if let Some(&id) = self.by_name.get(record.name()) {
            warn!("Duplicate {} ({})", record.name(), record.origin_file());
            self.records[id].push_duplicate(record);
            return;
        }

        let id = self.records.len();
        self.by_name.insert(record.name().to_string(), id);
        match self.by_class.entry(record.class().to_string()) {
            Entry::Occupied(e) => e.into_mut().push(id),
            Entry::Vacant(e) => {
                self.class_order.push(record.class().to_string());
                e.insert(vec![id]);
            }
        }
        self.records.push(record);
    }

    pub fn get_by_name(&self, name: &str) -> Option<&R> {
        self.by_name.get(name).map(|&id| &self.records[id])
    }

    pub fn id_by_name(&self, name: &str) -> Option<RecordId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: RecordId) -> &R {
        &self.records[id]
    }

    pub fn get_mut(&mut self, id: RecordId) -> &mut R {
        &mut self.records[id]
    }

    /// Canonical records of the requested classes, as a union in request
    /// order. A class with no records contributes nothing.
    pub fn of_type<S: AsRef<str>>(&self, classes: &[S]) -> Vec<&R> {
        self.ids_of_type(classes)
            .into_iter()
            .map(|id| &self.records[id])
            .collect()
    }

    pub fn ids_of_type<S: AsRef<str>>(&self, classes: &[S]) -> Vec<RecordId> {
        classes
            .iter()
            .flat_map(|class| {
                self.by_class
                    .get(class.as_ref())
                    .map(Vec::as_slice)
                    .unwrap_or(&[])
                    .iter()
                    .copied()
            })
            .collect()
    }

    /// All known classes with their canonical record counts, in first-seen
    /// order.
    pub fn types(&self) -> Vec<TypeCount> {
        self.class_order
            .iter()
            .map(|name| TypeCount {
                name: name.clone(),
                count: self.by_class.get(name).map(Vec::len).unwrap_or(0),
            })
            .collect()
    }

    pub fn class_count(&self) -> usize {
        self.class_order.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Canonical records in insertion order (snapshot write, search)
    pub fn records(&self) -> &[R] {
        &self.records
    }
}
