//! Component records
//!
//! Components describe the physical side of game objects: geometry plus a
//! set of named, tagged connection points. Macros reference them by name
//! and get the full record embedded during resolution.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::gamedata::defaults::DefaultStore;
use crate::gamedata::store::{Record, RecordStore};
use crate::markup::{as_sequence, scalar_to_string, value_f64};

/// An inline connection point on a component (or supplied by a class
/// default)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Space-separated tag list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<f64>,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_expr: Option<String>,
}

impl Connection {
    pub fn from_value(value: &Value) -> Connection {
        Connection {
            name: value.get("name").and_then(scalar_to_string),
            group: value.get("group").and_then(scalar_to_string),
            tags: value.get("tags").and_then(scalar_to_string),
            value: value.get("value").and_then(value_f64),
            optional: value.get("optional").and_then(value_f64),
            match_expr: value.get("match").and_then(scalar_to_string),
        }
    }

    /// Tags as individual tokens
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .map(|t| t.split(' ').filter(|t| !t.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// A component definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub class: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_geometry: Option<String>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<Component>,
    pub origin_file: String,
}

impl Record for Component {
    fn name(&self) -> &str {
        &self.name
    }
    fn class(&self) -> &str {
        &self.class
    }
    fn origin_file(&self) -> &str {
        &self.origin_file
    }
    fn push_duplicate(&mut self, duplicate: Self) {
        self.duplicates.push(duplicate);
    }
}

/// Extract all `components.component` records from one parsed file
pub fn ingest_components(store: &mut RecordStore<Component>, file_name: &str, doc: &Value) {
    let Some(components) = doc.get("components") else {
        return;
    };

    for xml in as_sequence(components.get("component")) {
        let Some(name) = xml.get("name").and_then(scalar_to_string) else {
            continue;
        };
        let class = xml
            .get("class")
            .and_then(scalar_to_string)
            .unwrap_or_else(|| "unknown".to_string());

        let connections = as_sequence(xml.get("connections").and_then(|c| c.get("connection")))
            .into_iter()
            .map(Connection::from_value)
            .collect();

        store.insert(Component {
            class,
            name,
            alias: xml.get("alias").and_then(scalar_to_string),
            source_geometry: xml
                .get("source")
                .and_then(|s| s.get("geometry"))
                .and_then(scalar_to_string),
            connections,
            duplicates: Vec::new(),
            origin_file: file_name.to_string(),
        });
    }
}

/// Append class-default connections to every component of that class.
/// Components never receive default properties, only connections.
pub fn apply_default_connections(store: &mut RecordStore<Component>, defaults: &DefaultStore) {
    for id in 0..store.len() {
        let component = store.get_mut(id);
        if let Some(default) = defaults.get_by_class(&component.class) {
            component
                .connections
                .extend(default.connections.iter().cloned());
        }
    }
}

pub fn log_summary(store: &RecordStore<Component>) {
    info!(
        "Loaded {} components in {} classes",
        store.len(),
        store.class_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_markup;

    #[test]
    fn test_ingest_single_and_multiple() {
        let mut store = RecordStore::new();

        let doc = parse_markup(
            r#"<components>
                 <component name="engine_arg" class="engine">
                   <source geometry="assets/engine_arg"/>
                   <connections><connection name="con_effect" tags="effect exhaust"/></connections>
                 </component>
               </components>"#,
        )
        .unwrap();
        ingest_components(&mut store, "libraries/comp_a.xml", &doc);

        let doc = parse_markup(
            r#"<components>
                 <component name="shield_arg" class="shield"/>
                 <component name="hull_part"/>
               </components>"#,
        )
        .unwrap();
        ingest_components(&mut store, "libraries/comp_b.xml", &doc);

        assert_eq!(store.len(), 3);
        let engine = store.get_by_name("engine_arg").unwrap();
        assert_eq!(engine.source_geometry.as_deref(), Some("assets/engine_arg"));
        assert_eq!(engine.connections.len(), 1);
        assert_eq!(engine.connections[0].tag_list(), vec!["effect", "exhaust"]);

        // Missing class attribute falls into the "unknown" bucket
        assert_eq!(store.get_by_name("hull_part").unwrap().class, "unknown");
    }

    #[test]
    fn test_duplicate_component_chained() {
        let mut store = RecordStore::new();
        let doc =
            parse_markup(r#"<components><component name="c" class="engine"/></components>"#).unwrap();
        ingest_components(&mut store, "a.xml", &doc);
        ingest_components(&mut store, "b.xml", &doc);

        let canonical = store.get_by_name("c").unwrap();
        assert_eq!(canonical.origin_file, "a.xml");
        assert_eq!(canonical.duplicates.len(), 1);
        // A chained duplicate has the same record shape as a canonical one
        assert_eq!(canonical.duplicates[0].class, "engine");
        assert_eq!(canonical.duplicates[0].origin_file, "b.xml");
    }

    #[test]
    fn test_default_connections_appended() {
        use crate::gamedata::defaults::{ClassDefault, DefaultStore};

        let mut store = RecordStore::new();
        let doc = parse_markup(
            r#"<components>
                 <component name="c" class="engine">
                   <connections><connection name="own"/></connections>
                 </component>
               </components>"#,
        )
        .unwrap();
        ingest_components(&mut store, "a.xml", &doc);

        let mut defaults = DefaultStore::new();
        defaults.insert(ClassDefault {
            class: "engine".to_string(),
            properties: None,
            connections: vec![Connection {
                name: Some("from_default".to_string()),
                ..Connection::default()
            }],
            origin_file: "defaults.xml".to_string(),
        });

        apply_default_connections(&mut store, &defaults);

        let component = store.get_by_name("c").unwrap();
        assert_eq!(component.connections.len(), 2);
        assert_eq!(component.connections[1].name.as_deref(), Some("from_default"));
    }
}
