//! Macro records and reference resolution
//!
//! Macros are the gameplay side of game objects: a class, an open property
//! bag, a reference to the component carrying their geometry, and a list of
//! connections that may link to other macros by name. References are
//! parsed as unresolved edges and resolved in place exactly once, after
//! every record producer has finished loading, so the resulting graph never
//! depends on file order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::gamedata::component::Component;
use crate::gamedata::defaults::DefaultStore;
use crate::gamedata::merge::deep_merge;
use crate::gamedata::store::{Record, RecordId, RecordStore};
use crate::markup::{as_sequence, scalar_to_string};

/// Handle of a macro in its store
pub type MacroId = RecordId;
/// Handle of a component in its store
pub type ComponentId = RecordId;

/// A macro's reference to the component carrying its geometry.
///
/// Snapshots persist only the reference name; resolution state is rebuilt
/// on every load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComponentEdge {
    Unresolved { ref_name: String },
    Resolved { ref_name: String, target: ComponentId },
}

impl ComponentEdge {
    pub fn ref_name(&self) -> &str {
        match self {
            ComponentEdge::Unresolved { ref_name } => ref_name,
            ComponentEdge::Resolved { ref_name, .. } => ref_name,
        }
    }

    pub fn target(&self) -> Option<ComponentId> {
        match self {
            ComponentEdge::Unresolved { .. } => None,
            ComponentEdge::Resolved { target, .. } => Some(*target),
        }
    }
}

impl From<String> for ComponentEdge {
    fn from(ref_name: String) -> Self {
        ComponentEdge::Unresolved { ref_name }
    }
}

impl From<ComponentEdge> for String {
    fn from(edge: ComponentEdge) -> Self {
        match edge {
            ComponentEdge::Unresolved { ref_name } => ref_name,
            ComponentEdge::Resolved { ref_name, .. } => ref_name,
        }
    }
}

/// The cross-macro part of a connection: the target macro's name and
/// optionally the connection point on the target side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroLink {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
}

/// A macro-to-macro edge. The original reference fields are retained in
/// both states; `target: None` on a resolved edge is a valid terminal
/// state (the referenced content is simply not loaded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MacroLink", into = "MacroLink")]
pub enum ConnectionEdge {
    Unresolved(MacroLink),
    Resolved {
        link: MacroLink,
        target: Option<MacroId>,
    },
}

impl ConnectionEdge {
    pub fn link(&self) -> &MacroLink {
        match self {
            ConnectionEdge::Unresolved(link) => link,
            ConnectionEdge::Resolved { link, .. } => link,
        }
    }
}

impl From<MacroLink> for ConnectionEdge {
    fn from(link: MacroLink) -> Self {
        ConnectionEdge::Unresolved(link)
    }
}

impl From<ConnectionEdge> for MacroLink {
    fn from(edge: ConnectionEdge) -> Self {
        match edge {
            ConnectionEdge::Unresolved(link) => link,
            ConnectionEdge::Resolved { link, .. } => link,
        }
    }
}

/// A connection entry on a macro
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroConnection {
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
    #[serde(rename = "macro", default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<ConnectionEdge>,
}

impl MacroConnection {
    fn from_value(value: &Value) -> MacroConnection {
        let edge = value
            .get("macro")
            .and_then(|m| m.get("ref"))
            .and_then(scalar_to_string)
            .map(|ref_name| {
                ConnectionEdge::Unresolved(MacroLink {
                    ref_name,
                    connection: value
                        .get("macro")
                        .and_then(|m| m.get("connection"))
                        .and_then(scalar_to_string),
                })
            });

        MacroConnection {
            ref_name: value.get("ref").and_then(scalar_to_string),
            edge,
        }
    }

    /// Target of a resolved edge, if any
    pub fn resolved_target(&self) -> Option<MacroId> {
        match &self.edge {
            Some(ConnectionEdge::Resolved { target, .. }) => *target,
            _ => None,
        }
    }
}

/// A macro definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    pub class: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<ComponentEdge>,
    /// Open property bag, keyed by property-group name
    #[serde(default = "empty_object")]
    pub properties: Value,
    #[serde(default)]
    pub connections: Vec<MacroConnection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<Macro>,
    pub origin_file: String,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Macro {
    /// Walk a path of keys into the property bag
    pub fn prop(&self, path: &[&str]) -> Option<&Value> {
        let mut current = &self.properties;
        for key in path {
            current = current.get(key)?;
        }
        Some(current)
    }
}

impl Record for Macro {
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

/// Extract all `macros.macro` records from one parsed file
pub fn ingest_macros(store: &mut RecordStore<Macro>, file_name: &str, doc: &Value) {
    let Some(macros) = doc.get("macros") else {
        return;
    };

    for xml in as_sequence(macros.get("macro")) {
        let Some(name) = xml.get("name").and_then(scalar_to_string) else {
            continue;
        };
        let class = xml
            .get("class")
            .and_then(scalar_to_string)
            .unwrap_or_else(|| "unknown".to_string());

        let connections = as_sequence(xml.get("connections").and_then(|c| c.get("connection")))
            .into_iter()
            .map(MacroConnection::from_value)
            .collect();

        // An empty <properties/> element collapses to a scalar; records
        // always carry an object bag
        let properties = xml
            .get("properties")
            .filter(|p| p.is_object())
            .cloned()
            .unwrap_or_else(empty_object);

        let component = xml
            .get("component")
            .and_then(|c| c.get("ref"))
            .and_then(scalar_to_string)
            .map(|ref_name| ComponentEdge::Unresolved { ref_name });

        store.insert(Macro {
            class,
            name,
            alias: xml.get("alias").and_then(scalar_to_string),
            component,
            properties,
            connections,
            duplicates: Vec::new(),
            origin_file: file_name.to_string(),
        });
    }
}

/// Deep-merge class-default properties under every macro's own properties
pub fn apply_defaults(store: &mut RecordStore<Macro>, defaults: &DefaultStore) {
    for id in 0..store.len() {
        let macro_record = store.get_mut(id);
        if let Some(default) = defaults.get_by_class(&macro_record.class) {
            if let Some(properties) = &default.properties {
                deep_merge(&mut macro_record.properties, properties);
            }
        }
    }
}

/// Embed referenced components into macros.
///
/// A failed lookup leaves the reference shape intact and logs a warning;
/// downstream consumers treat an unresolved edge as "no usable component".
pub fn resolve_components(store: &mut RecordStore<Macro>, components: &RecordStore<Component>) {
    for id in 0..store.len() {
        let macro_record = store.get_mut(id);
        let Some(edge) = &macro_record.component else {
            continue;
        };

        let ref_name = edge.ref_name().to_string();
        match components.id_by_name(&ref_name) {
            Some(target) => {
                macro_record.component = Some(ComponentEdge::Resolved { ref_name, target });
            }
            None => {
                warn!(
                    "Could not find referenced component {} ({})",
                    ref_name, macro_record.origin_file
                );
            }
        }
    }
}

/// Attach macro-to-macro edges for every connection carrying a link.
///
/// An absent target is attached as `None`, which is legitimate (e.g.
/// references into content that is not loaded). Re-running the pass over
/// an already-resolved store reproduces the same targets.
pub fn resolve_connections(store: &mut RecordStore<Macro>) {
    for id in 0..store.len() {
        let targets: Vec<(usize, Option<MacroId>)> = store
            .get(id)
            .connections
            .iter()
            .enumerate()
            .filter_map(|(index, conn)| {
                conn.edge
                    .as_ref()
                    .map(|edge| (index, store.id_by_name(&edge.link().ref_name)))
            })
            .collect();

        let macro_record = store.get_mut(id);
        for (index, target) in targets {
            let Some(edge) = &mut macro_record.connections[index].edge else {
                continue;
            };
            if target.is_none() {
                debug!(
                    "Connection target {} not loaded ({})",
                    edge.link().ref_name,
                    macro_record.origin_file
                );
            }
            *edge = ConnectionEdge::Resolved {
                link: edge.link().clone(),
                target,
            };
        }
    }
}

pub fn log_summary(store: &RecordStore<Macro>) {
    info!(
        "Loaded {} macros in {} classes",
        store.len(),
        store.class_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamedata::component::ingest_components;
    use crate::markup::parse_markup;
    use serde_json::json;

    fn macro_doc(name: &str, class: &str, body: &str) -> Value {
        parse_markup(&format!(
            r#"<macros><macro name="{}" class="{}">{}</macro></macros>"#,
            name, class, body
        ))
        .unwrap()
    }

    #[test]
    fn test_duplicate_macro_scenario() {
        let mut store = RecordStore::new();
        let doc = macro_doc("ship_s_test_01", "ship_s", "");
        ingest_macros(&mut store, "units/first.xml", &doc);
        ingest_macros(&mut store, "units/second.xml", &doc);

        let canonical = store.get_by_name("ship_s_test_01").unwrap();
        assert_eq!(canonical.origin_file, "units/first.xml");
        assert_eq!(canonical.duplicates.len(), 1);
        assert_eq!(canonical.duplicates[0].origin_file, "units/second.xml");
        assert_eq!(store.of_type(&["ship_s"]).len(), 1);
    }

    #[test]
    fn test_ingest_normalizes_single_connection() {
        let mut store = RecordStore::new();
        let doc = macro_doc(
            "m",
            "ship_s",
            r#"<connections><connection ref="con_a"><macro ref="other" connection="space"/></connection></connections>"#,
        );
        ingest_macros(&mut store, "a.xml", &doc);

        let m = store.get_by_name("m").unwrap();
        assert_eq!(m.connections.len(), 1);
        let edge = m.connections[0].edge.as_ref().unwrap();
        assert_eq!(edge.link().ref_name, "other");
        assert_eq!(edge.link().connection.as_deref(), Some("space"));
    }

    #[test]
    fn test_ingest_empty_properties_becomes_object() {
        let mut store = RecordStore::new();
        let doc = macro_doc("m", "ship_s", "<properties/>");
        ingest_macros(&mut store, "a.xml", &doc);
        assert!(store.get_by_name("m").unwrap().properties.is_object());
    }

    #[test]
    fn test_component_embedding() {
        let mut macros = RecordStore::new();
        let mut components = RecordStore::new();

        let comp_doc =
            parse_markup(r#"<components><component name="ship_gen" class="ship"/></components>"#)
                .unwrap();
        ingest_components(&mut components, "comp.xml", &comp_doc);

        ingest_macros(
            &mut macros,
            "a.xml",
            &macro_doc("m_ok", "ship_s", r#"<component ref="ship_gen"/>"#),
        );
        ingest_macros(
            &mut macros,
            "a.xml",
            &macro_doc("m_missing", "ship_s", r#"<component ref="nope"/>"#),
        );

        resolve_components(&mut macros, &components);

        let ok = macros.get_by_name("m_ok").unwrap();
        assert_eq!(ok.component.as_ref().unwrap().target(), Some(0));
        // A failed lookup leaves the reference shape intact
        let missing = macros.get_by_name("m_missing").unwrap();
        assert_eq!(missing.component.as_ref().unwrap().target(), None);
        assert_eq!(missing.component.as_ref().unwrap().ref_name(), "nope");
    }

    #[test]
    fn test_connection_resolution_and_idempotency() {
        let mut macros = RecordStore::new();
        ingest_macros(
            &mut macros,
            "a.xml",
            &macro_doc(
                "m_a",
                "ship_s",
                r#"<connections>
                     <connection ref="con_b"><macro ref="m_b"/></connection>
                     <connection ref="con_gone"><macro ref="dlc_only"/></connection>
                     <connection ref="inline_only"/>
                   </connections>"#,
            ),
        );
        ingest_macros(&mut macros, "b.xml", &macro_doc("m_b", "engine", ""));

        resolve_connections(&mut macros);

        let a = macros.get_by_name("m_a").unwrap().clone();
        let b_id = macros.id_by_name("m_b").unwrap();
        assert_eq!(a.connections[0].resolved_target(), Some(b_id));
        // Absent target resolves to None, retaining the original link
        assert_eq!(a.connections[1].resolved_target(), None);
        assert!(matches!(
            a.connections[1].edge,
            Some(ConnectionEdge::Resolved { target: None, .. })
        ));
        assert!(a.connections[2].edge.is_none());

        // Resolving an already-resolved graph changes nothing
        resolve_connections(&mut macros);
        assert_eq!(macros.get_by_name("m_a").unwrap(), &a);
    }

    #[test]
    fn test_apply_defaults_merges_properties() {
        use crate::gamedata::defaults::{ClassDefault, DefaultStore};

        let mut macros = RecordStore::new();
        ingest_macros(
            &mut macros,
            "a.xml",
            &macro_doc("m", "ship_s", r#"<properties><hull max="1200"/></properties>"#),
        );

        let mut defaults = DefaultStore::new();
        defaults.insert(ClassDefault {
            class: "ship_s".to_string(),
            properties: Some(json!({"hull": {"max": 50}, "people": {"capacity": 2}})),
            connections: Vec::new(),
            origin_file: "defaults.xml".to_string(),
        });

        apply_defaults(&mut macros, &defaults);

        let m = macros.get_by_name("m").unwrap();
        assert_eq!(m.properties["hull"]["max"], json!(1200));
        assert_eq!(m.properties["people"]["capacity"], json!(2));
    }

    #[test]
    fn test_snapshot_strips_resolution_state() {
        let mut macros = RecordStore::new();
        ingest_macros(
            &mut macros,
            "a.xml",
            &macro_doc(
                "m_a",
                "ship_s",
                r#"<connections><connection ref="c"><macro ref="m_b"/></connection></connections>"#,
            ),
        );
        ingest_macros(&mut macros, "b.xml", &macro_doc("m_b", "engine", ""));
        resolve_connections(&mut macros);

        let json = serde_json::to_string(macros.records()).unwrap();
        let restored: Vec<Macro> = serde_json::from_str(&json).unwrap();
        let mut rebuilt = RecordStore::from_records(restored);

        // Edges come back unresolved with their links intact...
        assert!(matches!(
            rebuilt.get_by_name("m_a").unwrap().connections[0].edge,
            Some(ConnectionEdge::Unresolved(_))
        ));

        // ...and re-resolving reproduces the identical graph
        resolve_connections(&mut rebuilt);
        assert_eq!(
            rebuilt.get_by_name("m_a").unwrap(),
            macros.get_by_name("m_a").unwrap()
        );
    }
}
