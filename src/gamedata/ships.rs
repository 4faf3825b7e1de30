//! Derived ship and weapon views
//!
//! Ships and weapons are not stored records; they are computed per request
//! from a macro, its resolved connection graph, and its embedded
//! component's tagged connection points. The connection graph may be
//! cyclic, so the walk keeps an explicit visited set.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::gamedata::component::Component;
use crate::gamedata::macros::{Macro, MacroConnection, MacroId};
use crate::gamedata::store::RecordStore;
use crate::markup::{scalar_to_string, value_f64, value_truthy};

/// Macro classes that form the ship catalog
pub const SHIP_CLASSES: &[&str] = &["ship_xs", "ship_s", "ship_m", "ship_l", "ship_xl"];
/// Macro classes that form the weapon catalog
pub const WEAPON_CLASSES: &[&str] = &["weapon", "turret"];

/// Equipment and ship size grades
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Size {
    XS,
    S,
    M,
    L,
    XL,
}

impl Size {
    /// Size from a short code as used in class and dock tags (`xs`..`xl`)
    pub fn from_code(code: &str) -> Option<Size> {
        match code.to_ascii_lowercase().as_str() {
            "xs" => Some(Size::XS),
            "s" => Some(Size::S),
            "m" => Some(Size::M),
            "l" => Some(Size::L),
            "xl" => Some(Size::XL),
            _ => None,
        }
    }

    /// Size from a spelled-out connection tag (`extrasmall`..`extralarge`)
    pub fn from_word(tag: &str) -> Option<Size> {
        match tag {
            "extrasmall" => Some(Size::XS),
            "small" => Some(Size::S),
            "medium" => Some(Size::M),
            "large" => Some(Size::L),
            "extralarge" => Some(Size::XL),
            _ => None,
        }
    }
}

/// A ship view derived from a macro and its graph
#[derive(Debug, Clone, Serialize)]
pub struct Ship {
    pub class: String,
    pub name: String,
    pub size: Size,
    #[serde(rename = "type")]
    pub ship_type: String,
    pub purpose: String,
    pub ident: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crew: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hull: Option<f64>,
    pub engines: BTreeMap<Size, u32>,
    pub shields: BTreeMap<Size, u32>,
    pub weapons: BTreeMap<Size, u32>,
    pub turrets: BTreeMap<Size, u32>,
    pub cargo: BTreeMap<String, f64>,
    pub docks: BTreeMap<Size, u32>,
    pub hangars: BTreeMap<Size, f64>,
}

/// All ships derivable from the current macro store
pub fn all_ships(macros: &RecordStore<Macro>, components: &RecordStore<Component>) -> Vec<Ship> {
    macros
        .ids_of_type(SHIP_CLASSES)
        .into_iter()
        .filter_map(|id| macro_to_ship(macros, components, id))
        .collect()
}

/// Weapon macros: the weapon/turret classes minus internal aliased entries
pub fn all_weapons<'a>(macros: &'a RecordStore<Macro>) -> Vec<&'a Macro> {
    macros
        .of_type(WEAPON_CLASSES)
        .into_iter()
        .filter(|m| m.alias.is_none())
        .collect()
}

fn macro_to_ship(
    macros: &RecordStore<Macro>,
    components: &RecordStore<Component>,
    id: MacroId,
) -> Option<Ship> {
    let ship_macro = macros.get(id);

    // Exclude ships:
    // - with alias (usually used only internally)
    // - without identification (should only be the dummy ship)
    // - without ship property (should only be the boarding pod)
    if ship_macro.alias.is_some() {
        return None;
    }
    ship_macro.prop(&["identification"])?;
    ship_macro.prop(&["ship"])?;

    let mut engines = BTreeMap::new();
    let mut shields = BTreeMap::new();
    let mut weapons = BTreeMap::new();
    let mut turrets = BTreeMap::new();
    let mut cargo: BTreeMap<String, f64> = BTreeMap::new();
    let mut docks = BTreeMap::new();
    let mut hangars: BTreeMap<Size, f64> = BTreeMap::new();

    // Walk the resolved connection graph breadth-first; mutual references
    // between macros are legal, so track what has been visited.
    let mut queue: VecDeque<MacroId> = ship_macro
        .connections
        .iter()
        .filter_map(MacroConnection::resolved_target)
        .collect();
    let mut visited: HashSet<MacroId> = HashSet::new();
    visited.insert(id);

    while let Some(other_id) = queue.pop_front() {
        if !visited.insert(other_id) {
            continue;
        }
        let other = macros.get(other_id);

        if let Some(tags) = other.prop(&["docksize", "tags"]).and_then(scalar_to_string) {
            for tag in tags.split(' ') {
                let Some(size) = tag.strip_prefix("dock_").and_then(Size::from_code) else {
                    continue;
                };
                if other
                    .prop(&["dock", "external"])
                    .map(value_truthy)
                    .unwrap_or(false)
                {
                    *docks.entry(size).or_insert(0) += 1;
                } else if other
                    .prop(&["dock", "storage"])
                    .map(value_truthy)
                    .unwrap_or(false)
                {
                    let capacity = other
                        .prop(&["dock", "capacity"])
                        .and_then(value_f64)
                        .unwrap_or(0.0);
                    *hangars.entry(size).or_insert(0.0) += capacity;
                }
            }
        }

        if let Some(tags) = other.prop(&["cargo", "tags"]).and_then(scalar_to_string) {
            let max = other
                .prop(&["cargo", "max"])
                .and_then(value_f64)
                .unwrap_or(0.0);
            for tag in tags.to_uppercase().split(' ') {
                if tag.is_empty() {
                    continue;
                }
                *cargo.entry(tag.to_string()).or_insert(0.0) += max;
            }
        }

        queue.extend(
            other
                .connections
                .iter()
                .filter_map(MacroConnection::resolved_target),
        );
    }

    // Mount points come from the embedded component's tagged connections
    if let Some(target) = ship_macro.component.as_ref().and_then(|e| e.target()) {
        let component = components.get(target);
        for conn in &component.connections {
            let tags = conn.tag_list();
            if tags.is_empty() {
                continue;
            }

            let mut size = Size::XS;
            for tag in &tags {
                if let Some(tag_size) = Size::from_word(tag) {
                    size = tag_size;
                }
            }

            if tags.contains(&"engine") {
                *engines.entry(size).or_insert(0) += 1;
            } else if tags.contains(&"shield") {
                *shields.entry(size).or_insert(0) += 1;
            } else if tags.contains(&"weapon") {
                *weapons.entry(size).or_insert(0) += 1;
            } else if tags.contains(&"turret") {
                *turrets.entry(size).or_insert(0) += 1;
            }
        }
    }

    Some(Ship {
        class: ship_macro.class.clone(),
        name: ship_macro.name.clone(),
        size: ship_macro
            .class
            .strip_prefix("ship_")
            .and_then(Size::from_code)
            .unwrap_or(Size::XS),
        ship_type: ship_macro
            .prop(&["ship", "type"])
            .and_then(scalar_to_string)
            .unwrap_or_default(),
        purpose: ship_macro
            .prop(&["purpose", "primary"])
            .and_then(scalar_to_string)
            .unwrap_or_else(|| "-".to_string()),
        ident: ship_macro
            .prop(&["identification", "name"])
            .and_then(scalar_to_string)
            .unwrap_or_default(),
        crew: ship_macro
            .prop(&["people", "capacity"])
            .and_then(value_f64),
        hull: ship_macro.prop(&["hull", "max"]).and_then(value_f64),
        engines,
        shields,
        weapons,
        turrets,
        cargo,
        docks,
        hangars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamedata::component::ingest_components;
    use crate::gamedata::macros::{ingest_macros, resolve_components, resolve_connections};
    use crate::markup::parse_markup;

    fn fleet() -> (RecordStore<Macro>, RecordStore<Component>) {
        let mut macros = RecordStore::new();
        let mut components = RecordStore::new();

        let comp_doc = parse_markup(
            r#"<components>
                 <component name="ship_s_hull" class="ship">
                   <connections>
                     <connection name="con_e1" tags="engine medium"/>
                     <connection name="con_e2" tags="engine medium"/>
                     <connection name="con_s1" tags="shield small"/>
                     <connection name="con_w1" tags="weapon"/>
                     <connection name="con_t1" tags="turret large standard"/>
                   </connections>
                 </component>
               </components>"#,
        )
        .unwrap();
        ingest_components(&mut components, "comp.xml", &comp_doc);

        let macros_doc = parse_markup(
            r#"<macros>
                 <macro name="ship_s_arrow" class="ship_s">
                   <component ref="ship_s_hull"/>
                   <properties>
                     <identification name="Arrow"/>
                     <ship type="fighter"/>
                     <purpose primary="fight"/>
                     <people capacity="2"/>
                     <hull max="1400"/>
                   </properties>
                   <connections>
                     <connection ref="con_storage"><macro ref="storage_s_cargo"/></connection>
                     <connection ref="con_dock"><macro ref="dockarea_s_01"/></connection>
                   </connections>
                 </macro>
                 <macro name="storage_s_cargo" class="storage">
                   <properties><cargo max="800" tags="container"/></properties>
                 </macro>
                 <macro name="dockarea_s_01" class="dockarea">
                   <properties>
                     <docksize tags="dock_s dock_xs"/>
                     <dock external="1"/>
                   </properties>
                 </macro>
               </macros>"#,
        )
        .unwrap();
        ingest_macros(&mut macros, "units/ship.xml", &macros_doc);

        resolve_components(&mut macros, &components);
        resolve_connections(&mut macros);
        (macros, components)
    }

    #[test]
    fn test_ship_derivation() {
        let (macros, components) = fleet();
        let ships = all_ships(&macros, &components);
        assert_eq!(ships.len(), 1);

        let ship = &ships[0];
        assert_eq!(ship.name, "ship_s_arrow");
        assert_eq!(ship.size, Size::S);
        assert_eq!(ship.ship_type, "fighter");
        assert_eq!(ship.purpose, "fight");
        assert_eq!(ship.ident, "Arrow");
        assert_eq!(ship.crew, Some(2.0));
        assert_eq!(ship.hull, Some(1400.0));
        assert_eq!(ship.engines.get(&Size::M), Some(&2));
        assert_eq!(ship.shields.get(&Size::S), Some(&1));
        // Untagged size defaults to XS
        assert_eq!(ship.weapons.get(&Size::XS), Some(&1));
        assert_eq!(ship.turrets.get(&Size::L), Some(&1));
        assert_eq!(ship.cargo.get("CONTAINER"), Some(&800.0));
        assert_eq!(ship.docks.get(&Size::S), Some(&1));
        assert_eq!(ship.docks.get(&Size::XS), Some(&1));
        assert!(ship.hangars.is_empty());
    }

    #[test]
    fn test_aliased_and_incomplete_macros_excluded() {
        let mut macros = RecordStore::new();
        let components = RecordStore::new();
        let doc = parse_markup(
            r#"<macros>
                 <macro name="ship_s_dummy" class="ship_s"/>
                 <macro name="ship_s_internal" class="ship_s" alias="dummy">
                   <properties><identification name="X"/><ship type="fighter"/></properties>
                 </macro>
               </macros>"#,
        )
        .unwrap();
        ingest_macros(&mut macros, "a.xml", &doc);

        assert!(all_ships(&macros, &components).is_empty());
    }

    #[test]
    fn test_cyclic_graph_traversal_terminates() {
        let mut macros = RecordStore::new();
        let components = RecordStore::new();
        let doc = parse_markup(
            r#"<macros>
                 <macro name="ship_s_loop" class="ship_s">
                   <properties>
                     <identification name="Loop"/><ship type="fighter"/>
                     <cargo max="10" tags="solid"/>
                   </properties>
                   <connections><connection ref="c"><macro ref="part_a"/></connection></connections>
                 </macro>
                 <macro name="part_a" class="part">
                   <properties><cargo max="5" tags="solid"/></properties>
                   <connections><connection ref="c"><macro ref="part_b"/></connection></connections>
                 </macro>
                 <macro name="part_b" class="part">
                   <connections><connection ref="c"><macro ref="part_a"/></connection></connections>
                 </macro>
               </macros>"#,
        )
        .unwrap();
        ingest_macros(&mut macros, "a.xml", &doc);
        resolve_connections(&mut macros);

        let ships = all_ships(&macros, &components);
        assert_eq!(ships.len(), 1);
        // Each node contributes exactly once despite the cycle
        assert_eq!(ships[0].cargo.get("SOLID"), Some(&5.0));
    }

    #[test]
    fn test_hangar_capacity_summed() {
        let mut macros = RecordStore::new();
        let components = RecordStore::new();
        let doc = parse_markup(
            r#"<macros>
                 <macro name="ship_l_carrier" class="ship_l">
                   <properties><identification name="Carrier"/><ship type="carrier"/></properties>
                   <connections><connection ref="c"><macro ref="hangar_m"/></connection></connections>
                 </macro>
                 <macro name="hangar_m" class="dockarea">
                   <properties>
                     <docksize tags="dock_m"/>
                     <dock storage="1" capacity="8"/>
                   </properties>
                 </macro>
               </macros>"#,
        )
        .unwrap();
        ingest_macros(&mut macros, "a.xml", &doc);
        resolve_connections(&mut macros);

        let ships = all_ships(&macros, &components);
        assert_eq!(ships[0].hangars.get(&Size::M), Some(&8.0));
        assert!(ships[0].docks.is_empty());
    }

    #[test]
    fn test_weapons_filter() {
        let mut macros = RecordStore::new();
        let doc = parse_markup(
            r#"<macros>
                 <macro name="weapon_gen" class="weapon"/>
                 <macro name="turret_gen" class="turret"/>
                 <macro name="weapon_internal" class="weapon" alias="wi"/>
                 <macro name="engine_gen" class="engine"/>
               </macros>"#,
        )
        .unwrap();
        ingest_macros(&mut macros, "a.xml", &doc);

        let weapons = all_weapons(&macros);
        let names: Vec<&str> = weapons.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["weapon_gen", "turret_gen"]);
    }
}
