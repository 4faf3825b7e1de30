//! Deep merge of class-default properties into record property bags
//!
//! The record's own values always win on leaf collisions; the default only
//! fills gaps and extends nested groups. XML attribute parsing leaves a few
//! known type ambiguities behind (booleans written as 0/1, numbers that
//! survived as strings), which are reconciled here at leaf collisions
//! before giving up on a mismatch.

use serde_json::Value;
use tracing::warn;

/// Merge `source` (a class default's properties) underneath `target`
/// (a record's own properties), recursing into nested property groups.
pub fn deep_merge(target: &mut Value, source: &Value) {
    let (Value::Object(target_map), Value::Object(source_map)) = (&mut *target, source) else {
        return;
    };

    for (key, source_value) in source_map {
        match target_map.get_mut(key) {
            None => {
                target_map.insert(key.clone(), source_value.clone());
            }
            Some(target_value) => merge_leaf(key, target_value, source_value),
        }
    }
}

fn merge_leaf(key: &str, target: &mut Value, source: &Value) {
    match (&mut *target, source) {
        (Value::Object(_), Value::Object(_)) => deep_merge(target, source),
        (Value::Array(target_items), Value::Array(source_items)) => {
            // Array-valued properties concatenate, never merge by index
            target_items.extend(source_items.iter().cloned());
        }
        // Same scalar kind: the record's own value takes precedence
        (Value::Number(_), Value::Number(_))
        | (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_))
        | (Value::Null, Value::Null) => {}
        // 0/1 written where the default knows the field is boolean
        (Value::Number(n), Value::Bool(_)) => match n.as_i64() {
            Some(0) => *target = Value::Bool(false),
            Some(1) => *target = Value::Bool(true),
            _ => mismatch(key, target, source),
        },
        // Numeric string where the default knows the field is a number
        (Value::String(s), Value::Number(_)) => match s.trim().parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => {
                *target = number_value(parsed);
            }
            _ => mismatch(key, target, source),
        },
        // Empty element collapsed to "" where the default carries a group
        (Value::String(s), Value::Object(_)) if s.is_empty() => {
            *target = source.clone();
        }
        _ => mismatch(key, target, source),
    }
}

fn mismatch(key: &str, target: &Value, source: &Value) {
    warn!(
        "Mismatched property types for {}: {} <--> {}",
        key, target, source
    );
}

fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_keys_are_filled() {
        let mut target = json!({"hull": {"max": 1200}});
        deep_merge(&mut target, &json!({"people": {"capacity": 4}}));
        assert_eq!(target["people"]["capacity"], json!(4));
        assert_eq!(target["hull"]["max"], json!(1200));
    }

    #[test]
    fn test_own_value_wins_on_same_type() {
        let mut target = json!({"hull": {"max": 1200}});
        deep_merge(&mut target, &json!({"hull": {"max": 50, "integrated": 1}}));
        assert_eq!(target["hull"]["max"], json!(1200));
        assert_eq!(target["hull"]["integrated"], json!(1));
    }

    #[test]
    fn test_cargo_numeric_string_coercion() {
        // The record authored max as a string the parser could not type;
        // the default knows it is a number, so the own value is parsed and
        // kept.
        let mut target = json!({"cargo": {"max": "100", "tags": "container"}});
        deep_merge(&mut target, &json!({"cargo": {"max": 50, "tags": "container"}}));
        assert_eq!(target["cargo"]["max"], json!(100));
        assert_eq!(target["cargo"]["tags"], json!("container"));
    }

    #[test]
    fn test_zero_one_boolean_coercion() {
        let mut target = json!({"dock": {"external": 1, "storage": 0}});
        deep_merge(&mut target, &json!({"dock": {"external": false, "storage": true}}));
        assert_eq!(target["dock"]["external"], json!(true));
        assert_eq!(target["dock"]["storage"], json!(false));
    }

    #[test]
    fn test_number_outside_zero_one_left_unchanged() {
        let mut target = json!({"dock": {"external": 5}});
        deep_merge(&mut target, &json!({"dock": {"external": true}}));
        assert_eq!(target["dock"]["external"], json!(5));
    }

    #[test]
    fn test_empty_string_replaced_by_object() {
        let mut target = json!({"physics": ""});
        deep_merge(&mut target, &json!({"physics": {"mass": 10.5}}));
        assert_eq!(target["physics"]["mass"], json!(10.5));
    }

    #[test]
    fn test_other_mismatch_left_unchanged() {
        let mut target = json!({"purpose": {"primary": "fight"}});
        deep_merge(&mut target, &json!({"purpose": "trade"}));
        assert_eq!(target["purpose"]["primary"], json!("fight"));
    }

    #[test]
    fn test_arrays_concatenate() {
        let mut target = json!({"software": [{"ware": "a"}]});
        deep_merge(&mut target, &json!({"software": [{"ware": "b"}]}));
        assert_eq!(
            target["software"],
            json!([{"ware": "a"}, {"ware": "b"}])
        );
    }

    #[test]
    fn test_nested_groups_recurse() {
        let mut target = json!({"physics": {"drag": {"forward": 1.5}}});
        deep_merge(
            &mut target,
            &json!({"physics": {"drag": {"forward": 9.0, "reverse": 2.0}, "mass": 7.0}}),
        );
        assert_eq!(target["physics"]["drag"]["forward"], json!(1.5));
        assert_eq!(target["physics"]["drag"]["reverse"], json!(2.0));
        assert_eq!(target["physics"]["mass"], json!(7.0));
    }
}
