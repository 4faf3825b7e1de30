//! XML markup to value-tree conversion
//!
//! Extracted game files are XML with a small, regular vocabulary. This
//! module parses them into [`serde_json::Value`] trees so record ingestion
//! can work on one uniform shape:
//!
//! - attributes become unprefixed keys with scalar type inference
//!   (`"100"` -> 100, `"0.5"` -> 0.5, `"true"` -> true; strings with
//!   leading zeros stay strings),
//! - repeated child elements become arrays, a single child stays a plain
//!   value (see [`as_sequence`] for the normalization every consumer needs),
//! - element text is stored under `"#text"`, and a text-only element
//!   collapses to its scalar value,
//! - an element with no attributes, children or text becomes `""`.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Parse an XML document into a value tree keyed by its root element name.
pub fn parse_markup(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut root = Map::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(&e);
                let child = parse_element(&mut reader, &e)?;
                insert_child(&mut root, name, child);
            }
            Event::Empty(e) => {
                let name = element_name(&e);
                let child = leaf_element(&e)?;
                insert_child(&mut root, name, child);
            }
            Event::Eof => break,
            // Declaration, comments, processing instructions, stray text
            _ => {}
        }
    }

    Ok(Value::Object(root))
}

fn parse_element(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Value> {
    let mut map = element_attrs(start)?;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(&e);
                let child = parse_element(reader, &e)?;
                insert_child(&mut map, name, child);
            }
            Event::Empty(e) => {
                let name = element_name(&e);
                let child = leaf_element(&e)?;
                insert_child(&mut map, name, child);
            }
            Event::Text(t) => {
                let raw = String::from_utf8_lossy(&t).to_string();
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    text.push_str(&unescape_entities(trimmed));
                }
            }
            Event::CData(t) => {
                text.push_str(&String::from_utf8_lossy(&t.into_inner()));
            }
            Event::End(_) => break,
            Event::Eof => {
                return Err(Error::InvalidMarkup(format!(
                    "unexpected end of document inside <{}>",
                    element_name(start)
                )));
            }
            _ => {}
        }
    }

    if !text.is_empty() {
        if map.is_empty() {
            return Ok(parse_scalar(&text));
        }
        map.insert("#text".to_string(), parse_scalar(&text));
    }

    if map.is_empty() {
        return Ok(Value::String(String::new()));
    }

    Ok(Value::Object(map))
}

/// A self-closing element: attributes only
fn leaf_element(start: &BytesStart) -> Result<Value> {
    let map = element_attrs(start)?;
    if map.is_empty() {
        return Ok(Value::String(String::new()));
    }
    Ok(Value::Object(map))
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn element_attrs(start: &BytesStart) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::InvalidMarkup(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = unescape_entities(&String::from_utf8_lossy(&attr.value));
        map.insert(key, parse_scalar(&value));
    }
    Ok(map)
}

/// Insert a child value; repeated names accumulate into an array
fn insert_child(map: &mut Map<String, Value>, name: String, child: Value) {
    match map.get_mut(&name) {
        None => {
            map.insert(name, child);
        }
        Some(Value::Array(items)) => items.push(child),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, child]);
        }
    }
}

/// Resolve the five predefined XML entities; anything else passes through.
fn unescape_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Parse an attribute or text value into a typed scalar
pub fn parse_scalar(s: &str) -> Value {
    if s.is_empty() {
        return Value::String(String::new());
    }
    if s == "true" {
        return Value::Bool(true);
    }
    if s == "false" {
        return Value::Bool(false);
    }
    if looks_like_int(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Value::from(i);
        }
    } else if looks_like_float(s) {
        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                if let Some(n) = serde_json::Number::from_f64(f) {
                    return Value::Number(n);
                }
            }
        }
    }
    Value::String(s.to_string())
}

fn looks_like_int(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
}

fn looks_like_float(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    let mut dots = 0usize;
    for (i, b) in body.bytes().enumerate() {
        match b {
            b'.' if i > 0 => dots += 1,
            b'0'..=b'9' => {}
            _ => return false,
        }
    }
    // Exactly one dot, and no leading zero unless "0.x"
    dots == 1 && (!body.starts_with('0') || body.starts_with("0."))
}

/// Normalize a "single or sequence" value into a uniform sequence.
///
/// The markup conversion collapses a single child element to a plain value
/// rather than a one-element array; every extraction site must iterate
/// through this helper. A missing value yields an empty sequence.
pub fn as_sequence(value: Option<&Value>) -> Vec<&Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
    }
}

/// Render a scalar value back into its string form (for keys and names)
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Read a value as a number, accepting numeric strings that survived
/// scalar inference (leading zeros, whitespace)
pub fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Truthiness of a scalar, matching how flag attributes are authored
/// (`0`/`1` numbers, booleans, presence of a non-empty string)
pub fn value_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}
