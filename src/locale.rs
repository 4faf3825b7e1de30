//! Localized text tables and placeholder substitution
//!
//! Game text references translations through `{page,id}` placeholders that
//! may themselves contain further placeholders, plus parenthesized default
//! annotations that are discarded once the reference resolves. Translation
//! tables are read from per-language XML files whose numeric ids map to a
//! fixed set of short language codes; unrecognized ids are ignored.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::markup::{as_sequence, scalar_to_string};

/// Numeric in-game language ids mapped to short codes
const KNOWN_LANGS: &[(&str, &str)] = &[
    ("44", "en"),
    ("49", "de"),
    ("33", "fr"),
    ("39", "it"),
    ("7", "ru"),
    ("34", "es"),
    ("55", "pt"),
    ("48", "pl"),
    ("86", "zh"),
    ("88", "zh-cht"),
    ("82", "kr"),
    ("81", "jp"),
];

/// Placeholder chains longer than this stop resolving; protects against
/// translation entries that reference each other cyclically.
const MAX_REF_DEPTH: usize = 8;

/// Containers nested deeper than this are passed through untouched when
/// deep-applying substitution to record structures.
const DEFAULT_VALUE_DEPTH: u32 = 2;

fn ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\s*(\d+)\s*,\s*(\d+)\s*\}").unwrap())
}

fn short_code(id: &str) -> Option<&'static str> {
    KNOWN_LANGS
        .iter()
        .find(|(num, _)| *num == id)
        .map(|(_, short)| *short)
}

/// Languages and per-language translation tables
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Locale {
    /// Short code -> display name
    languages: BTreeMap<String, String>,
    /// Short code -> ("page,id" -> text)
    translations: HashMap<String, HashMap<String, String>>,
}

impl Locale {
    /// Known languages as (short code, display name), sorted by short code
    pub fn languages(&self) -> Vec<(String, String)> {
        self.languages
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn language_name(&self, short: &str) -> Option<&str> {
        self.languages.get(short).map(String::as_str)
    }

    /// Ingest one parsed markup file. Recognizes the language catalog
    /// (`languages.language`) and per-language translation tables
    /// (`language.page.t`); everything else is ignored.
    pub fn ingest(&mut self, file_name: &str, doc: &Value) {
        if let Some(langs) = doc.get("languages") {
            for lang in as_sequence(langs.get("language")) {
                let Some(id) = lang.get("id").and_then(scalar_to_string) else {
                    continue;
                };
                let Some(short) = short_code(&id) else {
                    continue;
                };
                if let Some(name) = lang.get("name").and_then(scalar_to_string) {
                    self.languages.insert(short.to_string(), name);
                }
            }
            return;
        }

        let Some(language) = doc.get("language") else {
            return;
        };
        let Some(id) = language.get("id").and_then(scalar_to_string) else {
            return;
        };
        let Some(short) = short_code(&id) else {
            return;
        };

        let mut table: HashMap<String, String> = HashMap::new();
        for page in as_sequence(language.get("page")) {
            let Some(page_id) = page.get("id").and_then(scalar_to_string) else {
                continue;
            };
            for t in as_sequence(page.get("t")) {
                let Some(t_id) = t.get("id").and_then(scalar_to_string) else {
                    continue;
                };
                let text = t
                    .get("#text")
                    .and_then(scalar_to_string)
                    .unwrap_or_default();
                table.insert(format!("{},{}", page_id, t_id), text);
            }
        }

        debug!("{}: {} translations for {}", file_name, table.len(), short);
        self.translations.insert(short.to_string(), table);
    }

    pub fn log_summary(&self) {
        info!("Loaded {} languages", self.languages.len());
    }

    /// Resolve all placeholders in a string for one language.
    ///
    /// Substituted text is resolved again to support chained references,
    /// bounded by [`MAX_REF_DEPTH`]. A missing key leaves the placeholder
    /// literal. After substitution, unescaped parenthesized default
    /// annotations are stripped and escaped parentheses restored.
    pub fn resolve_str(&self, text: &str, lang: &str) -> String {
        self.resolve_str_bounded(text, lang, MAX_REF_DEPTH)
    }

    fn resolve_str_bounded(&self, text: &str, lang: &str, budget: usize) -> String {
        let substituted = ref_regex().replace_all(text, |caps: &Captures| {
            let key = format!("{},{}", &caps[1], &caps[2]);
            match self.translations.get(lang).and_then(|t| t.get(&key)) {
                Some(replacement) => {
                    if budget == 0 {
                        warn!("Translation chain too deep at {} in {}", &caps[0], lang);
                        replacement.clone()
                    } else {
                        self.resolve_str_bounded(replacement, lang, budget - 1)
                    }
                }
                None => {
                    warn!("Could not find translation {} in {}", &caps[0], lang);
                    caps[0].to_string()
                }
            }
        });

        strip_default_annotations(&substituted)
            .replace("\\(", "(")
            .replace("\\)", ")")
    }

    /// Deep-apply placeholder substitution to an arbitrary value.
    ///
    /// Strings at any visited level are resolved; nested containers are
    /// only entered while the depth budget lasts, which bounds traversal
    /// into cyclic structures reached through resolved references.
    pub fn resolve(&self, value: &Value, lang: &str) -> Value {
        self.resolve_depth(value, lang, DEFAULT_VALUE_DEPTH)
    }

    pub fn resolve_depth(&self, value: &Value, lang: &str, depth: u32) -> Value {
        match value {
            Value::String(s) => Value::String(self.resolve_str(s, lang)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.resolve_element(v, lang, depth))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_element(v, lang, depth)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_element(&self, value: &Value, lang: &str, depth: u32) -> Value {
        match value {
            Value::String(s) => Value::String(self.resolve_str(s, lang)),
            Value::Array(_) | Value::Object(_) if depth > 0 => {
                self.resolve_depth(value, lang, depth - 1)
            }
            other => other.clone(),
        }
    }
}

/// Remove `(...)` default annotations whose parentheses are not escaped
/// with a backslash. The nearest unescaped closing parenthesis ends an
/// annotation; an unmatched opening parenthesis is kept as-is.
fn strip_default_annotations(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '(' && !is_escaped(&chars, i) {
            if let Some(close) =
                (i + 1..chars.len()).find(|&j| chars[j] == ')' && !is_escaped(&chars, j))
            {
                i = close + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

fn is_escaped(chars: &[char], i: usize) -> bool {
    i > 0 && chars[i - 1] == '\\'
}
