//! Game-data pipeline and query surface
//!
//! Loads the full record graph from extracted archive content (or from
//! cache snapshots when present) and exposes the query operations the
//! presentation layers consume. The pipeline runs in strict phases:
//!
//! 1. extraction — every archive pair is decoded into the output tree,
//! 2. record parsing — every extracted XML file feeds every record store,
//! 3. default merge — class defaults are merged into records,
//! 4. reference resolution — component embeds and macro links are attached.
//!
//! Phases never overlap: no record is merged or resolved before every
//! producer has consumed the full file set, so the graph cannot depend on
//! file order. After resolution the stores are treated as read-only.
//!
//! ## Example
//!
//! ```rust,no_run
//! use x4db::{GameData, LoadOptions};
//!
//! let data = GameData::load(&LoadOptions::default())?;
//! for ty in data.macro_types() {
//!     println!("{} x{}", ty.name, ty.count);
//! }
//! # Ok::<(), x4db::Error>(())
//! ```

pub mod component;
pub mod defaults;
pub mod macros;
pub mod merge;
pub mod ships;
pub mod store;

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::{self, CacheDir};
use crate::error::{Error, Result};
use crate::extract;
use crate::locale::Locale;
use crate::markup;

pub use component::{Component, Connection};
pub use defaults::{ClassDefault, DefaultStore};
pub use macros::{ComponentEdge, ConnectionEdge, Macro, MacroConnection, MacroLink};
pub use ships::{Ship, Size};
pub use store::{RecordStore, TypeCount};

/// Where to find archives and where to put intermediates
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Directory scanned for `.cat`/`.dat` archive pairs
    pub data_dir: PathBuf,
    /// Directory the extracted file tree is mirrored into
    pub out_dir: PathBuf,
    /// Directory for cache snapshots
    pub cache_dir: PathBuf,
    /// Attempt snapshot restore before a full scan
    pub use_cache: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            data_dir: PathBuf::from("data/raw"),
            out_dir: PathBuf::from("data/out"),
            cache_dir: PathBuf::from(".cache"),
            use_cache: true,
        }
    }
}

/// The loaded, resolved record graph
pub struct GameData {
    components: RecordStore<Component>,
    macros: RecordStore<Macro>,
    defaults: DefaultStore,
    locale: Locale,
    files: Vec<PathBuf>,
}

impl GameData {
    /// Run the full load cycle.
    ///
    /// Each store restores from its snapshot when possible; stores that
    /// miss re-ingest the extracted file set (scanning the archives first
    /// if the file list itself is not cached). Snapshots are written
    /// before the merge/resolve phases, so a restored graph and a freshly
    /// scanned one resolve identically.
    pub fn load(options: &LoadOptions) -> Result<GameData> {
        info!("Loading game data from {}", options.data_dir.display());

        let cache_dir = CacheDir::new(&options.cache_dir);
        if !options.use_cache {
            cache_dir.clear()?;
        }

        let mut components = RecordStore::new();
        let mut macros = RecordStore::new();
        let mut defaults = DefaultStore::new();
        let mut locale = Locale::default();

        let mut needs_components = true;
        let mut needs_macros = true;
        let mut needs_defaults = true;
        let mut needs_locale = true;

        if options.use_cache {
            if let Some(records) = cache_dir.load_json::<Vec<Component>>(cache::COMPONENTS) {
                components = RecordStore::from_records(records);
                needs_components = false;
            }
            if let Some(records) = cache_dir.load_json::<Vec<Macro>>(cache::MACROS) {
                macros = RecordStore::from_records(records);
                needs_macros = false;
            }
            if let Some(records) = cache_dir.load_json::<Vec<ClassDefault>>(cache::DEFAULTS) {
                defaults = DefaultStore::from_records(records);
                needs_defaults = false;
            }
            if let Some(restored) = cache_dir.load_json::<Locale>(cache::I18N) {
                locale = restored;
                needs_locale = false;
            }
        }

        let any_missing = needs_components || needs_macros || needs_defaults || needs_locale;

        let files = if any_missing {
            let files = match cache_dir.load_file_list() {
                Some(files) if options.use_cache => files,
                _ => {
                    let files = extract::scan_archives(&options.data_dir, &options.out_dir)?;
                    if files.is_empty() {
                        return Err(Error::NothingToLoad);
                    }
                    cache_dir.save_file_list(&files)?;
                    files
                }
            };

            info!("Found {} files", files.len());
            Self::process_files(
                &files,
                &options.out_dir,
                needs_components.then_some(&mut components),
                needs_macros.then_some(&mut macros),
                needs_defaults.then_some(&mut defaults),
                needs_locale.then_some(&mut locale),
            );

            if needs_components {
                cache_dir.save_json(cache::COMPONENTS, &components.records())?;
            }
            if needs_macros {
                cache_dir.save_json(cache::MACROS, &macros.records())?;
            }
            if needs_defaults {
                cache_dir.save_json(cache::DEFAULTS, &defaults.snapshot())?;
            }
            if needs_locale {
                cache_dir.save_json(cache::I18N, &locale)?;
            }

            files
        } else {
            cache_dir.load_file_list().unwrap_or_default()
        };

        // Every producer is done: merge defaults, then resolve references.
        defaults.log_summary();
        component::apply_default_connections(&mut components, &defaults);
        macros::apply_defaults(&mut macros, &defaults);
        macros::resolve_components(&mut macros, &components);
        macros::resolve_connections(&mut macros);
        component::log_summary(&components);
        macros::log_summary(&macros);
        locale.log_summary();

        Ok(GameData {
            components,
            macros,
            defaults,
            locale,
            files,
        })
    }

    fn process_files(
        files: &[PathBuf],
        out_dir: &Path,
        mut components: Option<&mut RecordStore<Component>>,
        mut macros: Option<&mut RecordStore<Macro>>,
        mut defaults: Option<&mut DefaultStore>,
        mut locale: Option<&mut Locale>,
    ) {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{bar:40.cyan/blue} | {msg} | {pos}/{len}")
                .unwrap()
                .progress_chars("#>-"),
        );

        for file in files {
            bar.set_message(file.display().to_string());
            bar.inc(1);

            if file
                .extension()
                .map(|e| !e.eq_ignore_ascii_case("xml"))
                .unwrap_or(true)
            {
                continue;
            }

            let rel_name = file
                .strip_prefix(out_dir)
                .unwrap_or(file)
                .to_string_lossy()
                .into_owned();

            let content = match fs::read(file) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!("Skipping unreadable file {}: {}", file.display(), e);
                    continue;
                }
            };

            let doc = match markup::parse_markup(&content) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Skipping unparsable file {}: {}", file.display(), e);
                    continue;
                }
            };

            if let Some(store) = defaults.as_deref_mut() {
                defaults::ingest_defaults(store, &rel_name, &doc);
            }
            if let Some(store) = macros.as_deref_mut() {
                macros::ingest_macros(store, &rel_name, &doc);
            }
            if let Some(store) = components.as_deref_mut() {
                component::ingest_components(store, &rel_name, &doc);
            }
            if let Some(locale) = locale.as_deref_mut() {
                locale.ingest(&rel_name, &doc);
            }
        }

        bar.finish_and_clear();
    }

    // --- query surface -----------------------------------------------------

    pub fn macro_by_name(&self, name: &str) -> Option<&Macro> {
        self.macros.get_by_name(name)
    }

    pub fn macros_of_type<S: AsRef<str>>(&self, classes: &[S]) -> Vec<&Macro> {
        self.macros.of_type(classes)
    }

    pub fn macro_types(&self) -> Vec<TypeCount> {
        self.macros.types()
    }

    pub fn component_by_name(&self, name: &str) -> Option<&Component> {
        self.components.get_by_name(name)
    }

    pub fn components_of_type<S: AsRef<str>>(&self, classes: &[S]) -> Vec<&Component> {
        self.components.of_type(classes)
    }

    pub fn component_types(&self) -> Vec<TypeCount> {
        self.components.types()
    }

    /// Known languages as (short code, display name)
    pub fn languages(&self) -> Vec<(String, String)> {
        self.locale.languages()
    }

    /// Deep-apply localization substitution to an arbitrary value
    pub fn resolve_localized(&self, value: &Value, lang: &str) -> Value {
        self.locale.resolve(value, lang)
    }

    pub fn localize_str(&self, text: &str, lang: &str) -> String {
        self.locale.resolve_str(text, lang)
    }

    /// Derived ship views, recomputed from the current graph
    pub fn ships(&self) -> Vec<Ship> {
        ships::all_ships(&self.macros, &self.components)
    }

    /// Weapon macros (weapon/turret classes, internal aliases excluded)
    pub fn weapons(&self) -> Vec<&Macro> {
        ships::all_weapons(&self.macros)
    }

    pub fn macro_store(&self) -> &RecordStore<Macro> {
        &self.macros
    }

    pub fn component_store(&self) -> &RecordStore<Component> {
        &self.components
    }

    pub fn defaults(&self) -> &DefaultStore {
        &self.defaults
    }

    /// Extracted files backing this load
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Full-text search across records.
    ///
    /// Matches record names and the lines of their serialized bodies,
    /// case-insensitively, keeping up to 11 matches per record so callers
    /// can display "10+". Results are sorted by record name.
    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        use rayon::prelude::*;

        let query_lower = query.to_lowercase();

        let mut results: Vec<SearchResult> = self
            .macros
            .records()
            .par_iter()
            .filter_map(|m| {
                let json = serde_json::to_string_pretty(m).ok()?;
                search_record(RecordKind::Macro, &m.name, &json, &query_lower)
            })
            .collect();

        results.par_extend(self.components.records().par_iter().filter_map(|c| {
            let json = serde_json::to_string_pretty(c).ok()?;
            search_record(RecordKind::Component, &c.name, &json, &query_lower)
        }));

        results.sort_by(|a, b| a.name.cmp(&b.name));
        results
    }
}

/// Which store a search result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Macro,
    Component,
}

/// A single match within a record body
#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    /// 1-indexed line in the serialized record
    pub line_number: usize,
    /// Matching line, truncated if long
    pub line_content: String,
}

/// Search result for one record
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub kind: RecordKind,
    pub name: String,
    pub matches: Vec<SearchMatch>,
}

fn search_record(
    kind: RecordKind,
    name: &str,
    json: &str,
    query_lower: &str,
) -> Option<SearchResult> {
    let name_matches = name.to_lowercase().contains(query_lower);

    let mut matches = Vec::new();
    for (line_number, line) in json.lines().enumerate() {
        if !line.to_lowercase().contains(query_lower) {
            continue;
        }
        let line_content = if line.chars().count() > 200 {
            let truncated: String = line.chars().take(200).collect();
            format!("{}...", truncated)
        } else {
            line.to_string()
        };
        matches.push(SearchMatch {
            line_number: line_number + 1,
            line_content,
        });
        // Keep up to 11 matches per record (for "10+" display)
        if matches.len() >= 11 {
            break;
        }
    }

    if name_matches || !matches.is_empty() {
        Some(SearchResult {
            kind,
            name: name.to_string(),
            matches,
        })
    } else {
        None
    }
}
