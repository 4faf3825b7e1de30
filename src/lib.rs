//! # x4db
//!
//! A Rust library for extracting and cross-referencing X4 Foundations game
//! data from its `.cat`/`.dat` archive format.
//!
//! ## Overview
//!
//! The game ships its definition data in indexed archive pairs: a
//! line-oriented `.cat` index and a raw `.dat` payload. This library
//! provides:
//!
//! - Reading catalog indexes and extracting XML entries via positioned reads
//! - Parsing the extracted markup into typed records (components, macros,
//!   class defaults, localization tables) with duplicate chaining
//! - Deep-merging class defaults into record property bags
//! - Resolving component embeds and macro-to-macro connection links into a
//!   navigable graph
//! - Recursive `{page,id}` localization substitution with cycle-safe
//!   traversal
//! - Derived ship and weapon views computed from the resolved graph
//!
//! ## Example
//!
//! ```rust,no_run
//! use x4db::{GameData, LoadOptions};
//!
//! fn main() -> anyhow::Result<()> {
//!     let data = GameData::load(&LoadOptions::default())?;
//!
//!     if let Some(m) = data.macro_by_name("ship_arg_s_fighter_01_macro") {
//!         println!("{} ({})", m.name, m.class);
//!     }
//!
//!     for ship in data.ships() {
//!         println!("{}", data.localize_str(&ship.ident, "en"));
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod error;
pub mod extract;
pub mod gamedata;
pub mod locale;
pub mod markup;
pub mod utils;

pub use catalog::CatEntry;
pub use error::{Error, Result};
pub use gamedata::{
    ClassDefault, Component, ComponentEdge, Connection, ConnectionEdge, GameData, LoadOptions,
    Macro, MacroConnection, MacroLink, RecordKind, SearchResult, Ship, Size, TypeCount,
};
pub use locale::Locale;
pub use utils::{collect_files, create_glob_matcher, format_size, matches_filter};
