//! x4db - extract and browse X4 Foundations game data
//!
//! Usage:
//!   x4db scan [--force]          - Run the full pipeline, write cache snapshots
//!   x4db info                    - Show store counts and languages
//!   x4db types [--components]    - List record classes with counts
//!   x4db show <name> [-l lang]   - Print one record as localized JSON
//!   x4db search <query>          - Full-text search across records
//!   x4db files [filter]          - List extracted files matching filter
//!   x4db ships [-l lang]         - List derived ships
//!   x4db weapons [-l lang]       - List weapon macros

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use x4db::{create_glob_matcher, format_size, matches_filter, GameData, LoadOptions};

#[derive(Parser)]
#[command(name = "x4db")]
#[command(version = "0.1.0")]
#[command(about = "Extract and cross-reference X4 Foundations game data", long_about = None)]
struct Cli {
    /// Directory scanned for .cat/.dat archive pairs
    #[arg(long, default_value = "data/raw")]
    data_dir: PathBuf,

    /// Directory the extracted file tree is mirrored into
    #[arg(long, default_value = "data/out")]
    out_dir: PathBuf,

    /// Directory for cache snapshots
    #[arg(long, default_value = ".cache")]
    cache_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write cache snapshots
    Scan {
        /// Discard existing snapshots and rebuild from the archives
        #[arg(short, long)]
        force: bool,
    },
    /// Show store counts and languages
    Info,
    /// List record classes with counts
    Types {
        /// List component classes instead of macro classes
        #[arg(short, long)]
        components: bool,
    },
    /// Print one record as localized JSON
    Show {
        /// Record name
        name: String,
        /// Language short code
        #[arg(short, long, default_value = "en")]
        lang: String,
        /// Look up a component instead of a macro
        #[arg(short, long)]
        component: bool,
    },
    /// Full-text search across records
    Search {
        /// Search query (case-insensitive)
        query: String,
    },
    /// List extracted files
    Files {
        /// Filter pattern (e.g. *.xml, libraries/*)
        filter: Option<String>,
    },
    /// List derived ships
    Ships {
        /// Language short code
        #[arg(short, long, default_value = "en")]
        lang: String,
    },
    /// List weapon macros
    Weapons {
        /// Language short code
        #[arg(short, long, default_value = "en")]
        lang: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let use_cache = !matches!(cli.command, Commands::Scan { force: true });
    let options = LoadOptions {
        data_dir: cli.data_dir,
        out_dir: cli.out_dir,
        cache_dir: cli.cache_dir,
        use_cache,
    };

    let data = GameData::load(&options).context("Failed to load game data")?;

    match cli.command {
        Commands::Scan { .. } => {
            println!(
                "Loaded {} files, {} macros, {} components",
                data.files().len(),
                data.macro_store().len(),
                data.component_store().len()
            );
        }
        Commands::Info => show_info(&data),
        Commands::Types { components } => {
            let types = if components {
                data.component_types()
            } else {
                data.macro_types()
            };
            for ty in types {
                println!("{:>6} {}", ty.count, ty.name);
            }
        }
        Commands::Show {
            name,
            lang,
            component,
        } => show_record(&data, &name, &lang, component)?,
        Commands::Search { query } => search_records(&data, &query),
        Commands::Files { filter } => list_files(&data, filter.as_deref())?,
        Commands::Ships { lang } => list_ships(&data, &lang),
        Commands::Weapons { lang } => list_weapons(&data, &lang),
    }

    Ok(())
}

fn show_info(data: &GameData) {
    let total_size: u64 = data
        .files()
        .iter()
        .filter_map(|f| std::fs::metadata(f).ok())
        .map(|m| m.len())
        .sum();

    println!("Extracted files: {} ({})", data.files().len(), format_size(total_size));
    println!(
        "Macros: {} in {} classes",
        data.macro_store().len(),
        data.macro_types().len()
    );
    println!(
        "Components: {} in {} classes",
        data.component_store().len(),
        data.component_types().len()
    );
    println!("Ships: {}", data.ships().len());
    println!("Weapons: {}", data.weapons().len());

    let languages: Vec<String> = data
        .languages()
        .into_iter()
        .map(|(key, name)| format!("{} ({})", key, name))
        .collect();
    println!("Languages: {}", languages.join(", "));
}

fn show_record(data: &GameData, name: &str, lang: &str, component: bool) -> Result<()> {
    let value = if component {
        match data.component_by_name(name) {
            Some(c) => serde_json::to_value(c)?,
            None => bail!("Component not found: {}", name),
        }
    } else {
        match data.macro_by_name(name) {
            Some(m) => serde_json::to_value(m)?,
            None => bail!("Macro not found: {}", name),
        }
    };

    let localized = data.resolve_localized(&value, lang);
    println!("{}", serde_json::to_string_pretty(&localized)?);
    Ok(())
}

fn search_records(data: &GameData, query: &str) {
    let results = data.search(query);

    for result in &results {
        let count = if result.matches.len() >= 11 {
            "10+".to_string()
        } else {
            result.matches.len().to_string()
        };
        println!("{:?} {} ({} matches)", result.kind, result.name, count);
        for m in result.matches.iter().take(10) {
            println!("  {:>5}: {}", m.line_number, m.line_content.trim());
        }
    }

    println!();
    println!("{} records matched", results.len());
}

fn list_files(data: &GameData, filter: Option<&str>) -> Result<()> {
    let matcher = filter.map(create_glob_matcher).transpose()?;

    let mut count = 0u64;
    let mut total_size = 0u64;

    for file in data.files() {
        let name = file.to_string_lossy();
        if !matches_filter(&name, matcher.as_ref()) {
            continue;
        }
        let size = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);
        println!("{:>10} {}", format_size(size), name);
        count += 1;
        total_size += size;
    }

    println!();
    println!("Total: {} files, {}", count, format_size(total_size));
    Ok(())
}

fn list_ships(data: &GameData, lang: &str) {
    let ships = data.ships();

    for ship in &ships {
        println!(
            "{:<40} {:>3?} {:<12} {:<10} {}",
            ship.name,
            ship.size,
            ship.ship_type,
            ship.purpose,
            data.localize_str(&ship.ident, lang)
        );
    }

    println!();
    println!("{} ships", ships.len());
}

fn list_weapons(data: &GameData, lang: &str) {
    let weapons = data.weapons();

    for weapon in &weapons {
        let ident = weapon
            .prop(&["identification", "name"])
            .and_then(|v| v.as_str())
            .map(|s| data.localize_str(s, lang))
            .unwrap_or_default();
        println!("{:<44} {:<8} {}", weapon.name, weapon.class, ident);
    }

    println!();
    println!("{} weapons", weapons.len());
}
