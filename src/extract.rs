//! Archive payload (.dat) extraction
//!
//! Scans a data directory for catalog/payload pairs, performs positioned
//! reads into the payload for every XML entry of the index, and mirrors the
//! entries into an output directory. Output paths are lower-cased so all
//! later lookups are case-insensitive by construction.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use crate::catalog::{self, CatEntry};
use crate::error::Result;

/// Scan a data directory for archive pairs and extract their XML entries.
///
/// Returns the list of written files (paths under `out_dir`) in first-write
/// order. Two archives producing the same case-insensitive output path
/// yield a single logical entry whose content is the last one written.
/// Payload files without a sibling catalog are copied through verbatim;
/// catalogs without a sibling payload are skipped with a warning.
pub fn scan_archives(data_dir: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let cat_files: Vec<PathBuf> = crate::utils::collect_files(data_dir, Some(catalog::CAT_EXT))
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !catalog::is_signature_catalog(p))
        .collect();

    debug!("Found {} catalog files in {}", cat_files.len(), data_dir.display());

    let mut written = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    let bar = ProgressBar::new(cat_files.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} | {msg} | {pos}/{len}")
            .unwrap()
            .progress_chars("#>-"),
    );

    for cat_file in &cat_files {
        bar.set_message(cat_file.display().to_string());
        bar.inc(1);

        let entries = match catalog::read_catalog(cat_file) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Skipping unreadable catalog {}: {}", cat_file.display(), e);
                continue;
            }
        };

        if entries.is_empty() {
            continue;
        }

        let dat_file = catalog::payload_path(cat_file);
        if !dat_file.is_file() {
            warn!(
                "Skipping {}: missing sibling payload {}",
                cat_file.display(),
                dat_file.display()
            );
            continue;
        }

        if let Err(e) = extract_pair(cat_file, &dat_file, &entries, data_dir, out_dir, &mut written, &mut seen)
        {
            warn!("Failed to extract {}: {}", cat_file.display(), e);
        }
    }

    bar.finish_and_clear();

    // Payloads that never had an index: pass them through as opaque files
    for dat_file in crate::utils::collect_files(data_dir, Some(catalog::DAT_EXT)).unwrap_or_default()
    {
        if dat_file.with_extension(catalog::CAT_EXT).is_file()
            || catalog::is_signature_catalog(&dat_file)
        {
            continue;
        }
        if let Err(e) = copy_opaque(&dat_file, data_dir, out_dir, &mut written, &mut seen) {
            warn!("Failed to copy {}: {}", dat_file.display(), e);
        }
    }

    Ok(written)
}

/// Extract all entries of one archive pair via positioned reads.
fn extract_pair(
    cat_file: &Path,
    dat_file: &Path,
    entries: &[CatEntry],
    data_dir: &Path,
    out_dir: &Path,
    written: &mut Vec<PathBuf>,
    seen: &mut HashSet<PathBuf>,
) -> Result<()> {
    let sub_folder = cat_file
        .parent()
        .and_then(|p| p.strip_prefix(data_dir).ok())
        .unwrap_or_else(|| Path::new(""));

    let mut dat = File::open(dat_file)?;

    debug!("{}: writing {} files", cat_file.display(), entries.len());

    for entry in entries {
        dat.seek(SeekFrom::Start(entry.offset))?;
        let mut buffer = vec![0u8; entry.size as usize];
        dat.read_exact(&mut buffer)?;

        let out_path = lowercased_out_path(out_dir, sub_folder, &entry.path);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, &buffer)?;

        if seen.insert(out_path.clone()) {
            written.push(out_path);
        }
    }

    Ok(())
}

/// Copy a payload without an index through verbatim, as a single file.
fn copy_opaque(
    dat_file: &Path,
    data_dir: &Path,
    out_dir: &Path,
    written: &mut Vec<PathBuf>,
    seen: &mut HashSet<PathBuf>,
) -> Result<()> {
    let rel = dat_file.strip_prefix(data_dir).unwrap_or(dat_file);
    let out_path = lowercased_out_path(out_dir, Path::new(""), &rel.to_string_lossy());
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(dat_file, &out_path)?;

    if seen.insert(out_path.clone()) {
        written.push(out_path);
    }
    Ok(())
}

fn lowercased_out_path(out_dir: &Path, sub_folder: &Path, entry_path: &str) -> PathBuf {
    let rel = if sub_folder.as_os_str().is_empty() {
        entry_path.to_string()
    } else {
        format!("{}/{}", sub_folder.to_string_lossy(), entry_path)
    };
    out_dir.join(rel.to_lowercase())
}
