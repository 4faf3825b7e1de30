//! Catalog (.cat) index file handling
//!
//! A `.cat` file is the line-oriented index of an archive pair. Each line
//! describes one entry of the sibling `.dat` payload:
//!
//! ```text
//! <path> <size> <unix-timestamp> <hash>
//! ```
//!
//! The path may itself contain spaces, so fields are popped from the right
//! and the remaining tokens rejoin as the path. The byte offset of an entry
//! in the `.dat` is not stored in the index; it is the running sum of the
//! sizes of all preceding entries, in line order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::Result;

/// Extension of index files
pub const CAT_EXT: &str = "cat";
/// Extension of payload files
pub const DAT_EXT: &str = "dat";

/// A single entry of a catalog index, pointing into the sibling payload file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatEntry {
    /// Path of the file within the archive, as written in the index
    pub path: String,
    /// Byte offset of the file data in the sibling `.dat`
    pub offset: u64,
    /// Size of the file data in bytes
    pub size: u64,
    /// Unix timestamp (seconds); 0 when the index field was unparsable
    pub ts: u64,
    /// Content hash as written in the index (opaque)
    pub hash: String,
}

/// Read a catalog index and return its XML entries in line order.
///
/// Only entries whose path ends in `.xml` are returned; all other entries
/// still advance the running payload offset. Lines with too few fields or
/// an unparsable size are logged and skipped without advancing the offset.
pub fn read_catalog<P: AsRef<Path>>(path: P) -> Result<Vec<CatEntry>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let mut entries = Vec::new();
    let mut offset = 0u64;

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let mut parts: Vec<&str> = line.split(' ').collect();
        if parts.len() < 4 {
            warn!(
                "Skipping short index line in {}: {:?}",
                path.as_ref().display(),
                line
            );
            continue;
        }

        let hash = parts.pop().unwrap_or_default().to_string();
        let ts = parts.pop().and_then(|t| t.parse::<u64>().ok()).unwrap_or(0);
        let size = match parts.pop().and_then(|s| s.parse::<u64>().ok()) {
            Some(size) => size,
            None => {
                warn!(
                    "Skipping index line with unparsable size in {}: {:?}",
                    path.as_ref().display(),
                    line
                );
                continue;
            }
        };
        let entry_path = parts.join(" ");

        if entry_path.ends_with(".xml") {
            entries.push(CatEntry {
                path: entry_path,
                offset,
                size,
                ts,
                hash,
            });
        }

        offset += size;
    }

    debug!(
        "{}: found {} XML entries",
        path.as_ref().display(),
        entries.len()
    );

    Ok(entries)
}

/// Check whether a catalog path is a signature catalog (`*_sig.cat`),
/// which carries no game data and is excluded from scans.
pub fn is_signature_catalog(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.ends_with("_sig"))
        .unwrap_or(false)
}

/// Derive the sibling payload path for a catalog path (`01.cat` -> `01.dat`)
pub fn payload_path(cat_path: &Path) -> std::path::PathBuf {
    cat_path.with_extension(DAT_EXT)
}
