//! File Locator (§4.7): resolves a client-reported path to a file on
//! this process's filesystem. External download clients and our
//! process may see the filesystem through different mount points, so a
//! client-reported path is a hint, not a guarantee — this module is
//! the reconciliation step both the Submission Monitor's lost-job
//! handling (§4.5 step 3) and the Import Pipeline's submission-driven
//! entry point (§4.6) call before giving up on a completed download.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use walkdir::WalkDir;

/// Default bounded-depth search limit (`DOWNLOAD_FILE_SEARCH_DEPTH`).
pub const DEFAULT_SEARCH_DEPTH: usize = 3;

const ACCEPTED_EXTENSIONS: &[&str] = &["pdf", "epub"];

/// Resolves `hint` (a client-reported path) to a local file.
///
/// 1. If `hint` is absolute and exists as a file, returns it directly.
/// 2. If `hint` is absolute and exists as a directory, returns the
///    first `.pdf`/`.epub` found within it.
/// 3. Otherwise takes `hint`'s basename and searches breadth-first
///    within `downloads_dir`, bounded to `max_depth`: a file match
///    returns directly, a directory match returns the first
///    `.pdf`/`.epub` inside it.
/// 4. Returns `None` if nothing matches.
#[must_use]
#[instrument(skip(downloads_dir), fields(hint = %hint.display()))]
pub fn locate(hint: &Path, downloads_dir: &Path, max_depth: usize) -> Option<PathBuf> {
    if hint.is_absolute() {
        if hint.is_file() {
            return Some(hint.to_path_buf());
        }
        if hint.is_dir() {
            return first_document_in(hint);
        }
    }

    let basename = hint.file_name()?;
    debug!(basename = ?basename, depth = max_depth, "searching downloads directory for basename");

    for entry in WalkDir::new(downloads_dir).max_depth(max_depth).into_iter().filter_map(Result::ok) {
        if entry.file_name() != basename {
            continue;
        }
        let path = entry.path();
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        if path.is_dir() {
            if let Some(found) = first_document_in(path) {
                return Some(found);
            }
        }
    }

    None
}

/// Returns the first `.pdf`/`.epub` file found anywhere under `dir`
/// (unbounded depth — used once a directory match has already been
/// found, not for the outer basename search).
fn first_document_in(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| is_accepted_document(entry.path()))
        .map(|entry| entry.path().to_path_buf())
}

fn is_accepted_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.iter().any(|accepted| accepted.eq_ignore_ascii_case(ext)))
}
