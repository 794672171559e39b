//! On-disk layout of the library.
//!
//! Document identifiers are opaque strings handed out by the processing
//! service, so each document's directory is named by a hash of its id to avoid
//! filesystem issues.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const LIBRARY_FILE: &str = "library.json";
pub const BOOKS_DIR: &str = "books";
pub const PAGES_FILE: &str = "pages.json";
const SOURCE_STEM: &str = "source";

pub fn library_path(root: &Path) -> PathBuf {
    root.join(LIBRARY_FILE)
}

pub fn book_dir(root: &Path, book_id: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(book_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    root.join(BOOKS_DIR).join(hash)
}

pub fn pages_path(root: &Path, book_id: &str) -> PathBuf {
    book_dir(root, book_id).join(PAGES_FILE)
}

/// Cached copy of the original file, keeping its extension when it has one.
pub fn source_path(root: &Path, book_id: &str, original: &Path) -> PathBuf {
    let name = match original.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{SOURCE_STEM}.{}", ext.to_ascii_lowercase()),
        None => SOURCE_STEM.to_string(),
    };
    book_dir(root, book_id).join(name)
}

pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
