//! Persistent library store.
//!
//! The metadata for every document lives in a single `library.json` record
//! carrying a revision counter. Each document also owns a directory holding
//! its append-only `pages.json` array and a cached copy of the source file.
//!
//! The store is the only writer of the metadata record. Every mutation runs
//! its read-modify-write under one mutex and commits through
//! [`LibraryStore::commit`], which refuses to write when the stored revision
//! moved since the snapshot was taken.

mod paths;
mod records;

pub use paths::{book_dir, library_path, pages_path};
pub use records::{BookStatus, Document, NewBook, PageRecord, WordBox};

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("library revision conflict: expected {expected}, found {found}")]
    Conflict { expected: u64, found: u64 },
    #[error("unknown book: {0}")]
    UnknownBook(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LibraryRecord {
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    books: Vec<Document>,
}

/// Copy-on-read view of the metadata record.
#[derive(Debug, Clone, Default)]
pub struct LibrarySnapshot {
    pub revision: u64,
    pub books: Vec<Document>,
}

#[derive(Debug)]
pub struct LibraryStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl LibraryStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(paths::BOOKS_DIR))?;
        info!(root = %root.display(), "Opened library store");
        Ok(Self {
            root,
            lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All documents in insertion order. Unreadable or malformed metadata is
    /// logged and treated as an empty library.
    pub fn load_library(&self) -> Vec<Document> {
        self.load_snapshot().books
    }

    pub fn load_snapshot(&self) -> LibrarySnapshot {
        let record = self.read_record();
        LibrarySnapshot {
            revision: record.revision,
            books: record.books,
        }
    }

    pub fn book(&self, book_id: &str) -> Option<Document> {
        self.load_library()
            .into_iter()
            .find(|book| book.id == book_id)
    }

    /// Writes `books` as the new metadata record if nobody committed since
    /// `expected_revision` was read. Returns the new revision.
    pub fn commit(&self, expected_revision: u64, books: Vec<Document>) -> Result<u64, StoreError> {
        let _guard = self.guard();
        self.commit_locked(expected_revision, books)
    }

    fn commit_locked(&self, expected_revision: u64, books: Vec<Document>) -> Result<u64, StoreError> {
        let found = self.read_record().revision;
        if found != expected_revision {
            warn!(
                expected = expected_revision,
                found, "Rejected library write from stale snapshot"
            );
            return Err(StoreError::Conflict {
                expected: expected_revision,
                found,
            });
        }
        let record = LibraryRecord {
            revision: found + 1,
            books,
        };
        write_atomic(&library_path(&self.root), &serde_json::to_vec_pretty(&record)?)?;
        Ok(record.revision)
    }

    fn mutate<R>(
        &self,
        apply: impl FnOnce(&mut Vec<Document>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let _guard = self.guard();
        let snapshot = self.read_record();
        let mut books = snapshot.books;
        let result = apply(&mut books)?;
        self.commit_locked(snapshot.revision, books)?;
        Ok(result)
    }

    fn mutate_book(
        &self,
        book_id: &str,
        apply: impl FnOnce(&mut Document),
    ) -> Result<(), StoreError> {
        self.mutate(|books| {
            let book = books
                .iter_mut()
                .find(|book| book.id == book_id)
                .ok_or_else(|| StoreError::UnknownBook(book_id.to_string()))?;
            apply(book);
            Ok(())
        })
    }

    /// Creates the entry and an empty page file. Replaying an add for an id
    /// that already exists is a no-op; returns whether an entry was created.
    pub fn save_book(&self, book: NewBook) -> Result<bool, StoreError> {
        // Held until the page file exists, so no append can land before it.
        let _guard = self.guard();
        let snapshot = self.read_record();
        if snapshot.books.iter().any(|existing| existing.id == book.id) {
            debug!(book_id = %book.id, "Ignoring duplicate library entry");
            return Ok(false);
        }
        let book_id = book.id.clone();
        let mut books = snapshot.books;
        books.push(book.into_document());
        self.commit_locked(snapshot.revision, books)?;

        let pages = pages_path(&self.root, &book_id);
        if let Some(parent) = pages.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&pages, b"[]")?;
        info!(book_id = %book_id, "Saved new library entry");
        Ok(true)
    }

    pub fn update_book_status(&self, book_id: &str, status: BookStatus) -> Result<(), StoreError> {
        self.mutate_book(book_id, |book| book.status = status)?;
        info!(book_id, %status, "Updated book status");
        Ok(())
    }

    /// Deletes the entry, its page file and its cached source. Files that are
    /// already gone are not an error. Returns whether an entry was removed.
    pub fn remove_book(&self, book_id: &str) -> Result<bool, StoreError> {
        let removed = self.mutate(|books| {
            let before = books.len();
            books.retain(|book| book.id != book_id);
            Ok(books.len() != before)
        })?;
        match fs::remove_dir_all(book_dir(&self.root, book_id)) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        info!(book_id, removed, "Removed library entry");
        Ok(removed)
    }

    /// Pages stored so far, in order, or `None` when the page file is missing
    /// or unreadable.
    pub fn load_book_pages(&self, book_id: &str) -> Option<Vec<PageRecord>> {
        let path = pages_path(&self.root, book_id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!(book_id, path = %path.display(), "Failed to read page file: {err}");
                }
                return None;
            }
        };
        match serde_json::from_slice(&data) {
            Ok(pages) => Some(pages),
            Err(err) => {
                warn!(book_id, path = %path.display(), "Malformed page file: {err}");
                None
            }
        }
    }

    /// Number of page records on disk; the only source of "pages processed".
    pub fn page_count(&self, book_id: &str) -> usize {
        self.load_book_pages(book_id).map_or(0, |pages| pages.len())
    }

    /// Appends one page record and returns the new length of the array.
    /// Fails once the document has been removed from the library.
    pub fn append_page_data(&self, book_id: &str, page: PageRecord) -> Result<usize, StoreError> {
        let _guard = self.guard();
        if !self.read_record().books.iter().any(|book| book.id == book_id) {
            return Err(StoreError::UnknownBook(book_id.to_string()));
        }
        let mut pages = self.load_book_pages(book_id).unwrap_or_default();
        pages.push(page);
        let path = pages_path(&self.root, book_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&path, &serde_json::to_vec(&pages)?)?;
        debug!(book_id, count = pages.len(), "Appended page record");
        Ok(pages.len())
    }

    /// Records the reader's position and adds listening time. `completed`
    /// flips on once the last page is reached and never flips back.
    pub fn update_book_state(
        &self,
        book_id: &str,
        page_index: u32,
        listened_delta_secs: u64,
    ) -> Result<(), StoreError> {
        self.mutate_book(book_id, |book| {
            book.last_page = page_index;
            book.listened_secs = book.listened_secs.saturating_add(listened_delta_secs);
            if book.total_pages > 0 && page_index + 1 >= book.total_pages {
                book.completed = true;
            }
        })?;
        debug!(book_id, page_index, listened_delta_secs, "Updated reading state");
        Ok(())
    }

    pub fn add_bookmark(&self, book_id: &str, page_index: u32) -> Result<(), StoreError> {
        self.mutate_book(book_id, |book| {
            book.bookmarks.insert(page_index);
        })
    }

    pub fn remove_bookmark(&self, book_id: &str, page_index: u32) -> Result<(), StoreError> {
        self.mutate_book(book_id, |book| {
            book.bookmarks.remove(&page_index);
        })
    }

    /// Stores a note for the page; blank text deletes the note.
    pub fn save_annotation(
        &self,
        book_id: &str,
        page_index: u32,
        text: &str,
    ) -> Result<(), StoreError> {
        let text = text.trim();
        self.mutate_book(book_id, |book| {
            if text.is_empty() {
                book.annotations.remove(&page_index);
            } else {
                book.annotations.insert(page_index, text.to_string());
            }
        })
    }

    pub fn remove_annotation(&self, book_id: &str, page_index: u32) -> Result<(), StoreError> {
        self.mutate_book(book_id, |book| {
            book.annotations.remove(&page_index);
        })
    }

    /// Copies the original file into the document's directory.
    pub fn cache_source(&self, book_id: &str, original: &Path) -> Result<PathBuf, StoreError> {
        let target = paths::source_path(&self.root, book_id, original);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(original, &target)?;
        debug!(book_id, path = %target.display(), "Cached source file");
        Ok(target)
    }

    fn read_record(&self) -> LibraryRecord {
        let path = library_path(&self.root);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return LibraryRecord::default(),
            Err(err) => {
                warn!(path = %path.display(), "Failed to read library; treating as empty: {err}");
                return LibraryRecord::default();
            }
        };
        match serde_json::from_slice(&data) {
            Ok(record) => record,
            Err(err) => {
                warn!(path = %path.display(), "Malformed library; treating as empty: {err}");
                LibraryRecord::default()
            }
        }
    }
}

/// Runs `op` against the store on tokio's blocking pool.
pub async fn with_store<R, F>(store: &Arc<LibraryStore>, op: F) -> Result<R, StoreError>
where
    F: FnOnce(&LibraryStore) -> R + Send + 'static,
    R: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|err| StoreError::Io(std::io::Error::other(err)))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let tmp = paths::temp_sibling(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
