//! Library view model: the list of documents as the library screen sees it.
//!
//! Reconciles stored metadata with on-disk page counts, keeps a progress
//! ratio per document from ingestion events, and drives the coordinator so
//! that any document left in `processing` (for instance after a restart) is
//! picked up again.

use crate::config::AppConfig;
use crate::ingestion::{IngestionCoordinator, IngestionEvent, progress_ratio};
use crate::service::{ProcessingService, ServiceError};
use crate::store::{BookStatus, Document, LibraryStore, NewBook, StoreError, with_store};
use anyhow::Context;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("source file is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("unknown book: {0}")]
    UnknownBook(String),
    #[error("book {0} has not failed; nothing to retry")]
    NotFailed(String),
    #[error("book {0} is still being prepared")]
    StillPreparing(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Applies what the page file says to the metadata: a `processing` document
/// whose pages are all on disk is `ready`. Everything else is unchanged.
pub fn reconcile(book: &Document, pages_on_disk: usize) -> Document {
    let mut book = book.clone();
    if book.status == BookStatus::Processing && pages_on_disk >= book.total_pages as usize {
        book.status = BookStatus::Ready;
    }
    book
}

/// One row of the library list.
#[derive(Debug, Clone, Serialize, PartialEq, TS)]
#[ts(export)]
pub struct LibraryEntryView {
    pub id: String,
    pub name: String,
    pub status: BookStatus,
    pub total_pages: u32,
    pub pages_ready: usize,
    pub progress: f64,
    pub last_page: u32,
    pub completed: bool,
    pub bookmarks: usize,
    pub in_flight: bool,
}

pub struct LibraryViewModel<S: ProcessingService> {
    store: Arc<LibraryStore>,
    service: Arc<S>,
    coordinator: IngestionCoordinator<S>,
    max_source_bytes: u64,
    books: Vec<Document>,
    pages_ready: HashMap<String, usize>,
    progress: HashMap<String, f64>,
    notices: Vec<String>,
}

impl<S: ProcessingService> LibraryViewModel<S> {
    pub fn new(
        store: Arc<LibraryStore>,
        service: Arc<S>,
        coordinator: IngestionCoordinator<S>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            service,
            coordinator,
            max_source_bytes: config.max_source_bytes,
            books: Vec::new(),
            pages_ready: HashMap::new(),
            progress: HashMap::new(),
            notices: Vec::new(),
        }
    }

    pub fn coordinator(&self) -> &IngestionCoordinator<S> {
        &self.coordinator
    }

    pub fn books(&self) -> &[Document] {
        &self.books
    }

    /// Reloads metadata and recomputes progress from the page files,
    /// persisting any status that reconciliation corrected.
    pub async fn refresh(&mut self) -> Result<(), LibraryError> {
        let (books, counts) = with_store(&self.store, |store| {
            let books = store.load_library();
            let counts: Vec<usize> = books.iter().map(|book| store.page_count(&book.id)).collect();
            (books, counts)
        })
        .await?;

        let mut reconciled = Vec::with_capacity(books.len());
        self.pages_ready.clear();
        self.progress.clear();
        for (book, on_disk) in books.iter().zip(counts) {
            let healed = reconcile(book, on_disk);
            if healed.status != book.status {
                info!(book_id = %book.id, on_disk, "Reconciled finished book to ready");
                let id = book.id.clone();
                let status = healed.status;
                with_store(&self.store, move |store| store.update_book_status(&id, status))
                    .await??;
            }
            if matches!(healed.status, BookStatus::Processing | BookStatus::Ready) {
                self.progress
                    .insert(healed.id.clone(), progress_ratio(on_disk, healed.total_pages));
            }
            self.pages_ready.insert(healed.id.clone(), on_disk);
            reconciled.push(healed);
        }
        debug!(books = reconciled.len(), "Refreshed library");
        self.books = reconciled;
        Ok(())
    }

    pub fn entries(&self) -> Vec<LibraryEntryView> {
        self.books
            .iter()
            .map(|book| LibraryEntryView {
                id: book.id.clone(),
                name: book.name.clone(),
                status: book.status,
                total_pages: book.total_pages,
                pages_ready: self.pages_ready.get(&book.id).copied().unwrap_or(0),
                progress: self.progress.get(&book.id).copied().unwrap_or(0.0),
                last_page: book.last_page,
                completed: book.completed,
                bookmarks: book.bookmarks.len(),
                in_flight: self.coordinator.is_in_flight(&book.id),
            })
            .collect()
    }

    /// User-visible messages raised since the last call, oldest first.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Uploads `path` for processing and records the new document. Files
    /// above the size limit are refused before anything is sent.
    pub async fn add_document(&mut self, path: &Path) -> Result<String, LibraryError> {
        let size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("reading metadata of {}", path.display()))?
            .len();
        if size > self.max_source_bytes {
            warn!(path = %path.display(), size, limit = self.max_source_bytes, "Rejected oversized source");
            return Err(LibraryError::TooLarge {
                size,
                limit: self.max_source_bytes,
            });
        }
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let receipt = self.service.start_processing(&file_name, bytes).await?;
        let original = path.to_path_buf();
        let id = receipt.book_id.clone();
        let cached = with_store(&self.store, move |store| store.cache_source(&id, &original)).await??;
        let book = NewBook {
            id: receipt.book_id.clone(),
            name: receipt.original_name,
            total_pages: receipt.total_pages,
            source_uri: Some(cached.to_string_lossy().into_owned()),
        };
        let created = with_store(&self.store, move |store| store.save_book(book)).await??;
        info!(book_id = %receipt.book_id, created, total_pages = receipt.total_pages, "Added document");

        self.refresh().await?;
        self.resume_pending();
        Ok(receipt.book_id)
    }

    /// Cancels any in-flight ingestion, then deletes the document and its
    /// files. Returns whether an entry existed.
    pub async fn remove_document(&mut self, book_id: &str) -> Result<bool, LibraryError> {
        if self.coordinator.cancel(book_id).is_some() {
            debug!(book_id, "Cancelled ingestion before removal");
        }
        let id = book_id.to_string();
        let removed = with_store(&self.store, move |store| store.remove_book(&id)).await??;
        self.books.retain(|book| book.id != book_id);
        self.pages_ready.remove(book_id);
        self.progress.remove(book_id);
        Ok(removed)
    }

    /// Moves a failed document back to `processing` and restarts ingestion
    /// at the first page not on disk.
    pub async fn retry(&mut self, book_id: &str) -> Result<(), LibraryError> {
        let book = self.lookup(book_id).await?;
        if book.status != BookStatus::Failed {
            return Err(LibraryError::NotFailed(book_id.to_string()));
        }
        let id = book_id.to_string();
        with_store(&self.store, move |store| {
            store.update_book_status(&id, BookStatus::Processing)
        })
        .await??;
        info!(book_id, "Retrying ingestion");
        self.refresh().await?;
        self.coordinator.start(book_id);
        Ok(())
    }

    /// The document to hand to the player, once its first page exists.
    pub async fn open_document(&self, book_id: &str) -> Result<Document, LibraryError> {
        let book = self.lookup(book_id).await?;
        let id = book_id.to_string();
        let on_disk = with_store(&self.store, move |store| store.page_count(&id)).await?;
        if on_disk == 0 {
            info!(book_id, "Document opened before its first page is ready");
            return Err(LibraryError::StillPreparing(book_id.to_string()));
        }
        Ok(book)
    }

    /// Starts ingestion for the first `processing` document without an
    /// in-flight run. At most one run is started per call.
    pub fn resume_pending(&mut self) -> Option<String> {
        let pending = self
            .books
            .iter()
            .find(|book| {
                book.status == BookStatus::Processing && !self.coordinator.is_in_flight(&book.id)
            })?
            .id
            .clone();
        if self.coordinator.start(&pending) {
            info!(book_id = %pending, "Resumed pending ingestion");
            Some(pending)
        } else {
            None
        }
    }

    /// Folds one coordinator event into the view. Terminal events reload the
    /// library and resume the next pending document, whose id is returned.
    pub async fn handle_event(
        &mut self,
        event: &IngestionEvent,
    ) -> Result<Option<String>, LibraryError> {
        match event {
            IngestionEvent::Progress {
                book_id,
                processed,
                ratio,
                ..
            } => {
                self.pages_ready.insert(book_id.clone(), *processed);
                self.progress.insert(book_id.clone(), *ratio);
            }
            IngestionEvent::LanguageMismatch {
                book_id,
                detected,
                expected,
            } => {
                let name = self
                    .books
                    .iter()
                    .find(|book| &book.id == book_id)
                    .map_or(book_id.as_str(), |book| book.name.as_str());
                self.notices.push(format!(
                    "{name}: detected language '{detected}' differs from '{expected}'; reading may sound wrong"
                ));
            }
            IngestionEvent::Ready { .. }
            | IngestionEvent::Failed { .. }
            | IngestionEvent::Cancelled { .. } => {}
        }
        if !event.is_terminal() {
            return Ok(None);
        }
        debug!(book_id = event.book_id(), "Ingestion run ended; reloading library");
        if let IngestionEvent::Failed { book_id, reason } = event {
            self.notices.push(format!("{book_id} failed: {reason}"));
        }
        self.refresh().await?;
        Ok(self.resume_pending())
    }

    /// Joins the text of every stored page and writes the generated document
    /// to `dest`. Returns the number of bytes written.
    pub async fn export_text(&self, book_id: &str, dest: &Path) -> Result<usize, LibraryError> {
        self.lookup(book_id).await?;
        let id = book_id.to_string();
        let pages = with_store(&self.store, move |store| store.load_book_pages(&id))
            .await?
            .filter(|pages| !pages.is_empty())
            .ok_or_else(|| LibraryError::StillPreparing(book_id.to_string()))?;
        let text = pages
            .iter()
            .map(|page| page.text.trim())
            .collect::<Vec<_>>()
            .join("\n\n");
        let bytes = self.service.generate_output(&text).await?;
        tokio::fs::write(dest, &bytes)
            .await
            .with_context(|| format!("writing {}", dest.display()))?;
        info!(book_id, dest = %dest.display(), bytes = bytes.len(), "Exported document");
        Ok(bytes.len())
    }

    /// Sends a recorded voice note for transcription.
    pub async fn transcribe_note(&self, audio_path: &Path) -> Result<String, LibraryError> {
        let bytes = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("reading {}", audio_path.display()))?;
        let file_name = audio_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "note.m4a".to_string());
        let text = self.service.transcribe_audio(&file_name, bytes).await?;
        Ok(text.trim().to_string())
    }

    pub fn source_path(&self, book_id: &str) -> Option<PathBuf> {
        self.books
            .iter()
            .find(|book| book.id == book_id)
            .and_then(|book| book.source_uri.as_ref())
            .map(PathBuf::from)
    }

    async fn lookup(&self, book_id: &str) -> Result<Document, LibraryError> {
        let id = book_id.to_string();
        with_store(&self.store, move |store| store.book(&id))
            .await?
            .ok_or_else(|| LibraryError::UnknownBook(book_id.to_string()))
    }
}
