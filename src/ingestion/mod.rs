//! Incremental page ingestion.
//!
//! For each document in `processing` status the coordinator fetches one page
//! at a time from the processing service and appends it to the document's
//! page file until every page is stored. The number of stored pages is the
//! only progress counter, so a run always resumes at `stored + 1` and never
//! refetches or skips a page.
//!
//! At most one run exists per document. The registry maps a document id to
//! its in-flight entry (run id, cancellation token, task handle); the entry
//! is inserted by [`IngestionCoordinator::start`] and removed exactly once,
//! either by the run itself when it terminates or by
//! [`IngestionCoordinator::cancel`]. Cancellation is polled once per page,
//! so a cancelled run stops after at most the fetch already in flight.

mod events;

pub use events::{IngestionEvent, language_matches, progress_ratio};

use crate::cancellation::CancellationToken;
use crate::config::AppConfig;
use crate::service::{ProcessingService, ServiceError};
use crate::store::{BookStatus, LibraryStore, StoreError, with_store};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub page_timeout: Duration,
    pub expected_locale: String,
}

impl IngestionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            page_timeout: config.page_fetch_timeout(),
            expected_locale: config.expected_locale.clone(),
        }
    }
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

struct InFlight {
    run_id: u64,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

enum Outcome {
    Ready,
    Failed(String),
    Cancelled(&'static str),
}

struct Inner<S> {
    store: Arc<LibraryStore>,
    service: Arc<S>,
    settings: IngestionSettings,
    registry: Mutex<HashMap<String, InFlight>>,
    next_run_id: AtomicU64,
    events: broadcast::Sender<IngestionEvent>,
}

pub struct IngestionCoordinator<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for IngestionCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ProcessingService> IngestionCoordinator<S> {
    pub fn new(store: Arc<LibraryStore>, service: Arc<S>, settings: IngestionSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                service,
                settings,
                registry: Mutex::new(HashMap::new()),
                next_run_id: AtomicU64::new(1),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IngestionEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_in_flight(&self, book_id: &str) -> bool {
        self.inner.registry().contains_key(book_id)
    }

    pub fn in_flight_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.registry().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Spawns an ingestion run for `book_id` unless one is already in flight.
    /// Returns whether a run was started. Must be called inside a tokio
    /// runtime.
    pub fn start(&self, book_id: &str) -> bool {
        let mut registry = self.inner.registry();
        if registry.contains_key(book_id) {
            debug!(book_id, "Ingestion already in flight; ignoring start");
            return false;
        }
        let run_id = self.inner.next_run_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        let task_book_id = book_id.to_string();
        let task_cancel = cancel.clone();
        // The run cannot clear its entry before this guard drops, so the
        // handle is always recorded first.
        let handle = tokio::spawn(async move { inner.run(task_book_id, run_id, task_cancel).await });
        registry.insert(
            book_id.to_string(),
            InFlight {
                run_id,
                cancel,
                handle: Some(handle),
            },
        );
        info!(book_id, run_id, "Started ingestion");
        true
    }

    /// Clears the in-flight entry and signals the run to stop at its next
    /// checkpoint. Returns the run's task handle so callers may await it.
    pub fn cancel(&self, book_id: &str) -> Option<JoinHandle<()>> {
        let entry = self.inner.registry().remove(book_id)?;
        entry.cancel.cancel();
        info!(book_id, run_id = entry.run_id, "Cancelled ingestion");
        entry.handle
    }

    /// Waits for the current run of `book_id`, if any, to terminate.
    pub async fn wait_idle(&self, book_id: &str) {
        let handle = self
            .inner
            .registry()
            .get_mut(book_id)
            .and_then(|entry| entry.handle.take());
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(book_id, "Ingestion task ended abnormally: {err}");
            }
        }
    }
}

impl<S: ProcessingService> Inner<S> {
    fn registry(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the entry only if it still belongs to `run_id`; a cancel or a
    /// newer run may already own the slot.
    fn clear_marker(&self, book_id: &str, run_id: u64) {
        let mut registry = self.registry();
        if registry.get(book_id).map(|entry| entry.run_id) == Some(run_id) {
            registry.remove(book_id);
        }
    }

    fn emit(&self, event: IngestionEvent) {
        // No subscribers is fine; events are advisory.
        let _ = self.events.send(event);
    }

    async fn on_store<R, F>(&self, op: F) -> Result<R, StoreError>
    where
        F: FnOnce(&LibraryStore) -> R + Send + 'static,
        R: Send + 'static,
    {
        with_store(&self.store, op).await
    }

    async fn run(self: Arc<Self>, book_id: String, run_id: u64, cancel: CancellationToken) {
        let outcome = self.ingest(&book_id, &cancel).await;
        self.clear_marker(&book_id, run_id);
        match outcome {
            Outcome::Ready => {
                info!(book_id = %book_id, run_id, "Ingestion complete");
                self.emit(IngestionEvent::Ready { book_id });
            }
            Outcome::Failed(reason) => {
                warn!(book_id = %book_id, run_id, %reason, "Ingestion failed");
                self.emit(IngestionEvent::Failed { book_id, reason });
            }
            Outcome::Cancelled(stage) => {
                info!(book_id = %book_id, run_id, stage, "Ingestion stopped");
                self.emit(IngestionEvent::Cancelled { book_id });
            }
        }
    }

    async fn ingest(&self, book_id: &str, cancel: &CancellationToken) -> Outcome {
        let id = book_id.to_string();
        let stored = match self.on_store(move |store| store.page_count(&id)).await {
            Ok(stored) => stored,
            Err(err) => return self.fail(book_id, format!("reading page count: {err}")).await,
        };
        let mut page_number = stored as u32 + 1;
        info!(book_id, resume_from = page_number, "Resuming ingestion");

        loop {
            if let Err(cancelled) = cancel.checkpoint("before_fetch") {
                return Outcome::Cancelled(cancelled.stage);
            }
            let id = book_id.to_string();
            let book = match self.on_store(move |store| store.book(&id)).await {
                Ok(Some(book)) => book,
                Ok(None) => return Outcome::Cancelled("removed"),
                Err(err) => return self.fail(book_id, format!("reading library: {err}")).await,
            };
            if book.status != BookStatus::Processing {
                debug!(book_id, status = %book.status, "Document is not processing; stopping");
                return Outcome::Cancelled("not_processing");
            }
            let total = book.total_pages;

            if page_number > total {
                let id = book_id.to_string();
                return match self
                    .on_store(move |store| store.update_book_status(&id, BookStatus::Ready))
                    .await
                    .and_then(|result| result)
                {
                    Ok(()) => Outcome::Ready,
                    Err(StoreError::UnknownBook(_)) => Outcome::Cancelled("removed"),
                    Err(err) => self.fail(book_id, format!("marking ready: {err}")).await,
                };
            }

            let fetched = match tokio::time::timeout(
                self.settings.page_timeout,
                self.service.fetch_page(book_id, page_number),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ServiceError::Timeout(self.settings.page_timeout)),
            };

            if let Err(cancelled) = cancel.checkpoint("after_fetch") {
                return Outcome::Cancelled(cancelled.stage);
            }
            let page = match fetched {
                Ok(page) => page,
                Err(err) => {
                    return self
                        .fail(book_id, format!("fetching page {page_number}: {err}"))
                        .await;
                }
            };

            let detected = page.language.clone();
            let id = book_id.to_string();
            let count = match self
                .on_store(move |store| store.append_page_data(&id, page))
                .await
                .and_then(|result| result)
            {
                Ok(count) => count,
                Err(StoreError::UnknownBook(_)) => return Outcome::Cancelled("removed"),
                Err(err) => {
                    return self
                        .fail(book_id, format!("storing page {page_number}: {err}"))
                        .await;
                }
            };
            if count != page_number as usize {
                return self
                    .fail(
                        book_id,
                        format!("page file holds {count} records after storing page {page_number}"),
                    )
                    .await;
            }

            let ratio = progress_ratio(count, total);
            debug!(book_id, page_number, total, ratio, "Stored page");
            self.emit(IngestionEvent::Progress {
                book_id: book_id.to_string(),
                processed: count,
                total,
                ratio,
            });

            if page_number == 1 {
                self.check_language(book_id, detected.as_deref());
            }

            page_number += 1;
            tokio::task::yield_now().await;
        }
    }

    fn check_language(&self, book_id: &str, detected: Option<&str>) {
        let Some(detected) = detected else {
            return;
        };
        let expected = &self.settings.expected_locale;
        if !language_matches(detected, expected) {
            warn!(book_id, detected, expected = %expected, "Document language differs from locale");
            self.emit(IngestionEvent::LanguageMismatch {
                book_id: book_id.to_string(),
                detected: detected.to_string(),
                expected: expected.clone(),
            });
        }
    }

    async fn fail(&self, book_id: &str, reason: String) -> Outcome {
        let id = book_id.to_string();
        match self
            .on_store(move |store| store.update_book_status(&id, BookStatus::Failed))
            .await
            .and_then(|result| result)
        {
            Ok(()) => Outcome::Failed(reason),
            Err(StoreError::UnknownBook(_)) => Outcome::Cancelled("removed"),
            Err(err) => {
                warn!(book_id, "Could not record failed status: {err}");
                Outcome::Failed(reason)
            }
        }
    }
}
