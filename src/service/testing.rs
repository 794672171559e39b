use super::{ProcessingService, ServiceError, UploadReceipt};
use crate::geometry::{Rect, Size};
use crate::store::{PageRecord, WordBox};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

struct Hold {
    page_number: u32,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[derive(Default)]
struct Script {
    failing: HashSet<u32>,
    last_page: Option<u32>,
    language: Option<String>,
    delay: Option<Duration>,
    hold: Option<Hold>,
    fetched: Vec<(String, u32)>,
    uploads: Vec<String>,
    upload_error: Option<String>,
    transcript: Option<String>,
}

/// In-memory processing service with scripted failures and pauses.
pub(crate) struct FakeService {
    total_pages: u32,
    script: Mutex<Script>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeService {
    pub(crate) fn new(total_pages: u32) -> Self {
        Self {
            total_pages,
            script: Mutex::new(Script {
                language: Some("pt".to_string()),
                ..Script::default()
            }),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("fake service lock")
    }

    pub(crate) fn fail_page(&self, page_number: u32) {
        self.script().failing.insert(page_number);
    }

    pub(crate) fn clear_failures(&self) {
        self.script().failing.clear();
    }

    /// Pages past `last_page` are answered with a rejection.
    pub(crate) fn truncate_after(&self, last_page: u32) {
        self.script().last_page = Some(last_page);
    }

    pub(crate) fn set_language(&self, language: &str) {
        self.script().language = Some(language.to_string());
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.script().delay = Some(delay);
    }

    pub(crate) fn reject_uploads(&self, reason: &str) {
        self.script().upload_error = Some(reason.to_string());
    }

    pub(crate) fn set_transcript(&self, text: &str) {
        self.script().transcript = Some(text.to_string());
    }

    /// Parks the next fetch of `page_number` until `release` is notified;
    /// `entered` fires once the fetch is parked. The hold is used once.
    pub(crate) fn hold_page(&self, page_number: u32) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.script().hold = Some(Hold {
            page_number,
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        });
        (entered, release)
    }

    pub(crate) fn fetched_pages(&self, book_id: &str) -> Vec<u32> {
        self.script()
            .fetched
            .iter()
            .filter(|(id, _)| id == book_id)
            .map(|(_, page)| *page)
            .collect()
    }

    pub(crate) fn uploads(&self) -> Vec<String> {
        self.script().uploads.clone()
    }

    pub(crate) fn max_concurrent_fetches(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn page(&self, page_number: u32, language: Option<String>) -> PageRecord {
        let text = format!("pagina {page_number} texto");
        let words = text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| WordBox {
                text: Some(word.to_string()),
                rect: Rect::new(
                    40.0 + i as f32 * 80.0,
                    60.0,
                    100.0 + i as f32 * 80.0,
                    80.0,
                ),
            })
            .collect();
        PageRecord {
            page_number,
            text,
            words,
            size: Size::new(600.0, 800.0),
            language,
            ocr_fallback: false,
        }
    }
}

impl ProcessingService for FakeService {
    async fn start_processing(
        &self,
        file_name: &str,
        _bytes: Vec<u8>,
    ) -> Result<UploadReceipt, ServiceError> {
        let mut script = self.script();
        if let Some(reason) = &script.upload_error {
            return Err(ServiceError::Rejected(reason.clone()));
        }
        script.uploads.push(file_name.to_string());
        Ok(UploadReceipt {
            book_id: format!("doc-{}", script.uploads.len()),
            original_name: file_name.to_string(),
            total_pages: self.total_pages,
        })
    }

    async fn fetch_page(&self, book_id: &str, page_number: u32) -> Result<PageRecord, ServiceError> {
        let (hold, delay, failing, language) = {
            let mut script = self.script();
            script.fetched.push((book_id.to_string(), page_number));
            let hold = match script.hold.take() {
                Some(hold) if hold.page_number == page_number => Some((hold.entered, hold.release)),
                other => {
                    script.hold = other;
                    None
                }
            };
            let failing = script.failing.contains(&page_number)
                || script.last_page.is_some_and(|last| page_number > last);
            (hold, script.delay, failing, script.language.clone())
        };

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if let Some((entered, release)) = hold {
            entered.notify_one();
            release.notified().await;
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if failing {
            return Err(ServiceError::Rejected(format!("page {page_number} unavailable")));
        }
        Ok(self.page(page_number, language))
    }

    async fn transcribe_audio(&self, _file_name: &str, _bytes: Vec<u8>) -> Result<String, ServiceError> {
        self.script()
            .transcript
            .clone()
            .ok_or_else(|| ServiceError::Rejected("no speech detected".to_string()))
    }

    async fn generate_output(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        Ok(format!("%PDF-fake\n{text}").into_bytes())
    }
}
