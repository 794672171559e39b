use pagecast::config::AppConfig;
use pagecast::geometry::Size;
use pagecast::ingestion::{IngestionCoordinator, IngestionEvent, IngestionSettings};
use pagecast::library::LibraryViewModel;
use pagecast::service::{ProcessingService, ServiceError, UploadReceipt};
use pagecast::store::{BookStatus, LibraryStore, NewBook, PageRecord};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;

fn unique_temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("pagecast_it_{name}_{nanos}"))
}

/// Serves `total_pages` pages; optionally parks every fetch until released.
struct ScriptedService {
    total_pages: u32,
    fetched: Mutex<Vec<u32>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    gated: AtomicBool,
    gate: Notify,
}

impl ScriptedService {
    fn new(total_pages: u32) -> Self {
        Self {
            total_pages,
            fetched: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            gated: AtomicBool::new(false),
            gate: Notify::new(),
        }
    }

    fn fetched(&self) -> Vec<u32> {
        self.fetched.lock().expect("lock").clone()
    }
}

impl ProcessingService for ScriptedService {
    async fn start_processing(
        &self,
        file_name: &str,
        _bytes: Vec<u8>,
    ) -> Result<UploadReceipt, ServiceError> {
        Ok(UploadReceipt {
            book_id: "remote-1".to_string(),
            original_name: file_name.to_string(),
            total_pages: self.total_pages,
        })
    }

    async fn fetch_page(&self, _book_id: &str, page_number: u32) -> Result<PageRecord, ServiceError> {
        self.fetched.lock().expect("lock").push(page_number);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        } else {
            tokio::task::yield_now().await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(PageRecord {
            page_number,
            text: format!("pagina {page_number}"),
            words: Vec::new(),
            size: Size::new(595.0, 842.0),
            language: Some("pt-BR".to_string()),
            ocr_fallback: false,
        })
    }

    async fn transcribe_audio(&self, _file_name: &str, _bytes: Vec<u8>) -> Result<String, ServiceError> {
        Err(ServiceError::Rejected("not scripted".to_string()))
    }

    async fn generate_output(&self, _text: &str) -> Result<Vec<u8>, ServiceError> {
        Err(ServiceError::Rejected("not scripted".to_string()))
    }
}

fn add_book(store: &LibraryStore, id: &str, total_pages: u32) {
    store
        .save_book(NewBook {
            id: id.to_string(),
            name: format!("{id}.pdf"),
            total_pages,
            source_uri: None,
        })
        .expect("add book");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_triggers_never_run_two_loops() {
    let store = Arc::new(LibraryStore::open(unique_temp_dir("single_flight")).expect("open"));
    add_book(&store, "b1", 6);
    let service = Arc::new(ScriptedService::new(6));
    let coordinator = IngestionCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&service),
        IngestionSettings::default(),
    );

    let mut triggers = Vec::new();
    for _ in 0..16 {
        let coordinator = coordinator.clone();
        triggers.push(tokio::spawn(async move { coordinator.start("b1") }));
    }
    let mut started = 0;
    for trigger in triggers {
        if trigger.await.expect("trigger task") {
            started += 1;
        }
    }
    coordinator.wait_idle("b1").await;
    // A trigger landing after the run finished may start a second, empty
    // run; it must not overlap the first.
    while coordinator.is_in_flight("b1") {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(started >= 1);
    assert_eq!(service.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(service.fetched(), vec![1, 2, 3, 4, 5, 6]);
    let numbers: Vec<u32> = store
        .load_book_pages("b1")
        .expect("pages")
        .iter()
        .map(|page| page.page_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn restart_resumes_after_the_pages_on_disk() {
    let root = unique_temp_dir("restart");
    let service = Arc::new(ScriptedService::new(5));
    {
        let store = Arc::new(LibraryStore::open(&root).expect("open"));
        add_book(&store, "b1", 5);
        service.gated.store(true, Ordering::SeqCst);
        let coordinator = IngestionCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&service),
            IngestionSettings::default(),
        );
        let mut events = coordinator.subscribe();
        coordinator.start("b1");
        for _ in 0..2 {
            service.gate.notify_one();
            loop {
                if let IngestionEvent::Progress { .. } = events.recv().await.expect("event") {
                    break;
                }
            }
        }
        // Simulated crash: the run is abandoned mid-fetch of page 3.
        if let Some(handle) = coordinator.cancel("b1") {
            handle.abort();
        }
    }

    let store = Arc::new(LibraryStore::open(&root).expect("reopen"));
    assert_eq!(store.page_count("b1"), 2);
    service.gated.store(false, Ordering::SeqCst);
    service.fetched.lock().expect("lock").clear();

    let config = AppConfig::default();
    let coordinator = IngestionCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&service),
        IngestionSettings::from_config(&config),
    );
    let mut library =
        LibraryViewModel::new(Arc::clone(&store), Arc::clone(&service), coordinator, &config);
    library.refresh().await.expect("refresh");
    assert_eq!(library.resume_pending().as_deref(), Some("b1"));
    library.coordinator().wait_idle("b1").await;

    assert_eq!(service.fetched(), vec![3, 4, 5]);
    assert_eq!(store.book("b1").expect("book").status, BookStatus::Ready);
    library.refresh().await.expect("refresh");
    assert_eq!(library.entries()[0].progress, 1.0);
}

#[tokio::test]
async fn removing_mid_fetch_leaves_nothing_behind() {
    let root = unique_temp_dir("remove");
    let store = Arc::new(LibraryStore::open(&root).expect("open"));
    let service = Arc::new(ScriptedService::new(4));
    service.gated.store(true, Ordering::SeqCst);
    let config = AppConfig::default();
    let coordinator = IngestionCoordinator::new(
        Arc::clone(&store),
        Arc::clone(&service),
        IngestionSettings::from_config(&config),
    );
    let mut events = coordinator.subscribe();
    let mut library =
        LibraryViewModel::new(Arc::clone(&store), Arc::clone(&service), coordinator, &config);

    let source = root.join("livro.pdf");
    std::fs::write(&source, b"%PDF-1.7").expect("write source");
    let id = library.add_document(&source).await.expect("add");
    service.gate.notify_one();
    loop {
        if let IngestionEvent::Progress { .. } = events.recv().await.expect("event") {
            break;
        }
    }

    assert!(library.remove_document(&id).await.expect("remove"));
    service.gated.store(false, Ordering::SeqCst);
    service.gate.notify_one();
    loop {
        match events.recv().await.expect("event") {
            IngestionEvent::Cancelled { .. } => break,
            IngestionEvent::Progress { .. } => panic!("page stored after removal"),
            _ => {}
        }
    }

    assert!(!library.coordinator().is_in_flight(&id));
    assert!(store.load_library().is_empty());
    assert_eq!(store.load_book_pages(&id), None);
    // The run stops either before or after fetching page 2.
    let fetched = service.fetched();
    assert_eq!(fetched[0], 1);
    assert!(fetched.len() <= 2);
}
