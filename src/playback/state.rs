use super::layout::PageFit;
use super::navigation::NavThrottle;
use crate::config::AppConfig;
use crate::geometry::{Point, Size};
use crate::store::{Document, PageRecord};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerPhase {
    /// No page on screen: before opening, after leaving, or when the
    /// requested page is not available yet.
    Idle,
    LoadingPage { continue_playback: bool },
    ReadyPaused,
    ReadyPlaying,
}

/// Message shown over the player until dismissed or replaced.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum Notice {
    StillPreparing { page: u32 },
    SpeechFailed { message: String },
}

#[derive(Debug, Clone)]
pub struct PlayerSettings {
    pub min_page_interval: Duration,
    pub retry_delay: Duration,
    pub magnifier_zoom: f32,
    pub magnifier_lens_px: u32,
}

impl PlayerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_page_interval: config.min_page_interval(),
            retry_delay: config.deferred_retry_delay(),
            magnifier_zoom: config.magnifier_zoom,
            magnifier_lens_px: config.magnifier_lens_px,
        }
    }
}

/// Wall-clock time spent playing, counted while speech runs.
#[derive(Debug, Clone, Default)]
pub struct ListeningClock {
    running_since: Option<Instant>,
    accumulated: Duration,
}

impl ListeningClock {
    pub fn start(&mut self, at: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(at);
        }
    }

    pub fn stop(&mut self, at: Instant) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += at.saturating_duration_since(since);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Whole seconds counted so far. They are removed from the clock, so
    /// each second is reported once; the sub-second rest carries over.
    pub fn drain_secs(&mut self, at: Instant) -> u64 {
        if let Some(since) = self.running_since {
            self.accumulated += at.saturating_duration_since(since);
            self.running_since = Some(at);
        }
        let secs = self.accumulated.as_secs();
        self.accumulated -= Duration::from_secs(secs);
        secs
    }
}

/// Speech currently handed to the engine.
#[derive(Debug, Clone)]
pub(super) struct ActiveUtterance {
    pub(super) id: u64,
    pub(super) segment: String,
    pub(super) start_word: usize,
}

/// Playback state for one open document.
#[derive(Debug)]
pub struct Player {
    pub(super) book_id: String,
    pub(super) total_pages: u32,
    pub(super) page: u32,
    pub(super) phase: PlayerPhase,
    pub(super) record: Option<Box<PageRecord>>,
    pub(super) container: Size,
    pub(super) fit: Option<PageFit>,
    pub(super) word_index: Option<usize>,
    pub(super) utterance: Option<ActiveUtterance>,
    pub(super) next_utterance_id: u64,
    pub(super) clock: ListeningClock,
    pub(super) throttle: NavThrottle,
    pub(super) bookmarks: BTreeSet<u32>,
    pub(super) annotations: BTreeMap<u32, String>,
    pub(super) notice: Option<Notice>,
    pub(super) magnifier: Option<Point>,
    pub(super) settings: PlayerSettings,
}

impl Player {
    pub fn new(book: &Document, settings: PlayerSettings) -> Self {
        let last = book.total_pages.saturating_sub(1);
        Self {
            book_id: book.id.clone(),
            total_pages: book.total_pages,
            page: book.last_page.min(last),
            phase: PlayerPhase::Idle,
            record: None,
            container: Size::default(),
            fit: None,
            word_index: None,
            utterance: None,
            next_utterance_id: 1,
            clock: ListeningClock::default(),
            throttle: NavThrottle::new(settings.min_page_interval, settings.retry_delay),
            bookmarks: book.bookmarks.clone(),
            annotations: book.annotations.clone(),
            notice: None,
            magnifier: None,
            settings,
        }
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn phase(&self) -> PlayerPhase {
        self.phase
    }

    /// 0-based index of the page on screen or being loaded.
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn word_index(&self) -> Option<usize> {
        self.word_index
    }

    pub fn fit(&self) -> Option<&PageFit> {
        self.fit.as_ref()
    }

    pub fn record(&self) -> Option<&PageRecord> {
        self.record.as_deref()
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn magnifier(&self) -> Option<Point> {
        self.magnifier
    }

    pub fn is_bookmarked(&self) -> bool {
        self.bookmarks.contains(&self.page)
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotations.get(&self.page).map(String::as_str)
    }

    pub fn is_last_page(&self) -> bool {
        self.page + 1 >= self.total_pages
    }
}
