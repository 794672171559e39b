use crate::geometry::{Point, Size};
use crate::speech::SpeechEvent;
use crate::store::PageRecord;
use std::time::Instant;

/// Inputs to the player: user actions, page loads, speech callbacks and
/// timers. Anything that depends on wall-clock time carries the instant it
/// happened at.
#[derive(Debug, Clone)]
pub enum Message {
    /// Screen opened; load the last-read page.
    Open { at: Instant },
    NextPage { at: Instant },
    PreviousPage { at: Instant },
    JumpTo { page: u32, at: Instant },
    /// Scheduled retry for a parked navigation request.
    RetryDeferred { at: Instant },
    /// Result of a page load. `None` means the page is not ingested yet.
    PageLoaded {
        page: u32,
        record: Option<Box<PageRecord>>,
        at: Instant,
    },
    ContainerResized { size: Size, at: Instant },
    Play { at: Instant },
    Pause { at: Instant },
    TogglePlayPause { at: Instant },
    Speech { event: SpeechEvent, at: Instant },
    ToggleBookmark,
    SaveAnnotation(String),
    RemoveAnnotation,
    MagnifierPressed(Point),
    MagnifierMoved(Point),
    MagnifierReleased,
    DismissNotice,
    /// Screen closed; persist position and listening time.
    Leave { at: Instant },
}
