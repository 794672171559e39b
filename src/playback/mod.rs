//! Playback of one document: page loading, speech, highlighting,
//! navigation throttling and the magnifier.
//!
//! [`Player::reduce`] is a pure state transition from a [`Message`] to a list
//! of [`Effect`]s. [`PlaybackSession`] owns a player, executes its effects
//! against the store and a [`SpeechEngine`](crate::speech::SpeechEngine), and
//! feeds completions back in as messages.

pub mod highlight;
pub mod layout;
pub mod magnifier;
mod messages;
pub mod navigation;
mod reducer;
mod runtime;
mod state;
mod view;

pub use layout::PageFit;
pub use magnifier::PageSnapshot;
pub use messages::Message;
pub use runtime::PlaybackSession;
pub use state::{ListeningClock, Notice, Player, PlayerPhase, PlayerSettings};
pub use view::{LensView, PlayerState, PlayerView};

use crate::speech::Utterance;
use std::time::Duration;

/// Side effects requested by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Read page `page` (0-based) from the page file.
    LoadPage { page: u32 },
    StartSpeech(Utterance),
    StopSpeech,
    /// Deliver [`Message::RetryDeferred`] after `after`.
    ScheduleRetry { after: Duration },
    PersistProgress { page: u32, listened_secs: u64 },
    AddBookmark { page: u32 },
    RemoveBookmark { page: u32 },
    SaveAnnotation { page: u32, text: String },
    RemoveAnnotation { page: u32 },
    /// Grab a rendered image of `page` for the magnifier.
    CaptureSnapshot { page: u32 },
}
