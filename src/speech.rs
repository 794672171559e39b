//! Boundary to the platform text-to-speech engine.
//!
//! The engine speaks one segment at a time. It reports progress back to the
//! playback session as [`SpeechEvent`]s carrying the id of the utterance they
//! belong to, so callbacks from a stopped utterance can be told apart from
//! the current one.

use anyhow::Result;
use tracing::{debug, info};

/// One call to [`SpeechEngine::speak`].
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: u64,
    pub text: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// The engine is about to speak the character at `char_offset` of the
    /// utterance text.
    Boundary { utterance: u64, char_offset: usize },
    Finished { utterance: u64 },
    Error { utterance: u64, message: String },
}

pub trait SpeechEngine: Send {
    /// Starts speaking, replacing any utterance in progress.
    fn speak(&mut self, utterance: Utterance) -> Result<()>;
    fn stop(&mut self);
}

/// Engine that only logs; used by the CLI where no audio output exists. It
/// reports a boundary for every word and then finishes immediately.
pub struct LoggingSpeechEngine {
    events: tokio::sync::mpsc::UnboundedSender<SpeechEvent>,
}

impl LoggingSpeechEngine {
    pub fn new(events: tokio::sync::mpsc::UnboundedSender<SpeechEvent>) -> Self {
        Self { events }
    }
}

impl SpeechEngine for LoggingSpeechEngine {
    fn speak(&mut self, utterance: Utterance) -> Result<()> {
        info!(
            utterance = utterance.id,
            language = utterance.language.as_deref().unwrap_or("unknown"),
            chars = utterance.text.chars().count(),
            "Speaking segment"
        );
        let mut offset = 0usize;
        for word in utterance.text.split(' ') {
            let _ = self.events.send(SpeechEvent::Boundary {
                utterance: utterance.id,
                char_offset: offset,
            });
            offset += word.chars().count() + 1;
        }
        let _ = self.events.send(SpeechEvent::Finished {
            utterance: utterance.id,
        });
        Ok(())
    }

    fn stop(&mut self) {
        debug!("Stopping speech");
    }
}
