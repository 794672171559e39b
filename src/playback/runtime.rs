use super::magnifier::{PageSnapshot, render_lens};
use super::messages::Message;
use super::state::Player;
use super::view::PlayerView;
use super::Effect;
use crate::speech::{SpeechEngine, SpeechEvent};
use crate::store::{LibraryStore, StoreError, with_store};
use image::RgbaImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Drives a [`Player`]: runs its effects and turns page loads, timers and
/// speech callbacks back into messages.
pub struct PlaybackSession<E: SpeechEngine> {
    player: Player,
    store: Arc<LibraryStore>,
    engine: E,
    speech_events: mpsc::UnboundedReceiver<SpeechEvent>,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
    snapshots: Option<Box<dyn PageSnapshot>>,
    snapshot: Option<RgbaImage>,
    lens: Option<RgbaImage>,
}

impl<E: SpeechEngine> PlaybackSession<E> {
    /// `speech_events` is the receiving end of the channel `engine` reports
    /// boundaries and completions on.
    pub fn new(
        player: Player,
        store: Arc<LibraryStore>,
        engine: E,
        speech_events: mpsc::UnboundedReceiver<SpeechEvent>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            player,
            store,
            engine,
            speech_events,
            tx,
            rx,
            snapshots: None,
            snapshot: None,
            lens: None,
        }
    }

    pub fn with_snapshots(mut self, source: Box<dyn PageSnapshot>) -> Self {
        self.snapshots = Some(source);
        self
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn view(&self) -> PlayerView {
        self.player.view()
    }

    /// Magnified crop for the current touch, when a snapshot is available.
    pub fn lens_image(&self) -> Option<&RgbaImage> {
        self.lens.as_ref()
    }

    /// Handle for posting messages from elsewhere, such as a UI thread.
    pub fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.tx.clone()
    }

    pub async fn next_message(&mut self) -> Option<Message> {
        tokio::select! {
            Some(message) = self.rx.recv() => Some(message),
            Some(event) = self.speech_events.recv() => Some(Message::Speech { event, at: now() }),
            else => None,
        }
    }

    pub async fn dispatch(&mut self, message: Message) {
        let effects = self.player.reduce(message);
        for effect in effects {
            self.run_effect(effect).await;
        }
        self.refresh_lens();
    }

    /// Handles messages until none arrives for `quiet`. Returns how many
    /// were handled.
    pub async fn run_until_quiet(&mut self, quiet: Duration) -> usize {
        let mut handled = 0;
        while let Ok(Some(message)) = tokio::time::timeout(quiet, self.next_message()).await {
            self.dispatch(message).await;
            handled += 1;
        }
        handled
    }

    async fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::LoadPage { page } => self.spawn_page_load(page),
            Effect::StartSpeech(utterance) => {
                let id = utterance.id;
                if let Err(err) = self.engine.speak(utterance) {
                    let _ = self.tx.send(Message::Speech {
                        event: SpeechEvent::Error {
                            utterance: id,
                            message: err.to_string(),
                        },
                        at: now(),
                    });
                }
            }
            Effect::StopSpeech => self.engine.stop(),
            Effect::ScheduleRetry { after } => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = tx.send(Message::RetryDeferred { at: now() });
                });
            }
            Effect::PersistProgress {
                page,
                listened_secs,
            } => {
                self.persist("progress", move |store, id| {
                    store.update_book_state(id, page, listened_secs)
                })
                .await
            }
            Effect::AddBookmark { page } => {
                self.persist("bookmark", move |store, id| store.add_bookmark(id, page))
                    .await
            }
            Effect::RemoveBookmark { page } => {
                self.persist("bookmark", move |store, id| store.remove_bookmark(id, page))
                    .await
            }
            Effect::SaveAnnotation { page, text } => {
                self.persist("annotation", move |store, id| {
                    store.save_annotation(id, page, &text)
                })
                .await
            }
            Effect::RemoveAnnotation { page } => {
                self.persist("annotation", move |store, id| store.remove_annotation(id, page))
                    .await
            }
            Effect::CaptureSnapshot { page } => {
                let size = self.player.record().map(|record| record.size);
                self.snapshot = match (self.snapshots.as_mut(), size) {
                    (Some(source), Some(size)) => source.capture(page, size),
                    _ => None,
                };
                debug!(page = page + 1, captured = self.snapshot.is_some(), "Captured page snapshot");
            }
        }
    }

    fn spawn_page_load(&self, page: u32) {
        let store = Arc::clone(&self.store);
        let book_id = self.player.book_id().to_string();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let id = book_id.clone();
            let record = match with_store(&store, move |store| store.load_book_pages(&id)).await {
                Ok(pages) => pages.and_then(|pages| pages.into_iter().nth(page as usize)),
                Err(err) => {
                    warn!(book_id = %book_id, page = page + 1, "Page load failed: {err}");
                    None
                }
            };
            let _ = tx.send(Message::PageLoaded {
                page,
                record: record.map(Box::new),
                at: now(),
            });
        });
    }

    async fn persist<F>(&self, what: &'static str, op: F)
    where
        F: FnOnce(&LibraryStore, &str) -> Result<(), StoreError> + Send + 'static,
    {
        let book_id = self.player.book_id().to_string();
        let id = book_id.clone();
        let result = with_store(&self.store, move |store| op(store, &id))
            .await
            .and_then(|result| result);
        if let Err(err) = result {
            warn!(book_id = %book_id, what, "Failed to persist player change: {err}");
        }
    }

    fn refresh_lens(&mut self) {
        if self.player.magnifier().is_none() {
            self.snapshot = None;
            self.lens = None;
            return;
        }
        self.lens = match (self.player.lens_view(), self.snapshot.as_ref(), self.player.record()) {
            (Some(lens), Some(snapshot), Some(record)) => {
                render_lens(snapshot, record.size, lens.source, lens.size_px)
            }
            _ => None,
        };
    }
}
