use super::Effect;
use super::highlight::word_index_at;
use super::layout::PageFit;
use super::magnifier::to_page_point;
use super::messages::Message;
use super::navigation::{NavDecision, NavTarget};
use super::state::{ActiveUtterance, Notice, Player, PlayerPhase};
use crate::geometry::{Point, Size};
use crate::speech::{SpeechEvent, Utterance};
use crate::store::PageRecord;
use crate::text_utils::segment_from_word;
use std::time::Instant;
use tracing::{debug, info, warn};

impl Player {
    pub fn reduce(&mut self, message: Message) -> Vec<Effect> {
        let mut effects = Vec::new();

        match message {
            Message::Open { at } => self.handle_open(at, &mut effects),
            Message::NextPage { at } => {
                if !self.is_last_page() {
                    self.request_page(self.page + 1, false, at, &mut effects);
                }
            }
            Message::PreviousPage { at } => {
                if self.page > 0 {
                    self.request_page(self.page - 1, false, at, &mut effects);
                }
            }
            Message::JumpTo { page, at } => self.request_page(page, false, at, &mut effects),
            Message::RetryDeferred { at } => self.handle_retry_deferred(at, &mut effects),
            Message::PageLoaded { page, record, at } => {
                self.handle_page_loaded(page, record, at, &mut effects)
            }
            Message::ContainerResized { size, at } => {
                self.handle_container_resized(size, at, &mut effects)
            }
            Message::Play { at } => self.handle_play(at, &mut effects),
            Message::Pause { at } => self.handle_pause(at, &mut effects),
            Message::TogglePlayPause { at } => {
                if self.phase == PlayerPhase::ReadyPlaying {
                    self.handle_pause(at, &mut effects);
                } else {
                    self.handle_play(at, &mut effects);
                }
            }
            Message::Speech { event, at } => self.handle_speech(event, at, &mut effects),
            Message::ToggleBookmark => self.handle_toggle_bookmark(&mut effects),
            Message::SaveAnnotation(text) => self.handle_save_annotation(text, &mut effects),
            Message::RemoveAnnotation => {
                if self.annotations.remove(&self.page).is_some() {
                    effects.push(Effect::RemoveAnnotation { page: self.page });
                }
            }
            Message::MagnifierPressed(touch) => self.handle_magnifier(touch, true, &mut effects),
            Message::MagnifierMoved(touch) => self.handle_magnifier(touch, false, &mut effects),
            Message::MagnifierReleased => self.magnifier = None,
            Message::DismissNotice => self.notice = None,
            Message::Leave { at } => self.handle_leave(at, &mut effects),
        }

        effects
    }

    fn handle_open(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        if self.total_pages == 0 {
            self.notice = Some(Notice::StillPreparing { page: 0 });
            return;
        }
        // Opening bypasses the throttle but still starts a lock window.
        self.throttle.reset();
        self.throttle.commit(at);
        self.begin_page_load(self.page, false, effects);
    }

    fn target(&self, page: u32, continue_playback: bool) -> NavTarget {
        NavTarget {
            page,
            continue_playback,
        }
    }

    fn request_page(
        &mut self,
        page: u32,
        continue_playback: bool,
        at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        if self.total_pages == 0 {
            return;
        }
        let page = page.min(self.total_pages - 1);
        let busy = matches!(self.phase, PlayerPhase::LoadingPage { .. });
        if !busy && page == self.page && self.phase != PlayerPhase::Idle {
            return;
        }
        match self
            .throttle
            .request(self.target(page, continue_playback), at, busy)
        {
            NavDecision::Commit => {
                if !continue_playback {
                    self.stop_playback(at, effects);
                }
                self.begin_page_load(page, continue_playback, effects);
            }
            NavDecision::Defer { retry_after } => {
                debug!(page = page + 1, continue_playback, busy, "Deferred page change");
                if let Some(after) = retry_after {
                    effects.push(Effect::ScheduleRetry { after });
                }
            }
        }
    }

    fn handle_retry_deferred(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        if let Some(target) = self.throttle.take_deferred() {
            self.request_page(target.page, target.continue_playback, at, effects);
        }
    }

    fn begin_page_load(&mut self, page: u32, continue_playback: bool, effects: &mut Vec<Effect>) {
        if self.utterance.take().is_some() {
            effects.push(Effect::StopSpeech);
        }
        self.page = page;
        self.phase = PlayerPhase::LoadingPage { continue_playback };
        self.record = None;
        self.fit = None;
        self.word_index = None;
        self.magnifier = None;
        if matches!(self.notice, Some(Notice::StillPreparing { .. })) {
            self.notice = None;
        }
        info!(book_id = %self.book_id, page = page + 1, continue_playback, "Loading page");
        effects.push(Effect::LoadPage { page });
    }

    fn handle_page_loaded(
        &mut self,
        page: u32,
        record: Option<Box<PageRecord>>,
        at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let PlayerPhase::LoadingPage { .. } = self.phase else {
            debug!(page = page + 1, "Ignoring page load outside loading state");
            return;
        };
        if page != self.page {
            debug!(page = page + 1, current = self.page + 1, "Ignoring stale page load");
            return;
        }
        match record {
            Some(record) => {
                self.record = Some(record);
                self.resolve_layout(at, effects);
            }
            None => {
                info!(book_id = %self.book_id, page = page + 1, "Page not ingested yet");
                self.clock.stop(at);
                self.phase = PlayerPhase::Idle;
                self.notice = Some(Notice::StillPreparing { page });
            }
        }
    }

    fn handle_container_resized(&mut self, size: Size, at: Instant, effects: &mut Vec<Effect>) {
        self.container = size;
        match self.phase {
            PlayerPhase::LoadingPage { .. } => self.resolve_layout(at, effects),
            PlayerPhase::ReadyPaused | PlayerPhase::ReadyPlaying => {
                self.fit = self
                    .record
                    .as_ref()
                    .and_then(|record| PageFit::compute(size, record.size));
            }
            PlayerPhase::Idle => {}
        }
    }

    /// Leaves `LoadingPage` once the page data and the container size are
    /// both known.
    fn resolve_layout(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        let PlayerPhase::LoadingPage { continue_playback } = self.phase else {
            return;
        };
        let Some(record) = self.record.as_ref() else {
            return;
        };
        if self.container.is_empty() {
            return;
        }
        self.fit = PageFit::compute(self.container, record.size);
        self.phase = PlayerPhase::ReadyPaused;
        if continue_playback {
            self.start_speech(0, at, effects);
        }
    }

    fn handle_play(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        if self.phase != PlayerPhase::ReadyPaused {
            return;
        }
        let from = self.word_index.unwrap_or(0);
        self.start_speech(from, at, effects);
    }

    /// Starts speaking at `from_word`; past the last word starts over. A
    /// page with nothing to speak counts as finished at once.
    fn start_speech(&mut self, from_word: usize, at: Instant, effects: &mut Vec<Effect>) {
        let Some(record) = self.record.as_ref() else {
            return;
        };
        let from_word = if from_word >= record.word_count() {
            0
        } else {
            from_word
        };
        let segment = segment_from_word(&record.text, from_word);
        let language = record.language.clone();
        self.clock.start(at);
        if segment.is_empty() {
            debug!(page = self.page + 1, "Nothing to speak on page");
            self.phase = PlayerPhase::ReadyPlaying;
            self.finish_page(at, effects);
            return;
        }
        let id = self.next_utterance_id;
        self.next_utterance_id += 1;
        self.word_index = Some(from_word);
        self.utterance = Some(ActiveUtterance {
            id,
            segment: segment.clone(),
            start_word: from_word,
        });
        self.phase = PlayerPhase::ReadyPlaying;
        debug!(utterance = id, page = self.page + 1, from_word, "Starting speech");
        effects.push(Effect::StartSpeech(Utterance {
            id,
            text: segment,
            language,
        }));
    }

    /// Speech for the page ran out: continue on the next page, or stop at
    /// the end of the document.
    fn finish_page(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        self.utterance = None;
        if self.is_last_page() {
            info!(book_id = %self.book_id, "Reached end of document");
            self.clock.stop(at);
            self.phase = PlayerPhase::ReadyPaused;
            self.word_index = None;
        } else {
            self.request_page(self.page + 1, true, at, effects);
        }
    }

    fn handle_pause(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        if self.throttle.drop_continuation() {
            // The page was already read to the end.
            self.word_index = None;
        }
        match self.phase {
            PlayerPhase::ReadyPlaying => self.stop_playback(at, effects),
            PlayerPhase::LoadingPage {
                continue_playback: true,
            } => {
                self.clock.stop(at);
                self.phase = PlayerPhase::LoadingPage {
                    continue_playback: false,
                };
            }
            _ => {}
        }
    }

    /// Stops speech and the clock. Keeps the word index so a later play
    /// resumes where speech stopped.
    fn stop_playback(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        if self.utterance.take().is_some() {
            effects.push(Effect::StopSpeech);
        }
        self.clock.stop(at);
        if self.phase == PlayerPhase::ReadyPlaying {
            self.phase = PlayerPhase::ReadyPaused;
        }
    }

    fn handle_speech(&mut self, event: SpeechEvent, at: Instant, effects: &mut Vec<Effect>) {
        let current = self.utterance.as_ref().map(|utterance| utterance.id);
        let id = match &event {
            SpeechEvent::Boundary { utterance, .. }
            | SpeechEvent::Finished { utterance }
            | SpeechEvent::Error { utterance, .. } => *utterance,
        };
        if current != Some(id) {
            debug!(utterance = id, ?current, "Ignoring event from stale utterance");
            return;
        }

        match event {
            SpeechEvent::Boundary { char_offset, .. } => {
                if let Some(utterance) = self.utterance.as_ref() {
                    self.word_index = Some(word_index_at(
                        &utterance.segment,
                        utterance.start_word,
                        char_offset,
                    ));
                }
            }
            SpeechEvent::Finished { .. } => self.finish_page(at, effects),
            SpeechEvent::Error { message, .. } => {
                warn!(book_id = %self.book_id, page = self.page + 1, %message, "Speech failed");
                self.utterance = None;
                self.clock.stop(at);
                self.phase = PlayerPhase::ReadyPaused;
                self.notice = Some(Notice::SpeechFailed { message });
            }
        }
    }

    fn handle_toggle_bookmark(&mut self, effects: &mut Vec<Effect>) {
        if self.total_pages == 0 {
            return;
        }
        let page = self.page;
        if self.bookmarks.remove(&page) {
            effects.push(Effect::RemoveBookmark { page });
        } else {
            self.bookmarks.insert(page);
            effects.push(Effect::AddBookmark { page });
        }
    }

    fn handle_save_annotation(&mut self, text: String, effects: &mut Vec<Effect>) {
        let page = self.page;
        let text = text.trim();
        if text.is_empty() {
            if self.annotations.remove(&page).is_some() {
                effects.push(Effect::RemoveAnnotation { page });
            }
            return;
        }
        self.annotations.insert(page, text.to_string());
        effects.push(Effect::SaveAnnotation {
            page,
            text: text.to_string(),
        });
    }

    fn handle_magnifier(&mut self, touch: Point, pressed: bool, effects: &mut Vec<Effect>) {
        if !pressed && self.magnifier.is_none() {
            return;
        }
        let Some(fit) = self.fit.as_ref() else {
            return;
        };
        // Touches off the page leave the lens where it was.
        if to_page_point(touch, fit).is_none() {
            return;
        }
        self.magnifier = Some(touch);
        if pressed {
            effects.push(Effect::CaptureSnapshot { page: self.page });
        }
    }

    fn handle_leave(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        self.stop_playback(at, effects);
        let listened_secs = self.clock.drain_secs(at);
        info!(
            book_id = %self.book_id,
            page = self.page + 1,
            listened_secs,
            "Leaving player"
        );
        effects.push(Effect::PersistProgress {
            page: self.page,
            listened_secs,
        });
        self.throttle.reset();
        self.magnifier = None;
        self.phase = PlayerPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::PlayerSettings;
    use crate::store::tests::sample_page;
    use crate::store::{BookStatus, Document};
    use std::time::Duration;

    fn ms(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    fn document(total_pages: u32, last_page: u32) -> Document {
        Document {
            id: "b1".to_string(),
            name: "b1.pdf".to_string(),
            total_pages,
            status: BookStatus::Ready,
            last_page,
            listened_secs: 0,
            completed: false,
            bookmarks: Default::default(),
            annotations: Default::default(),
            source_uri: None,
        }
    }

    fn settings() -> PlayerSettings {
        PlayerSettings {
            min_page_interval: Duration::from_millis(900),
            retry_delay: Duration::from_millis(300),
            magnifier_zoom: 2.0,
            magnifier_lens_px: 160,
        }
    }

    fn loaded(page: u32, text: &str, at: Instant) -> Message {
        Message::PageLoaded {
            page,
            record: Some(Box::new(sample_page(page + 1, text))),
            at,
        }
    }

    /// Player opened at `t0` with page `last_page` on screen, paused.
    fn ready_player(total_pages: u32, last_page: u32, text: &str, t0: Instant) -> Player {
        let mut player = Player::new(&document(total_pages, last_page), settings());
        player.reduce(Message::ContainerResized {
            size: Size::new(600.0, 800.0),
            at: t0,
        });
        assert_eq!(
            player.reduce(Message::Open { at: t0 }),
            vec![Effect::LoadPage { page: last_page }]
        );
        player.reduce(loaded(last_page, text, t0));
        assert_eq!(player.phase(), PlayerPhase::ReadyPaused);
        player
    }

    fn spoken(effects: &[Effect]) -> Vec<Utterance> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::StartSpeech(utterance) => Some(utterance.clone()),
                _ => None,
            })
            .collect()
    }

    fn page_loads(effects: &[Effect]) -> Vec<u32> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::LoadPage { page } => Some(*page),
                _ => None,
            })
            .collect()
    }

    fn speech(event: SpeechEvent, at: Instant) -> Message {
        Message::Speech { event, at }
    }

    #[test]
    fn open_resumes_last_read_page_and_fits_it() {
        let t0 = Instant::now();
        let player = ready_player(4, 2, "texto", t0);
        assert_eq!(player.page(), 2);
        let fit = player.fit().expect("fit resolved");
        assert!((fit.scale - 1.0).abs() < 1e-6);
        assert_eq!(player.word_index(), None);
    }

    #[test]
    fn layout_waits_for_container_size() {
        let t0 = Instant::now();
        let mut player = Player::new(&document(2, 0), settings());
        player.reduce(Message::Open { at: t0 });
        player.reduce(loaded(0, "texto", t0));
        assert_eq!(
            player.phase(),
            PlayerPhase::LoadingPage {
                continue_playback: false
            }
        );
        player.reduce(Message::ContainerResized {
            size: Size::new(300.0, 400.0),
            at: t0,
        });
        assert_eq!(player.phase(), PlayerPhase::ReadyPaused);
    }

    #[test]
    fn play_resumes_mid_page_and_boundaries_track_words() {
        let t0 = Instant::now();
        let mut player = ready_player(1, 0, "zero um dois tres quatro", t0);
        let first = spoken(&player.reduce(Message::Play { at: ms(t0, 1000) }));
        assert_eq!(first[0].text, "zero um dois tres quatro");

        player.reduce(speech(
            SpeechEvent::Boundary {
                utterance: first[0].id,
                char_offset: 8,
            },
            ms(t0, 1100),
        ));
        assert_eq!(player.word_index(), Some(2));

        let paused = player.reduce(Message::Pause { at: ms(t0, 1200) });
        assert_eq!(paused, vec![Effect::StopSpeech]);
        assert_eq!(player.phase(), PlayerPhase::ReadyPaused);

        let resumed = spoken(&player.reduce(Message::Play { at: ms(t0, 1300) }));
        assert_eq!(resumed[0].text, "dois tres quatro");
        player.reduce(speech(
            SpeechEvent::Boundary {
                utterance: resumed[0].id,
                char_offset: 5,
            },
            ms(t0, 1400),
        ));
        assert_eq!(player.word_index(), Some(3));
    }

    #[test]
    fn events_from_a_stopped_utterance_are_ignored() {
        let t0 = Instant::now();
        let mut player = ready_player(2, 0, "um dois tres", t0);
        let old = spoken(&player.reduce(Message::Play { at: ms(t0, 1000) }))[0].id;
        player.reduce(Message::Pause { at: ms(t0, 1100) });
        player.reduce(Message::Play { at: ms(t0, 1200) });

        player.reduce(speech(
            SpeechEvent::Boundary {
                utterance: old,
                char_offset: 8,
            },
            ms(t0, 1300),
        ));
        assert_eq!(player.word_index(), Some(0));
        let effects = player.reduce(speech(SpeechEvent::Finished { utterance: old }, ms(t0, 1400)));
        assert!(effects.is_empty());
        assert_eq!(player.phase(), PlayerPhase::ReadyPlaying);
    }

    #[test]
    fn user_page_change_stops_speech_and_forces_pause() {
        let t0 = Instant::now();
        let mut player = ready_player(3, 0, "um dois", t0);
        player.reduce(Message::Play { at: ms(t0, 1000) });

        let effects = player.reduce(Message::NextPage { at: ms(t0, 1500) });
        assert_eq!(
            effects,
            vec![Effect::StopSpeech, Effect::LoadPage { page: 1 }]
        );
        assert_eq!(
            player.phase(),
            PlayerPhase::LoadingPage {
                continue_playback: false
            }
        );
        let effects = player.reduce(loaded(1, "tres quatro", ms(t0, 1600)));
        assert!(spoken(&effects).is_empty());
        assert_eq!(player.phase(), PlayerPhase::ReadyPaused);
    }

    #[test]
    fn finished_speech_continues_on_the_next_page() {
        let t0 = Instant::now();
        let mut player = ready_player(2, 0, "um dois", t0);
        let id = spoken(&player.reduce(Message::Play { at: ms(t0, 1000) }))[0].id;

        let effects = player.reduce(speech(SpeechEvent::Finished { utterance: id }, ms(t0, 2000)));
        assert_eq!(page_loads(&effects), vec![1]);
        assert_eq!(
            player.phase(),
            PlayerPhase::LoadingPage {
                continue_playback: true
            }
        );

        let effects = player.reduce(loaded(1, "tres quatro", ms(t0, 2100)));
        let next = spoken(&effects);
        assert_eq!(next[0].text, "tres quatro");
        assert_eq!(player.word_index(), Some(0));
        assert_eq!(player.phase(), PlayerPhase::ReadyPlaying);
    }

    #[test]
    fn finishing_the_last_page_pauses() {
        let t0 = Instant::now();
        let mut player = ready_player(2, 1, "fim", t0);
        let id = spoken(&player.reduce(Message::Play { at: ms(t0, 1000) }))[0].id;
        let effects = player.reduce(speech(SpeechEvent::Finished { utterance: id }, ms(t0, 2000)));
        assert!(effects.is_empty());
        assert_eq!(player.phase(), PlayerPhase::ReadyPaused);
    }

    #[test]
    fn speech_error_pauses_with_a_notice() {
        let t0 = Instant::now();
        let mut player = ready_player(2, 0, "um dois", t0);
        let id = spoken(&player.reduce(Message::Play { at: ms(t0, 1000) }))[0].id;
        player.reduce(speech(
            SpeechEvent::Error {
                utterance: id,
                message: "engine unavailable".to_string(),
            },
            ms(t0, 1100),
        ));
        assert_eq!(player.phase(), PlayerPhase::ReadyPaused);
        assert_eq!(
            player.notice(),
            Some(&Notice::SpeechFailed {
                message: "engine unavailable".to_string()
            })
        );
    }

    #[test]
    fn rapid_taps_commit_one_change_per_window() {
        let t0 = Instant::now();
        let mut player = ready_player(6, 0, "texto", t0);
        let mut loads = Vec::new();

        let effects = player.reduce(Message::NextPage { at: ms(t0, 1000) });
        loads.extend(page_loads(&effects));
        player.reduce(loaded(1, "texto", ms(t0, 1050)));

        let mut retries = 0;
        for at in [1100, 1200, 1300] {
            let effects = player.reduce(Message::NextPage { at: ms(t0, at) });
            loads.extend(page_loads(&effects));
            retries += effects
                .iter()
                .filter(|effect| matches!(effect, Effect::ScheduleRetry { .. }))
                .count();
        }
        assert_eq!(loads, vec![1]);
        assert_eq!(retries, 1);

        let effects = player.reduce(Message::RetryDeferred { at: ms(t0, 1400) });
        assert_eq!(
            effects,
            vec![Effect::ScheduleRetry {
                after: Duration::from_millis(300)
            }]
        );
        let effects = player.reduce(Message::RetryDeferred { at: ms(t0, 1900) });
        assert_eq!(page_loads(&effects), vec![2]);
    }

    #[test]
    fn deferred_jumps_apply_only_the_latest_target() {
        let t0 = Instant::now();
        let mut player = ready_player(9, 0, "texto", t0);
        player.reduce(Message::JumpTo {
            page: 3,
            at: ms(t0, 100),
        });
        player.reduce(Message::JumpTo {
            page: 7,
            at: ms(t0, 200),
        });
        let effects = player.reduce(Message::RetryDeferred { at: ms(t0, 1000) });
        assert_eq!(page_loads(&effects), vec![7]);
    }

    #[test]
    fn requests_during_load_are_deferred_not_dropped() {
        let t0 = Instant::now();
        let mut player = ready_player(5, 0, "texto", t0);
        player.reduce(Message::NextPage { at: ms(t0, 1000) });
        let effects = player.reduce(Message::JumpTo {
            page: 4,
            at: ms(t0, 2500),
        });
        assert!(page_loads(&effects).is_empty());

        player.reduce(loaded(1, "texto", ms(t0, 2600)));
        let effects = player.reduce(Message::RetryDeferred { at: ms(t0, 2800) });
        assert_eq!(page_loads(&effects), vec![4]);
    }

    #[test]
    fn pause_cancels_a_parked_continuation() {
        let t0 = Instant::now();
        let mut player = ready_player(3, 0, "um dois tres", t0);
        let id = spoken(&player.reduce(Message::Play { at: ms(t0, 100) }))[0].id;
        player.reduce(speech(
            SpeechEvent::Boundary {
                utterance: id,
                char_offset: 8,
            },
            ms(t0, 150),
        ));
        // Still inside the lock window from opening, so the next page parks.
        let effects = player.reduce(speech(SpeechEvent::Finished { utterance: id }, ms(t0, 200)));
        assert!(page_loads(&effects).is_empty());

        player.reduce(Message::Pause { at: ms(t0, 300) });
        let effects = player.reduce(Message::RetryDeferred { at: ms(t0, 1000) });
        assert!(effects.is_empty());
        assert_eq!(player.page(), 0);
        assert_eq!(player.phase(), PlayerPhase::ReadyPaused);

        // The finished page is read again from the start, not from its tail.
        let effects = player.reduce(Message::Play { at: ms(t0, 1500) });
        let utterances = spoken(&effects);
        assert_eq!(utterances.len(), 1);
        assert_eq!(utterances[0].text, "um dois tres");
        assert_eq!(player.page(), 0);
    }

    #[test]
    fn missing_page_shows_still_preparing() {
        let t0 = Instant::now();
        let mut player = ready_player(4, 0, "texto", t0);
        player.reduce(Message::NextPage { at: ms(t0, 1000) });
        player.reduce(Message::PageLoaded {
            page: 1,
            record: None,
            at: ms(t0, 1100),
        });
        assert_eq!(player.phase(), PlayerPhase::Idle);
        assert_eq!(player.notice(), Some(&Notice::StillPreparing { page: 1 }));

        player.reduce(Message::PreviousPage { at: ms(t0, 2000) });
        player.reduce(loaded(0, "texto", ms(t0, 2100)));
        assert_eq!(player.phase(), PlayerPhase::ReadyPaused);
        assert_eq!(player.notice(), None);
    }

    #[test]
    fn leaving_persists_listening_time_once() {
        let t0 = Instant::now();
        let mut player = ready_player(3, 1, "um dois", t0);
        player.reduce(Message::Play { at: ms(t0, 1000) });

        let effects = player.reduce(Message::Leave { at: ms(t0, 4500) });
        assert_eq!(
            effects,
            vec![
                Effect::StopSpeech,
                Effect::PersistProgress {
                    page: 1,
                    listened_secs: 3
                }
            ]
        );
        let effects = player.reduce(Message::Leave { at: ms(t0, 9000) });
        assert_eq!(
            effects,
            vec![Effect::PersistProgress {
                page: 1,
                listened_secs: 0
            }]
        );
    }

    #[test]
    fn bookmark_and_annotation_edits_emit_store_effects() {
        let t0 = Instant::now();
        let mut player = ready_player(3, 2, "texto", t0);

        assert_eq!(
            player.reduce(Message::ToggleBookmark),
            vec![Effect::AddBookmark { page: 2 }]
        );
        assert!(player.view().bookmarked);
        assert_eq!(
            player.reduce(Message::ToggleBookmark),
            vec![Effect::RemoveBookmark { page: 2 }]
        );

        assert_eq!(
            player.reduce(Message::SaveAnnotation("  ver figura ".to_string())),
            vec![Effect::SaveAnnotation {
                page: 2,
                text: "ver figura".to_string()
            }]
        );
        assert_eq!(player.view().annotation.as_deref(), Some("ver figura"));
        assert_eq!(
            player.reduce(Message::SaveAnnotation("   ".to_string())),
            vec![Effect::RemoveAnnotation { page: 2 }]
        );
        assert!(player.reduce(Message::RemoveAnnotation).is_empty());
    }

    #[test]
    fn magnifier_follows_touches_on_the_page() {
        let t0 = Instant::now();
        let mut player = ready_player(1, 0, "texto", t0);

        assert!(player.reduce(Message::MagnifierPressed(Point::new(-5.0, 10.0))).is_empty());
        assert_eq!(
            player.reduce(Message::MagnifierPressed(Point::new(300.0, 400.0))),
            vec![Effect::CaptureSnapshot { page: 0 }]
        );
        player.reduce(Message::MagnifierMoved(Point::new(310.0, 420.0)));
        let lens = player.view().lens.expect("lens visible");
        assert_eq!(lens.touch, Point::new(310.0, 420.0));
        assert_eq!(lens.size_px, 160);

        player.reduce(Message::MagnifierReleased);
        assert_eq!(player.view().lens, None);
    }
}
