use super::highlight::highlight_rect;
use super::layout::PageFit;
use super::magnifier::{lens_source_rect, to_page_point};
use super::state::{Notice, Player, PlayerPhase};
use crate::geometry::{Point, Rect};
use serde::Serialize;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PlayerState {
    Idle,
    LoadingPage,
    ReadyPaused,
    ReadyPlaying,
}

impl From<PlayerPhase> for PlayerState {
    fn from(phase: PlayerPhase) -> Self {
        match phase {
            PlayerPhase::Idle => PlayerState::Idle,
            PlayerPhase::LoadingPage { .. } => PlayerState::LoadingPage,
            PlayerPhase::ReadyPaused => PlayerState::ReadyPaused,
            PlayerPhase::ReadyPlaying => PlayerState::ReadyPlaying,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct LensView {
    /// Touch point in container pixels.
    pub touch: Point,
    /// Page region shown in the lens, in page units.
    pub source: Rect,
    pub size_px: u32,
}

/// Everything the player screen renders, as one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct PlayerView {
    pub book_id: String,
    pub state: PlayerState,
    /// 0-based.
    pub page: u32,
    pub total_pages: u32,
    pub word_index: Option<usize>,
    pub highlight: Option<Rect>,
    pub fit: Option<PageFit>,
    pub bookmarked: bool,
    pub annotation: Option<String>,
    pub notice: Option<Notice>,
    pub lens: Option<LensView>,
}

impl Player {
    pub fn view(&self) -> PlayerView {
        let highlight = match (self.record(), self.word_index, self.fit.as_ref()) {
            (Some(record), Some(index), Some(fit)) => highlight_rect(record, index, fit),
            _ => None,
        };
        PlayerView {
            book_id: self.book_id.clone(),
            state: self.phase.into(),
            page: self.page,
            total_pages: self.total_pages,
            word_index: self.word_index,
            highlight,
            fit: self.fit,
            bookmarked: self.is_bookmarked(),
            annotation: self.annotation().map(str::to_string),
            notice: self.notice.clone(),
            lens: self.lens_view(),
        }
    }

    pub fn lens_view(&self) -> Option<LensView> {
        let touch = self.magnifier?;
        let fit = self.fit.as_ref()?;
        let center = to_page_point(touch, fit)?;
        Some(LensView {
            touch,
            source: lens_source_rect(
                center,
                fit,
                self.settings.magnifier_zoom,
                self.settings.magnifier_lens_px,
            ),
            size_px: self.settings.magnifier_lens_px,
        })
    }
}
