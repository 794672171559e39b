use crate::geometry::{Rect, Size};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use ts_rs::TS;

/// Ingestion status of a library entry.
///
/// Moves forward `Processing -> Ready` or `Processing -> Failed`; only an
/// explicit retry moves `Failed` back to `Processing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum BookStatus {
    Processing,
    Ready,
    Failed,
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BookStatus::Processing => "processing",
            BookStatus::Ready => "ready",
            BookStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Library entry persisted in the metadata record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub total_pages: u32,
    pub status: BookStatus,
    /// 0-based index of the last page the reader left off on.
    #[serde(default)]
    pub last_page: u32,
    #[serde(default)]
    pub listened_secs: u64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub bookmarks: BTreeSet<u32>,
    #[serde(default)]
    pub annotations: BTreeMap<u32, String>,
    #[serde(default)]
    pub source_uri: Option<String>,
}

impl Document {
    pub fn is_bookmarked(&self, page: u32) -> bool {
        self.bookmarks.contains(&page)
    }

    pub fn annotation(&self, page: u32) -> Option<&str> {
        self.annotations.get(&page).map(String::as_str)
    }
}

/// What the caller knows about a document when it is first added.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub id: String,
    pub name: String,
    pub total_pages: u32,
    pub source_uri: Option<String>,
}

impl NewBook {
    pub(crate) fn into_document(self) -> Document {
        Document {
            id: self.id,
            name: self.name,
            total_pages: self.total_pages,
            status: BookStatus::Processing,
            last_page: 0,
            listened_secs: 0,
            completed: false,
            bookmarks: BTreeSet::new(),
            annotations: BTreeMap::new(),
            source_uri: self.source_uri,
        }
    }
}

/// One word's bounding box in page-native units. The word's text span is
/// implied by its position in the list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordBox {
    #[serde(default)]
    pub text: Option<String>,
    pub rect: Rect,
}

/// Extracted content of a single page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageRecord {
    /// 1-based page number as reported by the processing service.
    pub page_number: u32,
    pub text: String,
    #[serde(default)]
    pub words: Vec<WordBox>,
    pub size: Size,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub ocr_fallback: bool,
}

impl PageRecord {
    pub fn word_count(&self) -> usize {
        crate::text_utils::word_count(&self.text)
    }
}
