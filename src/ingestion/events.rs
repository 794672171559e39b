use serde::Serialize;
use ts_rs::TS;

/// Notifications emitted by the ingestion loop. Exactly one terminal event
/// (`Ready`, `Failed` or `Cancelled`) is sent per run.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum IngestionEvent {
    Progress {
        book_id: String,
        processed: usize,
        total: u32,
        ratio: f64,
    },
    LanguageMismatch {
        book_id: String,
        detected: String,
        expected: String,
    },
    Ready {
        book_id: String,
    },
    Failed {
        book_id: String,
        reason: String,
    },
    Cancelled {
        book_id: String,
    },
}

impl IngestionEvent {
    pub fn book_id(&self) -> &str {
        match self {
            Self::Progress { book_id, .. }
            | Self::LanguageMismatch { book_id, .. }
            | Self::Ready { book_id }
            | Self::Failed { book_id, .. }
            | Self::Cancelled { book_id } => book_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Ready { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Fraction of pages stored so far, clamped to `[0, 1]`. A document with no
/// pages counts as complete.
pub fn progress_ratio(processed: usize, total: u32) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (processed as f64 / total as f64).clamp(0.0, 1.0)
}

/// Whether a detected page language matches the expected locale prefix
/// (`"pt-BR"` matches `"pt"`).
pub fn language_matches(detected: &str, expected_prefix: &str) -> bool {
    let expected = expected_prefix.trim().to_ascii_lowercase();
    if expected.is_empty() {
        return true;
    }
    detected.trim().to_ascii_lowercase().starts_with(&expected)
}
