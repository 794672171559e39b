//! Remote processing service: upload, per-page extraction, audio
//! transcription and output generation.

mod http;
#[cfg(test)]
pub(crate) mod testing;
mod wire;

pub use http::HttpProcessingService;

use crate::store::PageRecord;
use std::future::Future;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("service answered HTTP {0}")]
    Status(u16),
    #[error("service rejected request: {0}")]
    Rejected(String),
    #[error("could not decode service response: {0}")]
    Decode(String),
}

/// Result of handing a source file to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub book_id: String,
    pub original_name: String,
    pub total_pages: u32,
}

/// Stateless request/response access to the processing service.
pub trait ProcessingService: Send + Sync + 'static {
    fn start_processing(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<UploadReceipt, ServiceError>> + Send;

    /// Fetches one page; `page_number` is 1-based.
    fn fetch_page(
        &self,
        book_id: &str,
        page_number: u32,
    ) -> impl Future<Output = Result<PageRecord, ServiceError>> + Send;

    fn transcribe_audio(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<String, ServiceError>> + Send;

    fn generate_output(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<u8>, ServiceError>> + Send;
}
