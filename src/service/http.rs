use super::wire::{
    GenerateRequest, PageRequest, PageResponse, TranscriptionResponse, UploadResponse,
};
use super::{ProcessingService, ServiceError, UploadReceipt};
use crate::config::AppConfig;
use crate::store::PageRecord;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("pagecast/", env!("CARGO_PKG_VERSION"));
const UPLOAD_PATH: &str = "iniciar_processamento";
const PAGE_PATH: &str = "obter_pagina";
const TRANSCRIBE_PATH: &str = "transcrever_audio";
const GENERATE_PATH: &str = "gerar_pdf";

/// [`ProcessingService`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProcessingService {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    page_timeout: Duration,
}

impl HttpProcessingService {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        page_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|err| ServiceError::Network(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
            page_timeout,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            &config.base_url,
            config.request_timeout(),
            config.page_fetch_timeout(),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

fn map_send_error(err: reqwest::Error, timeout: Duration) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout(timeout)
    } else {
        ServiceError::Network(err.to_string())
    }
}

fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        warn!(status = status.as_u16(), url = %response.url(), "Service returned error status");
        return Err(ServiceError::Status(status.as_u16()));
    }
    Ok(response)
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    response
        .json::<T>()
        .await
        .map_err(|err| ServiceError::Decode(err.to_string()))
}

impl ProcessingService for HttpProcessingService {
    async fn start_processing(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReceipt, ServiceError> {
        info!(file_name, bytes = bytes.len(), "Uploading source for processing");
        let form = Form::new().part("arquivo", Part::bytes(bytes).file_name(file_name.to_string()));
        let response = self
            .client
            .post(self.url(UPLOAD_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|err| map_send_error(err, self.request_timeout))?;
        let receipt: UploadReceipt = decode_json::<UploadResponse>(ensure_success(response)?)
            .await?
            .into();
        info!(
            book_id = %receipt.book_id,
            total_pages = receipt.total_pages,
            "Processing started"
        );
        Ok(receipt)
    }

    async fn fetch_page(&self, book_id: &str, page_number: u32) -> Result<PageRecord, ServiceError> {
        debug!(book_id, page_number, "Requesting page");
        let response = self
            .client
            .post(self.url(PAGE_PATH))
            .timeout(self.page_timeout)
            .json(&PageRequest {
                id_arquivo: book_id,
                numero_pagina: page_number,
            })
            .send()
            .await
            .map_err(|err| map_send_error(err, self.page_timeout))?;
        decode_json::<PageResponse>(ensure_success(response)?)
            .await?
            .into_page(page_number)
    }

    async fn transcribe_audio(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, ServiceError> {
        info!(file_name, bytes = bytes.len(), "Uploading audio for transcription");
        let form = Form::new().part("audio", Part::bytes(bytes).file_name(file_name.to_string()));
        let response = self
            .client
            .post(self.url(TRANSCRIBE_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|err| map_send_error(err, self.request_timeout))?;
        decode_json::<TranscriptionResponse>(ensure_success(response)?)
            .await?
            .into_text()
    }

    async fn generate_output(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        info!(chars = text.chars().count(), "Requesting generated document");
        let response = self
            .client
            .post(self.url(GENERATE_PATH))
            .json(&GenerateRequest { texto: text })
            .send()
            .await
            .map_err(|err| map_send_error(err, self.request_timeout))?;
        let bytes = ensure_success(response)?
            .bytes()
            .await
            .map_err(|err| ServiceError::Network(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}
