//! JSON shapes exchanged with the processing service. Field names follow the
//! service's own (Portuguese) vocabulary; everything is converted into domain
//! types at this boundary.

use super::{ServiceError, UploadReceipt};
use crate::geometry::{Rect, Size};
use crate::store::{PageRecord, WordBox};
use serde::{Deserialize, Serialize};

pub(crate) const STATUS_SUCCESS: &str = "sucesso";

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub id_arquivo: String,
    pub nome_original: String,
    pub total_paginas: u32,
}

impl From<UploadResponse> for UploadReceipt {
    fn from(response: UploadResponse) -> Self {
        UploadReceipt {
            book_id: response.id_arquivo,
            original_name: response.nome_original,
            total_pages: response.total_paginas,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PageRequest<'a> {
    pub id_arquivo: &'a str,
    pub numero_pagina: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageResponse {
    pub status: String,
    #[serde(default)]
    pub dados: Option<PageData>,
    #[serde(default)]
    pub mensagem: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageData {
    #[serde(default)]
    pub texto_completo: String,
    #[serde(default)]
    pub idioma: Option<String>,
    pub dimensoes: Dimensions,
    #[serde(default)]
    pub palavras: Vec<WordData>,
    #[serde(default)]
    pub extraido_por_ocr: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Dimensions {
    pub largura: f32,
    pub altura: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WordData {
    pub coords: Coords,
    #[serde(default)]
    pub texto: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Coords {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageResponse {
    pub(crate) fn into_page(self, page_number: u32) -> Result<PageRecord, ServiceError> {
        if self.status != STATUS_SUCCESS {
            return Err(ServiceError::Rejected(format!(
                "page {page_number} returned status={} ({})",
                self.status,
                self.mensagem.as_deref().unwrap_or("no message")
            )));
        }
        let data = self.dados.ok_or_else(|| {
            ServiceError::Decode(format!("page {page_number} succeeded without data"))
        })?;
        Ok(PageRecord {
            page_number,
            text: data.texto_completo,
            words: data
                .palavras
                .into_iter()
                .map(|word| WordBox {
                    text: word.texto,
                    rect: Rect::new(word.coords.x0, word.coords.y0, word.coords.x1, word.coords.y1),
                })
                .collect(),
            size: Size::new(data.dimensoes.largura, data.dimensoes.altura),
            language: data.idioma.filter(|lang| !lang.trim().is_empty()),
            ocr_fallback: data.extraido_por_ocr,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct TranscriptionResponse {
    #[serde(default)]
    pub texto: Option<String>,
    #[serde(default)]
    pub erro: Option<String>,
}

impl TranscriptionResponse {
    pub(crate) fn into_text(self) -> Result<String, ServiceError> {
        match (self.texto, self.erro) {
            (_, Some(err)) => Err(ServiceError::Rejected(err)),
            (Some(text), None) => Ok(text),
            (None, None) => Err(ServiceError::Decode(
                "transcription returned neither text nor error".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateRequest<'a> {
    pub texto: &'a str,
}
