//! services/client/src/adapters/documents.rs
//!
//! This module contains the adapter for document upload and session cleanup.
//! It implements the `DocumentService` port from the `core` crate.

use async_trait::async_trait;
use nexus_core::domain::{DocumentUpload, UploadReceipt};
use nexus_core::ports::{DocumentService, PortError, PortResult};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::adapters::backend::BackendClient;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `DocumentService` over the upload and cleanup endpoints.
#[derive(Clone)]
pub struct BackendDocumentAdapter {
    client: BackendClient,
}

impl BackendDocumentAdapter {
    /// Creates a new `BackendDocumentAdapter`.
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct UploadRecord {
    filename: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    embedding_result: Option<EmbeddingRecord>,
}

#[derive(Deserialize)]
struct EmbeddingRecord {
    #[serde(default)]
    chunks_created: Option<u64>,
}

impl UploadRecord {
    fn to_domain(self) -> UploadReceipt {
        UploadReceipt {
            filename: self.filename,
            session_id: self.session_id.filter(|id| !id.is_empty()),
            chunks_created: self
                .embedding_result
                .and_then(|e| e.chunks_created)
                .unwrap_or(0),
        }
    }
}

#[derive(Serialize)]
struct CleanupRecord<'a> {
    session_id: &'a str,
}

//=========================================================================================
// `DocumentService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentService for BackendDocumentAdapter {
    async fn upload_document(&self, document: &DocumentUpload) -> PortResult<UploadReceipt> {
        let mut file = Part::bytes(document.bytes.clone()).file_name(document.filename.clone());
        if let Some(mime) = &document.mime_type {
            file = file
                .mime_str(mime)
                .map_err(|e| PortError::Unexpected(format!("Invalid MIME type: {}", e)))?;
        }
        let form = Form::new().part("file", file);

        let record: UploadRecord = self
            .client
            .post_multipart("/api/upload-document", form)
            .await?;
        Ok(record.to_domain())
    }

    async fn cleanup_session(&self, session_id: &str) -> PortResult<()> {
        self.client
            .post_json_status("/api/cleanup-session", &CleanupRecord { session_id })
            .await
    }
}

//=========================================================================================
// Local Files
//=========================================================================================

/// Reads a file from disk into an upload payload.
pub async fn load_document(path: &Path) -> std::io::Result<DocumentUpload> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let mime_type = guess_mime(path).map(str::to_string);
    Ok(DocumentUpload {
        filename,
        mime_type,
        bytes,
    })
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => return None,
    };
    Some(mime)
}
