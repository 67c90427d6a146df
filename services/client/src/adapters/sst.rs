//! services/client/src/adapters/sst.rs
//!
//! This module contains the adapter for the backend's voice transcription endpoint.
//! It implements the `SpeechToTextService` port from the `core` crate.

use async_trait::async_trait;
use nexus_core::domain::{AudioClip, TranscriptionReply};
use nexus_core::ports::{PortError, PortResult, SpeechToTextService};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::warn;

use crate::adapters::backend::{decode_audio, sources_to_domain, BackendClient, SourceRecord};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechToTextService` port over `POST /transcribe`.
#[derive(Clone)]
pub struct BackendSstAdapter {
    client: BackendClient,
}

impl BackendSstAdapter {
    /// Creates a new `BackendSstAdapter`.
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    fn build_form(clip: &AudioClip, document_mode: bool) -> PortResult<Form> {
        let audio = Part::bytes(clip.bytes.clone())
            .file_name(clip.filename.clone())
            .mime_str(&clip.mime_type)
            .map_err(|e| PortError::Unexpected(format!("Invalid audio MIME type: {}", e)))?;

        Ok(Form::new()
            .part("audio", audio)
            .text("document_mode", document_mode.to_string()))
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize, Default)]
#[serde(default)]
struct TranscriptionRecord {
    transcript: Option<String>,
    response: Option<String>,
    sources: Option<Vec<SourceRecord>>,
    context_used: Option<bool>,
    document_mode: Option<bool>,
    audio: Option<String>,
}

impl TranscriptionRecord {
    /// Undecodable audio is dropped so the transcript and reply still land.
    fn to_domain(self) -> TranscriptionReply {
        let audio = self
            .audio
            .filter(|a| !a.is_empty())
            .and_then(|encoded| match decode_audio(&encoded) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Dropping voice reply audio: {}", e);
                    None
                }
            });
        TranscriptionReply {
            transcript: self.transcript.filter(|t| !t.is_empty()),
            response: self.response.filter(|r| !r.is_empty()),
            sources: sources_to_domain(self.sources),
            context_used: self.context_used.unwrap_or(false),
            document_mode: self.document_mode.unwrap_or(false),
            audio,
        }
    }
}

//=========================================================================================
// `SpeechToTextService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SpeechToTextService for BackendSstAdapter {
    async fn transcribe(
        &self,
        clip: &AudioClip,
        document_mode: bool,
    ) -> PortResult<TranscriptionReply> {
        let form = Self::build_form(clip, document_mode)?;
        let record: TranscriptionRecord = self.client.post_multipart("/transcribe", form).await?;
        Ok(record.to_domain())
    }
}
