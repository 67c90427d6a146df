//! services/client/src/adapters/tts.rs
//!
//! This module contains the adapter for the backend's Text-to-Speech endpoint.
//! It implements the `TextToSpeechService` port from the `core` crate.

use async_trait::async_trait;
use nexus_core::ports::{PortResult, TextToSpeechService};
use serde::{Deserialize, Serialize};

use crate::adapters::backend::{decode_audio, BackendClient};

/// An adapter that implements the `TextToSpeechService` port over `POST /text-to-speech`.
#[derive(Clone)]
pub struct BackendTtsAdapter {
    client: BackendClient,
}

impl BackendTtsAdapter {
    /// Creates a new `BackendTtsAdapter`.
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct SpeechRequestRecord<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SpeechResponseRecord {
    audio: String,
}

#[async_trait]
impl TextToSpeechService for BackendTtsAdapter {
    /// Returns the decoded MPEG bytes for `text`.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>> {
        let record: SpeechResponseRecord = self
            .client
            .post_json("/text-to-speech", &SpeechRequestRecord { text })
            .await?;
        decode_audio(&record.audio)
    }
}
