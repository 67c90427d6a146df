//! crates/nexus_core/src/ports.rs
//!
//! Defines the service contracts (traits) the chat session depends on.
//! The session only talks to the backend, the speakers and the microphone
//! through these traits, so it stays independent of HTTP and of any
//! particular audio stack.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::domain::{
    AudioClip, ChatReply, ChatRequest, DocumentUpload, RecognitionEvent, TranscriptionReply,
    UploadReceipt,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The request never produced an HTTP response (DNS, connect, reset...).
    #[error("Transport failure: {0}")]
    Transport(String),
    /// The backend answered with a non-2xx status.
    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The body did not match the expected response schema.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// A local device or program could not be used.
    #[error("Unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Events from an active speech recognition session.
pub type RecognitionStream = Pin<Box<dyn Stream<Item = RecognitionEvent> + Send>>;

//=========================================================================================
// Backend Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    /// Produces one assistant reply for a user message.
    async fn complete(&self, request: &ChatRequest) -> PortResult<ChatReply>;
}

#[async_trait]
pub trait SpeechToTextService: Send + Sync {
    /// Transcribes a clip and, depending on the backend, answers it as well.
    async fn transcribe(&self, clip: &AudioClip, document_mode: bool)
        -> PortResult<TranscriptionReply>;
}

#[async_trait]
pub trait TextToSpeechService: Send + Sync {
    /// Generates encoded audio (MPEG) from a string of text.
    async fn generate_audio(&self, text: &str) -> PortResult<Vec<u8>>;
}

#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn upload_document(&self, document: &DocumentUpload) -> PortResult<UploadReceipt>;

    /// Deletes every server-side document grouped under `session_id`.
    async fn cleanup_session(&self, session_id: &str) -> PortResult<()>;
}

//=========================================================================================
// Media Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Plays encoded audio to completion.
    async fn play(&self, audio: &[u8]) -> PortResult<()>;
}

#[async_trait]
pub trait AudioInput: Send + Sync {
    /// Opens the microphone.
    async fn open(&self) -> PortResult<Box<dyn AudioStream>>;
}

/// An open microphone stream producing raw little-endian 16-bit mono PCM.
#[async_trait]
pub trait AudioStream: Send {
    /// The next buffered chunk, or `None` once the device stops producing.
    async fn next_chunk(&mut self) -> Option<PortResult<Vec<u8>>>;

    /// Stops the underlying device. Must be safe to call more than once.
    async fn release(&mut self);
}

pub trait SpeechRecognizer: Send + Sync {
    /// Begins continuous recognition. Dropping the stream stops it.
    fn start(&self) -> PortResult<RecognitionStream>;
}
