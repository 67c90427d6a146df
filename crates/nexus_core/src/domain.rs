//! crates/nexus_core/src/domain.rs
//!
//! Defines the pure, core data structures for the chat client.
//! These structs are independent of any transport or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::catalog::{Preset, DEFAULT_MODEL};

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Assistant,
}

/// A citation attached to an assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A chunk of an uploaded document.
    Document {
        filename: Option<String>,
        page_number: Option<u32>,
        similarity: Option<f64>,
        content_type: Option<String>,
    },
    /// Anything the backend sent that is not a document record.
    Text(String),
}

/// A single entry of the displayed transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<Source>,
    pub context_used: bool,
    pub document_mode: bool,
}

impl ConversationMessage {
    /// Creates a message stamped with a fresh id and the current time.
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            content: content.into(),
            timestamp: Utc::now(),
            sources: Vec::new(),
            context_used: false,
            document_mode: false,
        }
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_context(mut self, context_used: bool, document_mode: bool) -> Self {
        self.context_used = context_used;
        self.document_mode = document_mode;
        self
    }
}

/// The API-shaped mirror of a transcript entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub role: Sender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Which system prompt is currently in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetSelection {
    Named(Preset),
    /// The system message was edited by hand.
    Custom,
}

/// Model and sampling parameters sent with every chat request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub system_message: String,
    pub active_preset: PresetSelection,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            top_p: 0.9,
            system_message: Preset::Helpful.prompt().to_string(),
            active_preset: PresetSelection::Named(Preset::Helpful),
        }
    }
}

/// Text-to-speech preferences. Pure configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePreferences {
    pub tts_enabled: bool,
    pub auto_play: bool,
    pub voice: String,
}

impl Default for VoicePreferences {
    fn default() -> Self {
        Self {
            tts_enabled: true,
            auto_play: false,
            voice: "default".to_string(),
        }
    }
}

//=========================================================================================
// Gateway Request and Reply Types
//=========================================================================================

/// Everything the backend needs to produce one chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub system_prompt: String,
    pub user_message: String,
    pub document_mode: bool,
}

impl ChatRequest {
    pub fn new(settings: &GenerationSettings, user_message: &str, document_mode: bool) -> Self {
        Self {
            model: settings.model.clone(),
            temperature: settings.temperature,
            top_p: settings.top_p,
            system_prompt: settings.system_message.clone(),
            user_message: user_message.to_string(),
            document_mode,
        }
    }
}

/// A validated chat completion reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub sources: Vec<Source>,
    pub context_used: bool,
}

/// A recorded audio payload ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl AudioClip {
    /// A WAV clip named the way the transcription endpoint expects.
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            filename: "recording.wav".to_string(),
            mime_type: "audio/wav".to_string(),
            bytes,
        }
    }
}

/// The result of a voice transcription round trip. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptionReply {
    pub transcript: Option<String>,
    pub response: Option<String>,
    pub sources: Vec<Source>,
    pub context_used: bool,
    pub document_mode: bool,
    /// Decoded spoken reply, if the backend synthesized one.
    pub audio: Option<Vec<u8>>,
}

/// A document selected for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// The backend's acknowledgement of a single document upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub filename: String,
    pub session_id: Option<String>,
    pub chunks_created: u64,
}

/// One event from a continuous speech recognizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    /// The current set of transcript fragments, interim ones included.
    Result { fragments: Vec<String> },
    Error(String),
    End,
}
