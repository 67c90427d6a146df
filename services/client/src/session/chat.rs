//! services/client/src/session/chat.rs
//!
//! `ChatSession` is the single handle front ends hold. It owns the
//! `SessionState`, the service ports and the event channel, and it applies
//! the failure policy of each backend exchange:
//!
//! - chat: every failure becomes one fallback assistant turn, never an `Err`.
//! - transcription: failures are logged and returned to the caller.
//! - upload: each file fails on its own; the batch always finishes.
//! - cleanup: failures are only logged and leave the session id in place.
//!
//! At most one backend exchange (send, transcribe or upload batch) is in
//! flight per session. A second one is refused instead of interleaving.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nexus_core::catalog::Preset;
use nexus_core::domain::{
    AudioClip, ChatRequest, ConversationMessage, DocumentUpload, GenerationSettings,
    HistoryEntry, Sender, Source, TranscriptionReply, UploadReceipt, VoicePreferences,
};
use nexus_core::ports::{
    AudioOutput, ChatCompletionService, DocumentService, SpeechToTextService,
    TextToSpeechService,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ClientError;
use crate::session::events::SessionEvent;
use crate::session::state::{SessionState, StatusLine};
use crate::session::status::StatusNotifier;

pub const CHAT_FALLBACK: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";
pub const VOICE_FALLBACK: &str = "Sorry, I couldn't process your voice message. Please try again.";
pub const SINGLE_UPLOAD_HINT: &str = "💡 You can now ask me questions about this document!";

const EVENT_CAPACITY: usize = 256;

//=========================================================================================
// Services
//=========================================================================================

/// The ports a session talks through, created once at startup.
#[derive(Clone)]
pub struct Services {
    pub chat: Arc<dyn ChatCompletionService>,
    pub sst: Arc<dyn SpeechToTextService>,
    pub tts: Arc<dyn TextToSpeechService>,
    pub documents: Arc<dyn DocumentService>,
    pub audio_output: Arc<dyn AudioOutput>,
}

//=========================================================================================
// Outcomes
//=========================================================================================

/// What happened to a chat send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing was appended.
    Ignored,
    /// Another exchange was in flight; nothing was appended.
    Busy,
    /// The backend replied and the reply was appended.
    Answered,
    /// The request failed and the fallback turn was appended.
    Failed,
}

/// The result of an upload batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSummary {
    pub uploaded: Vec<UploadReceipt>,
    /// `(filename, reason)` for every file that failed.
    pub failed: Vec<(String, String)>,
    pub total_chunks: u64,
}

//=========================================================================================
// ChatSession
//=========================================================================================

pub struct ChatSession {
    services: Services,
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
    notifier: StatusNotifier,
    in_flight: Arc<AtomicBool>,
}

/// Clears the loading flag when an exchange ends, on every path.
struct InFlight {
    flag: Arc<AtomicBool>,
    events: broadcast::Sender<SessionEvent>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        let _ = self.events.send(SessionEvent::LoadingChanged(false));
    }
}

impl ChatSession {
    pub fn new(
        services: Services,
        settings: GenerationSettings,
        preferences: VoicePreferences,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            services,
            state: Arc::new(Mutex::new(SessionState::new(settings, preferences))),
            events,
            notifier: StatusNotifier::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Receives every event committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn begin_exchange(&self) -> Option<InFlight> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.emit(SessionEvent::LoadingChanged(true));
        Some(InFlight {
            flag: self.in_flight.clone(),
            events: self.events.clone(),
        })
    }

    // --- Snapshots ---

    pub async fn messages(&self) -> Vec<ConversationMessage> {
        self.state.lock().await.messages().to_vec()
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.history().to_vec()
    }

    pub async fn settings(&self) -> GenerationSettings {
        self.state.lock().await.settings.clone()
    }

    pub async fn preferences(&self) -> VoicePreferences {
        self.state.lock().await.preferences.clone()
    }

    pub async fn session_id(&self) -> Option<String> {
        self.state.lock().await.session_id().map(str::to_string)
    }

    pub async fn status(&self) -> StatusLine {
        self.state.lock().await.status.clone()
    }

    pub async fn document_mode(&self) -> bool {
        self.state.lock().await.document_mode
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    //=====================================================================================
    // Store Operations
    //=====================================================================================

    /// Appends a turn to the transcript and the API history.
    pub async fn append_message(
        &self,
        content: impl Into<String>,
        sender: Sender,
        sources: Vec<Source>,
        context_used: bool,
        document_mode: bool,
    ) -> ConversationMessage {
        let message = ConversationMessage::new(sender, content)
            .with_sources(sources)
            .with_context(context_used, document_mode);
        let speak = self.state.lock().await.append_message(message.clone());
        self.emit(SessionEvent::MessageCommitted {
            message: message.clone(),
            speak,
        });
        message
    }

    async fn append_assistant(&self, content: impl Into<String>) -> ConversationMessage {
        self.append_message(content, Sender::Assistant, Vec::new(), false, false)
            .await
    }

    /// Selects a named preset. Unknown names are ignored.
    pub async fn apply_preset(&self, name: &str) -> bool {
        let applied = self.state.lock().await.apply_preset(name);
        if !applied {
            debug!("Ignoring unknown preset '{}'", name);
        }
        applied
    }

    /// Replaces the system message by hand; the preset becomes custom.
    pub async fn set_system_message(&self, text: &str) {
        self.state.lock().await.set_system_message(text);
    }

    /// Confirms a hand-edited system message.
    pub async fn apply_system(&self) -> bool {
        let has_text = !self
            .state
            .lock()
            .await
            .settings
            .system_message
            .trim()
            .is_empty();
        if has_text {
            self.notify_status("System message updated successfully.")
                .await;
        }
        has_text
    }

    pub async fn reset_system(&self) {
        self.apply_preset(Preset::Helpful.name()).await;
        self.notify_status("System message reset to default.").await;
    }

    pub async fn set_model(&self, value: &str) {
        let label = self.state.lock().await.set_model(value);
        info!("Model set to {}", value);
        self.notify_status(&format!(
            "Switched to {}. Model configuration updated.",
            label
        ))
        .await;
    }

    pub async fn set_temperature(&self, temperature: f32) {
        self.state.lock().await.settings.temperature = temperature;
    }

    pub async fn set_top_p(&self, top_p: f32) {
        self.state.lock().await.settings.top_p = top_p;
    }

    pub async fn set_document_mode(&self, enabled: bool) {
        self.state.lock().await.document_mode = enabled;
    }

    pub async fn set_tts_enabled(&self, enabled: bool) {
        self.state.lock().await.preferences.tts_enabled = enabled;
    }

    pub async fn set_auto_play(&self, enabled: bool) {
        self.state.lock().await.preferences.auto_play = enabled;
    }

    pub async fn set_voice(&self, voice: &str) {
        self.state.lock().await.preferences.voice = voice.to_string();
    }

    /// Shows a transient status notification. A newer one replaces it.
    pub async fn notify_status(&self, text: &str) -> Uuid {
        self.notifier.notify(&self.state, &self.events, text).await
    }

    /// Resets the transcript. Uploaded documents and the session id are kept.
    pub async fn clear_conversation(&self) {
        self.state.lock().await.clear_conversation();
        self.emit(SessionEvent::ConversationCleared);
        info!("Conversation cleared; documents preserved");
    }

    async fn record_session_id(&self, session_id: &str) {
        let changed = self.state.lock().await.record_session_id(session_id);
        if changed {
            info!("Document session is now {}", session_id);
            self.emit(SessionEvent::DocumentSessionChanged {
                session_id: Some(session_id.to_string()),
            });
        }
    }

    //=====================================================================================
    // Backend Exchanges
    //=====================================================================================

    /// Sends what the user typed: the user turn, then the assistant reply.
    pub async fn send_message(&self, input: &str) -> SendOutcome {
        let message = input.trim();
        if message.is_empty() {
            return SendOutcome::Ignored;
        }
        let Some(_in_flight) = self.begin_exchange() else {
            warn!("Send refused: another request is in flight");
            return SendOutcome::Busy;
        };

        let document_mode = self.document_mode().await;
        self.append_message(message, Sender::User, Vec::new(), false, false)
            .await;
        self.exchange_chat(message, document_mode).await
    }

    /// Requests a completion for `message` and appends the assistant turn.
    /// Never fails: errors turn into the fallback turn.
    pub async fn send_chat_message(&self, message: &str, document_mode: bool) -> SendOutcome {
        let Some(_in_flight) = self.begin_exchange() else {
            warn!("Send refused: another request is in flight");
            return SendOutcome::Busy;
        };
        self.exchange_chat(message, document_mode).await
    }

    async fn exchange_chat(&self, message: &str, document_mode: bool) -> SendOutcome {
        let request = {
            let state = self.state.lock().await;
            ChatRequest::new(&state.settings, message, document_mode)
        };
        info!(
            "Sending chat message (model {}, document mode {})",
            request.model, document_mode
        );

        match self.services.chat.complete(&request).await {
            Ok(reply) => {
                debug!("Received {} sources", reply.sources.len());
                self.append_message(
                    reply.response,
                    Sender::Assistant,
                    reply.sources,
                    reply.context_used,
                    document_mode,
                )
                .await;
                SendOutcome::Answered
            }
            Err(e) => {
                error!("Error sending message: {}", e);
                self.append_assistant(CHAT_FALLBACK).await;
                SendOutcome::Failed
            }
        }
    }

    /// Synthesizes `text` and plays it.
    pub async fn speak(&self, text: &str) -> Result<(), ClientError> {
        let audio = self.services.tts.generate_audio(text).await?;
        self.play_audio(&audio).await
    }

    pub async fn play_audio(&self, audio: &[u8]) -> Result<(), ClientError> {
        self.services.audio_output.play(audio).await?;
        Ok(())
    }

    /// Transcribes a voice clip and appends the resulting turns.
    ///
    /// Unlike `send_message`, failures are returned so the recorder can
    /// react to them.
    pub async fn transcribe_audio(&self, clip: &AudioClip) -> Result<TranscriptionReply, ClientError> {
        let _in_flight = self.begin_exchange().ok_or(ClientError::Busy)?;
        let document_mode = self.document_mode().await;

        let reply = self
            .services
            .sst
            .transcribe(clip, document_mode)
            .await
            .map_err(|e| {
                error!("Voice transcription error: {}", e);
                ClientError::Port(e)
            })?;

        if let Some(transcript) = &reply.transcript {
            info!("Transcribed: '{}'", transcript);
            self.append_message(transcript.clone(), Sender::User, Vec::new(), false, false)
                .await;

            if let Some(response) = &reply.response {
                self.append_message(
                    response.clone(),
                    Sender::Assistant,
                    reply.sources.clone(),
                    reply.context_used,
                    reply.document_mode,
                )
                .await;
            }

            if let Some(audio) = &reply.audio {
                if self.state.lock().await.preferences.tts_enabled {
                    self.emit(SessionEvent::AudioReady {
                        audio: Arc::new(audio.clone()),
                    });
                }
            }
        } else {
            warn!("Transcription returned no transcript");
        }

        Ok(reply)
    }

    /// Uploads documents one after another.
    pub async fn upload_documents(
        &self,
        documents: Vec<DocumentUpload>,
    ) -> Result<UploadSummary, ClientError> {
        let _in_flight = self.begin_exchange().ok_or(ClientError::Busy)?;
        let mut summary = UploadSummary::default();

        for document in &documents {
            info!("Uploading: {}", document.filename);
            match self.services.documents.upload_document(document).await {
                Ok(receipt) => {
                    if let Some(session_id) = &receipt.session_id {
                        self.record_session_id(session_id).await;
                    }
                    self.append_assistant(format!(
                        "✅ Uploaded: {}\n📄 Created {} chunks for AI knowledge",
                        receipt.filename, receipt.chunks_created
                    ))
                    .await;
                    summary.total_chunks += receipt.chunks_created;
                    summary.uploaded.push(receipt);
                }
                Err(e) => {
                    error!("Upload error for {}: {}", document.filename, e);
                    self.append_assistant(format!(
                        "❌ Upload failed for {}: {}",
                        document.filename, e
                    ))
                    .await;
                    summary.failed.push((document.filename.clone(), e.to_string()));
                }
            }
        }

        match summary.uploaded.len() {
            0 => {}
            1 => {
                self.append_assistant(SINGLE_UPLOAD_HINT).await;
            }
            count => {
                self.append_assistant(format!(
                    "🎉 Successfully uploaded {} documents with {} total chunks!\n\nYou can now ask me questions about these documents.",
                    count, summary.total_chunks
                ))
                .await;
            }
        }

        Ok(summary)
    }

    /// Deletes the server-side documents of `session_id`.
    ///
    /// Returns `false` on any failure, in which case nothing local changes
    /// and the delete can be retried.
    pub async fn cleanup_session(&self, session_id: &str) -> bool {
        match self.services.documents.cleanup_session(session_id).await {
            Ok(()) => {
                info!("Session {} cleaned up", session_id);
                let cleared = self.state.lock().await.clear_session_id_if(session_id);
                if cleared {
                    self.emit(SessionEvent::DocumentSessionChanged { session_id: None });
                }
                true
            }
            Err(e) => {
                error!("Failed to clean up session {}: {}", session_id, e);
                false
            }
        }
    }

    /// The user-confirmed "delete all documents" action. The caller is
    /// responsible for asking for confirmation first.
    ///
    /// Document mode and the transcript are only reset after the backend
    /// confirmed the cleanup; a failed delete leaves everything in place.
    pub async fn delete_documents(&self) -> bool {
        let Some(session_id) = self.session_id().await else {
            debug!("No document session to delete");
            return false;
        };
        if !self.cleanup_session(&session_id).await {
            return false;
        }
        self.set_document_mode(false).await;
        self.clear_conversation().await;
        true
    }
}
