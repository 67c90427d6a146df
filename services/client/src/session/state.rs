//! services/client/src/session/state.rs
//!
//! The conversation state owned by one chat session: transcript, API history,
//! generation settings, voice preferences, document session and UI flags.
//! All mutation goes through `ChatSession`; this type only enforces the
//! invariants.

use nexus_core::catalog::{model_label, Preset, GREETING, IDLE_STATUS};
use nexus_core::domain::{
    ConversationMessage, GenerationSettings, HistoryEntry, PresetSelection, Sender,
    VoicePreferences,
};

/// The transient status line shown above the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub visible: bool,
}

impl StatusLine {
    pub fn idle() -> Self {
        Self {
            text: IDLE_STATUS.to_string(),
            visible: true,
        }
    }
}

pub struct SessionState {
    messages: Vec<ConversationMessage>,
    history: Vec<HistoryEntry>,
    session_id: Option<String>,
    pub settings: GenerationSettings,
    pub preferences: VoicePreferences,
    pub document_mode: bool,
    pub status: StatusLine,
}

impl SessionState {
    /// Creates a fresh state whose transcript holds only the greeting.
    pub fn new(settings: GenerationSettings, preferences: VoicePreferences) -> Self {
        Self {
            messages: vec![greeting()],
            history: Vec::new(),
            session_id: None,
            settings,
            preferences,
            document_mode: false,
            status: StatusLine::idle(),
        }
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Appends to both lists. Returns whether the message should be spoken.
    pub fn append_message(&mut self, message: ConversationMessage) -> bool {
        let speak = message.sender == Sender::Assistant
            && self.preferences.tts_enabled
            && self.preferences.auto_play;
        self.history.push(HistoryEntry {
            role: message.sender,
            content: message.content.clone(),
            timestamp: message.timestamp,
        });
        self.messages.push(message);
        speak
    }

    /// Unknown names leave the state untouched and return `false`.
    pub fn apply_preset(&mut self, name: &str) -> bool {
        match Preset::from_name(name) {
            Some(preset) => {
                self.settings.system_message = preset.prompt().to_string();
                self.settings.active_preset = PresetSelection::Named(preset);
                true
            }
            None => false,
        }
    }

    pub fn set_system_message(&mut self, text: &str) {
        self.settings.system_message = text.to_string();
        self.settings.active_preset = PresetSelection::Custom;
    }

    /// Stores the raw model id and returns the label to announce.
    pub fn set_model(&mut self, value: &str) -> String {
        self.settings.model = value.to_string();
        model_label(value).unwrap_or(value).to_string()
    }

    /// Resets the transcript to the greeting. The document session survives.
    pub fn clear_conversation(&mut self) {
        self.messages = vec![greeting()];
        self.history.clear();
    }

    /// Records a backend-assigned session id. Returns `true` if it changed.
    pub fn record_session_id(&mut self, session_id: &str) -> bool {
        if self.session_id.as_deref() == Some(session_id) {
            return false;
        }
        self.session_id = Some(session_id.to_string());
        true
    }

    /// Forgets the session id, but only if it is still `session_id`.
    pub fn clear_session_id_if(&mut self, session_id: &str) -> bool {
        if self.session_id.as_deref() == Some(session_id) {
            self.session_id = None;
            true
        } else {
            false
        }
    }
}

fn greeting() -> ConversationMessage {
    ConversationMessage::new(Sender::Assistant, GREETING)
}
