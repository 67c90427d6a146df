//! services/client/src/session/events.rs
//!
//! Notifications broadcast by a `ChatSession` after each committed change.
//! Front ends render from them; the playback task speaks from them.

use nexus_core::domain::ConversationMessage;
use std::sync::Arc;

use crate::session::state::StatusLine;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A message was appended. `speak` is set when auto-play applies to it.
    MessageCommitted {
        message: ConversationMessage,
        speak: bool,
    },

    /// The transcript was reset to the greeting.
    ConversationCleared,

    /// The status line text or visibility changed.
    StatusChanged(StatusLine),

    /// The backend document session was created, replaced or removed.
    DocumentSessionChanged { session_id: Option<String> },

    /// The backend returned spoken audio alongside a voice reply.
    AudioReady { audio: Arc<Vec<u8>> },

    /// A backend exchange started (`true`) or finished (`false`).
    LoadingChanged(bool),
}
