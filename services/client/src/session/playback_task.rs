//! services/client/src/session/playback_task.rs
//!
//! This module contains the asynchronous "worker" that turns session events
//! into sound: auto-played assistant replies and audio returned by voice
//! transcription. Playback is sequential, one clip at a time.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::chat::ChatSession;
use crate::session::events::SessionEvent;

/// Runs until `cancellation_token` fires or the event channel closes.
///
/// Playback failures are logged and never reach the conversation.
pub async fn playback_process(
    session: Arc<ChatSession>,
    mut events: broadcast::Receiver<SessionEvent>,
    cancellation_token: CancellationToken,
) {
    info!("Playback task started.");

    loop {
        let event = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(SessionEvent::MessageCommitted {
                message,
                speak: true,
            }) => {
                debug!("Auto-playing message {}", message.id);
                if let Err(e) = session.speak(&message.content).await {
                    warn!("TTS error: {}", e);
                }
            }
            Ok(SessionEvent::AudioReady { audio }) => {
                if let Err(e) = session.play_audio(&audio).await {
                    warn!("Failed to play voice reply: {}", e);
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!("Playback task fell behind; skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    info!("Playback task stopped.");
}
