//! services/client/src/session/status.rs
//!
//! The transient status line. A notification stays visible for
//! `STATUS_VISIBLE_FOR`, blinks off for `STATUS_BLINK`, then the idle text
//! comes back. Each notification owns a cancellable pulse task; a newer
//! notification cancels the older pulse so it can never overwrite it.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::session::events::SessionEvent;
use crate::session::state::{SessionState, StatusLine};

pub const STATUS_VISIBLE_FOR: Duration = Duration::from_millis(3000);
pub const STATUS_BLINK: Duration = Duration::from_millis(100);

struct Pulse {
    id: Uuid,
    cancel: CancellationToken,
}

#[derive(Default)]
pub struct StatusNotifier {
    current: StdMutex<Option<Pulse>>,
}

impl StatusNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `text` and schedules its revert. Returns the notification id.
    pub async fn notify(
        &self,
        state: &Arc<Mutex<SessionState>>,
        events: &broadcast::Sender<SessionEvent>,
        text: &str,
    ) -> Uuid {
        let (id, cancel) = self.claim();
        show(state, events, cancel, text).await;
        id
    }

    /// Makes a new notification current and cancels the previous one.
    fn claim(&self) -> (Uuid, CancellationToken) {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        // Cancel before touching the state so a pulse that already woke up
        // sees the cancellation once it gets the lock.
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Pulse {
                id,
                cancel: cancel.clone(),
            });
        if let Some(previous) = previous {
            debug!("Status notification {} superseded by {}", previous.id, id);
            previous.cancel.cancel();
        }
        (id, cancel)
    }

    /// The id of the notification currently on screen, if any.
    pub fn current(&self) -> Option<Uuid> {
        self.current
            .lock()
            .ok()
            .and_then(|current| current.as_ref().map(|p| p.id))
    }
}

async fn pulse(
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(STATUS_VISIBLE_FOR) => {}
    }
    if !update_unless_cancelled(&state, &events, &cancel, None, false).await {
        return;
    }

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(STATUS_BLINK) => {}
    }
    let idle = StatusLine::idle();
    update_unless_cancelled(&state, &events, &cancel, Some(&idle.text), true).await;
}

async fn update_unless_cancelled(
    state: &Arc<Mutex<SessionState>>,
    events: &broadcast::Sender<SessionEvent>,
    cancel: &CancellationToken,
    text: Option<&str>,
    visible: bool,
) -> bool {
    let mut guard = state.lock().await;
    if cancel.is_cancelled() {
        return false;
    }
    if let Some(text) = text {
        guard.status.text = text.to_string();
    }
    guard.status.visible = visible;
    let _ = events.send(SessionEvent::StatusChanged(guard.status.clone()));
    true
}

/// Writes the notification unless a newer one claimed the line first, then
/// starts its pulse.
async fn show(
    state: &Arc<Mutex<SessionState>>,
    events: &broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    text: &str,
) {
    if update_unless_cancelled(state, events, &cancel, Some(text), true).await {
        tokio::spawn(pulse(state.clone(), events.clone(), cancel));
    }
}
