//! services/client/src/capture/dictation.rs
//!
//! Continuous speech-to-text into the input buffer. Each recognition result
//! replaces the buffer with the concatenated fragments, interim ones
//! included, so the user sees the sentence grow as they speak.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use nexus_core::domain::RecognitionEvent;
use nexus_core::ports::{RecognitionStream, SpeechRecognizer};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ClientError;

struct ActiveRecognition {
    cancel: CancellationToken,
    listening: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Owns at most one recognition session at a time.
pub struct Dictation {
    recognizer: Arc<dyn SpeechRecognizer>,
    input: Arc<Mutex<String>>,
    active: Option<ActiveRecognition>,
}

impl Dictation {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, input: Arc<Mutex<String>>) -> Self {
        Self {
            recognizer,
            input,
            active: None,
        }
    }

    /// The buffer recognition results are written into.
    pub fn input(&self) -> Arc<Mutex<String>> {
        self.input.clone()
    }

    /// False once the session was stopped, errored or ended on its own.
    pub fn is_listening(&self) -> bool {
        self.active
            .as_ref()
            .map(|active| active.listening.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Starts recognition unless a session is already listening.
    pub fn start(&mut self) -> Result<(), ClientError> {
        if self.is_listening() {
            return Ok(());
        }
        if let Some(finished) = self.active.take() {
            finished.cancel.cancel();
        }

        let stream = self.recognizer.start()?;
        let cancel = CancellationToken::new();
        let listening = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(recognize(
            stream,
            self.input.clone(),
            cancel.clone(),
            listening.clone(),
        ));
        self.active = Some(ActiveRecognition {
            cancel,
            listening,
            task,
        });
        info!("Speech recognition started");
        Ok(())
    }

    /// Stops the current session and waits for it to wind down.
    pub async fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            if let Err(e) = active.task.await {
                warn!("Speech recognition task failed: {}", e);
            }
        }
    }

    /// Returns whether recognition is running after the toggle.
    pub async fn toggle(&mut self) -> Result<bool, ClientError> {
        if self.is_listening() {
            self.stop().await;
            Ok(false)
        } else {
            self.start()?;
            Ok(true)
        }
    }
}

impl Drop for Dictation {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

async fn recognize(
    mut stream: RecognitionStream,
    input: Arc<Mutex<String>>,
    cancel: CancellationToken,
    listening: Arc<AtomicBool>,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = stream.next() => event,
        };
        match event {
            Some(RecognitionEvent::Result { fragments }) => {
                *input.lock().await = fragments.concat();
            }
            Some(RecognitionEvent::Error(reason)) => {
                warn!("Speech recognition error: {}", reason);
                break;
            }
            Some(RecognitionEvent::End) | None => break,
        }
    }
    listening.store(false, Ordering::Release);
    info!("Speech recognition stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use nexus_core::ports::{PortError, PortResult};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    /// Hands out one event channel per `start`.
    struct FakeRecognizer {
        pending: StdMutex<Vec<mpsc::UnboundedReceiver<RecognitionEvent>>>,
        starts: AtomicUsize,
    }

    impl FakeRecognizer {
        fn with_sessions(count: usize) -> (Arc<Self>, Vec<mpsc::UnboundedSender<RecognitionEvent>>) {
            let mut senders = Vec::new();
            let mut receivers = Vec::new();
            for _ in 0..count {
                let (tx, rx) = mpsc::unbounded();
                senders.push(tx);
                receivers.push(rx);
            }
            receivers.reverse();
            let recognizer = Arc::new(Self {
                pending: StdMutex::new(receivers),
                starts: AtomicUsize::new(0),
            });
            (recognizer, senders)
        }
    }

    impl SpeechRecognizer for FakeRecognizer {
        fn start(&self) -> PortResult<RecognitionStream> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            match self.pending.lock().unwrap().pop() {
                Some(rx) => Ok(Box::pin(rx)),
                None => Err(PortError::Unavailable("no recognizer".to_string())),
            }
        }
    }

    fn dictation(recognizer: Arc<FakeRecognizer>) -> Dictation {
        Dictation::new(recognizer, Arc::new(Mutex::new(String::new())))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn interim_results_replace_the_input() {
        let (recognizer, senders) = FakeRecognizer::with_sessions(1);
        let mut dictation = dictation(recognizer);
        dictation.start().unwrap();

        senders[0]
            .unbounded_send(RecognitionEvent::Result {
                fragments: vec!["hel".to_string()],
            })
            .unwrap();
        settle().await;
        assert_eq!(*dictation.input().lock().await, "hel");

        senders[0]
            .unbounded_send(RecognitionEvent::Result {
                fragments: vec!["hello".to_string(), " world".to_string()],
            })
            .unwrap();
        settle().await;
        assert_eq!(*dictation.input().lock().await, "hello world");
        assert!(dictation.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn error_and_end_stop_listening() {
        let (recognizer, senders) = FakeRecognizer::with_sessions(2);
        let mut dictation = dictation(recognizer);

        dictation.start().unwrap();
        senders[0]
            .unbounded_send(RecognitionEvent::Error("no-speech".to_string()))
            .unwrap();
        settle().await;
        assert!(!dictation.is_listening());

        dictation.start().unwrap();
        senders[1].unbounded_send(RecognitionEvent::End).unwrap();
        settle().await;
        assert!(!dictation.is_listening());
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_session_at_a_time() {
        let (recognizer, _senders) = FakeRecognizer::with_sessions(2);
        let mut dictation = dictation(recognizer.clone());

        dictation.start().unwrap();
        dictation.start().unwrap();
        assert_eq!(recognizer.starts.load(Ordering::SeqCst), 1);

        assert!(!dictation.toggle().await.unwrap());
        assert!(!dictation.is_listening());
        assert!(dictation.toggle().await.unwrap());
        assert_eq!(recognizer.starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_the_session() {
        let (recognizer, senders) = FakeRecognizer::with_sessions(1);
        let mut dictation = dictation(recognizer);
        dictation.start().unwrap();
        settle().await;

        drop(dictation);
        settle().await;
        assert!(senders[0].is_closed());
    }

    #[tokio::test]
    async fn recognizer_failure_is_reported() {
        let (recognizer, _) = FakeRecognizer::with_sessions(0);
        let mut dictation = dictation(recognizer);
        assert!(matches!(
            dictation.start(),
            Err(ClientError::Port(PortError::Unavailable(_)))
        ));
        assert!(!dictation.is_listening());
    }
}
