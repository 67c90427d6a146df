//! services/client/src/capture/recorder.rs
//!
//! The push-to-talk voice recorder. Two states, `Idle` and `Recording`.
//! While recording, a background task buffers microphone chunks; stopping
//! releases the microphone, wraps the PCM in a WAV container and hands the
//! clip to the session for transcription.

use std::sync::Arc;

use hound::{WavSpec, WavWriter};
use nexus_core::domain::{AudioClip, Sender};
use nexus_core::ports::{AudioInput, AudioStream, PortResult};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::ClientError;
use crate::session::chat::{ChatSession, VOICE_FALLBACK};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

struct ActiveRecording {
    cancel: CancellationToken,
    task: JoinHandle<PortResult<Vec<u8>>>,
}

pub struct VoiceRecorder {
    input: Arc<dyn AudioInput>,
    sample_rate: u32,
    active: Option<ActiveRecording>,
}

impl VoiceRecorder {
    pub fn new(input: Arc<dyn AudioInput>, sample_rate: u32) -> Self {
        Self {
            input,
            sample_rate,
            active: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        if self.active.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    /// Opens the microphone and starts buffering. A second start while
    /// recording does nothing.
    pub async fn start(&mut self) -> Result<RecorderState, ClientError> {
        if self.active.is_some() {
            debug!("Recorder already running");
            return Ok(RecorderState::Recording);
        }

        let stream = self.input.open().await.map_err(|e| {
            error!("Error starting recording: {}", e);
            ClientError::Port(e)
        })?;
        let cancel = CancellationToken::new();
        let task = tokio::spawn(capture(stream, cancel.clone()));
        self.active = Some(ActiveRecording { cancel, task });
        info!("Recording started");
        Ok(RecorderState::Recording)
    }

    /// Stops recording and returns the captured clip, or `None` when idle.
    pub async fn stop(&mut self) -> Result<Option<AudioClip>, ClientError> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        active.cancel.cancel();
        let pcm = active
            .task
            .await
            .map_err(|e| ClientError::Internal(format!("Recording task failed: {}", e)))??;
        info!("Recording stopped ({} bytes of audio)", pcm.len());

        let wav = pcm16_to_wav(&pcm, self.sample_rate)
            .map_err(|e| ClientError::Internal(format!("Failed to encode WAV: {}", e)))?;
        Ok(Some(AudioClip::wav(wav)))
    }

    /// The record button: starts when idle; otherwise stops and sends the
    /// clip for transcription. A failed transcription becomes an assistant
    /// turn instead of an error.
    pub async fn toggle(&mut self, session: &ChatSession) -> Result<RecorderState, ClientError> {
        if self.active.is_none() {
            return self.start().await;
        }

        let outcome = match self.stop().await {
            Ok(Some(clip)) => session.transcribe_audio(&clip).await.map(|_| ()),
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = outcome {
            error!("Voice transcription error: {}", e);
            session
                .append_message(VOICE_FALLBACK, Sender::Assistant, Vec::new(), false, false)
                .await;
        }
        Ok(RecorderState::Idle)
    }
}

impl Drop for VoiceRecorder {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("Recorder dropped while recording; releasing microphone");
            active.cancel.cancel();
        }
    }
}

async fn capture(
    mut stream: Box<dyn AudioStream>,
    cancel: CancellationToken,
) -> PortResult<Vec<u8>> {
    let mut pcm = Vec::new();
    let result = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Ok(()),
            chunk = stream.next_chunk() => match chunk {
                Some(Ok(bytes)) => pcm.extend_from_slice(&bytes),
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            },
        }
    };
    stream.release().await;
    result.map(|_| pcm)
}

/// Wraps little-endian 16-bit mono PCM in a WAV container.
fn pcm16_to_wav(pcm_data: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = std::io::Cursor::new(Vec::new());

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::new(&mut cursor, spec)?;
    for chunk in pcm_data.chunks_exact(2) {
        writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}
