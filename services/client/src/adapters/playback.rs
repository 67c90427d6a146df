//! services/client/src/adapters/playback.rs
//!
//! Audio output adapters implementing the `AudioOutput` port.

use async_trait::async_trait;
use nexus_core::ports::{AudioOutput, PortError, PortResult};
use std::io::Write;
use tokio::process::Command;
use tracing::{debug, info};

/// Plays audio by handing a temporary MPEG file to an external player.
///
/// The temp file lives exactly as long as one `play` call, so it is removed
/// whether the player succeeds, fails or cannot be started.
#[derive(Clone, Debug)]
pub struct CommandAudioOutput {
    program: String,
    args: Vec<String>,
}

impl CommandAudioOutput {
    /// `command` is the program followed by its leading arguments; the audio
    /// file path is appended last.
    pub fn new(command: Vec<String>) -> PortResult<Self> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .ok_or_else(|| PortError::Unavailable("empty player command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl AudioOutput for CommandAudioOutput {
    async fn play(&self, audio: &[u8]) -> PortResult<()> {
        let mut file = tempfile::Builder::new()
            .prefix("nexus-tts-")
            .suffix(".mp3")
            .tempfile()
            .map_err(|e| PortError::Unexpected(format!("Failed to create audio file: {}", e)))?;
        file.write_all(audio)
            .and_then(|_| file.flush())
            .map_err(|e| PortError::Unexpected(format!("Failed to write audio file: {}", e)))?;

        debug!("Playing {} bytes via {}", audio.len(), self.program);
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| PortError::Unavailable(format!("Failed to run {}: {}", self.program, e)))?;

        if status.success() {
            Ok(())
        } else {
            Err(PortError::Unexpected(format!(
                "{} exited with {}",
                self.program, status
            )))
        }
    }
}

/// Discards audio. Used when no player is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAudioOutput;

#[async_trait]
impl AudioOutput for NullAudioOutput {
    async fn play(&self, audio: &[u8]) -> PortResult<()> {
        info!("No audio player configured; dropping {} bytes of audio", audio.len());
        Ok(())
    }
}
