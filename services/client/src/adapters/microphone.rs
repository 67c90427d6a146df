//! services/client/src/adapters/microphone.rs
//!
//! A microphone adapter implementing the `AudioInput` port by reading raw
//! PCM from a capture program's stdout (`arecord`, `sox -d`, `parec`, ...).

use async_trait::async_trait;
use nexus_core::ports::{AudioInput, AudioStream, PortError, PortResult};
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

const CHUNK_SIZE: usize = 4096;

#[derive(Clone, Debug)]
pub struct CommandAudioInput {
    program: String,
    args: Vec<String>,
}

impl CommandAudioInput {
    pub fn new(command: Vec<String>) -> PortResult<Self> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .ok_or_else(|| PortError::Unavailable("empty recorder command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl AudioInput for CommandAudioInput {
    async fn open(&self) -> PortResult<Box<dyn AudioStream>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                PortError::Unavailable(format!("Could not start {}: {}", self.program, e))
            })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PortError::Unexpected("recorder stdout was not captured".to_string()))?;
        debug!("Microphone opened via {}", self.program);
        Ok(Box::new(CommandAudioStream {
            child,
            stdout,
            released: false,
        }))
    }
}

struct CommandAudioStream {
    child: Child,
    stdout: ChildStdout,
    released: bool,
}

#[async_trait]
impl AudioStream for CommandAudioStream {
    async fn next_chunk(&mut self) -> Option<PortResult<Vec<u8>>> {
        if self.released {
            return None;
        }
        let mut buf = vec![0u8; CHUNK_SIZE];
        match self.stdout.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some(Ok(buf))
            }
            Err(e) => Some(Err(PortError::Unexpected(format!(
                "Failed to read microphone: {}",
                e
            )))),
        }
    }

    async fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.child.kill().await {
            warn!("Failed to stop the recorder process: {}", e);
        }
        debug!("Microphone released");
    }
}
