//! services/client/src/adapters/recognizer.rs
//!
//! A speech recognizer implementing the `SpeechRecognizer` port by running a
//! streaming transcriber that prints one recognized phrase per line on
//! stdout (a `whisper.cpp` stream, `vosk-transcriber`, ...).

use futures::stream;
use nexus_core::domain::RecognitionEvent;
use nexus_core::ports::{PortError, PortResult, RecognitionStream, SpeechRecognizer};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct CommandSpeechRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandSpeechRecognizer {
    pub fn new(command: Vec<String>) -> PortResult<Self> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .ok_or_else(|| PortError::Unavailable("empty recognizer command".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl SpeechRecognizer for CommandSpeechRecognizer {
    fn start(&self) -> PortResult<RecognitionStream> {
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
        let stdout = child.stdout.take().ok_or_else(|| {
            PortError::Unexpected("recognizer stdout was not captured".to_string())
        })?;
        debug!("Speech recognizer started via {}", self.program);

        let transcript = Transcript {
            _child: child,
            lines: BufReader::new(stdout).lines(),
            fragments: Vec::new(),
            finished: false,
        };
        Ok(Box::pin(stream::unfold(transcript, next_event)))
    }
}

/// Holds the recognizer process for as long as the stream lives.
struct Transcript {
    _child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    fragments: Vec<String>,
    finished: bool,
}

async fn next_event(mut transcript: Transcript) -> Option<(RecognitionEvent, Transcript)> {
    if transcript.finished {
        return None;
    }
    loop {
        match transcript.lines.next_line().await {
            Ok(Some(line)) => {
                let phrase = line.trim();
                if phrase.is_empty() {
                    continue;
                }
                let fragment = if transcript.fragments.is_empty() {
                    phrase.to_string()
                } else {
                    format!(" {}", phrase)
                };
                transcript.fragments.push(fragment);
                let event = RecognitionEvent::Result {
                    fragments: transcript.fragments.clone(),
                };
                return Some((event, transcript));
            }
            Ok(None) => {
                transcript.finished = true;
                return Some((RecognitionEvent::End, transcript));
            }
            Err(e) => {
                transcript.finished = true;
                let event = RecognitionEvent::Error(format!("Failed to read recognizer: {}", e));
                return Some((event, transcript));
            }
        }
    }
}
