//! services/client/src/bin/nexus.rs
//!
//! A line-oriented terminal front end for a chat session. Plain lines are
//! sent as chat messages; lines starting with `/` are commands.

use client_lib::{
    adapters::{
        load_document, BackendChatAdapter, BackendClient, BackendDocumentAdapter,
        BackendSstAdapter, BackendTtsAdapter, CommandAudioInput, CommandAudioOutput,
        CommandSpeechRecognizer, NullAudioOutput,
    },
    capture::{Dictation, RecorderState, VoiceRecorder},
    config::Config,
    error::ClientError,
    session::{playback_process, ChatSession, SendOutcome, Services, SessionEvent},
};
use nexus_core::{
    catalog::{Preset, MODEL_NAMES},
    domain::{ConversationMessage, GenerationSettings, Sender, Source, VoicePreferences},
    ports::AudioOutput,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
Commands:
  /model <id>          switch model       /models         list models
  /preset <name>       apply a preset     /system <text>  edit the system message
  /apply               confirm the system message
  /reset               restore the default system message
  /temperature <n>     /top-p <n>         /docmode on|off
  /upload <paths...>   upload documents   /delete-docs    delete uploaded documents
  /record              start or stop voice recording
  /dictate             start dictation, or stop it and send what was heard
  /speak <text>        read text aloud    /tts on|off     /autoplay on|off
  /clear               clear the conversation
  /quit";

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Backend at {}", config.backend_url);

    // --- 2. Initialize Service Adapters ---
    let backend = BackendClient::new(config.backend_url.clone());
    let audio_output: Arc<dyn AudioOutput> = match &config.player_command {
        Some(command) => Arc::new(CommandAudioOutput::new(command.clone())?),
        None => Arc::new(NullAudioOutput),
    };
    let services = Services {
        chat: Arc::new(BackendChatAdapter::new(backend.clone())),
        sst: Arc::new(BackendSstAdapter::new(backend.clone())),
        tts: Arc::new(BackendTtsAdapter::new(backend.clone())),
        documents: Arc::new(BackendDocumentAdapter::new(backend)),
        audio_output,
    };

    // --- 3. Build the Session & Background Tasks ---
    let settings = GenerationSettings {
        model: config.default_model.clone(),
        ..GenerationSettings::default()
    };
    let preferences = VoicePreferences {
        tts_enabled: config.tts_enabled,
        auto_play: config.auto_play_tts,
        voice: config.tts_voice.clone(),
    };
    let session = Arc::new(ChatSession::new(services, settings, preferences));

    let cancellation_token = CancellationToken::new();
    tokio::spawn(playback_process(
        session.clone(),
        session.subscribe(),
        cancellation_token.clone(),
    ));
    tokio::spawn(print_events(session.clone(), cancellation_token.clone()));

    let microphone = Arc::new(CommandAudioInput::new(config.recorder_command.clone())?);
    let mut recorder = VoiceRecorder::new(microphone, config.record_sample_rate);
    let mut dictation = match &config.recognizer_command {
        Some(command) => Some(Dictation::new(
            Arc::new(CommandSpeechRecognizer::new(command.clone())?),
            Arc::new(Mutex::new(String::new())),
        )),
        None => None,
    };

    for message in session.messages().await {
        print_message(&message);
    }
    println!("Type /help for commands.");

    // --- 4. Read Commands ---
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "" => {}
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/models" => {
                let current = session.settings().await.model;
                for (label, id) in MODEL_NAMES {
                    let marker = if *id == current { "*" } else { " " };
                    println!("{} {:<22} {}", marker, id, label);
                }
            }
            "/model" => session.set_model(rest).await,
            "/preset" => {
                if !session.apply_preset(rest).await {
                    let names: Vec<&str> = Preset::ALL.iter().map(|p| p.name()).collect();
                    println!("Unknown preset. Available: {}", names.join(", "));
                }
            }
            "/system" => session.set_system_message(rest).await,
            "/apply" => {
                if !session.apply_system().await {
                    println!("The system message is empty.");
                }
            }
            "/reset" => session.reset_system().await,
            "/temperature" => match rest.parse::<f32>() {
                Ok(value) => session.set_temperature(value).await,
                Err(_) => println!("Expected a number, got '{}'", rest),
            },
            "/top-p" => match rest.parse::<f32>() {
                Ok(value) => session.set_top_p(value).await,
                Err(_) => println!("Expected a number, got '{}'", rest),
            },
            "/docmode" => match parse_switch(rest) {
                Some(enabled) => session.set_document_mode(enabled).await,
                None => println!("Usage: /docmode on|off"),
            },
            "/tts" => match parse_switch(rest) {
                Some(enabled) => session.set_tts_enabled(enabled).await,
                None => println!("Usage: /tts on|off"),
            },
            "/autoplay" => match parse_switch(rest) {
                Some(enabled) => session.set_auto_play(enabled).await,
                None => println!("Usage: /autoplay on|off"),
            },
            "/upload" => upload(&session, rest).await,
            "/delete-docs" => {
                if session.session_id().await.is_none() {
                    println!("No documents uploaded.");
                    continue;
                }
                println!("Delete all uploaded documents? This also clears the conversation. [y/N]");
                let answer = lines.next_line().await?.unwrap_or_default();
                if answer.trim().eq_ignore_ascii_case("y") {
                    if !session.delete_documents().await {
                        println!("Failed to delete documents. Please try again.");
                    }
                }
            }
            "/clear" => session.clear_conversation().await,
            "/record" => match recorder.toggle(&session).await {
                Ok(RecorderState::Recording) => println!("Recording... type /record again to stop."),
                Ok(RecorderState::Idle) => {}
                Err(e) => {
                    warn!("Error starting recording: {}", e);
                    println!("Could not access microphone. Please check permissions.");
                }
            },
            "/dictate" => match dictation.as_mut() {
                Some(dictation) => dictate(&session, dictation).await,
                None => println!("Dictation is not configured. Set RECOGNIZER_COMMAND."),
            },
            "/speak" => {
                if let Err(e) = session.speak(rest).await {
                    warn!("TTS error: {}", e);
                }
            }
            _ if command.starts_with('/') => println!("Unknown command. Type /help."),
            _ => {
                if session.send_message(line).await == SendOutcome::Busy {
                    println!("Still waiting for the previous reply.");
                }
            }
        }
    }

    info!("Shutting down.");
    cancellation_token.cancel();
    Ok(())
}

async fn upload(session: &ChatSession, paths: &str) {
    let mut documents = Vec::new();
    for path in paths.split_whitespace() {
        match load_document(Path::new(path)).await {
            Ok(document) => documents.push(document),
            Err(e) => println!("Could not read {}: {}", path, e),
        }
    }
    if documents.is_empty() {
        println!("Usage: /upload <paths...>");
        return;
    }
    if let Err(e) = session.upload_documents(documents).await {
        println!("Upload not started: {}", e);
    }
}

/// Starts dictation, or sends what was heard once it stops. A session that
/// ended on its own is sent instead of starting a new one.
async fn dictate(session: &ChatSession, dictation: &mut Dictation) {
    let heard_already = !dictation.is_listening() && !dictation.input().lock().await.is_empty();
    if !heard_already {
        dictation.input().lock().await.clear();
        match dictation.toggle().await {
            Ok(true) => {
                println!("Listening... type /dictate again to send.");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Error starting dictation: {}", e);
                println!("Could not start speech recognition.");
                return;
            }
        }
    }

    let text = std::mem::take(&mut *dictation.input().lock().await);
    if text.trim().is_empty() {
        println!("Nothing was heard.");
    } else if session.send_message(&text).await == SendOutcome::Busy {
        println!("Still waiting for the previous reply.");
    }
}

async fn print_events(session: Arc<ChatSession>, cancellation_token: CancellationToken) {
    let mut events = session.subscribe();
    loop {
        let event = tokio::select! {
            _ = cancellation_token.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(SessionEvent::MessageCommitted { message, .. }) => print_message(&message),
            Ok(SessionEvent::ConversationCleared) => {
                for message in session.messages().await {
                    print_message(&message);
                }
            }
            Ok(SessionEvent::StatusChanged(status)) if status.visible => {
                println!("[{}]", status.text);
            }
            Ok(SessionEvent::DocumentSessionChanged { session_id }) => match session_id {
                Some(id) => println!("[documents: session {}]", id),
                None => println!("[documents: none]"),
            },
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Display skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

fn print_message(message: &ConversationMessage) {
    let who = match message.sender {
        Sender::User => "You",
        Sender::Assistant => "Assistant",
    };
    println!("{} [{}]: {}", who, message.timestamp.format("%H:%M"), message.content);
    if message.document_mode && message.context_used {
        println!("  (answered from your documents)");
    }
    for source in &message.sources {
        match source {
            Source::Document {
                filename,
                page_number,
                similarity,
                ..
            } => {
                let mut line = format!("  - {}", filename.as_deref().unwrap_or("document"));
                if let Some(page) = page_number {
                    line.push_str(&format!(", page {}", page));
                }
                if let Some(score) = similarity {
                    line.push_str(&format!(" ({:.0}% match)", score * 100.0));
                }
                println!("{}", line);
            }
            Source::Text(text) => println!("  - {}", text),
        }
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}
