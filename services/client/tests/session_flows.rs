// services/client/tests/session_flows.rs
//
// End-to-end session flows against an in-process fake backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::Multipart, http::StatusCode, routing::post, Json, Router};
use client_lib::{
    adapters::{
        BackendChatAdapter, BackendClient, BackendDocumentAdapter, BackendSstAdapter,
        BackendTtsAdapter,
    },
    capture::{RecorderState, VoiceRecorder},
    error::ClientError,
    session::{
        chat::{CHAT_FALLBACK, SINGLE_UPLOAD_HINT, VOICE_FALLBACK},
        playback_process, ChatSession, SendOutcome, Services, SessionEvent,
    },
};
use nexus_core::{
    catalog::{Preset, GREETING},
    domain::{
        AudioClip, DocumentUpload, GenerationSettings, Sender, Source, VoicePreferences,
    },
    ports::{AudioInput, AudioOutput, AudioStream, PortError, PortResult},
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

//=========================================================================================
// Harness
//=========================================================================================

async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Collects everything the session asks to play.
#[derive(Default)]
struct RecordingOutput {
    played: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn play(&self, audio: &[u8]) -> PortResult<()> {
        self.played.lock().unwrap().push(audio.to_vec());
        Ok(())
    }
}

fn session_for(base_url: &str) -> (Arc<ChatSession>, Arc<RecordingOutput>) {
    let backend = BackendClient::new(base_url);
    let output = Arc::new(RecordingOutput::default());
    let services = Services {
        chat: Arc::new(BackendChatAdapter::new(backend.clone())),
        sst: Arc::new(BackendSstAdapter::new(backend.clone())),
        tts: Arc::new(BackendTtsAdapter::new(backend.clone())),
        documents: Arc::new(BackendDocumentAdapter::new(backend)),
        audio_output: output.clone(),
    };
    let session = ChatSession::new(
        services,
        GenerationSettings::default(),
        VoicePreferences::default(),
    );
    (Arc::new(session), output)
}

async fn drain_multipart(mut multipart: Multipart) -> Vec<String> {
    let mut file_names = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        if let Some(name) = field.file_name() {
            file_names.push(name.to_string());
        }
        field.bytes().await.unwrap();
    }
    file_names
}

fn document(name: &str) -> DocumentUpload {
    DocumentUpload {
        filename: name.to_string(),
        mime_type: Some("application/pdf".to_string()),
        bytes: b"%PDF-1.4".to_vec(),
    }
}

async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

//=========================================================================================
// Chat
//=========================================================================================

#[tokio::test]
async fn chat_failure_appends_exactly_one_fallback() {
    let router = Router::new().route(
        "/api/chat",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model offline") }),
    );
    let (session, _) = session_for(&spawn_backend(router).await);

    assert_eq!(session.send_message("  hello  ").await, SendOutcome::Failed);

    let messages = session.messages().await;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, GREETING);
    assert_eq!(messages[1].sender, Sender::User);
    assert_eq!(messages[1].content, "hello");
    assert_eq!(messages[2].sender, Sender::Assistant);
    assert_eq!(messages[2].content, CHAT_FALLBACK);
    assert_eq!(session.history().await.len(), 2);
    assert!(!session.is_loading());
}

#[tokio::test]
async fn chat_reply_carries_sources_and_settings() {
    let received = Arc::new(Mutex::new(Vec::<Value>::new()));
    let router = Router::new().route(
        "/api/chat",
        post({
            let received = received.clone();
            move |Json(body): Json<Value>| async move {
                received.lock().unwrap().push(body);
                Json(json!({
                    "response": "Paris.",
                    "sources": [
                        {"filename": "geo.pdf", "page_number": 3, "similarity": 0.91, "content_type": "pdf"},
                        "web"
                    ],
                    "context_used": true
                }))
            }
        }),
    );
    let (session, _) = session_for(&spawn_backend(router).await);
    session.set_document_mode(true).await;
    session.set_temperature(0.2).await;

    assert_eq!(
        session.send_message("What is the capital?").await,
        SendOutcome::Answered
    );

    let body = received.lock().unwrap().pop().unwrap();
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["user_message"], "What is the capital?");
    assert_eq!(body["system_prompt"], Preset::Helpful.prompt());
    assert_eq!(body["document_mode"], true);
    assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);

    let reply = session.messages().await.pop().unwrap();
    assert_eq!(reply.content, "Paris.");
    assert!(reply.context_used);
    assert!(reply.document_mode);
    assert_eq!(reply.sources.len(), 2);
    assert_eq!(
        reply.sources[0],
        Source::Document {
            filename: Some("geo.pdf".to_string()),
            page_number: Some(3),
            similarity: Some(0.91),
            content_type: Some("pdf".to_string()),
        }
    );
    assert_eq!(reply.sources[1], Source::Text("web".to_string()));
}

#[tokio::test]
async fn malformed_chat_body_becomes_the_fallback() {
    let router = Router::new().route(
        "/api/chat",
        post(|| async { Json(json!({"reply": "wrong field"})) }),
    );
    let (session, _) = session_for(&spawn_backend(router).await);

    assert_eq!(session.send_message("hi").await, SendOutcome::Failed);
    assert_eq!(session.messages().await.pop().unwrap().content, CHAT_FALLBACK);
}

#[tokio::test]
async fn blank_input_is_ignored() {
    let (session, _) = session_for(&spawn_backend(Router::new()).await);
    assert_eq!(session.send_message("   ").await, SendOutcome::Ignored);
    assert_eq!(session.messages().await.len(), 1);
}

#[tokio::test]
async fn second_send_while_waiting_is_refused() {
    let router = Router::new().route(
        "/api/chat",
        post(|| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Json(json!({"response": "done"}))
        }),
    );
    let (session, _) = session_for(&spawn_backend(router).await);

    let first = tokio::spawn({
        let session = session.clone();
        async move { session.send_message("first").await }
    });
    assert!(eventually(|| session.is_loading()).await);

    assert_eq!(session.send_message("second").await, SendOutcome::Busy);
    assert_eq!(first.await.unwrap(), SendOutcome::Answered);

    let contents: Vec<String> = session
        .messages()
        .await
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec![GREETING, "first", "done"]);
}

//=========================================================================================
// Voice
//=========================================================================================

#[tokio::test]
async fn transcription_appends_both_turns_and_plays_reply() {
    let router = Router::new().route(
        "/transcribe",
        post(|multipart: Multipart| async move {
            drain_multipart(multipart).await;
            Json(json!({"transcript": "hi", "response": "hello", "audio": "YWJj"}))
        }),
    );
    let (session, output) = session_for(&spawn_backend(router).await);
    let token = CancellationToken::new();
    tokio::spawn(playback_process(
        session.clone(),
        session.subscribe(),
        token.clone(),
    ));

    let reply = session
        .transcribe_audio(&AudioClip::wav(vec![0; 44]))
        .await
        .unwrap();
    assert_eq!(reply.transcript.as_deref(), Some("hi"));

    let messages = session.messages().await;
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].sender, Sender::User);
    assert_eq!(messages[1].content, "hi");
    assert_eq!(messages[2].sender, Sender::Assistant);
    assert_eq!(messages[2].content, "hello");

    assert!(eventually(|| !output.played.lock().unwrap().is_empty()).await);
    assert_eq!(output.played.lock().unwrap()[0], b"abc".to_vec());
    token.cancel();
}

#[tokio::test]
async fn undecodable_voice_audio_still_appends_both_turns() {
    let router = Router::new().route(
        "/transcribe",
        post(|multipart: Multipart| async move {
            drain_multipart(multipart).await;
            Json(json!({"transcript": "hi", "response": "hello", "audio": "%%%"}))
        }),
    );
    let (session, _) = session_for(&spawn_backend(router).await);

    let reply = session
        .transcribe_audio(&AudioClip::wav(vec![0; 44]))
        .await
        .unwrap();
    assert!(reply.audio.is_none());

    let contents: Vec<String> = session
        .messages()
        .await
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents, vec![GREETING, "hi", "hello"]);
}

#[tokio::test]
async fn transcription_without_transcript_appends_nothing() {
    let router = Router::new().route(
        "/transcribe",
        post(|multipart: Multipart| async move {
            drain_multipart(multipart).await;
            Json(json!({"transcript": "", "response": "ignored"}))
        }),
    );
    let (session, _) = session_for(&spawn_backend(router).await);

    session
        .transcribe_audio(&AudioClip::wav(vec![0; 44]))
        .await
        .unwrap();
    assert_eq!(session.messages().await.len(), 1);
}

#[tokio::test]
async fn transcription_failure_is_returned() {
    let router = Router::new().route(
        "/transcribe",
        post(|| async { (StatusCode::BAD_GATEWAY, "whisper down") }),
    );
    let (session, _) = session_for(&spawn_backend(router).await);

    let result = session.transcribe_audio(&AudioClip::wav(vec![0; 44])).await;
    assert!(matches!(
        result,
        Err(ClientError::Port(PortError::Status { status: 502, .. }))
    ));
    assert_eq!(session.messages().await.len(), 1);
}

/// A microphone that produces one chunk of silence, then waits.
struct SilentInput;

struct SilentStream {
    sent: bool,
}

#[async_trait]
impl AudioInput for SilentInput {
    async fn open(&self) -> PortResult<Box<dyn AudioStream>> {
        Ok(Box::new(SilentStream { sent: false }))
    }
}

#[async_trait]
impl AudioStream for SilentStream {
    async fn next_chunk(&mut self) -> Option<PortResult<Vec<u8>>> {
        if self.sent {
            std::future::pending().await
        } else {
            self.sent = true;
            Some(Ok(vec![0; 320]))
        }
    }

    async fn release(&mut self) {}
}

#[tokio::test]
async fn failed_voice_message_becomes_the_voice_fallback() {
    let router = Router::new().route(
        "/transcribe",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let (session, _) = session_for(&spawn_backend(router).await);
    let mut recorder = VoiceRecorder::new(Arc::new(SilentInput), 16_000);

    assert_eq!(
        recorder.toggle(&session).await.unwrap(),
        RecorderState::Recording
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(recorder.toggle(&session).await.unwrap(), RecorderState::Idle);

    let last = session.messages().await.pop().unwrap();
    assert_eq!(last.sender, Sender::Assistant);
    assert_eq!(last.content, VOICE_FALLBACK);
}

//=========================================================================================
// Text-to-Speech
//=========================================================================================

#[tokio::test]
async fn speak_plays_the_generated_audio() {
    let router = Router::new().route(
        "/text-to-speech",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["text"], "read me");
            Json(json!({"audio": "YWJj"}))
        }),
    );
    let (session, output) = session_for(&spawn_backend(router).await);

    session.speak("read me").await.unwrap();
    assert_eq!(*output.played.lock().unwrap(), vec![b"abc".to_vec()]);
}

#[tokio::test]
async fn malformed_speech_body_is_an_error() {
    let router = Router::new().route(
        "/text-to-speech",
        post(|| async { Json(json!({"sound": "YWJj"})) }),
    );
    let (session, output) = session_for(&spawn_backend(router).await);

    assert!(matches!(
        session.speak("hello").await,
        Err(ClientError::Port(PortError::MalformedResponse(_)))
    ));
    assert!(output.played.lock().unwrap().is_empty());
}

#[tokio::test]
async fn auto_play_speaks_assistant_replies() {
    let router = Router::new()
        .route("/api/chat", post(|| async { Json(json!({"response": "spoken"})) }))
        .route("/text-to-speech", post(|| async { Json(json!({"audio": "YWJj"})) }));
    let (session, output) = session_for(&spawn_backend(router).await);
    session.set_auto_play(true).await;
    let token = CancellationToken::new();
    tokio::spawn(playback_process(
        session.clone(),
        session.subscribe(),
        token.clone(),
    ));

    session.send_message("say something").await;

    assert!(eventually(|| output.played.lock().unwrap().len() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(output.played.lock().unwrap().len(), 1);
    token.cancel();
}

//=========================================================================================
// Documents
//=========================================================================================

fn upload_router(fail_on: &'static str) -> Router {
    let calls = Arc::new(AtomicUsize::new(0));
    Router::new().route(
        "/api/upload-document",
        post(move |multipart: Multipart| {
            let calls = calls.clone();
            async move {
                let names = drain_multipart(multipart).await;
                let name = names.first().cloned().unwrap_or_default();
                if name == fail_on {
                    return Err((StatusCode::UNPROCESSABLE_ENTITY, "unsupported file"));
                }
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let session_id = if n == 0 { "A" } else { "B" };
                Ok(Json(json!({
                    "filename": name,
                    "session_id": session_id,
                    "embedding_result": {"chunks_created": 4 + n}
                })))
            }
        }),
    )
}

#[tokio::test]
async fn batch_upload_keeps_the_last_session_id() {
    let (session, _) = session_for(&spawn_backend(upload_router("")).await);
    let mut events = session.subscribe();

    let summary = session
        .upload_documents(vec![document("a.pdf"), document("b.pdf")])
        .await
        .unwrap();

    assert_eq!(summary.uploaded.len(), 2);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.total_chunks, 9);
    assert_eq!(session.session_id().await.as_deref(), Some("B"));

    let messages = session.messages().await;
    assert_eq!(messages.len(), 4);
    assert_eq!(
        messages[1].content,
        "✅ Uploaded: a.pdf\n📄 Created 4 chunks for AI knowledge"
    );
    assert_eq!(
        messages[2].content,
        "✅ Uploaded: b.pdf\n📄 Created 5 chunks for AI knowledge"
    );
    assert!(messages[3]
        .content
        .starts_with("🎉 Successfully uploaded 2 documents with 9 total chunks!"));

    let mut session_changes = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::DocumentSessionChanged { session_id } = event {
            session_changes.push(session_id);
        }
    }
    assert_eq!(
        session_changes,
        vec![Some("A".to_string()), Some("B".to_string())]
    );
}

#[tokio::test]
async fn one_failed_file_does_not_stop_the_batch() {
    let (session, _) = session_for(&spawn_backend(upload_router("bad.pdf")).await);

    let summary = session
        .upload_documents(vec![document("bad.pdf"), document("good.pdf")])
        .await
        .unwrap();

    assert_eq!(summary.uploaded.len(), 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "bad.pdf");

    let contents: Vec<String> = session
        .messages()
        .await
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(contents.len(), 4);
    assert!(contents[1].starts_with("❌ Upload failed for bad.pdf:"));
    assert!(contents[2].starts_with("✅ Uploaded: good.pdf"));
    assert_eq!(contents[3], SINGLE_UPLOAD_HINT);
    assert_eq!(session.session_id().await.as_deref(), Some("A"));
}

#[tokio::test]
async fn all_failed_uploads_add_no_summary() {
    let (session, _) = session_for(&spawn_backend(upload_router("bad.pdf")).await);

    let summary = session
        .upload_documents(vec![document("bad.pdf")])
        .await
        .unwrap();

    assert!(summary.uploaded.is_empty());
    assert_eq!(session.messages().await.len(), 2);
    assert!(session.session_id().await.is_none());
}

fn cleanup_router(succeed: Arc<AtomicBool>, seen: Arc<Mutex<Vec<Value>>>) -> Router {
    upload_router("").route(
        "/api/cleanup-session",
        post(move |Json(body): Json<Value>| {
            let succeed = succeed.clone();
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(body);
                if succeed.load(Ordering::SeqCst) {
                    StatusCode::OK
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }),
    )
}

#[tokio::test]
async fn failed_cleanup_keeps_the_session_for_retry() {
    let succeed = Arc::new(AtomicBool::new(false));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let base = spawn_backend(cleanup_router(succeed.clone(), seen.clone())).await;
    let (session, _) = session_for(&base);

    session.upload_documents(vec![document("a.pdf")]).await.unwrap();
    assert_eq!(session.session_id().await.as_deref(), Some("A"));

    assert!(!session.cleanup_session("A").await);
    assert_eq!(session.session_id().await.as_deref(), Some("A"));
    assert_eq!(seen.lock().unwrap()[0], json!({"session_id": "A"}));

    succeed.store(true, Ordering::SeqCst);
    assert!(session.cleanup_session("A").await);
    assert!(session.session_id().await.is_none());
}

#[tokio::test]
async fn delete_documents_resets_conversation_and_document_mode() {
    let succeed = Arc::new(AtomicBool::new(true));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let base = spawn_backend(cleanup_router(succeed, seen)).await;
    let (session, _) = session_for(&base);

    session.upload_documents(vec![document("a.pdf")]).await.unwrap();
    session.set_document_mode(true).await;

    assert!(session.delete_documents().await);
    assert!(session.session_id().await.is_none());
    assert!(!session.document_mode().await);
    let messages = session.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, GREETING);
}

#[tokio::test]
async fn failed_delete_leaves_everything_in_place() {
    let succeed = Arc::new(AtomicBool::new(false));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let base = spawn_backend(cleanup_router(succeed.clone(), seen)).await;
    let (session, _) = session_for(&base);

    session.upload_documents(vec![document("a.pdf")]).await.unwrap();
    session.set_document_mode(true).await;
    let before = session.messages().await;
    assert_eq!(before.len(), 3);

    assert!(!session.delete_documents().await);
    assert_eq!(session.session_id().await.as_deref(), Some("A"));
    assert!(session.document_mode().await);
    assert_eq!(session.messages().await, before);

    succeed.store(true, Ordering::SeqCst);
    assert!(session.delete_documents().await);
    assert!(session.session_id().await.is_none());
    assert_eq!(session.messages().await.len(), 1);
}

#[tokio::test]
async fn delete_without_documents_does_nothing() {
    let (session, _) = session_for(&spawn_backend(Router::new()).await);
    session.append_message("note", Sender::User, Vec::new(), false, false).await;

    assert!(!session.delete_documents().await);
    assert_eq!(session.messages().await.len(), 2);
}

//=========================================================================================
// Store
//=========================================================================================

#[tokio::test]
async fn clearing_the_conversation_keeps_documents() {
    let (session, _) = session_for(&spawn_backend(upload_router("")).await);
    session.upload_documents(vec![document("a.pdf")]).await.unwrap();

    session.clear_conversation().await;

    assert_eq!(session.messages().await.len(), 1);
    assert!(session.history().await.is_empty());
    assert_eq!(session.session_id().await.as_deref(), Some("A"));
}

#[tokio::test]
async fn reset_restores_the_helpful_prompt() {
    let (session, _) = session_for(&spawn_backend(Router::new()).await);
    session.apply_preset("helpful").await;
    let helpful = session.settings().await.system_message;

    session.set_system_message("Talk like a pirate.").await;
    assert!(session.apply_system().await);
    session.reset_system().await;

    assert_eq!(session.settings().await.system_message, helpful);
}

#[tokio::test]
async fn every_append_shows_up_in_the_transcript() {
    let (session, _) = session_for(&spawn_backend(Router::new()).await);
    for i in 0..5 {
        let sender = if i % 2 == 0 { Sender::User } else { Sender::Assistant };
        session.append_message(format!("turn {}", i), sender, Vec::new(), false, false).await;
    }
    assert_eq!(session.messages().await.len(), 6);
    assert_eq!(session.history().await.len(), 5);
}
