//! services/client/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the backend's chat completion endpoint.
//! It implements the `ChatCompletionService` port from the `core` crate.

use async_trait::async_trait;
use nexus_core::domain::{ChatReply, ChatRequest};
use nexus_core::ports::{ChatCompletionService, PortResult};
use serde::{Deserialize, Serialize};

use crate::adapters::backend::{sources_to_domain, BackendClient, SourceRecord};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatCompletionService` over `POST /api/chat`.
#[derive(Clone)]
pub struct BackendChatAdapter {
    client: BackendClient,
}

impl BackendChatAdapter {
    /// Creates a new `BackendChatAdapter`.
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Serialize)]
struct ChatRequestRecord<'a> {
    model: &'a str,
    temperature: f32,
    top_p: f32,
    system_prompt: &'a str,
    user_message: &'a str,
    document_mode: bool,
}

impl<'a> From<&'a ChatRequest> for ChatRequestRecord<'a> {
    fn from(request: &'a ChatRequest) -> Self {
        Self {
            model: &request.model,
            temperature: request.temperature,
            top_p: request.top_p,
            system_prompt: &request.system_prompt,
            user_message: &request.user_message,
            document_mode: request.document_mode,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponseRecord {
    response: String,
    #[serde(default)]
    sources: Option<Vec<SourceRecord>>,
    #[serde(default)]
    context_used: Option<bool>,
}

impl ChatResponseRecord {
    fn to_domain(self) -> ChatReply {
        ChatReply {
            response: self.response,
            sources: sources_to_domain(self.sources),
            context_used: self.context_used.unwrap_or(false),
        }
    }
}

//=========================================================================================
// `ChatCompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatCompletionService for BackendChatAdapter {
    async fn complete(&self, request: &ChatRequest) -> PortResult<ChatReply> {
        let record: ChatResponseRecord = self
            .client
            .post_json("/api/chat", &ChatRequestRecord::from(request))
            .await?;
        Ok(record.to_domain())
    }
}
