//! services/client/src/adapters/backend.rs
//!
//! The shared HTTP plumbing for every backend adapter: one `reqwest` client,
//! the configured base URL, status checking and schema-validated decoding.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use nexus_core::domain::Source;
use nexus_core::ports::{PortError, PortResult};
use reqwest::{multipart::Form, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

//=========================================================================================
// The Shared Client
//=========================================================================================

/// A cheap-to-clone handle on the chat backend.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

impl BackendClient {
    /// Creates a new `BackendClient` with a default `reqwest` client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(Client::new(), base_url)
    }

    pub fn with_http(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POSTs a JSON body and decodes a JSON reply into `R`.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> PortResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("POST {} (json)", path);
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(check_status(response).await?).await
    }

    /// POSTs a multipart form and decodes a JSON reply into `R`.
    pub async fn post_multipart<R>(&self, path: &str, form: Form) -> PortResult<R>
    where
        R: DeserializeOwned,
    {
        debug!("POST {} (multipart)", path);
        let response = self
            .http
            .post(self.url(path))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        decode(check_status(response).await?).await
    }

    /// POSTs a JSON body where only the status code matters.
    pub async fn post_json_status<B>(&self, path: &str, body: &B) -> PortResult<()>
    where
        B: Serialize + ?Sized,
    {
        debug!("POST {} (json, status only)", path);
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await.map(|_| ())
    }
}

fn transport(e: reqwest::Error) -> PortError {
    PortError::Transport(e.to_string())
}

async fn check_status(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(PortError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<R: DeserializeOwned>(response: Response) -> PortResult<R> {
    let text = response.text().await.map_err(transport)?;
    serde_json::from_str(&text).map_err(|e| PortError::MalformedResponse(e.to_string()))
}

//=========================================================================================
// Shared Response Records
//=========================================================================================

/// A citation as the backend sends it.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub(crate) enum SourceRecord {
    Document {
        filename: Option<String>,
        page_number: Option<u32>,
        similarity: Option<f64>,
        content_type: Option<String>,
    },
    Text(String),
    Other(serde_json::Value),
}

impl SourceRecord {
    pub(crate) fn to_domain(self) -> Source {
        match self {
            SourceRecord::Document {
                filename,
                page_number,
                similarity,
                content_type,
            } => Source::Document {
                filename,
                page_number,
                similarity,
                content_type,
            },
            SourceRecord::Text(text) => Source::Text(text),
            SourceRecord::Other(value) => Source::Text(value.to_string()),
        }
    }
}

pub(crate) fn sources_to_domain(records: Option<Vec<SourceRecord>>) -> Vec<Source> {
    records
        .unwrap_or_default()
        .into_iter()
        .map(SourceRecord::to_domain)
        .collect()
}

/// Decodes a base64 audio payload.
pub(crate) fn decode_audio(encoded: &str) -> PortResult<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| PortError::MalformedResponse(format!("audio is not valid base64: {}", e)))
}
