//! Gemini API client for multimodal generation
//!
//! Carries document attachments as inline data parts and supports
//! schema-constrained JSON output for extraction runs.
//! Uses a long-lived reqwest::Client for connection pooling.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::GeminiConfig;
use crate::error::UnderwritingError;
use crate::models::UploadedArtifact;

/// Seam between the orchestrators and the generation service.
///
/// Production traffic goes through [`GeminiClient`]; tests substitute
/// [`MockGenerationService`] so orchestration logic runs without a network.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Fail fast when the service cannot be called at all. The orchestrators
    /// check this before constructing any request.
    fn preflight(&self) -> crate::Result<()>;

    /// Submit one generateContent call against the named model.
    async fn generate(
        &self,
        model: &str,
        request: GenerateRequest,
    ) -> crate::Result<GenerateResponse>;
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        )
    }
}

#[async_trait]
impl GenerationService for GeminiClient {
    fn preflight(&self) -> crate::Result<()> {
        if !self.config.has_credential() {
            return Err(UnderwritingError::MissingCredential);
        }
        Ok(())
    }

    async fn generate(
        &self,
        model: &str,
        request: GenerateRequest,
    ) -> crate::Result<GenerateResponse> {
        self.preflight()?;

        // The endpoint embeds the credential; log the model, never the URL
        let url = self.endpoint(model);
        info!(model, content_count = request.contents.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                UnderwritingError::TransportFailure(format!("Gemini API request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(%status, "Gemini API error response: {}", error_text);
            return Err(UnderwritingError::TransportFailure(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let generated: GenerateResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response envelope: {}", e);
            UnderwritingError::TransportFailure(format!("Gemini response was not valid JSON: {}", e))
        })?;

        if let Some(reason) = generated
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            if reason != "STOP" {
                warn!(finish_reason = reason, "Generation stopped early");
            }
        }

        if let Some(usage) = &generated.usage_metadata {
            info!(
                prompt_tokens = usage.prompt_token_count,
                response_tokens = usage.candidates_token_count,
                "Gemini response received"
            );
        }

        Ok(generated)
    }
}

//
// ================= Wire Types =================
//

/// One generateContent request body. Field names are sent in snake_case,
/// which the API accepts alongside camelCase.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
}

/// A role-tagged message. Requests always set the role; responses carry
/// "model" but the field is tolerated missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: "user".to_string(),
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: "model".to_string(),
            parts,
        }
    }
}

/// Either a text fragment or an inline document, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    /// Attach an encoded document as an inline data part.
    pub fn inline(artifact: &UploadedArtifact) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: artifact.media_type.clone(),
                data: artifact.payload.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThinkingConfig {
    pub thinking_budget: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

impl SystemInstruction {
    pub fn from_text(text: &str) -> Self {
        Self {
            parts: vec![Part::text(text)],
        }
    }
}

/// Response envelope. The API emits camelCase field names.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: i32,
    #[serde(default)]
    pub candidates_token_count: i32,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate. Long outputs can arrive
    /// split across several parts, so every text part contributes. None
    /// when the service produced no candidates, no text parts, or only
    /// whitespace.
    pub fn primary_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

//
// ================= Mock =================
//

/// Scripted generation service for exercising orchestrators without network
/// access. Queued outcomes replay in order; every request is recorded.
pub struct MockGenerationService {
    credentialed: bool,
    outcomes: Mutex<VecDeque<crate::Result<GenerateResponse>>>,
    requests: Mutex<Vec<(String, GenerateRequest)>>,
}

impl MockGenerationService {
    pub fn new() -> Self {
        Self {
            credentialed: true,
            outcomes: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A service whose pre-flight always fails with MissingCredential.
    pub fn without_credential() -> Self {
        let mut mock = Self::new();
        mock.credentialed = false;
        mock
    }

    /// Queue a single-candidate text response.
    pub fn push_text(&self, text: &str) {
        self.push_text_parts(&[text]);
    }

    /// Queue a single-candidate response whose text arrives split across
    /// several parts.
    pub fn push_text_parts(&self, parts: &[&str]) {
        self.outcomes.lock().unwrap().push_back(Ok(GenerateResponse {
            candidates: vec![Candidate {
                content: Some(Content::model(
                    parts.iter().map(|part| Part::text(part)).collect(),
                )),
                finish_reason: Some("STOP".to_string()),
            }],
            usage_metadata: None,
        }));
    }

    /// Queue a response with no candidates at all.
    pub fn push_empty(&self) {
        self.outcomes.lock().unwrap().push_back(Ok(GenerateResponse {
            candidates: Vec::new(),
            usage_metadata: None,
        }));
    }

    pub fn push_error(&self, error: UnderwritingError) {
        self.outcomes.lock().unwrap().push_back(Err(error));
    }

    /// Requests seen so far, as (model, request) pairs in call order.
    pub fn requests(&self) -> Vec<(String, GenerateRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockGenerationService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationService for MockGenerationService {
    fn preflight(&self) -> crate::Result<()> {
        if !self.credentialed {
            return Err(UnderwritingError::MissingCredential);
        }
        Ok(())
    }

    async fn generate(
        &self,
        model: &str,
        request: GenerateRequest,
    ) -> crate::Result<GenerateResponse> {
        self.preflight()?;
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), request));

        self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(GenerateResponse {
                candidates: Vec::new(),
                usage_metadata: None,
            })
        })
    }
}
