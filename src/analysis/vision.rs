use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, instrument};

use crate::config::{AnalysisConfig, AnalysisProvider};
use crate::errors::AnalysisError;

const CONNECT_TIMEOUT_SECS: u64 = 15;

/// An image ready for transport.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub media_type: String,
    pub base64: String,
}

impl EncodedImage {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64)
    }
}

/// A multimodal model endpoint that answers an instruction about an image
/// with free-form text.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    fn name(&self) -> &'static str;
    async fn describe(
        &self,
        instruction: &str,
        image: &EncodedImage,
    ) -> Result<String, AnalysisError>;
}

pub fn backend_from_config(cfg: &AnalysisConfig) -> Result<Box<dyn VisionBackend>, AnalysisError> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| AnalysisError::Connection(e.to_string()))?;
    Ok(match cfg.provider {
        AnalysisProvider::Gemini => Box::new(GeminiVision::new(client, cfg)),
        AnalysisProvider::OpenAi => Box::new(OpenAiVision::new(client, cfg)),
    })
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Sends the request and returns the body of a 2xx response.
async fn send(req: reqwest::RequestBuilder) -> Result<String, AnalysisError> {
    let response = req
        .send()
        .await
        .map_err(|e| AnalysisError::Connection(e.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AnalysisError::Connection(e.to_string()))?;
    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.error)
            .and_then(|d| d.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        error!(%status, %message, "analysis endpoint error");
        return Err(AnalysisError::Upstream {
            status: status.as_u16(),
            message,
        });
    }
    Ok(body)
}

// --- Gemini generateContent ---

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<Value>,
}

pub struct GeminiVision {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiVision {
    pub fn new(client: Client, cfg: &AnalysisConfig) -> Self {
        Self {
            client,
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
        }
    }
}

#[async_trait]
impl VisionBackend for GeminiVision {
    fn name(&self) -> &'static str {
        "gemini"
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn describe(
        &self,
        instruction: &str,
        image: &EncodedImage,
    ) -> Result<String, AnalysisError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text { text: instruction },
                    GeminiPart::Inline {
                        inline_data: InlineData {
                            mime_type: &image.media_type,
                            data: &image.base64,
                        },
                    },
                ],
            }],
        };
        debug!("sending image to Gemini");
        let raw = send(self.client.post(&url).query(&[("key", &self.api_key)]).json(&body)).await?;
        let parsed: GeminiResponse =
            serde_json::from_str(&raw).map_err(|e| AnalysisError::Parse(e.to_string()))?;
        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| {
                c.parts
                    .into_iter()
                    .find_map(|p| p.get("text")?.as_str().map(str::to_string))
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or(AnalysisError::EmptyResponse)
    }
}

// --- OpenAI-compatible chat/completions ---

const SYSTEM_PROMPT: &str = "You are a precise food analysis assistant. When analyzing food images, \
provide accurate identification and nutritional estimates in JSON format.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: ChatContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent<'a> {
    Text(&'a str),
    Parts(Vec<ChatPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

pub struct OpenAiVision {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiVision {
    pub fn new(client: Client, cfg: &AnalysisConfig) -> Self {
        Self {
            client,
            api_key: cfg.api_key.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
        }
    }
}

#[async_trait]
impl VisionBackend for OpenAiVision {
    fn name(&self) -> &'static str {
        "openai"
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn describe(
        &self,
        instruction: &str,
        image: &EncodedImage,
    ) -> Result<String, AnalysisError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: ChatContent::Text(SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content: ChatContent::Parts(vec![
                        ChatPart::Text { text: instruction },
                        ChatPart::ImageUrl {
                            image_url: ImageUrl { url: image.data_url() },
                        },
                    ]),
                },
            ],
            max_tokens: 300,
            temperature: 0.1,
        };
        debug!("sending image to chat/completions");
        let mut req = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let raw = send(req).await?;
        let parsed: ChatResponse =
            serde_json::from_str(&raw).map_err(|e| AnalysisError::Parse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(AnalysisError::EmptyResponse)
    }
}
