//! OpenRouter chat completions 백엔드
//!
//! source: https://openrouter.ai/docs/api-reference/chat-completion

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{BackendError, Completion, CompletionRequest, GenerationConfig, LanguageModel};

const API_KEY_VAR: &str = "OPENROUTER_API_KEY";

/// OpenRouter 언어 모델
#[derive(Debug)]
pub struct OpenRouterModel {
    client: reqwest::Client,
    endpoint: Url,
    headers: HeaderMap,
}

impl OpenRouterModel {
    pub fn new(api_key: &str, config: &GenerationConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid OpenRouter API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let base = Url::parse(&config.base_url)
            .with_context(|| format!("invalid base URL {}", config.base_url))?;
        let endpoint = base
            .join("chat/completions")
            .context("failed to build chat completions URL")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build OpenRouter HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            headers,
        })
    }

    /// `OPENROUTER_API_KEY` 환경변수로 생성
    pub fn from_env(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_VAR)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .with_context(|| {
                format!(
                    "{} not set.\n\
                     Set: export {}=your-api-key (or run with --mock)",
                    API_KEY_VAR, API_KEY_VAR
                )
            })?;
        Self::new(&api_key, config)
    }
}

/// OpenRouter API 키 존재 여부 확인
pub fn has_openrouter_key() -> bool {
    std::env::var(API_KEY_VAR)
        .map(|k| !k.trim().is_empty())
        .unwrap_or(false)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LanguageModel for OpenRouterModel {
    async fn complete(
        &self,
        request: &CompletionRequest<'_>,
    ) -> std::result::Result<Completion, BackendError> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: request.system,
        });
        messages.extend(request.history.iter().map(|turn| ChatMessage {
            role: turn.role.as_str(),
            content: &turn.text,
        }));
        messages.push(ChatMessage {
            role: "user",
            content: request.user_message,
        });

        let body = ChatRequest {
            model: request.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages,
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_http_error("failed to call OpenRouter", e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            let message = format!("OpenRouter returned {}: {}", status, text);
            return Err(if status.is_server_error() {
                BackendError::Transient(message)
            } else {
                BackendError::Permanent(message)
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| classify_http_error("failed to read OpenRouter response", e))?;

        let text = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| BackendError::Permanent("OpenRouter returned no content".to_string()))?;

        Ok(Completion {
            text,
            model: parsed.model.unwrap_or_else(|| request.model.to_string()),
        })
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

/// 타임아웃과 연결 실패는 재시도 대상, 그 외(본문 파싱 실패 등)는 영구 실패
fn classify_http_error(context: &str, e: reqwest::Error) -> BackendError {
    let message = format!("{}: {}", context, e);
    if e.is_timeout() || e.is_connect() || e.is_request() {
        BackendError::Transient(message)
    } else {
        BackendError::Permanent(message)
    }
}
