//! Generation Client - 언어 모델 호출
//!
//! 프롬프트 페이로드를 언어 모델 백엔드로 보내고 답변과 출처를 돌려줍니다.
//! 백엔드는 OpenRouter(실제 호출) 또는 결정적 mock 중 시작 시 선택되며,
//! 클라이언트는 어떤 백엔드인지 구분하지 않습니다.
//!
//! 일시적 실패(5xx, 타임아웃, 연결 실패)는 한 번만 재시도하고,
//! 영구 실패(429 포함 4xx, 잘못된 응답)는 바로 반환합니다.

mod mock;
mod openrouter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{RagError, Result};
use crate::prompt::{PromptPayload, SourceAttribution};
use crate::session::ConversationTurn;

pub use mock::{MockModel, NO_ANSWER};
pub use openrouter::{has_openrouter_key, OpenRouterModel};

/// 기본 모델 (OpenRouter 무료 모델)
pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";

/// 최대 시도 횟수 (최초 1회 + 재시도 1회)
const MAX_ATTEMPTS: u32 = 2;

// ============================================================================
// Configuration
// ============================================================================

/// 생성 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// mock 백엔드 사용 여부
    pub mock: bool,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 일시적 실패 후 재시도 전 대기 (ms)
    pub retry_backoff_ms: u64,
    /// OpenAI 호환 API 기본 URL
    pub base_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 500,
            temperature: 0.2,
            mock: false,
            timeout_secs: 30,
            retry_backoff_ms: 1000,
            base_url: "https://openrouter.ai/api/v1/".to_string(),
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(RagError::Config("model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(RagError::Config("max_tokens must be greater than 0".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.timeout_secs == 0 {
            return Err(RagError::Config("timeout_secs must be greater than 0".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 백엔드 실패 분류
#[derive(Debug, Error)]
pub enum BackendError {
    /// 재시도하면 성공할 수 있는 실패
    #[error("transient backend failure: {0}")]
    Transient(String),
    /// 재시도해도 소용없는 실패
    #[error("permanent backend failure: {0}")]
    Permanent(String),
}

/// 백엔드 요청
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub history: &'a [ConversationTurn],
    /// 컨텍스트와 질문이 채워진 사용자 메시지
    pub user_message: &'a str,
    /// 렌더링된 컨텍스트 섹션
    pub context: &'a str,
    pub question: &'a str,
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// 백엔드 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    /// 실제로 응답한 모델
    pub model: String,
}

/// 언어 모델 백엔드 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        request: &CompletionRequest<'_>,
    ) -> std::result::Result<Completion, BackendError>;

    /// 백엔드 이름
    fn name(&self) -> &str;
}

// ============================================================================
// GenerationClient
// ============================================================================

/// 생성 결과
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub answer: String,
    /// 최종 컨텍스트에 들어간 문서들
    pub sources: Vec<SourceAttribution>,
    pub model: String,
}

/// 언어 모델 클라이언트
pub struct GenerationClient {
    backend: Arc<dyn LanguageModel>,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn LanguageModel>, config: GenerationConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 페이로드로 답변 생성
    pub async fn generate(&self, payload: &PromptPayload) -> Result<Generation> {
        let request = CompletionRequest {
            system: &payload.system,
            history: &payload.history,
            user_message: &payload.user_message,
            context: &payload.context,
            question: &payload.question,
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.backend.complete(&request).await {
                Ok(completion) => {
                    tracing::debug!(
                        "{} answered with {} chars after {} attempt(s)",
                        completion.model,
                        completion.text.chars().count(),
                        attempts
                    );
                    return Ok(Generation {
                        answer: completion.text,
                        sources: payload.sources.clone(),
                        model: completion.model,
                    });
                }
                Err(BackendError::Transient(message)) if attempts < MAX_ATTEMPTS => {
                    let backoff = Duration::from_millis(self.config.retry_backoff_ms);
                    tracing::warn!(
                        "Generation failed transiently, retrying in {:?}: {}",
                        backoff,
                        message
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    tracing::error!("Generation failed via {}: {}", self.backend.name(), e);
                    return Err(RagError::Generation {
                        message: e.to_string(),
                        attempts,
                    });
                }
            }
        }
    }
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정에 따라 백엔드 생성
pub fn create_backend(config: &GenerationConfig) -> Result<Arc<dyn LanguageModel>> {
    if config.mock {
        tracing::info!("Using mock language model");
        return Ok(Arc::new(MockModel::new()));
    }

    let model = OpenRouterModel::from_env(config)
        .map_err(|e| RagError::Config(format!("{:#}", e)))?;
    tracing::info!("Using OpenRouter model {}", config.model);
    Ok(Arc::new(model))
}

// ============================================================================
// Tests
// ============================================================================
