//! 임베딩 모듈 - 텍스트 벡터화
//!
//! 텍스트를 고정 차원 벡터로 변환하는 프로바이더들입니다.
//! - `GeminiEmbedding`: Gemini API (gemini-embedding-001)
//! - `HashingEmbedding`: 로컬 feature hashing (오프라인 모드/테스트)
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = create_embedder(EmbeddingBackend::Gemini, 768)?;
//! let embedding = embedder.embed("Hello, world!").await?;
//! ```

mod gemini;
mod hashing;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::EmbeddingBackend;

pub use gemini::{get_api_key, has_api_key, GeminiEmbedding, DEFAULT_DIMENSION};
pub use hashing::HashingEmbedding;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩 (문서 청크용)
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 검색 쿼리 임베딩 (기본 구현: `embed`와 동일)
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Factory Function
// ============================================================================

/// 설정된 백엔드로 임베딩 프로바이더 생성
pub fn create_embedder(
    backend: EmbeddingBackend,
    dimension: usize,
) -> Result<Arc<dyn EmbeddingProvider>> {
    match backend {
        EmbeddingBackend::Gemini => {
            if !has_api_key() {
                anyhow::bail!(
                    "GEMINI_API_KEY or GOOGLE_AI_API_KEY not set.\n\
                     Set: export GEMINI_API_KEY=your-api-key\n\
                     Get your API key at: https://aistudio.google.com/app/apikey"
                );
            }

            let embedder = GeminiEmbedding::from_env_with_dimension(dimension)?;
            tracing::info!(
                "Using Gemini API embedding (dimension: {})",
                embedder.dimension()
            );
            Ok(Arc::new(embedder))
        }
        EmbeddingBackend::Hashing => {
            let embedder = HashingEmbedding::new(dimension)?;
            tracing::info!("Using local hashing embedding (dimension: {})", dimension);
            Ok(Arc::new(embedder))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_hashing_embedder() {
        let embedder = create_embedder(EmbeddingBackend::Hashing, 64).unwrap();
        assert_eq!(embedder.dimension(), 64);
        assert_eq!(embedder.embed("Rust").await.unwrap().len(), 64);
    }

    #[test]
    fn test_create_hashing_embedder_rejects_zero_dimension() {
        assert!(create_embedder(EmbeddingBackend::Hashing, 0).is_err());
    }
}
