//! Feature hashing 임베딩
//!
//! 소문자 단어 토큰을 SHA-256으로 D개 버킷에 해싱한 뒤 L2 정규화합니다.
//! 네트워크 없이 결정적으로 동작하므로 오프라인 모드와 테스트에 사용합니다.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;

/// 로컬 해싱 임베딩
#[derive(Debug, Clone)]
pub struct HashingEmbedding {
    dimension: usize,
}

impl HashingEmbedding {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Invalid dimension: 0");
        }
        Ok(Self { dimension })
    }

    /// 동기 임베딩
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            // 충돌 상쇄를 위한 부호 비트
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        vector
    }
}

/// 소문자 영숫자 토큰
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashingEmbedding::new(128).unwrap();
        let a = embedder.embed_sync("Five years of experience with Rust");
        let b = embedder.embed_sync("Five years of experience with Rust");
        assert_eq!(a, b);

        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedding::new(64).unwrap();
        assert_eq!(
            embedder.embed_sync("Data Engineer!"),
            embedder.embed_sync("data engineer")
        );
    }

    #[test]
    fn test_shared_words_score_higher() {
        let embedder = HashingEmbedding::new(256).unwrap();
        let query = embedder.embed_sync("years of experience");
        let related = embedder.embed_sync("I have 5 years of experience in data engineering");
        let unrelated = embedder.embed_sync("Favorite hobby: climbing mountains");

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedding::new(16).unwrap();
        assert!(embedder.embed_sync("  ...  ").iter().all(|&x| x == 0.0));
    }
}
