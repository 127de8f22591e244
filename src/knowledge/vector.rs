//! Vector Store - 벡터 저장소 트레이트 및 유틸리티
//!
//! 임베딩 레코드의 upsert와 코사인 유사도 기반 최근접 이웃 검색을 위한
//! 공통 인터페이스입니다. LanceDB와 인메모리 구현이 있습니다.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::processor::Chunk;

// ============================================================================
// Types
// ============================================================================

/// 레코드에 함께 저장되는 청크 메타데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub doc_type: String,
    pub source_path: String,
    pub chunk_index: usize,
    /// 청크 원문
    pub text: String,
}

/// 임베딩 레코드 (저장 단위)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// 청크 ID (upsert 키)
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl EmbeddingRecord {
    /// 청크와 벡터로 레코드 생성
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            vector,
            metadata: ChunkMetadata {
                document_id: chunk.document_id.clone(),
                doc_type: chunk.doc_type.clone(),
                source_path: chunk.source_path.clone(),
                chunk_index: chunk.index,
                text: chunk.text.clone(),
            },
        }
    }
}

/// 메타데이터 필터
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    /// 문서 타입 태그 일치
    pub doc_type: Option<String>,
}

impl MetadataFilter {
    pub fn doc_type(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: Some(doc_type.into()),
        }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.doc_type
            .as_deref()
            .map_or(true, |doc_type| metadata.doc_type == doc_type)
    }
}

/// 검색 결과 항목
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record: EmbeddingRecord,
    /// 코사인 유사도 (같은 쿼리 안에서만 비교 가능)
    pub score: f32,
}

/// 쿼리 결과 (점수 내림차순, 길이 ≤ top_k)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub hits: Vec<SearchHit>,
}

impl QueryResult {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 레코드 upsert (같은 ID는 교체)
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<usize>;

    /// 최근접 이웃 검색 (유사도 내림차순)
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>>;

    /// 문서의 모든 레코드 삭제 (삭제된 개수 반환)
    async fn delete_document(&self, document_id: &str) -> Result<usize>;

    /// 레코드 개수
    async fn count(&self) -> Result<usize>;

    /// 벡터 차원
    fn dimension(&self) -> usize;

    /// 저장소 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 두 벡터 간의 코사인 유사도를 계산합니다.
/// 결과는 -1.0 ~ 1.0 범위입니다.
///
/// # Arguments
/// * `a` - 첫 번째 벡터
/// * `b` - 두 번째 벡터
///
/// # Returns
/// 코사인 유사도 (-1.0 ~ 1.0)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
