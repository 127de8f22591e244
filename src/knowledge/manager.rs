//! Embedding Manager
//!
//! 청크를 임베딩하여 벡터 저장소에 upsert하고, 질문을 같은 프로바이더로
//! 임베딩하여 최근접 청크를 찾습니다. 프로바이더/저장소의 `anyhow` 에러는
//! 여기서 `RagError`로 변환됩니다.

use std::sync::Arc;

use anyhow::Context;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

use super::processor::Chunk;
use super::vector::{EmbeddingRecord, MetadataFilter, QueryResult, VectorStore};

/// 임베딩 + 벡터 인덱스 관리자
pub struct EmbeddingManager {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
}

impl EmbeddingManager {
    /// 프로바이더와 저장소의 차원이 다르면 `DimensionMismatch`
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
    ) -> Result<Self> {
        config.validate()?;

        if embedder.dimension() != store.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: store.dimension(),
                actual: embedder.dimension(),
            });
        }

        Ok(Self {
            embedder,
            store,
            config,
        })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn store_name(&self) -> &str {
        self.store.name()
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    /// 인덱스의 레코드 수
    pub async fn count(&self) -> Result<usize> {
        self.store
            .count()
            .await
            .map_err(|e| RagError::Search(format!("{:#}", e)))
    }

    /// 청크 임베딩 후 upsert
    ///
    /// 거부된 배치는 레코드 단위로 다시 시도하고, 그래도 실패한 레코드만
    /// `IndexWrite`로 보고합니다.
    pub async fn index(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let records = self.embed_chunks(chunks).await?;
        self.upsert_records(&records).await
    }

    /// 문서의 기존 레코드를 새 청크로 교체
    ///
    /// 임베딩이 모두 성공한 뒤에만 기존 레코드를 지우므로, 임베딩 실패 시
    /// 이전 인덱스가 그대로 남습니다. 청크가 줄어든 문서의 남은 레코드도
    /// 함께 제거됩니다.
    pub async fn replace_document(&self, document_id: &str, chunks: &[Chunk]) -> Result<usize> {
        let records = if chunks.is_empty() {
            Vec::new()
        } else {
            self.embed_chunks(chunks).await?
        };

        let removed = self
            .store
            .delete_document(document_id)
            .await
            .map_err(|e| RagError::IndexWrite {
                failed_ids: records.iter().map(|r| r.id.clone()).collect(),
                upserted: 0,
                message: format!("{:#}", e),
            })?;
        if removed > 0 {
            tracing::debug!("Removed {} previous records of {}", removed, document_id);
        }

        if records.is_empty() {
            return Ok(0);
        }
        self.upsert_records(&records).await
    }

    /// 임베딩은 `embed_concurrency`만큼 동시에 요청하되 순서를 유지합니다.
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<EmbeddingRecord>> {
        let dimension = self.store.dimension();
        tracing::info!(
            "Embedding {} chunks with {} (concurrency {})",
            chunks.len(),
            self.embedder.name(),
            self.config.embed_concurrency
        );

        let vectors: Vec<Vec<f32>> = stream::iter(chunks)
            .map(|chunk| {
                let embedder = Arc::clone(&self.embedder);
                async move {
                    embedder
                        .embed(&chunk.text)
                        .await
                        .with_context(|| format!("Failed to embed chunk {}", chunk.id))
                }
            })
            .buffered(self.config.embed_concurrency)
            .try_collect()
            .await
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        let mut records = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            if vector.len() != dimension {
                return Err(RagError::Embedding(format!(
                    "provider returned {} values for chunk {}, expected {}",
                    vector.len(),
                    chunk.id,
                    dimension
                )));
            }
            records.push(EmbeddingRecord::from_chunk(chunk, vector));
        }
        Ok(records)
    }

    async fn upsert_records(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut upserted = 0;
        let mut failed_ids = Vec::new();
        let mut last_error = String::new();

        for batch in records.chunks(self.config.batch_size) {
            match self.store.upsert(batch).await {
                Ok(n) => upserted += n,
                Err(e) => {
                    tracing::warn!(
                        "Batch of {} records rejected by {}, retrying individually: {:#}",
                        batch.len(),
                        self.store.name(),
                        e
                    );
                    for record in batch {
                        match self.store.upsert(std::slice::from_ref(record)).await {
                            Ok(n) => upserted += n,
                            Err(e) => {
                                tracing::warn!("Record {} rejected: {:#}", record.id, e);
                                failed_ids.push(record.id.clone());
                                last_error = format!("{:#}", e);
                            }
                        }
                    }
                }
            }
        }

        if !failed_ids.is_empty() {
            return Err(RagError::IndexWrite {
                failed_ids,
                upserted,
                message: last_error,
            });
        }

        tracing::info!("Upserted {} records into {}", upserted, self.store.name());
        Ok(upserted)
    }

    /// 질문과 가장 가까운 청크 검색
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<QueryResult> {
        if top_k == 0 {
            return Ok(QueryResult::default());
        }

        let vector = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        if vector.len() != self.store.dimension() {
            return Err(RagError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: vector.len(),
            });
        }

        let mut hits = self
            .store
            .query(&vector, top_k, filter)
            .await
            .map_err(|e| RagError::Search(format!("{:#}", e)))?;

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        tracing::debug!(
            "Search returned {} hits (best score {:?})",
            hits.len(),
            hits.first().map(|h| h.score)
        );

        Ok(QueryResult::new(hits))
    }
}

// ============================================================================
// Tests
// ============================================================================
