//! In-Memory Vector Store
//!
//! LanceDB를 열 수 없을 때(또는 오프라인 모드) 사용하는 전수 탐색 저장소입니다.
//! 레코드는 삽입 순서대로 보관되며, 동점은 삽입 순서로 정렬됩니다.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::vector::{cosine_similarity, EmbeddingRecord, MetadataFilter, SearchHit, VectorStore};

/// 인메모리 벡터 저장소
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimension: usize,
    records: RwLock<Vec<EmbeddingRecord>>,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            anyhow::bail!(
                "Record {} has dimension {}, store expects {}",
                bad.id,
                bad.vector.len(),
                self.dimension
            );
        }

        let mut stored = self
            .records
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        for record in records {
            // 같은 ID는 제자리 교체 (삽입 순서 유지)
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }

        Ok(records.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        if vector.len() != self.dimension {
            anyhow::bail!(
                "Query has dimension {}, store expects {}",
                vector.len(),
                self.dimension
            );
        }
        if top_k == 0 {
            return Ok(vec![]);
        }

        let stored = self
            .records
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let mut hits: Vec<SearchHit> = stored
            .iter()
            .filter(|r| filter.map_or(true, |f| f.matches(&r.metadata)))
            .map(|r| SearchHit {
                score: cosine_similarity(vector, &r.vector),
                record: r.clone(),
            })
            .collect();

        // sort_by는 안정 정렬이므로 동점은 삽입 순서 유지
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut stored = self
            .records
            .write()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let before = stored.len();
        stored.retain(|r| r.metadata.document_id != document_id);
        Ok(before - stored.len())
    }

    async fn count(&self) -> Result<usize> {
        let stored = self
            .records
            .read()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(stored.len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::vector::ChunkMetadata;

    fn record(id: &str, doc_type: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            vector,
            metadata: ChunkMetadata {
                document_id: id.split(':').next().unwrap_or(id).to_string(),
                doc_type: doc_type.to_string(),
                source_path: format!("/data/{}.md", doc_type),
                chunk_index: 0,
                text: format!("text of {}", id),
            },
        }
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let store = InMemoryVectorStore::new(3);
        let hits = store.query(&[1.0, 0.0, 0.0], 5, None).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_id() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(&[record("a:0", "resume", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert(&[record("a:0", "resume", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let hits = store.query(&[0.0, 1.0], 1, None).await.unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_orders_and_truncates() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(&[
                record("a:0", "resume", vec![0.0, 1.0]),
                record("a:1", "resume", vec![1.0, 0.0]),
                record("a:2", "resume", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "a:1");
        assert_eq!(hits[1].record.id, "a:2");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(&[
                record("b:0", "resume", vec![1.0, 0.0]),
                record("a:0", "resume", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].record.id, "b:0");
        assert_eq!(hits[1].record.id, "a:0");
    }

    #[tokio::test]
    async fn test_filter_by_doc_type() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(&[record("r:0", "resume", vec![1.0, 0.0])])
            .await
            .unwrap();

        let filter = MetadataFilter::doc_type("cover-letter");
        let hits = store.query(&[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimension() {
        let store = InMemoryVectorStore::new(3);
        assert!(store
            .upsert(&[record("a:0", "resume", vec![1.0])])
            .await
            .is_err());
        assert!(store.query(&[1.0], 1, None).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_document_removes_all_its_chunks() {
        let store = InMemoryVectorStore::new(2);
        store
            .upsert(&[
                record("a:0", "resume", vec![1.0, 0.0]),
                record("a:1", "resume", vec![0.0, 1.0]),
                record("b:0", "notes", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_document("a").await.unwrap(), 2);
        assert_eq!(store.delete_document("missing").await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
