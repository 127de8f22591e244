//! LanceDB Vector Store - 영속 벡터 인덱스
//!
//! 데이터 디렉토리 아래 `.lance` 디렉토리에 임베딩 레코드를 저장하고
//! 코사인 거리 기반 ANN 검색을 수행합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::DistanceType;

use super::vector::{ChunkMetadata, EmbeddingRecord, MetadataFilter, SearchHit, VectorStore};

/// 벡터 테이블 이름
const TABLE_NAME: &str = "chunks";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// LanceDB 벡터 저장소 구현
///
/// upsert는 같은 ID의 행을 삭제한 뒤 추가하는 방식입니다.
pub struct LanceVectorStore {
    db: Connection,
    dimension: usize,
}

impl LanceVectorStore {
    /// LanceDB 저장소 열기
    ///
    /// 테이블이 이미 있으면 저장된 `embedding` 컬럼의 차원을 사용합니다.
    /// 요청한 차원과 다르면 경고를 남기고, 이후 `EmbeddingManager` 생성 시
    /// `DimensionMismatch`가 됩니다.
    ///
    /// # Arguments
    /// * `path` - .lance 디렉토리 경로
    /// * `dimension` - 새 테이블을 만들 때 사용할 임베딩 차원
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Vector dimension must be greater than 0");
        }

        // 부모 디렉토리 생성
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create LanceDB directory")?;
            }
        }

        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let mut store = Self { db, dimension };
        if let Some(stored) = store.stored_dimension().await? {
            if stored != dimension {
                tracing::warn!(
                    "Index at {:?} stores {}-dimensional vectors, {} requested",
                    path,
                    stored,
                    dimension
                );
            }
            store.dimension = stored;
        }

        Ok(store)
    }

    /// 기존 테이블의 `embedding` 컬럼 차원 (테이블이 없으면 None)
    async fn stored_dimension(&self) -> Result<Option<usize>> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .context("Failed to read table schema")?;
        let field = schema
            .field_with_name("embedding")
            .context("Table has no embedding column")?;

        match field.data_type() {
            DataType::FixedSizeList(_, size) => {
                let size = usize::try_from(*size).context("Invalid embedding size")?;
                Ok(Some(size))
            }
            other => anyhow::bail!("Unexpected embedding column type {:?}", other),
        }
    }

    /// 벡터 테이블 스키마 생성
    fn create_schema(&self) -> Result<Schema> {
        let dimension = i32::try_from(self.dimension).context("Dimension too large")?;
        Ok(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("doc_type", DataType::Utf8, false),
            Field::new("source_path", DataType::Utf8, false),
            Field::new("chunk_index", DataType::Int32, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                "embedding",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                false,
            ),
        ]))
    }

    /// 레코드들을 Arrow RecordBatch로 변환
    fn records_to_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch> {
        if records.is_empty() {
            anyhow::bail!("Cannot create batch from empty records");
        }

        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.dimension) {
            anyhow::bail!(
                "Record {} has dimension {}, table expects {}",
                bad.id,
                bad.vector.len(),
                self.dimension
            );
        }

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let document_ids: Vec<&str> = records
            .iter()
            .map(|r| r.metadata.document_id.as_str())
            .collect();
        let doc_types: Vec<&str> = records
            .iter()
            .map(|r| r.metadata.doc_type.as_str())
            .collect();
        let source_paths: Vec<&str> = records
            .iter()
            .map(|r| r.metadata.source_path.as_str())
            .collect();
        let chunk_indices = records
            .iter()
            .map(|r| i32::try_from(r.metadata.chunk_index))
            .collect::<std::result::Result<Vec<i32>, _>>()
            .context("Chunk index out of range")?;
        let texts: Vec<&str> = records.iter().map(|r| r.metadata.text.as_str()).collect();

        // 임베딩을 FixedSizeList로 변환
        let embeddings_flat: Vec<f32> = records
            .iter()
            .flat_map(|r| r.vector.iter().copied())
            .collect();

        let values = Float32Array::from(embeddings_flat);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let embeddings_list = FixedSizeListArray::try_new(
            field,
            i32::try_from(self.dimension).context("Dimension too large")?,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        let batch = RecordBatch::try_new(
            Arc::new(self.create_schema()?),
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(document_ids)),
                Arc::new(StringArray::from(doc_types)),
                Arc::new(StringArray::from(source_paths)),
                Arc::new(Int32Array::from(chunk_indices)),
                Arc::new(StringArray::from(texts)),
                Arc::new(embeddings_list),
            ],
        )
        .context("Failed to create RecordBatch")?;

        Ok(batch)
    }

    /// 테이블 존재 여부 확인
    async fn table_exists(&self) -> Result<bool> {
        let names = self
            .db
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;
        Ok(names.iter().any(|name| name == TABLE_NAME))
    }

    async fn open_table(&self) -> Result<lancedb::table::Table> {
        self.db
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")
    }

    /// 검색 결과 배치를 SearchHit로 변환
    fn parse_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
        let ids = string_column(batch, "id")?;
        let document_ids = string_column(batch, "document_id")?;
        let doc_types = string_column(batch, "doc_type")?;
        let source_paths = string_column(batch, "source_path")?;
        let texts = string_column(batch, "text")?;

        let chunk_indices = batch
            .column_by_name("chunk_index")
            .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing chunk_index column"))?;

        let embeddings = batch
            .column_by_name("embedding")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| anyhow::anyhow!("Missing embedding column"))?;

        // _distance 컬럼 (LanceDB가 자동 추가)
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

        let mut hits = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let vector_values = embeddings.value(i);
            let vector = vector_values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| anyhow::anyhow!("Invalid embedding values"))?
                .values()
                .to_vec();

            // 코사인 거리 → 코사인 유사도
            let score = 1.0 - distances.value(i);

            hits.push(SearchHit {
                record: EmbeddingRecord {
                    id: ids.value(i).to_string(),
                    vector,
                    metadata: ChunkMetadata {
                        document_id: document_ids.value(i).to_string(),
                        doc_type: doc_types.value(i).to_string(),
                        source_path: source_paths.value(i).to_string(),
                        chunk_index: usize::try_from(chunk_indices.value(i)).unwrap_or(0),
                        text: texts.value(i).to_string(),
                    },
                },
                score,
            });
        }

        Ok(hits)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

/// SQL 문자열 리터럴 이스케이프
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let batch = self.records_to_batch(records)?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        if self.table_exists().await? {
            let table = self.open_table().await?;

            // 같은 ID 삭제 후 추가
            let ids = records
                .iter()
                .map(|r| quote(&r.id))
                .collect::<Vec<_>>()
                .join(", ");
            table
                .delete(&format!("id IN ({})", ids))
                .await
                .context("Failed to delete replaced records")?;

            table
                .add(batches)
                .execute()
                .await
                .context("Failed to add records to table")?;
        } else {
            self.db
                .create_table(TABLE_NAME, batches)
                .execute()
                .await
                .context("Failed to create table")?;
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
                "Query has dimension {}, table expects {}",
                vector.len(),
                self.dimension
            );
        }
        if top_k == 0 || !self.table_exists().await? {
            return Ok(vec![]);
        }

        let table = self.open_table().await?;

        let mut query = table
            .vector_search(vector.to_vec())
            .context("Failed to create vector search")?
            .distance_type(DistanceType::Cosine)
            .limit(top_k);

        if let Some(doc_type) = filter.and_then(|f| f.doc_type.as_deref()) {
            query = query.only_if(format!("doc_type = {}", quote(doc_type)));
        }

        let results = query
            .execute()
            .await
            .context("Failed to execute vector search")?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .context("Failed to read search results")?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(Self::parse_batch(batch)?);
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let predicate = format!("document_id = {}", quote(document_id));
        let existing = table
            .count_rows(Some(predicate.clone()))
            .await
            .context("Failed to count document rows")?;

        if existing > 0 {
            table
                .delete(&predicate)
                .await
                .context("Failed to delete document rows")?;
        }

        Ok(existing)
    }

    async fn count(&self) -> Result<usize> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self.open_table().await?;
        let count = table.count_rows(None).await.context("Failed to count rows")?;
        Ok(count)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "lancedb"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::embedding::HashingEmbedding;
    use crate::error::RagError;
    use crate::knowledge::EmbeddingManager;
    use tempfile::TempDir;

    const DIM: usize = 8;

    fn create_test_record(doc: &str, doc_type: &str, index: usize, hot: usize) -> EmbeddingRecord {
        let mut vector = vec![0.0; DIM];
        vector[hot % DIM] = 1.0;
        EmbeddingRecord {
            id: format!("{}:{}", doc, index),
            vector,
            metadata: ChunkMetadata {
                document_id: doc.to_string(),
                doc_type: doc_type.to_string(),
                source_path: format!("/data/{}.md", doc),
                chunk_index: index,
                text: format!("Chunk {} of {}", index, doc),
            },
        }
    }

    #[tokio::test]
    async fn test_lance_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("empty.lance"), DIM)
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        let hits = store.query(&[1.0; DIM], 5, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_lance_upsert_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("upsert.lance"), DIM)
            .await
            .unwrap();

        let records = vec![
            create_test_record("resume", "resume", 0, 0),
            create_test_record("resume", "resume", 1, 1),
        ];
        assert_eq!(store.upsert(&records).await.unwrap(), 2);
        assert_eq!(store.upsert(&records).await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lance_search_order_and_filter() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("search.lance"), DIM)
            .await
            .unwrap();

        store
            .upsert(&[
                create_test_record("resume", "resume", 0, 0),
                create_test_record("resume", "resume", 1, 1),
                create_test_record("letter", "cover-letter", 0, 2),
            ])
            .await
            .unwrap();

        let mut query = vec![0.0; DIM];
        query[1] = 1.0;
        let hits = store.query(&query, 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.id, "resume:1");
        assert!(hits[0].score >= hits[1].score);
        assert!((hits[0].score - 1.0).abs() < 1e-4);

        let filter = MetadataFilter::doc_type("cover-letter");
        let hits = store.query(&query, 5, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.metadata.doc_type, "cover-letter");
    }

    #[tokio::test]
    async fn test_lance_rejects_wrong_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("dim.lance"), DIM)
            .await
            .unwrap();

        let mut record = create_test_record("resume", "resume", 0, 0);
        record.vector.push(0.5);
        assert!(store.upsert(&[record]).await.is_err());
    }

    #[tokio::test]
    async fn test_lance_reopen_uses_stored_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reopen.lance");

        let store = LanceVectorStore::open(&path, DIM).await.unwrap();
        store
            .upsert(&[create_test_record("resume", "resume", 0, 0)])
            .await
            .unwrap();
        drop(store);

        let reopened = LanceVectorStore::open(&path, DIM * 2).await.unwrap();
        assert_eq!(reopened.dimension(), DIM);

        let embedder = Arc::new(HashingEmbedding::new(DIM * 2).unwrap());
        let err = EmbeddingManager::new(embedder, Arc::new(reopened), RetrievalConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: DIM,
                actual: 16
            }
        ));
    }

    #[tokio::test]
    async fn test_lance_delete_document() {
        let temp_dir = TempDir::new().unwrap();
        let store = LanceVectorStore::open(&temp_dir.path().join("delete.lance"), DIM)
            .await
            .unwrap();

        store
            .upsert(&[
                create_test_record("resume", "resume", 0, 0),
                create_test_record("resume", "resume", 1, 1),
                create_test_record("letter", "cover-letter", 0, 2),
            ])
            .await
            .unwrap();

        assert_eq!(store.delete_document("resume").await.unwrap(), 2);
        assert_eq!(store.delete_document("resume").await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("o'brien:0"), "'o''brien:0'");
    }
}
