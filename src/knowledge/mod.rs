//! Knowledge 모듈 - 문서 처리와 벡터 인덱스
//!
//! - Cleaner/Chunker/Processor: 원문 정제 후 겹치는 청크로 분할
//! - VectorStore: LanceDB(영속) 또는 인메모리 벡터 저장소
//! - EmbeddingManager: 청크 임베딩 + upsert, 질문 검색

mod chunker;
mod cleaner;
mod lance;
mod manager;
mod memory;
mod processor;
mod vector;

// Re-exports
pub use chunker::{
    default_chunker, sliding_window_chunker, ChunkConfig, ChunkSpan, Chunker,
    SlidingWindowChunker,
};
pub use cleaner::{clean_text, CleanedText, PAGE_BREAK};
pub use lance::LanceVectorStore;
pub use manager::EmbeddingManager;
pub use memory::InMemoryVectorStore;
pub use processor::{
    source_name, Chunk, Document, DocumentProcessor, ProcessedDocument, DEFAULT_DOC_TYPE,
};
pub use vector::{
    cosine_similarity, ChunkMetadata, EmbeddingRecord, MetadataFilter, QueryResult, SearchHit,
    VectorStore,
};
