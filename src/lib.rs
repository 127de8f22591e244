//! whoami-rag - 개인 문서 기반 RAG 어시스턴트
//!
//! 이력서, 자기소개서, 개인 노트 같은 문서를 청킹하고 임베딩하여
//! 벡터 인덱스(LanceDB)에 저장한 뒤, 질문과 관련된 청크를 찾아
//! 언어 모델 프롬프트를 조립하고 출처와 함께 답변합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod generation;
pub mod knowledge;
pub mod pipeline;
pub mod prompt;
pub mod session;

// Re-exports
pub use config::{get_data_dir, EmbeddingBackend, RagConfig, RetrievalConfig, VectorBackend};
pub use embedding::{
    create_embedder, get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding,
    HashingEmbedding,
};
pub use error::{RagError, Result};
pub use generation::{
    create_backend, Generation, GenerationClient, GenerationConfig, LanguageModel, MockModel,
    OpenRouterModel,
};
pub use knowledge::{
    default_chunker, sliding_window_chunker, Chunk, ChunkConfig, Chunker, Document,
    DocumentProcessor, EmbeddingManager, EmbeddingRecord, InMemoryVectorStore, LanceVectorStore,
    MetadataFilter, QueryResult, SearchHit, VectorStore,
};
pub use pipeline::{Answer, IndexingReport, QueryOutcome, RagAssistant};
pub use prompt::{PromptBuilder, PromptConfig, PromptPayload, PromptTemplates, SourceAttribution};
pub use session::{ConversationTurn, Role, Session};
