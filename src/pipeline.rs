//! RAG 파이프라인
//!
//! 오프라인 인덱싱 진입점(`index_documents`)과 질의 진입점(`ask`, `respond`)을
//! 제공합니다. 각 컴포넌트는 설정에 따라 시작 시 한 번 선택되어 주입됩니다.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{RagConfig, VectorBackend};
use crate::embedding::create_embedder;
use crate::error::{RagError, Result};
use crate::generation::{create_backend, GenerationClient};
use crate::knowledge::{
    sliding_window_chunker, Document, DocumentProcessor, EmbeddingManager, InMemoryVectorStore,
    LanceVectorStore, MetadataFilter, QueryResult, VectorStore,
};
use crate::prompt::{PromptBuilder, PromptTemplates, SourceAttribution};
use crate::session::Session;

// ============================================================================
// Types
// ============================================================================

/// 인덱싱에 실패한 문서
#[derive(Debug, Clone)]
pub struct DocumentFailure {
    pub document_id: String,
    pub path: PathBuf,
    pub error: String,
}

/// 인덱싱 결과
#[derive(Debug, Clone, Default)]
pub struct IndexingReport {
    /// 처리를 시도한 문서 수
    pub documents: usize,
    /// 생성된 청크 수
    pub chunks: usize,
    /// upsert된 레코드 수
    pub upserted: usize,
    pub failures: Vec<DocumentFailure>,
    /// `{path}: {warning}` 형식
    pub warnings: Vec<String>,
}

impl IndexingReport {
    pub fn succeeded(&self) -> usize {
        self.documents - self.failures.len()
    }
}

/// 질의 응답
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// 점수 순 출처
    pub sources: Vec<SourceAttribution>,
    pub model: String,
    /// 컨텍스트에 검색 결과가 들어갔는지
    pub context_found: bool,
}

/// 질의 결과 상태
#[derive(Debug)]
pub enum QueryOutcome {
    /// 검색된 문서를 근거로 답변
    Answered(Answer),
    /// 관련 문서 없이 생성된 답변
    NoRelevantContext(Answer),
    /// 답변 실패
    CouldNotAnswer(RagError),
}

// ============================================================================
// RagAssistant
// ============================================================================

/// 문서 기반 질의응답 어시스턴트
pub struct RagAssistant {
    processor: DocumentProcessor,
    manager: EmbeddingManager,
    prompt: PromptBuilder,
    generator: GenerationClient,
    top_k: usize,
    session_turns: usize,
    degraded: bool,
}

impl RagAssistant {
    pub fn new(
        processor: DocumentProcessor,
        manager: EmbeddingManager,
        prompt: PromptBuilder,
        generator: GenerationClient,
    ) -> Self {
        let top_k = manager.config().top_k;
        Self {
            processor,
            manager,
            prompt,
            generator,
            top_k,
            session_turns: 20,
            degraded: false,
        }
    }

    /// 설정으로 전체 파이프라인 구성
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        config.validate()?;

        let embedder = create_embedder(config.embedding_backend, config.embedding_dimension)
            .map_err(|e| RagError::Config(format!("{:#}", e)))?;
        let (store, degraded) = open_vector_store(config, embedder.dimension()).await;
        let manager = EmbeddingManager::new(embedder, store, config.retrieval)?;

        let processor =
            DocumentProcessor::new(sliding_window_chunker(config.chunk)?, config.remove_boilerplate);

        let templates = match &config.prompts_file {
            Some(path) => PromptTemplates::load(path)?,
            None => PromptTemplates::default(),
        };
        let prompt = PromptBuilder::new(templates, config.prompt);

        let backend = create_backend(&config.generation)?;
        let generator = GenerationClient::new(backend, config.generation.clone());

        let mut assistant = Self::new(processor, manager, prompt, generator);
        assistant.session_turns = config.session_turns;
        assistant.degraded = degraded;
        Ok(assistant)
    }

    /// 벡터 저장소가 인메모리로 대체되었는지
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn manager(&self) -> &EmbeddingManager {
        &self.manager
    }

    pub fn generator_name(&self) -> &str {
        self.generator.backend_name()
    }

    /// 새 대화 세션
    pub fn new_session(&self) -> Session {
        Session::new(self.session_turns)
    }

    /// 문서 일괄 인덱싱
    ///
    /// 읽을 수 없거나 저장에 실패한 문서는 보고서에 기록하고 계속 진행합니다.
    /// 차원 불일치나 설정 오류처럼 모든 문서에 해당하는 오류는 즉시 반환합니다.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<IndexingReport> {
        let mut report = IndexingReport {
            documents: documents.len(),
            ..IndexingReport::default()
        };

        for document in documents {
            tracing::info!("Indexing {} ({})", document.path.display(), document.doc_type);

            let processed = match self.processor.process(document).await {
                Ok(processed) => processed,
                Err(e) if e.is_document_error() => {
                    tracing::warn!("Skipping {}: {}", document.path.display(), e);
                    report.failures.push(failure(document, &e));
                    continue;
                }
                Err(e) => return Err(e),
            };

            report.warnings.extend(
                processed
                    .warnings
                    .iter()
                    .map(|w| format!("{}: {}", document.path.display(), w)),
            );
            report.chunks += processed.chunks.len();

            match self
                .manager
                .replace_document(&document.id, &processed.chunks)
                .await
            {
                Ok(upserted) => report.upserted += upserted,
                Err(e @ RagError::IndexWrite { .. }) => {
                    if let RagError::IndexWrite { upserted, .. } = &e {
                        report.upserted += upserted;
                    }
                    tracing::warn!("Partial index of {}: {}", document.path.display(), e);
                    report.failures.push(failure(document, &e));
                }
                Err(e @ (RagError::DimensionMismatch { .. } | RagError::Config(_))) => {
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Failed to index {}: {}", document.path.display(), e);
                    report.failures.push(failure(document, &e));
                }
            }
        }

        tracing::info!(
            "Indexed {}/{} documents: {} chunks, {} records upserted",
            report.succeeded(),
            report.documents,
            report.chunks,
            report.upserted
        );
        Ok(report)
    }

    /// 검색만 수행
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<QueryResult> {
        self.manager.search(query, top_k, filter).await
    }

    /// 질문에 답변
    ///
    /// 성공한 경우에만 질문과 답변이 세션에 추가됩니다.
    pub async fn ask(
        &self,
        session: &mut Session,
        question: &str,
        filter: Option<&MetadataFilter>,
    ) -> Result<Answer> {
        let result = self.manager.search(question, self.top_k, filter).await?;
        let history = session.recent(self.prompt.config().max_history_turns);
        let payload = self.prompt.build_prompt(question, &result, &history)?;

        let generation = self.generator.generate(&payload).await?;

        session.push_user(payload.question.clone());
        session.push_assistant(generation.answer.clone());

        Ok(Answer {
            text: generation.answer,
            context_found: payload.has_context(),
            sources: generation.sources,
            model: generation.model,
        })
    }

    /// 질문에 답변하고 결과 상태로 분류
    pub async fn respond(
        &self,
        session: &mut Session,
        question: &str,
        filter: Option<&MetadataFilter>,
    ) -> QueryOutcome {
        match self.ask(session, question, filter).await {
            Ok(answer) if answer.context_found => QueryOutcome::Answered(answer),
            Ok(answer) => QueryOutcome::NoRelevantContext(answer),
            Err(e) => {
                tracing::error!("Could not answer {:?}: {}", question, e);
                QueryOutcome::CouldNotAnswer(e)
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn failure(document: &Document, error: &RagError) -> DocumentFailure {
    DocumentFailure {
        document_id: document.id.clone(),
        path: document.path.clone(),
        error: error.to_string(),
    }
}

/// 설정된 벡터 저장소 열기
///
/// LanceDB를 열 수 없으면 경고 후 인메모리 저장소를 사용합니다.
/// 반환값의 두 번째 값은 대체 여부입니다.
pub async fn open_vector_store(
    config: &RagConfig,
    dimension: usize,
) -> (Arc<dyn VectorStore>, bool) {
    match config.vector_backend {
        VectorBackend::Memory => (Arc::new(InMemoryVectorStore::new(dimension)), false),
        VectorBackend::Lance => match LanceVectorStore::open(&config.lance_path(), dimension).await
        {
            Ok(store) => (Arc::new(store), false),
            Err(e) => {
                tracing::warn!(
                    "LanceDB unavailable at {:?}, falling back to in-memory store: {:#}",
                    config.lance_path(),
                    e
                );
                (Arc::new(InMemoryVectorStore::new(dimension)), true)
            }
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
