//! 공개 API를 통한 파이프라인 통합 테스트
//!
//! 네트워크 없이 해싱 임베딩, 인메모리 저장소, mock 모델로 실행합니다.

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use whoami_rag::{
    sliding_window_chunker, Chunk, ChunkConfig, Document, DocumentProcessor, EmbeddingManager,
    GenerationClient, GenerationConfig, HashingEmbedding, InMemoryVectorStore, MetadataFilter,
    MockModel, PromptBuilder, PromptConfig, PromptTemplates, QueryResult, RagAssistant,
    RetrievalConfig, Session,
};

const DIM: usize = 128;

// ============================================================================
// Helper Functions
// ============================================================================

fn manager() -> EmbeddingManager {
    let embedder = Arc::new(HashingEmbedding::new(DIM).unwrap());
    let store = Arc::new(InMemoryVectorStore::new(DIM));
    EmbeddingManager::new(embedder, store, RetrievalConfig::default()).unwrap()
}

fn assistant() -> RagAssistant {
    let processor = DocumentProcessor::new(
        sliding_window_chunker(ChunkConfig::compact()).unwrap(),
        true,
    );
    let prompt = PromptBuilder::new(PromptTemplates::default(), PromptConfig::default());
    let generation = GenerationConfig {
        mock: true,
        ..GenerationConfig::default()
    };
    let generator = GenerationClient::new(Arc::new(MockModel::new()), generation);
    RagAssistant::new(processor, manager(), prompt, generator)
}

fn write(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn processed_chunks(path: &Path, doc_type: &str, text: &str) -> Vec<Chunk> {
    let processor = DocumentProcessor::new(
        sliding_window_chunker(ChunkConfig::default()).unwrap(),
        false,
    );
    processor
        .process_text(&Document::new(path, doc_type), text)
        .chunks
}

const RESUME: &str = "Alec Morgan is a data engineer based in Lisbon.\n\
I have 5 years of experience in data engineering, mostly with Python and Rust.\n\
Built streaming pipelines on Kafka and Spark for a logistics company.\n\
Holds a master's degree in computer science.";

const COVER_LETTER: &str = "Dear hiring manager,\n\
I am excited to apply for the platform engineering role at your company.\n\
My favourite part of the job is mentoring junior engineers.";

// ============================================================================
// Tests
// ============================================================================

#[test]
fn three_thousand_chars_make_four_reconstructable_chunks() {
    let text: String = (0..3000)
        .map(|i| char::from(b'a' + (i % 26) as u8))
        .collect();

    let chunks = processed_chunks(Path::new("long.txt"), "notes", &text);
    assert_eq!(chunks.len(), 4);
    assert!(chunks.iter().all(|c| c.char_len <= 1000));

    let mut rebuilt = String::new();
    for chunk in &chunks {
        rebuilt.extend(chunk.text.chars().skip(chunk.overlap_prev));
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn short_document_is_a_single_chunk() {
    let chunks = processed_chunks(Path::new("bio.md"), "notes", "Likes hiking and chess.");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Likes hiking and chess.");
}

#[tokio::test]
async fn search_on_empty_index_is_empty() {
    let result = manager().search("anything at all", 5, None).await.unwrap();
    assert!(result.is_empty());
}

#[tokio::test]
async fn doc_type_filter_excludes_other_types() {
    let manager = manager();
    let chunks = processed_chunks(Path::new("resume.md"), "resume", RESUME);
    manager.index(&chunks).await.unwrap();

    let filter = MetadataFilter::doc_type("cover-letter");
    let result = manager
        .search("years of experience", 5, Some(&filter))
        .await
        .unwrap();
    assert!(result.is_empty());

    let filter = MetadataFilter::doc_type("resume");
    let result = manager
        .search("years of experience", 5, Some(&filter))
        .await
        .unwrap();
    assert!(!result.is_empty());
}

#[tokio::test]
async fn search_scores_are_non_increasing_and_bounded() {
    let dir = TempDir::new().unwrap();
    let assistant = assistant();
    let documents = vec![
        Document::new(write(&dir, "resume.md", RESUME), "resume"),
        Document::new(write(&dir, "letter.txt", COVER_LETTER), "cover-letter"),
    ];
    assistant.index_documents(&documents).await.unwrap();

    let result = assistant.search("engineering experience", 2, None).await.unwrap();
    assert!(result.len() <= 2);
    assert!(result
        .hits
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
}

#[tokio::test]
async fn reindexing_keeps_one_record_per_chunk() {
    let dir = TempDir::new().unwrap();
    let assistant = assistant();
    let documents = vec![Document::new(write(&dir, "resume.md", RESUME), "resume")];

    let first = assistant.index_documents(&documents).await.unwrap();
    let count = assistant.manager().count().await.unwrap();
    assert_eq!(count, first.chunks);

    assistant.index_documents(&documents).await.unwrap();
    assert_eq!(assistant.manager().count().await.unwrap(), count);
}

#[tokio::test]
async fn reindexing_a_shrunk_document_drops_stale_chunks() {
    let dir = TempDir::new().unwrap();
    let assistant = assistant();
    let long_text = (0..120)
        .map(|i| format!("skill{:03}", i))
        .collect::<Vec<_>>()
        .join(" ");
    let path = write(&dir, "notes.md", &long_text);
    let documents = vec![Document::new(&path, "notes")];

    let first = assistant.index_documents(&documents).await.unwrap();
    assert!(first.chunks >= 3);
    assert_eq!(assistant.manager().count().await.unwrap(), first.chunks);

    std::fs::write(&path, "Only one short line now.").unwrap();
    let second = assistant.index_documents(&documents).await.unwrap();
    assert_eq!(second.chunks, 1);
    assert_eq!(assistant.manager().count().await.unwrap(), 1);

    let result = assistant.search("skill100", 5, None).await.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.hits[0].record.metadata.text, "Only one short line now.");
}

#[tokio::test]
async fn mock_answer_cites_the_experience_chunk() {
    let dir = TempDir::new().unwrap();
    let assistant = assistant();
    let resume = Document::new(write(&dir, "resume.md", RESUME), "resume");
    assistant
        .index_documents(&[resume.clone()])
        .await
        .unwrap();

    let question = "How many years of experience?";
    let mut session = assistant.new_session();
    let answer = assistant.ask(&mut session, question, None).await.unwrap();

    assert!(answer.context_found);
    assert_eq!(answer.model, "mock");
    assert_eq!(
        answer.text,
        "Based on the available documents: \
         I have 5 years of experience in data engineering, mostly with Python and Rust."
    );
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].document_id, resume.id);
    assert_eq!(answer.sources[0].doc_type, "resume");

    let experience_chunk = DocumentProcessor::new(
        sliding_window_chunker(ChunkConfig::compact()).unwrap(),
        true,
    )
    .process_text(&resume, RESUME)
    .chunks
    .into_iter()
    .find(|c| c.text.contains("5 years of experience"))
    .unwrap();
    assert!(answer.sources[0].chunk_ids.contains(&experience_chunk.id));

    // 같은 질문은 같은 답변
    let mut fresh = assistant.new_session();
    let again = assistant.ask(&mut fresh, question, None).await.unwrap();
    assert_eq!(again, answer);
}

#[test]
fn prompt_uses_only_the_most_recent_history() {
    let config = PromptConfig {
        max_history_turns: 10,
        ..PromptConfig::default()
    };
    let builder = PromptBuilder::new(PromptTemplates::default(), config);

    let mut session = Session::new(20);
    for i in 0..10 {
        session.push_user(format!("question {}", i));
        session.push_assistant(format!("answer {}", i));
    }
    assert_eq!(session.len(), 20);

    let history = session.recent(session.len());
    let payload = builder
        .build_prompt("What next?", &QueryResult::new(vec![]), &history)
        .unwrap();

    assert_eq!(payload.history.len(), 10);
    assert_eq!(payload.history[..], history[10..]);
    assert_eq!(payload.history[0].text, "question 5");
    assert_eq!(payload.history[9].text, "answer 9");
}
