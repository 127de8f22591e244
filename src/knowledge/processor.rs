//! Document Processor
//!
//! 추출 → 정제 → 청킹을 묶어 문서 하나를 임베딩 가능한 청크 목록으로 바꿉니다.
//! 네트워크나 인덱스에는 접근하지 않습니다.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::collector::FileType;
use crate::error::Result;
use crate::extractor::ContentExtractor;

use super::chunker::{default_chunker, Chunker};
use super::cleaner::clean_text;

/// 문서 타입 태그 기본값
pub const DEFAULT_DOC_TYPE: &str = "general";

// ============================================================================
// Types
// ============================================================================

/// 인덱싱 대상 원본 문서
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// 경로에서 결정적으로 생성된 문서 ID
    pub id: String,
    /// 원본 파일 경로
    pub path: PathBuf,
    /// 문서 타입 태그 (예: "resume", "cover-letter")
    pub doc_type: String,
}

impl Document {
    /// 경로와 타입 태그로 문서 생성
    ///
    /// ID는 파일 이름과 경로의 SHA-256 앞 8자리로 만들어지므로
    /// 같은 파일을 다시 인덱싱하면 같은 청크 ID가 나옵니다.
    pub fn new(path: impl Into<PathBuf>, doc_type: impl Into<String>) -> Self {
        let path = path.into();
        let doc_type = doc_type.into();
        let doc_type = if doc_type.trim().is_empty() {
            DEFAULT_DOC_TYPE.to_string()
        } else {
            doc_type.trim().to_string()
        };

        Self {
            id: document_id(&path),
            path,
            doc_type,
        }
    }

    /// 표시용 파일 이름
    pub fn source_name(&self) -> String {
        source_name(&self.path)
    }
}

/// 문서의 연속 구간 (임베딩/검색 단위)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document_id}:{index}`
    pub id: String,
    pub document_id: String,
    pub doc_type: String,
    pub source_path: String,
    /// 문서 내 순번 (0부터)
    pub index: usize,
    pub text: String,
    /// 문자 수
    pub char_len: usize,
    /// 이전 청크와 겹치는 문자 수
    pub overlap_prev: usize,
}

impl Chunk {
    pub fn chunk_id(document_id: &str, index: usize) -> String {
        format!("{}:{}", document_id, index)
    }
}

/// 문서 처리 결과
#[derive(Debug, Clone, Default)]
pub struct ProcessedDocument {
    pub chunks: Vec<Chunk>,
    /// 추출/정제 중 발생한 비치명적 경고
    pub warnings: Vec<String>,
}

// ============================================================================
// DocumentProcessor
// ============================================================================

/// 문서 처리기
pub struct DocumentProcessor {
    extractor: ContentExtractor,
    chunker: Box<dyn Chunker>,
    remove_boilerplate: bool,
}

impl DocumentProcessor {
    pub fn new(chunker: Box<dyn Chunker>, remove_boilerplate: bool) -> Self {
        Self {
            extractor: ContentExtractor::new(),
            chunker,
            remove_boilerplate,
        }
    }

    /// 기본 청커 + 머리글/바닥글 제거
    pub fn with_defaults() -> Self {
        Self::new(default_chunker(), true)
    }

    /// 파일에서 텍스트를 추출하여 청크 생성
    pub async fn process(&self, document: &Document) -> Result<ProcessedDocument> {
        let extracted = self.extractor.extract(&document.path).await?;

        // 머리글/바닥글은 여러 페이지 PDF에만 존재
        let strip = self.remove_boilerplate
            && extracted.file_type == FileType::Pdf
            && extracted.page_count.map_or(false, |pages| pages > 1);
        let mut processed = self.clean_and_chunk(document, &extracted.text, strip);
        let mut warnings = extracted.warnings;
        warnings.append(&mut processed.warnings);
        processed.warnings = warnings;

        tracing::debug!(
            "Processed {} ({:?}, pages={:?}) into {} chunks with {}",
            document.id,
            extracted.file_type,
            extracted.page_count,
            processed.chunks.len(),
            self.chunker.name()
        );

        Ok(processed)
    }

    /// 이미 추출된 일반 텍스트를 정제하고 청킹 (머리글/바닥글 제거 없음)
    pub fn process_text(&self, document: &Document, raw: &str) -> ProcessedDocument {
        self.clean_and_chunk(document, raw, false)
    }

    fn clean_and_chunk(&self, document: &Document, raw: &str, strip: bool) -> ProcessedDocument {
        let cleaned = clean_text(raw, strip);
        let mut warnings = cleaned.warnings;

        for warning in &warnings {
            tracing::warn!("{}: {}", document.path.display(), warning);
        }

        let source_path = document.path.display().to_string();
        let chunks: Vec<Chunk> = self
            .chunker
            .chunk(&cleaned.text)
            .into_iter()
            .enumerate()
            .map(|(index, span)| Chunk {
                id: Chunk::chunk_id(&document.id, index),
                document_id: document.id.clone(),
                doc_type: document.doc_type.clone(),
                source_path: source_path.clone(),
                index,
                text: span.text,
                char_len: span.char_len,
                overlap_prev: span.overlap_prev,
            })
            .collect();

        if chunks.is_empty() {
            let warning = "document produced no chunks".to_string();
            tracing::warn!("{}: {}", document.path.display(), warning);
            warnings.push(warning);
        }

        ProcessedDocument { chunks, warnings }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 경로에서 문서 ID 생성 (`{file_stem}-{sha256 앞 8자리}`)
fn document_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document")
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect::<String>();

    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let hash = format!("{:x}", digest);

    format!("{}-{}", stem, &hash[..8])
}

/// 경로에서 파일 이름 추출
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::chunker::{sliding_window_chunker, ChunkConfig};
    use tempfile::TempDir;

    fn processor(size: usize, overlap: usize) -> DocumentProcessor {
        let chunker = sliding_window_chunker(ChunkConfig::new(size, overlap).unwrap()).unwrap();
        DocumentProcessor::new(chunker, false)
    }

    #[test]
    fn test_document_id_is_stable() {
        let a = Document::new("/data/resume.pdf", "resume");
        let b = Document::new("/data/resume.pdf", "resume");
        let c = Document::new("/other/resume.pdf", "resume");

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert!(a.id.starts_with("resume-"));
        assert_eq!(a.source_name(), "resume.pdf");
    }

    #[test]
    fn test_empty_doc_type_defaults() {
        let doc = Document::new("notes.md", "  ");
        assert_eq!(doc.doc_type, DEFAULT_DOC_TYPE);
    }

    #[test]
    fn test_short_document_single_chunk_equals_cleaned_text() {
        let doc = Document::new("/data/bio.txt", "bio");
        let processed = processor(200, 20).process_text(&doc, "  Alec   builds\n data platforms. ");

        assert_eq!(processed.chunks.len(), 1);
        let chunk = &processed.chunks[0];
        assert_eq!(chunk.text, "Alec builds data platforms.");
        assert_eq!(chunk.overlap_prev, 0);
        assert_eq!(chunk.id, format!("{}:0", doc.id));
        assert_eq!(chunk.doc_type, "bio");
    }

    #[test]
    fn test_chunks_carry_metadata() {
        let doc = Document::new("/data/resume.md", "resume");
        let text = "word ".repeat(100);
        let processed = processor(60, 10).process_text(&doc, &text);

        assert!(processed.chunks.len() > 1);
        for (i, chunk) in processed.chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.document_id, doc.id);
            assert_eq!(chunk.source_path, "/data/resume.md");
            assert!(chunk.char_len <= 60);
        }
    }

    #[test]
    fn test_empty_document_warns() {
        let doc = Document::new("/data/empty.txt", "general");
        let processed = processor(100, 10).process_text(&doc, "   ");
        assert!(processed.chunks.is_empty());
        assert_eq!(processed.warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_process_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cover_letter.md");
        std::fs::write(&path, "# Cover Letter\n\nI have 5 years of experience.").unwrap();

        let doc = Document::new(&path, "cover-letter");
        let processed = DocumentProcessor::with_defaults().process(&doc).await.unwrap();

        assert_eq!(processed.chunks.len(), 1);
        assert!(processed.chunks[0].text.contains("5 years of experience"));
    }

    #[tokio::test]
    async fn test_text_file_keeps_number_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timeline.txt");
        let text = "Joined Acme\n2019\x0cLed platform team\n2\x0cMoved to Lisbon\n3";
        std::fs::write(&path, text).unwrap();

        let doc = Document::new(&path, "notes");
        let processed = DocumentProcessor::with_defaults().process(&doc).await.unwrap();

        assert_eq!(
            processed.chunks[0].text,
            "Joined Acme 2019 Led platform team 2 Moved to Lisbon 3"
        );
        assert!(processed.warnings.is_empty());
    }
}
