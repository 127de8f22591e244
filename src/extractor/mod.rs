//! 콘텐츠 추출 모듈
//!
//! 문서 형식별로 원문 텍스트를 추출합니다.
//! - 텍스트/마크다운: 직접 읽기 (잘못된 UTF-8은 경고와 함께 손실 변환)
//! - PDF: pdf-extract로 텍스트 추출

pub mod pdf;

use std::path::Path;

use crate::collector::FileType;
use crate::error::{RagError, Result};
use crate::knowledge::PAGE_BREAK;

// ============================================================================
// Extracted Text
// ============================================================================

/// 추출된 원문
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// 추출된 텍스트 (정제 전)
    pub text: String,
    /// 원본 파일 타입
    pub file_type: FileType,
    /// PDF 페이지 수
    pub page_count: Option<usize>,
    /// 추출 중 발생한 경고
    pub warnings: Vec<String>,
}

// ============================================================================
// Content Extractor
// ============================================================================

/// 형식별 텍스트 추출기
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentExtractor;

impl ContentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 파일 확장자로 형식을 판별하여 텍스트 추출
    pub async fn extract(&self, path: &Path) -> Result<ExtractedText> {
        let file_type = FileType::from_path(path).ok_or_else(|| RagError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string(),
        })?;

        match file_type {
            FileType::Text | FileType::Markdown => self.extract_text(path, file_type).await,
            FileType::Pdf => self.extract_pdf(path).await,
        }
    }

    /// 텍스트/마크다운 파일에서 추출
    async fn extract_text(&self, path: &Path, file_type: FileType) -> Result<ExtractedText> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RagError::Extraction {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut warnings = Vec::new();
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                let warning = format!(
                    "{:?} is not valid UTF-8 (first bad byte at {}); invalid sequences replaced",
                    path,
                    e.utf8_error().valid_up_to()
                );
                tracing::warn!("{}", warning);
                warnings.push(warning);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        Ok(ExtractedText {
            text,
            file_type,
            page_count: None,
            warnings,
        })
    }

    /// PDF 파일에서 추출
    async fn extract_pdf(&self, path: &Path) -> Result<ExtractedText> {
        // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
        // 손상된 PDF에서 pdf-extract가 패닉하면 JoinError로 돌아옴
        let owned = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&owned))
            .await
            .map_err(|e| RagError::Extraction {
                path: path.to_path_buf(),
                message: format!("PDF extraction task failed: {}", e),
            })?
            .map_err(|e| RagError::Extraction {
                path: path.to_path_buf(),
                message: format!("{:#}", e),
            })?;

        pdf_pages_to_text(path, pages)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 페이지들을 페이지 구분 문자로 합침 (텍스트가 없으면 추출 실패)
fn pdf_pages_to_text(path: &Path, pages: Vec<(usize, String)>) -> Result<ExtractedText> {
    let page_count = pages.len();
    let text = pages
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join(&PAGE_BREAK.to_string());

    if text.trim().is_empty() {
        return Err(RagError::Extraction {
            path: path.to_path_buf(),
            message: "no text extracted; it might be a scanned document".to_string(),
        });
    }

    Ok(ExtractedText {
        text,
        file_type: FileType::Pdf,
        page_count: Some(page_count),
        warnings: Vec::new(),
    })
}

// ============================================================================
// Tests
// ============================================================================
