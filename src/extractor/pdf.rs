//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;

/// PDF에서 텍스트 추출
///
/// 페이지별로 텍스트를 추출하여 (페이지 번호, 텍스트) 튜플 벡터로 반환합니다.
/// 페이지 번호는 1부터 시작합니다.
pub fn extract_text_from_pdf(path: &Path) -> Result<Vec<(usize, String)>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read PDF: {:?}", path))?;

    let text = pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("Failed to extract text from PDF: {:?}", path))?;

    if text.trim().is_empty() {
        tracing::warn!(
            "No text extracted from PDF: {:?}. It might be a scanned document.",
            path
        );
        return Ok(vec![(1, String::new())]);
    }

    Ok(split_pdf_pages(&text)
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i + 1, text))
        .collect())
}

/// PDF를 텍스트 파일로 변환
///
/// 페이지 사이에는 빈 줄을 넣습니다. 기록한 문자 수를 반환합니다.
pub fn convert_pdf_to_text(pdf_path: &Path, output_path: &Path) -> Result<usize> {
    let pages = extract_text_from_pdf(pdf_path)?;

    let mut text = String::new();
    for (_, page) in pages {
        text.push_str(&page);
        text.push_str("\n\n");
    }

    std::fs::write(output_path, &text)
        .with_context(|| format!("Failed to write text file: {:?}", output_path))?;

    Ok(text.chars().count())
}

/// 페이지 구분자 패턴 (예: "--- Page 1 ---")
fn page_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[\s]*[-=]+[\s]*(?:Page[\s]*)?(\d+)[\s]*[-=]+[\s]*$")
            .expect("page marker regex is valid")
    })
}

/// PDF 텍스트를 페이지별로 분리
fn split_pdf_pages(text: &str) -> Vec<String> {
    // 폼피드 문자 (\x0c)로 페이지 분리 시도
    let pages: Vec<String> = text
        .split('\x0c')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if pages.len() > 1 {
        return pages;
    }

    let pattern = page_marker();
    if pattern.is_match(text) {
        let pages: Vec<String> = pattern
            .split(text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if pages.len() > 1 {
            return pages;
        }
    }

    vec![text.to_string()]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_pdf_pages_with_formfeed() {
        let text = "Experience\x0cEducation\x0cSkills";
        let pages = split_pdf_pages(text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "Experience");
        assert_eq!(pages[2], "Skills");
    }

    #[test]
    fn test_split_pdf_pages_with_marker() {
        let text = "Summary\n--- Page 2 ---\nProjects";
        let pages = split_pdf_pages(text);
        assert_eq!(pages, vec!["Summary".to_string(), "Projects".to_string()]);
    }

    #[test]
    fn test_split_pdf_pages_no_separator() {
        let pages = split_pdf_pages("Just one page of resume text");
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        assert!(extract_text_from_pdf(&path).is_err());
    }
}
