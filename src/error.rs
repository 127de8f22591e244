//! 에러 타입 정의
//!
//! 파이프라인 각 컴포넌트의 실패를 구분하는 에러 분류입니다.
//! 외부 프로바이더 구현(HTTP, LanceDB)은 내부적으로 `anyhow`를 사용하고,
//! 컴포넌트 경계에서 이 타입으로 변환됩니다.

use std::path::PathBuf;

use thiserror::Error;

/// 파이프라인 결과 타입
pub type Result<T> = std::result::Result<T, RagError>;

/// RAG 파이프라인 에러
#[derive(Debug, Error)]
pub enum RagError {
    /// 지원하지 않는 파일 확장자
    #[error("unsupported document format '{extension}': {path:?}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// 파일을 읽을 수 없거나 손상됨
    #[error("failed to extract text from {path:?}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// 임베딩 프로바이더 실패 또는 잘못된 벡터
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// 임베딩 차원 불일치 (설정 오류, 재시도 대상 아님)
    #[error("embedding dimension mismatch: index expects {expected}, provider produced {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// 벡터 저장소 쓰기 거부
    #[error("index write failed for {} record(s) ({upserted} upserted): {message}", failed_ids.len())]
    IndexWrite {
        failed_ids: Vec<String>,
        upserted: usize,
        message: String,
    },

    /// 벡터 저장소 검색 실패
    #[error("search failed: {0}")]
    Search(String),

    /// 최소 프롬프트(최상위 청크 + 질문)조차 예산 초과
    #[error("prompt budget exceeded: need {required} chars, budget is {budget}")]
    PromptBudgetExceeded { required: usize, budget: usize },

    /// 언어 모델 백엔드 실패
    #[error("generation failed after {attempts} attempt(s): {message}")]
    Generation { message: String, attempts: u32 },

    /// 잘못된 설정
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RagError {
    /// 문서 단위로 격리 가능한 입력 문서 에러인지 여부
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            RagError::UnsupportedFormat { .. } | RagError::Extraction { .. }
        )
    }

    /// 사용자에게 보여줄 짧은 메시지
    pub fn user_message(&self) -> &'static str {
        match self {
            RagError::UnsupportedFormat { .. } | RagError::Extraction { .. } => {
                "The document could not be read."
            }
            RagError::Embedding(_) | RagError::Search(_) | RagError::IndexWrite { .. } => {
                "The document index is currently unavailable."
            }
            RagError::DimensionMismatch { .. } | RagError::Config(_) => {
                "The assistant is misconfigured."
            }
            RagError::PromptBudgetExceeded { .. } => "The question is too long to answer.",
            RagError::Generation { .. } => "The language model could not produce an answer.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_errors() {
        let err = RagError::UnsupportedFormat {
            path: PathBuf::from("photo.png"),
            extension: "png".to_string(),
        };
        assert!(err.is_document_error());
        assert!(err.to_string().contains("png"));

        let err = RagError::Search("connection refused".to_string());
        assert!(!err.is_document_error());
    }

    #[test]
    fn test_index_write_message() {
        let err = RagError::IndexWrite {
            failed_ids: vec!["a:0".to_string(), "a:1".to_string()],
            upserted: 3,
            message: "rejected".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "index write failed for 2 record(s) (3 upserted): rejected"
        );
    }
}
