//! Text Chunking Module
//!
//! 정제된 텍스트를 겹치는 고정 크기 청크로 나눕니다.
//! 크기와 오버랩은 문자(char) 단위입니다.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 인접 청크 간 오버랩 (문자 수)
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 100,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// 이력서처럼 짧은 문서용 설정
    pub fn compact() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }

    /// 설정 검증 (overlap < chunk_size)
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be greater than 0".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::Config(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 원문 내 청크 구간
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// 청크 텍스트
    pub text: String,
    /// 원문 내 시작 위치 (문자 오프셋)
    pub start: usize,
    /// 청크 길이 (문자 수)
    pub char_len: usize,
    /// 이전 청크와 겹치는 문자 수
    pub overlap_prev: usize,
}

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 청크로 분할
    fn chunk(&self, text: &str) -> Vec<ChunkSpan>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// SlidingWindowChunker
// ============================================================================

/// 슬라이딩 윈도우 청커
///
/// 남은 텍스트가 `chunk_size`보다 길면 윈도우 끝에서 가장 가까운 공백까지
/// 뒤로 물러나 자르고, 다음 청크는 자른 지점보다 `overlap`만큼 앞에서
/// 시작합니다. 오버랩을 제거하고 이어 붙이면 원문이 그대로 복원됩니다.
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    config: ChunkConfig,
}

impl SlidingWindowChunker {
    /// 설정으로 생성
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 기본 설정으로 생성
    pub fn with_defaults() -> Self {
        Self {
            config: ChunkConfig::default(),
        }
    }

    /// 자를 위치 찾기
    ///
    /// `(start + overlap, window_end]` 구간에서 뒤에서부터 공백(또는 텍스트 끝)을
    /// 찾습니다. 구간 하한 덕분에 다음 시작 위치는 항상 앞으로 전진합니다.
    /// 공백이 없으면(윈도우보다 긴 단어) 윈도우 끝에서 자릅니다.
    fn find_cut(&self, chars: &[char], start: usize, window_end: usize) -> usize {
        let lower = start + self.config.overlap;
        (lower + 1..=window_end)
            .rev()
            .find(|&p| p == chars.len() || chars[p].is_whitespace())
            .unwrap_or(window_end)
    }
}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, text: &str) -> Vec<ChunkSpan> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let size = self.config.chunk_size;

        if len == 0 {
            return vec![];
        }

        let mut spans = Vec::new();
        let mut start = 0;
        let mut overlap_prev = 0;

        while len - start > size {
            let end = self.find_cut(&chars, start, start + size);

            spans.push(ChunkSpan {
                text: chars[start..end].iter().collect(),
                start,
                char_len: end - start,
                overlap_prev,
            });

            start = end - self.config.overlap;
            overlap_prev = self.config.overlap;
        }

        spans.push(ChunkSpan {
            text: chars[start..].iter().collect(),
            start,
            char_len: len - start,
            overlap_prev,
        });

        spans
    }

    fn name(&self) -> &'static str {
        "SlidingWindowChunker"
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// 기본 청커 생성
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(SlidingWindowChunker::with_defaults())
}

/// 설정을 지정한 청커 생성
pub fn sliding_window_chunker(config: ChunkConfig) -> Result<Box<dyn Chunker>> {
    Ok(Box::new(SlidingWindowChunker::new(config)?))
}

// ============================================================================
// Tests
// ============================================================================
