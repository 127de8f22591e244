//! 설정 모듈
//!
//! 기본값 위에 `WHOAMI_*` 환경변수를 덮어써서 `RagConfig`를 만듭니다.
//! API 키는 각 프로바이더가 직접 환경변수에서 읽습니다.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::generation::GenerationConfig;
use crate::knowledge::ChunkConfig;
use crate::prompt::PromptConfig;

/// 데이터 디렉토리 경로
///
/// 우선순위: 로컬 데이터 디렉토리 > 홈 디렉토리 > 현재 디렉토리
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".whoami-rag")
}

// ============================================================================
// Backend Selection
// ============================================================================

/// 임베딩 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Gemini API
    Gemini,
    /// 로컬 feature hashing
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "hashing" | "local" => Ok(Self::Hashing),
            other => Err(RagError::Config(format!("unknown embedding backend '{}'", other))),
        }
    }
}

/// 벡터 저장소 백엔드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// LanceDB (영속)
    Lance,
    /// 인메모리 (세션 한정)
    Memory,
}

impl FromStr for VectorBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lance" | "lancedb" => Ok(Self::Lance),
            "memory" => Ok(Self::Memory),
            other => Err(RagError::Config(format!("unknown vector backend '{}'", other))),
        }
    }
}

// ============================================================================
// Retrieval Config
// ============================================================================

/// 검색/인덱싱 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// 기본 검색 결과 수
    pub top_k: usize,
    /// upsert 배치 크기
    pub batch_size: usize,
    /// 동시 임베딩 요청 수
    pub embed_concurrency: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            batch_size: 100,
            embed_concurrency: 4,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be greater than 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(RagError::Config("batch_size must be greater than 0".to_string()));
        }
        if self.embed_concurrency == 0 {
            return Err(RagError::Config(
                "embed_concurrency must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// RagConfig
// ============================================================================

/// 전체 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagConfig {
    /// 데이터 디렉토리 (LanceDB 인덱스 위치)
    pub data_dir: PathBuf,
    pub chunk: ChunkConfig,
    /// 머리글/바닥글 제거 여부
    pub remove_boilerplate: bool,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub generation: GenerationConfig,
    pub embedding_backend: EmbeddingBackend,
    pub embedding_dimension: usize,
    pub vector_backend: VectorBackend,
    /// 세션에 보관할 최대 대화 턴 수
    pub session_turns: usize,
    /// 프롬프트 템플릿 JSON 파일
    pub prompts_file: Option<PathBuf>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            data_dir: get_data_dir(),
            chunk: ChunkConfig::default(),
            remove_boilerplate: true,
            retrieval: RetrievalConfig::default(),
            prompt: PromptConfig::default(),
            generation: GenerationConfig::default(),
            embedding_backend: EmbeddingBackend::Gemini,
            embedding_dimension: crate::embedding::DEFAULT_DIMENSION,
            vector_backend: VectorBackend::Lance,
            session_turns: 20,
            prompts_file: None,
        }
    }
}

impl RagConfig {
    /// 기본값 + `WHOAMI_*` 환경변수
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정 생성
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = get("WHOAMI_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = parse_var(&get, "WHOAMI_CHUNK_SIZE")? {
            config.chunk.chunk_size = v;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_CHUNK_OVERLAP")? {
            config.chunk.overlap = v;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_REMOVE_BOILERPLATE")? {
            config.remove_boilerplate = v;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_TOP_K")? {
            config.retrieval.top_k = v;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_BATCH_SIZE")? {
            config.retrieval.batch_size = v;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_EMBED_CONCURRENCY")? {
            config.retrieval.embed_concurrency = v;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_MAX_CONTEXT_CHARS")? {
            config.prompt.max_context_chars = v;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_MAX_PROMPT_CHARS")? {
            config.prompt.max_prompt_chars = v;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_MAX_HISTORY")? {
            config.prompt.max_history_turns = v;
        }
        if let Some(model) = get("WHOAMI_MODEL") {
            config.generation.model = model;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_MAX_TOKENS")? {
            config.generation.max_tokens = v;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_TEMPERATURE")? {
            config.generation.temperature = v;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_MOCK_LLM")? {
            config.generation.mock = v;
        }
        if let Some(v) = get("WHOAMI_EMBEDDING") {
            config.embedding_backend = v.parse()?;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_EMBEDDING_DIM")? {
            config.embedding_dimension = v;
        }
        if let Some(v) = get("WHOAMI_VECTOR_STORE") {
            config.vector_backend = v.parse()?;
        }
        if let Some(v) = parse_var(&get, "WHOAMI_SESSION_TURNS")? {
            config.session_turns = v;
        }
        if let Some(path) = get("WHOAMI_PROMPTS_FILE") {
            config.prompts_file = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// 설정 일관성 검증
    pub fn validate(&self) -> Result<()> {
        self.chunk.validate()?;
        self.retrieval.validate()?;
        self.prompt.validate()?;
        self.generation.validate()?;

        if self.embedding_dimension == 0 {
            return Err(RagError::Config(
                "embedding_dimension must be greater than 0".to_string(),
            ));
        }
        if self.session_turns == 0 {
            return Err(RagError::Config(
                "session_turns must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// LanceDB 인덱스 경로
    pub fn lance_path(&self) -> PathBuf {
        self.data_dir.join("vectors.lance")
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| RagError::Config(format!("{}={:?}: {}", key, raw, e)))
        })
        .transpose()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.chunk, ChunkConfig::default());
        assert_eq!(config.generation.max_tokens, 500);
        assert_eq!(config.prompt.max_history_turns, 6);
        assert!(config.lance_path().ends_with("vectors.lance"));
    }

    #[test]
    fn test_env_overrides() {
        let config = RagConfig::from_lookup(lookup(&[
            ("WHOAMI_TOP_K", "3"),
            ("WHOAMI_CHUNK_SIZE", "500"),
            ("WHOAMI_CHUNK_OVERLAP", "50"),
            ("WHOAMI_MOCK_LLM", "true"),
            ("WHOAMI_EMBEDDING", "hashing"),
            ("WHOAMI_VECTOR_STORE", "memory"),
            ("WHOAMI_DATA_DIR", "/tmp/whoami"),
        ]))
        .unwrap();

        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.chunk, ChunkConfig::compact());
        assert!(config.generation.mock);
        assert_eq!(config.embedding_backend, EmbeddingBackend::Hashing);
        assert_eq!(config.vector_backend, VectorBackend::Memory);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/whoami"));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = RagConfig::from_lookup(lookup(&[("WHOAMI_TOP_K", "many")])).unwrap_err();
        assert!(matches!(err, RagError::Config(ref msg) if msg.contains("WHOAMI_TOP_K")));

        let err = RagConfig::from_lookup(lookup(&[("WHOAMI_TOP_K", "0")])).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));

        let err = RagConfig::from_lookup(lookup(&[("WHOAMI_CHUNK_OVERLAP", "1000")])).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));

        assert!(RagConfig::from_lookup(lookup(&[("WHOAMI_VECTOR_STORE", "redis")])).is_err());
    }
}
