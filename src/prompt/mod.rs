//! Context Assembler - 프롬프트 조립
//!
//! 검색된 청크, 최근 대화, 질문을 하나의 프롬프트로 합칩니다.
//! - 같은 청크 ID 또는 같은 본문은 한 번만 사용
//! - 문서별로 묶어서, 문서의 최고 점수 순으로 렌더링
//! - 컨텍스트 예산 초과 시 점수가 낮은 청크부터 제외
//! - 전체 예산 초과 시 오래된 대화부터 제외
//!
//! 같은 입력이면 항상 같은 페이로드가 나옵니다.

mod template;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::knowledge::{source_name, QueryResult, SearchHit};
use crate::session::ConversationTurn;

pub use template::PromptTemplates;

/// 검색 결과가 없을 때 컨텍스트 자리에 넣는 문구
pub const NO_CONTEXT_PLACEHOLDER: &str = "(no relevant documents found)";

// ============================================================================
// Configuration
// ============================================================================

/// 프롬프트 크기 예산 (문자 수)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptConfig {
    /// 렌더링된 컨텍스트 최대 길이
    pub max_context_chars: usize,
    /// 시스템 + 대화 + 사용자 메시지 전체 최대 길이
    pub max_prompt_chars: usize,
    /// 프롬프트에 포함할 최대 대화 턴 수
    pub max_history_turns: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 6000,
            max_prompt_chars: 12000,
            max_history_turns: 6,
        }
    }
}

impl PromptConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_context_chars == 0 || self.max_prompt_chars == 0 {
            return Err(RagError::Config(
                "prompt budgets must be greater than 0".to_string(),
            ));
        }
        if self.max_context_chars > self.max_prompt_chars {
            return Err(RagError::Config(format!(
                "max_context_chars ({}) exceeds max_prompt_chars ({})",
                self.max_context_chars, self.max_prompt_chars
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Payload
// ============================================================================

/// 답변에 사용된 문서 출처
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub document_id: String,
    pub source_path: String,
    pub doc_type: String,
    /// 컨텍스트에 들어간 청크 ID (렌더링 순서)
    pub chunk_ids: Vec<String>,
    /// 문서 내 최고 점수
    pub score: f32,
}

impl SourceAttribution {
    /// 표시용 파일 이름
    pub fn name(&self) -> String {
        source_name(std::path::Path::new(&self.source_path))
    }
}

/// 한 요청 동안만 존재하는 프롬프트
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPayload {
    pub system: String,
    /// 렌더링된 컨텍스트 섹션
    pub context: String,
    /// 포함된 대화 턴 (오래된 순)
    pub history: Vec<ConversationTurn>,
    pub question: String,
    /// 템플릿에 컨텍스트와 질문을 채운 최종 사용자 메시지
    pub user_message: String,
    pub sources: Vec<SourceAttribution>,
}

impl PromptPayload {
    /// 컨텍스트에 검색 결과가 하나라도 들어갔는지
    pub fn has_context(&self) -> bool {
        !self.sources.is_empty()
    }

    /// 전체 문자 수 (예산 계산 기준)
    pub fn char_len(&self) -> usize {
        prompt_len(&self.system, &self.history, &self.user_message)
    }
}

// ============================================================================
// PromptBuilder
// ============================================================================

/// 프롬프트 조립기
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    templates: PromptTemplates,
    config: PromptConfig,
}

impl PromptBuilder {
    pub fn new(templates: PromptTemplates, config: PromptConfig) -> Self {
        Self { templates, config }
    }

    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// 질문, 검색 결과, 대화 기록으로 프롬프트 생성
    ///
    /// 최상위 청크 하나와 질문만으로도 전체 예산을 넘으면
    /// `PromptBudgetExceeded`를 반환합니다.
    pub fn build_prompt(
        &self,
        question: &str,
        result: &QueryResult,
        history: &[ConversationTurn],
    ) -> Result<PromptPayload> {
        let question = question.trim();
        let candidates = dedupe(&result.hits);

        // 점수 순 prefix 중 컨텍스트 예산에 맞는 가장 긴 것 (최상위 청크는 항상 포함)
        let mut selected = candidates.len().min(1);
        while selected < candidates.len()
            && render_context(&candidates[..=selected]).chars().count()
                <= self.config.max_context_chars
        {
            selected += 1;
        }

        let skip = history.len().saturating_sub(self.config.max_history_turns);
        let mut turns: Vec<ConversationTurn> = history[skip..].to_vec();
        let window = turns.len();

        loop {
            let context = render_context(&candidates[..selected]);
            let user_message = self.templates.fill(&context, question);
            let total = prompt_len(&self.templates.system_prompt, &turns, &user_message);

            if total <= self.config.max_prompt_chars {
                if selected < candidates.len() || turns.len() < window {
                    tracing::debug!(
                        "Prompt trimmed to {} chunk(s), {} turn(s) ({} chars)",
                        selected,
                        turns.len(),
                        total
                    );
                }
                return Ok(PromptPayload {
                    system: self.templates.system_prompt.clone(),
                    context,
                    history: turns,
                    question: question.to_string(),
                    user_message,
                    sources: attribute(&candidates[..selected]),
                });
            }

            if !turns.is_empty() {
                turns.remove(0);
            } else if selected > 1 {
                selected -= 1;
            } else {
                return Err(RagError::PromptBudgetExceeded {
                    required: total,
                    budget: self.config.max_prompt_chars,
                });
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 같은 청크 ID 또는 같은 본문 제거 (먼저 나온 = 점수가 높은 쪽 유지)
fn dedupe(hits: &[SearchHit]) -> Vec<&SearchHit> {
    let mut seen_ids = HashSet::new();
    let mut seen_texts = HashSet::new();

    let mut ordered: Vec<&SearchHit> = hits.iter().collect();
    ordered.sort_by(|a, b| b.score.total_cmp(&a.score));

    ordered
        .into_iter()
        .filter(|hit| {
            let new_id = seen_ids.insert(hit.record.id.as_str());
            let new_text = seen_texts.insert(hit.record.metadata.text.trim());
            new_id && new_text
        })
        .collect()
}

/// 문서 단위 그룹 (문서의 최고 점수 순, 문서 안에서는 청크 순번 순)
fn group_by_document<'a>(hits: &[&'a SearchHit]) -> Vec<Vec<&'a SearchHit>> {
    let mut groups: Vec<Vec<&SearchHit>> = Vec::new();

    for &hit in hits {
        match groups
            .iter_mut()
            .find(|g| g[0].record.metadata.document_id == hit.record.metadata.document_id)
        {
            Some(group) => group.push(hit),
            None => groups.push(vec![hit]),
        }
    }

    for group in &mut groups {
        group.sort_by_key(|h| h.record.metadata.chunk_index);
    }
    groups
}

/// 컨텍스트 섹션 렌더링
fn render_context(hits: &[&SearchHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT_PLACEHOLDER.to_string();
    }

    group_by_document(hits)
        .iter()
        .enumerate()
        .map(|(i, group)| {
            let meta = &group[0].record.metadata;
            let body = group
                .iter()
                .map(|h| h.record.metadata.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            format!(
                "[Source {}: {} ({})]\n{}\n",
                i + 1,
                source_name(std::path::Path::new(&meta.source_path)),
                meta.doc_type,
                body
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn attribute(hits: &[&SearchHit]) -> Vec<SourceAttribution> {
    group_by_document(hits)
        .into_iter()
        .map(|group| {
            let meta = &group[0].record.metadata;
            SourceAttribution {
                document_id: meta.document_id.clone(),
                source_path: meta.source_path.clone(),
                doc_type: meta.doc_type.clone(),
                chunk_ids: group.iter().map(|h| h.record.id.clone()).collect(),
                score: group
                    .iter()
                    .map(|h| h.score)
                    .fold(f32::NEG_INFINITY, f32::max),
            }
        })
        .collect()
}

fn prompt_len(system: &str, history: &[ConversationTurn], user_message: &str) -> usize {
    system.chars().count()
        + history.iter().map(|t| t.text.chars().count()).sum::<usize>()
        + user_message.chars().count()
}

// ============================================================================
// Tests
// ============================================================================
