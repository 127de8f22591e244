//! 결정적 mock 언어 모델
//!
//! 컨텍스트에서 질문과 단어가 가장 많이 겹치는 문장을 골라 답변합니다.
//! API 키 없이 전체 파이프라인을 실행하거나 테스트할 때 사용합니다.

use std::collections::HashSet;

use async_trait::async_trait;

use super::{BackendError, Completion, CompletionRequest, LanguageModel};

/// 답을 찾지 못했을 때의 고정 답변
pub const NO_ANSWER: &str = "I don't have information about that in the available documents.";

const ANSWER_PREFIX: &str = "Based on the available documents: ";

/// mock 언어 모델
#[derive(Debug, Default, Clone, Copy)]
pub struct MockModel;

impl MockModel {
    pub fn new() -> Self {
        Self
    }

    /// 질문과 가장 많이 겹치는 문장 (동점이면 먼저 나온 문장)
    fn best_sentence<'a>(context: &'a str, question: &str) -> Option<&'a str> {
        let query_words = words(question);
        if query_words.is_empty() {
            return None;
        }

        let mut best: Option<(&str, usize)> = None;
        for sentence in sentences(context) {
            let overlap = words(sentence).intersection(&query_words).count();
            if overlap > 0 && best.map_or(true, |(_, score)| overlap > score) {
                best = Some((sentence, overlap));
            }
        }
        best.map(|(sentence, _)| sentence)
    }
}

/// 출처 헤더를 제외한 문장 목록
fn sentences(context: &str) -> impl Iterator<Item = &str> {
    context
        .lines()
        .filter(|line| !line.trim_start().starts_with("[Source "))
        .flat_map(|line| line.split_inclusive(['.', '!', '?']))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 소문자 단어 집합 (세 글자 미만 제외)
fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(
        &self,
        request: &CompletionRequest<'_>,
    ) -> std::result::Result<Completion, BackendError> {
        let text = match Self::best_sentence(request.context, request.question) {
            Some(sentence) => format!("{}{}", ANSWER_PREFIX, sentence),
            None => NO_ANSWER.to_string(),
        };

        Ok(Completion {
            text,
            model: "mock".to_string(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(context: &'a str, question: &'a str) -> CompletionRequest<'a> {
        CompletionRequest {
            system: "",
            history: &[],
            user_message: "",
            context,
            question,
            model: "mock",
            max_tokens: 100,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn test_picks_sentence_with_most_overlap() {
        let context = "[Source 1: resume.pdf (resume)]\n\
                       Alec lives in Brussels. I have 5 years of experience in data engineering.\n";
        let completion = MockModel::new()
            .complete(&request(context, "How many years of experience?"))
            .await
            .unwrap();

        assert_eq!(
            completion.text,
            "Based on the available documents: I have 5 years of experience in data engineering."
        );
        assert_eq!(completion.model, "mock");
    }

    #[tokio::test]
    async fn test_no_overlap_gives_fixed_answer() {
        let completion = MockModel::new()
            .complete(&request("(no relevant documents found)", "Favourite colour?"))
            .await
            .unwrap();
        assert_eq!(completion.text, NO_ANSWER);
    }

    #[test]
    fn test_source_headers_ignored() {
        let context = "[Source 1: experience.md (resume)]\nShort bio.";
        assert_eq!(MockModel::best_sentence(context, "experience"), None);
    }
}
