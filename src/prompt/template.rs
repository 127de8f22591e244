//! 프롬프트 템플릿
//!
//! JSON 파일(`system_prompt`, `user_prompt_template`)에서 불러올 수 있습니다.
//! 사용자 템플릿은 `{context}`와 `{query}` 자리표시자를 가집니다.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about a \
person using only the provided documents (resume, cover letters, personal notes). \
If the documents do not contain the answer, say that you don't have that information. \
Keep answers concise and factual, and do not invent details.";

const DEFAULT_USER_TEMPLATE: &str = "Context from documents:\n{context}\n\n\
Question: {query}\n\n\
Answer the question based on the context above.";

/// 시스템 프롬프트 + 사용자 메시지 템플릿
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplates {
    pub system_prompt: String,
    pub user_prompt_template: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt_template: DEFAULT_USER_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// JSON 파일에서 로드
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RagError::Config(format!("prompts file not readable {:?}: {}", path, e))
        })?;
        let templates: Self = serde_json::from_str(&raw)
            .map_err(|e| RagError::Config(format!("invalid JSON in prompts file: {}", e)))?;
        templates.validate()?;

        tracing::info!("Loaded prompt templates from {:?}", path);
        Ok(templates)
    }

    pub fn validate(&self) -> Result<()> {
        for placeholder in ["{context}", "{query}"] {
            if !self.user_prompt_template.contains(placeholder) {
                return Err(RagError::Config(format!(
                    "user_prompt_template is missing {}",
                    placeholder
                )));
            }
        }
        Ok(())
    }

    /// 자리표시자 치환
    ///
    /// 한 번만 훑으면서 치환하므로 컨텍스트나 질문 안의 `{query}` 같은
    /// 문자열은 다시 치환되지 않습니다.
    pub fn fill(&self, context: &str, query: &str) -> String {
        let mut out = String::with_capacity(
            self.user_prompt_template.len() + context.len() + query.len(),
        );
        let mut rest = self.user_prompt_template.as_str();

        while let Some(pos) = rest.find('{') {
            out.push_str(&rest[..pos]);
            let tail = &rest[pos..];
            if let Some(after) = tail.strip_prefix("{context}") {
                out.push_str(context);
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{query}") {
                out.push_str(query);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fill_single_pass() {
        let templates = PromptTemplates {
            system_prompt: "sys".to_string(),
            user_prompt_template: "C: {context} | Q: {query} | {other}".to_string(),
        };
        assert_eq!(
            templates.fill("has {query} inside", "why?"),
            "C: has {query} inside | Q: why? | {other}"
        );
    }

    #[test]
    fn test_default_templates_are_valid() {
        assert!(PromptTemplates::default().validate().is_ok());
    }

    #[test]
    fn test_load_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.json");
        std::fs::write(
            &path,
            r#"{"system_prompt": "Be brief.", "user_prompt_template": "{context}\n\n{query}"}"#,
        )
        .unwrap();

        let templates = PromptTemplates::load(&path).unwrap();
        assert_eq!(templates.system_prompt, "Be brief.");
        assert_eq!(templates.fill("ctx", "q"), "ctx\n\nq");
    }

    #[test]
    fn test_load_rejects_missing_placeholder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prompts.json");
        std::fs::write(&path, r#"{"system_prompt": "x", "user_prompt_template": "{query}"}"#)
            .unwrap();

        let err = PromptTemplates::load(&path).unwrap_err();
        assert!(matches!(err, RagError::Config(ref msg) if msg.contains("{context}")));
    }
}
