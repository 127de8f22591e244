//! 대화 세션
//!
//! 한 사용자의 대화 기록을 보관합니다. 최대 턴 수를 넘으면 가장 오래된
//! 턴부터 버립니다. 세션은 호출자가 소유하고 `&mut`로 넘깁니다.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 발화자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// 대화 턴
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    /// 세션 내 순번 (0부터, 삭제되어도 재사용하지 않음)
    pub ordinal: u64,
    pub created_at: DateTime<Utc>,
}

/// 제한된 길이의 대화 세션
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
    next_ordinal: u64,
}

impl Session {
    pub fn new(max_turns: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            turns: VecDeque::new(),
            max_turns: max_turns.max(1),
            next_ordinal: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Role::User, text.into());
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.push(Role::Assistant, text.into());
    }

    fn push(&mut self, role: Role, text: String) {
        self.turns.push_back(ConversationTurn {
            role,
            text,
            ordinal: self.next_ordinal,
            created_at: Utc::now(),
        });
        self.next_ordinal += 1;

        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// 가장 최근 `n`개 턴 (오래된 순)
    pub fn recent(&self, n: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// 전체 턴 (오래된 순)
    pub fn turns(&self) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter()
    }

    /// 대화 기록 초기화
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_turns_evicted() {
        let mut session = Session::new(4);
        for i in 0..6 {
            session.push_user(format!("q{}", i));
        }

        assert_eq!(session.len(), 4);
        let texts: Vec<_> = session.turns().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q2", "q3", "q4", "q5"]);
        assert_eq!(session.turns().next().map(|t| t.ordinal), Some(2));
    }

    #[test]
    fn test_recent_returns_tail_in_order() {
        let mut session = Session::new(20);
        session.push_user("hi");
        session.push_assistant("hello");
        session.push_user("experience?");

        let recent = session.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].role, Role::Assistant);
        assert_eq!(recent[1].text, "experience?");
        assert_eq!(session.recent(10).len(), 3);
    }

    #[test]
    fn test_clear_keeps_ordinals_increasing() {
        let mut session = Session::new(5);
        session.push_user("one");
        session.clear();
        assert!(session.is_empty());

        session.push_user("two");
        assert_eq!(session.recent(1)[0].ordinal, 1);
    }
}
