//! Chat messages and completion results.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub message: Message,
    pub finish_reason: FinishReason,
    /// Absent when the backend does not report usage.
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    /// Cut at `max_tokens`; the post may end mid-sentence.
    MaxTokens,
    /// Output withheld by the provider's content filter.
    ContentFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let sys = Message::system("You write posts");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content, "You write posts");

        assert_eq!(Message::user("Hello").role, MessageRole::User);
        assert_eq!(Message::assistant("Hi").role, MessageRole::Assistant);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Message::user("x")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"x"}"#);
    }
}
