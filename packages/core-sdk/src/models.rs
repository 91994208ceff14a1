use std::time::Duration;

use serde::{Deserialize, Serialize};

/**
 * \brief 消息角色，序列化为小写字符串，与 OpenAI Chat 格式对齐。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /**
     * \brief 解析客户端历史中的角色，仅接受 user/assistant（忽略大小写）。
     */
    pub fn parse_history(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/**
 * \brief 消息结构，与 OpenAI Chat 消息格式对齐。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /** \brief 角色：system/user/assistant */
    pub role: Role,
    /** \brief 内容 */
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/**
 * \brief 一次对话实际发送给 Provider 的消息窗口。
 *
 * 只能由 `conversation::build` 构造：首条恒为人格 system 消息，末条恒为新的 user 消息。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConversationWindow {
    messages: Vec<Message>,
}

impl ConversationWindow {
    pub(crate) fn from_parts(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /** \brief 人格提示词（窗口首条 system 消息）。 */
    pub fn persona(&self) -> &str {
        self.messages
            .first()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/**
 * \brief 单个 Provider 的调用配置，进程启动时解析一次，之后不可变。
 */
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /** \brief Provider 名称（dashscope/openai/ollama/anthropic），调用时再解析 */
    pub name: String,
    /** \brief 请求地址；ollama 为守护进程基地址，其余为完整接口地址 */
    pub endpoint: String,
    /** \brief 模型名 */
    pub model: String,
    /** \brief API Key（本地 Provider 可为空） */
    pub api_key: Option<String>,
    /** \brief 单次调用超时 */
    pub timeout: Duration,
}

/**
 * \brief 客户端提交的历史轮次，角色保持原始字符串，由 ChatService 校验。
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl HistoryTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/**
 * \brief POST /api/chat 请求体。
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /** \brief 用户发送的消息 */
    #[serde(default)]
    pub message: String,
    /** \brief 按时间顺序的历史消息 */
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::assistant("hello");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v, serde_json::json!({"role": "assistant", "content": "hello"}));
    }

    #[test]
    fn test_parse_history_role() {
        assert_eq!(Role::parse_history("user"), Some(Role::User));
        assert_eq!(Role::parse_history(" Assistant "), Some(Role::Assistant));
        assert_eq!(Role::parse_history("system"), None);
        assert_eq!(Role::parse_history("tool"), None);
    }

    #[test]
    fn test_chat_request_defaults() {
        let req: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(req.message.is_empty());
        assert!(req.history.is_empty());
    }
}
