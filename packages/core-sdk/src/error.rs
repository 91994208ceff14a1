use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::config::Locale;

/**
 * \brief Provider 适配层统一错误，任何 Provider 私有的响应结构都不会越过此边界。
 */
#[derive(Debug, Error)]
pub enum LlmError {
    /** \brief 配置缺失或无效，未发起网络请求 */
    #[error("config error: {0}")]
    Config(String),

    /** \brief 超过配置的调用时长 */
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /** \brief 无法连接 Provider */
    #[error("transport error: {0}")]
    Transport(String),

    /** \brief Provider 返回非成功状态码 */
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /** \brief 响应体无法解析或缺少文本字段 */
    #[error("unexpected provider payload: {0}")]
    Payload(String),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl LlmError {
    /**
     * \brief 按 reqwest 错误类别归类；超时优先判断。
     */
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout)
        } else if err.is_builder() {
            LlmError::Config(format!("invalid provider endpoint: {}", err))
        } else if err.is_decode() {
            LlmError::Payload(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() || err.is_redirect() {
            LlmError::Transport(err.to_string())
        } else {
            LlmError::Unexpected(err.to_string())
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::Config(_) => ErrorKind::Config,
            LlmError::Timeout(_) => ErrorKind::Timeout,
            LlmError::Transport(_) => ErrorKind::Transport,
            LlmError::Status { .. } | LlmError::Payload(_) => ErrorKind::Provider,
            LlmError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

/**
 * \brief 对外暴露的失败类别。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Config,
    Timeout,
    Transport,
    Provider,
    Unexpected,
}

impl ErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Validation | ErrorKind::Config => StatusCode::BAD_REQUEST,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Transport => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Provider => StatusCode::BAD_GATEWAY,
            ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Config => "config",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Transport => "transport",
            ErrorKind::Provider => "provider",
            ErrorKind::Unexpected => "unexpected",
        }
    }

    /**
     * \brief 面向用户的简短提示。
     */
    pub fn message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (ErrorKind::Validation, Locale::Zh) => "请求无效",
            (ErrorKind::Validation, Locale::En) => "Invalid request",
            (ErrorKind::Config, Locale::Zh) => "AI 服务配置错误",
            (ErrorKind::Config, Locale::En) => "The AI service is misconfigured",
            (ErrorKind::Timeout, Locale::Zh) => "AI 响应超时，请重试",
            (ErrorKind::Timeout, Locale::En) => "The AI took too long to respond, please retry",
            (ErrorKind::Transport, Locale::Zh) => "无法连接到 AI 服务",
            (ErrorKind::Transport, Locale::En) => "Unable to reach the AI service",
            (ErrorKind::Provider, Locale::Zh) => "AI 服务返回了无效响应",
            (ErrorKind::Provider, Locale::En) => "The AI service returned an invalid response",
            (ErrorKind::Unexpected, Locale::Zh) => "服务器内部错误",
            (ErrorKind::Unexpected, Locale::En) => "Internal server error",
        }
    }
}

/**
 * \brief 客户端输入校验失败的原因。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    /** \brief 请求体缺失或不是合法 JSON */
    EmptyBody,
    /** \brief 消息去除空白后为空 */
    EmptyMessage,
    /** \brief 历史中出现 user/assistant 以外的角色 */
    InvalidHistoryRole,
}

impl ValidationIssue {
    pub fn message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (ValidationIssue::EmptyBody, Locale::Zh) => "请求体为空",
            (ValidationIssue::EmptyBody, Locale::En) => "Request body is empty or not valid JSON",
            (ValidationIssue::EmptyMessage, Locale::Zh) => "消息不能为空",
            (ValidationIssue::EmptyMessage, Locale::En) => "Message must not be empty",
            (ValidationIssue::InvalidHistoryRole, Locale::Zh) => "历史消息角色无效",
            (ValidationIssue::InvalidHistoryRole, Locale::En) => {
                "History may only contain user and assistant turns"
            }
        }
    }
}

/**
 * \brief 一次聊天失败的结果。
 *
 * `message` 已本地化，可直接返回给客户端；`detail` 仅写入服务端日志。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
}

impl ChatFailure {
    pub fn validation(issue: ValidationIssue, locale: Locale, detail: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: issue.message(locale).to_string(),
            detail: detail.into(),
        }
    }

    pub fn from_llm(err: &LlmError, locale: Locale) -> Self {
        let kind = err.kind();
        Self {
            kind,
            message: kind.message(locale).to_string(),
            detail: err.to_string(),
        }
    }
}

impl std::fmt::Display for ChatFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.message, self.kind.as_str(), self.detail)
    }
}

impl std::error::Error for ChatFailure {}

/** \brief 聊天结果：成功时为 Provider 原样返回的文本。 */
pub type ChatResult = Result<String, ChatFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(LlmError::Config("x".into()).kind(), ErrorKind::Config);
        assert_eq!(
            LlmError::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(LlmError::Transport("x".into()).kind(), ErrorKind::Transport);
        assert_eq!(
            LlmError::Status {
                status: 500,
                body: String::new()
            }
            .kind(),
            ErrorKind::Provider
        );
        assert_eq!(LlmError::Payload("x".into()).kind(), ErrorKind::Provider);
        assert_eq!(LlmError::Unexpected("x".into()).kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::Validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ErrorKind::Transport.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ErrorKind::Provider.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ErrorKind::Unexpected.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_failure_hides_detail_from_message() {
        let err = LlmError::Status {
            status: 500,
            body: "{\"error\":\"boom\"}".to_string(),
        };
        let failure = ChatFailure::from_llm(&err, Locale::Zh);
        assert_eq!(failure.kind, ErrorKind::Provider);
        assert_eq!(failure.message, "AI 服务返回了无效响应");
        assert!(failure.detail.contains("boom"));
        assert!(!failure.message.contains("boom"));
    }

    #[test]
    fn test_validation_failure() {
        let failure =
            ChatFailure::validation(ValidationIssue::EmptyMessage, Locale::En, "blank input");
        assert_eq!(failure.kind, ErrorKind::Validation);
        assert_eq!(failure.message, "Message must not be empty");
    }

    #[test]
    fn test_messages_are_localized() {
        assert_eq!(ErrorKind::Timeout.message(Locale::Zh), "AI 响应超时，请重试");
        assert_eq!(
            ErrorKind::Transport.message(Locale::En),
            "Unable to reach the AI service"
        );
    }
}
