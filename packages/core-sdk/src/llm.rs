use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::LlmError;
use crate::models::{ConversationWindow, Message, ProviderConfig, Role};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

/**
 * \brief 支持的 Provider 类型，新增 Provider 即新增一个变体。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /** \brief OpenAI 兼容的托管接口（通义千问 DashScope、OpenAI） */
    OpenAiCompatible,
    /** \brief 本地 Ollama 守护进程，无需鉴权 */
    Ollama,
    /** \brief Anthropic Messages 接口 */
    Anthropic,
}

impl ProviderKind {
    /**
     * \brief 将配置中的名称映射到具体 Provider；未知名称返回配置错误。
     */
    pub fn from_name(name: &str) -> Result<Self, LlmError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "dashscope" | "openai" => Ok(ProviderKind::OpenAiCompatible),
            "ollama" => Ok(ProviderKind::Ollama),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Err(LlmError::Config(format!("unknown LLM provider: {}", other))),
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, ProviderKind::Ollama)
    }
}

/**
 * \brief Provider 调用客户端，内部复用同一个 HTTP 连接池。
 */
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
}

impl ProviderClient {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http })
    }

    /**
     * \brief 非流式调用，返回 Provider 的完整回复文本。
     *
     * 配置错误在发起网络请求之前返回。
     */
    pub async fn send_chat(
        &self,
        window: &ConversationWindow,
        config: &ProviderConfig,
    ) -> Result<String, LlmError> {
        let kind = ProviderKind::from_name(&config.name)?;
        debug!(
            provider = %config.name,
            model = %config.model,
            messages = window.len(),
            "sending chat request"
        );
        match kind {
            ProviderKind::OpenAiCompatible => self.chat_once_openai(window, config).await,
            ProviderKind::Ollama => self.chat_once_ollama(window, config).await,
            ProviderKind::Anthropic => self.chat_once_anthropic(window, config).await,
        }
    }

    async fn chat_once_openai(
        &self,
        window: &ConversationWindow,
        config: &ProviderConfig,
    ) -> Result<String, LlmError> {
        let api_key = require_api_key(config)?;
        let url = require_endpoint(config)?.to_string();
        require_model(config)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", api_key))?);
        let body = json!({
            "model": config.model,
            "messages": window,
        });

        let v = self.post_json(&url, headers, &body, config.timeout).await?;
        extract_openai_content(&v)
    }

    async fn chat_once_ollama(
        &self,
        window: &ConversationWindow,
        config: &ProviderConfig,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", require_endpoint(config)?.trim_end_matches('/'));
        require_model(config)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let body = json!({
            "model": config.model,
            "messages": window,
            "stream": false
        });

        let v = self.post_json(&url, headers, &body, config.timeout).await?;
        extract_ollama_content(&v)
    }

    async fn chat_once_anthropic(
        &self,
        window: &ConversationWindow,
        config: &ProviderConfig,
    ) -> Result<String, LlmError> {
        let api_key = require_api_key(config)?;
        let url = require_endpoint(config)?.to_string();
        require_model(config)?;

        let (system_prompt, payload_messages) = anthropic_payload(window.messages());
        let mut body = json!({
            "model": config.model,
            "max_tokens": ANTHROPIC_MAX_TOKENS,
            "messages": payload_messages,
        });
        if let Some(sys) = system_prompt {
            body["system"] = json!(sys);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", header_value(api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let v = self.post_json(&url, headers, &body, config.timeout).await?;
        extract_anthropic_content(&v)
    }

    async fn post_json(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, LlmError> {
        let resp = self
            .http
            .post(url)
            .headers(headers)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(e, timeout))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = match resp.text().await {
                Ok(text) => text,
                Err(e) => {
                    debug!(status, error = %e, "read provider error body failed");
                    String::new()
                }
            };
            return Err(LlmError::Status { status, body: text });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| LlmError::from_reqwest(e, timeout))
    }
}

fn require_api_key(config: &ProviderConfig) -> Result<&str, LlmError> {
    match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key),
        _ => Err(LlmError::Config(format!(
            "api key for provider {} is not set",
            config.name
        ))),
    }
}

fn require_endpoint(config: &ProviderConfig) -> Result<&str, LlmError> {
    let endpoint = config.endpoint.trim();
    if endpoint.is_empty() {
        return Err(LlmError::Config(format!(
            "endpoint for provider {} is not set",
            config.name
        )));
    }
    Ok(endpoint)
}

fn require_model(config: &ProviderConfig) -> Result<(), LlmError> {
    if config.model.trim().is_empty() {
        return Err(LlmError::Config(format!(
            "model for provider {} is not set",
            config.name
        )));
    }
    Ok(())
}

fn header_value(raw: &str) -> Result<HeaderValue, LlmError> {
    HeaderValue::from_str(raw)
        .map_err(|_| LlmError::Config("api key contains invalid header characters".to_string()))
}

fn text_at<'a>(v: &'a Value, pointer: &str, path: &str) -> Result<&'a str, LlmError> {
    match v.pointer(pointer) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(LlmError::Payload(format!(
            "{} is not a string: {}",
            path, other
        ))),
        None => Err(LlmError::Payload(format!("missing {}", path))),
    }
}

fn extract_openai_content(v: &Value) -> Result<String, LlmError> {
    text_at(v, "/choices/0/message/content", "choices[0].message.content").map(str::to_string)
}

fn extract_ollama_content(v: &Value) -> Result<String, LlmError> {
    text_at(v, "/message/content", "message.content").map(str::to_string)
}

fn extract_anthropic_content(v: &Value) -> Result<String, LlmError> {
    let blocks = v
        .get("content")
        .and_then(|arr| arr.as_array())
        .ok_or_else(|| LlmError::Payload("missing content array".to_string()))?;
    let texts = blocks
        .iter()
        .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>();
    if texts.is_empty() {
        return Err(LlmError::Payload("no text block in content".to_string()));
    }
    Ok(texts.join(""))
}

fn anthropic_payload(messages: &[Message]) -> (Option<String>, Vec<Value>) {
    let mut system_parts = Vec::new();
    let mut items = Vec::new();
    for msg in messages {
        match msg.role {
            Role::System => system_parts.push(msg.content.clone()),
            Role::User | Role::Assistant => items.push(json!({
                "role": msg.role.as_str(),
                "content": [{"type": "text", "text": msg.content}]
            })),
        }
    }
    let system_prompt = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };
    (system_prompt, items)
}
