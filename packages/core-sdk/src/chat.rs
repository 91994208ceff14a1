use tracing::{error, info, warn};

use crate::{
    config::{AppConfig, ChatConfig, Locale},
    conversation,
    error::{ChatFailure, ChatResult, ErrorKind, ValidationIssue},
    llm::ProviderClient,
    models::{HistoryTurn, Message, ProviderConfig, Role},
};

/**
 * \brief 聊天编排：校验输入 → 组装对话窗口 → 调用 Provider → 归类错误。
 *
 * 所有字段在构造后不再修改，可在并发请求间共享。
 */
#[derive(Debug, Clone)]
pub struct ChatService {
    client: ProviderClient,
    provider: ProviderConfig,
    persona_prompt: String,
    max_history: usize,
    locale: Locale,
}

impl ChatService {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        Self::with_provider(&config.chat, config.provider_config())
    }

    pub fn with_provider(chat: &ChatConfig, provider: ProviderConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: ProviderClient::new()?,
            provider,
            persona_prompt: chat.persona_prompt.clone(),
            max_history: chat.max_history,
            locale: chat.locale,
        })
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /**
     * \brief 处理一轮聊天。
     * \param raw_user_text 用户原始输入，去除首尾空白后不得为空
     * \param raw_history 客户端保存的历史，角色仅限 user/assistant
     *
     * 成功时原样返回 Provider 的文本；任何失败都转换为 `ChatFailure`，不会向上抛出。
     */
    pub async fn handle(&self, raw_user_text: &str, raw_history: &[HistoryTurn]) -> ChatResult {
        let text = raw_user_text.trim();
        if text.is_empty() {
            return Err(self.reject(ValidationIssue::EmptyMessage, "message is blank"));
        }
        let history = self.parse_history(raw_history)?;

        let window =
            conversation::build(&self.persona_prompt, &history, text, self.max_history);

        match self.client.send_chat(&window, &self.provider).await {
            Ok(reply) => {
                info!(
                    provider = %self.provider.name,
                    window = window.len(),
                    prompt_len = text.len(),
                    reply_len = reply.len(),
                    "chat completed"
                );
                Ok(reply)
            }
            Err(err) => {
                let failure = ChatFailure::from_llm(&err, self.locale);
                if failure.kind == ErrorKind::Unexpected {
                    error!(provider = %self.provider.name, error = %err, "chat failed unexpectedly");
                } else {
                    warn!(
                        provider = %self.provider.name,
                        kind = failure.kind.as_str(),
                        error = %err,
                        "chat failed"
                    );
                }
                Err(failure)
            }
        }
    }

    /**
     * \brief 构造校验失败结果，供 HTTP 层在请求体无法解析时复用。
     */
    pub fn reject(&self, issue: ValidationIssue, detail: &str) -> ChatFailure {
        warn!(issue = ?issue, detail, "chat request rejected");
        ChatFailure::validation(issue, self.locale, detail)
    }

    fn parse_history(&self, raw_history: &[HistoryTurn]) -> Result<Vec<Message>, ChatFailure> {
        raw_history
            .iter()
            .enumerate()
            .map(|(idx, turn)| match Role::parse_history(&turn.role) {
                Some(role) => Ok(Message::new(role, turn.content.clone())),
                None => Err(self.reject(
                    ValidationIssue::InvalidHistoryRole,
                    &format!("history[{}] has role {:?}", idx, turn.role),
                )),
            })
            .collect()
    }
}
