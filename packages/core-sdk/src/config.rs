use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use thiserror::Error;

use crate::{llm::ProviderKind, models::ProviderConfig};

/** \brief 内置人格提示词。 */
pub const DEFAULT_PERSONA: &str = include_str!("../assets/persona.txt");

pub const DEFAULT_PROVIDER: &str = "dashscope";
pub const DEFAULT_DASHSCOPE_URL: &str =
    "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";
pub const DEFAULT_DASHSCOPE_MODEL: &str = "qwen-turbo";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen2.5:7b";
pub const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_MAX_HISTORY: usize = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/**
 * \brief 用户可见提示语言。
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    Zh,
    En,
}

impl FromStr for Locale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "zh_cn" => Ok(Locale::Zh),
            "en" | "en-us" | "en_us" => Ok(Locale::En),
            other => Err(ConfigError::UnknownLocale(other.to_string())),
        }
    }
}

/**
 * \brief 进程级配置，启动时构造一次，显式传入各组件，之后不再修改。
 */
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub chat: ChatConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /** \brief 当前选中 Provider 的调用配置。 */
    pub fn provider_config(&self) -> ProviderConfig {
        self.llm.provider_config()
    }
}

/**
 * \brief HTTP 服务配置。
 */
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /** \brief 监听地址 */
    pub host: IpAddr,
    /** \brief 监听端口 */
    pub port: u16,
    /** \brief 前端静态资源目录 */
    pub static_dir: PathBuf,
    /** \brief 图片上传目录 */
    pub upload_dir: PathBuf,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from("static"),
            upload_dir: PathBuf::from("static/uploads"),
        }
    }
}

/**
 * \brief 单个 Provider 的连接参数。
 */
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

/**
 * \brief LLM 相关配置。`dashscope` 同时服务于 `openai` 名称。
 */
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /** \brief 选中的 Provider 名称，调用时才校验 */
    pub provider: String,
    pub dashscope: ProviderSettings,
    pub ollama: ProviderSettings,
    pub anthropic: ProviderSettings,
    /** \brief 单次调用超时 */
    pub timeout: Duration,
}

impl LlmConfig {
    /**
     * \brief 解析选中 Provider 的配置；未知名称得到空地址与空模型，错误留到调用时报告。
     */
    pub fn provider_config(&self) -> ProviderConfig {
        let settings = match ProviderKind::from_name(&self.provider) {
            Ok(ProviderKind::OpenAiCompatible) => self.dashscope.clone(),
            Ok(ProviderKind::Ollama) => self.ollama.clone(),
            Ok(ProviderKind::Anthropic) => self.anthropic.clone(),
            Err(_) => ProviderSettings::default(),
        };
        ProviderConfig {
            name: self.provider.clone(),
            endpoint: settings.endpoint,
            model: settings.model,
            api_key: settings.api_key.filter(|k| !k.trim().is_empty()),
            timeout: self.timeout,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            dashscope: ProviderSettings {
                endpoint: DEFAULT_DASHSCOPE_URL.to_string(),
                model: DEFAULT_DASHSCOPE_MODEL.to_string(),
                api_key: None,
            },
            ollama: ProviderSettings {
                endpoint: DEFAULT_OLLAMA_URL.to_string(),
                model: DEFAULT_OLLAMA_MODEL.to_string(),
                api_key: None,
            },
            anthropic: ProviderSettings {
                endpoint: DEFAULT_ANTHROPIC_URL.to_string(),
                model: DEFAULT_ANTHROPIC_MODEL.to_string(),
                api_key: None,
            },
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/**
 * \brief 对话组装配置。
 */
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /** \brief 人格提示词 */
    pub persona_prompt: String,
    /** \brief 保留的历史条数上限 */
    pub max_history: usize,
    /** \brief 错误提示语言 */
    pub locale: Locale,
}

impl ChatConfig {
    /**
     * \brief 从文件读取人格提示词，替换内置版本。
     */
    pub fn load_persona(path: &Path) -> Result<String, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Persona {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyPersona(path.to_path_buf()));
        }
        Ok(trimmed.to_string())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            persona_prompt: DEFAULT_PERSONA.trim().to_string(),
            max_history: DEFAULT_MAX_HISTORY,
            locale: Locale::default(),
        }
    }
}

/**
 * \brief 日志配置。
 */
#[derive(Debug, Clone)]
pub struct LogConfig {
    /** \brief `RUST_LOG` 未设置时使用的过滤规则 */
    pub filter: String,
    /** \brief 可选的日志文件目录 */
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=info".to_string(),
            dir: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read persona file {path}: {source}")]
    Persona {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("persona file {0} is empty")]
    EmptyPersona(PathBuf),

    #[error("unknown locale: {0} (expected zh or en)")]
    UnknownLocale(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5001);
        assert_eq!(config.server.addr().to_string(), "0.0.0.0:5001");
        assert_eq!(config.chat.max_history, 20);
        assert_eq!(config.llm.timeout, Duration::from_secs(30));
        assert_eq!(config.llm.provider, "dashscope");
        assert!(config.chat.persona_prompt.starts_with("你是 Amadeus"));
    }

    #[test]
    fn test_provider_config_selects_settings() {
        let mut llm = LlmConfig::default();
        llm.provider = "ollama".to_string();
        let cfg = llm.provider_config();
        assert_eq!(cfg.endpoint, DEFAULT_OLLAMA_URL);
        assert_eq!(cfg.model, DEFAULT_OLLAMA_MODEL);
        assert!(cfg.api_key.is_none());

        llm.provider = "openai".to_string();
        llm.dashscope.api_key = Some("sk-test".to_string());
        let cfg = llm.provider_config();
        assert_eq!(cfg.endpoint, DEFAULT_DASHSCOPE_URL);
        assert_eq!(cfg.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_blank_api_key_is_treated_as_missing() {
        let mut llm = LlmConfig::default();
        llm.dashscope.api_key = Some("   ".to_string());
        assert!(llm.provider_config().api_key.is_none());
    }

    #[test]
    fn test_unknown_provider_still_resolves() {
        let mut llm = LlmConfig::default();
        llm.provider = "mystery".to_string();
        let cfg = llm.provider_config();
        assert_eq!(cfg.name, "mystery");
        assert!(cfg.endpoint.is_empty());
        assert!(cfg.model.is_empty());
    }

    #[test]
    fn test_locale_from_str() {
        assert_eq!("zh".parse::<Locale>().unwrap(), Locale::Zh);
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert!(matches!(
            "fr".parse::<Locale>(),
            Err(ConfigError::UnknownLocale(_))
        ));
    }

    #[test]
    fn test_load_persona_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "\n  You are a lab member.  \n").unwrap();
        let persona = ChatConfig::load_persona(file.path()).unwrap();
        assert_eq!(persona, "You are a lab member.");
    }

    #[test]
    fn test_load_empty_persona_fails() {
        let file = NamedTempFile::new().unwrap();
        assert!(matches!(
            ChatConfig::load_persona(file.path()),
            Err(ConfigError::EmptyPersona(_))
        ));
    }
}
