use std::{net::IpAddr, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use amadeus_core_sdk::{
    chat::ChatService,
    config::{
        AppConfig, ChatConfig, LlmConfig, Locale, LogConfig, ProviderSettings, ServerConfig,
        DEFAULT_ANTHROPIC_MODEL, DEFAULT_ANTHROPIC_URL, DEFAULT_DASHSCOPE_MODEL,
        DEFAULT_DASHSCOPE_URL, DEFAULT_MAX_HISTORY, DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL,
        DEFAULT_PORT, DEFAULT_PROVIDER, DEFAULT_TIMEOUT_SECS,
    },
    llm::ProviderKind,
    server, telemetry,
};

/**
 * \brief CLI 程序入口：启动服务或单次对话。
 */
#[derive(Parser, Debug)]
#[command(name = "amadeus", version, about = "Amadeus persona chat backend")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

/**
 * \brief 所有子命令共享的 LLM 与对话配置，命令行参数优先于环境变量。
 */
#[derive(Args, Debug)]
struct Settings {
    /** \brief Provider 名称：dashscope / openai / ollama / anthropic */
    #[arg(long, env = "LLM_PROVIDER", default_value = DEFAULT_PROVIDER, global = true)]
    provider: String,

    #[arg(long, env = "DASHSCOPE_API_KEY", hide_env_values = true, global = true)]
    dashscope_api_key: Option<String>,
    #[arg(long, env = "DASHSCOPE_MODEL", default_value = DEFAULT_DASHSCOPE_MODEL, global = true)]
    dashscope_model: String,
    #[arg(long, env = "DASHSCOPE_BASE_URL", default_value = DEFAULT_DASHSCOPE_URL, global = true)]
    dashscope_base_url: String,

    #[arg(long, env = "OLLAMA_BASE_URL", default_value = DEFAULT_OLLAMA_URL, global = true)]
    ollama_base_url: String,
    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_OLLAMA_MODEL, global = true)]
    ollama_model: String,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true, global = true)]
    anthropic_api_key: Option<String>,
    #[arg(long, env = "ANTHROPIC_MODEL", default_value = DEFAULT_ANTHROPIC_MODEL, global = true)]
    anthropic_model: String,
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = DEFAULT_ANTHROPIC_URL, global = true)]
    anthropic_base_url: String,

    /** \brief 单次 Provider 调用超时（秒） */
    #[arg(long, env = "AMADEUS_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout_secs: u64,

    /** \brief 保留的历史条数上限 */
    #[arg(long, env = "AMADEUS_MAX_HISTORY", default_value_t = DEFAULT_MAX_HISTORY, global = true)]
    max_history: usize,

    /** \brief 错误提示语言：zh / en */
    #[arg(long, env = "AMADEUS_LOCALE", default_value = "zh", global = true)]
    locale: Locale,

    /** \brief 替换内置人格提示词的文件 */
    #[arg(long, env = "AMADEUS_PERSONA_FILE", global = true)]
    persona_file: Option<PathBuf>,

    /** \brief 日志文件目录，未设置时只输出到 stderr */
    #[arg(long, env = "AMADEUS_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 启动 HTTP 服务并提供前端页面。
     */
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: IpAddr,
        #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        #[arg(long, env = "AMADEUS_STATIC_DIR", default_value = "static")]
        static_dir: PathBuf,
        #[arg(long, env = "AMADEUS_UPLOAD_DIR", default_value = "static/uploads")]
        upload_dir: PathBuf,
    },

    /**
     * \brief 发送一条消息（无历史）并打印回复。
     */
    Chat {
        #[arg(long)]
        prompt: String,
    },

    /**
     * \brief 打印当前 Provider 配置，不访问网络。
     */
    Health,
}

impl Settings {
    fn into_config(self, server: ServerConfig, log_filter: &str) -> Result<AppConfig> {
        let persona_prompt = match &self.persona_file {
            Some(path) => ChatConfig::load_persona(path)?,
            None => ChatConfig::default().persona_prompt,
        };
        Ok(AppConfig {
            server,
            llm: LlmConfig {
                provider: self.provider,
                dashscope: ProviderSettings {
                    endpoint: self.dashscope_base_url,
                    model: self.dashscope_model,
                    api_key: self.dashscope_api_key,
                },
                ollama: ProviderSettings {
                    endpoint: self.ollama_base_url,
                    model: self.ollama_model,
                    api_key: None,
                },
                anthropic: ProviderSettings {
                    endpoint: self.anthropic_base_url,
                    model: self.anthropic_model,
                    api_key: self.anthropic_api_key,
                },
                timeout: Duration::from_secs(self.timeout_secs),
            },
            chat: ChatConfig {
                persona_prompt,
                max_history: self.max_history,
                locale: self.locale,
            },
            log: LogConfig {
                filter: log_filter.to_string(),
                dir: self.log_dir,
            },
        })
    }
}

fn print_banner(config: &AppConfig) {
    let provider = config.provider_config();
    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                      AMADEUS SYSTEM                       ║
╚═══════════════════════════════════════════════════════════╝
  Provider: {}
  Model:    {}
  Port:     {}
"#,
        provider.name, provider.model, config.server.port
    );
    println!("服务器已启动: http://localhost:{}", config.server.port);
    println!("手机访问请使用: http://<你的电脑IP>:{}", config.server.port);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            static_dir,
            upload_dir,
        } => {
            let server_config = ServerConfig {
                host,
                port,
                static_dir,
                upload_dir,
            };
            let config = cli
                .settings
                .into_config(server_config, &LogConfig::default().filter)?;
            telemetry::init(&config.log).context("init telemetry failed")?;
            print_banner(&config);
            server::run(config).await?;
        }
        Commands::Chat { prompt } => {
            let config = cli.settings.into_config(ServerConfig::default(), "warn")?;
            telemetry::init(&config.log).context("init telemetry failed")?;

            let service = ChatService::new(&config).context("create chat service failed")?;
            info!(provider = %service.provider().name, "cli chat");
            let reply = service
                .handle(&prompt, &[])
                .await
                .map_err(|failure| anyhow!("{} ({})", failure.message, failure.kind.as_str()))?;
            println!("{}", reply);
        }
        Commands::Health => {
            let config = cli.settings.into_config(ServerConfig::default(), "warn")?;
            let provider = config.provider_config();
            let status = match ProviderKind::from_name(&provider.name) {
                Ok(kind) if kind.requires_api_key() && provider.api_key.is_none() => {
                    "missing api key"
                }
                Ok(_) => "ok",
                Err(_) => "unknown provider",
            };
            println!(
                "provider={} model={} endpoint={} timeout={}s status={}",
                provider.name,
                provider.model,
                provider.endpoint,
                provider.timeout.as_secs(),
                status
            );
        }
    }

    Ok(())
}
