pub mod chat;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod models;
pub mod server;
pub mod telemetry;
pub mod uploads;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::chat::ChatService;
    pub use crate::config::{AppConfig, Locale};
    pub use crate::error::{ChatFailure, ChatResult, ErrorKind};
    pub use crate::llm::{ProviderClient, ProviderKind};
    pub use crate::models::{ConversationWindow, HistoryTurn, Message, ProviderConfig, Role};
    pub use crate::uploads::UploadStore;
    pub use crate::{chat, config, conversation, error, llm, models, server, telemetry, uploads};
}
