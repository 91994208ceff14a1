use std::{fs::OpenOptions, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LogConfig;

const LOG_FILE_NAME: &str = "amadeus.log";

static INITIALIZED: OnceCell<Option<PathBuf>> = OnceCell::new();

/**
 * \brief 初始化全局 tracing 订阅者：stderr 输出，可选追加写入日志文件。
 *
 * 重复调用只生效一次，返回实际使用的日志文件路径。
 */
pub fn init(config: &LogConfig) -> Result<Option<PathBuf>> {
    INITIALIZED
        .get_or_try_init(|| install(config))
        .cloned()
}

fn install(config: &LogConfig) -> Result<Option<PathBuf>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.filter))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(UtcTime::new(Rfc3339));

    let (file_layer, file_path) = match &config.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create log dir {} failed", dir.display()))?;
            let path = dir.join(LOG_FILE_NAME);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file {} failed", path.display()))?;
            let layer = fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_timer(UtcTime::new(Rfc3339));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber failed")?;
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_is_idempotent_and_writes_file() {
        let tmp = TempDir::new().unwrap();
        let config = LogConfig {
            filter: "info".to_string(),
            dir: Some(tmp.path().join("logs")),
        };
        let first = init(&config).unwrap();
        assert!(INITIALIZED.get().is_some());
        let second = init(&LogConfig::default()).unwrap();
        assert_eq!(first, second);

        tracing::error!("telemetry test line");
        let path = first.unwrap();
        assert!(path.exists());
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("telemetry test line"));
    }
}
