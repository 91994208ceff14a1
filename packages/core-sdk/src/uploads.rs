use std::{
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
};

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use crate::config::Locale;

/** \brief 允许上传的图片扩展名。 */
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/** \brief 单个文件大小上限（5 MiB）。 */
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/** \brief 上传文件对外访问前缀。 */
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

/**
 * \brief 已保存的上传文件。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredUpload {
    pub filename: String,
    pub url: String,
}

impl StoredUpload {
    fn new(filename: String) -> Self {
        let url = format!("{}/{}", UPLOAD_URL_PREFIX, filename);
        Self { filename, url }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file selected")]
    NoFile,

    #[error("malformed multipart body: {0}")]
    Malformed(String),

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("file exceeds {} bytes", MAX_UPLOAD_BYTES)]
    TooLarge,

    #[error("upload not found: {0}")]
    NotFound(String),

    #[error("upload io error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::NoFile
            | UploadError::Malformed(_)
            | UploadError::UnsupportedType(_)
            | UploadError::TooLarge => StatusCode::BAD_REQUEST,
            UploadError::NotFound(_) => StatusCode::NOT_FOUND,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (UploadError::NoFile | UploadError::Malformed(_), Locale::Zh) => "没有选择文件",
            (UploadError::NoFile | UploadError::Malformed(_), Locale::En) => "No file selected",
            (UploadError::UnsupportedType(_), Locale::Zh) => {
                "不支持的文件格式，请上传 PNG、JPG、GIF 或 WebP"
            }
            (UploadError::UnsupportedType(_), Locale::En) => {
                "Unsupported file type, please upload PNG, JPG, GIF or WebP"
            }
            (UploadError::TooLarge, Locale::Zh) => "文件大小超过限制 (最大 5MB)",
            (UploadError::TooLarge, Locale::En) => "File exceeds the size limit (max 5MB)",
            (UploadError::NotFound(_), Locale::Zh) => "文件不存在",
            (UploadError::NotFound(_), Locale::En) => "File not found",
            (UploadError::Io(_), Locale::Zh) => "文件操作失败",
            (UploadError::Io(_), Locale::En) => "File operation failed",
        }
    }
}

/**
 * \brief 图片上传目录的读写封装。
 */
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /** \brief 确保上传目录存在。 */
    pub async fn ensure_dir(&self) -> Result<(), UploadError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /**
     * \brief 保存上传文件，以随机文件名落盘并保留小写扩展名。
     * \param original_name 客户端提供的文件名，仅用于判断扩展名
     */
    pub async fn save(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredUpload, UploadError> {
        if original_name.trim().is_empty() {
            return Err(UploadError::NoFile);
        }
        let ext = allowed_extension(original_name)
            .ok_or_else(|| UploadError::UnsupportedType(original_name.to_string()))?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge);
        }

        self.ensure_dir().await?;
        let filename = format!("{}.{}", Uuid::new_v4().simple(), ext);
        fs::write(self.dir.join(&filename), bytes).await?;
        info!(filename = %filename, size = bytes.len(), "upload saved");
        Ok(StoredUpload::new(filename))
    }

    /**
     * \brief 列出上传目录中的图片，按文件名排序；目录不存在时返回空列表。
     */
    pub async fn list(&self) -> Result<Vec<StoredUpload>, UploadError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if allowed_extension(&name).is_some() {
                files.push(StoredUpload::new(name));
            }
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    /**
     * \brief 删除上传文件，文件名先经过清洗，避免目录穿越。
     */
    pub async fn delete(&self, raw_name: &str) -> Result<(), UploadError> {
        let filename = sanitize_filename(raw_name);
        if filename.is_empty() {
            return Err(UploadError::NotFound(raw_name.to_string()));
        }
        match fs::remove_file(self.dir.join(&filename)).await {
            Ok(()) => {
                info!(filename = %filename, "upload deleted");
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Err(UploadError::NotFound(filename)),
            Err(e) => Err(e.into()),
        }
    }
}

/**
 * \brief 返回允许的小写扩展名；没有扩展名或不在白名单内返回 None。
 */
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/**
 * \brief 清洗客户端提供的文件名：先去掉路径分隔符与保留字符，再只保留 ASCII 字母数字与 `._-`。
 */
pub fn sanitize_filename(raw: &str) -> String {
    let cleaned = ::sanitize_filename::sanitize_with_options(
        raw,
        ::sanitize_filename::Options {
            windows: true,
            truncate: true,
            replacement: " ",
        },
    );
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("photo.PNG").as_deref(), Some("png"));
        assert_eq!(allowed_extension("a.b.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("script.svg"), None);
        assert_eq!(allowed_extension("noext"), None);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("abc123.png"), "abc123.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("..\\secret.png"), "secret.png");
        assert_eq!(sanitize_filename("my photo.jpg"), "my_photo.jpg");
        assert_eq!(sanitize_filename("图片.png"), "png");
        assert_eq!(sanitize_filename(".."), "");
        assert_eq!(sanitize_filename("shot:1.gif"), "shot_1.gif");
        assert_eq!(sanitize_filename("CON"), "");
    }

    #[test]
    fn test_upload_error_status() {
        assert_eq!(UploadError::NoFile.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            UploadError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            UploadError::TooLarge.message(Locale::Zh),
            "文件大小超过限制 (最大 5MB)"
        );
    }
}
