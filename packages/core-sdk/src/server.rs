use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    chat::ChatService,
    config::{AppConfig, Locale, ServerConfig},
    error::{ChatFailure, ValidationIssue},
    models::ChatRequest,
    uploads::{StoredUpload, UploadError, UploadStore, MAX_UPLOAD_BYTES, UPLOAD_URL_PREFIX},
};

/** \brief multipart 边界与字段头的余量。 */
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/**
 * \brief 路由共享状态，构造后只读。
 */
#[derive(Clone)]
pub struct AppState {
    chat: Arc<ChatService>,
    uploads: Arc<UploadStore>,
    locale: Locale,
}

/**
 * \brief 启动 HTTP 服务，提供聊天接口、图片上传与静态前端。
 */
pub async fn run(config: AppConfig) -> Result<()> {
    let chat = ChatService::new(&config).context("create chat service failed")?;
    let uploads = UploadStore::new(&config.server.upload_dir);
    uploads
        .ensure_dir()
        .await
        .with_context(|| format!("create upload dir {} failed", uploads.dir().display()))?;

    let app = build_app(&config.server, chat, uploads);
    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {} failed", addr))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/**
 * \brief 组装路由；测试中可直接对返回的 Router 发请求。
 */
pub fn build_app(server: &ServerConfig, chat: ChatService, uploads: UploadStore) -> Router {
    let static_service =
        ServeDir::new(&server.static_dir).append_index_html_on_directories(true);
    let upload_service = ServeDir::new(uploads.dir());

    let state = AppState {
        locale: chat.locale(),
        chat: Arc::new(chat),
        uploads: Arc::new(uploads),
    };

    Router::new()
        .route("/api/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route(
            "/api/upload",
            post(upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD)),
        )
        .route("/api/uploads", get(list_uploads))
        .route("/api/uploads/{filename}", delete(delete_upload))
        .nest_service(UPLOAD_URL_PREFIX, upload_service)
        .fallback_service(static_service)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("listen for shutdown signal failed: {}", e);
        return;
    }
    info!("shutdown signal received");
}

#[derive(Serialize, Debug)]
struct HealthResponse {
    status: &'static str,
    provider: String,
    model: String,
}

#[derive(Serialize, Debug)]
struct ChatResponse {
    response: String,
    status: &'static str,
}

#[derive(Serialize, Debug)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'static str>,
}

#[derive(Serialize, Debug)]
struct UploadResponse {
    status: &'static str,
    filename: String,
    url: String,
}

#[derive(Serialize, Debug)]
struct UploadListResponse {
    files: Vec<StoredUpload>,
}

#[derive(Serialize, Debug)]
struct StatusResponse {
    status: &'static str,
}

/**
 * \brief 健康检查：返回当前 Provider 与模型，不访问网络。
 */
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.chat.provider();
    Json(HealthResponse {
        status: "ok",
        provider: provider.name.clone(),
        model: provider.model.clone(),
    })
}

/**
 * \brief 聊天接口：POST /api/chat {message, history}
 */
async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let failure = state
                .chat
                .reject(ValidationIssue::EmptyBody, &rejection.body_text());
            return failure_response(failure);
        }
    };

    match state.chat.handle(&request.message, &request.history).await {
        Ok(response) => Json(ChatResponse {
            response,
            status: "ok",
        })
        .into_response(),
        Err(failure) => failure_response(failure),
    }
}

fn failure_response(failure: ChatFailure) -> Response {
    let body = ErrorBody {
        error: failure.message,
        category: Some(failure.kind.as_str()),
    };
    (failure.kind.status_code(), Json(body)).into_response()
}

/**
 * \brief 上传图片：multipart 字段名为 `file`。
 */
async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let result = match multipart {
        Ok(mut multipart) => receive_upload(&state.uploads, &mut multipart).await,
        Err(rejection) => Err(UploadError::Malformed(rejection.body_text())),
    };
    match result {
        Ok(stored) => Json(UploadResponse {
            status: "ok",
            filename: stored.filename,
            url: stored.url,
        })
        .into_response(),
        Err(e) => upload_error(e, state.locale),
    }
}

async fn receive_upload(
    store: &UploadStore,
    multipart: &mut Multipart,
) -> Result<StoredUpload, UploadError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.trim().is_empty() {
            return Err(UploadError::NoFile);
        }
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return store.save(&filename, &bytes).await;
    }
    Err(UploadError::NoFile)
}

fn multipart_error(err: MultipartError) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge
    } else {
        UploadError::Malformed(err.body_text())
    }
}

/**
 * \brief 列出已上传图片。
 */
async fn list_uploads(State(state): State<AppState>) -> Response {
    match state.uploads.list().await {
        Ok(files) => Json(UploadListResponse { files }).into_response(),
        Err(e) => upload_error(e, state.locale),
    }
}

/**
 * \brief 删除已上传图片。
 */
async fn delete_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    match state.uploads.delete(&filename).await {
        Ok(()) => Json(StatusResponse { status: "ok" }).into_response(),
        Err(e) => upload_error(e, state.locale),
    }
}

fn upload_error(err: UploadError, locale: Locale) -> Response {
    match &err {
        UploadError::Io(_) => error!("upload failed: {}", err),
        _ => warn!("upload rejected: {}", err),
    }
    let body = ErrorBody {
        error: err.message(locale).to_string(),
        category: None,
    };
    (err.status_code(), Json(body)).into_response()
}
