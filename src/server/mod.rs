//! HTTP API 服务器
//!
//! 路由一览：
//! - `GET  /`                    静态页面
//! - `POST /generate`            生成代码（`stream: true` 时只登记请求）
//! - `POST /generate-stream`     SSE 流式生成
//! - `POST /update-instructions` 替换自定义指令
//! - `GET  /export-code`         导出最近一次生成的代码
//! - `POST /run-preview`         启动预览进程
//! - `GET  /preview-status`      预览进程状态
//! - `POST /stop-preview`        停止预览进程
//! - `GET  /health`              健康检查
//! - `GET  /history`             对话历史

mod error;
mod handlers;
mod stream;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::services::CodeGenerator;
use crate::session::SessionHandle;

pub use error::ApiError;

/// 共享的应用状态
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub generator: CodeGenerator,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(session: SessionHandle, generator: CodeGenerator, config: Config) -> Self {
        Self {
            session,
            generator,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit;

    Router::new()
        .route("/", get(handlers::index))
        .route("/generate", post(handlers::generate))
        .route("/generate-stream", post(stream::generate_stream))
        .route("/update-instructions", post(handlers::update_instructions))
        .route("/export-code", get(handlers::export_code))
        .route("/run-preview", post(handlers::run_preview))
        .route("/preview-status", get(handlers::preview_status))
        .route("/stop-preview", post(handlers::stop_preview))
        .route("/health", get(handlers::health))
        .route("/history", get(handlers::history))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// 启动服务器，收到 Ctrl-C / SIGTERM 后优雅退出并清理会话
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let host = state.config.server.host.clone();
    let port = state.config.server.port;
    let session = state.session.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    let addr: SocketAddr = listener.local_addr()?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped, cleaning up session");
    session.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
