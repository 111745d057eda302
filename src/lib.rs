//! UIForge：把自然语言的界面描述交给 Gemini 生成 CustomTkinter 代码，
//! 并在本地以子进程方式预览。

pub mod config;
pub mod error;
pub mod extractor;
pub mod logger;
pub mod models;
pub mod preview;
pub mod prompt;
pub mod providers;
pub mod server;
pub mod services;
pub mod session;

use anyhow::Context;

use crate::server::AppState;
use crate::services::CodeGenerator;
use crate::session::{Session, SessionHandle};

/// 加载配置、初始化日志并运行 HTTP 服务直到收到退出信号
pub async fn run() -> anyhow::Result<()> {
    let config = config::load_config().context("failed to load configuration")?;
    logger::init_logging(&config.logging);

    tracing::info!(
        "Starting uiforge v{} (model: {}, interpreter: {})",
        env!("CARGO_PKG_VERSION"),
        config.gemini.model,
        config.preview.interpreter
    );

    let generator = CodeGenerator::from_config(&config.gemini);
    let session = Session::new(&config.preview).context("failed to create preview directory")?;
    let state = AppState::new(SessionHandle::new(session), generator, config);

    server::run_server(state).await
}
