//! 日志初始化

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// 初始化全局 tracing subscriber
///
/// `RUST_LOG` 优先于配置中的 level。重复初始化（例如测试中）会被忽略。
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(false).try_init()
    };

    if let Err(e) = result {
        tracing::debug!("[LOGGER] subscriber already set: {}", e);
    }
}
