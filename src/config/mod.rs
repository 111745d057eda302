//! 配置管理模块
//!
//! YAML 配置文件 + `.env` / 环境变量覆盖。
//! API Key 缺失不会阻止启动，生成接口会返回配置错误。

mod types;
mod yaml;

pub use types::{
    Config, GeminiConfig, LoggingConfig, PreviewConfig, ServerConfig, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_GEMINI_MODEL,
};
pub use yaml::{
    apply_env_overrides, default_config_path, is_localhost_host, load_config, load_config_from,
    parse_config, validate, ConfigError, GEMINI_API_KEY_ENV,
};
