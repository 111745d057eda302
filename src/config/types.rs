//! 配置类型定义

use serde::{Deserialize, Serialize};

/// Gemini 官方 API 地址
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// 默认模型
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";

/// 主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 请求体大小上限（字节）
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit: default_body_limit(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_body_limit() -> usize {
    2 * 1024 * 1024
}

/// Gemini 补全服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API Key，通常由环境变量 GEMINI_API_KEY 提供
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// 离线模式：不访问网络，使用内置示例应答
    #[serde(default)]
    pub offline: bool,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            temperature: None,
            offline: false,
        }
    }
}

impl GeminiConfig {
    /// 是否配置了非空的 API Key
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

/// 预览进程配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// 运行生成代码的解释器
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// 启动后等待多久再检查进程是否存活（毫秒）
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
    /// 发送终止信号后的宽限期（毫秒）
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    /// 预览文件名
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            startup_delay_ms: default_startup_delay_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            file_name: default_file_name(),
        }
    }
}

fn default_interpreter() -> String {
    if cfg!(windows) {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}

fn default_startup_delay_ms() -> u64 {
    1000
}

fn default_stop_grace_ms() -> u64 {
    500
}

fn default_file_name() -> String {
    "ui_preview.py".to_string()
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
