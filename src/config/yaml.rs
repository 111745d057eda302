//! YAML 配置加载与环境变量覆盖

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::types::Config;

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "UIFORGE_CONFIG";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const GEMINI_MODEL_ENV: &str = "GEMINI_MODEL";
pub const HOST_ENV: &str = "UIFORGE_HOST";
pub const PORT_ENV: &str = "UIFORGE_PORT";
pub const PYTHON_ENV: &str = "UIFORGE_PYTHON";
pub const OFFLINE_ENV: &str = "UIFORGE_OFFLINE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 默认配置文件路径 `~/.uiforge/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".uiforge")
        .join("config.yaml")
}

/// 从文件加载配置，文件不存在时使用默认值
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::debug!("[CONFIG] {:?} not found, using defaults", path);
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// 解析 YAML 文本，空文本视为默认配置
pub fn parse_config(content: &str) -> Result<Config, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    serde_yaml::from_str(content)
}

/// 加载配置：`.env` → YAML 文件 → 环境变量覆盖 → 校验
pub fn load_config() -> Result<Config, ConfigError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!("[CONFIG] Failed to load .env: {}", e);
        }
    }

    let path = std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path());

    let mut config = load_config_from(&path)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// 用环境变量覆盖配置值，`lookup` 便于测试注入
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(GEMINI_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
        config.gemini.api_key = Some(key);
    }
    if let Some(model) = lookup(GEMINI_MODEL_ENV).filter(|m| !m.trim().is_empty()) {
        config.gemini.model = model;
    }
    if let Some(host) = lookup(HOST_ENV) {
        config.server.host = host;
    }
    if let Some(port) = lookup(PORT_ENV) {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV} is not a port: {port}")))?;
    }
    if let Some(python) = lookup(PYTHON_ENV).filter(|p| !p.trim().is_empty()) {
        config.preview.interpreter = python;
    }
    if let Some(offline) = lookup(OFFLINE_ENV) {
        config.gemini.offline = matches!(offline.trim(), "1" | "true" | "yes");
    }
    Ok(())
}

pub fn is_localhost_host(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }
    host.parse::<std::net::IpAddr>()
        .map(|addr| addr.is_loopback())
        .unwrap_or(false)
}

/// 校验配置
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if !is_localhost_host(&config.server.host) {
        return Err(ConfigError::Invalid(format!(
            "only local listening is supported, got host {}",
            config.server.host
        )));
    }
    if config.server.port == 0 {
        return Err(ConfigError::Invalid("port must not be 0".to_string()));
    }
    if config.gemini.model.trim().is_empty() {
        return Err(ConfigError::Invalid("gemini.model must not be empty".to_string()));
    }
    if config.preview.interpreter.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "preview.interpreter must not be empty".to_string(),
        ));
    }
    Ok(())
}
