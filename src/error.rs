//! 错误类型定义
//!
//! 每个关注点一个错误枚举，由 HTTP 边界统一转换为 `{error}` JSON 响应。

use std::path::PathBuf;

use thiserror::Error;

/// 代码生成错误（配置 / 上游 / 响应格式）
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// 缺少凭证等配置问题
    #[error("{0}")]
    Config(String),
    /// 上游服务失败（HTTP 状态异常、网络错误、流中断）
    #[error("{message}")]
    Upstream {
        message: String,
        status: Option<u16>,
    },
    /// 上游返回了无法识别的响应结构
    #[error("{0}")]
    UnexpectedFormat(String),
}

impl GenerationError {
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            status: None,
        }
    }

    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            status: Some(status),
        }
    }

    /// 映射到对外 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 400,
            Self::Upstream { .. } | Self::UnexpectedFormat(_) => 500,
        }
    }

    /// 错误分类名称，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Upstream { .. } => "upstream",
            Self::UnexpectedFormat(_) => "unexpected_format",
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        Self::Upstream {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

/// 预览进程错误
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Empty or invalid code provided")]
    EmptyCode,
    #[error("No UI code file found at {0}")]
    NoPreviewFile(PathBuf),
    #[error("Preview file at {0} is out of date: the last save failed")]
    StalePreviewFile(PathBuf),
    #[error("Failed to write preview file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to launch preview with {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },
    #[error("UI process exited with code {code:?}")]
    ExitedEarly {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("Failed to terminate preview process {pid}: {message}")]
    Terminate { pid: u32, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_status_codes() {
        assert_eq!(GenerationError::Config("x".into()).status_code(), 400);
        assert_eq!(GenerationError::upstream("boom").status_code(), 500);
        assert_eq!(
            GenerationError::upstream_status(503, "unavailable").status_code(),
            500
        );
        assert_eq!(
            GenerationError::UnexpectedFormat("no text".into()).status_code(),
            500
        );
    }

    #[test]
    fn test_generation_error_display_is_message() {
        let err = GenerationError::upstream_status(429, "quota exceeded");
        assert_eq!(err.to_string(), "quota exceeded");
        assert_eq!(err.kind(), "upstream");
    }

    #[test]
    fn test_preview_error_display() {
        let err = PreviewError::ExitedEarly {
            code: Some(1),
            stdout: String::new(),
            stderr: "Traceback".into(),
        };
        assert_eq!(err.to_string(), "UI process exited with code Some(1)");
    }
}
