//! 补全服务 Provider
//!
//! `CompletionProvider` 只负责把 prompt 变成原始文本（或文本分片流），
//! 代码提取在 `services::generation` 中完成。

pub mod gemini;
pub mod scripted;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::GenerationError;

pub use gemini::GeminiProvider;
pub use scripted::{ScriptedProvider, ScriptedReply};

/// 原始文本分片流
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send>>;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider 名称，用于日志
    fn name(&self) -> &str;

    /// 是否具备调用所需的凭证
    fn is_configured(&self) -> bool;

    /// 非流式：返回完整文本
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// 流式：返回按到达顺序排列的文本分片
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, GenerationError>;
}
