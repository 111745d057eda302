//! 代码生成服务
//!
//! 包装 `CompletionProvider`，对模型输出运行代码提取器。
//! 流式模式下每收到一个分片都对**累计的全部文本**重新提取，
//! 代码块可能跨分片开启/闭合。

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;

use crate::config::GeminiConfig;
use crate::error::GenerationError;
use crate::extractor::extract_code;
use crate::providers::gemini::MISSING_API_KEY_MESSAGE;
use crate::providers::{CompletionProvider, GeminiProvider, ScriptedProvider};

/// 流式生成事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// 新分片及截至目前提取出的代码
    Chunk { chunk: String, code: String },
    /// 终止事件：最终代码
    Complete { code: String },
    /// 终止事件：错误
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Chunk { .. })
    }
}

/// 代码生成器
#[derive(Clone)]
pub struct CodeGenerator {
    provider: Arc<dyn CompletionProvider>,
}

impl CodeGenerator {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// 按配置选择 Provider；离线模式使用内置示例应答
    pub fn from_config(config: &GeminiConfig) -> Self {
        if config.offline {
            tracing::warn!("[GENERATE] Offline mode enabled, using the built-in demo reply");
            return Self::new(Arc::new(ScriptedProvider::demo()));
        }
        if !config.has_api_key() {
            tracing::warn!("[GENERATE] GEMINI_API_KEY not found. Please set it in a .env file.");
        }
        Self::new(Arc::new(GeminiProvider::from_config(config)))
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_configured()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn ensure_configured(&self) -> Result<(), GenerationError> {
        if self.provider.is_configured() {
            Ok(())
        } else {
            Err(GenerationError::Config(MISSING_API_KEY_MESSAGE.to_string()))
        }
    }

    /// 非流式生成：返回提取后的代码（可能为空）
    pub async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        self.ensure_configured()?;

        let text = self.provider.generate(prompt).await.map_err(|e| {
            tracing::error!(
                "[GENERATE] {} failed ({}): {}",
                self.provider.name(),
                e.kind(),
                e
            );
            e
        })?;

        let code = extract_code(&text);
        if code.trim().is_empty() {
            tracing::warn!("[GENERATE] Model returned no usable code");
        }
        Ok(code)
    }

    /// 流式生成：惰性、有限、不可重启；最后一个事件总是 `Complete` 或 `Error`
    pub fn complete_stream(&self, prompt: String) -> BoxStream<'static, StreamEvent> {
        let provider = self.provider.clone();

        let stream = async_stream::stream! {
            if !provider.is_configured() {
                yield StreamEvent::Error { message: MISSING_API_KEY_MESSAGE.to_string() };
                return;
            }

            let mut chunks = match provider.generate_stream(&prompt).await {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::error!("[STREAM] Failed to open stream ({}): {}", e.kind(), e);
                    yield StreamEvent::Error { message: e.to_string() };
                    return;
                }
            };

            let mut full_text = String::new();
            let mut count = 0usize;
            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => {
                        count += 1;
                        full_text.push_str(&chunk);
                        let code = extract_code(&full_text);
                        yield StreamEvent::Chunk { chunk, code };
                    }
                    Err(e) => {
                        tracing::error!("[STREAM] Streaming error after {} chunks: {}", count, e);
                        yield StreamEvent::Error { message: e.to_string() };
                        return;
                    }
                }
            }

            tracing::debug!("[STREAM] Upstream finished after {} chunks", count);
            let code = extract_code(&full_text);
            if code.trim().is_empty() {
                tracing::warn!("[STREAM] Model returned no usable code");
            }
            yield StreamEvent::Complete { code };
        };

        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ScriptedReply;

    fn generator(replies: Vec<ScriptedReply>) -> CodeGenerator {
        CodeGenerator::new(Arc::new(ScriptedProvider::new(replies)))
    }

    #[tokio::test]
    async fn test_complete_extracts_first_fence() {
        let gen = generator(vec![ScriptedReply::Text(
            "Sure!\n```python\nX\n```\nEnjoy.".into(),
        )]);
        assert_eq!(gen.complete("a login screen").await.unwrap(), "X");
    }

    #[tokio::test]
    async fn test_complete_unconfigured_is_config_error() {
        let gen = CodeGenerator::new(Arc::new(ScriptedProvider::unconfigured()));
        let err = gen.complete("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Config(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_complete_propagates_upstream_error() {
        let gen = generator(vec![ScriptedReply::Fail(GenerationError::upstream_status(
            503, "overloaded",
        ))]);
        let err = gen.complete("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Upstream { status: Some(503), .. }));
    }

    #[tokio::test]
    async fn test_complete_empty_text_is_empty_code() {
        let gen = generator(vec![ScriptedReply::Text("```\n```".into())]);
        assert_eq!(gen.complete("x").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_stream_accumulates_without_fences() {
        let gen = generator(vec![ScriptedReply::Chunks(vec![
            Ok("def ".into()),
            Ok("main():\n    ".into()),
            Ok("pass".into()),
        ])]);
        let events: Vec<StreamEvent> = gen.complete_stream("p".into()).collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Chunk {
                    chunk: "def ".into(),
                    code: "def ".into()
                },
                StreamEvent::Chunk {
                    chunk: "main():\n    ".into(),
                    code: "def main():\n    ".into()
                },
                StreamEvent::Chunk {
                    chunk: "pass".into(),
                    code: "def main():\n    pass".into()
                },
                StreamEvent::Complete {
                    code: "def main():\n    pass".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_fence_spanning_chunks() {
        let gen = generator(vec![ScriptedReply::Chunks(vec![
            Ok("Here:\n``".into()),
            Ok("`python\nx = 1\n`".into()),
            Ok("``\ndone".into()),
        ])]);
        let events: Vec<StreamEvent> = gen.complete_stream("p".into()).collect().await;
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Complete { code: "x = 1".into() })
        );
    }

    #[tokio::test]
    async fn test_stream_mid_failure_ends_with_error() {
        let gen = generator(vec![ScriptedReply::Chunks(vec![
            Ok("import ".into()),
            Err(GenerationError::upstream("connection reset")),
            Ok("never sent".into()),
        ])]);
        let events: Vec<StreamEvent> = gen.complete_stream("p".into()).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            StreamEvent::Error {
                message: "connection reset".into()
            }
        );
        assert!(events.iter().filter(|e| e.is_terminal()).count() == 1);
    }

    #[tokio::test]
    async fn test_stream_unconfigured_single_error() {
        let gen = CodeGenerator::new(Arc::new(ScriptedProvider::unconfigured()));
        let events: Vec<StreamEvent> = gen.complete_stream("p".into()).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Error { message } if message.starts_with("GEMINI_API_KEY not set")));
    }
}
