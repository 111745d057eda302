//! Gemini Provider - Google Generative Language API
//!
//! 非流式走 `:generateContent`，流式走 `:streamGenerateContent?alt=sse`。

use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Client;

use super::{CompletionProvider, TextStream};
use crate::config::GeminiConfig;
use crate::error::GenerationError;
use crate::models::gemini::{GenerateContentRequest, GenerateContentResponse, GenerationConfig};

const API_VERSION: &str = "v1beta";

/// 建立连接的超时
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 缺少凭证时返回给调用方的提示
pub const MISSING_API_KEY_MESSAGE: &str = "GEMINI_API_KEY not set. Please add it to your .env file.";

/// Gemini Provider
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    /// 非流式请求的总超时；流式请求只受分片间空闲超时约束
    request_timeout: Duration,
    generation_config: Option<GenerationConfig>,
}

impl GeminiProvider {
    pub fn from_config(config: &GeminiConfig) -> Self {
        let request_timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(request_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        let generation_config = config.temperature.map(|t| GenerationConfig {
            temperature: Some(t),
            max_output_tokens: None,
        });

        Self {
            client,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout,
            generation_config,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/{API_VERSION}/models/{}:{method}",
            self.base_url, self.model
        )
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| GenerationError::Config(MISSING_API_KEY_MESSAGE.to_string()))
    }

    fn request_body(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest::from_prompt(prompt, self.generation_config.clone())
    }

    async fn send(
        &self,
        url: &str,
        prompt: &str,
        total_timeout: Option<Duration>,
    ) -> Result<reqwest::Response, GenerationError> {
        let key = self.api_key()?;
        let mut builder = self.client.post(url);
        if let Some(timeout) = total_timeout {
            builder = builder.timeout(timeout);
        }
        let resp = builder
            .header("x-goog-api-key", key)
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!("[GEMINI] API call failed: {} - {}", status, body);
            return Err(GenerationError::upstream_status(
                status.as_u16(),
                format!("Gemini API error {}: {}", status, error_message(&body)),
            ));
        }

        Ok(resp)
    }
}

/// 从 Gemini 错误响应中取出 message，取不到时返回原文
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn is_normal_finish(reason: &str) -> bool {
    matches!(reason, "STOP" | "FINISH_REASON_UNSPECIFIED")
}

/// 解析一条响应（完整响应或流式片段）中的文本
fn response_text(resp: &GenerateContentResponse) -> Result<Option<String>, GenerationError> {
    if let Some(reason) = resp.block_reason() {
        return Err(GenerationError::upstream(format!(
            "Prompt blocked by Gemini: {reason}"
        )));
    }
    // STOP 以外的结束原因意味着输出被截断或拦截
    if let Some(reason) = resp.finish_reason().filter(|r| !is_normal_finish(r)) {
        tracing::warn!("[GEMINI] Generation stopped early: {}", reason);
        return Err(GenerationError::upstream(format!(
            "Gemini stopped generating early: {reason}"
        )));
    }
    Ok(resp.text())
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = self.endpoint("generateContent");
        tracing::debug!("[GEMINI] generateContent model={}", self.model);

        let resp = self.send(&url, prompt, Some(self.request_timeout)).await?;
        let body = resp.text().await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("[GEMINI] Unexpected response format: {} ({})", e, body);
            GenerationError::UnexpectedFormat("Unexpected response format from Gemini API".into())
        })?;

        match response_text(&parsed)? {
            Some(text) => Ok(text),
            None => {
                tracing::error!("[GEMINI] Response has no text: {}", body);
                Err(GenerationError::UnexpectedFormat(
                    "Unexpected response format from Gemini API".into(),
                ))
            }
        }
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, GenerationError> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        tracing::debug!("[GEMINI] streamGenerateContent model={}", self.model);

        let resp = self.send(&url, prompt, None).await?;
        let mut events = resp.bytes_stream().eventsource();

        let stream = async_stream::stream! {
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if event.data.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<GenerateContentResponse>(&event.data) {
                            Ok(chunk) => match response_text(&chunk) {
                                Ok(Some(text)) if !text.is_empty() => {
                                    yield Ok(text);
                                }
                                Ok(_) => continue,
                                Err(e) => {
                                    yield Err(e);
                                    break;
                                }
                            },
                            Err(e) => {
                                tracing::warn!("[GEMINI] Failed to parse stream chunk: {}", e);
                                yield Err(GenerationError::UnexpectedFormat(format!(
                                    "Failed to parse stream chunk: {e}"
                                )));
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("[GEMINI] Stream error: {}", e);
                        yield Err(GenerationError::upstream(format!("Stream error: {e}")));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
