//! 流式生成（SSE）
//!
//! 每个事件都是一帧 `data: {json}\n\n`：
//! - `{"chunk": "...", "code": "..."}` 新分片及累计提取出的代码
//! - `{"complete": true, "code": "..."}` 结束
//! - `{"error": "..."}` 失败并结束
//!
//! 客户端断开时响应体被丢弃，上游请求随之取消。

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Json,
};
use futures::StreamExt;

use super::handlers::NO_PROMPT;
use super::{ApiError, AppState};
use crate::models::GenerateRequest;
use crate::prompt::build_prompt;
use crate::services::StreamEvent;
use crate::session::SessionHandle;

/// 事件的 JSON 负载
pub(super) fn event_payload(event: &StreamEvent) -> serde_json::Value {
    match event {
        StreamEvent::Chunk { chunk, code } => serde_json::json!({ "chunk": chunk, "code": code }),
        StreamEvent::Complete { code } => serde_json::json!({ "complete": true, "code": code }),
        StreamEvent::Error { message } => serde_json::json!({ "error": message }),
    }
}

fn sse_frame(event: &StreamEvent) -> String {
    format!("data: {}\n\n", event_payload(event))
}

async fn persist_final_code(session: &SessionHandle, code: &str) {
    let mut session = session.lock().await;
    if let Err(e) = session.persist_generation(code).await {
        tracing::error!("[STREAM] Failed to save preview file: {}", e);
    }
}

pub async fn generate_stream(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    let Some(prompt) = request.prompt() else {
        return Err(ApiError::bad_request(NO_PROMPT));
    };

    let full_prompt = {
        let session = state.session.lock().await;
        build_prompt(prompt, session.instructions(), session.history())
    };
    tracing::info!(
        "[STREAM] provider={} prompt_len={}",
        state.generator.provider_name(),
        full_prompt.len()
    );

    let session = state.session.clone();
    let mut events = state.generator.complete_stream(full_prompt);

    let body_stream = async_stream::stream! {
        while let Some(event) = events.next().await {
            if let StreamEvent::Complete { code } = &event {
                persist_final_code(&session, code).await;
                tracing::info!("[STREAM] Completed with {} bytes of code", code.len());
            }
            yield Ok::<_, Infallible>(sse_frame(&event));
            if event.is_terminal() {
                break;
            }
        }
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            tracing::error!("[STREAM] Failed to build SSE response: {}", e);
            ApiError::Generation(crate::error::GenerationError::upstream(e.to_string()))
        })
}
