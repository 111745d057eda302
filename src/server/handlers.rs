//! JSON 路由处理器

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};

use super::{ApiError, AppState};
use crate::models::{
    ConversationTurn, ExportCodeResponse, GenerateRequest, GenerateResponse, HealthResponse,
    HistoryResponse, PreviewActionResponse, StreamingStartedResponse, SuccessResponse,
    UpdateInstructionsRequest,
};
use crate::preview::StopOutcome;
use crate::prompt::build_prompt;

pub(super) const NO_PROMPT: &str = "No prompt provided";
const NO_CODE: &str = "No code has been generated yet";
const GENERATED: &str = "Code generated successfully. Click Preview to run the UI.";
const PREVIEW_LAUNCHED: &str =
    "UI preview launched successfully. The preview window should now be open.";
const PREVIEW_FAILED: &str = "Failed to launch UI preview. Check server logs for details.";

static INDEX_HTML: &str = include_str!("index.html");

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    let Some(prompt) = request.prompt() else {
        return Err(ApiError::bad_request(NO_PROMPT));
    };

    let full_prompt = {
        let mut session = state.session.lock().await;
        session.append_turn(ConversationTurn::user(prompt));
        if request.stream {
            tracing::info!("[GENERATE] Streaming requested, waiting for /generate-stream");
            return Ok(Json(StreamingStartedResponse {
                success: true,
                streaming: true,
                message: "Streaming started".to_string(),
            })
            .into_response());
        }
        build_prompt(prompt, session.instructions(), session.history())
    };

    tracing::info!(
        "[GENERATE] provider={} prompt_len={}",
        state.generator.provider_name(),
        full_prompt.len()
    );
    let code = state.generator.complete(&full_prompt).await?;

    {
        let mut session = state.session.lock().await;
        if let Err(e) = session.persist_generation(&code).await {
            tracing::error!("[GENERATE] Failed to save preview file: {}", e);
        }
    }

    tracing::info!("[GENERATE] Generated {} bytes of code", code.len());
    Ok(Json(GenerateResponse {
        code,
        success: true,
        message: GENERATED.to_string(),
    })
    .into_response())
}

pub async fn update_instructions(
    State(state): State<AppState>,
    Json(request): Json<UpdateInstructionsRequest>,
) -> Json<SuccessResponse> {
    let instructions = request.instructions.unwrap_or_default();
    tracing::info!("[SESSION] Custom instructions updated ({} chars)", instructions.len());
    state.session.lock().await.set_instructions(instructions);
    Json(SuccessResponse { success: true })
}

pub async fn export_code(
    State(state): State<AppState>,
) -> Result<Json<ExportCodeResponse>, ApiError> {
    match state.session.last_code().await {
        Some(code) if !code.is_empty() => Ok(Json(ExportCodeResponse { code })),
        _ => Err(ApiError::bad_request(NO_CODE)),
    }
}

pub async fn run_preview(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut session = state.session.lock().await;
    if session.last_code().map_or(true, str::is_empty) {
        return Err(ApiError::bad_request(NO_CODE));
    }

    match session.preview_mut().start_preview().await {
        Ok(pid) => {
            tracing::info!("[PREVIEW] Launched pid={}", pid);
            Ok(Json(PreviewActionResponse::ok(PREVIEW_LAUNCHED)).into_response())
        }
        Err(e) => {
            tracing::error!("[PREVIEW] Launch failed: {}", e);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PreviewActionResponse::failed(PREVIEW_FAILED)),
            )
                .into_response())
        }
    }
}

pub async fn preview_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.lock().await.preview_status())
}

pub async fn stop_preview(State(state): State<AppState>) -> Response {
    match state.session.stop_preview().await {
        Ok(StopOutcome::Stopped { pid, forced }) => {
            tracing::info!("[PREVIEW] Stopped pid={} forced={}", pid, forced);
            Json(PreviewActionResponse::ok("Preview stopped successfully")).into_response()
        }
        Ok(StopOutcome::NotRunning) => {
            Json(PreviewActionResponse::ok("No preview is currently running")).into_response()
        }
        Err(e) => {
            tracing::error!("[PREVIEW] Stop failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PreviewActionResponse::failed(e.to_string())),
            )
                .into_response()
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let preview_running = state.session.lock().await.preview_status().is_running;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        gemini_configured: state.generator.is_configured(),
        preview_running,
    })
}

pub async fn history(State(state): State<AppState>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        turns: state.session.history().await,
    })
}
