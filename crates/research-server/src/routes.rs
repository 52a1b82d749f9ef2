use crate::state::AppState;
use research_core::error::AgentError;
use research_core::types::{AgentEvent, ResearchRun};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

// ── Health ──────────────────────────────────────────────────────────────

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ── Research ────────────────────────────────────────────────────────────

pub fn research_routes() -> Router<AppState> {
    Router::new().route("/v1/research", post(research))
}

#[derive(Debug, Deserialize)]
struct ResearchRequest {
    question: String,
    /// Per-request override of the iteration budget.
    #[serde(default)]
    budget: Option<usize>,
    #[serde(default)]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct StepInfo {
    tool: String,
    input: String,
    observation: String,
    is_error: bool,
}

#[derive(Debug, Serialize)]
struct ResearchResponse {
    answer: String,
    degraded: bool,
    iterations_used: usize,
    steps: Vec<StepInfo>,
}

fn run_to_response(run: &ResearchRun) -> ResearchResponse {
    ResearchResponse {
        answer: run.answer.clone(),
        degraded: run.degraded,
        iterations_used: run.iterations_used,
        steps: run
            .history
            .iter()
            .map(|r| StepInfo {
                tool: r.action.tool_name.clone(),
                input: r.action.tool_input.clone(),
                observation: r.observation.clone(),
                is_error: r.is_error,
            })
            .collect(),
    }
}

async fn research(
    State(state): State<AppState>,
    Json(req): Json<ResearchRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.question.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Question must not be empty".into()));
    }

    let budget = req.budget.unwrap_or_else(|| state.agent.budget());

    if req.stream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<AgentEvent>();

        let agent = state.agent.clone();
        let history = state.history.clone();
        let question = req.question.clone();
        tokio::spawn(async move {
            let result = agent.run_with_budget(&question, budget, tx).await;
            if let Ok(run) = result {
                history.write().await.record(&run);
            }
        });

        let stream = UnboundedReceiverStream::new(rx).map(|event| {
            let sse_event: Result<Event, std::convert::Infallible> = match event {
                AgentEvent::ActionStart {
                    tool_name,
                    tool_input,
                    ..
                } => Ok(Event::default()
                    .event("action")
                    .json_data(serde_json::json!({
                        "tool": tool_name,
                        "input": tool_input,
                    }))
                    .unwrap()),
                AgentEvent::Observation(result) => Ok(Event::default()
                    .event("observation")
                    .json_data(serde_json::json!({
                        "tool": result.action.tool_name,
                        "observation": result.observation,
                        "is_error": result.is_error,
                    }))
                    .unwrap()),
                AgentEvent::Done(run) => Ok(Event::default()
                    .event("done")
                    .json_data(run_to_response(&run))
                    .unwrap()),
                AgentEvent::Error(e) => Ok(Event::default().event("error").data(e)),
            };
            sse_event
        });

        Ok(Sse::new(stream).into_response())
    } else {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<AgentEvent>();

        let run = state
            .agent
            .run_with_budget(&req.question, budget, tx)
            .await
            .map_err(|e| match e {
                AgentError::AgentUnavailable(msg) => (
                    StatusCode::BAD_GATEWAY,
                    format!(
                        "The model backend could not be reached: {}. \
                         Check the provider api_base and API key configuration.",
                        msg
                    ),
                ),
                other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
            })?;

        state.history.write().await.record(&run);

        Ok(Json(run_to_response(&run)).into_response())
    }
}

// ── History ─────────────────────────────────────────────────────────────

pub fn history_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/history", get(list_history).delete(clear_history))
        .route("/v1/history/{id}/download", get(download_entry))
}

#[derive(Debug, Serialize)]
struct HistoryInfo {
    id: String,
    timestamp: String,
    question: String,
    answer: String,
    degraded: bool,
}

async fn list_history(State(state): State<AppState>) -> impl IntoResponse {
    let history = state.history.read().await;
    let entries: Vec<HistoryInfo> = history
        .entries()
        .iter()
        .map(|e| HistoryInfo {
            id: e.id.clone(),
            timestamp: e.timestamp.to_rfc3339(),
            question: e.question.clone(),
            answer: e.answer.clone(),
            degraded: e.degraded,
        })
        .collect();
    Json(entries)
}

async fn clear_history(State(state): State<AppState>) -> impl IntoResponse {
    state.history.write().await.clear();
    Json(serde_json::json!({ "cleared": true }))
}

/// Plain-text download of one answer — the user-facing export, distinct from
/// the append-only research log.
async fn download_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let history = state.history.read().await;
    let entry = history
        .get(&id)
        .ok_or((StatusCode::NOT_FOUND, format!("No history entry {}", id)))?;

    let filename = format!(
        "research_{}.txt",
        entry.timestamp.format("%Y%m%d_%H%M%S")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        entry.answer.clone(),
    ))
}
