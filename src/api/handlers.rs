//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::{
    error::TimerError,
    state::{AppState, CompletedTimer, EngineState, NewTimer, Timer, TimerId, TimerPatch},
};
use super::responses::{
    ApiError, CategoryResponse, HealthResponse, HistoryResponse, StatusResponse, ThemeResponse,
    TimerResponse,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn found<T>(id: TimerId, value: Option<T>) -> Result<T, ApiError> {
    value.ok_or(ApiError(TimerError::NotFound(id)))
}

/// Handle GET /state - Full engine snapshot
pub async fn state_handler(State(state): State<Arc<AppState>>) -> ApiResult<EngineState> {
    Ok(Json(state.snapshot()?))
}

/// Handle GET /timers - Active timers in creation order
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Timer>> {
    Ok(Json(state.timers()?))
}

/// Handle POST /timers - Create a timer
pub async fn add_timer_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewTimer>, JsonRejection>,
) -> Result<(StatusCode, Json<TimerResponse>), ApiError> {
    let Json(fields) = payload?;
    let timer = state.add_timer(fields)?;
    Ok((StatusCode::CREATED, Json(TimerResponse::new("add", timer))))
}

/// Handle PATCH /timers/:id - Merge fields into a timer
pub async fn update_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
    payload: Result<Json<TimerPatch>, JsonRejection>,
) -> ApiResult<TimerResponse> {
    let Json(patch) = payload?;
    let timer = if patch.is_empty() {
        debug!("Empty patch for timer {}, returning it unchanged", id);
        found(id, state.timer(id)?)?
    } else {
        found(id, state.update_timer(id, patch)?)?
    };
    Ok(Json(TimerResponse::new("update", timer)))
}

/// Handle DELETE /timers/:id
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerResponse> {
    let timer = found(id, state.delete_timer(id)?)?;
    Ok(Json(TimerResponse::new("delete", timer)))
}

/// Handle POST /timers/:id/start
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerResponse> {
    let timer = found(id, state.start_timer(id)?)?;
    Ok(Json(TimerResponse::new("start", timer)))
}

/// Handle POST /timers/:id/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerResponse> {
    let timer = found(id, state.pause_timer(id)?)?;
    Ok(Json(TimerResponse::new("pause", timer)))
}

/// Handle POST /timers/:id/reset
pub async fn reset_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<TimerResponse> {
    let timer = found(id, state.reset_timer(id)?)?;
    Ok(Json(TimerResponse::new("reset", timer)))
}

/// Handle POST /timers/:id/complete - Finish a timer early
pub async fn complete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> ApiResult<CompletedTimer> {
    Ok(Json(found(id, state.complete_timer(id)?)?))
}

/// Handle GET /categories - Distinct categories in first-seen order
pub async fn categories_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<String>> {
    Ok(Json(state.categories()?))
}

/// Handle POST /categories/:category/start
pub async fn start_category_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<CategoryResponse> {
    let timers = state.start_category(&category)?;
    info!("Started {} timer(s) in {}", timers.len(), category);
    Ok(Json(CategoryResponse::new("start", category, timers)))
}

/// Handle POST /categories/:category/pause
pub async fn pause_category_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<CategoryResponse> {
    let timers = state.pause_category(&category)?;
    info!("Paused {} timer(s) in {}", timers.len(), category);
    Ok(Json(CategoryResponse::new("pause", category, timers)))
}

/// Handle POST /categories/:category/reset
pub async fn reset_category_handler(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
) -> ApiResult<CategoryResponse> {
    let timers = state.reset_category(&category)?;
    info!("Reset {} timer(s) in {}", timers.len(), category);
    Ok(Json(CategoryResponse::new("reset", category, timers)))
}

/// Handle GET /history - Completed timers in completion order
pub async fn history_handler(State(state): State<Arc<AppState>>) -> ApiResult<HistoryResponse> {
    let completed_timers = state.completed_timers()?;
    Ok(Json(HistoryResponse {
        count: completed_timers.len(),
        completed_timers,
    }))
}

/// Handle GET /alerts - Server-sent stream of halfway and completion alerts
pub async fn alerts_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let alerts_rx = state.subscribe_alerts();
    debug!("Alert stream subscriber connected");

    let stream = stream::unfold(alerts_rx, |mut alerts_rx| async move {
        loop {
            match alerts_rx.recv().await {
                Ok(alert) => {
                    let event = Event::default().event(alert.kind()).json_data(&alert);
                    return Some((event, alerts_rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Alert stream subscriber lagged, skipped {} alert(s)", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handle GET /theme
pub async fn get_theme_handler(State(state): State<Arc<AppState>>) -> ApiResult<ThemeResponse> {
    Ok(Json(ThemeResponse { mode: state.theme()? }))
}

/// Handle PUT /theme
pub async fn set_theme_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ThemeResponse>, JsonRejection>,
) -> ApiResult<ThemeResponse> {
    let Json(request) = payload?;
    Ok(Json(ThemeResponse { mode: state.set_theme(request.mode)? }))
}

/// Handle GET /status - Return engine counters and server info
pub async fn status_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let snapshot = state.snapshot()?;
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timers: snapshot.timers.len(),
        running: snapshot.running_ids().len(),
        active_loops: state.scheduler.active_loops(),
        completed: snapshot.completed_timers.len(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
