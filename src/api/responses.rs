//! API response structures

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    error::TimerError,
    state::{CompletedTimer, Timer},
    storage::ThemeMode,
};

/// Result of a single-timer action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerResponse {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub timer: Timer,
    /// Share of the countdown still left, 0..=100
    pub remaining_percent: f64,
}

impl TimerResponse {
    pub fn new(action: &str, timer: Timer) -> Self {
        Self {
            action: action.to_string(),
            timestamp: Utc::now(),
            remaining_percent: timer.remaining_percent(),
            timer,
        }
    }
}

/// Result of a bulk action over one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub action: String,
    pub category: String,
    pub timestamp: DateTime<Utc>,
    pub timers: Vec<Timer>,
}

impl CategoryResponse {
    pub fn new(action: &str, category: String, timers: Vec<Timer>) -> Self {
        Self {
            action: action.to_string(),
            category,
            timestamp: Utc::now(),
            timers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub completed_timers: Vec<CompletedTimer>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeResponse {
    pub mode: ThemeMode,
}

/// Status response with engine counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timers: usize,
    pub running: usize,
    pub active_loops: usize,
    pub completed: usize,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Engine errors mapped onto HTTP statuses
#[derive(Debug)]
pub struct ApiError(pub TimerError);

impl From<TimerError> for ApiError {
    fn from(e: TimerError) -> Self {
        ApiError(e)
    }
}

/// Malformed or mistyped request bodies are validation failures
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(TimerError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TimerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TimerError::NotFound(_) => StatusCode::NOT_FOUND,
            TimerError::Storage(_) | TimerError::Lock(_) => {
                error!("Request failed: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.0.to_string(),
            timestamp: Utc::now(),
        };
        (status, Json(body)).into_response()
    }
}
