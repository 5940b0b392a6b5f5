use crate::api::responses::{
    HealthErrorCode, HealthErrorResponse, HealthStatus, HealthSuccessResponse, OccupancyErrorCode,
    OccupancyErrorResponse, OccupancySuccessResponse, SlotSummaryResponse, SlotsErrorCode,
    SlotsErrorResponse, SlotsSuccessResponse,
};
use crate::state::{AppState, OccupancySnapshot, PassFailure};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum OccupancyResponse {
    Success(OccupancySuccessResponse),
    Error {
        status: StatusCode,
        body: OccupancyErrorResponse,
    },
}

impl IntoResponse for OccupancyResponse {
    fn into_response(self) -> Response {
        match self {
            OccupancyResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            OccupancyResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_occupancy(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_occupancy_response(state, SystemTime::now())
}

pub enum SlotsResponse {
    Success(SlotsSuccessResponse),
    Error {
        status: StatusCode,
        body: SlotsErrorResponse,
    },
}

impl IntoResponse for SlotsResponse {
    fn into_response(self) -> Response {
        match self {
            SlotsResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            SlotsResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_slots(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_slots_response(state, SystemTime::now())
}

pub enum HealthResponse {
    Success {
        status: StatusCode,
        body: HealthSuccessResponse,
    },
    Error {
        status: StatusCode,
        body: HealthErrorResponse,
    },
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        match self {
            HealthResponse::Success { status, body } => (status, Json(body)).into_response(),
            HealthResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_health(State(state): State<Arc<RwLock<AppState>>>) -> impl IntoResponse {
    build_health_response(state, SystemTime::now())
}

fn build_occupancy_response(state: Arc<RwLock<AppState>>, now: SystemTime) -> OccupancyResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return occupancy_internal_error("state lock poisoned while reading snapshot");
        }
    };
    let snapshot = guard.snapshot().cloned();
    drop(guard);

    match snapshot {
        Some(snapshot) => occupancy_success(snapshot),
        None => no_data_response(now),
    }
}

fn occupancy_success(snapshot: OccupancySnapshot) -> OccupancyResponse {
    match format_timestamp(snapshot.timestamp) {
        Ok(formatted) => OccupancyResponse::Success(OccupancySuccessResponse {
            results: snapshot.evaluation.results,
            summary: snapshot.evaluation.summary,
            skipped: snapshot.evaluation.skipped,
            timestamp: formatted,
        }),
        Err(_err) => occupancy_internal_error("timestamp formatting failure"),
    }
}

fn no_data_response(timestamp: SystemTime) -> OccupancyResponse {
    match format_timestamp(timestamp) {
        Ok(formatted) => OccupancyResponse::Error {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: OccupancyErrorResponse {
                error_code: OccupancyErrorCode::NoData,
                error_message: "No occupancy evaluation available".to_string(),
                timestamp: formatted,
            },
        },
        Err(_err) => occupancy_internal_error("timestamp formatting failure"),
    }
}

fn occupancy_internal_error(message: &str) -> OccupancyResponse {
    error!(
        message = message,
        "Internal error while handling /api/occupancy"
    );
    OccupancyResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: OccupancyErrorResponse {
            error_code: OccupancyErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn build_slots_response(state: Arc<RwLock<AppState>>, now: SystemTime) -> SlotsResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return slots_internal_error("state lock poisoned while reading slots");
        }
    };
    let slots = guard
        .slots()
        .iter()
        .map(|slot| SlotSummaryResponse {
            slot_id: slot.slot_id.clone(),
            slot_number: slot.slot_number,
            point_count: slot.coordinates.len(),
        })
        .collect();
    drop(guard);

    match format_timestamp(now) {
        Ok(timestamp) => SlotsResponse::Success(SlotsSuccessResponse { slots, timestamp }),
        Err(_) => slots_internal_error("timestamp formatting failure"),
    }
}

fn slots_internal_error(message: &str) -> SlotsResponse {
    error!(message = message, "Internal error while handling /api/slots");
    SlotsResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: SlotsErrorResponse {
            error_code: SlotsErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn build_health_response(state: Arc<RwLock<AppState>>, now: SystemTime) -> HealthResponse {
    let guard = match state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return health_internal_error("state lock poisoned while reading snapshot");
        }
    };
    let status = derive_health_status(guard.snapshot(), guard.last_failure());
    let last_evaluation = guard.snapshot().map(|snapshot| snapshot.timestamp);
    let (last_error, last_error_at) = match guard.last_failure() {
        Some(failure) => (Some(failure.message.clone()), Some(failure.timestamp)),
        None => (None, None),
    };
    drop(guard);

    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => {
            return health_internal_error("timestamp formatting failure");
        }
    };
    let last_evaluation = match last_evaluation.map(format_timestamp).transpose() {
        Ok(formatted) => formatted,
        Err(_) => {
            return health_internal_error("timestamp formatting failure");
        }
    };
    let last_error_at = match last_error_at.map(format_timestamp).transpose() {
        Ok(formatted) => formatted,
        Err(_) => {
            return health_internal_error("timestamp formatting failure");
        }
    };

    let status_code = match status {
        HealthStatus::Ko => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };

    HealthResponse::Success {
        status: status_code,
        body: HealthSuccessResponse {
            status,
            last_evaluation,
            last_error,
            last_error_at,
            timestamp,
        },
    }
}

fn derive_health_status(
    snapshot: Option<&OccupancySnapshot>,
    last_failure: Option<&PassFailure>,
) -> HealthStatus {
    match (snapshot, last_failure) {
        (None, _) => HealthStatus::Ko,
        (Some(_), Some(_)) => HealthStatus::Degraded,
        (Some(snapshot), None) if !snapshot.evaluation.skipped.is_empty() => {
            HealthStatus::Degraded
        }
        (Some(_), None) => HealthStatus::Ok,
    }
}

fn health_internal_error(message: &str) -> HealthResponse {
    error!(
        message = message,
        "Internal error while handling /api/health"
    );
    HealthResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: HealthErrorResponse {
            error_code: HealthErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

fn fallback_timestamp() -> String {
    format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    })
}
