//! Display handlers - control commands and status reports.

use axum::Json;
use axum::extract::{Path, State};
use signage_core::{ControlRequest, DisplayStatusPayload};

use crate::dto::SuccessResponse;
use crate::error::HttpError;
use crate::state::AppState;

/// Send a playback command to a display (`{command, index?}`).
pub async fn control(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ControlRequest>,
) -> Result<Json<SuccessResponse>, HttpError> {
    state.notifier.send_control(&id, &req).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// Accept a status report from a display and relay it to controllers.
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(status): Json<DisplayStatusPayload>,
) -> Result<Json<SuccessResponse>, HttpError> {
    state.notifier.report_status(&id, status).await?;
    Ok(Json(SuccessResponse::ok()))
}
