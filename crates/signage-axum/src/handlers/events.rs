//! Event stream endpoint - one long-lived channel per browser tab.
//!
//! Displays connect with `?target=<display id>` (or the older
//! `?displayId=`), controllers connect without a target and only receive
//! broadcasts.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use crate::dto::StreamStatsDto;
use crate::sse::OpenChannel;
use crate::state::AppState;

/// Query parameters of `GET /api/sse`.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(default, alias = "displayId")]
    pub target: Option<String>,
}

/// Open a stream channel.
///
/// The response stays open until the client disconnects, a write fails or
/// the server shuts down.
pub async fn stream(State(state): State<AppState>, Query(query): Query<StreamQuery>) -> OpenChannel {
    state.hub.open(query.target)
}

/// Connection counts for dashboards.
pub async fn stats(State(state): State<AppState>) -> Json<StreamStatsDto> {
    let registry = &state.registry;
    Json(StreamStatsDto {
        clients: registry.count(),
        displays: registry.target_count(),
        distinct_displays: registry.distinct_target_count(),
        connected_display_ids: registry.list_targets(),
    })
}
