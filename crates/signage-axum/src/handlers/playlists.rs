//! Playlist handlers.

use axum::Json;
use axum::extract::{Path, State};

use crate::dto::PlaylistNotifyResponse;
use crate::error::HttpError;
use crate::state::AppState;

/// Tell every display using the playlist to re-fetch it.
///
/// Called by the playlist CRUD layer after items were added, removed or
/// reordered.
pub async fn changed(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlaylistNotifyResponse>, HttpError> {
    let notified = state.notifier.notify_playlist_displays(&id).await?;
    Ok(Json(PlaylistNotifyResponse { notified }))
}
