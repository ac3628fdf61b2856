//! Data Transfer Objects (DTOs) for HTTP API contract.
//!
//! These types define the stable HTTP API contract with explicit serialization
//! control.

use serde::Serialize;

/// Body of `GET /api/sse/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatsDto {
    /// Open channels of any kind.
    pub clients: usize,
    /// Open display channels (a display with two tabs counts twice).
    pub displays: usize,
    /// Displays with at least one open channel.
    pub distinct_displays: usize,
    /// One entry per display channel.
    pub connected_display_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub const fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistNotifyResponse {
    pub notified: usize,
}
